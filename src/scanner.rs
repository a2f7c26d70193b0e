//! The scanner (§4.3): turns the preprocessed character stream into a
//! lazy sequence of classified, positioned tokens.

use crate::error::{Error, Position};
use crate::source::{Atom, CharSource, Source};
use crate::token::{is_identifier_char, is_identifier_start, Token, TokenKind, SYMBOL_CHARS};

pub(crate) struct Scanner<'a> {
    source: &'a mut dyn CharSource,
    lookahead: Option<(char, Position)>,
}

impl<'a> Scanner<'a> {
    pub(crate) fn new(source: &'a mut dyn CharSource) -> Self {
        Scanner {
            source,
            lookahead: None,
        }
    }

    fn pull(&mut self) -> Result<Option<(char, Position)>, Error> {
        if let Some(item) = self.lookahead.take() {
            return Ok(Some(item));
        }
        let pos = self.source.position();
        match self.source.next() {
            Atom::Empty => Ok(None),
            Atom::Error(e) => Err(e),
            Atom::Datum(c) => Ok(Some((c, pos))),
        }
    }

    fn next_token(&mut self) -> Result<Option<Token>, Error> {
        let Some((c, pos)) = self.pull()? else {
            return Ok(None);
        };

        if is_identifier_start(c) {
            let mut lexeme = String::new();
            lexeme.push(c);
            loop {
                match self.pull()? {
                    Some((nc, _)) if is_identifier_char(nc) => lexeme.push(nc),
                    Some(item) => {
                        self.lookahead = Some(item);
                        break;
                    }
                    None => break,
                }
            }
            return Ok(Some(Token {
                kind: TokenKind::Identifier,
                lexeme,
                line: pos.line,
                column: pos.column,
                unit: pos.unit,
            }));
        }

        let kind = if SYMBOL_CHARS.contains(&c) {
            TokenKind::Symbol(c)
        } else {
            TokenKind::Unspecified(c)
        };
        Ok(Some(Token {
            kind,
            lexeme: c.to_string(),
            line: pos.line,
            column: pos.column,
            unit: pos.unit,
        }))
    }

    /// Pulls the next token, optionally discarding whitespace-only
    /// `UNSPECIFIED` tokens first.
    pub(crate) fn next(&mut self, skip_ws: bool) -> Result<Token, Error> {
        loop {
            let tok = self.next_token()?.ok_or(Error::EndOfInput)?;
            if skip_ws && tok.is_whitespace() {
                continue;
            }
            return Ok(tok);
        }
    }

    /// Like `next`, but returns `None` cleanly at end-of-input instead of
    /// erroring — used where EOF is an acceptable terminator (e.g. the
    /// parser's top-level statement loop).
    pub(crate) fn next_opt(&mut self, skip_ws: bool) -> Result<Option<Token>, Error> {
        loop {
            match self.next_token()? {
                None => return Ok(None),
                Some(tok) if skip_ws && tok.is_whitespace() => continue,
                Some(tok) => return Ok(Some(tok)),
            }
        }
    }

    pub(crate) fn expect_identifier(&mut self, skip_ws: bool) -> Result<Token, Error> {
        let tok = self.next(skip_ws)?;
        match tok.kind {
            TokenKind::Identifier => Ok(tok),
            _ => Err(Error::UnexpectedTokenKind(
                tok.position(),
                format!("expected identifier, got {}", tok.kind.label()),
            )),
        }
    }

    pub(crate) fn expect_symbol(&mut self, skip_ws: bool, expected: char) -> Result<Token, Error> {
        let tok = self.next(skip_ws)?;
        match tok.symbol() {
            Some(c) if c == expected => Ok(tok),
            Some(c) => Err(Error::UnexpectedTokenValue(
                tok.position(),
                format!("expected `{expected}`, got `{c}`"),
            )),
            None => Err(Error::UnexpectedTokenKind(
                tok.position(),
                format!("expected symbol `{expected}`, got {}", tok.kind.label()),
            )),
        }
    }

    /// Peeks the very next raw character without consuming it and
    /// without skipping whitespace — used by scalar-run scanning, which
    /// must preserve whitespace verbatim.
    pub(crate) fn peek_char(&mut self) -> Result<Option<char>, Error> {
        match self.pull()? {
            None => Ok(None),
            Some(item) => {
                let c = item.0;
                self.lookahead = Some(item);
                Ok(Some(c))
            }
        }
    }

    /// True if the upcoming non-whitespace token is the given symbol,
    /// without consuming it. Used for the parser's one-token lookahead
    /// decisions (e.g. distinguishing `class X {` from `class X : Y {`).
    pub(crate) fn peek_symbol(&mut self, skip_ws: bool, expected: char) -> Result<bool, Error> {
        loop {
            let Some((c, pos)) = self.pull()? else {
                return Ok(false);
            };
            if skip_ws && c.is_whitespace() {
                continue;
            }
            self.lookahead = Some((c, pos));
            return Ok(c == expected);
        }
    }
}

impl<'a> Source<Token, Error> for Scanner<'a> {
    fn next(&mut self) -> Atom<Token, Error> {
        match self.next_opt(false) {
            Ok(Some(tok)) => Atom::Datum(tok),
            Ok(None) => Atom::Empty,
            Err(e) => Atom::Error(e),
        }
    }
}
