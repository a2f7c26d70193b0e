//! Recursive-descent parser (§4.4): turns the scanner's token stream
//! into a tree of `Node`s, preserving scalar text verbatim for the
//! decoder to coerce.

use crate::error::{Error, Position};
use crate::scanner::Scanner;
use crate::token::{Token, TokenKind};

const ARRAY_TERMINATORS: [char; 3] = [',', ';', '}'];

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum RawValue {
    Scalar(String),
    Array(Vec<RawValue>),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Node {
    Class {
        name: String,
        pos: Position,
        inherits: Option<String>,
        body: Vec<Node>,
    },
    Property {
        name: String,
        pos: Position,
        value: RawValue,
    },
}

/// Parses an entire translation unit (top-level body, terminated by
/// end-of-input rather than `}`).
pub(crate) fn parse(scanner: &mut Scanner) -> Result<Vec<Node>, Error> {
    parse_body(scanner, true)
}

fn parse_body(scanner: &mut Scanner, top_level: bool) -> Result<Vec<Node>, Error> {
    let mut nodes = Vec::new();
    loop {
        if !top_level && scanner.peek_symbol(true, '}')? {
            return Ok(nodes);
        }

        let Some(tok) = scanner.next_opt(true)? else {
            if top_level {
                return Ok(nodes);
            }
            return Err(Error::EndOfInput);
        };

        match &tok.kind {
            TokenKind::Symbol(';') => continue,
            TokenKind::Identifier if tok.lexeme == "class" => {
                nodes.push(parse_class(scanner)?);
            }
            TokenKind::Identifier => {
                nodes.push(parse_property(scanner, tok)?);
            }
            _ => {
                return Err(Error::UnexpectedTokenKind(
                    tok.position(),
                    format!("expected identifier, `class`, or `;`, got {}", tok.kind.label()),
                ))
            }
        }
    }
}

fn parse_class(scanner: &mut Scanner) -> Result<Node, Error> {
    let name_tok = scanner.expect_identifier(true)?;

    let inherits = if scanner.peek_symbol(true, ':')? {
        scanner.expect_symbol(true, ':')?;
        Some(scanner.expect_identifier(true)?.lexeme)
    } else {
        None
    };

    scanner.expect_symbol(true, '{')?;
    let body = parse_body(scanner, false)?;
    scanner.expect_symbol(true, '}')?;
    scanner.expect_symbol(true, ';')?;

    Ok(Node::Class {
        name: name_tok.lexeme,
        pos: name_tok.position(),
        inherits,
        body,
    })
}

fn parse_property(scanner: &mut Scanner, name_tok: Token) -> Result<Node, Error> {
    let is_array_marked = if scanner.peek_symbol(true, '[')? {
        scanner.expect_symbol(true, '[')?;
        scanner.expect_symbol(true, ']')?;
        true
    } else {
        false
    };

    scanner.expect_symbol(true, '=')?;

    let value = if is_array_marked {
        RawValue::Array(parse_array_elements(scanner)?)
    } else {
        parse_value(scanner)?
    };

    scanner.expect_symbol(true, ';')?;

    Ok(Node::Property {
        name: name_tok.lexeme,
        pos: name_tok.position(),
        value,
    })
}

/// A non-array-marked property's value is always a raw scalar run to
/// `;`, regardless of what it starts with — the `[]` marker, not a
/// leading `{`, is what decides array-vs-scalar (`original_source`'s
/// `analyser.py::_parse_one` gates solely on `is_array`; a `{`-led value
/// here is legitimately a literal brace in scalar text, not an array).
fn parse_value(scanner: &mut Scanner) -> Result<RawValue, Error> {
    Ok(RawValue::Scalar(scan_scalar_until(scanner, &[';'])?))
}

fn parse_element(scanner: &mut Scanner) -> Result<RawValue, Error> {
    if scanner.peek_symbol(true, '{')? {
        Ok(RawValue::Array(parse_array_elements(scanner)?))
    } else {
        Ok(RawValue::Scalar(scan_scalar_until(scanner, &ARRAY_TERMINATORS)?))
    }
}

fn parse_array_elements(scanner: &mut Scanner) -> Result<Vec<RawValue>, Error> {
    scanner.expect_symbol(true, '{')?;
    let mut elements = Vec::new();

    loop {
        if scanner.peek_symbol(true, '}')? {
            scanner.expect_symbol(true, '}')?;
            break;
        }

        elements.push(parse_element(scanner)?);

        let sep = scanner.next(false)?;
        match sep.lexeme.chars().next() {
            Some(',') | Some(';') => continue,
            Some('}') => break,
            _ => {
                return Err(Error::UnexpectedTokenValue(
                    sep.position(),
                    format!("expected `,`, `;`, or `}}` in array, got `{}`", sep.lexeme),
                ))
            }
        }
    }

    Ok(elements)
}

/// Reads a whitespace-preserving character run up to (but not
/// including) the first character in `terminators`. Not quote-aware:
/// the grammar terminates on the literal first occurrence, matching the
/// pinned `scalar_until` definition.
fn scan_scalar_until(scanner: &mut Scanner, terminators: &[char]) -> Result<String, Error> {
    let mut out = String::new();
    loop {
        match scanner.peek_char()? {
            None => return Err(Error::EndOfInput),
            Some(c) if terminators.contains(&c) => break,
            Some(_) => {
                let tok = scanner.next(false)?;
                out.push_str(&tok.lexeme);
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use crate::preprocessor::preprocess_str;
    use crate::source::ANONYMOUS;

    fn parse_text(text: &str) -> Result<Vec<Node>, Error> {
        let mut pp = preprocess_str(ANONYMOUS, text, false);
        let mut scanner = Scanner::new(&mut pp);
        parse(&mut scanner)
    }

    #[test]
    fn lone_semicolon_is_a_no_op() {
        assert_eq!(parse_text(";").unwrap(), vec![]);
    }

    #[test]
    fn empty_class_body_parses() {
        let nodes = parse_text("class X {};").unwrap();
        assert_eq!(nodes.len(), 1);
        let Node::Class { name, inherits, body, .. } = &nodes[0] else {
            panic!("expected class");
        };
        assert_eq!(name, "X");
        assert_eq!(*inherits, None);
        assert_eq!(*body, vec![]);
    }

    #[test]
    fn empty_array_parses() {
        let nodes = parse_text("x[] = {};").unwrap();
        assert_eq!(nodes.len(), 1);
        let Node::Property { name, value, .. } = &nodes[0] else {
            panic!("expected property");
        };
        assert_eq!(name, "x");
        assert_eq!(*value, RawValue::Array(vec![]));
    }

    #[test]
    fn trailing_separator_is_accepted() {
        let nodes = parse_text("x[] = {1, 2,};").unwrap();
        let Node::Property { name, value, .. } = &nodes[0] else {
            panic!("expected property");
        };
        assert_eq!(name, "x");
        assert_eq!(
            *value,
            RawValue::Array(vec![
                RawValue::Scalar("1".to_string()),
                RawValue::Scalar("2".to_string()),
            ])
        );
    }

    #[test]
    fn multi_dim_array_nests() {
        let nodes = parse_text("multi[] = {1, {2, 3}, {{4, 5, 6 seven, {}}}};").unwrap();
        let Node::Property { value, .. } = &nodes[0] else {
            panic!("expected property");
        };
        let RawValue::Array(top) = value else {
            panic!("expected array");
        };
        assert_eq!(top.len(), 3);
        assert!(matches!(&top[1], RawValue::Array(inner) if inner.len() == 2));
    }

    #[test]
    fn inheritance_is_recorded() {
        let nodes = parse_text(
            "class _class { base_property[] = {\"a\",\"b\"}; }; class inherited : _class { new_property = 1; };",
        )
        .unwrap();
        let Node::Class { name, inherits, .. } = &nodes[1] else {
            panic!("expected class");
        };
        assert_eq!(name, "inherited");
        assert_eq!(inherits.as_deref(), Some("_class"));
    }

    #[test]
    fn value_expected_but_got_symbol_is_value_error() {
        let err = parse_text("prop } \"3\";").unwrap_err();
        assert!(matches!(err, Error::UnexpectedTokenValue(_, _)));
    }

    #[test]
    fn class_missing_brace_is_value_error() {
        let err = parse_text("class test [property = 3;];").unwrap_err();
        assert!(matches!(err, Error::UnexpectedTokenValue(_, _)));
    }

    #[test]
    fn stray_bracket_in_body_is_kind_error() {
        let err = parse_text("class test {property = 3;];").unwrap_err();
        assert!(matches!(err, Error::UnexpectedTokenKind(_, _)));
    }

    #[test]
    fn array_marker_requires_brace_value() {
        let err = parse_text("array[] = 1;").unwrap_err();
        assert!(matches!(
            err,
            Error::UnexpectedTokenKind(_, _) | Error::UnexpectedTokenValue(_, _)
        ));
    }

    #[test]
    fn brace_led_value_without_array_marker_is_a_scalar() {
        let nodes = parse_text("string = {\"array\"};").unwrap();
        let Node::Property { name, value, .. } = &nodes[0] else {
            panic!("expected property");
        };
        assert_eq!(name, "string");
        assert_eq!(*value, RawValue::Scalar("{\"array\"}".to_string()));
    }
}
