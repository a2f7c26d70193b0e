//! The stream stack (§4.1): a pushdown stack of character sources with
//! per-frame line/column/unit tracking.
//!
//! Generalizes the teacher's `Source<DatumType, ErrorType>` trait and its
//! `Atom` (a combination of `Option` and `Result`) to the stream-stack
//! layer; every later pipeline stage (preprocessor, scanner, parser) is
//! just another `Source` wrapping the one below it.

use std::collections::VecDeque;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::error::{Error, Position};

/// Either a datum, a fatal error, or a clean end of the stream.
pub(crate) enum Atom<D, E> {
    Datum(D),
    Error(E),
    Empty,
}

/// A lazy pull-based producer. Every pipeline layer implements this over
/// the layer beneath it.
pub(crate) trait Source<D, E> {
    fn next(&mut self) -> Atom<D, E>;
}

impl<D, E> From<Option<Result<D, E>>> for Atom<D, E> {
    fn from(value: Option<Result<D, E>>) -> Self {
        match value {
            Some(Ok(d)) => Atom::Datum(d),
            Some(Err(e)) => Atom::Error(e),
            None => Atom::Empty,
        }
    }
}

/// Callback the host supplies to turn a path into a readable handle.
/// Defaults to `std::fs::File::open`. `Rc`-wrapped (rather than a bare
/// `Box`) so `LoadOptions` can hand the same callback to both the
/// initial `load_path` open and the preprocessor's `#include` handling
/// without requiring ownership of the `&LoadOptions` it's read from.
pub type FileOpener = Rc<dyn Fn(&Path) -> std::io::Result<Box<dyn Read>>>;

pub(crate) fn default_file_opener() -> FileOpener {
    Rc::new(|path: &Path| -> std::io::Result<Box<dyn Read>> {
        Ok(Box::new(std::fs::File::open(path)?))
    })
}

pub(crate) const ANONYMOUS: &str = "anonymous";

struct Frame {
    chars: VecDeque<char>,
    line: u32,
    column: u32,
    name: Rc<str>,
    /// Directory `#include` paths on this frame resolve against.
    dir: Option<PathBuf>,
}

pub(crate) struct StreamStack {
    frames: Vec<Frame>,
    last_unit: Rc<str>,
    last_line: u32,
    last_column: u32,
}

impl StreamStack {
    pub(crate) fn new() -> Self {
        StreamStack {
            frames: Vec::new(),
            last_unit: Rc::from(ANONYMOUS),
            last_line: 1,
            last_column: 1,
        }
    }

    pub(crate) fn push_str(&mut self, name: &str, text: &str) {
        log::trace!("pushing in-memory source `{name}` ({} chars)", text.len());
        self.frames.push(Frame {
            chars: text.chars().collect(),
            line: 1,
            column: 1,
            name: Rc::from(name),
            dir: None,
        });
    }

    pub(crate) fn push_reader(
        &mut self,
        name: &str,
        mut reader: Box<dyn Read>,
        dir: Option<PathBuf>,
    ) -> Result<(), Error> {
        let mut text = String::new();
        reader
            .read_to_string(&mut text)
            .map_err(|e| Error::Io(name.to_string(), e))?;
        log::trace!("pushing source `{name}` ({} chars)", text.len());
        self.frames.push(Frame {
            chars: text.chars().collect(),
            line: 1,
            column: 1,
            name: Rc::from(name),
            dir,
        });
        Ok(())
    }

    pub(crate) fn push_path(&mut self, path: &Path, opener: &FileOpener) -> Result<(), Error> {
        let reader = opener(path).map_err(|e| Error::Io(path.display().to_string(), e))?;
        let dir = path.parent().map(|p| p.to_path_buf());
        self.push_reader(&path.display().to_string(), reader, dir)
    }

    /// Resolve an `#include` path against the directory of the current
    /// top frame. Absolute paths bypass resolution (§9 open question).
    pub(crate) fn resolve_include(&self, raw: &str) -> PathBuf {
        let normalized = raw.replace('\\', "/");
        let candidate = PathBuf::from(&normalized);

        if candidate.is_absolute() {
            return candidate;
        }

        match self.frames.last().and_then(|f| f.dir.as_ref()) {
            Some(dir) => dir.join(candidate),
            None => candidate,
        }
    }

    /// Drop any frames that have no characters left.
    fn trim_empty(&mut self) {
        while matches!(self.frames.last(), Some(f) if f.chars.is_empty()) {
            let frame = self.frames.pop().unwrap();
            log::trace!("popped exhausted frame `{}`", frame.name);
        }
        if let Some(frame) = self.frames.last() {
            self.last_unit = frame.name.clone();
            self.last_line = frame.line;
            self.last_column = frame.column;
        }
    }

    pub(crate) fn make_position(&mut self) -> Position {
        self.trim_empty();
        Position::new(self.last_line, self.last_column, self.last_unit.clone())
    }

    pub(crate) fn peek(&mut self, n: usize) -> String {
        self.trim_empty();
        let mut out = String::with_capacity(n);
        let mut remaining = n;

        for frame in self.frames.iter().rev() {
            if remaining == 0 {
                break;
            }
            for ch in frame.chars.iter() {
                if remaining == 0 {
                    break;
                }
                out.push(*ch);
                remaining -= 1;
            }
        }

        out
    }

    fn advance_one(&mut self) -> Result<(), Error> {
        loop {
            self.trim_empty();
            match self.frames.last_mut() {
                None => return Err(Error::EndOfInput),
                Some(frame) => {
                    let ch = frame.chars.pop_front().expect("trim_empty keeps this non-empty");
                    if ch == '\n' {
                        frame.line += 1;
                        frame.column = 1;
                    } else {
                        frame.column += 1;
                    }
                    return Ok(());
                }
            }
        }
    }

    pub(crate) fn advance(&mut self, n: usize) -> Result<(), Error> {
        for _ in 0..n {
            self.advance_one()?;
        }
        Ok(())
    }

    pub(crate) fn get(&mut self, n: usize) -> Result<String, Error> {
        let out = self.peek(n);
        if out.chars().count() < n {
            return Err(Error::EndOfInput);
        }
        self.advance(n)?;
        Ok(out)
    }

    /// Accumulate characters until the upcoming text equals `delim`.
    /// Reaching end-of-input before the delimiter is found is a fatal
    /// error (used for strings and block comments).
    pub(crate) fn find_delim(&mut self, delim: &str, advance: bool) -> Result<String, Error> {
        let mut out = String::new();
        let len = delim.chars().count();

        loop {
            let peeked = self.peek(len);
            if peeked == delim {
                break;
            }
            if self.peek(1).is_empty() {
                return Err(Error::EndOfInput);
            }
            out.push_str(&self.get(1)?);
        }

        if advance {
            self.advance(len)?;
        }

        Ok(out)
    }

    /// Accumulate characters while `predicate` holds on the next single
    /// character. Stops cleanly (no error) at end-of-input.
    pub(crate) fn find_while(
        &mut self,
        predicate: impl Fn(char) -> bool,
        advance: bool,
    ) -> String {
        let mut out = String::new();

        loop {
            let peeked = self.peek(1);
            let Some(ch) = peeked.chars().next() else {
                break;
            };
            if !predicate(ch) {
                break;
            }
            out.push(ch);
            if advance {
                let _ = self.advance(1);
            } else {
                break;
            }
        }

        out
    }
}

impl Source<char, Error> for StreamStack {
    fn next(&mut self) -> Atom<char, Error> {
        let peeked = self.peek(1);
        match peeked.chars().next() {
            None => Atom::Empty,
            Some(ch) => match self.advance(1) {
                Ok(()) => Atom::Datum(ch),
                Err(e) => Atom::Error(e),
            },
        }
    }
}

/// A character `Source` that can also report the position of the next
/// datum it would yield. `StreamStack` and the preprocessor both carry
/// enough state to do this; the scanner needs it to stamp tokens.
pub(crate) trait CharSource: Source<char, Error> {
    fn position(&mut self) -> Position;
}

impl CharSource for StreamStack {
    fn position(&mut self) -> Position {
        self.make_position()
    }
}
