//! A reader/writer for the Arma 3 config dialect (`.hpp`/`.cpp`/`.ext`):
//! preprocessor, tokenizer, recursive-descent parser, config tree, and
//! encoder.
//!
//! See `DESIGN.md` in the repository root for how each module here is
//! grounded in the project this crate started from.

mod encoder;
mod error;
mod parser;
mod preprocessor;
mod scanner;
mod source;
mod token;
mod tree;
mod value;

use std::io::Read;
use std::path::Path;

pub use encoder::{DumpInput, DumpOptions};
pub use error::{Error, Position, Result};
pub use source::FileOpener;
pub use tree::{ChildRef, Class, ClassId, Tree};
pub use value::Value;

use preprocessor::Preprocessor;
use scanner::Scanner;
use source::StreamStack;

/// Options for `load_str`/`load_path`/`load_reader` (§6).
pub struct LoadOptions {
    /// Emit preprocessed comments as a single space rather than eliding
    /// them entirely (§4.2).
    pub include_comments: bool,
    /// Run the text through the preprocessor at all. When `false`, the
    /// scanner reads the stream stack directly — `#define`/`#include`/
    /// conditionals are not recognised and `#` is just `UNSPECIFIED`.
    pub preprocess: bool,
    /// Host-supplied `#include` path opener. Defaults to
    /// `std::fs::File::open`.
    pub file_opener: Option<FileOpener>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        LoadOptions {
            include_comments: false,
            preprocess: true,
            file_opener: None,
        }
    }
}

/// Parses an in-memory string under the anonymous unit name.
pub fn load_str(unit_name: &str, text: &str, opts: &LoadOptions) -> Result<Tree> {
    let mut stream = StreamStack::new();
    stream.push_str(unit_name, text);
    load_from_stream(unit_name, stream, opts)
}

/// Parses the file at `path`, opened via `opts.file_opener` (or
/// `std::fs::File::open` by default).
pub fn load_path<P: AsRef<Path>>(path: P, opts: &LoadOptions) -> Result<Tree> {
    let path = path.as_ref();
    let opener = opts
        .file_opener
        .clone()
        .unwrap_or_else(source::default_file_opener);
    let mut stream = StreamStack::new();
    stream.push_path(path, &opener)?;
    let unit_name = path.display().to_string();
    load_from_stream(&unit_name, stream, opts)
}

/// Parses an already-open reader under the given unit name.
pub fn load_reader(unit_name: &str, reader: Box<dyn Read>, opts: &LoadOptions) -> Result<Tree> {
    let mut stream = StreamStack::new();
    stream.push_reader(unit_name, reader, None)?;
    load_from_stream(unit_name, stream, opts)
}

fn load_from_stream(unit_name: &str, mut stream: StreamStack, opts: &LoadOptions) -> Result<Tree> {
    let nodes = if opts.preprocess {
        let opener = opts
            .file_opener
            .clone()
            .unwrap_or_else(source::default_file_opener);
        let mut pp = Preprocessor::new(stream, opts.include_comments, opener);
        let mut scanner = Scanner::new(&mut pp);
        parser::parse(&mut scanner)?
    } else {
        let mut scanner = Scanner::new(&mut stream);
        parser::parse(&mut scanner)?
    };

    tree::Tree::decode(unit_name, nodes)
}

/// Re-exported for convenience dumping; see `encoder::dump`.
pub fn dump(input: &DumpInput<'_>, opts: &DumpOptions) -> Result<String> {
    encoder::dump(input, opts)
}

/// Streams the encoded fragments into `writer`; see `encoder::dump_to`.
pub fn dump_to<W: std::io::Write>(input: &DumpInput<'_>, opts: &DumpOptions, writer: W) -> Result<()> {
    encoder::dump_to(input, opts, writer)
}
