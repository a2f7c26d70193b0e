//! The encoder (§4.6): walks a config tree (or coerces a plain mapping
//! into one) and emits canonical text with optional indentation.

use std::borrow::Cow;
use std::io::Write;

use crate::error::Error;
use crate::tree::{ChildRef, Class, Tree};
use crate::value::Value;

pub struct DumpOptions {
    pub indent: Option<u32>,
    pub include_self: bool,
}

impl Default for DumpOptions {
    fn default() -> Self {
        DumpOptions {
            indent: None,
            include_self: false,
        }
    }
}

pub enum DumpInput<'a> {
    Tree(&'a Tree),
    Mapping(&'a Value),
}

/// Encodes `input` into a sequence of string fragments suitable for
/// concatenation (`dump`) or streaming (`dump_to`).
pub fn encode(input: &DumpInput<'_>, opts: &DumpOptions) -> Result<Vec<Cow<'static, str>>, Error> {
    let owned_tree;
    let tree: &Tree = match input {
        DumpInput::Tree(t) => t,
        DumpInput::Mapping(value) => {
            owned_tree = Tree::from_mapping("root", value)?;
            &owned_tree
        }
    };

    let mut out = Vec::new();
    if opts.include_self {
        encode_class(tree.root(), 0, opts.indent, &mut out)?;
    } else {
        encode_body(tree.root(), 0, opts.indent, &mut out)?;
    }
    Ok(out)
}

pub fn dump(input: &DumpInput<'_>, opts: &DumpOptions) -> Result<String, Error> {
    Ok(encode(input, opts)?.concat())
}

pub fn dump_to<W: Write>(input: &DumpInput<'_>, opts: &DumpOptions, mut writer: W) -> Result<(), Error> {
    for frag in encode(input, opts)? {
        writer
            .write_all(frag.as_bytes())
            .map_err(|e| Error::Io("<writer>".to_string(), e))?;
    }
    Ok(())
}

fn push_indent(out: &mut Vec<Cow<'static, str>>, indent: Option<u32>, depth: u32) {
    if let Some(n) = indent {
        out.push(Cow::Owned(format!("\n{}", " ".repeat((n * depth) as usize))));
    }
}

fn encode_body(
    class: Class<'_>,
    depth: u32,
    indent: Option<u32>,
    out: &mut Vec<Cow<'static, str>>,
) -> Result<(), Error> {
    for (name, child) in class.own_entries() {
        push_indent(out, indent, depth);
        match child {
            ChildRef::Class(cid) => encode_class(class.tree().class(cid), depth, indent, out)?,
            ChildRef::Value(v) => encode_property(name, v, depth, indent, out)?,
        }
    }
    Ok(())
}

fn encode_class(
    class: Class<'_>,
    depth: u32,
    indent: Option<u32>,
    out: &mut Vec<Cow<'static, str>>,
) -> Result<(), Error> {
    out.push(Cow::Borrowed("class "));
    out.push(Cow::Owned(class.name().to_string()));
    if let Some(base) = class.inherits_name() {
        out.push(Cow::Borrowed(" : "));
        out.push(Cow::Owned(base.to_string()));
    }
    out.push(Cow::Borrowed(" {"));
    encode_body(class, depth + 1, indent, out)?;
    push_indent(out, indent, depth);
    out.push(Cow::Borrowed("};"));
    Ok(())
}

fn encode_property(
    name: &str,
    value: &Value,
    depth: u32,
    indent: Option<u32>,
    out: &mut Vec<Cow<'static, str>>,
) -> Result<(), Error> {
    out.push(Cow::Owned(name.to_string()));
    if matches!(value, Value::List(_)) {
        out.push(Cow::Borrowed("[]"));
    }
    out.push(Cow::Borrowed(" = "));
    encode_value(value, depth, indent, out)?;
    out.push(Cow::Borrowed(";"));
    Ok(())
}

fn encode_value(
    value: &Value,
    depth: u32,
    indent: Option<u32>,
    out: &mut Vec<Cow<'static, str>>,
) -> Result<(), Error> {
    match value {
        Value::String(s) => {
            out.push(Cow::Borrowed("\""));
            out.push(Cow::Owned(s.replace('"', "\"\"")));
            out.push(Cow::Borrowed("\""));
        }
        Value::Int(n) => out.push(Cow::Owned(n.to_string())),
        Value::Float(f) => out.push(Cow::Owned(f.to_string())),
        // Asymmetric on purpose (§9 open question): the decoder only
        // recognises the words `true`/`false`, but encoding always
        // emits `1`/`0`.
        Value::Bool(b) => out.push(Cow::Borrowed(if *b { "1" } else { "0" })),
        Value::List(items) => encode_list(items, depth, indent, out)?,
        Value::Map(_) => {
            return Err(Error::NotAMapping(
                "a nested map where a scalar or list value was expected".to_string(),
            ))
        }
    }
    Ok(())
}

fn encode_list(
    items: &[Value],
    depth: u32,
    indent: Option<u32>,
    out: &mut Vec<Cow<'static, str>>,
) -> Result<(), Error> {
    out.push(Cow::Borrowed("{"));
    let last = items.len().saturating_sub(1);
    for (i, item) in items.iter().enumerate() {
        push_indent(out, indent, depth + 1);
        encode_value(item, depth + 1, indent, out)?;
        if i != last {
            out.push(Cow::Borrowed(","));
        }
    }
    if !items.is_empty() {
        push_indent(out, indent, depth);
    }
    out.push(Cow::Borrowed("}"));
    Ok(())
}
