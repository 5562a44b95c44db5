//! Serializer: renders a node graph back into JSON text.
//!
//! Output is compact by default (no insignificant whitespace). Objects keep
//! their stored insertion order, so rendering is deterministic. The walk uses
//! an explicit task stack: builder-made graphs are not bound by the parser's
//! depth limit, and a deep chain must not overflow the call stack.
//!
//! # Number formatting
//!
//! - `Int` renders as plain decimal.
//! - `Float` renders in the shortest form that parses back to the same `f64`,
//!   and always contains a `.` or an exponent (`1.0`, `1e300`) so the value
//!   comes back as a `Float` when re-parsed.
//! - Non-finite floats have no JSON spelling and render as `null`.
//!
//! # Bounded output
//!
//! Hosts with C-style buffers call [`Document::stringify_into`] or
//! [`Document::stringify`] with a capacity. At most `capacity - 1` content bytes
//! are produced (room for a terminator), always cut on a UTF-8 character
//! boundary, and the full length is reported alongside so truncation is
//! detectable.
//!
//! [`Document::stringify_into`]: crate::Document::stringify_into
//! [`Document::stringify`]: crate::Document::stringify

use crate::error::Result;
use crate::node::NodeData;
use crate::store::{Handle, Store};
use std::fmt::Write as _;

/// Result of a capacity-bounded [`Document::stringify`](crate::Document::stringify).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stringified {
    /// Rendered text, possibly truncated.
    pub text: String,
    /// Length in bytes of the complete rendering.
    pub required: usize,
}

impl Stringified {
    pub fn is_truncated(&self) -> bool {
        self.text.len() < self.required
    }
}

/// Outcome of [`Document::stringify_into`](crate::Document::stringify_into).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteStatus {
    /// Content bytes written, not counting the terminator.
    pub written: usize,
    /// Content bytes the complete rendering needs.
    pub required: usize,
}

impl WriteStatus {
    pub fn is_truncated(&self) -> bool {
        self.written < self.required
    }
}

/// Rendering style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    Compact,
    /// Newline after every element, `indent` spaces per level.
    Pretty { indent: usize },
}

enum Task<'s> {
    Value { handle: Handle, depth: usize },
    Key(&'s str),
    Text(&'static str),
    Newline(usize),
}

/// Render `root` and everything below it.
pub(crate) fn render(store: &Store, root: Handle, style: Style) -> Result<String> {
    let mut out = String::new();
    let mut tasks = vec![Task::Value {
        handle: root,
        depth: 0,
    }];
    let indent = match style {
        Style::Compact => None,
        Style::Pretty { indent } => Some(indent),
    };
    let colon = if indent.is_some() { ": " } else { ":" };

    while let Some(task) = tasks.pop() {
        match task {
            Task::Text(t) => out.push_str(t),
            Task::Key(k) => {
                write_escaped(k, &mut out);
                out.push_str(colon);
            }
            Task::Newline(depth) => {
                if let Some(width) = indent {
                    out.push('\n');
                    out.extend(std::iter::repeat_n(' ', width * depth));
                }
            }
            Task::Value { handle, depth } => match store.resolve(handle)? {
                NodeData::Null => out.push_str("null"),
                NodeData::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
                NodeData::Int(i) => {
                    let _ = write!(out, "{i}");
                }
                NodeData::Float(f) => write_float(*f, &mut out),
                NodeData::String(s) => write_escaped(s, &mut out),
                NodeData::Array(items) if items.is_empty() => out.push_str("[]"),
                NodeData::Object(pairs) if pairs.is_empty() => out.push_str("{}"),
                NodeData::Array(items) => {
                    out.push('[');
                    tasks.push(Task::Text("]"));
                    tasks.push(Task::Newline(depth));
                    for (i, &item) in items.iter().enumerate().rev() {
                        tasks.push(Task::Value {
                            handle: item,
                            depth: depth + 1,
                        });
                        tasks.push(Task::Newline(depth + 1));
                        if i > 0 {
                            tasks.push(Task::Text(","));
                        }
                    }
                }
                NodeData::Object(pairs) => {
                    out.push('{');
                    tasks.push(Task::Text("}"));
                    tasks.push(Task::Newline(depth));
                    for (i, (key, value)) in pairs.iter().enumerate().rev() {
                        tasks.push(Task::Value {
                            handle: *value,
                            depth: depth + 1,
                        });
                        tasks.push(Task::Key(key));
                        tasks.push(Task::Newline(depth + 1));
                        if i > 0 {
                            tasks.push(Task::Text(","));
                        }
                    }
                }
            },
        }
    }
    Ok(out)
}

fn write_float(f: f64, out: &mut String) {
    if !f.is_finite() {
        out.push_str("null");
        return;
    }
    // Debug formatting is shortest-roundtrip and keeps a `.0` or exponent.
    let _ = write!(out, "{f:?}");
}

/// Emit `s` as a quoted JSON string.
fn write_escaped(s: &str, out: &mut String) {
    out.push('"');
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{0008}' => out.push_str("\\b"),
            '\u{000C}' => out.push_str("\\f"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

/// Longest prefix of `s` that fits in `max` bytes without splitting a char.
pub(crate) fn fit_prefix(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

pub(crate) fn bounded(full: String, capacity: usize) -> Stringified {
    let required = full.len();
    let keep = fit_prefix(&full, capacity.saturating_sub(1)).len();
    let mut text = full;
    text.truncate(keep);
    Stringified { text, required }
}

pub(crate) fn copy_into(full: &str, buf: &mut [u8]) -> WriteStatus {
    let prefix = fit_prefix(full, buf.len().saturating_sub(1));
    let written = prefix.len();
    buf[..written].copy_from_slice(prefix.as_bytes());
    if let Some(terminator) = buf.get_mut(written) {
        *terminator = 0;
    }
    WriteStatus {
        written,
        required: full.len(),
    }
}
