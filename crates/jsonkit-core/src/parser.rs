//! Recursive-descent JSON parser that allocates straight into a [`Store`].
//!
//! Follows RFC 8259 strictly: no comments, no trailing commas, no leading
//! zeros, no raw control characters inside strings, nothing but whitespace
//! after the root value.
//!
//! # Key design decisions
//!
//! - **Int vs Float**: a number without `.` or exponent becomes `Int`. Integer
//!   literals that overflow `i64` fall back to `Float` rather than failing.
//! - **Duplicate keys**: last write wins, the key keeps its first position.
//!   The overwritten value is detached and freed immediately.
//! - **All or nothing**: every handle allocated during a parse is recorded.
//!   If the parse fails the whole set is reclaimed, so the store's live node
//!   count is exactly what it was before the call.

use crate::error::{JsonError, Result};
use crate::limits::Limits;
use crate::node::NodeData;
use crate::store::{Handle, Store};

/// Parse UTF-8 JSON bytes into the store and return the root handle.
pub(crate) fn parse_into(store: &mut Store, limits: &Limits, input: &[u8]) -> Result<Handle> {
    if input.len() > limits.max_input_bytes {
        return Err(JsonError::parse(
            limits.max_input_bytes,
            format!(
                "input of {} bytes exceeds limit of {} bytes",
                input.len(),
                limits.max_input_bytes
            ),
        ));
    }
    let text = std::str::from_utf8(input)
        .map_err(|e| JsonError::parse(e.valid_up_to(), "invalid UTF-8"))?;

    let mut parser = Parser {
        text,
        bytes: input,
        pos: 0,
        depth: 0,
        max_depth: limits.max_depth,
        store,
        allocated: Vec::new(),
    };
    match parser.parse_document() {
        Ok(root) => {
            tracing::debug!(
                bytes = input.len(),
                nodes = parser.allocated.len(),
                "parsed document"
            );
            Ok(root)
        }
        Err(err) => {
            tracing::debug!(error = %err, "parse failed, reclaiming partial graph");
            let allocated = std::mem::take(&mut parser.allocated);
            parser.store.reclaim(&allocated);
            Err(err)
        }
    }
}

struct Parser<'a, 's> {
    text: &'a str,
    bytes: &'a [u8],
    pos: usize,
    depth: usize,
    max_depth: usize,
    store: &'s mut Store,
    allocated: Vec<Handle>,
}

impl Parser<'_, '_> {
    fn parse_document(&mut self) -> Result<Handle> {
        self.skip_whitespace();
        let root = self.parse_value()?;
        self.skip_whitespace();
        if self.pos != self.bytes.len() {
            return Err(self.error("trailing characters after JSON value"));
        }
        Ok(root)
    }

    fn error(&self, message: impl Into<String>) -> JsonError {
        JsonError::parse(self.pos, message)
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while let Some(b' ' | b'\t' | b'\n' | b'\r') = self.peek() {
            self.pos += 1;
        }
    }

    fn expect(&mut self, byte: u8) -> Result<()> {
        if self.peek() == Some(byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(format!("expected '{}'", byte as char)))
        }
    }

    fn alloc(&mut self, data: NodeData) -> Result<Handle> {
        let handle = self.store.allocate(data)?;
        self.allocated.push(handle);
        Ok(handle)
    }

    fn parse_value(&mut self) -> Result<Handle> {
        match self.peek() {
            None => Err(self.error("unexpected end of input")),
            Some(b'{') => self.parse_object(),
            Some(b'[') => self.parse_array(),
            Some(b'"') => {
                let s = self.parse_string()?;
                self.alloc(NodeData::String(s))
            }
            Some(b't') => self.parse_literal("true", NodeData::Bool(true)),
            Some(b'f') => self.parse_literal("false", NodeData::Bool(false)),
            Some(b'n') => self.parse_literal("null", NodeData::Null),
            Some(b'-' | b'0'..=b'9') => self.parse_number(),
            Some(_) => {
                let ch = self.text[self.pos..].chars().next().unwrap_or('?');
                Err(self.error(format!("unexpected character {ch:?}")))
            }
        }
    }

    fn parse_literal(&mut self, word: &str, data: NodeData) -> Result<Handle> {
        if self.bytes[self.pos..].starts_with(word.as_bytes()) {
            self.pos += word.len();
            self.alloc(data)
        } else {
            Err(self.error(format!("invalid literal, expected `{word}`")))
        }
    }

    fn enter(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(self.error(format!(
                "nesting depth exceeds limit of {}",
                self.max_depth
            )));
        }
        Ok(())
    }

    fn parse_object(&mut self) -> Result<Handle> {
        self.enter()?;
        self.pos += 1; // '{'
        self.skip_whitespace();

        let mut pairs: Vec<(String, Handle)> = Vec::new();
        if self.peek() == Some(b'}') {
            self.pos += 1;
        } else {
            loop {
                if self.peek() != Some(b'"') {
                    return Err(self.error("expected string key"));
                }
                let key = self.parse_string()?;
                self.skip_whitespace();
                self.expect(b':')?;
                self.skip_whitespace();
                let value = self.parse_value()?;
                self.store.consume(value)?;
                match pairs.iter_mut().find(|(k, _)| *k == key) {
                    Some(slot) => {
                        let old = std::mem::replace(&mut slot.1, value);
                        self.store.detach(old);
                    }
                    None => pairs.push((key, value)),
                }
                self.skip_whitespace();
                match self.peek() {
                    Some(b',') => {
                        self.pos += 1;
                        self.skip_whitespace();
                    }
                    Some(b'}') => {
                        self.pos += 1;
                        break;
                    }
                    _ => return Err(self.error("expected ',' or '}' in object")),
                }
            }
        }

        self.depth -= 1;
        self.alloc(NodeData::Object(pairs))
    }

    fn parse_array(&mut self) -> Result<Handle> {
        self.enter()?;
        self.pos += 1; // '['
        self.skip_whitespace();

        let mut items = Vec::new();
        if self.peek() == Some(b']') {
            self.pos += 1;
        } else {
            loop {
                let value = self.parse_value()?;
                self.store.consume(value)?;
                items.push(value);
                self.skip_whitespace();
                match self.peek() {
                    Some(b',') => {
                        self.pos += 1;
                        self.skip_whitespace();
                    }
                    Some(b']') => {
                        self.pos += 1;
                        break;
                    }
                    _ => return Err(self.error("expected ',' or ']' in array")),
                }
            }
        }

        self.depth -= 1;
        self.alloc(NodeData::Array(items))
    }

    /// Parse a quoted string starting at the opening quote.
    fn parse_string(&mut self) -> Result<String> {
        self.pos += 1; // '"'
        let mut out = String::new();
        let mut run_start = self.pos;
        loop {
            let Some(b) = self.peek() else {
                return Err(self.error("unterminated string"));
            };
            match b {
                b'"' => {
                    out.push_str(&self.text[run_start..self.pos]);
                    self.pos += 1;
                    return Ok(out);
                }
                b'\\' => {
                    out.push_str(&self.text[run_start..self.pos]);
                    self.pos += 1;
                    self.parse_escape(&mut out)?;
                    run_start = self.pos;
                }
                0x00..=0x1f => {
                    return Err(self.error("unescaped control character in string"));
                }
                _ => self.pos += 1,
            }
        }
    }

    /// Decode one escape sequence; `pos` is just past the backslash.
    fn parse_escape(&mut self, out: &mut String) -> Result<()> {
        let Some(b) = self.peek() else {
            return Err(self.error("unterminated escape sequence"));
        };
        self.pos += 1;
        match b {
            b'"' => out.push('"'),
            b'\\' => out.push('\\'),
            b'/' => out.push('/'),
            b'b' => out.push('\u{0008}'),
            b'f' => out.push('\u{000C}'),
            b'n' => out.push('\n'),
            b'r' => out.push('\r'),
            b't' => out.push('\t'),
            b'u' => {
                let escape_start = self.pos - 2;
                let first = self.parse_hex4()?;
                let code = match first {
                    0xD800..=0xDBFF => {
                        if !self.bytes[self.pos..].starts_with(b"\\u") {
                            return Err(JsonError::parse(escape_start, "unpaired surrogate"));
                        }
                        self.pos += 2;
                        let second = self.parse_hex4()?;
                        if !(0xDC00..=0xDFFF).contains(&second) {
                            return Err(JsonError::parse(escape_start, "unpaired surrogate"));
                        }
                        0x10000 + ((first - 0xD800) << 10) + (second - 0xDC00)
                    }
                    0xDC00..=0xDFFF => {
                        return Err(JsonError::parse(escape_start, "unpaired surrogate"));
                    }
                    _ => first,
                };
                let ch = char::from_u32(code)
                    .ok_or_else(|| JsonError::parse(escape_start, "invalid unicode escape"))?;
                out.push(ch);
            }
            _ => {
                self.pos -= 1;
                return Err(self.error("invalid escape sequence"));
            }
        }
        Ok(())
    }

    fn parse_hex4(&mut self) -> Result<u32> {
        let digits = self
            .bytes
            .get(self.pos..self.pos + 4)
            .ok_or_else(|| self.error("truncated unicode escape"))?;
        let mut code = 0u32;
        for &d in digits {
            let v = (d as char)
                .to_digit(16)
                .ok_or_else(|| self.error("invalid hex digit in unicode escape"))?;
            code = code * 16 + v;
        }
        self.pos += 4;
        Ok(code)
    }

    fn parse_number(&mut self) -> Result<Handle> {
        let start = self.pos;
        if self.peek() == Some(b'-') {
            self.pos += 1;
        }
        match self.peek() {
            Some(b'0') => {
                self.pos += 1;
                if matches!(self.peek(), Some(b'0'..=b'9')) {
                    return Err(self.error("leading zeros are not allowed"));
                }
            }
            Some(b'1'..=b'9') => self.skip_digits(),
            _ => return Err(self.error("expected digit")),
        }

        let mut is_float = false;
        if self.peek() == Some(b'.') {
            is_float = true;
            self.pos += 1;
            if !matches!(self.peek(), Some(b'0'..=b'9')) {
                return Err(self.error("expected digit after decimal point"));
            }
            self.skip_digits();
        }
        if let Some(b'e' | b'E') = self.peek() {
            is_float = true;
            self.pos += 1;
            if let Some(b'+' | b'-') = self.peek() {
                self.pos += 1;
            }
            if !matches!(self.peek(), Some(b'0'..=b'9')) {
                return Err(self.error("expected digit in exponent"));
            }
            self.skip_digits();
        }

        let lexeme = &self.text[start..self.pos];
        if !is_float {
            if let Ok(i) = lexeme.parse::<i64>() {
                return self.alloc(NodeData::Int(i));
            }
        }
        match lexeme.parse::<f64>() {
            Ok(f) if f.is_finite() => self.alloc(NodeData::Float(f)),
            _ => Err(JsonError::parse(start, "number out of range")),
        }
    }

    fn skip_digits(&mut self) {
        while let Some(b'0'..=b'9') = self.peek() {
            self.pos += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> (Store, Result<Handle>) {
        let mut store = Store::new(usize::MAX);
        let result = parse_into(&mut store, &Limits::default(), text.as_bytes());
        (store, result)
    }

    fn offset_of(result: Result<Handle>) -> usize {
        match result {
            Err(JsonError::Parse { offset, .. }) => offset,
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn int_float_split() {
        let (store, h) = parse("[1, -0, 1.0, 2e3, 9223372036854775808]");
        let h = h.unwrap();
        let kinds: Vec<_> = store
            .resolve(h)
            .unwrap()
            .children()
            .into_iter()
            .map(|c| store.resolve(c).unwrap().clone())
            .collect();
        assert_eq!(kinds[0], NodeData::Int(1));
        assert_eq!(kinds[1], NodeData::Int(0));
        assert_eq!(kinds[2], NodeData::Float(1.0));
        assert_eq!(kinds[3], NodeData::Float(2000.0));
        assert_eq!(kinds[4], NodeData::Float(9223372036854775808.0));
    }

    #[test]
    fn surrogate_pair_decodes() {
        let (store, h) = parse(r#""\ud83d\ude00 \u00e9""#);
        assert_eq!(
            store.resolve(h.unwrap()).unwrap(),
            &NodeData::String("\u{1F600} \u{e9}".to_string())
        );
    }

    #[test]
    fn error_offsets() {
        assert_eq!(offset_of(parse("{invalid").1), 1);
        assert_eq!(offset_of(parse("[1,]").1), 3);
        assert_eq!(offset_of(parse("01").1), 1);
        assert_eq!(offset_of(parse("true false").1), 5);
        assert_eq!(offset_of(parse(r#""\ud800x""#).1), 1);
        assert_eq!(offset_of(parse("").1), 0);
    }

    #[test]
    fn failed_parse_leaves_store_empty() {
        let (store, result) = parse(r#"{"a":[1,2,{"b":"c"}],"d":tru}"#);
        assert!(result.is_err());
        assert_eq!(store.live_nodes(), 0);
    }

    #[test]
    fn depth_limit() {
        let mut store = Store::new(usize::MAX);
        let limits = Limits {
            max_depth: 3,
            ..Limits::default()
        };
        assert!(parse_into(&mut store, &limits, b"[[[1]]]").is_ok());
        let err = parse_into(&mut store, &limits, b"[[[[1]]]]").unwrap_err();
        assert_eq!(
            err,
            JsonError::Parse {
                offset: 3,
                message: "nesting depth exceeds limit of 3".to_string()
            }
        );
    }

    #[test]
    fn invalid_utf8_reports_offset() {
        let mut store = Store::new(usize::MAX);
        let err = parse_into(&mut store, &Limits::default(), b"\"ab\xff\"").unwrap_err();
        assert!(matches!(err, JsonError::Parse { offset: 3, .. }));
    }
}
