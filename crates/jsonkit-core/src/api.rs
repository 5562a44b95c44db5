//! Builder/accessor surface of the engine.
//!
//! [`Document`] owns a [`Store`] plus its [`Limits`] and exposes every
//! operation a host calls: parsing and rendering, leaf and container builders,
//! keyed and indexed access, consuming merges, and lifetime control.
//!
//! Operations that *consume* a handle (`make_object`, `make_array`,
//! `set_object`, `array_push`, `append`) take over one caller reference. After
//! the call the caller must not use that handle again unless it holds another
//! reference (from `retain` or a getter); doing so fails with
//! `JsonError::InvalidHandle`. Every operation validates its inputs before
//! changing anything, so a failed call leaves the store untouched.

use crate::error::{JsonError, Result};
use crate::limits::Limits;
use crate::node::{Kind, NodeData, Value};
use crate::parser;
use crate::serializer::{self, Stringified, Style, WriteStatus};
use crate::store::{Handle, Store};

/// A JSON document store: the unit a host keeps per execution context.
#[derive(Debug)]
pub struct Document {
    store: Store,
    limits: Limits,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self::with_limits(Limits::default())
    }

    pub fn with_limits(limits: Limits) -> Self {
        Self {
            store: Store::new(limits.max_nodes),
            limits,
        }
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Direct access to the underlying store for hosts that manage lifetimes
    /// themselves.
    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut Store {
        &mut self.store
    }

    // ------------------------------------------------------------------
    // Text boundary
    // ------------------------------------------------------------------

    /// Parse JSON text into a new root node.
    pub fn parse(&mut self, text: &str) -> Result<Handle> {
        parser::parse_into(&mut self.store, &self.limits, text.as_bytes())
    }

    /// Parse JSON from raw bytes, validating UTF-8.
    pub fn parse_bytes(&mut self, bytes: &[u8]) -> Result<Handle> {
        parser::parse_into(&mut self.store, &self.limits, bytes)
    }

    /// Render `node` as compact JSON.
    pub fn to_json_string(&self, node: Handle) -> Result<String> {
        self.store.resolve_owned(node)?;
        serializer::render(&self.store, node, Style::Compact)
    }

    /// Render `node` with newlines and `indent` spaces per nesting level.
    pub fn to_json_pretty(&self, node: Handle, indent: usize) -> Result<String> {
        self.store.resolve_owned(node)?;
        serializer::render(&self.store, node, Style::Pretty { indent })
    }

    /// Render `node` into at most `capacity - 1` bytes, reporting the full
    /// length so truncation can be detected.
    pub fn stringify(&self, node: Handle, capacity: usize) -> Result<Stringified> {
        let full = self.to_json_string(node)?;
        Ok(serializer::bounded(full, capacity))
    }

    /// Render `node` into a caller buffer followed by a NUL terminator.
    pub fn stringify_into(&self, node: Handle, buf: &mut [u8]) -> Result<WriteStatus> {
        let full = self.to_json_string(node)?;
        Ok(serializer::copy_into(&full, buf))
    }

    // ------------------------------------------------------------------
    // Builders
    // ------------------------------------------------------------------

    pub fn make_null(&mut self) -> Result<Handle> {
        self.store.allocate(NodeData::Null)
    }

    pub fn make_int(&mut self, value: i64) -> Result<Handle> {
        self.store.allocate(NodeData::Int(value))
    }

    pub fn make_float(&mut self, value: f64) -> Result<Handle> {
        self.store.allocate(NodeData::Float(value))
    }

    pub fn make_bool(&mut self, value: bool) -> Result<Handle> {
        self.store.allocate(NodeData::Bool(value))
    }

    pub fn make_string(&mut self, value: impl Into<String>) -> Result<Handle> {
        self.store.allocate(NodeData::String(value.into()))
    }

    /// Build an object from ordered pairs, consuming every value.
    ///
    /// A repeated key keeps the position of its first occurrence and the
    /// value of its last; earlier values for that key are released.
    pub fn make_object<K: AsRef<str>>(&mut self, pairs: &[(K, Handle)]) -> Result<Handle> {
        let values: Vec<Handle> = pairs.iter().map(|(_, h)| *h).collect();
        self.store.check_consumable(&values)?;
        self.ensure_capacity(1)?;

        let mut entries: Vec<(String, Handle)> = Vec::with_capacity(pairs.len());
        let mut replaced = Vec::new();
        for (key, value) in pairs {
            self.store.consume(*value)?;
            let key = key.as_ref();
            match entries.iter_mut().find(|(k, _)| k == key) {
                Some(entry) => replaced.push(std::mem::replace(&mut entry.1, *value)),
                None => entries.push((key.to_string(), *value)),
            }
        }
        let object = self.store.allocate(NodeData::Object(entries))?;
        for old in replaced {
            self.store.detach(old);
        }
        Ok(object)
    }

    /// Build an array, consuming every value in order.
    pub fn make_array(&mut self, values: &[Handle]) -> Result<Handle> {
        self.store.check_consumable(values)?;
        self.ensure_capacity(1)?;
        for value in values {
            self.store.consume(*value)?;
        }
        self.store.allocate(NodeData::Array(values.to_vec()))
    }

    /// Copy an owned tree into the store and return its root.
    pub fn import(&mut self, value: &Value) -> Result<Handle> {
        self.ensure_capacity(count_values(value))?;

        let mut steps = vec![ImportStep::Visit(value)];
        let mut built: Vec<Handle> = Vec::new();
        while let Some(step) = steps.pop() {
            match step {
                ImportStep::Visit(value) => {
                    let data = match value {
                        Value::Null => NodeData::Null,
                        Value::Bool(b) => NodeData::Bool(*b),
                        Value::Int(i) => NodeData::Int(*i),
                        Value::Float(f) => NodeData::Float(*f),
                        Value::String(s) => NodeData::String(s.clone()),
                        Value::Array(items) => {
                            steps.push(ImportStep::Array(items.len()));
                            steps.extend(items.iter().rev().map(ImportStep::Visit));
                            continue;
                        }
                        Value::Object(pairs) => {
                            steps.push(ImportStep::Object(pairs.as_slice()));
                            steps.extend(pairs.iter().rev().map(|(_, v)| ImportStep::Visit(v)));
                            continue;
                        }
                    };
                    built.push(self.store.allocate(data)?);
                }
                ImportStep::Array(len) => {
                    let items = built.split_off(built.len() - len);
                    for item in &items {
                        self.store.consume(*item)?;
                    }
                    built.push(self.store.allocate(NodeData::Array(items))?);
                }
                ImportStep::Object(pairs) => {
                    let values = built.split_off(built.len() - pairs.len());
                    let mut entries: Vec<(String, Handle)> = Vec::with_capacity(pairs.len());
                    for ((key, _), h) in pairs.iter().zip(values) {
                        self.store.consume(h)?;
                        match entries.iter_mut().find(|(k, _)| k == key) {
                            Some(entry) => {
                                let old = std::mem::replace(&mut entry.1, h);
                                self.store.detach(old);
                            }
                            None => entries.push((key.clone(), h)),
                        }
                    }
                    built.push(self.store.allocate(NodeData::Object(entries))?);
                }
            }
        }
        built
            .pop()
            .ok_or_else(|| JsonError::Resource("import produced no node".to_string()))
    }

    /// Copy the subtree under `node` out of the store.
    pub fn export(&self, node: Handle) -> Result<Value> {
        self.store.resolve_owned(node)?;

        let mut steps = vec![ExportStep::Visit(node)];
        let mut built: Vec<Value> = Vec::new();
        while let Some(step) = steps.pop() {
            match step {
                ExportStep::Visit(handle) => match self.store.resolve(handle)? {
                    NodeData::Null => built.push(Value::Null),
                    NodeData::Bool(b) => built.push(Value::Bool(*b)),
                    NodeData::Int(i) => built.push(Value::Int(*i)),
                    NodeData::Float(f) => built.push(Value::Float(*f)),
                    NodeData::String(s) => built.push(Value::String(s.clone())),
                    NodeData::Array(items) => {
                        steps.push(ExportStep::Array(items.len()));
                        steps.extend(items.iter().rev().map(|h| ExportStep::Visit(*h)));
                    }
                    NodeData::Object(pairs) => {
                        steps.push(ExportStep::Object(
                            pairs.iter().map(|(k, _)| k.clone()).collect(),
                        ));
                        steps.extend(pairs.iter().rev().map(|(_, h)| ExportStep::Visit(*h)));
                    }
                },
                ExportStep::Array(len) => {
                    let items = built.split_off(built.len() - len);
                    built.push(Value::Array(items));
                }
                ExportStep::Object(keys) => {
                    let values = built.split_off(built.len() - keys.len());
                    built.push(Value::Object(keys.into_iter().zip(values).collect()));
                }
            }
        }
        built.pop().ok_or(JsonError::InvalidHandle(node))
    }

    /// Structural equality of two subtrees.
    pub fn deep_eq(&self, a: Handle, b: Handle) -> Result<bool> {
        self.store.resolve_owned(a)?;
        self.store.resolve_owned(b)?;
        let mut pending = vec![(a, b)];
        while let Some((x, y)) = pending.pop() {
            if x == y {
                self.store.resolve(x)?;
                continue;
            }
            match (self.store.resolve(x)?, self.store.resolve(y)?) {
                (NodeData::Array(xs), NodeData::Array(ys)) => {
                    if xs.len() != ys.len() {
                        return Ok(false);
                    }
                    pending.extend(xs.iter().copied().zip(ys.iter().copied()));
                }
                (NodeData::Object(xs), NodeData::Object(ys)) => {
                    if xs.len() != ys.len() {
                        return Ok(false);
                    }
                    for ((kx, hx), (ky, hy)) in xs.iter().zip(ys) {
                        if kx != ky {
                            return Ok(false);
                        }
                        pending.push((*hx, *hy));
                    }
                }
                (dx, dy) => {
                    if dx != dy {
                        return Ok(false);
                    }
                }
            }
        }
        Ok(true)
    }

    /// Merge two containers of the same kind into a new node, consuming both.
    ///
    /// Objects: `a`'s pairs in order, then `b`'s new keys in `b`'s order; on a
    /// key collision `b`'s value replaces `a`'s in place. Arrays: `a`'s items
    /// followed by `b`'s.
    pub fn append(&mut self, a: Handle, b: Handle) -> Result<Handle> {
        self.store.check_consumable(&[a, b])?;
        let kind_a = self.store.kind(a)?;
        let kind_b = self.store.kind(b)?;
        if !kind_a.is_container() {
            return Err(JsonError::mismatch("object or array", kind_a));
        }
        if kind_b != kind_a {
            return Err(JsonError::mismatch(kind_a.as_str(), kind_b));
        }
        self.ensure_capacity(1)?;

        let merged = match (self.store.resolve(a)?, self.store.resolve(b)?) {
            (NodeData::Array(xs), NodeData::Array(ys)) => {
                NodeData::Array(xs.iter().chain(ys).copied().collect())
            }
            (NodeData::Object(xs), NodeData::Object(ys)) => {
                let mut entries = xs.clone();
                for (key, value) in ys {
                    match entries.iter_mut().find(|(k, _)| k == key) {
                        Some(entry) => entry.1 = *value,
                        None => entries.push((key.clone(), *value)),
                    }
                }
                NodeData::Object(entries)
            }
            (_, other) => return Err(JsonError::mismatch(kind_a.as_str(), other.kind())),
        };

        for child in merged.children() {
            self.store.attach(child)?;
        }
        let result = self.store.allocate(merged)?;
        self.store.release(a)?;
        self.store.release(b)?;
        tracing::debug!(a = %a, b = %b, result = %result, kind = %kind_a, "appended containers");
        Ok(result)
    }

    // ------------------------------------------------------------------
    // Object accessors
    // ------------------------------------------------------------------

    fn object(&self, node: Handle) -> Result<&[(String, Handle)]> {
        match self.store.resolve_owned(node)? {
            NodeData::Object(pairs) => Ok(pairs.as_slice()),
            other => Err(JsonError::mismatch("object", other.kind())),
        }
    }

    fn field(&self, node: Handle, key: &str) -> Result<Handle> {
        self.object(node)?
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, h)| *h)
            .ok_or_else(|| JsonError::KeyNotFound(key.to_string()))
    }

    /// Insert or replace `key` with an already-consumed child.
    fn put_field(&mut self, node: Handle, key: &str, child: Handle) -> Result<()> {
        let previous = match self.store.resolve_owned_mut(node)? {
            NodeData::Object(pairs) => match pairs.iter_mut().find(|(k, _)| k == key) {
                Some(entry) => Some(std::mem::replace(&mut entry.1, child)),
                None => {
                    pairs.push((key.to_string(), child));
                    None
                }
            },
            other => return Err(JsonError::mismatch("object", other.kind())),
        };
        if let Some(old) = previous {
            self.store.detach(old);
        }
        Ok(())
    }

    fn set_leaf(&mut self, node: Handle, key: &str, data: NodeData) -> Result<()> {
        self.object(node)?;
        let child = self.store.allocate(data)?;
        self.store.consume(child)?;
        self.put_field(node, key, child)
    }

    /// Attach `value` under `key`, consuming it. A replaced child is released.
    pub fn set_object(&mut self, node: Handle, key: &str, value: Handle) -> Result<()> {
        self.object(node)?;
        self.store.check_consumable(&[value])?;
        if self.store.reaches(value, node) {
            return Err(JsonError::Cycle);
        }
        self.store.consume(value)?;
        self.put_field(node, key, value)
    }

    pub fn set_int(&mut self, node: Handle, key: &str, value: i64) -> Result<()> {
        self.set_leaf(node, key, NodeData::Int(value))
    }

    pub fn set_float(&mut self, node: Handle, key: &str, value: f64) -> Result<()> {
        self.set_leaf(node, key, NodeData::Float(value))
    }

    pub fn set_bool(&mut self, node: Handle, key: &str, value: bool) -> Result<()> {
        self.set_leaf(node, key, NodeData::Bool(value))
    }

    pub fn set_string(&mut self, node: Handle, key: &str, value: impl Into<String>) -> Result<()> {
        self.set_leaf(node, key, NodeData::String(value.into()))
    }

    pub fn set_null(&mut self, node: Handle, key: &str) -> Result<()> {
        self.set_leaf(node, key, NodeData::Null)
    }

    /// Remove `key`, releasing its child. Returns whether the key existed.
    pub fn remove_field(&mut self, node: Handle, key: &str) -> Result<bool> {
        let removed = match self.store.resolve_owned_mut(node)? {
            NodeData::Object(pairs) => pairs
                .iter()
                .position(|(k, _)| k == key)
                .map(|i| pairs.remove(i).1),
            other => return Err(JsonError::mismatch("object", other.kind())),
        };
        match removed {
            Some(child) => {
                self.store.detach(child);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// New caller reference to the child under `key`.
    pub fn get_object(&mut self, node: Handle, key: &str) -> Result<Handle> {
        let child = self.field(node, key)?;
        self.store.share(child)
    }

    pub fn get_int(&self, node: Handle, key: &str) -> Result<i64> {
        int_of(self.store.resolve(self.field(node, key)?)?)
    }

    pub fn get_float(&self, node: Handle, key: &str) -> Result<f64> {
        float_of(self.store.resolve(self.field(node, key)?)?)
    }

    pub fn get_bool(&self, node: Handle, key: &str) -> Result<bool> {
        bool_of(self.store.resolve(self.field(node, key)?)?)
    }

    pub fn get_string(&self, node: Handle, key: &str) -> Result<String> {
        string_of(self.store.resolve(self.field(node, key)?)?)
    }

    pub fn has_field(&self, node: Handle, key: &str) -> Result<bool> {
        Ok(self.object(node)?.iter().any(|(k, _)| k == key))
    }

    /// Keys in insertion order.
    pub fn object_keys(&self, node: Handle) -> Result<Vec<String>> {
        Ok(self.object(node)?.iter().map(|(k, _)| k.clone()).collect())
    }

    pub fn object_len(&self, node: Handle) -> Result<usize> {
        Ok(self.object(node)?.len())
    }

    // ------------------------------------------------------------------
    // Array accessors
    // ------------------------------------------------------------------

    fn array(&self, node: Handle) -> Result<&[Handle]> {
        match self.store.resolve_owned(node)? {
            NodeData::Array(items) => Ok(items.as_slice()),
            other => Err(JsonError::mismatch("array", other.kind())),
        }
    }

    pub fn array_length(&self, node: Handle) -> Result<usize> {
        Ok(self.array(node)?.len())
    }

    /// New caller reference to the element at `index`.
    pub fn array_element(&mut self, node: Handle, index: i64) -> Result<Handle> {
        let items = self.array(node)?;
        let child = usize::try_from(index)
            .ok()
            .and_then(|i| items.get(i).copied())
            .ok_or(JsonError::IndexOutOfRange {
                index,
                len: items.len(),
            })?;
        self.store.share(child)
    }

    /// Alias of [`Document::array_element`] under the host-facing name.
    pub fn array_object(&mut self, node: Handle, index: i64) -> Result<Handle> {
        self.array_element(node, index)
    }

    /// Append `value` to an array, consuming it.
    pub fn array_push(&mut self, node: Handle, value: Handle) -> Result<()> {
        self.array(node)?;
        self.store.check_consumable(&[value])?;
        if self.store.reaches(value, node) {
            return Err(JsonError::Cycle);
        }
        self.store.consume(value)?;
        if let NodeData::Array(items) = self.store.resolve_owned_mut(node)? {
            items.push(value);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Scalar reads
    // ------------------------------------------------------------------

    pub fn node_type(&self, node: Handle) -> Result<Kind> {
        self.store.resolve_owned(node).map(NodeData::kind)
    }

    pub fn get_node_int(&self, node: Handle) -> Result<i64> {
        int_of(self.store.resolve_owned(node)?)
    }

    /// Float value of a Float node. Int nodes are a type mismatch.
    pub fn get_node_float(&self, node: Handle) -> Result<f64> {
        float_of(self.store.resolve_owned(node)?)
    }

    pub fn get_node_bool(&self, node: Handle) -> Result<bool> {
        bool_of(self.store.resolve_owned(node)?)
    }

    pub fn get_node_string(&self, node: Handle) -> Result<String> {
        string_of(self.store.resolve_owned(node)?)
    }

    // ------------------------------------------------------------------
    // Lifetime
    // ------------------------------------------------------------------

    pub fn retain(&mut self, node: Handle) -> Result<Handle> {
        self.store.retain(node)
    }

    pub fn release(&mut self, node: Handle) -> Result<()> {
        self.store.release(node)
    }

    /// Opt `node` out of (or back into) automatic scope-exit release.
    pub fn toggle_gc(&mut self, node: Handle, enabled: bool) -> Result<()> {
        self.store.set_gc_eligible(node, enabled)
    }

    /// Release `node`. With `auto` set this is the lenient scope-exit path:
    /// opted-out nodes are kept and invalid handles are ignored. Without it
    /// the release is strict.
    pub fn cleanup(&mut self, node: Handle, auto: bool) -> Result<()> {
        if auto {
            self.store.release_scoped(node);
            Ok(())
        } else {
            self.store.release(node)
        }
    }

    pub fn live_nodes(&self) -> usize {
        self.store.live_nodes()
    }

    fn ensure_capacity(&self, extra: usize) -> Result<()> {
        let live = self.store.live_nodes();
        if live.saturating_add(extra) > self.store.max_nodes() {
            return Err(JsonError::Resource(format!(
                "allocating {extra} node(s) would exceed limit of {}",
                self.store.max_nodes()
            )));
        }
        Ok(())
    }
}

enum ImportStep<'v> {
    Visit(&'v Value),
    Array(usize),
    Object(&'v [(String, Value)]),
}

enum ExportStep {
    Visit(Handle),
    Array(usize),
    Object(Vec<String>),
}

fn int_of(data: &NodeData) -> Result<i64> {
    match data {
        NodeData::Int(i) => Ok(*i),
        other => Err(JsonError::mismatch("int", other.kind())),
    }
}

fn float_of(data: &NodeData) -> Result<f64> {
    match data {
        NodeData::Float(f) => Ok(*f),
        other => Err(JsonError::mismatch("float", other.kind())),
    }
}

fn bool_of(data: &NodeData) -> Result<bool> {
    match data {
        NodeData::Bool(b) => Ok(*b),
        other => Err(JsonError::mismatch("bool", other.kind())),
    }
}

fn string_of(data: &NodeData) -> Result<String> {
    match data {
        NodeData::String(s) => Ok(s.clone()),
        other => Err(JsonError::mismatch("string", other.kind())),
    }
}

fn count_values(value: &Value) -> usize {
    let mut count = 0;
    let mut pending = vec![value];
    while let Some(v) = pending.pop() {
        count += 1;
        match v {
            Value::Array(items) => pending.extend(items),
            Value::Object(pairs) => pending.extend(pairs.iter().map(|(_, v)| v)),
            _ => {}
        }
    }
    count
}
