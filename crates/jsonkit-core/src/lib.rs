//! # jsonkit-core
//!
//! Handle-based JSON document store for embedding in scripting hosts.
//!
//! Hosts work with opaque [`Handle`]s rather than references: they parse text
//! into the store, build values, read and write fields, merge containers, and
//! render text back out. Node memory is owned by the store and reclaimed by
//! reference counting, with a per-node opt-out from automatic scope-exit
//! release.
//!
//! ## Quick start
//!
//! ```rust
//! use jsonkit_core::Document;
//!
//! let mut doc = Document::new();
//! let a = doc.parse(r#"{"key1":"value"}"#).unwrap();
//! let v = doc.make_string("value").unwrap();
//! let b = doc.make_object(&[("key2", v)]).unwrap();
//!
//! // `append` consumes both inputs
//! let merged = doc.append(a, b).unwrap();
//! assert_eq!(
//!     doc.to_json_string(merged).unwrap(),
//!     r#"{"key1":"value","key2":"value"}"#
//! );
//!
//! doc.release(merged).unwrap();
//! assert_eq!(doc.live_nodes(), 0);
//! ```
//!
//! ## Modules
//!
//! - [`store`]: slot arena, handles, reference counts, GC flags
//! - [`node`]: `Kind`, stored `NodeData`, owned `Value` trees
//! - `parser`: JSON text → store
//! - [`serializer`]: store → JSON text, bounded output
//! - [`api`]: `Document`, the operation surface hosts call
//! - [`limits`]: parser and allocation limits
//! - [`error`]: `JsonError`

pub mod api;
pub mod error;
pub mod limits;
pub mod node;
mod parser;
pub mod serializer;
pub mod store;

pub use api::Document;
pub use error::{JsonError, Result};
pub use limits::Limits;
pub use node::{Kind, NodeData, Value};
pub use serializer::{Stringified, Style, WriteStatus};
pub use store::{Handle, Store};
