//! Value store: a slot arena of JSON nodes addressed by generation-checked
//! handles.
//!
//! # Reference model
//!
//! Every live node carries two counters:
//!
//! - `external`: references held by callers through a [`Handle`]. Builders
//!   start a node at 1, `retain` and the handle-returning accessors add one,
//!   `release` removes one.
//! - `attached`: references held by parent containers. Composing a node into a
//!   parent moves one reference from `external` to `attached` (see
//!   [`Store::consume`]).
//!
//! A node is freed as soon as both counters are zero. Freeing walks the
//! subtree with an explicit stack and detaches each child, so children still
//! held by a caller (or by another parent) survive.
//!
//! The `gc_eligible` flag only affects [`Store::release_scoped`], the
//! automatic release a host performs at the end of a logical scope. Manual
//! [`Store::release`] ignores it.
//!
//! Freed slots go on a free list and their generation is bumped, so a stale
//! handle pointing at a reused slot is rejected instead of aliasing the new
//! node.

use crate::error::{JsonError, Result};
use crate::node::{Kind, NodeData};
use std::collections::HashMap;
use std::fmt;

/// Opaque reference to a node in a [`Store`].
///
/// Handles are plain `Copy` ids. Whether a handle is still usable is decided by
/// the store at each call; a consumed or released handle fails with
/// `JsonError::InvalidHandle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle {
    index: u32,
    generation: u32,
}

impl Handle {
    /// Pack the handle into a single integer for hosts that can only carry
    /// numbers across their boundary. Never returns 0.
    pub fn to_raw(self) -> u64 {
        (u64::from(self.generation) << 32) | u64::from(self.index)
    }

    /// Inverse of [`Handle::to_raw`]. Any integer is accepted; garbage values
    /// simply fail validation when used.
    pub fn from_raw(raw: u64) -> Self {
        Self {
            index: raw as u32,
            generation: (raw >> 32) as u32,
        }
    }

    /// Slot position in the arena.
    pub fn index(self) -> u32 {
        self.index
    }

    /// Slot generation this handle was issued for.
    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

#[derive(Debug)]
struct Node {
    data: NodeData,
    external: u32,
    attached: u32,
    gc_eligible: bool,
}

impl Node {
    fn total_refs(&self) -> u32 {
        self.external + self.attached
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// Arena owning every node payload.
#[derive(Debug)]
pub struct Store {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
    max_nodes: usize,
}

impl Store {
    /// Empty store that refuses to hold more than `max_nodes` live nodes.
    pub fn new(max_nodes: usize) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
            max_nodes,
        }
    }

    /// Allocate a node with one caller reference, GC-eligible.
    ///
    /// Container payloads must list children whose attachment has already
    /// been accounted for (see [`Store::consume`]).
    pub fn allocate(&mut self, data: NodeData) -> Result<Handle> {
        if self.live >= self.max_nodes {
            return Err(JsonError::Resource(format!(
                "node limit of {} reached",
                self.max_nodes
            )));
        }
        let node = Node {
            data,
            external: 1,
            attached: 0,
            gc_eligible: true,
        };
        let handle = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.node = Some(node);
                Handle {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = u32::try_from(self.slots.len())
                    .map_err(|_| JsonError::Resource("slot table exhausted".to_string()))?;
                self.slots.push(Slot {
                    generation: 1,
                    node: Some(node),
                });
                Handle {
                    index,
                    generation: 1,
                }
            }
        };
        self.live += 1;
        tracing::trace!(handle = %handle, live = self.live, "allocated node");
        Ok(handle)
    }

    fn node(&self, handle: Handle) -> Result<&Node> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.node.as_ref())
            .ok_or(JsonError::InvalidHandle(handle))
    }

    fn node_mut(&mut self, handle: Handle) -> Result<&mut Node> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.node.as_mut())
            .ok_or(JsonError::InvalidHandle(handle))
    }

    /// A node the caller still owns a reference to.
    fn owned(&self, handle: Handle) -> Result<&Node> {
        let node = self.node(handle)?;
        if node.external == 0 {
            return Err(JsonError::InvalidHandle(handle));
        }
        Ok(node)
    }

    fn owned_mut(&mut self, handle: Handle) -> Result<&mut Node> {
        let node = self.node_mut(handle)?;
        if node.external == 0 {
            return Err(JsonError::InvalidHandle(handle));
        }
        Ok(node)
    }

    /// Read access to a node's payload.
    pub fn resolve(&self, handle: Handle) -> Result<&NodeData> {
        self.node(handle).map(|n| &n.data)
    }

    /// Mutable access to a node's payload. Callers must keep child counters
    /// consistent with any handles they add or remove.
    pub fn resolve_mut(&mut self, handle: Handle) -> Result<&mut NodeData> {
        self.node_mut(handle).map(|n| &mut n.data)
    }

    /// Read access for a caller-held handle. Fails once the caller's
    /// references have been consumed into a parent or released, even if the
    /// node is still alive under its parent.
    pub fn resolve_owned(&self, handle: Handle) -> Result<&NodeData> {
        self.owned(handle).map(|n| &n.data)
    }

    /// Mutable counterpart of [`Store::resolve_owned`].
    pub fn resolve_owned_mut(&mut self, handle: Handle) -> Result<&mut NodeData> {
        self.owned_mut(handle).map(|n| &mut n.data)
    }

    /// Kind of any live node, owned or attached.
    pub fn kind(&self, handle: Handle) -> Result<Kind> {
        self.resolve(handle).map(NodeData::kind)
    }

    /// Add a caller reference. Returns the same handle for convenience.
    pub fn retain(&mut self, handle: Handle) -> Result<Handle> {
        self.owned_mut(handle)?.external += 1;
        Ok(handle)
    }

    /// Add a caller reference to a node reached through its parent. Unlike
    /// `retain`, the node does not need an existing caller reference.
    pub(crate) fn share(&mut self, handle: Handle) -> Result<Handle> {
        self.node_mut(handle)?.external += 1;
        Ok(handle)
    }

    /// Manual release: drop one caller reference, freeing the node when no
    /// references remain.
    ///
    /// Fails for stale handles and for handles whose caller references were
    /// already consumed into a parent.
    pub fn release(&mut self, handle: Handle) -> Result<()> {
        let node = self.owned_mut(handle)?;
        node.external -= 1;
        if node.total_refs() == 0 {
            self.free(handle);
        }
        Ok(())
    }

    /// Automatic release at the end of a host scope. Skips nodes opted out via
    /// [`Store::set_gc_eligible`] and ignores invalid handles.
    pub fn release_scoped(&mut self, handle: Handle) {
        match self.node(handle).map(|n| (n.gc_eligible, n.external)) {
            Ok((false, _)) => {
                tracing::debug!(handle = %handle, "scoped release skipped: node opted out of GC");
            }
            Ok((true, 0)) => {
                tracing::debug!(handle = %handle, "scoped release skipped: no caller reference");
            }
            Ok(_) => {
                // external > 0 was checked above
                let _ = self.release(handle);
            }
            Err(_) => {
                tracing::debug!(handle = %handle, "scoped release of invalid handle ignored");
            }
        }
    }

    /// Opt a caller-held node in or out of scoped release.
    pub fn set_gc_eligible(&mut self, handle: Handle, eligible: bool) -> Result<()> {
        self.owned_mut(handle)?.gc_eligible = eligible;
        Ok(())
    }

    /// Current scoped-release flag of a live node.
    pub fn is_gc_eligible(&self, handle: Handle) -> Result<bool> {
        self.node(handle).map(|n| n.gc_eligible)
    }

    /// Verify that `handles` can all be consumed, counting repeats. Nothing is
    /// modified; builders call this before touching any counter.
    pub fn check_consumable(&self, handles: &[Handle]) -> Result<()> {
        let mut needed: HashMap<Handle, u32> = HashMap::with_capacity(handles.len());
        for &h in handles {
            *needed.entry(h).or_insert(0) += 1;
        }
        for &h in handles {
            let node = self.node(h)?;
            if node.external < needed[&h] {
                return Err(JsonError::InvalidHandle(h));
            }
        }
        Ok(())
    }

    /// Move one caller reference into a parent attachment.
    pub fn consume(&mut self, handle: Handle) -> Result<()> {
        let node = self.owned_mut(handle)?;
        node.external -= 1;
        node.attached += 1;
        Ok(())
    }

    /// Add a parent attachment without touching caller references. Used when a
    /// child ends up under a second parent (e.g. the result of `append` while
    /// an input is still retained elsewhere).
    pub(crate) fn attach(&mut self, handle: Handle) -> Result<()> {
        self.node_mut(handle)?.attached += 1;
        Ok(())
    }

    /// Remove one parent attachment, freeing the node if nothing else holds it.
    pub(crate) fn detach(&mut self, handle: Handle) {
        let Ok(node) = self.node_mut(handle) else {
            return;
        };
        node.attached = node.attached.saturating_sub(1);
        if node.total_refs() == 0 {
            self.free(handle);
        }
    }

    /// Free a node and every descendant left without references.
    fn free(&mut self, root: Handle) {
        let mut pending = vec![root];
        let mut freed = 0usize;
        while let Some(handle) = pending.pop() {
            let Some(node) = self.take(handle) else {
                continue;
            };
            freed += 1;
            for child in node.data.into_children() {
                if let Ok(child_node) = self.node_mut(child) {
                    child_node.attached = child_node.attached.saturating_sub(1);
                    if child_node.total_refs() == 0 {
                        pending.push(child);
                    }
                }
            }
        }
        tracing::trace!(root = %root, freed, live = self.live, "freed subtree");
    }

    /// Empty a slot and retire its generation.
    fn take(&mut self, handle: Handle) -> Option<Node> {
        let slot = self
            .slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)?;
        let node = slot.node.take()?;
        slot.generation = slot.generation.wrapping_add(1).max(1);
        self.free.push(handle.index);
        self.live -= 1;
        Some(node)
    }

    /// Forcibly free a set of nodes without following children. The caller
    /// guarantees the set is closed (every child of a listed node is listed).
    /// Stale entries are skipped.
    pub(crate) fn reclaim(&mut self, handles: &[Handle]) {
        let mut freed = 0usize;
        for &h in handles {
            if self.take(h).is_some() {
                freed += 1;
            }
        }
        tracing::debug!(freed, live = self.live, "reclaimed nodes");
    }

    /// True if `target` is `from` or is reachable from it.
    pub fn reaches(&self, from: Handle, target: Handle) -> bool {
        let mut pending = vec![from];
        while let Some(h) = pending.pop() {
            if h == target {
                return true;
            }
            if let Ok(data) = self.resolve(h) {
                pending.extend(data.children());
            }
        }
        false
    }

    /// True while the handle's slot still holds the node it was issued for.
    pub fn is_live(&self, handle: Handle) -> bool {
        self.node(handle).is_ok()
    }

    /// Caller references plus parent attachments.
    pub fn ref_count(&self, handle: Handle) -> Result<u32> {
        self.node(handle).map(Node::total_refs)
    }

    /// Caller references only.
    pub fn external_refs(&self, handle: Handle) -> Result<u32> {
        self.node(handle).map(|n| n.external)
    }

    /// Number of nodes currently allocated.
    pub fn live_nodes(&self) -> usize {
        self.live
    }

    /// Allocation ceiling this store was created with.
    pub fn max_nodes(&self) -> usize {
        self.max_nodes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> Store {
        Store::new(1024)
    }

    #[test]
    fn raw_roundtrip_and_nonzero() {
        let mut s = store();
        let h = s.allocate(NodeData::Null).unwrap();
        assert_ne!(h.to_raw(), 0);
        assert_eq!(Handle::from_raw(h.to_raw()), h);
    }

    #[test]
    fn stale_handle_rejected_after_slot_reuse() {
        let mut s = store();
        let a = s.allocate(NodeData::Int(1)).unwrap();
        s.release(a).unwrap();
        let b = s.allocate(NodeData::Int(2)).unwrap();
        assert_eq!(a.index(), b.index());
        assert_ne!(a.generation(), b.generation());
        assert_eq!(s.resolve(a), Err(JsonError::InvalidHandle(a)));
        assert_eq!(s.resolve(b), Ok(&NodeData::Int(2)));
    }

    #[test]
    fn release_frees_exclusive_children_only() {
        let mut s = store();
        let kept = s.allocate(NodeData::Int(1)).unwrap();
        let dropped = s.allocate(NodeData::Int(2)).unwrap();
        s.retain(kept).unwrap();
        s.consume(kept).unwrap();
        s.consume(dropped).unwrap();
        let parent = s.allocate(NodeData::Array(vec![kept, dropped])).unwrap();
        assert_eq!(s.live_nodes(), 3);

        s.release(parent).unwrap();
        assert!(!s.is_live(parent));
        assert!(!s.is_live(dropped));
        assert!(s.is_live(kept));
        assert_eq!(s.ref_count(kept), Ok(1));
    }

    #[test]
    fn releasing_attached_child_is_rejected() {
        let mut s = store();
        let child = s.allocate(NodeData::Bool(true)).unwrap();
        s.consume(child).unwrap();
        let _parent = s.allocate(NodeData::Array(vec![child])).unwrap();
        assert_eq!(s.release(child), Err(JsonError::InvalidHandle(child)));
        assert!(s.is_live(child));
    }

    #[test]
    fn owned_access_requires_caller_reference() {
        let mut s = store();
        let child = s.allocate(NodeData::Int(4)).unwrap();
        assert_eq!(s.resolve_owned(child), Ok(&NodeData::Int(4)));
        s.consume(child).unwrap();
        let _parent = s.allocate(NodeData::Array(vec![child])).unwrap();

        assert_eq!(s.resolve_owned(child), Err(JsonError::InvalidHandle(child)));
        assert!(s.resolve_owned_mut(child).is_err());
        assert_eq!(
            s.set_gc_eligible(child, false),
            Err(JsonError::InvalidHandle(child))
        );
        // internal walks still see it
        assert_eq!(s.resolve(child), Ok(&NodeData::Int(4)));
    }

    #[test]
    fn scoped_release_respects_gc_flag() {
        let mut s = store();
        let h = s.allocate(NodeData::Null).unwrap();
        s.set_gc_eligible(h, false).unwrap();
        s.release_scoped(h);
        assert!(s.is_live(h));
        s.release(h).unwrap();
        assert!(!s.is_live(h));
        // lenient on a dead handle
        s.release_scoped(h);
    }

    #[test]
    fn node_limit_reports_resource_error() {
        let mut s = Store::new(1);
        s.allocate(NodeData::Null).unwrap();
        assert!(matches!(
            s.allocate(NodeData::Null),
            Err(JsonError::Resource(_))
        ));
    }

    #[test]
    fn check_consumable_counts_repeats() {
        let mut s = store();
        let h = s.allocate(NodeData::Null).unwrap();
        assert!(s.check_consumable(&[h]).is_ok());
        assert_eq!(s.check_consumable(&[h, h]), Err(JsonError::InvalidHandle(h)));
        s.retain(h).unwrap();
        assert!(s.check_consumable(&[h, h]).is_ok());
    }

    #[test]
    fn deep_chain_frees_without_recursion() {
        let mut s = Store::new(usize::MAX);
        let mut h = s.allocate(NodeData::Null).unwrap();
        for _ in 0..100_000 {
            s.consume(h).unwrap();
            h = s.allocate(NodeData::Array(vec![h])).unwrap();
        }
        s.release(h).unwrap();
        assert_eq!(s.live_nodes(), 0);
    }
}
