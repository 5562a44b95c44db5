//! Reference counting, GC opt-out, and cleanup semantics.

use jsonkit_core::{Document, Handle, JsonError, Limits};

#[test]
fn release_root_frees_whole_tree() {
    let mut doc = Document::new();
    let root = doc
        .parse(r#"{"a":[1,2,{"b":[true,false,null]}],"c":"d"}"#)
        .unwrap();
    assert_eq!(doc.live_nodes(), 10);
    doc.release(root).unwrap();
    assert_eq!(doc.live_nodes(), 0);
}

#[test]
fn double_release_is_invalid_handle() {
    let mut doc = Document::new();
    let h = doc.make_int(1).unwrap();
    doc.release(h).unwrap();
    assert_eq!(doc.release(h), Err(JsonError::InvalidHandle(h)));
}

#[test]
fn retain_requires_a_live_reference() {
    let mut doc = Document::new();
    let h = doc.make_int(1).unwrap();
    doc.retain(h).unwrap();
    assert_eq!(doc.store().ref_count(h).unwrap(), 2);
    doc.release(h).unwrap();
    doc.release(h).unwrap();
    assert_eq!(doc.retain(h), Err(JsonError::InvalidHandle(h)));
}

#[test]
fn cleanup_auto_skips_opted_out_nodes() {
    let mut doc = Document::new();
    let kept = doc.make_string("kept").unwrap();
    let dropped = doc.make_string("dropped").unwrap();
    doc.toggle_gc(kept, false).unwrap();

    // end of host scope
    doc.cleanup(kept, true).unwrap();
    doc.cleanup(dropped, true).unwrap();

    assert_eq!(doc.get_node_string(kept).unwrap(), "kept");
    assert!(!doc.store().is_live(dropped));

    // a manual cleanup ignores the flag
    doc.cleanup(kept, false).unwrap();
    assert_eq!(doc.live_nodes(), 0);
}

#[test]
fn cleanup_auto_is_lenient_manual_is_strict() {
    let mut doc = Document::new();
    let h = doc.make_null().unwrap();
    doc.release(h).unwrap();
    assert_eq!(doc.cleanup(h, true), Ok(()));
    assert_eq!(doc.cleanup(h, false), Err(JsonError::InvalidHandle(h)));
    assert_eq!(
        doc.cleanup(Handle::from_raw(0), true),
        Ok(()),
        "never-allocated handle is ignored on the automatic path"
    );
}

#[test]
fn cleanup_auto_of_consumed_handle_keeps_parent_intact() {
    let mut doc = Document::new();
    let child = doc.make_int(5).unwrap();
    let parent = doc.make_array(&[child]).unwrap();
    // host scope ends for both locals
    doc.cleanup(child, true).unwrap();
    assert_eq!(doc.to_json_string(parent).unwrap(), "[5]");
    doc.cleanup(parent, true).unwrap();
    assert_eq!(doc.live_nodes(), 0);
}

#[test]
fn toggled_flag_is_observable_and_reversible() {
    let mut doc = Document::new();
    let h = doc.make_bool(true).unwrap();
    assert!(doc.store().is_gc_eligible(h).unwrap());
    doc.toggle_gc(h, false).unwrap();
    assert!(!doc.store().is_gc_eligible(h).unwrap());
    doc.toggle_gc(h, true).unwrap();
    doc.cleanup(h, true).unwrap();
    assert!(!doc.store().is_live(h));
}

#[test]
fn raw_handles_survive_host_boundary() {
    let mut doc = Document::new();
    let h = doc.parse(r#"{"n":1}"#).unwrap();
    let raw = h.to_raw();
    let back = Handle::from_raw(raw);
    assert_eq!(doc.get_int(back, "n").unwrap(), 1);
    assert!(matches!(
        doc.node_type(Handle::from_raw(raw + 1)),
        Err(JsonError::InvalidHandle(_))
    ));
}

#[test]
fn node_limit_applies_to_builders_and_parser() {
    let mut doc = Document::with_limits(Limits {
        max_nodes: 2,
        ..Limits::default()
    });
    let a = doc.make_int(1).unwrap();
    let _b = doc.make_int(2).unwrap();
    assert!(matches!(doc.make_int(3), Err(JsonError::Resource(_))));
    assert!(matches!(doc.make_array(&[a]), Err(JsonError::Resource(_))));
    assert_eq!(doc.store().external_refs(a).unwrap(), 1);
    assert!(matches!(doc.parse("1"), Err(JsonError::Resource(_))));
    assert_eq!(doc.live_nodes(), 2);
}

#[test]
fn slots_are_reused_after_free() {
    let mut doc = Document::new();
    for _ in 0..1000 {
        let h = doc.parse(r#"[1,2,3]"#).unwrap();
        doc.release(h).unwrap();
    }
    assert_eq!(doc.live_nodes(), 0);
    let h = doc.make_null().unwrap();
    assert!(h.index() < 4);
}
