use jsonkit_core::{Document, JsonError};

/// Helper: parse then render compactly.
fn reformat(text: &str) -> String {
    let mut doc = Document::new();
    let h = doc.parse(text).unwrap();
    doc.to_json_string(h).unwrap()
}

// ============================================================================
// Compact output
// ============================================================================

#[test]
fn compact_strips_whitespace_and_keeps_order() {
    assert_eq!(
        reformat("{ \"b\" : 1 ,\n \"a\" : [ true , null ] }"),
        r#"{"b":1,"a":[true,null]}"#
    );
}

#[test]
fn numbers_render_by_kind() {
    assert_eq!(reformat("[0,-0,12,1.0,1.50,-0.0,1e3,2.5e-8]"), "[0,0,12,1.0,1.5,-0.0,1000.0,2.5e-8]");
}

#[test]
fn float_built_from_whole_number_stays_float() {
    let mut doc = Document::new();
    let f = doc.make_float(2.0).unwrap();
    let text = doc.to_json_string(f).unwrap();
    assert_eq!(text, "2.0");
    let back = doc.parse(&text).unwrap();
    assert_eq!(doc.get_node_float(back).unwrap(), 2.0);
    assert!(doc.get_node_int(back).is_err());
}

#[test]
fn non_finite_floats_render_as_null() {
    let mut doc = Document::new();
    let nan = doc.make_float(f64::NAN).unwrap();
    let inf = doc.make_float(f64::NEG_INFINITY).unwrap();
    let arr = doc.make_array(&[nan, inf]).unwrap();
    assert_eq!(doc.to_json_string(arr).unwrap(), "[null,null]");
}

#[test]
fn strings_are_escaped() {
    let mut doc = Document::new();
    let s = doc.make_string("quote\" backslash\\ nl\n tab\t bell\u{7} é").unwrap();
    assert_eq!(
        doc.to_json_string(s).unwrap(),
        r#""quote\" backslash\\ nl\n tab\t bell\u0007 é""#
    );
}

#[test]
fn keys_are_escaped() {
    let mut doc = Document::new();
    let v = doc.make_int(1).unwrap();
    let obj = doc.make_object(&[("a\"b", v)]).unwrap();
    assert_eq!(doc.to_json_string(obj).unwrap(), r#"{"a\"b":1}"#);
}

#[test]
fn empty_containers() {
    assert_eq!(reformat("[ ]"), "[]");
    assert_eq!(reformat("{ }"), "{}");
    assert_eq!(reformat(r#"{"a":{},"b":[]}"#), r#"{"a":{},"b":[]}"#);
}

#[test]
fn pretty_output() {
    let mut doc = Document::new();
    let h = doc.parse(r#"{"a":[1,{"b":null}],"c":{},"d":[]}"#).unwrap();
    assert_eq!(
        doc.to_json_pretty(h, 2).unwrap(),
        "{\n  \"a\": [\n    1,\n    {\n      \"b\": null\n    }\n  ],\n  \"c\": {},\n  \"d\": []\n}"
    );
}

#[test]
fn render_invalid_handle_fails() {
    let mut doc = Document::new();
    let h = doc.make_null().unwrap();
    doc.release(h).unwrap();
    assert_eq!(doc.to_json_string(h), Err(JsonError::InvalidHandle(h)));
}

#[test]
fn deep_builder_chain_renders_without_recursion() {
    let mut doc = Document::new();
    let mut h = doc.make_int(0).unwrap();
    for _ in 0..50_000 {
        h = doc.make_array(&[h]).unwrap();
    }
    let text = doc.to_json_string(h).unwrap();
    assert_eq!(text.len(), 100_001);
    assert!(text.starts_with("[[[") && text.ends_with("0]]]"));
}

// ============================================================================
// Bounded output
// ============================================================================

#[test]
fn stringify_fits() {
    let mut doc = Document::new();
    let h = doc.parse("[1,2,3]").unwrap();
    let out = doc.stringify(h, 8).unwrap();
    assert_eq!(out.text, "[1,2,3]");
    assert_eq!(out.required, 7);
    assert!(!out.is_truncated());
}

#[test]
fn stringify_reports_truncation() {
    let mut doc = Document::new();
    let h = doc.parse(r#"{"key":"value"}"#).unwrap();
    let out = doc.stringify(h, 8).unwrap();
    assert!(out.is_truncated());
    assert_eq!(out.text, r#"{"key":"#);
    assert_eq!(out.text.len(), 7);
    assert_eq!(out.required, 15);

    let none = doc.stringify(h, 0).unwrap();
    assert_eq!(none.text, "");
    assert!(none.is_truncated());
}

#[test]
fn stringify_exact_fit_boundary() {
    let mut doc = Document::new();
    let h = doc.parse("[1,2,3]").unwrap();
    // 7 content bytes need capacity 8
    assert!(doc.stringify(h, 7).unwrap().is_truncated());
    assert!(!doc.stringify(h, 8).unwrap().is_truncated());
}

#[test]
fn stringify_into_buffer() {
    let mut doc = Document::new();
    let h = doc.parse(r#"["abc","def"]"#).unwrap();
    let mut buf = [0xFFu8; 6];
    let status = doc.stringify_into(h, &mut buf).unwrap();
    assert!(status.is_truncated());
    assert_eq!(status.written, 5);
    assert_eq!(status.required, 13);
    assert_eq!(&buf, b"[\"abc\0");

    let mut big = [0xFFu8; 32];
    let status = doc.stringify_into(h, &mut big).unwrap();
    assert!(!status.is_truncated());
    assert_eq!(&big[..14], b"[\"abc\",\"def\"]\0");
}
