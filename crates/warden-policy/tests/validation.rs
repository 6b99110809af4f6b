use warden_policy::parse_json;

#[test]
fn missing_required_fields_are_reported_together() {
    let json = r#"{"id":"","name":"","version":"","namespace":"","status":"active","rules":[]}"#;
    let errs = parse_json(json).unwrap_err();
    let codes: Vec<&str> = errs.iter().map(|v| v.code.as_str()).collect();
    assert!(codes.contains(&"MISSING_FIELD"));
    assert!(codes.contains(&"EMPTY_RULES"));
}

#[test]
fn malformed_json_is_a_single_parse_error() {
    let err = parse_json("{not json").unwrap_err();
    assert_eq!(err.len(), 1);
    assert_eq!(err[0].code, "PARSE_ERROR");
}

#[test]
fn unknown_status_is_a_parse_error() {
    let json = r#"{"id":"p","name":"p","version":"1.0.0","namespace":"ns","status":"enabled","rules":[{"id":"r","name":"r","condition":{"kind":"leaf","field":"a","operator":"exists"},"action":{"decision":"allow"}}]}"#;
    let err = parse_json(json).unwrap_err();
    assert_eq!(err[0].code, "PARSE_ERROR");
}
