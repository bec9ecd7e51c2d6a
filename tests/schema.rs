use medscreen::schema::{ID, MEDIATOR, SAMPLE_ID, SEX, VARIANT, resolve_column_map};

#[test]
fn resolves_synonyms_without_reusing_a_header() {
    let headers = vec!["eid".to_string(), "id".to_string(), "Sex".to_string()];
    let map = resolve_column_map(&headers, &[SAMPLE_ID, ID], &[SEX], "t.tsv").unwrap();
    assert_eq!(map.get(SAMPLE_ID), Some("eid"));
    assert_eq!(map.get(ID), Some("id"));
    assert_eq!(map.get(SEX), Some("Sex"));
    assert_eq!(map.info.len(), 1);
}

#[test]
fn missing_required_column_is_an_error() {
    let headers = vec!["variant".to_string()];
    assert!(resolve_column_map(&headers, &[VARIANT, MEDIATOR], &[], "v.tsv").is_err());
    let map = resolve_column_map(&headers, &[VARIANT], &[MEDIATOR], "v.tsv").unwrap();
    assert_eq!(map.get(MEDIATOR), None);
    assert!(map.require(MEDIATOR).is_err());
}
