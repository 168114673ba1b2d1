// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(clippy::unwrap_used)]
//! Loading reference and property documents from a workspace directory.

use sip_refs::workspace::{
    append_property_records, append_references, load_property_records, load_references,
    PropertyRecord,
};
use sip_refs::{MdKind, MdReference, RefError, RefQuery, ReferenceStore};
use std::collections::BTreeSet;
use std::fs;

#[test]
fn missing_workspace_is_empty_not_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let gone = dir.path().join("never-created");
    let store = load_references(&gone).unwrap();
    assert!(store.is_empty());
    assert!(load_property_records(&gone).unwrap().is_empty());
}

#[test]
fn documents_from_several_steps_are_merged() {
    let dir = tempfile::tempdir().unwrap();
    append_references(
        dir.path(),
        "import-object",
        &[MdReference::file("_tech", MdKind::Amd, "/data/a.txt")],
    )
    .unwrap();
    append_references(
        dir.path(),
        "premis-event",
        &[
            MdReference::file("_event", MdKind::Amd, "data/a.txt"),
            MdReference::directory("_dmd", MdKind::Dmd, "data"),
        ],
    )
    .unwrap();
    // unrelated json in the workspace is not picked up
    fs::write(dir.path().join("notes.json"), b"{}").unwrap();

    let store = load_references(dir.path()).unwrap();
    assert_eq!(store.len(), 3);
    assert_eq!(
        store.lookup(&RefQuery::file("data/a.txt")),
        BTreeSet::from(["_event".to_owned(), "_tech".to_owned()])
    );
    assert_eq!(
        store.lookup(&RefQuery::directory("data").kind(MdKind::Dmd)),
        BTreeSet::from(["_dmd".to_owned()])
    );
}

#[test]
fn append_is_cumulative() {
    let dir = tempfile::tempdir().unwrap();
    append_property_records(dir.path(), "import-object", &[PropertyRecord::new("./a.txt")])
        .unwrap();
    append_property_records(
        dir.path(),
        "import-object",
        &[PropertyRecord {
            order: Some(2),
            ..PropertyRecord::new("a.txt")
        }],
    )
    .unwrap();
    let records = load_property_records(dir.path()).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].path, "a.txt");
    assert_eq!(records[1].order, Some(2));
}

#[test]
fn missing_root_key_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("broken-md-references.json"),
        br#"{"references": []}"#,
    )
    .unwrap();
    let err = load_references(dir.path()).unwrap_err();
    assert!(matches!(err, RefError::MissingRoot { key: "md_references", .. }));
}

#[test]
fn malformed_json_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("x-object-properties.json"), b"{ nope").unwrap();
    let err = load_property_records(dir.path()).unwrap_err();
    assert!(matches!(err, RefError::Json { .. }));
}

#[test]
fn invalid_record_on_disk_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("x-md-references.json"),
        br#"{"md_references": [{"md_id": "_1", "kind": "amd"}]}"#,
    )
    .unwrap();
    let err = load_references(dir.path()).unwrap_err();
    assert!(matches!(err, RefError::InvalidRecord { .. }));
}
