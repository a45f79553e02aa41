//! Parsing of hand-written waystone source documents.

use assert_fs::prelude::*;
use waymark_core::{source::FileSource, PrincipalId, WaypointSource};

const DOC: &str = r#"
version: 1
principals:
  0b0e8f0e-8c5e-4c6e-9a59-2f3c1a7c0001: Steve
waystones:
  - id: 5d4c2e1a-0000-4000-8000-000000000001
    name: Home
    owner: 0b0e8f0e-8c5e-4c6e-9a59-2f3c1a7c0001
    position: { x: 10, y: 64, z: 20 }
    partition: 9b7d0000-0000-4000-8000-0000000000aa
    created_at: 2024-05-01T12:00:00Z
  - id: 5d4c2e1a-0000-4000-8000-000000000002
    name: Vault
    owner: 0b0e8f0e-8c5e-4c6e-9a59-2f3c1a7c0001
    position: { x: -300, y: 12, z: 45 }
    partition: 9b7d0000-0000-4000-8000-0000000000aa
    locked: true
"#;

#[test]
fn optional_fields_default() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let file = home.child("waystones.yaml");
    file.write_str(DOC).expect("write");

    let records = FileSource::new(file.path()).all().expect("read");
    assert_eq!(records.len(), 2);

    let home_stone = &records[0];
    assert_eq!(home_stone.name, "Home");
    assert!(!home_stone.locked, "locked defaults to false");
    assert!(home_stone.created_at.is_some());

    let vault = &records[1];
    assert!(vault.locked);
    assert!(vault.created_at.is_none(), "created_at is optional");
    assert_eq!(vault.position.x, -300);
}

#[test]
fn principal_names_resolve_from_document() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let file = home.child("waystones.yaml");
    file.write_str(DOC).expect("write");

    let snapshot = FileSource::new(file.path()).snapshot().expect("read");
    let owner: PrincipalId = snapshot.records[0].owner;
    assert_eq!(snapshot.principal_name(&owner), Some("Steve"));
    assert_eq!(snapshot.records.len(), 2);
}
