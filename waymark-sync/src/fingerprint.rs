//! Snapshot fingerprinting for change detection.
//!
//! `record_hash` covers every field of a record, so any single mutation
//! changes it. `fingerprint` folds the record hashes with `31*h + r`
//! seeded with the record count. The hashes are sorted first: the source
//! hands out an unordered collection and the same snapshot must always
//! produce the same fingerprint.
//!
//! Fingerprints are compared only within one process lifetime and never
//! persisted.

use std::fmt;

use sha2::{Digest, Sha256};

use waymark_core::types::WaypointRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(pub u64);

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// First 8 bytes of the SHA-256 digest over every field of `record`.
pub fn record_hash(record: &WaypointRecord) -> u64 {
    let mut h = Sha256::new();
    h.update(record.id.0.as_bytes());
    update_str(&mut h, &record.name);
    h.update(record.owner.0.as_bytes());
    h.update(record.position.x.to_le_bytes());
    h.update(record.position.y.to_le_bytes());
    h.update(record.position.z.to_le_bytes());
    h.update(record.partition.0.as_bytes());
    h.update([u8::from(record.locked)]);
    match record.created_at {
        Some(ts) => {
            h.update([1]);
            h.update(ts.timestamp().to_le_bytes());
            h.update(ts.timestamp_subsec_nanos().to_le_bytes());
        }
        None => h.update([0]),
    }

    let digest = h.finalize();
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(head)
}

// Length prefix keeps ("ab", "c") and ("a", "bc") apart.
fn update_str(h: &mut Sha256, value: &str) {
    h.update((value.len() as u64).to_le_bytes());
    h.update(value.as_bytes());
}

/// Fingerprint of a full snapshot.
pub fn fingerprint(records: &[WaypointRecord]) -> Fingerprint {
    let mut hashes: Vec<u64> = records.iter().map(record_hash).collect();
    hashes.sort_unstable();
    let combined = hashes
        .into_iter()
        .fold(records.len() as u64, |acc, r| acc.wrapping_mul(31).wrapping_add(r));
    Fingerprint(combined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rstest::rstest;
    use uuid::Uuid;
    use waymark_core::types::{PartitionId, Position, PrincipalId, WaypointId};

    fn record(name: &str) -> WaypointRecord {
        WaypointRecord {
            id: WaypointId(Uuid::new_v4()),
            name: name.to_string(),
            owner: PrincipalId(Uuid::new_v4()),
            position: Position::new(10, 64, 20),
            partition: PartitionId(Uuid::new_v4()),
            locked: false,
            created_at: Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()),
        }
    }

    #[test]
    fn stable_over_unchanged_snapshot() {
        let snapshot = vec![record("Home"), record("Mine"), record("Farm")];
        assert_eq!(fingerprint(&snapshot), fingerprint(&snapshot.clone()));
    }

    #[test]
    fn independent_of_record_order() {
        let snapshot = vec![record("Home"), record("Mine"), record("Farm")];
        let mut reversed = snapshot.clone();
        reversed.reverse();
        assert_eq!(fingerprint(&snapshot), fingerprint(&reversed));
    }

    #[test]
    fn empty_snapshot_differs_from_non_empty() {
        assert_eq!(fingerprint(&[]), Fingerprint(0));
        assert_ne!(fingerprint(&[]), fingerprint(&[record("Home")]));
    }

    #[test]
    fn display_is_sixteen_hex_digits() {
        assert_eq!(Fingerprint(0xab).to_string(), "00000000000000ab");
    }

    type Mutation = fn(&mut WaypointRecord);

    #[rstest]
    #[case::id(|r: &mut WaypointRecord| r.id = WaypointId(Uuid::new_v4()))]
    #[case::name(|r: &mut WaypointRecord| r.name.push('!'))]
    #[case::owner(|r: &mut WaypointRecord| r.owner = PrincipalId(Uuid::new_v4()))]
    #[case::x(|r: &mut WaypointRecord| r.position.x += 1)]
    #[case::y(|r: &mut WaypointRecord| r.position.y += 1)]
    #[case::z(|r: &mut WaypointRecord| r.position.z -= 1)]
    #[case::partition(|r: &mut WaypointRecord| r.partition = PartitionId(Uuid::new_v4()))]
    #[case::locked(|r: &mut WaypointRecord| r.locked = !r.locked)]
    #[case::created_cleared(|r: &mut WaypointRecord| r.created_at = None)]
    #[case::created_moved(|r: &mut WaypointRecord| r.created_at = r.created_at.map(|t| t + chrono::Duration::seconds(1)))]
    fn any_field_change_changes_fingerprint(#[case] mutate: Mutation) {
        let snapshot = vec![record("Home"), record("Mine")];
        let before = fingerprint(&snapshot);
        let mut changed = snapshot.clone();
        mutate(&mut changed[1]);
        assert_ne!(before, fingerprint(&changed));
    }
}
