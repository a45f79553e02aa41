//! Domain types for waystone marker synchronization.
//!
//! Waypoint records are owned by the source repository and treated as
//! immutable values at read time. Markers are the declarative, ephemeral
//! description handed to the rendering surface.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Unique identity of a waypoint record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WaypointId(pub Uuid);

impl fmt::Display for WaypointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<Uuid> for WaypointId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// The principal (player) owning a waypoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(pub Uuid);

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<Uuid> for PrincipalId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// A logical partition ("world") known to the rendering surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartitionId(pub Uuid);

impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<Uuid> for PartitionId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

// ---------------------------------------------------------------------------
// Source data
// ---------------------------------------------------------------------------

/// Block position of a waystone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Position {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}, {}", self.x, self.y, self.z)
    }
}

/// One waystone as stored by the source repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaypointRecord {
    pub id: WaypointId,
    pub name: String,
    pub owner: PrincipalId,
    pub position: Position,
    pub partition: PartitionId,
    /// Private waystone. Hidden from the map unless locked waystones are shown.
    #[serde(default)]
    pub locked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// A world as reported by the rendering surface.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Partition {
    pub id: PartitionId,
    pub name: String,
}

impl Partition {
    pub fn new(id: impl Into<PartitionId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Render-side types
// ---------------------------------------------------------------------------

/// Icon selector for a marker, keyed by the waystone's locked flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerIcon {
    Open,
    Locked,
}

impl MarkerIcon {
    pub fn for_locked(locked: bool) -> Self {
        if locked {
            MarkerIcon::Locked
        } else {
            MarkerIcon::Open
        }
    }

    /// Key under which the icon image is registered with the surface.
    pub fn key(self) -> &'static str {
        match self {
            MarkerIcon::Open => "waystone_icon",
            MarkerIcon::Locked => "waystone_locked_icon",
        }
    }
}

/// Map placement of a marker. Only x and z are projected; y never places.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub z: f64,
}

impl From<Position> for Point {
    fn from(pos: Position) -> Self {
        Point {
            x: f64::from(pos.x),
            z: f64::from(pos.z),
        }
    }
}

/// A single renderable point derived from one waypoint record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    /// Stable per-waypoint key, `waystone_<id>`.
    pub key: String,
    pub point: Point,
    pub icon: MarkerIcon,
    pub icon_size: u32,
    pub hover_tooltip: String,
    pub click_tooltip: String,
}

impl Marker {
    pub fn key_for(id: &WaypointId) -> String {
        format!("waystone_{id}")
    }
}

/// Display metadata for a registered layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerSpec {
    pub key: String,
    pub label: String,
    pub default_hidden: bool,
    pub show_controls: bool,
    /// Order in the layer controls (lower sorts first).
    pub priority: u32,
    /// Render order on the map (higher draws on top).
    pub z_index: u32,
    /// Client-side auto-update interval in seconds.
    pub update_interval_secs: u32,
}

/// Reserved key of the waystone layer in every partition.
pub const WAYSTONE_LAYER_KEY: &str = "waystones";

impl LayerSpec {
    /// Fixed metadata of the waystone layer.
    pub fn waystones() -> Self {
        LayerSpec {
            key: WAYSTONE_LAYER_KEY.to_string(),
            label: "Waystones".to_string(),
            default_hidden: false,
            show_controls: true,
            priority: 10,
            z_index: 100,
            update_interval_secs: 20,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newtype_display_is_uuid() {
        let raw = Uuid::nil();
        assert_eq!(WaypointId::from(raw).to_string(), raw.to_string());
        assert_eq!(PartitionId::from(raw).to_string(), raw.to_string());
    }

    #[test]
    fn point_drops_height() {
        let point = Point::from(Position::new(10, 64, 20));
        assert_eq!(point, Point { x: 10.0, z: 20.0 });
    }

    #[test]
    fn icon_follows_locked_flag() {
        assert_eq!(MarkerIcon::for_locked(true), MarkerIcon::Locked);
        assert_eq!(MarkerIcon::for_locked(false).key(), "waystone_icon");
        assert_eq!(MarkerIcon::Locked.key(), "waystone_locked_icon");
    }

    #[test]
    fn waystone_layer_spec_is_fixed() {
        let spec = LayerSpec::waystones();
        assert_eq!(spec.key, WAYSTONE_LAYER_KEY);
        assert!(!spec.default_hidden);
        assert!(spec.show_controls);
        assert_eq!(spec.priority, 10);
        assert_eq!(spec.update_interval_secs, 20);
    }

    #[test]
    fn record_yaml_roundtrip_without_timestamp() {
        let record = WaypointRecord {
            id: WaypointId(Uuid::new_v4()),
            name: "Home".into(),
            owner: PrincipalId(Uuid::new_v4()),
            position: Position::new(1, 2, 3),
            partition: PartitionId(Uuid::new_v4()),
            locked: false,
            created_at: None,
        };
        let yaml = serde_yaml::to_string(&record).expect("serialize");
        assert!(!yaml.contains("created_at"));
        let back: WaypointRecord = serde_yaml::from_str(&yaml).expect("deserialize");
        assert_eq!(back, record);
    }
}
