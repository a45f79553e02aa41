//! waymark core library: domain types, configuration, waystone source contract.
//!
//! - [`types`]: newtypes, waypoint records, markers, layer metadata
//! - [`config`]: YAML configuration load / save
//! - [`source`]: [`WaypointSource`] capability contract and [`FileSource`]
//! - [`error`]: [`ConfigError`], [`SourceError`]

pub mod config;
pub mod error;
pub mod source;
pub mod types;

pub use config::Config;
pub use error::{ConfigError, SourceError};
pub use source::{
    FileSource, SourceCapability, SourceSnapshot, WaypointSource, SOURCE_API_VERSION,
};
pub use types::{
    LayerSpec, Marker, MarkerIcon, Partition, PartitionId, Point, Position, PrincipalId,
    WaypointId, WaypointRecord, WAYSTONE_LAYER_KEY,
};
