//! # waymark-renderer
//!
//! Marker builder: turns one waystone record into one renderable map
//! marker with tera-rendered hover and click tooltips.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use waymark_renderer::{DisplayNames, MarkerBuilder};
//! use waymark_core::types::WaypointRecord;
//!
//! fn place(records: &[WaypointRecord]) {
//!     if let Ok(builder) = MarkerBuilder::with_defaults(16) {
//!         for record in records {
//!             let built = builder.build(record, &DisplayNames::default());
//!             println!("{} at {:?}", built.marker.key, built.marker.point);
//!         }
//!     }
//! }
//! ```

pub mod context;
pub mod engine;
pub mod error;

pub use context::{escape_markup, DisplayNames, MalformedField, TooltipContext};
pub use engine::{BuiltMarker, MarkerBuilder, TooltipEngine, Tooltips};
pub use error::RenderError;
