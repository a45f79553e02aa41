//! Tooltip context: the escaped, placeholder-filled rendering payload built
//! from one [`WaypointRecord`].

use chrono::Local;
use serde::{Deserialize, Serialize};

use waymark_core::types::WaypointRecord;

use crate::error::RenderError;

pub const UNKNOWN_OWNER: &str = "Unknown";
pub const UNKNOWN_WORLD: &str = "Unknown World";
pub const UNKNOWN_CREATED: &str = "Unknown";

/// Timestamp layout used in the click tooltip, rendered in the host zone.
pub const CREATED_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Names resolved outside the record itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplayNames {
    pub owner: Option<String>,
    pub world: Option<String>,
}

impl DisplayNames {
    pub fn new(owner: Option<String>, world: Option<String>) -> Self {
        Self { owner, world }
    }
}

/// A derived display field that could not be resolved and was replaced by
/// its placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MalformedField {
    OwnerName,
    WorldName,
    CreatedAt,
    /// A tooltip template failed and the minimal tooltip was used instead.
    Template,
}

/// Rendering payload handed to the hover and click templates.
///
/// Every string in here is already markup-escaped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TooltipContext {
    pub name: String,
    pub owner: String,
    pub world: String,
    pub locked: bool,
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub created: String,
}

impl TooltipContext {
    /// Build the context for `record`, returning the fields that fell back
    /// to placeholders.
    pub fn from_record(
        record: &WaypointRecord,
        names: &DisplayNames,
    ) -> (Self, Vec<MalformedField>) {
        let mut degraded = Vec::new();

        let owner = resolved(names.owner.as_deref(), UNKNOWN_OWNER, || {
            degraded.push(MalformedField::OwnerName)
        });
        let world = resolved(names.world.as_deref(), UNKNOWN_WORLD, || {
            degraded.push(MalformedField::WorldName)
        });
        let created = match record.created_at {
            Some(ts) => ts.with_timezone(&Local).format(CREATED_FORMAT).to_string(),
            None => {
                degraded.push(MalformedField::CreatedAt);
                UNKNOWN_CREATED.to_string()
            }
        };

        let ctx = TooltipContext {
            name: escape_markup(&record.name),
            owner: escape_markup(owner),
            world: escape_markup(world),
            locked: record.locked,
            x: record.position.x,
            y: record.position.y,
            z: record.position.z,
            created,
        };
        (ctx, degraded)
    }

    /// Convert to a [`tera::Context`] for rendering.
    pub fn to_tera_context(&self) -> Result<tera::Context, RenderError> {
        tera::Context::from_serialize(self).map_err(RenderError::from)
    }
}

fn resolved<'a>(value: Option<&'a str>, placeholder: &'a str, on_missing: impl FnOnce()) -> &'a str {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v,
        _ => {
            on_missing();
            placeholder
        }
    }
}

/// Escape markup-reserved characters with tera's HTML escaper
/// (`& < > " ' /`). Autoescaping is off in the engine, so this is the only
/// escaping user strings get.
pub fn escape_markup(input: &str) -> String {
    tera::escape_html(input)
}
