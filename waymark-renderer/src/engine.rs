//! Tera tooltip engine and the [`MarkerBuilder`].
//!
//! | Template          | Tooltip                         |
//! |-------------------|---------------------------------|
//! | `hover.html.tera` | shown while the cursor hovers   |
//! | `click.html.tera` | popup opened by clicking marker |
//!
//! Autoescaping is switched off: [`TooltipContext`] escapes every
//! user-supplied value before it reaches a template, so escaping again
//! would double-encode.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tera::Tera;

use waymark_core::types::{Marker, MarkerIcon, Point, WaypointRecord};

use crate::context::{DisplayNames, MalformedField, TooltipContext};
use crate::error::RenderError;

pub const HOVER_TEMPLATE: &str = "hover.html.tera";
pub const CLICK_TEMPLATE: &str = "click.html.tera";

const TPLS: &[(&str, &str)] = &[
    (HOVER_TEMPLATE, include_str!("templates/hover.html.tera")),
    (CLICK_TEMPLATE, include_str!("templates/click.html.tera")),
];

// ---------------------------------------------------------------------------
// Template loading helpers
// ---------------------------------------------------------------------------

fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> RenderError {
    RenderError::Io {
        path: path.into(),
        source,
    }
}

fn normalize_template_name(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/").to_lowercase()
}

fn load_user_templates(dir: &Path) -> Result<Vec<(String, String)>, RenderError> {
    if !dir.exists() {
        return Ok(vec![]);
    }
    let mut templates = Vec::new();
    let entries = std::fs::read_dir(dir).map_err(|e| io_err(dir, e))?;
    for entry in entries {
        let path = entry.map_err(|e| io_err(dir, e))?.path();
        if !path.is_file() || path.extension().and_then(|s| s.to_str()) != Some("tera") {
            continue;
        }
        let Some(file_name) = path.file_name() else {
            continue;
        };
        let name = normalize_template_name(Path::new(file_name));
        let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
        templates.push((name, contents));
    }
    Ok(templates)
}

fn build_tera(user_template_dir: Option<&Path>) -> Result<Tera, RenderError> {
    let mut templates: HashMap<String, String> = TPLS
        .iter()
        .map(|(name, content)| (name.to_string(), content.to_string()))
        .collect();
    if let Some(dir) = user_template_dir {
        templates.extend(load_user_templates(dir)?);
    }

    let mut tera = Tera::default();
    tera.autoescape_on(vec![]);
    tera.add_raw_templates(templates.into_iter().collect::<Vec<_>>())?;
    Ok(tera)
}

// ---------------------------------------------------------------------------
// TooltipEngine
// ---------------------------------------------------------------------------

/// Rendered tooltip pair for one marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tooltips {
    pub hover: String,
    pub click: String,
}

/// Tera engine holding the embedded tooltip templates plus any overrides
/// found in the user template directory.
pub struct TooltipEngine {
    tera: Tera,
}

impl TooltipEngine {
    pub fn new(user_template_dir: Option<&Path>) -> Result<Self, RenderError> {
        Ok(TooltipEngine {
            tera: build_tera(user_template_dir)?,
        })
    }

    pub fn render(&self, ctx: &TooltipContext) -> Result<Tooltips, RenderError> {
        let tera_ctx = ctx.to_tera_context()?;
        Ok(Tooltips {
            hover: self.tera.render(HOVER_TEMPLATE, &tera_ctx)?,
            click: self.tera.render(CLICK_TEMPLATE, &tera_ctx)?,
        })
    }
}

/// Minimal tooltip used when a template cannot be rendered.
fn fallback_tooltips(ctx: &TooltipContext) -> Tooltips {
    Tooltips {
        hover: format!("<b>{}</b>", ctx.name),
        click: format!(
            "<b>{}</b><br>{}<br>{}, {}, {}",
            ctx.name, ctx.world, ctx.x, ctx.y, ctx.z
        ),
    }
}

// ---------------------------------------------------------------------------
// MarkerBuilder
// ---------------------------------------------------------------------------

/// A built marker plus the derived fields that degraded to placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltMarker {
    pub marker: Marker,
    pub degraded: Vec<MalformedField>,
}

impl BuiltMarker {
    pub fn is_degraded(&self) -> bool {
        !self.degraded.is_empty()
    }
}

/// Turns one waypoint record into exactly one [`Marker`].
///
/// Building never fails: unresolved names and missing timestamps become
/// placeholders, and a broken template falls back to a minimal tooltip.
pub struct MarkerBuilder {
    engine: TooltipEngine,
    icon_size: u32,
}

impl MarkerBuilder {
    pub fn new(engine: TooltipEngine, icon_size: u32) -> Self {
        Self { engine, icon_size }
    }

    /// Builder with the embedded templates only.
    pub fn with_defaults(icon_size: u32) -> Result<Self, RenderError> {
        Ok(Self::new(TooltipEngine::new(None)?, icon_size))
    }

    pub fn icon_size(&self) -> u32 {
        self.icon_size
    }

    pub fn build(&self, record: &WaypointRecord, names: &DisplayNames) -> BuiltMarker {
        let (ctx, mut degraded) = TooltipContext::from_record(record, names);
        let tooltips = match self.engine.render(&ctx) {
            Ok(tooltips) => tooltips,
            Err(_) => {
                degraded.push(MalformedField::Template);
                fallback_tooltips(&ctx)
            }
        };

        BuiltMarker {
            marker: Marker {
                key: Marker::key_for(&record.id),
                point: Point::from(record.position),
                icon: MarkerIcon::for_locked(record.locked),
                icon_size: self.icon_size,
                hover_tooltip: tooltips.hover,
                click_tooltip: tooltips.click,
            },
            degraded,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
