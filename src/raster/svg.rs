use std::sync::Arc;

use anyhow::Context;
use parking_lot::RwLock;
use usvg::fontdb;

use crate::fonts::catalog::FontCatalog;
use crate::foundation::error::{LayercastError, LayercastResult};
use crate::raster::buffer::PremulImage;

pub(crate) const MAX_DIM: u32 = 16_384;

/// Turns SVG markup into premultiplied pixels at an exact pixel size.
pub trait SvgRasterizer: Send + Sync {
    /// Rasterize `svg`, scaling its viewport to `width x height`.
    fn rasterize(&self, svg: &str, width: u32, height: u32) -> LayercastResult<PremulImage>;
}

/// [`SvgRasterizer`] backed by usvg/resvg.
///
/// The font database is built on first use from every font in the catalog. Each face answers to
/// its embedded family names plus the catalog's logical name and aliases, so markup can reference
/// fonts the same way layers do.
pub struct ResvgRasterizer {
    catalog: Arc<FontCatalog>,
    default_family: String,
    system_fonts: bool,
    fontdb: RwLock<Option<Arc<fontdb::Database>>>,
}

impl std::fmt::Debug for ResvgRasterizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResvgRasterizer")
            .field("default_family", &self.default_family)
            .field("system_fonts", &self.system_fonts)
            .field("fontdb_loaded", &self.fontdb.read().is_some())
            .finish()
    }
}

impl ResvgRasterizer {
    /// Rasterizer whose font database holds every font of `catalog`; `default_family` applies to text without a family.
    pub fn new(catalog: Arc<FontCatalog>, default_family: impl Into<String>) -> Self {
        Self {
            catalog,
            default_family: default_family.into(),
            system_fonts: true,
            fontdb: RwLock::new(None),
        }
    }

    /// Whether system fonts are loaded alongside catalog fonts (default: yes).
    pub fn with_system_fonts(mut self, enabled: bool) -> Self {
        self.system_fonts = enabled;
        self
    }

    /// Drop the font database; the next rasterization rebuilds it from the catalog.
    pub fn clear_font_cache(&self) {
        *self.fontdb.write() = None;
    }

    fn font_database(&self) -> Arc<fontdb::Database> {
        if let Some(db) = self.fontdb.read().as_ref() {
            return Arc::clone(db);
        }
        let mut guard = self.fontdb.write();
        if let Some(db) = guard.as_ref() {
            return Arc::clone(db);
        }
        let db = Arc::new(build_font_database(&self.catalog, self.system_fonts));
        *guard = Some(Arc::clone(&db));
        db
    }
}

impl SvgRasterizer for ResvgRasterizer {
    fn rasterize(&self, svg: &str, width: u32, height: u32) -> LayercastResult<PremulImage> {
        check_raster_size(width, height)?;
        let opts = usvg::Options {
            fontdb: self.font_database(),
            font_family: self.default_family.clone(),
            ..usvg::Options::default()
        };
        let tree = usvg::Tree::from_str(svg, &opts).context("parse svg tree")?;
        rasterize_tree(&tree, width, height)
    }
}

fn build_font_database(catalog: &FontCatalog, system_fonts: bool) -> fontdb::Database {
    let mut db = fontdb::Database::new();
    if system_fonts {
        db.load_system_fonts();
    }

    for desc in catalog.all_fonts() {
        let data = match catalog.binary(&desc) {
            Ok(data) => data,
            Err(err) => {
                tracing::warn!(font = %desc.name, path = %desc.path, error = %err, "font not loaded into rasterizer");
                continue;
            }
        };
        let ids = db.load_font_source(fontdb::Source::Binary(Arc::new(data)));
        for id in ids {
            let Some(mut info) = db.face(id).cloned() else {
                continue;
            };
            let logical = std::iter::once(&desc.name).chain(desc.aliases.iter());
            for name in logical.rev() {
                if !info.families.iter().any(|(f, _)| f.eq_ignore_ascii_case(name)) {
                    info.families
                        .insert(0, (name.clone(), fontdb::Language::English_UnitedStates));
                }
            }
            info.id = fontdb::ID::dummy();
            db.remove_face(id);
            db.push_face_info(info);
        }
    }

    tracing::debug!(faces = db.len(), "built rasterizer font database");
    db
}

fn check_raster_size(width: u32, height: u32) -> LayercastResult<()> {
    if width == 0 || height == 0 {
        return Err(LayercastError::evaluation(format!(
            "svg raster size must be non-zero, got {width}x{height}"
        )));
    }
    if width > MAX_DIM || height > MAX_DIM {
        return Err(LayercastError::evaluation(format!(
            "svg raster size too large: {width}x{height} (max {MAX_DIM}x{MAX_DIM})"
        )));
    }
    Ok(())
}

pub(crate) fn rasterize_tree(
    tree: &usvg::Tree,
    width: u32,
    height: u32,
) -> LayercastResult<PremulImage> {
    let mut pixmap = resvg::tiny_skia::Pixmap::new(width, height)
        .ok_or_else(|| LayercastError::evaluation("failed to allocate svg pixmap"))?;

    let sx = (width as f32) / tree.size().width();
    let sy = (height as f32) / tree.size().height();
    let xform = resvg::tiny_skia::Transform::from_scale(sx, sy);

    resvg::render(tree, xform, &mut pixmap.as_mut());
    PremulImage::from_raw(width, height, pixmap.take())
}

#[cfg(test)]
#[path = "../../tests/unit/raster/svg.rs"]
mod tests;
