use ttf_parser::gpos::{PairAdjustment, PositioningSubtable};
use ttf_parser::opentype_layout::LayoutTable;
use ttf_parser::{Face, GlyphId, Tag};

use crate::foundation::error::{LayercastError, LayercastResult};

/// Advance width of `text` set at `font_size` pixels.
///
/// Sums horizontal advances of each character's glyph (missing characters fall back to `.notdef`)
/// scaled by `font_size / units_per_em`, plus the pair kerning between consecutive glyphs
/// (see [`pair_kerning`]).
pub(crate) fn measure_text(data: &[u8], text: &str, font_size: f64) -> LayercastResult<f64> {
    let face = Face::parse(data, 0)
        .map_err(|err| LayercastError::evaluation(format!("parse font face: {err}")))?;
    let units_per_em = face.units_per_em();
    if units_per_em == 0 {
        return Err(LayercastError::evaluation("font face has units_per_em = 0"));
    }
    let scale = font_size / f64::from(units_per_em);

    let mut width = 0.0;
    let mut prev: Option<GlyphId> = None;
    for ch in text.chars() {
        let glyph = face.glyph_index(ch).unwrap_or(GlyphId(0));
        if let Some(left) = prev {
            width += pair_kerning(&face, left, glyph) * scale;
        }
        width += f64::from(face.glyph_hor_advance(glyph).unwrap_or(0)) * scale;
        prev = Some(glyph);
    }
    Ok(width)
}

/// Horizontal kerning between two glyphs in font design units.
///
/// Pair adjustments of the GPOS `kern` feature take precedence. Faces without that feature fall
/// back to the legacy `kern` table.
pub(crate) fn pair_kerning(face: &Face<'_>, left: GlyphId, right: GlyphId) -> f64 {
    if let Some(gpos) = face.tables().gpos {
        let lookups = kern_feature_lookups(&gpos);
        if !lookups.is_empty() {
            return lookups
                .into_iter()
                .filter_map(|index| gpos.lookups.get(index))
                .filter_map(|lookup| {
                    lookup
                        .subtables
                        .into_iter::<PositioningSubtable<'_>>()
                        .find_map(|subtable| match subtable {
                            PositioningSubtable::Pair(pair) => pair_adjustment(&pair, left, right),
                            _ => None,
                        })
                })
                .map(f64::from)
                .sum();
        }
    }
    legacy_kerning(face, left, right)
}

fn kern_feature_lookups(gpos: &LayoutTable<'_>) -> Vec<u16> {
    let tag = Tag::from_bytes(b"kern");
    let mut lookups: Vec<u16> = gpos
        .features
        .into_iter()
        .filter(|feature| feature.tag == tag)
        .flat_map(|feature| feature.lookup_indices)
        .collect();
    lookups.sort_unstable();
    lookups.dedup();
    lookups
}

fn pair_adjustment(pair: &PairAdjustment<'_>, left: GlyphId, right: GlyphId) -> Option<i32> {
    let (first, second) = match pair {
        PairAdjustment::Format1 { coverage, sets } => {
            let index = coverage.get(left)?;
            sets.get(index)?.get(right)?
        }
        PairAdjustment::Format2 {
            coverage,
            classes,
            matrix,
        } => {
            coverage.get(left)?;
            matrix.get((classes.0.get(left), classes.1.get(right)))?
        }
    };
    Some(i32::from(first.x_advance) + i32::from(second.x_advance))
}

fn legacy_kerning(face: &Face<'_>, left: GlyphId, right: GlyphId) -> f64 {
    let Some(kern) = face.tables().kern else {
        return 0.0;
    };
    kern.subtables
        .into_iter()
        .filter(|st| st.horizontal && !st.variable)
        .find_map(|st| st.glyphs_kerning(left, right))
        .map(f64::from)
        .unwrap_or(0.0)
}

#[cfg(test)]
#[path = "../../tests/unit/text/metrics.rs"]
mod tests;
