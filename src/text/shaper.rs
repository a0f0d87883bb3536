use std::sync::Arc;
use std::time::Duration;

use crate::cache::memory::MemoryCache;
use crate::fonts::catalog::{FontCatalog, FontDescriptor, FontStyle, split_family_list};
use crate::foundation::error::{LayercastError, LayercastResult};
use crate::text::metrics::measure_text;

const DEFAULT_MEASURE_CAPACITY: usize = 4096;
const DEFAULT_MEASURE_TTL: Duration = Duration::from_secs(5 * 60);

/// Font selection for a measurement.
#[derive(Clone, Debug, PartialEq)]
pub struct FontQuery {
    /// Font size in pixels.
    pub size: f64,
    /// Comma-separated family fallback list.
    pub family: String,
    /// Numeric weight (100..=900).
    pub weight: u16,
    /// Style.
    pub style: FontStyle,
}

impl FontQuery {
    /// Query for `family` at `size` px, regular weight and normal style.
    pub fn new(family: impl Into<String>, size: f64) -> Self {
        Self {
            size,
            family: family.into(),
            weight: 400,
            style: FontStyle::Normal,
        }
    }

    /// Override weight.
    pub fn with_weight(mut self, weight: u16) -> Self {
        self.weight = weight;
        self
    }

    /// Override style.
    pub fn with_style(mut self, style: FontStyle) -> Self {
        self.style = style;
        self
    }

    fn cache_key(&self, text: &str) -> String {
        format!(
            "{}|{}|{}|{}|{text}",
            self.size,
            self.family,
            self.weight,
            self.style.as_css()
        )
    }
}

/// Text measurement and line breaking against the fonts of a [`FontCatalog`].
///
/// Widths come from the first candidate of the family list that resolves and parses; results are
/// memoized per `(text, size, family, weight, style)`.
#[derive(Debug)]
pub struct TextShaper {
    catalog: Arc<FontCatalog>,
    measurements: MemoryCache<f64>,
}

impl TextShaper {
    /// Shaper with the default measurement cache (4096 entries, five minutes).
    pub fn new(catalog: Arc<FontCatalog>) -> Self {
        Self::with_cache(catalog, DEFAULT_MEASURE_CAPACITY, DEFAULT_MEASURE_TTL)
    }

    /// Shaper with an explicit measurement cache bound and lifetime.
    pub fn with_cache(catalog: Arc<FontCatalog>, capacity: usize, ttl: Duration) -> Self {
        Self {
            catalog,
            measurements: MemoryCache::new(capacity, ttl),
        }
    }

    /// Catalog fonts are resolved against.
    pub fn catalog(&self) -> &Arc<FontCatalog> {
        &self.catalog
    }

    /// Width in pixels of a single line of `text`.
    ///
    /// Fails with [`LayercastError::FontResolution`] when no family in `query.family` resolves to
    /// a usable font.
    pub fn measure(&self, text: &str, query: &FontQuery) -> LayercastResult<f64> {
        if !query.size.is_finite() || query.size <= 0.0 {
            return Err(LayercastError::validation("font size must be finite and > 0"));
        }
        let key = query.cache_key(text);
        self.measurements
            .get_or_compute(&key, || self.measure_uncached(text, query))
    }

    /// Width of each line, measured independently.
    pub fn measure_lines<S: AsRef<str>>(
        &self,
        lines: &[S],
        query: &FontQuery,
    ) -> LayercastResult<Vec<f64>> {
        lines
            .iter()
            .map(|line| self.measure(line.as_ref(), query))
            .collect()
    }

    /// Break `text` into lines no wider than `max_width`. See [`wrap_lines`].
    pub fn wrap(
        &self,
        text: &str,
        max_width: Option<f64>,
        query: &FontQuery,
    ) -> LayercastResult<Vec<String>> {
        wrap_lines(text, max_width, |candidate| self.measure(candidate, query))
    }

    /// First usable font for `query`, following the family fallback chain.
    pub fn primary_font(&self, query: &FontQuery) -> LayercastResult<Arc<FontDescriptor>> {
        self.first_usable(query, "").map(|(desc, _)| desc)
    }

    /// Drop memoized widths.
    pub fn clear_cache(&self) {
        self.measurements.clear();
    }

    fn measure_uncached(&self, text: &str, query: &FontQuery) -> LayercastResult<f64> {
        self.first_usable(query, text).map(|(_, width)| width)
    }

    fn first_usable(
        &self,
        query: &FontQuery,
        text: &str,
    ) -> LayercastResult<(Arc<FontDescriptor>, f64)> {
        for family in split_family_list(&query.family) {
            let Some(desc) = self.catalog.resolve(&family, query.weight, query.style) else {
                continue;
            };
            let measured = self
                .catalog
                .binary(&desc)
                .and_then(|data| measure_text(&data, text, query.size));
            match measured {
                Ok(width) => return Ok((desc, width)),
                Err(err) => tracing::warn!(
                    family = %family,
                    path = %desc.path,
                    error = %err,
                    "font unusable for measurement, trying next candidate"
                ),
            }
        }
        Err(LayercastError::FontResolution {
            family: query.family.clone(),
        })
    }
}

/// Greedy character-granularity line breaking.
///
/// Without a positive `max_width` the text is only split on explicit newlines. Otherwise each
/// paragraph grows one character at a time; when the candidate line measures wider than
/// `max_width` and the current line is non-empty, the current line is committed and the character
/// starts the next one. Empty paragraphs stay as empty lines. A single character wider than
/// `max_width` occupies its own line.
pub fn wrap_lines<F>(text: &str, max_width: Option<f64>, mut measure: F) -> LayercastResult<Vec<String>>
where
    F: FnMut(&str) -> LayercastResult<f64>,
{
    let max_width = match max_width {
        Some(w) if w.is_finite() && w > 0.0 => w,
        _ => return Ok(text.split('\n').map(str::to_owned).collect()),
    };

    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        if paragraph.is_empty() {
            lines.push(String::new());
            continue;
        }
        let mut current = String::new();
        for ch in paragraph.chars() {
            let mut candidate = current.clone();
            candidate.push(ch);
            if !current.is_empty() && measure(&candidate)? > max_width {
                lines.push(std::mem::replace(&mut current, ch.to_string()));
            } else {
                current = candidate;
            }
        }
        lines.push(current);
    }

    if lines.is_empty() {
        lines.push(text.to_owned());
    }
    Ok(lines)
}

#[cfg(test)]
#[path = "../../tests/unit/text/shaper.rs"]
mod tests;
