use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::fonts::face::FaceDescriptor;
use crate::fonts::storage::FontStorage;
use crate::foundation::error::LayercastResult;

/// Binary container format of a font file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontFormat {
    /// `.ttf`
    #[default]
    TrueType,
    /// `.otf`
    OpenType,
    /// `.woff`
    Woff,
    /// `.woff2`
    Woff2,
}

impl FontFormat {
    /// MIME type used in data URLs.
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::TrueType => "font/ttf",
            Self::OpenType => "font/otf",
            Self::Woff => "font/woff",
            Self::Woff2 => "font/woff2",
        }
    }

    /// Value of the CSS `format()` hint.
    pub fn css_format(self) -> &'static str {
        match self {
            Self::TrueType => "truetype",
            Self::OpenType => "opentype",
            Self::Woff => "woff",
            Self::Woff2 => "woff2",
        }
    }
}

/// Font slant. `oblique` is accepted on input and treated as italic.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontStyle {
    /// Upright.
    #[default]
    Normal,
    /// Italic (or oblique).
    #[serde(alias = "oblique")]
    Italic,
}

impl FontStyle {
    /// CSS keyword.
    pub fn as_css(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Italic => "italic",
        }
    }
}

/// A registered font: logical identity plus where its binary lives.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FontDescriptor {
    /// Logical family name, e.g. `Noto Sans SC`.
    pub name: String,
    /// Storage-relative path of the binary.
    pub path: String,
    /// Container format.
    #[serde(default)]
    pub format: FontFormat,
    /// Numeric weight (100..=900).
    #[serde(default = "default_weight")]
    pub weight: u16,
    /// Slant.
    #[serde(default)]
    pub style: FontStyle,
    /// Alternative names that resolve to this font.
    #[serde(default)]
    pub aliases: Vec<String>,
}

fn default_weight() -> u16 {
    400
}

impl FontDescriptor {
    /// Descriptor with weight 400, normal style and no aliases.
    pub fn new(name: impl Into<String>, path: impl Into<String>, format: FontFormat) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            format,
            weight: default_weight(),
            style: FontStyle::Normal,
            aliases: Vec::new(),
        }
    }

    /// Set the weight.
    pub fn with_weight(mut self, weight: u16) -> Self {
        self.weight = weight;
        self
    }

    /// Set the style.
    pub fn with_style(mut self, style: FontStyle) -> Self {
        self.style = style;
        self
    }

    /// Add aliases.
    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases.extend(aliases.into_iter().map(Into::into));
        self
    }

    /// Weight snapped to the set renderers accept (multiples of 100 in 100..=900), else 400.
    pub fn renderer_weight(&self) -> u16 {
        if (100..=900).contains(&self.weight) && self.weight % 100 == 0 {
            self.weight
        } else {
            400
        }
    }
}

/// Public listing entry for a registered font.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FontSummary {
    /// Logical name.
    pub name: String,
    /// Numeric weight.
    pub weight: u16,
    /// Slant.
    pub style: FontStyle,
    /// Container format.
    pub format: FontFormat,
    /// Aliases.
    pub aliases: Vec<String>,
}

/// Registry of fonts keyed by normalized `(name-or-alias, weight, style)` with a name-only fallback.
///
/// Built once at startup and then shared read-only; only the binary cache mutates afterwards.
pub struct FontCatalog {
    storage: Arc<dyn FontStorage>,
    fonts: Vec<Arc<FontDescriptor>>,
    keys: HashMap<String, usize>,
    binaries: Mutex<HashMap<String, Arc<[u8]>>>,
}

impl std::fmt::Debug for FontCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontCatalog")
            .field("fonts", &self.fonts.len())
            .field("keys", &self.keys.len())
            .finish_non_exhaustive()
    }
}

impl FontCatalog {
    /// Empty catalog reading binaries from `storage`.
    pub fn new(storage: Arc<dyn FontStorage>) -> Self {
        Self {
            storage,
            fonts: Vec::new(),
            keys: HashMap::new(),
            binaries: Mutex::new(HashMap::new()),
        }
    }

    /// Catalog pre-populated with the stock fonts (`Noto Sans SC` for CJK, `DIN Pro` bold Latin).
    pub fn with_default_fonts(storage: Arc<dyn FontStorage>) -> Self {
        let mut catalog = Self::new(storage);
        catalog.register(
            FontDescriptor::new("Noto Sans SC", "NotoSansSC-Regular.ttf", FontFormat::TrueType)
                .with_aliases(["NotoSansSC", "noto-sans-sc"]),
        );
        catalog.register(
            FontDescriptor::new("DIN Pro", "dinpro_bold.otf", FontFormat::OpenType)
                .with_weight(700)
                .with_aliases(["DINPro", "din-pro", "DIN"]),
        );
        catalog
    }

    /// Register a font under its full key, its base key (if unclaimed) and the same for every
    /// alias. A later registration with an identical full key replaces the earlier one.
    pub fn register(&mut self, desc: FontDescriptor) {
        let idx = self.fonts.len();
        let names: SmallVec<[String; 4]> = std::iter::once(desc.name.clone())
            .chain(desc.aliases.iter().cloned())
            .collect();
        for name in &names {
            self.keys
                .insert(full_key(name, desc.weight, desc.style), idx);
            self.keys.entry(base_key(name)).or_insert(idx);
        }
        tracing::debug!(name = %desc.name, weight = desc.weight, style = desc.style.as_css(), "registered font");
        self.fonts.push(Arc::new(desc));
    }

    /// Resolve a single family name: exact `(name, weight, style)` first, then name only.
    pub fn resolve(
        &self,
        family: &str,
        weight: u16,
        style: FontStyle,
    ) -> Option<Arc<FontDescriptor>> {
        let family = clean_family(family);
        self.keys
            .get(&full_key(family, weight, style))
            .or_else(|| self.keys.get(&base_key(family)))
            .map(|&idx| self.fonts[idx].clone())
    }

    /// Resolve every candidate of a comma-separated family list, in order, skipping misses.
    pub fn resolve_family_list(
        &self,
        families: &str,
        weight: u16,
        style: FontStyle,
    ) -> Vec<Arc<FontDescriptor>> {
        split_family_list(families)
            .iter()
            .filter_map(|family| self.resolve(family, weight, style))
            .collect()
    }

    /// Every registered font once, in registration order (unique by name and path).
    pub fn all_fonts(&self) -> Vec<Arc<FontDescriptor>> {
        let mut seen = std::collections::HashSet::new();
        self.fonts
            .iter()
            .filter(|f| seen.insert((f.name.clone(), f.path.clone())))
            .cloned()
            .collect()
    }

    /// Listing of [`FontCatalog::all_fonts`].
    pub fn summaries(&self) -> Vec<FontSummary> {
        self.all_fonts()
            .iter()
            .map(|f| FontSummary {
                name: f.name.clone(),
                weight: f.weight,
                style: f.style,
                format: f.format,
                aliases: f.aliases.clone(),
            })
            .collect()
    }

    /// Raw font bytes, loaded on first use and cached by path.
    pub fn binary(&self, desc: &FontDescriptor) -> LayercastResult<Arc<[u8]>> {
        if let Some(bytes) = self.binaries.lock().get(&desc.path).cloned() {
            return Ok(bytes);
        }
        let bytes: Arc<[u8]> = self.storage.read_binary(&desc.path)?.into();
        self.binaries
            .lock()
            .insert(desc.path.clone(), bytes.clone());
        Ok(bytes)
    }

    /// Embeddable face declaration for `desc`.
    pub fn face_descriptor(&self, desc: &FontDescriptor) -> LayercastResult<FaceDescriptor> {
        let data = self.binary(desc)?;
        Ok(FaceDescriptor::new(desc, &data))
    }

    /// `@font-face` rule for `desc`, or an empty string when the binary cannot be read.
    pub fn font_face_css(&self, desc: &FontDescriptor) -> String {
        match self.face_descriptor(desc) {
            Ok(face) => face.to_css(),
            Err(err) => {
                tracing::warn!(font = %desc.name, path = %desc.path, error = %err, "failed to read font file");
                String::new()
            }
        }
    }

    /// `@font-face` rules for every registered font.
    pub fn all_font_faces_css(&self) -> String {
        self.all_fonts()
            .iter()
            .map(|f| self.font_face_css(f))
            .filter(|css| !css.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Forget loaded binaries.
    pub fn clear_binary_cache(&self) {
        self.binaries.lock().clear();
    }

    /// Number of distinct registered fonts.
    pub fn len(&self) -> usize {
        self.all_fonts().len()
    }

    /// Return `true` when no font is registered.
    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }
}

/// Split a CSS-style family list into trimmed, unquoted candidates.
pub(crate) fn split_family_list(families: &str) -> SmallVec<[String; 4]> {
    families
        .split(',')
        .map(clean_family)
        .filter(|f| !f.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Render a family list for SVG/CSS: named families quoted, generic keywords bare.
pub(crate) fn css_family_list(families: &str) -> String {
    const GENERIC: [&str; 7] = [
        "serif",
        "sans-serif",
        "monospace",
        "cursive",
        "fantasy",
        "system-ui",
        "emoji",
    ];
    split_family_list(families)
        .iter()
        .map(|f| {
            if GENERIC.contains(&f.to_ascii_lowercase().as_str()) {
                f.clone()
            } else {
                format!("'{}'", f.replace('\'', ""))
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn clean_family(family: &str) -> &str {
    family.trim().trim_matches(|c| c == '"' || c == '\'').trim()
}

fn base_key(name: &str) -> String {
    name.trim().to_lowercase()
}

fn full_key(name: &str, weight: u16, style: FontStyle) -> String {
    format!("{}-{weight}-{}", base_key(name), style.as_css())
}

#[cfg(test)]
#[path = "../../tests/unit/fonts/catalog.rs"]
mod tests;
