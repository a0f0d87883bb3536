use base64::Engine as _;

use crate::fonts::catalog::{FontDescriptor, FontStyle};

/// Self-contained font declaration: everything a renderer needs without a font lookup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FaceDescriptor {
    /// Logical family name the face is declared under.
    pub family: String,
    /// MIME type of the embedded binary.
    pub mime_type: &'static str,
    /// Base64 of the font binary.
    pub data_base64: String,
    /// CSS `format()` hint.
    pub format: &'static str,
    /// Renderer-safe weight.
    pub weight: u16,
    /// Slant.
    pub style: FontStyle,
}

impl FaceDescriptor {
    pub(crate) fn new(desc: &FontDescriptor, data: &[u8]) -> Self {
        Self {
            family: desc.name.clone(),
            mime_type: desc.format.mime_type(),
            data_base64: base64::engine::general_purpose::STANDARD.encode(data),
            format: desc.format.css_format(),
            weight: desc.renderer_weight(),
            style: desc.style,
        }
    }

    /// `@font-face` rule with the binary inlined as a data URL.
    pub fn to_css(&self) -> String {
        format!(
            "@font-face {{ font-family: '{family}'; src: url('data:{mime};charset=utf-8;base64,{data}') format('{format}'); font-weight: {weight}; font-style: {style}; font-display: block; }}",
            family = self.family.replace('\'', ""),
            mime = self.mime_type,
            data = self.data_base64,
            format = self.format,
            weight = self.weight,
            style = self.style.as_css(),
        )
    }
}
