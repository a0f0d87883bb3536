use serde::{Deserialize, Serialize};

use crate::foundation::math::{add_sat_u8, mul_div255_u8};

/// How a placed raster combines with the canvas beneath it.
///
/// Porter-Duff operators plus the separable blend modes. Unknown names deserialize to
/// [`BlendMode::Over`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum BlendMode {
    Clear,
    Source,
    #[default]
    Over,
    In,
    Out,
    Atop,
    Dest,
    DestOver,
    DestIn,
    DestOut,
    DestAtop,
    Xor,
    Add,
    Saturate,
    Multiply,
    Screen,
    Overlay,
    Darken,
    Lighten,
    ColorDodge,
    ColorBurn,
    HardLight,
    SoftLight,
    Difference,
    Exclusion,
}

impl BlendMode {
    /// Canonical kebab-case name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Clear => "clear",
            Self::Source => "source",
            Self::Over => "over",
            Self::In => "in",
            Self::Out => "out",
            Self::Atop => "atop",
            Self::Dest => "dest",
            Self::DestOver => "dest-over",
            Self::DestIn => "dest-in",
            Self::DestOut => "dest-out",
            Self::DestAtop => "dest-atop",
            Self::Xor => "xor",
            Self::Add => "add",
            Self::Saturate => "saturate",
            Self::Multiply => "multiply",
            Self::Screen => "screen",
            Self::Overlay => "overlay",
            Self::Darken => "darken",
            Self::Lighten => "lighten",
            Self::ColorDodge => "color-dodge",
            Self::ColorBurn => "color-burn",
            Self::HardLight => "hard-light",
            Self::SoftLight => "soft-light",
            Self::Difference => "difference",
            Self::Exclusion => "exclusion",
        }
    }
}

impl std::str::FromStr for BlendMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "clear" => Self::Clear,
            "source" => Self::Source,
            "over" | "normal" => Self::Over,
            "in" => Self::In,
            "out" => Self::Out,
            "atop" => Self::Atop,
            "dest" => Self::Dest,
            "dest-over" => Self::DestOver,
            "dest-in" => Self::DestIn,
            "dest-out" => Self::DestOut,
            "dest-atop" => Self::DestAtop,
            "xor" => Self::Xor,
            "add" => Self::Add,
            "saturate" => Self::Saturate,
            "multiply" => Self::Multiply,
            "screen" => Self::Screen,
            "overlay" => Self::Overlay,
            "darken" => Self::Darken,
            "lighten" => Self::Lighten,
            "color-dodge" | "colour-dodge" => Self::ColorDodge,
            "color-burn" | "colour-burn" => Self::ColorBurn,
            "hard-light" => Self::HardLight,
            "soft-light" => Self::SoftLight,
            "difference" => Self::Difference,
            "exclusion" => Self::Exclusion,
            other => return Err(format!("unknown blend mode \"{other}\"")),
        })
    }
}

impl Serialize for BlendMode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for BlendMode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(raw.parse().unwrap_or_else(|err| {
            tracing::warn!(%err, "falling back to over");
            Self::Over
        }))
    }
}

/// Blend `src` onto `dst`, both equal-length premultiplied RGBA8 spans.
pub(crate) fn blend_span(dst: &mut [u8], src: &[u8], mode: BlendMode) {
    debug_assert_eq!(dst.len(), src.len());
    // Dispatch once per span; each arm monomorphizes its own kernel.
    match mode {
        BlendMode::Over => over_span(dst, src),
        BlendMode::Clear => porter_duff_span(dst, src, |_, _| (0.0, 0.0)),
        BlendMode::Source => porter_duff_span(dst, src, |_, _| (1.0, 0.0)),
        BlendMode::In => porter_duff_span(dst, src, |_, da| (da, 0.0)),
        BlendMode::Out => porter_duff_span(dst, src, |_, da| (1.0 - da, 0.0)),
        BlendMode::Atop => porter_duff_span(dst, src, |sa, da| (da, 1.0 - sa)),
        BlendMode::Dest => porter_duff_span(dst, src, |_, _| (0.0, 1.0)),
        BlendMode::DestOver => porter_duff_span(dst, src, |_, da| (1.0 - da, 1.0)),
        BlendMode::DestIn => porter_duff_span(dst, src, |sa, _| (0.0, sa)),
        BlendMode::DestOut => porter_duff_span(dst, src, |sa, _| (0.0, 1.0 - sa)),
        BlendMode::DestAtop => porter_duff_span(dst, src, |sa, da| (1.0 - da, sa)),
        BlendMode::Xor => porter_duff_span(dst, src, |sa, da| (1.0 - da, 1.0 - sa)),
        BlendMode::Add => porter_duff_span(dst, src, |_, _| (1.0, 1.0)),
        BlendMode::Saturate => porter_duff_span(dst, src, |sa, da| {
            let fa = if sa > 0.0 {
                ((1.0 - da) / sa).min(1.0)
            } else {
                1.0
            };
            (fa, 1.0)
        }),
        BlendMode::Multiply => separable_span(dst, src, |s, d| s * d),
        BlendMode::Screen => separable_span(dst, src, |s, d| s + d - s * d),
        BlendMode::Overlay => separable_span(dst, src, |s, d| {
            if d <= 0.5 {
                2.0 * s * d
            } else {
                1.0 - 2.0 * (1.0 - s) * (1.0 - d)
            }
        }),
        BlendMode::Darken => separable_span(dst, src, |s, d| s.min(d)),
        BlendMode::Lighten => separable_span(dst, src, |s, d| s.max(d)),
        BlendMode::ColorDodge => separable_span(dst, src, |s, d| {
            if s >= 1.0 {
                1.0
            } else {
                (d / (1.0 - s)).min(1.0)
            }
        }),
        BlendMode::ColorBurn => separable_span(dst, src, |s, d| {
            if s <= 0.0 {
                0.0
            } else {
                1.0 - ((1.0 - d) / s).min(1.0)
            }
        }),
        BlendMode::SoftLight => separable_span(dst, src, |s, d| {
            if s <= 0.5 {
                d - (1.0 - 2.0 * s) * d * (1.0 - d)
            } else {
                let g = if d <= 0.25 {
                    ((16.0 * d - 12.0) * d + 4.0) * d
                } else {
                    d.sqrt()
                };
                d + (2.0 * s - 1.0) * (g - d)
            }
        }),
        BlendMode::HardLight => separable_span(dst, src, |s, d| {
            if s <= 0.5 {
                2.0 * s * d
            } else {
                1.0 - 2.0 * (1.0 - s) * (1.0 - d)
            }
        }),
        BlendMode::Difference => separable_span(dst, src, |s, d| (d - s).abs()),
        BlendMode::Exclusion => separable_span(dst, src, |s, d| d + s - 2.0 * d * s),
    }
}

fn over_span(dst: &mut [u8], src: &[u8]) {
    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let sa = u16::from(s[3]);
        if sa == 0 {
            continue;
        }
        let inv = 255u16 - sa;
        d[3] = add_sat_u8(s[3], mul_div255_u8(u16::from(d[3]), inv));
        for c in 0..3 {
            let dc = mul_div255_u8(u16::from(d[c]), inv);
            d[c] = add_sat_u8(s[c], dc);
        }
    }
}

#[inline(always)]
fn porter_duff_span<F>(dst: &mut [u8], src: &[u8], factors: F)
where
    F: Fn(f32, f32) -> (f32, f32),
{
    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let sa = f32::from(s[3]) / 255.0;
        let da = f32::from(d[3]) / 255.0;
        let (fa, fb) = factors(sa, da);
        for c in 0..4 {
            let out = f32::from(s[c]) * fa + f32::from(d[c]) * fb;
            d[c] = out.round().clamp(0.0, 255.0) as u8;
        }
    }
}

#[inline(always)]
fn separable_span<F>(dst: &mut [u8], src: &[u8], blend_fn: F)
where
    F: Fn(f32, f32) -> f32,
{
    fn unpremul(p: f32, a: f32) -> f32 {
        if a > 0.0 { (p / a).clamp(0.0, 1.0) } else { 0.0 }
    }

    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let sa = f32::from(s[3]) / 255.0;
        if sa <= 0.0 {
            continue;
        }
        let da = f32::from(d[3]) / 255.0;

        // out_a = sa + da * (1 - sa)
        // out_p = sp * (1 - da) + dp * (1 - sa) + B(sc, dc) * sa * da
        for c in 0..3 {
            let sp = f32::from(s[c]) / 255.0;
            let dp = f32::from(d[c]) / 255.0;
            let b = blend_fn(unpremul(sp, sa), unpremul(dp, da)).clamp(0.0, 1.0);
            let out = (sp * (1.0 - da) + dp * (1.0 - sa) + b * sa * da).clamp(0.0, 1.0);
            d[c] = (out * 255.0).round() as u8;
        }
        let out_a = (sa + da * (1.0 - sa)).clamp(0.0, 1.0);
        d[3] = (out_a * 255.0).round() as u8;
    }
}

#[cfg(test)]
#[path = "../../tests/unit/raster/blend.rs"]
mod tests;
