//! Color-code palettes.
//!
//! Run-length pixels carry an 8-bit color code. A [`Palette`] maps every
//! code to RGB plus alpha. Four anchor colors sit at fixed codes; codes
//! between two anchors are linearly interpolated per channel. A handful of
//! pen-tool aliases and the three marker codes are then pinned to anchors.

use crate::config::ColorConfig;
use crate::error::NoteError;
use once_cell::sync::Lazy;

/// Codes the four anchors are bound to, darkest first.
pub const ANCHOR_CODES: [u8; 4] = [0, 157, 201, 255];

/// Named color codes of the run-length format.
pub mod codes {
    pub const BLACK: u8 = 0x00;
    pub const BLACK_ALIAS: u8 = 0x61;
    /// Never emitted by the decoder; pixels keep their initial value.
    pub const TRANSPARENT: u8 = 0x62;
    pub const DARK_GRAY_ALIAS: u8 = 0x63;
    pub const LIGHT_GRAY_ALIAS: u8 = 0x64;
    pub const WHITE_ALIAS: u8 = 0x65;
    pub const MARKER_BLACK: u8 = 0x66;
    pub const MARKER_DARK_GRAY: u8 = 0x67;
    pub const MARKER_LIGHT_GRAY: u8 = 0x68;
    pub const DARK_GRAY: u8 = 0x9d;
    pub const DARK_GRAY_COMPAT: u8 = 0x9e;
    pub const LIGHT_GRAY: u8 = 0xc9;
    pub const LIGHT_GRAY_COMPAT: u8 = 0xca;
    pub const BACKGROUND: u8 = 0xfe;
    pub const WHITE: u8 = 0xff;
}

/// Marker alpha used when the configured opacity is zero (~15 %).
pub const DEFAULT_MARKER_ALPHA: u8 = 0x26;

/// 256-entry RGB + alpha lookup table. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    colors: [[u8; 3]; 256],
    alphas: [u8; 256],
}

static IDENTITY: Lazy<Palette> = Lazy::new(Palette::build_identity);

impl Palette {
    /// Build a palette from four anchors (black, dark gray, light gray, white).
    pub fn new(anchors: [[u8; 3]; 4], marker_opacity: f64) -> Self {
        let mut colors = [[0u8; 3]; 256];

        for seg in 0..3 {
            let (start, end) = (ANCHOR_CODES[seg] as usize, ANCHOR_CODES[seg + 1] as usize);
            let (from, to) = (anchors[seg], anchors[seg + 1]);
            let dist = (end - start) as f64;
            // Closed interval: shared endpoints are recomputed by both segments.
            for (code, color) in colors.iter_mut().enumerate().take(end + 1).skip(start) {
                let f = (code - start) as f64 / dist;
                for ch in 0..3 {
                    let delta = to[ch] as f64 - from[ch] as f64;
                    color[ch] = (from[ch] as f64 + f * delta) as u8;
                }
            }
        }

        let black = colors[ANCHOR_CODES[0] as usize];
        let dark = colors[ANCHOR_CODES[1] as usize];
        let light = colors[ANCHOR_CODES[2] as usize];
        let white = colors[ANCHOR_CODES[3] as usize];

        colors[codes::BLACK_ALIAS as usize] = black;
        colors[codes::DARK_GRAY_ALIAS as usize] = dark;
        colors[codes::LIGHT_GRAY_ALIAS as usize] = light;
        colors[codes::WHITE_ALIAS as usize] = white;

        colors[codes::MARKER_BLACK as usize] = black;
        colors[codes::MARKER_DARK_GRAY as usize] = dark;
        colors[codes::MARKER_LIGHT_GRAY as usize] = light;

        colors[codes::DARK_GRAY as usize] = dark;
        colors[codes::DARK_GRAY_COMPAT as usize] = dark;
        colors[codes::LIGHT_GRAY as usize] = light;
        colors[codes::LIGHT_GRAY_COMPAT as usize] = light;

        let mut alphas = [0xFFu8; 256];
        let marker_alpha = match (marker_opacity.clamp(0.0, 1.0) * 255.0) as u8 {
            0 => DEFAULT_MARKER_ALPHA,
            a => a,
        };
        for code in [
            codes::MARKER_BLACK,
            codes::MARKER_DARK_GRAY,
            codes::MARKER_LIGHT_GRAY,
        ] {
            alphas[code as usize] = marker_alpha;
        }

        Self { colors, alphas }
    }

    /// Build a palette from configured `#RRGGBB` anchors.
    pub fn from_config(colors: &ColorConfig, marker_opacity: f64) -> Result<Self, NoteError> {
        Ok(Self::new(colors.anchors()?, marker_opacity))
    }

    /// Grayscale palette mapping every code to itself, shared process-wide.
    ///
    /// Pen aliases still resolve to their anchor gray so that raw-luminance
    /// classification treats them like the canonical codes.
    pub fn identity() -> &'static Palette {
        &IDENTITY
    }

    fn build_identity() -> Self {
        let mut colors = [[0u8; 3]; 256];
        for (code, c) in colors.iter_mut().enumerate() {
            *c = [code as u8; 3];
        }
        for (code, gray) in [
            (codes::BLACK_ALIAS, 0u8),
            (codes::DARK_GRAY_ALIAS, 157),
            (codes::LIGHT_GRAY_ALIAS, 201),
            (codes::WHITE_ALIAS, 255),
            (codes::MARKER_BLACK, 0),
            (codes::MARKER_DARK_GRAY, 157),
            (codes::MARKER_LIGHT_GRAY, 201),
        ] {
            colors[code as usize] = [gray; 3];
        }
        Self {
            colors,
            alphas: [0xFF; 256],
        }
    }

    #[inline]
    pub fn rgb(&self, code: u8) -> [u8; 3] {
        self.colors[code as usize]
    }

    #[inline]
    pub fn alpha(&self, code: u8) -> u8 {
        self.alphas[code as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ANCHORS: [[u8; 3]; 4] = [
        [10, 200, 0],
        [80, 150, 60],
        [120, 100, 60],
        [250, 20, 255],
    ];

    #[test]
    fn anchors_are_exact() {
        let p = Palette::new(ANCHORS, 0.3);
        for (i, &code) in ANCHOR_CODES.iter().enumerate() {
            assert_eq!(p.rgb(code), ANCHORS[i], "code {code}");
        }
    }

    #[test]
    fn interpolation_is_monotonic_between_anchors() {
        let p = Palette::new(ANCHORS, 0.3);
        for seg in 0..3 {
            let (lo, hi) = (ANCHOR_CODES[seg], ANCHOR_CODES[seg + 1]);
            for ch in 0..3 {
                let rising = ANCHORS[seg + 1][ch] >= ANCHORS[seg][ch];
                for code in lo..hi {
                    // Skip the pinned alias codes; they are not interpolated.
                    if (0x61..=0x68).contains(&code) || (0x61..=0x68).contains(&(code + 1)) {
                        continue;
                    }
                    let (a, b) = (p.rgb(code)[ch], p.rgb(code + 1)[ch]);
                    if rising {
                        assert!(a <= b, "seg {seg} ch {ch} code {code}: {a} > {b}");
                    } else {
                        assert!(a >= b, "seg {seg} ch {ch} code {code}: {a} < {b}");
                    }
                }
            }
        }
    }

    #[test]
    fn midpoint_interpolates_linearly() {
        let p = Palette::new([[0; 3], [157; 3], [201; 3], [255; 3]], 0.0);
        // Gray anchors at their own code reproduce the identity ramp, up to
        // truncation of the interpolated value.
        for code in [1u8, 50, 96, 156, 170, 200, 230, 254] {
            let got = p.rgb(code)[0];
            assert!(code.abs_diff(got) <= 1, "code {code} -> {got}");
        }
    }

    #[test]
    fn aliases_and_markers_pin_to_anchors() {
        let p = Palette::new(ANCHORS, 0.5);
        assert_eq!(p.rgb(codes::BLACK_ALIAS), ANCHORS[0]);
        assert_eq!(p.rgb(codes::DARK_GRAY_ALIAS), ANCHORS[1]);
        assert_eq!(p.rgb(codes::LIGHT_GRAY_ALIAS), ANCHORS[2]);
        assert_eq!(p.rgb(codes::WHITE_ALIAS), ANCHORS[3]);
        assert_eq!(p.rgb(codes::DARK_GRAY_COMPAT), ANCHORS[1]);
        assert_eq!(p.rgb(codes::LIGHT_GRAY_COMPAT), ANCHORS[2]);
        assert_eq!(p.rgb(codes::MARKER_LIGHT_GRAY), ANCHORS[2]);
        assert_eq!(p.alpha(codes::MARKER_BLACK), 127);
        assert_eq!(p.alpha(codes::BLACK), 255);
        assert_eq!(p.alpha(codes::BLACK_ALIAS), 255);
    }

    #[test]
    fn zero_marker_opacity_uses_default() {
        let p = Palette::new(ANCHORS, 0.0);
        assert_eq!(p.alpha(codes::MARKER_DARK_GRAY), DEFAULT_MARKER_ALPHA);
    }

    #[test]
    fn identity_palette_is_shared_and_grayscale() {
        let a = Palette::identity();
        let b = Palette::identity();
        assert!(std::ptr::eq(a, b));
        assert_eq!(a.rgb(42), [42; 3]);
        assert_eq!(a.rgb(codes::MARKER_DARK_GRAY), [157; 3]);
        assert_eq!(a.alpha(codes::MARKER_BLACK), 255);
    }
}
