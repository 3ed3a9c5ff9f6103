//! Tone grouping: collapse decoded color codes into a few binary masks.
//!
//! Every code belongs to one of seven [`ToneGroup`]s or is unclassified.
//! Unclassified codes are the interpolated values anti-aliasing leaves
//! behind; they are dropped rather than snapped to a neighbour so that
//! strokes keep the exact outline the device drew.

use super::palette::{codes, Palette};
use super::trace::{Bitmap, PathNode};
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ToneGroup {
    Black,
    DarkGray,
    LightGray,
    /// White or transparent; never drawn.
    White,
    MarkerBlack,
    MarkerDarkGray,
    MarkerLightGray,
}

impl ToneGroup {
    pub const ALL: [ToneGroup; 7] = [
        ToneGroup::Black,
        ToneGroup::DarkGray,
        ToneGroup::LightGray,
        ToneGroup::White,
        ToneGroup::MarkerBlack,
        ToneGroup::MarkerDarkGray,
        ToneGroup::MarkerLightGray,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Palette code whose color and alpha the whole group is drawn with.
    pub fn representative_code(self) -> u8 {
        match self {
            ToneGroup::Black => codes::BLACK,
            ToneGroup::DarkGray => codes::DARK_GRAY,
            ToneGroup::LightGray => codes::LIGHT_GRAY,
            ToneGroup::White => codes::WHITE,
            ToneGroup::MarkerBlack => codes::MARKER_BLACK,
            ToneGroup::MarkerDarkGray => codes::MARKER_DARK_GRAY,
            ToneGroup::MarkerLightGray => codes::MARKER_LIGHT_GRAY,
        }
    }

    pub fn is_discarded(self) -> bool {
        self == ToneGroup::White
    }
}

impl fmt::Display for ToneGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ToneGroup::Black => "black",
            ToneGroup::DarkGray => "dark gray",
            ToneGroup::LightGray => "light gray",
            ToneGroup::White => "white",
            ToneGroup::MarkerBlack => "marker black",
            ToneGroup::MarkerDarkGray => "marker dark gray",
            ToneGroup::MarkerLightGray => "marker light gray",
        })
    }
}

/// Group of a raw color code; `None` for anti-aliasing artifacts.
pub fn classify(code: u8) -> Option<ToneGroup> {
    match code {
        codes::BLACK | codes::BLACK_ALIAS => Some(ToneGroup::Black),
        codes::DARK_GRAY_ALIAS | codes::DARK_GRAY | codes::DARK_GRAY_COMPAT => {
            Some(ToneGroup::DarkGray)
        }
        codes::LIGHT_GRAY_ALIAS | codes::LIGHT_GRAY | codes::LIGHT_GRAY_COMPAT => {
            Some(ToneGroup::LightGray)
        }
        codes::TRANSPARENT | codes::WHITE_ALIAS | codes::BACKGROUND | codes::WHITE => {
            Some(ToneGroup::White)
        }
        codes::MARKER_BLACK => Some(ToneGroup::MarkerBlack),
        codes::MARKER_DARK_GRAY => Some(ToneGroup::MarkerDarkGray),
        codes::MARKER_LIGHT_GRAY => Some(ToneGroup::MarkerLightGray),
        _ => None,
    }
}

/// One mask per populated, drawable group, in group order.
pub fn group_masks(code_map: &[u8], width: usize, height: usize) -> Vec<(ToneGroup, Bitmap)> {
    let mut masks: [Option<Bitmap>; 7] = Default::default();
    for (idx, &code) in code_map.iter().enumerate().take(width * height) {
        let Some(group) = classify(code) else {
            continue;
        };
        if group.is_discarded() {
            continue;
        }
        masks[group.index()]
            .get_or_insert_with(|| Bitmap::new(width, height))
            .set_index(idx, true);
    }
    ToneGroup::ALL
        .into_iter()
        .zip(masks)
        .filter_map(|(g, m)| m.map(|m| (g, m)))
        .collect()
}

/// Mask of dark pixels of an embedded image, cropped to the page.
///
/// Luma is computed on alpha-premultiplied 16-bit channels; a pixel is
/// foreground when it is not fully transparent and its luma is below half.
pub fn luma_mask(img: &RgbaImage, width: usize, height: usize) -> Bitmap {
    let mut mask = Bitmap::new(width, height);
    let max_x = (img.width() as usize).min(width);
    let max_y = (img.height() as usize).min(height);
    for y in 0..max_y {
        for x in 0..max_x {
            let [r, g, b, a] = img.get_pixel(x as u32, y as u32).0;
            if a == 0 {
                continue;
            }
            let premul = |c: u8| c as u32 * 257 * a as u32 / 255;
            let luma = (299 * premul(r) + 587 * premul(g) + 114 * premul(b)) / 1000;
            if luma < 0x8000 {
                mask.set(x, y, true);
            }
        }
    }
    mask
}

/// Decode an embedded PNG layer.
pub fn decode_png(data: &[u8]) -> Result<RgbaImage, image::ImageError> {
    Ok(image::load_from_memory_with_format(data, image::ImageFormat::Png)?.to_rgba8())
}

/// One traced, single-colored layer of a page.
#[derive(Debug, Clone, PartialEq)]
pub struct ToneLayer {
    pub rgb: [u8; 3],
    /// 255 is opaque.
    pub alpha: u8,
    pub paths: Vec<PathNode>,
}

impl ToneLayer {
    /// Layer colored like `group` under `palette`.
    pub fn for_group(group: ToneGroup, palette: &Palette, paths: Vec<PathNode>) -> Self {
        let code = group.representative_code();
        Self {
            rgb: palette.rgb(code),
            alpha: palette.alpha(code),
            paths,
        }
    }

    pub fn is_marker(&self) -> bool {
        self.alpha < 0xFF
    }
}

/// Stable sort that moves translucent (marker) layers before opaque ink.
pub fn markers_first(layers: &mut [ToneLayer]) {
    layers.sort_by_key(|l| !l.is_marker());
}
