//! Run-length pixel codec.
//!
//! A layer bitmap is a sequence of `(color_code, length_code)` byte pairs.
//! When not holding:
//!
//! | `length_code`  | run length                               |
//! |----------------|------------------------------------------|
//! | `0xFF`         | 16 384                                   |
//! | high bit set   | unknown yet: the pair is *held*          |
//! | otherwise      | `length_code + 1`                        |
//!
//! A held pair is resolved by the pair that follows it (see
//! [`resolve_hold`]). Runs never extend past the raster, and runs of the
//! transparent code are never emitted so those pixels keep whatever value
//! the sink was initialised with.

use super::palette::{codes, Palette};

/// Length of a `0xFF` run.
pub const MAX_RUN: usize = 0x4000;

/// Decoder state between two pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Holding { color: u8, length_code: u8 },
}

/// Outcome of the pair that follows a held pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Same color: one long run.
    Merged { color: u8, length: usize },
    /// Different color: the held run is flushed, then the new pair runs.
    Split {
        held: (u8, usize),
        next: (u8, usize),
    },
}

/// Length of a held run when it is flushed on its own.
#[inline]
pub fn held_run_length(length_code: u8) -> usize {
    (((length_code & 0x7F) as usize) + 1) << 7
}

/// Resolve a held `(color, length_code)` pair against the pair that follows.
pub fn resolve_hold(held: (u8, u8), next: (u8, u8)) -> Resolution {
    let (held_color, held_code) = held;
    let (color, code) = next;
    if color == held_color {
        Resolution::Merged {
            color,
            length: 1 + code as usize + held_run_length(held_code),
        }
    } else {
        Resolution::Split {
            held: (held_color, held_run_length(held_code)),
            next: (color, code as usize + 1),
        }
    }
}

/// Decode `data` over a raster of `pixel_count` pixels, calling
/// `emit(position, length, color_code)` for every visible run.
///
/// Decoding stops once the raster is full or the input runs out; a
/// truncated stream is not an error.
pub fn decode_runs<F>(data: &[u8], pixel_count: usize, mut emit: F)
where
    F: FnMut(usize, usize, u8),
{
    let mut pos = 0usize;
    let mut state = State::Idle;

    let mut put = |pos: &mut usize, length: usize, color: u8| {
        let length = length.min(pixel_count - *pos);
        if length > 0 && color != codes::TRANSPARENT {
            emit(*pos, length, color);
        }
        *pos += length;
    };

    for pair in data.chunks_exact(2) {
        if pos >= pixel_count {
            break;
        }
        let (color, code) = (pair[0], pair[1]);

        match state {
            State::Holding {
                color: held_color,
                length_code: held_code,
            } => {
                state = State::Idle;
                match resolve_hold((held_color, held_code), (color, code)) {
                    Resolution::Merged { color, length } => put(&mut pos, length, color),
                    Resolution::Split { held, next } => {
                        put(&mut pos, held.1, held.0);
                        put(&mut pos, next.1, next.0);
                    }
                }
            }
            State::Idle if code == 0xFF => put(&mut pos, MAX_RUN, color),
            State::Idle if code & 0x80 != 0 => {
                state = State::Holding {
                    color,
                    length_code: code,
                }
            }
            State::Idle => put(&mut pos, code as usize + 1, color),
        }
    }

    if let State::Holding { color, length_code } = state {
        if pos < pixel_count {
            put(&mut pos, held_run_length(length_code), color);
        }
    }
}

/// Fill `buf[start..end]` by repeating `unit`, doubling the filled prefix
/// each step. `end` is clamped to the buffer.
pub fn fill_pattern(buf: &mut [u8], start: usize, end: usize, unit: &[u8]) {
    let end = end.min(buf.len());
    if start >= end || unit.is_empty() {
        return;
    }
    let span = end - start;
    let first = unit.len().min(span);
    buf[start..start + first].copy_from_slice(&unit[..first]);
    let mut filled = first;
    while filled < span {
        let n = filled.min(span - filled);
        buf.copy_within(start..start + n, start + filled);
        filled += n;
    }
}

/// Sink (a): write raw color codes, one byte per pixel.
pub fn decode_to_codes(data: &[u8], codes_buf: &mut [u8]) {
    let pixel_count = codes_buf.len();
    decode_runs(data, pixel_count, |pos, len, code| {
        fill_pattern(codes_buf, pos, pos + len, &[code]);
    });
}

/// Sink (b): resolve codes through `palette` into an RGB raster.
pub fn decode_to_rgb(data: &[u8], rgb: &mut [u8], palette: &Palette) {
    let pixel_count = rgb.len() / 3;
    decode_runs(data, pixel_count, |pos, len, code| {
        fill_pattern(rgb, pos * 3, (pos + len) * 3, &palette.rgb(code));
    });
}

/// Sink (c): resolve codes through `palette` into an RGBA raster.
pub fn decode_to_rgba(data: &[u8], rgba: &mut [u8], palette: &Palette) {
    let pixel_count = rgba.len() / 4;
    decode_runs(data, pixel_count, |pos, len, code| {
        let [r, g, b] = palette.rgb(code);
        fill_pattern(rgba, pos * 4, (pos + len) * 4, &[r, g, b, palette.alpha(code)]);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runs(data: &[u8], pixel_count: usize) -> Vec<(usize, usize, u8)> {
        let mut out = Vec::new();
        decode_runs(data, pixel_count, |p, l, c| out.push((p, l, c)));
        out
    }

    #[test]
    fn single_short_run_leaves_rest_untouched() {
        let mut buf = [0xFFu8; 10];
        decode_to_codes(&[0x00, 0x05], &mut buf);
        assert_eq!(&buf[..6], &[0u8; 6]);
        assert_eq!(&buf[6..], &[0xFFu8; 4]);
    }

    #[test]
    fn max_run_code_is_clamped_to_raster() {
        assert_eq!(runs(&[0x00, 0xFF], 100), vec![(0, 100, 0)]);
        assert_eq!(runs(&[0x00, 0xFF, 0x9d, 0x00], 20_000), vec![
            (0, MAX_RUN, 0),
            (MAX_RUN, 1, 0x9d)
        ]);
    }

    #[test]
    fn held_pair_then_same_color_merges() {
        // held (c, 0x81): tail = 2 << 7 = 256; merged = 1 + 3 + 256
        let got = runs(&[0x9d, 0x81, 0x9d, 0x03], 1000);
        assert_eq!(got, vec![(0, 260, 0x9d)]);
    }

    #[test]
    fn held_pair_then_other_color_splits() {
        let got = runs(&[0x9d, 0x80, 0x00, 0x04], 1000);
        assert_eq!(got, vec![(0, 128, 0x9d), (128, 5, 0x00)]);
    }

    #[test]
    fn resolution_is_exhaustive_in_isolation() {
        assert_eq!(
            resolve_hold((7, 0x82), (7, 0x10)),
            Resolution::Merged {
                color: 7,
                length: 1 + 0x10 + (3 << 7)
            }
        );
        assert_eq!(
            resolve_hold((7, 0xFF), (8, 0xFF)),
            Resolution::Split {
                held: (7, 128 << 7),
                next: (8, 256)
            }
        );
    }

    #[test]
    fn trailing_hold_flushes_tail_clamped() {
        assert_eq!(runs(&[0x00, 0x80], 1000), vec![(0, 128, 0)]);
        assert_eq!(runs(&[0x00, 0x85], 100), vec![(0, 100, 0)]);
        assert_eq!(runs(&[0x00, 0x01, 0x00, 0x80], 1000), vec![
            (0, 2, 0),
            (2, 128, 0)
        ]);
    }

    #[test]
    fn transparent_runs_are_skipped_but_advance() {
        let mut buf = [0xAAu8; 8];
        decode_to_codes(&[codes::TRANSPARENT, 0x02, 0x00, 0x01], &mut buf);
        assert_eq!(buf, [0xAA, 0xAA, 0xAA, 0, 0, 0xAA, 0xAA, 0xAA]);
    }

    #[test]
    fn emitted_lengths_sum_to_raster_minus_transparent() {
        let data = [
            0x00, 0x09, // 10
            codes::TRANSPARENT, 0x04, // 5 hidden
            0x9d, 0x80, 0x9d, 0x00, // 1 + 0 + 128
            0xc9, 0x80, 0x00, 0x05, // 128 + 6
        ];
        let total = 10 + 5 + 129 + 128 + 6;
        let got = runs(&data, total);
        let visible: usize = got.iter().map(|r| r.1).sum();
        assert_eq!(visible, total - 5);
        let last = got.last().unwrap();
        assert_eq!(last.0 + last.1, total);
    }

    #[test]
    fn truncated_input_stops_without_panic() {
        let mut buf = [0xFFu8; 16];
        decode_to_codes(&[0x00, 0x01, 0x00], &mut buf);
        assert_eq!(&buf[..2], &[0, 0]);
        assert!(buf[2..].iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn rgb_and_rgba_sinks_resolve_through_palette() {
        let palette = Palette::new([[1, 2, 3], [40; 3], [80; 3], [250, 251, 252]], 0.5);
        let mut rgb = vec![0u8; 4 * 3];
        decode_to_rgb(&[0x00, 0x01, 0xFF, 0x01], &mut rgb, &palette);
        assert_eq!(rgb, vec![1, 2, 3, 1, 2, 3, 250, 251, 252, 250, 251, 252]);

        let mut rgba = vec![0u8; 3 * 4];
        decode_to_rgba(&[codes::MARKER_BLACK, 0x02], &mut rgba, &palette);
        assert_eq!(&rgba[..4], &[1, 2, 3, 127]);
        assert_eq!(&rgba[8..], &[1, 2, 3, 127]);
    }

    #[test]
    fn fill_pattern_matches_naive_loop() {
        for len in [0usize, 1, 2, 3, 7, 64, 129] {
            let mut fast = vec![0u8; 300];
            fill_pattern(&mut fast, 5, 5 + len * 3, &[1, 2, 3]);
            let mut slow = vec![0u8; 300];
            for i in 0..len {
                slow[5 + i * 3..5 + i * 3 + 3].copy_from_slice(&[1, 2, 3]);
            }
            assert_eq!(fast, slow, "len {len}");
        }
    }
}
