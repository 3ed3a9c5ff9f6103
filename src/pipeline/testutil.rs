//! Synthetic container files for unit tests.

use super::container::Container;
use std::io::Cursor;

pub(crate) struct NoteBuilder {
    bytes: Vec<u8>,
}

impl NoteBuilder {
    pub(crate) fn new() -> Self {
        Self::with_tag(b"note")
    }

    pub(crate) fn with_tag(tag: &[u8; 4]) -> Self {
        let mut bytes = tag.to_vec();
        bytes.extend_from_slice(b"SN_FILE_VER_20230015");
        Self { bytes }
    }

    /// Append a length-prefixed block and return its address.
    pub(crate) fn block(&mut self, payload: &[u8]) -> u64 {
        let addr = self.bytes.len() as u64;
        self.bytes
            .extend_from_slice(&(payload.len() as u32).to_le_bytes());
        self.bytes.extend_from_slice(payload);
        addr
    }

    pub(crate) fn records(&mut self, pairs: &[(&str, String)]) -> u64 {
        let payload: String = pairs.iter().map(|(k, v)| format!("<{k}:{v}>")).collect();
        self.block(payload.as_bytes())
    }

    /// A run-length layer block plus the layer record pointing at it.
    pub(crate) fn rle_layer(&mut self, kind: &str, data: &[u8]) -> u64 {
        let bitmap = self.block(data);
        self.records(&[
            ("LAYERPROTOCOL", "RATTA_RLE".into()),
            ("LAYERTYPE", kind.into()),
            ("LAYERBITMAP", bitmap.to_string()),
        ])
    }

    pub(crate) fn finish(mut self, footer: u64) -> Vec<u8> {
        self.bytes.extend_from_slice(&(footer as u32).to_le_bytes());
        self.bytes
    }

    pub(crate) fn finish_container(self, footer: u64) -> Container<Cursor<Vec<u8>>> {
        Container::new(Cursor::new(self.finish(footer))).unwrap()
    }
}

/// Encode `count` pixels of `code` without any held pairs.
pub(crate) fn rle_run(code: u8, mut count: usize) -> Vec<u8> {
    let mut out = Vec::new();
    while count > 0 {
        if count >= super::rle::MAX_RUN {
            out.extend_from_slice(&[code, 0xFF]);
            count -= super::rle::MAX_RUN;
        } else {
            let n = count.min(128);
            out.extend_from_slice(&[code, (n - 1) as u8]);
            count -= n;
        }
    }
    out
}

/// Encode a row-major code raster.
pub(crate) fn rle_encode(codes: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < codes.len() {
        let code = codes[i];
        let len = codes[i..].iter().take_while(|&&c| c == code).count();
        out.extend(rle_run(code, len));
        i += len;
    }
    out
}

#[test]
fn encoder_roundtrips_through_decoder() {
    let mut raster = vec![0xFFu8; 300];
    raster[10..150].fill(0x00);
    raster[200..205].fill(0x9d);
    let mut out = vec![0u8; 300];
    super::rle::decode_to_codes(&rle_encode(&raster), &mut out);
    assert_eq!(out, raster);
}
