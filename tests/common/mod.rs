//! Synthetic notebook files shared by the integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

pub const STANDARD_W: usize = 1404;
pub const STANDARD_H: usize = 1872;

/// Appends length-prefixed blocks and records their addresses.
pub struct NoteBuilder {
    bytes: Vec<u8>,
}

impl NoteBuilder {
    pub fn new() -> Self {
        let mut bytes = b"note".to_vec();
        bytes.extend_from_slice(b"SN_FILE_VER_20230015");
        Self { bytes }
    }

    pub fn block(&mut self, payload: &[u8]) -> u64 {
        let addr = self.bytes.len() as u64;
        self.bytes
            .extend_from_slice(&(payload.len() as u32).to_le_bytes());
        self.bytes.extend_from_slice(payload);
        addr
    }

    pub fn records(&mut self, pairs: &[(&str, String)]) -> u64 {
        let payload: String = pairs.iter().map(|(k, v)| format!("<{k}:{v}>")).collect();
        self.block(payload.as_bytes())
    }

    /// A run-length layer record whose bitmap holds `data`.
    pub fn rle_layer(&mut self, data: &[u8]) -> u64 {
        let bitmap = self.block(data);
        self.records(&[
            ("LAYERPROTOCOL", "RATTA_RLE".into()),
            ("LAYERTYPE", "NOTE".into()),
            ("LAYERBITMAP", bitmap.to_string()),
        ])
    }

    /// A page whose main layer is `data`.
    pub fn page(&mut self, data: &[u8]) -> u64 {
        let layer = self.rle_layer(data);
        self.records(&[("MAINLAYER", layer.to_string())])
    }

    pub fn finish(mut self, footer: u64) -> Vec<u8> {
        self.bytes.extend_from_slice(&(footer as u32).to_le_bytes());
        self.bytes
    }
}

/// `count` pixels of `code`, without held pairs.
pub fn rle_run(code: u8, mut count: usize) -> Vec<u8> {
    let mut out = Vec::new();
    while count > 0 {
        if count >= 16384 {
            out.extend_from_slice(&[code, 0xFF]);
            count -= 16384;
        } else {
            let n = count.min(128);
            out.extend_from_slice(&[code, (n - 1) as u8]);
            count -= n;
        }
    }
    out
}

/// Main-layer data with the first `rows` rows painted in `code`.
pub fn top_rows(code: u8, rows: usize) -> Vec<u8> {
    rle_run(code, STANDARD_W * rows)
}

/// Two pages; page 1 has ten black rows and a link to page 2.
pub fn linked_notebook() -> Vec<u8> {
    let mut b = NoteBuilder::new();
    let header = b.records(&[("FILE_ID", "F1".into())]);
    let p1 = b.page(&top_rows(0x00, 10));
    let p2 = b.page(&[]);
    let link = b.records(&[
        ("LINKRECT", "100,200,50,40".into()),
        ("OBJPAGE", "2".into()),
        ("LINKFILEID", "F1".into()),
    ]);
    let footer = b.records(&[
        ("FILE_FEATURE", header.to_string()),
        ("PAGE1", p1.to_string()),
        ("PAGE2", p2.to_string()),
        ("LINKO_00010000000001", link.to_string()),
    ]);
    b.finish(footer)
}

pub fn write_note(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, bytes).unwrap();
    path
}

/// Parse the xref table and return the offset of every in-use object id
/// (index 0 is object 1). Free entries are `None`.
pub fn xref_offsets(pdf: &[u8]) -> Vec<Option<usize>> {
    let marker = b"startxref\n";
    let at = pdf
        .windows(marker.len())
        .rposition(|w| w == marker)
        .expect("startxref present");
    let tail = String::from_utf8_lossy(&pdf[at + marker.len()..]);
    let start: usize = tail.lines().next().unwrap().parse().unwrap();
    let xref = String::from_utf8_lossy(&pdf[start..]);
    assert!(xref.starts_with("xref\n"));
    xref.lines()
        .skip(3)
        .take_while(|l| !l.starts_with("trailer"))
        .map(|l| l.ends_with(" n ").then(|| l[..10].parse().unwrap()))
        .collect()
}

/// Every in-use xref entry points at `N 0 obj`.
pub fn assert_xref_consistent(pdf: &[u8]) {
    for (i, off) in xref_offsets(pdf).into_iter().enumerate() {
        let Some(off) = off else { continue };
        let header = format!("{} 0 obj", i + 1);
        assert!(
            pdf[off..].starts_with(header.as_bytes()),
            "object {} not at offset {}",
            i + 1,
            off
        );
    }
}

pub fn text(pdf: &[u8]) -> String {
    String::from_utf8_lossy(pdf).into_owned()
}

/// Route library logs to the test harness; honours `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
