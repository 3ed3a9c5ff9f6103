//! Container parsing: footer, metadata blocks, pages, layers and links.
//!
//! ## Layout
//!
//! ```text
//! offset 0      4-byte file type tag
//! offset 4      20-byte signature string
//! ...           blocks, each: u32 LE length + payload
//! EOF - 4       u32 LE address of the footer metadata block
//! ```
//!
//! A metadata block's payload is a run of `<KEY:VALUE>` records with no
//! separators. Parsing is tolerant: a record without a `:` before the next
//! `<`/`>` is skipped, and a missing closing `>` ends the block early.
//!
//! Only the signature and the footer are load-bearing. Everything reached
//! through the footer (header, pages, layers, links) degrades gracefully:
//! an unparseable address or malformed record drops that one item.

use crate::error::NoteError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use tracing::{debug, warn};

/// Parsed `<KEY:VALUE>` records of one metadata block.
///
/// Ordered so that enumeration (pages, links) is deterministic.
pub type Metadata = BTreeMap<String, String>;

/// Value of `APPLY_EQUIPMENT` that selects the large device.
const LARGE_DEVICE_EQUIPMENT: &str = "N5";

const SIGNATURE_OFFSET: u64 = 4;
const SIGNATURE_LEN: usize = 20;

static PAGE_KEY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^PAGE(\d+)$").expect("valid regex"));
static LINK_KEY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^LINKO_(\d{4})").expect("valid regex"));

/// Fixed pixel geometry of a device model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeviceGeometry {
    pub width: usize,
    pub height: usize,
    pub ppi: f64,
}

impl DeviceGeometry {
    /// The default (smaller) device.
    pub const STANDARD: DeviceGeometry = DeviceGeometry {
        width: 1404,
        height: 1872,
        ppi: 300.0,
    };

    /// The large device, selected by `APPLY_EQUIPMENT = N5`.
    pub const LARGE: DeviceGeometry = DeviceGeometry {
        width: 1920,
        height: 2560,
        ppi: 300.0,
    };

    /// Points per source pixel (1 inch = 72 points).
    pub fn point_scale(&self) -> f64 {
        72.0 / self.ppi
    }

    /// Page size in PDF points.
    pub fn page_size_pt(&self) -> (f64, f64) {
        let scale = self.point_scale();
        (self.width as f64 * scale, self.height as f64 * scale)
    }

    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }
}

/// Which slot of a page a layer occupies.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LayerKey {
    /// `BGLAYER`: the page template.
    Background,
    /// `MAINLAYER`.
    Main,
    /// `LAYER1` … `LAYER3`.
    Overlay(u8),
    /// Any other key listed in `LAYERSEQ`.
    Other(String),
}

impl LayerKey {
    pub fn parse(key: &str) -> Self {
        match key {
            "BGLAYER" => LayerKey::Background,
            "MAINLAYER" => LayerKey::Main,
            _ => key
                .strip_prefix("LAYER")
                .and_then(|n| n.parse::<u8>().ok())
                .map(LayerKey::Overlay)
                .unwrap_or_else(|| LayerKey::Other(key.to_string())),
        }
    }
}

impl fmt::Display for LayerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayerKey::Background => f.write_str("BGLAYER"),
            LayerKey::Main => f.write_str("MAINLAYER"),
            LayerKey::Overlay(n) => write!(f, "LAYER{n}"),
            LayerKey::Other(s) => f.write_str(s),
        }
    }
}

/// How a layer's bitmap is encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayerProtocol {
    /// `RATTA_RLE`: the run-length pixel codec.
    RunLength,
    /// `PNG`: an embedded image.
    Png,
    Unknown(String),
}

impl LayerProtocol {
    pub fn parse(s: &str) -> Self {
        match s {
            "RATTA_RLE" => LayerProtocol::RunLength,
            "PNG" => LayerProtocol::Png,
            other => LayerProtocol::Unknown(other.to_string()),
        }
    }
}

/// Semantic type of a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayerKind {
    /// Regular page content.
    Content,
    /// Annotation ink drawn over a companion PDF (`MARK`).
    Mark,
}

impl LayerKind {
    pub fn parse(s: &str) -> Self {
        if s == "MARK" {
            LayerKind::Mark
        } else {
            LayerKind::Content
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub key: LayerKey,
    pub protocol: LayerProtocol,
    pub kind: LayerKind,
    /// Address of the bitmap block; 0 when absent.
    pub bitmap_address: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub address: u64,
    /// 1-indexed page number from the `PAGE<N>` footer key.
    pub number: usize,
    /// Compositing order: later layers are drawn over earlier ones.
    pub layers: Vec<Layer>,
}

/// An internal hyperlink from a rectangle on one page to another page.
///
/// Indices are 0-based and unvalidated: the destination may lie in another
/// document or outside this one's page range. Consumers must check it
/// against the page count before use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteLink {
    pub source_page: i64,
    pub x: i64,
    pub y: i64,
    pub w: i64,
    pub h: i64,
    pub dest_page: i64,
    pub same_file: bool,
}

/// A parsed notebook. Read-only once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notebook {
    pub signature: String,
    pub pages: Vec<Page>,
    pub links: Vec<NoteLink>,
    pub file_id: String,
    pub geometry: DeviceGeometry,
    /// Records of the header (`FILE_FEATURE`) block; empty when unreachable.
    #[serde(skip)]
    pub header: Metadata,
}

/// Random-access reader over a container's blocks.
pub struct Container<R> {
    inner: R,
    len: u64,
}

impl Container<BufReader<File>> {
    /// Open a container file with its own read handle.
    pub fn open(path: &Path) -> io::Result<Self> {
        Container::new(BufReader::new(File::open(path)?))
    }
}

impl<R: Read + Seek> Container<R> {
    pub fn new(mut inner: R) -> io::Result<Self> {
        let len = inner.seek(SeekFrom::End(0))?;
        Ok(Self { inner, len })
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn read_u32(&mut self) -> io::Result<u32> {
        let mut buf = [0u8; 4];
        self.inner.read_exact(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    /// The 20-byte signature following the file type tag.
    pub fn signature(&mut self) -> io::Result<String> {
        self.inner.seek(SeekFrom::Start(SIGNATURE_OFFSET))?;
        let mut buf = [0u8; SIGNATURE_LEN];
        self.inner.read_exact(&mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Address stored in the final four bytes of the file.
    pub fn footer_address(&mut self) -> io::Result<u64> {
        if self.len < 4 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "file too short for a footer address",
            ));
        }
        self.inner.seek(SeekFrom::End(-4))?;
        Ok(self.read_u32()? as u64)
    }

    /// Read the length-prefixed block at `addr`.
    pub fn read_block(&mut self, addr: u64) -> io::Result<Vec<u8>> {
        if addr.saturating_add(4) > self.len {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("block address {addr} beyond end of file ({} bytes)", self.len),
            ));
        }
        self.inner.seek(SeekFrom::Start(addr))?;
        let block_len = self.read_u32()? as u64;
        if addr + 4 + block_len > self.len {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("block at {addr} claims {block_len} bytes past end of file"),
            ));
        }
        let mut buf = vec![0u8; block_len as usize];
        self.inner.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Read and parse the metadata block at `addr`. Address 0 is an empty block.
    pub fn read_metadata(&mut self, addr: u64) -> io::Result<Metadata> {
        if addr == 0 {
            return Ok(Metadata::new());
        }
        Ok(parse_records(&self.read_block(addr)?))
    }
}

/// Parse `<KEY:VALUE>` records, skipping malformed ones.
pub fn parse_records(buf: &[u8]) -> Metadata {
    let mut out = Metadata::new();
    let mut i = 0;
    while i < buf.len() {
        if buf[i] != b'<' {
            i += 1;
            continue;
        }
        i += 1;

        let colon = buf[i..]
            .iter()
            .position(|&b| matches!(b, b':' | b'<' | b'>'))
            .map(|off| i + off)
            .filter(|&j| buf[j] == b':');
        let Some(colon) = colon else {
            continue;
        };

        let Some(close) = buf[colon + 1..]
            .iter()
            .position(|&b| b == b'>')
            .map(|off| colon + 1 + off)
        else {
            break;
        };

        let key = String::from_utf8_lossy(&buf[i..colon]).into_owned();
        let value = String::from_utf8_lossy(&buf[colon + 1..close]).into_owned();
        out.insert(key, value);
        i = close + 1;
    }
    out
}

fn parse_address(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok()
}

/// Layer keys probed when a page has no `LAYERSEQ`.
const DEFAULT_LAYER_ORDER: [&str; 5] = ["BGLAYER", "MAINLAYER", "LAYER1", "LAYER2", "LAYER3"];

impl Notebook {
    /// Open and parse a notebook file.
    pub fn open(path: &Path) -> Result<Self, NoteError> {
        let container = Container::open(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => NoteError::FileNotFound {
                path: path.to_path_buf(),
            },
            io::ErrorKind::PermissionDenied => NoteError::PermissionDenied {
                path: path.to_path_buf(),
            },
            _ => NoteError::io(path, e),
        })?;
        Self::parse(container, path)
    }

    /// Parse a notebook from any seekable reader. `path` is only used in errors.
    pub fn parse<R: Read + Seek>(mut c: Container<R>, path: &Path) -> Result<Self, NoteError> {
        let format_err = |detail: String| NoteError::Format {
            path: path.to_path_buf(),
            detail,
        };

        let signature = c
            .signature()
            .map_err(|e| format_err(format!("reading signature: {e}")))?;
        let footer_addr = c
            .footer_address()
            .map_err(|e| format_err(format!("reading footer address: {e}")))?;
        let footer = c
            .read_metadata(footer_addr)
            .map_err(|e| format_err(format!("reading footer: {e}")))?;

        let (geometry, header) = detect_geometry(&mut c, &footer);
        let file_id = header.get("FILE_ID").cloned().unwrap_or_default();

        let mut entries: Vec<(usize, u64)> = footer
            .iter()
            .filter_map(|(k, v)| {
                let n = PAGE_KEY.captures(k)?.get(1)?.as_str().parse().ok()?;
                Some((n, parse_address(v)?))
            })
            .collect();
        entries.sort_by_key(|&(n, _)| n);

        let mut pages = Vec::with_capacity(entries.len());
        for (number, address) in entries {
            let records = c
                .read_metadata(address)
                .map_err(|e| NoteError::io(path, e))?;
            pages.push(Page {
                address,
                number,
                layers: parse_layers(&mut c, &records),
            });
        }

        let links = parse_links(&mut c, &footer, &file_id);
        debug!(
            "Parsed notebook: {} pages, {} links, {}x{} @ {} ppi",
            pages.len(),
            links.len(),
            geometry.width,
            geometry.height,
            geometry.ppi
        );

        Ok(Notebook {
            signature,
            pages,
            links,
            file_id,
            geometry,
            header,
        })
    }
}

/// Pick the device geometry from the header block, falling back silently.
fn detect_geometry<R: Read + Seek>(
    c: &mut Container<R>,
    footer: &Metadata,
) -> (DeviceGeometry, Metadata) {
    let Some(addr) = footer.get("FILE_FEATURE").and_then(|v| parse_address(v)) else {
        return (DeviceGeometry::STANDARD, Metadata::new());
    };
    match c.read_metadata(addr) {
        Ok(header) => {
            let geometry = match header.get("APPLY_EQUIPMENT").map(String::as_str) {
                Some(LARGE_DEVICE_EQUIPMENT) => DeviceGeometry::LARGE,
                _ => DeviceGeometry::STANDARD,
            };
            (geometry, header)
        }
        Err(e) => {
            debug!("Header block unreadable, using default geometry: {}", e);
            (DeviceGeometry::STANDARD, Metadata::new())
        }
    }
}

fn parse_layers<R: Read + Seek>(c: &mut Container<R>, page: &Metadata) -> Vec<Layer> {
    let order: Vec<&str> = match page.get("LAYERSEQ") {
        Some(seq) => seq.split(',').collect(),
        None => DEFAULT_LAYER_ORDER.to_vec(),
    };

    let mut layers = Vec::new();
    for key in order {
        let Some(addr) = page.get(key).and_then(|v| parse_address(v)) else {
            continue;
        };
        let data = match c.read_metadata(addr) {
            Ok(data) => data,
            Err(e) => {
                debug!("Skipping layer {}: {}", key, e);
                continue;
            }
        };
        let field = |name: &str| data.get(name).map(String::as_str).unwrap_or("");
        layers.push(Layer {
            key: LayerKey::parse(key),
            protocol: LayerProtocol::parse(field("LAYERPROTOCOL")),
            kind: LayerKind::parse(field("LAYERTYPE")),
            bitmap_address: parse_address(field("LAYERBITMAP")).unwrap_or(0),
        });
    }
    layers
}

fn parse_links<R: Read + Seek>(
    c: &mut Container<R>,
    footer: &Metadata,
    file_id: &str,
) -> Vec<NoteLink> {
    let mut links = Vec::new();
    for (key, value) in footer {
        let Some(source) = LINK_KEY
            .captures(key)
            .and_then(|cap| cap.get(1)?.as_str().parse::<i64>().ok())
        else {
            continue;
        };
        let Some(addr) = parse_address(value) else {
            continue;
        };
        let records = match c.read_metadata(addr) {
            Ok(r) => r,
            Err(e) => {
                warn!("Dropping link {}: {}", key, e);
                continue;
            }
        };
        match link_from_records(source, &records, file_id) {
            Some(link) => links.push(link),
            None => debug!("Dropping malformed link {}", key),
        }
    }
    links
}

fn link_from_records(source: i64, records: &Metadata, file_id: &str) -> Option<NoteLink> {
    let rect: Vec<i64> = records
        .get("LINKRECT")?
        .split(',')
        .map(|p| p.trim().parse::<i64>())
        .collect::<Result<_, _>>()
        .ok()?;
    let &[x, y, w, h] = rect.as_slice() else {
        return None;
    };
    // Far edges must be representable.
    x.checked_add(w)?;
    y.checked_add(h)?;
    let dest: i64 = records.get("OBJPAGE")?.trim().parse().ok()?;
    let same_file =
        !file_id.is_empty() && records.get("LINKFILEID").map(String::as_str) == Some(file_id);

    Some(NoteLink {
        source_page: source.checked_sub(1)?,
        x,
        y,
        w,
        h,
        dest_page: dest.checked_sub(1)?,
        same_file,
    })
}
