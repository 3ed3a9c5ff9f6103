//! PDF serialization: header, numbered objects, xref table, trailer.
//!
//! The writer makes a single linear pass. Object bytes are fully built
//! before they reach it, so every offset is known by the time the xref
//! section is written and nothing is backpatched.

use std::io::{self, Write};

/// Object id of the document catalog.
pub const CATALOG_ID: usize = 1;
/// Object id of the page tree.
pub const PAGES_ID: usize = 2;
/// First id available to page content.
pub const FIRST_PAGE_ID: usize = 3;

const HEADER: &[u8] = b"%PDF-1.7\n%\xe2\xe3\xcf\xd3\n";

/// A finished indirect object: `data` holds everything from `N 0 obj` to
/// `endobj\n` inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfObject {
    pub id: usize,
    pub data: Vec<u8>,
}

impl PdfObject {
    pub fn new(id: usize, data: impl Into<Vec<u8>>) -> Self {
        Self {
            id,
            data: data.into(),
        }
    }
}

/// Offset-tracking object writer.
pub struct PdfWriter<W: Write> {
    writer: W,
    offset: usize,
    /// Indexed by object id; `None` for ids never written.
    offsets: Vec<Option<usize>>,
}

impl<W: Write> PdfWriter<W> {
    /// Start a document by writing the version header and binary marker.
    pub fn new(mut writer: W) -> io::Result<Self> {
        writer.write_all(HEADER)?;
        Ok(Self {
            writer,
            offset: HEADER.len(),
            offsets: vec![None],
        })
    }

    /// Current byte offset from the start of the document.
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn write_object(&mut self, obj: &PdfObject) -> io::Result<()> {
        if self.offsets.len() <= obj.id {
            self.offsets.resize(obj.id + 1, None);
        }
        self.offsets[obj.id] = Some(self.offset);
        self.write_bytes(&obj.data)
    }

    fn write_bytes(&mut self, data: &[u8]) -> io::Result<()> {
        self.writer.write_all(data)?;
        self.offset += data.len();
        Ok(())
    }

    fn write_str(&mut self, s: &str) -> io::Result<()> {
        self.write_bytes(s.as_bytes())
    }

    /// Write the xref section covering ids `0..=total_objects`, the trailer
    /// and the `startxref` footer, then hand back the inner writer.
    pub fn finish(mut self, total_objects: usize) -> io::Result<W> {
        let xref_start = self.offset;
        self.write_str(&format!("xref\n0 {}\n", total_objects + 1))?;
        self.write_str("0000000000 65535 f \n")?;
        for id in 1..=total_objects {
            match self.offsets.get(id).copied().flatten() {
                Some(off) => self.write_str(&format!("{off:010} 00000 n \n"))?,
                None => self.write_str("0000000000 65535 f \n")?,
            }
        }
        self.write_str(&format!(
            "trailer\n<< /Size {} /Root {} 0 R >>\nstartxref\n{}\n%%EOF\n",
            total_objects + 1,
            CATALOG_ID,
            xref_start
        ))?;
        self.writer.flush()?;
        Ok(self.writer)
    }
}

pub fn catalog_object() -> PdfObject {
    PdfObject::new(
        CATALOG_ID,
        format!("{CATALOG_ID} 0 obj\n<< /Type /Catalog /Pages {PAGES_ID} 0 R >>\nendobj\n"),
    )
}

pub fn page_tree_object(page_ids: &[usize]) -> PdfObject {
    let kids = page_ids
        .iter()
        .map(|id| format!("{id} 0 R"))
        .collect::<Vec<_>>()
        .join(" ");
    PdfObject::new(
        PAGES_ID,
        format!(
            "{PAGES_ID} 0 obj\n<< /Type /Pages /Kids [ {kids} ] /Count {} >>\nendobj\n",
            page_ids.len()
        ),
    )
}

/// Write a complete document: catalog, page tree over `page_ids`, then the
/// page objects in order.
pub fn write_document<'a, W, I>(
    writer: W,
    page_ids: &[usize],
    objects: I,
    total_objects: usize,
) -> io::Result<W>
where
    W: Write,
    I: IntoIterator<Item = &'a PdfObject>,
{
    let mut pw = PdfWriter::new(writer)?;
    pw.write_object(&catalog_object())?;
    pw.write_object(&page_tree_object(page_ids))?;
    for obj in objects {
        pw.write_object(obj)?;
    }
    pw.finish(total_objects)
}

/// Serialize a one-page document whose page object is [`FIRST_PAGE_ID`].
pub fn single_page_document(objects: &[PdfObject]) -> io::Result<Vec<u8>> {
    write_document(
        Vec::new(),
        &[FIRST_PAGE_ID],
        objects,
        PAGES_ID + objects.len(),
    )
}
