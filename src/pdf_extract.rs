// src/pdf_extract.rs

use lopdf::{Dictionary, Document, Object};
use std::{fs, io, path::Path};
use tracing::{info, warn};

/// What could be read out of a bill PDF.
#[derive(Debug, PartialEq)]
pub enum PdfContent {
    /// The bill carries a text layer.
    Text(String),
    /// Image-only bill (a photo or scan); its figures have to be entered by hand.
    ScannedImage,
    Error(String),
}

/// Fewer non-whitespace characters than this and the text layer is considered empty.
const MIN_TEXT_CHARS: usize = 30;

/// Share of image-only pages at which the whole document counts as scanned.
const SCANNED_PAGE_RATIO: f64 = 0.8;

/// Read a bill from disk. Only a failure to read the file is an `Err`.
pub fn read_bill_pdf(path: impl AsRef<Path>) -> io::Result<PdfContent> {
    let path = path.as_ref();
    let bytes = fs::read(path)?;
    info!(path = %path.display(), bytes = bytes.len(), "Reading bill PDF");
    Ok(extract_text_from_pdf(&bytes))
}

pub fn extract_text_from_pdf(pdf_bytes: &[u8]) -> PdfContent {
    let doc = match Document::load_mem(pdf_bytes) {
        Ok(d) => d,
        Err(e) => return PdfContent::Error(format!("Failed to parse PDF: {e}")),
    };

    let scan = scan_pages(&doc);
    if scan.is_scanned() {
        info!(
            pages = scan.total,
            image_only = scan.image_only,
            "Bill looks scanned — figures need manual entry"
        );
        return PdfContent::ScannedImage;
    }

    match pdf_extract::extract_text_from_mem(pdf_bytes) {
        Ok(text) => {
            let meaningful = text.chars().filter(|c| !c.is_whitespace()).count();
            if meaningful < MIN_TEXT_CHARS {
                info!(chars = meaningful, "Text layer too thin — treating as scanned");
                PdfContent::ScannedImage
            } else {
                info!(chars = meaningful, "Bill text extracted");
                PdfContent::Text(text)
            }
        }
        Err(e) => {
            warn!(error = %e, "Text extraction failed — treating as scanned");
            PdfContent::ScannedImage
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct PageScan {
    total: usize,
    image_only: usize,
}

impl PageScan {
    fn is_scanned(&self) -> bool {
        // No pages: let text extraction decide
        self.total > 0 && self.image_only as f64 / self.total as f64 >= SCANNED_PAGE_RATIO
    }
}

/// Count pages whose resources hold images (XObjects) but no fonts.
fn scan_pages(doc: &Document) -> PageScan {
    let pages = doc.get_pages();
    let mut scan = PageScan {
        total: pages.len(),
        ..PageScan::default()
    };

    for object_id in pages.values() {
        let Some(resources) = doc
            .get_object(*object_id)
            .ok()
            .and_then(|page| page.as_dict().ok())
            .and_then(|page| resolve_dict(doc, page, b"Resources"))
        else {
            continue;
        };

        let has_fonts = resolve_dict(doc, resources, b"Font").is_some_and(|d| !d.is_empty());
        let has_images = resolve_dict(doc, resources, b"XObject").is_some_and(|d| !d.is_empty());

        if has_images && !has_fonts {
            scan.image_only += 1;
        }
    }

    scan
}

/// Follow `dict[key]` through any indirect reference to a dictionary.
fn resolve_dict<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Dictionary> {
    let entry: &Object = dict.get(key).ok()?;
    let (_, resolved) = doc.dereference(entry).ok()?;
    resolved.as_dict().ok()
}
