//! Text extraction: raw document bytes + declared format → plain UTF-8 text.
//!
//! ## Formats
//!
//! | Extension | Handler | Output shape |
//! |-----------|---------|--------------|
//! | `pdf` | pdfium text segments | runs joined by `' '`, every page ends in `'\n'` |
//! | `doc`, `docx` | OOXML `word/document.xml` | `<w:t>` runs, each paragraph ends in `"\n\n"` |
//! | `txt`, `rtf`, `odt` | UTF-8 decode | bytes verbatim (invalid sequences → U+FFFD) |
//!
//! PDF and word-processor decoding are CPU-bound and the pdfium bindings are
//! not async-safe, so both run inside `tokio::task::spawn_blocking`.
//!
//! Extraction is a pure function of its input: the same bytes always yield the
//! same text.

use crate::error::ConvertError;
use crate::model::{extension_of, DocumentFormat};
use once_cell::sync::Lazy;
use pdfium_render::prelude::*;
use regex::{Captures, Regex};
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Extract text from `bytes`, choosing the handler from `format_hint`
/// (a bare file extension such as `"pdf"`).
///
/// # Errors
/// - [`ConvertError::UnsupportedFormat`] for any extension outside the table above
/// - [`ConvertError::ExtractionFailed`] when the handler cannot decode the bytes
pub async fn extract(bytes: Vec<u8>, format_hint: &str) -> Result<String, ConvertError> {
    let format = DocumentFormat::from_extension(format_hint)?;
    extract_with_format(bytes, format).await
}

/// Extract text from `bytes` with an already-resolved format.
pub async fn extract_with_format(
    bytes: Vec<u8>,
    format: DocumentFormat,
) -> Result<String, ConvertError> {
    let len = bytes.len();
    let text = match format {
        DocumentFormat::Plain => decode_plain(&bytes),
        DocumentFormat::Pdf => run_blocking(move || extract_pdf_blocking(&bytes)).await?,
        DocumentFormat::WordProcessor => run_blocking(move || extract_word_blocking(&bytes)).await?,
    };
    info!("Extracted {} chars from {} bytes of {} input", text.chars().count(), len, format);
    Ok(text)
}

/// Read a local file and extract its text, deriving the format from its extension.
pub async fn extract_file(path: impl AsRef<Path>) -> Result<String, ConvertError> {
    let path = path.as_ref();
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let format = DocumentFormat::from_extension(&extension_of(&name))?;
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| failed(format, format!("cannot read '{}': {e}", path.display())))?;
    extract_with_format(bytes, format).await
}

async fn run_blocking<F>(f: F) -> Result<String, ConvertError>
where
    F: FnOnce() -> Result<String, ConvertError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ConvertError::Internal(format!("Extraction task panicked: {e}")))?
}

fn failed(format: DocumentFormat, detail: impl Into<String>) -> ConvertError {
    ConvertError::ExtractionFailed {
        format: format.to_string(),
        detail: detail.into(),
    }
}

// ── Plain text ───────────────────────────────────────────────────────────

fn decode_plain(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

// ── PDF ──────────────────────────────────────────────────────────────────

/// Bind pdfium from `PDFIUM_LIB_PATH`, else from the system library search path.
fn bind_pdfium() -> Result<Pdfium, ConvertError> {
    bind_pdfium_from(std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from))
}

/// `configured` may name the library file or the directory holding it.
fn bind_pdfium_from(configured: Option<PathBuf>) -> Result<Pdfium, ConvertError> {
    let bindings = match configured {
        Some(configured) => {
            let lib = if configured.is_dir() {
                Pdfium::pdfium_platform_library_name_at_path(&configured)
            } else {
                configured
            };
            debug!("Binding pdfium from {}", lib.display());
            Pdfium::bind_to_library(&lib)
        }
        None => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| ConvertError::PdfiumBindingFailed(format!("{e:?}")))?;
    Ok(Pdfium::new(bindings))
}

fn extract_pdf_blocking(bytes: &[u8]) -> Result<String, ConvertError> {
    if bytes.len() < 4 || &bytes[..4] != b"%PDF" {
        return Err(failed(
            DocumentFormat::Pdf,
            format!("missing %PDF header (first bytes: {:?})", &bytes[..bytes.len().min(4)]),
        ));
    }

    let pdfium = bind_pdfium()?;
    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| failed(DocumentFormat::Pdf, format!("cannot open PDF: {e:?}")))?;

    let pages = document.pages();
    debug!("PDF loaded: {} pages", pages.len());

    let mut page_runs = Vec::with_capacity(pages.len() as usize);
    for (idx, page) in pages.iter().enumerate() {
        let page_text = page.text().map_err(|e| {
            failed(DocumentFormat::Pdf, format!("page {}: cannot read text: {e:?}", idx + 1))
        })?;
        let runs: Vec<String> = page_text.segments().iter().map(|s| s.text()).collect();
        if runs.is_empty() {
            warn!("Page {} has no extractable text (scanned image?)", idx + 1);
        }
        page_runs.push(runs);
    }
    Ok(layout_pdf_pages(&page_runs))
}

/// Lay out PDF text: each page's runs joined by `' '`, every page ending in
/// `'\n'`, pages in document order.
fn layout_pdf_pages(pages: &[Vec<String>]) -> String {
    let mut text = String::new();
    for runs in pages {
        text.push_str(&runs.join(" "));
        text.push('\n');
    }
    text
}

// ── Word processor (OOXML) ───────────────────────────────────────────────

/// One regex pass over `document.xml` picks out, in document order, the
/// tokens that contribute text: runs, tabs, line breaks and paragraph ends.
static RE_WORD_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"<w:t(?:\s[^>]*)?>([^<]*)</w:t>|<w:tab\s*/>|<w:(?:br|cr)(?:\s[^>]*)?/>|</w:p>|<w:p(?:\s[^>]*)?/>",
    )
    .unwrap()
});

static RE_XML_ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&(#x[0-9a-fA-F]+|#[0-9]+|amp|lt|gt|quot|apos);").unwrap());

fn extract_word_blocking(bytes: &[u8]) -> Result<String, ConvertError> {
    let word = DocumentFormat::WordProcessor;
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| {
        failed(
            word,
            format!("not an OOXML container ({e}); legacy binary .doc files are not supported"),
        )
    })?;

    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| failed(word, format!("word/document.xml: {e}")))?
        .read_to_string(&mut xml)
        .map_err(|e| failed(word, format!("word/document.xml: {e}")))?;

    Ok(word_xml_to_text(&xml))
}

/// Raw text of a WordprocessingML body: formatting dropped, each paragraph
/// followed by a blank line.
fn word_xml_to_text(xml: &str) -> String {
    let mut text = String::new();
    for caps in RE_WORD_TOKEN.captures_iter(xml) {
        if let Some(run) = caps.get(1) {
            text.push_str(&decode_xml_entities(run.as_str()));
            continue;
        }
        let token = &caps[0];
        if token.starts_with("<w:tab") {
            text.push('\t');
        } else if token.starts_with("<w:br") || token.starts_with("<w:cr") {
            text.push('\n');
        } else {
            text.push_str("\n\n");
        }
    }
    text
}

fn decode_xml_entities(s: &str) -> String {
    RE_XML_ENTITY
        .replace_all(s, |caps: &Captures| {
            let name = &caps[1];
            let decoded = match name {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                _ => {
                    let code = match name.strip_prefix("#x") {
                        Some(hex) => u32::from_str_radix(hex, 16).ok(),
                        None => name[1..].parse::<u32>().ok(),
                    };
                    code.and_then(char::from_u32)
                }
            };
            decoded.map(String::from).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}
