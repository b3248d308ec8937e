//! Error types for the braillebridge library.
//!
//! [`ConvertError`] is the only error a conversion request surfaces. Every
//! variant belongs to one of two classes (see [`ErrorClass`]):
//!
//! * **Input**: the request itself is wrong (missing document, unsupported
//!   format, unreadable file, nothing to speak). Retrying cannot help.
//! * **Infrastructure**: a collaborator failed (blob fetch, speech provider,
//!   storage write). The same request may succeed later.
//!
//! The collaborator errors ([`StoreError`], [`EngineError`], [`ProviderError`])
//! are mapped into `ConvertError` at the orchestrator boundary with the step
//! that failed attached, so callers never have to guess which one it was.
//!
//! Braille translation has no variant here: engine trouble is absorbed by the
//! fallback transliteration and only shows up in the logs.

use thiserror::Error;

/// Whether a failure is the caller's problem or the infrastructure's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Non-retriable: fix the input before trying again.
    Input,
    /// Retriable: a storage or network collaborator failed.
    Infrastructure,
    /// Misconfiguration or a bug; neither retry nor new input helps.
    Internal,
}

/// All errors returned by the conversion pipeline.
#[derive(Debug, Error)]
pub enum ConvertError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The document does not exist or has no stored source blob.
    #[error("Document '{document_id}' not found: {reason}")]
    NotFound { document_id: String, reason: String },

    /// The file extension is not one of pdf, doc, docx, txt, rtf, odt.
    #[error("Unsupported file type: '{extension}'\nSupported: pdf, doc, docx, txt, rtf, odt")]
    UnsupportedFormat { extension: String },

    /// The format handler could not decode the file.
    #[error("Failed to extract text from {format} document: {detail}")]
    ExtractionFailed { format: String, detail: String },

    /// Speech was requested for a document without any speakable text.
    #[error("Document contains no text to synthesize")]
    EmptyText,

    /// An upload exceeds the configured size cap.
    #[error("File '{file_name}' is {size} bytes; the limit is {limit} bytes")]
    FileTooLarge {
        file_name: String,
        size: u64,
        limit: u64,
    },

    // ── Infrastructure errors ─────────────────────────────────────────────
    /// Fetching the source bytes from blob storage failed.
    #[error("Source document unavailable: {cause}")]
    SourceUnavailable { cause: String },

    /// The speech provider rejected or failed a chunk; no audio was kept.
    #[error("Speech synthesis failed on chunk {chunk_index}: {cause}")]
    SynthesisFailed { chunk_index: usize, cause: String },

    /// Writing an artifact blob or linking it to the document failed.
    #[error("Failed to store artifact '{key}': {cause}")]
    StorageWriteFailed { key: String, cause: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library; PDF extraction is unavailable on
    /// this host, whatever the document.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Install pdfium and either put it on the system library path or\n\
set PDFIUM_LIB_PATH=/path/to/libpdfium (or its directory).\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ConvertError {
    /// Classify the error for retry decisions.
    pub fn class(&self) -> ErrorClass {
        match self {
            ConvertError::NotFound { .. }
            | ConvertError::UnsupportedFormat { .. }
            | ConvertError::ExtractionFailed { .. }
            | ConvertError::EmptyText
            | ConvertError::FileTooLarge { .. } => ErrorClass::Input,
            ConvertError::SourceUnavailable { .. }
            | ConvertError::SynthesisFailed { .. }
            | ConvertError::StorageWriteFailed { .. } => ErrorClass::Infrastructure,
            ConvertError::InvalidConfig(_)
            | ConvertError::PdfiumBindingFailed(_)
            | ConvertError::Internal(_) => ErrorClass::Internal,
        }
    }

    /// `true` when re-issuing the same request may succeed.
    pub fn is_retriable(&self) -> bool {
        self.class() == ErrorClass::Infrastructure
    }
}

/// Errors from a [`crate::store::BlobStore`] or [`crate::store::DocumentStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// No blob or record exists under this key.
    #[error("No entry for '{key}'")]
    Missing { key: String },

    /// Local file-system failure.
    #[error("I/O error on '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// Remote fetch failed (connect error, timeout, non-2xx).
    #[error("Transfer of '{url}' failed: {reason}")]
    Transfer { url: String, reason: String },

    /// The key cannot be mapped onto this store.
    #[error("Invalid key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },
}

/// Errors from an external Braille translation engine.
///
/// Never surfaced to callers; the translator logs them and falls back.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("engine I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("engine exited with {status}: {stderr}")]
    Exit { status: String, stderr: String },

    #[error("engine timed out after {secs}s")]
    Timeout { secs: u64 },
}

/// Errors from an external speech provider for a single chunk.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The request never produced a response (DNS, connect, timeout).
    #[error("request failed: {0}")]
    Request(String),

    /// The provider answered with a non-success status.
    #[error("HTTP {status}")]
    Status { status: u16 },

    /// The chunk violates the provider's input contract.
    #[error("rejected chunk: {0}")]
    Rejected(String),
}
