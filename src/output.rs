//! Results returned by the conversion orchestrator.

use crate::model::BlobRef;
use serde::Serialize;

/// Result of a successful Braille conversion.
#[derive(Debug, Clone, Serialize)]
pub struct BrailleOutput {
    pub document_id: String,
    /// Stored contracted (grade-2) Braille.
    pub contracted_ref: BlobRef,
    /// Stored uncontracted Braille.
    pub uncontracted_ref: BlobRef,
    pub contracted: String,
    pub uncontracted: String,
    pub stats: ConversionStats,
}

/// Result of a successful speech conversion.
#[derive(Debug, Clone, Serialize)]
pub struct SpeechOutput {
    pub document_id: String,
    /// Stored audio.
    pub audio_ref: BlobRef,
    /// Number of provider requests the text was split into.
    pub chunk_count: usize,
    /// Size of the merged audio in bytes.
    pub byte_len: usize,
    pub stats: ConversionStats,
}

/// Timing and size figures for one conversion request.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConversionStats {
    /// Bytes fetched from blob storage.
    pub source_bytes: usize,
    /// Characters of extracted text.
    pub text_chars: usize,
    pub fetch_ms: u64,
    pub extract_ms: u64,
    /// Braille translation or speech synthesis time.
    pub transform_ms: u64,
    pub store_ms: u64,
    pub total_ms: u64,
}
