//! Persistent records the pipeline reads and links artifacts onto.

use crate::error::ConvertError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A reference to a blob written to (or readable from) a [`crate::store::BlobStore`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobRef {
    /// Store-relative key the blob was written under.
    pub key: String,
    /// Fetchable location: a URL or a local path.
    pub url: String,
}

impl BlobRef {
    pub fn new(key: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            url: url.into(),
        }
    }
}

impl fmt::Display for BlobRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

/// Kind of derived output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Braille,
    Speech,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::Braille => f.write_str("braille"),
            ArtifactKind::Speech => f.write_str("speech"),
        }
    }
}

/// Derived output linked to exactly one [`SourceDocument`].
///
/// Braille artifacts hold `[contracted, uncontracted]`; speech artifacts hold
/// `[audio]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionArtifact {
    pub kind: ArtifactKind,
    pub refs: Vec<BlobRef>,
    pub created_at: DateTime<Utc>,
}

impl ConversionArtifact {
    pub fn new(kind: ArtifactKind, refs: Vec<BlobRef>) -> Self {
        Self {
            kind,
            refs,
            created_at: Utc::now(),
        }
    }
}

/// How a document's bytes are turned into text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFormat {
    /// Paged PDF document.
    Pdf,
    /// `doc` / `docx` word-processor container.
    WordProcessor,
    /// `txt` / `rtf` / `odt`, read as UTF-8 text.
    Plain,
}

impl DocumentFormat {
    /// Resolve a format from a bare extension (case-insensitive, no dot).
    pub fn from_extension(ext: &str) -> Result<Self, ConvertError> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Ok(DocumentFormat::Pdf),
            "doc" | "docx" => Ok(DocumentFormat::WordProcessor),
            "txt" | "rtf" | "odt" => Ok(DocumentFormat::Plain),
            other => Err(ConvertError::UnsupportedFormat {
                extension: other.to_string(),
            }),
        }
    }

    /// Resolve a format from a file name's last extension.
    pub fn from_file_name(name: &str) -> Result<Self, ConvertError> {
        Self::from_extension(&extension_of(name))
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentFormat::Pdf => f.write_str("pdf"),
            DocumentFormat::WordProcessor => f.write_str("word-processor"),
            DocumentFormat::Plain => f.write_str("plain"),
        }
    }
}

/// Lower-cased text after the last `.` of a file name.
///
/// A name without a dot yields the whole name, so `"README"` reports
/// `"readme"` and `".txt"` reports `"txt"`.
pub fn extension_of(file_name: &str) -> String {
    file_name
        .rsplit('.')
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase()
}

/// An uploaded document.
///
/// Created once on upload; afterwards only the `braille` / `speech` artifact
/// links change, each replaced as a whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDocument {
    pub id: String,
    pub owner_id: String,
    pub file_name: String,
    /// Lower-cased extension of `file_name`, used to pick the extractor.
    pub format_hint: String,
    pub size: u64,
    pub source: Option<BlobRef>,
    pub created_at: DateTime<Utc>,
    pub braille: Option<ConversionArtifact>,
    pub speech: Option<ConversionArtifact>,
}

impl SourceDocument {
    /// Describe a freshly uploaded file with a random id.
    pub fn new(
        owner_id: impl Into<String>,
        file_name: impl Into<String>,
        size: u64,
        source: BlobRef,
    ) -> Self {
        let file_name = file_name.into();
        Self {
            id: uuid::Uuid::new_v4().simple().to_string(),
            owner_id: owner_id.into(),
            format_hint: extension_of(&file_name),
            file_name,
            size,
            source: Some(source),
            created_at: Utc::now(),
            braille: None,
            speech: None,
        }
    }

    /// Override the generated id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Current artifact of `kind`, if any.
    pub fn artifact(&self, kind: ArtifactKind) -> Option<&ConversionArtifact> {
        match kind {
            ArtifactKind::Braille => self.braille.as_ref(),
            ArtifactKind::Speech => self.speech.as_ref(),
        }
    }

    /// Replace the current artifact of the artifact's kind.
    pub fn link_artifact(&mut self, artifact: ConversionArtifact) {
        match artifact.kind {
            ArtifactKind::Braille => self.braille = Some(artifact),
            ArtifactKind::Speech => self.speech = Some(artifact),
        }
    }
}
