//! Conversion orchestrator: one request in, one stored artifact out.
//!
//! Every request runs the same steps:
//!
//! 1. look the document up in the [`DocumentStore`]
//! 2. fetch its source bytes from the [`BlobStore`]
//! 3. extract plain text
//! 4. translate to Braille or synthesize speech
//! 5. write the artifact blob(s) under deterministic keys
//! 6. link the new artifact to the document with a single update
//!
//! A failure before step 5 writes nothing. A failure in step 5 or 6 leaves the
//! document's previous artifact link untouched. Requests are independent: two
//! conversions of the same document may interleave, and whichever links last
//! wins. Blobs from superseded artifacts are never deleted here, and neither is
//! any blob the document currently links.
//!
//! [`Converter::upload`] is the way documents get in: it caps the size, stores
//! the original under a timestamped key and records the document.

use crate::config::ConversionConfig;
use crate::engine::{LiblouisEngine, TranslationEngine};
use crate::error::{ConvertError, StoreError};
use crate::model::{ArtifactKind, BlobRef, ConversionArtifact, DocumentFormat, SourceDocument};
use crate::output::{BrailleOutput, ConversionStats, SpeechOutput};
use crate::pipeline::braille::BrailleTranslator;
use crate::pipeline::extract;
use crate::pipeline::speech::SpeechSynthesizer;
use crate::progress::Stage;
use crate::store::{BlobStore, DocumentStore};
use crate::tts::{GoogleTranslateTts, SpeechProvider};
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Key of an uploaded original: `{prefix}/{owner}/{uploaded_ms}-{name}`, with
/// every whitespace run in the name replaced by `_`.
pub fn original_key(prefix: &str, owner_id: &str, uploaded_ms: i64, file_name: &str) -> String {
    let name = RE_WHITESPACE.replace_all(file_name, "_");
    format!("{prefix}/{owner_id}/{uploaded_ms}-{name}")
}

/// Key of the contracted Braille blob.
pub fn contracted_key(prefix: &str, owner_id: &str, document_id: &str) -> String {
    format!("{prefix}/braille/{owner_id}/{document_id}-g2.brf")
}

/// Key of the uncontracted Braille blob.
pub fn uncontracted_key(prefix: &str, owner_id: &str, document_id: &str) -> String {
    format!("{prefix}/braille/{owner_id}/{document_id}-unicode.txt")
}

/// Key of the speech audio blob.
pub fn speech_key(prefix: &str, document_id: &str) -> String {
    format!("{prefix}/tts/{document_id}-tts.mp3")
}

/// Runs conversion requests against a set of collaborators.
pub struct Converter {
    blobs: Arc<dyn BlobStore>,
    documents: Arc<dyn DocumentStore>,
    translator: BrailleTranslator,
    synthesizer: SpeechSynthesizer,
    config: ConversionConfig,
}

impl Converter {
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        documents: Arc<dyn DocumentStore>,
        engine: Arc<dyn TranslationEngine>,
        provider: Arc<dyn SpeechProvider>,
        config: ConversionConfig,
    ) -> Self {
        Self {
            blobs,
            documents,
            translator: BrailleTranslator::new(engine),
            synthesizer: SpeechSynthesizer::new(provider, &config),
            config,
        }
    }

    /// Wire the shipped engine and provider: `lou_translate` and Google
    /// Translate TTS, both configured from `config`.
    pub fn from_config(
        blobs: Arc<dyn BlobStore>,
        documents: Arc<dyn DocumentStore>,
        config: ConversionConfig,
    ) -> Result<Self, ConvertError> {
        let engine = LiblouisEngine::from_config(&config);
        if !engine.is_available() {
            info!(
                "lou_translate not available ({}), Braille will use the fallback table",
                config.lou_translate.display()
            );
        }
        let provider = GoogleTranslateTts::from_config(&config)
            .map_err(|e| ConvertError::InvalidConfig(e.to_string()))?;
        Ok(Self::new(blobs, documents, Arc::new(engine), Arc::new(provider), config))
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    pub fn synthesizer(&self) -> &SpeechSynthesizer {
        &self.synthesizer
    }

    /// Store an uploaded file and record it as a document of `owner_id`.
    ///
    /// Files over `max_upload_bytes` are refused before anything is written.
    /// The format is not checked here; an unsupported file fails when it is
    /// converted.
    pub async fn upload(
        &self,
        owner_id: &str,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<SourceDocument, ConvertError> {
        let size = bytes.len() as u64;
        if size > self.config.max_upload_bytes {
            return Err(ConvertError::FileTooLarge {
                file_name: file_name.to_string(),
                size,
                limit: self.config.max_upload_bytes,
            });
        }

        let uploaded_at = Utc::now();
        let key = original_key(
            &self.config.upload_prefix,
            owner_id,
            uploaded_at.timestamp_millis(),
            file_name,
        );
        let source = self.store_blob(bytes, &key).await?;

        let mut document = SourceDocument::new(owner_id, file_name, size, source.clone());
        document.created_at = uploaded_at;
        if let Err(e) = self.documents.insert(document.clone()).await {
            // Nothing references the fresh blob yet.
            if let Err(del) = self.blobs.delete(&source).await {
                warn!("Could not remove unrecorded upload {}: {}", source, del);
            }
            return Err(ConvertError::StorageWriteFailed {
                key: document.id,
                cause: e.to_string(),
            });
        }

        info!("Uploaded '{}' ({} bytes) for '{}' as {}", file_name, size, owner_id, document.id);
        Ok(document)
    }

    /// Documents of `owner_id`, newest upload first.
    pub async fn documents_of(&self, owner_id: &str) -> Result<Vec<SourceDocument>, ConvertError> {
        self.documents
            .list_by_owner(owner_id)
            .await
            .map_err(|e| ConvertError::SourceUnavailable {
                cause: format!("document listing failed: {e}"),
            })
    }

    /// Convert a document to contracted and uncontracted Braille.
    ///
    /// `requester_id` is recorded in the logs only; artifact keys are scoped by
    /// the document's owner.
    pub async fn convert_to_braille(
        &self,
        document_id: &str,
        requester_id: &str,
    ) -> Result<BrailleOutput, ConvertError> {
        let total_start = Instant::now();
        info!("Braille conversion of '{}' requested by '{}'", document_id, requester_id);
        self.notify_start(document_id, ArtifactKind::Braille);

        let mut stats = ConversionStats::default();
        let (document, text) = self.load_text(document_id, &mut stats).await?;

        self.notify_stage(Stage::Translate);
        let transform_start = Instant::now();
        if text.trim().is_empty() {
            warn!("Document '{}' has no text; storing empty Braille", document_id);
        }
        let translation = self.translator.translate(&text).await;
        stats.transform_ms = transform_start.elapsed().as_millis() as u64;
        debug!(
            "Translated {} chars → {} contracted / {} uncontracted cells in {}ms",
            stats.text_chars,
            translation.contracted.chars().count(),
            translation.uncontracted.chars().count(),
            stats.transform_ms
        );

        self.notify_stage(Stage::Store);
        let store_start = Instant::now();
        let prefix = &self.config.key_prefix;
        let contracted_ref = self
            .store_blob(
                translation.contracted.clone().into_bytes(),
                &contracted_key(prefix, &document.owner_id, &document.id),
            )
            .await?;
        let uncontracted_ref = match self
            .store_blob(
                translation.uncontracted.clone().into_bytes(),
                &uncontracted_key(prefix, &document.owner_id, &document.id),
            )
            .await
        {
            Ok(r) => r,
            Err(e) => {
                self.discard_unlinked(&document.id, &contracted_ref).await;
                return Err(e);
            }
        };

        let artifact = ConversionArtifact::new(
            ArtifactKind::Braille,
            vec![contracted_ref.clone(), uncontracted_ref.clone()],
        );
        self.link(&document.id, artifact).await?;
        stats.store_ms = store_start.elapsed().as_millis() as u64;
        stats.total_ms = total_start.elapsed().as_millis() as u64;

        info!(
            "Braille conversion of '{}' complete in {}ms: {}, {}",
            document.id, stats.total_ms, contracted_ref, uncontracted_ref
        );
        self.notify_complete(&document.id, ArtifactKind::Braille);

        Ok(BrailleOutput {
            document_id: document.id,
            contracted_ref,
            uncontracted_ref,
            contracted: translation.contracted,
            uncontracted: translation.uncontracted,
            stats,
        })
    }

    /// Convert a document to one merged audio file.
    pub async fn convert_to_speech(
        &self,
        document_id: &str,
        requester_id: &str,
    ) -> Result<SpeechOutput, ConvertError> {
        let total_start = Instant::now();
        info!("Speech conversion of '{}' requested by '{}'", document_id, requester_id);
        self.notify_start(document_id, ArtifactKind::Speech);

        let mut stats = ConversionStats::default();
        let (document, text) = self.load_text(document_id, &mut stats).await?;

        self.notify_stage(Stage::Synthesize);
        let transform_start = Instant::now();
        let chunks = self.synthesizer.chunks(&text)?;
        let chunk_count = chunks.len();
        let audio = self.synthesizer.synthesize_chunks(&chunks).await?;
        stats.transform_ms = transform_start.elapsed().as_millis() as u64;
        let byte_len = audio.len();

        self.notify_stage(Stage::Store);
        let store_start = Instant::now();
        let audio_ref = self
            .store_blob(audio, &speech_key(&self.config.key_prefix, &document.id))
            .await?;
        let artifact = ConversionArtifact::new(ArtifactKind::Speech, vec![audio_ref.clone()]);
        self.link(&document.id, artifact).await?;
        stats.store_ms = store_start.elapsed().as_millis() as u64;
        stats.total_ms = total_start.elapsed().as_millis() as u64;

        info!(
            "Speech conversion of '{}' complete in {}ms: {} chunk(s), {} bytes at {}",
            document.id, stats.total_ms, chunk_count, byte_len, audio_ref
        );
        self.notify_complete(&document.id, ArtifactKind::Speech);

        Ok(SpeechOutput {
            document_id: document.id,
            audio_ref,
            chunk_count,
            byte_len,
            stats,
        })
    }

    /// Steps 1–3: find the document, fetch its bytes, extract its text.
    async fn load_text(
        &self,
        document_id: &str,
        stats: &mut ConversionStats,
    ) -> Result<(SourceDocument, String), ConvertError> {
        let document = self
            .documents
            .find(document_id)
            .await
            .map_err(|e| ConvertError::SourceUnavailable {
                cause: format!("document lookup failed: {e}"),
            })?
            .ok_or_else(|| ConvertError::NotFound {
                document_id: document_id.to_string(),
                reason: "no such document".into(),
            })?;

        let source = document.source.clone().ok_or_else(|| ConvertError::NotFound {
            document_id: document_id.to_string(),
            reason: "document has no stored file".into(),
        })?;

        let hint = if document.format_hint.is_empty() {
            crate::model::extension_of(&document.file_name)
        } else {
            document.format_hint.clone()
        };
        let format = DocumentFormat::from_extension(&hint)?;

        self.notify_stage(Stage::Fetch);
        let fetch_start = Instant::now();
        let bytes = self.blobs.get(&source).await.map_err(|e| ConvertError::SourceUnavailable {
            cause: e.to_string(),
        })?;
        stats.fetch_ms = fetch_start.elapsed().as_millis() as u64;
        stats.source_bytes = bytes.len();
        debug!("Fetched {} bytes for '{}' in {}ms", bytes.len(), document_id, stats.fetch_ms);

        self.notify_stage(Stage::Extract);
        let extract_start = Instant::now();
        let text = extract::extract_with_format(bytes, format).await?;
        stats.extract_ms = extract_start.elapsed().as_millis() as u64;
        stats.text_chars = text.chars().count();
        debug!(
            "Extracted {} chars from '{}' ({}) in {}ms",
            stats.text_chars, document.file_name, format, stats.extract_ms
        );

        Ok((document, text))
    }

    async fn store_blob(&self, bytes: Vec<u8>, key: &str) -> Result<BlobRef, ConvertError> {
        self.blobs
            .put(bytes, key)
            .await
            .map_err(|e| ConvertError::StorageWriteFailed {
                key: key.to_string(),
                cause: e.to_string(),
            })
    }

    /// Remove a blob written earlier in a request that failed afterwards.
    ///
    /// Stores that overwrite in place hand back the same reference for the
    /// same key, so the blob may be the one the document links right now; such
    /// a blob is kept.
    async fn discard_unlinked(&self, document_id: &str, blob: &BlobRef) {
        let linked = match self.documents.find(document_id).await {
            Ok(Some(document)) => [ArtifactKind::Braille, ArtifactKind::Speech]
                .into_iter()
                .filter_map(|kind| document.artifact(kind))
                .any(|artifact| artifact.refs.iter().any(|r| r.url == blob.url)),
            Ok(None) => false,
            Err(e) => {
                warn!("Keeping {}: cannot check the document's links: {}", blob, e);
                return;
            }
        };
        if linked {
            debug!("Keeping {}: still linked to '{}'", blob, document_id);
            return;
        }
        match self.blobs.delete(blob).await {
            Ok(()) | Err(StoreError::Missing { .. }) => {}
            Err(e) => warn!("Could not remove orphaned blob {}: {}", blob, e),
        }
    }

    async fn link(
        &self,
        document_id: &str,
        artifact: ConversionArtifact,
    ) -> Result<(), ConvertError> {
        let kind = artifact.kind;
        self.documents
            .update(document_id, artifact)
            .await
            .map_err(|e| ConvertError::StorageWriteFailed {
                key: format!("{document_id}#{kind}"),
                cause: e.to_string(),
            })
    }

    fn notify_start(&self, document_id: &str, kind: ArtifactKind) {
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_conversion_start(document_id, kind);
        }
    }

    fn notify_stage(&self, stage: Stage) {
        debug!("Stage: {}", stage);
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_stage(stage);
        }
    }

    fn notify_complete(&self, document_id: &str, kind: ArtifactKind) {
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_conversion_complete(document_id, kind);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::NoEngine;
    use crate::error::ProviderError;
    use crate::store::{MemoryBlobStore, MemoryDocumentStore};
    use async_trait::async_trait;

    struct SilentProvider;

    #[async_trait]
    impl SpeechProvider for SilentProvider {
        async fn synthesize_chunk(
            &self,
            _chunk: &str,
            _language: &str,
        ) -> Result<Vec<u8>, ProviderError> {
            Ok(vec![0xFF])
        }
    }

    fn converter(blobs: Arc<MemoryBlobStore>, documents: Arc<MemoryDocumentStore>) -> Converter {
        Converter::new(
            blobs,
            documents,
            Arc::new(NoEngine),
            Arc::new(SilentProvider),
            ConversionConfig::default(),
        )
    }

    #[test]
    fn artifact_keys_are_deterministic() {
        let prefix = "braillebridge/converted";
        assert_eq!(
            contracted_key(prefix, "u1", "d1"),
            "braillebridge/converted/braille/u1/d1-g2.brf"
        );
        assert_eq!(
            uncontracted_key(prefix, "u1", "d1"),
            "braillebridge/converted/braille/u1/d1-unicode.txt"
        );
        assert_eq!(speech_key(prefix, "d1"), "braillebridge/converted/tts/d1-tts.mp3");
    }

    #[test]
    fn original_keys_replace_whitespace_runs() {
        assert_eq!(
            original_key("braillebridge/originals", "u1", 1700000000000, "My  Essay\tfinal.pdf"),
            "braillebridge/originals/u1/1700000000000-My_Essay_final.pdf"
        );
    }

    #[tokio::test]
    async fn upload_stores_original_and_records_document() {
        let blobs = Arc::new(MemoryBlobStore::new());
        let documents = Arc::new(MemoryDocumentStore::new());
        let converter = converter(blobs.clone(), documents.clone());

        let doc = converter.upload("u1", "my notes.txt", b"hello".to_vec()).await.unwrap();
        assert_eq!(doc.size, 5);
        assert_eq!(doc.format_hint, "txt");
        let source = doc.source.clone().unwrap();
        assert!(source.key.starts_with("braillebridge/originals/u1/"), "{}", source.key);
        assert!(source.key.ends_with("-my_notes.txt"), "{}", source.key);
        assert_eq!(blobs.get(&source).await.unwrap(), b"hello");

        let listed = converter.documents_of("u1").await.unwrap();
        assert_eq!(listed, vec![doc]);
    }

    #[tokio::test]
    async fn oversized_upload_writes_nothing() {
        let blobs = Arc::new(MemoryBlobStore::new());
        let documents = Arc::new(MemoryDocumentStore::new());
        let config = ConversionConfig::builder().max_upload_bytes(4).build().unwrap();
        let converter = Converter::new(
            blobs.clone(),
            documents.clone(),
            Arc::new(NoEngine),
            Arc::new(SilentProvider),
            config,
        );

        let err = converter.upload("u1", "big.txt", b"hello".to_vec()).await.unwrap_err();
        assert!(
            matches!(err, ConvertError::FileTooLarge { size: 5, limit: 4, .. }),
            "{err:?}"
        );
        assert!(!err.is_retriable());
        assert!(blobs.is_empty());
        assert!(converter.documents_of("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_document_is_not_found() {
        let blobs = Arc::new(MemoryBlobStore::new());
        let converter = converter(blobs.clone(), Arc::new(MemoryDocumentStore::new()));
        let err = converter.convert_to_braille("nope", "u1").await.unwrap_err();
        assert!(matches!(err, ConvertError::NotFound { .. }), "{err:?}");
        assert!(blobs.is_empty());
    }

    #[tokio::test]
    async fn document_without_source_is_not_found() {
        let documents = Arc::new(MemoryDocumentStore::new());
        let mut doc =
            SourceDocument::new("u1", "a.txt", 3, BlobRef::new("k", "mem://k#v1")).with_id("d1");
        doc.source = None;
        documents.insert(doc).await.unwrap();

        let converter = converter(Arc::new(MemoryBlobStore::new()), documents);
        let err = converter.convert_to_speech("d1", "u1").await.unwrap_err();
        assert!(matches!(err, ConvertError::NotFound { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn unsupported_extension_writes_nothing() {
        let blobs = Arc::new(MemoryBlobStore::new());
        let source = blobs.put(b"a,b,c".to_vec(), "uploads/sheet.csv").await.unwrap();
        let documents = Arc::new(MemoryDocumentStore::new());
        documents
            .insert(SourceDocument::new("u1", "sheet.csv", 5, source).with_id("d1"))
            .await
            .unwrap();

        let converter = converter(blobs.clone(), documents.clone());
        let err = converter.convert_to_braille("d1", "u1").await.unwrap_err();
        assert!(
            matches!(err, ConvertError::UnsupportedFormat { ref extension } if extension == "csv"),
            "{err:?}"
        );
        assert_eq!(blobs.len(), 1);
        assert!(documents.find("d1").await.unwrap().unwrap().braille.is_none());
    }
}
