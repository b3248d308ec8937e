//! # braillebridge
//!
//! Convert uploaded documents into accessible formats: contracted and
//! uncontracted Braille, and spoken audio.
//!
//! ## Pipeline Overview
//!
//! ```text
//! document id
//!  │
//!  ├─ 1. Fetch     look up the document, read its bytes from blob storage
//!  ├─ 2. Extract   PDF (pdfium) / DOCX (zip + XML) / plain text → text
//!  ├─ 3a. Braille  lou_translate when available, fixed table otherwise
//!  ├─ 3b. Speech   ≤200-char chunks → concurrent TTS calls → merged MP3
//!  └─ 4. Store     write artifact blob(s), link them to the document
//! ```
//!
//! Storage, the Braille engine and the speech provider are traits
//! ([`BlobStore`], [`DocumentStore`], [`TranslationEngine`],
//! [`SpeechProvider`]); the orchestrator only sees `Arc<dyn …>` handles.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use braillebridge::{ConversionConfig, Converter, FsBlobStore, MemoryDocumentStore};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::default();
//!     let blobs = Arc::new(FsBlobStore::new("./store", config.download_timeout_secs)?);
//!     let documents = Arc::new(MemoryDocumentStore::new());
//!     let converter = Converter::from_config(blobs, documents, config)?;
//!
//!     let document = converter
//!         .upload("user-1", "letter.txt", std::fs::read("letter.txt")?)
//!         .await?;
//!     let braille = converter.convert_to_braille(&document.id, "user-1").await?;
//!     println!("{}", braille.contracted);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `braillebridge` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! braillebridge = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod engine;
pub mod error;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod store;
pub mod stream;
pub mod tts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder};
pub use convert::Converter;
pub use engine::{LiblouisEngine, NoEngine, TranslationEngine};
pub use error::{ConvertError, EngineError, ErrorClass, ProviderError, StoreError};
pub use model::{ArtifactKind, BlobRef, ConversionArtifact, DocumentFormat, SourceDocument};
pub use output::{BrailleOutput, ConversionStats, SpeechOutput};
pub use pipeline::braille::{fallback_braille, BrailleTranslator, TranslationResult};
pub use pipeline::chunk::split_text;
pub use pipeline::extract::{extract, extract_file};
pub use pipeline::speech::SpeechSynthesizer;
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback, Stage};
pub use store::{BlobStore, DocumentStore, FsBlobStore, MemoryBlobStore, MemoryDocumentStore};
pub use stream::{synthesize_stream, AudioChunk, ChunkStream};
pub use tts::{GoogleTranslateTts, SpeechProvider};
