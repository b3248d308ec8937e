//! Configuration types for document conversion.
//!
//! All pipeline behaviour is controlled through [`ConversionConfig`], built via
//! its [`ConversionConfigBuilder`]. One struct holds every knob for the three
//! external boundaries the pipeline talks to: the Braille engine, the speech
//! provider and blob storage.

use crate::error::ConvertError;
use crate::progress::ProgressCallback;
use std::fmt;
use std::path::PathBuf;

/// Smallest accepted chunk limit; below this almost every word is hard-split.
const MIN_CHUNK_LIMIT: usize = 20;
const MAX_CHUNK_LIMIT: usize = 5000;

/// Default upload cap: 50 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

/// Configuration for the conversion pipeline.
///
/// # Example
/// ```rust
/// use braillebridge::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .language("fr")
///     .concurrency(2)
///     .build()
///     .unwrap();
/// assert_eq!(config.chunk_limit, 200);
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Maximum characters per speech-synthesis request. Default: 200.
    ///
    /// The Google Translate TTS endpoint rejects longer inputs, so this is the
    /// provider's hard limit rather than a tuning knob. Raise it only for a
    /// provider that accepts more.
    pub chunk_limit: usize,

    /// Speech language code passed to the provider. Default: "en".
    pub language: String,

    /// Ask the provider for slowed-down speech. Default: false.
    pub slow_speech: bool,

    /// Base URL of the TTS endpoint. Default: `https://translate.google.com`.
    pub tts_host: String,

    /// Number of chunk requests in flight at once. Default: 4.
    ///
    /// Output order never depends on this value; chunks are reassembled by
    /// index.
    pub concurrency: usize,

    /// `lou_translate` executable: an absolute path, or a bare name looked up
    /// on `PATH`. Default: "lou_translate".
    pub lou_translate: PathBuf,

    /// Liblouis translation table for contracted output. Default: "en-us-g2.ctb".
    ///
    /// A relative name is resolved by liblouis against its table path
    /// (`LOUIS_TABLEPATH`); the engine then only checks the executable.
    pub braille_table: PathBuf,

    /// Blob-key prefix for every artifact. Default: "braillebridge/converted".
    pub key_prefix: String,

    /// Blob-key prefix for uploaded originals. Default: "braillebridge/originals".
    pub upload_prefix: String,

    /// Largest accepted upload in bytes. Default: 50 MiB.
    pub max_upload_bytes: u64,

    /// Timeout for downloading source blobs over HTTP, in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Per-chunk speech request timeout in seconds. Default: 30.
    pub api_timeout_secs: u64,

    /// Timeout for one Braille engine invocation in seconds. Default: 60.
    pub engine_timeout_secs: u64,

    /// Optional observer for stage and chunk events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            chunk_limit: 200,
            language: "en".to_string(),
            slow_speech: false,
            tts_host: "https://translate.google.com".to_string(),
            concurrency: 4,
            lou_translate: PathBuf::from("lou_translate"),
            braille_table: PathBuf::from("en-us-g2.ctb"),
            key_prefix: "braillebridge/converted".to_string(),
            upload_prefix: "braillebridge/originals".to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            download_timeout_secs: 120,
            api_timeout_secs: 30,
            engine_timeout_secs: 60,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("chunk_limit", &self.chunk_limit)
            .field("language", &self.language)
            .field("slow_speech", &self.slow_speech)
            .field("tts_host", &self.tts_host)
            .field("concurrency", &self.concurrency)
            .field("lou_translate", &self.lou_translate)
            .field("braille_table", &self.braille_table)
            .field("key_prefix", &self.key_prefix)
            .field("upload_prefix", &self.upload_prefix)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("engine_timeout_secs", &self.engine_timeout_secs)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn chunk_limit(mut self, n: usize) -> Self {
        self.config.chunk_limit = n.clamp(MIN_CHUNK_LIMIT, MAX_CHUNK_LIMIT);
        self
    }

    pub fn language(mut self, lang: impl Into<String>) -> Self {
        self.config.language = lang.into();
        self
    }

    pub fn slow_speech(mut self, v: bool) -> Self {
        self.config.slow_speech = v;
        self
    }

    pub fn tts_host(mut self, host: impl Into<String>) -> Self {
        self.config.tts_host = host.into().trim_end_matches('/').to_string();
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn lou_translate(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.lou_translate = path.into();
        self
    }

    pub fn braille_table(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.braille_table = path.into();
        self
    }

    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.key_prefix = prefix.into().trim_matches('/').to_string();
        self
    }

    pub fn upload_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.upload_prefix = prefix.into().trim_matches('/').to_string();
        self
    }

    pub fn max_upload_bytes(mut self, n: u64) -> Self {
        self.config.max_upload_bytes = n;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn engine_timeout_secs(mut self, secs: u64) -> Self {
        self.config.engine_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, ConvertError> {
        let c = &self.config;
        if c.chunk_limit < MIN_CHUNK_LIMIT || c.chunk_limit > MAX_CHUNK_LIMIT {
            return Err(ConvertError::InvalidConfig(format!(
                "chunk limit must be {MIN_CHUNK_LIMIT}–{MAX_CHUNK_LIMIT}, got {}",
                c.chunk_limit
            )));
        }
        if c.concurrency == 0 {
            return Err(ConvertError::InvalidConfig("concurrency must be ≥ 1".into()));
        }
        if c.language.trim().is_empty() {
            return Err(ConvertError::InvalidConfig("language must not be empty".into()));
        }
        if !(c.tts_host.starts_with("http://") || c.tts_host.starts_with("https://")) {
            return Err(ConvertError::InvalidConfig(format!(
                "TTS host must be an http(s) URL, got '{}'",
                c.tts_host
            )));
        }
        if c.key_prefix.is_empty() || c.upload_prefix.is_empty() {
            return Err(ConvertError::InvalidConfig("key prefixes must not be empty".into()));
        }
        if c.max_upload_bytes == 0 {
            return Err(ConvertError::InvalidConfig("upload limit must be ≥ 1 byte".into()));
        }
        Ok(self.config)
    }
}
