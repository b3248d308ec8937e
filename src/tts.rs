//! Speech providers: turn one short chunk of text into audio bytes.
//!
//! [`SpeechProvider`] is the seam the synthesizer talks to. The shipped
//! implementation, [`GoogleTranslateTts`], calls the public Google Translate
//! text-to-speech endpoint, which answers with MP3 audio for inputs of at most
//! 200 characters. MP3 frames are self-delimiting, so the audio of
//! consecutive chunks can be concatenated byte-for-byte.

use crate::config::ConversionConfig;
use crate::error::ProviderError;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Longest input the Google Translate endpoint accepts, in characters.
pub const GOOGLE_TTS_MAX_CHARS: usize = 200;

/// Produces audio for a single chunk of text.
#[async_trait]
pub trait SpeechProvider: Send + Sync {
    async fn synthesize_chunk(&self, chunk: &str, language: &str) -> Result<Vec<u8>, ProviderError>;
}

/// Google Translate TTS over HTTPS.
#[derive(Debug, Clone)]
pub struct GoogleTranslateTts {
    client: reqwest::Client,
    host: String,
    slow: bool,
    timeout_secs: u64,
}

impl GoogleTranslateTts {
    pub fn new(
        host: impl Into<String>,
        slow: bool,
        timeout_secs: u64,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ProviderError::Request(format!("HTTP client setup failed: {e}")))?;
        Ok(Self {
            client,
            host: host.into().trim_end_matches('/').to_string(),
            slow,
            timeout_secs,
        })
    }

    pub fn from_config(config: &ConversionConfig) -> Result<Self, ProviderError> {
        Self::new(config.tts_host.clone(), config.slow_speech, config.api_timeout_secs)
    }

    /// Build the `translate_tts` URL for one chunk.
    fn request_url(&self, chunk: &str, language: &str) -> Result<reqwest::Url, ProviderError> {
        let textlen = chunk.chars().count().to_string();
        let speed = if self.slow { "0.24" } else { "1" };
        reqwest::Url::parse_with_params(
            &format!("{}/translate_tts", self.host),
            &[
                ("ie", "UTF-8"),
                ("q", chunk),
                ("tl", language),
                ("total", "1"),
                ("idx", "0"),
                ("textlen", textlen.as_str()),
                ("client", "tw-ob"),
                ("prev", "input"),
                ("ttsspeed", speed),
            ],
        )
        .map_err(|e| ProviderError::Request(format!("invalid TTS host '{}': {e}", self.host)))
    }
}

#[async_trait]
impl SpeechProvider for GoogleTranslateTts {
    async fn synthesize_chunk(
        &self,
        chunk: &str,
        language: &str,
    ) -> Result<Vec<u8>, ProviderError> {
        if chunk.trim().is_empty() {
            return Err(ProviderError::Rejected("chunk is empty".into()));
        }
        let len = chunk.chars().count();
        if len > GOOGLE_TTS_MAX_CHARS {
            return Err(ProviderError::Rejected(format!(
                "{len} characters exceeds the {GOOGLE_TTS_MAX_CHARS}-character limit"
            )));
        }

        let url = self.request_url(chunk, language)?;
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Request(format!("timed out after {}s", self.timeout_secs))
            } else {
                ProviderError::Request(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ProviderError::Request(e.to_string()))?;
        debug!("TTS: {} chars → {} bytes of audio", len, bytes.len());
        Ok(bytes.to_vec())
    }
}
