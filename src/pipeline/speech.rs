//! Chunked speech synthesis.
//!
//! The text is split with [`super::chunk::split_text`], every chunk is sent to
//! the [`SpeechProvider`] (up to `concurrency` requests in flight), and the
//! returned audio buffers are stitched together in chunk order. Completion
//! order never leaks into the output: each result lands in the slot of its
//! chunk index.
//!
//! The first failing chunk aborts the whole request; audio already received
//! for other chunks is dropped.

use crate::config::ConversionConfig;
use crate::error::ConvertError;
use crate::pipeline::chunk::split_text;
use crate::progress::ProgressCallback;
use crate::tts::SpeechProvider;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Speech synthesizer bound to one provider and one configuration.
#[derive(Clone)]
pub struct SpeechSynthesizer {
    provider: Arc<dyn SpeechProvider>,
    chunk_limit: usize,
    language: String,
    concurrency: usize,
    progress_callback: Option<ProgressCallback>,
}

impl SpeechSynthesizer {
    pub fn new(provider: Arc<dyn SpeechProvider>, config: &ConversionConfig) -> Self {
        Self {
            provider,
            chunk_limit: config.chunk_limit,
            language: config.language.clone(),
            concurrency: config.concurrency.max(1),
            progress_callback: config.progress_callback.clone(),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Split `text` into request-sized chunks.
    ///
    /// Chunks holding nothing but whitespace (runs of blank paragraphs or
    /// empty pages) are dropped: there is nothing in them to speak.
    ///
    /// Fails with [`ConvertError::EmptyText`] when there is nothing to speak.
    pub fn chunks(&self, text: &str) -> Result<Vec<String>, ConvertError> {
        let chunks: Vec<String> = split_text(text, self.chunk_limit)
            .into_iter()
            .filter(|chunk| !chunk.trim().is_empty())
            .collect();
        if chunks.is_empty() {
            return Err(ConvertError::EmptyText);
        }
        Ok(chunks)
    }

    /// Synthesize `text` into one contiguous audio buffer.
    pub async fn synthesize(&self, text: &str) -> Result<Vec<u8>, ConvertError> {
        let chunks = self.chunks(text)?;
        self.synthesize_chunks(&chunks).await
    }

    /// Synthesize pre-split chunks and concatenate the audio in chunk order.
    pub async fn synthesize_chunks(&self, chunks: &[String]) -> Result<Vec<u8>, ConvertError> {
        let total = chunks.len();
        if total == 0 {
            return Err(ConvertError::EmptyText);
        }
        info!(
            "Synthesizing {} chunk(s), concurrency {}, language '{}'",
            total, self.concurrency, self.language
        );
        let start = Instant::now();

        let mut results = stream::iter(chunks.iter().enumerate().map(|(index, chunk)| {
            let this = self.clone();
            async move { (index, this.synthesize_one(index, total, chunk).await) }
        }))
        .buffer_unordered(self.concurrency);

        let mut slots: Vec<Option<Vec<u8>>> = vec![None; total];
        while let Some((index, result)) = results.next().await {
            match result {
                Ok(audio) => slots[index] = Some(audio),
                Err(e) => {
                    warn!("Chunk {}/{} failed, discarding partial audio: {}", index + 1, total, e);
                    return Err(e);
                }
            }
        }

        let mut audio = Vec::with_capacity(slots.iter().flatten().map(Vec::len).sum());
        for (index, slot) in slots.into_iter().enumerate() {
            let part = slot.ok_or_else(|| {
                ConvertError::Internal(format!("chunk {index} produced no result"))
            })?;
            audio.extend_from_slice(&part);
        }

        debug!(
            "Synthesized {} bytes from {} chunk(s) in {}ms",
            audio.len(),
            total,
            start.elapsed().as_millis()
        );
        Ok(audio)
    }

    /// Request audio for one chunk, reporting progress either way.
    pub(crate) async fn synthesize_one(
        &self,
        index: usize,
        total: usize,
        chunk: &str,
    ) -> Result<Vec<u8>, ConvertError> {
        if let Some(ref cb) = self.progress_callback {
            cb.on_chunk_start(index, total);
        }
        match self.provider.synthesize_chunk(chunk, &self.language).await {
            Ok(audio) => {
                if let Some(ref cb) = self.progress_callback {
                    cb.on_chunk_complete(index, total, audio.len());
                }
                Ok(audio)
            }
            Err(e) => {
                if let Some(ref cb) = self.progress_callback {
                    cb.on_chunk_error(index, total, &e.to_string());
                }
                Err(ConvertError::SynthesisFailed {
                    chunk_index: index,
                    cause: e.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::progress::ConversionProgressCallback;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Echoes each chunk back as `<chunk>`; chunks starting with `slow_prefix`
    /// are delayed, chunks containing `fail_marker` fail.
    struct EchoProvider {
        slow_prefix: Option<char>,
        fail_marker: Option<&'static str>,
        calls: AtomicUsize,
        completed: Mutex<Vec<String>>,
    }

    impl EchoProvider {
        fn new() -> Self {
            Self {
                slow_prefix: None,
                fail_marker: None,
                calls: AtomicUsize::new(0),
                completed: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl SpeechProvider for EchoProvider {
        async fn synthesize_chunk(
            &self,
            chunk: &str,
            _language: &str,
        ) -> Result<Vec<u8>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if chunk.trim().is_empty() {
                return Err(ProviderError::Rejected("chunk is empty".into()));
            }
            if self.slow_prefix.is_some_and(|p| chunk.starts_with(p)) {
                tokio::time::sleep(Duration::from_millis(80)).await;
            }
            if self.fail_marker.is_some_and(|m| chunk.contains(m)) {
                return Err(ProviderError::Status { status: 500 });
            }
            self.completed.lock().unwrap().push(chunk.to_string());
            Ok(format!("<{chunk}>").into_bytes())
        }
    }

    fn config(concurrency: usize) -> ConversionConfig {
        ConversionConfig::builder()
            .chunk_limit(20)
            .concurrency(concurrency)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn blank_text_is_rejected_before_any_call() {
        let provider = Arc::new(EchoProvider::new());
        let synth = SpeechSynthesizer::new(provider.clone(), &config(2));
        assert!(matches!(synth.synthesize("").await, Err(ConvertError::EmptyText)));
        assert!(matches!(synth.synthesize(" \n\t ").await, Err(ConvertError::EmptyText)));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn whitespace_runs_are_not_sent_to_the_provider() {
        let provider = Arc::new(EchoProvider::new());
        let synth = SpeechSynthesizer::new(provider.clone(), &config(2));

        let text = format!("Intro{}Outro", "\n".repeat(450));
        let chunks = synth.chunks(&text).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].trim(), "Intro");
        assert_eq!(chunks[1].trim(), "Outro");

        let audio = synth.synthesize(&text).await.unwrap();
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
        assert_eq!(audio, format!("<{}><{}>", chunks[0], chunks[1]).into_bytes());
    }

    #[tokio::test]
    async fn audio_is_ordered_by_chunk_index_not_completion() {
        let provider = Arc::new(EchoProvider {
            slow_prefix: Some('a'),
            ..EchoProvider::new()
        });
        let synth = SpeechSynthesizer::new(provider.clone(), &config(2));

        // 19 a's + space fills the first 20-char chunk exactly.
        let text = format!("{} bbbbb", "a".repeat(19));
        let audio = synth.synthesize(&text).await.unwrap();

        let first = format!("<{} >", "a".repeat(19));
        assert_eq!(audio, format!("{first}<bbbbb>").into_bytes());
        // The second chunk really did finish first.
        assert_eq!(provider.completed.lock().unwrap()[0], "bbbbb");
    }

    #[tokio::test]
    async fn failing_chunk_fails_the_request() {
        let provider = Arc::new(EchoProvider {
            fail_marker: Some("boom"),
            ..EchoProvider::new()
        });
        let synth = SpeechSynthesizer::new(provider, &config(1));
        let text = format!("{} boom", "a".repeat(19));
        match synth.synthesize(&text).await {
            Err(ConvertError::SynthesisFailed { chunk_index, cause }) => {
                assert_eq!(chunk_index, 1);
                assert!(cause.contains("500"), "{cause}");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn one_provider_call_per_chunk_with_progress_events() {
        #[derive(Default)]
        struct Recorder {
            started: AtomicUsize,
            completed: AtomicUsize,
        }
        impl ConversionProgressCallback for Recorder {
            fn on_chunk_start(&self, _index: usize, total: usize) {
                assert_eq!(total, 5);
                self.started.fetch_add(1, Ordering::SeqCst);
            }
            fn on_chunk_complete(&self, _index: usize, _total: usize, audio_len: usize) {
                assert!(audio_len > 0);
                self.completed.fetch_add(1, Ordering::SeqCst);
            }
        }

        let recorder = Arc::new(Recorder::default());
        let cfg = ConversionConfig::builder()
            .chunk_limit(20)
            .concurrency(3)
            .progress_callback(recorder.clone())
            .build()
            .unwrap();
        let provider = Arc::new(EchoProvider::new());
        let synth = SpeechSynthesizer::new(provider.clone(), &cfg);

        let text = "abcdefghijklmnopqrs ".repeat(5); // 100 chars, 20 per chunk
        let audio = synth.synthesize(&text).await.unwrap();

        assert_eq!(provider.calls.load(Ordering::SeqCst), 5);
        assert_eq!(recorder.started.load(Ordering::SeqCst), 5);
        assert_eq!(recorder.completed.load(Ordering::SeqCst), 5);
        assert_eq!(audio.len(), text.len() + 2 * 5);
    }
}
