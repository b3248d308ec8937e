//! Streaming speech API: emit audio chunk by chunk.
//!
//! [`crate::convert::Converter::convert_to_speech`] returns only after the whole
//! document is synthesized and stored. [`synthesize_stream`] instead yields an
//! [`AudioChunk`] as soon as the chunk and every chunk before it are ready,
//! so playback can start on a long document after the first request returns.
//!
//! Requests still run `concurrency` at a time, but items are emitted strictly
//! in chunk order. Concatenating every `bytes` field gives the same buffer as
//! [`crate::pipeline::speech::SpeechSynthesizer::synthesize`]. Nothing is
//! written to storage.

use crate::error::ConvertError;
use crate::pipeline::speech::SpeechSynthesizer;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::pin::Pin;
use tokio_stream::Stream;
use tracing::info;

/// Audio for one chunk of text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AudioChunk {
    /// 0-based position of the chunk in the document.
    pub index: usize,
    /// The text that was spoken.
    pub text: String,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

/// A boxed stream of chunk results.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<AudioChunk, ConvertError>> + Send>>;

/// Synthesize `text`, yielding each chunk's audio in order.
///
/// # Returns
/// - `Ok(ChunkStream)`: one item per chunk; an `Err` item means that chunk
///   failed, and the caller should stop consuming
/// - `Err(ConvertError::EmptyText)`: nothing to speak
///
/// # Example
/// ```rust,no_run
/// use braillebridge::{synthesize_stream, ConversionConfig, GoogleTranslateTts, SpeechSynthesizer};
/// use futures::StreamExt;
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ConversionConfig::default();
/// let provider = Arc::new(GoogleTranslateTts::from_config(&config)?);
/// let synth = SpeechSynthesizer::new(provider, &config);
/// let mut chunks = synthesize_stream(&synth, "A long document...")?;
/// while let Some(chunk) = chunks.next().await {
///     let chunk = chunk?;
///     println!("chunk {}: {} bytes", chunk.index, chunk.bytes.len());
/// }
/// # Ok(())
/// # }
/// ```
pub fn synthesize_stream(
    synth: &SpeechSynthesizer,
    text: &str,
) -> Result<ChunkStream, ConvertError> {
    let chunks = synth.chunks(text)?;
    let total = chunks.len();
    info!("Streaming synthesis of {} chunk(s)", total);

    let synth = synth.clone();
    let concurrency = synth.concurrency();
    let s = stream::iter(chunks.into_iter().enumerate().map(move |(index, text)| {
        let synth = synth.clone();
        async move {
            let bytes = synth.synthesize_one(index, total, &text).await?;
            Ok(AudioChunk { index, text, bytes })
        }
    }))
    .buffered(concurrency);

    Ok(Box::pin(s))
}
