//! Transformation stages between a stored file and a stored artifact.
//!
//! Each submodule implements one step, so each can be tested without the
//! others and without any storage.
//!
//! ## Data Flow
//!
//! ```text
//!                   ┌──▶ braille ─────────────────▶ contracted + uncontracted
//! bytes ──▶ extract ┤   (engine, fallback table)
//!           (text)  └──▶ chunk ──▶ speech ────────▶ merged audio
//!                       (≤ limit)  (provider, ordered by index)
//! ```
//!
//! 1. [`extract`] turns PDF, DOCX or plain-text bytes into text; PDF and
//!    DOCX parsing run in `spawn_blocking`
//! 2. [`braille`] produces both Braille encodings and never fails
//! 3. [`chunk`] splits text into provider-sized pieces at word boundaries
//! 4. [`speech`] requests audio per chunk concurrently and reassembles it

pub mod braille;
pub mod chunk;
pub mod extract;
pub mod speech;
