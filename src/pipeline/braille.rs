//! Braille translation: external engine first, fixed transliteration table
//! as the fallback.
//!
//! Each output channel is resolved on its own. A channel uses the engine's
//! answer when the engine is available and returns non-empty text; otherwise
//! (unavailable, empty answer, or an invocation error) it falls back to
//! [`fallback_braille`]. Translation therefore never fails, and the only
//! visible difference between the two paths is output quality.

use crate::engine::TranslationEngine;
use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Both Braille renditions of one text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationResult {
    /// Contracted (grade-2) Braille.
    pub contracted: String,
    /// Uncontracted dot-pattern Braille.
    pub uncontracted: String,
}

/// Cells for a single character, case-insensitive. `None` means the
/// character is dropped.
pub fn braille_cells(ch: char) -> Option<&'static str> {
    let cells = match ch.to_ascii_lowercase() {
        'a' => "⠁",
        'b' => "⠃",
        'c' => "⠉",
        'd' => "⠙",
        'e' => "⠑",
        'f' => "⠋",
        'g' => "⠛",
        'h' => "⠓",
        'i' => "⠊",
        'j' => "⠚",
        'k' => "⠅",
        'l' => "⠇",
        'm' => "⠍",
        'n' => "⠝",
        'o' => "⠕",
        'p' => "⠏",
        'q' => "⠟",
        'r' => "⠗",
        's' => "⠎",
        't' => "⠞",
        'u' => "⠥",
        'v' => "⠧",
        'w' => "⠺",
        'x' => "⠭",
        'y' => "⠽",
        'z' => "⠵",

        // Digits reuse the a–j cells, without a number sign.
        '0' => "⠚",
        '1' => "⠁",
        '2' => "⠃",
        '3' => "⠉",
        '4' => "⠙",
        '5' => "⠑",
        '6' => "⠋",
        '7' => "⠛",
        '8' => "⠓",
        '9' => "⠊",

        ' ' => " ",
        '.' => "⠲",
        ',' => "⠂",
        '?' => "⠦",
        '!' => "⠖",
        '-' => "⠤",
        '"' => "⠶",
        '\'' => "⠄",
        ':' => "⠒",
        ';' => "⠆",
        '/' => "⠌",
        '\\' => "⠸",
        '(' => "⠶",
        ')' => "⠶",
        '@' => "⠈",
        '#' => "⠼",
        '&' => "⠯",
        '*' => "⠡",
        '+' => "⠬",
        '=' => "⠿",
        '%' => "⠨⠴",
        '<' => "⠣",
        '>' => "⠜",
        '$' => "⠈⠎",
        _ => return None,
    };
    Some(cells)
}

/// Deterministic character-by-character transliteration.
///
/// Unmapped characters, including newlines and tabs, are dropped.
pub fn fallback_braille(text: &str) -> String {
    text.chars().filter_map(braille_cells).collect()
}

/// Two-tier Braille translator.
#[derive(Clone)]
pub struct BrailleTranslator {
    engine: Arc<dyn TranslationEngine>,
}

impl BrailleTranslator {
    pub fn new(engine: Arc<dyn TranslationEngine>) -> Self {
        Self { engine }
    }

    /// Translate `text` into both encodings. Never fails.
    pub async fn translate(&self, text: &str) -> TranslationResult {
        if text.is_empty() {
            return TranslationResult {
                contracted: String::new(),
                uncontracted: String::new(),
            };
        }

        if !self.engine.is_available() {
            debug!("Braille engine unavailable, using fallback table");
            let fallback = fallback_braille(text);
            return TranslationResult {
                contracted: fallback.clone(),
                uncontracted: fallback,
            };
        }

        let (contracted, uncontracted) = tokio::join!(
            self.engine.translate_contracted(text),
            self.engine.translate_uncontracted(text)
        );

        TranslationResult {
            contracted: resolve_channel("contracted", contracted, text),
            uncontracted: resolve_channel("uncontracted", uncontracted, text),
        }
    }
}

fn resolve_channel(channel: &str, result: Result<String, EngineError>, text: &str) -> String {
    match result {
        Ok(out) if !out.trim().is_empty() => out,
        Ok(_) => {
            warn!("Braille engine returned no {} output, using fallback table", channel);
            fallback_braille(text)
        }
        Err(e) => {
            warn!("Braille engine {} translation failed ({}), using fallback table", channel, e);
            fallback_braille(text)
        }
    }
}
