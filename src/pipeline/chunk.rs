//! Text chunking for speech synthesis.
//!
//! Splits text into pieces no longer than the provider's per-request limit,
//! cutting only at whitespace or punctuation so no word is broken across two
//! requests. Limits are counted in characters, not bytes.

use tracing::warn;

/// Whitespace (including BOM and NBSP) or ASCII punctuation.
fn is_break(ch: char) -> bool {
    ch.is_whitespace() || ch == '\u{FEFF}' || ch == '\u{A0}' || ch.is_ascii_punctuation()
}

/// Split `text` into ordered chunks of at most `limit` characters.
///
/// For each window of `limit` characters:
/// - if the window's last character, or the character right after it, is a
///   break, cut exactly at the window end;
/// - otherwise cut after the last break inside the window;
/// - a window with no break at all (one word longer than `limit`) is cut at
///   the limit.
///
/// Concatenating the chunks reproduces `text` exactly. Empty input yields no
/// chunks.
pub fn split_text(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    let chars: Vec<char> = text.chars().collect();
    let mut chunks = Vec::with_capacity(chars.len() / limit + 1);
    let mut start = 0;

    while start < chars.len() {
        if chars.len() - start <= limit {
            chunks.push(chars[start..].iter().collect());
            break;
        }

        let end = start + limit - 1;
        let cut = if is_break(chars[end]) || is_break(chars[end + 1]) {
            end
        } else {
            match (start..end).rev().find(|&i| is_break(chars[i])) {
                Some(i) => i,
                None => {
                    warn!(
                        "Word longer than {} characters at offset {}; splitting it",
                        limit, start
                    );
                    end
                }
            }
        };

        chunks.push(chars[start..=cut].iter().collect());
        start = cut + 1;
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_one_chunk() {
        assert_eq!(split_text("Hello, World!", 200), vec!["Hello, World!"]);
    }

    #[test]
    fn empty_text_has_no_chunks() {
        assert!(split_text("", 200).is_empty());
    }

    #[test]
    fn cuts_at_boundary_when_next_char_is_space() {
        // 10 chars, then a space at index 10
        let chunks = split_text("abcdefghij klm", 10);
        assert_eq!(chunks, vec!["abcdefghij", " klm"]);
    }

    #[test]
    fn backs_off_to_last_break_inside_window() {
        let chunks = split_text("one two three four", 10);
        assert_eq!(chunks, vec!["one two ", "three four"]);
        for c in &chunks {
            assert!(c.chars().count() <= 10);
        }
    }

    #[test]
    fn punctuation_is_a_break() {
        let chunks = split_text("alpha,beta,gamma", 8);
        assert_eq!(chunks, vec!["alpha,", "beta,", "gamma"]);
    }

    #[test]
    fn aligned_text_yields_ceil_len_over_limit_chunks() {
        let text = "abcd ".repeat(5); // 25 chars
        let chunks = split_text(&text, 10);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks, vec!["abcd abcd ", "abcd abcd ", "abcd "]);
    }

    #[test]
    fn overlong_word_is_hard_split() {
        let chunks = split_text("abcdefghijklmnop", 5);
        assert_eq!(chunks, vec!["abcde", "fghij", "klmno", "p"]);
    }

    #[test]
    fn never_splits_a_word_when_a_break_exists() {
        let text = "The quick brown fox jumps over the lazy dog. ".repeat(20);
        let chunks = split_text(&text, 37);
        assert_eq!(chunks.concat(), text);
        let mut offset = 0;
        for chunk in &chunks[..chunks.len() - 1] {
            assert!(chunk.chars().count() <= 37);
            offset += chunk.len();
            let last = chunk.chars().last().unwrap();
            let next = text[offset..].chars().next();
            assert!(is_break(last) || next.map(is_break).unwrap_or(true));
        }
    }

    #[test]
    fn counts_characters_not_bytes() {
        let text = "ééééé ééééé";
        let chunks = split_text(text, 6);
        assert_eq!(chunks, vec!["ééééé ", "ééééé"]);
    }
}
