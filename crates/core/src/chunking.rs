use crate::error::IngestError;
use crate::models::Chunk;
use regex::Regex;

/// Separator pattern used when none is configured: a sentence terminator
/// followed by a line break.
pub const DEFAULT_SEPARATOR_PATTERN: &str = r"\.\n";

pub const DEFAULT_MAX_WORDS: usize = 200;

/// How extracted text is cut into chunks. Both strategies are deterministic:
/// the same input always yields the same chunk sequence.
#[derive(Debug, Clone)]
pub enum ChunkStrategy {
    /// Split on a configured separator pattern, one chunk per delimited unit.
    ///
    /// A separator occurrence only ends a chunk when non-whitespace text
    /// follows it; a trailing separator is kept in the final chunk (modulo
    /// trailing-whitespace trim). Units are trimmed and empty units dropped,
    /// so `"The sky is blue.\n"` + `"Grass is green.\n"` splits into
    /// `["The sky is blue", "Grass is green."]`.
    Separator { pattern: String },

    /// Accumulate whitespace-delimited words until `max_words`, then flush.
    /// A blank-line paragraph boundary flushes early, so a chunk never spans
    /// two paragraphs. The final partial chunk is always flushed.
    WordCount { max_words: usize },
}

impl Default for ChunkStrategy {
    fn default() -> Self {
        ChunkStrategy::Separator {
            pattern: DEFAULT_SEPARATOR_PATTERN.to_string(),
        }
    }
}

/// Split extracted text into ordered, 1-indexed chunks.
///
/// Fails with [`IngestError::EmptyDocument`] only when the input holds no
/// non-whitespace text; any other input produces at least one chunk.
pub fn split_chunks(text: &str, strategy: &ChunkStrategy) -> Result<Vec<Chunk>, IngestError> {
    if text.trim().is_empty() {
        return Err(IngestError::EmptyDocument);
    }

    let pieces = match strategy {
        ChunkStrategy::Separator { pattern } => {
            if pattern.is_empty() {
                return Err(IngestError::InvalidChunkConfig(
                    "separator pattern is empty".to_string(),
                ));
            }
            let separator = Regex::new(pattern)?;
            split_by_separator(text, &separator)
        }
        ChunkStrategy::WordCount { max_words } => {
            if *max_words == 0 {
                return Err(IngestError::InvalidChunkConfig(
                    "word cap must be at least 1".to_string(),
                ));
            }
            split_by_word_count(text, *max_words)
        }
    };

    Ok(pieces
        .into_iter()
        .enumerate()
        .map(|(position, piece)| Chunk::new(position as u64 + 1, piece))
        .collect())
}

fn split_by_separator(text: &str, separator: &Regex) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut start = 0usize;

    for found in separator.find_iter(text) {
        // a separator with nothing but whitespace after it is not a boundary
        if text[found.end()..].trim().is_empty() {
            continue;
        }

        let unit = text[start..found.start()].trim();
        if !unit.is_empty() {
            pieces.push(unit.to_string());
        }
        start = found.end();
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        pieces.push(tail.to_string());
    }

    pieces
}

fn split_by_word_count(text: &str, max_words: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for paragraph in text.split("\n\n") {
        if paragraph.trim().is_empty() {
            continue;
        }

        for word in paragraph.split_whitespace() {
            current.push(word);
            if current.len() >= max_words {
                pieces.push(current.join(" "));
                current.clear();
            }
        }

        if !current.is_empty() {
            pieces.push(current.join(" "));
            current.clear();
        }
    }

    pieces
}
