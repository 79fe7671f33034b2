//! Sliding-window text chunking, by character count or token count.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tokenizers::Tokenizer;

use crate::error::{IndexError, Result};

/// Chunking unit selector.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkMode {
    #[default]
    Characters,
    Tokens,
}

#[derive(Debug, Clone)]
pub struct ChunkerConfig {
    pub mode: ChunkMode,
    /// Window size, in characters or tokens depending on mode.
    pub max_size: usize,
    /// Shared span between consecutive windows. Must stay below `max_size`.
    pub overlap: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            mode: ChunkMode::Characters,
            max_size: 1500,
            overlap: 200,
        }
    }
}

impl ChunkerConfig {
    /// Defaults for token-mode chunking.
    #[must_use]
    pub fn tokens() -> Self {
        Self {
            mode: ChunkMode::Tokens,
            max_size: 750,
            overlap: 100,
        }
    }
}

/// Splits text into overlapping windows.
///
/// Token mode owns its tokenizer handle; there is no process-global
/// tokenizer state.
pub struct Chunker {
    config: ChunkerConfig,
    tokenizer: Option<Tokenizer>,
}

impl std::fmt::Debug for Chunker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chunker")
            .field("config", &self.config)
            .field("tokenizer", &self.tokenizer.is_some())
            .finish()
    }
}

impl Chunker {
    /// Build a character-mode chunker.
    ///
    /// # Errors
    ///
    /// Returns `InvalidChunking` when `overlap >= max_size` or
    /// `max_size == 0` (the window would never advance), and a tokenizer
    /// error when the config requests token mode — use
    /// [`Chunker::with_tokenizer`] for that.
    pub fn new(config: ChunkerConfig) -> Result<Self> {
        validate(&config)?;
        if config.mode == ChunkMode::Tokens {
            return Err(IndexError::Tokenizer(
                "token mode requires a tokenizer file".into(),
            ));
        }
        Ok(Self {
            config,
            tokenizer: None,
        })
    }

    /// Build a token-mode chunker from a `tokenizers` JSON file.
    ///
    /// # Errors
    ///
    /// Returns `InvalidChunking` for degenerate window parameters, or a
    /// tokenizer error when the file cannot be loaded.
    pub fn with_tokenizer(config: ChunkerConfig, tokenizer_path: &Path) -> Result<Self> {
        validate(&config)?;
        let tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| IndexError::Tokenizer(e.to_string()))?;
        Ok(Self {
            config,
            tokenizer: Some(tokenizer),
        })
    }

    #[must_use]
    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Split `text` into overlapping chunks.
    ///
    /// Each window holds at most `max_size` units and shares `overlap`
    /// units with its predecessor; the walk stops once a window reaches
    /// the end of the text. Empty text yields no chunks.
    ///
    /// # Errors
    ///
    /// Returns a tokenizer error when token-mode encode/decode fails.
    pub fn chunk(&self, text: &str) -> Result<Vec<String>> {
        if text.is_empty() {
            return Ok(Vec::new());
        }
        match self.config.mode {
            ChunkMode::Characters => Ok(split_chars(
                text,
                self.config.max_size,
                self.config.overlap,
            )),
            ChunkMode::Tokens => self.split_tokens(text),
        }
    }

    fn split_tokens(&self, text: &str) -> Result<Vec<String>> {
        let tokenizer = self
            .tokenizer
            .as_ref()
            .ok_or_else(|| IndexError::Tokenizer("no tokenizer loaded".into()))?;

        let encoding = tokenizer
            .encode(text, false)
            .map_err(|e| IndexError::Tokenizer(e.to_string()))?;
        let ids = encoding.get_ids();
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let step = self.config.max_size - self.config.overlap;
        let mut chunks = Vec::new();
        let mut start = 0;
        while start < ids.len() {
            let end = (start + self.config.max_size).min(ids.len());
            let piece = tokenizer
                .decode(&ids[start..end], true)
                .map_err(|e| IndexError::Tokenizer(e.to_string()))?;
            chunks.push(piece);
            if end == ids.len() {
                break;
            }
            start += step;
        }
        Ok(chunks)
    }
}

fn validate(config: &ChunkerConfig) -> Result<()> {
    if config.max_size == 0 || config.overlap >= config.max_size {
        return Err(IndexError::InvalidChunking {
            max_size: config.max_size,
            overlap: config.overlap,
        });
    }
    Ok(())
}

fn split_chars(text: &str, max_size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let step = max_size - overlap;
    let mut chunks = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let end = (start + max_size).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }
    chunks
}
