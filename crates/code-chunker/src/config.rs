use serde::{Deserialize, Serialize};

/// Configuration for code chunking behavior
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkerConfig {
    /// Size budget per chunk, in bytes of chunk text
    pub max_chunk_chars: usize,

    /// Chunk files without a bundled grammar by packing whole lines
    pub fallback_to_lines: bool,

    /// Languages to accept (empty = all)
    pub supported_languages: Vec<String>,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_chunk_chars: 1500,
            fallback_to_lines: true,
            supported_languages: vec![],
        }
    }
}

impl ChunkerConfig {
    /// Config with a specific budget and defaults otherwise
    #[must_use]
    pub fn with_max_chars(max_chunk_chars: usize) -> Self {
        Self {
            max_chunk_chars,
            ..Default::default()
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_chunk_chars == 0 {
            return Err("max_chunk_chars must be > 0".to_string());
        }
        Ok(())
    }

    pub(crate) fn accepts_language(&self, language: &str) -> bool {
        self.supported_languages.is_empty()
            || self
                .supported_languages
                .iter()
                .any(|candidate| candidate.eq_ignore_ascii_case(language))
    }
}
