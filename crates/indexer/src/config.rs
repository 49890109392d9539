use crate::error::{IndexerError, Result};
use reindex_code_chunker::ChunkerConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_BATCH_SIZE: usize = 200;
const MAX_BATCH_SIZE: usize = 4096;
const MAX_CHUNK_CHARS_LIMIT: usize = 1 << 20;

pub const BATCH_SIZE_ENV: &str = "REINDEX_BATCH_SIZE";
pub const MAX_CHUNK_CHARS_ENV: &str = "REINDEX_MAX_CHUNK_CHARS";

/// Indexing configuration, loadable from TOML.
///
/// ```toml
/// batch_size = 100
/// state_file = ".reindex/tree.json"
///
/// [chunker]
/// max_chunk_chars = 1200
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    /// Files chunked concurrently per batch
    pub batch_size: usize,

    pub chunker: ChunkerConfig,

    /// Drop directory nodes left empty when files are removed
    pub prune_empty_dirs: bool,

    /// Directory names skipped by the scanner (case-insensitive)
    pub exclude_dirs: Vec<String>,

    /// Files larger than this are not scanned
    pub max_file_bytes: u64,

    /// Where the content tree snapshot is persisted, if anywhere
    pub state_file: Option<PathBuf>,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            chunker: ChunkerConfig::default(),
            prune_empty_dirs: true,
            exclude_dirs: DEFAULT_EXCLUDED_DIRS
                .iter()
                .map(|dir| (*dir).to_string())
                .collect(),
            max_file_bytes: 2 * 1024 * 1024,
            state_file: None,
        }
    }
}

impl IndexerConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&raw)
    }

    /// Apply `REINDEX_BATCH_SIZE` / `REINDEX_MAX_CHUNK_CHARS` when set.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        let batch = std::env::var(BATCH_SIZE_ENV).ok();
        let chars = std::env::var(MAX_CHUNK_CHARS_ENV).ok();
        self.with_overrides(batch.as_deref(), chars.as_deref())
    }

    fn with_overrides(mut self, batch_size: Option<&str>, max_chunk_chars: Option<&str>) -> Self {
        self.batch_size = parse_clamped(batch_size, self.batch_size, MAX_BATCH_SIZE);
        self.chunker.max_chunk_chars = parse_clamped(
            max_chunk_chars,
            self.chunker.max_chunk_chars,
            MAX_CHUNK_CHARS_LIMIT,
        );
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.chunker
            .validate()
            .map_err(|e| IndexerError::InvalidConfig(format!("chunker: {e}")))?;
        if self.batch_size == 0 {
            return Err(IndexerError::InvalidConfig(
                "batch_size must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Batch size as used by the indexer.
    #[must_use]
    pub fn effective_batch_size(&self) -> usize {
        self.batch_size.clamp(1, MAX_BATCH_SIZE)
    }
}

fn parse_clamped(raw: Option<&str>, default_value: usize, max: usize) -> usize {
    raw.map(str::trim)
        .filter(|v| !v.is_empty())
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(default_value)
        .clamp(1, max)
}

const DEFAULT_EXCLUDED_DIRS: &[&str] = &[
    // VCS / tooling
    ".git",
    ".hg",
    ".svn",
    ".idea",
    ".vscode",
    // caches / builds
    ".cache",
    "node_modules",
    "build",
    "dist",
    "target",
    ".venv",
    "__pycache__",
    // vendored
    "vendor",
    "third_party",
    "third-party",
];

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_are_valid() {
        let config = IndexerConfig::default();
        config.validate().unwrap();
        assert_eq!(config.batch_size, 200);
        assert_eq!(config.chunker.max_chunk_chars, 1500);
        assert!(config.prune_empty_dirs);
        assert!(config.exclude_dirs.iter().any(|d| d == "vendor"));
    }

    #[test]
    fn parses_partial_toml() {
        let config = IndexerConfig::from_toml_str(
            r#"
batch_size = 16
state_file = "state/tree.json"

[chunker]
max_chunk_chars = 800
"#,
        )
        .unwrap();

        assert_eq!(config.batch_size, 16);
        assert_eq!(config.chunker.max_chunk_chars, 800);
        assert!(config.chunker.fallback_to_lines);
        assert_eq!(config.state_file, Some(PathBuf::from("state/tree.json")));
        assert_eq!(config.max_file_bytes, IndexerConfig::default().max_file_bytes);
    }

    #[test]
    fn rejects_zero_budget_and_bad_toml() {
        assert!(matches!(
            IndexerConfig::from_toml_str("[chunker]\nmax_chunk_chars = 0\n"),
            Err(IndexerError::InvalidConfig(_))
        ));
        assert!(matches!(
            IndexerConfig::from_toml_str("batch_size = \"many\""),
            Err(IndexerError::TomlError(_))
        ));
    }

    #[test]
    fn overrides_are_trimmed_parsed_and_clamped() {
        let base = IndexerConfig::default();

        let config = base.clone().with_overrides(Some(" 32 "), Some("900"));
        assert_eq!(config.batch_size, 32);
        assert_eq!(config.chunker.max_chunk_chars, 900);

        let config = base.clone().with_overrides(Some("0"), Some("abc"));
        assert_eq!(config.batch_size, 1);
        assert_eq!(config.chunker.max_chunk_chars, 1500);

        let config = base.clone().with_overrides(Some("1000000"), Some("   "));
        assert_eq!(config.batch_size, MAX_BATCH_SIZE);
        assert_eq!(config.chunker.max_chunk_chars, 1500);

        assert_eq!(base.clone().with_overrides(None, None), base);
    }

    #[test]
    fn reads_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reindex.toml");
        std::fs::write(&path, "prune_empty_dirs = false\n").unwrap();

        let config = IndexerConfig::from_file(&path).unwrap();
        assert!(!config.prune_empty_dirs);
    }
}
