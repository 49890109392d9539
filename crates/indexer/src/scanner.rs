use crate::config::IndexerConfig;
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};

/// Scanner for finding source files in a project
pub struct FileScanner {
    root: PathBuf,
    exclude_dirs: Vec<String>,
    max_file_bytes: u64,
}

impl FileScanner {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self::from_config(root, &IndexerConfig::default())
    }

    pub fn from_config(root: impl AsRef<Path>, config: &IndexerConfig) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            exclude_dirs: config
                .exclude_dirs
                .iter()
                .map(|dir| dir.to_lowercase())
                .collect(),
            max_file_bytes: config.max_file_bytes,
        }
    }

    /// Scan for source files (.gitignore aware); returns sorted `/`-separated
    /// paths relative to the root.
    pub fn scan(&self) -> Vec<String> {
        let mut files = Vec::new();

        let root = self.root.clone();
        let excluded = self.exclude_dirs.clone();
        let mut builder = WalkBuilder::new(&self.root);
        builder
            .hidden(true) // do not index hidden files by default
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .require_git(false);
        builder.filter_entry(move |entry| !is_excluded_dir(entry.path(), &root, &excluded));

        for result in builder.build() {
            match result {
                Ok(entry) => {
                    let Some(file_type) = entry.file_type() else {
                        continue;
                    };
                    if !file_type.is_file() {
                        continue;
                    }

                    let path = entry.path();
                    if let Ok(meta) = entry.metadata() {
                        if meta.len() > self.max_file_bytes {
                            log::debug!(
                                "Skipping large file {} ({} bytes > {})",
                                path.display(),
                                meta.len(),
                                self.max_file_bytes
                            );
                            continue;
                        }
                    }

                    if is_noise_file(path) || !is_source_file(path) {
                        continue;
                    }

                    files.push(self.relative_path(path));
                }
                Err(e) => log::warn!("Failed to read entry: {e}"),
            }
        }

        files.sort();
        log::info!("Found {} source files", files.len());
        files
    }

    fn relative_path(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        let mut normalized = relative.to_string_lossy().to_string();
        if normalized.contains('\\') {
            normalized = normalized.replace('\\', "/");
        }
        normalized
    }
}

fn is_excluded_dir(path: &Path, root: &Path, excluded: &[String]) -> bool {
    let Ok(relative) = path.strip_prefix(root) else {
        return false;
    };
    relative.components().any(|component| match component {
        std::path::Component::Normal(name) => {
            let lowered = name.to_string_lossy().to_lowercase();
            excluded.iter().any(|dir| *dir == lowered)
        }
        _ => false,
    })
}

fn is_source_file(path: &Path) -> bool {
    if let Some(file_name) = path.file_name().and_then(|name| name.to_str()) {
        if matches!(file_name, "Dockerfile" | "Makefile" | "Justfile") {
            return true;
        }
    }

    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase)
        .is_some_and(|ext| SUPPORTED_EXTENSIONS.iter().any(|candidate| *candidate == ext))
}

fn is_noise_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| {
            NOISE_FILE_NAMES
                .iter()
                .any(|candidate| name.eq_ignore_ascii_case(candidate))
        })
}

const NOISE_FILE_NAMES: &[&str] = &[
    "package-lock.json",
    "pnpm-lock.yaml",
    "yarn.lock",
    "Cargo.lock",
];

const SUPPORTED_EXTENSIONS: &[&str] = &[
    // Languages with a bundled grammar
    "rs", "py", "pyw", "js", "mjs", "cjs", "jsx", "ts", "tsx", "mts", "cts",
    // Line-window fallback
    "java", "kt", "kts", "go", "c", "h", "cpp", "cc", "cxx", "hpp", "hh", "hxx", "cs", "rb",
    "swift", "php", "scala", "lua", "sh", "bash", "zsh", "sql", "proto",
    // Docs / config
    "md", "rst", "txt", "yaml", "yml", "json", "toml", "ini", "xml", "html", "css",
];
