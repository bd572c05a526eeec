//! Document sources feeding the build pipeline.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::errors::RagError;
use crate::io_jsonl;

/// One collected item. `content = None` means the source had nothing usable.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CollectedItem {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

pub trait Collector: Send + Sync {
    fn name(&self) -> &str;

    /// Number of items [`Collector::items`] yields.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when the content should be left out of the index.
    fn ignore_item(&self, content: &str) -> bool {
        content.trim().is_empty()
    }

    fn items(&self) -> Result<Vec<CollectedItem>, RagError>;
}

/* ------------------------------- JSONL file ------------------------------- */

/// Rows of `{ "content": str|null, "metadata": {...} }`.
pub struct JsonlCollector {
    name: String,
    items: Vec<CollectedItem>,
}

impl JsonlCollector {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RagError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(RagError::Config(format!(
                "collector file {} does not exist",
                path.display()
            )));
        }
        let items: Vec<CollectedItem> = io_jsonl::read_all(path)?;
        Ok(Self {
            name: format!("jsonl:{}", path.display()),
            items,
        })
    }
}

impl Collector for JsonlCollector {
    fn name(&self) -> &str {
        &self.name
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn items(&self) -> Result<Vec<CollectedItem>, RagError> {
        Ok(self.items.clone())
    }
}

/* -------------------------------- Directory ------------------------------- */

/// Text files under a directory tree, filtered by extension.
pub struct DirectoryCollector {
    name: String,
    files: Vec<PathBuf>,
}

impl DirectoryCollector {
    pub fn open(root: impl AsRef<Path>, extensions: &[String]) -> Result<Self, RagError> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(RagError::Config(format!(
                "collector directory {} does not exist",
                root.display()
            )));
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(root).into_iter().filter_map(Result::ok) {
            if !entry.file_type().is_file() {
                continue;
            }
            let p = entry.path();
            let ext = p.extension().and_then(|s| s.to_str()).unwrap_or_default();
            if extensions.iter().any(|e| e.trim_start_matches('.').eq_ignore_ascii_case(ext)) {
                files.push(p.to_path_buf());
            }
        }
        files.sort();
        debug!(root = %root.display(), files = files.len(), "directory scanned");

        Ok(Self {
            name: format!("directory:{}", root.display()),
            files,
        })
    }
}

impl Collector for DirectoryCollector {
    fn name(&self) -> &str {
        &self.name
    }

    fn len(&self) -> usize {
        self.files.len()
    }

    fn items(&self) -> Result<Vec<CollectedItem>, RagError> {
        let mut out = Vec::with_capacity(self.files.len());
        for path in &self.files {
            let title = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_string();
            let source = path.display().to_string();
            let metadata = json!({ "title": title, "source": source, "url": source });

            let content = match fs::read_to_string(path) {
                Ok(s) => Some(s),
                Err(e) => {
                    warn!(path = %source, error = %e, "unreadable file");
                    None
                }
            };
            out.push(CollectedItem {
                content,
                metadata: metadata.as_object().cloned().unwrap_or_default(),
            });
        }
        Ok(out)
    }
}
