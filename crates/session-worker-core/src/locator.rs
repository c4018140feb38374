//! Model locator: picks the accelerator model file to benchmark.
//!
//! Resolution order, first hit wins:
//! 1. the override path, if it exists;
//! 2. the fixed candidate list, in order;
//! 3. a recursive walk of the search roots for any file with the model extension.
//!
//! The walk returns the first file in directory traversal order, which the filesystem does
//! not keep stable. Nothing is cached: every call resolves again.

use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::result::ModelReference;

/// Locator abstraction used by the runner.
pub trait ModelLocator: Send + Sync {
    fn locate(&self) -> Option<ModelReference>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocatorConfig {
    #[serde(default)]
    pub override_path: Option<PathBuf>,
    #[serde(default = "default_candidates")]
    pub candidates: Vec<PathBuf>,
    #[serde(default = "default_search_roots")]
    pub search_roots: Vec<PathBuf>,
    #[serde(default = "default_extension")]
    pub extension: String,
}

fn default_candidates() -> Vec<PathBuf> {
    [
        "/usr/local/hailo/resources/models/hailo8/yolov8s.hef",
        "/usr/local/hailo/resources/models/hailo8/yolov5m_seg.hef",
        "/usr/local/hailo/resources/models/hailo8/yolov11s.hef",
        "/opt/hailo/models/sample.hef",
    ]
    .into_iter()
    .map(PathBuf::from)
    .collect()
}

fn default_search_roots() -> Vec<PathBuf> {
    ["/usr/local/hailo/resources/models", "/opt/hailo"]
        .into_iter()
        .map(PathBuf::from)
        .collect()
}

fn default_extension() -> String {
    "hef".to_string()
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            override_path: None,
            candidates: default_candidates(),
            search_roots: default_search_roots(),
            extension: default_extension(),
        }
    }
}

impl LocatorConfig {
    pub fn with_override(mut self, path: Option<impl Into<PathBuf>>) -> Self {
        self.override_path = path.map(Into::into);
        self
    }
}

pub struct FsModelLocator {
    config: LocatorConfig,
}

impl FsModelLocator {
    pub fn new(config: LocatorConfig) -> Self {
        Self { config }
    }

    fn search(&self, root: &Path) -> Option<PathBuf> {
        if !root.is_dir() {
            return None;
        }
        let mut wb = WalkBuilder::new(root);
        wb.standard_filters(false).follow_links(false);
        wb.build()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().map(|ft| ft.is_file()).unwrap_or(false))
            .map(|entry| entry.into_path())
            .find(|path| {
                path.extension()
                    .and_then(|e| e.to_str())
                    .map(|e| e == self.config.extension)
                    .unwrap_or(false)
            })
    }
}

impl ModelLocator for FsModelLocator {
    fn locate(&self) -> Option<ModelReference> {
        if let Some(path) = self.config.override_path.as_ref()
            && path.exists()
        {
            debug!(event = "model.located", domain = "model", source = "override", path = %path.display());
            return Some(ModelReference::new(path.clone()));
        }
        if let Some(path) = self.config.candidates.iter().find(|p| p.exists()) {
            debug!(event = "model.located", domain = "model", source = "candidate", path = %path.display());
            return Some(ModelReference::new(path.clone()));
        }
        let found = self
            .config
            .search_roots
            .iter()
            .find_map(|root| self.search(root))?;
        debug!(event = "model.located", domain = "model", source = "search", path = %found.display());
        Some(ModelReference::new(found))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_config() -> LocatorConfig {
        LocatorConfig {
            override_path: None,
            candidates: vec![],
            search_roots: vec![],
            extension: default_extension(),
        }
    }

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, b"hef").unwrap();
    }

    #[test]
    fn override_wins_when_it_exists() {
        let dir = tempfile::tempdir().unwrap();
        let over = dir.path().join("custom.hef");
        let cand = dir.path().join("cand.hef");
        touch(&over);
        touch(&cand);
        let config = LocatorConfig {
            candidates: vec![cand],
            ..empty_config()
        }
        .with_override(Some(&over));
        let model = FsModelLocator::new(config).locate().unwrap();
        assert_eq!(model.path(), over.as_path());
        assert_eq!(model.name(), "custom");
    }

    #[test]
    fn missing_override_falls_back_to_first_existing_candidate() {
        let dir = tempfile::tempdir().unwrap();
        let second = dir.path().join("b.hef");
        let third = dir.path().join("c.hef");
        touch(&second);
        touch(&third);
        let config = LocatorConfig {
            candidates: vec![dir.path().join("a.hef"), second.clone(), third],
            ..empty_config()
        }
        .with_override(Some(dir.path().join("nope.hef")));
        let model = FsModelLocator::new(config).locate().unwrap();
        assert_eq!(model.path(), second.as_path());
    }

    #[test]
    fn search_finds_nested_file_with_extension() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("models").join("readme.txt"));
        let nested = dir.path().join("models").join("hailo8l").join("resnet.hef");
        touch(&nested);
        let config = LocatorConfig {
            candidates: vec![dir.path().join("missing.hef")],
            search_roots: vec![dir.path().join("absent_root"), dir.path().join("models")],
            ..empty_config()
        };
        let model = FsModelLocator::new(config).locate().unwrap();
        assert_eq!(model.path(), nested.as_path());
        assert_eq!(model.name(), "resnet");
    }

    #[test]
    fn search_ignores_directories_named_like_models() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("fake.hef")).unwrap();
        let config = LocatorConfig {
            search_roots: vec![dir.path().to_path_buf()],
            ..empty_config()
        };
        assert!(FsModelLocator::new(config).locate().is_none());
    }

    #[test]
    fn nothing_found_is_none() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("model.onnx"));
        let config = LocatorConfig {
            search_roots: vec![dir.path().to_path_buf()],
            ..empty_config()
        };
        assert!(FsModelLocator::new(config).locate().is_none());
    }

    #[test]
    fn resolves_again_on_every_call() {
        let dir = tempfile::tempdir().unwrap();
        let config = LocatorConfig {
            search_roots: vec![dir.path().to_path_buf()],
            ..empty_config()
        };
        let locator = FsModelLocator::new(config);
        assert!(locator.locate().is_none());
        touch(&dir.path().join("late.hef"));
        assert_eq!(locator.locate().unwrap().name(), "late");
    }
}
