// src/core/config.rs

use crate::core::common::KdTreeError;
use crate::core::indexing::kdtree::{DecompositionMode, PivotMode};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Configuration of one k-d tree.
///
/// Every field has a default, so a TOML file only needs the keys it changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct KdTreeConfig {
    /// Name reported through the `VectorIndex` trait.
    pub name: String,
    /// Dimension of every stored vector.
    pub dimension: usize,
    /// Maximum number of live objects.
    pub capacity: usize,
    pub decomposition: DecompositionMode,
    pub pivot: PivotMode,
    /// Largest object count a leaf may hold before it is split.
    pub max_leaf_size: usize,
    /// Depth at which ranges become leaves regardless of their size.
    pub max_depth: usize,
    /// Inserts + deletes after which the tree rebuilds itself. `None` leaves
    /// rebuilding to the caller.
    pub rebuild_threshold: Option<usize>,
    /// Use the sigma weights when choosing splits.
    pub weighted_build: bool,
    /// Rebuild immediately when a mode, the leaf size or the weights change.
    pub rebuild_on_settings_change: bool,
}

/// Builder for [`KdTreeConfig`].
#[derive(Debug, Clone, Default)]
pub struct KdTreeConfigBuilder {
    name: Option<String>,
    dimension: Option<usize>,
    capacity: Option<usize>,
    decomposition: Option<DecompositionMode>,
    pivot: Option<PivotMode>,
    max_leaf_size: Option<usize>,
    max_depth: Option<usize>,
    rebuild_threshold: Option<Option<usize>>,
    weighted_build: Option<bool>,
    rebuild_on_settings_change: Option<bool>,
}

impl KdTreeConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn dimension(mut self, dimension: usize) -> Self {
        self.dimension = Some(dimension);
        self
    }

    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    pub fn decomposition(mut self, mode: DecompositionMode) -> Self {
        self.decomposition = Some(mode);
        self
    }

    pub fn pivot(mut self, mode: PivotMode) -> Self {
        self.pivot = Some(mode);
        self
    }

    pub fn max_leaf_size(mut self, size: usize) -> Self {
        self.max_leaf_size = Some(size);
        self
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn rebuild_threshold(mut self, threshold: Option<usize>) -> Self {
        self.rebuild_threshold = Some(threshold);
        self
    }

    pub fn weighted_build(mut self, enabled: bool) -> Self {
        self.weighted_build = Some(enabled);
        self
    }

    pub fn rebuild_on_settings_change(mut self, enabled: bool) -> Self {
        self.rebuild_on_settings_change = Some(enabled);
        self
    }

    /// Builds the config, filling unset fields with defaults, and validates it.
    pub fn build(self) -> Result<KdTreeConfig, KdTreeError> {
        let defaults = KdTreeConfig::default();
        let config = KdTreeConfig {
            name: self.name.unwrap_or(defaults.name),
            dimension: self.dimension.unwrap_or(defaults.dimension),
            capacity: self.capacity.unwrap_or(defaults.capacity),
            decomposition: self.decomposition.unwrap_or(defaults.decomposition),
            pivot: self.pivot.unwrap_or(defaults.pivot),
            max_leaf_size: self.max_leaf_size.unwrap_or(defaults.max_leaf_size),
            max_depth: self.max_depth.unwrap_or(defaults.max_depth),
            rebuild_threshold: self.rebuild_threshold.unwrap_or(defaults.rebuild_threshold),
            weighted_build: self.weighted_build.unwrap_or(defaults.weighted_build),
            rebuild_on_settings_change: self
                .rebuild_on_settings_change
                .unwrap_or(defaults.rebuild_on_settings_change),
        };
        config.validate()?;
        Ok(config)
    }
}

impl Default for KdTreeConfig {
    fn default() -> Self {
        Self {
            name: "kdtree".to_string(),
            dimension: 2,
            capacity: 1_000_000,
            decomposition: DecompositionMode::Orthogonal,
            pivot: PivotMode::Median,
            max_leaf_size: 16,
            max_depth: 48,
            rebuild_threshold: None,
            weighted_build: true,
            rebuild_on_settings_change: false,
        }
    }
}

impl KdTreeConfig {
    pub fn builder() -> KdTreeConfigBuilder {
        KdTreeConfigBuilder::new()
    }

    /// Default configuration for vectors of `dimension` elements.
    pub fn with_dimension(dimension: usize) -> Result<Self, KdTreeError> {
        Self::builder().dimension(dimension).build()
    }

    pub fn validate(&self) -> Result<(), KdTreeError> {
        if self.dimension == 0 {
            return Err(KdTreeError::Configuration("dimension must be greater than 0".to_string()));
        }
        if self.max_leaf_size == 0 {
            return Err(KdTreeError::Configuration(
                "max_leaf_size must be greater than 0".to_string(),
            ));
        }
        if self.max_depth == 0 {
            return Err(KdTreeError::Configuration("max_depth must be greater than 0".to_string()));
        }
        if self.rebuild_threshold == Some(0) {
            return Err(KdTreeError::Configuration(
                "rebuild_threshold must be greater than 0 when set".to_string(),
            ));
        }
        Ok(())
    }

    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `KdTreeError::Configuration` if parsing or validation fails.
    /// A missing file yields the default configuration.
    pub fn load_from_file(path: &Path) -> Result<Self, KdTreeError> {
        match fs::read_to_string(path) {
            Ok(contents) => {
                let config: Self = toml::from_str(&contents).map_err(|e| {
                    KdTreeError::Configuration(format!(
                        "Failed to parse config file '{}': {}",
                        path.display(),
                        e
                    ))
                })?;
                config.validate()?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(KdTreeError::Io(e)),
        }
    }

    /// Loads from `optional_path` when given, otherwise returns the defaults.
    pub fn load_or_default(optional_path: Option<&Path>) -> Result<Self, KdTreeError> {
        match optional_path {
            Some(path) => Self::load_from_file(path),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = KdTreeConfig::default();
        assert_eq!(config.dimension, 2);
        assert_eq!(config.capacity, 1_000_000);
        assert_eq!(config.decomposition, DecompositionMode::Orthogonal);
        assert_eq!(config.pivot, PivotMode::Median);
        assert_eq!(config.max_leaf_size, 16);
        assert_eq!(config.max_depth, 48);
        assert_eq!(config.rebuild_threshold, None);
        assert!(config.weighted_build);
        assert!(!config.rebuild_on_settings_change);
    }

    #[test]
    fn test_config_builder() {
        let config = KdTreeConfig::builder()
            .name("timbre")
            .dimension(12)
            .capacity(500)
            .decomposition(DecompositionMode::Pca)
            .pivot(PivotMode::Mean)
            .max_leaf_size(4)
            .max_depth(20)
            .rebuild_threshold(Some(100))
            .weighted_build(false)
            .rebuild_on_settings_change(true)
            .build()
            .unwrap();

        assert_eq!(config.name, "timbre");
        assert_eq!(config.dimension, 12);
        assert_eq!(config.capacity, 500);
        assert_eq!(config.decomposition, DecompositionMode::Pca);
        assert_eq!(config.pivot, PivotMode::Mean);
        assert_eq!(config.max_leaf_size, 4);
        assert_eq!(config.max_depth, 20);
        assert_eq!(config.rebuild_threshold, Some(100));
        assert!(!config.weighted_build);
        assert!(config.rebuild_on_settings_change);
    }

    #[test]
    fn test_config_validation() {
        assert!(KdTreeConfig::builder().dimension(0).build().is_err());
        assert!(KdTreeConfig::builder().max_leaf_size(0).build().is_err());
        assert!(KdTreeConfig::builder().max_depth(0).build().is_err());
        assert!(KdTreeConfig::builder().rebuild_threshold(Some(0)).build().is_err());
        assert!(KdTreeConfig::builder().dimension(3).rebuild_threshold(Some(1)).build().is_ok());
    }

    #[test]
    fn test_load_from_existing_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        let config_content = r#"
            name = "mfcc"
            dimension = 13
            capacity = 2048
            decomposition = "hyperplane"
            pivot = "middle"
            max_leaf_size = 8
            max_depth = 30
            rebuild_threshold = 64
            weighted_build = false
            rebuild_on_settings_change = true
        "#;
        writeln!(temp_file, "{}", config_content).unwrap();

        let config = KdTreeConfig::load_from_file(temp_file.path()).unwrap();
        assert_eq!(config.name, "mfcc");
        assert_eq!(config.dimension, 13);
        assert_eq!(config.capacity, 2048);
        assert_eq!(config.decomposition, DecompositionMode::Hyperplane);
        assert_eq!(config.pivot, PivotMode::Middle);
        assert_eq!(config.max_leaf_size, 8);
        assert_eq!(config.max_depth, 30);
        assert_eq!(config.rebuild_threshold, Some(64));
        assert!(!config.weighted_build);
        assert!(config.rebuild_on_settings_change);
    }

    #[test]
    fn test_load_from_file_uses_defaults_for_missing_fields() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "dimension = 5\npivot = \"mean\"").unwrap();

        let config = KdTreeConfig::load_from_file(temp_file.path()).unwrap();
        assert_eq!(config.dimension, 5);
        assert_eq!(config.pivot, PivotMode::Mean);
        assert_eq!(config.max_leaf_size, 16);
        assert_eq!(config.decomposition, DecompositionMode::Orthogonal);
    }

    #[test]
    fn test_load_from_non_existent_file_returns_default() {
        let non_existent_path = Path::new("/this/file/does/not/exist.toml");
        let config = KdTreeConfig::load_from_file(non_existent_path).unwrap();
        assert_eq!(config, KdTreeConfig::default());
    }

    #[test]
    fn test_load_from_malformed_file_returns_error() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "this is not valid toml content").unwrap();

        let result = KdTreeConfig::load_from_file(temp_file.path());
        if let Err(KdTreeError::Configuration(msg)) = result {
            assert!(msg.contains("Failed to parse config file"));
        } else {
            panic!("Expected KdTreeError::Configuration, got {:?}", result);
        }
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "max_leaf_size = 0").unwrap();
        assert!(matches!(
            KdTreeConfig::load_from_file(temp_file.path()),
            Err(KdTreeError::Configuration(_))
        ));
    }

    #[test]
    fn test_load_or_default() {
        assert_eq!(KdTreeConfig::load_or_default(None).unwrap(), KdTreeConfig::default());

        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "dimension = 7").unwrap();
        let config = KdTreeConfig::load_or_default(Some(temp_file.path())).unwrap();
        assert_eq!(config.dimension, 7);
    }
}
