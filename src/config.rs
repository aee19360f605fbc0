use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::constants::env::{DATASET_DIR_PREFIX, DATASET_DIR_SUFFIX, DEFAULT_RAW_ROOT, RAW_ROOT};
use crate::constants::storage::BUSY_TIMEOUT_MS;
use crate::source::DatasetKind;

/// Loader configuration.
///
/// Every path resolves in the order: explicit value, environment variable,
/// project default (`data/<dataset>`).
#[derive(Clone, Debug)]
pub struct LoaderConfig {
    /// Directory holding one subdirectory per dataset.
    pub raw_root: Option<PathBuf>,
    /// Per-dataset directory overrides.
    pub dataset_dirs: BTreeMap<DatasetKind, PathBuf>,
    /// Parse datasets on rayon worker threads.
    pub parallel: bool,
    /// How long a write waits on a locked database.
    pub busy_timeout: Duration,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            raw_root: None,
            dataset_dirs: BTreeMap::new(),
            parallel: true,
            busy_timeout: Duration::from_millis(BUSY_TIMEOUT_MS),
        }
    }
}

impl LoaderConfig {
    /// Set the raw root directory.
    pub fn with_raw_root(mut self, raw_root: impl Into<PathBuf>) -> Self {
        self.raw_root = Some(raw_root.into());
        self
    }

    /// Override the raw directory of one dataset.
    pub fn with_dataset_dir(mut self, kind: DatasetKind, dir: impl Into<PathBuf>) -> Self {
        self.dataset_dirs.insert(kind, dir.into());
        self
    }

    /// Enable or disable parallel parsing.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Override the lock wait.
    pub fn with_busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }

    /// Environment variable that overrides the directory of `kind`.
    pub fn dataset_env_var(kind: DatasetKind) -> String {
        format!(
            "{DATASET_DIR_PREFIX}{}{DATASET_DIR_SUFFIX}",
            kind.as_str().to_ascii_uppercase()
        )
    }

    /// Resolved raw root, reading the process environment.
    pub fn raw_root(&self) -> PathBuf {
        self.raw_root_with(|name| std::env::var(name).ok())
    }

    /// Resolved raw directory of `kind`, reading the process environment.
    pub fn raw_dir(&self, kind: DatasetKind) -> PathBuf {
        self.raw_dir_with(kind, |name| std::env::var(name).ok())
    }

    /// Resolved raw root using `env` as the variable lookup.
    pub fn raw_root_with(&self, env: impl Fn(&str) -> Option<String>) -> PathBuf {
        if let Some(root) = &self.raw_root {
            return root.clone();
        }
        env(RAW_ROOT)
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_RAW_ROOT))
    }

    /// Resolved raw directory of `kind` using `env` as the variable lookup.
    pub fn raw_dir_with(&self, kind: DatasetKind, env: impl Fn(&str) -> Option<String>) -> PathBuf {
        if let Some(dir) = self.dataset_dirs.get(&kind) {
            return dir.clone();
        }
        if let Some(dir) =
            env(&Self::dataset_env_var(kind)).filter(|value| !value.trim().is_empty())
        {
            return PathBuf::from(dir);
        }
        self.raw_root_with(env).join(kind.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::Path;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn defaults_fall_back_to_data_directory() {
        let config = LoaderConfig::default();
        assert!(config.parallel);
        assert_eq!(config.busy_timeout, Duration::from_millis(5_000));
        assert_eq!(
            config.raw_dir_with(DatasetKind::Esci, env_of(&[])),
            Path::new("data").join("esci")
        );
    }

    #[test]
    fn environment_overrides_default_but_not_explicit_values() {
        let env = [
            ("RETAIL_UNIFY_RAW_ROOT", "/srv/raw"),
            ("RETAIL_UNIFY_WDC_DIR", "/mnt/wdc"),
        ];
        let config = LoaderConfig::default();
        assert_eq!(
            config.raw_dir_with(DatasetKind::AbtBuy, env_of(&env)),
            Path::new("/srv/raw").join("abt_buy")
        );
        assert_eq!(
            config.raw_dir_with(DatasetKind::Wdc, env_of(&env)),
            PathBuf::from("/mnt/wdc")
        );

        let explicit = LoaderConfig::default()
            .with_raw_root("/explicit")
            .with_dataset_dir(DatasetKind::Wdc, "/explicit-wdc");
        assert_eq!(
            explicit.raw_dir_with(DatasetKind::Wdc, env_of(&env)),
            PathBuf::from("/explicit-wdc")
        );
        assert_eq!(
            explicit.raw_dir_with(DatasetKind::Cikm16, env_of(&env)),
            Path::new("/explicit").join("cikm16")
        );
    }

    #[test]
    fn env_var_names_follow_dataset_names() {
        assert_eq!(
            LoaderConfig::dataset_env_var(DatasetKind::AbtBuy),
            "RETAIL_UNIFY_ABT_BUY_DIR"
        );
    }
}
