use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::GateError;

/// Embedded default configuration.
const DEFAULT_CONFIG: &str = include_str!("../config.default.toml");

/// System-wide overlay consulted when neither `--config` nor the env var is given.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/slurm/salloc-gate.toml";

/// Env var naming an overlay file.
pub const CONFIG_ENV_VAR: &str = "SALLOC_GATE_CONFIG";

// ── Final (merged) config types ──

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub allowlist: AllowlistConfig,
    #[serde(default)]
    pub group_map: GroupMapConfig,
}

/// How whitelist files are re-read between submissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Reload {
    /// Read both files on every restricted submission.
    Always,
    /// Keep the parsed file until its size, mtime or inode changes.
    #[default]
    OnChange,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub reload: Reload,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Tab-separated verdict log. Empty disables it.
    #[serde(default)]
    pub decision_log: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            reload: Reload::default(),
            log_level: default_log_level(),
            decision_log: String::new(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

#[derive(Debug, Deserialize, Serialize, Default)]
pub struct ClassifierConfig {
    #[serde(default)]
    pub indicators: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct AllowlistConfig {
    #[serde(default)]
    pub path: String,
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    #[serde(default = "default_max_name_bytes")]
    pub max_name_bytes: usize,
}

impl Default for AllowlistConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            max_entries: default_max_entries(),
            max_name_bytes: default_max_name_bytes(),
        }
    }
}

fn default_max_entries() -> usize {
    100
}

fn default_max_name_bytes() -> usize {
    64
}

impl AllowlistConfig {
    pub fn expanded_path(&self) -> PathBuf {
        expand_path(&self.path)
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct GroupMapConfig {
    #[serde(default)]
    pub path: String,
    #[serde(default = "default_max_line_bytes")]
    pub max_line_bytes: usize,
}

impl Default for GroupMapConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            max_line_bytes: default_max_line_bytes(),
        }
    }
}

fn default_max_line_bytes() -> usize {
    500
}

impl GroupMapConfig {
    pub fn expanded_path(&self) -> PathBuf {
        expand_path(&self.path)
    }
}

/// Expand `~` and `$VAR` in a configured path. Unknown variables leave the
/// path as written, which then simply fails to open (and grants nothing).
pub fn expand_path(raw: &str) -> PathBuf {
    match shellexpand::full(raw) {
        Ok(expanded) => PathBuf::from(expanded.into_owned()),
        Err(e) => {
            log::warn!("cannot expand path {raw:?}: {e}");
            PathBuf::from(raw)
        }
    }
}

// ── Overlay types (site config that merges with defaults) ──

#[derive(Debug, Deserialize, Default)]
struct ConfigOverlay {
    #[serde(default)]
    settings: SettingsOverlay,
    #[serde(default)]
    classifier: ClassifierOverlay,
    #[serde(default)]
    allowlist: AllowlistOverlay,
    #[serde(default)]
    group_map: GroupMapOverlay,
}

#[derive(Debug, Deserialize, Default)]
struct SettingsOverlay {
    reload: Option<Reload>,
    log_level: Option<String>,
    decision_log: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct ClassifierOverlay {
    #[serde(default)]
    replace: bool,
    #[serde(default)]
    indicators: Vec<String>,
    #[serde(default)]
    remove_indicators: Vec<String>,
}

#[derive(Debug, Deserialize, Default)]
struct AllowlistOverlay {
    path: Option<String>,
    max_entries: Option<usize>,
    max_name_bytes: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct GroupMapOverlay {
    path: Option<String>,
    max_line_bytes: Option<usize>,
}

/// Fold the site's `[classifier]` section into the default indicator set.
///
/// With `replace = true` the site list stands alone. Otherwise indicators
/// named in `remove_indicators` are dropped first and the site's own
/// indicators are appended, skipping any already present.
fn merge_indicators(indicators: &mut Vec<String>, site: ClassifierOverlay) {
    if site.replace {
        *indicators = site.indicators;
        return;
    }
    indicators.retain(|existing| !site.remove_indicators.contains(existing));
    for extra in site.indicators {
        if !indicators.contains(&extra) {
            indicators.push(extra);
        }
    }
}

impl Config {
    /// Load the default embedded configuration.
    pub fn default_config() -> Self {
        toml::from_str(DEFAULT_CONFIG).expect("embedded default config must parse")
    }

    /// Load configuration with resolution order:
    /// 1. Start with embedded defaults
    /// 2. Merge the overlay from `explicit`, else `$SALLOC_GATE_CONFIG`,
    ///    else `/etc/slurm/salloc-gate.toml` if it exists
    ///
    /// An explicitly named overlay must exist; the system path is optional.
    /// A file that exists but does not parse is an error: the gate refuses to
    /// run on a policy other than the one the admin wrote.
    pub fn load(explicit: Option<&Path>) -> Result<Self, GateError> {
        let mut config = Self::default_config();

        let (path, required) = match explicit {
            Some(p) => (p.to_path_buf(), true),
            None => match std::env::var_os(CONFIG_ENV_VAR) {
                Some(p) => (PathBuf::from(p), true),
                None => (PathBuf::from(SYSTEM_CONFIG_PATH), false),
            },
        };

        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if !required && e.kind() == std::io::ErrorKind::NotFound => return Ok(config),
            Err(source) => return Err(GateError::ConfigAccess { path, source }),
        };
        let overlay: ConfigOverlay =
            toml::from_str(&content).map_err(|source| GateError::Config { path, source })?;
        config.apply_overlay(overlay);
        Ok(config)
    }

    /// Layer a site overlay over this config. Scalars present in the overlay
    /// win; the indicator list merges.
    fn apply_overlay(&mut self, overlay: ConfigOverlay) {
        let s = overlay.settings;
        if let Some(v) = s.reload {
            self.settings.reload = v;
        }
        if let Some(v) = s.log_level {
            self.settings.log_level = v;
        }
        if let Some(v) = s.decision_log {
            self.settings.decision_log = v;
        }

        merge_indicators(&mut self.classifier.indicators, overlay.classifier);

        let a = overlay.allowlist;
        if let Some(v) = a.path {
            self.allowlist.path = v;
        }
        if let Some(v) = a.max_entries {
            self.allowlist.max_entries = v;
        }
        if let Some(v) = a.max_name_bytes {
            self.allowlist.max_name_bytes = v;
        }

        let g = overlay.group_map;
        if let Some(v) = g.path {
            self.group_map.path = v;
        }
        if let Some(v) = g.max_line_bytes {
            self.group_map.max_line_bytes = v;
        }
    }

    #[cfg(test)]
    fn apply_overlay_str(&mut self, toml_str: &str) {
        let overlay: ConfigOverlay = toml::from_str(toml_str).unwrap();
        self.apply_overlay(overlay);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_parses() {
        let config = Config::default_config();
        assert_eq!(config.settings.reload, Reload::OnChange);
        assert_eq!(config.settings.log_level, "info");
        assert!(!config.settings.decision_log.is_empty());
    }

    #[test]
    fn default_indicators() {
        let config = Config::default_config();
        assert_eq!(
            config.classifier.indicators,
            vec!["salloc", "ondemand/data/sys/dashboard"]
        );
    }

    #[test]
    fn default_paths_and_limits() {
        let config = Config::default_config();
        assert_eq!(
            config.allowlist.path,
            "/cm/shared/apps/slurm/var/etc/allowed_partitions.txt"
        );
        assert_eq!(
            config.group_map.path,
            "/cm/shared/apps/slurm/var/etc/group_partition_map.txt"
        );
        assert_eq!(config.allowlist.max_entries, 100);
        assert_eq!(config.allowlist.max_name_bytes, 64);
        assert_eq!(config.group_map.max_line_bytes, 500);
    }

    #[test]
    fn overlay_extends_indicators() {
        let mut config = Config::default_config();
        config.apply_overlay_str(
            r#"
            [classifier]
            indicators = ["jupyter-launch"]
        "#,
        );
        assert!(config.classifier.indicators.contains(&"salloc".to_string()));
        assert!(
            config
                .classifier
                .indicators
                .contains(&"jupyter-launch".to_string())
        );
    }

    #[test]
    fn overlay_removes_indicator() {
        let mut config = Config::default_config();
        config.apply_overlay_str(
            r#"
            [classifier]
            remove_indicators = ["ondemand/data/sys/dashboard"]
        "#,
        );
        assert_eq!(config.classifier.indicators, vec!["salloc"]);
    }

    #[test]
    fn overlay_replace_indicators() {
        let mut config = Config::default_config();
        config.apply_overlay_str(
            r#"
            [classifier]
            replace = true
            indicators = ["srun --pty"]
        "#,
        );
        assert_eq!(config.classifier.indicators, vec!["srun --pty"]);
    }

    #[test]
    fn overlay_no_duplicates() {
        let mut config = Config::default_config();
        config.apply_overlay_str(
            r#"
            [classifier]
            indicators = ["salloc"]
        "#,
        );
        let count = config
            .classifier
            .indicators
            .iter()
            .filter(|s| *s == "salloc")
            .count();
        assert_eq!(count, 1);
    }

    #[test]
    fn overlay_scalars_override() {
        let mut config = Config::default_config();
        config.apply_overlay_str(
            r#"
            [settings]
            reload = "always"
            decision_log = ""

            [allowlist]
            path = "/etc/slurm/allowed_partitions.txt"
            max_entries = 10

            [group_map]
            max_line_bytes = 1024
        "#,
        );
        assert_eq!(config.settings.reload, Reload::Always);
        assert!(config.settings.decision_log.is_empty());
        assert_eq!(config.allowlist.path, "/etc/slurm/allowed_partitions.txt");
        assert_eq!(config.allowlist.max_entries, 10);
        // Untouched scalars keep their defaults
        assert_eq!(config.allowlist.max_name_bytes, 64);
        assert_eq!(config.group_map.max_line_bytes, 1024);
        assert_eq!(
            config.group_map.path,
            "/cm/shared/apps/slurm/var/etc/group_partition_map.txt"
        );
    }

    #[test]
    fn empty_overlay_changes_nothing() {
        let original = Config::default_config();
        let mut config = Config::default_config();
        config.apply_overlay_str("");
        assert_eq!(config.classifier.indicators, original.classifier.indicators);
        assert_eq!(config.allowlist.path, original.allowlist.path);
        assert_eq!(config.settings.reload, original.settings.reload);
    }

    #[test]
    fn load_explicit_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[allowlist]\npath = \"/tmp/allowed.txt\"").unwrap();
        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.allowlist.path, "/tmp/allowed.txt");
    }

    #[test]
    fn load_missing_explicit_file_errors() {
        let err = Config::load(Some(Path::new("/nonexistent/salloc-gate.toml"))).unwrap_err();
        assert!(matches!(err, GateError::ConfigAccess { .. }));
    }

    #[test]
    fn load_unparsable_file_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[settings]\nreload = \"sometimes\"").unwrap();
        let err = Config::load(Some(file.path())).unwrap_err();
        assert!(matches!(err, GateError::Config { .. }));
    }

    #[test]
    fn expand_path_home() {
        if let Some(home) = std::env::var_os("HOME") {
            let p = expand_path("~/allowed.txt");
            assert_eq!(p, Path::new(&home).join("allowed.txt"));
        }
    }

    #[test]
    fn expand_path_plain() {
        assert_eq!(
            expand_path("/etc/slurm/map.txt"),
            PathBuf::from("/etc/slurm/map.txt")
        );
    }
}
