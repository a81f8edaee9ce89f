use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_AMD_TABLE_URL: &str =
    "https://raw.githubusercontent.com/GPUOpen-Drivers/amd-vulkan-versions/master/amdversions.xml";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub freshness: FreshnessConfig,
    #[serde(default)]
    pub clustering: ClusteringConfig,
    #[serde(default)]
    pub amd: AmdConfig,
    #[serde(default)]
    pub piracy: PiracyConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LimitsConfig {
    /// Maximum decompressed bytes fed to the extractor.
    #[serde(default = "default_log_size_limit")]
    pub log_size_limit: u64,
    /// Maximum compressed size for archives that must be materialised whole.
    #[serde(default = "default_attachment_size_limit")]
    pub attachment_size_limit: u64,
    /// Largest single entry unpacked whole before reading, as rar entries are.
    #[serde(default = "default_unpacked_size_limit")]
    pub unpacked_size_limit: u64,
    /// Anything smaller cannot be a log.
    #[serde(default = "default_min_log_size")]
    pub min_log_size: u64,
    #[serde(default = "default_parse_timeout_secs")]
    pub parse_timeout_secs: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            log_size_limit: default_log_size_limit(),
            attachment_size_limit: default_attachment_size_limit(),
            unpacked_size_limit: default_unpacked_size_limit(),
            min_log_size: default_min_log_size(),
            parse_timeout_secs: default_parse_timeout_secs(),
        }
    }
}

impl LimitsConfig {
    pub fn parse_timeout(&self) -> Duration {
        Duration::from_secs(self.parse_timeout_secs)
    }
}

fn default_log_size_limit() -> u64 {
    64 * 1024 * 1024
}
fn default_attachment_size_limit() -> u64 {
    8 * 1024 * 1024
}
fn default_unpacked_size_limit() -> u64 {
    1024 * 1024 * 1024
}
fn default_min_log_size() -> u64 {
    64
}
fn default_parse_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct PipelineConfig {
    /// Concurrent pipeline slots; extra requests are rejected, not queued.
    #[serde(default = "default_slots")]
    pub slots: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            slots: default_slots(),
        }
    }
}

fn default_slots() -> usize {
    (num_cpus::get() / 2).max(1)
}

#[derive(Debug, Deserialize, Clone)]
pub struct FreshnessConfig {
    /// Builds newer than this (relative to the latest) are never flagged.
    #[serde(default = "default_build_time_difference_days")]
    pub build_time_difference_days: i64,
    /// Tolerated gap in build numbers.
    #[serde(default = "default_build_number_difference")]
    pub build_number_difference: u32,
}

impl Default for FreshnessConfig {
    fn default() -> Self {
        Self {
            build_time_difference_days: default_build_time_difference_days(),
            build_number_difference: default_build_number_difference(),
        }
    }
}

fn default_build_time_difference_days() -> i64 {
    3
}
fn default_build_number_difference() -> u32 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClusteringConfig {
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
        }
    }
}

fn default_similarity_threshold() -> f64 {
    0.75
}

#[derive(Debug, Deserialize, Clone)]
pub struct AmdConfig {
    #[serde(default = "default_amd_table_url")]
    pub table_url: String,
    /// A cached table younger than this is not refetched.
    #[serde(default = "default_amd_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
    #[serde(default = "default_amd_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

impl Default for AmdConfig {
    fn default() -> Self {
        Self {
            table_url: default_amd_table_url(),
            refresh_interval_secs: default_amd_refresh_interval_secs(),
            fetch_timeout_secs: default_amd_fetch_timeout_secs(),
        }
    }
}

fn default_amd_table_url() -> String {
    DEFAULT_AMD_TABLE_URL.to_string()
}
fn default_amd_refresh_interval_secs() -> u64 {
    3600
}
fn default_amd_fetch_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct PiracyConfig {
    /// Case-insensitive substrings that mark a line as a piracy indicator.
    #[serde(default)]
    pub triggers: Vec<String>,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Loads `path` when it exists, otherwise returns the built-in defaults.
pub fn load_config_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        Ok(Config::default())
    }
}

fn validate(config: &Config) -> Result<()> {
    // Validate limits
    if config.limits.log_size_limit == 0 {
        anyhow::bail!("limits.log_size_limit must be > 0");
    }
    if config.limits.attachment_size_limit == 0 {
        anyhow::bail!("limits.attachment_size_limit must be > 0");
    }
    if config.limits.unpacked_size_limit == 0 {
        anyhow::bail!("limits.unpacked_size_limit must be > 0");
    }
    if config.limits.min_log_size == 0 {
        anyhow::bail!("limits.min_log_size must be > 0");
    }
    if config.limits.min_log_size > config.limits.log_size_limit {
        anyhow::bail!("limits.min_log_size must not exceed limits.log_size_limit");
    }
    if config.limits.parse_timeout_secs == 0 {
        anyhow::bail!("limits.parse_timeout_secs must be > 0");
    }

    // Validate pipeline
    if config.pipeline.slots == 0 {
        anyhow::bail!("pipeline.slots must be >= 1");
    }

    let threshold = config.clustering.similarity_threshold;
    if !(threshold > 0.0 && threshold <= 1.0) {
        anyhow::bail!("clustering.similarity_threshold must be in (0.0, 1.0]");
    }

    if config.amd.table_url.trim().is_empty() {
        anyhow::bail!("amd.table_url must not be empty");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_file_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"").unwrap();
        let cfg = load_config(file.path()).unwrap();
        assert_eq!(cfg.limits.min_log_size, 64);
        assert_eq!(cfg.limits.log_size_limit, 64 * 1024 * 1024);
        assert!(cfg.pipeline.slots >= 1);
        assert!((cfg.clustering.similarity_threshold - 0.75).abs() < f64::EPSILON);
        assert_eq!(cfg.amd.table_url, DEFAULT_AMD_TABLE_URL);
    }

    #[test]
    fn sections_override_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[pipeline]\nslots = 3\n\n[piracy]\ntriggers = [\"bad dump\"]\n\n[clustering]\nsimilarity_threshold = 0.9"
        )
        .unwrap();
        let cfg = load_config(file.path()).unwrap();
        assert_eq!(cfg.pipeline.slots, 3);
        assert_eq!(cfg.piracy.triggers, vec!["bad dump".to_string()]);
        assert!((cfg.clustering.similarity_threshold - 0.9).abs() < f64::EPSILON);
    }

    #[test]
    fn zero_slots_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[pipeline]\nslots = 0").unwrap();
        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("pipeline.slots"));
    }

    #[test]
    fn min_log_size_must_fit_the_log_limit() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[limits]\nmin_log_size = 0").unwrap();
        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("limits.min_log_size must be > 0"));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[limits]\nlog_size_limit = 1024\nmin_log_size = 4096").unwrap();
        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("must not exceed limits.log_size_limit"));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[limits]\nlog_size_limit = 1024\nmin_log_size = 1024").unwrap();
        assert!(load_config(file.path()).is_ok());
    }

    #[test]
    fn example_config_parses() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/logdoc.example.toml");
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.limits.attachment_size_limit, 8 * 1024 * 1024);
        assert_eq!(cfg.limits.unpacked_size_limit, 1024 * 1024 * 1024);
        assert!(cfg.piracy.triggers.is_empty());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_or_default(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.freshness.build_number_difference, 10);
    }
}
