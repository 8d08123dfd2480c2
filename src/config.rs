//! Crawl configuration.
//!
//! Every value has a default; a TOML file passed with `--config` overrides
//! any subset of them and CLI flags override the file.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::delay_manager::PauseRange;
use crate::error::ConfigError;
use crate::session::RetryPolicy;

pub const DEFAULT_BASE_URL: &str = "https://egrul.nalog.ru/index.html";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    pub base_url: String,
    /// Records collected per query at most.
    pub max_records: usize,
    pub retry: RetryConfig,
    pub delays: DelayConfig,
    pub browser: BrowserConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub recovery_attempts: u32,
    pub backoff_ms: u64,
    pub health_check_every: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DelayConfig {
    /// Between two queries.
    pub query: PauseRange,
    /// Between two result pages.
    pub page: PauseRange,
    /// After submitting a search.
    pub search: PauseRange,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub headless: bool,
    pub chrome_path: Option<PathBuf>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub legal_csv: PathBuf,
    pub entrepreneur_csv: PathBuf,
    pub progress_file: PathBuf,
    /// Fields parsed out of downloaded registry extracts.
    pub extracts_csv: PathBuf,
    /// Registry extracts are only downloaded when this is set.
    pub pdf_dir: Option<PathBuf>,
    pub download_timeout_secs: u64,
    /// Consecutive unfinished downloads tolerated before PDF fetching stops.
    pub max_unfinished: usize,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        CrawlConfig {
            base_url: DEFAULT_BASE_URL.to_string(),
            max_records: 100,
            retry: RetryConfig::default(),
            delays: DelayConfig::default(),
            browser: BrowserConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            max_attempts: 3,
            recovery_attempts: 3,
            backoff_ms: 2000,
            health_check_every: 20,
        }
    }
}

impl Default for DelayConfig {
    fn default() -> Self {
        DelayConfig {
            query: PauseRange::new(1.0, 3.0),
            page: PauseRange::new(1.0, 2.0),
            search: PauseRange::new(2.0, 2.0),
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        BrowserConfig {
            headless: true,
            chrome_path: None,
            timeout_secs: 120,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            legal_csv: PathBuf::from("legal_entities.csv"),
            entrepreneur_csv: PathBuf::from("entrepreneurs.csv"),
            progress_file: PathBuf::from("progress.json"),
            extracts_csv: PathBuf::from("egrul_data.csv"),
            pdf_dir: None,
            download_timeout_secs: 20,
            max_unfinished: 5,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            recovery_attempts: self.recovery_attempts,
            backoff: Duration::from_millis(self.backoff_ms),
            health_check_every: self.health_check_every,
        }
    }
}

impl CrawlConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: CrawlConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(invalid("base_url", "must not be empty"));
        }
        if self.max_records == 0 {
            return Err(invalid("max_records", "must be at least 1"));
        }
        if self.retry.max_attempts == 0 {
            return Err(invalid("retry.max_attempts", "must be at least 1"));
        }
        if self.retry.recovery_attempts == 0 {
            return Err(invalid("retry.recovery_attempts", "must be at least 1"));
        }
        if self.retry.health_check_every == 0 {
            return Err(invalid("retry.health_check_every", "must be at least 1"));
        }
        for (field, range) in [
            ("delays.query", &self.delays.query),
            ("delays.page", &self.delays.page),
            ("delays.search", &self.delays.search),
        ] {
            let finite = range.min_secs.is_finite() && range.add_secs.is_finite();
            if !(finite && range.min_secs >= 0.0 && range.add_secs >= 0.0) {
                return Err(invalid(field, "pause values must be finite and non-negative"));
            }
        }
        Ok(())
    }

    /// Place the output files under `dir`, keeping their file names.
    pub fn relocate_outputs(&mut self, dir: &Path) {
        let output = &mut self.output;
        for path in [
            &mut output.legal_csv,
            &mut output.entrepreneur_csv,
            &mut output.progress_file,
            &mut output.extracts_csv,
        ] {
            if let Some(name) = path.file_name() {
                *path = dir.join(name);
            }
        }
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = CrawlConfig::default();
        config.validate().unwrap();
        assert_eq!(config.retry.policy(), RetryPolicy::default());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = CrawlConfig::from_toml(
            r#"
            max_records = 25

            [retry]
            backoff_ms = 0

            [delays]
            page = { min_secs = 0.0, add_secs = 0.5 }

            [output]
            pdf_dir = "pdfs"
            "#,
        )
        .unwrap();
        assert_eq!(config.max_records, 25);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.backoff_ms, 0);
        assert_eq!(config.delays.page, PauseRange::new(0.0, 0.5));
        assert_eq!(config.delays.query, PauseRange::new(1.0, 3.0));
        assert_eq!(config.output.pdf_dir, Some(PathBuf::from("pdfs")));
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = CrawlConfig::from_toml("max_records = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref field, .. } if field == "max_records"));

        let err = CrawlConfig::from_toml("[delays]\nquery = { min_secs = -1.0, add_secs = 0.0 }").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref field, .. } if field == "delays.query"));

        let err = CrawlConfig::from_toml("[delays]\npage = { min_secs = 1.0, add_secs = inf }").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref field, .. } if field == "delays.page"));

        let err = CrawlConfig::from_toml("[delays]\nsearch = { min_secs = nan, add_secs = 0.0 }").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref field, .. } if field == "delays.search"));

        assert!(matches!(CrawlConfig::from_toml("max_records = \"x\""), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_bundled_config_matches_defaults() {
        let config = CrawlConfig::from_toml(include_str!("../config/egrul-crawler.toml")).unwrap();
        let defaults = CrawlConfig::default();
        assert_eq!(config.base_url, defaults.base_url);
        assert_eq!(config.max_records, defaults.max_records);
        assert_eq!(config.retry.policy(), defaults.retry.policy());
        assert_eq!(config.delays.page, defaults.delays.page);
        assert_eq!(config.output.extracts_csv, defaults.output.extracts_csv);
        assert_eq!(config.output.pdf_dir, None);
    }

    #[test]
    fn test_missing_file() {
        let err = CrawlConfig::load(Path::new("/nonexistent/crawler.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_relocate_outputs() {
        let mut config = CrawlConfig::default();
        config.relocate_outputs(Path::new("out"));
        assert_eq!(config.output.legal_csv, PathBuf::from("out/legal_entities.csv"));
        assert_eq!(config.output.progress_file, PathBuf::from("out/progress.json"));
        assert_eq!(config.output.extracts_csv, PathBuf::from("out/egrul_data.csv"));
    }
}
