//! Strata configuration loading from `strata.toml`.
//!
//! Configuration is optional. Every section falls back to defaults, then
//! `STRATA_*` environment variables override the file and command-line flags
//! override both.
//!
//! # Example Configuration
//!
//! ```toml
//! [scanner]
//! exclude = ["**/generated/**", "**/test/**"]
//! extensions = ["java"]
//! max_file_size_kb = 512
//!
//! [llm]
//! provider = "anthropic"
//! model = "claude-3-5-haiku-latest"
//! max_output_tokens = 1500
//! max_attempts = 3
//! max_concurrency = 4
//! token_budget = 200000
//!
//! [chunking]
//! target_tokens = 1200
//! overlap_tokens = 200
//!
//! [logging]
//! level = "info"
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use strata_core::scanner::ScanOptions;
use strata_llm::{EnrichOptions, ProviderKind, ProviderSettings, RetryPolicy};

/// Config file looked up in the working directory when `--config` is absent.
pub const CONFIG_FILE: &str = "strata.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid value '{value}' for {var}: {message}")]
    InvalidEnv {
        var: String,
        value: String,
        message: String,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Root configuration loaded from `strata.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StrataConfig {
    pub scanner: ScannerConfig,
    pub llm: LlmConfig,
    pub chunking: ChunkingConfig,
    pub logging: LoggingConfig,
}

/// Which files the scanner keeps.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Glob patterns excluded relative to the codebase root.
    pub exclude: Vec<String>,
    /// Extensions to read, without the dot.
    pub extensions: Vec<String>,
    /// Files larger than this are skipped. `0` disables the limit.
    pub max_file_size_kb: u64,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            exclude: Vec::new(),
            extensions: vec!["java".to_string()],
            max_file_size_kb: 512,
        }
    }
}

/// Provider selection and call limits for enrichment.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: ProviderKind,
    /// Defaults to the provider's own default model.
    pub model: Option<String>,
    pub max_input_tokens: usize,
    pub max_output_tokens: u32,
    pub temperature: f32,
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub max_concurrency: usize,
    /// Tokens the run may spend before every call goes to the fallback.
    pub token_budget: Option<u64>,
    /// Base URL override, e.g. for a proxy.
    pub endpoint: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Local,
            model: None,
            max_input_tokens: 12_000,
            max_output_tokens: 1_500,
            temperature: 0.1,
            max_attempts: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 8_000,
            max_concurrency: 4,
            token_budget: None,
            endpoint: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub target_tokens: usize,
    pub overlap_tokens: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            target_tokens: 1_200,
            overlap_tokens: 200,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing` filter directive, e.g. `info` or `strata_llm=debug`.
    pub level: Option<String>,
}

/// A loaded configuration and the problems that were tolerated on the way.
#[derive(Debug)]
pub struct LoadedConfig {
    pub config: StrataConfig,
    pub source: Option<PathBuf>,
    /// Non-fatal problems, logged once logging is up.
    pub warnings: Vec<ConfigError>,
}

impl StrataConfig {
    /// Load from `explicit` or `./strata.toml`, then apply the environment.
    ///
    /// In strict mode the first problem is returned as an error. Otherwise
    /// problems are collected as warnings and the affected values keep
    /// their defaults.
    pub fn load(explicit: Option<&Path>, strict: bool) -> Result<LoadedConfig, ConfigError> {
        Self::load_with_env(explicit, strict, |var| std::env::var(var).ok())
    }

    pub fn load_with_env(
        explicit: Option<&Path>,
        strict: bool,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<LoadedConfig, ConfigError> {
        let mut warnings = Vec::new();
        let path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => Some(PathBuf::from(CONFIG_FILE)).filter(|p| p.exists()),
        };

        let mut config = match &path {
            Some(path) => match Self::read_file(path) {
                Ok(config) => config,
                Err(e) if strict => return Err(e),
                Err(e) => {
                    warnings.push(e);
                    Self::default()
                }
            },
            None => Self::default(),
        };

        let mut problems = config.apply_env(lookup);
        problems.extend(config.validate());
        if strict {
            if let Some(first) = problems.into_iter().next() {
                return Err(first);
            }
        } else {
            warnings.extend(problems);
        }

        Ok(LoadedConfig {
            config,
            source: path,
            warnings,
        })
    }

    fn read_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply `STRATA_*` overrides. Unparseable values are reported and
    /// ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Vec<ConfigError> {
        let mut problems = Vec::new();

        if let Some(value) = lookup("STRATA_LLM_PROVIDER") {
            match value.parse::<ProviderKind>() {
                Ok(kind) => self.llm.provider = kind,
                Err(message) => problems.push(invalid_env("STRATA_LLM_PROVIDER", &value, message)),
            }
        }
        if let Some(value) = lookup("STRATA_LLM_MODEL").filter(|v| !v.trim().is_empty()) {
            self.llm.model = Some(value);
        }
        if let Some(value) = lookup("STRATA_LLM_MAX_OUTPUT_TOKENS") {
            match value.trim().parse::<u32>() {
                Ok(n) => self.llm.max_output_tokens = n,
                Err(e) => {
                    problems.push(invalid_env("STRATA_LLM_MAX_OUTPUT_TOKENS", &value, e.to_string()))
                }
            }
        }
        if let Some(value) = lookup("STRATA_LLM_TOKEN_BUDGET") {
            match value.trim().parse::<u64>() {
                Ok(n) => self.llm.token_budget = Some(n),
                Err(e) => {
                    problems.push(invalid_env("STRATA_LLM_TOKEN_BUDGET", &value, e.to_string()))
                }
            }
        }
        if let Some(value) = lookup("STRATA_LOG_LEVEL").filter(|v| !v.trim().is_empty()) {
            self.logging.level = Some(value);
        }

        problems
    }

    /// Reset out-of-range values to their defaults, reporting each one.
    pub fn validate(&mut self) -> Vec<ConfigError> {
        let mut problems = Vec::new();

        if self.chunking.target_tokens == 0
            || self.chunking.overlap_tokens >= self.chunking.target_tokens
        {
            problems.push(ConfigError::Invalid(format!(
                "chunking.overlap_tokens ({}) must be smaller than a non-zero chunking.target_tokens ({})",
                self.chunking.overlap_tokens, self.chunking.target_tokens
            )));
            self.chunking = ChunkingConfig::default();
        }
        if self.llm.max_attempts == 0 {
            problems.push(ConfigError::Invalid("llm.max_attempts must be at least 1".into()));
            self.llm.max_attempts = LlmConfig::default().max_attempts;
        }
        if self.llm.max_concurrency == 0 {
            problems.push(ConfigError::Invalid("llm.max_concurrency must be at least 1".into()));
            self.llm.max_concurrency = LlmConfig::default().max_concurrency;
        }
        if self.llm.max_output_tokens == 0 {
            problems.push(ConfigError::Invalid("llm.max_output_tokens must be at least 1".into()));
            self.llm.max_output_tokens = LlmConfig::default().max_output_tokens;
        }
        if self.scanner.extensions.is_empty() {
            problems.push(ConfigError::Invalid("scanner.extensions must not be empty".into()));
            self.scanner.extensions = ScannerConfig::default().extensions;
        }

        problems
    }

    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            extensions: self
                .scanner
                .extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
            exclude: self.scanner.exclude.clone(),
            max_file_size_kb: self.scanner.max_file_size_kb,
            ..ScanOptions::default()
        }
    }

    pub fn provider_settings(&self) -> ProviderSettings {
        let mut settings = ProviderSettings::new(self.llm.provider);
        settings.model = self.llm.model.clone();
        settings.temperature = self.llm.temperature;
        settings.endpoint = self.llm.endpoint.clone();
        settings.with_env_api_key()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.llm.max_attempts,
            Duration::from_millis(self.llm.initial_backoff_ms),
            Duration::from_millis(self.llm.max_backoff_ms),
        )
    }

    pub fn enrich_options(&self) -> EnrichOptions {
        EnrichOptions {
            max_input_tokens: self.llm.max_input_tokens,
            max_output_tokens: self.llm.max_output_tokens,
            chunk_target_tokens: self.chunking.target_tokens,
            chunk_overlap_tokens: self.chunking.overlap_tokens,
        }
    }
}

fn invalid_env(var: &str, value: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidEnv {
        var: var.to_string(),
        value: value.to_string(),
        message: message.into(),
    }
}
