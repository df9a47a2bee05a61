use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::TribunalError;

/// Top-level configuration loaded from `.tribunal.toml`.
///
/// Resolution order: CLI flags > env vars (API keys only) > config file > defaults.
/// Nothing in the library crates reads the environment; the binary resolves
/// everything into this struct before building the pipeline.
///
/// # Examples
///
/// ```
/// use tribunal_core::TribunalConfig;
///
/// let config = TribunalConfig::default();
/// assert_eq!(config.digest.max_files, 10);
/// assert!(config.stages.is_empty());
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TribunalConfig {
    /// Analysis provider settings.
    #[serde(default)]
    pub llm: LlmConfig,
    /// Stage execution settings.
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// Digest rendering limits.
    #[serde(default)]
    pub digest: DigestConfig,
    /// Ordered analysis stages. Empty means the built-in lenses.
    #[serde(default)]
    pub stages: Vec<StageConfig>,
}

impl TribunalConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`TribunalError::FileNotFound`] if the file does not exist,
    /// [`TribunalError::Io`] if it cannot be read, or the errors of
    /// [`TribunalConfig::from_toml`].
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use tribunal_core::TribunalConfig;
    /// use std::path::Path;
    ///
    /// let config = TribunalConfig::from_file(Path::new(".tribunal.toml")).unwrap();
    /// ```
    pub fn from_file(path: &Path) -> Result<Self, TribunalError> {
        if !path.exists() {
            return Err(TribunalError::FileNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`TribunalError::Toml`] if parsing fails, or
    /// [`TribunalError::Config`] if validation fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use tribunal_core::TribunalConfig;
    ///
    /// let toml = r#"
    /// [pipeline]
    /// stage_timeout_secs = 30
    ///
    /// [[stages]]
    /// name = "docs"
    /// prompt = "Review documentation changes."
    /// "#;
    /// let config = TribunalConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.pipeline.stage_timeout_secs, 30);
    /// assert_eq!(config.stages[0].name, "docs");
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, TribunalError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check invariants that serde cannot express.
    ///
    /// Stage names must be non-empty and unique, since aggregation matches
    /// stage outputs back to the declared list by name.
    ///
    /// # Errors
    ///
    /// Returns [`TribunalError::Config`] describing the first violation.
    pub fn validate(&self) -> Result<(), TribunalError> {
        if self.pipeline.stage_timeout_secs == 0 {
            return Err(TribunalError::Config(
                "pipeline.stage_timeout_secs must be greater than zero".into(),
            ));
        }
        if self.digest.max_files == 0 {
            return Err(TribunalError::Config(
                "digest.max_files must be greater than zero".into(),
            ));
        }
        if self.llm.base_url.is_none() && !KNOWN_PROVIDERS.contains(&self.llm.provider.as_str()) {
            return Err(TribunalError::Config(format!(
                "llm.provider '{}' has no default endpoint; set llm.base_url",
                self.llm.provider
            )));
        }
        let mut seen = HashSet::new();
        for stage in &self.stages {
            if stage.name.trim().is_empty() {
                return Err(TribunalError::Config("stage name must not be empty".into()));
            }
            if !seen.insert(stage.name.as_str()) {
                return Err(TribunalError::Config(format!(
                    "duplicate stage name '{}'",
                    stage.name
                )));
            }
        }
        Ok(())
    }
}

/// Providers with a built-in base URL.
const KNOWN_PROVIDERS: [&str; 4] = ["gemini", "openai", "anthropic", "ollama"];

/// Analysis provider configuration (OpenAI-compatible chat completions).
///
/// # Examples
///
/// ```
/// use tribunal_core::LlmConfig;
///
/// let config = LlmConfig::default();
/// assert_eq!(config.provider, "gemini");
/// assert_eq!(config.model, "gemini-2.5-flash");
/// assert_eq!(config.temperature, 0.1);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider name (`"gemini"`, `"openai"`, `"anthropic"`, `"ollama"`, or
    /// any OpenAI-compatible host given with `base_url`).
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Model identifier.
    #[serde(default = "default_model")]
    pub model: String,
    /// API key for the provider.
    pub api_key: Option<String>,
    /// Custom base URL; the client appends `/chat/completions`.
    pub base_url: Option<String>,
    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f64,
}

fn default_provider() -> String {
    "gemini".into()
}

fn default_model() -> String {
    "gemini-2.5-flash".into()
}

fn default_temperature() -> f64 {
    0.1
}

impl LlmConfig {
    /// Base URL for the configured provider when none is set explicitly.
    ///
    /// # Examples
    ///
    /// ```
    /// use tribunal_core::LlmConfig;
    ///
    /// let config = LlmConfig { provider: "openai".into(), ..LlmConfig::default() };
    /// assert_eq!(config.resolved_base_url(), "https://api.openai.com/v1");
    /// ```
    pub fn resolved_base_url(&self) -> &str {
        if let Some(url) = &self.base_url {
            return url.trim_end_matches('/');
        }
        match self.provider.as_str() {
            "openai" => "https://api.openai.com/v1",
            "anthropic" => "https://api.anthropic.com/v1",
            "ollama" => "http://localhost:11434/v1",
            _ => "https://generativelanguage.googleapis.com/v1beta/openai",
        }
    }

    /// Environment variable conventionally holding this provider's key.
    pub fn api_key_env_var(&self) -> &'static str {
        match self.provider.as_str() {
            "gemini" => "GEMINI_API_KEY",
            "anthropic" => "ANTHROPIC_API_KEY",
            _ => "OPENAI_API_KEY",
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            api_key: None,
            base_url: None,
            temperature: default_temperature(),
        }
    }
}

/// Stage execution settings.
///
/// # Examples
///
/// ```
/// use tribunal_core::PipelineConfig;
///
/// assert_eq!(PipelineConfig::default().stage_timeout_secs, 120);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Time budget for one provider call (default: 120).
    #[serde(default = "default_stage_timeout_secs")]
    pub stage_timeout_secs: u64,
}

fn default_stage_timeout_secs() -> u64 {
    120
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            stage_timeout_secs: default_stage_timeout_secs(),
        }
    }
}

/// Limits applied when rendering the change-set digest.
///
/// These bound the context fed to every stage.
///
/// # Examples
///
/// ```
/// use tribunal_core::DigestConfig;
///
/// let config = DigestConfig::default();
/// assert_eq!(config.max_files, 10);
/// assert_eq!(config.max_patch_lines, 100);
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DigestConfig {
    /// Maximum number of file sections (default: 10).
    #[serde(default = "default_max_files")]
    pub max_files: usize,
    /// Maximum patch lines shown per file (default: 100).
    #[serde(default = "default_max_patch_lines")]
    pub max_patch_lines: usize,
}

fn default_max_files() -> usize {
    10
}

fn default_max_patch_lines() -> usize {
    100
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            max_files: default_max_files(),
            max_patch_lines: default_max_patch_lines(),
        }
    }
}

/// One named analysis lens.
///
/// # Examples
///
/// ```
/// use tribunal_core::StageConfig;
///
/// let stage = StageConfig {
///     name: "docs".into(),
///     title: None,
///     prompt: "Check the documentation.".into(),
/// };
/// assert_eq!(stage.display_title(), "docs");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageConfig {
    /// Unique stage identifier.
    pub name: String,
    /// Heading used in the formatted report.
    #[serde(default)]
    pub title: Option<String>,
    /// Instructions bound to the analysis provider for this stage.
    pub prompt: String,
}

impl StageConfig {
    /// The configured title, or the stage name.
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let config = TribunalConfig::default();
        assert_eq!(config.llm.provider, "gemini");
        assert_eq!(config.llm.model, "gemini-2.5-flash");
        assert_eq!(config.pipeline.stage_timeout_secs, 120);
        assert_eq!(config.digest.max_files, 10);
        assert_eq!(config.digest.max_patch_lines, 100);
        assert!(config.stages.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_toml_gives_defaults() {
        let config = TribunalConfig::from_toml("").unwrap();
        assert_eq!(config.llm.model, "gemini-2.5-flash");
        assert_eq!(config.digest.max_files, 10);
    }

    #[test]
    fn parse_full_toml() {
        let toml = r#"
[llm]
provider = "openai"
model = "gpt-4o-mini"
base_url = "http://localhost:8080/v1/"
temperature = 0.0

[pipeline]
stage_timeout_secs = 45

[digest]
max_files = 4
max_patch_lines = 50

[[stages]]
name = "logic"
title = "Logic"
prompt = "Find bugs."

[[stages]]
name = "security"
prompt = "Find vulnerabilities."
"#;
        let config = TribunalConfig::from_toml(toml).unwrap();
        assert_eq!(config.llm.provider, "openai");
        assert_eq!(config.llm.resolved_base_url(), "http://localhost:8080/v1");
        assert_eq!(config.pipeline.stage_timeout_secs, 45);
        assert_eq!(config.digest.max_files, 4);
        assert_eq!(config.digest.max_patch_lines, 50);
        assert_eq!(config.stages.len(), 2);
        assert_eq!(config.stages[0].display_title(), "Logic");
        assert_eq!(config.stages[1].display_title(), "security");
    }

    #[test]
    fn duplicate_stage_names_rejected() {
        let toml = r#"
[[stages]]
name = "logic"
prompt = "a"

[[stages]]
name = "logic"
prompt = "b"
"#;
        let err = TribunalConfig::from_toml(toml).unwrap_err();
        assert!(err.to_string().contains("duplicate stage name 'logic'"));
    }

    #[test]
    fn zero_timeout_rejected() {
        let err = TribunalConfig::from_toml("[pipeline]\nstage_timeout_secs = 0\n").unwrap_err();
        assert!(matches!(err, TribunalError::Config(_)));
    }

    #[test]
    fn invalid_toml_returns_error() {
        let result = TribunalConfig::from_toml("{{invalid}}");
        assert!(matches!(result, Err(TribunalError::Toml(_))));
    }

    #[test]
    fn missing_file_is_file_not_found() {
        let result = TribunalConfig::from_file(Path::new("/definitely/not/here.toml"));
        assert!(matches!(result, Err(TribunalError::FileNotFound(_))));
    }

    #[test]
    fn provider_defaults_for_base_url_and_env_var() {
        let gemini = LlmConfig::default();
        assert!(gemini.resolved_base_url().contains("generativelanguage"));
        assert_eq!(gemini.api_key_env_var(), "GEMINI_API_KEY");

        let openai = LlmConfig {
            provider: "openai".into(),
            ..LlmConfig::default()
        };
        assert_eq!(openai.api_key_env_var(), "OPENAI_API_KEY");
    }

    #[test]
    fn anthropic_key_goes_to_anthropic_endpoint() {
        let anthropic = LlmConfig {
            provider: "anthropic".into(),
            ..LlmConfig::default()
        };
        assert_eq!(anthropic.api_key_env_var(), "ANTHROPIC_API_KEY");
        assert_eq!(anthropic.resolved_base_url(), "https://api.anthropic.com/v1");
    }

    #[test]
    fn unknown_provider_needs_base_url() {
        let err = TribunalConfig::from_toml("[llm]\nprovider = \"mistral\"\n").unwrap_err();
        assert!(err.to_string().contains("llm.base_url"));

        let config = TribunalConfig::from_toml(
            "[llm]\nprovider = \"mistral\"\nbase_url = \"https://api.mistral.ai/v1/\"\n",
        )
        .unwrap();
        assert_eq!(config.llm.resolved_base_url(), "https://api.mistral.ai/v1");
        assert_eq!(config.llm.api_key_env_var(), "OPENAI_API_KEY");
    }
}
