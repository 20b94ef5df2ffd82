// src/config/model.rs

use std::path::PathBuf;

use serde::Deserialize;

/// Configuration as read from a TOML file, before validation.
///
/// ```toml
/// [solver]
/// depth = 3
/// max_retries = 3
/// subtask_retries = 1
/// retry_backoff_ms = 1000
/// max_concurrency = 4
///
/// [synthesizer]
/// model = "claude-3-7-sonnet-20250219"
/// max_tokens = 4096
/// fallback_model = "gpt-4o-2024-05-13"
///
/// [executor]
/// interpreter = "python3"
/// timeout_secs = 120
///
/// [state]
/// run_dir = "run"
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub solver: SolverSection,

    #[serde(default)]
    pub synthesizer: SynthesizerSection,

    #[serde(default)]
    pub executor: ExecutorSection,

    #[serde(default)]
    pub state: StateSection,
}

/// Validated configuration. Only obtainable through
/// `ConfigFile::try_from(RawConfigFile)` or [`ConfigFile::default`].
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub solver: SolverSection,
    pub synthesizer: SynthesizerSection,
    pub executor: ExecutorSection,
    pub state: StateSection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        solver: SolverSection,
        synthesizer: SynthesizerSection,
        executor: ExecutorSection,
        state: StateSection,
    ) -> Self {
        Self {
            solver,
            synthesizer,
            executor,
            state,
        }
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        let raw = RawConfigFile::default();
        Self::new_unchecked(raw.solver, raw.synthesizer, raw.executor, raw.state)
    }
}

/// `[solver]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct SolverSection {
    /// Recursion depth; 1 means solve directly.
    #[serde(default = "default_depth")]
    pub depth: u32,

    /// Retries after the first attempt of each invocation.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Retries per subtask. If `None`, `max_retries` is used.
    #[serde(default)]
    pub subtask_retries: Option<u32>,

    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Subtasks of one level running at the same time.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Maximum characters of dependency inputs embedded in a subtask.
    #[serde(default = "default_input_preview_len")]
    pub input_preview_len: usize,
}

fn default_depth() -> u32 {
    1
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    1000
}

fn default_max_concurrency() -> usize {
    4
}

fn default_input_preview_len() -> usize {
    100
}

impl Default for SolverSection {
    fn default() -> Self {
        Self {
            depth: default_depth(),
            max_retries: default_max_retries(),
            subtask_retries: None,
            retry_backoff_ms: default_retry_backoff_ms(),
            max_concurrency: default_max_concurrency(),
            input_preview_len: default_input_preview_len(),
        }
    }
}

/// `[synthesizer]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct SynthesizerSection {
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default)]
    pub temperature: f32,

    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// OpenAI model tried when an Anthropic call fails. Only used when the
    /// variable named by `fallback_api_key_env` holds a key.
    #[serde(default = "default_fallback_model")]
    pub fallback_model: String,

    #[serde(default = "default_fallback_api_key_env")]
    pub fallback_api_key_env: String,

    #[serde(default = "default_fallback_base_url")]
    pub fallback_base_url: String,

    #[serde(default)]
    pub fallback_organization: Option<String>,
}

fn default_model() -> String {
    "claude-3-7-sonnet-20250219".to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_api_key_env() -> String {
    "ANTHROPIC_API_KEY".to_string()
}

fn default_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_fallback_model() -> String {
    "gpt-4o-2024-05-13".to_string()
}

fn default_fallback_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_fallback_base_url() -> String {
    "https://api.openai.com".to_string()
}

impl Default for SynthesizerSection {
    fn default() -> Self {
        Self {
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: 0.0,
            api_key_env: default_api_key_env(),
            base_url: default_base_url(),
            fallback_model: default_fallback_model(),
            fallback_api_key_env: default_fallback_api_key_env(),
            fallback_base_url: default_fallback_base_url(),
            fallback_organization: None,
        }
    }
}

/// `[executor]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutorSection {
    #[serde(default = "default_interpreter")]
    pub interpreter: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Where per-execution directories are created. Defaults to
    /// `<system temp>/solvedag`.
    #[serde(default)]
    pub work_dir: Option<PathBuf>,
}

fn default_interpreter() -> String {
    "python3".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

impl ExecutorSection {
    pub fn effective_work_dir(&self) -> PathBuf {
        self.work_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("solvedag"))
    }
}

impl Default for ExecutorSection {
    fn default() -> Self {
        Self {
            interpreter: default_interpreter(),
            timeout_secs: default_timeout_secs(),
            work_dir: None,
        }
    }
}

/// `[state]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct StateSection {
    /// Root directory for run records.
    #[serde(default = "default_run_dir")]
    pub run_dir: PathBuf,
}

fn default_run_dir() -> PathBuf {
    PathBuf::from("run")
}

impl Default for StateSection {
    fn default() -> Self {
        Self {
            run_dir: default_run_dir(),
        }
    }
}
