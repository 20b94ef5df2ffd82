// src/config/validate.rs

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{Result, SolvedagError};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::SolvedagError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(
            raw.solver,
            raw.synthesizer,
            raw.executor,
            raw.state,
        ))
    }
}

/// Re-check a config after CLI overrides were applied on top of it.
pub fn validate_config(cfg: &ConfigFile) -> Result<()> {
    let raw = RawConfigFile {
        solver: cfg.solver.clone(),
        synthesizer: cfg.synthesizer.clone(),
        executor: cfg.executor.clone(),
        state: cfg.state.clone(),
    };
    validate_raw_config(&raw)
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_solver(cfg)?;
    validate_synthesizer(cfg)?;
    validate_executor(cfg)?;
    Ok(())
}

fn validate_solver(cfg: &RawConfigFile) -> Result<()> {
    let solver = &cfg.solver;
    if solver.depth == 0 {
        return Err(SolvedagError::ConfigError(
            "[solver].depth must be >= 1 (got 0)".to_string(),
        ));
    }
    if solver.max_concurrency == 0 {
        return Err(SolvedagError::ConfigError(
            "[solver].max_concurrency must be >= 1 (got 0)".to_string(),
        ));
    }
    // Room for at least one character plus the "..." marker.
    if solver.input_preview_len < 4 {
        return Err(SolvedagError::ConfigError(format!(
            "[solver].input_preview_len must be >= 4 (got {})",
            solver.input_preview_len
        )));
    }
    Ok(())
}

fn validate_synthesizer(cfg: &RawConfigFile) -> Result<()> {
    let synth = &cfg.synthesizer;
    if synth.model.trim().is_empty() {
        return Err(SolvedagError::ConfigError(
            "[synthesizer].model must not be empty".to_string(),
        ));
    }
    if synth.max_tokens == 0 {
        return Err(SolvedagError::ConfigError(
            "[synthesizer].max_tokens must be >= 1 (got 0)".to_string(),
        ));
    }
    if synth.fallback_model.trim().is_empty() {
        return Err(SolvedagError::ConfigError(
            "[synthesizer].fallback_model must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_executor(cfg: &RawConfigFile) -> Result<()> {
    let exec = &cfg.executor;
    if exec.interpreter.trim().is_empty() {
        return Err(SolvedagError::ConfigError(
            "[executor].interpreter must not be empty".to_string(),
        ));
    }
    if exec.timeout_secs == 0 {
        return Err(SolvedagError::ConfigError(
            "[executor].timeout_secs must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}
