//! Configuration management with YAML support

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::graph::{BranchPolicyKind, DelegationRules};
use crate::query::DEFAULT_SAMPLE_LIMIT;
use crate::source::DecodePolicy;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub sessions: SessionsConfig,

    #[serde(default)]
    pub analysis: AnalysisConfig,

    #[serde(default)]
    pub delegation: DelegationRules,

    /// Worker count for batch analysis
    #[serde(default = "default_workers")]
    pub workers: usize,
}

/// Where session logs live
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionsConfig {
    #[serde(default)]
    pub base_path: Option<String>,
}

/// Graph analysis settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub branch_policy: BranchPolicyKind,

    #[serde(default)]
    pub on_decode_error: DecodePolicy,

    #[serde(default = "default_sample_limit")]
    pub tool_sample_limit: usize,
}

// Default value functions
fn default_workers() -> usize {
    4
}

fn default_sample_limit() -> usize {
    DEFAULT_SAMPLE_LIMIT
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sessions: SessionsConfig::default(),
            analysis: AnalysisConfig::default(),
            delegation: DelegationRules::default(),
            workers: default_workers(),
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            branch_policy: BranchPolicyKind::default(),
            on_decode_error: DecodePolicy::default(),
            tool_sample_limit: default_sample_limit(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    /// Searches in order:
    /// 1. Provided path
    /// 2. ./sessiondag.yaml (current directory)
    /// 3. ~/.config/sessiondag/sessiondag.yaml
    pub fn load(path: &str) -> Result<Self> {
        let search_paths = vec![
            shellexpand::tilde(path).to_string(),
            "sessiondag.yaml".to_string(),
            shellexpand::tilde("~/.config/sessiondag/sessiondag.yaml").to_string(),
        ];

        for search_path in &search_paths {
            if std::path::Path::new(search_path).exists() {
                let content = std::fs::read_to_string(search_path)?;
                let config: Config = serde_yaml::from_str(&content)?;
                return Ok(config);
            }
        }

        // No config file found, use defaults
        Ok(Config::default())
    }

    /// Session directory, expanding ~; defaults to ~/.claude/projects
    pub fn sessions_path(&self) -> PathBuf {
        match &self.sessions.base_path {
            Some(p) => PathBuf::from(shellexpand::tilde(p).to_string()),
            None => dirs::home_dir().unwrap_or_default().join(".claude/projects"),
        }
    }

    /// Worker count, never zero
    pub fn worker_count(&self) -> usize {
        self.workers.max(1)
    }
}
