// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2024 Jonathan Lee
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License version 3
// as published by the Free Software Foundation.
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see https://www.gnu.org/licenses/.

use llm_contracts::{BackendConfig, ModelRole, ModelRoles, Provider};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::errors::ConfigError;
use crate::normalizer::GenerationVariant;

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_pause_ms() -> u64 {
    500
}

fn default_concurrency() -> usize {
    4
}

fn default_true() -> bool {
    true
}

/// Optional bank overrides; the built-in banks are used when unset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorpusPaths {
    #[serde(default)]
    pub slang: Option<PathBuf>,
    #[serde(default)]
    pub filler: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub models: ModelRoles,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub variant: GenerationVariant,
    /// Attempts per generation stage, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_pause_ms")]
    pub retry_pause_ms: u64,
    #[serde(default = "default_true")]
    pub annotate_emotions: bool,
    #[serde(default)]
    pub corpus: CorpusPaths,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            models: ModelRoles::default(),
            backend: BackendConfig::default(),
            variant: GenerationVariant::default(),
            max_attempts: default_max_attempts(),
            retry_pause_ms: default_retry_pause_ms(),
            annotate_emotions: true,
            corpus: CorpusPaths::default(),
            concurrency: default_concurrency(),
        }
    }
}

impl PipelineConfig {
    pub fn from_yaml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: PipelineConfig = serde_yaml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        debug!(path = %path.display(), "Loading pipeline config");
        Self::from_yaml_str(&raw)
    }

    /// File (when given) overlaid with the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => Self::from_path(p)?,
            None => Self::default(),
        };
        config.apply_env_with(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Overlays variables read through `lookup`.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let roles = [
            ("MODEL_WRITER", ModelRole::Writer),
            ("MODEL_PARSER", ModelRole::Parser),
            ("MODEL_STYLER", ModelRole::Styler),
            ("MODEL_HEAVY", ModelRole::Heavy),
        ];
        for (key, role) in roles {
            if let Some(model) = lookup(key).filter(|v| !v.trim().is_empty()) {
                self.models.set(role, model);
            }
        }

        if let Some(endpoint) = lookup("LLM_ENDPOINT") {
            self.backend.endpoint = endpoint;
        }
        if let Some(key) = lookup("LLM_API_KEY") {
            self.backend.api_key = Some(key);
            if self.backend.provider == Provider::Ollama {
                self.backend.provider = Provider::OpenAI;
            }
        }
        if let Some(raw) = lookup("PARLEY_VARIANT") {
            self.variant = GenerationVariant::parse(&raw).ok_or_else(|| ConfigError::Invalid {
                key: "PARLEY_VARIANT".to_string(),
                value: raw.clone(),
            })?;
        }
        if let Some(raw) = lookup("PARLEY_MAX_ATTEMPTS") {
            self.max_attempts = raw.trim().parse().map_err(|_| ConfigError::Invalid {
                key: "PARLEY_MAX_ATTEMPTS".to_string(),
                value: raw.clone(),
            })?;
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                key: "max_attempts".to_string(),
                value: "0".to_string(),
            });
        }
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid {
                key: "concurrency".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(())
    }

    pub fn retry_pause(&self) -> Duration {
        Duration::from_millis(self.retry_pause_ms)
    }
}
