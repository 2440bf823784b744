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

use serde::{Deserialize, Serialize};

use crate::types::Provider;

/// The job a model is asked to do inside one dialogue build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelRole {
    Writer,
    Parser,
    Styler,
    Heavy,
}

impl ModelRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelRole::Writer => "writer",
            ModelRole::Parser => "parser",
            ModelRole::Styler => "styler",
            ModelRole::Heavy => "heavy",
        }
    }
}

impl From<String> for ModelRole {
    fn from(s: String) -> Self {
        match s.to_lowercase().as_str() {
            "parser" => ModelRole::Parser,
            "styler" => ModelRole::Styler,
            "heavy" | "dolphin" => ModelRole::Heavy,
            _ => ModelRole::Writer,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRoles {
    #[serde(default = "default_writer")]
    pub writer: String,
    #[serde(default = "default_parser")]
    pub parser: String,
    #[serde(default = "default_parser")]
    pub styler: String,
    #[serde(default = "default_heavy")]
    pub heavy: String,
}

fn default_writer() -> String {
    "llama3.1:8b".to_string()
}

fn default_parser() -> String {
    "qwen2.5:7b".to_string()
}

fn default_heavy() -> String {
    "dolphin-mistral".to_string()
}

impl Default for ModelRoles {
    fn default() -> Self {
        Self {
            writer: default_writer(),
            parser: default_parser(),
            styler: default_parser(),
            heavy: default_heavy(),
        }
    }
}

impl ModelRoles {
    pub fn model_for(&self, role: ModelRole) -> &str {
        match role {
            ModelRole::Writer => &self.writer,
            ModelRole::Parser => &self.parser,
            ModelRole::Styler => &self.styler,
            ModelRole::Heavy => &self.heavy,
        }
    }

    pub fn set(&mut self, role: ModelRole, model: impl Into<String>) {
        let slot = match role {
            ModelRole::Writer => &mut self.writer,
            ModelRole::Parser => &mut self.parser,
            ModelRole::Styler => &mut self.styler,
            ModelRole::Heavy => &mut self.heavy,
        };
        *slot = model.into();
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_provider")]
    pub provider: Provider,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_provider() -> Provider {
    Provider::Ollama
}

fn default_endpoint() -> String {
    "http://localhost:11434/v1/chat/completions".to_string()
}

fn default_timeout_seconds() -> u64 {
    120
}

fn default_max_retries() -> u32 {
    3
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            endpoint: default_endpoint(),
            api_key: None,
            timeout_seconds: default_timeout_seconds(),
            max_retries: default_max_retries(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = "writer: mistral:7b\n";
        let roles: ModelRoles = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(roles.writer, "mistral:7b");
        assert_eq!(roles.parser, "qwen2.5:7b");
        assert_eq!(roles.model_for(ModelRole::Heavy), "dolphin-mistral");
    }

    #[test]
    fn test_backend_defaults_to_local_ollama() {
        let backend = BackendConfig::default();
        assert_eq!(backend.provider, Provider::Ollama);
        assert!(backend.endpoint.ends_with("/v1/chat/completions"));
        assert!(backend.api_key.is_none());
    }

    #[test]
    fn test_set_role_model() {
        let mut roles = ModelRoles::default();
        roles.set(ModelRole::Styler, "phi3");
        assert_eq!(roles.model_for(ModelRole::Styler), "phi3");
    }
}
