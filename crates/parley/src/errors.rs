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

use llm_contracts::LLMError;
use std::io;
use thiserror::Error;

use crate::models::{PipelineStage, Role};

/// Every repair strategy failed on the given text.
#[derive(Debug, Error)]
#[error("Cannot parse structured data from: {preview}")]
pub struct ExtractionError {
    /// First 200 characters of the cleaned input.
    pub preview: String,
}

impl ExtractionError {
    pub fn from_text(text: &str) -> Self {
        Self {
            preview: text.chars().take(200).collect(),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("Sequence too short: {count} message(s) survived normalization, need at least 2")]
    SequenceTooShort { count: usize },

    #[error("Dialogue has no {0} message")]
    MissingRole(Role),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration value for {key}: {value}")]
    Invalid { key: String, value: String },
}

#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Normalization failed: {0}")]
    Normalize(#[from] NormalizeError),

    #[error("Generation backend error: {0}")]
    Generation(#[from] LLMError),

    #[error("Stage {stage} failed after {attempts} attempt(s): {last}")]
    RetriesExhausted {
        stage: PipelineStage,
        attempts: u32,
        last: String,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl PipelineError {
    /// Extraction failures and transient transport errors are worth another call.
    pub fn is_retryable(&self) -> bool {
        match self {
            PipelineError::Extraction(_) => true,
            PipelineError::Generation(e) => e.is_transient(),
            _ => false,
        }
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
