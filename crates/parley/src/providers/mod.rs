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

pub mod openai;

use llm_contracts::{BackendConfig, LLMResult, Provider, TextGenerator};
use std::sync::Arc;
use tracing::info;

pub use openai::OpenAICompatibleGenerator;

/// Builds the generator for a backend. Ollama, hosted OpenAI-style APIs and
/// custom gateways all speak the chat-completions protocol.
pub fn build_generator(config: &BackendConfig) -> LLMResult<Arc<dyn TextGenerator>> {
    let generator = OpenAICompatibleGenerator::from_config(config)?;
    let provider = match &config.provider {
        Provider::Ollama => "ollama",
        Provider::OpenAI => "openai",
        Provider::Custom(name) => name.as_str(),
    };
    info!(provider = provider, endpoint = %config.endpoint, "Generation backend ready");
    Ok(Arc::new(generator))
}
