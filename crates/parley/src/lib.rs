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

//! Deterministic core for synthetic customer-support dialogues: scenario
//! sampling, repair of generator output, normalization, noise injection and
//! the pipeline that ties them to a [`TextGenerator`].

pub mod config;
pub mod errors;
pub mod extraction;
pub mod logging;
pub mod models;
pub mod noise;
pub mod normalizer;
pub mod pipeline;
pub mod plan;
pub mod prompts;
pub mod providers;
pub mod sampler;
pub mod transcript;

pub use config::{CorpusPaths, PipelineConfig};
pub use errors::{
    ConfigError, CorpusError, ExtractionError, NormalizeError, PipelineError, PipelineResult,
};
pub use extraction::{extract, extract_as, extract_with_strategy, ExtractionStrategy};
pub use llm_contracts::{GenerationRequest, LLMError, LLMResult, TextGenerator};
pub use models::{
    Characters, DialogueRecord, Message, Outcome, PipelineStage, Role, ScenarioOverrides,
    ScenarioParams, Style,
};
pub use noise::{CorpusBanks, NoiseEngine, NoiseProfiles};
pub use normalizer::{EndingRules, GenerationVariant, MessageNormalizer};
pub use pipeline::{balanced_scenarios, BatchFailure, BatchReport, DialoguePipeline};
pub use providers::{build_generator, OpenAICompatibleGenerator};
pub use sampler::{ScenarioSampler, ScenarioTables};
pub use transcript::{render_record, render_transcript};
