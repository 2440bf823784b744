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

//! Dialogue orchestration.
//!
//! One dialogue moves through a fixed sequence of stages, each recorded in
//! the record's metadata. Every generator call sits behind a bounded retry
//! loop; exhausting it fails only the dialogue being built.

mod batch;
mod generation;

pub use batch::{balanced_scenarios, BatchFailure, BatchReport, BATCH_SEED_STRIDE};

use std::future::Future;
use std::time::Instant;

use chrono::Utc;
use llm_contracts::{GenerationRequest, ModelRole, TextGenerator};
use serde_json::{json, Value};
use tracing::warn;
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::errors::{PipelineError, PipelineResult};
use crate::logging::{log_dialogue_complete, log_retry_event, log_stage_event, log_stage_skipped};
use crate::models::{
    Characters, DialogueRecord, PipelineStage, RecordMeta, RoleAliases, ScenarioParams,
};
use crate::noise::{CorpusBanks, NoiseEngine, NoiseProfiles};
use crate::normalizer::{enforce_ending, BotOpeners, EndingRules, GenerationVariant, MessageNormalizer};
use crate::prompts::{PromptBuilder, PromptContext};
use crate::sampler::{ScenarioSampler, ScenarioTables};

/// Stages entered and skipped so far, in order.
#[derive(Debug)]
pub(crate) struct StageLog {
    seed: u64,
    run: Vec<PipelineStage>,
    skipped: Vec<PipelineStage>,
}

impl StageLog {
    fn new(seed: u64) -> Self {
        Self {
            seed,
            run: Vec::new(),
            skipped: Vec::new(),
        }
    }

    pub(crate) fn enter(&mut self, stage: PipelineStage, payload: Value) {
        log_stage_event(self.seed, stage, payload);
        self.run.push(stage);
    }

    pub(crate) fn skip(&mut self, stage: PipelineStage, reason: &str) {
        log_stage_skipped(self.seed, stage, reason);
        self.skipped.push(stage);
    }
}

/// Builds dialogue records from scenario parameters and a text generator.
pub struct DialoguePipeline<G> {
    generator: G,
    config: PipelineConfig,
    sampler: ScenarioSampler,
    normalizer: MessageNormalizer,
    noise: NoiseEngine,
    prompts: PromptBuilder,
    openers: BotOpeners,
    aliases: RoleAliases,
}

impl<G: TextGenerator> DialoguePipeline<G> {
    /// Validates `config` and loads the corpus banks it names.
    pub fn new(generator: G, config: PipelineConfig) -> PipelineResult<Self> {
        config.validate()?;
        let sampler = ScenarioSampler::new(ScenarioTables::default())?;
        let banks = CorpusBanks::load(config.corpus.slang.as_deref(), config.corpus.filler.as_deref());
        let noise = NoiseEngine::new(NoiseProfiles::default(), banks);
        Ok(Self::with_components(generator, config, sampler, noise))
    }

    /// Assembles a pipeline from pre-built parts without further validation.
    pub fn with_components(
        generator: G,
        config: PipelineConfig,
        sampler: ScenarioSampler,
        noise: NoiseEngine,
    ) -> Self {
        Self {
            normalizer: MessageNormalizer::new(config.variant, EndingRules::default()),
            generator,
            config,
            sampler,
            noise,
            prompts: PromptBuilder::with_dialogue_templates(),
            openers: BotOpeners::default(),
            aliases: RoleAliases::default(),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn sampler(&self) -> &ScenarioSampler {
        &self.sampler
    }

    pub fn noise(&self) -> &NoiseEngine {
        &self.noise
    }

    pub fn variant(&self) -> GenerationVariant {
        self.normalizer.variant()
    }

    /// Samples a scenario from `seed` (or a fresh one) and builds it.
    pub async fn run(&self, seed: Option<u64>) -> PipelineResult<DialogueRecord> {
        let params = self.sampler.sample(seed);
        self.build(params).await
    }

    pub async fn build(&self, params: ScenarioParams) -> PipelineResult<DialogueRecord> {
        let started = Instant::now();
        let seed = params.seed;
        let mut stages = StageLog::new(seed);
        stages.enter(
            PipelineStage::ParamsSampled,
            json!({
                "outcome": params.outcome.as_str(),
                "style": params.style.as_str(),
                "target": params.target_message_count,
                "variant": self.variant().as_str(),
                "alt_model": params.use_alt_model,
            }),
        );

        let characters = if self.variant() == GenerationVariant::Simple {
            stages.skip(PipelineStage::CharactersBuilt, "simple variant uses generic speakers");
            Characters::default()
        } else {
            match self.build_characters(&params).await {
                Ok(characters) => {
                    stages.enter(
                        PipelineStage::CharactersBuilt,
                        json!({"client": characters.client.name, "agent": characters.agent.name}),
                    );
                    characters
                }
                Err(e) => {
                    warn!(seed = seed, error = %e, "Character generation failed, using placeholders");
                    stages.skip(PipelineStage::CharactersBuilt, "character generation failed");
                    Characters::default()
                }
            }
        };

        let mut raw = match self.variant() {
            GenerationVariant::Story => self.generate_story(&params, &characters, &mut stages).await?,
            GenerationVariant::Scenes => self.generate_scenes(&params, &characters, &mut stages).await?,
            GenerationVariant::Simple => self.generate_simple(&params, &mut stages).await?,
        };
        let stripped = self.openers.strip_all(&mut raw);

        let mut messages = self.normalizer.normalize(raw, &params)?;
        stages.enter(
            PipelineStage::Normalized,
            json!({"messages": messages.len(), "openers_stripped": stripped}),
        );

        if self.config.annotate_emotions {
            match self.annotate_emotions(&params, &mut messages).await {
                Ok(annotated) => stages.enter(PipelineStage::Styled, json!({"annotated": annotated})),
                Err(e) => {
                    warn!(seed = seed, error = %e, "Emotion analysis failed, continuing without it");
                    stages.skip(PipelineStage::Styled, "emotion analysis failed");
                }
            }
        } else {
            stages.skip(PipelineStage::Styled, "emotion annotation disabled");
        }

        let (mut messages, noise_applied) = self.noise.apply_seeded(&messages, &params, seed);
        enforce_ending(&mut messages, params.outcome, self.normalizer.rules(), seed);
        stages.enter(
            PipelineStage::Noised,
            json!({"messages": messages.len(), "tags": noise_applied.len()}),
        );

        let total_time_s = started.elapsed().as_secs_f64();
        stages.enter(PipelineStage::Complete, json!({"elapsed_s": total_time_s}));
        log_dialogue_complete(seed, messages.len(), noise_applied.len(), total_time_s);

        let model_role = if params.use_alt_model {
            ModelRole::Heavy
        } else {
            ModelRole::Writer
        };
        let meta = RecordMeta {
            stages_run: stages.run,
            stages_skipped: stages.skipped,
            noise_applied,
            model_used: self.config.models.model_for(model_role).to_string(),
            variant: self.variant().as_str().to_string(),
            total_time_s,
        };
        Ok(DialogueRecord {
            id: Uuid::new_v4(),
            seed,
            params,
            characters,
            messages,
            meta,
            created_at: Utc::now(),
        })
    }

    /// Renders `template` and sends it to the model configured for `role`.
    pub(crate) async fn call(
        &self,
        template: &str,
        ctx: &PromptContext,
        role: ModelRole,
        max_tokens: u32,
    ) -> PipelineResult<String> {
        let (system, user) = self.prompts.build_prompt(template, ctx)?;
        let model = self.config.models.model_for(role);
        let request = GenerationRequest::new(system, user, model, max_tokens);
        Ok(self.generator.generate(request).await?)
    }

    /// Runs `attempt` until it succeeds, fails permanently or the budget runs out.
    pub(crate) async fn with_retry<T, F, Fut>(
        &self,
        seed: u64,
        stage: PipelineStage,
        mut attempt: F,
    ) -> PipelineResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = PipelineResult<T>>,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut tries = 0u32;
        loop {
            tries += 1;
            match attempt().await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) if tries >= max_attempts => {
                    log_retry_event(seed, stage, tries, max_attempts, &e);
                    return Err(PipelineError::RetriesExhausted {
                        stage,
                        attempts: tries,
                        last: e.to_string(),
                    });
                }
                Err(e) => {
                    log_retry_event(seed, stage, tries, max_attempts, &e);
                    tokio::time::sleep(self.config.retry_pause()).await;
                }
            }
        }
    }
}
