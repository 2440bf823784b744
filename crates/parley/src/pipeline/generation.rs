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

//! Per-variant generator conversations.

use llm_contracts::{ModelRole, TextGenerator};
use serde_json::json;
use tracing::debug;

use super::{DialoguePipeline, StageLog};
use crate::errors::{ExtractionError, PipelineResult};
use crate::extraction::extract;
use crate::models::{
    raw_messages_from_value, resolve_messages, CharacterProfile, Characters, EmotionAnalysis,
    Message, PipelineStage, Role, ScenarioParams, SpeakerNames,
};
use crate::plan::{
    parse_numbered_reply, plan_roles, render_template, scene_count, MissingSlot, ScenePlan,
    TemplateLabels,
};
use crate::prompts::{agent_hint, client_hint, context, names, outcome_instruction, PromptContext};

const CHARACTER_TOKENS: u32 = 300;
const PARSE_TOKENS: u32 = 1200;
const STORY_TOKENS: u32 = 1500;
const VOICE_TOKENS: u32 = 600;
const EMOTION_TOKENS: u32 = 800;

fn twist_line(params: &ScenarioParams) -> String {
    if params.has_twist() {
        format!("Plot twist: {}", params.twist.replace('_', " "))
    } else {
        String::new()
    }
}

/// Writer for the main text: the heavy model when the scenario asks for it.
fn writer_role(params: &ScenarioParams, default: ModelRole) -> ModelRole {
    if params.use_alt_model {
        ModelRole::Heavy
    } else {
        default
    }
}

impl<G: TextGenerator> DialoguePipeline<G> {
    pub(super) async fn build_characters(&self, params: &ScenarioParams) -> PipelineResult<Characters> {
        let client_ctx = context([
            ("client_archetype", params.client_archetype.as_str()),
            ("archetype_hint", client_hint(params.client_archetype)),
            ("topic", params.topic.as_str()),
            ("style", params.style.as_str()),
        ]);
        let agent_ctx = context([
            ("agent_archetype", params.agent_archetype.as_str()),
            ("archetype_hint", agent_hint(params.agent_archetype)),
        ]);

        let client = self
            .character_profile(params.seed, names::CHARACTER_CLIENT, &client_ctx)
            .await?;
        let agent = self
            .character_profile(params.seed, names::CHARACTER_AGENT, &agent_ctx)
            .await?;
        Ok(Characters::new(client, agent))
    }

    /// Prose description first, then a JSON parse of it.
    async fn character_profile(
        &self,
        seed: u64,
        template: &str,
        ctx: &PromptContext,
    ) -> PipelineResult<CharacterProfile> {
        let prose = self
            .with_retry(seed, PipelineStage::CharactersBuilt, move || {
                self.call(template, ctx, ModelRole::Writer, CHARACTER_TOKENS)
            })
            .await?;

        let parse_ctx = context([("prose", prose)]);
        let parse_ctx = &parse_ctx;
        self.with_retry(seed, PipelineStage::CharactersBuilt, move || {
            self.parse_character(parse_ctx)
        })
        .await
    }

    async fn parse_character(&self, ctx: &PromptContext) -> PipelineResult<CharacterProfile> {
        let reply = self
            .call(names::CHARACTER_PARSER, ctx, ModelRole::Parser, CHARACTER_TOKENS)
            .await?;
        let value = extract(&reply)?;
        match CharacterProfile::from_value(&value) {
            Some(profile) => Ok(profile),
            None => Err(ExtractionError::from_text(&reply).into()),
        }
    }

    /// Free prose story, then a parser pass that turns it into messages.
    pub(super) async fn generate_story(
        &self,
        params: &ScenarioParams,
        characters: &Characters,
        stages: &mut StageLog,
    ) -> PipelineResult<Vec<Message>> {
        let (client, agent) = (&characters.client, &characters.agent);
        let writer_ctx = context([
            ("target_turns", json!(params.target_message_count)),
            ("topic", json!(params.topic)),
            ("sector", json!(params.sector)),
            ("client_name", json!(client.name)),
            ("client_hint", json!(client_hint(params.client_archetype))),
            ("client_mood", json!(client.mood)),
            ("client_backstory", json!(client.backstory)),
            ("agent_name", json!(agent.name)),
            ("agent_hint", json!(agent_hint(params.agent_archetype))),
            ("outcome_instruction", json!(outcome_instruction(params.outcome))),
            ("twist_line", json!(twist_line(params))),
            ("emotional_arc", json!(params.emotional_arc)),
        ]);
        let writer_ctx = &writer_ctx;
        let role = writer_role(params, ModelRole::Writer);

        let story = self
            .with_retry(params.seed, PipelineStage::RawGenerated, move || {
                self.call(names::STORY_WRITER, writer_ctx, role, STORY_TOKENS)
            })
            .await?;
        stages.enter(PipelineStage::RawGenerated, json!({"chars": story.len()}));

        let parser_ctx = context([
            ("raw_story", story.as_str()),
            ("client_name", client.name.as_str()),
            ("agent_name", agent.name.as_str()),
        ]);
        let parser_ctx = &parser_ctx;
        let speakers = SpeakerNames::new(client.name.as_str(), agent.name.as_str());
        let speakers = &speakers;

        let messages = self
            .with_retry(params.seed, PipelineStage::Extracted, move || {
                self.parse_story(parser_ctx, speakers)
            })
            .await?;
        stages.enter(PipelineStage::Extracted, json!({"messages": messages.len()}));
        Ok(messages)
    }

    async fn parse_story(
        &self,
        ctx: &PromptContext,
        speakers: &SpeakerNames,
    ) -> PipelineResult<Vec<Message>> {
        let reply = self
            .call(names::STORY_PARSER, ctx, ModelRole::Parser, PARSE_TOKENS)
            .await?;
        let raw = raw_messages_from_value(&extract(&reply)?);
        if raw.is_empty() {
            return Err(ExtractionError::from_text(&reply).into());
        }
        Ok(resolve_messages(raw, &self.aliases, speakers))
    }

    /// Director plan, then one voicing call per scene.
    pub(super) async fn generate_scenes(
        &self,
        params: &ScenarioParams,
        characters: &Characters,
        stages: &mut StageLog,
    ) -> PipelineResult<Vec<Message>> {
        let (client, agent) = (&characters.client, &characters.agent);
        let plan = plan_roles(params.target_message_count, params.outcome);
        let plan_lines = plan
            .iter()
            .enumerate()
            .map(|(i, role)| format!("{}. {role}", i + 1))
            .collect::<Vec<_>>()
            .join("\n");

        let director_ctx = context([
            ("topic", json!(params.topic)),
            ("sector", json!(params.sector)),
            ("client_name", json!(client.name)),
            ("client_hint", json!(client_hint(params.client_archetype))),
            ("client_mood", json!(client.mood)),
            ("agent_name", json!(agent.name)),
            ("agent_hint", json!(agent_hint(params.agent_archetype))),
            ("outcome_instruction", json!(outcome_instruction(params.outcome))),
            ("twist_line", json!(twist_line(params))),
            ("emotional_arc", json!(params.emotional_arc)),
            ("n_messages", json!(plan.len())),
            ("message_plan", json!(plan_lines)),
            ("n_scenes", json!(scene_count(plan.len()))),
        ]);
        let director_ctx = &director_ctx;
        let plan_ref: &[Role] = &plan;

        let scene_plan = self
            .with_retry(params.seed, PipelineStage::RawGenerated, move || {
                self.plan_scenes(director_ctx, plan_ref)
            })
            .await?;

        let labels = TemplateLabels::Named {
            client: client.name.clone(),
            agent: agent.name.clone(),
        };
        let mut messages = Vec::with_capacity(scene_plan.total_messages);
        let mut next_slot = 1usize;
        for scene in &scene_plan.scenes {
            if scene.expected_messages.is_empty() {
                continue;
            }
            let role = if params.use_alt_model && scene.is_conflict_beat() {
                ModelRole::Heavy
            } else {
                ModelRole::Styler
            };
            let voice_ctx = context([
                ("beat", scene.beat.as_str()),
                ("description", scene.description.as_str()),
                ("client_goal", scene.client_goal.as_str()),
                ("agent_goal", scene.agent_goal.as_str()),
                ("emotional_state", scene.emotional_state.as_str()),
                ("client_name", client.name.as_str()),
                ("client_hint", client_hint(params.client_archetype)),
                ("agent_name", agent.name.as_str()),
                ("agent_hint", agent_hint(params.agent_archetype)),
                (
                    "template",
                    render_template(&scene.expected_messages, next_slot, &labels).as_str(),
                ),
            ]);
            let voice_ctx = &voice_ctx;

            let reply = self
                .with_retry(params.seed, PipelineStage::RawGenerated, move || {
                    self.call(names::VOICE_WRITER, voice_ctx, role, VOICE_TOKENS)
                })
                .await?;
            debug!(seed = params.seed, scene = scene.id, beat = %scene.beat, "Scene voiced");
            messages.extend(parse_numbered_reply(
                &reply,
                &scene.expected_messages,
                next_slot,
                MissingSlot::Placeholder,
            ));
            next_slot += scene.expected_messages.len();
        }
        stages.enter(
            PipelineStage::RawGenerated,
            json!({"scenes": scene_plan.scenes.len(), "slots": scene_plan.total_messages}),
        );
        stages.enter(PipelineStage::Extracted, json!({"messages": messages.len()}));
        Ok(messages)
    }

    async fn plan_scenes(&self, ctx: &PromptContext, plan: &[Role]) -> PipelineResult<ScenePlan> {
        let reply = self
            .call(names::SCENE_WRITER, ctx, ModelRole::Writer, PARSE_TOKENS)
            .await?;
        Ok(ScenePlan::from_value(&extract(&reply)?, plan))
    }

    /// One templated call; a reply too short to use falls back to a minimal exchange.
    pub(super) async fn generate_simple(
        &self,
        params: &ScenarioParams,
        stages: &mut StageLog,
    ) -> PipelineResult<Vec<Message>> {
        let plan = plan_roles(params.target_message_count, params.outcome);
        let ctx = context([
            ("topic", params.topic.as_str()),
            ("sector", params.sector.as_str()),
            ("persona_context", ""),
            ("style", params.style.as_str()),
            ("client_hint", client_hint(params.client_archetype)),
            ("agent_hint", agent_hint(params.agent_archetype)),
            ("outcome_instruction", outcome_instruction(params.outcome)),
            ("twist_line", twist_line(params).as_str()),
            (
                "template",
                render_template(&plan, 1, &TemplateLabels::Generic).as_str(),
            ),
        ]);
        let ctx = &ctx;
        let role = writer_role(params, ModelRole::Styler);

        let reply = self
            .with_retry(params.seed, PipelineStage::RawGenerated, move || {
                self.call(names::SIMPLE_WRITER, ctx, role, VOICE_TOKENS)
            })
            .await?;
        stages.enter(PipelineStage::RawGenerated, json!({"chars": reply.len()}));

        let mut messages = parse_numbered_reply(&reply, &plan, 1, MissingSlot::Skip);
        if messages.len() < 2 {
            debug!(seed = params.seed, parsed = messages.len(), "Simple reply unusable, using fallback exchange");
            messages = vec![
                Message::client(1, format!("Hi, I have an issue with {}.", params.topic)),
                Message::agent(2, "Let me look into that for you."),
            ];
            if plan.last() == Some(&Role::Client) {
                messages.push(Message::client(3, "I still need this sorted out."));
            }
        }
        stages.enter(PipelineStage::Extracted, json!({"messages": messages.len()}));
        Ok(messages)
    }

    /// Per-turn emotion analysis written onto client messages.
    pub(super) async fn annotate_emotions(
        &self,
        params: &ScenarioParams,
        messages: &mut [Message],
    ) -> PipelineResult<usize> {
        let dialogue_text = messages
            .iter()
            .map(|m| format!("Turn {} {}: {}", m.turn, m.role.as_str().to_uppercase(), m.content))
            .collect::<Vec<_>>()
            .join("\n");
        let n_turns = messages.iter().map(|m| m.turn).max().unwrap_or(0);

        let writer_ctx = context([
            ("dialogue_text", json!(dialogue_text)),
            ("n_turns", json!(n_turns)),
        ]);
        let writer_ctx = &writer_ctx;
        let prose = self
            .with_retry(params.seed, PipelineStage::Styled, move || {
                self.call(names::EMOTION_WRITER, writer_ctx, ModelRole::Writer, EMOTION_TOKENS)
            })
            .await?;

        let parser_ctx = context([("prose", prose)]);
        let parser_ctx = &parser_ctx;
        let analysis = self
            .with_retry(params.seed, PipelineStage::Styled, move || {
                self.parse_emotions(parser_ctx)
            })
            .await?;
        Ok(analysis.annotate(messages))
    }

    async fn parse_emotions(&self, ctx: &PromptContext) -> PipelineResult<EmotionAnalysis> {
        let reply = self
            .call(names::EMOTION_PARSER, ctx, ModelRole::Parser, PARSE_TOKENS)
            .await?;
        Ok(EmotionAnalysis::from_value(&extract(&reply)?))
    }
}
