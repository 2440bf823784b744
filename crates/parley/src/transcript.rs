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

//! Human-readable transcript rendering. A pure projection of records.

use std::fmt::Write;

use crate::models::{DialogueRecord, PipelineStage, Role};

const RULE_WIDTH: usize = 60;
const BACKSTORY_PREVIEW_CHARS: usize = 60;
const PLACEHOLDER_CLIENT: &str = "Customer";

fn stage_list(stages: &[PipelineStage]) -> String {
    let names: Vec<&str> = stages.iter().map(PipelineStage::as_str).collect();
    format!("[{}]", names.join(", "))
}

/// Renders one record; `index` is its 1-based position in the transcript.
pub fn render_record(record: &DialogueRecord, index: usize) -> String {
    let p = &record.params;
    let mut out = String::new();

    // Writing into a String cannot fail.
    let _ = writeln!(out, "{}", "=".repeat(RULE_WIDTH));
    let _ = writeln!(out, "DIALOGUE  seed={}  #{index}", record.seed);
    let _ = writeln!(out, "complexity : {}", p.complexity);
    let _ = writeln!(out, "sector     : {}", p.sector);
    let _ = writeln!(out, "topic      : {}", p.topic);
    let _ = writeln!(out, "outcome    : {}", p.outcome);
    let _ = writeln!(out, "style      : {}", p.style);
    let _ = writeln!(out, "client     : {}", p.client_archetype);
    let _ = writeln!(out, "agent      : {}", p.agent_archetype);
    let _ = writeln!(out, "twist      : {}", p.twist);
    let _ = writeln!(out, "alt_model  : {}", p.use_alt_model);
    out.push('\n');

    let client = &record.characters.client;
    let agent = &record.characters.agent;
    if !client.name.is_empty() && client.name != PLACEHOLDER_CLIENT {
        let backstory: String = client.backstory.chars().take(BACKSTORY_PREVIEW_CHARS).collect();
        let _ = writeln!(out, "Client : {} | mood={} | {}", client.name, client.mood, backstory);
        let _ = writeln!(out, "Agent  : {} | mood={}", agent.name, agent.mood);
        out.push('\n');
    }

    for m in &record.messages {
        let label = match m.role {
            Role::Client => "CLIENT",
            Role::Agent => "AGENT ",
        };
        let emotion = m
            .emotion
            .as_deref()
            .filter(|e| !e.is_empty())
            .map(|e| format!("  [{e}]"))
            .unwrap_or_default();
        let _ = writeln!(out, "[{label} turn={}]{emotion}", m.turn);
        let _ = writeln!(out, "  {}", m.content);
        out.push('\n');
    }

    let meta = &record.meta;
    let _ = writeln!(out, "stages : {}", stage_list(&meta.stages_run));
    let _ = writeln!(out, "skipped: {}", stage_list(&meta.stages_skipped));
    let _ = writeln!(out, "noise  : [{}]", meta.noise_applied.join(", "));
    let _ = writeln!(out, "time   : {:.2}s", meta.total_time_s);
    out
}

pub fn render_transcript(records: &[DialogueRecord]) -> String {
    records
        .iter()
        .enumerate()
        .map(|(i, r)| render_record(r, i + 1))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CharacterProfile, Characters, Message, RecordMeta};
    use crate::sampler::{ScenarioSampler, ScenarioTables};
    use chrono::Utc;
    use uuid::Uuid;

    fn record() -> DialogueRecord {
        let params = ScenarioSampler::new(ScenarioTables::default())
            .unwrap()
            .sample_seeded(42);
        let mut client_msg = Message::client(1, "where is my order");
        client_msg.emotion = Some("annoyed".into());
        DialogueRecord {
            id: Uuid::new_v4(),
            seed: 42,
            params,
            characters: Characters::new(
                CharacterProfile {
                    name: "Dana".into(),
                    mood: "tense".into(),
                    personality: vec![],
                    backstory: "Ordered a gift for her mother".into(),
                    quirks: vec![],
                },
                CharacterProfile::placeholder("Sam", "professional"),
            ),
            messages: vec![client_msg, Message::agent(2, "Checking now.")],
            meta: RecordMeta {
                stages_run: vec![PipelineStage::ParamsSampled, PipelineStage::Complete],
                stages_skipped: vec![PipelineStage::Styled],
                noise_applied: vec!["lowercase:turn1".into()],
                model_used: "llama3.1:8b".into(),
                variant: "simple".into(),
                total_time_s: 1.234,
            },
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_render_record_layout() {
        let text = render_record(&record(), 1);
        assert!(text.starts_with(&"=".repeat(60)));
        assert!(text.contains("DIALOGUE  seed=42  #1"));
        assert!(text.contains("Client : Dana | mood=tense | Ordered a gift"));
        assert!(text.contains("[CLIENT turn=1]  [annoyed]\n  where is my order\n"));
        assert!(text.contains("[AGENT  turn=2]\n  Checking now.\n"));
        assert!(text.contains("stages : [PARAMS_SAMPLED, COMPLETE]"));
        assert!(text.contains("noise  : [lowercase:turn1]"));
        assert!(text.contains("time   : 1.23s"));
    }

    #[test]
    fn test_placeholder_characters_hidden() {
        let mut r = record();
        r.characters = Characters::default();
        assert!(!render_record(&r, 1).contains("Client :"));
    }

    #[test]
    fn test_transcript_numbers_records() {
        let text = render_transcript(&[record(), record()]);
        assert!(text.contains("#1"));
        assert!(text.contains("#2"));
    }
}
