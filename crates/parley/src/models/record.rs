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

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

use super::message::Message;
use super::scenario::ScenarioParams;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterProfile {
    pub name: String,
    pub mood: String,
    #[serde(default)]
    pub personality: Vec<String>,
    #[serde(default)]
    pub backstory: String,
    #[serde(default)]
    pub quirks: Vec<String>,
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(|s| s.trim().to_string()))
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(s)) => s
            .split(',')
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

impl CharacterProfile {
    pub fn placeholder(name: &str, trait_word: &str) -> Self {
        Self {
            name: name.to_string(),
            mood: "neutral".to_string(),
            personality: vec![trait_word.to_string()],
            backstory: String::new(),
            quirks: Vec::new(),
        }
    }

    /// Missing list fields default to empty. `None` only when there is no usable name.
    pub fn from_value(value: &Value) -> Option<Self> {
        let text = |key: &str| {
            value
                .get(key)
                .and_then(Value::as_str)
                .map(|s| s.trim().to_string())
                .unwrap_or_default()
        };
        let name = text("name");
        if name.is_empty() {
            return None;
        }
        let mood = text("mood");
        Some(Self {
            name,
            mood: if mood.is_empty() { "neutral".to_string() } else { mood },
            personality: string_list(value.get("personality")),
            backstory: text("backstory"),
            quirks: string_list(value.get("quirks")),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Characters {
    pub client: CharacterProfile,
    pub agent: CharacterProfile,
}

impl Characters {
    /// Keeps the two sides distinguishable when the generator reuses a name.
    pub fn new(client: CharacterProfile, mut agent: CharacterProfile) -> Self {
        if client.name.eq_ignore_ascii_case(&agent.name) {
            agent.name = format!("{} (agent)", agent.name);
        }
        Self { client, agent }
    }
}

impl Default for Characters {
    fn default() -> Self {
        Self {
            client: CharacterProfile::placeholder("Customer", "casual"),
            agent: CharacterProfile::placeholder("Agent", "professional"),
        }
    }
}

/// Pipeline states in the order a dialogue passes through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineStage {
    ParamsSampled,
    CharactersBuilt,
    RawGenerated,
    Extracted,
    Normalized,
    Styled,
    Noised,
    Complete,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::ParamsSampled => "PARAMS_SAMPLED",
            PipelineStage::CharactersBuilt => "CHARACTERS_BUILT",
            PipelineStage::RawGenerated => "RAW_GENERATED",
            PipelineStage::Extracted => "EXTRACTED",
            PipelineStage::Normalized => "NORMALIZED",
            PipelineStage::Styled => "STYLED",
            PipelineStage::Noised => "NOISED",
            PipelineStage::Complete => "COMPLETE",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordMeta {
    pub stages_run: Vec<PipelineStage>,
    pub stages_skipped: Vec<PipelineStage>,
    /// Append-only audit trail of `transform:turnN` tags.
    pub noise_applied: Vec<String>,
    pub model_used: String,
    pub variant: String,
    pub total_time_s: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogueRecord {
    pub id: Uuid,
    pub seed: u64,
    pub params: ScenarioParams,
    pub characters: Characters,
    pub messages: Vec<Message>,
    pub meta: RecordMeta,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_profile_defaults_missing_lists() {
        let p = CharacterProfile::from_value(&json!({"name": "Aurora", "mood": "tense"})).unwrap();
        assert!(p.personality.is_empty());
        assert!(p.quirks.is_empty());
        assert_eq!(p.backstory, "");

        let p = CharacterProfile::from_value(&json!({"name": "Ben", "personality": "blunt, tired"}))
            .unwrap();
        assert_eq!(p.personality, vec!["blunt", "tired"]);
        assert_eq!(p.mood, "neutral");
        assert!(CharacterProfile::from_value(&json!({"mood": "x"})).is_none());
    }

    #[test]
    fn test_duplicate_names_are_disambiguated() {
        let c = Characters::new(
            CharacterProfile::placeholder("Sam", "calm"),
            CharacterProfile::placeholder("sam", "calm"),
        );
        assert_eq!(c.agent.name, "sam (agent)");
    }

    #[test]
    fn test_stage_order_and_wire_names() {
        assert!(PipelineStage::ParamsSampled < PipelineStage::Complete);
        assert_eq!(
            serde_json::to_string(&PipelineStage::RawGenerated).unwrap(),
            "\"RAW_GENERATED\""
        );
    }
}
