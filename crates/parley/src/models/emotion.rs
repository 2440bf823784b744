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
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::message::{coerce_scale, Message, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Composure {
    Steady,
    Holding,
    Slipping,
    Lost,
}

const COMPOSURE_KEYWORDS: &[(&str, Composure)] = &[
    ("stable", Composure::Steady),
    ("calm", Composure::Steady),
    ("composed", Composure::Steady),
    ("confident", Composure::Steady),
    ("relaxed", Composure::Steady),
    ("normal", Composure::Steady),
    ("nervous", Composure::Holding),
    ("anxious", Composure::Holding),
    ("tense", Composure::Holding),
    ("worried", Composure::Holding),
    ("uncertain", Composure::Holding),
    ("cautious", Composure::Holding),
    ("stressed", Composure::Slipping),
    ("struggling", Composure::Slipping),
    ("frustrated", Composure::Slipping),
    ("overwhelm", Composure::Slipping),
    ("strain", Composure::Slipping),
    ("difficult", Composure::Slipping),
    ("panic", Composure::Lost),
    ("broke", Composure::Lost),
    ("collaps", Composure::Lost),
];

impl Composure {
    pub const ALL: [Composure; 4] = [
        Composure::Steady,
        Composure::Holding,
        Composure::Slipping,
        Composure::Lost,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Composure::Steady => "steady",
            Composure::Holding => "holding",
            Composure::Slipping => "slipping",
            Composure::Lost => "lost",
        }
    }

    /// Exact value, then 4-char prefix, then keyword table, then `holding`.
    pub fn canonicalize(raw: &str) -> Composure {
        let s = raw.trim().to_lowercase();
        if let Some(c) = Self::ALL.iter().find(|c| c.as_str() == s) {
            return *c;
        }
        if let Some(c) = Self::ALL.iter().find(|c| s.starts_with(&c.as_str()[..4])) {
            return *c;
        }
        COMPOSURE_KEYWORDS
            .iter()
            .find(|(key, _)| s.contains(key))
            .map_or(Composure::Holding, |(_, c)| *c)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmotionTurn {
    pub client_emotion: String,
    pub client_intensity: u8,
    pub agent_composure: Composure,
    pub agent_stress: u8,
}

fn find_by_key<'a>(obj: &'a Map<String, Value>, exact: &str, needles: &[&str]) -> Option<&'a Value> {
    obj.get(exact).or_else(|| {
        obj.iter()
            .find(|(k, _)| {
                let k = k.to_lowercase();
                needles.iter().any(|n| k.contains(n))
            })
            .map(|(_, v)| v)
    })
}

impl EmotionTurn {
    /// Tolerates renamed fields by scanning keys for the expected stem.
    pub fn from_value(value: &Value) -> Self {
        let empty = Map::new();
        let obj = value.as_object().unwrap_or(&empty);

        let client_emotion = find_by_key(obj, "client_emotion", &["emotion", "feeling"])
            .and_then(|v| match v {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .filter(|s| !s.is_empty() && !matches!(s.to_lowercase().as_str(), "null" | "none"))
            .unwrap_or_else(|| "neutral".to_string());

        let client_intensity = find_by_key(obj, "client_intensity", &["intensity", "level", "score"])
            .map_or(3, coerce_scale);

        let agent_composure = find_by_key(obj, "agent_composure", &["composure"])
            .and_then(Value::as_str)
            .map_or(Composure::Steady, Composure::canonicalize);

        let agent_stress = find_by_key(obj, "agent_stress", &["stress"]).map_or(2, coerce_scale);

        Self {
            client_emotion,
            client_intensity,
            agent_composure,
            agent_stress,
        }
    }
}

/// Per-turn emotion annotation, keyed by turn number.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmotionAnalysis {
    pub turns: BTreeMap<u32, EmotionTurn>,
}

impl EmotionAnalysis {
    /// Reads `{"turns": {"1": {...}}}` or the bare turn map.
    pub fn from_value(value: &Value) -> Self {
        let turns_obj = value
            .get("turns")
            .and_then(Value::as_object)
            .or_else(|| value.as_object());
        let mut turns = BTreeMap::new();
        if let Some(map) = turns_obj {
            for (key, entry) in map {
                let digits: String = key.chars().filter(char::is_ascii_digit).collect();
                if let Ok(turn) = digits.parse::<u32>() {
                    turns.insert(turn.max(1), EmotionTurn::from_value(entry));
                }
            }
        }
        Self { turns }
    }

    /// Writes emotion and intensity onto client messages whose turn is annotated.
    pub fn annotate(&self, messages: &mut [Message]) -> usize {
        let mut touched = 0;
        for msg in messages.iter_mut().filter(|m| m.role == Role::Client) {
            if let Some(turn) = self.turns.get(&msg.turn) {
                msg.emotion = Some(turn.client_emotion.clone());
                msg.intensity = Some(turn.client_intensity);
                touched += 1;
            }
        }
        touched
    }
}
