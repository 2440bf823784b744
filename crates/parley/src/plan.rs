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

//! Message plans: who speaks in which slot, and the numbered templates
//! the generator fills in.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{Message, Outcome, Role};

static NUMBER_PREFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d+)\s*[.)]\s*").expect("valid number regex"));
static SPEAKER_PREFIX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z][\w'\-]{0,24}(?:\s*\((?:[^()]|\([^()]*\))*\))?\s*:\s*")
        .expect("valid speaker regex")
});

const CONFLICT_BEATS: &[&str] = &["conflict", "ragequit", "escalat", "twist", "protocol", "legal"];

/// Share of ASCII characters below which a line is treated as off-language.
const MIN_ASCII_SHARE: f64 = 0.85;

/// Role sequence for `n` messages ending on the side `outcome` requires.
pub fn plan_roles(n: usize, outcome: Outcome) -> Vec<Role> {
    let last = if outcome.ends_with_client() {
        Role::Client
    } else {
        Role::Agent
    };
    if n <= 2 {
        // A client-ending pair would have no agent turn at all.
        return match last {
            Role::Client => vec![Role::Client, Role::Agent, Role::Client],
            Role::Agent => vec![Role::Client, Role::Agent],
        };
    }
    let mut plan = Vec::with_capacity(n);
    plan.push(Role::Client);
    let mut next = Role::Agent;
    for _ in 0..n - 2 {
        plan.push(next);
        next = next.opposite();
    }
    plan.push(last);
    plan
}

/// How speakers are labelled in a rendered template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateLabels {
    Generic,
    Named { client: String, agent: String },
}

impl TemplateLabels {
    fn label(&self, role: Role) -> String {
        match (self, role) {
            (TemplateLabels::Generic, Role::Client) => "Customer".to_string(),
            (TemplateLabels::Generic, Role::Agent) => "Agent".to_string(),
            (TemplateLabels::Named { client, .. }, Role::Client) => format!("CLIENT ({client})"),
            (TemplateLabels::Named { agent, .. }, Role::Agent) => format!("AGENT ({agent})"),
        }
    }
}

/// `1. Customer: [message]` lines, numbered from `start`.
pub fn render_template(plan: &[Role], start: usize, labels: &TemplateLabels) -> String {
    plan.iter()
        .enumerate()
        .map(|(i, role)| format!("{}. {}: [message]", start + i, labels.label(*role)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// What to do with a plan slot the reply did not fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingSlot {
    Placeholder,
    Skip,
}

pub fn is_mostly_ascii(text: &str) -> bool {
    let total = text.chars().count();
    if total == 0 {
        return true;
    }
    let ascii = text.chars().filter(char::is_ascii).count();
    ascii as f64 / total as f64 > MIN_ASCII_SHARE
}

fn clean_slot(raw: &str) -> String {
    let mut content = NUMBER_PREFIX_RE.replace(raw, "").trim().to_string();
    if let Some(m) = SPEAKER_PREFIX_RE.find(&content) {
        if m.end() < content.len() {
            content = content[m.end()..].trim().to_string();
        }
    }
    content
        .trim_matches(|c| c == '"' || c == '\'')
        .replace("\\\"", "\"")
        .replace("\\'", "'")
        .trim()
        .to_string()
}

/// Maps a numbered reply back onto the plan.
///
/// Slot `i` is looked up by its number (`start + i`), falling back to the
/// `i`-th non-empty line. Turns are positional.
pub fn parse_numbered_reply(
    text: &str,
    plan: &[Role],
    start: usize,
    missing: MissingSlot,
) -> Vec<Message> {
    let lines: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    let mut out = Vec::with_capacity(plan.len());

    for (i, role) in plan.iter().enumerate() {
        let expected = start + i;
        let numbered = lines.iter().find(|line| {
            NUMBER_PREFIX_RE
                .captures(line)
                .and_then(|c| c.get(1))
                .and_then(|m| m.as_str().parse::<usize>().ok())
                == Some(expected)
        });
        let mut content = numbered
            .or_else(|| lines.get(i))
            .map(|line| clean_slot(line))
            .unwrap_or_default();

        if !is_mostly_ascii(&content) {
            content.clear();
        }
        if content.is_empty() {
            match missing {
                MissingSlot::Skip => continue,
                MissingSlot::Placeholder => content = format!("[{role}]"),
            }
        }
        out.push(Message::new(*role, expected as u32, content));
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scene {
    pub id: u32,
    pub beat: String,
    pub description: String,
    pub client_goal: String,
    pub agent_goal: String,
    pub emotional_state: String,
    pub expected_messages: Vec<Role>,
}

impl Scene {
    pub fn is_conflict_beat(&self) -> bool {
        let beat = self.beat.to_lowercase();
        CONFLICT_BEATS.iter().any(|b| beat.contains(b))
    }

    fn from_value(value: &Value, index: usize) -> Self {
        let text = |key: &str| {
            value
                .get(key)
                .map(|v| match v {
                    Value::String(s) => s.trim().to_string(),
                    Value::Null => String::new(),
                    other => other.to_string(),
                })
                .unwrap_or_default()
        };
        let expected = value
            .get("expected_messages")
            .and_then(Value::as_array)
            .map(|items| normalize_expected_messages(items))
            .unwrap_or_default();
        Self {
            id: value
                .get("id")
                .and_then(Value::as_u64)
                .map_or(index as u32 + 1, |v| v as u32),
            beat: text("beat"),
            description: text("description"),
            client_goal: text("client_goal"),
            agent_goal: text("agent_goal"),
            emotional_state: text("emotional_state"),
            expected_messages: expected,
        }
    }
}

/// Turns whatever the director wrote into a role list.
///
/// Full dialogue lines such as `"CLIENT (Aurora): ..."` are reduced to their
/// speaker; unreadable entries alternate by position starting with the client.
pub fn normalize_expected_messages(raw: &[Value]) -> Vec<Role> {
    let mut out = Vec::with_capacity(raw.len());
    for item in raw {
        let role = match item.as_str().map(|s| s.trim().to_lowercase()) {
            None => Role::Client,
            Some(s) if s.starts_with("client") || s.starts_with("customer") => Role::Client,
            Some(s) if s.starts_with("agent") => Role::Agent,
            Some(_) if out.len() % 2 == 0 => Role::Client,
            Some(_) => Role::Agent,
        };
        out.push(role);
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenePlan {
    pub scenes: Vec<Scene>,
    pub total_messages: usize,
}

/// Number of scenes requested for `n` messages.
pub fn scene_count(n: usize) -> usize {
    (n / 3).max(2)
}

impl ScenePlan {
    /// Reads the director's reply and aligns its slots with `plan`.
    pub fn from_value(value: &Value, plan: &[Role]) -> Self {
        let items = value
            .get("scenes")
            .and_then(Value::as_array)
            .or_else(|| value.as_array())
            .cloned()
            .unwrap_or_default();
        let mut scenes: Vec<Scene> = items
            .iter()
            .enumerate()
            .filter(|(_, v)| v.is_object())
            .map(|(i, v)| Scene::from_value(v, i))
            .collect();

        if scenes.is_empty() {
            scenes.push(Scene {
                id: 1,
                beat: "conversation".to_string(),
                description: String::new(),
                client_goal: String::new(),
                agent_goal: String::new(),
                emotional_state: String::new(),
                expected_messages: Vec::new(),
            });
        }

        let declared: usize = scenes.iter().map(|s| s.expected_messages.len()).sum();
        if declared != plan.len() || !matches_plan(&scenes, plan) {
            redistribute(&mut scenes, plan);
        }
        Self {
            scenes,
            total_messages: plan.len(),
        }
    }
}

fn matches_plan(scenes: &[Scene], plan: &[Role]) -> bool {
    scenes
        .iter()
        .flat_map(|s| s.expected_messages.iter())
        .eq(plan.iter())
}

/// Refills each scene's slots from `plan`, keeping the director's per-scene sizes.
fn redistribute(scenes: &mut [Scene], plan: &[Role]) {
    let mut idx = 0;
    for scene in scenes.iter_mut() {
        let count = scene.expected_messages.len().max(1);
        let end = (idx + count).min(plan.len());
        scene.expected_messages = plan[idx.min(end)..end].to_vec();
        idx = end;
    }
    if idx < plan.len() {
        if let Some(last) = scenes.last_mut() {
            last.expected_messages.extend_from_slice(&plan[idx..]);
        }
    }
}
