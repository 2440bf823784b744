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
use serde_json::Value;
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Client,
    Agent,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Client => "client",
            Role::Agent => "agent",
        }
    }

    pub fn opposite(&self) -> Role {
        match self {
            Role::Client => Role::Agent,
            Role::Agent => Role::Client,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub turn: u32,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intensity: Option<u8>,
}

impl Message {
    pub fn new(role: Role, turn: u32, content: impl Into<String>) -> Self {
        Self {
            role,
            turn: turn.max(1),
            content: content.into(),
            emotion: None,
            intensity: None,
        }
    }

    pub fn client(turn: u32, content: impl Into<String>) -> Self {
        Self::new(Role::Client, turn, content)
    }

    pub fn agent(turn: u32, content: impl Into<String>) -> Self {
        Self::new(Role::Agent, turn, content)
    }

    /// Sibling message with the same role, turn and annotations.
    pub fn with_content(&self, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..self.clone()
        }
    }
}

/// Alias lists used to map free-text speaker labels onto [`Role`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAliases {
    pub client: Vec<String>,
    pub agent: Vec<String>,
}

impl Default for RoleAliases {
    fn default() -> Self {
        let owned = |xs: &[&str]| xs.iter().map(|s| (*s).to_string()).collect();
        Self {
            client: owned(&["customer", "user", "caller", "shopper", "buyer", "client"]),
            agent: owned(&[
                "support",
                "assistant",
                "bot",
                "representative",
                "rep",
                "operator",
                "advisor",
                "staff",
                "employee",
                "service",
                "agent",
            ]),
        }
    }
}

impl RoleAliases {
    /// Exact name or alias-prefix match. `None` when the label is unknown.
    pub fn resolve(&self, label: &str) -> Option<Role> {
        let s = label.trim().to_lowercase();
        match s.as_str() {
            "client" => return Some(Role::Client),
            "agent" => return Some(Role::Agent),
            _ => {}
        }
        if self.client.iter().any(|a| s.starts_with(a.as_str())) {
            return Some(Role::Client);
        }
        if self.agent.iter().any(|a| s.starts_with(a.as_str())) {
            return Some(Role::Agent);
        }
        None
    }
}

/// Character names known for the dialogue, used to resolve labels such as "Maya".
#[derive(Debug, Clone, Default)]
pub struct SpeakerNames {
    pub client: Option<String>,
    pub agent: Option<String>,
}

impl SpeakerNames {
    pub fn new(client: impl Into<String>, agent: impl Into<String>) -> Self {
        Self {
            client: Some(client.into()),
            agent: Some(agent.into()),
        }
    }

    fn resolve(&self, label: &str) -> Option<Role> {
        let s = label.trim().to_lowercase();
        if s.is_empty() {
            return None;
        }
        let matches = |name: &Option<String>| {
            name.as_deref()
                .map(|n| n.trim().to_lowercase())
                .is_some_and(|n| !n.is_empty() && (s == n || s.starts_with(&format!("{n} "))))
        };
        if matches(&self.client) {
            Some(Role::Client)
        } else if matches(&self.agent) {
            Some(Role::Agent)
        } else {
            None
        }
    }
}

/// Majority of three weak signals for a label no table recognises.
fn vote_role(label: &str, previous: Option<Role>, clients: usize, agents: usize) -> Role {
    let s = label.trim().to_lowercase();
    let prefix_hint = if ["cli", "cus", "use"].iter().any(|p| s.starts_with(p)) {
        Role::Client
    } else {
        Role::Agent
    };
    let alternation = previous.map_or(Role::Client, |r| r.opposite());
    let minority = if agents < clients {
        Role::Agent
    } else {
        Role::Client
    };

    let client_votes = [prefix_hint, alternation, minority]
        .iter()
        .filter(|r| **r == Role::Client)
        .count();
    if client_votes >= 2 {
        Role::Client
    } else {
        Role::Agent
    }
}

/// Message as it comes out of the extractor, before any field is trusted.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMessage {
    pub role: String,
    pub turn: u32,
    pub content: String,
    pub emotion: Option<String>,
    pub intensity: Option<u8>,
}

const ROLE_KEYS: &[&str] = &["role", "speaker", "author", "from", "name"];
const CONTENT_KEYS: &[&str] = &["content", "text", "message", "msg", "utterance"];

fn value_to_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Accepts `"2"`, `2.0`, `2`; anything else becomes turn 1.
pub fn coerce_turn(value: Option<&Value>) -> u32 {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(f) if f.is_finite() && f >= 1.0 => f.trunc() as u32,
        _ => 1,
    }
}

/// Accepts `"3/5"`, `3.0`, `"4"`; clamps into 1..=5. Defaults to 3 when unreadable.
pub fn coerce_scale(value: &Value) -> u8 {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.split('/').next().and_then(|p| p.trim().parse::<f64>().ok()),
        _ => None,
    };
    match parsed {
        Some(f) if f.is_finite() => f.trunc().clamp(1.0, 5.0) as u8,
        _ => 3,
    }
}

impl RawMessage {
    /// Lenient read of one generator-produced message object.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let pick = |keys: &[&str]| {
            keys.iter()
                .find_map(|k| obj.get(*k).and_then(value_to_text))
                .unwrap_or_default()
        };
        let content = pick(CONTENT_KEYS);
        if content.trim().is_empty() {
            return None;
        }
        Some(Self {
            role: pick(ROLE_KEYS),
            turn: coerce_turn(obj.get("turn")),
            content: content.trim().to_string(),
            emotion: obj
                .get("emotion")
                .and_then(value_to_text)
                .filter(|s| !s.trim().is_empty()),
            intensity: obj.get("intensity").filter(|v| !v.is_null()).map(coerce_scale),
        })
    }

    pub fn new(role: impl Into<String>, turn: u32, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            turn,
            content: content.into(),
            emotion: None,
            intensity: None,
        }
    }
}

/// Pulls the message list out of whatever shape the parser model returned.
///
/// Arrays are used directly. Objects contribute their `messages` or `dialogue`
/// field, falling back to the first array-valued field.
pub fn raw_messages_from_value(value: &Value) -> Vec<RawMessage> {
    let list = match value {
        Value::Array(items) => Some(items),
        Value::Object(map) => map
            .get("messages")
            .or_else(|| map.get("dialogue"))
            .and_then(Value::as_array)
            .or_else(|| map.values().find_map(Value::as_array)),
        _ => None,
    };
    list.map(|items| items.iter().filter_map(RawMessage::from_value).collect())
        .unwrap_or_default()
}

/// Resolves every raw label to a [`Role`] in transcript order.
pub fn resolve_messages(
    raw: Vec<RawMessage>,
    aliases: &RoleAliases,
    names: &SpeakerNames,
) -> Vec<Message> {
    let mut out: Vec<Message> = Vec::with_capacity(raw.len());
    let (mut clients, mut agents) = (0usize, 0usize);

    for item in raw {
        let role = aliases
            .resolve(&item.role)
            .or_else(|| names.resolve(&item.role))
            .unwrap_or_else(|| {
                let voted = vote_role(&item.role, out.last().map(|m| m.role), clients, agents);
                debug!(label = %item.role, role = %voted, "Role resolved by vote");
                voted
            });
        match role {
            Role::Client => clients += 1,
            Role::Agent => agents += 1,
        }
        out.push(Message {
            role,
            turn: item.turn.max(1),
            content: item.content,
            emotion: item.emotion,
            intensity: item.intensity,
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_alias_table() {
        let aliases = RoleAliases::default();
        assert_eq!(aliases.resolve("Customer"), Some(Role::Client));
        assert_eq!(aliases.resolve("caller"), Some(Role::Client));
        assert_eq!(aliases.resolve("rep"), Some(Role::Agent));
        assert_eq!(aliases.resolve("Bot"), Some(Role::Agent));
        assert_eq!(aliases.resolve("agent_2"), Some(Role::Agent));
        assert_eq!(aliases.resolve("Maya"), None);
    }

    #[test]
    fn test_character_names_resolve() {
        let names = SpeakerNames::new("Aurora", "Maya");
        let raw = vec![RawMessage::new("Aurora", 1, "hi"), RawMessage::new("maya", 1, "hello")];
        let msgs = resolve_messages(raw, &RoleAliases::default(), &names);
        assert_eq!(msgs[0].role, Role::Client);
        assert_eq!(msgs[1].role, Role::Agent);
    }

    #[test]
    fn test_vote_for_unknown_labels() {
        let raw = vec![
            RawMessage::new("X", 1, "first"),
            RawMessage::new("Y", 1, "second"),
            RawMessage::new("Z", 2, "third"),
        ];
        let msgs = resolve_messages(raw, &RoleAliases::default(), &SpeakerNames::default());
        let roles: Vec<Role> = msgs.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::Client, Role::Agent, Role::Client]);
    }

    #[test]
    fn test_lenient_fields() {
        let v = json!({"role": "Customer", "turn": "2.0", "content": "  hi  ", "intensity": "4/5"});
        let raw = RawMessage::from_value(&v).unwrap();
        assert_eq!(raw.turn, 2);
        assert_eq!(raw.content, "hi");
        assert_eq!(raw.intensity, Some(4));

        let v = json!({"speaker": "agent", "turn": "soon", "text": "ok"});
        let raw = RawMessage::from_value(&v).unwrap();
        assert_eq!(raw.turn, 1);
        assert_eq!(raw.role, "agent");
        assert!(RawMessage::from_value(&json!({"role": "client", "content": ""})).is_none());
    }

    #[test]
    fn test_scale_clamps() {
        assert_eq!(coerce_scale(&json!(9)), 5);
        assert_eq!(coerce_scale(&json!("0")), 1);
        assert_eq!(coerce_scale(&json!("high")), 3);
    }

    #[test]
    fn test_message_list_shapes() {
        let arr = json!([{"role": "client", "content": "a"}]);
        assert_eq!(raw_messages_from_value(&arr).len(), 1);
        let wrapped = json!({"dialogue": [{"role": "client", "content": "a"}, {"role": "agent", "content": "b"}]});
        assert_eq!(raw_messages_from_value(&wrapped).len(), 2);
        let other = json!({"conversation": [{"role": "client", "content": "a"}]});
        assert_eq!(raw_messages_from_value(&other).len(), 1);
        assert!(raw_messages_from_value(&json!("text")).is_empty());
    }
}
