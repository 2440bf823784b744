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
use std::collections::HashSet;
use std::fmt;
use tracing::debug;

use crate::errors::NormalizeError;
use crate::models::{Message, Outcome, Role, ScenarioParams};

/// Characters of content that take part in duplicate detection.
pub const DEDUP_PREFIX_CHARS: usize = 80;

/// Which generation path produced the raw messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GenerationVariant {
    /// Prose story parsed into paired turns.
    Story,
    /// Scene plan voiced scene by scene.
    Scenes,
    /// One-shot numbered template.
    #[default]
    Simple,
}

impl GenerationVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationVariant::Story => "story",
            GenerationVariant::Scenes => "scenes",
            GenerationVariant::Simple => "simple",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "story" => Some(GenerationVariant::Story),
            "scenes" | "scene" => Some(GenerationVariant::Scenes),
            "simple" => Some(GenerationVariant::Simple),
            _ => None,
        }
    }

    /// Story prompts ask for paired turns; the numbered templates are per message.
    pub fn turn_numbering(&self) -> TurnNumbering {
        match self {
            GenerationVariant::Story => TurnNumbering::Paired,
            GenerationVariant::Scenes | GenerationVariant::Simple => TurnNumbering::Positional,
        }
    }

    pub fn collapses_trailing_agents(&self) -> bool {
        matches!(self, GenerationVariant::Scenes)
    }
}

impl fmt::Display for GenerationVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnNumbering {
    /// Turn increments on each client message; agents share the preceding client's turn.
    Paired,
    /// Turn is the 1-based position in the sequence.
    Positional,
}

/// Exit markers for abandoned conversations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndingRules {
    pub exit_phrases: Vec<String>,
}

impl Default for EndingRules {
    fn default() -> Self {
        Self {
            exit_phrases: [
                "forget it",
                "forget this",
                "i'm done",
                "this is useless",
                "goodbye",
                "unbelievable",
                "waste of time",
            ]
            .iter()
            .map(|s| (*s).to_string())
            .collect(),
        }
    }
}

impl EndingRules {
    pub fn contains_exit_phrase(&self, content: &str) -> bool {
        let lower = content.to_lowercase();
        self.exit_phrases.iter().any(|p| lower.contains(p.as_str()))
    }

    /// Sentence-cased exit phrase picked by `seed`.
    pub fn exit_sentence(&self, seed: u64) -> String {
        if self.exit_phrases.is_empty() {
            return "Forget it.".to_string();
        }
        let phrase = &self.exit_phrases[(seed % self.exit_phrases.len() as u64) as usize];
        format!("{}.", capitalize_first(phrase))
    }
}

pub(crate) fn capitalize_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Drops every message after the client count exceeds `target`.
pub fn trim_to_target(messages: Vec<Message>, target: usize) -> Vec<Message> {
    let mut clients = 0usize;
    let mut out = Vec::with_capacity(messages.len());
    for msg in messages {
        if msg.role == Role::Client {
            clients += 1;
        }
        if clients > target {
            break;
        }
        out.push(msg);
    }
    out
}

/// Drops messages whose role and content prefix repeat an earlier message.
pub fn deduplicate(messages: Vec<Message>) -> Vec<Message> {
    let mut seen: HashSet<(Role, String)> = HashSet::new();
    messages
        .into_iter()
        .filter(|m| {
            let prefix: String = m.content.trim().chars().take(DEDUP_PREFIX_CHARS).collect();
            seen.insert((m.role, prefix))
        })
        .collect()
}

pub fn renumber(messages: &mut [Message], numbering: TurnNumbering) {
    match numbering {
        TurnNumbering::Positional => {
            for (i, msg) in messages.iter_mut().enumerate() {
                msg.turn = i as u32 + 1;
            }
        }
        TurnNumbering::Paired => {
            let mut turn = 0u32;
            for msg in messages.iter_mut() {
                if msg.role == Role::Client {
                    turn += 1;
                }
                msg.turn = turn.max(1);
            }
        }
    }
}

/// Drops the final message while the last two are both agent-authored.
pub fn collapse_trailing_agents(messages: &mut Vec<Message>) {
    while messages.len() >= 2
        && messages[messages.len() - 1].role == Role::Agent
        && messages[messages.len() - 2].role == Role::Agent
    {
        messages.pop();
    }
}

/// Makes a ragequit dialogue end on a client message carrying an exit marker.
pub fn enforce_ending(messages: &mut Vec<Message>, outcome: Outcome, rules: &EndingRules, seed: u64) {
    if outcome != Outcome::UnresolvedRagequit {
        return;
    }
    while messages.last().is_some_and(|m| m.role == Role::Agent) {
        messages.pop();
    }
    if let Some(last) = messages.last_mut() {
        if !rules.contains_exit_phrase(&last.content) {
            let trimmed = last.content.trim_end();
            last.content = format!("{trimmed} {}", rules.exit_sentence(seed));
        }
    }
}

/// Checks the sequence-level invariants every dialogue must satisfy.
pub fn validate(messages: &[Message]) -> Result<(), NormalizeError> {
    if messages.len() < 2 {
        return Err(NormalizeError::SequenceTooShort {
            count: messages.len(),
        });
    }
    for role in [Role::Client, Role::Agent] {
        if !messages.iter().any(|m| m.role == role) {
            return Err(NormalizeError::MissingRole(role));
        }
    }
    Ok(())
}

/// Stock assistant openers that make agent lines read like a chatbot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotOpeners {
    pub phrases: Vec<String>,
    /// The remainder must be longer than this for the opener to be removed.
    pub min_remainder_chars: usize,
}

impl Default for BotOpeners {
    fn default() -> Self {
        Self {
            phrases: [
                "i apologize for",
                "i'm sorry to hear",
                "i'd be happy to",
                "certainly!",
                "of course!",
                "thank you for your patience",
                "i sincerely apologize",
                "i completely understand your frustration",
                "i know how frustrating",
                "i understand how frustrating",
                "i can see that",
                "that must be",
                "we'll get this sorted",
                "i completely understand",
                "i understand your frustration",
                "i apologize for any",
                "let me help you with",
                "i would be happy",
                "absolutely!",
                "no problem!",
            ]
            .iter()
            .map(|s| (*s).to_string())
            .collect(),
            min_remainder_chars: 10,
        }
    }
}

impl BotOpeners {
    /// Removes the first matching opener from one agent line.
    pub fn strip(&self, content: &str) -> Option<String> {
        let lower: Vec<char> = content.chars().flat_map(char::to_lowercase).collect();
        if lower.len() != content.chars().count() {
            return None;
        }
        let phrase = self.phrases.iter().find(|p| {
            let p: Vec<char> = p.chars().collect();
            lower.starts_with(&p)
        })?;
        let rest: String = content.chars().skip(phrase.chars().count()).collect();
        let rest = rest.trim_start_matches([',', ' ', '.']);
        (rest.chars().count() > self.min_remainder_chars).then(|| capitalize_first(rest))
    }

    /// Applies [`BotOpeners::strip`] to every agent message; returns how many changed.
    pub fn strip_all(&self, messages: &mut [Message]) -> usize {
        let mut changed = 0;
        for msg in messages.iter_mut().filter(|m| m.role == Role::Agent) {
            if let Some(stripped) = self.strip(&msg.content) {
                msg.content = stripped;
                changed += 1;
            }
        }
        changed
    }
}

/// Repairs raw message sequences for one generation variant.
#[derive(Debug, Clone, Default)]
pub struct MessageNormalizer {
    variant: GenerationVariant,
    rules: EndingRules,
}

impl MessageNormalizer {
    pub fn new(variant: GenerationVariant, rules: EndingRules) -> Self {
        Self { variant, rules }
    }

    pub fn variant(&self) -> GenerationVariant {
        self.variant
    }

    pub fn rules(&self) -> &EndingRules {
        &self.rules
    }

    pub fn normalize(
        &self,
        raw: Vec<Message>,
        params: &ScenarioParams,
    ) -> Result<Vec<Message>, NormalizeError> {
        let incoming = raw.len();
        let trimmed = trim_to_target(raw, params.target_message_count);
        let mut messages = deduplicate(trimmed);
        renumber(&mut messages, self.variant.turn_numbering());
        if self.variant.collapses_trailing_agents() {
            collapse_trailing_agents(&mut messages);
        }
        enforce_ending(&mut messages, params.outcome, &self.rules, params.seed);
        validate(&messages)?;

        debug!(
            variant = %self.variant,
            incoming = incoming,
            kept = messages.len(),
            "Messages normalized"
        );
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seq(roles: &str) -> Vec<Message> {
        roles
            .chars()
            .enumerate()
            .map(|(i, c)| {
                let role = if c == 'c' { Role::Client } else { Role::Agent };
                Message::new(role, 1, format!("message number {i}"))
            })
            .collect()
    }

    #[test]
    fn test_trim_counts_clients_only() {
        let out = trim_to_target(seq("cacaca"), 2);
        assert_eq!(out.len(), 4);
        assert_eq!(out.last().unwrap().role, Role::Agent);
    }

    #[test]
    fn test_dedupe_uses_role_and_prefix() {
        let long = "x".repeat(100);
        let msgs = vec![
            Message::client(1, format!("{long}a")),
            Message::client(1, format!("  {long}b")),
            Message::agent(1, format!("{long}a")),
        ];
        let out = deduplicate(msgs);
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].role, Role::Agent);
    }

    #[test]
    fn test_paired_and_positional_numbering() {
        let mut msgs = seq("acaca");
        renumber(&mut msgs, TurnNumbering::Paired);
        let turns: Vec<u32> = msgs.iter().map(|m| m.turn).collect();
        assert_eq!(turns, vec![1, 1, 1, 2, 2]);

        renumber(&mut msgs, TurnNumbering::Positional);
        let turns: Vec<u32> = msgs.iter().map(|m| m.turn).collect();
        assert_eq!(turns, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_collapse_trailing_agents() {
        let mut msgs = seq("caaa");
        collapse_trailing_agents(&mut msgs);
        assert_eq!(msgs.len(), 2);
    }

    #[test]
    fn test_exit_sentence_is_deterministic() {
        let rules = EndingRules::default();
        assert_eq!(rules.exit_sentence(0), "Forget it.");
        assert_eq!(rules.exit_sentence(2), "I'm done.");
        assert_eq!(rules.exit_sentence(7), "Forget it.");
        assert_eq!(rules.exit_sentence(13), "Waste of time.");
    }

    #[test]
    fn test_ending_keeps_existing_marker() {
        let rules = EndingRules::default();
        let mut msgs = vec![
            Message::client(1, "hi"),
            Message::agent(1, "hello"),
            Message::client(2, "This is a WASTE OF TIME"),
            Message::agent(2, "sorry"),
        ];
        enforce_ending(&mut msgs, Outcome::UnresolvedRagequit, &rules, 0);
        assert_eq!(msgs.len(), 3);
        assert_eq!(msgs[2].content, "This is a WASTE OF TIME");
    }

    #[test]
    fn test_bot_openers() {
        let openers = BotOpeners::default();
        assert_eq!(
            openers.strip("I apologize for the delay, your refund is on its way.").as_deref(),
            Some("The delay, your refund is on its way.")
        );
        assert_eq!(openers.strip("Certainly! ok."), None);
        assert_eq!(openers.strip("Your order shipped today."), None);

        let mut msgs = vec![
            Message::client(1, "I'd be happy to yell at someone today"),
            Message::agent(1, "I'd be happy to check the tracking number for you."),
        ];
        assert_eq!(openers.strip_all(&mut msgs), 1);
        assert_eq!(msgs[0].content, "I'd be happy to yell at someone today");
        assert_eq!(msgs[1].content, "Check the tracking number for you.");
    }

    #[test]
    fn test_validate_roles() {
        assert_eq!(
            validate(&seq("cc")),
            Err(NormalizeError::MissingRole(Role::Agent))
        );
        assert_eq!(
            validate(&seq("c")),
            Err(NormalizeError::SequenceTooShort { count: 1 })
        );
        assert!(validate(&seq("ca")).is_ok());
    }
}
