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

//! Behavioural quirks for agent messages. Agents never get typos.

use rand::seq::SliceRandom;
use rand::Rng;

use super::{chance, lowercase_first};
use crate::models::AgentArchetype;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuirkKind {
    DropLastSentence,
    HesitationPrepend,
    MultitaskInterrupt,
}

impl QuirkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuirkKind::DropLastSentence => "drop_last_sentence",
            QuirkKind::HesitationPrepend => "hesitation_prepend",
            QuirkKind::MultitaskInterrupt => "multitask_interrupt",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuirkRule {
    pub archetype: AgentArchetype,
    pub kind: QuirkKind,
    pub probability: f64,
    /// Prefix pool for the prepend quirks.
    pub prefixes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgentQuirks {
    pub rules: Vec<QuirkRule>,
}

impl Default for AgentQuirks {
    fn default() -> Self {
        let prefixes = |xs: &[&str]| xs.iter().map(|s| s.to_string()).collect();
        Self {
            rules: vec![
                QuirkRule {
                    archetype: AgentArchetype::BurnedOut,
                    kind: QuirkKind::DropLastSentence,
                    probability: 0.35,
                    prefixes: Vec::new(),
                },
                QuirkRule {
                    archetype: AgentArchetype::NewbieOverwhelmed,
                    kind: QuirkKind::HesitationPrepend,
                    probability: 0.40,
                    prefixes: prefixes(&["Um, ", "Uh, ", "So, ", "Right, "]),
                },
                QuirkRule {
                    archetype: AgentArchetype::StressedMultitask,
                    kind: QuirkKind::MultitaskInterrupt,
                    probability: 0.30,
                    prefixes: prefixes(&["Quick update: ", "Just a sec, ", "Checking now, ", "On it, "]),
                },
            ],
        }
    }
}

/// Splits after `.`, `!` or `?` when whitespace follows.
pub fn sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((_, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?') {
            if let Some(&(j, next)) = chars.peek() {
                if next.is_whitespace() {
                    out.push(&text[start..j]);
                    start = j;
                }
            }
        }
    }
    out.push(&text[start..]);
    out.into_iter().map(str::trim).filter(|s| !s.is_empty()).collect()
}

impl AgentQuirks {
    /// Applies the archetype's quirk. Returns the new text and the quirk that
    /// fired, or `None` when nothing changed.
    pub fn apply<R: Rng>(
        &self,
        text: &str,
        archetype: AgentArchetype,
        rng: &mut R,
    ) -> Option<(String, QuirkKind)> {
        let rule = self.rules.iter().find(|r| r.archetype == archetype)?;
        if !chance(rng, rule.probability) {
            return None;
        }
        let out = match rule.kind {
            QuirkKind::DropLastSentence => {
                let parts = sentences(text);
                if parts.len() < 2 {
                    return None;
                }
                parts[..parts.len() - 1].join(" ")
            }
            QuirkKind::HesitationPrepend | QuirkKind::MultitaskInterrupt => {
                if text.is_empty() {
                    return None;
                }
                let prefix = rule.prefixes.choose(rng)?;
                format!("{prefix}{}", lowercase_first(text))
            }
        };
        Some((out, rule.kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_sentences() {
        assert_eq!(
            sentences("I checked. It shipped! Anything else?"),
            vec!["I checked.", "It shipped!", "Anything else?"]
        );
        assert_eq!(sentences("v1.2 is out"), vec!["v1.2 is out"]);
    }

    #[test]
    fn test_archetypes_without_quirk_are_untouched() {
        let quirks = AgentQuirks::default();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        for _ in 0..20 {
            assert!(quirks.apply("Hello. Bye.", AgentArchetype::EagerHelper, &mut rng).is_none());
        }
    }

    #[test]
    fn test_burned_out_drops_last_sentence() {
        let quirks = AgentQuirks::default();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let fired = (0..50)
            .filter_map(|_| {
                quirks.apply("I looked. Nothing I can do.", AgentArchetype::BurnedOut, &mut rng)
            })
            .collect::<Vec<_>>();
        assert!(!fired.is_empty());
        for (text, kind) in fired {
            assert_eq!(kind, QuirkKind::DropLastSentence);
            assert_eq!(text, "I looked.");
        }
    }

    #[test]
    fn test_newbie_hesitates() {
        let quirks = AgentQuirks::default();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let (text, _) = (0..50)
            .find_map(|_| quirks.apply("Let me check.", AgentArchetype::NewbieOverwhelmed, &mut rng))
            .unwrap();
        assert!(text.ends_with("let me check."));
        assert!(["Um, ", "Uh, ", "So, ", "Right, "].iter().any(|p| text.starts_with(p)));
    }
}
