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

//! Structural transforms: message splits, punctuation drops and ellipses.

use once_cell::sync::Lazy;
use regex::Regex;
use rand::seq::SliceRandom;
use rand::Rng;

use super::{chance, lowercase_first, replace_first_ignore_case};
use crate::models::{Outcome, Style};

static SENTENCE_BREAK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.!?]\s+").expect("valid sentence break regex"));
static CLAUSE_BREAK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r",\s+").expect("valid clause break regex"));

const MIN_CLAUSE_WORDS: usize = 5;
const PUNCT_DROP_RATE: f64 = 0.40;
const TRAILING_PUNCT: &[char] = &['.', '!', '?', ',', ';'];

/// Splits a message into two fragments.
///
/// Sentence boundaries are preferred; a comma boundary qualifies only when
/// both sides have at least five words. Returns the text unchanged as a
/// single fragment when no boundary qualifies. The second fragment follows
/// the first one's lowercase start.
pub fn split<R: Rng>(text: &str, rng: &mut R) -> Vec<String> {
    let sentence_breaks: Vec<usize> = SENTENCE_BREAK_RE.find_iter(text).map(|m| m.end()).collect();
    let candidates = if sentence_breaks.is_empty() {
        CLAUSE_BREAK_RE
            .find_iter(text)
            .filter(|m| {
                text[..m.start()].split_whitespace().count() >= MIN_CLAUSE_WORDS
                    && text[m.end()..].split_whitespace().count() >= MIN_CLAUSE_WORDS
            })
            .map(|m| m.end())
            .collect()
    } else {
        sentence_breaks
    };

    let Some(&at) = candidates.choose(rng) else {
        return vec![text.to_string()];
    };
    let first = text[..at].trim_end();
    let second = text[at..].trim();
    if first.is_empty() || second.is_empty() {
        return vec![text.to_string()];
    }

    let second = if first.starts_with(char::is_lowercase) {
        lowercase_first(second)
    } else {
        second.to_string()
    };
    vec![first.to_string(), second]
}

/// Drops trailing punctuation four times out of ten.
pub fn punct_drop<R: Rng>(text: &str, rng: &mut R) -> Option<String> {
    if !chance(rng, PUNCT_DROP_RATE) {
        return None;
    }
    let out = text.trim_end_matches(TRAILING_PUNCT);
    (out != text).then(|| out.to_string())
}

/// Phrase to phrase-with-ellipsis tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EllipsisTables {
    pub by_style: Vec<(Style, Vec<(String, String)>)>,
    /// Used for unresolved-passive dialogues whose style has no table.
    pub hidden_dissatisfaction: Vec<(String, String)>,
}

fn trailing(phrases: &[&str]) -> Vec<(String, String)> {
    phrases.iter().map(|p| (p.to_string(), format!("{p}..."))).collect()
}

impl Default for EllipsisTables {
    fn default() -> Self {
        let mut passive = trailing(&[
            "okay",
            "sure",
            "fine",
            "thank you",
            "I see",
            "I understand",
            "noted",
            "alright",
        ]);
        passive.push(("seriously?".into(), "seriously..?".into()));
        passive.push(("right?".into(), "right..?".into()));

        Self {
            by_style: vec![(Style::PassiveAggressive, passive)],
            hidden_dissatisfaction: trailing(&[
                "alright",
                "understood",
                "I'll wait",
                "I'll check",
                "okay",
                "thanks",
                "I guess",
            ]),
        }
    }
}

impl EllipsisTables {
    fn table_for(&self, style: Style, outcome: Outcome) -> &[(String, String)] {
        match self.by_style.iter().find(|(s, t)| *s == style && !t.is_empty()) {
            Some((_, table)) => table,
            None if outcome == Outcome::UnresolvedPassive => &self.hidden_dissatisfaction,
            None => &[],
        }
    }

    /// Applies the first matching entry, at most once per message.
    pub fn apply(&self, text: &str, style: Style, outcome: Outcome) -> Option<String> {
        self.table_for(style, outcome)
            .iter()
            .find_map(|(from, to)| replace_first_ignore_case(text, from, to))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_split_at_sentence() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let parts = split("I paid twice. Nobody answered my email.", &mut rng);
        assert_eq!(parts, vec!["I paid twice.", "Nobody answered my email."]);
    }

    #[test]
    fn test_split_inherits_lowercase() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let parts = split("i paid twice. Nobody answered", &mut rng);
        assert_eq!(parts, vec!["i paid twice.", "nobody answered"]);
    }

    #[test]
    fn test_split_clause_needs_five_words_each_side() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let short = "I paid, nobody answered";
        assert_eq!(split(short, &mut rng), vec![short.to_string()]);

        let long = "I paid for the order twice, and nobody at your company answered me";
        let parts = split(long, &mut rng);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0], "I paid for the order twice,");
    }

    #[test]
    fn test_split_trailing_boundary_is_not_a_split() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        assert_eq!(split("Just one sentence. ", &mut rng).len(), 1);
        assert_eq!(split("no boundary at all", &mut rng).len(), 1);
    }

    #[test]
    fn test_ellipsis_once_case_insensitive() {
        let tables = EllipsisTables::default();
        let out = tables
            .apply("Okay fine, thanks", Style::PassiveAggressive, Outcome::Conflict)
            .unwrap();
        assert_eq!(out, "Okay... fine, thanks");
    }

    #[test]
    fn test_hidden_dissatisfaction_only_for_unresolved_passive() {
        let tables = EllipsisTables::default();
        assert_eq!(
            tables
                .apply("Alright, I'll wait", Style::Casual, Outcome::UnresolvedPassive)
                .as_deref(),
            Some("Alright..., I'll wait")
        );
        assert!(tables.apply("Alright", Style::Casual, Outcome::ResolvedQuick).is_none());
    }

    #[test]
    fn test_punct_drop_eventually_fires() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let hits = (0..100)
            .filter_map(|_| punct_drop("Fine!!", &mut rng))
            .collect::<Vec<_>>();
        assert!(!hits.is_empty());
        assert!(hits.iter().all(|h| h == "Fine"));
    }
}
