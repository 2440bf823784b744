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

//! Discourse transforms: filler prepends and slang substitution.

use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashMap;

use super::banks::CorpusBanks;
use super::{lowercase_first, replace_first_ignore_case};
use crate::models::Style;

/// Per-dialogue acronym usage. Created once per dialogue and threaded through
/// the message loop in transcript order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlangUsage {
    counts: HashMap<String, u32>,
}

impl SlangUsage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn uses(&self, acronym: &str) -> u32 {
        self.counts.get(acronym).copied().unwrap_or(0)
    }

    fn record(&mut self, acronym: &str) {
        *self.counts.entry(acronym.to_string()).or_insert(0) += 1;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlangTables {
    /// `(expansion, acronym)` pairs per style.
    pub by_style: Vec<(Style, Vec<(String, String)>)>,
    /// Uses allowed per dialogue, keyed by lowercase acronym.
    pub max_uses: HashMap<String, u32>,
    pub default_max_uses: u32,
}

fn pairs(xs: &[(&str, &str)]) -> Vec<(String, String)> {
    xs.iter().map(|(a, b)| (a.to_string(), b.to_string())).collect()
}

impl Default for SlangTables {
    fn default() -> Self {
        let by_style = vec![
            (
                Style::Aggressive,
                pairs(&[
                    ("What the heck", "wtf"),
                    ("What the hell", "wtf"),
                    ("This is nonsense", "this is bs"),
                    ("as soon as possible", "asap"),
                    ("seriously", "srsly"),
                    ("please", "pls"),
                    ("to be honest", "tbh"),
                ]),
            ),
            (
                Style::Casual,
                pairs(&[
                    ("laughing out loud", "lol"),
                    ("oh my god", "omg"),
                    ("to be honest", "tbh"),
                    ("as soon as possible", "asap"),
                    ("please", "pls"),
                    ("because", "bc"),
                    ("though", "tho"),
                    ("I don't know", "idk"),
                    ("by the way", "btw"),
                ]),
            ),
            (
                Style::PassiveAggressive,
                pairs(&[
                    ("to be honest", "tbh"),
                    ("by the way", "btw"),
                    ("I suppose", "ig"),
                ]),
            ),
        ];
        let max_uses = [
            ("lol", 2),
            ("omg", 2),
            ("tbh", 1),
            ("wtf", 3),
            ("asap", 2),
            ("pls", 2),
            ("bc", 2),
            ("tho", 2),
            ("idk", 2),
            ("btw", 2),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        Self {
            by_style,
            max_uses,
            default_max_uses: 99,
        }
    }
}

impl SlangTables {
    fn cap(&self, acronym: &str) -> u32 {
        self.max_uses
            .get(&acronym.to_lowercase())
            .copied()
            .unwrap_or(self.default_max_uses)
    }

    fn style_pairs(&self, style: Style) -> &[(String, String)] {
        self.by_style
            .iter()
            .find(|(s, _)| *s == style)
            .map(|(_, p)| p.as_slice())
            .unwrap_or(&[])
    }

    /// Replaces the first expansion found with its acronym, respecting caps.
    ///
    /// Styles with their own table try its pairs in shuffled order; other
    /// styles draw one weighted entry from the slang bank.
    pub fn substitute<R: Rng>(
        &self,
        text: &str,
        style: Style,
        banks: &CorpusBanks,
        usage: &mut SlangUsage,
        rng: &mut R,
    ) -> Option<String> {
        let table = self.style_pairs(style);
        if !table.is_empty() {
            let mut order: Vec<&(String, String)> = table.iter().collect();
            order.shuffle(rng);
            for (expansion, acronym) in order {
                if usage.uses(acronym) >= self.cap(acronym) {
                    continue;
                }
                if let Some(out) = replace_first_ignore_case(text, expansion, acronym) {
                    usage.record(acronym);
                    return Some(out);
                }
            }
            return None;
        }

        let entry = banks.pick_slang(rng)?;
        if usage.uses(&entry.acronym) >= self.cap(&entry.acronym) {
            return None;
        }
        let out = replace_first_ignore_case(text, &entry.expansion, &entry.acronym)?;
        usage.record(&entry.acronym);
        Some(out)
    }
}

/// Prepends a weighted filler word: `"um, so the order..."`.
pub fn filler_prepend<R: Rng>(text: &str, banks: &CorpusBanks, rng: &mut R) -> Option<String> {
    if text.is_empty() {
        return None;
    }
    let filler = banks.pick_filler(rng)?;
    Some(format!("{filler}, {}", lowercase_first(text)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_filler_lowercases_first_char() {
        let banks = CorpusBanks {
            slang: vec![],
            filled_pauses: vec![super::super::banks::FillerEntry {
                word: "um".into(),
                prob: 1.0,
            }],
        };
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        assert_eq!(
            filler_prepend("Where is it?", &banks, &mut rng).as_deref(),
            Some("um, where is it?")
        );
        assert!(filler_prepend("", &banks, &mut rng).is_none());
        assert!(filler_prepend("x", &CorpusBanks::empty(), &mut rng).is_none());
    }

    #[test]
    fn test_style_slang_respects_cap() {
        let tables = SlangTables::default();
        let banks = CorpusBanks::empty();
        let mut usage = SlangUsage::new();
        let mut rng = ChaCha8Rng::seed_from_u64(4);

        let first = tables
            .substitute("To be honest it broke", Style::PassiveAggressive, &banks, &mut usage, &mut rng)
            .unwrap();
        assert_eq!(first, "Tbh it broke");
        assert_eq!(usage.uses("tbh"), 1);

        // tbh is capped at one use per dialogue
        let second = tables.substitute(
            "to be honest it broke again",
            Style::PassiveAggressive,
            &banks,
            &mut usage,
            &mut rng,
        );
        assert!(second.is_none());
    }

    #[test]
    fn test_formal_uses_bank() {
        let tables = SlangTables::default();
        let banks = CorpusBanks {
            slang: vec![super::super::banks::SlangEntry {
                acronym: "pls".into(),
                expansion: "please".into(),
                weight: 1.0,
            }],
            filled_pauses: vec![],
        };
        let mut usage = SlangUsage::new();
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let out = tables.substitute("Please advise", Style::Formal, &banks, &mut usage, &mut rng);
        assert_eq!(out.as_deref(), Some("Pls advise"));
        assert!(tables
            .substitute("Please advise", Style::Formal, &CorpusBanks::empty(), &mut usage, &mut rng)
            .is_none());
    }
}
