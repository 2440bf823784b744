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

//! Register shifts: full lowercasing and caps bursts.

use rand::Rng;

use super::chance;

/// Arc position before which a caps burst is fully suppressed.
pub const EARLY_ARC: f64 = 0.33;
/// Arc position from which a caps burst survives untouched.
pub const LATE_ARC: f64 = 0.66;
const MID_SUPPRESSION_RATE: f64 = 0.40;
const WORD_EDGE_PUNCT: &[char] = &['.', ',', '!', '?', ';', ':'];

/// Position of `turn` in the dialogue, normalized into `0.0..=1.0`.
pub fn arc_position(turn: u32, total_turns: u32) -> f64 {
    let span = total_turns.saturating_sub(1).max(1);
    f64::from(turn.saturating_sub(1)) / f64::from(span)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Register {
    /// Words that stay uppercase through suppression.
    pub keep_caps: Vec<String>,
}

impl Default for Register {
    fn default() -> Self {
        Self {
            keep_caps: ["WTF", "BS", "ASAP", "FYI", "OK", "OMG"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl Register {
    pub fn lowercase(text: &str) -> String {
        text.to_lowercase()
    }

    /// Uppercases one random word, then suppresses caps by arc position.
    pub fn caps_burst<R: Rng>(&self, text: &str, arc: f64, rng: &mut R) -> Option<String> {
        let mut words: Vec<String> = text.split_whitespace().map(str::to_string).collect();
        if words.is_empty() {
            return None;
        }
        let idx = rng.gen_range(0..words.len());
        words[idx] = words[idx].to_uppercase();
        Some(self.suppress(&words.join(" "), arc, rng))
    }

    /// Early in the dialogue every word outside the whitelist is lowercased;
    /// in the middle each such word is lowercased with probability 0.4.
    pub fn suppress<R: Rng>(&self, text: &str, arc: f64, rng: &mut R) -> String {
        if arc >= LATE_ARC {
            return text.to_string();
        }
        text.split_whitespace()
            .map(|word| {
                let bare = word.trim_matches(WORD_EDGE_PUNCT);
                if self.keep_caps.iter().any(|k| k == bare) {
                    word.to_string()
                } else if arc < EARLY_ARC || chance(rng, MID_SUPPRESSION_RATE) {
                    word.to_lowercase()
                } else {
                    word.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_arc_position() {
        assert_eq!(arc_position(1, 5), 0.0);
        assert_eq!(arc_position(5, 5), 1.0);
        assert_eq!(arc_position(3, 5), 0.5);
        assert_eq!(arc_position(1, 1), 0.0);
    }

    #[test]
    fn test_early_suppression_keeps_whitelist() {
        let reg = Register::default();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let out = reg.suppress("I need this ASAP, WTF IS GOING ON", 0.1, &mut rng);
        assert_eq!(out, "i need this ASAP, WTF is going on");
    }

    #[test]
    fn test_late_burst_survives() {
        let reg = Register::default();
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let out = reg.caps_burst("where is my money", 0.9, &mut rng).unwrap();
        assert_eq!(out.split(' ').filter(|w| w.chars().all(char::is_uppercase)).count(), 1);
        assert_eq!(out.to_lowercase(), "where is my money");
    }

    #[test]
    fn test_empty_text_has_no_burst() {
        let reg = Register::default();
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        assert!(reg.caps_burst("   ", 0.9, &mut rng).is_none());
    }
}
