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

//! Orthographic typo subtypes.
//!
//! Per-word techniques fire on each eligible word with an inner probability
//! of one half. Word lengths are counted in characters.

use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashMap;

use super::chance;
use super::profiles::TypoKind;

const PER_WORD_RATE: f64 = 0.50;
const CONFUSABLE_RATE: f64 = 0.30;

#[derive(Debug, Clone, PartialEq)]
pub struct TypoTables {
    /// QWERTY neighbours per lowercase key.
    pub keyboard: HashMap<char, Vec<char>>,
    /// Whole-word confusions keyed by lowercase word.
    pub confusables: HashMap<String, Vec<String>>,
}

impl Default for TypoTables {
    fn default() -> Self {
        let keyboard = [
            ('a', "sqw"),
            ('b', "vghn"),
            ('c', "xdfv"),
            ('d', "serfcx"),
            ('e', "wrds"),
            ('f', "drtgvc"),
            ('g', "ftyhbv"),
            ('h', "gyujnb"),
            ('i', "uokj"),
            ('j', "huikmn"),
            ('k', "jiolm"),
            ('l', "kop"),
            ('m', "njk"),
            ('n', "bhjm"),
            ('o', "iplk"),
            ('p', "ol"),
            ('r', "etfd"),
            ('s', "awedxz"),
            ('t', "rygf"),
            ('u', "yijh"),
            ('v', "cfgb"),
            ('w', "qesa"),
            ('x', "zsdc"),
            ('y', "tuhg"),
            ('z', "asx"),
        ]
        .into_iter()
        .map(|(k, v)| (k, v.chars().collect()))
        .collect();

        let confusables = [
            ("the", ["teh", "hte"]),
            ("have", ["ahve", "hvae"]),
            ("that", ["taht", "htat"]),
            ("your", ["yuor", "yoru"]),
            ("with", ["wiht", "iwth"]),
            ("just", ["jsut", "ujst"]),
            ("what", ["waht", "hwat"]),
            ("when", ["wehn", "whn"]),
            ("they", ["tehy", "thye"]),
            ("been", ["bene", "bnee"]),
            ("this", ["tihs", "thsi"]),
            ("from", ["form", "fomr"]),
            ("about", ["aobut", "abotu"]),
            ("charged", ["chraged", "charegd"]),
            ("payment", ["paymnet", "pyament"]),
            ("refund", ["refudn", "rfund"]),
            ("account", ["acocunt", "accoutn"]),
            ("problem", ["problme", "probelm"]),
            ("working", ["workign", "wrking"]),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.iter().map(|s| s.to_string()).collect()))
        .collect();

        Self {
            keyboard,
            confusables,
        }
    }
}

impl TypoTables {
    /// Applies one typo subtype to `text`. Returns `None` when nothing changed.
    pub fn apply<R: Rng>(&self, kind: TypoKind, text: &str, rng: &mut R) -> Option<String> {
        let out = match kind {
            TypoKind::KeyboardTypo => per_word(text, rng, |w, r| self.keyboard_typo(w, r)),
            TypoKind::Transposition => per_word(text, rng, transposition),
            TypoKind::MissingLetter => per_word(text, rng, missing_letter),
            TypoKind::ConfusableWord => self.confusable_words(text, rng),
            TypoKind::WrongSpaces => wrong_spaces(text, rng),
        };
        (out != text).then_some(out)
    }

    /// Replaces one character of a word (3+ chars) with a neighbouring key.
    pub fn keyboard_typo<R: Rng>(&self, word: &str, rng: &mut R) -> String {
        let mut chars: Vec<char> = word.chars().collect();
        if chars.len() < 3 {
            return word.to_string();
        }
        let idx = rng.gen_range(0..chars.len());
        let key = chars[idx].to_ascii_lowercase();
        if let Some(neighbour) = self.keyboard.get(&key).and_then(|n| n.choose(rng)) {
            chars[idx] = *neighbour;
        }
        chars.into_iter().collect()
    }

    fn confusable_words<R: Rng>(&self, text: &str, rng: &mut R) -> String {
        text.split_whitespace()
            .map(|word| {
                let Some(options) = self.confusables.get(&word.to_lowercase()) else {
                    return word.to_string();
                };
                if !chance(rng, CONFUSABLE_RATE) {
                    return word.to_string();
                }
                match options.choose(rng) {
                    Some(typo) if word.starts_with(char::is_uppercase) => {
                        crate::normalizer::capitalize_first(typo)
                    }
                    Some(typo) => typo.clone(),
                    None => word.to_string(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn per_word<R, F>(text: &str, rng: &mut R, mut typo: F) -> String
where
    R: Rng,
    F: FnMut(&str, &mut R) -> String,
{
    text.split_whitespace()
        .map(|word| {
            if chance(rng, PER_WORD_RATE) {
                typo(word, rng)
            } else {
                word.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Swaps two adjacent characters of a word (3+ chars).
pub fn transposition<R: Rng>(word: &str, rng: &mut R) -> String {
    let mut chars: Vec<char> = word.chars().collect();
    if chars.len() < 3 {
        return word.to_string();
    }
    let idx = rng.gen_range(0..chars.len() - 1);
    chars.swap(idx, idx + 1);
    chars.into_iter().collect()
}

/// Drops one interior letter of a word (4+ chars).
pub fn missing_letter<R: Rng>(word: &str, rng: &mut R) -> String {
    let mut chars: Vec<char> = word.chars().collect();
    if chars.len() < 4 {
        return word.to_string();
    }
    let idx = rng.gen_range(1..chars.len() - 1);
    chars.remove(idx);
    chars.into_iter().collect()
}

/// Removes the space after one `,` or `.` that is followed by a letter.
pub fn wrong_spaces<R: Rng>(text: &str, rng: &mut R) -> String {
    let bytes = text.as_bytes();
    let candidates: Vec<usize> = (0..bytes.len().saturating_sub(2))
        .filter(|&i| {
            matches!(bytes[i], b',' | b'.') && bytes[i + 1] == b' ' && bytes[i + 2].is_ascii_alphabetic()
        })
        .collect();
    match candidates.choose(rng) {
        Some(&i) => format!("{}{}", &text[..=i], &text[i + 2..]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(7)
    }

    #[test]
    fn test_short_words_untouched() {
        let t = TypoTables::default();
        let mut r = rng();
        assert_eq!(t.keyboard_typo("ok", &mut r), "ok");
        assert_eq!(transposition("hi", &mut r), "hi");
        assert_eq!(missing_letter("cat", &mut r), "cat");
    }

    #[test]
    fn test_missing_letter_keeps_edges() {
        let mut r = rng();
        for _ in 0..50 {
            let out = missing_letter("refund", &mut r);
            assert_eq!(out.chars().count(), 5);
            assert!(out.starts_with('r') && out.ends_with('d'));
        }
    }

    #[test]
    fn test_transposition_preserves_letters() {
        let mut r = rng();
        for _ in 0..50 {
            let out = transposition("payment", &mut r);
            let mut a: Vec<char> = out.chars().collect();
            let mut b: Vec<char> = "payment".chars().collect();
            a.sort_unstable();
            b.sort_unstable();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_keyboard_typo_uses_neighbours() {
        let t = TypoTables::default();
        let mut r = rng();
        for _ in 0..50 {
            let out = t.keyboard_typo("sss", &mut r);
            assert_eq!(out.chars().count(), 3);
            assert!(out.chars().all(|c| "sawedxz".contains(c)));
        }
    }

    #[test]
    fn test_wrong_spaces_removes_single_space() {
        let mut r = rng();
        let out = wrong_spaces("Hi, I paid. Then nothing", &mut r);
        assert!(out == "Hi,I paid. Then nothing" || out == "Hi, I paid.Then nothing");
        assert_eq!(wrong_spaces("no punctuation here", &mut r), "no punctuation here");
        assert_eq!(wrong_spaces("ends with a comma, ", &mut r), "ends with a comma, ");
    }

    #[test]
    fn test_confusables_keep_capitalisation() {
        let t = TypoTables::default();
        let mut r = rng();
        let mut saw_change = false;
        for _ in 0..40 {
            let out = t.confusable_words("The refund", &mut r);
            let first = out.split(' ').next().unwrap();
            assert!(["The", "Teh", "Hte"].contains(&first));
            saw_change |= out != "The refund";
        }
        assert!(saw_change);
    }

    #[test]
    fn test_apply_reports_no_change_as_none() {
        let t = TypoTables::default();
        let mut r = rng();
        assert!(t.apply(TypoKind::WrongSpaces, "nothing to do", &mut r).is_none());
    }
}
