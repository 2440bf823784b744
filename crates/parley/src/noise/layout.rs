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

//! Wrong-keyboard-layout event, applied at most once per dialogue.

use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashMap;

use crate::models::{Message, Role};

#[derive(Debug, Clone, PartialEq)]
pub struct WrongKeyboard {
    pub probability: f64,
    /// Latin key to the character the same key produces on the other layout.
    pub layout: HashMap<char, char>,
    pub apologies: Vec<String>,
    pub min_words: usize,
    pub max_words: usize,
}

impl Default for WrongKeyboard {
    fn default() -> Self {
        let layout = "qwertyuiopasdfghjklzxcvbnm"
            .chars()
            .zip("йцукенгшщзфівапролдячсмить".chars())
            .collect::<HashMap<_, _>>();
        Self {
            probability: 0.04,
            layout,
            apologies: [
                "sorry wrong keyboard lol",
                "oops wrong layout",
                "*wrong keyboard",
                "sorry, meant to type in english",
                "lol wrong language",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            min_words: 2,
            max_words: 4,
        }
    }
}

impl WrongKeyboard {
    fn garble(&self, word: &str) -> String {
        word.chars()
            .map(|c| {
                self.layout
                    .get(&c.to_ascii_lowercase())
                    .copied()
                    .unwrap_or(c)
            })
            .collect()
    }

    /// Finds the first two consecutive client messages, garbles the leading
    /// words of the first and turns the second into an apology. Returns the
    /// turn of the garbled message, or `None` when there is no such pair.
    pub fn apply<R: Rng>(&self, messages: &mut [Message], rng: &mut R) -> Option<u32> {
        let idx = messages
            .windows(2)
            .position(|w| w[0].role == Role::Client && w[1].role == Role::Client)?;

        let words: Vec<&str> = messages[idx].content.split_whitespace().collect();
        let count = rng
            .gen_range(self.min_words..=self.max_words.max(self.min_words))
            .min(words.len());
        let garbled: Vec<String> = words
            .iter()
            .enumerate()
            .map(|(i, w)| if i < count { self.garble(w) } else { (*w).to_string() })
            .collect();
        messages[idx].content = garbled.join(" ");

        if let Some(apology) = self.apologies.choose(rng) {
            messages[idx + 1].content = apology.clone();
        }
        Some(messages[idx].turn)
    }
}
