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

//! Output validation for transformed client text.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accepted(String),
    /// The transformed text was rejected; the original content stands.
    Reverted,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutputValidator {
    /// Lowercase phrases that betray instructions leaking into the text.
    pub meta_leaks: Vec<String>,
    /// Below this share of the original word count, text must end naturally.
    pub min_word_ratio: f64,
}

impl Default for OutputValidator {
    fn default() -> Self {
        Self {
            meta_leaks: [
                "next message:",
                "last message:",
                "(note:",
                "rewritten version:",
                "here is the",
                "remember to keep",
                "absolute rules",
                "as the customer",
                "i'll rewrite",
                "rewritten:",
                "here's the rewritten",
                "here is the rewritten",
                "rewritten message:",
                "rewrite this",
                "rewrite this customer",
                "in your voice",
                "as a representative of our company",
                "on behalf of our company",
                "{{website_url}}",
                "visit our website at {{",
                "representative of",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            min_word_ratio: 0.5,
        }
    }
}

impl OutputValidator {
    pub fn leaks(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        self.meta_leaks.iter().any(|leak| lower.contains(leak.as_str()))
    }

    /// Checks `text` against the content it was derived from.
    pub fn check(&self, text: &str, original: &str) -> Verdict {
        let mut text = text.trim();
        if text.is_empty() {
            return Verdict::Reverted;
        }
        if text.len() >= 2 && text.starts_with('"') && text.ends_with('"') {
            text = text[1..text.len() - 1].trim();
        }
        if text.is_empty() || self.leaks(text) {
            return Verdict::Reverted;
        }

        let ends_naturally = text.ends_with(['.', '!', '?', ')']);
        let too_short = (text.split_whitespace().count() as f64)
            < original.split_whitespace().count() as f64 * self.min_word_ratio;
        if too_short && !ends_naturally {
            return Verdict::Reverted;
        }
        Verdict::Accepted(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_plain_text() {
        let v = OutputValidator::default();
        assert_eq!(
            v.check("where is my refund", "Where is my refund?"),
            Verdict::Accepted("where is my refund".into())
        );
    }

    #[test]
    fn test_strips_wrapping_quotes() {
        let v = OutputValidator::default();
        assert_eq!(
            v.check("\"where is it?\"", "Where is it?"),
            Verdict::Accepted("where is it?".into())
        );
    }

    #[test]
    fn test_rejects_empty_and_leaks() {
        let v = OutputValidator::default();
        assert_eq!(v.check("   ", "hi there"), Verdict::Reverted);
        assert_eq!(v.check("\"\"", "hi there"), Verdict::Reverted);
        assert_eq!(
            v.check("Here is the rewritten message: ok", "ok then"),
            Verdict::Reverted
        );
    }

    #[test]
    fn test_word_ratio_is_tunable() {
        let strict = OutputValidator {
            min_word_ratio: 0.9,
            ..OutputValidator::default()
        };
        assert_ne!(strict, OutputValidator::default());
        assert_eq!(strict.clone(), strict);
        let original = "my order from last week never arrived at all";
        assert_eq!(strict.check("my order never arrived", original), Verdict::Reverted);
    }

    #[test]
    fn test_short_text_must_end_naturally() {
        let v = OutputValidator::default();
        let original = "I have been waiting for three weeks now for my refund";
        assert_eq!(v.check("I have been", original), Verdict::Reverted);
        assert!(matches!(v.check("I waited.", original), Verdict::Accepted(_)));
    }
}
