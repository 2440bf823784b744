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

//! Noise injection.
//!
//! Everything here draws from one caller-supplied seeded stream, in transcript
//! order, so the same messages, parameters and seed always give the same
//! output and the same tag list. Candidates are drawn in a fixed order and
//! ranked by [`Transform::priority`]; reordering either changes every output.

pub mod agent;
pub mod banks;
pub mod discourse;
pub mod layout;
pub mod profiles;
pub mod register;
pub mod structure;
pub mod typos;
pub mod validate;

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::logging::log_reversion_event;
use crate::models::{Message, Role, ScenarioParams};

pub use agent::{AgentQuirks, QuirkKind, QuirkRule};
pub use banks::{CorpusBanks, FillerEntry, SlangEntry};
pub use discourse::{SlangTables, SlangUsage};
pub use layout::WrongKeyboard;
pub use profiles::{IntensityBucket, NoiseProfile, NoiseProfiles, ProfileEntry, TypoKind};
pub use register::{arc_position, Register};
pub use structure::EllipsisTables;
pub use typos::TypoTables;
pub use validate::{OutputValidator, Verdict};

/// Intensity assumed for client messages without one.
pub const DEFAULT_INTENSITY: u8 = 3;

pub(crate) fn chance<R: Rng>(rng: &mut R, probability: f64) -> bool {
    rng.gen::<f64>() < probability
}

pub(crate) fn lowercase_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Replaces the first ASCII-case-insensitive occurrence of `needle`. The
/// replacement takes a capital when the matched text starts with one.
pub(crate) fn replace_first_ignore_case(text: &str, needle: &str, replacement: &str) -> Option<String> {
    if needle.is_empty() {
        return None;
    }
    // ASCII lowercasing keeps byte offsets aligned with `text`.
    let at = text
        .to_ascii_lowercase()
        .find(&needle.to_ascii_lowercase())?;
    let matched = &text[at..at + needle.len()];
    let replacement = if matched.starts_with(char::is_uppercase) {
        crate::normalizer::capitalize_first(replacement)
    } else {
        replacement.to_string()
    };
    Some(format!("{}{}{}", &text[..at], replacement, &text[at + needle.len()..]))
}

/// One candidate client transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    Typo(TypoKind),
    Lowercase,
    CapsBurst,
    FillerPrepend,
    SlangSub,
    PunctDrop,
    Split,
    Ellipsis,
}

impl Transform {
    /// Lower ranks win when more candidates fire than may be applied.
    pub fn priority(&self) -> u8 {
        match self {
            Transform::Typo(_) => 0,
            Transform::Lowercase => 1,
            Transform::CapsBurst => 2,
            Transform::FillerPrepend => 3,
            Transform::SlangSub => 4,
            Transform::PunctDrop => 5,
            Transform::Split => 6,
            Transform::Ellipsis => 7,
        }
    }

    pub fn tag_name(&self) -> String {
        match self {
            Transform::Typo(kind) => format!("typo_{}", kind.as_str()),
            Transform::Lowercase => "lowercase".to_string(),
            Transform::CapsBurst => "caps_burst".to_string(),
            Transform::FillerPrepend => "filler_prepend".to_string(),
            Transform::SlangSub => "slang_sub".to_string(),
            Transform::PunctDrop => "punct_drop".to_string(),
            Transform::Split => "split".to_string(),
            Transform::Ellipsis => "ellipsis".to_string(),
        }
    }

    pub fn is_typo(&self) -> bool {
        matches!(self, Transform::Typo(_))
    }
}

pub fn tag(name: &str, turn: u32) -> String {
    format!("{name}:turn{turn}")
}

/// Static lookup tables used alongside the profiles.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NoiseLexicon {
    pub typos: TypoTables,
    pub register: Register,
    pub slang: SlangTables,
    pub ellipsis: EllipsisTables,
    pub wrong_keyboard: WrongKeyboard,
    pub validator: OutputValidator,
    pub agent_quirks: AgentQuirks,
}

/// Applies archetype and intensity conditioned surface noise to a dialogue.
#[derive(Debug, Clone)]
pub struct NoiseEngine {
    profiles: NoiseProfiles,
    banks: CorpusBanks,
    lexicon: NoiseLexicon,
    max_transforms: usize,
}

/// Client text after the per-message transforms, before re-expansion.
struct ClientNoise {
    fragments: Vec<String>,
    tags: Vec<String>,
}

impl NoiseEngine {
    pub const MAX_TRANSFORMS: usize = 2;

    pub fn new(profiles: NoiseProfiles, banks: CorpusBanks) -> Self {
        Self::with_lexicon(profiles, banks, NoiseLexicon::default())
    }

    pub fn with_lexicon(profiles: NoiseProfiles, banks: CorpusBanks, lexicon: NoiseLexicon) -> Self {
        Self {
            profiles,
            banks,
            lexicon,
            max_transforms: Self::MAX_TRANSFORMS,
        }
    }

    pub fn profiles(&self) -> &NoiseProfiles {
        &self.profiles
    }

    pub fn banks(&self) -> &CorpusBanks {
        &self.banks
    }

    pub fn lexicon(&self) -> &NoiseLexicon {
        &self.lexicon
    }

    /// Runs [`NoiseEngine::apply`] on a fresh stream seeded with `seed`.
    pub fn apply_seeded(
        &self,
        messages: &[Message],
        params: &ScenarioParams,
        seed: u64,
    ) -> (Vec<Message>, Vec<String>) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        self.apply(messages, params, &mut rng)
    }

    /// Returns the noised messages and the applied-transform tags.
    pub fn apply<R: Rng>(
        &self,
        messages: &[Message],
        params: &ScenarioParams,
        rng: &mut R,
    ) -> (Vec<Message>, Vec<String>) {
        let mut working = messages.to_vec();
        let mut tags = Vec::new();

        let kb = &self.lexicon.wrong_keyboard;
        if chance(rng, kb.probability) {
            if let Some(turn) = kb.apply(&mut working, rng) {
                tags.push(tag("wrong_keyboard_event", turn));
            }
        }

        let total_turns = working.iter().map(|m| m.turn).max().unwrap_or(1);
        let mut usage = SlangUsage::new();
        let mut out = Vec::with_capacity(working.len() + 2);

        for message in working {
            match message.role {
                Role::Client => {
                    let noise = self.noise_client(&message, params, total_turns, &mut usage, rng);
                    tags.extend(noise.tags);
                    out.extend(noise.fragments.into_iter().map(|f| message.with_content(f)));
                }
                Role::Agent => {
                    let quirk = self.lexicon.agent_quirks.apply(
                        &message.content,
                        params.agent_archetype,
                        rng,
                    );
                    match quirk {
                        Some((text, kind)) => {
                            tags.push(tag(kind.as_str(), message.turn));
                            out.push(message.with_content(text));
                        }
                        None => out.push(message),
                    }
                }
            }
        }

        debug!(
            seed = params.seed,
            messages_in = messages.len(),
            messages_out = out.len(),
            transforms = tags.len(),
            "Noise applied"
        );
        (out, tags)
    }

    /// Draws one Bernoulli per profile rate, in a fixed order.
    fn draw_candidates<R: Rng>(
        &self,
        profile: &NoiseProfile,
        arc: f64,
        use_alt_model: bool,
        rng: &mut R,
    ) -> Vec<Transform> {
        let mut candidates = Vec::new();

        if chance(rng, profile.typo_rate) {
            if let Some(kind) = profile.typo_kinds.choose(rng) {
                candidates.push(Transform::Typo(*kind));
            }
        }
        if chance(rng, profile.lowercase_rate) {
            candidates.push(Transform::Lowercase);
        }
        if chance(rng, profile.caps_rate) && arc >= register::EARLY_ARC {
            candidates.push(Transform::CapsBurst);
        }
        if chance(rng, profile.filler_rate) && self.banks.has_fillers() {
            candidates.push(Transform::FillerPrepend);
        }
        if chance(rng, profile.slang_rate) {
            candidates.push(Transform::SlangSub);
        }
        if chance(rng, profile.punct_drop_rate) {
            candidates.push(Transform::PunctDrop);
        }
        if !use_alt_model && chance(rng, profile.split_rate) {
            candidates.push(Transform::Split);
        }
        if chance(rng, profile.ellipsis_rate) {
            candidates.push(Transform::Ellipsis);
        }

        candidates.sort_by_key(Transform::priority);
        candidates.truncate(self.max_transforms);
        candidates
    }

    fn transform_text<R: Rng>(
        &self,
        transform: Transform,
        text: &str,
        params: &ScenarioParams,
        arc: f64,
        usage: &mut SlangUsage,
        rng: &mut R,
    ) -> Option<String> {
        let lex = &self.lexicon;
        match transform {
            Transform::Typo(kind) => lex.typos.apply(kind, text, rng),
            Transform::Lowercase => Some(Register::lowercase(text)),
            Transform::CapsBurst => lex.register.caps_burst(text, arc, rng),
            Transform::FillerPrepend => discourse::filler_prepend(text, &self.banks, rng),
            Transform::SlangSub => lex.slang.substitute(text, params.style, &self.banks, usage, rng),
            Transform::PunctDrop => structure::punct_drop(text, rng),
            Transform::Ellipsis => lex.ellipsis.apply(text, params.style, params.outcome),
            Transform::Split => None,
        }
    }

    fn noise_client<R: Rng>(
        &self,
        message: &Message,
        params: &ScenarioParams,
        total_turns: u32,
        usage: &mut SlangUsage,
        rng: &mut R,
    ) -> ClientNoise {
        let intensity = message.intensity.unwrap_or(DEFAULT_INTENSITY);
        let profile = self
            .profiles
            .lookup(params.client_archetype, intensity, params.style);
        let arc = arc_position(message.turn, total_turns);
        let chosen = self.draw_candidates(&profile, arc, params.use_alt_model, rng);

        let mut text = message.content.clone();
        let mut tags = Vec::new();
        for transform in chosen.iter().filter(|t| **t != Transform::Split) {
            if let Some(next) = self.transform_text(*transform, &text, params, arc, usage, rng) {
                text = next;
                tags.push(tag(&transform.tag_name(), message.turn));
            }
        }

        let text = match self.lexicon.validator.check(&text, &message.content) {
            Verdict::Accepted(clean) => clean,
            Verdict::Reverted => {
                log_reversion_event(message.turn, &tags);
                tags.clear();
                message.content.clone()
            }
        };

        // Split runs last so both halves carry the other transforms.
        if chosen.contains(&Transform::Split) {
            let parts = structure::split(&text, rng);
            if parts.len() == 2 {
                tags.push(tag(&Transform::Split.tag_name(), message.turn));
                return ClientNoise { fragments: parts, tags };
            }
        }
        ClientNoise {
            fragments: vec![text],
            tags,
        }
    }
}

impl Default for NoiseEngine {
    fn default() -> Self {
        Self::new(NoiseProfiles::default(), CorpusBanks::builtin())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AgentArchetype, ClientArchetype, Complexity, Outcome, Style};

    fn params(style: Style) -> ScenarioParams {
        ScenarioParams {
            seed: 11111,
            complexity: Complexity::Simple,
            sector: "retail".into(),
            topic: "refund not received".into(),
            outcome: Outcome::ResolvedNeutral,
            style,
            client_archetype: ClientArchetype::YoungProfessional,
            agent_archetype: AgentArchetype::NewbieOverwhelmed,
            twist: "none".into(),
            conflict_type: "none".into(),
            emotional_arc: "stable".into(),
            target_message_count: 4,
            use_alt_model: false,
        }
    }

    fn dialogue() -> Vec<Message> {
        vec![
            Message::client(1, "Hi, I have been waiting for my refund for two weeks. Please tell me what is going on."),
            Message::agent(2, "I'm sorry to hear that. Let me check the status of your refund."),
            Message::client(3, "Thanks, to be honest I just want the money back as soon as possible."),
            Message::agent(4, "The refund was issued today and should arrive within five days."),
        ]
    }

    fn all_rates(p: f64) -> NoiseProfile {
        NoiseProfile::new(&[TypoKind::KeyboardTypo], p, p, p, p, p, p, p, p)
    }

    #[test]
    fn test_same_seed_same_output() {
        let engine = NoiseEngine::default();
        let p = params(Style::Casual);
        for seed in 0..30 {
            let a = engine.apply_seeded(&dialogue(), &p, seed);
            let b = engine.apply_seeded(&dialogue(), &p, seed);
            assert_eq!(a, b, "seed {seed}");
        }
    }

    #[test]
    fn test_zero_rates_leave_clients_alone() {
        let profiles = NoiseProfiles {
            entries: vec![],
            style_overrides: vec![],
            fallback: all_rates(0.0),
        };
        let mut lexicon = NoiseLexicon::default();
        lexicon.wrong_keyboard.probability = 0.0;
        lexicon.agent_quirks.rules.clear();
        let engine = NoiseEngine::with_lexicon(profiles, CorpusBanks::builtin(), lexicon);

        let (out, tags) = engine.apply_seeded(&dialogue(), &params(Style::Casual), 3);
        assert_eq!(out, dialogue());
        assert!(tags.is_empty());
    }

    #[test]
    fn test_at_most_two_transforms_per_message() {
        let profiles = NoiseProfiles {
            entries: vec![],
            style_overrides: vec![],
            fallback: all_rates(1.0),
        };
        let engine = NoiseEngine::new(profiles, CorpusBanks::builtin());
        for seed in 0..20 {
            let (_, tags) = engine.apply_seeded(&dialogue(), &params(Style::Casual), seed);
            for turn in [1, 3] {
                let suffix = format!(":turn{turn}");
                let n = tags
                    .iter()
                    .filter(|t| t.ends_with(&suffix) && !t.starts_with("wrong_keyboard"))
                    .count();
                assert!(n <= 2, "seed {seed}: {tags:?}");
            }
        }
    }

    #[test]
    fn test_priority_keeps_typo_and_register() {
        let engine = NoiseEngine::new(
            NoiseProfiles {
                entries: vec![],
                style_overrides: vec![],
                fallback: all_rates(1.0),
            },
            CorpusBanks::builtin(),
        );
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let picked = engine.draw_candidates(&all_rates(1.0), 1.0, false, &mut rng);
        assert_eq!(picked, vec![Transform::Typo(TypoKind::KeyboardTypo), Transform::Lowercase]);
    }

    #[test]
    fn test_split_expands_to_sibling_messages() {
        let mut only_split = all_rates(0.0);
        only_split.split_rate = 1.0;
        let profiles = NoiseProfiles {
            entries: vec![],
            style_overrides: vec![],
            fallback: only_split,
        };
        let mut lexicon = NoiseLexicon::default();
        lexicon.wrong_keyboard.probability = 0.0;
        let engine = NoiseEngine::with_lexicon(profiles, CorpusBanks::empty(), lexicon);

        let (out, tags) = engine.apply_seeded(&dialogue(), &params(Style::Formal), 8);
        assert_eq!(out.len(), 5);
        assert_eq!(out[0].turn, 1);
        assert_eq!(out[1].turn, 1);
        assert_eq!(out[1].role, Role::Client);
        assert!(tags.contains(&"split:turn1".to_string()));

        let mut heavy = params(Style::Formal);
        heavy.use_alt_model = true;
        let (out, _) = engine.apply_seeded(&dialogue(), &heavy, 8);
        assert_eq!(out.iter().filter(|m| m.role == Role::Client).count(), 2);
    }

    #[test]
    fn test_agents_never_get_typos() {
        let engine = NoiseEngine::new(
            NoiseProfiles {
                entries: vec![],
                style_overrides: vec![],
                fallback: all_rates(1.0),
            },
            CorpusBanks::builtin(),
        );
        for seed in 0..30 {
            let (_, tags) = engine.apply_seeded(&dialogue(), &params(Style::Casual), seed);
            for even in [2, 4] {
                assert!(!tags.iter().any(|t| t.starts_with("typo_") && t.ends_with(&format!(":turn{even}"))));
            }
        }
    }

    #[test]
    fn test_replace_first_ignore_case() {
        assert_eq!(
            replace_first_ignore_case("Please, please", "please", "pls").as_deref(),
            Some("Pls, please")
        );
        assert_eq!(replace_first_ignore_case("héllo okay", "okay", "okay...").as_deref(), Some("héllo okay..."));
        assert!(replace_first_ignore_case("nothing", "xyz", "a").is_none());
    }
}
