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

use parley::models::{Message, Role, ScenarioParams};
use parley::noise::{
    structure, AgentQuirks, NoiseEngine, NoiseLexicon, NoiseProfile, NoiseProfiles, TypoKind,
};
use parley::{ScenarioSampler, ScenarioTables};
use proptest::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn params(seed: u64) -> ScenarioParams {
    ScenarioSampler::new(ScenarioTables::default())
        .unwrap()
        .sample_seeded(seed)
}

/// Every client candidate fires; agents get no quirks and nobody switches layout.
fn saturated_engine() -> NoiseEngine {
    let all_typos = [
        TypoKind::KeyboardTypo,
        TypoKind::Transposition,
        TypoKind::MissingLetter,
        TypoKind::WrongSpaces,
        TypoKind::ConfusableWord,
    ];
    let profiles = NoiseProfiles {
        entries: Vec::new(),
        style_overrides: Vec::new(),
        fallback: NoiseProfile::new(&all_typos, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0),
    };
    let mut lexicon = NoiseLexicon::default();
    lexicon.agent_quirks = AgentQuirks { rules: Vec::new() };
    lexicon.wrong_keyboard.probability = 0.0;
    NoiseEngine::with_lexicon(profiles, NoiseEngine::default().banks().clone(), lexicon)
}

fn dialogue_strategy() -> impl Strategy<Value = Vec<Message>> {
    prop::collection::vec((any::<bool>(), "[A-Za-z][A-Za-z ,.!?']{0,80}"), 2..10).prop_map(
        |items| {
            items
                .into_iter()
                .enumerate()
                .map(|(i, (is_client, content))| {
                    let role = if is_client || i == 0 {
                        Role::Client
                    } else {
                        Role::Agent
                    };
                    Message::new(role, i as u32 + 1, content)
                })
                .collect()
        },
    )
}

proptest! {
    #[test]
    fn prop_noise_is_deterministic(messages in dialogue_strategy(), seed in 0u64..1_000_000) {
        let engine = NoiseEngine::default();
        let p = params(seed);
        let first = engine.apply_seeded(&messages, &p, seed);
        let second = engine.apply_seeded(&messages, &p, seed);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_agents_never_receive_client_noise(messages in dialogue_strategy(), seed in 0u64..1_000_000) {
        let engine = saturated_engine();
        let (out, _) = engine.apply_seeded(&messages, &params(seed), seed);

        let agents_in: Vec<&str> = messages
            .iter()
            .filter(|m| m.role == Role::Agent)
            .map(|m| m.content.as_str())
            .collect();
        let agents_out: Vec<&str> = out
            .iter()
            .filter(|m| m.role == Role::Agent)
            .map(|m| m.content.as_str())
            .collect();
        prop_assert_eq!(agents_in, agents_out);
    }

    #[test]
    fn prop_noised_turns_stay_in_order(messages in dialogue_strategy(), seed in 0u64..1_000_000) {
        let (out, tags) = NoiseEngine::default().apply_seeded(&messages, &params(seed), seed);
        prop_assert!(out.len() >= messages.len());
        prop_assert!(out.windows(2).all(|w| w[0].turn <= w[1].turn));
        prop_assert!(tags.iter().all(|t| t.contains(":turn")));
    }

    #[test]
    fn prop_split_never_yields_empty_fragment(text in "[A-Za-z ,.!?]{0,160}", seed in any::<u64>()) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let parts = structure::split(&text, &mut rng);
        prop_assert!(!parts.is_empty() && parts.len() <= 2);
        if parts.len() == 1 {
            prop_assert_eq!(&parts[0], &text);
        } else {
            prop_assert!(parts.iter().all(|p| !p.trim().is_empty()));
        }
    }
}

#[test]
fn test_split_without_boundary_is_unchanged() {
    let mut rng = ChaCha8Rng::seed_from_u64(3);
    let text = "my card was charged twice, help";
    assert_eq!(structure::split(text, &mut rng), vec![text.to_string()]);
}
