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

//! Scenario sampling.
//!
//! A scenario is a pure function of its seed. Every field is drawn from one
//! `ChaCha8Rng` stream in a fixed order; reordering the draws changes every
//! scenario for every seed and invalidates stored fixtures.

use rand::distributions::{Distribution, WeightedIndex};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::ConfigError;
use crate::models::{
    AgentArchetype, ClientArchetype, Complexity, Outcome, ScenarioParams, Style,
};

/// Upper bound (inclusive) for seeds drawn when the caller supplies none.
pub const MAX_AUTO_SEED: u64 = 999_999;

/// Distributions the sampler draws from. Weights need not be normalised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioTables {
    pub complexity: Vec<(Complexity, u32)>,
    /// Inclusive message-count range for simple dialogues.
    pub simple_messages: (usize, usize),
    /// Inclusive message-count range for complex dialogues.
    pub complex_messages: (usize, usize),
    pub twists: Vec<(String, u32)>,
    pub agent_archetypes: Vec<AgentArchetype>,
    pub client_archetypes: Vec<ClientArchetype>,
    pub heavy_agent_archetypes: Vec<AgentArchetype>,
    pub heavy_twists: Vec<String>,
    pub sectors: Vec<String>,
    pub topics: Vec<String>,
    pub outcomes: Vec<(Outcome, u32)>,
    pub styles: Vec<(Style, u32)>,
    pub conflict_types: Vec<String>,
    pub emotional_arcs: Vec<String>,
}

fn owned(xs: &[&str]) -> Vec<String> {
    xs.iter().map(|s| (*s).to_string()).collect()
}

impl Default for ScenarioTables {
    fn default() -> Self {
        Self {
            complexity: vec![(Complexity::Simple, 40), (Complexity::Complex, 60)],
            simple_messages: (2, 5),
            complex_messages: (4, 8),
            twists: vec![
                ("none".into(), 40),
                ("client_calms_down".into(), 6),
                ("client_realizes_own_fault".into(), 6),
                ("agent_breaks_protocol".into(), 6),
                ("agent_makes_mistake".into(), 6),
                ("company_acknowledges_fault".into(), 5),
                ("unresolved_escalate".into(), 5),
                ("ragequit".into(), 5),
                ("personal_crisis_revealed".into(), 5),
                ("legal_escalation".into(), 5),
                ("resolution_after_years".into(), 3),
                ("wrong_department_entirely".into(), 3),
            ],
            agent_archetypes: AgentArchetype::ALL.to_vec(),
            client_archetypes: ClientArchetype::ALL.to_vec(),
            heavy_agent_archetypes: vec![AgentArchetype::BurnedOut, AgentArchetype::HandsTied],
            heavy_twists: owned(&[
                "agent_breaks_protocol",
                "ragequit",
                "legal_escalation",
                "unresolved_escalate",
            ]),
            sectors: owned(&[
                "retail",
                "telco",
                "banking",
                "travel",
                "healthcare",
                "insurance",
                "hospitality",
            ]),
            topics: owned(&[
                "order stuck in transit",
                "billing error",
                "wrong item received",
                "cancellation request denied",
                "subscription payment failed",
                "overdraft fee dispute",
                "suspicious transaction",
                "appointment scheduling issue",
                "service outage",
                "account locked",
                "refund not received",
                "price dispute",
                "delivery to wrong address",
                "plan upgrade issue",
                "loyalty points missing",
                "double charge",
                "contract termination fee",
                "technical support failure",
            ]),
            outcomes: vec![
                (Outcome::ResolvedQuick, 20),
                (Outcome::ResolvedNeutral, 20),
                (Outcome::UnresolvedPassive, 15),
                (Outcome::UnresolvedRagequit, 15),
                (Outcome::Conflict, 15),
                (Outcome::InfoOnly, 15),
            ],
            styles: vec![
                (Style::Casual, 35),
                (Style::Aggressive, 30),
                (Style::Formal, 15),
                (Style::PassiveAggressive, 20),
            ],
            conflict_types: owned(&[
                "policy_dispute",
                "billing_error",
                "technical_issue",
                "delivery_problem",
                "account_access",
                "wrong_info_given",
                "client_own_fault",
                "company_fault",
                "none",
            ]),
            emotional_arcs: owned(&["escalates", "deescalates", "stable", "rollercoaster"]),
        }
    }
}

fn weighted_index<T>(name: &str, table: &[(T, u32)]) -> Result<WeightedIndex<u32>, ConfigError> {
    WeightedIndex::new(table.iter().map(|(_, w)| *w)).map_err(|e| ConfigError::Invalid {
        key: name.to_string(),
        value: e.to_string(),
    })
}

fn non_empty<T>(name: &str, list: &[T]) -> Result<(), ConfigError> {
    if list.is_empty() {
        return Err(ConfigError::Invalid {
            key: name.to_string(),
            value: "empty list".to_string(),
        });
    }
    Ok(())
}

fn valid_range(name: &str, (lo, hi): (usize, usize)) -> Result<(), ConfigError> {
    if lo < 2 || hi < lo {
        return Err(ConfigError::Invalid {
            key: name.to_string(),
            value: format!("{lo}..={hi}"),
        });
    }
    Ok(())
}

/// Draws [`ScenarioParams`] from validated tables.
#[derive(Debug, Clone)]
pub struct ScenarioSampler {
    tables: ScenarioTables,
    complexity: WeightedIndex<u32>,
    twists: WeightedIndex<u32>,
    outcomes: WeightedIndex<u32>,
    styles: WeightedIndex<u32>,
}

impl ScenarioSampler {
    /// Validates the tables once so sampling itself cannot fail.
    pub fn new(tables: ScenarioTables) -> Result<Self, ConfigError> {
        valid_range("simple_messages", tables.simple_messages)?;
        valid_range("complex_messages", tables.complex_messages)?;
        non_empty("agent_archetypes", &tables.agent_archetypes)?;
        non_empty("client_archetypes", &tables.client_archetypes)?;
        non_empty("sectors", &tables.sectors)?;
        non_empty("topics", &tables.topics)?;
        non_empty("conflict_types", &tables.conflict_types)?;
        non_empty("emotional_arcs", &tables.emotional_arcs)?;

        Ok(Self {
            complexity: weighted_index("complexity", &tables.complexity)?,
            twists: weighted_index("twists", &tables.twists)?,
            outcomes: weighted_index("outcomes", &tables.outcomes)?,
            styles: weighted_index("styles", &tables.styles)?,
            tables,
        })
    }

    pub fn tables(&self) -> &ScenarioTables {
        &self.tables
    }

    /// Samples from `seed`, or from a freshly drawn seed that is recorded in the result.
    pub fn sample(&self, seed: Option<u64>) -> ScenarioParams {
        let seed = seed.unwrap_or_else(|| rand::thread_rng().gen_range(0..=MAX_AUTO_SEED));
        self.sample_seeded(seed)
    }

    pub fn sample_seeded(&self, seed: u64) -> ScenarioParams {
        let t = &self.tables;
        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        let complexity = t.complexity[self.complexity.sample(&mut rng)].0;
        let (lo, hi) = match complexity {
            Complexity::Simple => t.simple_messages,
            Complexity::Complex => t.complex_messages,
        };
        let target_message_count = rng.gen_range(lo..=hi);
        let twist = t.twists[self.twists.sample(&mut rng)].0.clone();
        let agent_archetype = pick(&mut rng, &t.agent_archetypes);
        let client_archetype = pick(&mut rng, &t.client_archetypes);

        let use_alt_model = t.heavy_agent_archetypes.contains(&agent_archetype)
            || t.heavy_twists.iter().any(|h| *h == twist);

        let sector = pick(&mut rng, &t.sectors);
        let topic = pick(&mut rng, &t.topics);
        let outcome = t.outcomes[self.outcomes.sample(&mut rng)].0;
        let style = t.styles[self.styles.sample(&mut rng)].0;
        let conflict_type = pick(&mut rng, &t.conflict_types);
        let emotional_arc = pick(&mut rng, &t.emotional_arcs);

        debug!(
            seed = seed,
            outcome = %outcome,
            style = %style,
            messages = target_message_count,
            "Scenario sampled"
        );

        ScenarioParams {
            seed,
            complexity,
            sector,
            topic,
            outcome,
            style,
            client_archetype,
            agent_archetype,
            twist,
            conflict_type,
            emotional_arc,
            target_message_count,
            use_alt_model,
        }
    }
}

/// Uniform pick from a list validated as non-empty at construction.
fn pick<T: Clone>(rng: &mut ChaCha8Rng, items: &[T]) -> T {
    items[rng.gen_range(0..items.len())].clone()
}
