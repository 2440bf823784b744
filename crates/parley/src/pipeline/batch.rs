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

use futures::stream::{self, StreamExt};
use llm_contracts::TextGenerator;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::DialoguePipeline;
use crate::errors::PipelineResult;
use crate::logging::log_batch_failure;
use crate::models::{DialogueRecord, Outcome, ScenarioOverrides, ScenarioParams, Style};

/// Seed distance between consecutive balanced batch items.
pub const BATCH_SEED_STRIDE: u64 = 100;

const BALANCED: [(&str, Outcome, Style); 20] = [
    ("payment issue", Outcome::ResolvedQuick, Style::Formal),
    ("payment issue", Outcome::UnresolvedPassive, Style::Casual),
    ("payment issue", Outcome::Conflict, Style::Aggressive),
    ("payment issue", Outcome::ResolvedNeutral, Style::PassiveAggressive),
    ("technical error", Outcome::ResolvedNeutral, Style::Casual),
    ("technical error", Outcome::Conflict, Style::Aggressive),
    ("technical error", Outcome::UnresolvedRagequit, Style::Formal),
    ("technical error", Outcome::ResolvedQuick, Style::Casual),
    ("account access", Outcome::ResolvedQuick, Style::Formal),
    ("account access", Outcome::UnresolvedRagequit, Style::Aggressive),
    ("account access", Outcome::ResolvedNeutral, Style::Casual),
    ("account access", Outcome::UnresolvedPassive, Style::PassiveAggressive),
    ("billing question", Outcome::InfoOnly, Style::Casual),
    ("billing question", Outcome::ResolvedNeutral, Style::Formal),
    ("billing question", Outcome::Conflict, Style::Aggressive),
    ("billing question", Outcome::ResolvedQuick, Style::PassiveAggressive),
    ("refund request", Outcome::UnresolvedPassive, Style::PassiveAggressive),
    ("refund request", Outcome::ResolvedQuick, Style::Casual),
    ("refund request", Outcome::Conflict, Style::Aggressive),
    ("refund request", Outcome::ResolvedNeutral, Style::Formal),
];

/// The fixed topic/outcome/style rotation used by balanced batches.
pub fn balanced_scenarios() -> Vec<ScenarioOverrides> {
    BALANCED
        .iter()
        .map(|(topic, outcome, style)| ScenarioOverrides {
            topic: Some((*topic).to_string()),
            outcome: Some(*outcome),
            style: Some(*style),
            ..ScenarioOverrides::default()
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchFailure {
    pub index: usize,
    pub seed: u64,
    pub error: String,
}

/// Successful records and per-item failures, both in input order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    pub dialogues: Vec<DialogueRecord>,
    pub failures: Vec<BatchFailure>,
}

impl BatchReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

impl<G: TextGenerator> DialoguePipeline<G> {
    /// `count` sampled dialogues; seeds run `base_seed, base_seed + 1, ...` when given.
    /// Seed arithmetic wraps at `u64::MAX`.
    pub async fn run_batch(&self, count: usize, base_seed: Option<u64>) -> BatchReport {
        let params = (0..count)
            .map(|i| {
                self.sampler
                    .sample(base_seed.map(|base| base.wrapping_add(i as u64)))
            })
            .collect();
        self.build_all(params).await
    }

    /// Item `i` uses seed `base_seed + 100 * i` and rotation entry `i % 20`.
    pub async fn run_balanced(&self, count: usize, base_seed: u64) -> BatchReport {
        let table = balanced_scenarios();
        let params = (0..count)
            .map(|i| {
                let seed = base_seed.wrapping_add(BATCH_SEED_STRIDE.wrapping_mul(i as u64));
                self.sampler
                    .sample_seeded(seed)
                    .with_overrides(&table[i % table.len()])
            })
            .collect();
        self.build_all(params).await
    }

    /// Builds every scenario with at most `concurrency` dialogues in flight.
    pub async fn build_all(&self, params: Vec<ScenarioParams>) -> BatchReport {
        let total = params.len();
        let concurrency = self.config.concurrency.max(1);
        let pipeline = self;

        let mut results: Vec<(usize, u64, PipelineResult<DialogueRecord>)> =
            stream::iter(params.into_iter().enumerate())
                .map(move |(index, params)| async move {
                    let seed = params.seed;
                    (index, seed, pipeline.build(params).await)
                })
                .buffer_unordered(concurrency)
                .collect()
                .await;
        results.sort_by_key(|(index, _, _)| *index);

        let mut report = BatchReport::default();
        for (index, seed, result) in results {
            match result {
                Ok(record) => report.dialogues.push(record),
                Err(e) => {
                    log_batch_failure(index, seed, &e);
                    report.failures.push(BatchFailure {
                        index,
                        seed,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            total = total,
            succeeded = report.dialogues.len(),
            failed = report.failures.len(),
            "Batch finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_balanced_rotation_is_unique() {
        let table = balanced_scenarios();
        assert_eq!(table.len(), 20);
        let keys: HashSet<_> = table
            .iter()
            .map(|o| (o.topic.clone(), o.outcome, o.style))
            .collect();
        assert_eq!(keys.len(), 20);
        assert!(table.iter().all(|o| o.target_message_count.is_none()));
    }

    #[test]
    fn test_every_style_and_outcome_appears() {
        let table = balanced_scenarios();
        for style in Style::ALL {
            assert!(table.iter().any(|o| o.style == Some(*style)), "{style}");
        }
        for outcome in Outcome::ALL {
            assert!(table.iter().any(|o| o.outcome == Some(*outcome)), "{outcome}");
        }
    }
}
