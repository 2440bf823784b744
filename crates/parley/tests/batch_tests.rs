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

mod common;

use common::{simple_config, ScriptedGenerator, THREE_LINE_REPLY};
use parley::{DialoguePipeline, LLMError, Outcome, PipelineConfig, Style};

#[tokio::test]
async fn test_balanced_batch_follows_rotation_in_order() {
    let config = PipelineConfig {
        concurrency: 3,
        ..simple_config()
    };
    let pipeline = DialoguePipeline::new(ScriptedGenerator::constant(THREE_LINE_REPLY), config).unwrap();

    let report = pipeline.run_balanced(5, 1000).await;

    assert!(report.is_clean());
    let seeds: Vec<u64> = report.dialogues.iter().map(|d| d.seed).collect();
    assert_eq!(seeds, vec![1000, 1100, 1200, 1300, 1400]);
    assert_eq!(report.dialogues[0].params.topic, "payment issue");
    assert_eq!(report.dialogues[0].params.outcome, Outcome::ResolvedQuick);
    assert_eq!(report.dialogues[0].params.style, Style::Formal);
    assert_eq!(report.dialogues[4].params.topic, "technical error");
}

#[tokio::test]
async fn test_failures_do_not_abort_the_batch() {
    let generator = ScriptedGenerator::new(|request| {
        if request.user_prompt.contains("technical error") {
            Err(LLMError::Authentication("revoked".into()))
        } else {
            Ok(THREE_LINE_REPLY.to_string())
        }
    });
    let pipeline = DialoguePipeline::new(generator, simple_config()).unwrap();

    let report = pipeline.run_balanced(6, 500).await;

    assert_eq!(report.dialogues.len(), 4);
    let failed: Vec<(usize, u64)> = report.failures.iter().map(|f| (f.index, f.seed)).collect();
    assert_eq!(failed, vec![(4, 900), (5, 1000)]);
    assert!(report.failures[0].error.contains("revoked"));
}

#[tokio::test]
async fn test_seeded_batch_uses_consecutive_seeds() {
    let pipeline =
        DialoguePipeline::new(ScriptedGenerator::constant(THREE_LINE_REPLY), simple_config()).unwrap();
    let report = pipeline.run_batch(3, Some(42)).await;
    let seeds: Vec<u64> = report.dialogues.iter().map(|d| d.seed).collect();
    assert_eq!(seeds, vec![42, 43, 44]);
}

#[tokio::test]
async fn test_seeds_wrap_near_u64_max() {
    let pipeline =
        DialoguePipeline::new(ScriptedGenerator::constant(THREE_LINE_REPLY), simple_config()).unwrap();

    let report = pipeline.run_batch(2, Some(u64::MAX)).await;
    let seeds: Vec<u64> = report.dialogues.iter().map(|d| d.seed).collect();
    assert_eq!(seeds, vec![u64::MAX, 0]);

    let report = pipeline.run_balanced(2, u64::MAX - 50).await;
    let seeds: Vec<u64> = report.dialogues.iter().map(|d| d.seed).collect();
    assert_eq!(seeds, vec![u64::MAX - 50, 49]);
}
