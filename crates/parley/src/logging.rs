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

use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::models::PipelineStage;

pub fn log_stage_event(seed: u64, stage: PipelineStage, payload: Value) {
    debug!(
        seed = seed,
        stage = stage.as_str(),
        payload = %serde_json::to_string(&payload).unwrap_or_else(|_| "{}".to_string()),
        "Pipeline stage"
    );
}

pub fn log_stage_skipped(seed: u64, stage: PipelineStage, reason: &str) {
    debug!(seed = seed, stage = stage.as_str(), reason = reason, "Pipeline stage skipped");
}

pub fn log_retry_event(seed: u64, stage: PipelineStage, attempt: u32, max_attempts: u32, error: &dyn std::error::Error) {
    warn!(
        seed = seed,
        stage = stage.as_str(),
        attempt = attempt,
        max_attempts = max_attempts,
        error = %error,
        "Stage attempt failed"
    );
}

pub fn log_reversion_event(turn: u32, dropped: &[String]) {
    debug!(
        turn = turn,
        dropped = ?dropped,
        "Transformed text rejected, original kept"
    );
}

pub fn log_dialogue_complete(seed: u64, messages: usize, noise_tags: usize, elapsed_s: f64) {
    info!(
        seed = seed,
        messages = messages,
        noise_tags = noise_tags,
        elapsed_s = elapsed_s,
        "Dialogue complete"
    );
}

pub fn log_batch_failure(index: usize, seed: u64, error: &dyn std::error::Error) {
    error!(
        index = index,
        seed = seed,
        error = %error,
        "Dialogue failed"
    );
}
