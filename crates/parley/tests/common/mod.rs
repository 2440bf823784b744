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

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use parley::{GenerationRequest, LLMError, LLMResult, PipelineConfig, TextGenerator};

type Route = Box<dyn Fn(&GenerationRequest) -> LLMResult<String> + Send + Sync>;

/// In-memory generator: queued failures first, then the routing function.
pub struct ScriptedGenerator {
    route: Route,
    failures: Mutex<VecDeque<LLMError>>,
    calls: AtomicUsize,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerator {
    pub fn new<F>(route: F) -> Self
    where
        F: Fn(&GenerationRequest) -> LLMResult<String> + Send + Sync + 'static,
    {
        Self {
            route: Box::new(route),
            failures: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Always answers with `reply`.
    pub fn constant(reply: &str) -> Self {
        let reply = reply.to_string();
        Self::new(move |_| Ok(reply.clone()))
    }

    pub fn failing_first(self, failures: Vec<LLMError>) -> Self {
        *self.failures.lock().unwrap() = failures.into();
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn models_used(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.model.clone())
            .collect()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, request: GenerationRequest) -> LLMResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        if let Some(err) = self.failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        (self.route)(&request)
    }

    fn provider_name(&self) -> &'static str {
        "scripted"
    }
}

pub fn simple_config() -> PipelineConfig {
    PipelineConfig {
        variant: parley::GenerationVariant::Simple,
        annotate_emotions: false,
        retry_pause_ms: 0,
        ..PipelineConfig::default()
    }
}

pub const THREE_LINE_REPLY: &str = "1. Customer: My parcel has been stuck in the depot for a week now.\n\
2. Agent: I can see it in the system and will push it out today.\n\
3. Customer: Alright, I will wait until tomorrow then.";
