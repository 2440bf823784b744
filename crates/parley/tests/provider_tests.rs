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

use std::time::Duration;

use parley::{GenerationRequest, LLMError, OpenAICompatibleGenerator, TextGenerator};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn completion(content: &str) -> serde_json::Value {
    json!({
        "model": "llama3.1:8b",
        "choices": [{"message": {"role": "assistant", "content": content}, "finish_reason": "stop"}],
        "usage": {"prompt_tokens": 10, "completion_tokens": 4, "total_tokens": 14}
    })
}

fn generator(server: &MockServer, api_key: Option<&str>) -> OpenAICompatibleGenerator {
    OpenAICompatibleGenerator::new(
        format!("{}/v1/chat/completions", server.uri()),
        api_key.map(str::to_string),
        5,
        3,
    )
    .unwrap()
    .with_backoff(Duration::from_millis(1))
}

fn request() -> GenerationRequest {
    GenerationRequest::new("You write chats.", "Fill in: 1. Customer: [message]", "llama3.1:8b", 64)
}

#[tokio::test]
async fn test_successful_completion() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer secret"))
        .and(body_partial_json(json!({"model": "llama3.1:8b", "max_tokens": 64})))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("  1. Customer: hello \n")))
        .expect(1)
        .mount(&server)
        .await;

    let text = generator(&server, Some("secret")).generate(request()).await.unwrap();
    assert_eq!(text, "1. Customer: hello");
}

#[tokio::test]
async fn test_rate_limit_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("ok")))
        .expect(1)
        .mount(&server)
        .await;

    let text = generator(&server, None).generate(request()).await.unwrap();
    assert_eq!(text, "ok");
}

#[tokio::test]
async fn test_bad_request_is_permanent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_string("unknown model"))
        .expect(1)
        .mount(&server)
        .await;

    let err = generator(&server, None).generate(request()).await.unwrap_err();
    assert!(matches!(err, LLMError::Configuration(_)));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_server_errors_exhaust_retries() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let err = generator(&server, None).generate(request()).await.unwrap_err();
    assert!(matches!(err, LLMError::Provider(_)));
}

#[tokio::test]
async fn test_missing_content_is_provider_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    let err = generator(&server, None).generate(request()).await.unwrap_err();
    assert!(matches!(err, LLMError::Provider(_)));
}
