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

//! Recovery of structured data from unreliable generator text.
//!
//! Strategies run in a fixed order and the first parse that succeeds wins:
//! fence stripping, trailing-comma removal, truncation repair, the first
//! embedded span, and finally a merge of every top-level object carrying a
//! scene list. All of them are pure.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fmt;
use tracing::{debug, warn};

use crate::errors::ExtractionError;

static FENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)```[ \t]*(?:json)?").expect("valid fence regex"));
static GREEDY_ARRAY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\[.*\]").expect("valid array regex"));
static GREEDY_OBJECT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\{.*\}").expect("valid object regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStrategy {
    Direct,
    TrailingCommas,
    TruncationRepair,
    EmbeddedSpan,
    MergedScenes,
}

impl fmt::Display for ExtractionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExtractionStrategy::Direct => "direct",
            ExtractionStrategy::TrailingCommas => "trailing_commas",
            ExtractionStrategy::TruncationRepair => "truncation_repair",
            ExtractionStrategy::EmbeddedSpan => "embedded_span",
            ExtractionStrategy::MergedScenes => "merged_scenes",
        };
        f.write_str(name)
    }
}

/// Parses `text` into a JSON value, trying every repair strategy in order.
pub fn extract(text: &str) -> Result<Value, ExtractionError> {
    extract_with_strategy(text).map(|(value, _)| value)
}

/// Like [`extract`], then deserializes into `T`.
pub fn extract_as<T: DeserializeOwned>(text: &str) -> Result<T, ExtractionError> {
    let value = extract(text)?;
    serde_json::from_value(value).map_err(|e| {
        warn!(error = %e, "Extracted JSON did not match the expected shape");
        ExtractionError::from_text(text)
    })
}

/// Parses `text` and reports which strategy produced the value.
pub fn extract_with_strategy(text: &str) -> Result<(Value, ExtractionStrategy), ExtractionError> {
    let cleaned = strip_fences(text);

    if let Some((value, strategy)) = parse_with_repairs(&cleaned) {
        debug!(strategy = %strategy, "Structured data extracted");
        return Ok((value, strategy));
    }

    for span in embedded_spans(&cleaned) {
        if let Some((value, _)) = parse_with_repairs(&span) {
            debug!(strategy = %ExtractionStrategy::EmbeddedSpan, "Structured data extracted");
            return Ok((value, ExtractionStrategy::EmbeddedSpan));
        }
    }

    if let Some(value) = merge_scene_objects(&cleaned) {
        debug!(strategy = %ExtractionStrategy::MergedScenes, "Structured data extracted");
        return Ok((value, ExtractionStrategy::MergedScenes));
    }

    warn!(len = text.len(), "No strategy could recover structured data");
    Err(ExtractionError::from_text(&cleaned))
}

/// Strategies 1 to 3 against one candidate string.
fn parse_with_repairs(candidate: &str) -> Option<(Value, ExtractionStrategy)> {
    if let Ok(v) = serde_json::from_str::<Value>(candidate) {
        return Some((v, ExtractionStrategy::Direct));
    }
    let without_commas = strip_trailing_commas(candidate);
    if let Ok(v) = serde_json::from_str::<Value>(&without_commas) {
        return Some((v, ExtractionStrategy::TrailingCommas));
    }
    for source in [candidate, without_commas.as_str()] {
        if let Some(repaired) = repair_truncation(source) {
            if let Ok(v) = serde_json::from_str::<Value>(&repaired) {
                return Some((v, ExtractionStrategy::TruncationRepair));
            }
            if let Ok(v) = serde_json::from_str::<Value>(&strip_trailing_commas(&repaired)) {
                return Some((v, ExtractionStrategy::TruncationRepair));
            }
        }
    }
    None
}

/// Removes code-fence markers and surrounding whitespace.
pub fn strip_fences(text: &str) -> String {
    FENCE_RE.replace_all(text, "").trim().to_string()
}

/// Drops commas that directly precede a closing bracket or brace, outside strings.
pub fn strip_trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;

    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        if c == '"' {
            in_string = true;
        } else if c == ',' {
            let next = chars[i + 1..].iter().find(|n| !n.is_whitespace());
            if matches!(next, Some('}') | Some(']')) {
                continue;
            }
        }
        out.push(c);
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    Key,
    Colon,
    Value,
    CommaOrClose,
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    close: u8,
    expect: Expect,
}

fn closers(stack: &[Frame]) -> String {
    stack.iter().rev().map(|f| f.close as char).collect()
}

fn is_complete_scalar(raw: &str) -> bool {
    matches!(
        serde_json::from_str::<Value>(raw.trim()),
        Ok(Value::Number(_) | Value::Bool(_) | Value::Null)
    )
}

/// Closes a document that was cut off mid-way.
///
/// Scans from the first bracket or brace, remembering the last position at
/// which every open container could be closed with a valid result. Whatever
/// follows that point (a dangling key, half a string, a trailing comma) is
/// dropped and the open containers are closed innermost first. A document
/// that is already balanced is returned as-is. `None` when the text holds no
/// container or is structurally broken rather than truncated.
pub fn repair_truncation(text: &str) -> Option<String> {
    let bytes = text.as_bytes();
    let start = bytes.iter().position(|b| *b == b'{' || *b == b'[')?;

    let mut stack: Vec<Frame> = Vec::new();
    let mut safe: Option<(usize, String)> = None;
    let mut in_string = false;
    let mut escaped = false;
    let mut string_is_key = false;
    let mut scalar_start: Option<usize> = None;

    let mut i = start;
    while i < bytes.len() {
        let b = bytes[i];

        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
                let top = stack.last_mut()?;
                if string_is_key {
                    top.expect = Expect::Colon;
                } else {
                    top.expect = Expect::CommaOrClose;
                    safe = Some((i + 1, closers(&stack)));
                }
            }
            i += 1;
            continue;
        }

        if let Some(s) = scalar_start {
            if matches!(b, b',' | b'}' | b']') || b.is_ascii_whitespace() {
                scalar_start = None;
                if !is_complete_scalar(&text[s..i]) {
                    return None;
                }
                stack.last_mut()?.expect = Expect::CommaOrClose;
                safe = Some((i, closers(&stack)));
            } else {
                i += 1;
                continue;
            }
        }

        match b {
            b if b.is_ascii_whitespace() => {}
            b'{' | b'[' => {
                if let Some(top) = stack.last_mut() {
                    if top.expect != Expect::Value {
                        return None;
                    }
                    top.expect = Expect::CommaOrClose;
                } else if i != start {
                    break;
                }
                let (close, expect) = if b == b'{' {
                    (b'}', Expect::Key)
                } else {
                    (b']', Expect::Value)
                };
                stack.push(Frame { close, expect });
                safe = Some((i + 1, closers(&stack)));
            }
            b'}' | b']' => {
                let top = stack.pop()?;
                if top.close != b || matches!(top.expect, Expect::Colon) {
                    return None;
                }
                if stack.is_empty() {
                    return Some(text[start..=i].to_string());
                }
                safe = Some((i + 1, closers(&stack)));
            }
            b'"' => {
                let top = stack.last()?;
                string_is_key = match (top.close, top.expect) {
                    (b'}', Expect::Key) => true,
                    (_, Expect::Value) => false,
                    _ => return None,
                };
                in_string = true;
            }
            b':' => {
                let top = stack.last_mut()?;
                if top.expect != Expect::Colon {
                    return None;
                }
                top.expect = Expect::Value;
            }
            b',' => {
                let top = stack.last_mut()?;
                if top.expect != Expect::CommaOrClose {
                    return None;
                }
                top.expect = if top.close == b'}' {
                    Expect::Key
                } else {
                    Expect::Value
                };
            }
            _ => {
                if stack.last()?.expect != Expect::Value {
                    return None;
                }
                scalar_start = Some(i);
            }
        }
        i += 1;
    }

    if let Some(s) = scalar_start {
        if !in_string && is_complete_scalar(&text[s..]) {
            safe = Some((bytes.len(), closers(&stack)));
        }
    }

    let (cut, tail) = safe?;
    Some(format!("{}{}", text[start..cut].trim_end(), tail))
}

/// Finds the first balanced span opened by `open`, ignoring brackets inside strings.
pub fn find_balanced_span(text: &str, open: char, close: char) -> Option<&str> {
    let mut depth = 0usize;
    let mut start = None;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        if c == '"' && start.is_some() {
            in_string = true;
        } else if c == open {
            if depth == 0 {
                start = Some(i);
            }
            depth += 1;
        } else if c == close && depth > 0 {
            depth -= 1;
            if depth == 0 {
                if let Some(s) = start {
                    return Some(&text[s..=i]);
                }
            }
        }
    }
    None
}

/// Candidate spans for strategy 4, most specific first.
fn embedded_spans(text: &str) -> Vec<String> {
    let first_open = text.find(['{', '[']);
    let mut spans: Vec<String> = Vec::new();
    let mut push = |s: &str| {
        if !s.is_empty() && s != text && !spans.iter().any(|x| x == s) {
            spans.push(s.to_string());
        }
    };

    let ordered = match first_open.map(|i| text.as_bytes()[i]) {
        Some(b'[') => [('[', ']'), ('{', '}')],
        _ => [('{', '}'), ('[', ']')],
    };
    for (open, close) in ordered {
        if let Some(span) = find_balanced_span(text, open, close) {
            push(span);
        }
    }
    for re in [&*GREEDY_ARRAY_RE, &*GREEDY_OBJECT_RE] {
        if let Some(m) = re.find(text) {
            push(m.as_str());
        }
    }
    if let Some(i) = first_open {
        push(&text[i..]);
    }
    spans
}

/// Every top-level balanced `{...}` span, in order of appearance.
pub fn top_level_objects(text: &str) -> Vec<&str> {
    let mut spans = Vec::new();
    let mut depth = 0usize;
    let mut start = None;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' if depth > 0 => in_string = true,
            '{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(s) = start.take() {
                        spans.push(&text[s..=i]);
                    }
                }
            }
            _ => {}
        }
    }
    spans
}

/// Strategy 5: concatenate the scene lists of every parseable top-level object.
fn merge_scene_objects(text: &str) -> Option<Value> {
    let mut scenes: Vec<Value> = Vec::new();
    for span in top_level_objects(text) {
        let parsed = serde_json::from_str::<Value>(span)
            .or_else(|_| serde_json::from_str::<Value>(&strip_trailing_commas(span)));
        let Ok(Value::Object(obj)) = parsed else {
            continue;
        };
        for (key, value) in obj {
            if key.to_lowercase().contains("scene") {
                if let Value::Array(items) = value {
                    scenes.extend(items);
                }
            }
        }
    }
    if scenes.is_empty() {
        return None;
    }
    let mut merged = Map::new();
    merged.insert("scenes".to_string(), Value::Array(scenes));
    Some(Value::Object(merged))
}
