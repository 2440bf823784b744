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

use std::fs;

use parley::noise::CorpusBanks;
use parley::{GenerationVariant, PipelineConfig};
use tempfile::TempDir;

#[test]
fn test_yaml_file_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("parley.yaml");
    fs::write(
        &path,
        "variant: story\nmax_attempts: 5\nconcurrency: 2\nmodels:\n  writer: mistral:7b\n",
    )
    .unwrap();

    let config = PipelineConfig::from_path(&path).unwrap();
    assert_eq!(config.variant, GenerationVariant::Story);
    assert_eq!(config.max_attempts, 5);
    assert_eq!(config.concurrency, 2);
    assert_eq!(config.models.writer, "mistral:7b");
    assert_eq!(config.retry_pause_ms, 500);
    assert!(config.annotate_emotions);
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = TempDir::new().unwrap();
    let err = PipelineConfig::from_path(&dir.path().join("absent.yaml")).unwrap_err();
    assert!(matches!(err, parley::ConfigError::Io(_)));
}

#[test]
fn test_environment_overlays_file() {
    let mut config = PipelineConfig::from_yaml_str("variant: story\n").unwrap();
    config
        .apply_env_with(|key| match key {
            "PARLEY_VARIANT" => Some("scenes".to_string()),
            "MODEL_HEAVY" => Some("big-model".to_string()),
            _ => None,
        })
        .unwrap();
    assert_eq!(config.variant, GenerationVariant::Scenes);
    assert_eq!(config.models.heavy, "big-model");
}

#[test]
fn test_corpus_paths_feed_bank_loading() {
    let dir = TempDir::new().unwrap();
    let slang = dir.path().join("slang.json");
    fs::write(
        &slang,
        r#"[{"acronym": "ngl", "expansion": "not gonna lie", "weight": 2.0}]"#,
    )
    .unwrap();
    let yaml = format!("corpus:\n  slang: {}\n", slang.display());
    let config = PipelineConfig::from_yaml_str(&yaml).unwrap();

    let banks = CorpusBanks::load(config.corpus.slang.as_deref(), config.corpus.filler.as_deref());
    assert_eq!(banks.slang.len(), 1);
    assert_eq!(banks.slang[0].acronym, "ngl");
    assert!(banks.has_fillers());
}

#[test]
fn test_unreadable_bank_degrades_to_empty() {
    let dir = TempDir::new().unwrap();
    let filler = dir.path().join("filler.json");
    fs::write(&filler, "not json").unwrap();
    let banks = CorpusBanks::load(None, Some(&filler));
    assert!(!banks.has_fillers());
    assert!(!banks.slang.is_empty());
}
