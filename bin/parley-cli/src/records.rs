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
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use parley::{BatchFailure, BatchReport, DialogueRecord};
use serde::{Deserialize, Serialize};
use tracing::info;

pub const COMBINED_FILE: &str = "all_dialogues.json";

#[derive(Debug, Serialize, Deserialize)]
struct Combined {
    generated: String,
    count: usize,
    dialogues: Vec<DialogueRecord>,
    #[serde(default)]
    failures: Vec<BatchFailure>,
}

fn record_path(dir: &Path, index: usize, record: &DialogueRecord) -> PathBuf {
    dir.join(format!("dialogue_{:03}_seed{}.json", index + 1, record.seed))
}

/// One file per dialogue plus the combined file. Returns the combined path.
pub fn write_report(dir: &Path, report: &BatchReport) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;

    for (i, record) in report.dialogues.iter().enumerate() {
        let path = record_path(dir, i, record);
        fs::write(&path, serde_json::to_string_pretty(record)?)
            .with_context(|| format!("writing {}", path.display()))?;
    }

    let combined = Combined {
        generated: Utc::now().to_rfc3339(),
        count: report.dialogues.len(),
        dialogues: report.dialogues.clone(),
        failures: report.failures.clone(),
    };
    let path = dir.join(COMBINED_FILE);
    fs::write(&path, serde_json::to_string_pretty(&combined)?)
        .with_context(|| format!("writing {}", path.display()))?;
    info!(path = %path.display(), dialogues = combined.count, "Records written");
    Ok(path)
}

/// Reads the combined file, or every `dialogue_*.json` in name order when it is absent.
pub fn read_records(dir: &Path) -> Result<Vec<DialogueRecord>> {
    let combined = dir.join(COMBINED_FILE);
    if combined.exists() {
        let raw = fs::read_to_string(&combined)
            .with_context(|| format!("reading {}", combined.display()))?;
        let parsed: Combined = serde_json::from_str(&raw)
            .with_context(|| format!("parsing {}", combined.display()))?;
        return Ok(parsed.dialogues);
    }

    let mut paths: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("listing {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("dialogue_") && n.ends_with(".json"))
        })
        .collect();
    paths.sort();

    paths
        .iter()
        .map(|path| {
            let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
        })
        .collect()
}
