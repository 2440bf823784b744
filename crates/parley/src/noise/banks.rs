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

//! Read-only slang and filler banks.
//!
//! A bank that cannot be read or parsed is replaced by an empty one; the
//! transforms that draw from it then never fire.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::errors::CorpusError;

const BUILTIN_SLANG: &str = include_str!("../../corpus/slang_bank.json");
const BUILTIN_FILLER: &str = include_str!("../../corpus/filler_bank.json");

fn default_weight() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlangEntry {
    pub acronym: String,
    pub expansion: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillerEntry {
    pub word: String,
    #[serde(default = "default_weight")]
    pub prob: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct FillerFile {
    #[serde(default)]
    filled_pauses: Vec<FillerEntry>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CorpusBanks {
    pub slang: Vec<SlangEntry>,
    pub filled_pauses: Vec<FillerEntry>,
}

impl CorpusBanks {
    /// Banks compiled into the crate.
    pub fn builtin() -> Self {
        let slang = serde_json::from_str(BUILTIN_SLANG).unwrap_or_else(|e| {
            warn!(error = %e, "Built-in slang bank unreadable");
            Vec::new()
        });
        let filled_pauses = serde_json::from_str::<FillerFile>(BUILTIN_FILLER)
            .map(|f| f.filled_pauses)
            .unwrap_or_else(|e| {
                warn!(error = %e, "Built-in filler bank unreadable");
                Vec::new()
            });
        Self { slang, filled_pauses }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn read_slang(path: &Path) -> Result<Vec<SlangEntry>, CorpusError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn read_filler(path: &Path) -> Result<Vec<FillerEntry>, CorpusError> {
        let raw = fs::read_to_string(path)?;
        let file: FillerFile = serde_json::from_str(&raw)?;
        Ok(file.filled_pauses)
    }

    /// Loads each bank from its path, or from the built-in copy when no path
    /// is given. A bank that fails to load is left empty.
    pub fn load(slang_path: Option<&Path>, filler_path: Option<&Path>) -> Self {
        let builtin = Self::builtin();

        let slang = match slang_path {
            None => builtin.slang,
            Some(path) => Self::read_slang(path).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "Slang bank unavailable, slang substitution from bank disabled");
                Vec::new()
            }),
        };
        let filled_pauses = match filler_path {
            None => builtin.filled_pauses,
            Some(path) => Self::read_filler(path).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "Filler bank unavailable, filler prepend disabled");
                Vec::new()
            }),
        };

        info!(
            slang_entries = slang.len(),
            filler_entries = filled_pauses.len(),
            "Corpus banks loaded"
        );
        Self { slang, filled_pauses }
    }

    pub fn has_fillers(&self) -> bool {
        !self.filled_pauses.is_empty()
    }

    pub fn pick_filler<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&str> {
        self.filled_pauses
            .choose_weighted(rng, |e| e.prob)
            .ok()
            .map(|e| e.word.as_str())
    }

    pub fn pick_slang<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&SlangEntry> {
        self.slang.choose_weighted(rng, |e| e.weight).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::io::Write;

    #[test]
    fn test_builtin_banks_parse() {
        let banks = CorpusBanks::builtin();
        assert!(!banks.slang.is_empty());
        assert!(banks.has_fillers());
    }

    #[test]
    fn test_missing_file_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        let banks = CorpusBanks::load(Some(&missing), Some(&missing));
        assert!(banks.slang.is_empty());
        assert!(!banks.has_fillers());
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(banks.pick_filler(&mut rng).is_none());
        assert!(banks.pick_slang(&mut rng).is_none());
    }

    #[test]
    fn test_load_from_files_with_default_weights() {
        let dir = tempfile::tempdir().unwrap();
        let slang = dir.path().join("slang.json");
        let mut f = fs::File::create(&slang).unwrap();
        write!(f, r#"[{{"acronym":"np","expansion":"no problem"}}]"#).unwrap();
        let filler = dir.path().join("filler.json");
        fs::write(&filler, r#"{"filled_pauses":[{"word":"erm"}],"discourse_markers":[]}"#)
            .unwrap();

        let banks = CorpusBanks::load(Some(&slang), Some(&filler));
        assert_eq!(banks.slang[0].weight, 1.0);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        assert_eq!(banks.pick_filler(&mut rng), Some("erm"));
    }

    #[test]
    fn test_malformed_bank_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            CorpusBanks::read_slang(&path),
            Err(CorpusError::Json(_))
        ));
    }
}
