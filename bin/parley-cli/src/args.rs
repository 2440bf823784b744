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

use anyhow::{anyhow, Result};
use clap::Args;
use parley::{GenerationVariant, PipelineConfig};

/// Overrides applied on top of the file and environment configuration.
#[derive(Args, Debug, Clone, Default)]
pub struct PipelineArgs {
    /// Generation path: story, scenes or simple.
    #[arg(long)]
    pub variant: Option<String>,

    /// Skip the emotion-annotation pass.
    #[arg(long, default_value_t = false)]
    pub no_emotions: bool,

    /// Dialogues built at the same time.
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Attempts per generator call.
    #[arg(long)]
    pub max_attempts: Option<u32>,
}

impl PipelineArgs {
    pub fn apply(&self, config: &mut PipelineConfig) -> Result<()> {
        if let Some(raw) = &self.variant {
            config.variant = GenerationVariant::parse(raw)
                .ok_or_else(|| anyhow!("unknown variant '{raw}', expected story, scenes or simple"))?;
        }
        if self.no_emotions {
            config.annotate_emotions = false;
        }
        if let Some(n) = self.concurrency {
            config.concurrency = n;
        }
        if let Some(n) = self.max_attempts {
            config.max_attempts = n;
        }
        config.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_apply() {
        let mut config = PipelineConfig::default();
        let args = PipelineArgs {
            variant: Some("Scenes".into()),
            no_emotions: true,
            concurrency: Some(8),
            max_attempts: None,
        };
        args.apply(&mut config).unwrap();
        assert_eq!(config.variant, GenerationVariant::Scenes);
        assert!(!config.annotate_emotions);
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.max_attempts, 3);
    }

    #[test]
    fn test_invalid_overrides_rejected() {
        let mut config = PipelineConfig::default();
        let bad_variant = PipelineArgs {
            variant: Some("novel".into()),
            ..PipelineArgs::default()
        };
        assert!(bad_variant.apply(&mut config).is_err());

        let zero = PipelineArgs {
            concurrency: Some(0),
            ..PipelineArgs::default()
        };
        assert!(zero.apply(&mut config).is_err());
    }
}
