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

mod args;
mod records;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use parley::{
    build_generator, render_transcript, BatchReport, DialoguePipeline, PipelineConfig,
    ScenarioSampler, ScenarioTables,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use args::PipelineArgs;

#[derive(Subcommand, Debug, Clone)]
enum Commands {
    /// Print the scenario a seed produces.
    Sample {
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Build dialogues from sampled scenarios.
    Generate {
        #[arg(long, default_value_t = 1)]
        count: usize,

        /// First seed; later dialogues use the following seeds.
        #[arg(long)]
        seed: Option<u64>,

        #[arg(long, default_value = "output")]
        output: PathBuf,

        #[command(flatten)]
        pipeline: PipelineArgs,
    },

    /// Build dialogues over the fixed topic/outcome/style rotation.
    Batch {
        #[arg(long, default_value_t = 10)]
        count: usize,

        #[arg(long, default_value_t = 100_000)]
        base_seed: u64,

        #[arg(long, default_value = "output")]
        output: PathBuf,

        #[command(flatten)]
        pipeline: PipelineArgs,
    },

    /// Write a readable transcript of stored records.
    Render {
        #[arg(long, default_value = "output")]
        input: PathBuf,

        /// Transcript file; stdout when omitted.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Parser, Debug, Clone)]
#[command(name = "parley-cli")]
#[command(about = "Generate, sample and render synthetic support dialogues")]
struct Cli {
    #[arg(long, default_value_t = false)]
    debug: bool,

    /// YAML pipeline configuration; environment variables override it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("debug,reqwest=info,hyper=info,h2=info,hyper_util=info"))
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,reqwest=warn,hyper=warn,h2=warn,hyper_util=warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn load_config(cli: &Cli, overrides: &PipelineArgs) -> Result<PipelineConfig> {
    let mut config = PipelineConfig::load(cli.config.as_deref()).context("loading configuration")?;
    overrides.apply(&mut config)?;
    Ok(config)
}

/// Writes the report, prints failures, and fails when any dialogue did.
fn finish(report: &BatchReport, dir: &Path) -> Result<()> {
    let path = records::write_report(dir, report)?;
    println!(
        "{} dialogue(s) written to {}",
        report.dialogues.len(),
        path.display()
    );
    for failure in &report.failures {
        eprintln!(
            "dialogue #{} (seed={}) failed: {}",
            failure.index + 1,
            failure.seed,
            failure.error
        );
    }
    if !report.is_clean() {
        bail!("{} dialogue(s) failed", report.failures.len());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.debug);

    match &cli.command {
        Commands::Sample { seed } => {
            let sampler = ScenarioSampler::new(ScenarioTables::default())?;
            let params = sampler.sample(*seed);
            println!("{}", serde_json::to_string_pretty(&params)?);
        }
        Commands::Generate {
            count,
            seed,
            output,
            pipeline,
        } => {
            let config = load_config(&cli, pipeline)?;
            info!(variant = %config.variant, count = count, "Generating dialogues");
            let generator = build_generator(&config.backend)?;
            let pipeline = DialoguePipeline::new(generator, config)?;
            let report = pipeline.run_batch(*count, *seed).await;
            finish(&report, output)?;
        }
        Commands::Batch {
            count,
            base_seed,
            output,
            pipeline,
        } => {
            let config = load_config(&cli, pipeline)?;
            info!(variant = %config.variant, count = count, base_seed = base_seed, "Generating balanced batch");
            let generator = build_generator(&config.backend)?;
            let pipeline = DialoguePipeline::new(generator, config)?;
            let report = pipeline.run_balanced(*count, *base_seed).await;
            finish(&report, output)?;
        }
        Commands::Render { input, output } => {
            let dialogues = records::read_records(input)?;
            if dialogues.is_empty() {
                warn!(input = %input.display(), "No dialogue records found");
            }
            let transcript = render_transcript(&dialogues);
            match output {
                Some(path) => {
                    fs::write(path, transcript)
                        .with_context(|| format!("writing {}", path.display()))?;
                    println!("{} dialogue(s) rendered to {}", dialogues.len(), path.display());
                }
                None => print!("{transcript}"),
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_arguments() {
        let cli = Cli::try_parse_from([
            "parley-cli",
            "--config",
            "parley.yaml",
            "batch",
            "--count",
            "4",
            "--base-seed",
            "7",
            "--variant",
            "story",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("parley.yaml")));
        match cli.command {
            Commands::Batch {
                count,
                base_seed,
                pipeline,
                ..
            } => {
                assert_eq!(count, 4);
                assert_eq!(base_seed, 7);
                assert_eq!(pipeline.variant.as_deref(), Some("story"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_generate_defaults() {
        let cli = Cli::try_parse_from(["parley-cli", "generate"]).unwrap();
        match cli.command {
            Commands::Generate {
                count,
                seed,
                output,
                ..
            } => {
                assert_eq!(count, 1);
                assert_eq!(seed, None);
                assert_eq!(output, PathBuf::from("output"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
