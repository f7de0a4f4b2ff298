// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//! Archivum administration binary.
//!
//! Opens the repository described by the `ARCHIVUM_*` environment variables
//! and runs maintenance jobs against it, printing each finished job as JSON.

use anyhow::{bail, Context, Result};
use archivum_index::EntityType;
use archivum_jobs::{Job, JobState, Repository, RepositoryConfig, SelectedObjects};
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "archivum-admin", version, about = "Archivum repository administration")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Rebuild the index from the store.
    Reindex {
        /// Entity types to reindex (default: all).
        #[arg(long = "type", value_name = "TYPE")]
        types: Vec<EntityType>,
        /// Empty each index collection first.
        #[arg(long)]
        clear: bool,
        /// Optimize afterwards. Follows --clear when omitted.
        #[arg(long)]
        optimize: Option<bool>,
    },
    /// Verify file digests of every AIP.
    Fixity,
    /// List the available plugins.
    Plugins,
    /// List persisted jobs.
    Jobs,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    tracing::info!(command = ?cli.command, "archivum-admin starting");
    let config = RepositoryConfig::from_env().context("reading configuration")?;
    let repo = Repository::open(config).await.context("opening repository")?;

    match cli.command {
        Command::Reindex {
            types,
            clear,
            optimize,
        } => {
            let types = if types.is_empty() {
                EntityType::ALL.to_vec()
            } else {
                types
            };
            let mut jobs = Vec::new();
            for entity_type in types {
                let mut job = Job::new(
                    format!("Reindex {entity_type}"),
                    format!("reindex-{}", entity_type.key()),
                    entity_type.key(),
                    SelectedObjects::All,
                )
                .with_parameter("clear_indexes", clear.to_string());
                if let Some(optimize) = optimize {
                    job = job.with_parameter("optimize_indexes", optimize.to_string());
                }
                jobs.push(job);
            }
            run_jobs(&repo, jobs).await
        }
        Command::Fixity => {
            let job = Job::new("Fixity check", "fixity-check", "aip", SelectedObjects::All);
            run_jobs(&repo, vec![job]).await
        }
        Command::Plugins => {
            for id in repo.jobs().registry().ids().await {
                println!("{id}");
            }
            Ok(())
        }
        Command::Jobs => {
            let jobs = repo.jobs().list().await?;
            println!("{}", serde_json::to_string_pretty(&jobs)?);
            Ok(())
        }
    }
}

async fn run_jobs(repo: &Repository, jobs: Vec<Job>) -> Result<()> {
    let mut failed = 0;
    for job in jobs {
        let job = repo.jobs().create(job).await?;
        let job = repo.jobs().run(&job.id).await?;
        println!("{}", serde_json::to_string_pretty(&job)?);
        if job.state == JobState::Failed {
            failed += 1;
        }
    }
    if failed > 0 {
        bail!("{failed} job(s) failed");
    }
    Ok(())
}
