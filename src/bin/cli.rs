#![cfg(not(tarpaulin_include))]

//! Command-line front end: build a proposal, list the history, show the catalog.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use log::error;
use proposal_builder::{
    AssemblyRequest, HistoryStore, ProposalBuilder, ProposalConfig, ScopedImage, UploadPolicy,
};

#[derive(Parser)]
#[command(name = "proposal", about = "Build technical proposals from template fragments")]
struct Cli {
    /// Configuration file (defaults to ./proposal.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Assemble a proposal and record it in the history
    Build {
        /// Customer name
        #[arg(long)]
        customer: String,
        /// Project name
        #[arg(long)]
        project: String,
        /// Technology fragment to include; repeat in the order wanted
        #[arg(long = "tech")]
        technologies: Vec<String>,
        /// Model fragment to include; repeat in the order wanted
        #[arg(long = "model")]
        models: Vec<String>,
        /// Customer logo image
        #[arg(long)]
        logo: Option<PathBuf>,
        /// Network topology image for the Design section
        #[arg(long)]
        topology: Option<PathBuf>,
        /// Free-text design description
        #[arg(long, default_value = "")]
        description: String,
    },
    /// List previous submissions
    History,
    /// Show the technologies and models that can be selected
    Catalog,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            error!("{e}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let config = ProposalConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Build {
            customer,
            project,
            technologies,
            models,
            logo,
            topology,
            description,
        } => {
            let policy = UploadPolicy::from(&config.uploads);
            let mut request = AssemblyRequest {
                technologies,
                models,
                design_description: description,
                ..AssemblyRequest::new(customer, project)
            };
            request.logo = match logo {
                Some(path) => Some(stage_image("logo", &path, &policy)?),
                None => None,
            };
            request.topology = match topology {
                Some(path) => Some(stage_image("topology", &path, &policy)?),
                None => None,
            };

            let report = ProposalBuilder::new(config).create(request)?;
            println!("{}", report.path.display());
            if report.is_complete() {
                return Ok(ExitCode::SUCCESS);
            }
            for missing in &report.missing {
                eprintln!("missing section {missing}");
            }
            // Written, but incomplete.
            Ok(ExitCode::from(2))
        }
        Command::History => {
            let records = HistoryStore::new(config.output.history_file.clone()).load()?;
            if records.is_empty() {
                println!("No submissions yet.");
            }
            for record in records {
                println!(
                    "{}  {} / {}  {}",
                    record.created_at.format("%Y-%m-%d %H:%M"),
                    record.customer,
                    record.project,
                    record.filename
                );
                if !record.missing.is_empty() {
                    let ids: Vec<&str> = record.missing.iter().map(|m| m.id.as_str()).collect();
                    println!("    missing: {}", ids.join(", "));
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Catalog => {
            println!("Technologies:");
            for id in &config.catalog.technologies {
                println!("  {id}  ({})", config.technology_path(id).display());
            }
            println!("Models:");
            for id in &config.catalog.models {
                println!("  {id}  ({})", config.model_path(id).display());
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn stage_image(
    field: &'static str,
    path: &Path,
    policy: &UploadPolicy,
) -> Result<ScopedImage, Box<dyn std::error::Error>> {
    let image = ScopedImage::from_path(field, path, policy)
        .map_err(|e| format!("cannot read {field} image {}: {e}", path.display()))??;
    Ok(image)
}
