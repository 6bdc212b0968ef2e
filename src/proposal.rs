//! Creating a proposal end to end: validate, assemble, save, record.

use std::path::{Path, PathBuf};

use chrono::Utc;
use lazy_static::lazy_static;
use log::{info, warn};
use regex::Regex;
use serde::Serialize;
use uuid::Uuid;

use crate::assembler::{Assembler, AssemblyRequest, FileSystemSource, MissingFragment, TemplateSource};
use crate::config::ProposalConfig;
use crate::error::{DocxError, PersistenceError, ProposalError};
use crate::history::{HistoryStore, SubmissionRecord};

lazy_static! {
    /// Characters that cannot appear in a file name on common file systems.
    static ref UNSAFE_FILENAME_CHARS: Regex = Regex::new(r#"[/\\:*?"<>|\x00-\x1F]"#).unwrap();
}

/// Output file name for a proposal.
///
/// # Arguments
/// * `customer` - Customer name, already trimmed
/// * `project` - Project name, already trimmed
/// * `version` - Version label
///
/// # Examples
/// ```
/// use proposal_builder::proposal::output_filename;
///
/// assert_eq!(
///     output_filename("Acme", "NetUpgrade", "1.0"),
///     "Acme_NetUpgrade_Technical Proposal ver 1.0.docx"
/// );
/// assert_eq!(
///     output_filename("A/B", "x:y", "1.0"),
///     "A-B_x-y_Technical Proposal ver 1.0.docx"
/// );
/// ```
pub fn output_filename(customer: &str, project: &str, version: &str) -> String {
    format!(
        "{}_{}_Technical Proposal ver {version}.docx",
        UNSAFE_FILENAME_CHARS.replace_all(customer, "-"),
        UNSAFE_FILENAME_CHARS.replace_all(project, "-"),
    )
}

/// Outcome of a successful [`ProposalBuilder::create`].
#[derive(Debug, Clone, Serialize)]
pub struct ProposalReport {
    pub record_id: Uuid,
    pub filename: String,
    pub path: PathBuf,
    pub sections: Vec<String>,
    /// Fragments that were skipped; empty when the proposal is complete.
    pub missing: Vec<MissingFragment>,
}

impl ProposalReport {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Ties the assembler, the output directory and the history store together.
pub struct ProposalBuilder<S = FileSystemSource> {
    config: ProposalConfig,
    source: S,
    history: HistoryStore,
}

impl ProposalBuilder<FileSystemSource> {
    pub fn new(config: ProposalConfig) -> Self {
        Self::with_source(config, FileSystemSource)
    }
}

impl<S: TemplateSource> ProposalBuilder<S> {
    pub fn with_source(config: ProposalConfig, source: S) -> Self {
        let history = HistoryStore::new(config.output.history_file.clone());
        ProposalBuilder {
            config,
            source,
            history,
        }
    }

    pub fn config(&self) -> &ProposalConfig {
        &self.config
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn output_dir(&self) -> &Path {
        &self.config.output.dir
    }

    /// Produce the proposal for `request`, write it and record it.
    ///
    /// Nothing is written when validation or the master template fails. A
    /// write failure after assembly is reported as
    /// [`ProposalError::Persistence`]; a document already written stays.
    pub fn create(&self, mut request: AssemblyRequest) -> Result<ProposalReport, ProposalError> {
        request.validate(&self.config)?;

        let filename = output_filename(&request.customer, &request.project, &self.config.output.version);
        let mut record = SubmissionRecord {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            customer: request.customer.clone(),
            project: request.project.clone(),
            logo: request.logo.as_ref().map(|i| i.original_name().to_string()),
            topology: request.topology.as_ref().map(|i| i.original_name().to_string()),
            technologies: request.technologies.clone(),
            models: request.models.clone(),
            design_description: request.design_description.clone(),
            filename: filename.clone(),
            missing: Vec::new(),
        };

        let assembled = Assembler::with_source(&self.config, &self.source).assemble(request)?;

        let path = self.config.output.dir.join(&filename);
        std::fs::create_dir_all(&self.config.output.dir)
            .map_err(DocxError::from)
            .and_then(|()| assembled.document.save(&path))
            .map_err(|source| PersistenceError::Document {
                path: path.clone(),
                source,
            })?;
        info!("wrote {}", path.display());

        if !assembled.missing.is_empty() {
            let ids: Vec<&str> = assembled.missing.iter().map(|m| m.id.as_str()).collect();
            warn!("{filename} is missing {}", ids.join(", "));
        }
        record.missing = assembled.missing.clone();
        let record_id = record.id;
        self.history.append(record).map_err(PersistenceError::from)?;

        Ok(ProposalReport {
            record_id,
            filename,
            path,
            sections: assembled.sections,
            missing: assembled.missing,
        })
    }
}
