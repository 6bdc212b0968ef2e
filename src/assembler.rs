//! Building one proposal document out of template fragments.
//!
//! The output is always laid out as
//!
//! ```text
//! master | technologies (selection order) | Design | models (selection order)
//! ```
//!
//! The master is mandatory: if it cannot be loaded or its logo cannot be
//! placed, assembly stops. Any other fragment that fails is skipped and
//! reported in [`Assembled::missing`] while the rest are still appended.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::config::ProposalConfig;
use crate::docx::{Composer, Document};
use crate::error::{DocxError, ProposalError, ValidationError};
use crate::placeholder::{substitute_image, substitute_text};
use crate::upload::ScopedImage;

/// Everything a user supplies for one proposal.
#[derive(Debug, Default)]
pub struct AssemblyRequest {
    pub customer: String,
    pub project: String,
    pub logo: Option<ScopedImage>,
    pub topology: Option<ScopedImage>,
    pub technologies: Vec<String>,
    pub models: Vec<String>,
    pub design_description: String,
}

impl AssemblyRequest {
    pub fn new(customer: impl Into<String>, project: impl Into<String>) -> Self {
        AssemblyRequest {
            customer: customer.into(),
            project: project.into(),
            ..Default::default()
        }
    }

    /// Normalise the request in place and check it against the catalog.
    ///
    /// Names are trimmed and must not be empty. Selections are trimmed,
    /// blanks dropped and repeats removed keeping the first occurrence; each
    /// remaining id must be in the catalog.
    pub fn validate(&mut self, config: &ProposalConfig) -> Result<(), ValidationError> {
        self.customer = self.customer.trim().to_string();
        self.project = self.project.trim().to_string();
        if self.customer.is_empty() {
            return Err(ValidationError::MissingField("customer name"));
        }
        if self.project.is_empty() {
            return Err(ValidationError::MissingField("project name"));
        }

        dedup_ordered(&mut self.technologies);
        dedup_ordered(&mut self.models);
        if let Some(id) = self.technologies.iter().find(|id| !config.is_technology(id)) {
            return Err(ValidationError::UnknownSelection {
                kind: "technology",
                id: id.clone(),
            });
        }
        if let Some(id) = self.models.iter().find(|id| !config.is_model(id)) {
            return Err(ValidationError::UnknownSelection {
                kind: "model",
                id: id.clone(),
            });
        }
        Ok(())
    }
}

fn dedup_ordered(ids: &mut Vec<String>) {
    let mut seen = HashSet::new();
    for id in ids.iter_mut() {
        *id = id.trim().to_string();
    }
    ids.retain(|id| !id.is_empty() && seen.insert(id.clone()));
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FragmentKind {
    Technology,
    Design,
    Model,
}

/// A template fragment scheduled for appending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub kind: FragmentKind,
    pub id: String,
    pub path: PathBuf,
}

/// Fragments for a validated request, in output order.
pub fn plan(request: &AssemblyRequest, config: &ProposalConfig) -> Vec<Fragment> {
    let technologies = request.technologies.iter().map(|id| Fragment {
        kind: FragmentKind::Technology,
        id: id.clone(),
        path: config.technology_path(id),
    });
    let design = std::iter::once(Fragment {
        kind: FragmentKind::Design,
        id: "Design".to_string(),
        path: config.design_path(),
    });
    let models = request.models.iter().map(|id| Fragment {
        kind: FragmentKind::Model,
        id: id.clone(),
        path: config.model_path(id),
    });
    technologies.chain(design).chain(models).collect()
}

/// A fragment that could not be added, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingFragment {
    pub id: String,
    pub reason: String,
}

impl fmt::Display for MissingFragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.id, self.reason)
    }
}

/// The finished document plus what went into it.
#[derive(Debug)]
pub struct Assembled {
    pub document: Document,
    /// Ids of the fragments appended after the master, in order.
    pub sections: Vec<String>,
    pub missing: Vec<MissingFragment>,
}

impl Assembled {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Where templates come from.
pub trait TemplateSource {
    fn load(&self, path: &Path) -> Result<Document, DocxError>;
}

/// Reads templates from disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSystemSource;

impl TemplateSource for FileSystemSource {
    fn load(&self, path: &Path) -> Result<Document, DocxError> {
        Document::open(path)
    }
}

impl<T: TemplateSource + ?Sized> TemplateSource for &T {
    fn load(&self, path: &Path) -> Result<Document, DocxError> {
        (**self).load(path)
    }
}

pub struct Assembler<'c, S = FileSystemSource> {
    config: &'c ProposalConfig,
    source: S,
}

impl<'c> Assembler<'c, FileSystemSource> {
    pub fn new(config: &'c ProposalConfig) -> Self {
        Assembler {
            config,
            source: FileSystemSource,
        }
    }
}

impl<'c, S: TemplateSource> Assembler<'c, S> {
    pub fn with_source(config: &'c ProposalConfig, source: S) -> Self {
        Assembler { config, source }
    }

    /// Assemble the proposal described by `request`.
    ///
    /// The request owns its uploaded images. Whatever happens, they are gone
    /// from disk when this returns: each is released right after it has been
    /// embedded, and anything left over is dropped with the request.
    ///
    /// # Returns
    /// * `Ok(Assembled)` - The document; check `missing` for skipped fragments
    /// * `Err(ProposalError::Validation)` - Bad request; no template was loaded
    /// * `Err(ProposalError::MasterLoad | MasterImage)` - The master is unusable
    pub fn assemble(&self, mut request: AssemblyRequest) -> Result<Assembled, ProposalError> {
        request.validate(self.config)?;
        let fragments = plan(&request, self.config);
        let placeholders = &self.config.placeholders;
        info!(
            "assembling proposal for {:?} / {:?} with {} fragment(s)",
            request.customer,
            request.project,
            fragments.len()
        );

        let master_path = self.config.master_path();
        let mut master = self
            .source
            .load(&master_path)
            .map_err(|source| ProposalError::MasterLoad {
                path: master_path.clone(),
                source,
            })?;

        if let Some(logo) = request.logo.take() {
            substitute_image(&mut master, &placeholders.logo.token, logo.path(), placeholders.logo.width)
                .map_err(|source| ProposalError::MasterImage {
                    token: placeholders.logo.token.clone(),
                    source,
                })?;
            logo.release();
        }
        substitute_text(master.body_mut(), &placeholders.project, &request.project);
        substitute_text(master.body_mut(), &placeholders.customer, &request.customer);

        let mut composer = Composer::new(master);
        let mut sections = Vec::with_capacity(fragments.len());
        let mut missing = Vec::new();
        for fragment in fragments {
            match self.append_fragment(&mut composer, &fragment, &mut request) {
                Ok(()) => sections.push(fragment.id),
                Err(e) => {
                    warn!("skipping {} ({}): {e}", fragment.id, fragment.path.display());
                    missing.push(MissingFragment {
                        id: fragment.id,
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            "assembled {} section(s), {} missing",
            sections.len(),
            missing.len()
        );
        Ok(Assembled {
            document: composer.into_document(),
            sections,
            missing,
        })
    }

    fn append_fragment(
        &self,
        composer: &mut Composer,
        fragment: &Fragment,
        request: &mut AssemblyRequest,
    ) -> Result<(), DocxError> {
        let placeholders = &self.config.placeholders;
        let mut document = self.source.load(&fragment.path)?;
        substitute_text(document.body_mut(), &placeholders.customer, &request.customer);

        if fragment.kind == FragmentKind::Design {
            if let Some(topology) = request.topology.take() {
                substitute_image(
                    &mut document,
                    &placeholders.design_image.token,
                    topology.path(),
                    placeholders.design_image.width,
                )?;
                topology.release();
            }
            substitute_text(
                document.body_mut(),
                &placeholders.design_description,
                &request.design_description,
            );
        }

        composer.append(document)
    }
}
