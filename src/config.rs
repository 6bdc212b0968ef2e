//! Runtime configuration.
//!
//! Everything has a default, so an absent or partial `proposal.toml` works.
//! The configuration is loaded once at startup and handed to the assembler,
//! the proposal service and the web/CLI front ends; nothing mutates it later.

use std::path::{Path, PathBuf};

use log::info;
use serde::{Deserialize, Serialize};

use crate::docx::Inches;
use crate::error::ConfigError;

/// Config file looked up in the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "proposal.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProposalConfig {
    pub templates: TemplateConfig,
    pub output: OutputConfig,
    pub placeholders: PlaceholderConfig,
    pub uploads: UploadConfig,
    pub catalog: CatalogConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateConfig {
    /// Directory holding the master, Design and technology fragments.
    pub base_dir: PathBuf,
    pub master: String,
    pub design: String,
    /// Subdirectory of `base_dir` holding one fragment per model.
    pub models_dir: String,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        TemplateConfig {
            base_dir: PathBuf::from("templates"),
            master: "section0.docx".to_string(),
            design: "Design.docx".to_string(),
            models_dir: "Models".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub history_file: PathBuf,
    /// Version label written into every output file name.
    pub version: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            dir: PathBuf::from("output"),
            history_file: PathBuf::from("submissions.json"),
            version: "1.0".to_string(),
        }
    }
}

/// A marker that is replaced by a picture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImagePlaceholder {
    pub token: String,
    pub width: Inches,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaceholderConfig {
    pub customer: String,
    pub project: String,
    pub design_description: String,
    pub logo: ImagePlaceholder,
    pub design_image: ImagePlaceholder,
}

impl Default for PlaceholderConfig {
    fn default() -> Self {
        PlaceholderConfig {
            customer: "<<Customer Name>>".to_string(),
            project: "(Proj)".to_string(),
            // The shipped templates spell it this way.
            design_description: "<<Design Describtion>>".to_string(),
            logo: ImagePlaceholder {
                token: "(Logo)".to_string(),
                width: Inches(1.25),
            },
            design_image: ImagePlaceholder {
                token: "<<Design>>".to_string(),
                width: Inches(6.0),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub max_size_mb: u64,
    /// Accepted image subtypes / extensions, lowercase.
    pub allowed_types: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        UploadConfig {
            max_size_mb: 10,
            allowed_types: vec!["png".to_string(), "jpg".to_string(), "jpeg".to_string()],
        }
    }
}

impl UploadConfig {
    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_mb.saturating_mul(1024 * 1024)
    }
}

/// Fragment identifiers offered to users, in display order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub technologies: Vec<String>,
    pub models: Vec<String>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        let ids = |list: &[&str]| list.iter().map(|s| s.to_string()).collect();
        CatalogConfig {
            technologies: ids(&["NGFW", "SD-WAN", "ZTNA", "SASE", "NAC", "SIEM"]),
            models: ids(&["FG-60F", "FG-100F", "FG-200F", "FG-401F", "FG-601F", "FG-1001F"]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind: "127.0.0.1:3000".to_string(),
        }
    }
}

impl ProposalConfig {
    /// Load configuration from `path`.
    ///
    /// # Arguments
    /// * `path` - Explicit config file, or `None` to try [`DEFAULT_CONFIG_FILE`]
    ///
    /// # Returns
    /// * `Ok(ProposalConfig)` - Parsed config; defaults when no file applies
    /// * `Err(ConfigError)` - An explicit file could not be read, or any file failed to parse
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let fallback = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !fallback.exists() {
                    info!("no {DEFAULT_CONFIG_FILE} found, using defaults");
                    return Ok(ProposalConfig::default());
                }
                fallback
            }
        };

        let contents = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let config = Self::from_toml(&contents)?;
        info!("loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn master_path(&self) -> PathBuf {
        self.templates.base_dir.join(&self.templates.master)
    }

    pub fn design_path(&self) -> PathBuf {
        self.templates.base_dir.join(&self.templates.design)
    }

    pub fn technology_path(&self, id: &str) -> PathBuf {
        self.templates.base_dir.join(format!("{id}.docx"))
    }

    pub fn model_path(&self, id: &str) -> PathBuf {
        self.templates
            .base_dir
            .join(&self.templates.models_dir)
            .join(format!("{id}.docx"))
    }

    pub fn is_technology(&self, id: &str) -> bool {
        self.catalog.technologies.iter().any(|t| t == id)
    }

    pub fn is_model(&self, id: &str) -> bool {
        self.catalog.models.iter().any(|m| m == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_shipped_templates() {
        let config = ProposalConfig::default();
        assert_eq!(config.master_path(), Path::new("templates/section0.docx"));
        assert_eq!(config.design_path(), Path::new("templates/Design.docx"));
        assert_eq!(config.model_path("FG-601F"), Path::new("templates/Models/FG-601F.docx"));
        assert_eq!(config.technology_path("NGFW"), Path::new("templates/NGFW.docx"));
        assert_eq!(config.placeholders.logo.width, Inches(1.25));
        assert_eq!(config.placeholders.design_image.width, Inches(6.0));
        assert_eq!(config.uploads.max_size_bytes(), 10 * 1024 * 1024);
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let config = ProposalConfig::from_toml(
            r#"
[templates]
base_dir = "/srv/tpb"

[catalog]
technologies = ["NGFW"]

[placeholders.logo]
token = "[LOGO]"
width = 2.0
"#,
        )
        .unwrap();
        assert_eq!(config.templates.base_dir, PathBuf::from("/srv/tpb"));
        assert_eq!(config.templates.master, "section0.docx");
        assert_eq!(config.catalog.technologies, vec!["NGFW"]);
        assert!(config.is_model("FG-601F"));
        assert!(!config.is_technology("SASE"));
        assert_eq!(config.placeholders.logo.token, "[LOGO]");
        assert_eq!(config.placeholders.logo.width, Inches(2.0));
        assert_eq!(config.placeholders.customer, "<<Customer Name>>");
    }

    #[test]
    fn malformed_toml_is_an_error() {
        assert!(matches!(
            ProposalConfig::from_toml("templates = 3"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let err = ProposalConfig::load(Some(Path::new("/nonexistent/proposal.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn serialised_defaults_parse_back() {
        let text = toml::to_string(&ProposalConfig::default()).unwrap();
        assert_eq!(ProposalConfig::from_toml(&text).unwrap(), ProposalConfig::default());
    }
}
