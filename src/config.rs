//! Generator configuration.
//!
//! Loaded from a YAML or JSON file (chosen by extension, YAML otherwise).
//! Every field has a default so a partial file, or none at all, is valid;
//! CLI flags are applied on top before [`GeneratorConfig::validate`] runs.

use crate::comments::CommentStrategy;
use crate::document::{HttpMethod, Info};
use crate::error::{Error, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Which reader turns service classes into operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReaderKind {
    /// Route mapping markers drive paths and verbs
    #[default]
    Rest,
    /// Every provider method becomes `POST /{Class}/{method}`
    Rpc,
}

/// Which input classes are processed.
///
/// A class is selected when its simple name ends with one of `name_suffixes`
/// or it carries one of `markers`. Both lists empty selects every class.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    pub name_suffixes: Vec<String>,
    pub markers: Vec<String>,
}

/// A response added to every operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseOverride {
    pub code: u16,
    pub message: String,
}

/// Status documented for a declared exception.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExceptionStatus {
    pub code: u16,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub info: Info,
    pub host: Option<String>,
    pub base_path: Option<String>,
    pub schemes: Vec<String>,
    /// Template with `{{packageName}}`, `{{className}}`, `{{methodName}}`
    /// and `{{httpMethod}}` placeholders
    pub operation_id_format: String,
    /// Verb for routed methods that declare none and are not inferable
    pub default_http_method: Option<HttpMethod>,
    /// Types documented as opaque objects instead of being expanded
    pub types_to_skip: Vec<String>,
    pub response_wrappers: Vec<String>,
    pub source_roots: Vec<PathBuf>,
    pub source_extensions: Vec<String>,
    pub comment_strategy: CommentStrategy,
    pub reader: ReaderKind,
    pub selector: SelectorConfig,
    pub response_overrides: Vec<ResponseOverride>,
    /// Exception name (simple or qualified) to documented status
    pub exception_statuses: BTreeMap<String, ExceptionStatus>,
    /// Framework marker name to abstract marker kind
    pub marker_aliases: BTreeMap<String, String>,
    pub rpc_response_description: String,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            info: Info {
                title: String::new(),
                version: String::new(),
                description: None,
            },
            host: None,
            base_path: None,
            schemes: Vec::new(),
            operation_id_format: "{{methodName}}".to_string(),
            default_http_method: None,
            types_to_skip: Vec::new(),
            response_wrappers: vec!["ResponseEntity".to_string()],
            source_roots: Vec::new(),
            source_extensions: vec!["java".to_string()],
            comment_strategy: CommentStrategy::default(),
            reader: ReaderKind::default(),
            selector: SelectorConfig::default(),
            response_overrides: Vec::new(),
            exception_statuses: BTreeMap::new(),
            marker_aliases: BTreeMap::new(),
            rpc_response_description: "successful operation".to_string(),
        }
    }
}

impl GeneratorConfig {
    /// Reads a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading configuration from {}", path.display());
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .map_or(false, |e| e.eq_ignore_ascii_case("json"));
        let config = if is_json {
            serde_json::from_str(&content)
                .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?
        } else {
            serde_yaml::from_str(&content)
                .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?
        };
        Ok(config)
    }

    /// Checks the settings extraction cannot run without.
    pub fn validate(&self) -> Result<()> {
        if self.info.title.trim().is_empty() {
            return Err(Error::Config("info.title is required".to_string()));
        }
        if self.info.version.trim().is_empty() {
            return Err(Error::Config("info.version is required".to_string()));
        }
        if self.operation_id_format.trim().is_empty() {
            return Err(Error::Config("operation_id_format must not be empty".to_string()));
        }
        Ok(())
    }

    /// Selector used when none is configured: `*Provider` classes for RPC,
    /// every class for REST.
    pub fn effective_selector(&self) -> SelectorConfig {
        if self.reader == ReaderKind::Rpc
            && self.selector.name_suffixes.is_empty()
            && self.selector.markers.is_empty()
        {
            return SelectorConfig {
                name_suffixes: vec!["Provider".to_string()],
                markers: Vec::new(),
            };
        }
        self.selector.clone()
    }
}
