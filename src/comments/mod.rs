//! Comment store built from the original source text.
//!
//! Every documentation block (`/** ... */`) that precedes a method or field
//! is reduced to a single summary line and indexed by the declaring type's
//! qualified name (`com.acme.UserController`, nested types as
//! `com.acme.Outer.Inner`) and the member name. Lookups that miss return an
//! empty string; the store is never a source of errors.
//!
//! Two interchangeable extraction strategies exist:
//!
//! - [`syntax::SyntaxExtractor`] parses each file with the tree-sitter Java
//!   grammar and understands nested types.
//! - [`regex_scan::RegexExtractor`] scans for documentation blocks followed by
//!   optional markers and a member signature.

pub mod regex_scan;
pub mod syntax;

use crate::error::Result;
use crate::scanner::FileScanner;
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

static INLINE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{@\w+\s*([^}]*)\}").unwrap());

static BLOCK_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?:^|\s)@\w+").unwrap());

/// Which extractor builds the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentStrategy {
    #[default]
    Syntax,
    Regex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    Method,
    Field,
}

/// One documented member found in a source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedComment {
    /// Qualified declaring type, nested types joined with `.`
    pub type_name: String,
    pub member: String,
    pub kind: MemberKind,
    /// Cleaned single-line summary
    pub text: String,
}

/// Extracts documented members from one source file.
pub trait CommentExtractor {
    fn extract(&mut self, source: &str) -> Result<Vec<ExtractedComment>>;
}

#[derive(Debug, Clone, Default)]
struct TypeComments {
    methods: HashMap<String, String>,
    fields: HashMap<String, String>,
}

/// Immutable lookup of member documentation, keyed by declaring type
#[derive(Debug, Clone, Default)]
pub struct CommentStore {
    types: HashMap<String, TypeComments>,
}

fn type_key(type_name: &str) -> String {
    type_name.replace('$', ".")
}

impl CommentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scans every source root and extracts comments with `strategy`.
    ///
    /// Missing roots, unreadable files and parse failures are logged and
    /// skipped.
    pub fn build(roots: &[PathBuf], extensions: &[String], strategy: CommentStrategy) -> Self {
        let mut extractor: Box<dyn CommentExtractor> = match strategy {
            CommentStrategy::Syntax => match syntax::SyntaxExtractor::new() {
                Ok(extractor) => Box::new(extractor),
                Err(e) => {
                    warn!("Syntax extractor unavailable ({}), falling back to regex", e);
                    Box::new(regex_scan::RegexExtractor::new())
                }
            },
            CommentStrategy::Regex => Box::new(regex_scan::RegexExtractor::new()),
        };

        let mut store = Self::new();
        for root in roots {
            if !root.is_dir() {
                warn!("Source root {} is not a directory, skipping", root.display());
                continue;
            }
            let scan = match FileScanner::new(root.clone())
                .with_extensions(extensions)
                .scan()
            {
                Ok(scan) => scan,
                Err(e) => {
                    warn!("Failed to scan {}: {}", root.display(), e);
                    continue;
                }
            };
            debug!("Found {} source files under {}", scan.source_files.len(), root.display());

            for file in &scan.source_files {
                let source = match fs::read_to_string(file) {
                    Ok(source) => source,
                    Err(e) => {
                        warn!("Failed to read {}: {}", file.display(), e);
                        continue;
                    }
                };
                match extractor.extract(&source) {
                    Ok(comments) => store.add_all(comments),
                    Err(e) => warn!("Skipping comments of {}: {}", file.display(), e),
                }
            }
        }
        info!("Comment store holds {} documented types", store.len());
        store
    }

    /// Adds extracted comments; the first non-empty text per member wins.
    pub fn add_all(&mut self, comments: Vec<ExtractedComment>) {
        for comment in comments {
            match comment.kind {
                MemberKind::Method => self.insert_method(&comment.type_name, &comment.member, comment.text),
                MemberKind::Field => self.insert_field(&comment.type_name, &comment.member, comment.text),
            }
        }
    }

    pub fn insert_method(&mut self, type_name: &str, method: &str, text: String) {
        if text.is_empty() {
            return;
        }
        self.types
            .entry(type_key(type_name))
            .or_default()
            .methods
            .entry(method.to_string())
            .or_insert(text);
    }

    pub fn insert_field(&mut self, type_name: &str, field: &str, text: String) {
        if text.is_empty() {
            return;
        }
        self.types
            .entry(type_key(type_name))
            .or_default()
            .fields
            .entry(field.to_string())
            .or_insert(text);
    }

    /// Summary of `method` declared on `type_name`, or `""`.
    pub fn method_comment(&self, type_name: &str, method: &str) -> &str {
        self.types
            .get(&type_key(type_name))
            .and_then(|t| t.methods.get(method))
            .map_or("", String::as_str)
    }

    /// Summary of `field` declared on `type_name`, or `""`.
    pub fn field_comment(&self, type_name: &str, field: &str) -> &str {
        self.types
            .get(&type_key(type_name))
            .and_then(|t| t.fields.get(field))
            .map_or("", String::as_str)
    }

    /// Number of types with at least one documented member.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

/// Reduces a raw `/** ... */` block to a one-line summary.
///
/// Leading `*` gutters are removed, inline tags such as `{@code id}` keep
/// only their text, and everything from the first block tag (`@param`,
/// `@return`, ...) on is dropped.
pub fn clean_doc(raw: &str) -> String {
    let body = raw.trim();
    let body = body.strip_prefix("/**").unwrap_or(body);
    let body = body.strip_suffix("*/").unwrap_or(body);
    let joined = body
        .lines()
        .map(|line| line.trim().trim_start_matches('*').trim())
        .collect::<Vec<_>>()
        .join(" ");
    let inlined = INLINE_TAG.replace_all(&joined, "$1");
    let summary = match BLOCK_TAG.find(&inlined) {
        Some(tag) => &inlined[..tag.start()],
        None => &inlined[..],
    };
    summary.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Joins a namespace and a type path with `.`.
pub(crate) fn qualify(namespace: &str, type_path: &str) -> String {
    if namespace.is_empty() {
        type_path.to_string()
    } else {
        format!("{}.{}", namespace, type_path)
    }
}
