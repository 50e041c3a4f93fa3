//! Swagger 2.0 documentation for annotated service classes.
//!
//! The input is a [`descriptor::Manifest`]: a language-neutral description of
//! service classes, their methods and parameters, the annotations ("markers")
//! on each, and the data types they exchange. Human-readable summaries come
//! from doc comments in the matching source tree.
//!
//! # Architecture
//!
//! 1. [`scanner`] - Recursively finds source files under each source root
//! 2. [`comments`] - Extracts doc comments into a [`comments::CommentStore`]
//! 3. [`metadata`] - Normalizes framework markers into abstract kinds
//! 4. [`type_resolver`] - Classifies type references
//! 5. [`model_registry`] - Turns data types into schemas and model definitions
//! 6. [`validation`] - Derives `x-rules` and required flags from constraints
//! 7. [`parameter`] / [`response`] / [`operation`] - Build one operation
//! 8. [`collector`] - REST reader; [`rpc`] - RPC provider reader
//! 9. [`serializer`] - Writes the [`document::Document`] as YAML or JSON
//!
//! # Example Usage
//!
//! ```no_run
//! use service_apidoc::{
//!     comments::CommentStore,
//!     config::GeneratorConfig,
//!     descriptor::Manifest,
//!     generate,
//!     serializer::serialize_yaml,
//! };
//! use std::path::Path;
//!
//! let config = GeneratorConfig::load(Path::new("apidoc.yaml")).unwrap();
//! let manifest = Manifest::load(Path::new("manifest.yaml")).unwrap();
//! let comments = CommentStore::build(
//!     &config.source_roots,
//!     &config.source_extensions,
//!     config.comment_strategy,
//! );
//!
//! let document = generate(&manifest, &comments, &config).unwrap();
//! println!("{}", serialize_yaml(&document).unwrap());
//! ```
//!
//! For command-line usage, see the [`cli`] module.

pub mod cli;
pub mod collector;
pub mod comments;
pub mod config;
pub mod descriptor;
pub mod document;
pub mod error;
pub mod metadata;
pub mod model_registry;
pub mod operation;
pub mod parameter;
pub mod response;
pub mod rpc;
pub mod scanner;
pub mod serializer;
pub mod type_resolver;
pub mod validation;

pub use collector::generate;
