//! Serialization of the generated [`Document`] to YAML or JSON.
//!
//! Both formats render the same Swagger 2.0 structure; JSON output is
//! pretty-printed so it diffs cleanly under version control.

use crate::document::Document;
use anyhow::{Context, Result};
use log::debug;
use std::fs;
use std::path::Path;

/// Serializes a document to YAML.
///
/// # Arguments
///
/// * `doc` - The Swagger document to serialize
///
/// # Returns
///
/// Returns the YAML string representation of the document.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn serialize_yaml(doc: &Document) -> Result<String> {
    debug!("Serializing document to YAML");
    serde_yaml::to_string(doc).context("Failed to serialize document to YAML")
}

/// Serializes a document to indented JSON.
///
/// # Arguments
///
/// * `doc` - The Swagger document to serialize
///
/// # Returns
///
/// Returns the pretty-printed JSON string.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn serialize_json(doc: &Document) -> Result<String> {
    debug!("Serializing document to JSON");
    serde_json::to_string_pretty(doc).context("Failed to serialize document to JSON")
}

/// Writes `content` to `path`, creating missing parent directories and
/// overwriting an existing file.
///
/// # Arguments
///
/// * `content` - The serialized document
/// * `path` - Destination file
///
/// # Errors
///
/// Returns an error if a directory cannot be created or the file cannot be
/// written.
pub fn write_to_file(content: &str, path: &Path) -> Result<()> {
    debug!("Writing content to file: {}", path.display());

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    fs::write(path, content)
        .with_context(|| format!("Failed to write to file: {}", path.display()))?;

    debug!("Wrote {} bytes to {}", content.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{HttpMethod, Info, Operation, Response, Tag};
    use crate::model_registry::Schema;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn create_test_document() -> Document {
        let mut doc = Document::new(Info {
            title: "Test API".to_string(),
            version: "1.0.0".to_string(),
            description: Some("A test API".to_string()),
        });
        doc.base_path = Some("/api".to_string());
        doc.register_tag(Tag::new("users"));

        let mut responses = BTreeMap::new();
        responses.insert(
            "200".to_string(),
            Response::new("successful operation").with_schema(Some(Schema::reference("User"))),
        );
        doc.add_operation(
            "/users/{id}",
            HttpMethod::Get,
            Operation {
                tags: vec!["users".to_string()],
                summary: "Returns the user.".to_string(),
                operation_id: "getUser".to_string(),
                responses,
                ..Operation::default()
            },
        );
        doc
    }

    #[test]
    fn test_serialize_yaml() {
        let doc = create_test_document();
        let yaml = serialize_yaml(&doc).unwrap();

        assert!(yaml.contains("swagger: '2.0'") || yaml.contains("swagger: \"2.0\""));
        assert!(yaml.contains("title: Test API"));
        assert!(yaml.contains("basePath: /api"));
        assert!(yaml.contains("/users/{id}"));
        assert!(yaml.contains("get:"));
        assert!(yaml.contains("operationId: getUser"));
        assert!(yaml.contains("$ref: '#/definitions/User'") || yaml.contains("$ref: \"#/definitions/User\""));
    }

    #[test]
    fn test_serialize_json() {
        let doc = create_test_document();
        let json = serialize_json(&doc).unwrap();

        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["swagger"], "2.0");
        assert_eq!(parsed["info"]["title"], "Test API");
        assert_eq!(parsed["tags"][0]["name"], "users");
        let get = &parsed["paths"]["/users/{id}"]["get"];
        assert_eq!(get["summary"], "Returns the user.");
        assert_eq!(get["responses"]["200"]["schema"]["$ref"], "#/definitions/User");
    }

    #[test]
    fn test_serialize_json_pretty_format() {
        let doc = create_test_document();
        let json = serialize_json(&doc).unwrap();

        assert!(json.contains('\n'));
        assert!(json.contains("  "));
        assert!(json.lines().count() > 5, "Pretty printed JSON should span lines");
    }

    #[test]
    fn test_empty_sections_are_omitted() {
        let doc = Document::new(Info {
            title: "Empty".to_string(),
            version: "0".to_string(),
            description: None,
        });
        let json = serialize_json(&doc).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert!(parsed.get("definitions").is_none());
        assert!(parsed.get("tags").is_none());
        assert!(parsed.get("host").is_none());
        assert!(parsed["info"].get("description").is_none());
        assert!(parsed["paths"].is_object());
    }

    #[test]
    fn test_write_to_file() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("api.yaml");

        write_to_file("test content", &file_path).unwrap();

        assert_eq!(fs::read_to_string(&file_path).unwrap(), "test content");
    }

    #[test]
    fn test_write_to_file_creates_directories() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("docs").join("nested").join("api.json");

        write_to_file("{}", &file_path).unwrap();

        assert!(file_path.exists());
    }

    #[test]
    fn test_write_to_file_overwrites_existing() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("api.yaml");

        write_to_file("initial content", &file_path).unwrap();
        write_to_file("new content", &file_path).unwrap();

        assert_eq!(fs::read_to_string(&file_path).unwrap(), "new content");
    }

    #[test]
    fn test_write_json_file_end_to_end() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("swagger.json");

        let doc = create_test_document();
        write_to_file(&serialize_json(&doc).unwrap(), &file_path).unwrap();

        let content = fs::read_to_string(&file_path).unwrap();
        let restored: Document = serde_json::from_str(&content).unwrap();
        assert_eq!(restored.info.title, "Test API");
        assert!(restored.operation("/users/{id}", HttpMethod::Get).is_some());
    }
}
