//! The output document model (Swagger 2.0 shaped).
//!
//! A [`Document`] is created once per run and populated incrementally through
//! its registration calls: [`Document::add_operation`],
//! [`Document::register_model`] and [`Document::register_tag`]. All three are
//! idempotent, and the final content does not depend on registration order.

use crate::model_registry::{ModelDefinition, Schema};
use log::{debug, warn};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// HTTP methods an operation can be registered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Options,
    Head,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "get",
            HttpMethod::Post => "post",
            HttpMethod::Put => "put",
            HttpMethod::Delete => "delete",
            HttpMethod::Patch => "patch",
            HttpMethod::Options => "options",
            HttpMethod::Head => "head",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str().to_uppercase())
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "get" => Ok(HttpMethod::Get),
            "post" => Ok(HttpMethod::Post),
            "put" => Ok(HttpMethod::Put),
            "delete" => Ok(HttpMethod::Delete),
            "patch" => Ok(HttpMethod::Patch),
            "options" => Ok(HttpMethod::Options),
            "head" => Ok(HttpMethod::Head),
            other => Err(format!("unknown HTTP method: {}", other)),
        }
    }
}

/// Swagger Info object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Info {
    pub title: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A tag grouping operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Tag {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
        }
    }
}

/// Where a parameter is bound in the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParameterLocation {
    #[serde(rename = "path")]
    Path,
    #[serde(rename = "query")]
    Query,
    #[serde(rename = "header")]
    Header,
    #[serde(rename = "formData")]
    Form,
    #[serde(rename = "cookie")]
    Cookie,
    #[serde(rename = "body")]
    Body,
}

impl FromStr for ParameterLocation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "path" => Ok(ParameterLocation::Path),
            "query" => Ok(ParameterLocation::Query),
            "header" => Ok(ParameterLocation::Header),
            "form" | "formdata" => Ok(ParameterLocation::Form),
            "cookie" => Ok(ParameterLocation::Cookie),
            "body" => Ok(ParameterLocation::Body),
            other => Err(format!("unknown parameter location: {}", other)),
        }
    }
}

/// Swagger Parameter object.
///
/// Body parameters carry `schema`; every other location inlines the scalar
/// type fields (`type`, `format`, `items`, `enum`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "in")]
    pub location: ParameterLocation,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<Schema>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub param_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Schema>>,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

impl Parameter {
    /// Builds a parameter at `location` typed by `schema`.
    ///
    /// Path parameters are always required.
    pub fn new(name: impl Into<String>, location: ParameterLocation, schema: Schema) -> Self {
        let mut param = Self {
            name: name.into(),
            location,
            required: location == ParameterLocation::Path,
            description: None,
            schema: None,
            param_type: None,
            format: None,
            items: None,
            enum_values: None,
            default: None,
            pattern: None,
        };
        if location == ParameterLocation::Body {
            param.schema = Some(schema);
        } else {
            param.param_type = Some(schema.schema_type.unwrap_or_else(|| "string".to_string()));
            param.format = schema.format;
            param.items = schema.items;
            param.enum_values = schema.enum_values;
        }
        param
    }

    pub fn is_body(&self) -> bool {
        self.location == ParameterLocation::Body
    }
}

/// Swagger Response object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<Schema>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, Schema>,
}

impl Response {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            schema: None,
            headers: BTreeMap::new(),
        }
    }

    pub fn with_schema(mut self, schema: Option<Schema>) -> Self {
        self.schema = schema;
        self
    }
}

/// One security requirement: scheme name plus required scopes.
///
/// Serializes as `{name: [scopes]}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SecurityRequirement {
    pub name: String,
    pub scopes: Vec<String>,
}

impl Serialize for SecurityRequirement {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.name, &self.scopes)?;
        map.end()
    }
}

/// Swagger Operation object
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Operation {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    pub summary: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(rename = "operationId")]
    pub operation_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub schemes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub consumes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub produces: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Parameter>,
    pub responses: BTreeMap<String, Response>,
    #[serde(default, skip_serializing_if = "Vec::is_empty", skip_deserializing)]
    pub security: Vec<SecurityRequirement>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub deprecated: bool,
    #[serde(flatten)]
    pub vendor_extensions: BTreeMap<String, Value>,
}

impl Operation {
    pub fn body_parameter(&self) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.is_body())
    }
}

/// All operations registered under one path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub get: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub put: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patch: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head: Option<Operation>,
}

impl PathItem {
    pub fn operation(&self, method: HttpMethod) -> Option<&Operation> {
        match method {
            HttpMethod::Get => self.get.as_ref(),
            HttpMethod::Post => self.post.as_ref(),
            HttpMethod::Put => self.put.as_ref(),
            HttpMethod::Delete => self.delete.as_ref(),
            HttpMethod::Patch => self.patch.as_ref(),
            HttpMethod::Options => self.options.as_ref(),
            HttpMethod::Head => self.head.as_ref(),
        }
    }

    fn slot(&mut self, method: HttpMethod) -> &mut Option<Operation> {
        match method {
            HttpMethod::Get => &mut self.get,
            HttpMethod::Post => &mut self.post,
            HttpMethod::Put => &mut self.put,
            HttpMethod::Delete => &mut self.delete,
            HttpMethod::Patch => &mut self.patch,
            HttpMethod::Options => &mut self.options,
            HttpMethod::Head => &mut self.head,
        }
    }
}

/// The complete API document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub swagger: String,
    pub info: Info,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(rename = "basePath", skip_serializing_if = "Option::is_none")]
    pub base_path: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub schemes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub paths: BTreeMap<String, PathItem>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub definitions: BTreeMap<String, ModelDefinition>,
}

impl Document {
    pub fn new(info: Info) -> Self {
        Self {
            swagger: "2.0".to_string(),
            info,
            host: None,
            base_path: None,
            schemes: Vec::new(),
            tags: Vec::new(),
            paths: BTreeMap::new(),
            definitions: BTreeMap::new(),
        }
    }

    /// Registers an operation under `path` and `method`.
    ///
    /// When two different operations claim the same slot, the one with the
    /// lexicographically smaller operationId is kept.
    pub fn add_operation(&mut self, path: &str, method: HttpMethod, operation: Operation) {
        debug!("Registering {} {} ({})", method, path, operation.operation_id);
        let slot = self.paths.entry(path.to_string()).or_default().slot(method);
        match slot {
            Some(existing) if *existing == operation => {}
            Some(existing) => {
                warn!(
                    "Conflicting operations for {} {}: {} and {}",
                    method, path, existing.operation_id, operation.operation_id
                );
                if operation.operation_id < existing.operation_id {
                    *existing = operation;
                }
            }
            None => *slot = Some(operation),
        }
    }

    pub fn operation(&self, path: &str, method: HttpMethod) -> Option<&Operation> {
        self.paths.get(path).and_then(|item| item.operation(method))
    }

    /// Registers a model definition; an existing definition is never replaced.
    pub fn register_model(&mut self, name: &str, model: ModelDefinition) {
        self.definitions.entry(name.to_string()).or_insert(model);
    }

    /// Adds a tag, keeping tags sorted by name.
    ///
    /// A repeated tag only fills in a missing description.
    pub fn register_tag(&mut self, tag: Tag) {
        match self.tags.binary_search_by(|t| t.name.cmp(&tag.name)) {
            Ok(idx) => {
                let existing = &mut self.tags[idx];
                if existing.description.is_none() {
                    existing.description = tag.description;
                }
            }
            Err(idx) => self.tags.insert(idx, tag),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn operation(id: &str) -> Operation {
        Operation {
            operation_id: id.to_string(),
            ..Operation::default()
        }
    }

    fn document() -> Document {
        Document::new(Info {
            title: "Test API".to_string(),
            version: "1.0".to_string(),
            description: None,
        })
    }

    #[test]
    fn test_add_operation_is_idempotent() {
        let mut doc = document();
        doc.add_operation("/users", HttpMethod::Get, operation("list"));
        doc.add_operation("/users", HttpMethod::Get, operation("list"));
        doc.add_operation("/users", HttpMethod::Post, operation("create"));

        assert_eq!(doc.paths.len(), 1);
        assert_eq!(doc.operation("/users", HttpMethod::Get).unwrap().operation_id, "list");
        assert_eq!(doc.operation("/users", HttpMethod::Post).unwrap().operation_id, "create");
        assert!(doc.operation("/users", HttpMethod::Delete).is_none());
    }

    #[test]
    fn test_conflicting_operations_resolve_independent_of_order() {
        let mut first = document();
        first.add_operation("/a", HttpMethod::Get, operation("zeta"));
        first.add_operation("/a", HttpMethod::Get, operation("alpha"));

        let mut second = document();
        second.add_operation("/a", HttpMethod::Get, operation("alpha"));
        second.add_operation("/a", HttpMethod::Get, operation("zeta"));

        assert_eq!(first, second);
        assert_eq!(first.operation("/a", HttpMethod::Get).unwrap().operation_id, "alpha");
    }

    #[test]
    fn test_register_tag_sorted_and_merged() {
        let mut doc = document();
        doc.register_tag(Tag::new("users"));
        doc.register_tag(Tag::new("admin"));
        doc.register_tag(Tag {
            name: "users".to_string(),
            description: Some("User operations".to_string()),
        });

        let names: Vec<&str> = doc.tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["admin", "users"]);
        assert_eq!(doc.tags[1].description.as_deref(), Some("User operations"));
    }

    #[test]
    fn test_register_model_never_overwrites() {
        let mut doc = document();
        let mut first = ModelDefinition::object();
        first.description = Some("first".to_string());
        let mut second = ModelDefinition::object();
        second.description = Some("second".to_string());

        doc.register_model("User", first);
        doc.register_model("User", second);

        assert_eq!(doc.definitions["User"].description.as_deref(), Some("first"));
    }

    #[test]
    fn test_http_method_parse_and_display() {
        assert_eq!("GET".parse::<HttpMethod>().unwrap(), HttpMethod::Get);
        assert_eq!(" patch ".parse::<HttpMethod>().unwrap(), HttpMethod::Patch);
        assert!("fetch".parse::<HttpMethod>().is_err());
        assert_eq!(HttpMethod::Delete.to_string(), "DELETE");
    }

    #[test]
    fn test_security_requirement_serialization() {
        let requirement = SecurityRequirement {
            name: "oauth".to_string(),
            scopes: vec!["read".to_string()],
        };
        let json = serde_json::to_value(&requirement).unwrap();
        assert_eq!(json, serde_json::json!({ "oauth": ["read"] }));
    }

    #[test]
    fn test_non_body_parameter_inlines_type() {
        let param = Parameter::new("id", ParameterLocation::Path, Schema::scalar("integer", Some("int64")));
        assert!(param.required);
        assert!(param.schema.is_none());
        assert_eq!(param.param_type.as_deref(), Some("integer"));
        assert_eq!(param.format.as_deref(), Some("int64"));

        let json = serde_json::to_value(&param).unwrap();
        assert_eq!(json["in"], "path");
        assert_eq!(json["type"], "integer");
    }
}
