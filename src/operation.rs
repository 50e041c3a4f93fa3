//! Per-operation builder.
//!
//! Turns one routed method, under one resource and one verb, into an
//! [`Operation`]: summary and description, operationId, tags, media types,
//! parameters, responses, security, vendor extensions and schemes.

use crate::comments::CommentStore;
use crate::descriptor::{MethodDef, ServiceClass};
use crate::document::{HttpMethod, Operation, ParameterLocation, SecurityRequirement, Tag};
use crate::error::Result;
use crate::metadata::{Attributes, MarkerKind, Member, MetadataReader};
use crate::model_registry::ModelRegistry;
use crate::parameter::ParameterResolver;
use crate::response::ResponseResolver;
use indexmap::{IndexMap, IndexSet};
use log::debug;
use serde_json::Value;
use std::collections::BTreeMap;

/// Everything the builder needs to know about where a method is routed.
#[derive(Debug, Clone, Copy)]
pub struct RouteContext<'m> {
    /// Class whose resource the operation belongs to
    pub class: &'m ServiceClass,
    /// Class that declares the method (differs for inherited methods)
    pub declaring: &'m ServiceClass,
    pub method: &'m MethodDef,
    pub http_method: HttpMethod,
    /// Tags of the enclosing resource
    pub tags: &'m [Tag],
    /// Path variable name to regex, from `{name:regex}` templates
    pub path_patterns: &'m BTreeMap<String, String>,
}

pub struct OperationBuilder<'a> {
    metadata: &'a dyn MetadataReader,
    comments: &'a CommentStore,
    parameters: ParameterResolver<'a>,
    responses: ResponseResolver<'a>,
    operation_id_format: &'a str,
}

impl<'a> OperationBuilder<'a> {
    pub fn new(
        metadata: &'a dyn MetadataReader,
        comments: &'a CommentStore,
        parameters: ParameterResolver<'a>,
        responses: ResponseResolver<'a>,
        operation_id_format: &'a str,
    ) -> Self {
        Self {
            metadata,
            comments,
            parameters,
            responses,
            operation_id_format,
        }
    }

    /// Builds the operation, or `None` when it is hidden.
    pub fn build(&self, route: RouteContext<'_>, registry: &mut ModelRegistry<'a>) -> Result<Option<Operation>> {
        let method = route.method;
        let op = self.metadata.find(Member::Method(method), MarkerKind::Operation);
        if op.map_or(false, |o| o.bool("hidden")) {
            debug!("Operation {} is hidden", method.name);
            return Ok(None);
        }
        let mapping = self.metadata.find(Member::Method(method), MarkerKind::Mapping);

        let mut operation = Operation {
            summary: self.summary(&route, op, mapping),
            description: op
                .and_then(|o| o.non_empty("notes"))
                .unwrap_or_default()
                .to_string(),
            operation_id: op
                .and_then(|o| o.non_empty("nickname"))
                .map(str::to_string)
                .unwrap_or_else(|| self.operation_id(&route)),
            tags: tags(op, route.tags),
            deprecated: self.metadata.has(Member::Method(method), MarkerKind::Deprecated),
            ..Operation::default()
        };

        let class_mapping = self.metadata.find(Member::Class(route.class), MarkerKind::Mapping);
        operation.consumes = media_types("consumes", mapping, class_mapping, op);
        operation.produces = media_types("produces", mapping, class_mapping, op);

        operation.parameters = self.parameters.resolve(method, registry)?;
        for parameter in &mut operation.parameters {
            if parameter.location == ParameterLocation::Path {
                if let Some(pattern) = route.path_patterns.get(&parameter.name) {
                    parameter.pattern = Some(pattern.clone());
                }
            }
        }

        operation.responses = self.responses.resolve(method, registry);
        operation.security = self.security(&route, op);

        if let Some(op) = op {
            if let Some(extensions) = op.object("extensions") {
                for (key, value) in extensions {
                    if !key.is_empty() {
                        operation.vendor_extensions.insert(key.clone(), value.clone());
                    }
                }
            }
            operation.schemes = split_list(op.non_empty("protocols").unwrap_or_default());
        }

        Ok(Some(operation))
    }

    fn summary(&self, route: &RouteContext<'_>, op: Option<Attributes<'_>>, mapping: Option<Attributes<'_>>) -> String {
        if let Some(summary) = op.and_then(|o| o.non_empty("value")) {
            return summary.to_string();
        }
        if let Some(name) = mapping.and_then(|m| m.non_empty("name")) {
            return name.to_string();
        }
        self.comments
            .method_comment(&route.declaring.name, &route.method.name)
            .to_string()
    }

    fn operation_id(&self, route: &RouteContext<'_>) -> String {
        self.operation_id_format
            .replace("{{packageName}}", route.declaring.package_name())
            .replace("{{className}}", route.declaring.simple_name())
            .replace("{{methodName}}", &route.method.name)
            .replace("{{httpMethod}}", &route.http_method.to_string())
    }

    fn security(&self, route: &RouteContext<'_>, op: Option<Attributes<'_>>) -> Vec<SecurityRequirement> {
        let api = self.metadata.find(Member::Class(route.class), MarkerKind::Api);
        let mut merged: IndexMap<String, IndexSet<String>> = IndexMap::new();
        for source in [op, api].into_iter().flatten() {
            for auth in source.list("authorizations") {
                let Some(name) = auth.non_empty("value").or_else(|| auth.non_empty("name")) else {
                    continue;
                };
                let scopes = merged.entry(name.to_string()).or_default();
                for scope in scopes_of(&auth) {
                    scopes.insert(scope);
                }
            }
        }
        merged
            .into_iter()
            .map(|(name, scopes)| SecurityRequirement {
                name,
                scopes: scopes.into_iter().collect(),
            })
            .collect()
    }
}

/// Scopes given either as plain strings or as `{scope, description}` objects.
fn scopes_of(auth: &Attributes<'_>) -> Vec<String> {
    let Some(Value::Array(items)) = auth.value("scopes") else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(s.as_str()),
            Value::Object(map) => map.get("scope").and_then(Value::as_str),
            _ => None,
        })
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn tags(op: Option<Attributes<'_>>, resource_tags: &[Tag]) -> Vec<String> {
    let explicit: IndexSet<String> = op
        .map(|o| o.strings("tags"))
        .unwrap_or_default()
        .into_iter()
        .filter(|t| !t.is_empty())
        .collect();
    if !explicit.is_empty() {
        return explicit.into_iter().collect();
    }
    resource_tags
        .iter()
        .map(|t| t.name.clone())
        .collect::<IndexSet<_>>()
        .into_iter()
        .collect()
}

/// Method mapping values (class mapping when the method declares none),
/// unioned with the operation marker's values.
fn media_types(
    key: &str,
    mapping: Option<Attributes<'_>>,
    class_mapping: Option<Attributes<'_>>,
    op: Option<Attributes<'_>>,
) -> Vec<String> {
    let mut types: IndexSet<String> = mapping.map(|m| m.strings(key)).unwrap_or_default().into_iter().collect();
    if types.is_empty() {
        types = class_mapping.map(|m| m.strings(key)).unwrap_or_default().into_iter().collect();
    }
    for value in op.map(|o| o.strings(key)).unwrap_or_default() {
        types.extend(split_list(&value));
    }
    types.retain(|t| !t.is_empty());
    types.into_iter().collect()
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ExceptionStatus, ResponseOverride};
    use crate::descriptor::{Marker, ParamDef, TypeDef, TypeRef};
    use crate::metadata::DescriptorMetadata;
    use crate::model_registry::Schema;
    use crate::type_resolver::TypeResolver;
    use crate::validation::ValidationExtractor;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    struct Fixture {
        types: TypeResolver,
        metadata: DescriptorMetadata,
        comments: CommentStore,
        validation: ValidationExtractor,
        exceptions: BTreeMap<String, ExceptionStatus>,
        overrides: Vec<ResponseOverride>,
        format: String,
    }

    impl Fixture {
        fn new(format: &str) -> Self {
            let mut comments = CommentStore::new();
            comments.insert_method("com.acme.web.BaseController", "ping", "Health check.".to_string());
            Self {
                types: TypeResolver::new(vec![TypeDef::new("com.acme.User")]),
                metadata: DescriptorMetadata::new(),
                comments,
                validation: ValidationExtractor::new(),
                exceptions: BTreeMap::new(),
                overrides: Vec::new(),
                format: format.to_string(),
            }
        }

        fn build(&self, class: &ServiceClass, declaring: &ServiceClass, method: &MethodDef, verb: HttpMethod) -> Option<Operation> {
            let mut registry = ModelRegistry::new(&self.types, &self.metadata, &self.comments, &self.validation);
            let builder = OperationBuilder::new(
                &self.metadata,
                &self.comments,
                ParameterResolver::new(&self.metadata, &self.validation, &[]),
                ResponseResolver::new(&self.metadata, &self.exceptions, &self.overrides),
                &self.format,
            );
            let tags = vec![Tag::new("users")];
            let patterns = BTreeMap::from([("id".to_string(), "[0-9]+".to_string())]);
            let route = RouteContext {
                class,
                declaring,
                method,
                http_method: verb,
                tags: &tags,
                path_patterns: &patterns,
            };
            builder.build(route, &mut registry).unwrap()
        }
    }

    fn controller() -> ServiceClass {
        ServiceClass::new("com.acme.web.UserController")
            .marker(Marker::new("mapping").with("value", "/users").with("produces", json!(["application/json"])))
            .marker(Marker::new("api").with(
                "authorizations",
                json!([{ "value": "oauth", "scopes": [{ "scope": "read" }, { "scope": "" }] }]),
            ))
    }

    #[test]
    fn test_defaults_from_route_and_comments() {
        let fixture = Fixture::new("{{className}}_{{methodName}}_{{httpMethod}}");
        let base = ServiceClass::new("com.acme.web.BaseController");
        let class = controller();
        let method = MethodDef::new("ping");
        let operation = fixture.build(&class, &base, &method, HttpMethod::Get).unwrap();

        assert_eq!(operation.summary, "Health check.");
        assert_eq!(operation.description, "");
        assert_eq!(operation.operation_id, "BaseController_ping_GET");
        assert_eq!(operation.tags, vec!["users"]);
        assert_eq!(operation.produces, vec!["application/json"]);
        assert!(operation.consumes.is_empty());
        assert_eq!(operation.security, vec![SecurityRequirement { name: "oauth".to_string(), scopes: vec!["read".to_string()] }]);
        // no payload and no declared status
        assert_eq!(operation.responses.keys().collect::<Vec<_>>(), vec!["default"]);
        assert!(!operation.deprecated);
    }

    #[test]
    fn test_operation_marker_overrides() {
        let fixture = Fixture::new("{{packageName}}.{{methodName}}");
        let class = controller();
        let method = MethodDef::new("find")
            .returns(TypeRef::new("com.acme.User"))
            .param(ParamDef::new("id", TypeRef::new("long")).marker(Marker::new("path")))
            .marker(Marker::new("mapping").with("value", "/{id:[0-9]+}").with("name", "Mapping name"))
            .marker(Marker::new("deprecated"))
            .marker(
                Marker::new("operation")
                    .with("value", "Find a user")
                    .with("notes", "Looks the user up by id.")
                    .with("tags", json!(["admin", "", "admin", "users"]))
                    .with("produces", "application/xml, application/json")
                    .with("protocols", "https, wss")
                    .with("extensions", json!({ "x-owner": "team-a", "": "dropped" }))
                    .with("authorizations", json!([{ "value": "oauth", "scopes": ["write"] }, { "value": "" }])),
            );
        let operation = fixture.build(&class, &class, &method, HttpMethod::Get).unwrap();

        assert_eq!(operation.summary, "Find a user");
        assert_eq!(operation.description, "Looks the user up by id.");
        assert_eq!(operation.operation_id, "com.acme.web.find");
        assert_eq!(operation.tags, vec!["admin", "users"]);
        assert_eq!(operation.produces, vec!["application/json", "application/xml"]);
        assert_eq!(operation.schemes, vec!["https", "wss"]);
        assert_eq!(operation.vendor_extensions.len(), 1);
        assert_eq!(operation.vendor_extensions["x-owner"], json!("team-a"));
        assert!(operation.deprecated);
        assert_eq!(operation.parameters[0].pattern.as_deref(), Some("[0-9]+"));
        assert_eq!(operation.responses["200"].schema, Some(Schema::reference("User")));
        assert_eq!(
            operation.security,
            vec![SecurityRequirement {
                name: "oauth".to_string(),
                scopes: vec!["write".to_string(), "read".to_string()],
            }]
        );
    }

    #[test]
    fn test_mapping_name_and_nickname() {
        let fixture = Fixture::new("{{methodName}}");
        let class = ServiceClass::new("com.acme.web.OrderController");
        let method = MethodDef::new("list")
            .marker(Marker::new("mapping").with("name", "List orders"))
            .marker(Marker::new("operation").with("nickname", "listOrders"));
        let operation = fixture.build(&class, &class, &method, HttpMethod::Get).unwrap();
        assert_eq!(operation.summary, "List orders");
        assert_eq!(operation.operation_id, "listOrders");
        assert!(operation.security.is_empty());
    }

    #[test]
    fn test_hidden_operation() {
        let fixture = Fixture::new("{{methodName}}");
        let class = controller();
        let method = MethodDef::new("internal").marker(Marker::new("operation").with("hidden", true));
        assert!(fixture.build(&class, &class, &method, HttpMethod::Get).is_none());
    }
}
