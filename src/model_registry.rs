//! Model registry: one reusable definition per distinct type.
//!
//! Type identity is the canonical qualified name including generic arguments
//! (`com.acme.Page<com.acme.User>`). Each identity is assigned a definition
//! name once (`Page«User»`, or the qualified form when the simple name is
//! already taken by another identity) and every reference to it uses that
//! name. Expansion is recursive: a type that is still being expanded further
//! up the stack resolves to a plain reference, so self-referential types
//! terminate with a single definition.

use crate::comments::CommentStore;
use crate::descriptor::{simple_name, TypeDef, TypeRef};
use crate::document::ParameterLocation;
use crate::metadata::{MarkerKind, Member, MetadataReader};
use crate::type_resolver::{TypeKind, TypeResolver};
use crate::validation::ValidationExtractor;
use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Prefix of every model reference.
pub const DEFINITIONS_PREFIX: &str = "#/definitions/";

/// Vendor extension holding validation rules.
pub const RULES_EXTENSION: &str = "x-rules";

/// Swagger Schema object (as used for properties, parameters and responses)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(rename = "$ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Schema>>,
    #[serde(rename = "additionalProperties", skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<Box<Schema>>,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
    #[serde(flatten)]
    pub vendor_extensions: BTreeMap<String, Value>,
}

impl Schema {
    pub fn scalar(schema_type: &str, format: Option<&str>) -> Self {
        Self {
            schema_type: Some(schema_type.to_string()),
            format: format.map(str::to_string),
            ..Self::default()
        }
    }

    /// An untyped object, used for opaque and unresolvable types.
    pub fn object() -> Self {
        Self::scalar("object", None)
    }

    /// A reference to the named definition.
    pub fn reference(name: &str) -> Self {
        Self {
            reference: Some(format!("{}{}", DEFINITIONS_PREFIX, name)),
            ..Self::default()
        }
    }

    pub fn array(items: Schema) -> Self {
        Self {
            schema_type: Some("array".to_string()),
            items: Some(Box::new(items)),
            ..Self::default()
        }
    }

    pub fn map(values: Schema) -> Self {
        Self {
            schema_type: Some("object".to_string()),
            additional_properties: Some(Box::new(values)),
            ..Self::default()
        }
    }

    /// Name of the referenced definition, if this is a reference.
    pub fn reference_name(&self) -> Option<&str> {
        self.reference
            .as_deref()
            .and_then(|r| r.strip_prefix(DEFINITIONS_PREFIX))
    }

    fn referenced_names<'s>(&'s self, out: &mut Vec<&'s str>) {
        if let Some(name) = self.reference_name() {
            out.push(name);
        }
        if let Some(items) = &self.items {
            items.referenced_names(out);
        }
        if let Some(values) = &self.additional_properties {
            values.referenced_names(out);
        }
    }
}

/// A reusable type definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDefinition {
    #[serde(rename = "type")]
    pub model_type: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub properties: IndexMap<String, Schema>,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub vendor_extensions: BTreeMap<String, Value>,
}

impl ModelDefinition {
    pub fn object() -> Self {
        Self {
            model_type: "object".to_string(),
            required: Vec::new(),
            properties: IndexMap::new(),
            enum_values: None,
            description: None,
            vendor_extensions: BTreeMap::new(),
        }
    }

    pub fn enumeration(values: Vec<String>) -> Self {
        Self {
            model_type: "string".to_string(),
            enum_values: Some(values),
            ..Self::object()
        }
    }
}

/// Registry of model definitions discovered during extraction
pub struct ModelRegistry<'a> {
    types: &'a TypeResolver,
    metadata: &'a dyn MetadataReader,
    comments: &'a CommentStore,
    validation: &'a ValidationExtractor,
    /// Identity -> definition name
    names: HashMap<String, String>,
    /// Definition name -> identity
    owners: HashMap<String, String>,
    definitions: BTreeMap<String, ModelDefinition>,
}

impl<'a> ModelRegistry<'a> {
    pub fn new(
        types: &'a TypeResolver,
        metadata: &'a dyn MetadataReader,
        comments: &'a CommentStore,
        validation: &'a ValidationExtractor,
    ) -> Self {
        debug!("Initializing ModelRegistry");
        Self {
            types,
            metadata,
            comments,
            validation,
            names: HashMap::new(),
            owners: HashMap::new(),
            definitions: BTreeMap::new(),
        }
    }

    pub fn types(&self) -> &'a TypeResolver {
        self.types
    }

    /// Schema for `ty`, registering every model it reaches.
    pub fn resolve(&mut self, ty: &TypeRef) -> Schema {
        let mut in_progress = HashSet::new();
        self.resolve_with(ty, &mut in_progress)
    }

    /// Schema for a parameter bound outside the body. Enums are inlined as
    /// string values, also as array items, and registered only for bodies.
    pub fn resolve_parameter(&mut self, ty: &TypeRef, location: ParameterLocation) -> Schema {
        if location == ParameterLocation::Body {
            return self.resolve(ty);
        }
        match self.types.classify(ty) {
            TypeKind::Enum(def) => Schema {
                enum_values: Some(def.enum_values.clone().unwrap_or_default()),
                ..Schema::scalar("string", None)
            },
            TypeKind::Array(item) => Schema::array(self.resolve_parameter(&item, location)),
            _ => self.resolve(ty),
        }
    }

    /// Registers `ty` and returns the names of all models reachable from it.
    pub fn register_all(&mut self, ty: &TypeRef) -> BTreeSet<String> {
        let schema = self.resolve(ty);
        self.reachable_from(&schema)
    }

    /// Names of the definitions reachable from `schema` through references.
    pub fn reachable_from(&self, schema: &Schema) -> BTreeSet<String> {
        let mut reached = BTreeSet::new();
        let mut pending = Vec::new();
        schema.referenced_names(&mut pending);
        while let Some(name) = pending.pop() {
            if !reached.insert(name.to_string()) {
                continue;
            }
            if let Some(model) = self.definitions.get(name) {
                for property in model.properties.values() {
                    property.referenced_names(&mut pending);
                }
            }
        }
        reached
    }

    pub fn definition(&self, name: &str) -> Option<&ModelDefinition> {
        self.definitions.get(name)
    }

    pub fn definitions(&self) -> &BTreeMap<String, ModelDefinition> {
        &self.definitions
    }

    pub fn into_definitions(self) -> BTreeMap<String, ModelDefinition> {
        self.definitions
    }

    /// Sets a model-level vendor extension on an already registered model.
    pub fn set_extension(&mut self, name: &str, key: &str, value: Value) -> bool {
        match self.definitions.get_mut(name) {
            Some(model) => {
                model.vendor_extensions.insert(key.to_string(), value);
                true
            }
            None => false,
        }
    }

    fn resolve_with(&mut self, ty: &TypeRef, in_progress: &mut HashSet<String>) -> Schema {
        let types = self.types;
        match types.classify(ty) {
            TypeKind::Void | TypeKind::Unknown => Schema::object(),
            TypeKind::Primitive(primitive) => primitive.to_schema(),
            TypeKind::Array(item) => Schema::array(self.resolve_with(&item, in_progress)),
            TypeKind::Map(value) => Schema::map(self.resolve_with(&value, in_progress)),
            TypeKind::Enum(def) => {
                let canonical = TypeRef::new(def.name.replace('$', "."));
                let name = self.definition_name(&canonical);
                if !self.definitions.contains_key(&name) {
                    let mut model = ModelDefinition::enumeration(def.enum_values.clone().unwrap_or_default());
                    model.description = self.type_description(def);
                    self.definitions.insert(name.clone(), model);
                }
                Schema::reference(&name)
            }
            TypeKind::Composite(def, canonical) => {
                let identity = canonical.to_string();
                let name = self.definition_name(&canonical);
                if self.definitions.contains_key(&name) || in_progress.contains(&identity) {
                    return Schema::reference(&name);
                }
                debug!("Expanding model {} as {}", identity, name);
                in_progress.insert(identity.clone());
                let model = self.build_model(def, &canonical.args, in_progress);
                in_progress.remove(&identity);
                self.definitions.entry(name.clone()).or_insert(model);
                Schema::reference(&name)
            }
        }
    }

    fn build_model(
        &mut self,
        def: &'a TypeDef,
        args: &[TypeRef],
        in_progress: &mut HashSet<String>,
    ) -> ModelDefinition {
        let mut model = ModelDefinition::object();
        model.description = self.type_description(def);

        let types = self.types;
        for resolved in types.fields_of(def, args) {
            let field = &resolved.field;
            let property = self.metadata.find(Member::Field(field), MarkerKind::Property);
            if property.map_or(false, |p| p.bool("hidden")) {
                continue;
            }
            let name = property
                .and_then(|p| p.non_empty("name"))
                .unwrap_or(&field.name)
                .to_string();

            let mut schema = self.resolve_with(&field.ty, in_progress);
            let description = property
                .and_then(|p| p.non_empty("value").or_else(|| p.non_empty("description")))
                .map(str::to_string)
                .or_else(|| {
                    let comment = self.comments.field_comment(resolved.owner, &field.name);
                    (!comment.is_empty()).then(|| comment.to_string())
                });
            if description.is_some() {
                schema.description = description;
            }

            let rules = self.validation.rules_for_field(self.metadata, field);
            let required_by_rule = rules
                .iter()
                .any(|r| r.get("required") == Some(&Value::Bool(true)));
            if property.map_or(false, |p| p.bool("required")) || required_by_rule {
                model.required.push(name.clone());
            }
            if !rules.is_empty() {
                schema.vendor_extensions.insert(
                    RULES_EXTENSION.to_string(),
                    Value::Array(rules.into_iter().map(Value::Object).collect()),
                );
            }
            model.properties.insert(name, schema);
        }

        if let Some(extensions) = self
            .metadata
            .find(Member::Type(def), MarkerKind::Property)
            .and_then(|p| p.object("extensions"))
        {
            merge_extensions(&mut model.vendor_extensions, extensions);
        }
        model
    }

    fn type_description(&self, def: &TypeDef) -> Option<String> {
        self.metadata
            .find(Member::Type(def), MarkerKind::Property)
            .and_then(|p| p.non_empty("description").or_else(|| p.non_empty("value")))
            .map(str::to_string)
    }

    fn definition_name(&mut self, canonical: &TypeRef) -> String {
        let identity = canonical.to_string();
        if let Some(name) = self.names.get(&identity) {
            return name.clone();
        }
        let mut name = display_name(canonical, false);
        if self.owners.get(&name).map_or(false, |owner| owner != &identity) {
            name = display_name(canonical, true);
        }
        debug!("Definition name {} for {}", name, identity);
        self.owners.insert(name.clone(), identity.clone());
        self.names.insert(identity, name.clone());
        name
    }
}

fn merge_extensions(target: &mut BTreeMap<String, Value>, extensions: &Map<String, Value>) {
    for (key, value) in extensions {
        if !key.is_empty() {
            target.insert(key.clone(), value.clone());
        }
    }
}

/// `Page«User»` style names; `qualified` keeps package prefixes.
fn display_name(ty: &TypeRef, qualified: bool) -> String {
    if ty.is_array() {
        if let Some(item) = ty.first_arg() {
            return format!("{}[]", display_name(item, qualified));
        }
    }
    let base = if qualified {
        ty.name.clone()
    } else {
        simple_name(&ty.name).to_string()
    };
    if ty.args.is_empty() {
        return base;
    }
    let args: Vec<String> = ty.args.iter().map(|a| display_name(a, qualified)).collect();
    format!("{}«{}»", base, args.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{FieldDef, Marker};
    use crate::metadata::DescriptorMetadata;
    use pretty_assertions::assert_eq;

    fn ty(s: &str) -> TypeRef {
        s.parse().unwrap()
    }

    struct Fixture {
        types: TypeResolver,
        metadata: DescriptorMetadata,
        comments: CommentStore,
        validation: ValidationExtractor,
    }

    impl Fixture {
        fn new(types: Vec<TypeDef>) -> Self {
            Self {
                types: TypeResolver::new(types),
                metadata: DescriptorMetadata::new(),
                comments: CommentStore::new(),
                validation: ValidationExtractor::new(),
            }
        }

        fn registry(&self) -> ModelRegistry<'_> {
            ModelRegistry::new(&self.types, &self.metadata, &self.comments, &self.validation)
        }
    }

    fn user() -> TypeDef {
        TypeDef::new("com.acme.User")
            .field(FieldDef::new("id", ty("int")))
            .field(FieldDef::new("name", ty("String")).marker(Marker::new("NotNull")))
    }

    #[test]
    fn test_same_type_registers_once() {
        let fixture = Fixture::new(vec![user()]);
        let mut registry = fixture.registry();

        let first = registry.resolve(&ty("com.acme.User"));
        let second = registry.resolve(&ty("User"));
        let in_list = registry.resolve(&ty("List<com.acme.User>"));

        assert_eq!(first, Schema::reference("User"));
        assert_eq!(second, first);
        assert_eq!(in_list.items.as_deref(), Some(&first));
        assert_eq!(registry.definitions().len(), 1);
    }

    #[test]
    fn test_self_referential_type_terminates() {
        let node = TypeDef::new("com.acme.Node")
            .field(FieldDef::new("value", ty("String")))
            .field(FieldDef::new("next", ty("com.acme.Node")));
        let fixture = Fixture::new(vec![node]);
        let mut registry = fixture.registry();

        let schema = registry.resolve(&ty("com.acme.Node"));

        assert_eq!(schema, Schema::reference("Node"));
        assert_eq!(registry.definitions().len(), 1);
        let model = registry.definition("Node").unwrap();
        assert_eq!(model.properties["next"], Schema::reference("Node"));
    }

    #[test]
    fn test_mutual_recursion_terminates() {
        let a = TypeDef::new("com.acme.A").field(FieldDef::new("b", ty("com.acme.B")));
        let b = TypeDef::new("com.acme.B").field(FieldDef::new("a", ty("List<com.acme.A>")));
        let fixture = Fixture::new(vec![a, b]);
        let mut registry = fixture.registry();

        let reached = registry.register_all(&ty("com.acme.A"));

        assert_eq!(reached.into_iter().collect::<Vec<_>>(), vec!["A", "B"]);
        let b_model = registry.definition("B").unwrap();
        assert_eq!(b_model.properties["a"], Schema::array(Schema::reference("A")));
    }

    #[test]
    fn test_validation_rules_attached_to_properties() {
        let fixture = Fixture::new(vec![user()]);
        let mut registry = fixture.registry();
        registry.resolve(&ty("com.acme.User"));

        let model = registry.definition("User").unwrap();
        assert_eq!(model.properties["id"], Schema::scalar("integer", Some("int32")));
        let rules = &model.properties["name"].vendor_extensions[RULES_EXTENSION];
        assert_eq!(rules[0]["required"], Value::Bool(true));
        assert_eq!(model.required, vec!["name".to_string()]);
    }

    #[test]
    fn test_generic_names_and_collisions() {
        let mut page = TypeDef::new("com.acme.Page");
        page.params = vec!["T".to_string()];
        page = page.field(FieldDef::new("items", ty("List<T>")));
        let fixture = Fixture::new(vec![
            page,
            user(),
            TypeDef::new("com.other.User").field(FieldDef::new("login", ty("String"))),
        ]);
        let mut registry = fixture.registry();

        let page_schema = registry.resolve(&ty("com.acme.Page<com.acme.User>"));
        let other = registry.resolve(&ty("com.other.User"));

        assert_eq!(page_schema, Schema::reference("Page«User»"));
        assert_eq!(other, Schema::reference("com.other.User"));
        let page_model = registry.definition("Page«User»").unwrap();
        assert_eq!(
            page_model.properties["items"],
            Schema::array(Schema::reference("User"))
        );
    }

    #[test]
    fn test_hidden_and_renamed_properties() {
        let def = TypeDef::new("com.acme.Account")
            .field(FieldDef::new("secret", ty("String")).marker(Marker::new("property").with("hidden", true)))
            .field(
                FieldDef::new("fullName", ty("String"))
                    .marker(Marker::new("property").with("name", "full_name").with("value", "Display name")),
            );
        let fixture = Fixture::new(vec![def]);
        let mut registry = fixture.registry();
        registry.resolve(&ty("com.acme.Account"));

        let model = registry.definition("Account").unwrap();
        assert!(!model.properties.contains_key("secret"));
        assert_eq!(
            model.properties["full_name"].description.as_deref(),
            Some("Display name")
        );
    }

    #[test]
    fn test_enum_and_unknown_types() {
        let mut status = TypeDef::new("com.acme.Status");
        status.enum_values = Some(vec!["ON".to_string(), "OFF".to_string()]);
        let fixture = Fixture::new(vec![status]);
        let mut registry = fixture.registry();

        assert_eq!(registry.resolve(&ty("com.acme.Status")), Schema::reference("Status"));
        assert_eq!(registry.definition("Status").unwrap().model_type, "string");
        assert_eq!(registry.resolve(&ty("com.vendor.Blob")), Schema::object());
        assert_eq!(
            registry.resolve(&ty("Map<String, Long>")),
            Schema::map(Schema::scalar("integer", Some("int64")))
        );
    }

    #[test]
    fn test_enum_parameters_are_inlined() {
        let mut status = TypeDef::new("com.acme.Status");
        status.enum_values = Some(vec!["ON".to_string(), "OFF".to_string()]);
        let fixture = Fixture::new(vec![status]);
        let mut registry = fixture.registry();

        let query = registry.resolve_parameter(&ty("com.acme.Status"), ParameterLocation::Query);
        assert_eq!(query.schema_type.as_deref(), Some("string"));
        assert_eq!(query.enum_values, Some(vec!["ON".to_string(), "OFF".to_string()]));
        assert!(query.reference.is_none());

        let list = registry.resolve_parameter(&ty("List<com.acme.Status>"), ParameterLocation::Query);
        let items = list.items.unwrap();
        assert_eq!(items.schema_type.as_deref(), Some("string"));
        assert_eq!(items.enum_values, Some(vec!["ON".to_string(), "OFF".to_string()]));
        assert!(registry.definition("Status").is_none());

        let body = registry.resolve_parameter(&ty("com.acme.Status"), ParameterLocation::Body);
        assert_eq!(body, Schema::reference("Status"));
        assert!(registry.definition("Status").is_some());
    }

    #[test]
    fn test_schema_reference_serialization() {
        let json = serde_json::to_value(Schema::reference("User")).unwrap();
        assert_eq!(json, serde_json::json!({ "$ref": "#/definitions/User" }));
    }
}
