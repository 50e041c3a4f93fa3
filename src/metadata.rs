//! Metadata reader capability.
//!
//! Builders never inspect raw markers directly. They ask a [`MetadataReader`]
//! for the marker of an abstract [`MarkerKind`] on a [`Member`], and read its
//! attributes through the typed [`Attributes`] view. The default reader,
//! [`DescriptorMetadata`], matches marker kinds case-insensitively (ignoring
//! `_` and `-`) and honors a configurable alias table so framework-specific
//! tag names can be mapped onto the abstract vocabulary.

use crate::descriptor::{FieldDef, Marker, MethodDef, ParamDef, ServiceClass, TypeDef};
use log::debug;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};

/// Abstract marker vocabulary understood by the extraction pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkerKind {
    /// Class is a documented resource: tags, description, hidden, authorizations
    Api,
    /// Route mapping: value/path, method, consumes, produces, name
    Mapping,
    /// Operation overrides: value, notes, nickname, tags, code, response, ...
    Operation,
    /// Explicit response list
    Responses,
    /// Single status override for a method
    ResponseStatus,
    /// Parameters not present in the signature
    ImplicitParams,
    Deprecated,
    /// Parameter documentation: name, value, required, hidden, defaultValue
    Param,
    Path,
    Query,
    Header,
    Form,
    Cookie,
    Body,
    /// Parameter whose fields are expanded into individual parameters
    Bean,
    /// Field documentation on model properties
    Property,
}

impl MarkerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarkerKind::Api => "api",
            MarkerKind::Mapping => "mapping",
            MarkerKind::Operation => "operation",
            MarkerKind::Responses => "responses",
            MarkerKind::ResponseStatus => "response_status",
            MarkerKind::ImplicitParams => "implicit_params",
            MarkerKind::Deprecated => "deprecated",
            MarkerKind::Param => "param",
            MarkerKind::Path => "path",
            MarkerKind::Query => "query",
            MarkerKind::Header => "header",
            MarkerKind::Form => "form",
            MarkerKind::Cookie => "cookie",
            MarkerKind::Body => "body",
            MarkerKind::Bean => "bean",
            MarkerKind::Property => "property",
        }
    }
}

/// Something that can carry markers.
#[derive(Debug, Clone, Copy)]
pub enum Member<'a> {
    Class(&'a ServiceClass),
    Method(&'a MethodDef),
    Param(&'a ParamDef),
    Field(&'a FieldDef),
    Type(&'a TypeDef),
}

impl<'a> Member<'a> {
    pub fn markers(self) -> &'a [Marker] {
        match self {
            Member::Class(c) => &c.markers,
            Member::Method(m) => &m.markers,
            Member::Param(p) => &p.markers,
            Member::Field(f) => &f.markers,
            Member::Type(t) => &t.markers,
        }
    }
}

/// Read access to the markers attached to descriptor members.
pub trait MetadataReader {
    /// Attributes of the first marker on `member` whose kind resolves to `name`.
    fn find_named<'a>(&self, member: Member<'a>, name: &str) -> Option<Attributes<'a>>;

    fn find<'a>(&self, member: Member<'a>, kind: MarkerKind) -> Option<Attributes<'a>> {
        self.find_named(member, kind.as_str())
    }

    fn has(&self, member: Member<'_>, kind: MarkerKind) -> bool {
        self.find(member, kind).is_some()
    }
}

/// Typed view over a marker's attribute map.
#[derive(Debug, Clone, Copy)]
pub struct Attributes<'a> {
    map: &'a Map<String, Value>,
}

impl<'a> Attributes<'a> {
    pub fn new(map: &'a Map<String, Value>) -> Self {
        Self { map }
    }

    pub fn value(&self, key: &str) -> Option<&'a Value> {
        self.map.get(key)
    }

    pub fn str(&self, key: &str) -> Option<&'a str> {
        self.map.get(key).and_then(Value::as_str)
    }

    /// String attribute, `None` when absent or empty.
    pub fn non_empty(&self, key: &str) -> Option<&'a str> {
        self.str(key).filter(|s| !s.is_empty())
    }

    /// A string or list-of-strings attribute as a list.
    pub fn strings(&self, key: &str) -> Vec<String> {
        match self.map.get(key) {
            Some(Value::String(s)) => vec![s.clone()],
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn bool(&self, key: &str) -> bool {
        self.bool_or(key, false)
    }

    pub fn bool_or(&self, key: &str, default: bool) -> bool {
        match self.map.get(key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
            _ => default,
        }
    }

    pub fn int(&self, key: &str) -> Option<i64> {
        match self.map.get(key) {
            Some(Value::Number(n)) => n.as_i64(),
            Some(Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Nested objects held by a list attribute (a lone object counts as one).
    pub fn list(&self, key: &str) -> Vec<Attributes<'a>> {
        match self.map.get(key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_object)
                .map(Attributes::new)
                .collect(),
            Some(Value::Object(map)) => vec![Attributes::new(map)],
            _ => Vec::new(),
        }
    }

    pub fn object(&self, key: &str) -> Option<&'a Map<String, Value>> {
        self.map.get(key).and_then(Value::as_object)
    }
}

fn normalize(kind: &str) -> String {
    kind.chars()
        .filter(|c| *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Default reader over descriptor markers.
#[derive(Debug, Clone, Default)]
pub struct DescriptorMetadata {
    aliases: HashMap<String, String>,
}

impl DescriptorMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a reader where each alias (e.g. `RequestMapping`) stands for
    /// the mapped kind (e.g. `mapping`).
    pub fn with_aliases(aliases: &BTreeMap<String, String>) -> Self {
        let aliases = aliases
            .iter()
            .map(|(alias, kind)| (normalize(alias), normalize(kind)))
            .collect::<HashMap<_, _>>();
        debug!("Metadata reader with {} marker aliases", aliases.len());
        Self { aliases }
    }

    fn resolve(&self, kind: &str) -> String {
        let normalized = normalize(kind);
        match self.aliases.get(&normalized) {
            Some(target) => target.clone(),
            None => normalized,
        }
    }
}

impl MetadataReader for DescriptorMetadata {
    fn find_named<'a>(&self, member: Member<'a>, name: &str) -> Option<Attributes<'a>> {
        let wanted = normalize(name);
        member
            .markers()
            .iter()
            .find(|m| self.resolve(&m.kind) == wanted)
            .map(|m| Attributes::new(&m.attributes))
    }
}
