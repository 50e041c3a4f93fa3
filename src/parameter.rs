//! Parameter resolution.
//!
//! Each formal parameter of a routed method is offered to a chain of
//! [`ParameterExtension`]s; the first one that produces parameters wins.
//! The default chain binds explicit location markers, then expands bean
//! parameters field by field. Whatever is left becomes the request body.

use crate::descriptor::{MethodDef, ParamDef, TypeRef};
use crate::document::{Parameter, ParameterLocation};
use crate::error::{Error, Result};
use crate::metadata::{Attributes, MarkerKind, Member, MetadataReader};
use crate::model_registry::{ModelRegistry, Schema, RULES_EXTENSION};
use crate::type_resolver::TypeKind;
use crate::validation::ValidationExtractor;
use log::{debug, warn};
use serde_json::{Map, Value};
use std::collections::HashSet;

const BINDINGS: &[(MarkerKind, ParameterLocation)] = &[
    (MarkerKind::Path, ParameterLocation::Path),
    (MarkerKind::Query, ParameterLocation::Query),
    (MarkerKind::Header, ParameterLocation::Header),
    (MarkerKind::Form, ParameterLocation::Form),
    (MarkerKind::Cookie, ParameterLocation::Cookie),
];

/// Shared state handed to every extension.
pub struct ParameterContext<'r, 'a> {
    pub registry: &'r mut ModelRegistry<'a>,
    pub metadata: &'a dyn MetadataReader,
}

/// One link of the parameter extraction chain.
pub trait ParameterExtension {
    /// Parameters for `param`, or an empty list to let the next link try.
    ///
    /// `name` is the resolved parameter name, if any. `skip` holds the types
    /// already being expanded further up, so recursive beans terminate.
    fn extract(
        &self,
        param: &ParamDef,
        name: Option<&str>,
        ctx: &mut ParameterContext<'_, '_>,
        skip: &mut HashSet<String>,
    ) -> Result<Vec<Parameter>>;
}

/// Binds parameters carrying a `path`/`query`/`header`/`form`/`cookie` marker.
pub struct BindingExtension;

impl ParameterExtension for BindingExtension {
    fn extract(
        &self,
        param: &ParamDef,
        name: Option<&str>,
        ctx: &mut ParameterContext<'_, '_>,
        _skip: &mut HashSet<String>,
    ) -> Result<Vec<Parameter>> {
        let Some((binding, location)) = binding_of(ctx.metadata, Member::Param(param)) else {
            return Ok(Vec::new());
        };
        let name = binding
            .non_empty("value")
            .or_else(|| binding.non_empty("name"))
            .or(name)
            .ok_or_else(|| Error::MissingParameterName {
                method: String::new(),
                index: 0,
            })?;
        let schema = ctx.registry.resolve_parameter(&param.ty, location);
        let mut parameter = Parameter::new(name, location, schema);
        let doc = ctx.metadata.find(Member::Param(param), MarkerKind::Param);
        apply_docs(&mut parameter, Some(binding), doc);
        Ok(vec![parameter])
    }
}

/// Expands a `bean` parameter's fields into individual parameters.
///
/// Fields bind as query parameters unless they carry their own location
/// marker. A field that is itself a bean is expanded in place.
pub struct BeanExtension;

impl BeanExtension {
    fn expand(
        &self,
        ty: &TypeRef,
        ctx: &mut ParameterContext<'_, '_>,
        skip: &mut HashSet<String>,
    ) -> Vec<Parameter> {
        let types = ctx.registry.types();
        let TypeKind::Composite(def, canonical) = types.classify(ty) else {
            debug!("Bean type {} is not a catalog type", ty);
            return Vec::new();
        };
        let identity = canonical.to_string();
        if !skip.insert(identity.clone()) {
            debug!("Bean {} is already being expanded", identity);
            return Vec::new();
        }

        let mut out = Vec::new();
        for resolved in types.fields_of(def, &canonical.args) {
            let field = &resolved.field;
            let property = ctx.metadata.find(Member::Field(field), MarkerKind::Property);
            if property.map_or(false, |p| p.bool("hidden")) {
                continue;
            }
            if ctx.metadata.has(Member::Field(field), MarkerKind::Bean) {
                out.extend(self.expand(&field.ty, ctx, skip));
                continue;
            }
            let binding = binding_of(ctx.metadata, Member::Field(field));
            let location = binding.map_or(ParameterLocation::Query, |(_, location)| location);
            let name = binding
                .and_then(|(b, _)| b.non_empty("value").or_else(|| b.non_empty("name")))
                .or_else(|| property.and_then(|p| p.non_empty("name")))
                .unwrap_or(&field.name);
            let schema = ctx.registry.resolve_parameter(&field.ty, location);
            let mut parameter = Parameter::new(name, location, schema);
            apply_docs(&mut parameter, binding.map(|(b, _)| b), property);
            out.push(parameter);
        }
        skip.remove(&identity);
        out
    }
}

impl ParameterExtension for BeanExtension {
    fn extract(
        &self,
        param: &ParamDef,
        _name: Option<&str>,
        ctx: &mut ParameterContext<'_, '_>,
        skip: &mut HashSet<String>,
    ) -> Result<Vec<Parameter>> {
        if !ctx.metadata.has(Member::Param(param), MarkerKind::Bean) {
            return Ok(Vec::new());
        }
        Ok(self.expand(&param.ty, ctx, skip))
    }
}

/// Resolves the parameters of routed methods.
pub struct ParameterResolver<'a> {
    metadata: &'a dyn MetadataReader,
    validation: &'a ValidationExtractor,
    types_to_skip: HashSet<String>,
    extensions: Vec<Box<dyn ParameterExtension + 'a>>,
}

impl<'a> ParameterResolver<'a> {
    /// Resolver with the default chain: binding markers, then beans.
    pub fn new(
        metadata: &'a dyn MetadataReader,
        validation: &'a ValidationExtractor,
        types_to_skip: &[String],
    ) -> Self {
        Self {
            metadata,
            validation,
            types_to_skip: types_to_skip.iter().map(|t| t.replace('$', ".")).collect(),
            extensions: vec![Box::new(BindingExtension), Box::new(BeanExtension)],
        }
    }

    /// Appends an extension to the end of the chain.
    pub fn with_extension(mut self, extension: impl ParameterExtension + 'a) -> Self {
        self.extensions.push(Box::new(extension));
        self
    }

    /// Parameters of `method` in declaration order, followed by its implicit
    /// parameters.
    pub fn resolve(&self, method: &MethodDef, registry: &mut ModelRegistry<'a>) -> Result<Vec<Parameter>> {
        let mut parameters = Vec::new();
        for (index, param) in method.params.iter().enumerate() {
            let resolved = self
                .resolve_param(param, registry)
                .map_err(|e| match e {
                    Error::MissingParameterName { .. } => Error::MissingParameterName {
                        method: method.name.clone(),
                        index,
                    },
                    other => other,
                })?;
            parameters.extend(resolved);
        }
        self.add_implicit(method, registry, &mut parameters);
        Ok(parameters)
    }

    /// Parameters for a single formal parameter.
    pub fn resolve_param(&self, param: &ParamDef, registry: &mut ModelRegistry<'a>) -> Result<Vec<Parameter>> {
        let doc = self.metadata.find(Member::Param(param), MarkerKind::Param);
        if doc.map_or(false, |d| d.bool("hidden")) {
            debug!("Skipping hidden parameter {:?}", param.name);
            return Ok(Vec::new());
        }
        let name = doc
            .and_then(|d| d.non_empty("name"))
            .or(param.name.as_deref().filter(|n| !n.is_empty()));

        let mut ctx = ParameterContext {
            registry,
            metadata: self.metadata,
        };
        let mut skip = HashSet::new();
        for extension in &self.extensions {
            let parameters = extension.extract(param, name, &mut ctx, &mut skip)?;
            if !parameters.is_empty() {
                return Ok(parameters);
            }
        }

        self.body_parameter(param, name, ctx.registry).map(|p| vec![p])
    }

    fn body_parameter(
        &self,
        param: &ParamDef,
        name: Option<&str>,
        registry: &mut ModelRegistry<'a>,
    ) -> Result<Parameter> {
        let body = self.metadata.find(Member::Param(param), MarkerKind::Body);
        let doc = self.metadata.find(Member::Param(param), MarkerKind::Param);
        let name = body
            .and_then(|b| b.non_empty("name"))
            .or(name)
            .ok_or_else(|| Error::MissingParameterName {
                method: String::new(),
                index: 0,
            })?;

        let schema = if self.is_skipped(&param.ty) {
            debug!("Type {} is skipped, documenting an opaque body", param.ty);
            Schema::object()
        } else {
            let schema = registry.resolve(&param.ty);
            if let Some(model) = schema.reference_name() {
                self.attach_rules(&param.ty, model, registry);
            }
            schema
        };

        let mut parameter = Parameter::new(name, ParameterLocation::Body, schema);
        parameter.required = body
            .map(|b| b.bool_or("required", true))
            .unwrap_or(false);
        apply_docs(&mut parameter, None, doc);
        Ok(parameter)
    }

    fn is_skipped(&self, ty: &TypeRef) -> bool {
        let name = ty.name.replace('$', ".");
        self.types_to_skip.contains(&name) || self.types_to_skip.contains(ty.simple_name())
    }

    /// Merges per-property validation rules into the model's `x-rules`.
    fn attach_rules(&self, ty: &TypeRef, model: &str, registry: &mut ModelRegistry<'a>) {
        let types = registry.types();
        let TypeKind::Composite(def, canonical) = types.classify(ty) else {
            return;
        };
        let mut rules = registry
            .definition(model)
            .and_then(|m| m.vendor_extensions.get(RULES_EXTENSION))
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_else(Map::new);
        let before = rules.len();
        for resolved in types.fields_of(def, &canonical.args) {
            let field = &resolved.field;
            let found = self.validation.rules_for_field(self.metadata, field);
            if found.is_empty() {
                continue;
            }
            let property = self
                .metadata
                .find(Member::Field(field), MarkerKind::Property)
                .and_then(|p| p.non_empty("name"))
                .unwrap_or(&field.name);
            rules.insert(
                property.to_string(),
                Value::Array(found.into_iter().map(Value::Object).collect()),
            );
        }
        if rules.len() > before {
            debug!("Model {} carries rules for {} properties", model, rules.len());
            registry.set_extension(model, RULES_EXTENSION, Value::Object(rules));
        }
    }

    /// Appends `implicit_params` entries; a body entry replaces any body
    /// parameter resolved so far.
    fn add_implicit(&self, method: &MethodDef, registry: &mut ModelRegistry<'a>, parameters: &mut Vec<Parameter>) {
        let Some(implicit) = self.metadata.find(Member::Method(method), MarkerKind::ImplicitParams) else {
            return;
        };
        let mut entries = implicit.list("value");
        if entries.is_empty() {
            entries = implicit.list("params");
        }

        for entry in entries {
            let Some(name) = entry.non_empty("name") else {
                warn!("{}: implicit parameter without a name, ignoring", method.name);
                continue;
            };
            let data_type = entry.non_empty("dataType").unwrap_or("string");
            let ty = match data_type.parse::<TypeRef>() {
                Ok(ty) if registry.types().is_resolvable(&ty) => ty,
                _ => {
                    warn!(
                        "{}: implicit parameter {} has unknown dataType {}",
                        method.name, name, data_type
                    );
                    break;
                }
            };
            let location = entry
                .non_empty("paramType")
                .and_then(|t| t.parse::<ParameterLocation>().ok())
                .unwrap_or(ParameterLocation::Query);
            let schema = registry.resolve_parameter(&ty, location);
            let mut parameter = Parameter::new(name, location, schema);
            apply_docs(&mut parameter, None, Some(entry));

            if parameter.is_body() {
                let before = parameters.len();
                parameters.retain(|p| !p.is_body());
                if parameters.len() != before {
                    debug!("{}: implicit body parameter {} replaces the declared body", method.name, name);
                }
            }
            parameters.push(parameter);
        }
    }
}

fn binding_of<'m>(metadata: &dyn MetadataReader, member: Member<'m>) -> Option<(Attributes<'m>, ParameterLocation)> {
    BINDINGS
        .iter()
        .find_map(|(kind, location)| metadata.find(member, *kind).map(|attrs| (attrs, *location)))
}

/// Copies `required`, description and default value from the binding marker
/// and the documentation marker, documentation taking precedence.
fn apply_docs(parameter: &mut Parameter, binding: Option<Attributes<'_>>, doc: Option<Attributes<'_>>) {
    for source in [binding, doc].into_iter().flatten() {
        if parameter.location != ParameterLocation::Path && source.value("required").is_some() {
            parameter.required = source.bool("required");
        }
        if let Some(default) = source.value("defaultValue").filter(|v| !is_blank(v)) {
            parameter.default = Some(default.clone());
        }
    }
    if let Some(doc) = doc {
        let description = doc
            .non_empty("description")
            .or_else(|| doc.non_empty("value"));
        if let Some(description) = description {
            parameter.description = Some(description.to_string());
        }
    }
}

fn is_blank(value: &Value) -> bool {
    matches!(value, Value::Null) || value.as_str().map_or(false, str::is_empty)
}
