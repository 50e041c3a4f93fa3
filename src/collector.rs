//! Resource and route collection.
//!
//! The collector walks the selected service classes, groups their routed
//! methods into [`Resource`]s (one per class and base path), and drives the
//! [`OperationBuilder`] once per method, path and verb. Failures are
//! contained: a class that cannot be resolved is logged and skipped, an
//! operation that cannot be built is logged and dropped.

use crate::comments::CommentStore;
use crate::config::{GeneratorConfig, ReaderKind, SelectorConfig};
use crate::descriptor::{ClassIndex, EffectiveMethod, Manifest, MethodDef, ServiceClass};
use crate::document::{Document, HttpMethod, Info, Tag};
use crate::error::{Error, Result};
use crate::metadata::{DescriptorMetadata, MarkerKind, Member, MetadataReader};
use crate::model_registry::ModelRegistry;
use crate::operation::{OperationBuilder, RouteContext};
use crate::parameter::ParameterResolver;
use crate::response::ResponseResolver;
use crate::rpc::RpcReader;
use crate::type_resolver::TypeResolver;
use crate::validation::ValidationExtractor;
use log::{debug, error, info, warn};
use std::collections::{BTreeMap, HashSet};

/// Shared, read-only inputs of one extraction run.
#[derive(Clone, Copy)]
pub struct Extraction<'a> {
    pub config: &'a GeneratorConfig,
    pub metadata: &'a dyn MetadataReader,
    pub comments: &'a CommentStore,
    pub validation: &'a ValidationExtractor,
    pub types: &'a TypeResolver,
}

impl<'a> Extraction<'a> {
    pub fn registry(&self) -> ModelRegistry<'a> {
        ModelRegistry::new(self.types, self.metadata, self.comments, self.validation)
    }

    pub fn parameter_resolver(&self) -> ParameterResolver<'a> {
        ParameterResolver::new(self.metadata, self.validation, &self.config.types_to_skip)
    }

    pub fn operation_builder(&self) -> OperationBuilder<'a> {
        OperationBuilder::new(
            self.metadata,
            self.comments,
            self.parameter_resolver(),
            ResponseResolver::new(
                self.metadata,
                &self.config.exception_statuses,
                &self.config.response_overrides,
            ),
            &self.config.operation_id_format,
        )
    }

    /// An empty document carrying the configured info, host and schemes.
    pub fn new_document(&self) -> Document {
        let mut document = Document::new(Info {
            title: self.config.info.title.clone(),
            version: self.config.info.version.clone(),
            description: self.config.info.description.clone(),
        });
        document.host = self.config.host.clone();
        document.base_path = self.config.base_path.clone();
        document.schemes = self.config.schemes.clone();
        document
    }
}

/// Turns selected service classes into a document.
pub trait ApiReader {
    /// `all` is every known class (for superclass lookups); `selected` are
    /// the classes to document.
    fn read<'m>(&self, all: &'m [ServiceClass], selected: &[&'m ServiceClass]) -> Document;
}

/// One class under one of its base paths.
#[derive(Debug, Clone)]
pub struct Resource<'m> {
    pub class: &'m ServiceClass,
    pub base_path: String,
    pub tags: Vec<Tag>,
    /// Routed methods, own ones first
    pub methods: Vec<EffectiveMethod<'m>>,
}

/// Classes matching the selector, in manifest order.
pub fn select_classes<'m>(
    classes: &'m [ServiceClass],
    selector: &SelectorConfig,
    metadata: &dyn MetadataReader,
) -> Vec<&'m ServiceClass> {
    classes
        .iter()
        .filter(|class| {
            if selector.name_suffixes.is_empty() && selector.markers.is_empty() {
                return true;
            }
            let by_name = selector
                .name_suffixes
                .iter()
                .any(|suffix| class.simple_name().ends_with(suffix.as_str()));
            let by_marker = selector
                .markers
                .iter()
                .any(|marker| metadata.find_named(Member::Class(*class), marker).is_some());
            by_name || by_marker
        })
        .collect()
}

/// Runs a complete extraction over `manifest` with a prebuilt comment store.
pub fn generate(manifest: &Manifest, comments: &CommentStore, config: &GeneratorConfig) -> Result<Document> {
    let metadata = DescriptorMetadata::with_aliases(&config.marker_aliases);
    let validation = ValidationExtractor::new();

    let resources = manifest
        .classes
        .iter()
        .filter(|c| metadata.has(Member::Class(*c), MarkerKind::Api))
        .map(|c| c.name.clone())
        .chain(
            manifest
                .types
                .iter()
                .filter(|t| metadata.has(Member::Type(*t), MarkerKind::Api))
                .map(|t| t.name.clone()),
        )
        .collect::<Vec<_>>();
    let types = TypeResolver::new(manifest.types.clone())
        .with_wrappers(&config.response_wrappers)
        .with_resources(resources);

    let selected = select_classes(&manifest.classes, &config.effective_selector(), &metadata);
    if selected.is_empty() {
        return Err(Error::NoInputClasses);
    }
    info!("Selected {} of {} classes", selected.len(), manifest.classes.len());

    let extraction = Extraction {
        config,
        metadata: &metadata,
        comments,
        validation: &validation,
        types: &types,
    };
    let document = match config.reader {
        ReaderKind::Rest => RestCollector::new(extraction).read(&manifest.classes, &selected),
        ReaderKind::Rpc => RpcReader::new(extraction).read(&manifest.classes, &selected),
    };
    info!(
        "Document has {} paths and {} definitions",
        document.paths.len(),
        document.definitions.len()
    );
    Ok(document)
}

/// Collector for classes routed through `mapping` markers.
pub struct RestCollector<'a> {
    extraction: Extraction<'a>,
}

impl<'a> RestCollector<'a> {
    pub fn new(extraction: Extraction<'a>) -> Self {
        Self { extraction }
    }

    /// Resources of one class; empty when the class is hidden or unexpanded.
    pub fn resources<'m>(&self, class: &'m ServiceClass, index: &ClassIndex<'m>) -> Result<Vec<Resource<'m>>> {
        let metadata = self.extraction.metadata;
        let api = metadata.find(Member::Class(class), MarkerKind::Api);
        if api.map_or(false, |a| a.bool("hidden")) {
            debug!("Class {} is hidden", class.name);
            return Ok(Vec::new());
        }

        let mut base_paths = metadata
            .find(Member::Class(class), MarkerKind::Mapping)
            .map(|m| mapping_paths(&m))
            .unwrap_or_default();
        if base_paths.is_empty() {
            base_paths.push(String::new());
        }
        if base_paths[0].starts_with('$') {
            warn!("Class {} has an unexpanded base path {}, skipping", class.name, base_paths[0]);
            return Ok(Vec::new());
        }

        let methods: Vec<EffectiveMethod<'m>> = index
            .effective_methods(class)?
            .into_iter()
            .filter(|m| metadata.has(Member::Method(m.method), MarkerKind::Mapping))
            .collect();

        let mut resources = Vec::new();
        for base_path in base_paths {
            let tags = resource_tags(api.as_ref(), &base_path);
            resources.push(Resource {
                class,
                base_path,
                tags,
                methods: methods.clone(),
            });
        }
        Ok(resources)
    }

    /// Explicit verbs of the method's mapping, else the inferred one.
    fn verbs(&self, class: &ServiceClass, method: &MethodDef) -> Vec<HttpMethod> {
        let metadata = self.extraction.metadata;
        let declared: Vec<HttpMethod> = metadata
            .find(Member::Method(method), MarkerKind::Mapping)
            .map(|m| m.strings("method"))
            .unwrap_or_default()
            .iter()
            .filter_map(|v| match v.parse::<HttpMethod>() {
                Ok(verb) => Some(verb),
                Err(e) => {
                    warn!("{}.{}: {}", class.name, method.name, e);
                    None
                }
            })
            .collect();
        if !declared.is_empty() {
            return declared;
        }
        if method.params.is_empty() {
            return vec![HttpMethod::Get];
        }
        if method
            .params
            .iter()
            .any(|p| metadata.has(Member::Param(p), MarkerKind::Body))
        {
            return vec![HttpMethod::Post];
        }
        match self.extraction.config.default_http_method {
            Some(verb) => vec![verb],
            None => {
                warn!(
                    "{}.{} declares no HTTP method and none can be inferred, skipping",
                    class.name, method.name
                );
                Vec::new()
            }
        }
    }
}

impl ApiReader for RestCollector<'_> {
    fn read<'m>(&self, all: &'m [ServiceClass], selected: &[&'m ServiceClass]) -> Document {
        let index = ClassIndex::new(all);
        let mut registry = self.extraction.registry();
        let builder = self.extraction.operation_builder();
        let mut document = self.extraction.new_document();
        let mut seen = HashSet::new();

        for &class in selected {
            let resources = match self.resources(class, &index) {
                Ok(resources) => resources,
                Err(e) => {
                    report_skipped(&format!("class {}", class.name), &e);
                    continue;
                }
            };

            for resource in &resources {
                debug!(
                    "Resource {} at '{}' with {} routed methods",
                    class.name,
                    resource.base_path,
                    resource.methods.len()
                );
                for tag in &resource.tags {
                    document.register_tag(tag.clone());
                }

                for effective in &resource.methods {
                    let method = effective.method;
                    let method_paths = self
                        .extraction
                        .metadata
                        .find(Member::Method(method), MarkerKind::Mapping)
                        .map(|m| mapping_paths(&m))
                        .filter(|paths| !paths.is_empty())
                        .unwrap_or_else(|| vec![String::new()]);
                    let verbs = self.verbs(class, method);

                    for method_path in &method_paths {
                        if method_path.starts_with('$') {
                            warn!("{}.{} has an unexpanded path {}, skipping", class.name, method.name, method_path);
                            continue;
                        }
                        let (path, patterns) = parse_path(&join_path(&resource.base_path, method_path));
                        if path.is_empty() {
                            debug!("{}.{} maps to an empty path, ignoring", class.name, method.name);
                            continue;
                        }

                        for verb in &verbs {
                            let key = (
                                class.name.clone(),
                                resource.base_path.clone(),
                                method_path.clone(),
                                *verb,
                            );
                            if !seen.insert(key) {
                                continue;
                            }
                            let route = RouteContext {
                                class,
                                declaring: effective.declaring,
                                method,
                                http_method: *verb,
                                tags: &resource.tags,
                                path_patterns: &patterns,
                            };
                            match builder.build(route, &mut registry) {
                                Ok(Some(operation)) => document.add_operation(&path, *verb, operation),
                                Ok(None) => {}
                                Err(e) => report_skipped(&format!("{} {}", verb, path), &e),
                            }
                        }
                    }
                }
            }
        }

        for (name, model) in registry.into_definitions() {
            document.register_model(&name, model);
        }
        document
    }
}

/// Logs an operation or class dropped from the document. Contained errors
/// only cost that one entry and are reported as warnings.
pub(crate) fn report_skipped(subject: &str, e: &Error) {
    if e.is_contained() {
        warn!("Skipping {}: {}", subject, e);
    } else {
        error!("Skipping {}: {}", subject, e);
    }
}

/// `value`/`path` entries of a mapping marker.
fn mapping_paths(mapping: &crate::metadata::Attributes<'_>) -> Vec<String> {
    let mut paths = mapping.strings("value");
    paths.extend(mapping.strings("path"));
    paths
}

/// Tags of a resource: `api.tags`, else one synthesized from `api.value` or
/// the base path.
fn resource_tags(api: Option<&crate::metadata::Attributes<'_>>, base_path: &str) -> Vec<Tag> {
    let explicit: Vec<Tag> = api
        .map(|a| a.strings("tags"))
        .unwrap_or_default()
        .into_iter()
        .filter(|t| !t.is_empty())
        .map(Tag::new)
        .collect();
    if !explicit.is_empty() {
        return explicit;
    }
    let name = api
        .and_then(|a| a.non_empty("value"))
        .unwrap_or(base_path)
        .replace('/', "");
    if name.is_empty() {
        return Vec::new();
    }
    let mut tag = Tag::new(name);
    tag.description = api.and_then(|a| a.non_empty("description")).map(str::to_string);
    vec![tag]
}

/// Concatenates a base path and a method path with exactly one `/` between
/// them; the result starts with `/` unless both parts are empty.
///
/// A root mapping (`/` on either side, nothing else) joins to `/`.
pub fn join_path(base: &str, path: &str) -> String {
    let joined = format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'));
    let trimmed = joined.trim_end_matches('/');
    if trimmed.is_empty() {
        let root = base.starts_with('/') || path.starts_with('/');
        return if root { "/".to_string() } else { String::new() };
    }
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

/// Rewrites `{name:regex}` variables to `{name}` and returns the regexes by
/// variable name.
pub fn parse_path(path: &str) -> (String, BTreeMap<String, String>) {
    let mut out = String::with_capacity(path.len());
    let mut patterns = BTreeMap::new();
    let mut chars = path.chars();
    while let Some(c) = chars.next() {
        if c != '{' {
            out.push(c);
            continue;
        }
        let mut depth = 1;
        let mut variable = String::new();
        for c in chars.by_ref() {
            match c {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                _ => {}
            }
            variable.push(c);
        }
        match variable.split_once(':') {
            Some((name, regex)) => {
                let name = name.trim();
                patterns.insert(name.to_string(), regex.trim().to_string());
                out.push('{');
                out.push_str(name);
                out.push('}');
            }
            None => {
                out.push('{');
                out.push_str(variable.trim());
                out.push('}');
            }
        }
    }
    (out, patterns)
}
