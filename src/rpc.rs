//! RPC provider reader.
//!
//! Documents provider classes that have no HTTP routing of their own: every
//! effective method becomes `POST /{SimpleName}/{method}`, tagged with the
//! class's simple name, with the return type as the `default` response.

use crate::collector::{report_skipped, ApiReader, Extraction};
use crate::descriptor::{ClassIndex, EffectiveMethod, ServiceClass};
use crate::document::{Document, HttpMethod, Operation, Response, Tag};
use crate::error::Result;
use crate::model_registry::ModelRegistry;
use crate::parameter::ParameterResolver;
use crate::response::DEFAULT_RESPONSE;
use log::debug;
use std::collections::BTreeMap;

pub struct RpcReader<'a> {
    extraction: Extraction<'a>,
}

impl<'a> RpcReader<'a> {
    pub fn new(extraction: Extraction<'a>) -> Self {
        Self { extraction }
    }

    fn operation(
        &self,
        class: &ServiceClass,
        effective: &EffectiveMethod<'_>,
        parameters: &ParameterResolver<'a>,
        registry: &mut ModelRegistry<'a>,
    ) -> Result<Operation> {
        let method = effective.method;
        let operation_id = format!("{}/{}", class.simple_name(), method.name);

        let schema = method
            .returns
            .as_ref()
            .filter(|ty| !ty.is_void())
            .map(|ty| registry.resolve(ty));
        let mut responses = BTreeMap::new();
        responses.insert(
            DEFAULT_RESPONSE.to_string(),
            Response::new(self.extraction.config.rpc_response_description.clone()).with_schema(schema),
        );

        Ok(Operation {
            tags: vec![class.simple_name().to_string()],
            summary: self
                .extraction
                .comments
                .method_comment(&effective.declaring.name, &method.name)
                .to_string(),
            operation_id,
            parameters: parameters.resolve(method, registry)?,
            responses,
            ..Operation::default()
        })
    }
}

impl ApiReader for RpcReader<'_> {
    fn read<'m>(&self, all: &'m [ServiceClass], selected: &[&'m ServiceClass]) -> Document {
        let index = ClassIndex::new(all);
        let mut registry = self.extraction.registry();
        let parameters = self.extraction.parameter_resolver();
        let mut document = self.extraction.new_document();

        for &class in selected {
            let methods = match index.effective_methods(class) {
                Ok(methods) => methods,
                Err(e) => {
                    report_skipped(&format!("provider {}", class.name), &e);
                    continue;
                }
            };
            debug!("Provider {} exposes {} methods", class.name, methods.len());
            document.register_tag(Tag::new(class.simple_name()));

            for effective in &methods {
                let path = format!("/{}/{}", class.simple_name(), effective.method.name);
                match self.operation(class, effective, &parameters, &mut registry) {
                    Ok(operation) => document.add_operation(&path, HttpMethod::Post, operation),
                    Err(e) => report_skipped(&format!("{} {}", HttpMethod::Post, path), &e),
                }
            }
        }

        for (name, model) in registry.into_definitions() {
            document.register_model(&name, model);
        }
        document
    }
}
