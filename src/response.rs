//! Response resolution for one operation.

use crate::config::{ExceptionStatus, ResponseOverride};
use crate::descriptor::{simple_name, MethodDef, TypeRef};
use crate::document::Response;
use crate::metadata::{Attributes, MarkerKind, Member, MetadataReader};
use crate::model_registry::{ModelRegistry, Schema};
use log::{debug, warn};
use std::collections::BTreeMap;

/// Description of the automatically generated success response.
pub const SUCCESSFUL_OPERATION: &str = "successful operation";

/// Key used for a response without a specific status.
pub const DEFAULT_RESPONSE: &str = "default";

/// Standard reason phrase for a status code.
pub fn reason_phrase(code: u16) -> &'static str {
    match code {
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found",
        304 => "Not Modified",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        409 => "Conflict",
        410 => "Gone",
        415 => "Unsupported Media Type",
        422 => "Unprocessable Entity",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "",
    }
}

fn status_key(code: i64) -> String {
    if code == 0 {
        DEFAULT_RESPONSE.to_string()
    } else {
        code.to_string()
    }
}

fn is_success(key: &str) -> bool {
    key.len() == 3 && key.starts_with('2')
}

/// Builds the `responses` map of an operation
pub struct ResponseResolver<'a> {
    metadata: &'a dyn MetadataReader,
    exception_statuses: &'a BTreeMap<String, ExceptionStatus>,
    overrides: &'a [ResponseOverride],
}

impl<'a> ResponseResolver<'a> {
    pub fn new(
        metadata: &'a dyn MetadataReader,
        exception_statuses: &'a BTreeMap<String, ExceptionStatus>,
        overrides: &'a [ResponseOverride],
    ) -> Self {
        Self {
            metadata,
            exception_statuses,
            overrides,
        }
    }

    pub fn resolve(&self, method: &MethodDef, registry: &mut ModelRegistry<'a>) -> BTreeMap<String, Response> {
        let operation = self.metadata.find(Member::Method(method), MarkerKind::Operation);
        let mut responses = BTreeMap::new();

        let declared = operation
            .and_then(|op| op.non_empty("response"))
            .and_then(|name| match name.parse::<TypeRef>() {
                Ok(ty) => Some(ty),
                Err(e) => {
                    warn!("{}: ignoring response type: {}", method.name, e);
                    None
                }
            })
            .or_else(|| method.returns.clone());

        let container = operation.and_then(|op| op.non_empty("responseContainer"));
        let schema = declared.and_then(|ty| self.payload_schema(&ty, container, registry));
        let explicit_code = operation.and_then(|op| op.int("code"));
        let headers = match operation {
            Some(op) => self.headers(&op, registry),
            None => BTreeMap::new(),
        };
        // An empty payload with no declared status or headers leaves room for `default`
        let auto_key = status_key(explicit_code.unwrap_or(200));
        let has_auto = schema.is_some() || explicit_code.is_some() || !headers.is_empty();
        if has_auto {
            let mut auto = Response::new(SUCCESSFUL_OPERATION).with_schema(schema);
            auto.headers = headers;
            responses.insert(auto_key.clone(), auto);
        }

        if let Some(explicit) = self.metadata.find(Member::Method(method), MarkerKind::Responses) {
            let mut entries = explicit.list("value");
            if entries.is_empty() {
                entries = explicit.list("responses");
            }
            let mut explicit_keys = Vec::new();
            for entry in entries {
                let key = status_key(entry.int("code").unwrap_or(200));
                let container = entry.non_empty("responseContainer");
                let schema = entry
                    .non_empty("response")
                    .and_then(|name| name.parse::<TypeRef>().ok())
                    .and_then(|ty| self.payload_schema(&ty, container, registry))
                    .or_else(|| responses.get(&key).and_then(|r: &Response| r.schema.clone()));
                let mut response =
                    Response::new(entry.non_empty("message").unwrap_or("")).with_schema(schema);
                response.headers = self.headers(&entry, registry);
                responses.insert(key.clone(), response);
                explicit_keys.push(key);
            }

            let explicit_200 = explicit_keys.iter().any(|k| k == "200");
            let other_2xx = explicit_keys.iter().any(|k| k != "200" && is_success(k));
            if has_auto && auto_key == "200" && !explicit_200 && other_2xx {
                debug!("{}: explicit 2xx response replaces the generated 200", method.name);
                responses.remove("200");
            }
        } else if let Some(status) = self.metadata.find(Member::Method(method), MarkerKind::ResponseStatus) {
            self.apply_status(&status, &mut responses);
        }

        for exception in &method.throws {
            let status = self
                .exception_statuses
                .get(exception)
                .or_else(|| self.exception_statuses.get(simple_name(exception)));
            if let Some(status) = status {
                let description = status
                    .reason
                    .clone()
                    .unwrap_or_else(|| reason_phrase(status.code).to_string());
                responses
                    .entry(status.code.to_string())
                    .or_insert_with(|| Response::new(description));
            }
        }

        for response_override in self.overrides {
            responses
                .entry(response_override.code.to_string())
                .and_modify(|r| r.description = response_override.message.clone())
                .or_insert_with(|| Response::new(response_override.message.clone()));
        }

        if responses.is_empty() {
            responses.insert(DEFAULT_RESPONSE.to_string(), Response::new(SUCCESSFUL_OPERATION));
        }
        responses
    }

    /// Schema for a response payload, or `None` when the payload is empty or
    /// a described resource.
    fn payload_schema(
        &self,
        ty: &TypeRef,
        container: Option<&str>,
        registry: &mut ModelRegistry<'a>,
    ) -> Option<Schema> {
        let types = registry.types();
        let payload = types.unwrap_response(ty);
        if payload.is_void() {
            return None;
        }
        if types.is_resource(&payload) {
            debug!("Response type {} is a resource, no schema", payload);
            return None;
        }
        let reached = registry.register_all(&payload);
        let schema = registry.resolve(&payload);
        debug!("Response type {} reaches {} models", payload, reached.len());
        match container.map(str::to_ascii_lowercase).as_deref() {
            Some("list") | Some("array") | Some("set") => Some(Schema::array(schema)),
            Some("map") => Some(Schema::map(schema)),
            _ => Some(schema),
        }
    }

    fn headers(&self, attrs: &Attributes<'_>, registry: &mut ModelRegistry<'a>) -> BTreeMap<String, Schema> {
        let mut headers = BTreeMap::new();
        for header in attrs.list("responseHeaders") {
            let Some(name) = header.non_empty("name") else {
                continue;
            };
            let ty = header
                .non_empty("response")
                .and_then(|t| t.parse::<TypeRef>().ok())
                .unwrap_or_else(|| TypeRef::new("String"));
            let mut schema = registry.resolve(&ty);
            schema.description = header.non_empty("description").map(str::to_string);
            headers.insert(name.to_string(), schema);
        }
        headers
    }

    fn apply_status(&self, status: &Attributes<'_>, responses: &mut BTreeMap<String, Response>) {
        let Some(code) = status.int("code").or_else(|| status.int("value")) else {
            return;
        };
        let key = status_key(code);
        let reason = status.non_empty("reason").map(str::to_string);
        if responses.len() == 1 {
            let Some(old_key) = responses.keys().next().cloned() else {
                return;
            };
            if let Some(mut response) = responses.remove(&old_key) {
                if let Some(reason) = reason {
                    response.description = reason;
                }
                debug!("Response {} re-keyed as {}", old_key, key);
                responses.insert(key, response);
            }
        } else {
            let description = reason.unwrap_or_else(|| {
                u16::try_from(code)
                    .map(|c| reason_phrase(c).to_string())
                    .unwrap_or_default()
            });
            responses.entry(key).or_insert_with(|| Response::new(description));
        }
    }
}
