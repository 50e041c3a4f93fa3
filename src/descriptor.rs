//! Input model: service-class descriptors and the type catalog.
//!
//! A manifest lists every service class (with its markers, methods and
//! parameters) and every structured type reachable from them. Descriptors are
//! read-only for the whole run; the extraction pipeline never mutates them.
//!
//! ```yaml
//! classes:
//!   - name: com.acme.web.UserController
//!     markers:
//!       - { kind: mapping, value: /users }
//!     methods:
//!       - name: getUser
//!         returns: com.acme.model.User
//!         markers:
//!           - { kind: mapping, value: "/{id}", method: GET }
//!         params:
//!           - { name: id, type: long, markers: [{ kind: path, value: id }] }
//! types:
//!   - name: com.acme.model.User
//!     fields:
//!       - { name: id, type: int }
//! ```

use crate::error::{Error, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Pseudo type name used for array types (`int[]`, `User[]`).
pub const ARRAY: &str = "[]";

const ROOT_CLASSES: &[&str] = &["Object", "java.lang.Object"];

/// A reference to a type, including generic arguments.
///
/// The canonical string form (`Display`) is the type identity used by the
/// model registry: `com.acme.Page<com.acme.User>`, `int[]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TypeRef {
    pub name: String,
    pub args: Vec<TypeRef>,
}

impl TypeRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    pub fn generic(name: impl Into<String>, args: Vec<TypeRef>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    pub fn array_of(item: TypeRef) -> Self {
        Self::generic(ARRAY, vec![item])
    }

    pub fn is_array(&self) -> bool {
        self.name == ARRAY
    }

    pub fn is_void(&self) -> bool {
        matches!(self.name.as_str(), "void" | "Void" | "java.lang.Void")
    }

    /// Name without its package or enclosing types.
    pub fn simple_name(&self) -> &str {
        simple_name(&self.name)
    }

    /// First generic argument, if any.
    pub fn first_arg(&self) -> Option<&TypeRef> {
        self.args.first()
    }
}

/// Returns the part of a qualified name after the last `.` or `$`.
pub fn simple_name(qualified: &str) -> &str {
    qualified
        .rsplit(|c| c == '.' || c == '$')
        .next()
        .unwrap_or(qualified)
}

/// Returns the package part of a qualified name (empty for the default package).
pub fn package_name(qualified: &str) -> &str {
    match qualified.rfind('.') {
        Some(idx) => &qualified[..idx],
        None => "",
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_array() {
            if let Some(item) = self.args.first() {
                return write!(f, "{}[]", item);
            }
        }
        write!(f, "{}", self.name)?;
        if !self.args.is_empty() {
            let args: Vec<String> = self.args.iter().map(|a| a.to_string()).collect();
            write!(f, "<{}>", args.join(","))?;
        }
        Ok(())
    }
}

impl FromStr for TypeRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let tokens = tokenize(s)?;
        let mut parser = TypeRefParser {
            source: s,
            tokens,
            pos: 0,
        };
        let parsed = parser.parse_type()?;
        if parser.pos != parser.tokens.len() {
            return Err(Error::InvalidTypeRef(s.to_string()));
        }
        Ok(parsed)
    }
}

impl TryFrom<String> for TypeRef {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<TypeRef> for String {
    fn from(value: TypeRef) -> Self {
        value.to_string()
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Lt,
    Gt,
    Comma,
    Array,
    Wildcard,
}

fn tokenize(source: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = source.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '<' => {
                chars.next();
                tokens.push(Token::Lt);
            }
            '>' => {
                chars.next();
                tokens.push(Token::Gt);
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            '?' => {
                chars.next();
                tokens.push(Token::Wildcard);
            }
            '[' => {
                chars.next();
                while chars.peek().map_or(false, |c| c.is_whitespace()) {
                    chars.next();
                }
                if chars.next() != Some(']') {
                    return Err(Error::InvalidTypeRef(source.to_string()));
                }
                tokens.push(Token::Array);
            }
            c if c.is_alphanumeric() || c == '_' || c == '.' || c == '$' => {
                let mut ident = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_alphanumeric() || c == '_' || c == '.' || c == '$' {
                        ident.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                // varargs
                if let Some(stripped) = ident.strip_suffix("...") {
                    tokens.push(Token::Ident(stripped.to_string()));
                    tokens.push(Token::Array);
                } else {
                    tokens.push(Token::Ident(ident));
                }
            }
            _ => return Err(Error::InvalidTypeRef(source.to_string())),
        }
    }
    Ok(tokens)
}

struct TypeRefParser<'s> {
    source: &'s str,
    tokens: Vec<Token>,
    pos: usize,
}

impl TypeRefParser<'_> {
    fn invalid(&self) -> Error {
        Error::InvalidTypeRef(self.source.to_string())
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn parse_type(&mut self) -> Result<TypeRef> {
        let mut ty = match self.next() {
            Some(Token::Wildcard) => match self.peek() {
                Some(Token::Ident(kw)) if kw == "extends" || kw == "super" => {
                    self.pos += 1;
                    self.parse_type()?
                }
                _ => TypeRef::new("java.lang.Object"),
            },
            Some(Token::Ident(name)) => {
                let mut ty = TypeRef::new(name);
                if self.peek() == Some(&Token::Lt) {
                    self.pos += 1;
                    loop {
                        ty.args.push(self.parse_type()?);
                        match self.next() {
                            Some(Token::Comma) => continue,
                            Some(Token::Gt) => break,
                            _ => return Err(self.invalid()),
                        }
                    }
                }
                ty
            }
            _ => return Err(self.invalid()),
        };
        while self.peek() == Some(&Token::Array) {
            self.pos += 1;
            ty = TypeRef::array_of(ty);
        }
        Ok(ty)
    }
}

/// A metadata marker attached to a class, method, parameter, field or type.
///
/// `kind` names the marker (`mapping`, `path`, `NotNull`, ...); every other
/// key is an attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub kind: String,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl Marker {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            attributes: Map::new(),
        }
    }

    /// Adds an attribute; builder style.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// A field of a structured type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeRef,
    #[serde(default)]
    pub markers: Vec<Marker>,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty,
            markers: Vec::new(),
        }
    }

    pub fn marker(mut self, marker: Marker) -> Self {
        self.markers.push(marker);
        self
    }
}

/// A structured (or enum) type known to the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDef {
    /// Qualified name, nested types as `Outer$Inner` or `Outer.Inner`
    pub name: String,
    /// Generic type parameters, substituted by reference arguments
    #[serde(default)]
    pub params: Vec<String>,
    #[serde(default)]
    pub superclass: Option<TypeRef>,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
    #[serde(default, rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
    #[serde(default)]
    pub markers: Vec<Marker>,
}

impl TypeDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            superclass: None,
            fields: Vec::new(),
            enum_values: None,
            markers: Vec::new(),
        }
    }

    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    pub fn is_enum(&self) -> bool {
        self.enum_values.is_some()
    }
}

/// A formal parameter of a service method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamDef {
    /// Declared source name, when the descriptor producer kept it
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub ty: TypeRef,
    #[serde(default)]
    pub markers: Vec<Marker>,
}

impl ParamDef {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: Some(name.into()),
            ty,
            markers: Vec::new(),
        }
    }

    pub fn unnamed(ty: TypeRef) -> Self {
        Self {
            name: None,
            ty,
            markers: Vec::new(),
        }
    }

    pub fn marker(mut self, marker: Marker) -> Self {
        self.markers.push(marker);
        self
    }
}

/// A method declared on a service class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodDef {
    pub name: String,
    #[serde(default)]
    pub params: Vec<ParamDef>,
    /// Return type; absent means `void`
    #[serde(default)]
    pub returns: Option<TypeRef>,
    #[serde(default)]
    pub throws: Vec<String>,
    #[serde(default)]
    pub markers: Vec<Marker>,
    /// Compiler-generated bridge or accessor methods are never routed
    #[serde(default)]
    pub synthetic: bool,
}

impl MethodDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            returns: None,
            throws: Vec::new(),
            markers: Vec::new(),
            synthetic: false,
        }
    }

    pub fn param(mut self, param: ParamDef) -> Self {
        self.params.push(param);
        self
    }

    pub fn returns(mut self, ty: TypeRef) -> Self {
        self.returns = Some(ty);
        self
    }

    pub fn marker(mut self, marker: Marker) -> Self {
        self.markers.push(marker);
        self
    }

    /// Name plus erased parameter types, used to detect overrides.
    pub fn signature(&self) -> String {
        let params: Vec<String> = self.params.iter().map(|p| p.ty.name.clone()).collect();
        format!("{}({})", self.name, params.join(","))
    }
}

/// A service class as described by the manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceClass {
    pub name: String,
    #[serde(default)]
    pub superclass: Option<String>,
    #[serde(default)]
    pub markers: Vec<Marker>,
    #[serde(default)]
    pub methods: Vec<MethodDef>,
}

impl ServiceClass {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            superclass: None,
            markers: Vec::new(),
            methods: Vec::new(),
        }
    }

    pub fn marker(mut self, marker: Marker) -> Self {
        self.markers.push(marker);
        self
    }

    pub fn method(mut self, method: MethodDef) -> Self {
        self.methods.push(method);
        self
    }

    pub fn simple_name(&self) -> &str {
        simple_name(&self.name)
    }

    pub fn package_name(&self) -> &str {
        package_name(&self.name)
    }
}

/// The full extraction input: service classes plus the type catalog.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub classes: Vec<ServiceClass>,
    #[serde(default)]
    pub types: Vec<TypeDef>,
}

impl Manifest {
    /// Loads a manifest from a `.json`, `.yaml` or `.yml` file.
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading manifest from {}", path.display());
        let content = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .map_or(false, |e| e.eq_ignore_ascii_case("json"));
        let parsed = if is_json {
            serde_json::from_str(&content).map_err(|e| e.to_string())
        } else {
            serde_yaml::from_str(&content).map_err(|e| e.to_string())
        };
        let manifest: Manifest = parsed.map_err(|message| Error::Manifest {
            file: path.to_path_buf(),
            message,
        })?;
        debug!(
            "Manifest has {} classes and {} types",
            manifest.classes.len(),
            manifest.types.len()
        );
        Ok(manifest)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }
}

/// One method as seen from a concrete class, with the class that declares it.
#[derive(Debug, Clone, Copy)]
pub struct EffectiveMethod<'m> {
    pub declaring: &'m ServiceClass,
    pub method: &'m MethodDef,
}

/// Lookup of service classes by qualified name, for superclass walks.
pub struct ClassIndex<'m> {
    classes: HashMap<&'m str, &'m ServiceClass>,
}

impl<'m> ClassIndex<'m> {
    pub fn new(classes: &'m [ServiceClass]) -> Self {
        let mut map = HashMap::new();
        for class in classes {
            let key = class.name.as_str();
            if map.insert(key, class).is_some() {
                warn!("Duplicate class descriptor {}, keeping the last one", key);
            }
        }
        Self { classes: map }
    }

    pub fn get(&self, name: &str) -> Option<&'m ServiceClass> {
        self.classes
            .get(name)
            .or_else(|| self.classes.get(name.replace('$', ".").as_str()))
            .copied()
    }

    /// Own methods followed by inherited ones, deduplicated by signature.
    ///
    /// Synthetic methods are dropped. An unknown superclass is a per-class
    /// error.
    pub fn effective_methods(&self, class: &'m ServiceClass) -> Result<Vec<EffectiveMethod<'m>>> {
        let mut methods = Vec::new();
        let mut signatures = HashSet::new();
        let mut visited = HashSet::new();
        let mut current = Some(class);

        while let Some(declaring) = current {
            if !visited.insert(declaring.name.as_str()) {
                warn!("Inheritance cycle through {}", declaring.name);
                break;
            }
            for method in &declaring.methods {
                if method.synthetic {
                    continue;
                }
                if signatures.insert(method.signature()) {
                    methods.push(EffectiveMethod { declaring, method });
                }
            }
            current = match declaring.superclass.as_deref() {
                None => None,
                Some(parent) if ROOT_CLASSES.contains(&parent) => None,
                Some(parent) => Some(self.get(parent).ok_or_else(|| Error::MissingType {
                    class: class.name.clone(),
                    type_name: parent.to_string(),
                })?),
            };
        }

        Ok(methods)
    }
}
