use crate::descriptor::{simple_name, FieldDef, TypeDef, TypeRef};
use crate::model_registry::Schema;
use log::{debug, warn};
use std::collections::{HashMap, HashSet};

const LIST_TYPES: &[&str] = &[
    "List",
    "ArrayList",
    "LinkedList",
    "Collection",
    "Iterable",
    "Set",
    "HashSet",
    "LinkedHashSet",
    "TreeSet",
    "SortedSet",
    "Stream",
];

const MAP_TYPES: &[&str] = &[
    "Map",
    "HashMap",
    "LinkedHashMap",
    "TreeMap",
    "SortedMap",
    "ConcurrentHashMap",
];

const OPTIONAL_TYPES: &[&str] = &["Optional"];

const OBJECT: &str = "java.lang.Object";

/// Scalar types with a direct schema representation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveType {
    Integer,
    Long,
    Float,
    Double,
    Decimal,
    Boolean,
    Byte,
    String,
    Date,
    DateTime,
    Uuid,
    File,
    Object,
}

impl PrimitiveType {
    /// Maps a JVM type name (simple or qualified) to a primitive.
    pub fn parse(name: &str) -> Option<Self> {
        let primitive = match name {
            "int" | "short" | "Integer" | "Short" | "java.lang.Integer" | "java.lang.Short" => {
                PrimitiveType::Integer
            }
            "long" | "Long" | "java.lang.Long" | "BigInteger" | "java.math.BigInteger" => {
                PrimitiveType::Long
            }
            "float" | "Float" | "java.lang.Float" => PrimitiveType::Float,
            "double" | "Double" | "java.lang.Double" => PrimitiveType::Double,
            "BigDecimal" | "java.math.BigDecimal" | "Number" | "java.lang.Number" => {
                PrimitiveType::Decimal
            }
            "boolean" | "Boolean" | "java.lang.Boolean" => PrimitiveType::Boolean,
            "byte" | "Byte" | "java.lang.Byte" => PrimitiveType::Byte,
            "char" | "Character" | "java.lang.Character" | "String" | "java.lang.String"
            | "CharSequence" | "java.lang.CharSequence" => PrimitiveType::String,
            "LocalDate" | "java.time.LocalDate" => PrimitiveType::Date,
            "Date" | "java.util.Date" | "java.sql.Timestamp" | "LocalDateTime"
            | "java.time.LocalDateTime" | "OffsetDateTime" | "java.time.OffsetDateTime"
            | "ZonedDateTime" | "java.time.ZonedDateTime" | "Instant" | "java.time.Instant" => {
                PrimitiveType::DateTime
            }
            "UUID" | "java.util.UUID" => PrimitiveType::Uuid,
            "MultipartFile" | "org.springframework.web.multipart.MultipartFile" | "File"
            | "java.io.File" | "InputStream" | "java.io.InputStream" => PrimitiveType::File,
            "Object" | "java.lang.Object" | "JsonNode" | "com.fasterxml.jackson.databind.JsonNode" => {
                PrimitiveType::Object
            }
            _ => return None,
        };
        Some(primitive)
    }

    pub fn to_schema(&self) -> Schema {
        match self {
            PrimitiveType::Integer => Schema::scalar("integer", Some("int32")),
            PrimitiveType::Long => Schema::scalar("integer", Some("int64")),
            PrimitiveType::Float => Schema::scalar("number", Some("float")),
            PrimitiveType::Double => Schema::scalar("number", Some("double")),
            PrimitiveType::Decimal => Schema::scalar("number", None),
            PrimitiveType::Boolean => Schema::scalar("boolean", None),
            PrimitiveType::Byte => Schema::scalar("string", Some("byte")),
            PrimitiveType::String => Schema::scalar("string", None),
            PrimitiveType::Date => Schema::scalar("string", Some("date")),
            PrimitiveType::DateTime => Schema::scalar("string", Some("date-time")),
            PrimitiveType::Uuid => Schema::scalar("string", Some("uuid")),
            PrimitiveType::File => Schema::scalar("file", None),
            PrimitiveType::Object => Schema::object(),
        }
    }
}

/// Classification of a type reference
#[derive(Debug, Clone)]
pub enum TypeKind<'c> {
    Void,
    Primitive(PrimitiveType),
    /// Array or collection, with its item type
    Array(TypeRef),
    /// String-keyed map, with its value type
    Map(TypeRef),
    /// Catalog type plus the canonical reference (qualified names throughout)
    Composite(&'c TypeDef, TypeRef),
    Enum(&'c TypeDef),
    Unknown,
}

/// A field of a composite type after generic substitution.
#[derive(Debug, Clone)]
pub struct ResolvedField<'c> {
    /// Qualified name of the type that declares the field
    pub owner: &'c str,
    pub field: FieldDef,
}

/// Type resolver - classifies type references against the type catalog
pub struct TypeResolver {
    /// Catalog types by qualified name (`$` normalized to `.`)
    types: HashMap<String, TypeDef>,
    /// Simple name -> qualified names
    simple_names: HashMap<String, Vec<String>>,
    /// Single-argument wrappers unwrapped from response types
    wrappers: Vec<String>,
    /// Types that are themselves documented resources
    resources: HashSet<String>,
}

fn normalize(name: &str) -> String {
    name.replace('$', ".")
}

fn is_jdk_name(name: &str) -> bool {
    !name.contains('.') || name.starts_with("java.")
}

impl TypeResolver {
    /// Create a new TypeResolver over the catalog types
    pub fn new(types: Vec<TypeDef>) -> Self {
        debug!("Initializing TypeResolver with {} catalog types", types.len());
        let mut by_name = HashMap::new();
        let mut simple_names: HashMap<String, Vec<String>> = HashMap::new();
        for def in types {
            let key = normalize(&def.name);
            simple_names
                .entry(simple_name(&key).to_string())
                .or_default()
                .push(key.clone());
            if by_name.insert(key.clone(), def).is_some() {
                warn!("Duplicate type descriptor {}, keeping the last one", key);
            }
        }
        Self {
            types: by_name,
            simple_names,
            wrappers: Vec::new(),
            resources: HashSet::new(),
        }
    }

    pub fn with_wrappers(mut self, wrappers: &[String]) -> Self {
        self.wrappers = wrappers.to_vec();
        self
    }

    /// Marks names as described resources (no automatic response schema).
    pub fn with_resources<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.resources
            .extend(names.into_iter().map(|n| normalize(n.as_ref())));
        self
    }

    /// Find a catalog type by qualified name, falling back to a unique simple name
    pub fn find_definition(&self, name: &str) -> Option<&TypeDef> {
        let key = normalize(name);
        if let Some(def) = self.types.get(&key) {
            return Some(def);
        }
        match self.simple_names.get(simple_name(&key)) {
            Some(candidates) if candidates.len() == 1 && !key.contains('.') => {
                self.types.get(&candidates[0])
            }
            _ => None,
        }
    }

    pub fn is_resource(&self, ty: &TypeRef) -> bool {
        let key = normalize(&ty.name);
        if self.resources.contains(&key) {
            return true;
        }
        self.find_definition(&ty.name)
            .map_or(false, |def| self.resources.contains(&normalize(&def.name)))
    }

    /// Strips configured wrappers (e.g. `ResponseEntity<T>`) from a type.
    pub fn unwrap_response(&self, ty: &TypeRef) -> TypeRef {
        let mut current = ty.clone();
        while self.is_wrapper(&current.name) {
            current = match current.args.first() {
                Some(inner) => inner.clone(),
                None => TypeRef::new(OBJECT),
            };
        }
        current
    }

    fn is_wrapper(&self, name: &str) -> bool {
        self.wrappers
            .iter()
            .any(|w| w == name || (!w.contains('.') && w == simple_name(name)))
    }

    /// Classify a type reference
    pub fn classify(&self, ty: &TypeRef) -> TypeKind<'_> {
        if ty.is_void() {
            return TypeKind::Void;
        }
        if ty.is_array() {
            if let Some(PrimitiveType::Byte) = ty.first_arg().and_then(|a| PrimitiveType::parse(&a.name)) {
                return TypeKind::Primitive(PrimitiveType::Byte);
            }
            return TypeKind::Array(ty.first_arg().cloned().unwrap_or_else(|| TypeRef::new(OBJECT)));
        }
        if let Some(primitive) = PrimitiveType::parse(&ty.name) {
            return TypeKind::Primitive(primitive);
        }
        if is_jdk_name(&ty.name) {
            let simple = simple_name(&ty.name);
            if OPTIONAL_TYPES.contains(&simple) {
                return match ty.first_arg() {
                    Some(inner) => self.classify(inner),
                    None => TypeKind::Primitive(PrimitiveType::Object),
                };
            }
            if LIST_TYPES.contains(&simple) && self.find_definition(&ty.name).is_none() {
                return TypeKind::Array(ty.first_arg().cloned().unwrap_or_else(|| TypeRef::new(OBJECT)));
            }
            if MAP_TYPES.contains(&simple) && self.find_definition(&ty.name).is_none() {
                return TypeKind::Map(ty.args.get(1).cloned().unwrap_or_else(|| TypeRef::new(OBJECT)));
            }
        }
        match self.find_definition(&ty.name) {
            Some(def) if def.is_enum() => TypeKind::Enum(def),
            Some(def) => TypeKind::Composite(def, self.canonical(ty)),
            None => {
                debug!("Type {} is not in the catalog", ty);
                TypeKind::Unknown
            }
        }
    }

    /// Whether the type and all its generic arguments can be classified.
    pub fn is_resolvable(&self, ty: &TypeRef) -> bool {
        match self.classify(ty) {
            TypeKind::Unknown => false,
            TypeKind::Array(item) | TypeKind::Map(item) => self.is_resolvable(&item),
            TypeKind::Composite(_, canonical) => canonical.args.iter().all(|a| self.is_resolvable(a)),
            _ => true,
        }
    }

    /// Rewrites catalog names in `ty` to their qualified form.
    pub fn canonical(&self, ty: &TypeRef) -> TypeRef {
        let name = match self.find_definition(&ty.name) {
            Some(def) => normalize(&def.name),
            None => ty.name.clone(),
        };
        TypeRef::generic(name, ty.args.iter().map(|a| self.canonical(a)).collect())
    }

    /// Fields of `def` (inherited ones first) with type parameters bound to `args`.
    pub fn fields_of<'c>(&'c self, def: &'c TypeDef, args: &[TypeRef]) -> Vec<ResolvedField<'c>> {
        let mut visited = HashSet::new();
        let mut fields = Vec::new();
        self.collect_fields(def, args, &mut visited, &mut fields);
        fields
    }

    fn collect_fields<'c>(
        &'c self,
        def: &'c TypeDef,
        args: &[TypeRef],
        visited: &mut HashSet<String>,
        out: &mut Vec<ResolvedField<'c>>,
    ) {
        if !visited.insert(normalize(&def.name)) {
            warn!("Type hierarchy cycle through {}", def.name);
            return;
        }
        let bindings: HashMap<&str, TypeRef> = def
            .params
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let bound = args.get(i).cloned().unwrap_or_else(|| TypeRef::new(OBJECT));
                (p.as_str(), bound)
            })
            .collect();

        if let Some(parent) = &def.superclass {
            let parent = substitute(parent, &bindings);
            if let Some(parent_def) = self.find_definition(&parent.name) {
                self.collect_fields(parent_def, &parent.args, visited, out);
            }
        }

        for field in &def.fields {
            let resolved = FieldDef {
                ty: substitute(&field.ty, &bindings),
                ..field.clone()
            };
            // a redeclared field shadows the inherited one
            out.retain(|f| f.field.name != field.name);
            out.push(ResolvedField {
                owner: def.name.as_str(),
                field: resolved,
            });
        }
    }
}

fn substitute(ty: &TypeRef, bindings: &HashMap<&str, TypeRef>) -> TypeRef {
    if ty.args.is_empty() {
        if let Some(bound) = bindings.get(ty.name.as_str()) {
            return bound.clone();
        }
    }
    TypeRef::generic(
        ty.name.clone(),
        ty.args.iter().map(|a| substitute(a, bindings)).collect(),
    )
}
