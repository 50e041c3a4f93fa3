//! Validation rule extraction.
//!
//! Maps declared field constraints (`NotNull`, `Size`, `Pattern`, ...) to
//! plain rule maps such as `{required: true, message: ...}` or
//! `{min: 1, max: 32, message: ...}`. The constraint-kind to transform table
//! is extensible through [`ValidationExtractor::register`].

use crate::descriptor::FieldDef;
use crate::metadata::{Attributes, Member, MetadataReader};
use log::debug;
use serde_json::{Map, Value};

/// One emitted rule.
pub type Rule = Map<String, Value>;

/// Turns the attributes of one constraint marker into a rule.
pub trait RuleTransform: Send + Sync {
    fn transform(&self, constraint: &Attributes<'_>) -> Option<Rule>;
}

impl<F> RuleTransform for F
where
    F: Fn(&Attributes<'_>) -> Option<Rule> + Send + Sync,
{
    fn transform(&self, constraint: &Attributes<'_>) -> Option<Rule> {
        self(constraint)
    }
}

fn message(constraint: &Attributes<'_>, default: &str) -> Value {
    Value::String(constraint.non_empty("message").unwrap_or(default).to_string())
}

/// `{required: true}` for presence constraints
pub struct RequiredTransform {
    default_message: &'static str,
}

impl RuleTransform for RequiredTransform {
    fn transform(&self, constraint: &Attributes<'_>) -> Option<Rule> {
        let mut rule = Rule::new();
        rule.insert("required".to_string(), Value::Bool(true));
        rule.insert("message".to_string(), message(constraint, self.default_message));
        Some(rule)
    }
}

/// `{pattern}` from a `regexp` (or `pattern`/`value`) attribute
pub struct PatternTransform;

impl RuleTransform for PatternTransform {
    fn transform(&self, constraint: &Attributes<'_>) -> Option<Rule> {
        let pattern = constraint
            .non_empty("regexp")
            .or_else(|| constraint.non_empty("pattern"))
            .or_else(|| constraint.non_empty("value"))?;
        let mut rule = Rule::new();
        rule.insert("pattern".to_string(), Value::String(pattern.to_string()));
        rule.insert(
            "message".to_string(),
            message(constraint, &format!("must match \"{}\"", pattern)),
        );
        Some(rule)
    }
}

/// `{min, max}` for size and range constraints; unset bounds are omitted
pub struct BoundsTransform {
    default_message: &'static str,
}

impl RuleTransform for BoundsTransform {
    fn transform(&self, constraint: &Attributes<'_>) -> Option<Rule> {
        let mut rule = Rule::new();
        if let Some(min) = constraint.int("min").filter(|min| *min != 0) {
            rule.insert("min".to_string(), Value::from(min));
        }
        if let Some(max) = constraint
            .int("max")
            .filter(|max| *max != i64::from(i32::MAX) && *max != i64::MAX)
        {
            rule.insert("max".to_string(), Value::from(max));
        }
        rule.insert("message".to_string(), message(constraint, self.default_message));
        Some(rule)
    }
}

/// Extracts validation rules for model properties
pub struct ValidationExtractor {
    transforms: Vec<(String, Box<dyn RuleTransform>)>,
}

impl ValidationExtractor {
    /// Extractor with the standard constraint kinds registered.
    pub fn new() -> Self {
        let mut extractor = Self::empty();
        extractor.register(
            "NotBlank",
            RequiredTransform {
                default_message: "must not be blank",
            },
        );
        extractor.register(
            "NotNull",
            RequiredTransform {
                default_message: "must not be null",
            },
        );
        extractor.register("Pattern", PatternTransform);
        extractor.register(
            "Size",
            BoundsTransform {
                default_message: "size must be between {min} and {max}",
            },
        );
        extractor.register(
            "Range",
            BoundsTransform {
                default_message: "must be between {min} and {max}",
            },
        );
        extractor.register(
            "Length",
            BoundsTransform {
                default_message: "length must be between {min} and {max}",
            },
        );
        extractor
    }

    pub fn empty() -> Self {
        Self {
            transforms: Vec::new(),
        }
    }

    /// Registers (or replaces) the transform for a constraint kind.
    pub fn register(&mut self, kind: impl Into<String>, transform: impl RuleTransform + 'static) {
        let kind = kind.into();
        let transform: Box<dyn RuleTransform> = Box::new(transform);
        match self.transforms.iter_mut().find(|(k, _)| *k == kind) {
            Some(entry) => entry.1 = transform,
            None => self.transforms.push((kind, transform)),
        }
    }

    /// Rules for every registered constraint present on `field`.
    pub fn rules_for_field(&self, reader: &dyn MetadataReader, field: &FieldDef) -> Vec<Rule> {
        let mut rules = Vec::new();
        for (kind, transform) in &self.transforms {
            if let Some(constraint) = reader.find_named(Member::Field(field), kind) {
                if let Some(rule) = transform.transform(&constraint) {
                    debug!("Field {}: {} rule", field.name, kind);
                    rules.push(rule);
                }
            }
        }
        rules
    }
}

impl Default for ValidationExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{Marker, TypeDef, TypeRef};
    use crate::metadata::DescriptorMetadata;
    use serde_json::json;

    fn model() -> TypeDef {
        TypeDef::new("com.acme.User")
            .field(
                FieldDef::new("name", TypeRef::new("String"))
                    .marker(Marker::new("NotNull"))
                    .marker(Marker::new("Size").with("min", 0).with("max", 32)),
            )
            .field(
                FieldDef::new("email", TypeRef::new("String"))
                    .marker(Marker::new("Pattern").with("regexp", ".+@.+").with("message", "bad email")),
            )
            .field(
                FieldDef::new("age", TypeRef::new("int"))
                    .marker(Marker::new("Range").with("min", 18).with("max", 2147483647i64)),
            )
            .field(FieldDef::new("nickname", TypeRef::new("String")))
    }

    fn rules_of(extractor: &ValidationExtractor, property: &str) -> Vec<Rule> {
        let model = model();
        let field = model.fields.iter().find(|f| f.name == property).unwrap();
        extractor.rules_for_field(&DescriptorMetadata::new(), field)
    }

    #[test]
    fn test_required_and_size_rules() {
        let extractor = ValidationExtractor::new();
        let rules = rules_of(&extractor, "name");
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0]["required"], json!(true));
        assert_eq!(rules[0]["message"], json!("must not be null"));
        // min == 0 is omitted
        assert!(!rules[1].contains_key("min"));
        assert_eq!(rules[1]["max"], json!(32));
    }

    #[test]
    fn test_pattern_rule_keeps_message() {
        let extractor = ValidationExtractor::new();
        let rules = rules_of(&extractor, "email");
        assert_eq!(rules, vec![json!({ "pattern": ".+@.+", "message": "bad email" })
            .as_object()
            .cloned()
            .unwrap()]);
    }

    #[test]
    fn test_range_omits_unbounded_max() {
        let extractor = ValidationExtractor::new();
        let rules = rules_of(&extractor, "age");
        assert_eq!(rules[0]["min"], json!(18));
        assert!(!rules[0].contains_key("max"));
    }

    #[test]
    fn test_unconstrained_property_has_no_rules() {
        let extractor = ValidationExtractor::new();
        assert!(rules_of(&extractor, "nickname").is_empty());
    }

    #[test]
    fn test_register_custom_transform() {
        fn email_rule(_: &Attributes<'_>) -> Option<Rule> {
            let mut rule = Rule::new();
            rule.insert("format".to_string(), json!("email"));
            Some(rule)
        }

        let mut extractor = ValidationExtractor::empty();
        extractor.register("Email", email_rule);
        let field = FieldDef::new("contact", TypeRef::new("String")).marker(Marker::new("Email"));
        let rules = extractor.rules_for_field(&DescriptorMetadata::new(), &field);
        assert_eq!(rules[0]["format"], json!("email"));

        // NotNull is not registered on an empty extractor
        let field = FieldDef::new("id", TypeRef::new("String")).marker(Marker::new("NotNull"));
        assert!(extractor.rules_for_field(&DescriptorMetadata::new(), &field).is_empty());
    }
}
