//! Attribute extraction from entry values
//!
//! Extractors are registered per collection. The evaluator and the indexes
//! only ever see [`AttributeValue`]s produced here.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

use super::attribute::{AttributeType, AttributeValue};

/// Reserved attribute resolving to the entry key.
pub const KEY_ATTRIBUTE: &str = "__key";

/// Reserved attribute resolving to the value itself.
pub const THIS_ATTRIBUTE: &str = "this";

/// Turns `(value, attribute)` into a typed value or `None` (absent).
pub trait AttributeExtractor: Send + Sync + fmt::Debug {
    fn extract(&self, value: &Value, attribute: &str) -> Option<AttributeValue>;
}

/// Resolves an attribute name to a value by attribute.
pub trait AttributeAccessor {
    fn attribute(&self, name: &str) -> Option<AttributeValue>;
}

/// Follows a dotted path (`address.city`) through nested objects.
fn resolve_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    if path == THIS_ATTRIBUTE {
        return Some(value);
    }
    let path = path.strip_prefix("this.").unwrap_or(path);
    path.split('.')
        .try_fold(value, |current, segment| current.as_object()?.get(segment))
}

/// Schemaless extractor: any JSON scalar reachable by path.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonExtractor;

impl AttributeExtractor for JsonExtractor {
    fn extract(&self, value: &Value, attribute: &str) -> Option<AttributeValue> {
        resolve_path(value, attribute).and_then(AttributeValue::from_json)
    }
}

/// Extractor backed by a declared field table.
///
/// Only declared attributes are visible, and only when the stored JSON has
/// the declared type.
#[derive(Debug, Clone, Default)]
pub struct SchemaExtractor {
    fields: BTreeMap<String, AttributeType>,
}

impl SchemaExtractor {
    pub fn new(fields: impl IntoIterator<Item = (impl Into<String>, AttributeType)>) -> Self {
        Self {
            fields: fields
                .into_iter()
                .map(|(name, ty)| (name.into(), ty))
                .collect(),
        }
    }

    pub fn fields(&self) -> &BTreeMap<String, AttributeType> {
        &self.fields
    }
}

impl AttributeExtractor for SchemaExtractor {
    fn extract(&self, value: &Value, attribute: &str) -> Option<AttributeValue> {
        let declared = self.fields.get(attribute)?;
        let raw = resolve_path(value, attribute)?;

        match declared {
            AttributeType::Bool => raw.as_bool().map(AttributeValue::Bool),
            AttributeType::Int => AttributeValue::from_json(raw).filter(
                |v| matches!(v, AttributeValue::Number(n) if n.is_integer()),
            ),
            AttributeType::Float => {
                if raw.is_number() {
                    AttributeValue::from_json(raw)
                } else {
                    None
                }
            }
            AttributeType::Text => raw.as_str().map(AttributeValue::text),
        }
    }
}

/// A key/value pair seen through a collection's extractor.
pub struct EntryView<'a> {
    key: &'a str,
    value: &'a Value,
    extractor: &'a dyn AttributeExtractor,
}

impl<'a> EntryView<'a> {
    pub fn new(key: &'a str, value: &'a Value, extractor: &'a dyn AttributeExtractor) -> Self {
        Self {
            key,
            value,
            extractor,
        }
    }
}

impl AttributeAccessor for EntryView<'_> {
    fn attribute(&self, name: &str) -> Option<AttributeValue> {
        if name == KEY_ATTRIBUTE {
            return Some(AttributeValue::text(self.key));
        }
        self.extractor.extract(self.value, name)
    }
}

impl AttributeAccessor for Value {
    fn attribute(&self, name: &str) -> Option<AttributeValue> {
        JsonExtractor.extract(self, name)
    }
}
