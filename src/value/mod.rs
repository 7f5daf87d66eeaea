//! Attribute model for gridstore
//!
//! Entry values are opaque JSON documents. Everything that evaluates or indexes
//! them goes through an [`AttributeExtractor`], which turns `(value, attribute)`
//! into a typed [`AttributeValue`] or reports the attribute as absent.
//!
//! # Invariants
//!
//! - Absent is never an error: unknown attributes, `null`, arrays and objects
//!   all extract to `None`
//! - One total order per family (Bool, Number, Text) shared by the evaluator
//!   and the ordered index, so index lookups and scans agree
//! - Values of different families never compare

mod attribute;
mod extractor;

pub use attribute::{AttributeType, AttributeValue, Number, ValueFamily};
pub use extractor::{
    AttributeAccessor, AttributeExtractor, EntryView, JsonExtractor, SchemaExtractor,
    KEY_ATTRIBUTE, THIS_ATTRIBUTE,
};
