//! Collection definitions and their per-cluster runtime

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::index::IndexDefinition;
use crate::observability::MetricsRegistry;
use crate::query::CollectionKind;
use crate::store::{Clock, ExpiryPolicy, ListenerSet, RecordStore, StoreContext};
use crate::value::{AttributeExtractor, AttributeType, JsonExtractor, SchemaExtractor};

use super::errors::{ClusterError, ClusterResult};

/// Everything needed to create the stores of one collection
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionDefinition {
    pub name: String,
    pub kind: CollectionKind,
    pub expiry: ExpiryPolicy,
    pub indexes: Vec<IndexDefinition>,
    /// Declared attribute types; `None` reads values as free-form JSON
    pub schema: Option<BTreeMap<String, AttributeType>>,
}

impl CollectionDefinition {
    pub fn partitioned(name: impl Into<String>) -> Self {
        Self::new(name, CollectionKind::Partitioned)
    }

    pub fn replicated(name: impl Into<String>) -> Self {
        Self::new(name, CollectionKind::Replicated)
    }

    pub fn new(name: impl Into<String>, kind: CollectionKind) -> Self {
        Self {
            name: name.into(),
            kind,
            expiry: ExpiryPolicy::NONE,
            indexes: Vec::new(),
            schema: None,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.expiry.ttl = Some(ttl);
        self
    }

    pub fn with_max_idle(mut self, max_idle: Duration) -> Self {
        self.expiry.max_idle = Some(max_idle);
        self
    }

    pub fn with_index(mut self, attribute: impl Into<String>, ordered: bool) -> Self {
        self.indexes.push(IndexDefinition::new(attribute, ordered));
        self
    }

    pub fn with_schema(mut self, fields: impl IntoIterator<Item = (impl Into<String>, AttributeType)>) -> Self {
        self.schema = Some(fields.into_iter().map(|(k, t)| (k.into(), t)).collect());
        self
    }

    /// Rejects empty names and conflicting index definitions
    pub fn validate(&self) -> ClusterResult<()> {
        if self.name.trim().is_empty() {
            return Err(ClusterError::invalid_collection(&self.name, "name must not be empty"));
        }
        let mut seen: BTreeMap<&str, bool> = BTreeMap::new();
        for index in &self.indexes {
            if index.attribute.trim().is_empty() {
                return Err(ClusterError::invalid_collection(
                    &self.name,
                    "index attribute must not be empty",
                ));
            }
            if let Some(ordered) = seen.insert(index.attribute.as_str(), index.ordered) {
                if ordered != index.ordered {
                    return Err(ClusterError::invalid_collection(
                        &self.name,
                        format!("attribute '{}' declared both ordered and unordered", index.attribute),
                    ));
                }
            }
        }
        Ok(())
    }

    fn extractor(&self) -> Arc<dyn AttributeExtractor> {
        match &self.schema {
            Some(fields) => Arc::new(SchemaExtractor::new(fields.clone())),
            None => Arc::new(JsonExtractor),
        }
    }
}

/// A collection as the cluster runs it
pub(crate) struct Collection {
    pub(crate) definition: CollectionDefinition,
    pub(crate) listeners: ListenerSet,
    context: StoreContext,
}

impl Collection {
    pub(crate) fn new(
        definition: CollectionDefinition,
        clock: Arc<dyn Clock>,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        let listeners = ListenerSet::new();
        let context = StoreContext {
            extractor: definition.extractor(),
            clock,
            listener: Arc::new(listeners.clone()),
            default_expiry: definition.expiry,
            metrics,
        };
        Self {
            definition,
            listeners,
            context,
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.definition.name
    }

    pub(crate) fn kind(&self) -> CollectionKind {
        self.definition.kind
    }

    /// Fresh store carrying every index defined so far
    pub(crate) fn new_store(&self, partition: Option<u32>) -> ClusterResult<Arc<RecordStore>> {
        let store = RecordStore::new(self.name(), partition, self.context.clone());
        for index in &self.definition.indexes {
            store
                .create_index(index)
                .map_err(|err| ClusterError::index_failed(self.name(), err))?;
        }
        Ok(Arc::new(store))
    }
}
