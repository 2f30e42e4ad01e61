//! Schema and message-type registries
//!
//! The schema registry is process-wide, lazily populated, versioned
//! state. A reload builds a fully linked, immutable snapshot and swaps it
//! in atomically; concurrent validation readers keep whatever snapshot
//! they already hold, so a reload never races an in-flight read.

use crate::domain::{CourierError, Result};
use crate::schema::model::Schema;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// Registry of message type/version pairs the engine can emit
#[derive(Debug, Clone)]
pub struct SupportedMessageTypes {
    supported: Vec<(String, String)>,
}

impl Default for SupportedMessageTypes {
    fn default() -> Self {
        Self {
            supported: vec![("ORU_R01".to_string(), "2.5.1".to_string())],
        }
    }
}

impl SupportedMessageTypes {
    /// Creates a registry from explicit type/version pairs
    pub fn new(supported: Vec<(String, String)>) -> Self {
        Self { supported }
    }

    /// True when the type/version pair is supported
    pub fn supports(&self, message_type: &str, message_version: &str) -> bool {
        self.supported
            .iter()
            .any(|(t, v)| t == message_type && v == message_version)
    }

    /// Human-readable list for error messages, e.g. `"ORU_R01 2.5.1"`
    pub fn supported_list(&self) -> String {
        self.supported
            .iter()
            .map(|(t, v)| format!("{t} {v}"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// A linked, validated set of schemas
type Snapshot = HashMap<String, Arc<Schema>>;

/// Process-wide schema registry with swap-on-reload semantics
pub struct SchemaRegistry {
    snapshot: RwLock<Arc<Snapshot>>,
    version: AtomicU64,
    supported: SupportedMessageTypes,
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new(SupportedMessageTypes::default())
    }
}

impl SchemaRegistry {
    /// Creates an empty registry
    pub fn new(supported: SupportedMessageTypes) -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(HashMap::new())),
            version: AtomicU64::new(0),
            supported,
        }
    }

    /// The message types the registry validates against
    pub fn supported_types(&self) -> &SupportedMessageTypes {
        &self.supported
    }

    /// The snapshot version, incremented on every reload
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// The current immutable snapshot
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshot
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Looks up a schema by name in the current snapshot
    pub fn lookup(&self, name: &str) -> Option<Arc<Schema>> {
        self.snapshot().get(name).cloned()
    }

    /// Replaces the registry contents with a freshly linked snapshot
    ///
    /// Links every element's `schema` name to an owned copy of the named
    /// schema, validates each root schema (one not referenced as a child
    /// by any other schema in the set; children are validated through
    /// their parents), and swaps the snapshot in atomically. Returns the
    /// new version number.
    ///
    /// # Errors
    ///
    /// Returns a `Validation` error listing every schema error when any
    /// schema in the set is invalid, or a `Configuration` error on
    /// duplicate names or reference cycles. The previous snapshot stays
    /// in place on failure.
    pub fn reload(&self, schemas: Vec<Schema>) -> Result<u64> {
        let mut by_name: HashMap<String, Schema> = HashMap::new();
        let mut referenced: HashSet<String> = HashSet::new();
        for schema in schemas {
            let name = schema.name().to_string();
            for element in schema.elements() {
                if let Some(child) = &element.schema {
                    referenced.insert(child.clone());
                }
            }
            if by_name.insert(name.clone(), schema).is_some() {
                return Err(CourierError::Configuration(format!(
                    "Duplicate schema name: {name}"
                )));
            }
        }

        // Link child references, then validate each root.
        let names: Vec<String> = by_name.keys().cloned().collect();
        let mut linked: Snapshot = HashMap::with_capacity(names.len());
        let mut all_errors: Vec<String> = Vec::new();

        for name in names {
            let mut visiting = HashSet::new();
            let mut schema = link_schema(&name, &by_name, &mut visiting)?;
            if !referenced.contains(&name) {
                let errors = schema.validate(self.supported_types(), false);
                all_errors.extend(errors);
            }
            linked.insert(name, Arc::new(schema));
        }

        if !all_errors.is_empty() {
            return Err(CourierError::Validation(all_errors.join("; ")));
        }

        let mut guard = self
            .snapshot
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Arc::new(linked);
        let version = self.version.fetch_add(1, Ordering::AcqRel) + 1;
        tracing::info!(version, schemas = guard.len(), "Schema registry reloaded");
        Ok(version)
    }
}

/// Produces an owned copy of the named schema with all child references
/// resolved from the load set.
fn link_schema(
    name: &str,
    by_name: &HashMap<String, Schema>,
    visiting: &mut HashSet<String>,
) -> Result<Schema> {
    if !visiting.insert(name.to_string()) {
        return Err(CourierError::Configuration(format!(
            "Schema reference cycle involving {name}"
        )));
    }

    let mut schema = by_name
        .get(name)
        .cloned()
        .ok_or_else(|| CourierError::Configuration(format!("Unknown schema: {name}")))?;

    for element in schema.elements_mut() {
        if let Some(child_name) = element.schema.clone() {
            // A missing reference is left unresolved; validation reports
            // it as an error rather than failing the whole reload here.
            if by_name.contains_key(&child_name) {
                let child = link_schema(&child_name, by_name, visiting)?;
                element.schema_ref = Some(Box::new(child));
            }
        }
    }

    visiting.remove(name);
    Ok(schema)
}
