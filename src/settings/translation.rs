//! Translation configuration
//!
//! A receiver's translation settings are a closed polymorphic set: HL7,
//! REDOX, or CUSTOM, discriminated by a `type` tag in the settings file.
//! Resolution derives the output format, schema name, and default field
//! map purely from the variant's own fields.

use crate::domain::ReportFormat;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Schema used by the HL7 translation variant
pub const HL7_SCHEMA: &str = "covid-19";

/// Schema used by the REDOX translation variant
pub const REDOX_SCHEMA: &str = "covid-19-redox";

/// Polymorphic translation configuration
///
/// Adding a variant is a compile-time-checked exhaustiveness exercise:
/// resolution dispatches on the tag, never on open-ended inspection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TranslatorConfig {
    /// Standard HL7 v2 output
    #[serde(rename = "HL7", rename_all = "camelCase")]
    Hl7 {
        #[serde(default)]
        use_test_processing_mode: bool,

        /// Emit FHS/BHS batch headers around the messages
        #[serde(default = "default_true")]
        use_batch_headers: bool,

        #[serde(default, skip_serializing_if = "Option::is_none")]
        receiving_application_name: Option<String>,

        #[serde(default, skip_serializing_if = "Option::is_none")]
        receiving_application_oid: Option<String>,

        #[serde(default, skip_serializing_if = "Option::is_none")]
        receiving_facility_name: Option<String>,

        #[serde(default, skip_serializing_if = "Option::is_none")]
        receiving_facility_oid: Option<String>,

        #[serde(default, skip_serializing_if = "Option::is_none")]
        message_profile_id: Option<String>,
    },

    /// Redox JSON output
    #[serde(rename = "REDOX", rename_all = "camelCase")]
    Redox {
        #[serde(default)]
        use_test_processing_mode: bool,
        destination_id: String,
        destination_name: String,
        source_id: String,
        source_name: String,
    },

    /// Explicit schema/format/defaults, no derivation
    #[serde(rename = "CUSTOM", rename_all = "camelCase")]
    Custom {
        schema_name: String,
        format: ReportFormat,
        #[serde(default)]
        defaults: BTreeMap<String, String>,
    },
}

fn default_true() -> bool {
    true
}

/// The concrete translation derived from a [`TranslatorConfig`]
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTranslation {
    /// Output format for rendered batches
    pub format: ReportFormat,
    /// Schema to render with, looked up in the schema registry
    pub schema_name: String,
    /// Default field values merged into every rendered report
    pub defaults: BTreeMap<String, String>,
}

impl TranslatorConfig {
    /// The discriminant tag, as it appears in settings files
    pub fn type_name(&self) -> &'static str {
        match self {
            TranslatorConfig::Hl7 { .. } => "HL7",
            TranslatorConfig::Redox { .. } => "REDOX",
            TranslatorConfig::Custom { .. } => "CUSTOM",
        }
    }

    /// Resolves the configuration into format, schema name, and defaults
    ///
    /// Pure per-variant derivation; needs no external state.
    ///
    /// # Errors
    ///
    /// Returns human-readable configuration errors when a REDOX variant
    /// is missing one of its four required identifiers. Never panics.
    pub fn resolve(&self) -> Result<ResolvedTranslation, Vec<String>> {
        match self {
            TranslatorConfig::Hl7 {
                use_test_processing_mode,
                use_batch_headers,
                receiving_application_name,
                receiving_application_oid,
                receiving_facility_name,
                receiving_facility_oid,
                message_profile_id,
            } => {
                let mut defaults = BTreeMap::new();
                defaults.insert(
                    "processing_mode_code".to_string(),
                    processing_mode_code(*use_test_processing_mode).to_string(),
                );
                defaults.insert(
                    "receiving_application".to_string(),
                    compose_hd(receiving_application_name, receiving_application_oid),
                );
                defaults.insert(
                    "receiving_facility".to_string(),
                    compose_hd(receiving_facility_name, receiving_facility_oid),
                );
                defaults.insert(
                    "message_profile_id".to_string(),
                    message_profile_id.clone().unwrap_or_default(),
                );

                Ok(ResolvedTranslation {
                    format: if *use_batch_headers {
                        ReportFormat::Hl7Batch
                    } else {
                        ReportFormat::Hl7
                    },
                    schema_name: HL7_SCHEMA.to_string(),
                    defaults,
                })
            }

            TranslatorConfig::Redox {
                use_test_processing_mode,
                destination_id,
                destination_name,
                source_id,
                source_name,
            } => {
                let mut errors = Vec::new();
                for (field, value) in [
                    ("destinationId", destination_id),
                    ("destinationName", destination_name),
                    ("sourceId", source_id),
                    ("sourceName", source_name),
                ] {
                    if value.trim().is_empty() {
                        errors.push(format!("Translation REDOX: {field} cannot be blank"));
                    }
                }
                if !errors.is_empty() {
                    return Err(errors);
                }

                let mut defaults = BTreeMap::new();
                defaults.insert(
                    "processing_mode_code".to_string(),
                    processing_mode_code(*use_test_processing_mode).to_string(),
                );
                defaults.insert("redox_destination_id".to_string(), destination_id.clone());
                defaults.insert("redox_destination_name".to_string(), destination_name.clone());
                defaults.insert("redox_source_id".to_string(), source_id.clone());
                defaults.insert("redox_source_name".to_string(), source_name.clone());

                Ok(ResolvedTranslation {
                    format: ReportFormat::Redox,
                    schema_name: REDOX_SCHEMA.to_string(),
                    defaults,
                })
            }

            TranslatorConfig::Custom {
                schema_name,
                format,
                defaults,
            } => Ok(ResolvedTranslation {
                format: *format,
                schema_name: schema_name.clone(),
                defaults: defaults.clone(),
            }),
        }
    }
}

fn processing_mode_code(use_test_processing_mode: bool) -> &'static str {
    if use_test_processing_mode {
        "T"
    } else {
        "P"
    }
}

/// Composes an HL7 HD field: `Name^OID^ISO` when both parts are present,
/// the bare name when the OID is absent, empty when the name is absent.
fn compose_hd(name: &Option<String>, oid: &Option<String>) -> String {
    match (name, oid) {
        (Some(name), Some(oid)) => format!("{name}^{oid}^ISO"),
        (Some(name), None) => name.clone(),
        _ => String::new(),
    }
}
