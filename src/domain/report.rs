//! Report records and output formats
//!
//! A [`ReportRecord`] is one structured health-data report as received
//! from a sender, backed by JSON. Filter predicates and translation
//! expressions read fields from it by dotted path. [`ReportFormat`] names
//! the output renditions a receiver can be configured for.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Output format for a rendered batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportFormat {
    /// Internal interchange format (JSON lines)
    Internal,
    /// Comma separated values
    Csv,
    /// Single HL7 v2 message per report
    Hl7,
    /// HL7 v2 with batch headers (FHS/BHS)
    Hl7Batch,
    /// Redox JSON messages
    Redox,
}

impl ReportFormat {
    /// MIME type used as the transport content-type
    pub fn mime_type(&self) -> &'static str {
        match self {
            ReportFormat::Internal => "application/json",
            ReportFormat::Csv => "text/csv",
            ReportFormat::Hl7 | ReportFormat::Hl7Batch => "application/hl7-v2",
            ReportFormat::Redox => "application/json",
        }
    }

    /// File extension used when the transport writes files
    pub fn ext(&self) -> &'static str {
        match self {
            ReportFormat::Internal => "json",
            ReportFormat::Csv => "csv",
            ReportFormat::Hl7 | ReportFormat::Hl7Batch => "hl7",
            ReportFormat::Redox => "redox",
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReportFormat::Internal => "INTERNAL",
            ReportFormat::Csv => "CSV",
            ReportFormat::Hl7 => "HL7",
            ReportFormat::Hl7Batch => "HL7_BATCH",
            ReportFormat::Redox => "REDOX",
        };
        write!(f, "{s}")
    }
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "INTERNAL" => Ok(ReportFormat::Internal),
            "CSV" => Ok(ReportFormat::Csv),
            "HL7" => Ok(ReportFormat::Hl7),
            "HL7_BATCH" => Ok(ReportFormat::Hl7Batch),
            "REDOX" => Ok(ReportFormat::Redox),
            _ => Err(format!(
                "Invalid report format '{s}'. Must be one of: INTERNAL, CSV, HL7, HL7_BATCH, REDOX"
            )),
        }
    }
}

/// One structured health-data report
///
/// The body is a JSON object; field values are read by dotted path with
/// optional array indices, e.g. `patient.county` or `specimens[0].type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportRecord {
    /// Unique id assigned on ingestion
    pub report_id: Uuid,

    /// The data stream this report belongs to
    pub topic: String,

    /// Ingestion timestamp
    pub created_at: DateTime<Utc>,

    /// Report payload
    pub body: Value,
}

impl ReportRecord {
    /// Creates a report with a fresh id and the current timestamp
    pub fn new(topic: impl Into<String>, body: Value) -> Self {
        Self {
            report_id: Uuid::new_v4(),
            topic: topic.into(),
            created_at: Utc::now(),
            body,
        }
    }

    /// Looks up a field value by dotted path
    ///
    /// Returns `None` when any path segment is missing or indexes out of
    /// bounds. Paths address into the report body only.
    pub fn field(&self, path: &str) -> Option<&Value> {
        lookup_path(&self.body, path)
    }

    /// Looks up a field and renders it as a string
    ///
    /// JSON strings are returned verbatim; numbers and booleans are
    /// formatted; null, arrays, and objects return `None`.
    pub fn field_str(&self, path: &str) -> Option<String> {
        match self.field(path)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// True when the field is present and renders to a non-blank string
    pub fn has_value(&self, path: &str) -> bool {
        self.field_str(path)
            .map(|s| !s.trim().is_empty())
            .unwrap_or(false)
    }
}

/// Walks a dotted path (with optional `[index]` suffixes) into a JSON value
pub(crate) fn lookup_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for raw_segment in path.split('.') {
        let (name, index) = split_index(raw_segment)?;
        if !name.is_empty() {
            current = current.as_object()?.get(name)?;
        }
        if let Some(i) = index {
            current = current.as_array()?.get(i)?;
        }
    }
    Some(current)
}

/// Splits `name[3]` into `("name", Some(3))`; plain segments have no index
fn split_index(segment: &str) -> Option<(&str, Option<usize>)> {
    match segment.find('[') {
        None => Some((segment, None)),
        Some(open) => {
            let close = segment.rfind(']')?;
            if close != segment.len() - 1 || close <= open {
                return None;
            }
            let index = segment[open + 1..close].parse().ok()?;
            Some((&segment[..open], Some(index)))
        }
    }
}
