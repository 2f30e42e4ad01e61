//! Batch rendering
//!
//! Turns a flush event into deliverable payloads using the receiver's
//! resolved translation and its schema from the registry. Rendering
//! walks the schema elements per report: the condition gates the
//! element, the resource expression narrows the lookup scope, and the
//! first value expression that produces a non-empty result lands in each
//! of the element's target specs. Wire-level HL7/Redox encoding belongs
//! to the downstream codec; the payload rendered here is the mapped
//! key/value rendition that codec consumes (JSON lines), or actual CSV
//! for CSV receivers.

use crate::batch::FlushEvent;
use crate::domain::{CourierError, ReportFormat, ReportRecord, Result};
use crate::expression::ExprValue;
use crate::schema::{Schema, SchemaRegistry};
use crate::settings::{BatchOperation, ReceiverSettings, ResolvedTranslation};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Renders a flush event into one or more deliverable batches
///
/// `MERGE` (and every empty notification) produces a single batch; with
/// `NONE` each report becomes its own single-item batch so the
/// dispatcher can deliver them individually.
pub fn render_event(
    event: &FlushEvent,
    receiver: &ReceiverSettings,
    registry: &SchemaRegistry,
) -> Result<Vec<crate::transport::RenderedBatch>> {
    let resolved = receiver
        .translation
        .resolve()
        .map_err(|errors| CourierError::Configuration(errors.join("; ")))?;

    let schema = registry.lookup(&resolved.schema_name).ok_or_else(|| {
        CourierError::Configuration(format!(
            "Receiver {} references unknown schema {}",
            event.receiver, resolved.schema_name
        ))
    })?;

    if event.empty_notification || event.reports.is_empty() {
        return Ok(vec![assemble(event, receiver, &resolved, Vec::new(), 0)]);
    }

    let mut rendered_reports = Vec::with_capacity(event.reports.len());
    for report in &event.reports {
        rendered_reports.push(render_report(&schema, report, &resolved.defaults)?);
    }

    match event.operation {
        BatchOperation::Merge => {
            let count = rendered_reports.len();
            Ok(vec![assemble(event, receiver, &resolved, rendered_reports, count)])
        }
        BatchOperation::None => Ok(rendered_reports
            .into_iter()
            .map(|one| assemble(event, receiver, &resolved, vec![one], 1))
            .collect()),
    }
}

/// Renders one report through a schema into target-spec assignments
pub fn render_report(
    schema: &Schema,
    report: &ReportRecord,
    defaults: &BTreeMap<String, String>,
) -> Result<Map<String, Value>> {
    let mut out = Map::new();
    let mut errors = Vec::new();
    render_elements(schema, report, None, defaults, &mut out, &mut errors);

    if errors.is_empty() {
        Ok(out)
    } else {
        Err(CourierError::Validation(errors.join("; ")))
    }
}

fn render_elements(
    schema: &Schema,
    report: &ReportRecord,
    scope: Option<&Value>,
    defaults: &BTreeMap<String, String>,
    out: &mut Map<String, Value>,
    errors: &mut Vec<String>,
) {
    for element in schema.elements() {
        // A false condition excludes the element.
        if let Some(condition) = &element.condition_expr {
            if !condition.evaluate(report, scope).truthy() {
                continue;
            }
        }

        // The resource expression narrows where values are looked up.
        let element_scope = match &element.resource_expr {
            None => scope.cloned(),
            Some(resource) => match resource.evaluate(report, scope) {
                ExprValue::Resource(value) => Some(value),
                _ => {
                    if element.required {
                        errors.push(format!(
                            "[{}]: required element's resource expression produced nothing",
                            element.name
                        ));
                    }
                    continue;
                }
            },
        };

        if let Some(child) = &element.schema_ref {
            render_elements(child, report, element_scope.as_ref(), defaults, out, errors);
            continue;
        }

        // First non-empty value expression wins; defaults fill the gap.
        let value = element
            .value_exprs
            .iter()
            .find_map(|expr| {
                expr.evaluate(report, element_scope.as_ref())
                    .as_text()
                    .filter(|v| !v.trim().is_empty())
            })
            .or_else(|| defaults.get(&element.name).cloned());

        match value {
            Some(value) => {
                for spec in &element.hl7_spec {
                    out.insert(spec.clone(), Value::String(value.clone()));
                }
            }
            None if element.required => {
                errors.push(format!("[{}]: required element has no value", element.name));
            }
            None => {}
        }
    }
}

fn assemble(
    event: &FlushEvent,
    receiver: &ReceiverSettings,
    resolved: &ResolvedTranslation,
    reports: Vec<Map<String, Value>>,
    item_count: usize,
) -> crate::transport::RenderedBatch {
    let filename = format!(
        "{}-{}-{}.{}",
        receiver.display_name(),
        event.slot.format("%Y%m%dT%H%M%SZ"),
        &event.id.simple().to_string()[..8],
        resolved.format.ext()
    );

    crate::transport::RenderedBatch {
        receiver: event.receiver.clone(),
        format: resolved.format,
        filename,
        content: serialize(resolved.format, &reports),
        item_count,
    }
}

fn serialize(format: ReportFormat, reports: &[Map<String, Value>]) -> String {
    match format {
        ReportFormat::Csv => {
            // Column order is the sorted union of keys, stable across runs.
            let mut columns: Vec<&str> = Vec::new();
            for report in reports {
                for key in report.keys() {
                    if !columns.contains(&key.as_str()) {
                        columns.push(key);
                    }
                }
            }
            columns.sort_unstable();

            let mut lines = vec![columns.join(",")];
            for report in reports {
                let row: Vec<String> = columns
                    .iter()
                    .map(|c| {
                        report
                            .get(*c)
                            .and_then(Value::as_str)
                            .map(csv_escape)
                            .unwrap_or_default()
                    })
                    .collect();
                lines.push(row.join(","));
            }
            lines.join("\n") + "\n"
        }
        // JSON lines for everything the downstream codecs consume.
        _ => reports
            .iter()
            .map(|r| Value::Object(r.clone()).to_string() + "\n")
            .collect(),
    }
}

fn csv_escape(field: &str) -> String {
    if field.contains([',', '"', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
