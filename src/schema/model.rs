//! Translation schema tree
//!
//! A [`Schema`] describes how an internal report maps to an output
//! message format. Schemas are named, recursive trees: an element either
//! assigns expression values into target specs, or references a child
//! schema by name.

use crate::expression::Expression;
use serde::{Deserialize, Serialize};

/// Validation lifecycle of a schema instance
///
/// Set only by the validation entry point; any structural mutation resets
/// it to `Unvalidated` so stale verdicts can't be observed.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ValidationState {
    /// Not validated since construction or last mutation
    #[default]
    Unvalidated,
    /// Validated with no errors
    Valid,
    /// Validated with the recorded errors
    Invalid(Vec<String>),
}

/// A translation schema
///
/// `message_type` and `message_version` are required on a top-level
/// schema and forbidden on child schemas.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    message_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    message_version: Option<String>,

    #[serde(default)]
    elements: Vec<SchemaElement>,

    #[serde(skip)]
    pub(crate) validation: ValidationState,
}

impl Schema {
    /// Creates a new schema
    pub fn new(
        name: impl Into<String>,
        message_type: Option<String>,
        message_version: Option<String>,
        elements: Vec<SchemaElement>,
    ) -> Self {
        Self {
            name: name.into(),
            message_type,
            message_version,
            elements,
            validation: ValidationState::Unvalidated,
        }
    }

    /// The schema name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The output message type (top-level schemas only)
    pub fn message_type(&self) -> Option<&str> {
        self.message_type.as_deref()
    }

    /// The output message version (top-level schemas only)
    pub fn message_version(&self) -> Option<&str> {
        self.message_version.as_deref()
    }

    /// The ordered schema elements
    pub fn elements(&self) -> &[SchemaElement] {
        &self.elements
    }

    /// Mutable access to the elements; resets the validation state
    pub fn elements_mut(&mut self) -> &mut Vec<SchemaElement> {
        self.validation = ValidationState::Unvalidated;
        &mut self.elements
    }

    /// Renames the schema; resets the validation state
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.validation = ValidationState::Unvalidated;
        self.name = name.into();
    }

    /// Sets the message type; resets the validation state
    pub fn set_message_type(&mut self, message_type: Option<String>) {
        self.validation = ValidationState::Unvalidated;
        self.message_type = message_type;
    }

    /// Sets the message version; resets the validation state
    pub fn set_message_version(&mut self, message_version: Option<String>) {
        self.validation = ValidationState::Unvalidated;
        self.message_version = message_version;
    }

    /// The memoized validation state
    pub fn validation_state(&self) -> &ValidationState {
        &self.validation
    }
}

/// One element within a schema
///
/// Exactly one of `schema` (a child schema reference) or
/// `hl7_spec` + `value` (target specs with value expressions) must be
/// set. Expression strings are compiled during validation; the compiled
/// forms are consumed at render time.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SchemaElement {
    /// Element name, used to scope validation errors
    pub name: String,

    /// Condition expression; a false evaluation excludes the element
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,

    /// True if the element must produce a value
    #[serde(default)]
    pub required: bool,

    /// Name of a child schema
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    /// Resolved child schema, populated when the tree is linked
    #[serde(skip)]
    pub schema_ref: Option<Box<Schema>>,

    /// Expression scoping value lookup to a sub-resource
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,

    /// Value expressions; the first non-empty result is used
    #[serde(default)]
    pub value: Vec<String>,

    /// Target specs naming where values are placed in the output
    #[serde(default)]
    pub hl7_spec: Vec<String>,

    /// Compiled condition, populated by validation
    #[serde(skip)]
    pub condition_expr: Option<Expression>,

    /// Compiled value expressions, populated by validation
    #[serde(skip)]
    pub value_exprs: Vec<Expression>,

    /// Compiled resource expression, populated by validation
    #[serde(skip)]
    pub resource_expr: Option<Expression>,
}

impl SchemaElement {
    /// Creates a value-assigning element
    pub fn value_element(
        name: impl Into<String>,
        hl7_spec: Vec<String>,
        value: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            hl7_spec,
            value,
            ..Default::default()
        }
    }

    /// Creates a child-schema element
    pub fn schema_element(name: impl Into<String>, schema: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: Some(schema.into()),
            ..Default::default()
        }
    }

    /// Sets the condition expression
    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    /// Sets the resource scoping expression
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    /// Marks the element as required
    pub fn with_required(mut self) -> Self {
        self.required = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_deserializes_from_json() {
        let json = r#"{
            "name": "covid-19",
            "messageType": "ORU_R01",
            "messageVersion": "2.5.1",
            "elements": [
                {
                    "name": "patient-state",
                    "hl7Spec": ["PID-11-4"],
                    "value": ["patient.state"]
                },
                {
                    "name": "order",
                    "schema": "order-observation"
                }
            ]
        }"#;

        let schema: Schema = serde_json::from_str(json).unwrap();
        assert_eq!(schema.name(), "covid-19");
        assert_eq!(schema.message_type(), Some("ORU_R01"));
        assert_eq!(schema.elements().len(), 2);
        assert_eq!(schema.elements()[0].hl7_spec, vec!["PID-11-4"]);
        assert_eq!(schema.elements()[1].schema.as_deref(), Some("order-observation"));
        assert_eq!(*schema.validation_state(), ValidationState::Unvalidated);
    }

    #[test]
    fn test_mutation_resets_validation_state() {
        let mut schema = Schema::new("test", None, None, vec![]);
        schema.validation = ValidationState::Valid;

        schema.elements_mut().push(SchemaElement::default());
        assert_eq!(*schema.validation_state(), ValidationState::Unvalidated);

        schema.validation = ValidationState::Valid;
        schema.set_message_type(Some("ORU_R01".to_string()));
        assert_eq!(*schema.validation_state(), ValidationState::Unvalidated);
    }

    #[test]
    fn test_element_builders() {
        let element = SchemaElement::value_element(
            "processing-mode",
            vec!["MSH-11-1".to_string()],
            vec!["processing_mode_code".to_string()],
        )
        .with_condition("processing_mode_code.exists()")
        .with_required();

        assert!(element.required);
        assert!(element.condition.is_some());
        assert!(element.schema.is_none());
    }
}
