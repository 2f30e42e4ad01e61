//! Schema validation
//!
//! Validates a schema tree, compiling every expression along the way.
//! Errors are collected into one flat ordered list, scoped
//! `"Schema <name>: <problem>"` at the schema level and
//! `"[<element>]: <problem>"` at the element level; a child element's
//! failure never aborts validation of its siblings.

use crate::expression::compile;
use crate::schema::model::{Schema, SchemaElement, ValidationState};
use crate::schema::registry::SupportedMessageTypes;

impl Schema {
    /// Tests whether the schema and its elements (including child
    /// schemas) are valid. See [`Schema::errors`] for the messages.
    ///
    /// The verdict is memoized: repeated calls return the cached result
    /// without re-deriving it until the tree is mutated.
    pub fn is_valid(&mut self, supported: &SupportedMessageTypes) -> bool {
        if matches!(self.validation, ValidationState::Unvalidated) {
            let errors = self.validate(supported, false);
            self.validation = if errors.is_empty() {
                ValidationState::Valid
            } else {
                ValidationState::Invalid(errors)
            };
        }
        matches!(self.validation, ValidationState::Valid)
    }

    /// The errors recorded by the last validation, if any
    pub fn errors(&self) -> &[String] {
        match &self.validation {
            ValidationState::Invalid(errors) => errors,
            _ => &[],
        }
    }

    /// Validates the schema as a top level schema if `is_child_schema` is
    /// false, or as a child schema if true.
    ///
    /// Returns the ordered list of validation errors, empty when valid.
    /// Also compiles every element expression, leaving the compiled forms
    /// on the elements for render time.
    pub fn validate(
        &mut self,
        supported: &SupportedMessageTypes,
        is_child_schema: bool,
    ) -> Vec<String> {
        let mut errors = Vec::new();
        let name = self.name().to_string();
        let mut add_error = |msg: String| errors.push(format!("Schema {name}: {msg}"));

        if self.name().trim().is_empty() {
            add_error("Schema name cannot be blank".to_string());
        }

        // Message type and version are only allowed at the top level.
        if is_child_schema {
            if !blank(self.message_type()) {
                add_error("Schema messageType can only be specified in top level schema".to_string());
            }
            if !blank(self.message_version()) {
                add_error(
                    "Schema messageVersion can only be specified in top level schema".to_string(),
                );
            }
        } else {
            if blank(self.message_type()) {
                add_error("Schema messageType cannot be blank".to_string());
            }
            if blank(self.message_version()) {
                add_error("Schema messageVersion cannot be blank".to_string());
            }

            if let (Some(message_type), Some(message_version)) =
                (self.message_type(), self.message_version())
            {
                if !blank(Some(message_type))
                    && !blank(Some(message_version))
                    && !supported.supports(message_type, message_version)
                {
                    add_error(format!(
                        "Schema unsupported message type and version. Must be one of: {}",
                        supported.supported_list()
                    ));
                }
            }
        }

        if self.elements().is_empty() {
            add_error("Schema elements cannot be empty".to_string());
        }

        for element in self.elements_mut() {
            for msg in element.validate(supported) {
                errors.push(format!("Schema {name}: {msg}"));
            }
        }

        self.validation = if errors.is_empty() {
            ValidationState::Valid
        } else {
            ValidationState::Invalid(errors.clone())
        };
        errors
    }
}

impl SchemaElement {
    /// Validates the element, compiling its expressions
    ///
    /// Returns errors scoped `"[<element>]: <problem>"`; compile failures
    /// are collected, never thrown.
    pub(crate) fn validate(&mut self, supported: &SupportedMessageTypes) -> Vec<String> {
        let mut errors = Vec::new();
        let name = self.name.clone();
        let mut add_error = |msg: String| errors.push(format!("[{name}]: {msg}"));

        if self.name.trim().is_empty() {
            add_error("Element name cannot be blank".to_string());
        }

        // hl7Spec and value cannot be used with schema.
        let has_schema = !blank(self.schema.as_deref());
        match (has_schema, self.hl7_spec.is_empty(), self.value.is_empty()) {
            (true, spec_empty, value_empty) if !spec_empty || !value_empty => {
                add_error("Schema property cannot be used with hl7Spec or value properties".to_string());
            }
            (false, true, _) => {
                add_error("Hl7Spec property is required when not using a schema".to_string());
            }
            (false, false, true) => {
                add_error("Value property is required when not using a schema".to_string());
            }
            _ => {}
        }

        if has_schema && self.schema_ref.is_none() {
            add_error(format!(
                "Missing schema reference {}",
                self.schema.as_deref().unwrap_or_default()
            ));
        }

        // Compile the expressions; failures become errors, not aborts.
        self.condition_expr = match &self.condition {
            None => None,
            Some(text) => match compile(text) {
                Ok(expr) => Some(expr),
                Err(e) => {
                    add_error(format!("Error parsing condition expression: {e}"));
                    None
                }
            },
        };

        self.value_exprs = self
            .value
            .iter()
            .filter_map(|text| match compile(text) {
                Ok(expr) => Some(expr),
                Err(e) => {
                    add_error(format!("Error parsing value expression: {e}"));
                    None
                }
            })
            .collect();

        self.resource_expr = match &self.resource {
            None => None,
            Some(text) => match compile(text) {
                Ok(expr) => Some(expr),
                Err(e) => {
                    add_error(format!("Error parsing resource expression: {e}"));
                    None
                }
            },
        };

        // Recurse into a resolved child schema as a child.
        if let Some(child) = self.schema_ref.as_mut() {
            errors.extend(child.validate(supported, true));
        }
        errors
    }
}

fn blank(value: Option<&str>) -> bool {
    value.map(|s| s.trim().is_empty()).unwrap_or(true)
}
