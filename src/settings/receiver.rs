//! Receiver settings
//!
//! The aggregate an administrator edits: who the receiver is, what
//! stream it subscribes to, how its reports are translated and filtered,
//! when batches flush, and how they are delivered. A receiver
//! exclusively owns its translation, timing, transport, and filter
//! lists.

use crate::domain::ReceiverId;
use crate::filter::parse_filter_spec;
use crate::settings::timing::TimingConfig;
use crate::settings::translation::TranslatorConfig;
use crate::settings::transport::TransportConfig;
use serde::{Deserialize, Serialize};

/// Rollout status of a receiver
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustomerStatus {
    /// Configured but not receiving deliveries
    #[default]
    Inactive,
    /// Onboarding; delivery is a dispatch-policy decision
    Testing,
    /// Live
    Active,
}

/// Settings for one receiver
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiverSettings {
    /// Receiver short name, unique within its organization
    pub name: String,

    /// Organization that owns the receiver
    pub organization: String,

    /// The data stream the receiver subscribes to
    pub topic: String,

    #[serde(default)]
    pub customer_status: CustomerStatus,

    #[serde(default)]
    pub description: String,

    /// How reports are translated for this receiver
    pub translation: TranslatorConfig,

    /// Which jurisdictions' reports the receiver gets
    #[serde(default)]
    pub jurisdictional_filter: Vec<String>,

    /// Data-quality gate
    #[serde(default)]
    pub quality_filter: Vec<String>,

    /// Content routing rules
    #[serde(default)]
    pub routing_filter: Vec<String>,

    /// Processing-mode gate (test vs. production reports)
    #[serde(default)]
    pub processing_mode_filter: Vec<String>,

    /// Inverts the quality filter verdict, so operators can temporarily
    /// receive exactly the reports the quality gate would drop
    #[serde(default)]
    pub reverse_the_quality_filter: bool,

    /// Signals downstream rendering to strip identifying fields; carried
    /// as a flag, not applied here
    #[serde(default)]
    pub deidentify: bool,

    /// Batching schedule; absent means flush-per-report on demand
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timing: Option<TimingConfig>,

    /// Delivery mechanism; absent for receivers that only download
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport: Option<TransportConfig>,

    /// Name used in filenames and headers when it differs from `name`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_name: Option<String>,
}

impl ReceiverSettings {
    /// The fully qualified receiver id
    ///
    /// # Errors
    ///
    /// Returns an error when either name part is blank
    pub fn id(&self) -> Result<ReceiverId, String> {
        ReceiverId::new(&self.organization, &self.name)
    }

    /// `{organization}.{name}` without blank-name validation, for logs
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.organization, self.name)
    }

    /// The name external parties see
    pub fn display_name(&self) -> &str {
        self.external_name.as_deref().unwrap_or(&self.name)
    }

    /// Validates the receiver's settings
    ///
    /// All problems are aggregated into one flat list so the authoring
    /// flow can show every error at once; nothing is thrown.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let scope = self.full_name();

        if let Err(e) = self.id() {
            errors.push(format!("Receiver {scope}: {e}"));
        }
        if self.topic.trim().is_empty() {
            errors.push(format!("Receiver {scope}: Topic cannot be blank"));
        }

        if let Err(translation_errors) = self.translation.resolve() {
            for e in translation_errors {
                errors.push(format!("Receiver {scope}: {e}"));
            }
        }

        for (list_name, specs) in [
            ("jurisdictionalFilter", &self.jurisdictional_filter),
            ("qualityFilter", &self.quality_filter),
            ("routingFilter", &self.routing_filter),
            ("processingModeFilter", &self.processing_mode_filter),
        ] {
            for spec in specs {
                if let Err(e) = parse_filter_spec(spec) {
                    errors.push(format!("Receiver {scope}: {list_name}: {e}"));
                }
            }
        }

        if let Some(timing) = &self.timing {
            if let Err(e) = timing.validate() {
                errors.push(format!("Receiver {scope}: timing: {e}"));
            }
        }

        if let Some(transport) = &self.transport {
            if let Err(e) = transport.validate() {
                errors.push(format!(
                    "Receiver {scope}: {} transport: {e}",
                    transport.type_name()
                ));
            }
        }

        errors
    }
}

/// A minimal valid receiver for crate-internal tests
#[cfg(test)]
pub fn receiver_fixture() -> ReceiverSettings {
    ReceiverSettings {
        name: "elr".to_string(),
        organization: "pa-phd".to_string(),
        topic: "covid-19".to_string(),
        customer_status: CustomerStatus::Active,
        description: String::new(),
        translation: TranslatorConfig::Custom {
            schema_name: "covid-19".to_string(),
            format: crate::domain::ReportFormat::Csv,
            defaults: Default::default(),
        },
        jurisdictional_filter: Vec::new(),
        quality_filter: Vec::new(),
        routing_filter: Vec::new(),
        processing_mode_filter: Vec::new(),
        reverse_the_quality_filter: false,
        deidentify: false,
        timing: None,
        transport: None,
        external_name: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_receiver_has_no_errors() {
        let receiver = receiver_fixture();
        assert!(receiver.validate().is_empty());
        assert_eq!(receiver.full_name(), "pa-phd.elr");
        assert_eq!(receiver.display_name(), "elr");
    }

    #[test]
    fn test_validation_aggregates_everything() {
        let mut receiver = receiver_fixture();
        receiver.topic = "".to_string();
        receiver.quality_filter = vec!["frobnicate(x)".to_string()];
        receiver.translation = TranslatorConfig::Redox {
            use_test_processing_mode: false,
            destination_id: "".to_string(),
            destination_name: "PA DOH".to_string(),
            source_id: "src".to_string(),
            source_name: "Courier".to_string(),
        };
        receiver.timing = Some(TimingConfig {
            initial_time: "99:99".to_string(),
            ..Default::default()
        });

        let errors = receiver.validate();
        assert_eq!(errors.len(), 4);
        assert!(errors.iter().any(|e| e.contains("Topic cannot be blank")));
        assert!(errors.iter().any(|e| e.contains("destinationId cannot be blank")));
        assert!(errors.iter().any(|e| e.contains("qualityFilter")));
        assert!(errors.iter().any(|e| e.contains("Invalid initialTime")));
    }

    #[test]
    fn test_external_name_preferred_for_display() {
        let mut receiver = receiver_fixture();
        receiver.external_name = Some("Pennsylvania ELR".to_string());
        assert_eq!(receiver.display_name(), "Pennsylvania ELR");
    }

    #[test]
    fn test_customer_status_serde() {
        let receiver: ReceiverSettings = toml::from_str(
            r#"
            name = "elr"
            organization = "pa-phd"
            topic = "covid-19"
            customerStatus = "testing"

            [translation]
            type = "HL7"
            "#,
        )
        .unwrap();
        assert_eq!(receiver.customer_status, CustomerStatus::Testing);
    }
}
