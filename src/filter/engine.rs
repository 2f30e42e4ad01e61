//! Filter evaluation engine
//!
//! Decides, per report, whether a receiver gets it. The four filter
//! lists are evaluated in order jurisdictional → quality → routing →
//! processingMode; predicates within a list AND together, and all four
//! lists must accept. The quality list's verdict is inverted when the
//! receiver sets `reverseTheQualityFilter`.

use crate::domain::ReportRecord;
use crate::filter::predicate::parse_filter_spec;
use crate::settings::ReceiverSettings;
use std::fmt;

/// Which of the four receiver filter lists produced a rejection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterList {
    Jurisdictional,
    Quality,
    Routing,
    ProcessingMode,
}

impl fmt::Display for FilterList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FilterList::Jurisdictional => "jurisdictionalFilter",
            FilterList::Quality => "qualityFilter",
            FilterList::Routing => "routingFilter",
            FilterList::ProcessingMode => "processingModeFilter",
        };
        write!(f, "{s}")
    }
}

/// One predicate's rejection of a report, for diagnostics
#[derive(Debug, Clone)]
pub struct Rejection {
    /// The list the predicate came from
    pub list: FilterList,
    /// The spec string as written in the receiver's settings
    pub spec: String,
    /// Why the report was rejected
    pub reason: String,
}

/// The outcome of evaluating a report against one receiver
#[derive(Debug, Clone)]
pub struct FilterDecision {
    /// True when the report is routed to the receiver
    pub included: bool,
    /// The predicates that rejected the report
    pub rejections: Vec<Rejection>,
}

impl FilterDecision {
    fn included() -> Self {
        Self {
            included: true,
            rejections: Vec::new(),
        }
    }
}

/// Stateless evaluator over receiver filter lists
#[derive(Debug, Default)]
pub struct FilterEngine;

impl FilterEngine {
    pub fn new() -> Self {
        Self
    }

    /// Evaluates a report against a receiver, short-circuiting on the
    /// first rejecting list
    pub fn evaluate(&self, report: &ReportRecord, receiver: &ReceiverSettings) -> FilterDecision {
        self.run(report, receiver, true)
    }

    /// Evaluates every list and predicate, collecting all rejections
    ///
    /// Slower than [`FilterEngine::evaluate`]; intended for diagnostics
    /// such as the settings preview flow.
    pub fn evaluate_full(
        &self,
        report: &ReportRecord,
        receiver: &ReceiverSettings,
    ) -> FilterDecision {
        self.run(report, receiver, false)
    }

    fn run(
        &self,
        report: &ReportRecord,
        receiver: &ReceiverSettings,
        short_circuit: bool,
    ) -> FilterDecision {
        let lists = [
            (FilterList::Jurisdictional, &receiver.jurisdictional_filter),
            (FilterList::Quality, &receiver.quality_filter),
            (FilterList::Routing, &receiver.routing_filter),
            (FilterList::ProcessingMode, &receiver.processing_mode_filter),
        ];

        let mut decision = FilterDecision::included();

        for (list, specs) in lists {
            let reverse = list == FilterList::Quality && receiver.reverse_the_quality_filter;
            let (passed, mut rejections) = evaluate_list(report, list, specs, reverse);

            if !passed {
                decision.included = false;
                decision.rejections.append(&mut rejections);
                if short_circuit {
                    break;
                }
            }
        }

        decision
    }
}

/// Evaluates one list with AND semantics; `reverse` inverts the verdict
fn evaluate_list(
    report: &ReportRecord,
    list: FilterList,
    specs: &[String],
    reverse: bool,
) -> (bool, Vec<Rejection>) {
    let mut rejections = Vec::new();
    let mut raw_pass = true;

    for spec in specs {
        match parse_filter_spec(spec) {
            Err(e) => {
                // A bad predicate never crashes evaluation; it rejects
                // with a diagnostic so the receiver's stream stays safe.
                raw_pass = false;
                rejections.push(Rejection {
                    list,
                    spec: spec.clone(),
                    reason: e.to_string(),
                });
            }
            Ok(predicate) => {
                if !predicate.accepts(report) {
                    raw_pass = false;
                    rejections.push(Rejection {
                        list,
                        spec: spec.clone(),
                        reason: "predicate rejected report".to_string(),
                    });
                }
            }
        }
    }

    let passed = if reverse { !raw_pass } else { raw_pass };
    if reverse && !passed {
        // The raw list accepted, so there are no per-predicate
        // rejections to show; record the inversion itself.
        rejections.push(Rejection {
            list,
            spec: "reverseTheQualityFilter".to_string(),
            reason: "quality filter verdict inverted".to_string(),
        });
    }
    if passed {
        rejections.clear();
    }
    (passed, rejections)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::receiver_fixture;
    use serde_json::json;

    fn report() -> ReportRecord {
        ReportRecord::new(
            "covid-19",
            json!({
                "patient": { "state": "PA" },
                "test_result": "positive",
                "processing_mode_code": "P"
            }),
        )
    }

    #[test]
    fn test_all_lists_must_accept() {
        let mut receiver = receiver_fixture();
        receiver.jurisdictional_filter = vec!["matches(patient.state, PA)".to_string()];
        receiver.quality_filter = vec!["hasValidDataFor(test_result)".to_string()];

        let decision = FilterEngine::new().evaluate(&report(), &receiver);
        assert!(decision.included);
        assert!(decision.rejections.is_empty());

        receiver.routing_filter = vec!["matches(test_result, negative)".to_string()];
        let decision = FilterEngine::new().evaluate(&report(), &receiver);
        assert!(!decision.included);
        assert_eq!(decision.rejections.len(), 1);
        assert_eq!(decision.rejections[0].list, FilterList::Routing);
    }

    #[test]
    fn test_allow_none_rejects_everything() {
        let mut receiver = receiver_fixture();
        receiver.jurisdictional_filter = vec![
            "allowAll()".to_string(),
            "allowNone()".to_string(),
            "matches(patient.state, PA)".to_string(),
        ];

        let decision = FilterEngine::new().evaluate(&report(), &receiver);
        assert!(!decision.included);
        assert!(decision.rejections.iter().any(|r| r.spec == "allowNone()"));
    }

    #[test]
    fn test_reverse_quality_filter_inverts() {
        let mut receiver = receiver_fixture();
        receiver.quality_filter = vec!["hasValidDataFor(test_result)".to_string()];

        // Raw pass, inverted to exclusion
        receiver.reverse_the_quality_filter = true;
        let decision = FilterEngine::new().evaluate(&report(), &receiver);
        assert!(!decision.included);
        assert!(decision.rejections.iter().any(|r| r.reason.contains("inverted")));

        // Raw fail, inverted to inclusion
        receiver.quality_filter = vec!["hasValidDataFor(missing_field)".to_string()];
        let decision = FilterEngine::new().evaluate(&report(), &receiver);
        assert!(decision.included);
    }

    #[test]
    fn test_short_circuit_vs_full() {
        let mut receiver = receiver_fixture();
        receiver.jurisdictional_filter = vec!["allowNone()".to_string()];
        receiver.routing_filter = vec!["matches(test_result, negative)".to_string()];

        let engine = FilterEngine::new();
        let short = engine.evaluate(&report(), &receiver);
        assert_eq!(short.rejections.len(), 1);

        let full = engine.evaluate_full(&report(), &receiver);
        assert_eq!(full.rejections.len(), 2);
        assert!(!full.included);
    }

    #[test]
    fn test_malformed_predicate_is_rejection_not_crash() {
        let mut receiver = receiver_fixture();
        receiver.jurisdictional_filter = vec!["frobnicate(x)".to_string()];

        let decision = FilterEngine::new().evaluate(&report(), &receiver);
        assert!(!decision.included);
        assert!(decision.rejections[0].reason.contains("Unknown filter predicate"));
    }

    #[test]
    fn test_empty_lists_accept() {
        let receiver = receiver_fixture();
        let decision = FilterEngine::new().evaluate(&report(), &receiver);
        assert!(decision.included);
    }
}
