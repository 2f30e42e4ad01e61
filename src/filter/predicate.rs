//! Filter predicates
//!
//! A filter list entry is a spec string in function-call syntax, e.g.
//! `matches(ordering_facility_state, PA)` or `allowNone()`. Parsing turns
//! a spec into a [`FilterPredicate`]; evaluation tests one report.
//! Malformed specs parse to errors that the engine reports as rejections
//! with a diagnostic reason rather than crashes.

use crate::domain::{FilterPredicateError, ReportRecord};
use chrono::{DateTime, Utc};
use regex::Regex;

/// A parsed, evaluable filter predicate
#[derive(Debug, Clone)]
pub enum FilterPredicate {
    /// Accepts reports whose patient or ordering facility is in the given
    /// state (and county, when one is given)
    ByCounty { state: String, county: Option<String> },

    /// Accepts when the field matches any of the regex patterns
    Matches { field: String, patterns: Vec<Regex> },

    /// Accepts when the field equals none of the listed values
    DoesNotMatch { field: String, values: Vec<String> },

    /// Accepts when any (field, value) pair matches exactly
    OrEquals { pairs: Vec<(String, String)> },

    /// Accepts when every listed field has a non-blank value
    HasValidDataFor { fields: Vec<String> },

    /// Accepts when at least one listed field has a non-blank value
    HasAtLeastOneOf { fields: Vec<String> },

    /// Accepts unconditionally
    AllowAll,

    /// Rejects unconditionally; hard-disables a stream without deleting
    /// the receiver's configuration
    AllowNone,

    /// Accepts when any listed field holds a valid CLIA (10 alphanumeric
    /// characters)
    IsValidClia { fields: Vec<String> },

    /// Accepts when the field's timestamp falls in `[start, end)`
    InDateInterval {
        field: String,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

/// Parses a filter spec in function-call syntax
///
/// Bare predicate names (`allowAll`) are accepted as zero-argument calls.
///
/// # Errors
///
/// Returns a [`FilterPredicateError`] for unknown predicate names,
/// malformed syntax, or kind-inappropriate arguments.
pub fn parse_filter_spec(spec: &str) -> Result<FilterPredicate, FilterPredicateError> {
    let spec = spec.trim();
    let (name, args) = split_call(spec)?;

    let wrong_args = |message: &str| FilterPredicateError::InvalidArguments {
        predicate: name.to_string(),
        message: message.to_string(),
    };

    match name {
        "allowAll" => {
            if args.is_empty() {
                Ok(FilterPredicate::AllowAll)
            } else {
                Err(wrong_args("takes no arguments"))
            }
        }
        "allowNone" => {
            if args.is_empty() {
                Ok(FilterPredicate::AllowNone)
            } else {
                Err(wrong_args("takes no arguments"))
            }
        }
        "byCounty" => match args.as_slice() {
            [state] => Ok(FilterPredicate::ByCounty {
                state: state.clone(),
                county: None,
            }),
            [state, county] => Ok(FilterPredicate::ByCounty {
                state: state.clone(),
                county: Some(county.clone()),
            }),
            _ => Err(wrong_args("expected a state and an optional county")),
        },
        "matches" => {
            if args.len() < 2 {
                return Err(wrong_args("expected a field and at least one pattern"));
            }
            let field = args[0].clone();
            let patterns = args[1..]
                .iter()
                .map(|p| {
                    Regex::new(&format!("^(?:{p})$")).map_err(|e| {
                        FilterPredicateError::InvalidArguments {
                            predicate: name.to_string(),
                            message: format!("bad pattern '{p}': {e}"),
                        }
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(FilterPredicate::Matches { field, patterns })
        }
        "doesNotMatch" => {
            if args.len() < 2 {
                return Err(wrong_args("expected a field and at least one value"));
            }
            Ok(FilterPredicate::DoesNotMatch {
                field: args[0].clone(),
                values: args[1..].to_vec(),
            })
        }
        "orEquals" => {
            if args.is_empty() || args.len() % 2 != 0 {
                return Err(wrong_args("expected field,value pairs"));
            }
            let pairs = args
                .chunks(2)
                .map(|pair| (pair[0].clone(), pair[1].clone()))
                .collect();
            Ok(FilterPredicate::OrEquals { pairs })
        }
        "hasValidDataFor" => {
            if args.is_empty() {
                return Err(wrong_args("expected at least one field"));
            }
            Ok(FilterPredicate::HasValidDataFor { fields: args })
        }
        "hasAtLeastOneOf" => {
            if args.is_empty() {
                return Err(wrong_args("expected at least one field"));
            }
            Ok(FilterPredicate::HasAtLeastOneOf { fields: args })
        }
        "isValidCLIA" => {
            if args.is_empty() {
                return Err(wrong_args("expected at least one field"));
            }
            Ok(FilterPredicate::IsValidClia { fields: args })
        }
        "inDateInterval" => match args.as_slice() {
            [field, start, end] => {
                let start = parse_instant(name, start)?;
                let end = parse_instant(name, end)?;
                if end <= start {
                    return Err(wrong_args("interval end must be after start"));
                }
                Ok(FilterPredicate::InDateInterval {
                    field: field.clone(),
                    start,
                    end,
                })
            }
            _ => Err(wrong_args("expected a field, a start, and an end instant")),
        },
        other => Err(FilterPredicateError::UnknownPredicate(other.to_string())),
    }
}

fn parse_instant(predicate: &str, text: &str) -> Result<DateTime<Utc>, FilterPredicateError> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| FilterPredicateError::InvalidArguments {
            predicate: predicate.to_string(),
            message: format!("bad instant '{text}': {e}"),
        })
}

/// Splits `name(arg1, arg2)` into the name and trimmed arguments
fn split_call(spec: &str) -> Result<(&str, Vec<String>), FilterPredicateError> {
    let malformed = |message: &str| FilterPredicateError::MalformedSpec {
        spec: spec.to_string(),
        message: message.to_string(),
    };

    if spec.is_empty() {
        return Err(malformed("empty spec"));
    }

    match spec.find('(') {
        None => {
            if spec.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                Ok((spec, Vec::new()))
            } else {
                Err(malformed("expected name(args)"))
            }
        }
        Some(open) => {
            if !spec.ends_with(')') {
                return Err(malformed("missing closing parenthesis"));
            }
            let name = spec[..open].trim();
            if name.is_empty() {
                return Err(malformed("missing predicate name"));
            }
            let inner = &spec[open + 1..spec.len() - 1];
            let args = if inner.trim().is_empty() {
                Vec::new()
            } else {
                inner.split(',').map(|a| a.trim().to_string()).collect()
            };
            if args.iter().any(|a| a.is_empty()) {
                return Err(malformed("empty argument"));
            }
            Ok((name, args))
        }
    }
}

impl FilterPredicate {
    /// Tests one report against the predicate
    pub fn accepts(&self, report: &ReportRecord) -> bool {
        match self {
            FilterPredicate::AllowAll => true,
            FilterPredicate::AllowNone => false,

            FilterPredicate::ByCounty { state, county } => {
                in_county(report, "patient", state, county)
                    || in_county(report, "ordering_facility", state, county)
            }

            FilterPredicate::Matches { field, patterns } => report
                .field_str(field)
                .map(|value| patterns.iter().any(|p| p.is_match(&value)))
                .unwrap_or(false),

            FilterPredicate::DoesNotMatch { field, values } => match report.field_str(field) {
                None => true,
                Some(value) => !values.contains(&value),
            },

            FilterPredicate::OrEquals { pairs } => pairs.iter().any(|(field, expected)| {
                report
                    .field_str(field)
                    .map(|value| &value == expected)
                    .unwrap_or(false)
            }),

            FilterPredicate::HasValidDataFor { fields } => {
                fields.iter().all(|field| report.has_value(field))
            }

            FilterPredicate::HasAtLeastOneOf { fields } => {
                fields.iter().any(|field| report.has_value(field))
            }

            FilterPredicate::IsValidClia { fields } => fields.iter().any(|field| {
                report
                    .field_str(field)
                    .map(|value| is_valid_clia(&value))
                    .unwrap_or(false)
            }),

            FilterPredicate::InDateInterval { field, start, end } => report
                .field_str(field)
                .and_then(|value| DateTime::parse_from_rfc3339(&value).ok())
                .map(|t| {
                    let t = t.with_timezone(&Utc);
                    t >= *start && t < *end
                })
                .unwrap_or(false),
        }
    }
}

fn in_county(report: &ReportRecord, scope: &str, state: &str, county: &Option<String>) -> bool {
    let state_matches = report
        .field_str(&format!("{scope}.state"))
        .map(|v| v.eq_ignore_ascii_case(state))
        .unwrap_or(false);
    if !state_matches {
        return false;
    }
    match county {
        None => true,
        Some(county) => report
            .field_str(&format!("{scope}.county"))
            .map(|v| v.to_lowercase().contains(&county.to_lowercase()))
            .unwrap_or(false),
    }
}

/// CLIA numbers are 10 characters, alphanumeric
fn is_valid_clia(value: &str) -> bool {
    value.len() == 10 && value.chars().all(|c| c.is_ascii_alphanumeric())
}
