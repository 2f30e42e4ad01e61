//! Domain identifier types with validation
//!
//! This module provides newtype wrappers for routing identifiers. Each
//! type ensures type safety and rejects blank values at construction.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Topic newtype wrapper
///
/// A topic names the data stream a receiver subscribes to, e.g.
/// `"covid-19"`. Reports are only routed to receivers whose topic
/// matches the report's topic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Topic(String);

impl Topic {
    /// Creates a new Topic from a string
    ///
    /// # Errors
    ///
    /// Returns an error if the topic is blank
    pub fn new(topic: impl Into<String>) -> Result<Self, String> {
        let topic = topic.into();
        if topic.trim().is_empty() {
            return Err("Topic cannot be empty".to_string());
        }
        Ok(Self(topic))
    }

    /// Returns the topic as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Topic {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for Topic {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Schema name newtype wrapper
///
/// Names a translation schema in the schema registry, e.g. `"covid-19"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SchemaName(String);

impl SchemaName {
    /// Creates a new SchemaName from a string
    ///
    /// # Errors
    ///
    /// Returns an error if the name is blank
    pub fn new(name: impl Into<String>) -> Result<Self, String> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err("Schema name cannot be empty".to_string());
        }
        Ok(Self(name))
    }

    /// Returns the schema name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SchemaName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SchemaName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Fully qualified receiver identifier
///
/// Receivers are scoped by organization; the full name is
/// `{organization}.{receiver}`, e.g. `"pa-phd.elr"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReceiverId {
    organization: String,
    name: String,
}

impl ReceiverId {
    /// Creates a new ReceiverId from organization and receiver names
    ///
    /// # Errors
    ///
    /// Returns an error if either part is blank
    pub fn new(organization: impl Into<String>, name: impl Into<String>) -> Result<Self, String> {
        let organization = organization.into();
        let name = name.into();
        if organization.trim().is_empty() {
            return Err("Organization name cannot be empty".to_string());
        }
        if name.trim().is_empty() {
            return Err("Receiver name cannot be empty".to_string());
        }
        Ok(Self { organization, name })
    }

    /// The organization that owns the receiver
    pub fn organization(&self) -> &str {
        &self.organization
    }

    /// The receiver's short name within its organization
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The fully qualified name, `{organization}.{receiver}`
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.organization, self.name)
    }
}

impl fmt::Display for ReceiverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.organization, self.name)
    }
}

impl FromStr for ReceiverId {
    type Err = String;

    /// Parses `{organization}.{receiver}`; the receiver part is the last
    /// dot-separated segment.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.rsplit_once('.') {
            Some((org, name)) => Self::new(org, name),
            None => Err(format!(
                "Invalid receiver name format. Expected {{organization}}.{{receiver}}, got: {s}"
            )),
        }
    }
}
