//! Relay policy knobs
//!
//! Behaviors that differ between deployments of the bridge and are chosen
//! per settings file rather than hard-coded.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How many producers may be connected at once
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProducerMode {
    /// Any number of concurrent producer sessions
    #[default]
    Multi,
    /// A new producer replaces the previous session
    Single,
}

impl FromStr for ProducerMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "multi" => Ok(ProducerMode::Multi),
            "single" => Ok(ProducerMode::Single),
            other => Err(format!(
                "unknown producer mode '{}', expected 'single' or 'multi'",
                other
            )),
        }
    }
}

impl fmt::Display for ProducerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProducerMode::Multi => write!(f, "multi"),
            ProducerMode::Single => write!(f, "single"),
        }
    }
}

/// What a producer hears when no viewer is connected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyRegistryPolicy {
    /// Reply "No connected sockets" and skip delivery
    #[default]
    Reject,
    /// Route normally; broadcast to nobody, empty clients list
    Broadcast,
}

/// Reply for a targeted command naming an id that is not registered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownTargetPolicy {
    /// Fire-and-forget: always "Success"
    #[default]
    ReportSuccess,
    /// "Client not found: <id>"
    ReportNotFound,
}

/// Shape of the `get_clientsID` reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientsReplyFormat {
    /// `{"what":"clientsID","clients":[...]}`
    #[default]
    Json,
    /// Ids joined with `;`
    Delimited,
}
