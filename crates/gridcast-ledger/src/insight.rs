//! Insight record types

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Key under `details` naming the calendar date an insight is about
pub const FOR_DATE_KEY: &str = "forDate";

/// Closed set of insight kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightKind {
    Prediction,
    Verification,
    Note,
}

impl InsightKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InsightKind::Prediction => "prediction",
            InsightKind::Verification => "verification",
            InsightKind::Note => "note",
        }
    }
}

impl fmt::Display for InsightKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InsightKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "prediction" => Ok(InsightKind::Prediction),
            "verification" => Ok(InsightKind::Verification),
            "note" => Ok(InsightKind::Note),
            other => Err(format!("unknown insight type: {other}")),
        }
    }
}

/// A persisted, immutable record of something the system noted.
///
/// `date` is when the record was written; `details.forDate` is the day it
/// concerns. The two are never interchangeable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: InsightKind,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub details: serde_json::Value,
}

impl Insight {
    /// Canonical `YYYY-MM-DD` this insight concerns, if recorded
    pub fn for_date(&self) -> Option<&str> {
        self.details.get(FOR_DATE_KEY).and_then(|v| v.as_str())
    }

    /// Decode `details` into a kind-specific payload
    pub fn details_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.details)
    }
}

/// An insight before the ledger assigns its id
#[derive(Debug, Clone)]
pub struct NewInsight {
    pub kind: InsightKind,
    pub date: Option<DateTime<Utc>>,
    pub details: serde_json::Value,
}

impl NewInsight {
    pub fn new<T: Serialize>(kind: InsightKind, details: &T) -> Result<Self, serde_json::Error> {
        Ok(Self {
            kind,
            date: None,
            details: serde_json::to_value(details)?,
        })
    }

    /// Free-form annotation, optionally tied to a calendar date
    pub fn note(for_date: Option<&str>, text: &str) -> Self {
        let mut details = serde_json::Map::new();
        if let Some(d) = for_date {
            details.insert(FOR_DATE_KEY.to_string(), d.into());
        }
        details.insert("text".to_string(), text.into());
        Self {
            kind: InsightKind::Note,
            date: None,
            details: serde_json::Value::Object(details),
        }
    }

    /// Pin the creation timestamp instead of taking `now` at append time
    pub fn at(mut self, date: DateTime<Utc>) -> Self {
        self.date = Some(date);
        self
    }
}
