//! DNS record types shared by the query client and the record generators.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum_macros::EnumIter as EnumIterMacro;

/// Record types the engine queries and generates.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, EnumIterMacro, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordKind {
    Ns,
    Txt,
    Mx,
    Cname,
    A,
    Aaaa,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Ns => "NS",
            RecordKind::Txt => "TXT",
            RecordKind::Mx => "MX",
            RecordKind::Cname => "CNAME",
            RecordKind::A => "A",
            RecordKind::Aaaa => "AAAA",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NS" => Ok(RecordKind::Ns),
            "TXT" => Ok(RecordKind::Txt),
            "MX" => Ok(RecordKind::Mx),
            "CNAME" => Ok(RecordKind::Cname),
            "A" => Ok(RecordKind::A),
            "AAAA" => Ok(RecordKind::Aaaa),
            other => Err(format!("unsupported record type: {other}")),
        }
    }
}

/// A mail exchanger record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MxRecord {
    pub priority: u16,
    pub exchange: String,
}

impl MxRecord {
    pub fn new(priority: u16, exchange: impl Into<String>) -> Self {
        Self {
            priority,
            exchange: exchange.into(),
        }
    }
}

impl fmt::Display for MxRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.priority, self.exchange)
    }
}

impl FromStr for MxRecord {
    type Err = String;

    /// Parses `"<priority> <exchange>"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let priority = parts
            .next()
            .ok_or_else(|| "empty MX record".to_string())?
            .parse::<u16>()
            .map_err(|e| format!("invalid MX priority in '{s}': {e}"))?;
        let exchange = parts
            .next()
            .ok_or_else(|| format!("missing MX exchange in '{s}'"))?;
        if parts.next().is_some() {
            return Err(format!("unexpected trailing data in MX record '{s}'"));
        }
        Ok(MxRecord::new(priority, exchange))
    }
}
