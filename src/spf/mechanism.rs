//! SPF record parsing (RFC 7208 sections 4.6 and 5).
//!
//! A record is split on whitespace after the `v=spf1` version tag. Each term is
//! either a directive (optional qualifier + mechanism) or a `name=value` modifier.

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

static DIRECTIVE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<q>[+\-~?])?(?P<name>[A-Za-z][A-Za-z0-9]*)(?P<rest>[:/].*)?$")
        .expect("directive regex is valid")
});

static MODIFIER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<name>[A-Za-z][A-Za-z0-9_.\-]*)=(?P<value>.*)$")
        .expect("modifier regex is valid")
});

/// Qualifier prefix on a directive. Defaults to Pass if omitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Qualifier {
    Pass,     // +
    Fail,     // -
    SoftFail, // ~
    Neutral,  // ?
}

impl Qualifier {
    fn from_prefix(prefix: Option<&str>) -> Qualifier {
        match prefix {
            Some("-") => Qualifier::Fail,
            Some("~") => Qualifier::SoftFail,
            Some("?") => Qualifier::Neutral,
            _ => Qualifier::Pass,
        }
    }
}

impl fmt::Display for Qualifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Qualifier::Pass => write!(f, "+"),
            Qualifier::Fail => write!(f, "-"),
            Qualifier::SoftFail => write!(f, "~"),
            Qualifier::Neutral => write!(f, "?"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MechanismKind {
    Include,
    A,
    Mx,
    Ptr,
    Exists,
    Ip4,
    Ip6,
    All,
}

impl MechanismKind {
    fn parse(name: &str) -> Option<MechanismKind> {
        match name.to_ascii_lowercase().as_str() {
            "include" => Some(MechanismKind::Include),
            "a" => Some(MechanismKind::A),
            "mx" => Some(MechanismKind::Mx),
            "ptr" => Some(MechanismKind::Ptr),
            "exists" => Some(MechanismKind::Exists),
            "ip4" => Some(MechanismKind::Ip4),
            "ip6" => Some(MechanismKind::Ip6),
            "all" => Some(MechanismKind::All),
            _ => None,
        }
    }

    /// Mechanisms whose evaluation costs a DNS lookup.
    pub fn costs_lookup(&self) -> bool {
        matches!(
            self,
            MechanismKind::Include
                | MechanismKind::A
                | MechanismKind::Mx
                | MechanismKind::Ptr
                | MechanismKind::Exists
        )
    }
}

/// A CIDR prefix length pair for `a` and `mx` mechanisms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DualCidr {
    pub v4: u8,
    pub v6: u8,
}

impl Default for DualCidr {
    fn default() -> Self {
        Self { v4: 32, v6: 128 }
    }
}

/// One directive of an SPF record.
///
/// `value` is the argument after the mechanism name with the leading `:`
/// removed (`a/24` keeps its `/24`); `raw` is the term exactly as written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpfMechanism {
    pub kind: MechanismKind,
    pub qualifier: Qualifier,
    pub value: String,
    pub raw: String,
}

impl SpfMechanism {
    /// Domain argument of `include`, `exists`, `ptr`, `a` or `mx`, if given.
    pub fn domain(&self) -> Option<&str> {
        let domain = self.value.split('/').next().unwrap_or("");
        if domain.is_empty() {
            None
        } else {
            Some(domain)
        }
    }

    /// CIDR suffix of an `a`/`mx` mechanism (`/24`, `//64`, `/24//64`).
    pub fn dual_cidr(&self) -> DualCidr {
        // Already validated by the parser
        parse_dual_cidr(&self.value).unwrap_or_default()
    }

    /// True when the domain argument contains an SPF macro (`%{i}` and friends).
    pub fn has_macro(&self) -> bool {
        self.value.contains('%')
    }
}

/// A `name=value` modifier (`redirect`, `exp`, or unknown).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpfModifier {
    pub name: String,
    pub value: String,
    pub raw: String,
}

/// A parsed SPF record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpfRecord {
    pub mechanisms: Vec<SpfMechanism>,
    pub modifiers: Vec<SpfModifier>,
}

impl SpfRecord {
    /// Target of the `redirect=` modifier.
    pub fn redirect(&self) -> Option<&str> {
        self.modifier("redirect")
    }

    /// Value of the `exp=` modifier.
    pub fn explanation(&self) -> Option<&str> {
        self.modifier("exp")
    }

    fn modifier(&self, name: &str) -> Option<&str> {
        self.modifiers
            .iter()
            .find(|m| m.name == name)
            .map(|m| m.value.as_str())
    }

    /// The `all` directive, if the record has one.
    pub fn all(&self) -> Option<&SpfMechanism> {
        self.mechanisms
            .iter()
            .find(|m| m.kind == MechanismKind::All)
    }

    /// DNS lookups this record costs on its own (not counting nested records).
    ///
    /// `redirect=` counts only when the record has no `all`, since it is
    /// never evaluated otherwise.
    pub fn lookup_terms(&self) -> usize {
        let mechanisms = self
            .mechanisms
            .iter()
            .filter(|m| m.kind.costs_lookup())
            .count();
        let redirect = usize::from(self.redirect().is_some() && self.all().is_none());
        mechanisms + redirect
    }
}

/// Error type for SPF record parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpfParseError {
    #[error("invalid SPF version: expected 'v=spf1'")]
    InvalidVersion,
    #[error("unknown mechanism: {0}")]
    UnknownMechanism(String),
    #[error("invalid mechanism argument: {0}")]
    InvalidArgument(String),
    #[error("duplicate modifier: {0}")]
    DuplicateModifier(String),
    #[error("missing required argument for {0}")]
    MissingArgument(String),
    #[error("invalid CIDR prefix: {0}")]
    InvalidCidr(String),
}

/// Parses a `/cidr4`, `//cidr6` or `/cidr4//cidr6` suffix of an `a`/`mx` value.
fn parse_dual_cidr(value: &str) -> Result<DualCidr, SpfParseError> {
    let mut cidr = DualCidr::default();
    let Some(start) = value.find('/') else {
        return Ok(cidr);
    };
    let suffix = &value[start..];

    let (v4_part, v6_part) = match suffix.find("//") {
        Some(pos) => (&suffix[..pos], Some(&suffix[pos + 2..])),
        None => (suffix, None),
    };

    if let Some(v4) = v4_part.strip_prefix('/') {
        cidr.v4 = v4
            .parse::<u8>()
            .ok()
            .filter(|len| *len <= 32)
            .ok_or_else(|| SpfParseError::InvalidCidr(value.to_string()))?;
    }
    if let Some(v6) = v6_part {
        cidr.v6 = v6
            .parse::<u8>()
            .ok()
            .filter(|len| *len <= 128)
            .ok_or_else(|| SpfParseError::InvalidCidr(value.to_string()))?;
    }
    Ok(cidr)
}

/// Validates an `ip4:` / `ip6:` network argument.
pub(crate) fn validate_network(kind: MechanismKind, value: &str) -> Result<(), SpfParseError> {
    let (addr, prefix) = match value.split_once('/') {
        Some((addr, prefix)) => (addr, Some(prefix)),
        None => (value, None),
    };
    let max_prefix = match kind {
        MechanismKind::Ip4 => {
            addr.parse::<Ipv4Addr>()
                .map_err(|_| SpfParseError::InvalidArgument(value.to_string()))?;
            32
        }
        _ => {
            addr.parse::<Ipv6Addr>()
                .map_err(|_| SpfParseError::InvalidArgument(value.to_string()))?;
            128
        }
    };
    if let Some(prefix) = prefix {
        match prefix.parse::<u8>() {
            Ok(len) if len <= max_prefix => {}
            _ => return Err(SpfParseError::InvalidCidr(value.to_string())),
        }
    }
    Ok(())
}

fn parse_directive(term: &str) -> Result<SpfMechanism, SpfParseError> {
    let caps = DIRECTIVE_REGEX
        .captures(term)
        .ok_or_else(|| SpfParseError::UnknownMechanism(term.to_string()))?;
    let name = &caps["name"];
    let kind =
        MechanismKind::parse(name).ok_or_else(|| SpfParseError::UnknownMechanism(term.to_string()))?;
    let qualifier = Qualifier::from_prefix(caps.name("q").map(|m| m.as_str()));
    let rest = caps.name("rest").map(|m| m.as_str()).unwrap_or("");
    let value = rest.strip_prefix(':').unwrap_or(rest).to_string();

    match kind {
        MechanismKind::All => {
            if !rest.is_empty() {
                return Err(SpfParseError::InvalidArgument(term.to_string()));
            }
        }
        MechanismKind::Include | MechanismKind::Exists => {
            if !rest.starts_with(':') || value.is_empty() {
                return Err(SpfParseError::MissingArgument(name.to_ascii_lowercase()));
            }
        }
        MechanismKind::Ip4 | MechanismKind::Ip6 => {
            if !rest.starts_with(':') || value.is_empty() {
                return Err(SpfParseError::MissingArgument(name.to_ascii_lowercase()));
            }
            validate_network(kind, &value)?;
        }
        MechanismKind::A | MechanismKind::Mx => {
            if rest.starts_with(':') && value.split('/').next().unwrap_or("").is_empty() {
                return Err(SpfParseError::MissingArgument(name.to_ascii_lowercase()));
            }
            parse_dual_cidr(&value)?;
        }
        MechanismKind::Ptr => {
            if rest.starts_with('/') {
                return Err(SpfParseError::InvalidArgument(term.to_string()));
            }
        }
    }

    Ok(SpfMechanism {
        kind,
        qualifier,
        value,
        raw: term.to_string(),
    })
}

/// Parses an SPF record string.
///
/// # Errors
///
/// Returns `SpfParseError::InvalidVersion` if the record does not start with
/// `v=spf1`, or another variant for the first malformed term.
pub fn parse_spf(record: &str) -> Result<SpfRecord, SpfParseError> {
    let mut terms = record.split_whitespace();
    match terms.next() {
        Some(version) if version.eq_ignore_ascii_case("v=spf1") => {}
        _ => return Err(SpfParseError::InvalidVersion),
    }

    let mut mechanisms = Vec::new();
    let mut modifiers: Vec<SpfModifier> = Vec::new();
    for term in terms {
        if let Some(caps) = MODIFIER_REGEX.captures(term) {
            let name = caps["name"].to_ascii_lowercase();
            if (name == "redirect" || name == "exp") && modifiers.iter().any(|m| m.name == name) {
                return Err(SpfParseError::DuplicateModifier(name));
            }
            modifiers.push(SpfModifier {
                name,
                value: caps["value"].to_string(),
                raw: term.to_string(),
            });
        } else {
            mechanisms.push(parse_directive(term)?);
        }
    }

    Ok(SpfRecord {
        mechanisms,
        modifiers,
    })
}

/// Counts the DNS lookups a record costs on its own, without any network I/O.
pub fn count_spf_lookups(record: &str) -> Result<usize, SpfParseError> {
    parse_spf(record).map(|parsed| parsed.lookup_terms())
}
