//! Record-type-agnostic queries and value normalization.
//!
//! Propagation checks compare answers across resolvers and against the value the
//! engine generated, so every record type is reduced to a canonical string form.

use std::net::IpAddr;

use crate::error_handling::DnsQueryError;

use super::client::DnsQuery;
use super::types::{MxRecord, RecordKind};

/// Queries `name` for `kind` and returns the answers in canonical string form.
///
/// # Errors
///
/// Returns the classified `DnsQueryError` from the underlying client.
pub async fn query_record_values<C: DnsQuery>(
    client: &C,
    kind: RecordKind,
    name: &str,
) -> Result<Vec<String>, DnsQueryError> {
    let values: Vec<String> = match kind {
        RecordKind::Ns => client.query_nameservers(name).await?,
        RecordKind::Txt => client.query_txt(name).await?,
        RecordKind::Mx => client
            .query_mx(name)
            .await?
            .iter()
            .map(MxRecord::to_string)
            .collect(),
        RecordKind::Cname => client.query_cname(name).await?,
        RecordKind::A => client
            .query_a(name)
            .await?
            .iter()
            .map(|ip| ip.to_string())
            .collect(),
        RecordKind::Aaaa => client
            .query_aaaa(name)
            .await?
            .iter()
            .map(|ip| ip.to_string())
            .collect(),
    };
    Ok(values
        .iter()
        .map(|value| normalize_value(kind, value))
        .collect())
}

/// Canonical form of a record value for comparison.
///
/// - TXT: quoted character-strings are unquoted and concatenated
/// - MX: `"<priority> <host>"` with a lowercase host and no trailing dot
/// - NS/CNAME: lowercase host without trailing dot
/// - A/AAAA: the parsed address, so `::0001` and `::1` compare equal
pub fn normalize_value(kind: RecordKind, value: &str) -> String {
    let value = value.trim();
    match kind {
        RecordKind::Txt => unquote_txt(value),
        RecordKind::Mx => match value.parse::<MxRecord>() {
            Ok(mx) => format!("{} {}", mx.priority, normalize_host(&mx.exchange)),
            Err(_) => normalize_host(value),
        },
        RecordKind::Ns | RecordKind::Cname => normalize_host(value),
        RecordKind::A | RecordKind::Aaaa => value
            .parse::<IpAddr>()
            .map(|ip| ip.to_string())
            .unwrap_or_else(|_| value.to_string()),
    }
}

fn normalize_host(host: &str) -> String {
    host.trim().trim_end_matches('.').to_lowercase()
}

/// Joins `"part one" "part two"` zone-file notation into a single string.
///
/// Values that are not fully quoted are returned unchanged.
fn unquote_txt(value: &str) -> String {
    if !(value.starts_with('"') && value.ends_with('"') && value.len() >= 2) {
        return value.to_string();
    }

    let mut joined = String::with_capacity(value.len());
    let mut in_quotes = false;
    let mut escaped = false;
    for c in value.chars() {
        if escaped {
            joined.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            c if in_quotes => joined.push(c),
            // Whitespace between character-strings
            _ => {}
        }
    }
    joined
}
