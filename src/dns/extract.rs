//! DNS record extraction utilities.
//!
//! This module provides functions to extract policy records (SPF, DMARC) from
//! TXT record collections.

/// Returns true if `txt` is an SPF record (`v=spf1` followed by a space or nothing).
pub fn is_spf_record(txt: &str) -> bool {
    let txt = txt.trim();
    match txt.get(..6) {
        Some(prefix) if prefix.eq_ignore_ascii_case("v=spf1") => {
            txt.len() == 6 || txt[6..].starts_with(' ')
        }
        _ => false,
    }
}

/// Extracts all SPF records from TXT records.
///
/// More than one SPF record on a name is a configuration error (RFC 7208 §4.5),
/// so callers need to see all of them.
pub fn extract_spf_records(txt_records: &[String]) -> Vec<String> {
    txt_records
        .iter()
        .filter(|txt| is_spf_record(txt))
        .map(|s| s.trim().to_string())
        .collect()
}

/// Extracts DMARC record from TXT records.
///
/// DMARC records live at `_dmarc.<domain>` and start with "v=DMARC1".
///
/// # Returns
///
/// The first DMARC record found, or `None` if no DMARC record exists.
pub fn extract_dmarc_record(txt_records: &[String]) -> Option<String> {
    txt_records
        .iter()
        .find(|txt| txt.trim().starts_with("v=DMARC1"))
        .map(|s| s.trim().to_string())
}
