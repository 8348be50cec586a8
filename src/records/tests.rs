//! Record generator tests.

use super::*;
use crate::dns::{MxRecord, RecordKind};
use crate::error_handling::{AuthError, ErrorKind};

/// Base64 body of the requested length, shaped like an RSA SubjectPublicKeyInfo.
fn fake_key(len: usize) -> String {
    let prefix = "MIIBIjANBgkqhkiG9w0BAQEFAAOCAQ8AMIIBCgKCAQEA";
    let suffix = "IDAQAB";
    format!("{prefix}{}{suffix}", "Q".repeat(len - prefix.len() - suffix.len()))
}

#[test]
fn test_dkim_google_defaults() {
    let key = fake_key(216);
    let record = generate_dkim(&DkimOptions::new(
        "Example.com",
        Provider::GoogleWorkspace,
        key.clone(),
    ))
    .unwrap();

    assert_eq!(record.selector, "google");
    assert_eq!(record.record_name, "google._domainkey.example.com");
    assert_eq!(record.record_value, format!("v=DKIM1; k=rsa; p={key}"));
    assert!(!record.requires_splitting);
    assert!(record.split_values.is_empty());
    assert!(record.is_valid());

    let specs = record.dns_records();
    assert_eq!(specs.len(), 1);
    assert_eq!(specs[0].record_type, RecordKind::Txt);
    assert_eq!(specs[0].content, record.record_value);
}

#[test]
fn test_dkim_custom_selector_default() {
    let record = generate_dkim(&DkimOptions::new("example.com", Provider::Custom, fake_key(216)))
        .unwrap();
    assert_eq!(record.record_name, "default._domainkey.example.com");
}

#[test]
fn test_dkim_2048_key_is_split_and_rejoins() {
    let mut options = DkimOptions::new("example.com", Provider::GoogleWorkspace, fake_key(392));
    options.key_length = Some(2048);
    let record = generate_dkim(&options).unwrap();

    assert!(record.requires_splitting);
    assert!(record.record_value.len() > 255);
    assert_eq!(record.split_values.len(), 2);
    assert!(record.split_values.iter().all(|part| part.len() <= 255));
    assert_eq!(record.split_values.concat(), record.record_value);
    assert!(record.warnings.is_empty());

    // The published form is quoted strings; propagation compares the joined value
    let spec = &record.dns_records()[0];
    assert!(spec.content.starts_with("\"v=DKIM1; k=rsa; p="));
    let expected = spec.expected();
    assert!(expected.matches(&[record.record_value.clone()]));
}

#[test]
fn test_dkim_without_splitting_reports_limit() {
    let mut options = DkimOptions::new("example.com", Provider::GoogleWorkspace, fake_key(392));
    options.split_for_dns_limit = false;
    let record = generate_dkim(&options).unwrap();

    assert!(record.requires_splitting);
    assert!(record.split_values.is_empty());
    assert_eq!(record.errors[0].kind, ErrorKind::CharacterLimitExceeded);
    assert!(record.dns_records().is_empty());
}

#[test]
fn test_dkim_key_length_mismatch_warns() {
    let mut options = DkimOptions::new("example.com", Provider::GoogleWorkspace, fake_key(216));
    options.key_length = Some(2048);
    let record = generate_dkim(&options).unwrap();
    assert!(record.is_valid());
    assert_eq!(record.warnings.len(), 1);
    assert!(record.warnings[0].message.contains("1024-bit"));
}

#[test]
fn test_dkim_rejects_bad_input() {
    let empty = DkimOptions::new("example.com", Provider::GoogleWorkspace, "  ");
    assert!(matches!(generate_dkim(&empty), Err(AuthError::Validation(_))));

    let not_base64 = DkimOptions::new("example.com", Provider::GoogleWorkspace, "not a key!");
    assert!(matches!(generate_dkim(&not_base64), Err(AuthError::Validation(_))));

    let mut odd_length = DkimOptions::new("example.com", Provider::GoogleWorkspace, fake_key(216));
    odd_length.key_length = Some(4096);
    assert!(matches!(generate_dkim(&odd_length), Err(AuthError::Validation(_))));

    let mut bad_selector = DkimOptions::new("example.com", Provider::Custom, fake_key(216));
    bad_selector.selector = Some("bad selector".to_string());
    assert!(matches!(generate_dkim(&bad_selector), Err(AuthError::Validation(_))));

    let no_domain = DkimOptions::new("", Provider::Custom, fake_key(216));
    assert!(matches!(generate_dkim(&no_domain), Err(AuthError::Validation(_))));
}

#[test]
fn test_dkim_accepts_pem_armor() {
    let key = fake_key(216);
    let pem = format!(
        "-----BEGIN PUBLIC KEY-----\n{}\n{}\n-----END PUBLIC KEY-----\n",
        &key[..64],
        &key[64..]
    );
    let record =
        generate_dkim(&DkimOptions::new("example.com", Provider::GoogleWorkspace, pem)).unwrap();
    assert_eq!(record.record_value, format!("v=DKIM1; k=rsa; p={key}"));
}

#[test]
fn test_generators_are_idempotent() {
    let dkim = DkimOptions::new("example.com", Provider::GoogleWorkspace, fake_key(392));
    assert_eq!(generate_dkim(&dkim).unwrap(), generate_dkim(&dkim).unwrap());

    let mut dmarc = DmarcOptions::new("example.com", DmarcPolicy::Quarantine);
    dmarc.rua = vec!["dmarc@example.com".to_string()];
    assert_eq!(generate_dmarc(&dmarc).unwrap(), generate_dmarc(&dmarc).unwrap());

    let mx = MxOptions::new("example.com", Provider::GoogleWorkspace);
    assert_eq!(generate_mx(&mx).unwrap(), generate_mx(&mx).unwrap());
}

#[test]
fn test_dmarc_tag_order() {
    let mut options = DmarcOptions::new("example.com", DmarcPolicy::Quarantine);
    options.subdomain_policy = Some(DmarcPolicy::Reject);
    options.percentage = 50;
    options.rua = vec![
        "mailto:dmarc@example.com".to_string(),
        "reports@vendor.example".to_string(),
    ];
    options.ruf = vec!["forensic@example.com".to_string()];
    options.failure_options = Some("1".to_string());
    options.adkim = Alignment::Strict;
    options.report_interval = Some(86400);

    let record = generate_dmarc(&options).unwrap();
    assert_eq!(record.record_name, "_dmarc.example.com");
    assert_eq!(
        record.record_value,
        "v=DMARC1; p=quarantine; sp=reject; pct=50; \
         rua=mailto:dmarc@example.com,mailto:reports@vendor.example; \
         ruf=mailto:forensic@example.com; fo=1; adkim=s; aspf=r; ri=86400"
    );
    assert!(record.errors.is_empty());
    assert!(record.warnings.is_empty());
}

#[test]
fn test_dmarc_minimal_record_always_has_pct() {
    let record = generate_dmarc(&DmarcOptions::new("example.com", DmarcPolicy::None)).unwrap();
    assert_eq!(
        record.record_value,
        "v=DMARC1; p=none; pct=100; adkim=r; aspf=r"
    );
    // p=none and missing rua both warn
    assert_eq!(record.warnings.len(), 2);
}

#[test]
fn test_dmarc_percentage_out_of_range() {
    let mut options = DmarcOptions::new("example.com", DmarcPolicy::Reject);
    options.percentage = 101;
    assert!(matches!(generate_dmarc(&options), Err(AuthError::Validation(_))));
    options.percentage = 0;
    assert!(generate_dmarc(&options).is_ok());
}

#[test]
fn test_dmarc_reject_to_none_requires_override() {
    let mut options = DmarcOptions::new("example.com", DmarcPolicy::None);
    options.existing_policy = Some(DmarcPolicy::Reject);
    assert!(matches!(generate_dmarc(&options), Err(AuthError::Validation(_))));

    options.allow_policy_downgrade = true;
    let record = generate_dmarc(&options).unwrap();
    assert!(record
        .warnings
        .iter()
        .any(|w| w.message.contains("reject -> none")));
}

#[test]
fn test_dmarc_softer_downgrade_only_warns() {
    let mut options = DmarcOptions::new("example.com", DmarcPolicy::Quarantine);
    options.existing_policy = Some(DmarcPolicy::Reject);
    options.rua = vec!["dmarc@example.com".to_string()];
    let record = generate_dmarc(&options).unwrap();
    assert_eq!(record.warnings.len(), 1);

    // Upgrades are silent
    options.existing_policy = Some(DmarcPolicy::None);
    assert!(generate_dmarc(&options).unwrap().warnings.is_empty());
}

#[test]
fn test_parse_published_dmarc_policy() {
    assert_eq!(
        parse_dmarc_policy("v=DMARC1; sp=none; p=reject; pct=100"),
        Some(DmarcPolicy::Reject)
    );
    assert_eq!(parse_dmarc_policy("v=DMARC1;P=Quarantine"), Some(DmarcPolicy::Quarantine));
    assert_eq!(parse_dmarc_policy("v=DMARC1; sp=reject"), None);
    assert_eq!(parse_dmarc_policy("v=DMARC1; p=block"), None);
}

#[test]
fn test_dmarc_invalid_report_address_is_omitted() {
    let mut options = DmarcOptions::new("example.com", DmarcPolicy::Reject);
    options.rua = vec!["not-an-address".to_string(), "dmarc@example.com".to_string()];
    options.failure_options = Some("x".to_string());
    let record = generate_dmarc(&options).unwrap();

    assert_eq!(record.errors.len(), 2);
    assert!(record.record_value.contains("rua=mailto:dmarc@example.com;"));
    assert!(!record.record_value.contains("fo="));
}

#[test]
fn test_mx_google_workspace() {
    let set = generate_mx(&MxOptions::new("example.com", Provider::GoogleWorkspace)).unwrap();
    assert_eq!(set.records, vec![MxRecord::new(1, "smtp.google.com")]);

    let specs = set.dns_records();
    assert_eq!(specs.len(), 1);
    assert_eq!(specs[0].record_type, RecordKind::Mx);
    assert_eq!(specs[0].name, "example.com");
    assert_eq!(specs[0].priority, Some(1));
    assert_eq!(specs[0].expected().value, "1 smtp.google.com");
}

#[test]
fn test_mx_custom_passes_through_unchanged() {
    let options = MxOptions::new("example.com", Provider::Custom)
        .with_record(20, "Backup.Mail.example.")
        .with_record(10, "mx1.mail.example");
    let set = generate_mx(&options).unwrap();
    assert_eq!(set.records, options.custom_records);

    let empty = generate_mx(&MxOptions::new("example.com", Provider::Custom)).unwrap();
    assert!(!empty.is_valid());
}

#[test]
fn test_tracking_cname_is_never_proxied() {
    let record =
        generate_tracking(&TrackingOptions::new("example.com", "open.vendor-track.com")).unwrap();
    assert_eq!(record.record_name, "emailtracking.example.com");
    assert!(!record.proxied);

    let spec = &record.dns_records()[0];
    assert_eq!(spec.record_type, RecordKind::Cname);
    assert_eq!(spec.proxied, Some(false));
    assert_eq!(spec.content, "open.vendor-track.com");
}

#[test]
fn test_tracking_custom_subdomain_and_validation() {
    let mut options = TrackingOptions::new("example.com", "open.vendor-track.com");
    options.subdomain = Some("Track".to_string());
    assert_eq!(
        generate_tracking(&options).unwrap().record_name,
        "track.example.com"
    );

    options.target = String::new();
    assert!(matches!(generate_tracking(&options), Err(AuthError::Validation(_))));
}

#[test]
fn test_verification_record() {
    let record = generate_verification("example.com", "abc123").unwrap();
    assert_eq!(record.record_name, "example.com");
    assert_eq!(record.record_value, "google-site-verification=abc123");

    let prefixed = generate_verification("example.com", "google-site-verification=abc123").unwrap();
    assert_eq!(prefixed, record);

    assert!(generate_verification("example.com", "").is_err());
}

#[test]
fn test_spf_base_record() {
    let mut options = SpfOptions::new("example.com", Provider::GoogleWorkspace);
    options.ip_addresses = vec!["192.0.2.0/24".to_string(), "2001:db8::/32".to_string()];
    options.additional_includes = vec!["sendgrid.net".to_string()];
    let record = generate_spf(&options).unwrap();
    assert_eq!(
        record.record_value,
        "v=spf1 ip4:192.0.2.0/24 ip6:2001:db8::/32 include:_spf.google.com include:sendgrid.net ~all"
    );
    assert!(record.is_valid());

    let empty = generate_spf(&SpfOptions::new("example.com", Provider::Custom)).unwrap();
    assert!(!empty.is_valid());
}

#[test]
fn test_spf_base_record_omits_bad_prefix_and_include() {
    let mut options = SpfOptions::new("example.com", Provider::Custom);
    options.ip_addresses = vec![
        "192.0.2.0/33".to_string(),
        "192.0.2.0/24".to_string(),
        "2001:db8::/129".to_string(),
        "198.51.100.7/x".to_string(),
    ];
    options.additional_includes = vec!["bad domain.example".to_string(), "sendgrid.net".to_string()];
    let record = generate_spf(&options).unwrap();

    assert_eq!(
        record.record_value,
        "v=spf1 ip4:192.0.2.0/24 include:sendgrid.net ~all"
    );
    assert_eq!(record.errors.len(), 4);
    assert!(record.errors.iter().all(|e| e.kind == ErrorKind::Validation));
    assert!(record.errors[0].message.contains("192.0.2.0/33"));
}

#[test]
fn test_spf_base_record_over_budget() {
    let mut options = SpfOptions::new("example.com", Provider::GoogleWorkspace);
    options.additional_includes = (0..10).map(|i| format!("s{i}.example")).collect();
    let record = generate_spf(&options).unwrap();
    assert_eq!(record.errors[0].kind, ErrorKind::LookupBudgetExceeded);
}

#[test]
fn test_split_txt_value() {
    let value = "a".repeat(600);
    let parts = split_txt_value(&value, 255);
    assert_eq!(parts.iter().map(String::len).collect::<Vec<_>>(), vec![255, 255, 90]);
    assert_eq!(parts.concat(), value);
    assert_eq!(split_txt_value("short", 255), vec!["short"]);
}

#[test]
fn test_expected_record_matching() {
    let expected = ExpectedRecord::new(RecordKind::Mx, "example.com", "1 SMTP.google.com.");
    assert!(expected.matches(&["5 other.example".to_string(), "1 smtp.google.com".to_string()]));
    assert!(!expected.matches(&["10 smtp.google.com".to_string()]));
}
