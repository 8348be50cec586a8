//! SPF flattening tests.

use super::*;
use crate::dns::{MockDnsClient, RecordKind};
use crate::error_handling::{AuthError, DnsErrorKind, ErrorKind};
use std::net::Ipv4Addr;
use std::time::Duration;

fn google_client() -> MockDnsClient {
    let client = MockDnsClient::new();
    client.add_txt("example.com", "v=spf1 include:_spf.google.com ~all");
    client.add_txt(
        "_spf.google.com",
        "v=spf1 ip4:35.190.247.0/24 ip4:64.233.160.0/19 ~all",
    );
    client
}

fn count_kind(result: &FlattenedSpfResult, kind: ErrorKind) -> usize {
    result.errors.iter().filter(|i| i.kind == kind).count()
}

#[tokio::test]
async fn test_flatten_google_workspace() {
    let client = google_client();
    let result = flatten_spf(&client, &FlattenOptions::new("example.com"))
        .await
        .unwrap();

    assert_eq!(
        result.flattened_record,
        "v=spf1 ip4:35.190.247.0/24 ip4:64.233.160.0/19 ~all"
    );
    assert_eq!(result.lookup_count_before, 1);
    assert_eq!(result.lookup_count_after, 0);
    assert_eq!(result.lookups_performed, 1);
    assert_eq!(result.ipv4, vec!["35.190.247.0/24", "64.233.160.0/19"]);
    assert_eq!(result.resolved_includes, vec!["_spf.google.com"]);
    assert_eq!(result.character_count, result.flattened_record.len());
    assert!(!result.exceeds_char_limit);
    assert!(result.errors.is_empty());

    let chain = &result.include_chain;
    assert_eq!(chain.domain, "example.com");
    assert_eq!(chain.children.len(), 1);
    assert_eq!(chain.children[0].depth, 1);
    assert_eq!(chain.children[0].lookup_count, 1);
}

#[tokio::test]
async fn test_flatten_uses_original_spf_without_root_lookup() {
    let client = google_client();
    let options = FlattenOptions::new("example.com")
        .with_original_spf("v=spf1 ip4:192.0.2.10 include:_spf.google.com -all");
    let result = flatten_spf(&client, &options).await.unwrap();

    assert_eq!(
        result.flattened_record,
        "v=spf1 ip4:192.0.2.10 ip4:35.190.247.0/24 ip4:64.233.160.0/19 -all"
    );
    assert_eq!(
        client.queries(),
        vec![(RecordKind::Txt, "_spf.google.com".to_string())]
    );
}

#[tokio::test]
async fn test_cycle_terminates_and_is_marked() {
    let client = MockDnsClient::new();
    client.add_txt("a.example", "v=spf1 include:b.example -all");
    client.add_txt("b.example", "v=spf1 ip4:192.0.2.1 include:a.example ~all");

    let result = flatten_spf(&client, &FlattenOptions::new("a.example"))
        .await
        .unwrap();

    assert_eq!(result.flattened_record, "v=spf1 ip4:192.0.2.1 -all");
    assert_eq!(result.lookup_count_before, 1);
    assert_eq!(result.lookups_performed, 1);

    let b = result.include_chain.find("b.example").unwrap();
    assert_eq!(b.children.len(), 1);
    let again = &b.children[0];
    assert_eq!(again.domain, "a.example");
    assert!(again.circular);
    assert_eq!(again.lookup_count, 0);
    assert_eq!(again.depth, 2);

    assert!(result
        .warnings
        .iter()
        .any(|w| w.kind == ErrorKind::CircularReference));
    assert!(result.errors.is_empty());
}

#[tokio::test]
async fn test_self_include_is_circular() {
    let client = MockDnsClient::new();
    let options = FlattenOptions::new("loop.example")
        .with_original_spf("v=spf1 include:loop.example ip4:198.51.100.0/24 -all");
    let result = flatten_spf(&client, &options).await.unwrap();

    assert_eq!(result.flattened_record, "v=spf1 ip4:198.51.100.0/24 -all");
    assert!(result.include_chain.children[0].circular);
    assert_eq!(client.query_count(), 0);
}

#[tokio::test]
async fn test_lookup_budget_is_enforced_exactly() {
    let client = MockDnsClient::new();
    let mut root = String::from("v=spf1");
    for i in 0..12 {
        let domain = format!("s{i}.example");
        root.push_str(&format!(" include:{domain}"));
        client.add_txt(&domain, &format!("v=spf1 ip4:10.0.{i}.0/24 -all"));
    }
    root.push_str(" -all");

    let options = FlattenOptions::new("example.com").with_original_spf(root);
    let result = flatten_spf(&client, &options).await.unwrap();

    assert_eq!(result.lookups_performed, 10);
    assert_eq!(client.query_count(), 10);
    assert_eq!(result.lookup_count_before, 12);
    assert_eq!(result.lookup_count_after, 0);
    assert_eq!(result.ipv4.len(), 10);
    assert_eq!(count_kind(&result, ErrorKind::LookupBudgetExceeded), 2);

    // The two includes that did not fit are reported, in document order
    let unresolved: Vec<&str> = result
        .include_chain
        .children
        .iter()
        .filter(|c| c.error.is_some())
        .map(|c| c.domain.as_str())
        .collect();
    assert_eq!(unresolved, vec!["s10.example", "s11.example"]);
    assert!(!result.flattened_record.contains("include:"));
}

#[tokio::test]
async fn test_budget_spans_levels() {
    let client = MockDnsClient::new();
    client.add_txt("l1.example", "v=spf1 include:l2.example a:host.example -all");
    client.add_txt("l2.example", "v=spf1 ip4:192.0.2.0/28 -all");
    client.add_a("host.example", Ipv4Addr::new(203, 0, 113, 5));

    let options = FlattenOptions::new("example.com")
        .with_original_spf("v=spf1 include:l1.example -all")
        .with_ipv6_support(false);
    let flattener = SpfFlattener::new(&client).with_max_lookups(2);
    let result = flattener.flatten(&options).await.unwrap();

    // l1 and l2 fit; the a:host lookup queued at level 2 after l2 does not
    assert_eq!(result.lookups_performed, 2);
    assert_eq!(result.ipv4, vec!["192.0.2.0/28"]);
    assert_eq!(count_kind(&result, ErrorKind::LookupBudgetExceeded), 1);
    assert!(result.errors[0].message.contains("a:host.example"));
}

#[tokio::test]
async fn test_flattened_record_only_keeps_preserved_lookups() {
    let client = MockDnsClient::new();
    client.add_txt(
        "example.com",
        "v=spf1 a mx include:vendor.example include:mail.example ~all",
    );
    client.add_a("example.com", Ipv4Addr::new(192, 0, 2, 1));
    client.add_mx("example.com", 10, "mx1.example.com");
    client.add_a("mx1.example.com", Ipv4Addr::new(192, 0, 2, 25));
    client.add_txt("mail.example", "v=spf1 ip4:198.51.100.0/24 include:vendor.example -all");

    let options = FlattenOptions::new("example.com")
        .with_preserved_include("vendor.example")
        .with_ipv6_support(false);
    let result = flatten_spf(&client, &options).await.unwrap();

    assert_eq!(
        result.flattened_record,
        "v=spf1 include:vendor.example ip4:192.0.2.1 ip4:192.0.2.25 ip4:198.51.100.0/24 ~all"
    );
    assert_eq!(result.lookup_count_after, 1);
    assert!(result.lookup_count_after <= 10);

    let parsed = parse_spf(&result.flattened_record).unwrap();
    for mechanism in &parsed.mechanisms {
        match mechanism.kind {
            MechanismKind::Include => assert_eq!(mechanism.domain(), Some("vendor.example")),
            kind => assert!(!kind.costs_lookup(), "unexpected {kind:?}"),
        }
    }
    assert!(!client
        .queries()
        .iter()
        .any(|(_, name)| name == "vendor.example"));
}

#[tokio::test]
async fn test_removed_include_never_appears() {
    let client = MockDnsClient::new();
    client.add_txt("keep.example", "v=spf1 ip4:192.0.2.0/24 include:old.example -all");
    client.add_txt("old.example", "v=spf1 ip4:203.0.113.0/24 -all");

    let options = FlattenOptions::new("example.com")
        .with_original_spf("v=spf1 include:old.example include:keep.example ~all")
        .with_removed_include("old.example")
        .with_additional_include("old.example");
    let result = flatten_spf(&client, &options).await.unwrap();

    assert_eq!(result.flattened_record, "v=spf1 ip4:192.0.2.0/24 ~all");
    assert!(!result.flattened_record.contains("old.example"));
    assert!(!result.ipv4.contains(&"203.0.113.0/24".to_string()));
    assert!(!client.queries().iter().any(|(_, name)| name == "old.example"));
    assert!(result.include_chain.find("old.example").is_none());
}

#[tokio::test]
async fn test_additional_includes_are_appended() {
    let client = google_client();
    let options = FlattenOptions::new("example.com").with_additional_include("sendgrid.net");
    let result = flatten_spf(&client, &options).await.unwrap();

    assert_eq!(
        result.flattened_record,
        "v=spf1 include:sendgrid.net ip4:35.190.247.0/24 ip4:64.233.160.0/19 ~all"
    );
    assert_eq!(result.lookup_count_after, 1);
}

#[tokio::test]
async fn test_malformed_root_is_validation_error_without_lookup() {
    let client = google_client();
    let options = FlattenOptions::new("example.com").with_original_spf("include:_spf.google.com ~all");
    let err = flatten_spf(&client, &options).await.unwrap_err();

    assert!(matches!(err, AuthError::Validation(_)));
    assert_eq!(err.kind(), Some(ErrorKind::Validation));
    assert_eq!(client.query_count(), 0);
}

#[tokio::test]
async fn test_empty_domain_is_validation_error() {
    let client = MockDnsClient::new();
    let err = flatten_spf(&client, &FlattenOptions::new("  "))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Validation(_)));
}

#[tokio::test]
async fn test_missing_spf_record_is_error() {
    let client = MockDnsClient::new();
    client.add_txt("nospf.example", "google-site-verification=abc");

    let err = flatten_spf(&client, &FlattenOptions::new("nospf.example"))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::NoSpfRecord(ref d) if d == "nospf.example"));

    let err = flatten_spf(&client, &FlattenOptions::new("missing.example"))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::NoSpfRecord(_)));
}

#[tokio::test]
async fn test_multiple_root_spf_records_rejected() {
    let client = MockDnsClient::new();
    client.add_txt("dup.example", "v=spf1 -all");
    client.add_txt("dup.example", "v=spf1 include:_spf.google.com ~all");

    let err = flatten_spf(&client, &FlattenOptions::new("dup.example"))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Validation(_)));
}

#[tokio::test]
async fn test_root_servfail_is_retryable_dns_error() {
    let client = MockDnsClient::new();
    client.set_error(RecordKind::Txt, "flaky.example", DnsErrorKind::ServerFail);

    let err = flatten_spf(&client, &FlattenOptions::new("flaky.example"))
        .await
        .unwrap_err();
    match err {
        AuthError::Dns(e) => assert!(e.is_retryable()),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_nested_failure_is_best_effort() {
    let client = google_client();
    client.set_error(RecordKind::Txt, "broken.example", DnsErrorKind::ServerFail);

    let options = FlattenOptions::new("example.com")
        .with_original_spf("v=spf1 include:_spf.google.com include:broken.example ~all");
    let result = flatten_spf(&client, &options).await.unwrap();

    assert_eq!(
        result.flattened_record,
        "v=spf1 ip4:35.190.247.0/24 ip4:64.233.160.0/19 ~all"
    );
    assert_eq!(count_kind(&result, ErrorKind::ResolverError), 1);
    let broken = result.include_chain.find("broken.example").unwrap();
    assert!(broken.error.as_deref().unwrap().contains("SERVFAIL"));
    assert_eq!(broken.lookup_count, 1);
}

#[tokio::test]
async fn test_nested_include_without_spf_is_error() {
    let client = MockDnsClient::new();
    client.add_txt("plain.example", "some unrelated text");

    let options = FlattenOptions::new("example.com")
        .with_original_spf("v=spf1 ip4:192.0.2.1 include:plain.example -all");
    let result = flatten_spf(&client, &options).await.unwrap();

    assert_eq!(result.flattened_record, "v=spf1 ip4:192.0.2.1 -all");
    assert_eq!(count_kind(&result, ErrorKind::ResolverError), 1);
}

#[tokio::test]
async fn test_a_and_mx_are_flattened_with_cidr() {
    let client = MockDnsClient::new();
    client.add_a("web.example", Ipv4Addr::new(192, 0, 2, 77));
    client.add_aaaa("web.example", "2001:db8::abcd".parse().unwrap());
    client.add_mx("example.com", 10, "mx.example.com");
    client.add_a("mx.example.com", Ipv4Addr::new(198, 51, 100, 9));

    let options = FlattenOptions::new("example.com")
        .with_original_spf("v=spf1 a:web.example/24//64 mx -all");
    let result = flatten_spf(&client, &options).await.unwrap();

    assert_eq!(
        result.flattened_record,
        "v=spf1 ip4:192.0.2.0/24 ip4:198.51.100.9 ip6:2001:db8::/64 -all"
    );
    assert_eq!(result.lookup_count_before, 2);
    assert_eq!(result.lookups_performed, 2);
    assert_eq!(result.include_chain.lookup_count, 2);
}

#[tokio::test]
async fn test_ipv6_disabled_skips_aaaa_and_ip6() {
    let client = MockDnsClient::new();
    client.add_a("web.example", Ipv4Addr::new(192, 0, 2, 1));
    client.add_aaaa("web.example", "2001:db8::1".parse().unwrap());

    let options = FlattenOptions::new("example.com")
        .with_original_spf("v=spf1 ip6:2001:db8:1::/48 a:web.example -all")
        .with_ipv6_support(false);
    let result = flatten_spf(&client, &options).await.unwrap();

    assert_eq!(result.flattened_record, "v=spf1 ip4:192.0.2.1 -all");
    assert!(result.ipv6.is_empty());
    assert!(!client
        .queries()
        .iter()
        .any(|(kind, _)| *kind == RecordKind::Aaaa));
}

#[tokio::test]
async fn test_ptr_and_exists_are_dropped_with_errors() {
    let client = MockDnsClient::new();
    let options = FlattenOptions::new("example.com")
        .with_original_spf("v=spf1 ptr exists:%{i}.bl.example ip4:192.0.2.1 -all");
    let result = flatten_spf(&client, &options).await.unwrap();

    assert_eq!(result.flattened_record, "v=spf1 ip4:192.0.2.1 -all");
    assert_eq!(result.lookup_count_before, 2);
    assert_eq!(count_kind(&result, ErrorKind::Validation), 2);
    assert_eq!(client.query_count(), 0);
}

#[tokio::test]
async fn test_redirect_is_followed_when_no_all() {
    let client = MockDnsClient::new();
    client.add_txt("_spf.provider.example", "v=spf1 ip4:203.0.113.0/24 -all");

    let options = FlattenOptions::new("example.com")
        .with_original_spf("v=spf1 ip4:192.0.2.1 redirect=_spf.provider.example");
    let result = flatten_spf(&client, &options).await.unwrap();

    assert_eq!(
        result.flattened_record,
        "v=spf1 ip4:192.0.2.1 ip4:203.0.113.0/24 -all"
    );
    assert_eq!(result.lookup_count_before, 1);
    assert_eq!(result.lookup_count_after, 0);
}

#[tokio::test]
async fn test_nested_non_pass_terms_are_dropped() {
    let client = MockDnsClient::new();
    client.add_txt("vendor.example", "v=spf1 ip4:192.0.2.0/24 -ip4:192.0.2.66 ~all");

    let options = FlattenOptions::new("example.com")
        .with_original_spf("v=spf1 -ip4:198.51.100.1 include:vendor.example ~all");
    let result = flatten_spf(&client, &options).await.unwrap();

    assert_eq!(
        result.flattened_record,
        "v=spf1 -ip4:198.51.100.1 ip4:192.0.2.0/24 ~all"
    );
    assert_eq!(result.warnings.len(), 1);
}

#[tokio::test]
async fn test_character_limit_is_flagged_but_record_returned() {
    let client = MockDnsClient::new();
    let mut vendor = String::from("v=spf1");
    for i in 0..40 {
        vendor.push_str(&format!(" ip4:10.{i}.0.0/16"));
    }
    vendor.push_str(" -all");
    client.add_txt("big.example", &vendor);

    let options =
        FlattenOptions::new("example.com").with_original_spf("v=spf1 include:big.example ~all");
    let result = flatten_spf(&client, &options).await.unwrap();

    assert!(result.exceeds_char_limit);
    assert!(result.character_count > 512);
    assert_eq!(count_kind(&result, ErrorKind::CharacterLimitExceeded), 1);
    assert!(result.flattened_record.ends_with("~all"));
    assert_eq!(result.ipv4.len(), 40);
}

#[tokio::test(start_paused = true)]
async fn test_sibling_includes_resolve_concurrently() {
    let client = MockDnsClient::new();
    for i in 0..3 {
        client.add_txt(&format!("s{i}.example"), &format!("v=spf1 ip4:10.0.{i}.0/24 -all"));
    }
    client.set_delay(Duration::from_secs(1));

    let options = FlattenOptions::new("example.com")
        .with_original_spf("v=spf1 include:s0.example include:s1.example include:s2.example -all");
    let started = tokio::time::Instant::now();
    let result = flatten_spf(&client, &options).await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(
        result.flattened_record,
        "v=spf1 ip4:10.0.0.0/24 ip4:10.0.1.0/24 ip4:10.0.2.0/24 -all"
    );
}

#[tokio::test]
async fn test_flatten_is_deterministic() {
    let client = google_client();
    let options = FlattenOptions::new("example.com");
    let first = flatten_spf(&client, &options).await.unwrap();
    let second = flatten_spf(&client, &options).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_mixed_level_results_land_on_their_own_terms() {
    let client = MockDnsClient::new();
    client.add_txt("slow.example", "v=spf1 ip4:10.0.1.0/24 -all");
    client.add_txt("late.example", "v=spf1 ip4:10.0.2.0/24 -all");
    client.add_a("fast.example", Ipv4Addr::new(192, 0, 2, 5));
    client.add_mx("mail.example", 10, "mx.mail.example");

    let options = FlattenOptions::new("example.com")
        .with_original_spf(
            "v=spf1 include:slow.example a:fast.example include:late.example mx:mail.example -all",
        )
        .with_ipv6_support(false);
    let result = SpfFlattener::new(&client)
        .with_max_lookups(3)
        .flatten(&options)
        .await
        .unwrap();

    assert_eq!(
        result.flattened_record,
        "v=spf1 ip4:192.0.2.5 ip4:10.0.1.0/24 ip4:10.0.2.0/24 -all"
    );
    let chain = &result.include_chain;
    assert_eq!(chain.lookup_count, 1);
    assert_eq!(chain.ipv4, vec!["192.0.2.5"]);
    let children: Vec<(&str, &[String])> = chain
        .children
        .iter()
        .map(|c| (c.domain.as_str(), c.ipv4.as_slice()))
        .collect();
    assert_eq!(
        children,
        vec![
            ("slow.example", &["10.0.1.0/24".to_string()][..]),
            ("late.example", &["10.0.2.0/24".to_string()][..]),
        ]
    );
    assert_eq!(chain.nodes().len(), 3);
    assert_eq!(chain.max_depth(), 1);

    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].kind, ErrorKind::LookupBudgetExceeded);
    assert!(result.errors[0].message.contains("mx:mail.example"));
    assert!(!result.is_clean());
    assert!(!client
        .queries()
        .iter()
        .any(|(kind, _)| *kind == RecordKind::Mx));
}
