//! Tests for CLI subcommand parsing.

use clap::Parser;
use domain_auth::config::{LogFormat, LogLevel, ResolverEndpoint};
use domain_auth::records::{DmarcPolicy, Provider};
use domain_auth::RecordKind;

// The binary's CLI types live in main.rs and can't be imported; this is a
// trimmed structure that mirrors them.

#[derive(Debug, clap::Parser)]
#[command(name = "domain_auth")]
struct TestCli {
    #[arg(long, value_enum, default_value_t = LogLevel::Info, global = true)]
    log_level: LogLevel,
    #[arg(long, value_enum, default_value_t = LogFormat::Plain, global = true)]
    log_format: LogFormat,
    #[arg(long = "resolver", global = true)]
    resolvers: Vec<ResolverEndpoint>,
    #[command(subcommand)]
    command: TestCommand,
}

#[derive(Debug, clap::Subcommand)]
enum TestCommand {
    Lookup {
        domain: String,
        #[arg(long = "type", default_value = "TXT")]
        record_type: RecordKind,
    },
    #[command(subcommand)]
    Spf(TestSpfCommand),
    #[command(subcommand)]
    Generate(TestGenerateCommand),
}

#[derive(Debug, clap::Subcommand)]
enum TestSpfCommand {
    Flatten {
        domain: String,
        #[arg(long = "include")]
        additional_includes: Vec<String>,
        #[arg(long = "preserve")]
        preserve_includes: Vec<String>,
        #[arg(long)]
        no_ipv6: bool,
        #[arg(long, default_value_t = 10)]
        max_lookups: usize,
    },
    Count {
        record: String,
    },
}

#[derive(Debug, clap::Subcommand)]
enum TestGenerateCommand {
    Dmarc {
        domain: String,
        #[arg(long, value_enum, default_value_t = DmarcPolicy::None)]
        policy: DmarcPolicy,
        #[arg(long, default_value_t = 100)]
        pct: u32,
        #[arg(long)]
        rua: Vec<String>,
    },
    Mx {
        domain: String,
        #[arg(long, value_enum, default_value_t = Provider::GoogleWorkspace)]
        provider: Provider,
    },
}

#[test]
fn test_cli_lookup_defaults() {
    let cli = TestCli::try_parse_from(["domain_auth", "lookup", "example.com"])
        .expect("Should parse lookup command");

    assert_eq!(
        log::LevelFilter::from(cli.log_level.clone()),
        log::LevelFilter::Info
    );
    match cli.log_format {
        LogFormat::Plain => {}
        _ => panic!("Should be Plain format"),
    }
    assert!(cli.resolvers.is_empty());
    match cli.command {
        TestCommand::Lookup {
            domain,
            record_type,
        } => {
            assert_eq!(domain, "example.com");
            assert_eq!(record_type, RecordKind::Txt);
        }
        _ => panic!("Should parse as Lookup command"),
    }
}

#[test]
fn test_cli_lookup_record_type_is_case_insensitive() {
    let cli = TestCli::try_parse_from(["domain_auth", "lookup", "example.com", "--type", "mx"])
        .expect("Should parse lookup command");
    match cli.command {
        TestCommand::Lookup { record_type, .. } => assert_eq!(record_type, RecordKind::Mx),
        _ => panic!("Should parse as Lookup command"),
    }
}

#[test]
fn test_cli_global_options_after_subcommand() {
    let args = [
        "domain_auth",
        "lookup",
        "example.com",
        "--log-level",
        "debug",
        "--resolver",
        "Quad9=9.9.9.9",
        "--resolver",
        "1.1.1.1",
    ];
    let cli = TestCli::try_parse_from(args).expect("Should parse global options");

    assert_eq!(
        log::LevelFilter::from(cli.log_level.clone()),
        log::LevelFilter::Debug
    );
    let names: Vec<&str> = cli.resolvers.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["Quad9", "1.1.1.1"]);
}

#[test]
fn test_cli_invalid_resolver_is_rejected() {
    let result = TestCli::try_parse_from([
        "domain_auth",
        "lookup",
        "example.com",
        "--resolver",
        "Google=eight",
    ]);
    assert!(result.is_err());
}

#[test]
fn test_cli_spf_flatten_with_repeated_options() {
    let args = [
        "domain_auth",
        "spf",
        "flatten",
        "example.com",
        "--include",
        "mail.vendor.example",
        "--preserve",
        "_spf.google.com",
        "--preserve",
        "spf.protection.outlook.com",
        "--no-ipv6",
    ];
    let cli = TestCli::try_parse_from(args).expect("Should parse spf flatten");

    match cli.command {
        TestCommand::Spf(TestSpfCommand::Flatten {
            domain,
            additional_includes,
            preserve_includes,
            no_ipv6,
            max_lookups,
        }) => {
            assert_eq!(domain, "example.com");
            assert_eq!(additional_includes, vec!["mail.vendor.example"]);
            assert_eq!(preserve_includes.len(), 2);
            assert!(no_ipv6);
            assert_eq!(max_lookups, 10);
        }
        _ => panic!("Should parse as spf flatten"),
    }
}

#[test]
fn test_cli_spf_count_takes_whole_record() {
    let cli = TestCli::try_parse_from([
        "domain_auth",
        "spf",
        "count",
        "v=spf1 include:_spf.google.com ~all",
    ])
    .expect("Should parse spf count");
    match cli.command {
        TestCommand::Spf(TestSpfCommand::Count { record }) => {
            assert_eq!(record, "v=spf1 include:_spf.google.com ~all");
        }
        _ => panic!("Should parse as spf count"),
    }
}

#[test]
fn test_cli_generate_dmarc() {
    let args = [
        "domain_auth",
        "generate",
        "dmarc",
        "example.com",
        "--policy",
        "quarantine",
        "--pct",
        "50",
        "--rua",
        "dmarc@example.com",
    ];
    let cli = TestCli::try_parse_from(args).expect("Should parse generate dmarc");

    match cli.command {
        TestCommand::Generate(TestGenerateCommand::Dmarc {
            domain,
            policy,
            pct,
            rua,
        }) => {
            assert_eq!(domain, "example.com");
            assert_eq!(policy, DmarcPolicy::Quarantine);
            assert_eq!(pct, 50);
            assert_eq!(rua, vec!["dmarc@example.com"]);
        }
        _ => panic!("Should parse as generate dmarc"),
    }
}

#[test]
fn test_cli_generate_mx_provider_values() {
    let cli = TestCli::try_parse_from(["domain_auth", "generate", "mx", "example.com"])
        .expect("Should parse generate mx");
    match cli.command {
        TestCommand::Generate(TestGenerateCommand::Mx { provider, .. }) => {
            assert_eq!(provider, Provider::GoogleWorkspace);
        }
        _ => panic!("Should parse as generate mx"),
    }

    let cli = TestCli::try_parse_from([
        "domain_auth",
        "generate",
        "mx",
        "example.com",
        "--provider",
        "custom",
    ])
    .expect("Should parse custom provider");
    match cli.command {
        TestCommand::Generate(TestGenerateCommand::Mx { provider, .. }) => {
            assert_eq!(provider, Provider::Custom);
        }
        _ => panic!("Should parse as generate mx"),
    }
}

#[test]
fn test_cli_missing_subcommand_error() {
    let result = TestCli::try_parse_from(["domain_auth"]);

    assert!(result.is_err(), "Should fail when subcommand is missing");
    let error_msg = result.unwrap_err().to_string();
    assert!(
        error_msg.contains("subcommand") || error_msg.contains("COMMAND"),
        "Error message should mention subcommand: {}",
        error_msg
    );
}

#[test]
fn test_cli_invalid_policy_error() {
    let result = TestCli::try_parse_from([
        "domain_auth",
        "generate",
        "dmarc",
        "example.com",
        "--policy",
        "block",
    ]);
    assert!(result.is_err(), "Should reject unknown DMARC policy");
}
