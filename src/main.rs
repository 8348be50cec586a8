//! Main application entry point (CLI binary).
//!
//! This is a thin wrapper around the `domain_auth` library that handles:
//! - Command-line argument parsing
//! - Logger initialization
//! - User-facing output (JSON on stdout, logs on stderr)
//!
//! All core functionality is implemented in the library crate.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use log::{info, warn};
use serde::Serialize;
use std::process;

use domain_auth::config::{
    DEFAULT_CHECK_INTERVAL, DEFAULT_MAX_DURATION, DNS_TIMEOUT_SECS, QUERY_TIMEOUT_SECS,
    SPF_MAX_LOOKUPS,
};
use domain_auth::dns::HickoryDnsClient;
use domain_auth::initialization::{init_logger_with, init_panel};
use domain_auth::propagation::{PollingOptions, PropagationPoller};
use domain_auth::records::{
    generate_dkim, generate_dmarc, generate_mx, generate_spf, generate_tracking,
    generate_verification, Alignment, DkimOptions, DmarcOptions, DmarcPolicy, MxOptions,
    SpfOptions, TrackingOptions,
};
use domain_auth::spf::{count_spf_lookups, FlattenOptions, SpfFlattener};
use domain_auth::{
    Config, DomainSetupRequest, ExpectedRecord, LogFormat, LogLevel, Provider, RecordKind,
    ResolverEndpoint,
};

/// Email authentication records for custom domains.
#[derive(Debug, Parser)]
#[command(name = "domain_auth", version, about)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct GlobalArgs {
    /// Log level: error|warn|info|debug|trace
    #[arg(long, value_enum, default_value_t = LogLevel::Info, global = true)]
    log_level: LogLevel,

    /// Log format: plain|json
    #[arg(long, value_enum, default_value_t = LogFormat::Plain, global = true)]
    log_format: LogFormat,

    /// Resolver timeout in seconds
    #[arg(long, default_value_t = DNS_TIMEOUT_SECS, global = true)]
    dns_timeout_secs: u64,

    /// Upper bound for one panel query during a propagation check, in seconds
    #[arg(long, default_value_t = QUERY_TIMEOUT_SECS, global = true)]
    query_timeout_secs: u64,

    /// Panel resolver as NAME=ADDRESS (repeatable; defaults to Google, Cloudflare and OpenDNS)
    #[arg(long = "resolver", global = true)]
    resolvers: Vec<ResolverEndpoint>,
}

impl GlobalArgs {
    fn to_config(&self) -> Config {
        Config {
            log_level: self.log_level.clone(),
            log_format: self.log_format.clone(),
            dns_timeout_secs: self.dns_timeout_secs,
            query_timeout_secs: self.query_timeout_secs,
            resolvers: if self.resolvers.is_empty() {
                ResolverEndpoint::default_panel()
            } else {
                self.resolvers.clone()
            },
            ..Config::default()
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Query one record on every panel resolver
    Lookup {
        domain: String,
        #[arg(long = "type", default_value = "TXT")]
        record_type: RecordKind,
        /// Value to compare the answers against
        #[arg(long)]
        expect: Option<String>,
    },
    /// SPF tools
    #[command(subcommand)]
    Spf(SpfCommand),
    /// Generate records without publishing them
    #[command(subcommand)]
    Generate(GenerateCommand),
    /// Poll the panel until records propagate, time out, or Ctrl-C
    Propagation(PropagationArgs),
}

#[derive(Debug, Subcommand)]
enum SpfCommand {
    /// Resolve include/a/mx terms into literal networks
    Flatten {
        domain: String,
        /// Flatten this record instead of the published one
        #[arg(long)]
        original_spf: Option<String>,
        /// Extra include kept in the flattened record (repeatable)
        #[arg(long = "include")]
        additional_includes: Vec<String>,
        /// Include kept as-is instead of being resolved (repeatable)
        #[arg(long = "preserve")]
        preserve_includes: Vec<String>,
        /// Include dropped from the result (repeatable)
        #[arg(long = "remove")]
        remove_includes: Vec<String>,
        /// Leave ip6 networks out of the result
        #[arg(long)]
        no_ipv6: bool,
        #[arg(long, default_value_t = SPF_MAX_LOOKUPS)]
        max_lookups: usize,
    },
    /// Count the DNS-querying terms of a record
    Count { record: String },
}

#[derive(Debug, Subcommand)]
enum GenerateCommand {
    Spf {
        domain: String,
        #[arg(long, value_enum, default_value_t = Provider::GoogleWorkspace)]
        provider: Provider,
        #[arg(long = "include")]
        includes: Vec<String>,
        #[arg(long = "ip")]
        ip_addresses: Vec<String>,
    },
    Dkim {
        domain: String,
        /// Base64 public key, PEM armor allowed
        #[arg(long)]
        public_key: String,
        #[arg(long, value_enum, default_value_t = Provider::GoogleWorkspace)]
        provider: Provider,
        #[arg(long)]
        selector: Option<String>,
        #[arg(long)]
        key_length: Option<u32>,
        /// Publish the value as one string even above 255 characters
        #[arg(long)]
        no_split: bool,
    },
    Dmarc(DmarcArgs),
    Mx {
        domain: String,
        #[arg(long, value_enum, default_value_t = Provider::GoogleWorkspace)]
        provider: Provider,
        /// Custom exchange as PRIORITY:HOST (repeatable)
        #[arg(long = "record")]
        records: Vec<String>,
    },
    Tracking {
        domain: String,
        #[arg(long)]
        target: String,
        #[arg(long)]
        subdomain: Option<String>,
    },
    Verification {
        domain: String,
        #[arg(long)]
        token: String,
    },
    /// Google Workspace defaults (SPF, MX, DMARC p=none) plus optional extras
    Workspace {
        domain: String,
        #[arg(long)]
        verification_token: Option<String>,
        #[arg(long)]
        dkim_key: Option<String>,
        #[arg(long)]
        tracking_target: Option<String>,
    },
}

#[derive(Debug, Args)]
struct DmarcArgs {
    domain: String,
    #[arg(long, value_enum, default_value_t = DmarcPolicy::None)]
    policy: DmarcPolicy,
    #[arg(long, value_enum)]
    subdomain_policy: Option<DmarcPolicy>,
    #[arg(long, default_value_t = 100)]
    pct: u32,
    #[arg(long)]
    rua: Vec<String>,
    #[arg(long)]
    ruf: Vec<String>,
    #[arg(long, value_enum, default_value_t = Alignment::Relaxed)]
    adkim: Alignment,
    #[arg(long, value_enum, default_value_t = Alignment::Relaxed)]
    aspf: Alignment,
    #[arg(long)]
    fo: Option<String>,
    #[arg(long)]
    ri: Option<u32>,
    /// Policy currently published
    #[arg(long, value_enum)]
    existing_policy: Option<DmarcPolicy>,
    #[arg(long)]
    allow_downgrade: bool,
}

#[derive(Debug, Args)]
struct PropagationArgs {
    /// Domain identifier the session is tracked under
    #[arg(long)]
    domain_id: String,
    #[arg(long, default_value = "cli")]
    user_id: String,
    /// Expected record as "TYPE NAME VALUE" (repeatable)
    #[arg(long = "record", value_parser = parse_expected_record, required = true)]
    records: Vec<ExpectedRecord>,
    /// Seconds between checks
    #[arg(long, default_value_t = DEFAULT_CHECK_INTERVAL.as_secs())]
    check_interval_secs: u64,
    /// Seconds before the session times out
    #[arg(long, default_value_t = DEFAULT_MAX_DURATION.as_secs())]
    max_duration_secs: u64,
}

/// Parses `TYPE NAME VALUE`; the value may contain spaces.
fn parse_expected_record(s: &str) -> Result<ExpectedRecord, String> {
    let mut parts = s.trim().splitn(3, char::is_whitespace);
    let (Some(kind), Some(name), Some(value)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(format!("expected \"TYPE NAME VALUE\", got {s:?}"));
    };
    let kind: RecordKind = kind.parse()?;
    Ok(ExpectedRecord::new(kind, name, value.trim()))
}

fn parse_mx_record(s: &str) -> Result<(u16, String)> {
    let (priority, host) = s
        .split_once(':')
        .with_context(|| format!("expected PRIORITY:HOST, got {s:?}"))?;
    let priority = priority
        .trim()
        .parse::<u16>()
        .with_context(|| format!("invalid MX priority in {s:?}"))?;
    Ok((priority, host.trim().to_string()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{json}");
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let config = cli.global.to_config();

    match cli.command {
        Command::Lookup {
            domain,
            record_type,
            expect,
        } => {
            let poller = PropagationPoller::new(init_panel(&config.resolvers, config.dns_timeout()))
                .with_query_timeout(config.query_timeout());
            let record = ExpectedRecord::new(record_type, domain, expect.unwrap_or_default());
            let result = poller.check_record(record).await;
            print_json(&result)
        }
        Command::Spf(SpfCommand::Flatten {
            domain,
            original_spf,
            additional_includes,
            preserve_includes,
            remove_includes,
            no_ipv6,
            max_lookups,
        }) => {
            let mut options = FlattenOptions::new(domain).with_ipv6_support(!no_ipv6);
            if let Some(record) = original_spf {
                options = options.with_original_spf(record);
            }
            for include in additional_includes {
                options = options.with_additional_include(include);
            }
            for include in preserve_includes {
                options = options.with_preserved_include(include);
            }
            for include in remove_includes {
                options = options.with_removed_include(include);
            }

            let client = HickoryDnsClient::system(config.dns_timeout());
            let result = SpfFlattener::new(&client)
                .with_max_lookups(max_lookups)
                .flatten(&options)
                .await
                .context("SPF flattening failed")?;
            if result.is_clean() {
                info!("Flattened record for {} is ready to publish", options.domain);
            } else {
                for issue in &result.errors {
                    warn!("{issue}");
                }
                warn!(
                    "Review the {} error(s) above before publishing the flattened record",
                    result.errors.len()
                );
            }
            info!(
                "Flattened {}: {} -> {} lookups, {} characters",
                options.domain,
                result.lookup_count_before,
                result.lookup_count_after,
                result.character_count
            );
            print_json(&result)
        }
        Command::Spf(SpfCommand::Count { record }) => {
            let count = count_spf_lookups(&record).context("Invalid SPF record")?;
            println!("{count}");
            Ok(())
        }
        Command::Generate(command) => generate(command),
        Command::Propagation(args) => watch(&config, args).await,
    }
}

fn generate(command: GenerateCommand) -> Result<()> {
    match command {
        GenerateCommand::Spf {
            domain,
            provider,
            includes,
            ip_addresses,
        } => {
            let options = SpfOptions {
                additional_includes: includes,
                ip_addresses,
                ..SpfOptions::new(domain, provider)
            };
            print_json(&generate_spf(&options)?)
        }
        GenerateCommand::Dkim {
            domain,
            public_key,
            provider,
            selector,
            key_length,
            no_split,
        } => {
            let options = DkimOptions {
                selector,
                key_length,
                split_for_dns_limit: !no_split,
                ..DkimOptions::new(domain, provider, public_key)
            };
            print_json(&generate_dkim(&options)?)
        }
        GenerateCommand::Dmarc(args) => {
            let options = DmarcOptions {
                subdomain_policy: args.subdomain_policy,
                percentage: args.pct,
                adkim: args.adkim,
                aspf: args.aspf,
                rua: args.rua,
                ruf: args.ruf,
                failure_options: args.fo,
                report_interval: args.ri,
                existing_policy: args.existing_policy,
                allow_policy_downgrade: args.allow_downgrade,
                ..DmarcOptions::new(args.domain, args.policy)
            };
            print_json(&generate_dmarc(&options)?)
        }
        GenerateCommand::Mx {
            domain,
            provider,
            records,
        } => {
            let mut options = MxOptions::new(domain, provider);
            for record in &records {
                let (priority, host) = parse_mx_record(record)?;
                options = options.with_record(priority, host);
            }
            print_json(&generate_mx(&options)?)
        }
        GenerateCommand::Tracking {
            domain,
            target,
            subdomain,
        } => {
            let options = TrackingOptions {
                subdomain,
                ..TrackingOptions::new(domain, target)
            };
            print_json(&generate_tracking(&options)?)
        }
        GenerateCommand::Verification { domain, token } => {
            print_json(&generate_verification(&domain, &token)?)
        }
        GenerateCommand::Workspace {
            domain,
            verification_token,
            dkim_key,
            tracking_target,
        } => {
            let mut request = DomainSetupRequest::google_workspace(domain.clone(), domain, "cli", "");
            if let Some(token) = verification_token {
                request = request.with_verification_token(token);
            }
            if let Some(key) = dkim_key {
                request = request.with_dkim_key(Provider::GoogleWorkspace, key);
            }
            if let Some(target) = tracking_target {
                request = request.with_tracking(target);
            }
            print_json(&request.generate()?)
        }
    }
}

async fn watch(config: &Config, args: PropagationArgs) -> Result<()> {
    let poller = PropagationPoller::new(init_panel(&config.resolvers, config.dns_timeout()))
        .with_query_timeout(config.query_timeout());
    let options = PollingOptions {
        check_interval: std::time::Duration::from_secs(args.check_interval_secs.max(1)),
        max_duration: std::time::Duration::from_secs(args.max_duration_secs),
    };
    let session = poller.start_polling_session(&args.domain_id, &args.user_id, args.records, options)?;
    let mut interval = tokio::time::interval(options.check_interval);

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                poller.cancel_polling_session(&session.id)?;
                print_json(&poller.remove_session(&session.id)?)?;
                bail!("polling cancelled");
            }
        }

        let report = poller.check_polling_progress(&session.id).await?;
        for note in &report.notes {
            info!("{note}");
        }
        info!(
            "{}: {}% ({}/{} records){}",
            report.session.id,
            report.session.overall_progress,
            report.session.propagated_records,
            report.session.total_records,
            report
                .session
                .estimated_completion
                .map(|eta| format!(", ETA {}", eta.format("%Y-%m-%d %H:%M:%S UTC")))
                .unwrap_or_default()
        );

        if report.session.status.is_terminal() {
            poller.remove_session(&session.id)?;
            print_json(&report)?;
            if report.session.overall_progress < 100 {
                bail!("polling ended with status {}", report.session.status);
            }
            return Ok(());
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = cli.global.log_level.clone();
    let log_format = cli.global.log_format.clone();
    init_logger_with(log_level.into(), log_format).context("Failed to initialize logger")?;

    if let Err(e) = run(cli).await {
        eprintln!("domain_auth error: {:#}", e);
        process::exit(1);
    }
    Ok(())
}
