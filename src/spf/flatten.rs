//! Breadth-first SPF flattening.
//!
//! The include tree is resolved one level at a time. Before a level is issued,
//! every lookup it needs reserves a slot in the shared [`LookupBudget`] in
//! document order; the reserved lookups then run concurrently. Results are
//! applied in the same order, so counts, errors and output are deterministic.

use std::collections::HashSet;
use std::net::{Ipv4Addr, Ipv6Addr};

use futures::future::join_all;
use log::{debug, info, warn};

use crate::config::{DNS_TXT_STRING_MAX, SPF_DEFAULT_ALL, SPF_MAX_CHARS, SPF_MAX_LOOKUPS, SPF_MAX_MX_HOSTS};
use crate::dns::{extract_spf_records, DnsQuery};
use crate::error_handling::{AuthError, DnsErrorKind, DnsQueryError, ErrorKind, Issue};

use super::mechanism::{count_spf_lookups, parse_spf, DualCidr, MechanismKind, Qualifier, SpfRecord};
use super::types::{FlattenOptions, FlattenedSpfResult, LookupBudget, SpfIncludeChain};

/// Flattens the SPF record of `options.domain` with the standard 10-lookup budget.
///
/// # Errors
///
/// Hard failures only: missing domain, malformed root record, no (or several)
/// SPF records at the root, or a root TXT lookup that failed. Everything that
/// goes wrong below the root is reported on the returned result.
pub async fn flatten_spf<C: DnsQuery>(
    client: &C,
    options: &FlattenOptions,
) -> Result<FlattenedSpfResult, AuthError> {
    SpfFlattener::new(client).flatten(options).await
}

/// SPF flattener bound to a DNS client.
pub struct SpfFlattener<'a, C> {
    client: &'a C,
    max_lookups: usize,
}

impl<'a, C: DnsQuery> SpfFlattener<'a, C> {
    pub fn new(client: &'a C) -> Self {
        Self {
            client,
            max_lookups: SPF_MAX_LOOKUPS,
        }
    }

    /// Overrides the lookup budget. Only useful for tests and dry runs.
    pub fn with_max_lookups(mut self, max_lookups: usize) -> Self {
        self.max_lookups = max_lookups;
        self
    }

    pub async fn flatten(&self, options: &FlattenOptions) -> Result<FlattenedSpfResult, AuthError> {
        let domain = normalize_domain(&options.domain);
        if domain.is_empty() {
            return Err(AuthError::Validation("domain is required".to_string()));
        }

        let root_record = match &options.original_spf {
            Some(record) => record.trim().to_string(),
            None => self.fetch_root_record(&domain).await?,
        };
        let parsed = parse_spf(&root_record).map_err(|e| {
            AuthError::Validation(format!("invalid SPF record for {domain}: {e}"))
        })?;

        let mut run = FlattenRun::new(options, &domain, &root_record, self.max_lookups);
        let mut jobs = run.expand(0, &parsed);

        while !jobs.is_empty() {
            // join_all builds every future up front, so reservations follow document order
            let budget = &run.budget;
            let steps = join_all(jobs.into_iter().map(|job| {
                let granted = budget.try_acquire();
                async move {
                    if granted {
                        Step::Done(self.run_job(job, options.ipv6_support).await)
                    } else {
                        Step::Skipped(job)
                    }
                }
            }))
            .await;
            debug!(
                "Resolved {} SPF lookups for {}; {} left in the budget",
                steps.iter().filter(|step| matches!(step, Step::Done(_))).count(),
                domain,
                run.budget.remaining()
            );

            jobs = Vec::new();
            for step in steps {
                match step {
                    Step::Done(resolved) => jobs.extend(run.apply(resolved)),
                    Step::Skipped(job) => run.skip(job),
                }
            }
        }

        Ok(run.finish(&parsed))
    }

    async fn fetch_root_record(&self, domain: &str) -> Result<String, AuthError> {
        let txt_records = match self.client.query_txt(domain).await {
            Ok(records) => records,
            Err(e) if matches!(e.kind, DnsErrorKind::NotFound | DnsErrorKind::NoData) => {
                return Err(AuthError::NoSpfRecord(domain.to_string()));
            }
            Err(e) => return Err(AuthError::Dns(e)),
        };

        let spf_records = extract_spf_records(&txt_records);
        let count = spf_records.len();
        match spf_records.into_iter().next() {
            None => Err(AuthError::NoSpfRecord(domain.to_string())),
            Some(record) if count == 1 => Ok(record),
            Some(_) => Err(AuthError::Validation(format!(
                "{domain} publishes {count} SPF records; exactly one is allowed"
            ))),
        }
    }

    async fn run_job(&self, job: Job, ipv6_support: bool) -> Resolved {
        match job {
            Job::Include {
                parent,
                domain,
                redirect,
            } => {
                debug!("Fetching SPF record for include {}", domain);
                let txt = self.client.query_txt(&domain).await;
                Resolved::Include {
                    parent,
                    domain,
                    redirect,
                    txt,
                }
            }
            Job::Address {
                node,
                domain,
                cidr,
                via_mx,
                raw,
            } => {
                debug!(
                    "Resolving {} addresses for {}",
                    if via_mx { "MX" } else { "A" },
                    domain
                );
                let addresses = self.resolve_addresses(&domain, via_mx, ipv6_support).await;
                Resolved::Address {
                    node,
                    domain,
                    cidr,
                    raw,
                    addresses,
                }
            }
        }
    }

    async fn resolve_addresses(&self, domain: &str, via_mx: bool, ipv6_support: bool) -> Addresses {
        let mut failures = Vec::new();
        let hosts: Vec<String> = if via_mx {
            match self.client.query_mx(domain).await {
                Ok(records) => records
                    .into_iter()
                    .take(SPF_MAX_MX_HOSTS)
                    .map(|mx| mx.exchange)
                    .collect(),
                Err(e) => {
                    return Addresses {
                        ipv4: Vec::new(),
                        ipv6: Vec::new(),
                        failures: vec![e],
                    }
                }
            }
        } else {
            vec![domain.to_string()]
        };

        let client = self.client;
        let answers = join_all(hosts.iter().map(|host| async move {
            let v4 = client.query_a(host).await;
            let v6 = if ipv6_support {
                Some(client.query_aaaa(host).await)
            } else {
                None
            };
            (v4, v6)
        }))
        .await;

        let mut ipv4 = Vec::new();
        let mut ipv6 = Vec::new();
        for (v4, v6) in answers {
            match v4 {
                Ok(addrs) => ipv4.extend(addrs),
                Err(e) => failures.push(e),
            }
            match v6 {
                Some(Ok(addrs)) => ipv6.extend(addrs),
                Some(Err(e)) => failures.push(e),
                None => {}
            }
        }

        Addresses {
            ipv4,
            ipv6,
            failures,
        }
    }
}

/// A lookup waiting for budget.
enum Job {
    Include {
        parent: usize,
        domain: String,
        redirect: bool,
    },
    Address {
        node: usize,
        domain: String,
        cidr: DualCidr,
        via_mx: bool,
        raw: String,
    },
}

/// A finished lookup together with the job it answers.
enum Resolved {
    Include {
        parent: usize,
        domain: String,
        redirect: bool,
        txt: Result<Vec<String>, DnsQueryError>,
    },
    Address {
        node: usize,
        domain: String,
        cidr: DualCidr,
        raw: String,
        addresses: Addresses,
    },
}

struct Addresses {
    ipv4: Vec<Ipv4Addr>,
    ipv6: Vec<Ipv6Addr>,
    failures: Vec<DnsQueryError>,
}

enum Step {
    Done(Resolved),
    Skipped(Job),
}

/// Arena entry; turned into an [`SpfIncludeChain`] once the run is over.
struct Node {
    domain: String,
    depth: usize,
    record: Option<String>,
    ipv4: Vec<String>,
    ipv6: Vec<String>,
    lookup_count: usize,
    children: Vec<usize>,
    error: Option<String>,
    circular: bool,
    /// Domains from the root down to and including this node.
    path: Vec<String>,
    all_term: Option<String>,
    redirect_child: Option<usize>,
}

impl Node {
    fn new(domain: String, depth: usize, path: Vec<String>) -> Self {
        Self {
            domain,
            depth,
            record: None,
            ipv4: Vec::new(),
            ipv6: Vec::new(),
            lookup_count: 0,
            children: Vec::new(),
            error: None,
            circular: false,
            path,
            all_term: None,
            redirect_child: None,
        }
    }
}

/// Mutable state of one flattening run.
struct FlattenRun<'o> {
    options: &'o FlattenOptions,
    nodes: Vec<Node>,
    budget: LookupBudget,
    lookup_count_before: usize,
    preserved: Vec<String>,
    resolved_includes: Vec<String>,
    errors: Vec<Issue>,
    warnings: Vec<Issue>,
}

impl<'o> FlattenRun<'o> {
    fn new(options: &'o FlattenOptions, domain: &str, root_record: &str, max_lookups: usize) -> Self {
        let mut root = Node::new(domain.to_string(), 0, vec![domain.to_string()]);
        root.record = Some(root_record.to_string());
        Self {
            options,
            nodes: vec![root],
            budget: LookupBudget::new(max_lookups),
            lookup_count_before: 0,
            preserved: Vec::new(),
            resolved_includes: Vec::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn error(&mut self, kind: ErrorKind, message: String) {
        warn!("{}", message);
        self.errors.push(Issue::new(kind, message));
    }

    fn warning(&mut self, kind: ErrorKind, message: String) {
        debug!("{}", message);
        self.warnings.push(Issue::new(kind, message));
    }

    /// Records the literals of `record` on `node` and returns the lookups it needs.
    fn expand(&mut self, node: usize, record: &SpfRecord) -> Vec<Job> {
        let domain = self.nodes[node].domain.clone();
        let is_root = node == 0;
        let mut jobs = Vec::new();

        for mechanism in &record.mechanisms {
            match mechanism.kind {
                MechanismKind::Ip4 | MechanismKind::Ip6 => {
                    let is_v6 = mechanism.kind == MechanismKind::Ip6;
                    if is_v6 && !self.options.ipv6_support {
                        self.warning(
                            ErrorKind::Validation,
                            format!("{} in {} omitted: IPv6 support is disabled", mechanism.raw, domain),
                        );
                        continue;
                    }
                    if mechanism.qualifier != Qualifier::Pass {
                        // Root keeps its own non-pass terms verbatim at assembly time
                        if !is_root {
                            self.warning(
                                ErrorKind::Validation,
                                format!(
                                    "{} in {} dropped: only pass mechanisms can be flattened",
                                    mechanism.raw, domain
                                ),
                            );
                        }
                        continue;
                    }
                    let network = normalize_network(&mechanism.value, is_v6);
                    let target = if is_v6 {
                        &mut self.nodes[node].ipv6
                    } else {
                        &mut self.nodes[node].ipv4
                    };
                    push_unique(target, network);
                }
                MechanismKind::Include => {
                    if mechanism.has_macro() {
                        self.lookup_count_before += 1;
                        self.error(
                            ErrorKind::Validation,
                            format!("{} in {} uses SPF macros and cannot be flattened", mechanism.raw, domain),
                        );
                        continue;
                    }
                    let Some(target) = mechanism.domain().map(normalize_domain) else {
                        continue;
                    };
                    if mechanism.qualifier != Qualifier::Pass
                        && !self.options.is_removed(&target)
                        && !self.options.is_preserved(&target)
                    {
                        self.lookup_count_before += 1;
                        self.warning(
                            ErrorKind::Validation,
                            format!(
                                "{} in {} dropped: only pass includes can be flattened",
                                mechanism.raw, domain
                            ),
                        );
                        continue;
                    }
                    jobs.extend(self.queue_include(node, target, false));
                }
                MechanismKind::A | MechanismKind::Mx => {
                    self.lookup_count_before += 1;
                    if mechanism.has_macro() {
                        self.error(
                            ErrorKind::Validation,
                            format!("{} in {} uses SPF macros and cannot be flattened", mechanism.raw, domain),
                        );
                        continue;
                    }
                    if mechanism.qualifier != Qualifier::Pass {
                        self.warning(
                            ErrorKind::Validation,
                            format!(
                                "{} in {} dropped: only pass mechanisms can be flattened",
                                mechanism.raw, domain
                            ),
                        );
                        continue;
                    }
                    jobs.push(Job::Address {
                        node,
                        domain: mechanism
                            .domain()
                            .map(normalize_domain)
                            .unwrap_or_else(|| domain.clone()),
                        cidr: mechanism.dual_cidr(),
                        via_mx: mechanism.kind == MechanismKind::Mx,
                        raw: mechanism.raw.clone(),
                    });
                }
                MechanismKind::Ptr | MechanismKind::Exists => {
                    self.lookup_count_before += 1;
                    self.error(
                        ErrorKind::Validation,
                        format!(
                            "{} in {} cannot be expressed as IP ranges and was dropped",
                            mechanism.raw, domain
                        ),
                    );
                }
                MechanismKind::All => {
                    self.nodes[node].all_term = Some(mechanism.raw.to_ascii_lowercase());
                }
            }
        }

        if let Some(target) = record.redirect() {
            if record.all().is_some() {
                self.warning(
                    ErrorKind::Validation,
                    format!("redirect={target} in {domain} ignored: the record has an all mechanism"),
                );
            } else if target.contains('%') {
                self.lookup_count_before += 1;
                self.error(
                    ErrorKind::Validation,
                    format!("redirect={target} in {domain} uses SPF macros and cannot be flattened"),
                );
            } else {
                jobs.extend(self.queue_include(node, normalize_domain(target), true));
            }
        }

        jobs
    }

    /// Applies the remove/preserve lists and cycle detection to one include.
    fn queue_include(&mut self, parent: usize, target: String, redirect: bool) -> Option<Job> {
        let term = if redirect {
            format!("redirect={target}")
        } else {
            format!("include:{target}")
        };

        if self.nodes[parent].path.iter().any(|d| *d == target) {
            let path = self.nodes[parent].path.join(" -> ");
            let mut child = self.child_node(parent, target.clone());
            child.circular = true;
            self.push_child(parent, child, redirect);
            self.warning(
                ErrorKind::CircularReference,
                format!("{term} loops back to an ancestor ({path} -> {target}); not followed"),
            );
            return None;
        }

        self.lookup_count_before += 1;
        if self.options.is_removed(&target) {
            debug!("Dropping removed {}", term);
            return None;
        }
        if self.options.is_preserved(&target) {
            push_unique(&mut self.preserved, target);
            return None;
        }

        Some(Job::Include {
            parent,
            domain: target,
            redirect,
        })
    }

    fn child_node(&self, parent: usize, domain: String) -> Node {
        let parent = &self.nodes[parent];
        let mut path = parent.path.clone();
        path.push(domain.clone());
        Node::new(domain, parent.depth + 1, path)
    }

    fn push_child(&mut self, parent: usize, child: Node, redirect: bool) -> usize {
        let idx = self.nodes.len();
        self.nodes.push(child);
        self.nodes[parent].children.push(idx);
        if redirect {
            self.nodes[parent].redirect_child = Some(idx);
        }
        idx
    }

    /// Reports a lookup that did not fit in the budget.
    fn skip(&mut self, job: Job) {
        let limit = self.budget.limit();
        match job {
            Job::Include {
                parent,
                domain,
                redirect,
            } => {
                let parent_domain = self.nodes[parent].domain.clone();
                let mut child = self.child_node(parent, domain.clone());
                child.error = Some("not resolved: lookup budget exhausted".to_string());
                self.push_child(parent, child, redirect);
                self.error(
                    ErrorKind::LookupBudgetExceeded,
                    format!(
                        "include:{domain} in {parent_domain} not resolved: SPF lookup limit of {limit} reached"
                    ),
                );
            }
            Job::Address { node, raw, .. } => {
                let domain = self.nodes[node].domain.clone();
                self.error(
                    ErrorKind::LookupBudgetExceeded,
                    format!("{raw} in {domain} not resolved: SPF lookup limit of {limit} reached"),
                );
            }
        }
    }

    /// Folds one finished lookup into the tree and returns the next level's work.
    fn apply(&mut self, resolved: Resolved) -> Vec<Job> {
        match resolved {
            Resolved::Include {
                parent,
                domain,
                redirect,
                txt,
            } => {
                let mut child = self.child_node(parent, domain.clone());
                child.lookup_count = 1;
                let idx = self.push_child(parent, child, redirect);
                self.apply_include(idx, &domain, txt)
            }
            Resolved::Address {
                node,
                domain,
                cidr,
                raw,
                addresses,
            } => {
                self.nodes[node].lookup_count += 1;
                if addresses.ipv4.is_empty() && addresses.ipv6.is_empty() {
                    let owner = self.nodes[node].domain.clone();
                    let detail = addresses
                        .failures
                        .iter()
                        .map(|e| e.to_string())
                        .collect::<Vec<_>>()
                        .join("; ");
                    self.error(
                        ErrorKind::ResolverError,
                        format!("{raw} in {owner} resolved to no addresses for {domain}: {detail}"),
                    );
                    return Vec::new();
                }
                for addr in addresses.ipv4 {
                    push_unique(&mut self.nodes[node].ipv4, network_v4(addr, cidr.v4));
                }
                for addr in addresses.ipv6 {
                    push_unique(&mut self.nodes[node].ipv6, network_v6(addr, cidr.v6));
                }
                Vec::new()
            }
        }
    }

    fn apply_include(
        &mut self,
        idx: usize,
        domain: &str,
        result: Result<Vec<String>, DnsQueryError>,
    ) -> Vec<Job> {
        let txt_records = match result {
            Ok(records) => records,
            Err(e) => {
                let hint = if e.is_retryable() { " (retryable)" } else { "" };
                self.nodes[idx].error = Some(e.to_string());
                self.error(ErrorKind::ResolverError, format!("include:{domain}: {e}{hint}"));
                return Vec::new();
            }
        };

        let spf_records = extract_spf_records(&txt_records);
        if spf_records.len() != 1 {
            let message = if spf_records.is_empty() {
                format!("no SPF record published for {domain}")
            } else {
                format!("{domain} publishes {} SPF records", spf_records.len())
            };
            self.nodes[idx].error = Some(message.clone());
            let kind = if spf_records.is_empty() {
                ErrorKind::ResolverError
            } else {
                ErrorKind::Validation
            };
            self.error(kind, format!("include:{domain}: {message}"));
            return Vec::new();
        }

        let record = spf_records.into_iter().next().unwrap_or_default();
        match parse_spf(&record) {
            Ok(parsed) => {
                self.nodes[idx].record = Some(record);
                push_unique(&mut self.resolved_includes, domain.to_string());
                self.expand(idx, &parsed)
            }
            Err(e) => {
                self.nodes[idx].record = Some(record);
                self.nodes[idx].error = Some(e.to_string());
                self.error(
                    ErrorKind::Validation,
                    format!("include:{domain}: invalid SPF record: {e}"),
                );
                Vec::new()
            }
        }
    }

    /// `all` term of the root, following its redirect chain.
    fn terminal_all(&self) -> String {
        let mut idx = 0;
        loop {
            let node = &self.nodes[idx];
            if let Some(all) = &node.all_term {
                return all.clone();
            }
            match node.redirect_child {
                Some(child) if !self.nodes[child].circular => idx = child,
                _ => return SPF_DEFAULT_ALL.to_string(),
            }
        }
    }

    fn chain(&self, idx: usize) -> SpfIncludeChain {
        let node = &self.nodes[idx];
        SpfIncludeChain {
            domain: node.domain.clone(),
            depth: node.depth,
            record: node.record.clone(),
            ipv4: node.ipv4.clone(),
            ipv6: node.ipv6.clone(),
            lookup_count: node.lookup_count,
            children: node.children.iter().map(|&c| self.chain(c)).collect(),
            error: node.error.clone(),
            circular: node.circular,
        }
    }

    fn finish(mut self, root: &SpfRecord) -> FlattenedSpfResult {
        let mut terms = vec!["v=spf1".to_string()];
        let mut seen: HashSet<String> = HashSet::new();
        let mut add_term = |terms: &mut Vec<String>, term: String| {
            if seen.insert(term.to_ascii_lowercase()) {
                terms.push(term);
            }
        };

        // Root literals keep their position at the front, qualifiers included
        for mechanism in &root.mechanisms {
            let is_v6 = match mechanism.kind {
                MechanismKind::Ip4 => false,
                MechanismKind::Ip6 if self.options.ipv6_support => true,
                _ => continue,
            };
            let term = if mechanism.qualifier == Qualifier::Pass {
                let prefix = if is_v6 { "ip6" } else { "ip4" };
                format!("{prefix}:{}", normalize_network(&mechanism.value, is_v6))
            } else {
                mechanism.raw.clone()
            };
            add_term(&mut terms, term);
        }

        let mut include_terms = 0;
        for domain in &self.preserved {
            add_term(&mut terms, format!("include:{domain}"));
            include_terms += 1;
        }
        for domain in &self.options.additional_includes {
            let domain = normalize_domain(domain);
            if domain.is_empty() {
                continue;
            }
            if self.options.is_removed(&domain) {
                self.warnings.push(Issue::new(
                    ErrorKind::Validation,
                    format!("additional include {domain} is also listed for removal; skipped"),
                ));
                continue;
            }
            add_term(&mut terms, format!("include:{domain}"));
            include_terms += 1;
        }

        let mut ipv4 = Vec::new();
        let mut ipv6 = Vec::new();
        for node in &self.nodes {
            for network in &node.ipv4 {
                push_unique(&mut ipv4, network.clone());
            }
            for network in &node.ipv6 {
                push_unique(&mut ipv6, network.clone());
            }
        }
        for network in &ipv4 {
            add_term(&mut terms, format!("ip4:{network}"));
        }
        for network in &ipv6 {
            add_term(&mut terms, format!("ip6:{network}"));
        }

        let all = self.terminal_all();
        if all == "+all" || all == "all" {
            self.warnings.push(Issue::new(
                ErrorKind::Validation,
                "terminal +all authorizes every sender".to_string(),
            ));
        }
        terms.push(all);
        if let Some(exp) = root.explanation() {
            terms.push(format!("exp={exp}"));
        }

        let flattened_record = terms.join(" ");
        let character_count = flattened_record.len();
        let exceeds_char_limit = character_count > SPF_MAX_CHARS;
        if exceeds_char_limit {
            self.errors.push(Issue::new(
                ErrorKind::CharacterLimitExceeded,
                format!(
                    "flattened record is {character_count} characters; the limit is {SPF_MAX_CHARS}"
                ),
            ));
        } else if character_count > DNS_TXT_STRING_MAX {
            self.warnings.push(Issue::new(
                ErrorKind::CharacterLimitExceeded,
                format!(
                    "flattened record is {character_count} characters and must be published as several {DNS_TXT_STRING_MAX}-character TXT strings"
                ),
            ));
        }

        let lookup_count_after = count_spf_lookups(&flattened_record).unwrap_or(include_terms);
        if lookup_count_after > SPF_MAX_LOOKUPS {
            self.errors.push(Issue::new(
                ErrorKind::LookupBudgetExceeded,
                format!(
                    "flattened record still needs {lookup_count_after} lookups; the limit is {SPF_MAX_LOOKUPS}"
                ),
            ));
        }

        let include_chain = self.chain(0);
        info!(
            "Flattened SPF for {}: {} -> {} lookups, {} characters, {} domains {} levels deep, {} error(s)",
            include_chain.domain,
            self.lookup_count_before,
            lookup_count_after,
            character_count,
            include_chain.nodes().len(),
            include_chain.max_depth(),
            self.errors.len()
        );

        FlattenedSpfResult {
            include_chain,
            flattened_record,
            lookup_count_before: self.lookup_count_before,
            lookup_count_after,
            lookups_performed: self.budget.used(),
            ipv4,
            ipv6,
            resolved_includes: self.resolved_includes,
            character_count,
            exceeds_char_limit,
            errors: self.errors,
            warnings: self.warnings,
        }
    }
}

fn normalize_domain(domain: &str) -> String {
    domain.trim().trim_end_matches('.').to_ascii_lowercase()
}

fn push_unique(list: &mut Vec<String>, value: String) {
    if !list.contains(&value) {
        list.push(value);
    }
}

/// Drops a redundant host prefix (`/32`, `/128`) so equal networks compare equal.
fn normalize_network(value: &str, is_v6: bool) -> String {
    let host_prefix = if is_v6 { "/128" } else { "/32" };
    let value = value.strip_suffix(host_prefix).unwrap_or(value);
    if is_v6 {
        // Canonical text form, so 2001:0db8::1 and 2001:db8::1 dedupe
        match value.split_once('/') {
            Some((addr, prefix)) => match addr.parse::<Ipv6Addr>() {
                Ok(addr) => format!("{addr}/{prefix}"),
                Err(_) => value.to_ascii_lowercase(),
            },
            None => value
                .parse::<Ipv6Addr>()
                .map(|addr| addr.to_string())
                .unwrap_or_else(|_| value.to_ascii_lowercase()),
        }
    } else {
        value.to_string()
    }
}

fn network_v4(addr: Ipv4Addr, prefix: u8) -> String {
    if prefix >= 32 {
        return addr.to_string();
    }
    let mask = if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - u32::from(prefix))
    };
    format!("{}/{}", Ipv4Addr::from(u32::from(addr) & mask), prefix)
}

fn network_v6(addr: Ipv6Addr, prefix: u8) -> String {
    if prefix >= 128 {
        return addr.to_string();
    }
    let mask = if prefix == 0 {
        0
    } else {
        u128::MAX << (128 - u32::from(prefix))
    };
    format!("{}/{}", Ipv6Addr::from(u128::from(addr) & mask), prefix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_masks_host_bits() {
        assert_eq!(network_v4(Ipv4Addr::new(192, 0, 2, 77), 24), "192.0.2.0/24");
        assert_eq!(network_v4(Ipv4Addr::new(192, 0, 2, 77), 32), "192.0.2.77");
        assert_eq!(network_v4(Ipv4Addr::new(192, 0, 2, 77), 0), "0.0.0.0/0");
        assert_eq!(
            network_v6("2001:db8::abcd".parse().unwrap(), 64),
            "2001:db8::/64"
        );
    }

    #[test]
    fn test_normalize_network() {
        assert_eq!(normalize_network("192.0.2.1/32", false), "192.0.2.1");
        assert_eq!(normalize_network("192.0.2.0/24", false), "192.0.2.0/24");
        assert_eq!(normalize_network("2001:0DB8::1", true), "2001:db8::1");
        assert_eq!(normalize_network("2001:0db8::/32", true), "2001:db8::/32");
    }
}
