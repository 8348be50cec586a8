//! SPF flattening inputs, outputs and the shared lookup budget.

use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};

use crate::config::SPF_MAX_LOOKUPS;
use crate::error_handling::Issue;

/// Input to the flattener.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlattenOptions {
    /// Domain whose SPF record is flattened.
    pub domain: String,
    /// Record to flatten; fetched from `domain`'s TXT set when `None`.
    pub original_spf: Option<String>,
    /// Includes appended verbatim to the flattened record.
    pub additional_includes: Vec<String>,
    /// Includes kept verbatim instead of being expanded.
    pub preserve_includes: Vec<String>,
    /// Includes dropped entirely, wherever they appear in the tree.
    pub remove_includes: Vec<String>,
    /// Emit `ip6` mechanisms and resolve AAAA records.
    pub ipv6_support: bool,
}

impl FlattenOptions {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            ipv6_support: true,
            ..Default::default()
        }
    }

    pub fn with_original_spf(mut self, record: impl Into<String>) -> Self {
        self.original_spf = Some(record.into());
        self
    }

    pub fn with_additional_include(mut self, domain: impl Into<String>) -> Self {
        self.additional_includes.push(domain.into());
        self
    }

    pub fn with_preserved_include(mut self, domain: impl Into<String>) -> Self {
        self.preserve_includes.push(domain.into());
        self
    }

    pub fn with_removed_include(mut self, domain: impl Into<String>) -> Self {
        self.remove_includes.push(domain.into());
        self
    }

    pub fn with_ipv6_support(mut self, enabled: bool) -> Self {
        self.ipv6_support = enabled;
        self
    }

    pub(crate) fn is_preserved(&self, domain: &str) -> bool {
        contains_domain(&self.preserve_includes, domain) && !self.is_removed(domain)
    }

    pub(crate) fn is_removed(&self, domain: &str) -> bool {
        contains_domain(&self.remove_includes, domain)
    }
}

fn contains_domain(list: &[String], domain: &str) -> bool {
    let domain = domain.trim_end_matches('.');
    list.iter()
        .any(|entry| entry.trim_end_matches('.').eq_ignore_ascii_case(domain))
}

/// One node of the include tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpfIncludeChain {
    pub domain: String,
    pub depth: usize,
    /// The SPF record found for `domain`, if it was fetched and parsed.
    pub record: Option<String>,
    pub ipv4: Vec<String>,
    pub ipv6: Vec<String>,
    /// Lookups performed for this node itself (its TXT fetch plus its `a`/`mx`
    /// terms). Children account for their own.
    pub lookup_count: usize,
    pub children: Vec<SpfIncludeChain>,
    pub error: Option<String>,
    /// The domain already appears on the path from the root to this node.
    pub circular: bool,
}

impl SpfIncludeChain {
    /// Lookups performed for this node and every descendant.
    pub fn total_lookups(&self) -> usize {
        self.lookup_count
            + self
                .children
                .iter()
                .map(SpfIncludeChain::total_lookups)
                .sum::<usize>()
    }

    /// First node (depth-first, pre-order) for `domain`.
    pub fn find(&self, domain: &str) -> Option<&SpfIncludeChain> {
        if self.domain.eq_ignore_ascii_case(domain) {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(domain))
    }

    /// Every node of the tree, pre-order.
    pub fn nodes(&self) -> Vec<&SpfIncludeChain> {
        let mut out = vec![self];
        for child in &self.children {
            out.extend(child.nodes());
        }
        out
    }

    pub fn max_depth(&self) -> usize {
        self.children
            .iter()
            .map(SpfIncludeChain::max_depth)
            .max()
            .unwrap_or(self.depth)
    }
}

/// Outcome of flattening. Always returned, even when parts of the tree failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlattenedSpfResult {
    pub flattened_record: String,
    /// Lookup-costing terms across the original tree.
    pub lookup_count_before: usize,
    /// Lookup-costing terms left in `flattened_record`.
    pub lookup_count_after: usize,
    /// Lookups actually performed while flattening.
    pub lookups_performed: usize,
    pub ipv4: Vec<String>,
    pub ipv6: Vec<String>,
    pub resolved_includes: Vec<String>,
    pub character_count: usize,
    pub exceeds_char_limit: bool,
    pub include_chain: SpfIncludeChain,
    pub errors: Vec<Issue>,
    pub warnings: Vec<Issue>,
}

impl FlattenedSpfResult {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Lookup counter shared by every branch of one flattening run.
///
/// Reservations never push the count above the limit, even when several
/// tasks reserve at once.
#[derive(Debug)]
pub struct LookupBudget {
    used: AtomicUsize,
    limit: usize,
}

impl LookupBudget {
    pub fn new(limit: usize) -> Self {
        Self {
            used: AtomicUsize::new(0),
            limit,
        }
    }

    /// Reserves one lookup. Returns `false` once the limit is reached.
    pub fn try_acquire(&self) -> bool {
        self.used
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |used| {
                (used < self.limit).then_some(used + 1)
            })
            .is_ok()
    }

    pub fn used(&self) -> usize {
        self.used.load(Ordering::SeqCst)
    }

    pub fn remaining(&self) -> usize {
        self.limit.saturating_sub(self.used())
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

impl Default for LookupBudget {
    fn default() -> Self {
        Self::new(SPF_MAX_LOOKUPS)
    }
}
