//! Address descriptor resolution
//!
//! Turns a rule's source/destination descriptor into an [`AddressSet`] that
//! supports equality and subset tests. Descriptor grammar:
//!
//! | Descriptor | Meaning |
//! |---|---|
//! | no `IP_` prefix (`any`, `LAN-GROUP`) | opaque symbolic token |
//! | `IP_a.b.c.d-e.f.g.h` | inclusive address range |
//! | `IP_a.b.c.d/nn` | CIDR block, network through broadcast |
//! | `IP_a.b.c.d,IP_e.f.g.h` | explicit address list |
//!
//! Concrete sets are kept as sorted, merged spans rather than materialized
//! address lists, so a `/8` costs the same as a single host.
//!
//! # Example
//!
//! ```
//! use fwaudit::core::address::resolve;
//!
//! let block = resolve("IP_10.0.0.0/30").unwrap();
//! let host = resolve("IP_10.0.0.1").unwrap();
//! assert!(host.is_subset_of(&block));
//! assert!(!block.is_subset_of(&host));
//! ```

use crate::core::error::{AddressError, Direction, Error};
use crate::core::rulebase::{ADDRESS_PREFIX, Rule, RuleId};
use ipnetwork::Ipv4Network;
use std::fmt;
use std::net::Ipv4Addr;

/// Inclusive span of IPv4 addresses in numeric form
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AddrSpan {
    pub start: u32,
    pub end: u32,
}

impl AddrSpan {
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    const fn contains(&self, other: &AddrSpan) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Number of addresses in the span
    pub const fn len(&self) -> u64 {
        self.end as u64 - self.start as u64 + 1
    }
}

impl fmt::Display for AddrSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", Ipv4Addr::from(self.start))
        } else {
            write!(
                f,
                "{}-{}",
                Ipv4Addr::from(self.start),
                Ipv4Addr::from(self.end)
            )
        }
    }
}

/// Resolved membership of an address descriptor
///
/// Concrete spans are always sorted and merged (adjacent spans fused), so two
/// sets with the same members compare and hash equal regardless of how the
/// descriptor spelled them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AddressSet {
    /// Non-address descriptor, equal only to the identical token
    Symbolic(String),
    /// Concrete IPv4 addresses
    Addresses(Vec<AddrSpan>),
}

impl AddressSet {
    /// Builds a concrete set from arbitrary spans.
    pub fn from_spans(mut spans: Vec<AddrSpan>) -> Self {
        spans.sort_unstable();

        let mut merged: Vec<AddrSpan> = Vec::with_capacity(spans.len());
        for span in spans {
            match merged.last_mut() {
                Some(last) if u64::from(span.start) <= u64::from(last.end) + 1 => {
                    last.end = last.end.max(span.end);
                }
                _ => merged.push(span),
            }
        }

        AddressSet::Addresses(merged)
    }

    /// Set inclusion. A symbolic token is only a subset of the same token;
    /// symbolic and concrete sets never contain one another.
    pub fn is_subset_of(&self, other: &AddressSet) -> bool {
        match (self, other) {
            (AddressSet::Symbolic(a), AddressSet::Symbolic(b)) => a == b,
            (AddressSet::Addresses(inner), _) if inner.is_empty() => true,
            (AddressSet::Addresses(inner), AddressSet::Addresses(outer)) => {
                spans_within(inner, outer)
            }
            _ => false,
        }
    }

    /// Number of member addresses (a symbolic token counts as one member)
    pub fn len(&self) -> u64 {
        match self {
            AddressSet::Symbolic(_) => 1,
            AddressSet::Addresses(spans) => spans.iter().map(AddrSpan::len).sum(),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, AddressSet::Addresses(spans) if spans.is_empty())
    }
}

impl fmt::Display for AddressSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressSet::Symbolic(token) => write!(f, "{token}"),
            AddressSet::Addresses(spans) => {
                for (i, span) in spans.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{span}")?;
                }
                Ok(())
            }
        }
    }
}

/// A rule's match criteria with both address descriptors resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRule {
    pub id: RuleId,
    pub source: AddressSet,
    pub destination: AddressSet,
    pub service: String,
}

impl ResolvedRule {
    /// Resolves both descriptors of `rule`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Descriptor`] naming the rule and the failing side.
    pub fn from_rule(rule: &Rule) -> Result<Self, Error> {
        let side = |descriptor: &str, direction: Direction| {
            resolve(descriptor).map_err(|source| Error::Descriptor {
                rule_id: rule.id,
                direction,
                source,
            })
        };

        Ok(Self {
            id: rule.id,
            source: side(&rule.source, Direction::Source)?,
            destination: side(&rule.destination, Direction::Destination)?,
            service: rule.service.clone(),
        })
    }

    /// `true` when every packet this rule matches is also matched by `other`
    pub fn is_covered_by(&self, other: &ResolvedRule) -> bool {
        self.service == other.service
            && self.source.is_subset_of(&other.source)
            && self.destination.is_subset_of(&other.destination)
    }
}

/// Merge-walk containment: each inner span must sit inside one outer span.
/// Both slices are sorted and merged, so the outer cursor never moves back.
fn spans_within(inner: &[AddrSpan], outer: &[AddrSpan]) -> bool {
    let mut cursor = 0;
    for span in inner {
        while cursor < outer.len() && outer[cursor].end < span.start {
            cursor += 1;
        }
        match outer.get(cursor) {
            Some(candidate) if candidate.contains(span) => {}
            _ => return false,
        }
    }
    true
}

/// Resolves a descriptor into an [`AddressSet`].
///
/// # Errors
///
/// Returns the [`AddressError`] variant matching the descriptor form that
/// failed to parse.
pub fn resolve(descriptor: &str) -> Result<AddressSet, AddressError> {
    let Some(body) = descriptor.strip_prefix(ADDRESS_PREFIX) else {
        return Ok(AddressSet::Symbolic(descriptor.to_string()));
    };

    if body.contains('-') {
        parse_range(descriptor, body)
    } else if body.contains('/') {
        parse_cidr(descriptor, body)
    } else {
        parse_list(descriptor)
    }
}

fn parse_range(descriptor: &str, body: &str) -> Result<AddressSet, AddressError> {
    let malformed = |reason: String| AddressError::MalformedRange {
        descriptor: descriptor.to_string(),
        reason,
    };

    let (start_str, end_str) = body
        .split_once('-')
        .ok_or_else(|| malformed("expected start-end".to_string()))?;

    let start: Ipv4Addr = start_str
        .trim()
        .parse()
        .map_err(|_| malformed(format!("invalid start address '{start_str}'")))?;
    let end: Ipv4Addr = end_str
        .trim()
        .parse()
        .map_err(|_| malformed(format!("invalid end address '{end_str}'")))?;

    let (start, end) = (u32::from(start), u32::from(end));
    if start > end {
        return Err(malformed(
            "start address is greater than end address".to_string(),
        ));
    }

    Ok(AddressSet::from_spans(vec![AddrSpan::new(start, end)]))
}

fn parse_cidr(descriptor: &str, body: &str) -> Result<AddressSet, AddressError> {
    // Host bits are tolerated; the block is widened to its network.
    let network: Ipv4Network =
        body.trim()
            .parse()
            .map_err(|e: ipnetwork::IpNetworkError| AddressError::MalformedCidr {
                descriptor: descriptor.to_string(),
                reason: e.to_string(),
            })?;

    Ok(AddressSet::from_spans(vec![AddrSpan::new(
        u32::from(network.network()),
        u32::from(network.broadcast()),
    )]))
}

fn parse_list(descriptor: &str) -> Result<AddressSet, AddressError> {
    let spans = descriptor
        .split(',')
        .map(|token| {
            let token = token.trim();
            let literal = token.strip_prefix(ADDRESS_PREFIX).unwrap_or(token);
            literal
                .parse::<Ipv4Addr>()
                .map(|addr| {
                    let n = u32::from(addr);
                    AddrSpan::new(n, n)
                })
                .map_err(|_| AddressError::MalformedAddress {
                    descriptor: descriptor.to_string(),
                    reason: format!("'{token}' is not an IPv4 address"),
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(AddressSet::from_spans(spans))
}
