//! RFC 6724 destination address ordering.
//!
//! Orders resolved destinations from most to least preferred for connection
//! attempts. Each destination is paired with the source address the host
//! would use to reach it (see [`SourceAddrProbe`]), then destinations are
//! compared pairwise by the RFC 6724 section 6 rules using the default
//! policy table from section 2.1. The sort is stable: destinations the rules
//! cannot tell apart keep their original relative order.
//!
//! IPv4 addresses take part as IPv4-mapped IPv6 addresses (`::ffff:a.b.c.d`)
//! for policy-table lookups and prefix comparisons.

use crate::dns::address::ResolvedAddress;
use crate::dns::sourceaddr::{SocketSourceAddrProbe, SourceAddr, SourceAddrProbe};
use std::cmp::Ordering;
use std::fmt;
use std::net::{IpAddr, Ipv6Addr};
use std::sync::Arc;

/// Multicast-style scope values (RFC 4291 section 2.7).
pub mod scope {
    pub const INTERFACE_LOCAL: u8 = 0x1;
    pub const LINK_LOCAL: u8 = 0x2;
    pub const ADMIN_LOCAL: u8 = 0x4;
    pub const SITE_LOCAL: u8 = 0x5;
    pub const ORG_LOCAL: u8 = 0x8;
    pub const GLOBAL: u8 = 0xe;
}

struct PolicyEntry {
    prefix: u128,
    prefix_len: u32,
    precedence: u8,
    label: u8,
}

const fn policy(prefix: u128, prefix_len: u32, precedence: u8, label: u8) -> PolicyEntry {
    PolicyEntry {
        prefix,
        prefix_len,
        precedence,
        label,
    }
}

// RFC 6724 section 2.1.
const DEFAULT_POLICY_TABLE: [PolicyEntry; 9] = [
    policy(0x0000_0000_0000_0000_0000_0000_0000_0001, 128, 50, 0), // ::1/128
    policy(0x0000_0000_0000_0000_0000_0000_0000_0000, 0, 40, 1),   // ::/0
    policy(0x0000_0000_0000_0000_0000_ffff_0000_0000, 96, 35, 4),  // ::ffff:0:0/96
    policy(0x2002_0000_0000_0000_0000_0000_0000_0000, 16, 30, 2),  // 2002::/16
    policy(0x2001_0000_0000_0000_0000_0000_0000_0000, 32, 5, 5),   // 2001::/32
    policy(0xfc00_0000_0000_0000_0000_0000_0000_0000, 7, 3, 13),   // fc00::/7
    policy(0x0000_0000_0000_0000_0000_0000_0000_0000, 96, 1, 3),   // ::/96
    policy(0xfec0_0000_0000_0000_0000_0000_0000_0000, 10, 1, 11),  // fec0::/10
    policy(0x3ffe_0000_0000_0000_0000_0000_0000_0000, 16, 1, 12),  // 3ffe::/16
];

/// Number of leading bits `a` and `b` have in common.
pub fn common_prefix_len(a: &Ipv6Addr, b: &Ipv6Addr) -> u32 {
    (u128::from(*a) ^ u128::from(*b)).leading_zeros()
}

fn policy_entry(addr: &Ipv6Addr) -> &'static PolicyEntry {
    let bits = u128::from(*addr);
    let mut best = &DEFAULT_POLICY_TABLE[1];
    for entry in &DEFAULT_POLICY_TABLE {
        let matches = entry.prefix_len == 0
            || (bits ^ entry.prefix).leading_zeros() >= entry.prefix_len;
        if matches && entry.prefix_len > best.prefix_len {
            best = entry;
        }
    }
    best
}

/// Policy-table precedence of an address. Higher is preferred.
pub fn precedence(addr: &Ipv6Addr) -> u8 {
    policy_entry(addr).precedence
}

/// Policy-table label of an address.
pub fn label(addr: &Ipv6Addr) -> u8 {
    policy_entry(addr).label
}

/// Scope of an address per RFC 6724 section 3.1.
pub fn address_scope(ip: &IpAddr) -> u8 {
    match ip {
        IpAddr::V4(v4) => {
            if v4.is_loopback() || v4.is_link_local() {
                scope::LINK_LOCAL
            } else {
                scope::GLOBAL
            }
        }
        IpAddr::V6(v6) => {
            if let Some(v4) = v6.to_ipv4_mapped() {
                return address_scope(&IpAddr::V4(v4));
            }
            let first = v6.segments()[0];
            if first & 0xff00 == 0xff00 {
                // Multicast carries its scope in the low nibble.
                (first & 0x000f) as u8
            } else if v6.is_loopback() || first & 0xffc0 == 0xfe80 {
                scope::LINK_LOCAL
            } else if first & 0xffc0 == 0xfec0 {
                scope::SITE_LOCAL
            } else {
                scope::GLOBAL
            }
        }
    }
}

/// 6to4 (2002::/16) and Teredo (2001::/32) reach IPv4 infrastructure
/// through a tunnel or translator.
fn is_translated(addr: &Ipv6Addr) -> bool {
    let seg = addr.segments();
    seg[0] == 0x2002 || (seg[0] == 0x2001 && seg[1] == 0x0000)
}

struct Source {
    addr: Ipv6Addr,
    scope: u8,
    label: u8,
    deprecated: bool,
    temporary: bool,
}

struct Candidate {
    addr: ResolvedAddress,
    index: usize,
    dest: Ipv6Addr,
    dest_is_v4: bool,
    dest_scope: u8,
    dest_label: u8,
    dest_precedence: u8,
    source: Option<Source>,
}

impl Candidate {
    fn new(addr: ResolvedAddress, index: usize, source: Option<SourceAddr>) -> Self {
        let dest = addr.to_ipv6_mapped();
        let source = source.map(|s| {
            let mapped = match s.addr.ip() {
                IpAddr::V4(v4) => v4.to_ipv6_mapped(),
                IpAddr::V6(v6) => v6,
            };
            Source {
                addr: mapped,
                scope: address_scope(&s.addr.ip()),
                label: label(&mapped),
                deprecated: s.deprecated,
                temporary: s.temporary,
            }
        });
        Self {
            addr,
            index,
            dest,
            dest_is_v4: dest.to_ipv4_mapped().is_some(),
            dest_scope: address_scope(&addr.ip()),
            dest_label: label(&dest),
            dest_precedence: precedence(&dest),
            source,
        }
    }
}

/// Compares two destinations, `Less` meaning `a` is preferred.
fn compare(a: &Candidate, b: &Candidate) -> Ordering {
    // Rule 1: avoid unusable destinations.
    let by_reachability = b.source.is_some().cmp(&a.source.is_some());
    if by_reachability != Ordering::Equal {
        return by_reachability;
    }

    let by_source = match (&a.source, &b.source) {
        (Some(sa), Some(sb)) => {
            // Rule 2: prefer matching scope, then the smaller mismatch.
            let distance = |dst: u8, src: u8| dst.abs_diff(src);
            distance(a.dest_scope, sa.scope)
                .cmp(&distance(b.dest_scope, sb.scope))
                // Rule 3: avoid deprecated addresses.
                .then_with(|| sa.deprecated.cmp(&sb.deprecated))
                // Rule 4: prefer home addresses.
                .then_with(|| sa.temporary.cmp(&sb.temporary))
                // Rule 5: prefer matching label.
                .then_with(|| (b.dest_label == sb.label).cmp(&(a.dest_label == sa.label)))
        }
        _ => Ordering::Equal,
    };
    if by_source != Ordering::Equal {
        return by_source;
    }

    // Rule 6: prefer higher precedence.
    b.dest_precedence
        .cmp(&a.dest_precedence)
        // Rule 7: prefer native transport.
        .then_with(|| is_translated(&a.dest).cmp(&is_translated(&b.dest)))
        // Rule 8: prefer smaller scope.
        .then_with(|| a.dest_scope.cmp(&b.dest_scope))
        // Rule 9: use longest matching prefix, within one family only.
        .then_with(|| match (&a.source, &b.source) {
            (Some(sa), Some(sb)) if a.dest_is_v4 == b.dest_is_v4 => {
                common_prefix_len(&sb.addr, &b.dest).cmp(&common_prefix_len(&sa.addr, &a.dest))
            }
            _ => Ordering::Equal,
        })
        // Rule 10: otherwise, leave the order unchanged.
        .then_with(|| a.index.cmp(&b.index))
}

/// Sorts destination addresses by RFC 6724 preference.
///
/// Source addresses come from a [`SourceAddrProbe`]; the default is the
/// socket-based probe with one cached socket per address family.
#[derive(Clone)]
pub struct AddressSorter {
    probe: Option<Arc<dyn SourceAddrProbe>>,
}

impl AddressSorter {
    pub fn new(probe: Arc<dyn SourceAddrProbe>) -> Self {
        Self { probe: Some(probe) }
    }

    /// Sorter that leaves every list in backend order.
    pub fn passthrough() -> Self {
        Self { probe: None }
    }

    /// Sorter using the host's routing table through cached probe sockets.
    pub fn with_socket_probe() -> Self {
        Self::new(Arc::new(SocketSourceAddrProbe::new()))
    }

    /// Reorders `addrs` in place. Destinations without a usable source
    /// address are kept, at the end.
    pub fn sort(&self, addrs: &mut Vec<ResolvedAddress>) {
        let Some(probe) = &self.probe else {
            return;
        };
        if addrs.len() < 2 {
            return;
        }

        let mut candidates: Vec<Candidate> = addrs
            .drain(..)
            .enumerate()
            .map(|(index, addr)| {
                let source = probe.source_addr(&addr);
                match &source {
                    Some(src) => {
                        tracing::trace!(dest = %addr, source = %src.addr, "found source address candidate")
                    }
                    None => {
                        tracing::trace!(dest = %addr, "no source address, de-prioritizing")
                    }
                }
                Candidate::new(addr, index, source)
            })
            .collect();

        candidates.sort_by(compare);

        addrs.extend(candidates.into_iter().map(|c| c.addr));
        tracing::debug!(count = addrs.len(), first = %addrs[0], "sorted destination addresses");
    }
}

impl fmt::Debug for AddressSorter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AddressSorter")
            .field("enabled", &self.probe.is_some())
            .finish()
    }
}
