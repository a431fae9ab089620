/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use ip_network::{IpNetwork, Ipv4Network, Ipv6Network};

use crate::RangeError;

/// An inclusive address range from a registry dump row.
///
/// Both ends always belong to the same address family and
/// `start <= end` holds for every constructed value.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct AddressRange {
    start: IpAddr,
    end: IpAddr,
}

impl AddressRange {
    pub fn new(start: IpAddr, end: IpAddr) -> Result<Self, RangeError> {
        match (start, end) {
            (IpAddr::V4(s), IpAddr::V4(e)) => {
                if u32::from(s) > u32::from(e) {
                    return Err(RangeError::Inverted { start, end });
                }
            }
            (IpAddr::V6(s), IpAddr::V6(e)) => {
                if u128::from(s) > u128::from(e) {
                    return Err(RangeError::Inverted { start, end });
                }
            }
            _ => return Err(RangeError::MixedFamily { start, end }),
        }
        Ok(AddressRange { start, end })
    }

    pub fn parse(start: &str, end: &str) -> Result<Self, RangeError> {
        let start = parse_addr(start)?;
        let end = parse_addr(end)?;
        AddressRange::new(start, end)
    }

    #[inline]
    pub fn start(&self) -> IpAddr {
        self.start
    }

    #[inline]
    pub fn end(&self) -> IpAddr {
        self.end
    }

    /// Decompose the range into its minimal exact CIDR cover.
    ///
    /// The returned networks are sorted by address, do not overlap, and
    /// their union is exactly the inclusive span. A single address
    /// yields one full-length network.
    pub fn to_networks(&self) -> Vec<IpNetwork> {
        match (self.start, self.end) {
            (IpAddr::V4(s), IpAddr::V4(e)) => v4_networks(s, e),
            (IpAddr::V6(s), IpAddr::V6(e)) => v6_networks(s, e),
            _ => unreachable!(),
        }
    }
}

pub(crate) fn parse_addr(text: &str) -> Result<IpAddr, RangeError> {
    IpAddr::from_str(text).map_err(|e| RangeError::InvalidAddress {
        text: text.to_string(),
        source: e,
    })
}

fn v4_networks(start: Ipv4Addr, end: Ipv4Addr) -> Vec<IpNetwork> {
    let mut networks = Vec::new();
    let mut s = u32::from(start);
    let e = u32::from(end);
    loop {
        // widest block aligned at s, then capped to what still fits below e
        let align = if s == 0 { u32::BITS } else { s.trailing_zeros() };
        let span = e - s;
        let fit = if span == u32::MAX {
            u32::BITS
        } else {
            (span + 1).ilog2()
        };
        let free = align.min(fit);
        let prefix = (u32::BITS - free) as u8;
        let Ok(net) = Ipv4Network::new(Ipv4Addr::from(s), prefix) else {
            unreachable!()
        };
        networks.push(IpNetwork::V4(net));
        if free == u32::BITS {
            break;
        }
        match s.checked_add(1 << free) {
            Some(next) if next <= e => s = next,
            _ => break,
        }
    }
    networks
}

fn v6_networks(start: Ipv6Addr, end: Ipv6Addr) -> Vec<IpNetwork> {
    let mut networks = Vec::new();
    let mut s = u128::from(start);
    let e = u128::from(end);
    loop {
        let align = if s == 0 { u128::BITS } else { s.trailing_zeros() };
        let span = e - s;
        let fit = if span == u128::MAX {
            u128::BITS
        } else {
            (span + 1).ilog2()
        };
        let free = align.min(fit);
        let prefix = (u128::BITS - free) as u8;
        let Ok(net) = Ipv6Network::new(Ipv6Addr::from(s), prefix) else {
            unreachable!()
        };
        networks.push(IpNetwork::V6(net));
        if free == u128::BITS {
            break;
        }
        match s.checked_add(1 << free) {
            Some(next) if next <= e => s = next,
            _ => break,
        }
    }
    networks
}
