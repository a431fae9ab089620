/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::net::IpAddr;
use std::sync::Arc;

use ip_network::{IpNetwork, Ipv4Network, Ipv6Network};
use ip_network_table::IpNetworkTable;

use crate::range::parse_addr;
use crate::{AddressRange, BuildError, OwnerRecord, RangeError};

pub struct OwnerTableBuilder {
    table: IpNetworkTable<Arc<OwnerRecord>>,
}

impl Default for OwnerTableBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl OwnerTableBuilder {
    pub fn new() -> Self {
        OwnerTableBuilder {
            table: IpNetworkTable::new(),
        }
    }

    /// Insert one network. An exact duplicate network replaces the record
    /// inserted before it (last write wins).
    pub fn insert_network(&mut self, network: IpNetwork, owner: Arc<OwnerRecord>) {
        self.table.insert(network, owner);
    }

    pub fn insert_cidr(
        &mut self,
        addr: IpAddr,
        prefix: u8,
        owner: Arc<OwnerRecord>,
    ) -> Result<(), BuildError> {
        match addr {
            IpAddr::V4(_) => {
                if prefix > Ipv4Network::LENGTH {
                    return Err(BuildError::InvalidPrefix { addr, prefix });
                }
            }
            IpAddr::V6(_) => {
                if prefix > Ipv6Network::LENGTH {
                    return Err(BuildError::InvalidPrefix { addr, prefix });
                }
            }
        }
        let network = IpNetwork::new(addr, prefix)?;
        self.table.insert(network, owner);
        Ok(())
    }

    /// Compile the range into its exact CIDR cover and insert all of the
    /// resulting networks, sharing one record.
    pub fn insert_range(&mut self, range: &AddressRange, owner: Arc<OwnerRecord>) {
        for network in range.to_networks() {
            self.table.insert(network, owner.clone());
        }
    }

    pub fn build(self) -> OwnerTable {
        OwnerTable { table: self.table }
    }
}

/// An immutable longest-prefix-match table from network to owner.
///
/// Built once by [`OwnerTableBuilder`] and never mutated afterwards, so
/// it can be shared freely between reader threads. A refreshed registry
/// dump gets a newly built table.
pub struct OwnerTable {
    table: IpNetworkTable<Arc<OwnerRecord>>,
}

impl OwnerTable {
    pub fn longest_match(&self, ip: IpAddr) -> Option<(IpNetwork, &OwnerRecord)> {
        self.table.longest_match(ip).map(|(n, r)| (n, r.as_ref()))
    }

    /// Find the owner of the most specific network containing `ip`.
    ///
    /// `None` is the expected result for any address the registry dump
    /// does not cover, including addresses of a family the table holds
    /// no networks for.
    pub fn lookup(&self, ip: IpAddr) -> Option<&OwnerRecord> {
        self.table.longest_match(ip).map(|(_, r)| r.as_ref())
    }

    pub fn lookup_str(&self, ip: &str) -> Result<Option<&OwnerRecord>, RangeError> {
        let ip = parse_addr(ip)?;
        Ok(self.lookup(ip))
    }

    pub fn iter(&self) -> impl Iterator<Item = (IpNetwork, &OwnerRecord)> {
        self.table.iter().map(|(n, r)| (n, r.as_ref()))
    }

    /// Number of loaded (ipv4, ipv6) networks.
    pub fn len(&self) -> (usize, usize) {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        let (v4l, v6l) = self.table.len();
        v4l == 0 && v6l == 0
    }
}
