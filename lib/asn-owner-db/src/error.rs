/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::net::{AddrParseError, IpAddr};

use ip_network::IpNetworkError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RangeError {
    #[error("invalid ip address {text}: {source}")]
    InvalidAddress {
        text: String,
        source: AddrParseError,
    },
    #[error("address family mismatch between {start} and {end}")]
    MixedFamily { start: IpAddr, end: IpAddr },
    #[error("range start {start} is after end {end}")]
    Inverted { start: IpAddr, end: IpAddr },
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("invalid prefix length {prefix} for address {addr}")]
    InvalidPrefix { addr: IpAddr, prefix: u8 },
    #[error("invalid network: {0}")]
    InvalidNetwork(#[from] IpNetworkError),
}
