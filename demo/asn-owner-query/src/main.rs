/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::net::IpAddr;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::anyhow;
use clap::{Arg, ArgAction, Command, ValueHint, value_parser};

use asn_owner_db::{InvalidRecordPolicy, file};

const ARG_RANGES: &str = "ranges";
const ARG_NETWORKS: &str = "networks";
const ARG_POLICY: &str = "policy";
const ARG_DUMP: &str = "dump";

const ARG_IP_LIST: &str = "ip-list";

fn build_cli_args() -> Command {
    Command::new(env!("CARGO_PKG_NAME"))
        .arg(
            Arg::new(ARG_RANGES)
                .help("Input tsv range dump file (range start, range end, as number, country, description)")
                .long(ARG_RANGES)
                .num_args(1)
                .required_unless_present(ARG_NETWORKS)
                .value_parser(value_parser!(PathBuf))
                .value_hint(ValueHint::FilePath),
        )
        .arg(
            Arg::new(ARG_NETWORKS)
                .help("Input precompiled networks file")
                .long(ARG_NETWORKS)
                .num_args(1)
                .required_unless_present(ARG_RANGES)
                .value_parser(value_parser!(PathBuf))
                .value_hint(ValueHint::FilePath),
        )
        .arg(
            Arg::new(ARG_POLICY)
                .help("What to do with invalid records: abort or skip")
                .long(ARG_POLICY)
                .num_args(1),
        )
        .arg(
            Arg::new(ARG_DUMP)
                .help("Write the compiled networks to this file")
                .long(ARG_DUMP)
                .num_args(1)
                .value_parser(value_parser!(PathBuf))
                .value_hint(ValueHint::FilePath),
        )
        .arg(
            Arg::new(ARG_IP_LIST)
                .action(ArgAction::Append)
                .required(true)
                .value_parser(value_parser!(IpAddr)),
        )
}

fn main() -> anyhow::Result<()> {
    let args = build_cli_args().get_matches();

    let policy = match args.get_one::<String>(ARG_POLICY) {
        Some(s) => {
            InvalidRecordPolicy::from_str(s).map_err(|_| anyhow!("invalid policy {s}"))?
        }
        None => InvalidRecordPolicy::default(),
    };

    println!("# loading asn owner data");
    let table = if let Some(v) = args.get_one::<PathBuf>(ARG_RANGES) {
        file::load_ranges(v, policy)?
    } else if let Some(v) = args.get_one::<PathBuf>(ARG_NETWORKS) {
        file::load_networks(v, policy)?
    } else {
        unreachable!()
    };
    let (v4l, v6l) = table.len();
    println!("# loaded {v4l} ipv4 records, {v6l} ipv6 records");

    if let Some(path) = args.get_one::<PathBuf>(ARG_DUMP) {
        file::dump_networks(&table, path)?;
        println!("# dumped compiled networks to {}", path.display());
    }

    for ip in args.get_many::<IpAddr>(ARG_IP_LIST).unwrap() {
        println!("# check for IP {ip}");
        match table.longest_match(*ip) {
            Some((network, r)) => {
                print!("network: {network}\nasn: {}/{}", r.number, r.owner_name());
                if let Some(cc) = r.country_code() {
                    print!("/{cc}");
                }
                println!();
            }
            None => {
                println!("no record found");
            }
        }
    }

    Ok(())
}
