/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::net::IpAddr;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::anyhow;
use flate2::bufread::GzDecoder;
use log::{debug, warn};

use crate::{AddressRange, OwnerRecord, OwnerTable, OwnerTableBuilder};

/// What to do with a record that fails to parse or validate.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum InvalidRecordPolicy {
    /// Fail the whole load on the first invalid record.
    #[default]
    Abort,
    /// Drop the invalid record and keep loading.
    Skip,
}

impl FromStr for InvalidRecordPolicy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "abort" | "fail" => Ok(InvalidRecordPolicy::Abort),
            "skip" | "ignore" => Ok(InvalidRecordPolicy::Skip),
            _ => Err(()),
        }
    }
}

/// Load a registry range dump file.
///
/// The expected format is header-less tab-separated rows of
/// `range_start`, `range_end`, `as_number`, `country_code`,
/// `as_description`. Files ending in `.gz` are decompressed on the fly.
pub fn load_ranges(file: &Path, policy: InvalidRecordPolicy) -> anyhow::Result<OwnerTable> {
    if let Some(ext) = file.extension() {
        match ext.to_str() {
            Some("gz") => {
                let f = File::open(file)
                    .map_err(|e| anyhow!("failed to open gzip file {}: {e}", file.display()))?;
                let f = GzDecoder::new(BufReader::new(f));
                return load_ranges_from_tsv(f, policy);
            }
            Some(_) => {}
            None => {}
        }
    }
    let f = File::open(file).map_err(|e| anyhow!("failed to open file {}: {e}", file.display()))?;
    load_ranges_from_tsv(f, policy)
}

fn load_ranges_from_tsv<R: io::Read>(
    stream: R,
    policy: InvalidRecordPolicy,
) -> anyhow::Result<OwnerTable> {
    let mut builder = OwnerTableBuilder::new();
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .from_reader(stream);

    let mut loaded = 0usize;
    let mut skipped = 0usize;
    for (i, record) in rdr.records().enumerate() {
        let record = record.map_err(|e| anyhow!("invalid record #{i}: {e}"))?;
        match range_row(&record) {
            Ok(Some((range, owner))) => {
                builder.insert_range(&range, owner);
                loaded += 1;
            }
            Ok(None) => {}
            Err(e) => match policy {
                InvalidRecordPolicy::Abort => return Err(anyhow!("invalid record #{i}: {e}")),
                InvalidRecordPolicy::Skip => {
                    warn!("skipped invalid record #{i}: {e}");
                    skipped += 1;
                }
            },
        }
    }

    let table = builder.build();
    let (v4l, v6l) = table.len();
    debug!("loaded {loaded} ranges as {v4l} ipv4 and {v6l} ipv6 networks, skipped {skipped}");
    Ok(table)
}

fn range_row(record: &csv::StringRecord) -> anyhow::Result<Option<(AddressRange, Arc<OwnerRecord>)>> {
    let start = record
        .get(0)
        .ok_or_else(|| anyhow!("missing range start field"))?;
    let end = record
        .get(1)
        .ok_or_else(|| anyhow!("missing range end field"))?;
    let asn = record
        .get(2)
        .ok_or_else(|| anyhow!("missing as number field"))?;
    let asn = u32::from_str(asn.strip_prefix("AS").unwrap_or(asn))
        .map_err(|_| anyhow!("invalid as number {asn}"))?;
    if asn == 0 {
        // not routed, must stay unmatched at query time
        return Ok(None);
    }

    let range = AddressRange::parse(start, end)?;
    let mut owner = OwnerRecord::new(asn, record.get(4).unwrap_or_default());
    if let Some(cc) = record.get(3)
        && !cc.is_empty()
        && cc != "None"
    {
        owner.set_country(cc);
    }
    Ok(Some((range, Arc::new(owner))))
}

/// Load a precompiled networks file, as written by [`dump_networks`].
///
/// Line format: `network,as_number,country_code,as_description`, with
/// `#` starting a comment line. Files ending in `.gz` are decompressed
/// on the fly.
pub fn load_networks(file: &Path, policy: InvalidRecordPolicy) -> anyhow::Result<OwnerTable> {
    if let Some(ext) = file.extension() {
        match ext.to_str() {
            Some("gz") => {
                let f = File::open(file)
                    .map_err(|e| anyhow!("failed to open gzip file {}: {e}", file.display()))?;
                let f = GzDecoder::new(BufReader::new(f));
                return load_networks_from_csv(f, policy);
            }
            Some(_) => {}
            None => {}
        }
    }
    let f = File::open(file).map_err(|e| anyhow!("failed to open file {}: {e}", file.display()))?;
    load_networks_from_csv(f, policy)
}

fn load_networks_from_csv<R: io::Read>(
    stream: R,
    policy: InvalidRecordPolicy,
) -> anyhow::Result<OwnerTable> {
    let mut builder = OwnerTableBuilder::new();

    let reader = BufReader::new(stream);
    let mut skipped = 0usize;
    for (i, line) in reader.split(b'\n').enumerate() {
        let line = line.map_err(|e| anyhow!("failed to read line #{i}: {e}"))?;

        if line.is_empty() {
            continue;
        }
        if line[0] == b'#' {
            continue;
        }
        let line = std::str::from_utf8(&line).map_err(|e| anyhow!("invalid line #{i}: {e}"))?;
        let inserted = network_line(line)
            .and_then(|(addr, prefix, owner)| Ok(builder.insert_cidr(addr, prefix, owner)?));
        if let Err(e) = inserted {
            match policy {
                InvalidRecordPolicy::Abort => return Err(anyhow!("invalid line #{i}: {e}")),
                InvalidRecordPolicy::Skip => {
                    warn!("skipped invalid line #{i}: {e}");
                    skipped += 1;
                }
            }
        }
    }

    let table = builder.build();
    let (v4l, v6l) = table.len();
    debug!("loaded {v4l} ipv4 and {v6l} ipv6 networks, skipped {skipped}");
    Ok(table)
}

fn network_line(line: &str) -> anyhow::Result<(IpAddr, u8, Arc<OwnerRecord>)> {
    let Some((network, rest)) = line.split_once(',') else {
        return Err(anyhow!("missing as number field"));
    };
    let Some((addr, prefix)) = network.split_once('/') else {
        return Err(anyhow!("missing network mask"));
    };
    let addr = IpAddr::from_str(addr).map_err(|e| anyhow!("invalid network address: {e}"))?;
    let prefix = u8::from_str(prefix).map_err(|e| anyhow!("invalid network mask: {e}"))?;

    let Some((asn, rest)) = rest.split_once(',') else {
        return Err(anyhow!("missing country code field"));
    };
    let asn = u32::from_str(asn).map_err(|_| anyhow!("invalid as number {asn}"))?;
    let Some((cc, name)) = rest.split_once(',') else {
        return Err(anyhow!("missing as description field"));
    };

    let mut owner = OwnerRecord::new(asn, name);
    if !cc.is_empty() {
        owner.set_country(cc);
    }
    Ok((addr, prefix, Arc::new(owner)))
}

/// Write the compiled table as a precompiled networks file, reloadable
/// with [`load_networks`].
pub fn dump_networks(table: &OwnerTable, file: &Path) -> anyhow::Result<()> {
    let f =
        File::create(file).map_err(|e| anyhow!("failed to create file {}: {e}", file.display()))?;
    let mut writer = BufWriter::new(f);
    dump_networks_to(table, &mut writer)?;
    writer
        .flush()
        .map_err(|e| anyhow!("failed to write file {}: {e}", file.display()))
}

fn dump_networks_to<W: io::Write>(table: &OwnerTable, writer: &mut W) -> anyhow::Result<()> {
    for (network, owner) in table.iter() {
        writeln!(
            writer,
            "{network},{},{},{}",
            owner.number,
            owner.country_code().unwrap_or_default(),
            owner.owner_name()
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;

    const RANGE_DUMP: &str = "\
1.0.0.0\t1.0.0.255\t13335\tUS\tCLOUDFLARENET\n\
1.0.1.0\t1.0.3.255\t0\tNone\tNot routed\n\
8.8.8.0\t8.8.8.255\t15169\tUS\tGOOGLE\n\
2001:db8::\t2001:db8::ffff\t64496\tNone\tEXAMPLE-NET\n";

    fn ip(s: &str) -> IpAddr {
        IpAddr::from_str(s).unwrap()
    }

    #[test]
    fn policy_from_str() {
        assert_eq!(
            InvalidRecordPolicy::from_str("skip").unwrap(),
            InvalidRecordPolicy::Skip
        );
        assert_eq!(
            InvalidRecordPolicy::from_str("Abort").unwrap(),
            InvalidRecordPolicy::Abort
        );
        assert!(InvalidRecordPolicy::from_str("whatever").is_err());
    }

    #[test]
    fn range_dump() {
        let table = load_ranges_from_tsv(RANGE_DUMP.as_bytes(), InvalidRecordPolicy::Abort).unwrap();
        assert_eq!(table.len(), (2, 1));

        let r = table.lookup(ip("1.0.0.53")).unwrap();
        assert_eq!(r.number, 13335);
        assert_eq!(r.owner_name(), "CLOUDFLARENET");
        assert_eq!(r.country_code(), Some("US"));

        let r = table.lookup(ip("2001:db8::42")).unwrap();
        assert_eq!(r.number, 64496);
        assert_eq!(r.country_code(), None);

        // the unrouted row must not land in the table
        assert!(table.lookup(ip("1.0.2.1")).is_none());
    }

    #[test]
    fn range_dump_policy() {
        let dump = format!("999.0.0.0\t999.0.0.255\t1\tUS\tBAD\n{RANGE_DUMP}");

        let r = load_ranges_from_tsv(dump.as_bytes(), InvalidRecordPolicy::Abort);
        assert!(r.is_err());

        let table = load_ranges_from_tsv(dump.as_bytes(), InvalidRecordPolicy::Skip).unwrap();
        assert_eq!(table.len(), (2, 1));
        assert!(table.lookup(ip("8.8.8.8")).is_some());
    }

    #[test]
    fn range_dump_inverted_row() {
        let dump = "2.0.0.10\t2.0.0.1\t5\tUS\tBACKWARDS\n";
        let r = load_ranges_from_tsv(dump.as_bytes(), InvalidRecordPolicy::Abort);
        assert!(r.is_err());
        let table = load_ranges_from_tsv(dump.as_bytes(), InvalidRecordPolicy::Skip).unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn networks_file() {
        let data = "\
# compiled asn networks\n\
10.0.0.0/8,64500,US,Example A\n\
10.1.0.0/16,64501,,Example B, Inc.\n";
        let table = load_networks_from_csv(data.as_bytes(), InvalidRecordPolicy::Abort).unwrap();
        assert_eq!(table.len(), (2, 0));

        let r = table.lookup(ip("10.1.2.3")).unwrap();
        assert_eq!(r.owner_name(), "Example B, Inc.");
        assert_eq!(r.country_code(), None);
        assert_eq!(table.lookup(ip("10.2.0.0")).unwrap().owner_name(), "Example A");
    }

    #[test]
    fn networks_file_policy() {
        let data = "\
10.0.0.0/33,64500,US,Bad prefix\n\
10.0.0.0/8,64500,US,Example A\n";
        let r = load_networks_from_csv(data.as_bytes(), InvalidRecordPolicy::Abort);
        assert!(r.is_err());

        let table = load_networks_from_csv(data.as_bytes(), InvalidRecordPolicy::Skip).unwrap();
        assert_eq!(table.len(), (1, 0));
    }

    #[test]
    fn gzip_networks_file() {
        let data = "10.0.0.0/8,64500,US,Example A\n";
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data.as_bytes()).unwrap();
        let compressed = encoder.finish().unwrap();

        let decoder = GzDecoder::new(&compressed[..]);
        let table = load_networks_from_csv(decoder, InvalidRecordPolicy::Abort).unwrap();
        assert_eq!(table.len(), (1, 0));
    }

    #[test]
    fn dump_round_trip() {
        let table = load_ranges_from_tsv(RANGE_DUMP.as_bytes(), InvalidRecordPolicy::Abort).unwrap();

        let mut buf = Vec::new();
        dump_networks_to(&table, &mut buf).unwrap();
        let reloaded =
            load_networks_from_csv(&buf[..], InvalidRecordPolicy::Abort).unwrap();

        assert_eq!(reloaded.len(), table.len());
        let r = reloaded.lookup(ip("8.8.8.8")).unwrap();
        assert_eq!(r.number, 15169);
        assert_eq!(r.owner_name(), "GOOGLE");
        assert_eq!(r.country_code(), Some("US"));
        assert!(reloaded.lookup(ip("1.0.2.1")).is_none());
    }
}
