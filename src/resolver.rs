// src/resolver.rs

//! Dependency range resolution
//!
//! Before a transaction stages anything, every dependency constraint the
//! requested packages declare is folded into one range per dependency name,
//! and each range is checked against the constraints that packages already
//! on the system recorded for the same name. The result only proves that a
//! satisfying version can exist; no concrete version is chosen here.

use crate::db::models::DependencyRecord;
use crate::error::{Error, Result};
use crate::packages::Package;
use crate::version::VersionRange;
use rusqlite::Connection;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::debug;

/// Validates the dependency constraints of a transaction
pub struct DependencyResolver<'a> {
    conn: &'a Connection,
}

impl<'a> DependencyResolver<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Fold the requested packages' constraints and check them against the
    /// installed ones, returning the surviving range per dependency name
    pub fn resolve(&self, packages: &[Package]) -> Result<BTreeMap<String, VersionRange>> {
        let requests = packages
            .iter()
            .flat_map(|p| p.depends.iter().map(|d| (d.name.clone(), d.range())));
        let mut ranges = fold_requests(requests)?;

        // Owners being (re)installed replace their own recorded constraints
        let requested: BTreeSet<&str> = packages.iter().map(|p| p.name.as_str()).collect();

        for (name, range) in ranges.iter_mut() {
            for record in DependencyRecord::find_by_name(self.conn, name)? {
                if requested.contains(record.owner_package.as_str()) {
                    continue;
                }

                *range = range.intersect(&record.version_range).ok_or_else(|| {
                    debug!(
                        "{} requires {} {}, transaction requires {}",
                        record.owner_package, name, record.version_range, range
                    );
                    Error::UnresolvableDependency { name: name.clone() }
                })?;
            }
        }

        Ok(ranges)
    }
}

/// Fold dependency requests into one range per name
///
/// Identical requests are counted once. The first request for a name seeds
/// its range; every later one must overlap and narrows it.
pub fn fold_requests<I>(requests: I) -> Result<BTreeMap<String, VersionRange>>
where
    I: IntoIterator<Item = (String, VersionRange)>,
{
    let mut seen = HashSet::new();
    let mut ranges: BTreeMap<String, VersionRange> = BTreeMap::new();

    for (name, range) in requests {
        if !seen.insert((name.clone(), range.clone())) {
            continue;
        }

        match ranges.get_mut(&name) {
            None => {
                ranges.insert(name, range);
            }
            Some(acc) => {
                *acc = acc
                    .intersect(&range)
                    .ok_or_else(|| Error::UnresolvableDependency { name: name.clone() })?;
            }
        }
    }

    Ok(ranges)
}
