use std::collections::{HashMap, HashSet};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use crate::config::{GroupMapConfig, Reload};
use crate::error::GateError;
use crate::sources::cache::Cached;
use crate::sources::{Line, PartitionGrant, read_lines};

/// Per-group partition grants.
///
/// Each line of the source file is `<gid>:<partition>[,<partition>...]`, with
/// commas and/or whitespace between partitions. A group may appear on several
/// lines; its grants are the union of all of them.
#[derive(Debug, Default, Clone)]
pub struct GroupPartitionMap {
    groups: HashMap<u32, HashSet<String>>,
}

impl GroupPartitionMap {
    pub fn load(path: &Path, max_line_bytes: usize) -> Result<Self, GateError> {
        let mut map = Self::default();
        read_lines(path, max_line_bytes, |number, line| {
            match line {
                Line::Text(text) => {
                    if let Err(reason) = map.add_line(&text) {
                        log::debug!("{}:{number}: {reason}, skipped", path.display());
                    }
                }
                Line::TooLong(len) => log::warn!(
                    "{}:{number}: line of {len} bytes exceeds {max_line_bytes} byte limit, skipped",
                    path.display()
                ),
                Line::Invalid => {
                    log::warn!("{}:{number}: line is not valid UTF-8, skipped", path.display())
                }
            }
            ControlFlow::Continue(())
        })?;
        Ok(map)
    }

    /// Parse one record and merge it in. Blank lines are accepted and ignored.
    pub fn add_line(&mut self, line: &str) -> Result<(), String> {
        if line.trim().is_empty() {
            return Ok(());
        }
        let Some((gid, partitions)) = line.split_once(':') else {
            return Err("missing ':' after group id".into());
        };
        let gid: u32 = gid
            .trim()
            .parse()
            .map_err(|e| format!("bad group id {:?}: {e}", gid.trim()))?;

        let entry = self.groups.entry(gid).or_default();
        entry.extend(
            partitions
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|p| !p.is_empty())
                .map(str::to_owned),
        );
        Ok(())
    }

    /// Exact, case-sensitive match against the group's partitions.
    pub fn is_allowed(&self, group: u32, partition: &str) -> bool {
        self.groups
            .get(&group)
            .is_some_and(|parts| parts.contains(partition))
    }

    pub fn partitions_for(&self, group: u32) -> Option<&HashSet<String>> {
        self.groups.get(&group)
    }
}

/// [`PartitionGrant`] backed by the group-partition map file.
pub struct GroupMapSource {
    cache: Cached<GroupPartitionMap>,
    max_line_bytes: usize,
}

impl GroupMapSource {
    pub fn new(path: impl Into<PathBuf>, max_line_bytes: usize, reload: Reload) -> Self {
        Self {
            cache: Cached::new(path, reload),
            max_line_bytes,
        }
    }

    pub fn from_config(config: &GroupMapConfig, reload: Reload) -> Self {
        Self::new(config.expanded_path(), config.max_line_bytes, reload)
    }
}

impl PartitionGrant for GroupMapSource {
    fn name(&self) -> &str {
        "group-map"
    }

    fn grants(&self, group: u32, partition: &str) -> Result<bool, GateError> {
        let max = self.max_line_bytes;
        match self.cache.get(|p| GroupPartitionMap::load(p, max)) {
            Ok(map) => Ok(map.is_allowed(group, partition)),
            Err(e) if e.is_internal() => Err(e),
            Err(e) => {
                log::warn!("failed to read group partition map, granting nothing: {e}");
                Ok(false)
            }
        }
    }
}
