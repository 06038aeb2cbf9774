use std::collections::HashSet;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use crate::config::{AllowlistConfig, Reload};
use crate::error::GateError;
use crate::sources::cache::Cached;
use crate::sources::{Line, PartitionGrant, read_lines};

/// Load-time caps for the allowlist file.
#[derive(Debug, Clone, Copy)]
pub struct AllowlistLimits {
    /// Names recorded before the rest of the file is ignored.
    pub max_entries: usize,
    /// Bytes per line, terminator included.
    pub max_name_bytes: usize,
}

impl Default for AllowlistLimits {
    fn default() -> Self {
        Self {
            max_entries: 100,
            max_name_bytes: 64,
        }
    }
}

/// Partitions on which any restricted submission is allowed.
#[derive(Debug, Default, Clone)]
pub struct PartitionAllowlist {
    partitions: HashSet<String>,
}

impl PartitionAllowlist {
    /// Read the allowlist at `path`.
    ///
    /// Empty, overlong and non-UTF-8 lines are skipped and do not count toward
    /// `max_entries`. Overlong lines are never truncated, so a long name can
    /// never collapse into a shorter valid one.
    pub fn load(path: &Path, limits: AllowlistLimits) -> Result<Self, GateError> {
        let mut partitions = HashSet::new();
        let mut recorded = 0;
        read_lines(path, limits.max_name_bytes, |number, line| {
            if recorded >= limits.max_entries {
                log::warn!(
                    "{}: more than {} entries, ignoring line {number} onward",
                    path.display(),
                    limits.max_entries
                );
                return ControlFlow::Break(());
            }
            match line {
                Line::Text(name) if name.is_empty() => {}
                Line::Text(name) => {
                    partitions.insert(name);
                    recorded += 1;
                }
                Line::TooLong(len) => log::warn!(
                    "{}:{number}: partition name of {len} bytes exceeds {} byte limit, skipped",
                    path.display(),
                    limits.max_name_bytes
                ),
                Line::Invalid => log::warn!(
                    "{}:{number}: partition name is not valid UTF-8, skipped",
                    path.display()
                ),
            }
            ControlFlow::Continue(())
        })?;
        Ok(Self { partitions })
    }

    /// Exact, case-sensitive membership.
    pub fn contains(&self, partition: &str) -> bool {
        self.partitions.contains(partition)
    }

    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for PartitionAllowlist {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            partitions: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// [`PartitionGrant`] backed by the allowlist file. Ignores the group.
pub struct AllowlistSource {
    cache: Cached<PartitionAllowlist>,
    limits: AllowlistLimits,
}

impl AllowlistSource {
    pub fn new(path: impl Into<PathBuf>, limits: AllowlistLimits, reload: Reload) -> Self {
        Self {
            cache: Cached::new(path, reload),
            limits,
        }
    }

    pub fn from_config(config: &AllowlistConfig, reload: Reload) -> Self {
        Self::new(
            config.expanded_path(),
            AllowlistLimits {
                max_entries: config.max_entries,
                max_name_bytes: config.max_name_bytes,
            },
            reload,
        )
    }
}

impl PartitionGrant for AllowlistSource {
    fn name(&self) -> &str {
        "allowlist"
    }

    fn grants(&self, _group: u32, partition: &str) -> Result<bool, GateError> {
        let limits = self.limits;
        match self.cache.get(|p| PartitionAllowlist::load(p, limits)) {
            Ok(list) => Ok(list.contains(partition)),
            Err(e) if e.is_internal() => Err(e),
            Err(e) => {
                log::warn!("failed to read allowed partitions, granting nothing: {e}");
                Ok(false)
            }
        }
    }
}
