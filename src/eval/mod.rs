pub mod context;
pub mod decision;

pub use context::SubmissionRequest;
pub use decision::{Decision, RuleMatch};

use std::path::PathBuf;

use crate::classify::Classifier;
use crate::config::Config;
use crate::error::GateError;
use crate::sources::PartitionGrant;
use crate::sources::allowlist::AllowlistSource;
use crate::sources::group_map::GroupMapSource;

/// The submission gate: classifier plus an ordered list of grant sources.
///
/// Stateless apart from the sources' file caches, so one `Gate` can serve
/// concurrent submissions through `&self`.
pub struct Gate {
    classifier: Classifier,
    predicates: Vec<Box<dyn PartitionGrant>>,
    decision_log: Option<PathBuf>,
}

impl Gate {
    pub fn new(classifier: Classifier, predicates: Vec<Box<dyn PartitionGrant>>) -> Self {
        Self {
            classifier,
            predicates,
            decision_log: None,
        }
    }

    /// Build the gate from configuration: the global allowlist is asked
    /// first, then the group-partition map.
    pub fn from_config(config: &Config) -> Self {
        let reload = config.settings.reload;
        let predicates: Vec<Box<dyn PartitionGrant>> = vec![
            Box::new(AllowlistSource::from_config(&config.allowlist, reload)),
            Box::new(GroupMapSource::from_config(&config.group_map, reload)),
        ];

        let mut gate = Self::new(
            Classifier::new(config.classifier.indicators.iter().cloned()),
            predicates,
        );
        if !config.settings.decision_log.is_empty() {
            gate.decision_log = Some(crate::config::expand_path(&config.settings.decision_log));
        }
        gate
    }

    /// Append every `job_submit` verdict to `path`.
    pub fn set_decision_log(&mut self, path: Option<PathBuf>) {
        self.decision_log = path;
    }

    /// Decide a submission.
    ///
    /// Non-interactive submissions are allowed without touching any source.
    /// Interactive ones are allowed iff some source grants the partition to
    /// the submitting group. `Err` means an operational fault, never a denial.
    pub fn evaluate(&self, req: &SubmissionRequest) -> Result<RuleMatch, GateError> {
        if !self.classifier.is_restricted(req.submit_line()) {
            log::info!(
                "sbatch/srun processed {} for userid {} on partition {}",
                req.submit_line().unwrap_or(""),
                req.user_id,
                req.partition_label()
            );
            return Ok(RuleMatch::allow("not an interactive allocation"));
        }

        // No partition named: nothing to match against any whitelist.
        let Some(partition) = req.partition() else {
            log::warn!(
                "salloc without explicit partition denied for uid:{} gid:{}",
                req.user_id,
                req.group_id
            );
            return Ok(RuleMatch::deny(
                "interactive allocations must name a permitted partition (-p)",
            ));
        };

        for source in &self.predicates {
            if source.grants(req.group_id, partition)? {
                log::info!(
                    "salloc processed for userid {} on partition {partition} (granted by {})",
                    req.user_id,
                    source.name()
                );
                return Ok(RuleMatch::allow(format!(
                    "partition {partition} granted by {}",
                    source.name()
                )));
            }
        }

        log::warn!(
            "salloc not allowed on partition {partition} for uid:{} gid:{}",
            req.user_id,
            req.group_id
        );
        Ok(RuleMatch::deny(format!(
            "interactive allocations are not permitted on partition {partition}"
        )))
    }

    /// Submission hook: [`evaluate`](Self::evaluate) with faults mapped to
    /// [`Decision::InternalError`] and the verdict recorded in the decision log.
    pub fn job_submit(&self, req: &SubmissionRequest) -> RuleMatch {
        let result = match self.evaluate(req) {
            Ok(m) => m,
            Err(e) => {
                log::error!(
                    "job_submit failed for uid:{} on partition {}: {e}",
                    req.user_id,
                    req.partition_label()
                );
                RuleMatch {
                    decision: Decision::InternalError,
                    reason: e.to_string(),
                }
            }
        };
        if let Some(path) = &self.decision_log {
            crate::logging::log_decision(path, req, &result);
        }
        result
    }

    /// Modify hook. Only administrators can modify jobs, so no policy applies.
    pub fn job_modify(&self, req: &SubmissionRequest) -> RuleMatch {
        log::debug!("job_modify by uid:{} passed through", req.user_id);
        RuleMatch::allow("job modification is not restricted")
    }
}
