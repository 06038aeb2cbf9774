//! salloc-gate: a Slurm job-submit gate for interactive allocations.
//!
//! Every submission passes through [`eval::Gate::job_submit`]. Submissions
//! whose command line looks like an interactive allocation (`salloc`, or a
//! job spawned by the Open OnDemand dashboard) are only allowed on partitions
//! granted by one of two admin-maintained whitelists; everything else passes
//! through untouched. The result is one of [`eval::Decision::Allow`],
//! [`eval::Decision::Deny`], or [`eval::Decision::InternalError`].
//!
//! # Architecture
//!
//! - **[`classify`]** — Submit-line classifier: fixed indicator substrings.
//! - **[`sources`]** — Whitelist sources: partition allowlist, group-partition map, file cache.
//! - **[`eval`]** — Decision engine: submission context, verdict types, the gate itself.
//! - **[`config`]** — Configuration loading: embedded defaults + site overlay merge.
//! - **[`logging`]** — stderr diagnostics and the tab-separated decision log.
//! - **[`error`]** — Error taxonomy separating inaccessible policy data from internal faults.

/// Submit-line classification.
pub mod classify;
/// Configuration types, loading, and overlay merge logic.
pub mod config;
/// Error types shared by sources and the gate.
pub mod error;
/// Decision engine: gate, verdicts, submission context.
pub mod eval;
/// Diagnostic logger setup and file-based decision logging.
pub mod logging;
/// Whitelist sources and the predicate trait they implement.
pub mod sources;

pub use error::GateError;
