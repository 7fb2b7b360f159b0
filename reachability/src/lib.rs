//! Reachability probing for remote MCP endpoints.
//!
//! Splits into two halves:
//! - [`probe`]: a bounded HEAD+GET prober that classifies status codes
//!   under a [`ReachabilityPolicy`]
//! - [`scheduler`]: tier-based candidate selection over the latest catalog
//!   with serialized, rate-limited probes
//!
//! Probe failures are never fatal; the scheduler records `{ok: false}` and
//! moves on.

mod policy;
mod probe;
mod scheduler;

pub use policy::ReachabilityPolicy;
pub use probe::{ProbeError, ProbeOutcome, Prober, UrlProber};
pub use scheduler::{Candidate, RefreshOptions, RefreshReport, refresh};

/// Per-probe timeout the deployment uses unless overridden.
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 5000;
