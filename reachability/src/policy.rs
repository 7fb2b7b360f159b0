//! Mapping from observed HTTP status codes to reachable/unreachable.

use std::str::FromStr;

/// Status classification policy, selectable per deployment.
///
/// `strict` treats auth walls (401/403), method rejections (405) and rate
/// limits (429) as reachable; `loose` additionally accepts any 4xx that is
/// not 404 or 410.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReachabilityPolicy {
    Strict,
    Loose,
}

impl ReachabilityPolicy {
    pub fn classify(self, status: u16) -> bool {
        let strict = matches!(status, 200..=399 | 401 | 403 | 405 | 429);
        match self {
            ReachabilityPolicy::Strict => strict,
            ReachabilityPolicy::Loose => {
                strict || matches!(status, 400..=499 if status != 404 && status != 410)
            }
        }
    }
}

impl FromStr for ReachabilityPolicy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "strict" => Ok(ReachabilityPolicy::Strict),
            "loose" => Ok(ReachabilityPolicy::Loose),
            _ => Err(()),
        }
    }
}
