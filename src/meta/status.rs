//! Work item lifecycle

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Processing status of a video
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    New,
    Processing,
    Analyzed,
    Error,
}

impl Status {
    pub const ALL: [Status; 4] = [
        Status::New,
        Status::Processing,
        Status::Analyzed,
        Status::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::New => "new",
            Status::Processing => "processing",
            Status::Analyzed => "analyzed",
            Status::Error => "error",
        }
    }

    /// Whether the item waits for an explicit sweep before it can run again
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Analyzed | Status::Error)
    }

    /// Whether `self -> next` is a legal lifecycle step.
    ///
    /// Claims move `New` to `Processing`, commits move `Processing` to a
    /// terminal state, and the two sweeps move `Processing` (stale) or
    /// `Error` back to `New`. A terminal item may be re-committed with the
    /// same outcome, so a repeated save stays an idempotent replace, but it
    /// never flips to the other terminal state.
    pub fn can_transition_to(&self, next: Status) -> bool {
        use Status::*;
        matches!(
            (self, next),
            (New, Processing)
                | (Processing, Analyzed)
                | (Processing, Error)
                | (Processing, New)
                | (Error, New)
                | (Analyzed, Analyzed)
                | (Error, Error)
        )
    }

    /// Terminal status for a commit, given whether a full result exists
    pub fn for_commit(has_result: bool) -> Status {
        if has_result {
            Status::Analyzed
        } else {
            Status::Error
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Status {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "new" => Ok(Status::New),
            "processing" => Ok(Status::Processing),
            "analyzed" => Ok(Status::Analyzed),
            "error" => Ok(Status::Error),
            _ => Err(Error::Config(format!("Unknown video status: {}", s))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_names() {
        for status in Status::ALL {
            assert_eq!(status.as_str().parse::<Status>().unwrap(), status);
        }
        assert!("done".parse::<Status>().is_err());
    }

    #[test]
    fn test_claim_only_from_new() {
        assert!(Status::New.can_transition_to(Status::Processing));
        assert!(!Status::Error.can_transition_to(Status::Processing));
        assert!(!Status::Analyzed.can_transition_to(Status::Processing));
        assert!(!Status::Processing.can_transition_to(Status::Processing));
    }

    #[test]
    fn test_new_cannot_jump_to_terminal() {
        assert!(!Status::New.can_transition_to(Status::Analyzed));
        assert!(!Status::New.can_transition_to(Status::Error));
    }

    #[test]
    fn test_analyzed_is_not_swept() {
        assert!(Status::Analyzed.is_terminal());
        assert!(!Status::Analyzed.can_transition_to(Status::New));
        assert!(Status::Error.can_transition_to(Status::New));
        assert!(Status::Processing.can_transition_to(Status::New));
    }

    #[test]
    fn test_terminal_states_do_not_flip() {
        assert!(Status::Analyzed.can_transition_to(Status::Analyzed));
        assert!(Status::Error.can_transition_to(Status::Error));
        assert!(!Status::Analyzed.can_transition_to(Status::Error));
        assert!(!Status::Error.can_transition_to(Status::Analyzed));
    }

    #[test]
    fn test_commit_status() {
        assert_eq!(Status::for_commit(true), Status::Analyzed);
        assert_eq!(Status::for_commit(false), Status::Error);
    }
}
