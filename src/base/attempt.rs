//! Tracking of the most recent resolution attempt.
//!
//! A single failed call explains itself through its `NetError`. Callers that
//! keep re-resolving a target also want to answer "why has this name not
//! resolved yet", which needs the last diagnostic and when it was observed.

use crate::base::neterror::NetError;
use std::fmt;
use std::sync::{Mutex, PoisonError};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Outcome of the last finished attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LastAttempt {
    Succeeded { at: OffsetDateTime, count: usize },
    Failed { at: OffsetDateTime, error: NetError },
}

impl LastAttempt {
    pub fn at(&self) -> OffsetDateTime {
        match self {
            LastAttempt::Succeeded { at, .. } | LastAttempt::Failed { at, .. } => *at,
        }
    }
}

impl fmt::Display for LastAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let at = self.at();
        let stamp = at
            .format(&Rfc3339)
            .unwrap_or_else(|_| at.unix_timestamp().to_string());
        match self {
            LastAttempt::Succeeded { count, .. } => {
                write!(f, "resolved {} address(es) at {}", count, stamp)
            }
            LastAttempt::Failed { error, .. } => write!(f, "failed at {}: {}", stamp, error),
        }
    }
}

#[derive(Debug, Default)]
struct AttemptState {
    last: Option<LastAttempt>,
    last_error: Option<(OffsetDateTime, NetError)>,
    started: u64,
}

/// Thread-safe record of resolution attempts for one context.
#[derive(Debug, Default)]
pub struct ResolutionAttempts {
    state: Mutex<AttemptState>,
}

impl ResolutionAttempts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_start(&self) {
        self.lock().started += 1;
    }

    pub fn record_success(&self, count: usize) {
        let mut state = self.lock();
        state.last = Some(LastAttempt::Succeeded {
            at: OffsetDateTime::now_utc(),
            count,
        });
    }

    pub fn record_failure(&self, error: &NetError) {
        let now = OffsetDateTime::now_utc();
        let mut state = self.lock();
        state.last = Some(LastAttempt::Failed {
            at: now,
            error: error.clone(),
        });
        state.last_error = Some((now, error.clone()));
    }

    /// Outcome of the most recently finished attempt, if any.
    pub fn last_attempt(&self) -> Option<LastAttempt> {
        self.lock().last.clone()
    }

    /// The most recent failure and when it happened, even if a later
    /// attempt succeeded.
    pub fn last_error(&self) -> Option<(OffsetDateTime, NetError)> {
        self.lock().last_error.clone()
    }

    pub fn started(&self) -> u64 {
        self.lock().started
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, AttemptState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
