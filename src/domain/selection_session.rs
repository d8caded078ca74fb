//! Selection session state machine
//!
//! Host-side mirror of the marking session that lives inside the content
//! surface. It is pure: no I/O, no clocks beyond `started_at`. Every exit to
//! `Idle` advances the generation so late results from an earlier session can
//! be recognized and dropped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

/// 세션 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum SessionMode {
    Idle,
    Active,
    /// Active session with a commit in flight (decision pending or save running).
    Resolving,
}

impl SessionMode {
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Active | Self::Resolving)
    }
}

/// Monotonic token identifying one run of the session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionGeneration(u64);

impl SessionGeneration {
    #[must_use]
    const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }

    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionTransitionError {
    #[error("a selection session is already active")]
    AlreadyActive,

    #[error("a duplicate decision is still pending")]
    DecisionPending,

    #[error("no selection session is active")]
    NotActive,

    #[error("invalid transition from {from:?} for {operation}")]
    InvalidTransition {
        from: SessionMode,
        operation: &'static str,
    },

    #[error("stale session generation {stale}, current is {current}")]
    StaleGeneration {
        stale: SessionGeneration,
        current: SessionGeneration,
    },
}

#[derive(Debug, Clone)]
pub struct SelectionSession {
    session_id: Option<Uuid>,
    mode: SessionMode,
    chosen: BTreeSet<String>,
    last_synced_count: usize,
    generation: SessionGeneration,
    started_at: Option<DateTime<Utc>>,
}

impl Default for SelectionSession {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionSession {
    pub const fn new() -> Self {
        Self {
            session_id: None,
            mode: SessionMode::Idle,
            chosen: BTreeSet::new(),
            last_synced_count: 0,
            generation: SessionGeneration(0),
            started_at: None,
        }
    }

    pub const fn mode(&self) -> SessionMode {
        self.mode
    }

    pub const fn generation(&self) -> SessionGeneration {
        self.generation
    }

    pub const fn session_id(&self) -> Option<Uuid> {
        self.session_id
    }

    pub const fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Last reconciled copy of the surface selection. Advisory only.
    pub const fn chosen(&self) -> &BTreeSet<String> {
        &self.chosen
    }

    pub const fn last_synced_count(&self) -> usize {
        self.last_synced_count
    }

    /// `Idle -> Active`. Returns the generation of the new session.
    pub fn begin_mark(&mut self) -> Result<SessionGeneration, SessionTransitionError> {
        match self.mode {
            SessionMode::Idle => {
                self.generation = self.generation.next();
                self.mode = SessionMode::Active;
                self.session_id = Some(Uuid::new_v4());
                self.started_at = Some(Utc::now());
                self.chosen.clear();
                self.last_synced_count = 0;
                Ok(self.generation)
            }
            SessionMode::Active => Err(SessionTransitionError::AlreadyActive),
            SessionMode::Resolving => Err(SessionTransitionError::DecisionPending),
        }
    }

    /// Replace the host copy with the authoritative surface selection.
    pub fn reconcile<I, S>(
        &mut self,
        generation: SessionGeneration,
        selection: I,
    ) -> Result<usize, SessionTransitionError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ensure_current(generation)?;
        if !self.mode.is_active() {
            return Err(SessionTransitionError::NotActive);
        }
        self.chosen = selection.into_iter().map(Into::into).collect();
        self.last_synced_count = self.chosen.len();
        Ok(self.last_synced_count)
    }

    /// `Active -> Resolving`.
    pub fn begin_resolving(
        &mut self,
        generation: SessionGeneration,
    ) -> Result<(), SessionTransitionError> {
        self.ensure_current(generation)?;
        match self.mode {
            SessionMode::Active => {
                self.mode = SessionMode::Resolving;
                Ok(())
            }
            from => Err(SessionTransitionError::InvalidTransition {
                from,
                operation: "begin_resolving",
            }),
        }
    }

    /// `Resolving -> Active`, used when a commit is dismissed or fails.
    pub fn resume_marking(
        &mut self,
        generation: SessionGeneration,
    ) -> Result<(), SessionTransitionError> {
        self.ensure_current(generation)?;
        match self.mode {
            SessionMode::Resolving => {
                self.mode = SessionMode::Active;
                Ok(())
            }
            from => Err(SessionTransitionError::InvalidTransition {
                from,
                operation: "resume_marking",
            }),
        }
    }

    /// `Resolving -> Idle` after a successful commit.
    pub fn complete(&mut self, generation: SessionGeneration) -> Result<(), SessionTransitionError> {
        self.ensure_current(generation)?;
        match self.mode {
            SessionMode::Resolving => {
                self.reset();
                Ok(())
            }
            from => Err(SessionTransitionError::InvalidTransition {
                from,
                operation: "complete",
            }),
        }
    }

    /// `Active -> Idle` when the surface could not be prepared.
    pub fn revert_failed_injection(
        &mut self,
        generation: SessionGeneration,
    ) -> Result<(), SessionTransitionError> {
        self.ensure_current(generation)?;
        match self.mode {
            SessionMode::Active => {
                self.reset();
                Ok(())
            }
            from => Err(SessionTransitionError::InvalidTransition {
                from,
                operation: "revert_failed_injection",
            }),
        }
    }

    /// Any active phase `-> Idle`. Returns the abandoned generation, or `None`
    /// when there was nothing to abandon.
    pub fn abandon(&mut self) -> Option<SessionGeneration> {
        if !self.mode.is_active() {
            return None;
        }
        let abandoned = self.generation;
        self.reset();
        Some(abandoned)
    }

    /// Record a polled display count. Late results are refused.
    pub fn record_display_count(&mut self, generation: SessionGeneration, count: usize) -> bool {
        if generation != self.generation || !self.mode.is_active() {
            return false;
        }
        self.last_synced_count = count;
        true
    }

    fn ensure_current(&self, generation: SessionGeneration) -> Result<(), SessionTransitionError> {
        if generation == self.generation {
            Ok(())
        } else {
            Err(SessionTransitionError::StaleGeneration {
                stale: generation,
                current: self.generation,
            })
        }
    }

    fn reset(&mut self) {
        self.mode = SessionMode::Idle;
        self.generation = self.generation.next();
        self.session_id = None;
        self.started_at = None;
        self.chosen.clear();
        self.last_synced_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_mark_moves_idle_to_active() {
        let mut session = SelectionSession::new();
        let generation = session.begin_mark().unwrap();
        assert_eq!(session.mode(), SessionMode::Active);
        assert_eq!(session.generation(), generation);
        assert!(session.session_id().is_some());
    }

    #[test]
    fn second_begin_mark_is_refused() {
        let mut session = SelectionSession::new();
        let generation = session.begin_mark().unwrap();
        assert_eq!(session.begin_mark(), Err(SessionTransitionError::AlreadyActive));
        assert_eq!(session.generation(), generation);

        session.begin_resolving(generation).unwrap();
        assert_eq!(session.begin_mark(), Err(SessionTransitionError::DecisionPending));
    }

    #[test]
    fn commit_cycle_returns_to_idle() {
        let mut session = SelectionSession::new();
        let generation = session.begin_mark().unwrap();
        assert_eq!(session.reconcile(generation, ["a", "b", "a"]), Ok(2));
        session.begin_resolving(generation).unwrap();
        session.complete(generation).unwrap();

        assert_eq!(session.mode(), SessionMode::Idle);
        assert!(session.chosen().is_empty());
        assert_eq!(session.last_synced_count(), 0);
        assert_ne!(session.generation(), generation);
    }

    #[test]
    fn dismissed_commit_resumes_marking() {
        let mut session = SelectionSession::new();
        let generation = session.begin_mark().unwrap();
        session.begin_resolving(generation).unwrap();
        session.resume_marking(generation).unwrap();
        assert_eq!(session.mode(), SessionMode::Active);
        assert_eq!(session.generation(), generation);
    }

    #[test]
    fn abandon_is_noop_when_idle() {
        let mut session = SelectionSession::new();
        assert_eq!(session.abandon(), None);
        let before = session.generation();
        assert_eq!(session.abandon(), None);
        assert_eq!(session.generation(), before);
    }

    #[test]
    fn late_poll_results_are_discarded_after_abandon() {
        let mut session = SelectionSession::new();
        let generation = session.begin_mark().unwrap();
        assert!(session.record_display_count(generation, 3));
        assert_eq!(session.abandon(), Some(generation));

        assert!(!session.record_display_count(generation, 7));
        assert_eq!(session.last_synced_count(), 0);

        let next = session.begin_mark().unwrap();
        assert!(!session.record_display_count(generation, 9));
        assert!(session.record_display_count(next, 1));
    }

    #[test]
    fn stale_generation_cannot_complete_new_session() {
        let mut session = SelectionSession::new();
        let first = session.begin_mark().unwrap();
        session.abandon();
        let second = session.begin_mark().unwrap();
        session.begin_resolving(second).unwrap();

        assert!(matches!(
            session.complete(first),
            Err(SessionTransitionError::StaleGeneration { .. })
        ));
        assert_eq!(session.mode(), SessionMode::Resolving);
    }

    #[test]
    fn failed_injection_reverts_to_idle() {
        let mut session = SelectionSession::new();
        let generation = session.begin_mark().unwrap();
        session.revert_failed_injection(generation).unwrap();
        assert_eq!(session.mode(), SessionMode::Idle);
    }
}
