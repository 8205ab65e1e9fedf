//! Error types for the deliberation core.
//!
//! One variant per failure class named in the error-handling design: broker
//! failures, embedding failures, checkpoint failures, validation failures,
//! safety aborts, and invariant violations, plus the two caller-facing
//! failure modes (`SessionNotFound`, `InvalidOptions`). Runtime errors that
//! occur mid-deliberation are *not* propagated to the caller as `Err` — the
//! owning node applies the documented default and emits an `error` event
//! (see `events::Event::Error`). `Error` is reserved for `start`/`resume`/
//! `status` call failures and for the small number of fatal paths
//! (`CheckpointError`, `SafetyAbort`) that must unwind the session.

use std::fmt;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Kind of transient or permanent LLM broker failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerErrorKind {
    /// The call did not complete within the broker's deadline.
    Timeout,
    /// The broker's rate limiter rejected or delayed the call past retry budget.
    RateLimited,
    /// The model's response could not be parsed into the requested structured format.
    Malformed,
    /// The upstream provider returned an error (5xx, auth failure, etc.).
    Upstream,
}

impl fmt::Display for BrokerErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Timeout => "timeout",
            Self::RateLimited => "rate_limited",
            Self::Malformed => "malformed",
            Self::Upstream => "upstream",
        };
        f.write_str(s)
    }
}

/// Reason a safety mechanism terminated or force-progressed a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafetyAbortKind {
    /// Graph step count exceeded `max_steps`.
    Recursion,
    /// Accumulated cost exceeded `max_cost`.
    Budget,
    /// Wall-clock elapsed exceeded `max_duration` with no recoverable partial.
    Timeout,
    /// The cycle detector observed the same signature recur past its limit.
    Cycle,
    /// A user or admin kill flag was observed.
    Kill,
}

impl fmt::Display for SafetyAbortKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Recursion => "recursion",
            Self::Budget => "budget",
            Self::Timeout => "timeout",
            Self::Cycle => "cycle",
            Self::Kill => "kill",
        };
        f.write_str(s)
    }
}

/// Top-level error type for the deliberation core.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The LLM broker exhausted its retry budget.
    #[error("broker call failed ({kind}) for agent `{agent}`: {message}")]
    Broker {
        /// Which failure mode the broker reported.
        kind: BrokerErrorKind,
        /// The agent label attached to the failing request (e.g. "judge", "persona:strategist").
        agent: String,
        /// Human-readable detail from the broker.
        message: String,
    },

    /// The embedding service failed; callers should fall back to unfiltered dedup.
    #[error("embedding call failed: {0}")]
    Embedding(String),

    /// The checkpoint store failed to durably persist or load state.
    ///
    /// Fatal for progress: the driver must abort with `terminal(reason=error)`
    /// rather than continue on an unpersisted state (spec §7).
    #[error("checkpoint store error for session {session_id} step {step_id}: {message}")]
    Checkpoint {
        /// Session the checkpoint belongs to.
        session_id: String,
        /// Monotonic step id within the session.
        step_id: u64,
        /// Detail from the underlying store.
        message: String,
    },

    /// Structured LLM output was malformed after the agent's retry budget.
    ///
    /// Handled node-locally with a documented default; surfaced here only so
    /// the corresponding `error` event can carry a typed cause.
    #[error("validation failed for `{agent}`: {message}")]
    Validation {
        /// Which agent produced the malformed output.
        agent: String,
        /// What was wrong with it.
        message: String,
    },

    /// A safety mechanism aborted or force-progressed the session.
    #[error("safety abort ({kind}): {message}")]
    SafetyAbort {
        /// Which mechanism fired.
        kind: SafetyAbortKind,
        /// Human-readable detail.
        message: String,
    },

    /// An invariant was violated and corrected in-place with a deterministic
    /// fallback (e.g. `next_speaker` absent from the roster). Never surfaced
    /// as a fatal error to callers; logged and recorded in an `error` event.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// `status`/`pause`/`resume`/`kill` referenced a session that does not exist.
    #[error("no such session: {0}")]
    SessionNotFound(String),

    /// `start` was called with malformed or contradictory options.
    #[error("invalid options: {0}")]
    InvalidOptions(String),
}

impl Error {
    /// Build a [`Error::Broker`] from a broker error kind.
    pub fn broker(kind: BrokerErrorKind, agent: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Broker {
            kind,
            agent: agent.into(),
            message: message.into(),
        }
    }

    /// Build a [`Error::Checkpoint`].
    pub fn checkpoint(session_id: impl Into<String>, step_id: u64, message: impl Into<String>) -> Self {
        Self::Checkpoint {
            session_id: session_id.into(),
            step_id,
            message: message.into(),
        }
    }

    /// Build a [`Error::Validation`].
    pub fn validation(agent: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            agent: agent.into(),
            message: message.into(),
        }
    }

    /// Build a [`Error::SafetyAbort`].
    pub fn safety_abort(kind: SafetyAbortKind, message: impl Into<String>) -> Self {
        Self::SafetyAbort {
            kind,
            message: message.into(),
        }
    }

    /// True if this error kind is one that should always be accompanied by a
    /// terminal event and a final checkpoint (spec §7 propagation policy).
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Checkpoint { .. } | Self::SafetyAbort { .. })
    }
}
