//! Core types for modloc

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Source language code for the whole system.
///
/// All translatable content units are authored in English; providers receive
/// this as the source side of every request.
pub const SOURCE_LANGUAGE: &str = "EN";

/// Maximum number of batch-level retries before a batch is permanently failed.
pub const MAX_BATCH_RETRIES: u32 = 3;

/// Defines an `i64`-backed identifier newtype with database bindings.
///
/// Generated ids behave like the raw row id for display and conversion
/// purposes while keeping distinct id spaces apart at the type level.
macro_rules! row_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            /// Create a new id from a raw row id
            pub fn new(id: i64) -> Self {
                Self(id)
            }

            /// Get the inner i64 value
            pub fn get(&self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl sqlx::Type<sqlx::Sqlite> for $name {
            fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
                <i64 as sqlx::Type<sqlx::Sqlite>>::type_info()
            }

            fn compatible(ty: &sqlx::sqlite::SqliteTypeInfo) -> bool {
                <i64 as sqlx::Type<sqlx::Sqlite>>::compatible(ty)
            }
        }

        impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for $name {
            fn encode_by_ref(
                &self,
                buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
            ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
                sqlx::Encode::<sqlx::Sqlite>::encode_by_ref(&self.0, buf)
            }
        }

        impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for $name {
            fn decode(
                value: sqlx::sqlite::SqliteValueRef<'r>,
            ) -> Result<Self, sqlx::error::BoxDynError> {
                let id = <i64 as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
                Ok(Self(id))
            }
        }
    };
}

row_id! {
    /// Unique identifier for a translation batch
    BatchId
}
row_id! {
    /// Unique identifier for a translatable content unit
    UnitId
}
row_id! {
    /// Unique identifier for a project
    ProjectId
}
row_id! {
    /// Unique identifier for a project-language pair
    ProjectLanguageId
}
row_id! {
    /// Unique identifier for a language
    LanguageId
}
row_id! {
    /// Unique identifier for a glossary
    GlossaryId
}

impl PartialEq<i64> for BatchId {
    fn eq(&self, other: &i64) -> bool {
        self.0 == *other
    }
}

impl PartialEq<BatchId> for i64 {
    fn eq(&self, other: &BatchId) -> bool {
        *self == other.0
    }
}

impl std::str::FromStr for BatchId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Unique identifier for a lifecycle event
///
/// Assigned from a monotonic per-engine counter; consumers use it to
/// deduplicate at-least-once delivery across multiple subscriptions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub u64);

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Batch lifecycle status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    /// Planned and waiting to start
    Pending,
    /// Currently dispatching units to the provider
    Translating,
    /// Suspended by user; resumable
    Paused,
    /// All units terminal (a non-zero failed count is still Completed)
    Completed,
    /// Batch-level failure; retryable while the retry budget lasts
    Failed,
    /// Cancelled by user before all units were processed
    Cancelled,
}

impl BatchStatus {
    /// Convert integer status code to BatchStatus enum
    pub fn from_i32(status: i32) -> Self {
        match status {
            0 => BatchStatus::Pending,
            1 => BatchStatus::Translating,
            2 => BatchStatus::Paused,
            3 => BatchStatus::Completed,
            4 => BatchStatus::Failed,
            5 => BatchStatus::Cancelled,
            _ => BatchStatus::Failed, // Default to Failed for unknown status
        }
    }

    /// Convert BatchStatus enum to integer status code
    pub fn to_i32(&self) -> i32 {
        match self {
            BatchStatus::Pending => 0,
            BatchStatus::Translating => 1,
            BatchStatus::Paused => 2,
            BatchStatus::Completed => 3,
            BatchStatus::Failed => 4,
            BatchStatus::Cancelled => 5,
        }
    }

    /// Whether this status ends an execution (Completed, Failed, or Cancelled)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BatchStatus::Completed | BatchStatus::Failed | BatchStatus::Cancelled
        )
    }

    /// Whether the state machine permits moving from this status to `next`.
    ///
    /// `Failed -> Translating` is the batch-level retry edge; Completed and
    /// Cancelled admit no outgoing transitions.
    pub fn can_transition_to(&self, next: BatchStatus) -> bool {
        use BatchStatus::*;
        matches!(
            (self, next),
            (Pending, Translating)
                | (Pending, Cancelled)
                | (Translating, Paused)
                | (Translating, Completed)
                | (Translating, Failed)
                | (Translating, Cancelled)
                | (Paused, Translating)
                | (Paused, Cancelled)
                | (Failed, Translating)
        )
    }
}

/// Per-unit ledger status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitStatus {
    /// Not yet attempted (or deliberately reset for a batch retry)
    Pending,
    /// Translated and persisted
    Completed,
    /// Provider rejected or garbled this unit; siblings are unaffected
    Failed,
}

impl UnitStatus {
    /// Convert integer status code to UnitStatus enum
    pub fn from_i32(status: i32) -> Self {
        match status {
            0 => UnitStatus::Pending,
            1 => UnitStatus::Completed,
            2 => UnitStatus::Failed,
            _ => UnitStatus::Failed, // Default to Failed for unknown status
        }
    }

    /// Convert UnitStatus enum to integer status code
    pub fn to_i32(&self) -> i32 {
        match self {
            UnitStatus::Pending => 0,
            UnitStatus::Completed => 1,
            UnitStatus::Failed => 2,
        }
    }

    /// Whether the unit has been attempted (Completed or Failed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, UnitStatus::Completed | UnitStatus::Failed)
    }
}

/// A lifecycle event with its delivery metadata.
///
/// Events are delivered at-least-once to every subscriber; `id` is the
/// deduplication key, `timestamp` the emission time.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BatchEvent {
    /// Unique event identifier (monotonic within one engine instance)
    pub id: EventId,

    /// When the event was emitted
    pub timestamp: DateTime<Utc>,

    /// What happened
    #[serde(flatten)]
    pub kind: EventKind,
}

/// Event emitted during batch lifecycle
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// Batch execution started (emitted once per execution, including retries)
    BatchStarted {
        /// Batch ID
        batch_id: BatchId,
        /// Owning project-language
        project_language_id: ProjectLanguageId,
        /// Provider the units are dispatched to
        provider_id: String,
        /// Batch number within the project-language (1-based)
        batch_number: i64,
        /// Total number of units in the batch
        total_units: u64,
    },

    /// Progress update after a unit or chunk completes
    BatchProgress {
        /// Batch ID
        batch_id: BatchId,
        /// Total number of units in the batch
        total_units: u64,
        /// Units translated so far
        completed_units: u64,
        /// Units that failed so far
        failed_units: u64,
    },

    /// Batch reached all-units-terminal (failures allowed; see `has_failures`)
    BatchCompleted {
        /// Batch ID
        batch_id: BatchId,
        /// Owning project-language
        project_language_id: ProjectLanguageId,
        /// Batch number within the project-language (1-based)
        batch_number: i64,
        /// Total number of units in the batch
        total_units: u64,
        /// Units translated
        completed_units: u64,
        /// Units that failed
        failed_units: u64,
        /// Wall-clock duration of this execution
        processing_duration: Duration,
    },

    /// Batch-level failure (provider unreachable, auth failure, retry budget spent)
    BatchFailed {
        /// Batch ID
        batch_id: BatchId,
        /// Owning project-language
        project_language_id: ProjectLanguageId,
        /// Batch number within the project-language (1-based)
        batch_number: i64,
        /// Error message
        error: String,
        /// Units that had completed before the failure
        completed_before_failure: u64,
        /// Total number of units in the batch
        total_units: u64,
        /// Batch-level retries consumed so far
        retry_count: u32,
    },

    /// Batch paused by user
    BatchPaused {
        /// Batch ID
        batch_id: BatchId,
        /// Owning project-language
        project_language_id: ProjectLanguageId,
        /// Units translated so far
        completed_units: u64,
        /// Total number of units in the batch
        total_units: u64,
    },

    /// Batch resumed by user
    BatchResumed {
        /// Batch ID
        batch_id: BatchId,
        /// Owning project-language
        project_language_id: ProjectLanguageId,
        /// Units translated so far
        completed_units: u64,
        /// Total number of units in the batch
        total_units: u64,
    },

    /// Batch cancelled; already-completed units keep their results
    BatchCancelled {
        /// Batch ID
        batch_id: BatchId,
        /// Owning project-language
        project_language_id: ProjectLanguageId,
        /// Units translated before cancellation
        completed_units: u64,
        /// Total number of units in the batch
        total_units: u64,
        /// Why the batch was cancelled
        reason: String,
    },
}

impl EventKind {
    /// The batch this event correlates to
    pub fn batch_id(&self) -> BatchId {
        match self {
            EventKind::BatchStarted { batch_id, .. }
            | EventKind::BatchProgress { batch_id, .. }
            | EventKind::BatchCompleted { batch_id, .. }
            | EventKind::BatchFailed { batch_id, .. }
            | EventKind::BatchPaused { batch_id, .. }
            | EventKind::BatchResumed { batch_id, .. }
            | EventKind::BatchCancelled { batch_id, .. } => *batch_id,
        }
    }

    /// Progress percentage for `BatchProgress` (0.0 when the batch is empty)
    pub fn progress_percent(&self) -> Option<f32> {
        match self {
            EventKind::BatchProgress {
                total_units,
                completed_units,
                ..
            } => Some(percent(*completed_units, *total_units)),
            _ => None,
        }
    }

    /// Units not yet attempted for `BatchProgress`
    pub fn remaining_units(&self) -> Option<u64> {
        match self {
            EventKind::BatchProgress {
                total_units,
                completed_units,
                failed_units,
                ..
            } => Some(total_units.saturating_sub(completed_units + failed_units)),
            _ => None,
        }
    }

    /// Success percentage for `BatchCompleted` (0.0 when the batch is empty)
    pub fn success_rate(&self) -> Option<f32> {
        match self {
            EventKind::BatchCompleted {
                total_units,
                completed_units,
                ..
            } => Some(percent(*completed_units, *total_units)),
            _ => None,
        }
    }

    /// Whether a `BatchCompleted` batch had any failed units
    pub fn has_failures(&self) -> Option<bool> {
        match self {
            EventKind::BatchCompleted { failed_units, .. } => Some(*failed_units > 0),
            _ => None,
        }
    }

    /// Whether a `BatchFailed` batch may still be retried
    pub fn can_retry(&self) -> Option<bool> {
        match self {
            EventKind::BatchFailed { retry_count, .. } => Some(*retry_count < MAX_BATCH_RETRIES),
            _ => None,
        }
    }
}

fn percent(part: u64, total: u64) -> f32 {
    if total == 0 {
        0.0
    } else {
        part as f32 / total as f32 * 100.0
    }
}

/// Inspectable snapshot of a batch and its unit counts
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BatchInfo {
    /// Batch ID
    pub id: BatchId,

    /// Owning project-language
    pub project_language_id: ProjectLanguageId,

    /// Provider the batch dispatches to
    pub provider_id: String,

    /// Batch number within the project-language (1-based, never reused)
    pub batch_number: i64,

    /// Current status
    pub status: BatchStatus,

    /// Total number of units
    pub total_units: u64,

    /// Units translated
    pub completed_units: u64,

    /// Units that failed
    pub failed_units: u64,

    /// Batch-level retries consumed
    pub retry_count: u32,

    /// Error message of the most recent batch-level failure
    pub error_message: Option<String>,

    /// When the batch was planned
    pub created_at: DateTime<Utc>,

    /// When the first execution started (None if never started)
    pub started_at: Option<DateTime<Utc>>,

    /// When the batch reached a terminal status (None while live)
    pub completed_at: Option<DateTime<Utc>>,
}

impl BatchInfo {
    /// Whether this batch may still be retried
    pub fn can_retry(&self) -> bool {
        self.status == BatchStatus::Failed && self.retry_count < MAX_BATCH_RETRIES
    }

    /// Whether any unit of this batch has failed
    pub fn has_failures(&self) -> bool {
        self.failed_units > 0
    }
}
