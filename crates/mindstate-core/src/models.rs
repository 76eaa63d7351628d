//! Records persisted by the state store and the derived dashboard status.
//!
//! Every closed set of values (priorities, modes, statuses) is a text enum: it
//! serializes to its lowercase literal in JSON and is stored as the same literal
//! in SQLite.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

use crate::error::StateError;

macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = StateError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(StateError::Validation(format!(
                        "'{}' is not a valid {} (expected one of: {})",
                        other,
                        stringify!($name),
                        [$($text),+].join(", ")
                    ))),
                }
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e: StateError| FromSqlError::Other(Box::new(e)))
            }
        }
    };
}

text_enum!(
    /// Urgency / importance / loop priority.
    Priority { High => "high", Medium => "medium", Low => "low" }
);

text_enum!(
    /// Destination queue of an authorized loop.
    QueueType { Action => "action", Reference => "reference", Backburner => "backburner" }
);

text_enum!(
    ThreadMode { Foreground => "foreground", Background => "background" }
);

text_enum!(
    /// How a loop was closed.
    ClosureType { Done => "done", Paused => "paused", Abandoned => "abandoned" }
);

text_enum!(
    /// Derived High/Medium/Low classification used by the dashboard.
    LoadLevel { Low => "low", Medium => "medium", High => "high" }
);

text_enum!(
    PredictionDepth { Low => "low", Medium => "medium", Deep => "deep" }
);

text_enum!(LoopStatus { Open => "open", Closed => "closed" });
text_enum!(ThreadStatus { Active => "active", Terminated => "terminated" });
text_enum!(TaskStatus { Pending => "pending", Processed => "processed" });
text_enum!(IdeaStatus { Captured => "captured", Processed => "processed" });
text_enum!(PredictionStatus { Running => "running", Stopped => "stopped" });
text_enum!(SessionStatus { Active => "active", Completed => "completed" });
text_enum!(OffloadStatus { Pending => "pending", Processing => "processing", Completed => "completed" });

/// One persisted table per kind. Hard reset walks [`EntityKind::ALL`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Focus,
    Loop,
    Thread,
    Task,
    Idea,
    Archive,
    Prediction,
    EmotionalState,
    DecompressSession,
    AiOffload,
}

impl EntityKind {
    pub const ALL: [EntityKind; 10] = [
        EntityKind::Focus,
        EntityKind::Loop,
        EntityKind::Thread,
        EntityKind::Task,
        EntityKind::Idea,
        EntityKind::Archive,
        EntityKind::Prediction,
        EntityKind::EmotionalState,
        EntityKind::DecompressSession,
        EntityKind::AiOffload,
    ];

    pub fn table(&self) -> &'static str {
        match self {
            EntityKind::Focus => "focus_state",
            EntityKind::Loop => "loops",
            EntityKind::Thread => "threads",
            EntityKind::Task => "tasks",
            EntityKind::Idea => "ideas",
            EntityKind::Archive => "archives",
            EntityKind::Prediction => "predictions",
            EntityKind::EmotionalState => "emotional_states",
            EntityKind::DecompressSession => "decompress_sessions",
            EntityKind::AiOffload => "ai_offloads",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

// -----------------------------------------------------------------------------
// Persisted records
// -----------------------------------------------------------------------------

/// A focus row. Only the most recently created row is the current focus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FocusState {
    pub id: String,
    pub task_name: String,
    pub duration: String,
    pub success_criteria: String,
    pub is_locked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timebox: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An open commitment occupying attention until closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loop {
    pub id: String,
    pub description: String,
    pub priority: Priority,
    pub queue: QueueType,
    pub owner: String,
    pub status: LoopStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closure_type: Option<ClosureType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_step: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    pub id: String,
    pub name: String,
    pub mode: ThreadMode,
    pub time_scope: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal: Option<String>,
    pub status: ThreadStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub description: String,
    pub category: String,
    pub urgency: Priority,
    pub importance: Priority,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Idea {
    pub id: String,
    #[serde(rename = "idea_summary")]
    pub summary: String,
    pub storage: String,
    pub action_now: bool,
    pub status: IdeaStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Append-only; never modified after insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Archive {
    pub id: String,
    pub object: String,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lesson: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub id: String,
    pub scenario: String,
    pub time_horizon: String,
    pub depth: PredictionDepth,
    pub status: PredictionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionalState {
    pub id: String,
    pub label: String,
    pub source_guess: String,
    pub created_at: DateTime<Utc>,
}

/// Time-boxed recovery activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecompressSession {
    pub id: String,
    pub method: String,
    pub duration: String,
    pub status: SessionStatus,
    pub started_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiOffload {
    pub id: String,
    pub task_type: String,
    pub scope: String,
    pub status: OffloadStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// -----------------------------------------------------------------------------
// Drafts: caller-supplied fields; the store assigns id, status and timestamps.
// -----------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct NewFocus {
    pub task_name: String,
    pub duration: String,
    pub success_criteria: String,
}

#[derive(Debug, Clone)]
pub struct FocusLock {
    pub task_name: String,
    pub timebox: String,
    pub fallback: String,
}

#[derive(Debug, Clone)]
pub struct NewLoop {
    pub description: String,
    pub priority: Priority,
    pub queue: QueueType,
    pub owner: String,
}

#[derive(Debug, Clone)]
pub struct NewThread {
    pub name: String,
    pub mode: ThreadMode,
    pub time_scope: String,
    pub goal: Option<String>,
}

impl NewThread {
    /// Background thread with an open-ended scope and an explicit goal.
    pub fn background(name: impl Into<String>, goal: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mode: ThreadMode::Background,
            time_scope: "ongoing".to_string(),
            goal: Some(goal.into()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewTask {
    pub description: String,
    pub category: String,
    pub urgency: Priority,
    pub importance: Priority,
}

#[derive(Debug, Clone)]
pub struct NewIdea {
    pub summary: String,
    pub storage: String,
    pub action_now: bool,
}

#[derive(Debug, Clone)]
pub struct NewArchive {
    pub object: String,
    pub summary: String,
    pub lesson: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewPrediction {
    pub scenario: String,
    pub time_horizon: String,
    pub depth: PredictionDepth,
}

#[derive(Debug, Clone)]
pub struct NewEmotionalState {
    pub label: String,
    pub source_guess: String,
}

#[derive(Debug, Clone)]
pub struct NewDecompressSession {
    pub method: String,
    pub duration: String,
}

#[derive(Debug, Clone)]
pub struct NewAiOffload {
    pub task_type: String,
    pub scope: String,
    pub status: OffloadStatus,
}

// -----------------------------------------------------------------------------
// Derived view
// -----------------------------------------------------------------------------

/// Composite dashboard snapshot computed by [`crate::StatusAggregator`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CognitiveStatus {
    pub foreground_threads: Vec<String>,
    pub background_threads: Vec<String>,
    pub emotional_load: LoadLevel,
    pub open_loops_estimate: usize,
    pub energy_level: LoadLevel,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub current_focus: String,
    pub focus_locked: bool,
    pub active_predictions: usize,
    pub pending_tasks: usize,
    pub captured_ideas: usize,
    pub timestamp: DateTime<Utc>,
}
