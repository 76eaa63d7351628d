//! mindstate-core: cognitive state store (focus, open loops, threads, captures,
//! predictions, emotions), dashboard status derivation and resets.
//!
//! The HTTP gateway in `add-ons/mindstate-gateway` is a thin adapter over this crate.

mod config;
mod duration;
mod error;
mod models;
mod reset;
mod status;
mod store;

pub use config::GatewayConfig;
pub use duration::{calculate_end_time, parse_duration};
pub use error::{StateError, StateResult};
pub use reset::{HardResetReport, ResetController, SoftResetReport};
pub use status::{classify_emotional_load, classify_energy_level, StatusAggregator, EMOTION_WINDOW};
pub use store::{StateStore, ThreadRule, KEEP_ONLY_TODAY, LOCKED_FOCUS_CRITERIA};

// Data model
pub use models::{
    AiOffload, Archive, ClosureType, CognitiveStatus, DecompressSession, EmotionalState,
    EntityKind, FocusLock, FocusState, Idea, IdeaStatus, LoadLevel, Loop, LoopStatus,
    NewAiOffload, NewArchive, NewDecompressSession, NewEmotionalState, NewFocus, NewIdea, NewLoop,
    NewPrediction, NewTask, NewThread, OffloadStatus, Prediction, PredictionDepth,
    PredictionStatus, Priority, QueueType, SessionStatus, Task, TaskStatus, Thread, ThreadMode,
    ThreadStatus,
};
