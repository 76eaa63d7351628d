//! Dashboard status: a read-only snapshot derived from the store.

use crate::error::StateResult;
use crate::models::{CognitiveStatus, LoadLevel, ThreadMode};
use crate::store::StateStore;

/// Number of most recent emotional states considered for the load.
pub const EMOTION_WINDOW: usize = 5;

const HIGH_LOAD_LABELS: &[&str] = &["angry", "anxious", "overwhelmed", "stressed", "frustrated"];
const MEDIUM_LOAD_LABELS: &[&str] = &["tired", "resentful", "worried", "uncertain"];

/// Classify recent emotion labels (exact, case-sensitive).
///
/// High when two or more high-load labels appear, or one alongside two or more
/// medium-load labels. Medium when any high-load label or two medium-load labels
/// appear. Otherwise low.
pub fn classify_emotional_load<I, S>(labels: I) -> LoadLevel
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let (mut high, mut medium) = (0usize, 0usize);
    for label in labels {
        let label = label.as_ref();
        if HIGH_LOAD_LABELS.contains(&label) {
            high += 1;
        } else if MEDIUM_LOAD_LABELS.contains(&label) {
            medium += 1;
        }
    }

    if high >= 2 || (high >= 1 && medium >= 2) {
        LoadLevel::High
    } else if high >= 1 || medium >= 2 {
        LoadLevel::Medium
    } else {
        LoadLevel::Low
    }
}

/// Energy from cognitive load `open_loops + 2 * foreground + background`.
pub fn classify_energy_level(open_loops: usize, foreground: usize, background: usize) -> LoadLevel {
    let load = open_loops + 2 * foreground + background;
    if load > 15 {
        LoadLevel::Low
    } else if load > 7 {
        LoadLevel::Medium
    } else {
        LoadLevel::High
    }
}

pub struct StatusAggregator<'a> {
    store: &'a StateStore,
}

impl<'a> StatusAggregator<'a> {
    pub fn new(store: &'a StateStore) -> Self {
        Self { store }
    }

    /// Build the snapshot. Any failed query fails the whole status.
    pub fn status(&self) -> StateResult<CognitiveStatus> {
        let foreground: Vec<String> = self
            .store
            .threads_by_mode(ThreadMode::Foreground)?
            .into_iter()
            .map(|t| t.name)
            .collect();
        let background: Vec<String> = self
            .store
            .threads_by_mode(ThreadMode::Background)?
            .into_iter()
            .map(|t| t.name)
            .collect();

        let open_loops = self.store.count_open_loops()?;
        let labels: Vec<String> = self
            .store
            .recent_emotional_states(EMOTION_WINDOW)?
            .into_iter()
            .map(|s| s.label)
            .collect();

        let focus = self.store.current_focus()?;
        let (current_focus, focus_locked) = match focus {
            Some(f) => (f.task_name, f.is_locked),
            None => (String::new(), false),
        };

        let status = CognitiveStatus {
            emotional_load: classify_emotional_load(&labels),
            energy_level: classify_energy_level(open_loops, foreground.len(), background.len()),
            foreground_threads: foreground,
            background_threads: background,
            open_loops_estimate: open_loops,
            current_focus,
            focus_locked,
            active_predictions: self.store.count_running_predictions()?,
            pending_tasks: self.store.count_pending_tasks()?,
            captured_ideas: self.store.count_captured_ideas()?,
            timestamp: chrono::Utc::now(),
        };
        tracing::debug!(
            open_loops = status.open_loops_estimate,
            energy = %status.energy_level,
            emotional_load = %status.emotional_load,
            "status computed"
        );
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        FocusLock, NewEmotionalState, NewFocus, NewLoop, NewThread, Priority, QueueType,
    };

    #[test]
    fn emotional_load_thresholds() {
        assert_eq!(classify_emotional_load(Vec::<&str>::new()), LoadLevel::Low);
        assert_eq!(classify_emotional_load(["calm", "happy"]), LoadLevel::Low);
        assert_eq!(classify_emotional_load(["tired"]), LoadLevel::Low);
        assert_eq!(classify_emotional_load(["tired", "worried"]), LoadLevel::Medium);
        assert_eq!(classify_emotional_load(["anxious"]), LoadLevel::Medium);
        assert_eq!(classify_emotional_load(["anxious", "angry"]), LoadLevel::High);
        assert_eq!(
            classify_emotional_load(["stressed", "tired", "uncertain"]),
            LoadLevel::High
        );
        assert_eq!(classify_emotional_load(["stressed", "tired"]), LoadLevel::Medium);
    }

    #[test]
    fn emotional_load_is_case_sensitive() {
        assert_eq!(classify_emotional_load(["Angry", "ANXIOUS"]), LoadLevel::Low);
    }

    #[test]
    fn energy_level_thresholds() {
        assert_eq!(classify_energy_level(0, 0, 0), LoadLevel::High);
        assert_eq!(classify_energy_level(7, 0, 0), LoadLevel::High);
        assert_eq!(classify_energy_level(8, 0, 0), LoadLevel::Medium);
        assert_eq!(classify_energy_level(5, 5, 0), LoadLevel::Medium);
        assert_eq!(classify_energy_level(15, 0, 0), LoadLevel::Medium);
        assert_eq!(classify_energy_level(10, 3, 0), LoadLevel::Low);
        assert_eq!(classify_energy_level(0, 0, 16), LoadLevel::Low);
    }

    fn temp_store() -> (tempfile::TempDir, StateStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::open(dir.path().join("state.sqlite")).unwrap();
        (dir, store)
    }

    #[test]
    fn empty_store_reports_idle_status() {
        let (_dir, store) = temp_store();
        let status = StatusAggregator::new(&store).status().unwrap();
        assert!(status.foreground_threads.is_empty());
        assert!(status.background_threads.is_empty());
        assert_eq!(status.open_loops_estimate, 0);
        assert_eq!(status.energy_level, LoadLevel::High);
        assert_eq!(status.emotional_load, LoadLevel::Low);
        assert!(status.current_focus.is_empty());
        assert!(!status.focus_locked);
    }

    #[test]
    fn status_reflects_store_contents() {
        let (_dir, store) = temp_store();
        for i in 0..5 {
            store
                .create_loop(NewLoop {
                    description: format!("loop {}", i),
                    priority: Priority::High,
                    queue: QueueType::Action,
                    owner: "me".to_string(),
                })
                .unwrap();
        }
        store
            .create_thread(NewThread {
                name: "launch".to_string(),
                mode: ThreadMode::Foreground,
                time_scope: "this week".to_string(),
                goal: None,
            })
            .unwrap();
        store
            .create_thread(NewThread::background("move house", "find a flat"))
            .unwrap();
        for label in ["calm", "anxious", "calm", "calm", "calm", "angry"] {
            store
                .create_emotional_state(NewEmotionalState {
                    label: label.to_string(),
                    source_guess: "?".to_string(),
                })
                .unwrap();
        }
        store
            .set_focus(NewFocus {
                task_name: "slides".to_string(),
                duration: "30m".to_string(),
                success_criteria: "ten slides".to_string(),
            })
            .unwrap();
        store
            .lock_focus(FocusLock {
                task_name: "slides".to_string(),
                timebox: "30m".to_string(),
                fallback: "outline only".to_string(),
            })
            .unwrap();

        let status = StatusAggregator::new(&store).status().unwrap();
        assert_eq!(status.foreground_threads, vec!["launch".to_string()]);
        assert_eq!(status.background_threads, vec!["move house".to_string()]);
        assert_eq!(status.open_loops_estimate, 5);
        // 5 + 2*1 + 1 = 8
        assert_eq!(status.energy_level, LoadLevel::Medium);
        // window of five: angry, calm, calm, calm, anxious
        assert_eq!(status.emotional_load, LoadLevel::High);
        assert_eq!(status.current_focus, "slides");
        assert!(status.focus_locked);
    }
}
