//! SQLite state store for every cognitive record kind.
//!
//! - One database file; every operation opens its own connection.
//! - A store-wide `RwLock<()>` serializes mutations and lets queries run side by side.
//! - Timestamps are Unix milliseconds (UTC); "most recent" is `created_at DESC, rowid DESC`.
//! - Bulk matching is case-insensitive literal substring matching (`LIKE` with escaping).

use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row};

use crate::duration::calculate_end_time;
use crate::error::{StateError, StateResult};
use crate::models::{
    AiOffload, Archive, ClosureType, DecompressSession, EmotionalState, EntityKind, FocusLock,
    FocusState, Idea, IdeaStatus, Loop, LoopStatus, NewAiOffload, NewArchive,
    NewDecompressSession, NewEmotionalState, NewFocus, NewIdea, NewLoop, NewPrediction, NewTask,
    NewThread, Prediction, PredictionStatus, QueueType, SessionStatus, Task, TaskStatus, Thread,
    ThreadMode, ThreadStatus,
};

/// Rule literal that terminates every active thread created before today (UTC).
pub const KEEP_ONLY_TODAY: &str = "keep only today's tasks";

/// Success criteria recorded when locking without an existing focus.
pub const LOCKED_FOCUS_CRITERIA: &str = "Complete the task or timebox expires";

const BUSY_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

const FOCUS_COLUMNS: &str = "id, task_name, duration, success_criteria, is_locked, timebox, fallback, started_at, ends_at, created_at, updated_at";
const LOOP_COLUMNS: &str = "id, description, priority, queue, owner, status, closure_type, next_step, closed_at, created_at, updated_at";
const THREAD_COLUMNS: &str = "id, name, mode, time_scope, goal, status, created_at, updated_at";
const ARCHIVE_COLUMNS: &str = "id, object, summary, lesson, created_at";
const EMOTION_COLUMNS: &str = "id, label, source_guess, created_at";

/// How `terminate_threads_by_rule` selects threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadRule<'a> {
    /// Active threads created before the start of the current UTC day.
    KeepOnlyToday,
    /// Active threads whose name or time scope contains the text.
    Matching(&'a str),
}

impl<'a> ThreadRule<'a> {
    pub fn parse(rule: &'a str) -> Self {
        match rule {
            KEEP_ONLY_TODAY => ThreadRule::KeepOnlyToday,
            other => ThreadRule::Matching(other),
        }
    }
}

pub struct StateStore {
    db_path: PathBuf,
    lock: RwLock<()>,
}

impl StateStore {
    /// Open or create the database at `db_path` and ensure every table exists.
    pub fn open(db_path: impl Into<PathBuf>) -> StateResult<Self> {
        let this = Self {
            db_path: db_path.into(),
            lock: RwLock::new(()),
        };
        this.init()?;
        Ok(this)
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn connect(&self) -> StateResult<Connection> {
        let conn = Connection::open_with_flags(
            &self.db_path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(conn)
    }

    fn init(&self) -> StateResult<()> {
        if let Some(parent) = self.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let _guard = self.lock.write().unwrap_or_else(PoisonError::into_inner);
        let conn = self.connect()?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |r| r.get(0))?;
        tracing::debug!(path = %self.db_path.display(), journal_mode = %mode, "state store opened");

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS focus_state (
                id TEXT PRIMARY KEY,
                task_name TEXT NOT NULL,
                duration TEXT NOT NULL,
                success_criteria TEXT NOT NULL,
                is_locked INTEGER NOT NULL DEFAULT 0,
                timebox TEXT NULL,
                fallback TEXT NULL,
                started_at INTEGER NOT NULL,
                ends_at INTEGER NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS loops (
                id TEXT PRIMARY KEY,
                description TEXT NOT NULL,
                priority TEXT NOT NULL,
                queue TEXT NOT NULL,
                owner TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'open',
                closure_type TEXT NULL,
                next_step TEXT NULL,
                closed_at INTEGER NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS threads (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                mode TEXT NOT NULL,
                time_scope TEXT NOT NULL,
                goal TEXT NULL,
                status TEXT NOT NULL DEFAULT 'active',
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS tasks (
                id TEXT PRIMARY KEY,
                description TEXT NOT NULL,
                category TEXT NOT NULL,
                urgency TEXT NOT NULL,
                importance TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS ideas (
                id TEXT PRIMARY KEY,
                summary TEXT NOT NULL,
                storage TEXT NOT NULL,
                action_now INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL DEFAULT 'captured',
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS archives (
                id TEXT PRIMARY KEY,
                object TEXT NOT NULL,
                summary TEXT NOT NULL,
                lesson TEXT NULL,
                created_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS predictions (
                id TEXT PRIMARY KEY,
                scenario TEXT NOT NULL,
                time_horizon TEXT NOT NULL,
                depth TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'running',
                results TEXT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS emotional_states (
                id TEXT PRIMARY KEY,
                label TEXT NOT NULL,
                source_guess TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS decompress_sessions (
                id TEXT PRIMARY KEY,
                method TEXT NOT NULL,
                duration TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'active',
                started_at INTEGER NOT NULL,
                ends_at INTEGER NOT NULL,
                created_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS ai_offloads (
                id TEXT PRIMARY KEY,
                task_type TEXT NOT NULL,
                scope TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_focus_created_at ON focus_state(created_at);
            CREATE INDEX IF NOT EXISTS idx_loops_status ON loops(status);
            CREATE INDEX IF NOT EXISTS idx_threads_status ON threads(status);
            CREATE INDEX IF NOT EXISTS idx_threads_mode ON threads(mode);
            CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status);
            CREATE INDEX IF NOT EXISTS idx_ideas_status ON ideas(status);
            CREATE INDEX IF NOT EXISTS idx_predictions_status ON predictions(status);
            CREATE INDEX IF NOT EXISTS idx_emotional_states_created_at ON emotional_states(created_at);
            "#,
        )?;
        Ok(())
    }

    fn read<T>(&self, f: impl FnOnce(&Connection) -> StateResult<T>) -> StateResult<T> {
        let _guard = self.lock.read().unwrap_or_else(PoisonError::into_inner);
        let conn = self.connect()?;
        f(&conn)
    }

    fn write<T>(&self, f: impl FnOnce(&Connection) -> StateResult<T>) -> StateResult<T> {
        let _guard = self.lock.write().unwrap_or_else(PoisonError::into_inner);
        let conn = self.connect()?;
        f(&conn)
    }

    // -------------------------------------------------------------------------
    // Focus
    // -------------------------------------------------------------------------

    /// The canonical focus: the most recently created row, if any.
    pub fn current_focus(&self) -> StateResult<Option<FocusState>> {
        self.read(query_current_focus)
    }

    pub fn set_focus(&self, draft: NewFocus) -> StateResult<FocusState> {
        let now = now_utc();
        let ends_at = calculate_end_time(now, &draft.duration)?;
        let focus = FocusState {
            id: new_id(),
            task_name: draft.task_name,
            duration: draft.duration,
            success_criteria: draft.success_criteria,
            is_locked: false,
            timebox: None,
            fallback: None,
            started_at: now,
            ends_at,
            created_at: now,
            updated_at: now,
        };
        self.write(|conn| insert_focus(conn, &focus))?;
        tracing::debug!(focus_id = %focus.id, task = %focus.task_name, "focus set");
        Ok(focus)
    }

    /// Lock the canonical focus, or create a locked one when none exists.
    ///
    /// The timebox is only parsed when a new row has to be created; an existing
    /// focus keeps its original end time.
    pub fn lock_focus(&self, lock: FocusLock) -> StateResult<FocusState> {
        let now = now_utc();
        self.write(|conn| {
            if let Some(current) = query_current_focus(conn)? {
                conn.execute(
                    "UPDATE focus_state SET is_locked = 1, timebox = ?1, fallback = ?2, updated_at = ?3 WHERE id = ?4",
                    params![lock.timebox, lock.fallback, to_ms(now), current.id],
                )?;
                return Ok(FocusState {
                    is_locked: true,
                    timebox: Some(lock.timebox),
                    fallback: Some(lock.fallback),
                    updated_at: now,
                    ..current
                });
            }

            let ends_at = calculate_end_time(now, &lock.timebox)?;
            let focus = FocusState {
                id: new_id(),
                task_name: lock.task_name,
                duration: lock.timebox.clone(),
                success_criteria: LOCKED_FOCUS_CRITERIA.to_string(),
                is_locked: true,
                timebox: Some(lock.timebox),
                fallback: Some(lock.fallback),
                started_at: now,
                ends_at,
                created_at: now,
                updated_at: now,
            };
            insert_focus(conn, &focus)?;
            Ok(focus)
        })
    }

    /// Delete every focus row. Returns the number removed.
    pub fn clear_focus(&self) -> StateResult<usize> {
        self.clear(EntityKind::Focus)
    }

    // -------------------------------------------------------------------------
    // Loops
    // -------------------------------------------------------------------------

    pub fn create_loop(&self, draft: NewLoop) -> StateResult<Loop> {
        let now = now_utc();
        let record = Loop {
            id: new_id(),
            description: draft.description,
            priority: draft.priority,
            queue: draft.queue,
            owner: draft.owner,
            status: LoopStatus::Open,
            closure_type: None,
            next_step: None,
            closed_at: None,
            created_at: now,
            updated_at: now,
        };
        self.write(|conn| {
            conn.execute(
                "INSERT INTO loops (id, description, priority, queue, owner, status, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                params![
                    record.id,
                    record.description,
                    record.priority,
                    record.queue,
                    record.owner,
                    record.status,
                    to_ms(now),
                ],
            )?;
            Ok(())
        })?;
        Ok(record)
    }

    pub fn get_loop(&self, id: &str) -> StateResult<Option<Loop>> {
        self.read(|conn| query_loop(conn, id))
    }

    /// Close an open loop. Unknown ids are `NotFound`; closed loops are `AlreadyClosed`.
    pub fn close_loop(
        &self,
        id: &str,
        closure: ClosureType,
        next_step: Option<String>,
    ) -> StateResult<Loop> {
        let now = now_utc();
        self.write(|conn| {
            let current = query_loop(conn, id)?
                .ok_or_else(|| StateError::NotFound(format!("no loop exists with id '{}'", id)))?;
            if current.status == LoopStatus::Closed {
                return Err(StateError::AlreadyClosed(format!(
                    "loop '{}' has already been closed",
                    id
                )));
            }
            conn.execute(
                "UPDATE loops SET status = 'closed', closure_type = ?1, next_step = ?2, closed_at = ?3, updated_at = ?3 WHERE id = ?4 AND status = 'open'",
                params![closure, next_step, to_ms(now), id],
            )?;
            Ok(Loop {
                status: LoopStatus::Closed,
                closure_type: Some(closure),
                next_step,
                closed_at: Some(now),
                updated_at: now,
                ..current
            })
        })
    }

    /// Abandon every open loop whose description contains `description`.
    /// Case folding is ASCII only: `"CAFÉ"` does not match `"Café"`.
    pub fn kill_loops_by_description(&self, description: &str) -> StateResult<usize> {
        let pattern = like_pattern(non_blank(description, "description")?);
        let now = to_ms(now_utc());
        let affected = self.write(|conn| {
            Ok(conn.execute(
                r"UPDATE loops SET status = 'closed', closure_type = 'abandoned', closed_at = ?1, updated_at = ?1
                  WHERE status = 'open' AND description LIKE ?2 ESCAPE '\'",
                params![now, pattern],
            )?)
        })?;
        tracing::info!(affected, description, "loops killed by description");
        Ok(affected)
    }

    /// Close every open loop with the given closure type.
    pub fn close_all_open_loops(&self, closure: ClosureType) -> StateResult<usize> {
        let now = to_ms(now_utc());
        self.write(|conn| {
            Ok(conn.execute(
                "UPDATE loops SET status = 'closed', closure_type = ?1, closed_at = ?2, updated_at = ?2 WHERE status = 'open'",
                params![closure, now],
            )?)
        })
    }

    /// Open loops, newest first, optionally restricted to one queue.
    pub fn list_open_loops(&self, queue: Option<QueueType>) -> StateResult<Vec<Loop>> {
        self.read(|conn| {
            let rows = match queue {
                Some(q) => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {} FROM loops WHERE status = 'open' AND queue = ?1 ORDER BY created_at DESC, rowid DESC",
                        LOOP_COLUMNS
                    ))?;
                    let rows = stmt
                        .query_map(params![q], loop_from_row)?
                        .collect::<Result<Vec<_>, _>>()?;
                    rows
                }
                None => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {} FROM loops WHERE status = 'open' ORDER BY created_at DESC, rowid DESC",
                        LOOP_COLUMNS
                    ))?;
                    let rows = stmt
                        .query_map([], loop_from_row)?
                        .collect::<Result<Vec<_>, _>>()?;
                    rows
                }
            };
            Ok(rows)
        })
    }

    pub fn count_open_loops(&self) -> StateResult<usize> {
        self.count_where(EntityKind::Loop, "status = 'open'")
    }

    // -------------------------------------------------------------------------
    // Threads
    // -------------------------------------------------------------------------

    pub fn create_thread(&self, draft: NewThread) -> StateResult<Thread> {
        self.create_thread_at(draft, now_utc())
    }

    /// Background thread with scope "ongoing" and the given goal.
    pub fn create_background_thread(&self, name: &str, goal: &str) -> StateResult<Thread> {
        self.create_thread(NewThread::background(name, goal))
    }

    fn create_thread_at(&self, draft: NewThread, now: DateTime<Utc>) -> StateResult<Thread> {
        let thread = Thread {
            id: new_id(),
            name: draft.name,
            mode: draft.mode,
            time_scope: draft.time_scope,
            goal: draft.goal,
            status: ThreadStatus::Active,
            created_at: now,
            updated_at: now,
        };
        self.write(|conn| {
            conn.execute(
                "INSERT INTO threads (id, name, mode, time_scope, goal, status, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                params![
                    thread.id,
                    thread.name,
                    thread.mode,
                    thread.time_scope,
                    thread.goal,
                    thread.status,
                    to_ms(now),
                ],
            )?;
            Ok(())
        })?;
        Ok(thread)
    }

    pub fn get_thread(&self, id: &str) -> StateResult<Option<Thread>> {
        self.read(|conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT {} FROM threads WHERE id = ?1", THREAD_COLUMNS),
                    params![id],
                    thread_from_row,
                )
                .optional()?)
        })
    }

    /// Active threads of both modes, newest first.
    pub fn list_active_threads(&self) -> StateResult<Vec<Thread>> {
        self.read(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM threads WHERE status = 'active' ORDER BY created_at DESC, rowid DESC",
                THREAD_COLUMNS
            ))?;
            let rows = stmt
                .query_map([], thread_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Active threads in one mode, newest first.
    pub fn threads_by_mode(&self, mode: ThreadMode) -> StateResult<Vec<Thread>> {
        self.read(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM threads WHERE status = 'active' AND mode = ?1 ORDER BY created_at DESC, rowid DESC",
                THREAD_COLUMNS
            ))?;
            let rows = stmt
                .query_map(params![mode], thread_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Terminate active threads selected by `rule` (see [`ThreadRule`]).
    pub fn terminate_threads_by_rule(&self, rule: &str) -> StateResult<usize> {
        self.terminate_threads_by_rule_at(rule, now_utc())
    }

    /// Same as [`Self::terminate_threads_by_rule`] with an explicit clock.
    pub fn terminate_threads_by_rule_at(&self, rule: &str, now: DateTime<Utc>) -> StateResult<usize> {
        let rule = non_blank(rule, "rule")?;
        let now_ms = to_ms(now);
        let affected = match ThreadRule::parse(rule) {
            ThreadRule::KeepOnlyToday => {
                let day_start = to_ms(start_of_utc_day(now));
                self.write(|conn| {
                    Ok(conn.execute(
                        "UPDATE threads SET status = 'terminated', updated_at = ?1 WHERE status = 'active' AND created_at < ?2",
                        params![now_ms, day_start],
                    )?)
                })?
            }
            ThreadRule::Matching(text) => {
                let pattern = like_pattern(text);
                self.write(|conn| {
                    Ok(conn.execute(
                        r"UPDATE threads SET status = 'terminated', updated_at = ?1
                          WHERE status = 'active' AND (name LIKE ?2 ESCAPE '\' OR time_scope LIKE ?2 ESCAPE '\')",
                        params![now_ms, pattern],
                    )?)
                })?
            }
        };
        tracing::info!(affected, rule, "threads terminated by rule");
        Ok(affected)
    }

    pub fn terminate_all_active_threads(&self) -> StateResult<usize> {
        let now = to_ms(now_utc());
        self.write(|conn| {
            Ok(conn.execute(
                "UPDATE threads SET status = 'terminated', updated_at = ?1 WHERE status = 'active'",
                params![now],
            )?)
        })
    }

    // -------------------------------------------------------------------------
    // Tasks and ideas
    // -------------------------------------------------------------------------

    pub fn create_task(&self, draft: NewTask) -> StateResult<Task> {
        let now = now_utc();
        let task = Task {
            id: new_id(),
            description: draft.description,
            category: draft.category,
            urgency: draft.urgency,
            importance: draft.importance,
            status: TaskStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        self.write(|conn| {
            conn.execute(
                "INSERT INTO tasks (id, description, category, urgency, importance, status, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                params![
                    task.id,
                    task.description,
                    task.category,
                    task.urgency,
                    task.importance,
                    task.status,
                    to_ms(now),
                ],
            )?;
            Ok(())
        })?;
        Ok(task)
    }

    pub fn count_pending_tasks(&self) -> StateResult<usize> {
        self.count_where(EntityKind::Task, "status = 'pending'")
    }

    pub fn create_idea(&self, draft: NewIdea) -> StateResult<Idea> {
        let now = now_utc();
        let idea = Idea {
            id: new_id(),
            summary: draft.summary,
            storage: draft.storage,
            action_now: draft.action_now,
            status: IdeaStatus::Captured,
            created_at: now,
            updated_at: now,
        };
        self.write(|conn| {
            conn.execute(
                "INSERT INTO ideas (id, summary, storage, action_now, status, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                params![
                    idea.id,
                    idea.summary,
                    idea.storage,
                    idea.action_now,
                    idea.status,
                    to_ms(now),
                ],
            )?;
            Ok(())
        })?;
        Ok(idea)
    }

    pub fn count_captured_ideas(&self) -> StateResult<usize> {
        self.count_where(EntityKind::Idea, "status = 'captured'")
    }

    // -------------------------------------------------------------------------
    // Archives
    // -------------------------------------------------------------------------

    pub fn create_archive(&self, draft: NewArchive) -> StateResult<Archive> {
        let now = now_utc();
        let archive = Archive {
            id: new_id(),
            object: draft.object,
            summary: draft.summary,
            lesson: draft.lesson,
            created_at: now,
        };
        self.write(|conn| {
            conn.execute(
                "INSERT INTO archives (id, object, summary, lesson, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    archive.id,
                    archive.object,
                    archive.summary,
                    archive.lesson,
                    to_ms(now),
                ],
            )?;
            Ok(())
        })?;
        Ok(archive)
    }

    pub fn get_archive(&self, id: &str) -> StateResult<Option<Archive>> {
        self.read(|conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT {} FROM archives WHERE id = ?1", ARCHIVE_COLUMNS),
                    params![id],
                    archive_from_row,
                )
                .optional()?)
        })
    }

    /// Archives, newest first.
    pub fn list_archives(&self, limit: usize) -> StateResult<Vec<Archive>> {
        self.read(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM archives ORDER BY created_at DESC, rowid DESC LIMIT ?1",
                ARCHIVE_COLUMNS
            ))?;
            let rows = stmt
                .query_map(params![limit as i64], archive_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn count_archives(&self) -> StateResult<usize> {
        self.count(EntityKind::Archive)
    }

    // -------------------------------------------------------------------------
    // Predictions
    // -------------------------------------------------------------------------

    pub fn create_prediction(&self, draft: NewPrediction) -> StateResult<Prediction> {
        let now = now_utc();
        let prediction = Prediction {
            id: new_id(),
            scenario: draft.scenario,
            time_horizon: draft.time_horizon,
            depth: draft.depth,
            status: PredictionStatus::Running,
            results: None,
            created_at: now,
            updated_at: now,
        };
        self.write(|conn| {
            conn.execute(
                "INSERT INTO predictions (id, scenario, time_horizon, depth, status, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                params![
                    prediction.id,
                    prediction.scenario,
                    prediction.time_horizon,
                    prediction.depth,
                    prediction.status,
                    to_ms(now),
                ],
            )?;
            Ok(())
        })?;
        Ok(prediction)
    }

    /// Stop every running prediction whose scenario contains `topic`.
    /// Case folding is ASCII only, as for [`Self::kill_loops_by_description`].
    pub fn stop_predictions_by_topic(&self, topic: &str) -> StateResult<usize> {
        let pattern = like_pattern(non_blank(topic, "topic")?);
        let now = to_ms(now_utc());
        let affected = self.write(|conn| {
            Ok(conn.execute(
                r"UPDATE predictions SET status = 'stopped', updated_at = ?1
                  WHERE status = 'running' AND scenario LIKE ?2 ESCAPE '\'",
                params![now, pattern],
            )?)
        })?;
        tracing::info!(affected, topic, "predictions stopped by topic");
        Ok(affected)
    }

    pub fn stop_all_running_predictions(&self) -> StateResult<usize> {
        let now = to_ms(now_utc());
        self.write(|conn| {
            Ok(conn.execute(
                "UPDATE predictions SET status = 'stopped', updated_at = ?1 WHERE status = 'running'",
                params![now],
            )?)
        })
    }

    pub fn count_running_predictions(&self) -> StateResult<usize> {
        self.count_where(EntityKind::Prediction, "status = 'running'")
    }

    // -------------------------------------------------------------------------
    // Emotion
    // -------------------------------------------------------------------------

    pub fn create_emotional_state(&self, draft: NewEmotionalState) -> StateResult<EmotionalState> {
        let now = now_utc();
        let state = EmotionalState {
            id: new_id(),
            label: draft.label,
            source_guess: draft.source_guess,
            created_at: now,
        };
        self.write(|conn| {
            conn.execute(
                "INSERT INTO emotional_states (id, label, source_guess, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![state.id, state.label, state.source_guess, to_ms(now)],
            )?;
            Ok(())
        })?;
        Ok(state)
    }

    /// Up to `limit` emotional states, newest first.
    pub fn recent_emotional_states(&self, limit: usize) -> StateResult<Vec<EmotionalState>> {
        self.read(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM emotional_states ORDER BY created_at DESC, rowid DESC LIMIT ?1",
                EMOTION_COLUMNS
            ))?;
            let rows = stmt
                .query_map(params![limit as i64], |r| {
                    Ok(EmotionalState {
                        id: r.get(0)?,
                        label: r.get(1)?,
                        source_guess: r.get(2)?,
                        created_at: ts(r, 3)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn create_decompress_session(
        &self,
        draft: NewDecompressSession,
    ) -> StateResult<DecompressSession> {
        let now = now_utc();
        let ends_at = calculate_end_time(now, &draft.duration)?;
        let session = DecompressSession {
            id: new_id(),
            method: draft.method,
            duration: draft.duration,
            status: SessionStatus::Active,
            started_at: now,
            ends_at,
            created_at: now,
        };
        self.write(|conn| {
            conn.execute(
                "INSERT INTO decompress_sessions (id, method, duration, status, started_at, ends_at, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?5)",
                params![
                    session.id,
                    session.method,
                    session.duration,
                    session.status,
                    to_ms(now),
                    to_ms(ends_at),
                ],
            )?;
            Ok(())
        })?;
        Ok(session)
    }

    // -------------------------------------------------------------------------
    // AI offloads
    // -------------------------------------------------------------------------

    pub fn create_ai_offload(&self, draft: NewAiOffload) -> StateResult<AiOffload> {
        let now = now_utc();
        let offload = AiOffload {
            id: new_id(),
            task_type: draft.task_type,
            scope: draft.scope,
            status: draft.status,
            created_at: now,
            updated_at: now,
        };
        self.write(|conn| {
            conn.execute(
                "INSERT INTO ai_offloads (id, task_type, scope, status, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                params![
                    offload.id,
                    offload.task_type,
                    offload.scope,
                    offload.status,
                    to_ms(now),
                ],
            )?;
            Ok(())
        })?;
        Ok(offload)
    }

    // -------------------------------------------------------------------------
    // Table-wide
    // -------------------------------------------------------------------------

    /// Total number of rows of one kind, regardless of status.
    pub fn count(&self, kind: EntityKind) -> StateResult<usize> {
        self.read(|conn| {
            let n: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM {}", kind.table()),
                [],
                |r| r.get(0),
            )?;
            Ok(n as usize)
        })
    }

    /// Delete every row of one kind. Returns the number removed.
    pub fn clear(&self, kind: EntityKind) -> StateResult<usize> {
        self.write(|conn| Ok(conn.execute(&format!("DELETE FROM {}", kind.table()), [])?))
    }

    fn count_where(&self, kind: EntityKind, predicate: &str) -> StateResult<usize> {
        self.read(|conn| {
            let n: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM {} WHERE {}", kind.table(), predicate),
                [],
                |r| r.get(0),
            )?;
            Ok(n as usize)
        })
    }
}

fn query_current_focus(conn: &Connection) -> StateResult<Option<FocusState>> {
    Ok(conn
        .query_row(
            &format!(
                "SELECT {} FROM focus_state ORDER BY created_at DESC, rowid DESC LIMIT 1",
                FOCUS_COLUMNS
            ),
            [],
            focus_from_row,
        )
        .optional()?)
}

fn insert_focus(conn: &Connection, focus: &FocusState) -> StateResult<()> {
    conn.execute(
        &format!(
            "INSERT INTO focus_state ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            FOCUS_COLUMNS
        ),
        params![
            focus.id,
            focus.task_name,
            focus.duration,
            focus.success_criteria,
            focus.is_locked,
            focus.timebox,
            focus.fallback,
            to_ms(focus.started_at),
            to_ms(focus.ends_at),
            to_ms(focus.created_at),
            to_ms(focus.updated_at),
        ],
    )?;
    Ok(())
}

fn query_loop(conn: &Connection, id: &str) -> StateResult<Option<Loop>> {
    Ok(conn
        .query_row(
            &format!("SELECT {} FROM loops WHERE id = ?1", LOOP_COLUMNS),
            params![id],
            loop_from_row,
        )
        .optional()?)
}

fn focus_from_row(r: &Row<'_>) -> rusqlite::Result<FocusState> {
    Ok(FocusState {
        id: r.get(0)?,
        task_name: r.get(1)?,
        duration: r.get(2)?,
        success_criteria: r.get(3)?,
        is_locked: r.get(4)?,
        timebox: r.get(5)?,
        fallback: r.get(6)?,
        started_at: ts(r, 7)?,
        ends_at: ts(r, 8)?,
        created_at: ts(r, 9)?,
        updated_at: ts(r, 10)?,
    })
}

fn loop_from_row(r: &Row<'_>) -> rusqlite::Result<Loop> {
    Ok(Loop {
        id: r.get(0)?,
        description: r.get(1)?,
        priority: r.get(2)?,
        queue: r.get(3)?,
        owner: r.get(4)?,
        status: r.get(5)?,
        closure_type: r.get(6)?,
        next_step: r.get(7)?,
        closed_at: opt_ts(r, 8)?,
        created_at: ts(r, 9)?,
        updated_at: ts(r, 10)?,
    })
}

fn thread_from_row(r: &Row<'_>) -> rusqlite::Result<Thread> {
    Ok(Thread {
        id: r.get(0)?,
        name: r.get(1)?,
        mode: r.get(2)?,
        time_scope: r.get(3)?,
        goal: r.get(4)?,
        status: r.get(5)?,
        created_at: ts(r, 6)?,
        updated_at: ts(r, 7)?,
    })
}

fn archive_from_row(r: &Row<'_>) -> rusqlite::Result<Archive> {
    Ok(Archive {
        id: r.get(0)?,
        object: r.get(1)?,
        summary: r.get(2)?,
        lesson: r.get(3)?,
        created_at: ts(r, 4)?,
    })
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Current time truncated to the millisecond precision stored on disk.
fn now_utc() -> DateTime<Utc> {
    let now = Utc::now();
    from_ms(now.timestamp_millis()).unwrap_or(now)
}

fn to_ms(t: DateTime<Utc>) -> i64 {
    t.timestamp_millis()
}

fn from_ms(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}

fn ts(r: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let ms: i64 = r.get(idx)?;
    from_ms(ms).ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, ms))
}

fn opt_ts(r: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let ms: Option<i64> = r.get(idx)?;
    ms.map(|ms| from_ms(ms).ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, ms)))
        .transpose()
}

fn start_of_utc_day(now: DateTime<Utc>) -> DateTime<Utc> {
    let midnight = now.date_naive().and_hms_opt(0, 0, 0).unwrap_or_default();
    Utc.from_utc_datetime(&midnight)
}

fn non_blank<'a>(value: &'a str, field: &str) -> StateResult<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(StateError::Validation(format!("{} cannot be empty", field)));
    }
    Ok(trimmed)
}

/// `%needle%` with LIKE metacharacters escaped by `\`.
fn like_pattern(needle: &str) -> String {
    let mut out = String::with_capacity(needle.len() + 2);
    out.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}
