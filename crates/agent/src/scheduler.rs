//! Background compaction scheduler.
//!
//! Requests enqueue a compaction check and return immediately. A single
//! worker task drains the queue and runs [`CompactionEngine::check_and_compact`]
//! for each session. Failed attempts are retried with exponential backoff,
//! and the latest result per session is exposed through [`CompactionScheduler::status`].
//!
//! ```text
//!  schedule() ──► mpsc ──► worker ──► engine
//!                  ▲                    │ Failed
//!                  └── sleep(backoff) ◄─┘
//! ```

use crate::compaction::{CompactionEngine, CompactionOutcome};
use chrono::{DateTime, Utc};
use localmind_config::CompactionConfig;
use localmind_core::message::{ChapterId, TurnId};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Where a session's background compaction stands.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CompactionStatus {
    /// Nothing scheduled, or the last check found nothing to fold
    Idle,
    /// Queued, waiting for the worker
    Pending,
    /// The worker is compacting this session now
    Running { attempt: u32 },
    /// The last run committed a chapter
    Completed {
        chapter_id: ChapterId,
        start_turn_id: TurnId,
        end_turn_id: TurnId,
        finished_at: DateTime<Utc>,
    },
    /// The last run failed; a retry is scheduled for `retry_at`
    Failed {
        error: String,
        attempts: u32,
        retry_at: DateTime<Utc>,
    },
}

/// Retry delays: `initial`, doubled per attempt, capped at `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub initial: Duration,
    pub max: Duration,
}

impl BackoffPolicy {
    /// Delay before retrying after failed attempt number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial.saturating_mul(factor).min(self.max)
    }
}

impl From<&CompactionConfig> for BackoffPolicy {
    fn from(config: &CompactionConfig) -> Self {
        Self {
            initial: Duration::from_secs(config.initial_backoff_secs),
            max: Duration::from_secs(config.max_backoff_secs),
        }
    }
}

enum Command {
    Compact {
        session_id: String,
        model: String,
        attempt: u32,
    },
    Flush(oneshot::Sender<()>),
}

/// Per-session scheduling state. Entries live as long as the scheduler, so
/// the maps grow with the number of distinct sessions seen.
#[derive(Default)]
struct Board {
    statuses: HashMap<String, CompactionStatus>,
    queued: HashSet<String>,
    /// Sessions with a delayed retry sleeping. At most one per session.
    retrying: HashSet<String>,
}

type SharedBoard = Arc<RwLock<Board>>;

impl Board {
    /// Queue a check unless one is already waiting for this session.
    fn enqueue(
        &mut self,
        tx: &mpsc::UnboundedSender<Command>,
        session_id: &str,
        model: &str,
        attempt: u32,
    ) -> bool {
        if !self.queued.insert(session_id.to_string()) {
            return false;
        }

        let sent = tx.send(Command::Compact {
            session_id: session_id.to_string(),
            model: model.to_string(),
            attempt,
        });
        if sent.is_err() {
            self.queued.remove(session_id);
            warn!(session_id, "Compaction worker stopped, check dropped");
            return false;
        }

        if !matches!(self.statuses.get(session_id), Some(CompactionStatus::Running { .. })) {
            self.statuses
                .insert(session_id.to_string(), CompactionStatus::Pending);
        }
        true
    }
}

pub struct CompactionScheduler {
    tx: mpsc::UnboundedSender<Command>,
    board: SharedBoard,
    cancel: CancellationToken,
    worker: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl CompactionScheduler {
    /// Spawn the worker on the current tokio runtime.
    pub fn start(engine: Arc<CompactionEngine>, backoff: BackoffPolicy) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let board = SharedBoard::default();
        let cancel = CancellationToken::new();

        let worker = Worker {
            engine,
            backoff,
            rx,
            tx: tx.clone(),
            board: board.clone(),
            cancel: cancel.clone(),
        };
        let handle = tokio::spawn(worker.run());

        Self {
            tx,
            board,
            cancel,
            worker: tokio::sync::Mutex::new(Some(handle)),
        }
    }

    /// Queue a compaction check for `session_id`. Returns `false` when a
    /// check is already queued, a delayed retry is pending (the retry covers
    /// this request), or the worker has stopped.
    pub async fn schedule(&self, session_id: &str, summarizer_model: &str) -> bool {
        let mut board = self.board.write().await;
        if board.retrying.contains(session_id) {
            debug!(session_id, "Retry pending, check folded into it");
            return false;
        }
        board.enqueue(&self.tx, session_id, summarizer_model, 1)
    }

    pub async fn status(&self, session_id: &str) -> CompactionStatus {
        self.board
            .read()
            .await
            .statuses
            .get(session_id)
            .cloned()
            .unwrap_or(CompactionStatus::Idle)
    }

    /// Wait until every check queued before this call has run.
    ///
    /// Delayed retries that have not been re-queued yet are not waited for.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(Command::Flush(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }

    /// Stop the worker after its current job and drop pending retries.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        if let Some(handle) = self.worker.lock().await.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "Compaction worker ended abnormally");
            }
        }
    }
}

impl Drop for CompactionScheduler {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct Worker {
    engine: Arc<CompactionEngine>,
    backoff: BackoffPolicy,
    rx: mpsc::UnboundedReceiver<Command>,
    tx: mpsc::UnboundedSender<Command>,
    board: SharedBoard,
    cancel: CancellationToken,
}

impl Worker {
    async fn run(mut self) {
        debug!("Compaction worker started");
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                command = self.rx.recv() => match command {
                    Some(Command::Compact { session_id, model, attempt }) => {
                        self.compact(session_id, model, attempt).await;
                    }
                    Some(Command::Flush(done)) => {
                        let _ = done.send(());
                    }
                    None => break,
                },
            }
        }
        debug!("Compaction worker stopped");
    }

    async fn compact(&self, session_id: String, model: String, attempt: u32) {
        {
            let mut board = self.board.write().await;
            board.queued.remove(&session_id);
            board
                .statuses
                .insert(session_id.clone(), CompactionStatus::Running { attempt });
        }

        let outcome = self.engine.check_and_compact(&session_id, &model).await;

        let status = match outcome {
            CompactionOutcome::Skipped { .. } => CompactionStatus::Idle,
            CompactionOutcome::Compacted { chapter } => CompactionStatus::Completed {
                chapter_id: chapter.id,
                start_turn_id: chapter.start_turn_id,
                end_turn_id: chapter.end_turn_id,
                finished_at: Utc::now(),
            },
            CompactionOutcome::Failed { error } => {
                let delay = self.backoff.delay(attempt);
                let now = Utc::now();
                let retry_at = chrono::Duration::from_std(delay)
                    .ok()
                    .and_then(|d| now.checked_add_signed(d))
                    .unwrap_or(now);
                CompactionStatus::Failed {
                    error,
                    attempts: attempt,
                    retry_at,
                }
            }
        };

        let mut board = self.board.write().await;
        if let CompactionStatus::Failed { .. } = status {
            // A check queued while this one ran stands in for the retry.
            if !board.queued.contains(&session_id) && board.retrying.insert(session_id.clone()) {
                let delay = self.backoff.delay(attempt);
                info!(
                    session_id = %session_id,
                    attempt,
                    retry_in_secs = delay.as_secs(),
                    "Compaction will be retried"
                );
                self.schedule_retry(session_id.clone(), model, attempt + 1, delay);
            }
        }
        let status = if board.queued.contains(&session_id) {
            CompactionStatus::Pending
        } else {
            status
        };
        board.statuses.insert(session_id, status);
    }

    fn schedule_retry(&self, session_id: String, model: String, attempt: u32, delay: Duration) {
        let board = self.board.clone();
        let tx = self.tx.clone();
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    let mut board = board.write().await;
                    board.retrying.remove(&session_id);
                    board.enqueue(&tx, &session_id, &model, attempt);
                }
            }
        });
    }
}
