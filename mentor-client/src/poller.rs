//! Feedback availability poller
//!
//! Bridges a screen that wants to show an essay's feedback with the
//! asynchronous analysis pipeline on the server:
//!
//! ```text
//! Idle -> Checking -> NotSubmitted
//!                  -> Ready
//!                  -> Failed
//!                  -> AwaitingAnalysis -> Ready | TimedOut
//! ```
//!
//! While awaiting, the essay is re-fetched once per tick and, once it reports
//! ANALYZED, its feedback list as well. Waiting for the status flip and
//! waiting for the feedback row draw from the same attempt budget. Errors on
//! a tick count as an attempt and are never surfaced on their own; only
//! running out of attempts produces a notice. A rejected session is the
//! exception: it ends the poll on the spot, since every later request would
//! go out without a token.
//!
//! The poller expects a gateway that does not notify on failure
//! (see [`HttpGateway::silent`](crate::gateway::HttpGateway::silent)); it
//! emits its own notices for the outcomes the user needs to see.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use mentor_types::{Essay, EssayId, EssayStatus, Feedback};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::PollPolicy;
use crate::error::ApiError;
use crate::gateway::EssayGateway;
use crate::notify::{NotificationKind, Notifier};
use crate::store::EssayStore;

const SESSION_EXPIRED: &str = "Session expired. Please sign in again.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollPhase {
    /// No essay requested yet
    Idle,
    /// Initial load of the essay
    Checking,
    /// Essay is a draft or archived; nothing to wait for
    NotSubmitted,
    AwaitingAnalysis,
    Ready,
    /// Attempt budget exhausted; a manual refresh may still succeed
    TimedOut,
    /// The essay could not be loaded, or the session expired mid-poll
    Failed(String),
}

impl PollPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::NotSubmitted | Self::Ready | Self::TimedOut | Self::Failed(_)
        )
    }
}

/// Everything a feedback screen renders.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedbackView {
    pub essay_id: Option<EssayId>,
    pub phase: PollPhase,
    pub essay: Option<Essay>,
    /// First entry of the feedback list once Ready
    pub feedback: Option<Feedback>,
    pub attempts: u32,
    pub max_attempts: u32,
}

impl FeedbackView {
    fn idle(max_attempts: u32) -> Self {
        Self {
            essay_id: None,
            phase: PollPhase::Idle,
            essay: None,
            feedback: None,
            attempts: 0,
            max_attempts,
        }
    }

    /// Fraction of the attempt budget used, for progress bars.
    pub fn progress(&self) -> f32 {
        if self.max_attempts == 0 {
            return 1.0;
        }
        (self.attempts as f32 / self.max_attempts as f32).min(1.0)
    }

    pub fn overall_score(&self) -> Option<u32> {
        self.feedback.as_ref().and_then(|f| f.overall_score)
    }
}

pub struct FeedbackPoller {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for FeedbackPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedbackPoller")
            .field("policy", &self.shared.policy)
            .field("view", &*self.shared.view.borrow())
            .finish()
    }
}

struct Shared {
    gateway: Arc<dyn EssayGateway>,
    notifier: Notifier,
    store: Option<EssayStore>,
    policy: PollPolicy,
    view: watch::Sender<FeedbackView>,
    /// Bumped by every start and cancel. A task may only write while its
    /// generation is current; writes happen with this lock held.
    generation: Mutex<u64>,
    task: Mutex<Option<JoinHandle<()>>>,
    resubmitting: AtomicBool,
}

enum PollOutcome {
    Ready(Essay, Feedback),
    Pending {
        essay: Option<Essay>,
        error: Option<ApiError>,
    },
}

impl FeedbackPoller {
    pub fn new(gateway: Arc<dyn EssayGateway>, notifier: Notifier, policy: PollPolicy) -> Self {
        let (view, _rx) = watch::channel(FeedbackView::idle(policy.max_attempts));
        Self {
            shared: Arc::new(Shared {
                gateway,
                notifier,
                store: None,
                policy,
                view,
                generation: Mutex::new(0),
                task: Mutex::new(None),
                resubmitting: AtomicBool::new(false),
            }),
        }
    }

    /// Reconcile every essay the poller fetches into `store`.
    pub fn with_store(mut self, store: EssayStore) -> Self {
        if let Some(shared) = Arc::get_mut(&mut self.shared) {
            shared.store = Some(store);
        }
        self
    }

    pub fn policy(&self) -> PollPolicy {
        self.shared.policy
    }

    pub fn view(&self) -> FeedbackView {
        self.shared.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<FeedbackView> {
        self.shared.view.subscribe()
    }

    /// Load `essay_id` and wait for its feedback if needed.
    ///
    /// Restarts from scratch if already running. Must be called from within
    /// a Tokio runtime.
    pub fn start(&self, essay_id: EssayId) {
        let max_attempts = self.shared.policy.max_attempts;
        self.launch(
            None,
            |view| {
                *view = FeedbackView {
                    essay_id: Some(essay_id),
                    phase: PollPhase::Checking,
                    ..FeedbackView::idle(max_attempts)
                };
            },
            move |shared, generation| async move { shared.check(generation, essay_id).await },
        );
    }

    /// Wait for the analysis of an essay that was just submitted, skipping
    /// the initial load.
    pub fn watch_submission(&self, essay: Essay) {
        let essay_id = essay.id;
        let max_attempts = self.shared.policy.max_attempts;
        self.shared.reconcile(&essay);
        self.launch(
            None,
            |view| {
                *view = FeedbackView {
                    essay_id: Some(essay_id),
                    phase: PollPhase::AwaitingAnalysis,
                    essay: Some(essay),
                    ..FeedbackView::idle(max_attempts)
                };
            },
            move |shared, generation| async move { shared.poll(generation, essay_id).await },
        );
    }

    /// Manual retry, e.g. after a time-out.
    pub fn refresh(&self) -> bool {
        match self.view().essay_id {
            Some(essay_id) => {
                self.start(essay_id);
                true
            }
            None => false,
        }
    }

    /// Request a new analysis for the current essay.
    ///
    /// Allowed once Ready, or while the essay is SUBMITTED or ANALYZED.
    /// Returns `Ok(false)` when not eligible, when another resubmission is
    /// in flight, or when the poller was cancelled or restarted meanwhile.
    pub async fn resubmit(&self) -> Result<bool, ApiError> {
        let view = self.view();
        let Some(essay_id) = view.essay_id else {
            return Ok(false);
        };
        let eligible = view.phase == PollPhase::Ready
            || view
                .essay
                .as_ref()
                .is_some_and(|e| e.status.can_request_analysis());
        if !eligible {
            return Ok(false);
        }
        let Some(_in_flight) = InFlight::acquire(&self.shared.resubmitting) else {
            debug!(essay_id, "resubmission already in flight");
            return Ok(false);
        };

        let expected = *lock(&self.shared.generation);
        let essay = match self.shared.gateway.submit_for_analysis(essay_id).await {
            Ok(essay) => essay,
            Err(err) => {
                warn!(essay_id, error = %err, "resubmission failed");
                self.shared.notifier.notify(
                    NotificationKind::Error,
                    format!("Could not resend the essay for analysis: {err}"),
                    None,
                );
                return Err(err);
            }
        };

        let max_attempts = self.shared.policy.max_attempts;
        let fetched = essay.clone();
        let launched = self.launch(
            Some(expected),
            |view| {
                *view = FeedbackView {
                    essay_id: Some(essay_id),
                    phase: PollPhase::AwaitingAnalysis,
                    essay: Some(fetched),
                    ..FeedbackView::idle(max_attempts)
                };
            },
            move |shared, generation| async move { shared.poll(generation, essay_id).await },
        );
        if !launched {
            return Ok(false);
        }

        self.shared.reconcile(&essay);
        info!(essay_id, "essay resubmitted for analysis");
        self.shared
            .notifier
            .success("Essay resent for analysis successfully!");
        Ok(true)
    }

    /// Stop polling. Nothing the poller owns changes after this returns,
    /// including when a request that was already in flight completes.
    pub fn cancel(&self) {
        let mut generation = lock(&self.shared.generation);
        *generation += 1;
        if let Some(task) = lock(&self.shared.task).take() {
            task.abort();
        }
    }

    /// Bump the generation, stop the old task, reset the view and spawn
    /// the next one. With `expected`, does nothing unless the generation is
    /// still the one observed by the caller.
    fn launch<R, F, Fut>(&self, expected: Option<u64>, reset: R, run: F) -> bool
    where
        R: FnOnce(&mut FeedbackView),
        F: FnOnce(Arc<Shared>, u64) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut generation = lock(&self.shared.generation);
        if expected.is_some_and(|g| g != *generation) {
            return false;
        }
        *generation += 1;
        let current = *generation;

        let mut task = lock(&self.shared.task);
        if let Some(old) = task.take() {
            old.abort();
        }
        self.shared.view.send_modify(reset);
        *task = Some(tokio::spawn(run(Arc::clone(&self.shared), current)));
        true
    }
}

impl Drop for FeedbackPoller {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl Shared {
    /// Apply `update` if `generation` is still current. Returns whether it was applied.
    fn commit(
        &self,
        generation: u64,
        fetched: Option<&Essay>,
        update: impl FnOnce(&mut FeedbackView),
    ) -> bool {
        let current = lock(&self.generation);
        if *current != generation {
            return false;
        }
        self.view.send_modify(update);
        if let Some(essay) = fetched {
            self.reconcile(essay);
        }
        true
    }

    fn reconcile(&self, essay: &Essay) {
        if let Some(store) = &self.store {
            store.update(essay.clone());
        }
    }

    async fn check(self: Arc<Self>, generation: u64, essay_id: EssayId) {
        let essay = match self.gateway.get(essay_id).await {
            Ok(essay) => essay,
            Err(err @ ApiError::Authentication(_)) => {
                self.session_expired(generation, essay_id, &err);
                return;
            }
            Err(err) => {
                warn!(essay_id, error = %err, "failed to load essay");
                // Transient failures land here too; refresh() is their retry path.
                let reason = if err.is_transient() {
                    format!("{err} (temporary, refresh to retry)")
                } else {
                    err.to_string()
                };
                if self.commit(generation, None, |view| {
                    view.phase = PollPhase::Failed(reason);
                }) {
                    self.notifier.notify(
                        NotificationKind::Error,
                        format!("Could not load the essay: {err}"),
                        None,
                    );
                }
                return;
            }
        };

        match essay.status {
            EssayStatus::Analyzed => {
                match self.gateway.feedbacks_for_essay(essay_id).await {
                    Ok(feedbacks) if !feedbacks.is_empty() => {
                        self.finish_ready(generation, essay, feedbacks);
                        return;
                    }
                    Ok(_) => debug!(essay_id, "essay analyzed but feedback not yet available"),
                    Err(err) => debug!(essay_id, error = %err, "feedback fetch failed"),
                }
                if !self.enter_awaiting(generation, essay) {
                    return;
                }
            }
            EssayStatus::Submitted => {
                if !self.enter_awaiting(generation, essay) {
                    return;
                }
            }
            EssayStatus::Draft | EssayStatus::Archived => {
                let fetched = essay.clone();
                self.commit(generation, Some(&fetched), |view| {
                    view.phase = PollPhase::NotSubmitted;
                    view.essay = Some(essay);
                });
                return;
            }
        }

        self.poll(generation, essay_id).await;
    }

    fn enter_awaiting(&self, generation: u64, essay: Essay) -> bool {
        let fetched = essay.clone();
        self.commit(generation, Some(&fetched), |view| {
            view.phase = PollPhase::AwaitingAnalysis;
            view.essay = Some(essay);
        })
    }

    fn finish_ready(&self, generation: u64, essay: Essay, feedbacks: Vec<Feedback>) -> bool {
        let essay_id = essay.id;
        let fetched = essay.clone();
        // The API does not document ordering; the first entry is taken as the latest.
        let feedback = feedbacks.into_iter().next();
        let score = feedback.as_ref().and_then(|f| f.overall_score);
        let applied = self.commit(generation, Some(&fetched), |view| {
            view.phase = PollPhase::Ready;
            view.essay = Some(essay);
            view.feedback = feedback;
        });
        if applied {
            info!(essay_id, score = ?score, "feedback ready");
        }
        applied
    }

    async fn poll(self: Arc<Self>, generation: u64, essay_id: EssayId) {
        let period = self.policy.interval;
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut attempts = self.view.borrow().attempts;
        loop {
            ticker.tick().await;
            attempts += 1;
            debug!(essay_id, attempt = attempts, "checking analysis status");

            let last_error = match self.poll_once(essay_id).await {
                PollOutcome::Ready(essay, feedback) => {
                    let applied = self.commit(generation, None, |view| {
                        view.attempts = attempts;
                    });
                    if applied {
                        self.finish_ready(generation, essay, vec![feedback]);
                    }
                    return;
                }
                PollOutcome::Pending {
                    essay,
                    error: Some(err @ ApiError::Authentication(_)),
                } => {
                    let applied = self.commit(generation, essay.as_ref(), |view| {
                        view.attempts = attempts;
                    });
                    if applied {
                        self.session_expired(generation, essay_id, &err);
                    }
                    return;
                }
                PollOutcome::Pending { essay, error } => {
                    if let Some(err) = &error {
                        warn!(essay_id, attempt = attempts, error = %err, "poll attempt failed");
                    }
                    let applied = self.commit(generation, essay.as_ref(), |view| {
                        view.attempts = attempts;
                        if let Some(essay) = essay.clone() {
                            view.essay = Some(essay);
                        }
                    });
                    if !applied {
                        return;
                    }
                    error
                }
            };

            if attempts >= self.policy.max_attempts {
                self.time_out(generation, essay_id, last_error);
                return;
            }
        }
    }

    async fn poll_once(&self, essay_id: EssayId) -> PollOutcome {
        let essay = match self.gateway.get(essay_id).await {
            Ok(essay) => essay,
            Err(err) => {
                return PollOutcome::Pending {
                    essay: None,
                    error: Some(err),
                }
            }
        };
        if essay.status != EssayStatus::Analyzed {
            return PollOutcome::Pending {
                essay: Some(essay),
                error: None,
            };
        }

        match self.gateway.feedbacks_for_essay(essay_id).await {
            Ok(feedbacks) => match feedbacks.into_iter().next() {
                Some(feedback) => PollOutcome::Ready(essay, feedback),
                None => PollOutcome::Pending {
                    essay: Some(essay),
                    error: None,
                },
            },
            Err(err) => PollOutcome::Pending {
                essay: Some(essay),
                error: Some(err),
            },
        }
    }

    /// The session was rejected; retrying with it is pointless.
    fn session_expired(&self, generation: u64, essay_id: EssayId, err: &ApiError) {
        let applied = self.commit(generation, None, |view| {
            view.phase = PollPhase::Failed(SESSION_EXPIRED.to_string());
        });
        if !applied {
            return;
        }
        warn!(essay_id, error = %err, "session rejected, polling stopped");
        self.notifier
            .notify(NotificationKind::Error, SESSION_EXPIRED, None);
    }

    fn time_out(&self, generation: u64, essay_id: EssayId, last_error: Option<ApiError>) {
        if !self.commit(generation, None, |view| view.phase = PollPhase::TimedOut) {
            return;
        }
        info!(
            essay_id,
            attempts = self.policy.max_attempts,
            last_error = last_error.as_ref().map(tracing::field::display),
            "gave up waiting for feedback"
        );
        self.notifier.notify(
            NotificationKind::Warn,
            "The analysis is taking longer than expected. Try refreshing in a few moments.",
            Some("Analysis in progress"),
        );
    }
}

/// Clears the flag when dropped, including when the owning future is dropped.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        (!flag.swap(true, Ordering::SeqCst)).then_some(Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
