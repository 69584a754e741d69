//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use mentor_client::{
    ApiError, EssayGateway, FeedbackView, Notification, NotificationKind, Notifier, PollPhase,
};
use mentor_types::{
    Essay, EssayDraft, EssayId, EssayQuery, EssayStatus, Feedback, FeedbackId, Page, UserStats,
};
use tokio::sync::{watch, Notify};
use tokio::time::Instant;

pub fn essay(id: EssayId, status: EssayStatus) -> Essay {
    let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    Essay {
        id,
        title: format!("Essay {id}"),
        theme: "Digital inclusion in Brazil".to_string(),
        content: "Lorem ipsum dolor sit amet ".repeat(60),
        status,
        essay_type: Some("ARGUMENTATIVE".to_string()),
        word_count: None,
        created_at: at,
        updated_at: at,
        submitted_at: None,
        feedbacks: Vec::new(),
    }
}

pub fn feedback(id: FeedbackId, essay_id: EssayId, score: u32) -> Feedback {
    serde_json::from_value(serde_json::json!({
        "id": id,
        "essayId": essay_id,
        "overallScore": score,
        "competence1Score": score / 5,
        "competence2Score": score / 5,
        "competence3Score": score / 5,
        "competence4Score": score / 5,
        "competence5Score": score / 5,
        "generalComment": "Solid argumentation.",
        "type": "AI_GENERATED",
        "createdAt": "2024-05-01T12:05:00"
    }))
    .unwrap()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Create,
    Get,
    Update,
    Delete,
    List,
    ListByStatus,
    Search,
    Submit,
    Feedbacks,
    Feedback,
    UserFeedbacks,
    Stats,
}

#[derive(Debug, Clone, Copy)]
pub struct Call {
    pub op: Op,
    pub at: Instant,
}

#[derive(Default)]
struct Script {
    essays: HashMap<EssayId, Essay>,
    feedbacks: HashMap<EssayId, Vec<Feedback>>,
    calls: Vec<Call>,
    gets: u32,
    /// (get number, essay) turning the essay ANALYZED from that get on
    analyzed_at_get: Option<(u32, EssayId)>,
    /// (get number, feedback) making the feedback visible from that get on
    feedback_at_get: Option<(u32, Feedback)>,
    failing_gets: bool,
    /// Every get from this number on is rejected with a 401
    expired_at_get: Option<u32>,
    fail_submit: bool,
    fail_stats: bool,
    hold_gets: bool,
    next_id: EssayId,
}

/// In-memory gateway driven by a script, recording every call with the
/// (paused) Tokio clock.
#[derive(Default)]
pub struct FakeGateway {
    script: Mutex<Script>,
    release: Notify,
    submit_latency: Mutex<Duration>,
}

impl FakeGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_essay(self: &Arc<Self>, essay: Essay) -> Arc<Self> {
        let mut script = self.script.lock().unwrap();
        script.next_id = script.next_id.max(essay.id + 1);
        script.essays.insert(essay.id, essay);
        drop(script);
        Arc::clone(self)
    }

    pub fn set_feedbacks(&self, essay_id: EssayId, feedbacks: Vec<Feedback>) {
        self.script.lock().unwrap().feedbacks.insert(essay_id, feedbacks);
    }

    pub fn analyze_at_get(&self, n: u32, essay_id: EssayId) {
        self.script.lock().unwrap().analyzed_at_get = Some((n, essay_id));
    }

    pub fn feedback_at_get(&self, n: u32, feedback: Feedback) {
        self.script.lock().unwrap().feedback_at_get = Some((n, feedback));
    }

    pub fn fail_gets(&self, fail: bool) {
        self.script.lock().unwrap().failing_gets = fail;
    }

    pub fn expire_session_at_get(&self, n: u32) {
        self.script.lock().unwrap().expired_at_get = Some(n);
    }

    pub fn fail_submit(&self, fail: bool) {
        self.script.lock().unwrap().fail_submit = fail;
    }

    pub fn fail_stats(&self, fail: bool) {
        self.script.lock().unwrap().fail_stats = fail;
    }

    /// Park every `get` until [`release_gets`](Self::release_gets).
    pub fn hold_gets(&self, hold: bool) {
        self.script.lock().unwrap().hold_gets = hold;
    }

    pub fn release_gets(&self) {
        self.script.lock().unwrap().hold_gets = false;
        self.release.notify_waiters();
    }

    pub fn set_submit_latency(&self, latency: Duration) {
        *self.submit_latency.lock().unwrap() = latency;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.script.lock().unwrap().calls.clone()
    }

    pub fn count(&self, op: Op) -> usize {
        self.calls().iter().filter(|c| c.op == op).count()
    }

    pub fn times(&self, op: Op) -> Vec<Instant> {
        self.calls()
            .iter()
            .filter(|c| c.op == op)
            .map(|c| c.at)
            .collect()
    }

    pub fn server_essay(&self, id: EssayId) -> Option<Essay> {
        self.script.lock().unwrap().essays.get(&id).cloned()
    }

    fn record(&self, op: Op) {
        self.script.lock().unwrap().calls.push(Call {
            op,
            at: Instant::now(),
        });
    }

    fn not_found(id: EssayId) -> ApiError {
        ApiError::Client {
            status: 404,
            message: format!("Essay {id} not found"),
        }
    }

    fn unavailable() -> ApiError {
        ApiError::Server {
            status: 503,
            message: "Service Unavailable".to_string(),
        }
    }
}

#[async_trait]
impl EssayGateway for FakeGateway {
    async fn create(&self, draft: &EssayDraft) -> Result<Essay, ApiError> {
        self.record(Op::Create);
        let mut script = self.script.lock().unwrap();
        script.next_id = script.next_id.max(1);
        let id = script.next_id;
        script.next_id += 1;
        let mut created = essay(id, EssayStatus::Draft);
        created.title = draft.title.clone();
        created.theme = draft.theme.clone();
        created.content = draft.content.clone();
        script.essays.insert(id, created.clone());
        Ok(created)
    }

    async fn get(&self, id: EssayId) -> Result<Essay, ApiError> {
        self.record(Op::Get);
        let held = self.script.lock().unwrap().hold_gets;
        if held {
            self.release.notified().await;
        }

        let mut script = self.script.lock().unwrap();
        script.gets += 1;
        let n = script.gets;
        if script.failing_gets {
            return Err(Self::unavailable());
        }
        if script.expired_at_get.is_some_and(|at| n >= at) {
            return Err(ApiError::Authentication("Token expired".to_string()));
        }
        if let Some((at, essay_id)) = script.analyzed_at_get {
            if n >= at {
                if let Some(e) = script.essays.get_mut(&essay_id) {
                    e.status = EssayStatus::Analyzed;
                }
            }
        }
        if let Some((at, fb)) = script.feedback_at_get.clone() {
            if n >= at {
                let essay_id = fb.essay_id.unwrap_or(id);
                script.feedbacks.insert(essay_id, vec![fb]);
            }
        }
        script.essays.get(&id).cloned().ok_or_else(|| Self::not_found(id))
    }

    async fn update(&self, id: EssayId, draft: &EssayDraft) -> Result<Essay, ApiError> {
        self.record(Op::Update);
        let mut script = self.script.lock().unwrap();
        let essay = script
            .essays
            .get_mut(&id)
            .ok_or_else(|| Self::not_found(id))?;
        essay.title = draft.title.clone();
        essay.theme = draft.theme.clone();
        essay.content = draft.content.clone();
        Ok(essay.clone())
    }

    async fn delete(&self, id: EssayId) -> Result<(), ApiError> {
        self.record(Op::Delete);
        self.script
            .lock()
            .unwrap()
            .essays
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| Self::not_found(id))
    }

    async fn list(&self, query: &EssayQuery) -> Result<Page<Essay>, ApiError> {
        self.record(Op::List);
        let script = self.script.lock().unwrap();
        let mut all: Vec<Essay> = script.essays.values().cloned().collect();
        all.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));
        let total = all.len() as u64;
        let start = (query.page * query.size) as usize;
        let content: Vec<Essay> = all
            .into_iter()
            .skip(start)
            .take(query.size as usize)
            .collect();
        let total_pages = ((total + query.size as u64 - 1) / query.size as u64) as u32;
        Ok(Page {
            content,
            total_elements: total,
            total_pages,
            size: query.size,
            number: query.page,
            first: query.page == 0,
            last: query.page + 1 >= total_pages,
        })
    }

    async fn list_by_status(&self, status: EssayStatus) -> Result<Vec<Essay>, ApiError> {
        self.record(Op::ListByStatus);
        let script = self.script.lock().unwrap();
        let mut found: Vec<Essay> = script
            .essays
            .values()
            .filter(|e| e.status == status)
            .cloned()
            .collect();
        found.sort_by_key(|e| e.id);
        Ok(found)
    }

    async fn search(&self, keyword: &str, page: u32, size: u32) -> Result<Page<Essay>, ApiError> {
        self.record(Op::Search);
        let script = self.script.lock().unwrap();
        let content: Vec<Essay> = script
            .essays
            .values()
            .filter(|e| e.title.contains(keyword))
            .cloned()
            .collect();
        Ok(Page {
            total_elements: content.len() as u64,
            content,
            total_pages: 1,
            size,
            number: page,
            first: true,
            last: true,
        })
    }

    async fn submit_for_analysis(&self, id: EssayId) -> Result<Essay, ApiError> {
        self.record(Op::Submit);
        let latency = *self.submit_latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        let mut script = self.script.lock().unwrap();
        if script.fail_submit {
            return Err(Self::unavailable());
        }
        script.feedbacks.remove(&id);
        let essay = script
            .essays
            .get_mut(&id)
            .ok_or_else(|| Self::not_found(id))?;
        essay.status = EssayStatus::Submitted;
        essay.submitted_at = Some(Utc::now());
        Ok(essay.clone())
    }

    async fn feedbacks_for_essay(&self, id: EssayId) -> Result<Vec<Feedback>, ApiError> {
        self.record(Op::Feedbacks);
        Ok(self
            .script
            .lock()
            .unwrap()
            .feedbacks
            .get(&id)
            .cloned()
            .unwrap_or_default())
    }

    async fn feedback(&self, id: FeedbackId) -> Result<Feedback, ApiError> {
        self.record(Op::Feedback);
        self.script
            .lock()
            .unwrap()
            .feedbacks
            .values()
            .flatten()
            .find(|f| f.id == id)
            .cloned()
            .ok_or(ApiError::Client {
                status: 404,
                message: format!("Feedback {id} not found"),
            })
    }

    async fn user_feedbacks(&self) -> Result<Vec<Feedback>, ApiError> {
        self.record(Op::UserFeedbacks);
        Ok(self
            .script
            .lock()
            .unwrap()
            .feedbacks
            .values()
            .flatten()
            .cloned()
            .collect())
    }

    async fn user_stats(&self) -> Result<UserStats, ApiError> {
        self.record(Op::Stats);
        let script = self.script.lock().unwrap();
        if script.fail_stats {
            return Err(Self::unavailable());
        }
        let scores: Vec<u32> = script
            .feedbacks
            .values()
            .flatten()
            .filter_map(|f| f.overall_score)
            .collect();
        let average_score = if scores.is_empty() {
            0.0
        } else {
            scores.iter().sum::<u32>() as f64 / scores.len() as f64
        };
        Ok(UserStats {
            average_score,
            feedback_count: scores.len() as u64,
            total_essays: script.essays.len() as u64,
        })
    }
}

/// Notifier with a sink that keeps every notification.
pub fn collecting_notifier() -> (Notifier, Arc<Mutex<Vec<Notification>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let notifier = Notifier::new();
    let sink = Arc::clone(&seen);
    notifier.register(Arc::new(move |n: Notification| sink.lock().unwrap().push(n)));
    (notifier, seen)
}

pub fn kinds(seen: &Arc<Mutex<Vec<Notification>>>) -> Vec<NotificationKind> {
    seen.lock().unwrap().iter().map(|n| n.kind).collect()
}

/// Wait (in virtual time) until the view satisfies `pred`.
pub async fn wait_for(
    rx: &mut watch::Receiver<FeedbackView>,
    pred: impl Fn(&FeedbackView) -> bool,
) -> FeedbackView {
    tokio::time::timeout(Duration::from_secs(3600), async {
        loop {
            {
                let view = rx.borrow_and_update();
                if pred(&view) {
                    return (*view).clone();
                }
            }
            rx.changed().await.expect("poller dropped");
        }
    })
    .await
    .expect("poller never reached the expected state")
}

pub async fn wait_for_phase(
    rx: &mut watch::Receiver<FeedbackView>,
    phase: PollPhase,
) -> FeedbackView {
    wait_for(rx, move |v| v.phase == phase).await
}
