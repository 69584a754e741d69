//! Essay actions
//!
//! What a screen does when the user acts on essays: one gateway call, one
//! cache mutation, at most one notice. Failures were already surfaced by the
//! [`ApiClient`](crate::api::ApiClient) and are only returned here.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use mentor_types::{
    Essay, EssayDraft, EssayId, EssayQuery, EssaySortField, EssayStatus, Feedback, Page,
    SortDirection, UserStats,
};
use tracing::{debug, info};

use crate::error::ApiError;
use crate::gateway::EssayGateway;
use crate::notify::{NotificationKind, Notifier};
use crate::store::EssayStore;

const DASHBOARD_RECENT: u32 = 5;

/// An analyzed essay with the score of its latest feedback.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredEssay {
    pub essay: Essay,
    pub feedback: Option<Feedback>,
}

impl ScoredEssay {
    pub fn score(&self) -> Option<u32> {
        self.feedback.as_ref().and_then(|f| f.overall_score)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardSummary {
    /// Most recently updated first
    pub recent: Vec<Essay>,
    pub total_essays: u64,
    /// `None` when the stats endpoint failed
    pub stats: Option<UserStats>,
}

#[derive(Clone)]
pub struct EssayActions {
    gateway: Arc<dyn EssayGateway>,
    /// Used for secondary lookups whose failure only degrades the result.
    lookups: Arc<dyn EssayGateway>,
    store: EssayStore,
    notifier: Notifier,
    submitting: Arc<Mutex<HashSet<EssayId>>>,
    creating: Arc<AtomicBool>,
}

impl std::fmt::Debug for EssayActions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EssayActions")
            .field("store", &self.store)
            .finish()
    }
}

impl EssayActions {
    pub fn new(gateway: Arc<dyn EssayGateway>, store: EssayStore, notifier: Notifier) -> Self {
        Self {
            lookups: Arc::clone(&gateway),
            gateway,
            store,
            notifier,
            submitting: Arc::new(Mutex::new(HashSet::new())),
            creating: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Gateway for per-essay score and stats lookups, typically a silent one.
    pub fn with_lookup_gateway(mut self, lookups: Arc<dyn EssayGateway>) -> Self {
        self.lookups = lookups;
        self
    }

    pub fn store(&self) -> &EssayStore {
        &self.store
    }

    pub async fn load_page(&self, query: &EssayQuery) -> Result<Page<Essay>, ApiError> {
        self.store.set_loading(true);
        let result = self.gateway.list(query).await;
        self.store.set_loading(false);
        match result {
            Ok(page) => {
                debug!(
                    page = page.number,
                    returned = page.content.len(),
                    total = page.total_elements,
                    "essay page loaded"
                );
                self.store.set_error(None);
                self.store.set_essays(page.content.clone());
                Ok(page)
            }
            Err(err) => {
                self.store.set_error(Some(err.to_string()));
                Err(err)
            }
        }
    }

    pub async fn load_by_status(&self, status: EssayStatus) -> Result<Vec<Essay>, ApiError> {
        self.store.set_loading(true);
        let result = self.gateway.list_by_status(status).await;
        self.store.set_loading(false);
        match result {
            Ok(essays) => {
                self.store.set_error(None);
                self.store.set_essays(essays.clone());
                Ok(essays)
            }
            Err(err) => {
                self.store.set_error(Some(err.to_string()));
                Err(err)
            }
        }
    }

    /// Load one essay and make it the current one.
    pub async fn open(&self, id: EssayId) -> Result<Essay, ApiError> {
        let essay = self.gateway.get(id).await?;
        self.store.set_current(Some(essay.clone()));
        Ok(essay)
    }

    pub async fn create_draft(&self, draft: &EssayDraft) -> Result<Essay, ApiError> {
        let essay = self.gateway.create(draft).await?;
        info!(essay_id = essay.id, "draft created");
        self.store.add(essay.clone());
        self.notifier.success("Draft saved successfully!");
        Ok(essay)
    }

    pub async fn save(&self, id: EssayId, draft: &EssayDraft) -> Result<Essay, ApiError> {
        let essay = self.gateway.update(id, draft).await?;
        self.store.update(essay.clone());
        self.notifier.success("Essay updated successfully!");
        Ok(essay)
    }

    pub async fn delete(&self, id: EssayId) -> Result<(), ApiError> {
        self.gateway.delete(id).await?;
        info!(essay_id = id, "essay deleted");
        self.store.remove(id);
        self.notifier.success("Essay deleted successfully!");
        Ok(())
    }

    /// Send an existing essay for analysis.
    ///
    /// `Ok(None)` when a submission for the same essay is already running.
    pub async fn submit(&self, id: EssayId) -> Result<Option<Essay>, ApiError> {
        let Some(_guard) = SubmitGuard::acquire(&self.submitting, id) else {
            debug!(essay_id = id, "submission already in flight");
            return Ok(None);
        };
        let essay = self.gateway.submit_for_analysis(id).await?;
        self.store.upsert(essay.clone());
        self.announce_submission(&essay);
        Ok(Some(essay))
    }

    /// Create a new essay and send it for analysis right away.
    ///
    /// `Ok(None)` when another new-essay submission is already running. If
    /// the submit step fails the essay stays cached as a draft.
    pub async fn create_and_submit(&self, draft: &EssayDraft) -> Result<Option<Essay>, ApiError> {
        let Some(_guard) = CreateGuard::acquire(&self.creating) else {
            debug!("new-essay submission already in flight");
            return Ok(None);
        };
        self.create_then_submit(draft).await.map(Some)
    }

    async fn create_then_submit(&self, draft: &EssayDraft) -> Result<Essay, ApiError> {
        let created = self.gateway.create(draft).await?;
        self.store.add(created.clone());

        let Some(_guard) = SubmitGuard::acquire(&self.submitting, created.id) else {
            return Ok(created);
        };
        let essay = self.gateway.submit_for_analysis(created.id).await?;
        self.store.update(essay.clone());
        self.announce_submission(&essay);
        Ok(essay)
    }

    fn announce_submission(&self, essay: &Essay) {
        info!(essay_id = essay.id, status = %essay.status, "essay submitted for analysis");
        self.notifier.notify(
            NotificationKind::Success,
            "Essay sent for analysis. Please wait while it is being analyzed...",
            Some("Essay Submitted"),
        );
    }

    /// Analyzed essays with the score of their latest feedback. A failed
    /// feedback lookup leaves that essay without a score.
    pub async fn analyzed_with_scores(&self) -> Result<Vec<ScoredEssay>, ApiError> {
        let essays = self.gateway.list_by_status(EssayStatus::Analyzed).await?;
        let mut scored = Vec::with_capacity(essays.len());
        for essay in essays {
            let feedback = match self.lookups.feedbacks_for_essay(essay.id).await {
                Ok(feedbacks) => feedbacks.into_iter().next(),
                Err(err) => {
                    debug!(essay_id = essay.id, error = %err, "score lookup failed");
                    None
                }
            };
            scored.push(ScoredEssay { essay, feedback });
        }
        Ok(scored)
    }

    pub async fn dashboard(&self) -> Result<DashboardSummary, ApiError> {
        let query = EssayQuery::page(0, DASHBOARD_RECENT)
            .sorted(EssaySortField::UpdatedAt, SortDirection::Desc);
        let page = self.gateway.list(&query).await?;
        let stats = match self.lookups.user_stats().await {
            Ok(stats) => Some(stats),
            Err(err) => {
                debug!(error = %err, "stats unavailable");
                None
            }
        };
        Ok(DashboardSummary {
            total_essays: page.total_elements,
            recent: page.content,
            stats,
        })
    }
}

/// Holds an essay id in the in-flight set until dropped.
struct SubmitGuard<'a> {
    set: &'a Mutex<HashSet<EssayId>>,
    id: EssayId,
}

impl<'a> SubmitGuard<'a> {
    fn acquire(set: &'a Mutex<HashSet<EssayId>>, id: EssayId) -> Option<Self> {
        let inserted = set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id);
        inserted.then_some(Self { set, id })
    }
}

impl Drop for SubmitGuard<'_> {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}

struct CreateGuard<'a>(&'a AtomicBool);

impl<'a> CreateGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        (!flag.swap(true, Ordering::SeqCst)).then_some(Self(flag))
    }
}

impl Drop for CreateGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
