//! Essay actions and the submit-then-wait flow against the fake gateway.

mod support;

use std::sync::Arc;
use std::time::Duration;

use mentor_client::{
    EssayActions, EssayGateway, EssayStore, FeedbackPoller, NotificationKind, PollPhase,
    PollPolicy,
};
use mentor_types::{EssayDraft, EssayQuery, EssayStatus};

use support::{collecting_notifier, essay, feedback, kinds, wait_for_phase, FakeGateway, Op};

fn draft(title: &str) -> EssayDraft {
    EssayDraft::new(
        title,
        "Challenges of digital inclusion",
        "Lorem ipsum dolor sit amet ".repeat(50),
    )
}

#[tokio::test(start_paused = true)]
async fn test_submit_then_wait_until_feedback_is_ready() {
    let gw = FakeGateway::new().with_essay(essay(42, EssayStatus::Draft));
    gw.analyze_at_get(3, 42);
    gw.feedback_at_get(4, feedback(1, 42, 720));

    let store = EssayStore::new();
    let (notifier, seen) = collecting_notifier();
    let gateway: Arc<dyn EssayGateway> = gw.clone();
    let actions = EssayActions::new(Arc::clone(&gateway), store.clone(), notifier.clone());
    actions.load_page(&EssayQuery::default()).await.unwrap();
    assert_eq!(store.get(42).unwrap().status, EssayStatus::Draft);

    let submitted = actions.submit(42).await.unwrap().expect("not in flight");
    assert_eq!(submitted.status, EssayStatus::Submitted);
    assert_eq!(store.get(42).unwrap().status, EssayStatus::Submitted);

    let poller = FeedbackPoller::new(gateway, notifier, PollPolicy::default())
        .with_store(store.clone());
    let mut rx = poller.subscribe();
    poller.watch_submission(submitted);

    let ready = wait_for_phase(&mut rx, PollPhase::Ready).await;
    assert_eq!(ready.attempts, 4);
    assert_eq!(ready.overall_score(), Some(720));
    assert_eq!(gw.count(Op::Get), 4);
    assert_eq!(gw.count(Op::Submit), 1);
    assert_eq!(store.get(42).unwrap().status, EssayStatus::Analyzed);
    // Only the submission notice; polling itself stays quiet.
    assert_eq!(kinds(&seen), vec![NotificationKind::Success]);
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_submit_is_ignored_while_in_flight() {
    let gw = FakeGateway::new().with_essay(essay(11, EssayStatus::Draft));
    gw.set_submit_latency(Duration::from_millis(500));
    let (notifier, seen) = collecting_notifier();
    let actions = EssayActions::new(gw.clone(), EssayStore::new(), notifier);

    let (first, second) = tokio::join!(actions.submit(11), actions.submit(11));
    assert!(first.unwrap().is_some());
    assert!(second.unwrap().is_none());
    assert_eq!(gw.count(Op::Submit), 1);
    assert_eq!(seen.lock().unwrap().len(), 1);

    // Guard is released once the first call completes.
    assert!(actions.submit(11).await.unwrap().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_create_and_submit_guards_new_essays() {
    let gw = FakeGateway::new();
    gw.set_submit_latency(Duration::from_millis(500));
    let store = EssayStore::new();
    let (notifier, _seen) = collecting_notifier();
    let actions = EssayActions::new(gw.clone(), store.clone(), notifier);

    let new_essay = draft("Digital divide");
    let (first, second) = tokio::join!(
        actions.create_and_submit(&new_essay),
        actions.create_and_submit(&new_essay)
    );
    let essay = first.unwrap().expect("first call proceeds");
    assert!(second.unwrap().is_none());
    assert_eq!(gw.count(Op::Create), 1);
    assert_eq!(essay.status, EssayStatus::Submitted);
    assert_eq!(store.essays().len(), 1);
    assert_eq!(store.get(essay.id).unwrap().status, EssayStatus::Submitted);
}

#[tokio::test]
async fn test_draft_lifecycle_updates_the_cache() {
    let gw = FakeGateway::new();
    let store = EssayStore::new();
    let (notifier, seen) = collecting_notifier();
    let actions = EssayActions::new(gw.clone(), store.clone(), notifier);

    let created = actions.create_draft(&draft("First draft")).await.unwrap();
    assert_eq!(created.status, EssayStatus::Draft);
    assert_eq!(store.essays()[0].id, created.id);

    let saved = actions
        .save(created.id, &draft("Second draft"))
        .await
        .unwrap();
    assert_eq!(store.get(created.id).unwrap().title, saved.title);

    actions.delete(created.id).await.unwrap();
    assert!(store.get(created.id).is_none());
    assert_eq!(
        kinds(&seen),
        vec![NotificationKind::Success; 3],
    );

    // A failed delete leaves the cache alone.
    assert!(actions.delete(created.id).await.is_err());
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_load_page_returns_one_page_with_totals() {
    let gw = FakeGateway::new();
    for id in 1..=12 {
        gw.with_essay(essay(id, EssayStatus::Draft));
    }
    let store = EssayStore::new();
    let (notifier, _seen) = collecting_notifier();
    let actions = EssayActions::new(gw.clone(), store.clone(), notifier);

    let page = actions.load_page(&EssayQuery::page(1, 5)).await.unwrap();
    assert_eq!(page.content.len(), 5);
    assert_eq!(page.total_elements, 12);
    assert_eq!(page.total_pages, 3);
    assert_eq!(store.len(), 5);
    assert!(!store.snapshot().loading);
}

#[tokio::test]
async fn test_analyzed_with_scores_tolerates_missing_feedback() {
    let gw = FakeGateway::new()
        .with_essay(essay(1, EssayStatus::Analyzed))
        .with_essay(essay(2, EssayStatus::Analyzed))
        .with_essay(essay(3, EssayStatus::Draft));
    gw.set_feedbacks(1, vec![feedback(10, 1, 880), feedback(9, 1, 600)]);
    let (notifier, _seen) = collecting_notifier();
    let actions = EssayActions::new(gw.clone(), EssayStore::new(), notifier);

    let scored = actions.analyzed_with_scores().await.unwrap();
    assert_eq!(scored.len(), 2);
    assert_eq!(scored[0].score(), Some(880));
    assert_eq!(scored[1].score(), None);
}

#[tokio::test]
async fn test_dashboard_degrades_when_stats_fail() {
    let gw = FakeGateway::new();
    for id in 1..=7 {
        gw.with_essay(essay(id, EssayStatus::Submitted));
    }
    gw.fail_stats(true);
    let (notifier, _seen) = collecting_notifier();
    let actions = EssayActions::new(gw.clone(), EssayStore::new(), notifier);

    let summary = actions.dashboard().await.unwrap();
    assert_eq!(summary.recent.len(), 5);
    assert_eq!(summary.total_essays, 7);
    assert!(summary.stats.is_none());

    gw.fail_stats(false);
    let summary = actions.dashboard().await.unwrap();
    assert_eq!(summary.stats.unwrap().total_essays, 7);
}
