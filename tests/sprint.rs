//! End-to-end scenarios for the sprint agent

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::json;

use common::{
    completion_cascade, dispatcher, item, item_cascade, MockCompletion, StaticCiSource,
    StaticItemSource,
};
use overseer::sources::{ItemState, WorkItemSource};
use overseer::{Candidate, Cascade, Event, MemorySink};

fn sprint_dispatcher(
    items: Arc<Cascade<Arc<dyn WorkItemSource>>>,
    sink: Arc<MemorySink>,
) -> overseer::Dispatcher {
    dispatcher(
        Arc::new(StaticCiSource::new()),
        items,
        completion_cascade(None),
        sink,
    )
}

#[tokio::test]
async fn test_full_sprint_report() {
    common::init_tracing();
    let mut overdue = item(4, ItemState::Open, &["vendor-in-progress"]);
    overdue.due_date = Some(Utc::now() - Duration::days(3));

    let source = StaticItemSource::new().with_items(
        "org/repo",
        vec![
            item(1, ItemState::Open, &["blocked", "points:3"]),
            item(2, ItemState::Open, &["points:2"]),
            item(3, ItemState::Closed, &["points:5"]),
            overdue,
        ],
    );
    let sink = Arc::new(MemorySink::new());
    let d = sprint_dispatcher(item_cascade(Some(Arc::new(source))), sink.clone());

    let event = Event::new("sprint_status", json!({"repositories": ["org/repo"]}));
    let envelope = d.dispatch(event).await;

    assert!(envelope.is_success(), "unexpected error: {:?}", envelope.error);
    assert_eq!(envelope.agent.as_deref(), Some("sprint"));

    let metrics = &envelope.payload["metrics"];
    assert_eq!(metrics["total_items"], 4);
    assert_eq!(metrics["open_items"], 3);
    assert_eq!(metrics["closed_items"], 1);
    assert_eq!(metrics["blocked_items"], 1);
    assert_eq!(metrics["overdue_items"], 1);
    // 5 completed of 10 total points.
    assert_eq!(metrics["total_points"], 10);
    assert_eq!(metrics["completed_points"], 5);
    assert_eq!(metrics["completion_rate"], 50.0);
    assert!(metrics["velocity_per_day"].as_f64().unwrap() > 0.0);
    assert_eq!(metrics["health"], "at_risk");

    let vendor = &envelope.payload["vendor"];
    assert_eq!(vendor["summary"]["in_progress"], 1);
    assert_eq!(vendor["summary"]["overdue"], 1);
    assert_eq!(vendor["deliverables"].as_array().unwrap().len(), 1);

    let recommendations = envelope.payload["recommendations"].as_array().unwrap();
    assert!(!recommendations.is_empty());

    let entries = sink.entries().await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].agent, "sprint");
    assert_eq!(entries[0].outcome, "at_risk");
}

#[tokio::test]
async fn test_item_source_cascade_falls_back_to_second_candidate() {
    let fallback = Arc::new(
        StaticItemSource::new().with_items("org/repo", vec![item(1, ItemState::Closed, &[])]),
    );
    let counter = fallback.call_counter();

    let unavailable: Arc<dyn WorkItemSource> = Arc::new(StaticItemSource::new());
    let preferred = unavailable.clone();
    let fallback_source: Arc<dyn WorkItemSource> = fallback;
    let cascade = Arc::new(
        Cascade::new()
            .candidate(Candidate::new(
                "project_board",
                || false,
                move || preferred.clone(),
            ))
            .candidate(Candidate::always("issue_tracker", move || {
                fallback_source.clone()
            })),
    );

    let d = sprint_dispatcher(cascade, Arc::new(MemorySink::new()));
    let event = Event::new("sprint_query", json!({"repositories": ["org/repo"]}));
    let envelope = d.dispatch(event).await;

    assert!(envelope.is_success());
    // Open and closed fetches against the fallback source only.
    assert_eq!(counter.load(Ordering::SeqCst), 2);
    assert_eq!(envelope.payload["metrics"]["closed_items"], 1);
}

#[tokio::test]
async fn test_no_item_source_at_all_is_fatal() {
    let d = sprint_dispatcher(item_cascade(None), Arc::new(MemorySink::new()));
    let event = Event::new("sprint_status", json!({"repositories": ["org/repo"]}));
    let envelope = d.dispatch(event).await;

    assert!(!envelope.is_success());
    assert_eq!(envelope.agent.as_deref(), Some("sprint"));
    assert!(envelope
        .error
        .as_deref()
        .unwrap()
        .contains("no work item source"));
}

#[tokio::test]
async fn test_every_repository_failing_is_fatal() {
    let source = StaticItemSource::new()
        .with_failing_repo("org/api")
        .with_failing_repo("org/web");
    let d = sprint_dispatcher(
        item_cascade(Some(Arc::new(source))),
        Arc::new(MemorySink::new()),
    );

    let event = Event::new(
        "sprint_status",
        json!({"repositories": ["org/api", "org/web"]}),
    );
    let envelope = d.dispatch(event).await;

    assert!(!envelope.is_success());
    assert!(envelope
        .error
        .as_deref()
        .unwrap()
        .contains("no sprint data"));
}

#[tokio::test]
async fn test_one_failing_repository_is_isolated() {
    let source = StaticItemSource::new()
        .with_items("org/api", vec![item(1, ItemState::Closed, &[])])
        .with_items("org/web", vec![item(2, ItemState::Closed, &[])])
        .with_failing_repo("org/infra");
    let d = sprint_dispatcher(
        item_cascade(Some(Arc::new(source))),
        Arc::new(MemorySink::new()),
    );

    let event = Event::new(
        "sprint_status",
        json!({"repositories": ["org/api", "org/infra", "org/web"]}),
    );
    let envelope = d.dispatch(event).await;

    assert!(envelope.is_success());
    assert_eq!(envelope.payload["metrics"]["total_items"], 2);
    assert_eq!(
        envelope.payload["repositories"].as_array().unwrap().len(),
        2
    );
}

#[tokio::test]
async fn test_blockers_query_produces_unblock_recommendations() {
    let source = StaticItemSource::new().with_items(
        "org/repo",
        vec![
            item(7, ItemState::Open, &["blocked"]),
            item(8, ItemState::Open, &[]),
        ],
    );
    let d = sprint_dispatcher(
        item_cascade(Some(Arc::new(source))),
        Arc::new(MemorySink::new()),
    );

    let event = Event::new(
        "sprint_query",
        json!({"repositories": ["org/repo"], "query_type": "blockers"}),
    );
    let envelope = d.dispatch(event).await;

    assert!(envelope.is_success());
    let recommendations = envelope.payload["recommendations"].as_array().unwrap();
    assert!(recommendations
        .iter()
        .any(|r| r.as_str().unwrap().contains("Unblock #7")));
}

#[tokio::test]
async fn test_vendor_blocked_items_get_unblock_recommendations() {
    let source = StaticItemSource::new().with_items(
        "org/repo",
        vec![
            item(11, ItemState::Open, &["vendor-blocked"]),
            item(12, ItemState::Open, &[]),
        ],
    );
    let d = sprint_dispatcher(
        item_cascade(Some(Arc::new(source))),
        Arc::new(MemorySink::new()),
    );

    let event = Event::new(
        "sprint_query",
        json!({"repositories": ["org/repo"], "query_type": "blockers"}),
    );
    let envelope = d.dispatch(event).await;

    assert!(envelope.is_success());
    // The vendor-blocked item counts as blocked and gets an unblock
    // recommendation, same as a plain blocked label.
    assert_eq!(envelope.payload["metrics"]["blocked_items"], 1);
    let recommendations = envelope.payload["recommendations"].as_array().unwrap();
    assert!(recommendations
        .iter()
        .any(|r| r.as_str().unwrap().contains("Unblock #11")));
}

#[tokio::test]
async fn test_vendor_tracking_can_be_switched_off() {
    let source = StaticItemSource::new().with_items(
        "org/repo",
        vec![item(1, ItemState::Open, &["vendor-review"])],
    );
    let d = sprint_dispatcher(
        item_cascade(Some(Arc::new(source))),
        Arc::new(MemorySink::new()),
    );

    let event = Event::new(
        "sprint_status",
        json!({"repositories": ["org/repo"], "include_vendor": false}),
    );
    let envelope = d.dispatch(event).await;

    assert!(envelope.is_success());
    assert!(envelope.payload["vendor"].is_null());
}

#[tokio::test]
async fn test_provider_summary_replaces_rule_based_text() {
    let source = StaticItemSource::new()
        .with_items("org/repo", vec![item(1, ItemState::Closed, &[])]);
    let completion = Arc::new(MockCompletion::new(
        r#"{"summary": "sprint is comfortably on track", "recommendations": []}"#,
    ));
    let d = dispatcher(
        Arc::new(StaticCiSource::new()),
        item_cascade(Some(Arc::new(source))),
        completion_cascade(Some(completion)),
        Arc::new(MemorySink::new()),
    );

    let event = Event::new("sprint_status", json!({"repositories": ["org/repo"]}));
    let envelope = d.dispatch(event).await;

    assert!(envelope.is_success());
    assert_eq!(
        envelope.payload["summary"],
        "sprint is comfortably on track"
    );
    assert_eq!(envelope.payload["analysis_source"], "mock");
}
