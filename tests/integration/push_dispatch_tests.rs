/*!
 * Integration tests for outbox delivery
 */

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use confessions::database::PushEventStatus;
use confessions::push::mock::MockNotifier;
use confessions::push::{DispatchSummary, FcmNotifier, PushDispatcher};

use crate::common;

#[tokio::test]
async fn test_dispatchPending_shouldDeliverQueuedApproval() -> Result<()> {
    let manager = common::create_manager();
    let a = common::submit(&manager, "hello", "u1").await;
    manager.approve(a.id, 1).await?;

    let notifier = Arc::new(MockNotifier::working());
    let dispatcher = PushDispatcher::new(manager.repository().clone(), notifier.clone(), 10);

    let summary = dispatcher.dispatch_pending().await?;

    assert_eq!(summary, DispatchSummary { delivered: 1, failed: 0 });
    let sent = notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "push-u1");
    assert_eq!(sent[0].notification.body, "Thật tuyệt vời!");

    let events = manager.repository().push_events_for(a.id).await?;
    assert_eq!(events[0].status, PushEventStatus::Delivered);

    Ok(())
}

#[tokio::test]
async fn test_dispatchPending_withFailure_shouldMarkFailedAndNotRetry() -> Result<()> {
    let manager = common::create_manager();
    let a = common::submit(&manager, "hello", "u1").await;
    manager.approve(a.id, 1).await?;

    let notifier = Arc::new(MockNotifier::failing());
    let dispatcher = PushDispatcher::new(manager.repository().clone(), notifier.clone(), 10);

    let first = dispatcher.dispatch_pending().await?;
    let second = dispatcher.dispatch_pending().await?;

    assert_eq!(first, DispatchSummary { delivered: 0, failed: 1 });
    assert_eq!(second.total(), 0);
    assert_eq!(notifier.attempts(), 1);

    let events = manager.repository().push_events_for(a.id).await?;
    assert_eq!(events[0].status, PushEventStatus::Failed);
    assert!(events[0].last_error.as_deref().unwrap_or("").contains("Mock push failure"));

    // The moderation outcome is unaffected
    assert_eq!(manager.fetch_by_id(a.id).await?.cfs_id, 1);

    Ok(())
}

#[tokio::test]
async fn test_dispatchPending_shouldDrainMoreThanOneBatch() -> Result<()> {
    let manager = common::create_manager();
    for i in 0..5 {
        let c = common::submit(&manager, &format!("c{}", i), &format!("u{}", i)).await;
        manager.approve(c.id, 1).await?;
    }

    let notifier = Arc::new(MockNotifier::failing_for("push-u2"));
    let dispatcher = PushDispatcher::new(manager.repository().clone(), notifier.clone(), 2);

    let summary = dispatcher.dispatch_pending().await?;

    assert_eq!(summary, DispatchSummary { delivered: 4, failed: 1 });
    assert!(manager.repository().pending_push_events(10).await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_dispatchPending_shouldUseTokenCapturedAtTransition() -> Result<()> {
    let manager = common::create_manager();
    let a = common::submit(&manager, "hello", "u1").await;
    manager.reject(a.id, 1, "no").await?;
    manager.sync_push_id("u1", "new-token").await;

    let notifier = Arc::new(MockNotifier::working());
    let dispatcher = PushDispatcher::new(manager.repository().clone(), notifier.clone(), 10);
    dispatcher.dispatch_pending().await?;

    assert_eq!(notifier.sent()[0].to, "push-u1");

    Ok(())
}

#[tokio::test]
async fn test_dispatchPending_throughFcmClient_shouldPostToEndpoint() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/fcm/send"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"success":1,"failure":0}"#))
        .expect(2)
        .mount(&server)
        .await;

    let manager = common::create_manager();
    let a = common::submit(&manager, "a", "u1").await;
    let b = common::submit(&manager, "b", "u2").await;
    manager.approve(a.id, 1).await?;
    manager.approve(b.id, 1).await?;

    let notifier = Arc::new(FcmNotifier::new(
        format!("{}/fcm/send", server.uri()),
        "test-key",
        Duration::from_secs(5),
    ));
    let dispatcher = PushDispatcher::new(manager.repository().clone(), notifier, 10);

    let summary = dispatcher.dispatch_pending().await?;

    assert_eq!(summary.delivered, 2);
    Ok(())
}

#[tokio::test]
async fn test_run_shouldDeliverEventsQueuedLater() -> Result<()> {
    let manager = common::create_manager();
    let notifier = Arc::new(MockNotifier::working());
    let dispatcher = PushDispatcher::new(manager.repository().clone(), notifier.clone(), 10);

    let task = tokio::spawn(async move {
        dispatcher.run(Duration::from_millis(10)).await;
    });

    let a = common::submit(&manager, "late", "u1").await;
    manager.approve(a.id, 1).await?;

    let mut delivered = false;
    for _ in 0..100 {
        if !notifier.sent().is_empty() {
            delivered = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    task.abort();

    assert!(delivered);
    Ok(())
}

#[tokio::test]
async fn test_pruneProcessed_withRetention_shouldKeepPendingEvents() -> Result<()> {
    let manager = common::create_manager();
    let a = common::submit(&manager, "a", "u1").await;
    manager.approve(a.id, 1).await?;

    let notifier = Arc::new(MockNotifier::working());
    let dispatcher = PushDispatcher::new(manager.repository().clone(), notifier, 10)
        .with_retention(Some(Duration::ZERO));
    dispatcher.dispatch_pending().await?;

    let b = common::submit(&manager, "b", "u2").await;
    manager.approve(b.id, 1).await?;

    tokio::time::sleep(Duration::from_millis(5)).await;
    let removed = dispatcher.prune_processed().await?;

    assert_eq!(removed, 1);
    assert!(manager.repository().push_events_for(a.id).await?.is_empty());
    assert_eq!(manager.repository().pending_push_events(10).await?.len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_pruneProcessed_withoutRetention_shouldKeepEverything() -> Result<()> {
    let manager = common::create_manager();
    let a = common::submit(&manager, "a", "u1").await;
    manager.approve(a.id, 1).await?;

    let dispatcher = PushDispatcher::new(
        manager.repository().clone(),
        Arc::new(MockNotifier::working()),
        10,
    );
    dispatcher.dispatch_pending().await?;

    assert_eq!(dispatcher.prune_processed().await?, 0);
    assert_eq!(manager.repository().push_events_for(a.id).await?.len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_run_withZeroInterval_shouldKeepSweeping() -> Result<()> {
    let manager = common::create_manager();
    let notifier = Arc::new(MockNotifier::working());
    let dispatcher = PushDispatcher::new(manager.repository().clone(), notifier.clone(), 10);

    let task = tokio::spawn(async move {
        dispatcher.run(Duration::ZERO).await;
    });

    let a = common::submit(&manager, "a", "u1").await;
    manager.approve(a.id, 1).await?;

    for _ in 0..100 {
        if !notifier.sent().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert!(!task.is_finished());
    task.abort();
    assert_eq!(notifier.sent().len(), 1);

    Ok(())
}
