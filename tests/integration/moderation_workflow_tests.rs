/*!
 * Integration tests for the moderation workflow
 */

use anyhow::Result;
use confessions::database::{ConfessionStatus, Overview, PushEventKind, PushEventStatus};
use confessions::errors::ConfessionError;

use crate::common;

#[tokio::test]
async fn test_moderation_scenario_shouldNumberApprovalsAndResetOnRollback() -> Result<()> {
    let manager = common::create_manager();

    let a = common::submit(&manager, "hello", "u1").await;
    assert_eq!(a.status, ConfessionStatus::Pending);
    assert_eq!(a.cfs_id, 0);

    let a = manager.approve(a.id, 42).await?;
    assert_eq!(a.status, ConfessionStatus::Approved);
    assert_eq!(a.approver, 42);
    assert_eq!(a.cfs_id, 1);

    let b = common::submit(&manager, "second", "u2").await;
    let b = manager.approve(b.id, 42).await?;
    assert_eq!(b.cfs_id, 2);

    let a = manager.rollback_approval(a.id, 42).await?;
    assert_eq!(a.status, ConfessionStatus::Pending);
    assert_eq!(a.approver, 0);
    assert_eq!(a.cfs_id, 0);

    // Reapproving takes a fresh number rather than the freed one
    let a = manager.approve(a.id, 7).await?;
    assert_eq!(a.cfs_id, 3);

    Ok(())
}

#[tokio::test]
async fn test_overview_withMixedStatuses_shouldCountPendingAndRejected() -> Result<()> {
    let manager = common::create_manager();
    let mut ids = Vec::new();
    for i in 0..6 {
        ids.push(common::submit(&manager, &format!("confession {}", i), "u1").await.id);
    }

    manager.approve(ids[0], 1).await?;
    manager.approve(ids[1], 1).await?;
    manager.reject(ids[2], 1, "duplicate").await?;

    let overview = manager.fetch_overview().await?;
    assert_eq!(overview, Overview { total: 6, pending: 3, rejected: 1 });

    Ok(())
}

#[tokio::test]
async fn test_reject_withNonPendingStatus_shouldFailAndLeaveRecord() -> Result<()> {
    let manager = common::create_manager();
    let a = common::submit(&manager, "hello", "u1").await;
    let approved = manager.approve(a.id, 1).await?;

    let result = manager.reject(a.id, 2, "too late").await;

    assert!(matches!(result, Err(ConfessionError::InvalidState(_))));
    assert_eq!(manager.fetch_by_id(a.id).await?, approved);

    Ok(())
}

#[test]
fn test_approve_withUnknownId_shouldFailWithNotFound() {
    let manager = common::create_manager();

    let result = tokio_test::block_on(manager.approve(404, 1));

    assert_eq!(result, Err(ConfessionError::NotFound(404)));
}

#[tokio::test]
async fn test_nextConfessionId_shouldFollowHighestNumber() -> Result<()> {
    let manager = common::create_manager();
    assert_eq!(manager.next_confession_id().await?, 1);

    let a = common::submit(&manager, "a", "u1").await;
    manager.approve(a.id, 1).await?;
    assert_eq!(manager.next_confession_id().await?, 2);

    // Deleted rows keep their number reserved
    manager.soft_delete(a.id).await?;
    assert_eq!(manager.next_confession_id().await?, 2);

    Ok(())
}

#[tokio::test]
async fn test_search_shouldReturnOnlyApprovedMatchesNewestFirst() -> Result<()> {
    let manager = common::create_manager();
    let first = common::submit(&manager, "hello there", "u1").await;
    let second = common::submit(&manager, "well HELLO again", "u2").await;
    let pending = common::submit(&manager, "hello pending", "u3").await;
    let unrelated = common::submit(&manager, "goodbye", "u4").await;

    manager.approve(first.id, 1).await?;
    manager.approve(second.id, 1).await?;
    manager.approve(unrelated.id, 1).await?;

    let found = manager.search("hello").await?;

    let ids: Vec<i64> = found.iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![second.id, first.id]);
    assert!(!ids.contains(&pending.id));

    Ok(())
}

#[tokio::test]
async fn test_search_shouldCapResultsAtFifty() -> Result<()> {
    let manager = common::create_manager();
    for i in 0..55 {
        let c = common::submit(&manager, &format!("hello #{}", i), "u1").await;
        manager.approve(c.id, 1).await?;
    }

    let found = manager.search("hello").await?;

    assert_eq!(found.len(), 50);
    assert!(found.windows(2).all(|w| w[0].id > w[1].id));

    Ok(())
}

#[tokio::test]
async fn test_fetchApproved_andBySender_shouldFilterAndLimit() -> Result<()> {
    let manager = common::create_manager();
    let a = common::submit(&manager, "a", "u1").await;
    let b = common::submit(&manager, "b", "u1").await;
    common::submit(&manager, "c", "u2").await;
    manager.approve(a.id, 1).await?;
    manager.approve(b.id, 1).await?;

    let approved = manager.fetch_approved(1).await?;
    assert_eq!(approved.len(), 1);
    assert_eq!(approved[0].id, b.id);

    let mine = manager.fetch_by_sender("u1", 10).await?;
    assert_eq!(mine.len(), 2);
    assert!(mine.iter().all(|c| c.sender == "u1"));

    assert!(manager.fetch_all(0).await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_syncPushId_withBlankToken_shouldKeepRecordsSavable() -> Result<()> {
    let manager = common::create_manager();
    let a = common::submit(&manager, "hello", "u1").await;

    manager.sync_push_id("u1", "").await;

    let mut stored = manager.fetch_by_id(a.id).await?;
    assert_eq!(stored.push_id, "push-u1");

    stored.content = "edited".to_string();
    manager.save(&mut stored).await?;
    assert_eq!(manager.fetch_by_id(a.id).await?.content, "edited");

    Ok(())
}

#[tokio::test]
async fn test_transitions_shouldQueueOnePushEventEach() -> Result<()> {
    let manager = common::create_manager();
    let a = common::submit(&manager, "a", "u1").await;
    let b = common::submit(&manager, "b", "u2").await;

    manager.approve(a.id, 1).await?;
    manager.reject(b.id, 1, "no").await?;
    manager.rollback_approval(a.id, 1).await?;

    let repo = manager.repository();
    let a_events = repo.push_events_for(a.id).await?;
    assert_eq!(a_events.len(), 1);
    assert_eq!(a_events[0].kind, PushEventKind::Approved);
    assert_eq!(a_events[0].push_id, "push-u1");
    assert_eq!(a_events[0].status, PushEventStatus::Pending);

    let b_events = repo.push_events_for(b.id).await?;
    assert_eq!(b_events.len(), 1);
    assert_eq!(b_events[0].kind, PushEventKind::Rejected);

    Ok(())
}

#[tokio::test]
async fn test_concurrentApprovals_shouldAssignDistinctNumbers() -> Result<()> {
    let manager = common::create_manager();
    let mut ids = Vec::new();
    for i in 0..10 {
        ids.push(common::submit(&manager, &format!("c{}", i), "u1").await.id);
    }

    let mut handles = Vec::new();
    for id in ids {
        let manager = manager.clone();
        handles.push(tokio::spawn(async move { manager.approve(id, 1).await }));
    }

    let mut numbers = Vec::new();
    for handle in handles {
        numbers.push(handle.await??.cfs_id);
    }
    numbers.sort_unstable();

    assert_eq!(numbers, (1..=10).collect::<Vec<i64>>());

    Ok(())
}

#[tokio::test]
async fn test_fileBackedStore_shouldPersistAcrossReopen() -> Result<()> {
    let dir = common::create_temp_dir()?;

    let id = {
        let manager = common::create_file_manager(&dir)?;
        let a = common::submit(&manager, "persisted", "u1").await;
        manager.approve(a.id, 3).await?;
        a.id
    };

    let manager = common::create_file_manager(&dir)?;
    let reloaded = manager.fetch_by_id(id).await?;
    assert_eq!(reloaded.content, "persisted");
    assert_eq!(reloaded.cfs_id, 1);
    assert!(reloaded.created_at.is_some());

    Ok(())
}
