//! End-to-end tests for the outbound delivery engine, run against the
//! in-memory store and scripted platform doubles.

use std::sync::Arc;

use uuid::Uuid;

use instagram::InstagramError;
use server_core::kernel::outbound::testing::TestDependencies;
use server_core::kernel::outbound::{
    default_registry, ActionStatus, ActionStore, DeliveryEvent, DeliveryScanner, ErrorCategory,
    MediaType, MessagePayload, OutboundAction, PublishPostPayload, RateLimitSignal, RepostPayload,
};
use server_core::kernel::RepostSource;

fn scanner_for(td: &TestDependencies) -> DeliveryScanner {
    DeliveryScanner::new(
        td.deps(),
        Arc::new(default_registry()),
        Arc::new(RateLimitSignal::new()),
    )
}

fn publish_action(account_id: Uuid, scheduled_post_id: Option<Uuid>) -> OutboundAction {
    OutboundAction::publish_post(
        account_id,
        &PublishPostPayload {
            media_url: "https://cdn.example.com/sunset.jpg".to_string(),
            caption: "golden hour".to_string(),
            media_type: MediaType::Image,
            creation_id: None,
            scheduled_post_id,
        },
    )
}

#[tokio::test]
async fn send_message_happy_path_ends_sent_with_external_id() {
    let td = TestDependencies::new();
    let scanner = scanner_for(&td);

    let action = OutboundAction::direct_message(
        Uuid::new_v4(),
        &MessagePayload {
            recipient_id: "r1".to_string(),
            text: "hi".to_string(),
        },
    );
    let id = action.id;
    td.store.insert(action).await.unwrap();

    let summary = scanner.tick().await.unwrap();
    assert_eq!(summary.sent, 1);

    let sent = td.store.get(id).unwrap();
    assert_eq!(sent.status, ActionStatus::Sent);
    assert!(sent.external_id.is_some());
    assert_eq!(td.platform.message_calls(), 1);

    // Terminal: never selected again.
    assert!(td.store.select_eligible(10).await.unwrap().is_empty());

    let events = td.telemetry.events();
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], DeliveryEvent::Sent { .. }));
}

#[tokio::test]
async fn publish_failing_at_step_two_keeps_container_and_resumes_without_recreating() {
    let td = TestDependencies::new();
    let scanner = scanner_for(&td);

    let action = publish_action(Uuid::new_v4(), None);
    let id = action.id;
    td.store.insert(action).await.unwrap();

    // Step 1 succeeds, step 2 fails transiently.
    td.platform.queue_publish(Err(InstagramError::Api {
        status: 503,
        message: "publish unavailable".to_string(),
    }));

    let summary = scanner.tick().await.unwrap();
    assert_eq!(summary.retried, 1);

    let failed = td.store.get(id).unwrap();
    assert_eq!(failed.status, ActionStatus::Failed);
    assert_eq!(failed.error_category, Some(ErrorCategory::Transient));

    // Resumption state survived the failure.
    let creation_id = failed.payload["creation_id"].as_str().unwrap().to_string();
    assert!(!creation_id.is_empty());

    // Backed off: invisible to the scanner until the window elapses.
    assert!(td.store.select_eligible(10).await.unwrap().is_empty());

    // Operator retry instead of waiting out the backoff.
    assert!(td.store.retry(id).await.unwrap());

    let summary = scanner.tick().await.unwrap();
    assert_eq!(summary.sent, 1);

    let sent = td.store.get(id).unwrap();
    assert_eq!(sent.status, ActionStatus::Sent);
    assert!(sent.external_id.is_some());

    // The create step ran exactly once across both attempts; only the
    // publish step repeated.
    assert_eq!(td.platform.create_calls(), 1);
    assert_eq!(td.platform.publish_calls(), 2);
    assert_eq!(
        sent.payload["creation_id"].as_str().unwrap(),
        creation_id,
        "second attempt reused the persisted container"
    );
}

#[tokio::test]
async fn publish_success_marks_scheduled_post_published() {
    let td = TestDependencies::new();
    let scanner = scanner_for(&td);

    let post_id = Uuid::new_v4();
    let action = publish_action(Uuid::new_v4(), Some(post_id));
    td.store.insert(action).await.unwrap();

    let summary = scanner.tick().await.unwrap();
    assert_eq!(summary.sent, 1);

    let published = td.catalog.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].0, post_id);
}

#[tokio::test]
async fn scheduled_post_update_failure_never_fails_the_action() {
    let td = TestDependencies::new();
    let scanner = scanner_for(&td);

    let action = publish_action(Uuid::new_v4(), Some(Uuid::new_v4()));
    let id = action.id;
    td.store.insert(action).await.unwrap();
    td.catalog.fail_mark_published(true);

    let summary = scanner.tick().await.unwrap();
    assert_eq!(summary.sent, 1);
    assert_eq!(td.store.get(id).unwrap().status, ActionStatus::Sent);
}

#[tokio::test]
async fn repost_resolves_the_grant_at_execution_time() {
    let td = TestDependencies::new();
    let scanner = scanner_for(&td);

    let permission_id = Uuid::new_v4();
    td.catalog.insert_source(
        permission_id,
        RepostSource {
            media_url: "https://cdn.example.com/original.jpg".to_string(),
            caption: "their caption".to_string(),
            media_type: MediaType::Image,
            owner_username: Some("original_author".to_string()),
        },
    );

    let action = OutboundAction::repost(
        Uuid::new_v4(),
        &RepostPayload {
            permission_id,
            creation_id: None,
        },
    );
    let id = action.id;
    td.store.insert(action).await.unwrap();

    let summary = scanner.tick().await.unwrap();
    assert_eq!(summary.sent, 1);
    assert_eq!(td.store.get(id).unwrap().status, ActionStatus::Sent);
    assert_eq!(td.platform.create_calls(), 1);
    assert_eq!(td.platform.publish_calls(), 1);
}

#[tokio::test]
async fn repost_with_revoked_grant_dead_letters_as_validation() {
    let td = TestDependencies::new();
    let scanner = scanner_for(&td);

    // No source inserted: the grant is gone by execution time.
    let action = OutboundAction::repost(
        Uuid::new_v4(),
        &RepostPayload {
            permission_id: Uuid::new_v4(),
            creation_id: None,
        },
    );
    let id = action.id;
    td.store.insert(action).await.unwrap();

    let summary = scanner.tick().await.unwrap();
    assert_eq!(summary.dead, 1);

    let dead = td.store.get(id).unwrap();
    assert_eq!(dead.status, ActionStatus::Dead);
    assert_eq!(dead.error_category, Some(ErrorCategory::Validation));
    assert_eq!(td.platform.create_calls(), 0);
}

#[tokio::test]
async fn credential_failure_dead_letters_as_auth_on_the_first_attempt() {
    let td = TestDependencies::new();
    let scanner = DeliveryScanner::new(
        td.deps_with_failing_credentials(),
        Arc::new(default_registry()),
        Arc::new(RateLimitSignal::new()),
    );

    let action = OutboundAction::comment_reply(
        Uuid::new_v4(),
        &server_core::kernel::outbound::CommentReplyPayload {
            comment_id: "17891234".to_string(),
            text: "thanks!".to_string(),
        },
    );
    let id = action.id;
    td.store.insert(action).await.unwrap();

    let summary = scanner.tick().await.unwrap();
    assert_eq!(summary.dead, 1);

    let dead = td.store.get(id).unwrap();
    assert_eq!(dead.status, ActionStatus::Dead);
    assert_eq!(dead.retry_count, 1);
    assert_eq!(dead.error_category, Some(ErrorCategory::Auth));
    assert_eq!(td.platform.reply_calls(), 0);

    let events = td.telemetry.events();
    assert_eq!(events.len(), 1);
    match &events[0] {
        DeliveryEvent::DeadLettered {
            category,
            total_attempts,
            ..
        } => {
            assert_eq!(*category, ErrorCategory::Auth);
            assert_eq!(*total_attempts, 1);
        }
        other => panic!("expected DeadLettered, got {:?}", other),
    }
}

#[tokio::test]
async fn rate_limit_cooldown_spans_ticks_until_it_expires() {
    let td = TestDependencies::new();
    let rate_limits = Arc::new(RateLimitSignal::new());
    let scanner = DeliveryScanner::new(
        td.deps(),
        Arc::new(default_registry()),
        rate_limits.clone(),
    );

    let account = Uuid::new_v4();
    let action = OutboundAction::direct_message(
        account,
        &MessagePayload {
            recipient_id: "r1".to_string(),
            text: "hi".to_string(),
        },
    );
    let id = action.id;
    td.store.insert(action).await.unwrap();

    td.platform.queue_message(Err(InstagramError::RateLimited {
        retry_after_secs: Some(60),
    }));

    let summary = scanner.tick().await.unwrap();
    assert_eq!(summary.retried, 1);
    assert_eq!(
        td.store.get(id).unwrap().error_category,
        Some(ErrorCategory::RateLimit)
    );
    assert!(rate_limits.is_limited(account));

    // Even after an operator retry makes the action eligible again, the
    // account-level cooldown keeps the scanner away from it.
    assert!(td.store.retry(id).await.unwrap());
    let summary = scanner.tick().await.unwrap();
    assert_eq!(summary.skipped_rate_limited, 1);
    assert_eq!(summary.sent, 0);
    assert_eq!(td.store.get(id).unwrap().status, ActionStatus::Pending);
}
