mod common;

use common::{code, Harness, RecordingPlatform, ScriptedSource};
use postcode_watch::core::notifications::WINNER_TITLE;
use postcode_watch::core::persistence::{CHECK_FREQUENCY_KEY, SUBSCRIBED_POSTCODES_KEY};
use postcode_watch::domain::model::Permission;
use postcode_watch::{PollerState, PostalCode, SubscriptionSet, WatchError};
use serde_json::json;
use std::time::Duration;
use tokio::sync::oneshot;

async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

#[tokio::test]
async fn test_subscribing_twice_keeps_one_entry() {
    let h = Harness::new(ScriptedSource::new(), RecordingPlatform::granted()).without_polling();

    assert!(h.ctx.subscribe("M33 5QU").await.unwrap());
    assert!(!h.ctx.subscribe("m33 5qu").await.unwrap());
    assert!(!h.ctx.subscribe("  M33 5QU  ").await.unwrap());

    let subscriptions = h.ctx.subscriptions();
    assert_eq!(subscriptions.to_vec(), vec![code("M33 5QU")]);

    let persisted: SubscriptionSet = h.persistence().load(SUBSCRIBED_POSTCODES_KEY).unwrap();
    assert_eq!(persisted, subscriptions);
}

#[tokio::test]
async fn test_subscribe_rejects_malformed_postcode() {
    let h = Harness::new(ScriptedSource::new(), RecordingPlatform::granted()).without_polling();

    let err = h.ctx.subscribe("12345").await.unwrap_err();
    assert!(matches!(err, WatchError::Validation { .. }));
    assert!(h.ctx.subscriptions().is_empty());
}

#[tokio::test]
async fn test_unsubscribing_non_member_is_noop() {
    let h = Harness::new(ScriptedSource::new(), RecordingPlatform::granted()).without_polling();
    h.ctx.subscribe("M33 5QU").await.unwrap();

    assert!(!h.ctx.unsubscribe("SW1A 1AA").await);
    assert!(!h.ctx.unsubscribe("").await);
    assert_eq!(h.ctx.subscriptions().to_vec(), vec![code("M33 5QU")]);
}

#[tokio::test]
async fn test_subscription_order_is_insertion_order() {
    let h = Harness::new(ScriptedSource::new(), RecordingPlatform::granted()).without_polling();
    for raw in ["SW1A 1AA", "M33 5QU", "EC1A 1BB"] {
        h.ctx.subscribe(raw).await.unwrap();
    }
    h.ctx.unsubscribe("m33 5qu").await;

    let order: Vec<String> = h.ctx.subscriptions().iter().map(|c| c.to_string()).collect();
    assert_eq!(order, vec!["SW1A 1AA", "EC1A 1BB"]);
}

#[tokio::test]
async fn test_cycle_survives_failure_of_one_code() {
    let source = ScriptedSource::new().failing_for("SW1A 1AA");
    let h = Harness::new(source, RecordingPlatform::granted()).without_polling();
    h.ctx.subscribe("M33 5QU").await.unwrap();
    h.ctx.subscribe("SW1A 1AA").await.unwrap();

    let report = h.ctx.check_subscribed_now().await;

    assert_eq!(report.checked.len(), 1);
    assert_eq!(report.checked[0].postcode, code("M33 5QU"));
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, code("SW1A 1AA"));
    assert!(matches!(report.failed[0].1, WatchError::FetchFailed { .. }));

    let persisted = h.persisted_results();
    assert!(persisted.contains_key(&code("M33 5QU")));
    assert!(!persisted.contains_key(&code("SW1A 1AA")));
    assert_eq!(h.source.calls(), vec!["M33 5QU", "SW1A 1AA"]);
}

#[tokio::test]
async fn test_cycle_continues_after_failure_in_first_code() {
    let source = ScriptedSource::new().failing_for("M33 5QU");
    let h = Harness::new(source, RecordingPlatform::granted()).without_polling();
    h.ctx.subscribe("M33 5QU").await.unwrap();
    h.ctx.subscribe("SW1A 1AA").await.unwrap();

    let report = h.ctx.check_subscribed_now().await;
    assert!(!report.is_clean());
    assert_eq!(report.checked[0].postcode, code("SW1A 1AA"));
}

#[tokio::test]
async fn test_win_transition_notifies_exactly_once() {
    let source = ScriptedSource::new().script("M33 5QU", &[false, true, true, false, false]);
    let h = Harness::new(source, RecordingPlatform::granted()).without_polling();
    h.ctx.subscribe("M33 5QU").await.unwrap();

    let mut wins = 0;
    for _ in 0..5 {
        wins += h.ctx.check_subscribed_now().await.wins.len();
    }

    assert_eq!(wins, 1);
    let shown = h.platform.shown();
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].0, WINNER_TITLE);
    assert_eq!(shown[0].1.body, "Great news! M33 5QU has won!");
    assert_eq!(shown[0].1.data, json!({"postcode": "M33 5QU"}));
    assert!(shown[0].1.require_interaction);
}

#[tokio::test]
async fn test_first_ever_win_is_not_a_transition() {
    let source = ScriptedSource::new().script("M33 5QU", &[true, true]);
    let h = Harness::new(source, RecordingPlatform::granted()).without_polling();
    h.ctx.subscribe("M33 5QU").await.unwrap();

    h.ctx.check_subscribed_now().await;
    h.ctx.check_subscribed_now().await;
    assert!(h.platform.shown().is_empty());
}

#[tokio::test]
async fn test_transition_without_permission_shows_nothing() {
    let source = ScriptedSource::new().script("M33 5QU", &[false, true]);
    let h = Harness::new(source, RecordingPlatform::new(Permission::Default)).without_polling();
    h.ctx.subscribe("M33 5QU").await.unwrap();

    h.ctx.check_subscribed_now().await;
    let report = h.ctx.check_subscribed_now().await;
    assert_eq!(report.wins, vec![code("M33 5QU")]);
    assert!(h.platform.shown().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_first_subscription_starts_timer_with_immediate_check() {
    let h = Harness::new(ScriptedSource::new(), RecordingPlatform::granted());
    assert_eq!(h.ctx.poller_state(), PollerState::Idle);

    h.ctx.update_check_frequency(1).unwrap();
    h.ctx.subscribe("M33 5QU").await.unwrap();
    settle().await;

    assert_eq!(h.source.call_count(), 1);
    assert_eq!(h.ctx.poller_state(), PollerState::Scheduled);

    tokio::time::sleep(Duration::from_secs(61)).await;
    assert_eq!(h.source.call_count(), 2);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(h.source.call_count(), 3);

    h.ctx.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_removing_last_subscription_stops_timer() {
    let h = Harness::new(ScriptedSource::new(), RecordingPlatform::granted());
    h.ctx.update_check_frequency(1).unwrap();

    h.ctx.subscribe("M33 5QU").await.unwrap();
    settle().await;
    tokio::time::sleep(Duration::from_secs(61)).await;
    assert_eq!(h.source.call_count(), 2);

    assert!(h.ctx.unsubscribe("M33 5QU").await);
    assert_eq!(h.ctx.poller_state(), PollerState::Idle);

    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(h.source.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_second_subscription_does_not_restart_timer() {
    let h = Harness::new(ScriptedSource::new(), RecordingPlatform::granted());
    h.ctx.update_check_frequency(1).unwrap();

    h.ctx.subscribe("M33 5QU").await.unwrap();
    settle().await;
    assert_eq!(h.source.call_count(), 1);

    h.ctx.subscribe("SW1A 1AA").await.unwrap();
    settle().await;
    assert_eq!(h.source.call_count(), 1);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(h.source.calls(), vec!["M33 5QU", "M33 5QU", "SW1A 1AA"]);

    h.ctx.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_poller_reports_checking_during_cycle() {
    let source = ScriptedSource::new().with_latency(Duration::from_millis(1500));
    let h = Harness::new(source, RecordingPlatform::granted());

    h.ctx.subscribe("M33 5QU").await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(h.ctx.poller_state(), PollerState::Checking);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(h.ctx.poller_state(), PollerState::Scheduled);

    h.ctx.shutdown().await;
    assert_eq!(h.ctx.poller_state(), PollerState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_frequency_change_reschedules_running_timer() {
    let h = Harness::new(ScriptedSource::new(), RecordingPlatform::granted());

    h.ctx.subscribe("M33 5QU").await.unwrap();
    settle().await;
    assert_eq!(h.source.call_count(), 1);

    let frequency = h.ctx.update_check_frequency(2).unwrap();
    assert_eq!(frequency.interval_ms(), 120_000);
    assert_eq!(h.persistence().load::<u64>(CHECK_FREQUENCY_KEY), Some(120_000));

    // no immediate re-check, the new interval counts from now
    settle().await;
    assert_eq!(h.source.call_count(), 1);

    tokio::time::sleep(Duration::from_secs(121)).await;
    assert_eq!(h.source.call_count(), 2);
    assert_eq!(h.ctx.poller_state(), PollerState::Scheduled);

    h.ctx.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_frequency_change_lets_running_cycle_finish() {
    let source = ScriptedSource::new().with_latency(Duration::from_millis(1500));
    let h = Harness::new(source, RecordingPlatform::granted());

    h.ctx.subscribe("M33 5QU").await.unwrap();
    h.ctx.subscribe("SW1A 1AA").await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(h.ctx.poller_state(), PollerState::Checking);

    h.ctx.update_check_frequency(10).unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(h.source.calls(), vec!["M33 5QU", "SW1A 1AA"]);
    assert_eq!(h.persisted_results().len(), 2);

    h.ctx.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_code_removed_mid_cycle_is_skipped() {
    let source = ScriptedSource::new().with_latency(Duration::from_millis(1500));
    let h = Harness::new(source, RecordingPlatform::granted());

    h.ctx.subscribe("M33 5QU").await.unwrap();
    h.ctx.subscribe("SW1A 1AA").await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(h.ctx.unsubscribe("SW1A 1AA").await);
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(h.source.calls(), vec!["M33 5QU"]);
    h.ctx.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_silences_timer() {
    let h = Harness::new(ScriptedSource::new(), RecordingPlatform::granted());
    h.ctx.update_check_frequency(1).unwrap();
    h.ctx.subscribe("M33 5QU").await.unwrap();
    settle().await;

    h.ctx.shutdown().await;
    tokio::time::sleep(Duration::from_secs(3600)).await;

    assert_eq!(h.source.call_count(), 1);
    // subscriptions survive teardown
    assert_eq!(h.ctx.subscriptions().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_state_is_restored_and_resumed() {
    let first = Harness::new(ScriptedSource::new(), RecordingPlatform::granted()).without_polling();
    first.ctx.subscribe("SW1A 1AA").await.unwrap();
    first.ctx.update_check_frequency(5).unwrap();
    first.ctx.set_postcode("ec1a 1bb").unwrap();

    let second = Harness::with_store(
        first.store.clone(),
        ScriptedSource::new(),
        RecordingPlatform::granted(),
    );
    assert_eq!(second.ctx.postcode(), code("EC1A 1BB"));
    assert_eq!(second.ctx.subscriptions().to_vec(), vec![code("SW1A 1AA")]);
    assert_eq!(second.ctx.check_frequency().interval_ms(), 300_000);

    assert!(second.ctx.resume());
    settle().await;
    assert_eq!(second.source.calls(), vec!["SW1A 1AA"]);

    second.ctx.shutdown().await;
}

#[tokio::test]
async fn test_defaults_without_persisted_state() {
    let h = Harness::new(ScriptedSource::new(), RecordingPlatform::granted()).without_polling();
    assert_eq!(h.ctx.postcode(), PostalCode::sample());
    assert_eq!(h.ctx.check_frequency().interval_ms(), 1_800_000);
    assert!(h.ctx.results().is_none());
    assert!(!h.ctx.resume());
}

#[tokio::test]
async fn test_zero_minute_frequency_rejected() {
    let h = Harness::new(ScriptedSource::new(), RecordingPlatform::granted()).without_polling();
    assert!(matches!(
        h.ctx.update_check_frequency(0),
        Err(WatchError::Validation { .. })
    ));
    assert_eq!(h.ctx.check_frequency().interval_ms(), 1_800_000);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_after_frequency_change_stops_retired_cycle() {
    let source = ScriptedSource::new().with_latency(Duration::from_millis(1500));
    let h = Harness::new(source, RecordingPlatform::granted());
    h.ctx.update_check_frequency(1).unwrap();
    h.ctx.subscribe("M33 5QU").await.unwrap();
    h.ctx.subscribe("SW1A 1AA").await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(h.ctx.poller_state(), PollerState::Checking);

    h.ctx.update_check_frequency(30).unwrap();
    h.ctx.shutdown().await;
    assert_eq!(h.ctx.poller_state(), PollerState::Idle);

    let calls = h.source.call_count();
    tokio::time::sleep(Duration::from_secs(3600)).await;
    assert_eq!(h.source.call_count(), calls);
    assert!(h.persisted_results().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_removing_last_code_after_frequency_change_stops_retired_cycle() {
    let source = ScriptedSource::new().with_latency(Duration::from_millis(1500));
    let h = Harness::new(source, RecordingPlatform::granted());
    h.ctx.subscribe("M33 5QU").await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    h.ctx.update_check_frequency(5).unwrap();
    assert!(h.ctx.unsubscribe("M33 5QU").await);
    assert_eq!(h.ctx.poller_state(), PollerState::Idle);

    tokio::time::sleep(Duration::from_secs(3600)).await;
    assert_eq!(h.source.call_count(), 1);
    assert!(h.persisted_results().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_cycle_follows_subscriptions_written_elsewhere() {
    let h = Harness::new(ScriptedSource::new(), RecordingPlatform::granted()).following_store();
    h.ctx.update_check_frequency(1).unwrap();
    h.ctx.subscribe("M33 5QU").await.unwrap();
    settle().await;
    assert_eq!(h.source.calls(), vec!["M33 5QU"]);

    // another process swaps the subscription set
    h.persistence()
        .save(
            SUBSCRIBED_POSTCODES_KEY,
            &SubscriptionSet::from(vec![code("SW1A 1AA")]),
        )
        .unwrap();
    tokio::time::sleep(Duration::from_secs(60)).await;

    assert_eq!(h.source.calls(), vec!["M33 5QU", "SW1A 1AA"]);
    assert_eq!(h.ctx.subscriptions().to_vec(), vec![code("SW1A 1AA")]);
    h.ctx.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_in_memory_subscriptions_win_without_store_sync() {
    let h = Harness::new(ScriptedSource::new(), RecordingPlatform::granted()).without_polling();
    h.ctx.subscribe("M33 5QU").await.unwrap();
    h.persistence()
        .save(SUBSCRIBED_POSTCODES_KEY, &SubscriptionSet::new())
        .unwrap();

    h.ctx.check_subscribed_now().await;
    assert_eq!(h.source.calls(), vec!["M33 5QU"]);
}

#[tokio::test(start_paused = true)]
async fn test_store_sync_drives_timer() {
    let h = Harness::new(ScriptedSource::new(), RecordingPlatform::granted()).following_store();
    h.ctx.update_check_frequency(1).unwrap();
    h.ctx.subscribe("M33 5QU").await.unwrap();

    let ctx = &h.ctx;
    let source = &h.source;
    let store = h.persistence();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();

    let watcher = ctx.follow_store(Duration::from_secs(5), async move {
        let _ = stop_rx.await;
    });
    let other_commands = async move {
        store.save(CHECK_FREQUENCY_KEY, &120_000u64).unwrap();
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(ctx.check_frequency().interval_ms(), 120_000);
        assert_eq!(ctx.poller_state(), PollerState::Scheduled);

        store
            .save(SUBSCRIBED_POSTCODES_KEY, &SubscriptionSet::new())
            .unwrap();
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(ctx.poller_state(), PollerState::Idle);

        let calls = source.call_count();
        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(source.call_count(), calls);

        store
            .save(
                SUBSCRIBED_POSTCODES_KEY,
                &SubscriptionSet::from(vec![code("EC1A 1BB")]),
            )
            .unwrap();
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(source.calls().last().map(String::as_str), Some("EC1A 1BB"));
        assert_eq!(ctx.poller_state(), PollerState::Scheduled);

        let _ = stop_tx.send(());
    };

    tokio::join!(watcher, other_commands);
    h.ctx.shutdown().await;
    assert_eq!(h.ctx.poller_state(), PollerState::Idle);
}
