use std::{
    future::Future,
    pin::Pin,
    sync::{atomic::Ordering, Arc, Mutex},
    time::Duration,
};

use chrono::Utc;
use esim_engine::{
    adapters::{ProviderError, ProviderRegistry},
    db_types::{NewOrder, NewProvider, OrderStatusType},
    events::{EventHandlers, EventHooks, OrderStatusChangedEvent},
    orders::{OrderPollerConfig, OrderStatusPoller, ORDER_STATUS_JOB_NAME},
    scheduler::{Clock, ManualClock},
    traits::{cursor_key, OrderManagement, SettingsStore},
    SqliteDatabase,
};

mod support;
use support::{add_provider, new_db, FakeProvider};

/// A clock far enough ahead that every order created during the test is past its grace period.
fn later_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(Utc::now() + chrono::Duration::hours(1)))
}

fn poller(
    db: &SqliteDatabase,
    registry: &Arc<ProviderRegistry>,
    clock: Arc<ManualClock>,
) -> OrderStatusPoller<SqliteDatabase> {
    let config = OrderPollerConfig { max_retries: 0, adapter_timeout: Duration::from_secs(5), ..Default::default() };
    OrderStatusPoller::new(db.clone(), Arc::clone(registry), clock, config)
}

#[tokio::test]
async fn terminal_statuses_are_written_back() {
    let db = new_db().await;
    let p = add_provider(&db, NewProvider::new("alpha", "Alpha")).await;
    let registry = Arc::new(ProviderRegistry::new());
    let alpha = FakeProvider::new("alpha");
    alpha.register(&registry, p.clone());
    let done = db.insert_order(NewOrder::new("ORD-1", "u1", p.id, "ref-1")).await.unwrap();
    let failed = db
        .insert_order(NewOrder::new("ORD-2", "u1", p.id, "ref-2").with_status(OrderStatusType::Processing))
        .await
        .unwrap();
    let waiting = db.insert_order(NewOrder::new("ORD-3", "u2", p.id, "ref-3")).await.unwrap();
    alpha.set_status("ref-1", Ok(OrderStatusType::Completed));
    alpha.set_status("ref-2", Ok(OrderStatusType::Failed));
    alpha.set_status("ref-3", Ok(OrderStatusType::Processing));

    let clock = later_clock();
    let report = poller(&db, &registry, clock.clone()).run_poll_pass().await.unwrap();
    assert_eq!(report.checked, 3);
    assert_eq!(report.completed, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.unchanged, 1);
    assert_eq!(report.errors, 0);

    let status = |id| {
        let db = db.clone();
        async move { db.fetch_order(id).await.unwrap().unwrap().status }
    };
    assert_eq!(status(done.id).await, OrderStatusType::Completed);
    assert_eq!(status(failed.id).await, OrderStatusType::Failed);
    // Intermediate statuses are not written back
    assert_eq!(status(waiting.id).await, OrderStatusType::Pending);
    assert_eq!(db.read_cursor(&cursor_key(ORDER_STATUS_JOB_NAME)).await.unwrap(), Some(clock.now()));
}

#[tokio::test]
async fn one_failing_order_does_not_stop_the_pass() {
    let db = new_db().await;
    let p = add_provider(&db, NewProvider::new("alpha", "Alpha")).await;
    let registry = Arc::new(ProviderRegistry::new());
    let alpha = FakeProvider::new("alpha");
    alpha.register(&registry, p.clone());
    let broken = db.insert_order(NewOrder::new("ORD-1", "u1", p.id, "ref-1")).await.unwrap();
    let fine = db.insert_order(NewOrder::new("ORD-2", "u1", p.id, "ref-2")).await.unwrap();
    alpha.set_status("ref-1", Err(ProviderError::Transient("gateway timeout".into())));
    alpha.set_status("ref-2", Ok(OrderStatusType::Completed));

    let report = poller(&db, &registry, later_clock()).run_poll_pass().await.unwrap();
    assert_eq!(report.checked, 2);
    assert_eq!(report.errors, 1);
    assert_eq!(report.completed, 1);
    assert_eq!(db.fetch_order(broken.id).await.unwrap().unwrap().status, OrderStatusType::Pending);
    assert_eq!(db.fetch_order(fine.id).await.unwrap().unwrap().status, OrderStatusType::Completed);
}

#[tokio::test]
async fn orders_for_unregistered_providers_are_errors() {
    let db = new_db().await;
    let p = add_provider(&db, NewProvider::new("ghost", "Ghost")).await;
    let registry = Arc::new(ProviderRegistry::new());
    db.insert_order(NewOrder::new("ORD-1", "u1", p.id, "ref-1")).await.unwrap();

    let report = poller(&db, &registry, later_clock()).run_poll_pass().await.unwrap();
    assert_eq!(report.checked, 1);
    assert_eq!(report.errors, 1);
}

#[tokio::test]
async fn new_orders_wait_for_the_grace_period() {
    let db = new_db().await;
    let p = add_provider(&db, NewProvider::new("alpha", "Alpha")).await;
    let registry = Arc::new(ProviderRegistry::new());
    let alpha = FakeProvider::new("alpha");
    alpha.register(&registry, p.clone());
    let order = db.insert_order(NewOrder::new("ORD-1", "u1", p.id, "ref-1")).await.unwrap();
    alpha.set_status("ref-1", Ok(OrderStatusType::Completed));

    let clock = Arc::new(ManualClock::new(order.created_at + chrono::Duration::seconds(30)));
    let poller = poller(&db, &registry, clock.clone());
    let report = poller.run_poll_pass().await.unwrap();
    assert_eq!(report.checked, 0);
    assert_eq!(alpha.status_calls.load(Ordering::SeqCst), 0);

    clock.advance(chrono::Duration::minutes(2));
    let report = poller.run_poll_pass().await.unwrap();
    assert_eq!(report.checked, 1);
    assert_eq!(report.completed, 1);
}

#[tokio::test]
async fn failed_orders_are_retried_once() {
    let db = new_db().await;
    let p = add_provider(&db, NewProvider::new("alpha", "Alpha")).await;
    let registry = Arc::new(ProviderRegistry::new());
    let alpha = FakeProvider::new("alpha");
    alpha.register(&registry, p.clone());
    let order = db
        .insert_order(NewOrder::new("ORD-1", "u1", p.id, "ref-1").with_status(OrderStatusType::Failed))
        .await
        .unwrap();
    alpha.set_status("ref-1", Ok(OrderStatusType::Failed));

    let config = OrderPollerConfig { max_retries: 1, ..Default::default() };
    let poller = OrderStatusPoller::new(db.clone(), Arc::clone(&registry), later_clock(), config);
    let report = poller.run_poll_pass().await.unwrap();
    assert_eq!(report.retried, 1);
    assert_eq!(report.failed, 1);
    let polled = db.fetch_order(order.id).await.unwrap().unwrap();
    assert_eq!(polled.status, OrderStatusType::Failed);
    assert_eq!(polled.retry_count, 1);

    // The retry budget is spent
    let report = poller.run_poll_pass().await.unwrap();
    assert_eq!(report.retried, 0);
    assert_eq!(report.checked, 0);
}

#[tokio::test]
async fn status_changes_are_published() {
    let db = new_db().await;
    let p = add_provider(&db, NewProvider::new("alpha", "Alpha")).await;
    let registry = Arc::new(ProviderRegistry::new());
    let alpha = FakeProvider::new("alpha");
    alpha.register(&registry, p.clone());
    db.insert_order(NewOrder::new("ORD-1", "u1", p.id, "ref-1")).await.unwrap();
    alpha.set_status("ref-1", Ok(OrderStatusType::Completed));

    let seen = Arc::new(Mutex::new(Vec::<OrderStatusChangedEvent>::new()));
    let sink = Arc::clone(&seen);
    let mut hooks = EventHooks::default();
    hooks.on_order_status_changed(move |ev| {
        let sink = Arc::clone(&sink);
        Box::pin(async move {
            sink.lock().unwrap().push(ev);
        }) as Pin<Box<dyn Future<Output = ()> + Send>>
    });
    let handlers = EventHandlers::new(16, hooks);
    let producers = handlers.producers();
    let handler = handlers.on_order_status_changed.unwrap();

    let poller = poller(&db, &registry, later_clock()).with_producers(producers);
    poller.run_poll_pass().await.unwrap();
    drop(poller);
    handler.start_handler().await;

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].order.display_order_id, "ORD-1");
    assert_eq!(seen[0].old_status, OrderStatusType::Pending);
    assert_eq!(seen[0].new_status(), OrderStatusType::Completed);
}

#[tokio::test]
async fn repeated_provider_errors_never_fail_the_order() {
    let db = new_db().await;
    let p = add_provider(&db, NewProvider::new("alpha", "Alpha")).await;
    let registry = Arc::new(ProviderRegistry::new());
    let alpha = FakeProvider::new("alpha");
    alpha.register(&registry, p.clone());
    let order = db.insert_order(NewOrder::new("ORD-1", "u1", p.id, "ref-1")).await.unwrap();
    alpha.set_status("ref-1", Err(ProviderError::Transient("gateway timeout".into())));

    let config = OrderPollerConfig { max_retries: 1, adapter_timeout: Duration::from_secs(5), ..Default::default() };
    let poller = OrderStatusPoller::new(db.clone(), Arc::clone(&registry), later_clock(), config);
    for _ in 0..3 {
        let report = poller.run_poll_pass().await.unwrap();
        assert_eq!(report.errors, 1);
        assert_eq!(report.failed, 0);
    }
    let order = db.fetch_order(order.id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::Pending);
    assert_eq!(order.retry_count, 0);
    assert_eq!(alpha.status_calls.load(Ordering::SeqCst), 3);
}
