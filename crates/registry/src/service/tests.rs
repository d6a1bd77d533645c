use std::sync::Arc;

use tock_core::{CronSchedule, Interval, RoutingEntry, TimeUnit, TimerRecord, TimerType};
use tock_scheduler::testing::{EngineCall, RecordingEngine};
use tock_scheduler::TriggerCoordinator;
use tock_storage::{InMemoryTimerStore, TimerStore};
use uuid::Uuid;

use super::*;

struct Harness {
    engine: Arc<RecordingEngine>,
    store: Arc<InMemoryTimerStore>,
    registry: TimerRegistry,
}

async fn harness() -> Harness {
    let engine = Arc::new(RecordingEngine::new());
    let store = Arc::new(InMemoryTimerStore::new());
    let registry = TimerRegistry::new(store.clone(), TriggerCoordinator::new(engine.clone()));
    store.provision(&ctx()).await.unwrap();
    Harness {
        engine,
        store,
        registry,
    }
}

fn ctx() -> TenantContext {
    TenantContext::new("diku").unwrap().with_user(Some(Uuid::nil()))
}

fn user_timer(path: &str, delay: &str) -> TimerRecord {
    TimerRecord {
        kind: Some(TimerType::User),
        module_id: Some("mod-foo-1.0.0".to_string()),
        enabled: true,
        routing_entry: Some(RoutingEntry {
            methods: vec!["POST".to_string()],
            path_pattern: Some(path.to_string()),
            interval: Some(Interval::new(delay, TimeUnit::Minute)),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn system_timer(module_id: &str, path: &str) -> TimerRecord {
    let mut record = user_timer(path, "1");
    record.kind = Some(TimerType::System);
    record.module_id = Some(module_id.to_string());
    record
}

#[tokio::test]
async fn create_assigns_id_metadata_and_schedules() {
    let h = harness().await;
    let created = h.registry.create(&ctx(), user_timer("/foo", "5")).await.unwrap();

    let id = created.id.unwrap();
    assert_eq!(created.module_name.as_deref(), Some("mod-foo"));
    let metadata = created.metadata.clone().unwrap();
    assert!(metadata.created_date.is_some());
    assert_eq!(metadata.created_by_user_id, Some(Uuid::nil()));

    assert_eq!(h.engine.job_count(), 1);
    assert!(h.engine.job(&id.to_string()).is_some());
    assert_eq!(h.store.find_by_id(&ctx(), id).await.unwrap(), Some(created));
}

#[tokio::test]
async fn create_with_same_natural_key_updates_existing() {
    let h = harness().await;
    let first = h.registry.create(&ctx(), user_timer("/foo", "5")).await.unwrap();
    let second = h.registry.create(&ctx(), user_timer("/foo", "10")).await.unwrap();

    assert_eq!(first.id, second.id);
    let page = h.registry.find_all(&ctx(), 0, 10).await.unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(
        second.metadata.as_ref().unwrap().created_date,
        first.metadata.as_ref().unwrap().created_date
    );

    let key = first.id.unwrap().to_string();
    assert!(matches!(
        h.engine.calls().last(),
        Some(EngineCall::Replace { key: k, .. }) if *k == key
    ));
}

#[tokio::test]
async fn create_with_existing_id_conflicts() {
    let h = harness().await;
    let created = h.registry.create(&ctx(), user_timer("/foo", "5")).await.unwrap();

    let mut again = user_timer("/bar", "5");
    again.id = created.id;
    let err = h.registry.create(&ctx(), again).await.unwrap_err();
    assert!(matches!(err, RegistryError::AlreadyExists(_)));
    assert_eq!(err.status_code(), 409);
}

#[tokio::test]
async fn create_rejects_invalid_input() {
    let h = harness().await;

    let mut no_kind = user_timer("/foo", "5");
    no_kind.kind = None;
    assert!(matches!(
        h.registry.create(&ctx(), no_kind).await,
        Err(RegistryError::Validation(_))
    ));

    let mut no_module = user_timer("/foo", "5");
    no_module.module_id = None;
    assert!(matches!(
        h.registry.create(&ctx(), no_module).await,
        Err(RegistryError::Validation(_))
    ));

    let mut two_methods = user_timer("/foo", "5");
    two_methods.routing_entry.as_mut().unwrap().methods = vec!["GET".into(), "POST".into()];
    assert!(matches!(
        h.registry.create(&ctx(), two_methods).await,
        Err(RegistryError::Validation(_))
    ));

    let mut bad_cron = user_timer("/foo", "5");
    let entry = bad_cron.routing_entry.as_mut().unwrap();
    entry.interval = None;
    entry.schedule = Some(CronSchedule::new("a b c", None));
    let err = h.registry.create(&ctx(), bad_cron).await.unwrap_err();
    assert_eq!(err.status_code(), 400);

    assert!(h.store.list_all(&ctx()).await.unwrap().is_empty());
    assert!(h.engine.calls().is_empty());
}

#[tokio::test]
async fn create_rejects_unparseable_engine_cron_before_saving() {
    let h = harness().await;

    let mut bad = user_timer("/foo", "5");
    let entry = bad.routing_entry.as_mut().unwrap();
    entry.interval = None;
    entry.schedule = Some(CronSchedule::new("a b c d e f", None));
    let err = h.registry.create(&ctx(), bad.clone()).await.unwrap_err();
    assert_eq!(err.status_code(), 400);

    // Replaying the same input must not slip through either.
    assert!(h.registry.create(&ctx(), bad).await.is_err());
    assert!(h.store.list_all(&ctx()).await.unwrap().is_empty());
    assert!(h.engine.calls().is_empty());
}

#[tokio::test]
async fn create_checks_trigger_of_disabled_timers() {
    let h = harness().await;

    let mut bad_zone = system_timer("mod-foo-1.0.0", "/a");
    bad_zone.enabled = false;
    let entry = bad_zone.routing_entry.as_mut().unwrap();
    entry.interval = None;
    entry.schedule = Some(CronSchedule::new("0 12 * * *", Some("Mars/Olympus".to_string())));
    assert!(matches!(
        h.registry.create(&ctx(), bad_zone).await,
        Err(RegistryError::Validation(_))
    ));

    let mut too_short = system_timer("mod-foo-1.0.0", "/b");
    too_short.enabled = false;
    too_short.routing_entry.as_mut().unwrap().interval = Some(Interval::new("10", TimeUnit::Millisecond));
    assert!(h.registry.create(&ctx(), too_short).await.is_err());

    assert!(h.store.list_all(&ctx()).await.unwrap().is_empty());
}

#[tokio::test]
async fn create_disabled_timer_is_persisted_but_not_scheduled() {
    let h = harness().await;
    let mut disabled = user_timer("/foo", "5");
    disabled.enabled = false;
    h.registry.create(&ctx(), disabled).await.unwrap();

    let mut zero = user_timer("/bar", "0");
    zero.enabled = true;
    h.registry.create(&ctx(), zero).await.unwrap();

    assert_eq!(h.store.list_all(&ctx()).await.unwrap().len(), 2);
    assert!(h.engine.calls().is_empty());
}

#[tokio::test]
async fn update_checks_id_and_existence() {
    let h = harness().await;
    let id = Uuid::new_v4();

    let mut mismatched = user_timer("/foo", "5");
    mismatched.id = Some(Uuid::new_v4());
    assert!(matches!(
        h.registry.update(&ctx(), id, mismatched).await,
        Err(RegistryError::Validation(_))
    ));

    let mut missing = user_timer("/foo", "5");
    missing.id = Some(id);
    assert!(matches!(
        h.registry.update(&ctx(), id, missing).await,
        Err(RegistryError::NotFound(_))
    ));
}

#[tokio::test]
async fn update_with_same_trigger_skips_engine() {
    let h = harness().await;
    let created = h.registry.create(&ctx(), user_timer("/foo", "5")).await.unwrap();
    h.engine.clear();

    let id = created.id.unwrap();
    let updated = h.registry.update(&ctx(), id, created.clone()).await.unwrap();
    assert_eq!(updated.id, Some(id));
    assert!(h.engine.calls().is_empty());

    let mut disabled = created;
    disabled.enabled = false;
    h.registry.update(&ctx(), id, disabled).await.unwrap();
    assert_eq!(h.engine.calls(), vec![EngineCall::Remove { key: id.to_string() }]);
}

#[tokio::test]
async fn delete_removes_record_and_trigger() {
    let h = harness().await;
    let created = h.registry.create(&ctx(), user_timer("/foo", "5")).await.unwrap();
    let id = created.id.unwrap();

    h.registry.delete(&ctx(), id).await.unwrap();
    assert!(h.store.find_by_id(&ctx(), id).await.unwrap().is_none());
    assert_eq!(h.engine.job_count(), 0);

    h.engine.clear();
    h.registry.delete(&ctx(), id).await.unwrap();
    assert!(h.engine.calls().is_empty());
}

#[tokio::test]
async fn delete_all_clears_tenant() {
    let h = harness().await;
    h.registry.create(&ctx(), user_timer("/a", "5")).await.unwrap();
    h.registry.create(&ctx(), user_timer("/b", "5")).await.unwrap();

    assert_eq!(h.registry.delete_all(&ctx()).await.unwrap(), 2);
    assert!(h.store.list_all(&ctx()).await.unwrap().is_empty());
    assert_eq!(h.engine.job_count(), 0);
}

#[tokio::test]
async fn switch_module_timers_is_idempotent() {
    let h = harness().await;
    h.registry.create(&ctx(), system_timer("mod-foo-1.0.0", "/a")).await.unwrap();
    h.registry.create(&ctx(), system_timer("mod-foo-1.0.0", "/b")).await.unwrap();
    h.registry.create(&ctx(), user_timer("/c", "5")).await.unwrap();
    assert_eq!(h.engine.job_count(), 3);

    assert_eq!(h.registry.switch_module_timers(&ctx(), "mod-foo", false).await.unwrap(), 2);
    assert_eq!(h.engine.job_count(), 1);
    assert_eq!(h.registry.switch_module_timers(&ctx(), "mod-foo", false).await.unwrap(), 0);

    let disabled = h
        .store
        .find_by_module_and_enabled(&ctx(), "mod-foo", false)
        .await
        .unwrap();
    assert_eq!(disabled.len(), 2);
    assert!(disabled.iter().all(|r| r.kind == Some(TimerType::System)));

    assert_eq!(h.registry.switch_module_timers(&ctx(), "mod-foo", true).await.unwrap(), 2);
    assert_eq!(h.engine.job_count(), 3);
    assert_eq!(h.registry.switch_module_timers(&ctx(), "mod-foo", true).await.unwrap(), 0);
}

#[tokio::test]
async fn switch_leaves_user_timers_of_the_module_alone() {
    let h = harness().await;
    let mut user = user_timer("/c", "5");
    user.enabled = false;
    h.registry.create(&ctx(), user).await.unwrap();
    let mut system = system_timer("mod-foo-1.0.0", "/a");
    system.enabled = false;
    h.registry.create(&ctx(), system).await.unwrap();

    assert_eq!(h.registry.switch_module_timers(&ctx(), "mod-foo", true).await.unwrap(), 1);
    let still_disabled = h
        .store
        .find_by_module_and_enabled(&ctx(), "mod-foo", false)
        .await
        .unwrap();
    assert_eq!(still_disabled.len(), 1);
    assert_eq!(still_disabled[0].kind, Some(TimerType::User));
    assert_eq!(h.engine.job_count(), 1);
}

#[tokio::test]
async fn unprovisioned_tenant_surfaces_table_missing() {
    let h = harness().await;
    let other = TenantContext::new("nobody").unwrap();
    let err = h.registry.create(&other, user_timer("/foo", "5")).await.unwrap_err();
    assert!(err.is_table_missing());
    assert_eq!(err.status_code(), 404);
}

#[tokio::test]
async fn init_tenant_and_rebuild_all_register_stored_timers() {
    let h = harness().await;
    h.registry.create(&ctx(), user_timer("/a", "5")).await.unwrap();
    h.registry.create(&ctx(), user_timer("/b", "5")).await.unwrap();

    // Fresh engine, as after a restart.
    let engine = Arc::new(RecordingEngine::new());
    let registry = TimerRegistry::new(h.store.clone(), TriggerCoordinator::new(engine.clone()));
    assert_eq!(registry.rebuild_all().await.unwrap(), 2);
    assert_eq!(engine.job_count(), 2);

    let fresh = TenantContext::new("alpha").unwrap();
    assert_eq!(registry.init_tenant(&fresh).await.unwrap(), 0);
    assert!(h.store.tenants().await.unwrap().contains(&"alpha".to_string()));
}
