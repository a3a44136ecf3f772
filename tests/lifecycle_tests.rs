use anyhow::{anyhow, Result};
use app_shell::health::{CustomCheck, HealthChecker, HealthResult, ReadinessController};
use app_shell::lifecycle::{
    App, AppOptions, Cancelled, LifecycleError, Service, ServiceState, EXIT_APPLICATION_ERROR,
    EXIT_OK, EXIT_WATCHDOG,
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

enum Behavior {
    /// Runs until cancelled.
    Wait,
    /// Returns Ok right away.
    Finish,
    Fail,
    Panic,
}

struct FakeService {
    name: &'static str,
    behavior: Behavior,
    hang_on_shutdown: bool,
    shutdowns: Arc<AtomicU32>,
}

impl FakeService {
    fn new(name: &'static str, behavior: Behavior) -> Self {
        Self {
            name,
            behavior,
            hang_on_shutdown: false,
            shutdowns: Arc::new(AtomicU32::new(0)),
        }
    }

    fn hanging(mut self) -> Self {
        self.hang_on_shutdown = true;
        self
    }
}

#[async_trait]
impl Service for FakeService {
    fn name(&self) -> &str {
        self.name
    }

    async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        match self.behavior {
            Behavior::Wait => {
                shutdown.cancelled().await;
                Err(Cancelled.into())
            }
            Behavior::Finish => Ok(()),
            Behavior::Fail => {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Err(anyhow!("connection lost"))
            }
            Behavior::Panic => {
                tokio::time::sleep(Duration::from_millis(20)).await;
                panic!("worker bug");
            }
        }
    }

    async fn shutdown(&self) -> Result<()> {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        if self.hang_on_shutdown {
            std::future::pending::<()>().await;
        }
        Ok(())
    }
}

fn options() -> AppOptions {
    AppOptions::new("test")
        .with_trap_signals(false)
        .with_shutdown_timeout(Duration::from_millis(200))
        .with_watchdog_margin(Duration::from_millis(200))
}

#[tokio::test]
async fn test_parent_cancellation_shuts_everything_down() {
    let token = CancellationToken::new();
    let worker = FakeService::new("worker", Behavior::Wait);
    let shutdowns = worker.shutdowns.clone();

    let mut app = App::new(options()).with_parent_token(token.clone());
    app.add(worker);
    let states = app.states();

    let run = tokio::spawn(app.run());
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(states.get("worker"), Some(ServiceState::Running));

    token.cancel();
    let outcome = tokio::time::timeout(Duration::from_secs(2), run)
        .await
        .expect("run did not finish")
        .unwrap();

    assert_eq!(outcome.exit_code, EXIT_OK);
    assert!(outcome.errors.is_empty());
    assert_eq!(shutdowns.load(Ordering::SeqCst), 1);
    assert_eq!(states.get("worker"), Some(ServiceState::Stopped));
}

#[tokio::test]
async fn test_normal_return_does_not_stop_siblings() {
    let token = CancellationToken::new();
    let mut app = App::new(options()).with_parent_token(token.clone());
    app.add(FakeService::new("oneshot", Behavior::Finish));
    app.add(FakeService::new("worker", Behavior::Wait));
    let states = app.states();

    let run = tokio::spawn(app.run());
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(states.get("oneshot"), Some(ServiceState::Stopped));
    assert_eq!(states.get("worker"), Some(ServiceState::Running));
    assert!(!run.is_finished());

    token.cancel();
    let outcome = tokio::time::timeout(Duration::from_secs(2), run)
        .await
        .expect("run did not finish")
        .unwrap();
    assert!(outcome.is_success());
}

#[tokio::test]
async fn test_panic_stops_all_services() {
    let mut app = App::new(options());
    app.add(FakeService::new("crashy", Behavior::Panic));
    app.add(FakeService::new("worker", Behavior::Wait));
    let states = app.states();

    let outcome = tokio::time::timeout(Duration::from_secs(2), app.run())
        .await
        .expect("panic did not stop the application");

    assert_eq!(outcome.exit_code, EXIT_APPLICATION_ERROR);
    assert!(!outcome.watchdog_fired);
    assert_eq!(outcome.errors.len(), 1);
    match &outcome.errors[0] {
        LifecycleError::ServicePanicked { service, message } => {
            assert_eq!(service, "crashy");
            assert_eq!(message, "worker bug");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(matches!(states.get("crashy"), Some(ServiceState::Failed(_))));
    assert_eq!(states.get("worker"), Some(ServiceState::Stopped));
}

#[tokio::test]
async fn test_panic_is_contained_without_stop_all() {
    let token = CancellationToken::new();
    let mut app = App::new(options().with_stop_all_on_error(false)).with_parent_token(token.clone());
    app.add(FakeService::new("crashy", Behavior::Panic));
    app.add(FakeService::new("worker", Behavior::Wait));
    let states = app.states();

    let run = tokio::spawn(app.run());
    tokio::time::sleep(Duration::from_millis(150)).await;

    assert!(matches!(states.get("crashy"), Some(ServiceState::Failed(_))));
    assert_eq!(states.get("worker"), Some(ServiceState::Running));
    assert!(!run.is_finished());

    token.cancel();
    let outcome = tokio::time::timeout(Duration::from_secs(2), run)
        .await
        .expect("run did not finish")
        .unwrap();
    assert_eq!(outcome.exit_code, EXIT_APPLICATION_ERROR);
    assert_eq!(outcome.errors.len(), 1);
}

#[tokio::test]
async fn test_run_error_stops_all_services() {
    let mut app = App::new(options());
    app.add(FakeService::new("db-listener", Behavior::Fail));
    app.add(FakeService::new("worker", Behavior::Wait));

    let outcome = tokio::time::timeout(Duration::from_secs(2), app.run())
        .await
        .expect("failure did not stop the application");

    assert_eq!(outcome.exit_code, EXIT_APPLICATION_ERROR);
    assert!(matches!(
        &outcome.errors[0],
        LifecycleError::ServiceFailed { service, .. } if service == "db-listener"
    ));
}

#[tokio::test]
async fn test_shutdown_timeout_is_reported() {
    let token = CancellationToken::new();
    let mut app = App::new(options().with_watchdog_margin(Duration::from_secs(2)))
        .with_parent_token(token.clone());
    app.add(FakeService::new("stuck", Behavior::Wait).hanging());

    token.cancel();
    let outcome = tokio::time::timeout(Duration::from_secs(3), app.run())
        .await
        .expect("run did not finish");

    assert!(!outcome.watchdog_fired);
    assert!(matches!(
        &outcome.errors[0],
        LifecycleError::ShutdownTimeout { service, .. } if service == "stuck"
    ));
}

/// Sets the flag when the future holding it is dropped.
struct SetOnDrop(Arc<AtomicBool>);

impl Drop for SetOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct Unkillable {
    dropped: Arc<AtomicBool>,
}

#[async_trait]
impl Service for Unkillable {
    fn name(&self) -> &str {
        "unkillable"
    }

    async fn run(&self, _shutdown: CancellationToken) -> Result<()> {
        // Ignores cancellation entirely.
        let _guard = SetOnDrop(self.dropped.clone());
        std::future::pending::<()>().await;
        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_watchdog_ends_a_stuck_shutdown() {
    let token = CancellationToken::new();
    let mut app = App::new(options()).with_parent_token(token.clone());
    app.add(Unkillable::default());

    let started = Instant::now();
    token.cancel();
    let outcome = tokio::time::timeout(Duration::from_secs(3), app.run())
        .await
        .expect("watchdog did not fire");

    assert!(outcome.watchdog_fired);
    assert_eq!(outcome.exit_code, EXIT_WATCHDOG);
    assert!(started.elapsed() >= Duration::from_millis(400));
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_watchdog_aborts_the_stuck_run() {
    let token = CancellationToken::new();
    let service = Unkillable::default();
    let dropped = service.dropped.clone();
    let mut app = App::new(options()).with_parent_token(token.clone());
    app.add(service);

    token.cancel();
    let outcome = tokio::time::timeout(Duration::from_secs(3), app.run())
        .await
        .expect("watchdog did not fire");
    assert!(outcome.watchdog_fired);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(dropped.load(Ordering::SeqCst), "stuck run was left detached");
}

struct Gated {
    ready: Arc<Gate>,
}

#[derive(Default)]
struct Gate(AtomicBool);

impl ReadinessController for Gate {
    fn set_ready(&self, ready: bool) {
        self.0.store(ready, Ordering::SeqCst);
    }

    fn is_ready(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Service for Gated {
    fn name(&self) -> &str {
        "gated"
    }

    async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        shutdown.cancelled().await;
        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    fn health_checks(&self) -> Vec<Arc<dyn HealthChecker>> {
        vec![Arc::new(CustomCheck::new("gated-db", || async {
            HealthResult::healthy("ok")
        }))]
    }

    fn readiness_controller(&self) -> Option<Arc<dyn ReadinessController>> {
        Some(self.ready.clone())
    }
}

#[tokio::test]
async fn test_add_registers_checks_and_readiness() {
    let gate = Arc::new(Gate::default());
    let mut app = App::new(options());
    app.add(Gated { ready: gate.clone() });
    app.with_health_checks(vec![Arc::new(CustomCheck::new("global", || async {
        HealthResult::healthy("ok")
    })) as Arc<dyn HealthChecker>]);

    let health = app.health_manager();
    assert_eq!(health.checker_names(), vec!["gated-db", "global"]);

    assert!(!app.is_ready());
    gate.set_ready(true);
    assert!(app.is_ready());
    app.set_ready(false);
    assert!(!health.is_ready());
}
