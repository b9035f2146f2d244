//! The roaster task in paused tokio time: ticking, events and persistence.

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};

use roasty_rs::config::{PlantMode, SimulationConfig};
use roasty_rs::controller::Controller;
use roasty_rs::engine::{FinishReason, FinishedRoast, RoastEngine, RoastState};
use roasty_rs::plant::{Actuators, HardwarePlant, PlantError, PlantReading, SimulatedPlant, TemperatureProbe};
use roasty_rs::profile::{Profile, Setpoint};
use roasty_rs::roaster::{RoastEvent, RoasterHandle, RoasterService, ServiceError, StopReport};
use roasty_rs::scheduler::{SystemClock, TimeSource, tick_interval};
use roasty_rs::storage::{MemoryLogSink, RoastLogSink, RoastLogStore, StorageError};

const SPEED_UP: f64 = 5.0;

fn spawn_simulated(
    sink: &(impl RoastLogSink + Clone),
) -> (
    RoasterHandle,
    broadcast::Sender<()>,
    tokio::task::JoinHandle<Result<(), ServiceError>>,
) {
    let clock: Arc<dyn TimeSource> = Arc::new(SystemClock::new());
    let plant = SimulatedPlant::new(SimulationConfig::default(), clock.clone(), SPEED_UP);
    let engine = RoastEngine::new(plant.into(), Controller::default(), clock, SPEED_UP, Profile::constant(200.0));
    let (shutdown, _) = broadcast::channel(1);
    let (handle, task) = RoasterService::spawn(
        engine,
        Arc::new(sink.clone()),
        tick_interval(PlantMode::Simulated, SPEED_UP),
        shutdown.subscribe(),
    );
    (handle, shutdown, task)
}

fn ramp() -> Profile {
    Profile::new(vec![Setpoint::new(0.0, 200.0), Setpoint::new(60.0, 220.0)]).unwrap()
}

async fn next_event(events: &mut broadcast::Receiver<RoastEvent>) -> Option<RoastEvent> {
    loop {
        match events.recv().await {
            Ok(event) => return Some(event),
            Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => return None,
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_automatic_completion_emits_one_finish() {
    let sink = MemoryLogSink::new();
    let (roaster, _shutdown, _task) = spawn_simulated(&sink);
    let mut events = roaster.subscribe();

    roaster.start_preheat().await.unwrap();
    let mut preheat_ticks = 0;
    while preheat_ticks < 120 {
        if let Some(RoastEvent::Snapshot(s)) = next_event(&mut events).await {
            assert!(s.is_preheating);
            preheat_ticks += 1;
        }
    }

    let start = roaster.start_roast(ramp()).await.unwrap();
    assert_eq!(start.profile.time.len(), 61);

    let mut finishes = 0;
    let mut last_snapshot = None;
    let result = tokio::time::timeout(Duration::from_secs(300), async {
        loop {
            match next_event(&mut events).await {
                Some(RoastEvent::Snapshot(s)) => last_snapshot = Some(s),
                Some(RoastEvent::Finished { roast_finished }) => {
                    assert!(roast_finished);
                    finishes += 1;
                    break;
                }
                None => break,
            }
        }
    })
    .await;
    assert!(result.is_ok(), "roast did not complete");
    assert_eq!(finishes, 1);

    let snapshot = last_snapshot.unwrap();
    assert!(snapshot.is_roast_completed);
    assert!(snapshot.elapsed_time >= 60.0);
    assert!(snapshot.bean_temperature >= snapshot.target_temperature);

    // The finished roast was saved before the event went out.
    let saved = sink.saved();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].reason, FinishReason::Completed);
    assert!(!saved[0].records.is_empty());

    // Completed: the loop goes quiet.
    let quiet = tokio::time::timeout(Duration::from_secs(10), next_event(&mut events)).await;
    assert!(quiet.is_err());
    assert_eq!(roaster.status().await.unwrap().engine.state, RoastState::Completed);
}

#[tokio::test(start_paused = true)]
async fn test_stop_and_shutdown_persist_history() {
    let sink = MemoryLogSink::new();
    let (roaster, shutdown, task) = spawn_simulated(&sink);

    assert_eq!(roaster.stop_roast().await.unwrap(), StopReport::NoRoastInProgress);
    roaster.start_preheat().await.unwrap();
    roaster.start_roast(ramp()).await.unwrap();
    tokio::time::sleep(Duration::from_secs(2)).await;
    let StopReport::Stopped { log } = roaster.stop_roast().await.unwrap() else {
        panic!("expected a stopped roast");
    };
    assert_eq!(log, "memory:1");

    // A roast cut short by shutdown keeps what it has.
    roaster.start_preheat().await.unwrap();
    roaster.start_roast(ramp()).await.unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    shutdown.send(()).unwrap();
    task.await.unwrap().unwrap();

    let saved = sink.saved();
    assert_eq!(saved.len(), 2);
    assert_eq!(saved[0].reason, FinishReason::Stopped);
    assert_eq!(saved[1].reason, FinishReason::Aborted);
    assert!(matches!(roaster.status().await, Err(ServiceError::Unavailable)));
}

struct FailingProbe;

impl TemperatureProbe for FailingProbe {
    fn latest(&self) -> Result<PlantReading, PlantError> {
        Err(PlantError::Sensor("probe unplugged".to_string()))
    }
}

struct NullActuators;

impl Actuators for NullActuators {
    fn set_fan(&mut self, _speed: f64) -> Result<(), PlantError> {
        Ok(())
    }
    fn set_heater(&mut self, _power: f64) -> Result<(), PlantError> {
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn test_plant_failure_ends_session() {
    let clock: Arc<dyn TimeSource> = Arc::new(SystemClock::new());
    let plant = HardwarePlant::new(Box::new(FailingProbe), Box::new(NullActuators));
    let engine = RoastEngine::new(plant.into(), Controller::default(), clock, 1.0, Profile::constant(200.0));
    let (_shutdown, rx) = broadcast::channel(1);
    let (roaster, task) = RoasterService::spawn(engine, Arc::new(MemoryLogSink::new()), Duration::from_secs(1), rx);

    roaster.start_preheat().await.unwrap();
    let result = task.await.unwrap();
    assert!(matches!(
        result,
        Err(ServiceError::Engine(roasty_rs::engine::EngineError::Plant(PlantError::Sensor(_))))
    ));
}

/// Fails every save while `failing` is set, then hands off to memory.
#[derive(Clone, Default)]
struct FlakySink {
    failing: Arc<AtomicBool>,
    inner: MemoryLogSink,
}

#[async_trait]
impl RoastLogSink for FlakySink {
    async fn save(&self, roast: &FinishedRoast) -> Result<String, StorageError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StorageError::Io(std::io::Error::other("disk full")));
        }
        self.inner.save(roast).await
    }
}

#[tokio::test(start_paused = true)]
async fn test_failed_save_keeps_roast_for_retry() {
    let sink = FlakySink::default();
    sink.failing.store(true, Ordering::SeqCst);
    let (roaster, _shutdown, _task) = spawn_simulated(&sink);

    roaster.start_preheat().await.unwrap();
    roaster.start_roast(ramp()).await.unwrap();
    tokio::time::sleep(Duration::from_secs(2)).await;

    let err = roaster.stop_roast().await.unwrap_err();
    assert!(matches!(err, ServiceError::Storage(StorageError::Io(_))));
    let status = roaster.status().await.unwrap();
    assert_eq!(status.engine.state, RoastState::Completed);
    assert_eq!(status.unsaved_roasts, 1);

    // Still failing: nothing is dropped.
    assert!(roaster.stop_roast().await.is_err());
    assert_eq!(roaster.status().await.unwrap().unsaved_roasts, 1);

    sink.failing.store(false, Ordering::SeqCst);
    let report = roaster.stop_roast().await.unwrap();
    assert_eq!(report, StopReport::Stopped { log: "memory:1".to_string() });
    assert_eq!(roaster.status().await.unwrap().unsaved_roasts, 0);
    assert_eq!(roaster.stop_roast().await.unwrap(), StopReport::NoRoastInProgress);

    let saved = sink.inner.saved();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].reason, FinishReason::Stopped);
    assert!(!saved[0].records.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_retries_unsaved_roast() {
    let sink = FlakySink::default();
    sink.failing.store(true, Ordering::SeqCst);
    let (roaster, shutdown, task) = spawn_simulated(&sink);

    roaster.start_preheat().await.unwrap();
    roaster.start_roast(ramp()).await.unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(roaster.stop_roast().await.is_err());

    sink.failing.store(false, Ordering::SeqCst);
    shutdown.send(()).unwrap();
    task.await.unwrap().unwrap();

    let saved = sink.inner.saved();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].reason, FinishReason::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_stopped_roast_written_as_csv() {
    let dir = tempfile::tempdir().unwrap();
    let store = RoastLogStore::new(dir.path().join("roast_logs"));
    let (roaster, _shutdown, _task) = spawn_simulated(&store);

    roaster.start_preheat().await.unwrap();
    roaster.start_roast(ramp()).await.unwrap();
    tokio::time::sleep(Duration::from_secs(2)).await;
    let StopReport::Stopped { log } = roaster.stop_roast().await.unwrap() else {
        panic!("expected a stopped roast");
    };
    assert!(log.starts_with("roast_log_") && log.ends_with(".csv"));
    assert_eq!(store.list().await.unwrap(), vec![log.clone()]);

    let text = std::fs::read_to_string(dir.path().join("roast_logs").join(&log)).unwrap();
    assert_eq!(
        text.lines().next(),
        Some("timestamp,bean_temperature,environment_temperature,fan_speed,heating_power,target_temperature")
    );

    let rows = store.read(&log).await.unwrap();
    assert!(!rows.is_empty());
    // About ten simulated seconds into a 200 -> 220 ramp over 60 s.
    let mut previous = 200.0;
    for row in &rows {
        assert!(row.target_temperature >= previous);
        assert!(row.target_temperature < 205.0);
        assert!((0.0..=1.0).contains(&row.heating_power));
        previous = row.target_temperature;
    }
}
