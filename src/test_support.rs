//! Doubles shared by the unit tests.

use std::{
    io,
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use futures::future::BoxFuture;

use crate::{
    config::AppConfig,
    dao::{
        models::MoveEntity,
        move_log::MoveLog,
        storage::{StorageError, StorageResult},
    },
    engine::{Engine, EngineError, EngineFactory, Frame},
    error::ServiceError,
    services::{
        frame_export::FrameExporter,
        persistence::PersistenceGate,
        session_controller::{LoadOutcome, SessionController, SessionSettings},
    },
    state::{AppState, SharedState, SseHub, game::Action},
};

pub const SCRIPTED_STATE: &[u8] = b"scripted-state";

/// Fresh directory under the OS temp dir.
pub fn scratch_dir(prefix: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("crowdplay-{prefix}-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Poll `done` until it holds, letting spawned tasks run in between.
pub async fn wait_until(mut done: impl FnMut() -> bool) {
    for _ in 0..200 {
        if done() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached");
}

/// Engine interaction recorded by [`ScriptedFactory`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    ApplyAction(Action, u32),
    Advance(u32),
    SaveState,
    LoadState,
}

#[derive(Default)]
struct Script {
    calls: Mutex<Vec<EngineCall>>,
    constructed: AtomicUsize,
    advances: AtomicUsize,
    fail_construct: AtomicBool,
    fail_advance_after: Mutex<Option<usize>>,
    apply_delay: Mutex<Option<Duration>>,
}

/// Factory building engines that record every call.
#[derive(Clone, Default)]
pub struct ScriptedFactory {
    script: Arc<Script>,
}

impl ScriptedFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_construct(self) -> Self {
        self.script.fail_construct.store(true, Ordering::SeqCst);
        self
    }

    /// Every `advance` after the first `count` fails.
    pub fn failing_advance_after(self, count: usize) -> Self {
        *self.script.fail_advance_after.lock().unwrap() = Some(count);
        self
    }

    /// Every `apply_action` blocks the calling thread for `delay`.
    pub fn slow_apply(self, delay: Duration) -> Self {
        *self.script.apply_delay.lock().unwrap() = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.script.calls.lock().unwrap().clone()
    }

    pub fn applied_actions(&self) -> Vec<(Action, u32)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                EngineCall::ApplyAction(action, hold) => Some((action, hold)),
                _ => None,
            })
            .collect()
    }

    pub fn advance_count(&self) -> usize {
        self.script.advances.load(Ordering::SeqCst)
    }

    pub fn constructed(&self) -> usize {
        self.script.constructed.load(Ordering::SeqCst)
    }
}

impl EngineFactory for ScriptedFactory {
    fn construct(&self, rom_path: &Path) -> Result<Box<dyn Engine>, EngineError> {
        if self.script.fail_construct.load(Ordering::SeqCst) {
            return Err(EngineError::InvalidRom {
                path: rom_path.to_path_buf(),
                reason: "scripted failure".into(),
            });
        }
        self.script.constructed.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedEngine {
            script: self.script.clone(),
        }))
    }
}

struct ScriptedEngine {
    script: Arc<Script>,
}

impl ScriptedEngine {
    fn record(&self, call: EngineCall) {
        self.script.calls.lock().unwrap().push(call);
    }
}

impl Engine for ScriptedEngine {
    fn apply_action(&mut self, action: Action, hold_ticks: u32) -> Result<(), EngineError> {
        let delay = *self.script.apply_delay.lock().unwrap();
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        self.record(EngineCall::ApplyAction(action, hold_ticks));
        Ok(())
    }

    fn advance(&mut self, frames: u32, _render: bool) -> Result<(), EngineError> {
        let done = self.script.advances.fetch_add(1, Ordering::SeqCst);
        if let Some(limit) = *self.script.fail_advance_after.lock().unwrap() {
            if done >= limit {
                return Err(EngineError::Fault("scripted crash".into()));
            }
        }
        self.record(EngineCall::Advance(frames));
        Ok(())
    }

    fn current_frame(&self) -> Result<Frame, EngineError> {
        Ok(Frame {
            content_type: "image/x-portable-pixmap",
            bytes: b"P6\n1 1\n255\n\x00\x00\x00".to_vec(),
        })
    }

    fn save_state(&mut self) -> Result<Vec<u8>, EngineError> {
        self.record(EngineCall::SaveState);
        Ok(SCRIPTED_STATE.to_vec())
    }

    fn load_state(&mut self, state: &[u8]) -> Result<(), EngineError> {
        if state != SCRIPTED_STATE {
            return Err(EngineError::State("unrecognised state".into()));
        }
        self.record(EngineCall::LoadState);
        Ok(())
    }
}

/// Analytics store keeping entries in memory.
#[derive(Clone)]
pub struct MemoryMoveLog {
    entries: Arc<Mutex<Vec<MoveEntity>>>,
    healthy: Arc<AtomicBool>,
}

impl MemoryMoveLog {
    pub fn new() -> Self {
        Self {
            entries: Arc::default(),
            healthy: Arc::new(AtomicBool::new(true)),
        }
    }

    /// A store refusing every call.
    pub fn failing() -> Self {
        let store = Self::new();
        store.set_healthy(false);
        store
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub fn entries(&self) -> Vec<MoveEntity> {
        self.entries.lock().unwrap().clone()
    }

    fn check(&self) -> StorageResult<()> {
        if self.healthy.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StorageError::unavailable(
                "memory store offline".into(),
                io::Error::other("offline"),
            ))
        }
    }
}

impl MoveLog for MemoryMoveLog {
    fn append(&self, entry: MoveEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.check()?;
            store.entries.lock().unwrap().push(entry);
            Ok(())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let result = self.check();
        Box::pin(async move { result })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let result = self.check();
        Box::pin(async move { result })
    }
}

/// Controller wired to a scripted engine and scratch files.
pub struct TestSession {
    pub controller: SessionController,
    pub factory: ScriptedFactory,
    pub events: SseHub,
    pub root: PathBuf,
    pub rom_path: PathBuf,
}

impl TestSession {
    /// Idle controller; nothing loaded yet.
    pub fn prepare(factory: ScriptedFactory) -> Self {
        Self::prepare_with(factory, |_| {})
    }

    /// Idle controller whose round timing is adjusted by `tune`.
    pub fn prepare_with(
        factory: ScriptedFactory,
        tune: impl FnOnce(&mut SessionSettings),
    ) -> Self {
        let root = scratch_dir("session");
        let config = AppConfig::default().with_storage_root(&root);
        std::fs::create_dir_all(config.rom_dir()).unwrap();
        let rom_path = config.rom_dir().join("test.gb");
        std::fs::write(&rom_path, b"rom").unwrap();

        let events = SseHub::new(1024);
        let mut settings = SessionSettings::from(&config);
        tune(&mut settings);
        let controller = SessionController::new(
            settings,
            Arc::new(factory.clone()),
            PersistenceGate::new(config.save_path()),
            FrameExporter::new(config.frame_path()),
            events.clone(),
        );

        Self {
            controller,
            factory,
            events,
            root,
            rom_path,
        }
    }

    /// Controller with `test.gb` already running.
    pub async fn start(factory: ScriptedFactory) -> Self {
        let session = Self::prepare(factory);
        session.load().await.unwrap();
        session
    }

    pub async fn load(&self) -> Result<LoadOutcome, ServiceError> {
        self.controller.load("test.gb", &self.rom_path).await
    }

    pub fn save_path(&self) -> PathBuf {
        self.controller.persistence().state_file().path().to_path_buf()
    }
}

pub const OPERATOR: u64 = 418_986_435_144_581_130;

/// Application state over scratch directories with [`OPERATOR`] as operator
/// and a `test.gb` ROM in place.
pub fn test_state(factory: ScriptedFactory) -> SharedState {
    let root = scratch_dir("app");
    let config = AppConfig::default()
        .with_storage_root(&root)
        .with_operator(crate::state::game::ParticipantId(OPERATOR));
    std::fs::create_dir_all(config.rom_dir()).unwrap();
    std::fs::write(config.rom_dir().join("test.gb"), b"rom").unwrap();
    AppState::new(config, Arc::new(factory))
}
