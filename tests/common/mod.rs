#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::{mpsc, oneshot};

use tunbox_core::backend::{Backend, InitData, LoopbackApp, OverrideKind};
use tunbox_core::engine::{Engine, EngineHandle, EngineOptions, EngineSnapshot};
use tunbox_core::settings::AutoConnectMode;
use tunbox_core::{Profile, PushEvent};

/// One recorded backend invocation, paired with a responder for its result.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    ApplyMode { tun: bool, proxy: bool },
    AddProfile { name: String, url: String },
    SelectProfile { id: String },
    DeleteProfile { id: String },
    EditProfile { id: String, name: String, url: String },
    UpdateActiveProfile,
    CheckKernelUpdate,
    UpdateKernel { mirror: String },
    CheckProgramUpdate,
    UpdateProgram { mirror: String },
    GetOverride { kind: OverrideKind },
    SaveOverride { kind: OverrideKind, content: String },
    ResetOverride { kind: OverrideKind },
    SaveMirrorSettings { url: String, enabled: bool },
    SetStartOnBoot { enabled: bool },
    SetAutoConnect { enabled: bool, mode: AutoConnectMode },
    SetIpv6 { enabled: bool },
    SetLogConfig { level: String, to_file: bool },
    SetLoopbackExemptions { sids: Vec<String> },
}

pub type Responder = oneshot::Sender<String>;

/// Backend double: every string-returning operation parks until the test
/// provides its response, making call interleaving fully scriptable.
/// `fetch_state` answers immediately from the shared `state`.
pub struct TestBackend {
    calls: mpsc::UnboundedSender<(Call, Responder)>,
    state: Mutex<InitData>,
    loopback: Mutex<Vec<LoopbackApp>>,
    window_ops: Mutex<Vec<&'static str>>,
}

pub struct BackendDriver {
    calls: mpsc::UnboundedReceiver<(Call, Responder)>,
}

impl BackendDriver {
    pub async fn expect_call(&mut self) -> (Call, Responder) {
        self.calls.recv().await.expect("expected a backend call")
    }
}

impl TestBackend {
    pub fn new() -> (Arc<Self>, BackendDriver) {
        let (calls_tx, calls_rx) = mpsc::unbounded_channel();
        let backend = Arc::new(Self {
            calls: calls_tx,
            state: Mutex::new(InitData::default()),
            loopback: Mutex::new(Vec::new()),
            window_ops: Mutex::new(Vec::new()),
        });
        (backend, BackendDriver { calls: calls_rx })
    }

    pub fn set_state(&self, data: InitData) {
        *self.state.lock().unwrap() = data;
    }

    pub fn mutate_state(&self, mutate: impl FnOnce(&mut InitData)) {
        mutate(&mut self.state.lock().unwrap());
    }

    pub fn set_loopback_apps(&self, apps: Vec<LoopbackApp>) {
        *self.loopback.lock().unwrap() = apps;
    }

    pub fn window_ops(&self) -> Vec<&'static str> {
        self.window_ops.lock().unwrap().clone()
    }

    async fn call(&self, call: Call) -> String {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.calls.send((call, reply_tx)).is_err() {
            return "Success".into();
        }
        reply_rx.await.unwrap_or_else(|_| "Success".into())
    }

    fn note(&self, op: &'static str) {
        self.window_ops.lock().unwrap().push(op);
    }
}

#[async_trait]
impl Backend for TestBackend {
    async fn fetch_state(&self) -> Result<InitData, String> {
        Ok(self.state.lock().unwrap().clone())
    }

    async fn apply_mode(&self, tun: bool, proxy: bool) -> String {
        self.call(Call::ApplyMode { tun, proxy }).await
    }

    async fn add_profile(&self, name: &str, url: &str) -> String {
        self.call(Call::AddProfile {
            name: name.into(),
            url: url.into(),
        })
        .await
    }

    async fn select_profile(&self, id: &str) -> String {
        self.call(Call::SelectProfile { id: id.into() }).await
    }

    async fn delete_profile(&self, id: &str) -> String {
        self.call(Call::DeleteProfile { id: id.into() }).await
    }

    async fn edit_profile(&self, id: &str, name: &str, url: &str) -> String {
        self.call(Call::EditProfile {
            id: id.into(),
            name: name.into(),
            url: url.into(),
        })
        .await
    }

    async fn update_active_profile(&self) -> String {
        self.call(Call::UpdateActiveProfile).await
    }

    async fn check_kernel_update(&self) -> String {
        self.call(Call::CheckKernelUpdate).await
    }

    async fn update_kernel(&self, mirror: &str) -> String {
        self.call(Call::UpdateKernel {
            mirror: mirror.into(),
        })
        .await
    }

    async fn check_program_update(&self) -> String {
        self.call(Call::CheckProgramUpdate).await
    }

    async fn update_program(&self, mirror: &str) -> String {
        self.call(Call::UpdateProgram {
            mirror: mirror.into(),
        })
        .await
    }

    async fn get_override(&self, kind: OverrideKind) -> String {
        self.call(Call::GetOverride { kind }).await
    }

    async fn save_override(&self, kind: OverrideKind, content: &str) -> String {
        self.call(Call::SaveOverride {
            kind,
            content: content.into(),
        })
        .await
    }

    async fn reset_override(&self, kind: OverrideKind) -> String {
        self.call(Call::ResetOverride { kind }).await
    }

    async fn save_mirror_settings(&self, url: &str, enabled: bool) -> String {
        self.call(Call::SaveMirrorSettings {
            url: url.into(),
            enabled,
        })
        .await
    }

    async fn set_start_on_boot(&self, enabled: bool) -> String {
        self.call(Call::SetStartOnBoot { enabled }).await
    }

    async fn set_auto_connect(&self, enabled: bool, mode: AutoConnectMode) -> String {
        self.call(Call::SetAutoConnect { enabled, mode }).await
    }

    async fn set_ipv6(&self, enabled: bool) -> String {
        self.call(Call::SetIpv6 { enabled }).await
    }

    async fn set_log_config(&self, level: &str, to_file: bool) -> String {
        self.call(Call::SetLogConfig {
            level: level.into(),
            to_file,
        })
        .await
    }

    async fn list_loopback_apps(&self) -> Result<Vec<LoopbackApp>, String> {
        Ok(self.loopback.lock().unwrap().clone())
    }

    async fn set_loopback_exemptions(&self, sids: &[String]) -> String {
        self.call(Call::SetLoopbackExemptions {
            sids: sids.to_vec(),
        })
        .await
    }

    async fn minimize(&self) {
        self.note("minimize");
    }

    async fn minimize_to_tray(&self) {
        self.note("minimize_to_tray");
    }

    async fn open_dashboard(&self) {
        self.note("open_dashboard");
    }

    async fn quit(&self) {
        self.note("quit");
    }
}

pub struct Harness {
    pub handle: EngineHandle,
    pub driver: BackendDriver,
    pub backend: Arc<TestBackend>,
    events: futures::channel::mpsc::UnboundedSender<PushEvent>,
}

impl Harness {
    pub fn push(&self, event: PushEvent) {
        self.events.unbounded_send(event).expect("event channel");
    }
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Reads snapshots until the predicate holds, returning the matching one.
pub async fn wait_for(
    handle: &EngineHandle,
    predicate: impl Fn(&EngineSnapshot) -> bool,
) -> EngineSnapshot {
    let mut receiver = handle.subscribe();
    loop {
        {
            let snapshot = receiver.borrow_and_update().clone();
            if predicate(&snapshot) {
                return snapshot;
            }
        }
        receiver.changed().await.expect("engine task alive");
    }
}

pub fn profile(id: &str, name: &str, url: &str) -> Profile {
    Profile {
        id: id.into(),
        name: name.into(),
        url: url.into(),
        updated: Some("2025-01-01 12:00".into()),
    }
}

pub fn install_state(local_version: &str) -> InitData {
    InitData {
        core_exists: true,
        local_version: local_version.into(),
        ..InitData::default()
    }
}

/// Spawns an engine over a fresh test backend and waits for the initial
/// full-state fetch to land.
pub async fn spawn_engine_with(initial: InitData) -> Harness {
    init_logging();
    let (backend, driver) = TestBackend::new();
    backend.set_state(initial.clone());

    let (events_tx, events_rx) = futures::channel::mpsc::unbounded();
    let handle = Engine::spawn_with_options(
        backend.clone(),
        events_rx.boxed(),
        EngineOptions {
            program_version: "1.0.0".into(),
            session_log_directory: None,
        },
    );

    let expected_version = initial.local_version.clone();
    wait_for(&handle, move |snapshot| {
        snapshot.kernel_update.local_version == expected_version
    })
    .await;

    Harness {
        handle,
        driver,
        backend,
        events: events_tx,
    }
}

pub async fn spawn_engine() -> Harness {
    spawn_engine_with(install_state("1.0.0")).await
}
