//! The serializing owner of all engine state. Intents, push events, call
//! completions and timer expirations arrive as mailbox messages and are
//! applied strictly in order; a snapshot is published after each one.

use std::{path::PathBuf, sync::Arc, time::Duration};

use futures::{StreamExt, stream::BoxStream};
use tokio::sync::{mpsc, oneshot, watch};

use crate::backend::{Backend, CallOutcome, InitData, LoopbackApp, PushEvent};
use crate::editor::{EditorKind, EditorSession};
use crate::events::{LogBuffer, LogClass, classify_log_line, clean_log};
use crate::profiles::ProfileManager;
use crate::session_log::SessionLog;
use crate::settings::{AutoConnectMode, Settings};
use crate::store::{ConnectionState, ModeSnapshot};
use crate::toggle::{ToggleDispatch, ToggleGate, ToggleTarget};
use crate::update::{UpdateTarget, UpdateWorkflow};

/// Gate hold after a confirmed transition, absorbing the backend's own echo.
pub const SETTLE_DELAY: Duration = Duration::from_millis(1500);
pub const UPDATE_SUCCESS_REVERT_DELAY: Duration = Duration::from_millis(2000);
pub const EDITOR_CLOSE_DELAY: Duration = Duration::from_millis(800);

pub(crate) enum Msg {
    Refresh,
    RefreshFinished(Result<InitData, String>),

    Toggle {
        target: ToggleTarget,
        reply: oneshot::Sender<ToggleDispatch>,
    },
    SetMode {
        tun: bool,
        proxy: bool,
        reply: oneshot::Sender<ToggleDispatch>,
    },
    ToggleFinished {
        outcome: CallOutcome,
        tun: bool,
        proxy: bool,
        prior: ModeSnapshot,
    },
    SettleElapsed(u64),

    Push(PushEvent),

    SetProfileDraft { name: String, url: String },
    AddProfile,
    ProfileAddFinished(CallOutcome),
    SwitchProfile(String),
    ProfileSwitchFinished(CallOutcome),
    RequestDeleteProfile(String),
    CancelDeleteProfile,
    ConfirmDeleteProfile,
    ProfileDeleteFinished(CallOutcome),
    BeginEditProfile(String),
    SetEditDraft { name: String, url: String },
    SaveEditedProfile,
    ProfileEditFinished(CallOutcome),
    UpdateActiveProfile,
    ActiveUpdateFinished(CallOutcome),

    CheckUpdate(UpdateTarget),
    PerformUpdate(UpdateTarget),
    UpdateCheckFinished {
        target: UpdateTarget,
        response: String,
    },
    UpdateApplyFinished {
        target: UpdateTarget,
        outcome: CallOutcome,
    },
    UpdateRevertElapsed {
        target: UpdateTarget,
        generation: u64,
    },

    OpenEditor(EditorKind),
    EditorInput(String),
    SaveEditor,
    ResetEditor,
    CloseEditor,
    EditorLoaded {
        generation: u64,
        content: String,
    },
    EditorSaveFinished {
        generation: u64,
        kind: EditorKind,
        content: String,
        outcome: CallOutcome,
    },
    EditorCloseElapsed(u64),
    EditorResetFinished {
        generation: u64,
        result: Result<String, String>,
    },

    ToggleMirror,
    MirrorSaveFinished(CallOutcome),
    ToggleStartOnBoot,
    StartOnBootFinished {
        desired: bool,
        outcome: CallOutcome,
    },
    ToggleAutoConnect,
    AutoConnectFinished {
        enabled: bool,
        outcome: CallOutcome,
    },
    SetAutoConnectMode(AutoConnectMode),
    AutoConnectModeFinished {
        mode: AutoConnectMode,
        outcome: CallOutcome,
    },
    SetIpv6(bool),
    Ipv6Finished {
        enabled: bool,
        outcome: CallOutcome,
    },
    SetLogConfig {
        level: String,
        to_file: bool,
    },
    LogConfigFinished {
        level: String,
        to_file: bool,
        outcome: CallOutcome,
    },
    FetchLoopbackApps,
    LoopbackAppsLoaded(Result<Vec<LoopbackApp>, String>),
    SetLoopbackExemptions(Vec<String>),
    LoopbackExemptionsFinished(CallOutcome),

    Minimize,
    MinimizeToTray,
    OpenDashboard,
    Quit,
}

pub struct EngineOptions {
    pub program_version: String,
    /// Where per-session kernel log files land; `None` disables them.
    pub session_log_directory: Option<PathBuf>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            program_version: env!("CARGO_PKG_VERSION").into(),
            session_log_directory: Some(SessionLog::default_directory()),
        }
    }
}

/// Immutable copy of the engine state, published after every applied message.
#[derive(Clone)]
pub struct EngineSnapshot {
    pub connection: ConnectionState,
    pub profiles: ProfileManager,
    pub kernel_update: UpdateWorkflow,
    pub program_update: UpdateWorkflow,
    pub editor: Option<EditorSession>,
    pub settings: Settings,
    pub loopback_apps: Vec<LoopbackApp>,
    pub log_lines: Vec<String>,
}

pub struct Engine {
    pub(crate) backend: Arc<dyn Backend>,
    pub(crate) tx: mpsc::UnboundedSender<Msg>,
    pub(crate) connection: ConnectionState,
    pub(crate) profiles: ProfileManager,
    pub(crate) kernel_update: UpdateWorkflow,
    pub(crate) program_update: UpdateWorkflow,
    pub(crate) editor: Option<EditorSession>,
    pub(crate) settings: Settings,
    pub(crate) loopback_apps: Vec<LoopbackApp>,
    pub(crate) gate: ToggleGate,
    pub(crate) settle_generation: u64,
    pub(crate) kernel_revert_generation: u64,
    pub(crate) program_revert_generation: u64,
    pub(crate) editor_generation: u64,
    pub(crate) log_buffer: LogBuffer,
    pub(crate) session_log: Option<SessionLog>,
    snapshot_tx: watch::Sender<EngineSnapshot>,
}

impl Engine {
    pub fn spawn(backend: Arc<dyn Backend>, events: BoxStream<'static, PushEvent>) -> EngineHandle {
        Self::spawn_with_options(backend, events, EngineOptions::default())
    }

    pub fn spawn_with_options(
        backend: Arc<dyn Backend>,
        events: BoxStream<'static, PushEvent>,
        options: EngineOptions,
    ) -> EngineHandle {
        let (tx, rx) = mpsc::unbounded_channel();

        let session_log = options
            .session_log_directory
            .as_deref()
            .and_then(SessionLog::create);

        let engine = Engine {
            backend,
            tx: tx.clone(),
            connection: ConnectionState::default(),
            profiles: ProfileManager::default(),
            kernel_update: UpdateWorkflow::new("Unknown"),
            program_update: UpdateWorkflow::new(options.program_version),
            editor: None,
            settings: Settings::default(),
            loopback_apps: Vec::new(),
            gate: ToggleGate::Idle,
            settle_generation: 0,
            kernel_revert_generation: 0,
            program_revert_generation: 0,
            editor_generation: 0,
            log_buffer: LogBuffer::new(),
            session_log,
            snapshot_tx: watch::channel(EngineSnapshot {
                connection: ConnectionState::default(),
                profiles: ProfileManager::default(),
                kernel_update: UpdateWorkflow::new("Unknown"),
                program_update: UpdateWorkflow::new("Unknown"),
                editor: None,
                settings: Settings::default(),
                loopback_apps: Vec::new(),
                log_lines: Vec::new(),
            })
            .0,
        };

        let snapshot_rx = engine.snapshot_tx.subscribe();
        engine.publish();
        tokio::spawn(engine.run(rx, events));

        let handle = EngineHandle {
            tx,
            snapshot: snapshot_rx,
        };
        handle.refresh();
        handle
    }

    async fn run(
        mut self,
        mut receiver: mpsc::UnboundedReceiver<Msg>,
        mut events: BoxStream<'static, PushEvent>,
    ) {
        let mut events_done = false;
        loop {
            tokio::select! {
                message = receiver.recv() => match message {
                    Some(message) => self.apply(message),
                    None => break,
                },
                event = events.next(), if !events_done => match event {
                    Some(event) => self.apply(Msg::Push(event)),
                    None => {
                        log::info!("[engine] push-event channel closed");
                        events_done = true;
                        continue;
                    }
                },
            }
            self.publish();
        }
    }

    fn apply(&mut self, message: Msg) {
        match message {
            Msg::Refresh => self.refresh(),
            Msg::RefreshFinished(result) => self.finish_refresh(result),

            Msg::Toggle { target, reply } => {
                let _ = reply.send(self.handle_toggle(target));
            }
            Msg::SetMode { tun, proxy, reply } => {
                let _ = reply.send(self.handle_set_mode(tun, proxy));
            }
            Msg::ToggleFinished {
                outcome,
                tun,
                proxy,
                prior,
            } => self.finish_toggle(outcome, tun, proxy, prior),
            Msg::SettleElapsed(generation) => self.finish_settle(generation),

            Msg::Push(event) => self.handle_push(event),

            Msg::SetProfileDraft { name, url } => self.set_profile_draft(name, url),
            Msg::AddProfile => self.add_profile(),
            Msg::ProfileAddFinished(outcome) => self.finish_add_profile(outcome),
            Msg::SwitchProfile(id) => self.switch_profile(id),
            Msg::ProfileSwitchFinished(outcome) => self.finish_switch_profile(outcome),
            Msg::RequestDeleteProfile(id) => self.request_delete_profile(id),
            Msg::CancelDeleteProfile => self.cancel_delete_profile(),
            Msg::ConfirmDeleteProfile => self.confirm_delete_profile(),
            Msg::ProfileDeleteFinished(outcome) => self.finish_delete_profile(outcome),
            Msg::BeginEditProfile(id) => self.begin_edit_profile(id),
            Msg::SetEditDraft { name, url } => self.set_edit_draft(name, url),
            Msg::SaveEditedProfile => self.save_edited_profile(),
            Msg::ProfileEditFinished(outcome) => self.finish_edit_profile(outcome),
            Msg::UpdateActiveProfile => self.update_active_profile(),
            Msg::ActiveUpdateFinished(outcome) => self.finish_update_active(outcome),

            Msg::CheckUpdate(target) => self.check_update(target),
            Msg::PerformUpdate(target) => self.perform_update(target),
            Msg::UpdateCheckFinished { target, response } => {
                self.finish_update_check(target, response)
            }
            Msg::UpdateApplyFinished { target, outcome } => {
                self.finish_update_apply(target, outcome)
            }
            Msg::UpdateRevertElapsed { target, generation } => {
                self.finish_update_revert(target, generation)
            }

            Msg::OpenEditor(kind) => self.open_editor(kind),
            Msg::EditorInput(content) => self.set_editor_content(content),
            Msg::SaveEditor => self.save_editor(),
            Msg::ResetEditor => self.reset_editor(),
            Msg::CloseEditor => self.close_editor(),
            Msg::EditorLoaded {
                generation,
                content,
            } => self.finish_editor_load(generation, content),
            Msg::EditorSaveFinished {
                generation,
                kind,
                content,
                outcome,
            } => self.finish_editor_save(generation, kind, content, outcome),
            Msg::EditorCloseElapsed(generation) => self.finish_editor_close(generation),
            Msg::EditorResetFinished { generation, result } => {
                self.finish_editor_reset(generation, result)
            }

            Msg::ToggleMirror => self.toggle_mirror(),
            Msg::MirrorSaveFinished(outcome) => self.finish_mirror_save(outcome),
            Msg::ToggleStartOnBoot => self.toggle_start_on_boot(),
            Msg::StartOnBootFinished { desired, outcome } => {
                self.finish_start_on_boot(desired, outcome)
            }
            Msg::ToggleAutoConnect => self.toggle_auto_connect(),
            Msg::AutoConnectFinished { enabled, outcome } => {
                self.finish_auto_connect(enabled, outcome)
            }
            Msg::SetAutoConnectMode(mode) => self.set_auto_connect_mode(mode),
            Msg::AutoConnectModeFinished { mode, outcome } => {
                self.finish_auto_connect_mode(mode, outcome)
            }
            Msg::SetIpv6(enabled) => self.set_ipv6(enabled),
            Msg::Ipv6Finished { enabled, outcome } => self.finish_ipv6(enabled, outcome),
            Msg::SetLogConfig { level, to_file } => self.set_log_config(level, to_file),
            Msg::LogConfigFinished {
                level,
                to_file,
                outcome,
            } => self.finish_log_config(level, to_file, outcome),
            Msg::FetchLoopbackApps => self.fetch_loopback_apps(),
            Msg::LoopbackAppsLoaded(result) => self.finish_loopback_apps(result),
            Msg::SetLoopbackExemptions(sids) => self.set_loopback_exemptions(sids),
            Msg::LoopbackExemptionsFinished(outcome) => self.finish_loopback_exemptions(outcome),

            Msg::Minimize => self.minimize(),
            Msg::MinimizeToTray => self.minimize_to_tray(),
            Msg::OpenDashboard => self.open_dashboard(),
            Msg::Quit => self.quit(),
        }
    }

    fn handle_push(&mut self, event: PushEvent) {
        match event {
            PushEvent::Status(state) => {
                log::debug!("[events] run status: {state}");
                self.connection.set_running(state);
            }
            PushEvent::StateSync { tun_mode, sys_proxy } => {
                log::debug!("[events] state sync: tun={tun_mode} proxy={sys_proxy}");
                self.connection.apply_state_sync(tun_mode, sys_proxy);
            }
            PushEvent::Log(text) => self.ingest_log_line(&text),
            PushEvent::DownloadProgress(percent) => self.apply_download_progress(percent),
        }
    }

    fn ingest_log_line(&mut self, text: &str) {
        let cleaned = clean_log(text);
        match classify_log_line(&cleaned) {
            LogClass::Benign => {
                log::trace!("[events] dropping shutdown noise: {cleaned}");
            }
            LogClass::Error => {
                log::warn!("[events] kernel error: {cleaned}");
                self.connection.set_status_error("ERROR");
                self.connection.force_stopped();
                self.connection.set_error_log(cleaned.clone());
                self.record_log_line(cleaned);
            }
            LogClass::Normal => {
                self.connection.set_status_passive(cleaned.clone());
                self.record_log_line(cleaned);
            }
        }
    }

    fn record_log_line(&mut self, line: String) {
        if let Some(session_log) = self.session_log.as_mut() {
            session_log.append(&line);
        }
        self.log_buffer.push(line);
    }

    pub(crate) fn refresh(&mut self) {
        let backend = Arc::clone(&self.backend);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = backend.fetch_state().await;
            let _ = tx.send(Msg::RefreshFinished(result));
        });
    }

    /// Every substructure is replaced wholesale, never patched.
    fn finish_refresh(&mut self, result: Result<InitData, String>) {
        match result {
            Ok(data) => {
                self.connection.refresh_from(&data);
                self.kernel_update.local_version = data.local_version.clone();
                self.settings.apply(&data);
                self.profiles.replace(data.profiles, data.active_profile);
            }
            Err(body) => {
                log::warn!("[engine] full-state fetch failed: {body}");
                self.connection.set_status_error("Error");
                self.connection.set_error_log(body);
            }
        }
    }

    pub(crate) fn schedule(&self, delay: Duration, message: Msg) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(message);
        });
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(EngineSnapshot {
            connection: self.connection.clone(),
            profiles: self.profiles.clone(),
            kernel_update: self.kernel_update.clone(),
            program_update: self.program_update.clone(),
            editor: self.editor.clone(),
            settings: self.settings.clone(),
            loopback_apps: self.loopback_apps.clone(),
            log_lines: self.log_buffer.lines().to_vec(),
        });
    }
}

/// Cloneable front to the engine task. Sends are fire-and-forget except the
/// toggle entry points, which report their dispatch outcome.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::UnboundedSender<Msg>,
    snapshot: watch::Receiver<EngineSnapshot>,
}

impl EngineHandle {
    fn send(&self, message: Msg) {
        if self.tx.send(message).is_err() {
            log::warn!("[engine] message dropped: engine task is gone");
        }
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<EngineSnapshot> {
        self.snapshot.clone()
    }

    pub fn refresh(&self) {
        self.send(Msg::Refresh);
    }

    pub async fn toggle(&self, target: ToggleTarget) -> ToggleDispatch {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(Msg::Toggle {
            target,
            reply: reply_tx,
        });
        reply_rx.await.unwrap_or(ToggleDispatch::Busy)
    }

    pub async fn set_mode(&self, tun: bool, proxy: bool) -> ToggleDispatch {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(Msg::SetMode {
            tun,
            proxy,
            reply: reply_tx,
        });
        reply_rx.await.unwrap_or(ToggleDispatch::Busy)
    }

    pub fn set_profile_draft(&self, name: impl Into<String>, url: impl Into<String>) {
        self.send(Msg::SetProfileDraft {
            name: name.into(),
            url: url.into(),
        });
    }

    pub fn add_profile(&self) {
        self.send(Msg::AddProfile);
    }

    pub fn switch_profile(&self, id: impl Into<String>) {
        self.send(Msg::SwitchProfile(id.into()));
    }

    pub fn request_delete_profile(&self, id: impl Into<String>) {
        self.send(Msg::RequestDeleteProfile(id.into()));
    }

    pub fn cancel_delete_profile(&self) {
        self.send(Msg::CancelDeleteProfile);
    }

    pub fn confirm_delete_profile(&self) {
        self.send(Msg::ConfirmDeleteProfile);
    }

    pub fn begin_edit_profile(&self, id: impl Into<String>) {
        self.send(Msg::BeginEditProfile(id.into()));
    }

    pub fn set_edit_draft(&self, name: impl Into<String>, url: impl Into<String>) {
        self.send(Msg::SetEditDraft {
            name: name.into(),
            url: url.into(),
        });
    }

    pub fn save_edited_profile(&self) {
        self.send(Msg::SaveEditedProfile);
    }

    pub fn update_active_profile(&self) {
        self.send(Msg::UpdateActiveProfile);
    }

    pub fn check_kernel_update(&self) {
        self.send(Msg::CheckUpdate(UpdateTarget::Kernel));
    }

    pub fn perform_kernel_update(&self) {
        self.send(Msg::PerformUpdate(UpdateTarget::Kernel));
    }

    pub fn check_program_update(&self) {
        self.send(Msg::CheckUpdate(UpdateTarget::Program));
    }

    pub fn perform_program_update(&self) {
        self.send(Msg::PerformUpdate(UpdateTarget::Program));
    }

    pub fn open_editor(&self, kind: EditorKind) {
        self.send(Msg::OpenEditor(kind));
    }

    pub fn set_editor_content(&self, content: impl Into<String>) {
        self.send(Msg::EditorInput(content.into()));
    }

    pub fn save_editor(&self) {
        self.send(Msg::SaveEditor);
    }

    pub fn reset_editor(&self) {
        self.send(Msg::ResetEditor);
    }

    pub fn close_editor(&self) {
        self.send(Msg::CloseEditor);
    }

    pub fn toggle_mirror(&self) {
        self.send(Msg::ToggleMirror);
    }

    pub fn toggle_start_on_boot(&self) {
        self.send(Msg::ToggleStartOnBoot);
    }

    pub fn toggle_auto_connect(&self) {
        self.send(Msg::ToggleAutoConnect);
    }

    pub fn set_auto_connect_mode(&self, mode: AutoConnectMode) {
        self.send(Msg::SetAutoConnectMode(mode));
    }

    pub fn set_ipv6(&self, enabled: bool) {
        self.send(Msg::SetIpv6(enabled));
    }

    pub fn set_log_config(&self, level: impl Into<String>, to_file: bool) {
        self.send(Msg::SetLogConfig {
            level: level.into(),
            to_file,
        });
    }

    pub fn fetch_loopback_apps(&self) {
        self.send(Msg::FetchLoopbackApps);
    }

    pub fn set_loopback_exemptions(&self, sids: Vec<String>) {
        self.send(Msg::SetLoopbackExemptions(sids));
    }

    pub fn minimize(&self) {
        self.send(Msg::Minimize);
    }

    pub fn minimize_to_tray(&self) {
        self.send(Msg::MinimizeToTray);
    }

    pub fn open_dashboard(&self) {
        self.send(Msg::OpenDashboard);
    }

    pub fn quit(&self) {
        self.send(Msg::Quit);
    }
}
