//! Canonical view-model for run/mode state.

use crate::backend::InitData;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Normal,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusMessage {
    pub text: String,
    pub kind: StatusKind,
}

impl StatusMessage {
    pub fn is_error(&self) -> bool {
        self.kind == StatusKind::Error
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeSnapshot {
    pub tun_mode: bool,
    pub sys_proxy: bool,
}

/// Invariant: while `running` is false, both mode flags are false.
#[derive(Debug, Clone)]
pub struct ConnectionState {
    running: bool,
    tun_mode: bool,
    sys_proxy: bool,
    core_exists: bool,
    is_processing: bool,
    status: StatusMessage,
    error_log: String,
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self {
            running: false,
            tun_mode: false,
            sys_proxy: false,
            core_exists: true,
            is_processing: false,
            status: StatusMessage {
                text: "READY".into(),
                kind: StatusKind::Normal,
            },
            error_log: String::new(),
        }
    }
}

impl ConnectionState {
    pub fn running(&self) -> bool {
        self.running
    }

    pub fn tun_mode(&self) -> bool {
        self.tun_mode
    }

    pub fn sys_proxy(&self) -> bool {
        self.sys_proxy
    }

    pub fn core_exists(&self) -> bool {
        self.core_exists
    }

    pub fn is_processing(&self) -> bool {
        self.is_processing
    }

    pub fn status(&self) -> &StatusMessage {
        &self.status
    }

    pub fn error_log(&self) -> &str {
        &self.error_log
    }

    pub fn headline(&self) -> &'static str {
        if !self.core_exists {
            return "MISSING";
        }
        if self.status.is_error() {
            return "ERROR";
        }
        if !self.running {
            return "OFFLINE";
        }
        match (self.tun_mode, self.sys_proxy) {
            (true, true) => "FULL MODE",
            (true, false) => "TUN MODE",
            (false, true) => "PROXY MODE",
            (false, false) => "ONLINE",
        }
    }

    pub fn mode_snapshot(&self) -> ModeSnapshot {
        ModeSnapshot {
            tun_mode: self.tun_mode,
            sys_proxy: self.sys_proxy,
        }
    }

    /// Action-driven status write. A new action clears a sticky error.
    pub fn set_status(&mut self, text: impl Into<String>) {
        self.status = StatusMessage {
            text: text.into(),
            kind: StatusKind::Normal,
        };
    }

    pub fn set_status_error(&mut self, text: impl Into<String>) {
        self.status = StatusMessage {
            text: text.into(),
            kind: StatusKind::Error,
        };
    }

    /// Log-driven write: never clears an error status.
    pub fn set_status_passive(&mut self, text: impl Into<String>) {
        if self.status.is_error() {
            return;
        }
        self.status = StatusMessage {
            text: text.into(),
            kind: StatusKind::Normal,
        };
    }

    pub fn set_error_log(&mut self, body: impl Into<String>) {
        self.error_log = body.into();
    }

    pub fn set_processing(&mut self, processing: bool) {
        self.is_processing = processing;
    }

    pub fn set_core_exists(&mut self, exists: bool) {
        self.core_exists = exists;
    }

    pub fn set_running(&mut self, running: bool) {
        self.running = running;
        self.normalize();
    }

    pub fn apply_state_sync(&mut self, tun_mode: bool, sys_proxy: bool) {
        self.tun_mode = tun_mode;
        self.sys_proxy = sys_proxy;
        self.normalize();
    }

    pub fn commit_mode(&mut self, tun_mode: bool, sys_proxy: bool) {
        self.tun_mode = tun_mode;
        self.sys_proxy = sys_proxy;
        self.running = tun_mode || sys_proxy;
    }

    pub fn restore_modes(&mut self, snapshot: ModeSnapshot) {
        self.tun_mode = snapshot.tun_mode;
        self.sys_proxy = snapshot.sys_proxy;
        self.normalize();
    }

    pub fn force_stopped(&mut self) {
        self.running = false;
        self.normalize();
    }

    pub fn refresh_from(&mut self, data: &InitData) {
        self.running = data.running;
        self.core_exists = data.core_exists;
        self.tun_mode = data.running && data.tun_mode;
        self.sys_proxy = data.running && data.sys_proxy;
        if !data.core_exists {
            self.set_status("Kernel Missing");
        }
    }

    fn normalize(&mut self) {
        if !self.running {
            self.tun_mode = false;
            self.sys_proxy = false;
        }
    }
}
