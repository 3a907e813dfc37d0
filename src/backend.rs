//! Boundary to the supervisor backend: call surface, response parsing, push events.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::profiles::Profile;
use crate::settings::{AutoConnectMode, DEFAULT_MIRROR_URL};

pub const SENTINEL_SUCCESS: &str = "Success";
pub const SENTINEL_STOPPED: &str = "Stopped";

/// A backend response, parsed once at the boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome {
    Ok,
    Stopped,
    ConfigMissing(String),
    KernelMissing(String),
    Failed(String),
}

impl CallOutcome {
    pub fn parse(response: &str) -> Self {
        if response == SENTINEL_SUCCESS {
            Self::Ok
        } else if response == SENTINEL_STOPPED {
            Self::Stopped
        } else if response.contains("No active profile") || response.contains("No active configuration")
        {
            Self::ConfigMissing(response.to_string())
        } else if response.contains("Kernel missing") {
            Self::KernelMissing(response.to_string())
        } else {
            Self::Failed(response.to_string())
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Ok | Self::Stopped)
    }

    pub fn into_failure(self) -> Option<String> {
        match self {
            Self::Ok | Self::Stopped => None,
            Self::ConfigMissing(body) | Self::KernelMissing(body) | Self::Failed(body) => Some(body),
        }
    }
}

/// Out-of-band events pushed by the backend, applied in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    Status(bool),
    StateSync { tun_mode: bool, sys_proxy: bool },
    Log(String),
    DownloadProgress(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideKind {
    Tun,
    Mixed,
}

impl OverrideKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tun => "tun",
            Self::Mixed => "mixed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopbackApp {
    pub sid: String,
    pub name: String,
    #[serde(default)]
    pub is_exempt: bool,
}

/// Full-state payload; the supervisor's wire shape mixes camel and snake keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InitData {
    pub running: bool,
    pub core_exists: bool,
    pub local_version: String,
    pub tun_mode: bool,
    pub sys_proxy: bool,
    pub profiles: Vec<Profile>,
    pub active_profile: Option<Profile>,
    pub mirror: String,
    pub mirror_enabled: bool,
    pub start_on_boot: bool,
    pub auto_connect: bool,
    pub auto_connect_mode: AutoConnectMode,
    #[serde(rename = "ipv6_enabled")]
    pub ipv6_enabled: bool,
    #[serde(rename = "log_level")]
    pub log_level: String,
    #[serde(rename = "log_to_file")]
    pub log_to_file: bool,
}

impl Default for InitData {
    fn default() -> Self {
        Self {
            running: false,
            core_exists: false,
            local_version: "Not Installed".into(),
            tun_mode: false,
            sys_proxy: false,
            profiles: Vec::new(),
            active_profile: None,
            mirror: DEFAULT_MIRROR_URL.into(),
            mirror_enabled: true,
            start_on_boot: false,
            auto_connect: false,
            auto_connect_mode: AutoConnectMode::Full,
            ipv6_enabled: false,
            log_level: "info".into(),
            log_to_file: false,
        }
    }
}

/// Request/response surface of the supervisor process. Every string-returning
/// operation answers with a success sentinel or an error-describing body.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn fetch_state(&self) -> Result<InitData, String>;

    async fn apply_mode(&self, tun: bool, proxy: bool) -> String;

    async fn add_profile(&self, name: &str, url: &str) -> String;
    async fn select_profile(&self, id: &str) -> String;
    async fn delete_profile(&self, id: &str) -> String;
    async fn edit_profile(&self, id: &str, name: &str, url: &str) -> String;
    async fn update_active_profile(&self) -> String;

    async fn check_kernel_update(&self) -> String;
    async fn update_kernel(&self, mirror: &str) -> String;
    async fn check_program_update(&self) -> String;
    async fn update_program(&self, mirror: &str) -> String;

    async fn get_override(&self, kind: OverrideKind) -> String;
    async fn save_override(&self, kind: OverrideKind, content: &str) -> String;
    async fn reset_override(&self, kind: OverrideKind) -> String;

    async fn save_mirror_settings(&self, url: &str, enabled: bool) -> String;
    async fn set_start_on_boot(&self, enabled: bool) -> String;
    async fn set_auto_connect(&self, enabled: bool, mode: AutoConnectMode) -> String;
    async fn set_ipv6(&self, enabled: bool) -> String;
    async fn set_log_config(&self, level: &str, to_file: bool) -> String;

    async fn list_loopback_apps(&self) -> Result<Vec<LoopbackApp>, String>;
    async fn set_loopback_exemptions(&self, sids: &[String]) -> String;

    async fn minimize(&self);
    async fn minimize_to_tray(&self);
    async fn open_dashboard(&self);
    async fn quit(&self);
}
