//! Mirror, boot and kernel settings plus the loopback-exemption list.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::backend::{CallOutcome, InitData};
use crate::engine::{Engine, Msg};

pub const DEFAULT_MIRROR_URL: &str = "https://gh-proxy.com/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutoConnectMode {
    Full,
    Tun,
    Proxy,
}

impl AutoConnectMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Tun => "tun",
            Self::Proxy => "proxy",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MirrorSettings {
    pub url: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BootSettings {
    pub start_on_boot: bool,
    pub auto_connect: bool,
    pub auto_connect_mode: AutoConnectMode,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KernelSettings {
    pub ipv6_enabled: bool,
    pub log_level: String,
    pub log_to_file: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub mirror: MirrorSettings,
    pub boot: BootSettings,
    pub kernel: KernelSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mirror: MirrorSettings {
                url: DEFAULT_MIRROR_URL.into(),
                enabled: true,
            },
            boot: BootSettings {
                start_on_boot: false,
                auto_connect: false,
                auto_connect_mode: AutoConnectMode::Full,
            },
            kernel: KernelSettings {
                ipv6_enabled: false,
                log_level: "info".into(),
                log_to_file: false,
            },
        }
    }
}

impl Settings {
    /// Mirror URL passed to download operations, empty when disabled.
    pub fn effective_mirror(&self) -> String {
        if self.mirror.enabled {
            self.mirror.url.clone()
        } else {
            String::new()
        }
    }

    pub fn apply(&mut self, data: &InitData) {
        self.mirror.url = data.mirror.clone();
        self.mirror.enabled = data.mirror_enabled;
        self.boot.start_on_boot = data.start_on_boot;
        self.boot.auto_connect = data.auto_connect;
        self.boot.auto_connect_mode = data.auto_connect_mode;
        self.kernel.ipv6_enabled = data.ipv6_enabled;
        self.kernel.log_level = data.log_level.clone();
        self.kernel.log_to_file = data.log_to_file;
    }
}

impl Engine {
    /// The flip is optimistic; url and enabled flag persist as one unit.
    pub(crate) fn toggle_mirror(&mut self) {
        self.settings.mirror.enabled = !self.settings.mirror.enabled;

        let url = self.settings.mirror.url.clone();
        let enabled = self.settings.mirror.enabled;
        let backend = Arc::clone(&self.backend);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let response = backend.save_mirror_settings(&url, enabled).await;
            let _ = tx.send(Msg::MirrorSaveFinished(CallOutcome::parse(&response)));
        });
    }

    pub(crate) fn finish_mirror_save(&mut self, outcome: CallOutcome) {
        if let Some(body) = outcome.into_failure() {
            self.fail_settings_call(body);
        }
    }

    pub(crate) fn toggle_start_on_boot(&mut self) {
        let desired = !self.settings.boot.start_on_boot;
        let backend = Arc::clone(&self.backend);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let response = backend.set_start_on_boot(desired).await;
            let _ = tx.send(Msg::StartOnBootFinished {
                desired,
                outcome: CallOutcome::parse(&response),
            });
        });
    }

    pub(crate) fn finish_start_on_boot(&mut self, desired: bool, outcome: CallOutcome) {
        match outcome.into_failure() {
            None => {
                self.settings.boot.start_on_boot = desired;
                // One-way: enabling start-on-boot also enables auto-connect,
                // never the reverse.
                if desired && !self.settings.boot.auto_connect {
                    self.request_auto_connect(true, self.settings.boot.auto_connect_mode);
                }
            }
            Some(body) => self.fail_settings_call(body),
        }
    }

    pub(crate) fn toggle_auto_connect(&mut self) {
        let desired = !self.settings.boot.auto_connect;
        self.request_auto_connect(desired, self.settings.boot.auto_connect_mode);
    }

    fn request_auto_connect(&self, enabled: bool, mode: AutoConnectMode) {
        let backend = Arc::clone(&self.backend);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let response = backend.set_auto_connect(enabled, mode).await;
            let _ = tx.send(Msg::AutoConnectFinished {
                enabled,
                outcome: CallOutcome::parse(&response),
            });
        });
    }

    pub(crate) fn finish_auto_connect(&mut self, enabled: bool, outcome: CallOutcome) {
        match outcome.into_failure() {
            None => self.settings.boot.auto_connect = enabled,
            Some(body) => self.fail_settings_call(body),
        }
    }

    pub(crate) fn set_auto_connect_mode(&mut self, mode: AutoConnectMode) {
        let enabled = self.settings.boot.auto_connect;
        let backend = Arc::clone(&self.backend);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let response = backend.set_auto_connect(enabled, mode).await;
            let _ = tx.send(Msg::AutoConnectModeFinished {
                mode,
                outcome: CallOutcome::parse(&response),
            });
        });
    }

    pub(crate) fn finish_auto_connect_mode(&mut self, mode: AutoConnectMode, outcome: CallOutcome) {
        match outcome.into_failure() {
            None => self.settings.boot.auto_connect_mode = mode,
            Some(body) => self.fail_settings_call(body),
        }
    }

    pub(crate) fn set_ipv6(&mut self, enabled: bool) {
        let backend = Arc::clone(&self.backend);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let response = backend.set_ipv6(enabled).await;
            let _ = tx.send(Msg::Ipv6Finished {
                enabled,
                outcome: CallOutcome::parse(&response),
            });
        });
    }

    pub(crate) fn finish_ipv6(&mut self, enabled: bool, outcome: CallOutcome) {
        match outcome.into_failure() {
            None => self.settings.kernel.ipv6_enabled = enabled,
            Some(body) => self.fail_settings_call(body),
        }
    }

    pub(crate) fn set_log_config(&mut self, level: String, to_file: bool) {
        let backend = Arc::clone(&self.backend);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let response = backend.set_log_config(&level, to_file).await;
            let _ = tx.send(Msg::LogConfigFinished {
                level,
                to_file,
                outcome: CallOutcome::parse(&response),
            });
        });
    }

    pub(crate) fn finish_log_config(&mut self, level: String, to_file: bool, outcome: CallOutcome) {
        match outcome.into_failure() {
            None => {
                self.settings.kernel.log_level = level;
                self.settings.kernel.log_to_file = to_file;
            }
            Some(body) => self.fail_settings_call(body),
        }
    }

    pub(crate) fn fetch_loopback_apps(&mut self) {
        let backend = Arc::clone(&self.backend);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = backend.list_loopback_apps().await;
            let _ = tx.send(Msg::LoopbackAppsLoaded(result));
        });
    }

    pub(crate) fn finish_loopback_apps(
        &mut self,
        result: Result<Vec<crate::backend::LoopbackApp>, String>,
    ) {
        match result {
            Ok(apps) => self.loopback_apps = apps,
            Err(body) => self.fail_settings_call(body),
        }
    }

    pub(crate) fn set_loopback_exemptions(&mut self, sids: Vec<String>) {
        let backend = Arc::clone(&self.backend);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let response = backend.set_loopback_exemptions(&sids).await;
            let _ = tx.send(Msg::LoopbackExemptionsFinished(CallOutcome::parse(
                &response,
            )));
        });
    }

    pub(crate) fn finish_loopback_exemptions(&mut self, outcome: CallOutcome) {
        match outcome.into_failure() {
            None => self.fetch_loopback_apps(),
            Some(body) => self.fail_settings_call(body),
        }
    }

    pub(crate) fn minimize(&self) {
        let backend = Arc::clone(&self.backend);
        tokio::spawn(async move { backend.minimize().await });
    }

    pub(crate) fn minimize_to_tray(&self) {
        let backend = Arc::clone(&self.backend);
        tokio::spawn(async move { backend.minimize_to_tray().await });
    }

    pub(crate) fn open_dashboard(&self) {
        let backend = Arc::clone(&self.backend);
        tokio::spawn(async move { backend.open_dashboard().await });
    }

    pub(crate) fn quit(&self) {
        let backend = Arc::clone(&self.backend);
        tokio::spawn(async move { backend.quit().await });
    }

    fn fail_settings_call(&mut self, body: String) {
        self.connection.set_status_error("Error");
        self.connection.set_error_log(body);
    }
}
