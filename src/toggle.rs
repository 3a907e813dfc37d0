//! Optimistic start/stop/mode-change workflow and its mutual-exclusion gate.

use std::sync::Arc;

use crate::backend::CallOutcome;
use crate::engine::{Engine, Msg, SETTLE_DELAY};
use crate::store::ModeSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleTarget {
    Tun,
    Proxy,
}

/// Immediate answer to a toggle attempt. `Busy` and `KernelMissing` are
/// local rejections; no backend call was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleDispatch {
    Started,
    Busy,
    KernelMissing,
}

/// Lock state for the toggle workflow; the settle window after a confirmed
/// transition still holds the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ToggleGate {
    Idle,
    InFlight,
    Settling,
}

impl Engine {
    pub(crate) fn handle_toggle(&mut self, target: ToggleTarget) -> ToggleDispatch {
        let (tun, proxy) = match target {
            ToggleTarget::Tun => (!self.connection.tun_mode(), self.connection.sys_proxy()),
            ToggleTarget::Proxy => (self.connection.tun_mode(), !self.connection.sys_proxy()),
        };
        self.handle_set_mode(tun, proxy)
    }

    pub(crate) fn handle_set_mode(&mut self, tun: bool, proxy: bool) -> ToggleDispatch {
        if self.gate != ToggleGate::Idle {
            log::debug!("[toggle] dropped: gate is {:?}", self.gate);
            return ToggleDispatch::Busy;
        }
        if !self.connection.core_exists() {
            self.connection.set_status("KERNEL MISSING!");
            return ToggleDispatch::KernelMissing;
        }

        let prior = self.connection.mode_snapshot();
        self.gate = ToggleGate::InFlight;
        self.connection.set_processing(true);
        self.connection
            .set_status(if tun || proxy { "STARTING..." } else { "STOPPING..." });

        log::info!("[toggle] applying mode tun={tun} proxy={proxy}");
        let backend = Arc::clone(&self.backend);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let response = backend.apply_mode(tun, proxy).await;
            let _ = tx.send(Msg::ToggleFinished {
                outcome: CallOutcome::parse(&response),
                tun,
                proxy,
                prior,
            });
        });

        ToggleDispatch::Started
    }

    /// The call fires with the desired values; the store commits here.
    pub(crate) fn finish_toggle(
        &mut self,
        outcome: CallOutcome,
        tun: bool,
        proxy: bool,
        prior: ModeSnapshot,
    ) {
        self.connection.set_processing(false);

        match outcome {
            CallOutcome::Ok | CallOutcome::Stopped => {
                self.connection.commit_mode(tun, proxy);
                let running = self.connection.running();
                self.connection
                    .set_status(if running { "RUNNING" } else { "STOPPED" });

                self.settle_generation += 1;
                self.gate = ToggleGate::Settling;
                self.schedule(SETTLE_DELAY, Msg::SettleElapsed(self.settle_generation));
            }
            CallOutcome::ConfigMissing(body) => {
                log::warn!("[toggle] rejected: {body}");
                self.gate = ToggleGate::Idle;
                self.connection
                    .set_status_error("No active configuration selected");
            }
            CallOutcome::KernelMissing(body) => {
                self.gate = ToggleGate::Idle;
                self.connection.set_core_exists(false);
                self.connection.restore_modes(prior);
                self.connection.set_status_error("ERROR");
                self.connection.set_error_log(body);
            }
            CallOutcome::Failed(body) => {
                log::warn!("[toggle] apply-mode failed: {body}");
                self.gate = ToggleGate::Idle;
                self.connection.restore_modes(prior);
                self.connection.set_status_error("ERROR");
                self.connection.set_error_log(body);
            }
        }
    }

    pub(crate) fn finish_settle(&mut self, generation: u64) {
        if generation == self.settle_generation && self.gate == ToggleGate::Settling {
            self.gate = ToggleGate::Idle;
        }
    }
}
