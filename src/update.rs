//! Version-check and download lifecycle for the kernel and the program.

use std::sync::Arc;

use crate::backend::CallOutcome;
use crate::engine::{Engine, Msg, UPDATE_SUCCESS_REVERT_DELAY};
use crate::events::clean_log;
use crate::version::{is_newer_version, strip_version_prefix};

const CHECK_FAILURE_MARKERS: [&str; 3] = ["Error", "Failed", "No tag"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateState {
    Idle,
    Checking,
    Available,
    Latest,
    Updating,
    Success,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateTarget {
    Kernel,
    Program,
}

impl UpdateTarget {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Kernel => "kernel",
            Self::Program => "program",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateWorkflow {
    pub state: UpdateState,
    pub local_version: String,
    pub remote_version: String,
    pub download_progress: u8,
}

pub(crate) enum CheckVerdict {
    Available,
    Latest,
    Failed(String),
}

impl UpdateWorkflow {
    pub fn new(local_version: impl Into<String>) -> Self {
        Self {
            state: UpdateState::Idle,
            local_version: local_version.into(),
            remote_version: "Unknown".into(),
            download_progress: 0,
        }
    }

    pub fn is_busy(&self) -> bool {
        matches!(self.state, UpdateState::Checking | UpdateState::Updating)
    }

    pub(crate) fn begin_check(&mut self) -> bool {
        if self.is_busy() {
            return false;
        }
        self.state = UpdateState::Checking;
        true
    }

    pub(crate) fn finish_check(&mut self, response: &str) -> CheckVerdict {
        if CHECK_FAILURE_MARKERS
            .iter()
            .any(|marker| response.contains(marker))
        {
            self.state = UpdateState::Idle;
            return CheckVerdict::Failed(response.to_string());
        }

        self.remote_version = response.to_string();
        if is_newer_version(response, &self.local_version) {
            self.state = UpdateState::Available;
            CheckVerdict::Available
        } else {
            self.state = UpdateState::Latest;
            CheckVerdict::Latest
        }
    }

    pub(crate) fn begin_update(&mut self) -> bool {
        if self.state != UpdateState::Available {
            return false;
        }
        self.state = UpdateState::Updating;
        self.download_progress = 0;
        true
    }

    /// The local version is synthesized from the remote string, not re-queried.
    pub(crate) fn finish_update_success(&mut self) {
        self.local_version = strip_version_prefix(&self.remote_version).to_string();
        self.state = UpdateState::Success;
    }

    pub(crate) fn finish_update_failure(&mut self) {
        self.state = UpdateState::Error;
    }
}

impl Engine {
    pub(crate) fn workflow_mut(&mut self, target: UpdateTarget) -> &mut UpdateWorkflow {
        match target {
            UpdateTarget::Kernel => &mut self.kernel_update,
            UpdateTarget::Program => &mut self.program_update,
        }
    }

    pub(crate) fn check_update(&mut self, target: UpdateTarget) {
        if !self.workflow_mut(target).begin_check() {
            return;
        }

        let backend = Arc::clone(&self.backend);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let response = match target {
                UpdateTarget::Kernel => backend.check_kernel_update().await,
                UpdateTarget::Program => backend.check_program_update().await,
            };
            let _ = tx.send(Msg::UpdateCheckFinished { target, response });
        });
    }

    pub(crate) fn finish_update_check(&mut self, target: UpdateTarget, response: String) {
        match self.workflow_mut(target).finish_check(&response) {
            CheckVerdict::Failed(body) => {
                log::warn!("[update] {} check failed: {body}", target.as_str());
                self.connection.set_status("Check Failed");
                self.connection.set_error_log(body);
            }
            CheckVerdict::Available => {
                log::info!(
                    "[update] {} update available: {}",
                    target.as_str(),
                    self.workflow_mut(target).remote_version
                );
            }
            CheckVerdict::Latest => {}
        }
    }

    pub(crate) fn perform_update(&mut self, target: UpdateTarget) {
        if !self.workflow_mut(target).begin_update() {
            return;
        }
        self.connection.set_status("Init Download...");

        let mirror = self.settings.effective_mirror();
        let backend = Arc::clone(&self.backend);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let response = match target {
                UpdateTarget::Kernel => backend.update_kernel(&mirror).await,
                UpdateTarget::Program => backend.update_program(&mirror).await,
            };
            let _ = tx.send(Msg::UpdateApplyFinished {
                target,
                outcome: CallOutcome::parse(&response),
            });
        });
    }

    pub(crate) fn finish_update_apply(&mut self, target: UpdateTarget, outcome: CallOutcome) {
        match outcome.into_failure() {
            None => {
                if target == UpdateTarget::Kernel {
                    self.connection.set_core_exists(true);
                }
                self.connection.set_status("Updated!");
                self.workflow_mut(target).finish_update_success();

                let generation = self.bump_revert_generation(target);
                self.schedule(
                    UPDATE_SUCCESS_REVERT_DELAY,
                    Msg::UpdateRevertElapsed { target, generation },
                );
            }
            Some(body) => {
                self.connection.set_status_error("Failed");
                self.connection.set_error_log(clean_log(&body));
                self.workflow_mut(target).finish_update_failure();
            }
        }
    }

    pub(crate) fn finish_update_revert(&mut self, target: UpdateTarget, generation: u64) {
        let current = match target {
            UpdateTarget::Kernel => self.kernel_revert_generation,
            UpdateTarget::Program => self.program_revert_generation,
        };
        if generation != current {
            return;
        }
        let workflow = self.workflow_mut(target);
        if workflow.state == UpdateState::Success {
            workflow.state = UpdateState::Idle;
        }
    }

    /// Progress events carry no addressee: they land on whichever instance
    /// is mid-download and are dropped when none is.
    pub(crate) fn apply_download_progress(&mut self, percent: u8) {
        let mut routed = false;
        for workflow in [&mut self.kernel_update, &mut self.program_update] {
            if workflow.state == UpdateState::Updating {
                workflow.download_progress = percent.min(100);
                routed = true;
            }
        }
        if !routed {
            log::trace!("[update] discarding stray download progress: {percent}%");
        }
    }

    fn bump_revert_generation(&mut self, target: UpdateTarget) -> u64 {
        match target {
            UpdateTarget::Kernel => {
                self.kernel_revert_generation += 1;
                self.kernel_revert_generation
            }
            UpdateTarget::Program => {
                self.program_revert_generation += 1;
                self.program_revert_generation
            }
        }
    }
}
