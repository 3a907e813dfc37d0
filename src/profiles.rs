//! Named connection profiles and the refresh-after-mutate workflow.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::backend::CallOutcome;
use crate::engine::{Engine, Msg};
use crate::events::clean_log;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub updated: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileDraft {
    pub name: String,
    pub url: String,
}

impl ProfileDraft {
    pub fn is_empty(&self) -> bool {
        self.name.is_empty() || self.url.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EditDraft {
    pub id: String,
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Default)]
pub struct ProfileManager {
    pub profiles: Vec<Profile>,
    pub active: Option<Profile>,
    pub draft: ProfileDraft,
    pub edit: Option<EditDraft>,
    pub pending_delete: Option<String>,
    pub adding: bool,
    pub editing: bool,
    pub updating_active: bool,
}

impl ProfileManager {
    pub fn active_id(&self) -> Option<&str> {
        self.active.as_ref().map(|profile| profile.id.as_str())
    }

    /// An active profile with an empty id is the backend's "none" marker.
    pub fn replace(&mut self, profiles: Vec<Profile>, active: Option<Profile>) {
        self.profiles = profiles;
        self.active = active.filter(|profile| !profile.id.is_empty());
    }

    pub fn find(&self, id: &str) -> Option<&Profile> {
        self.profiles.iter().find(|profile| profile.id == id)
    }
}

impl Engine {
    pub(crate) fn set_profile_draft(&mut self, name: String, url: String) {
        self.profiles.draft = ProfileDraft { name, url };
    }

    pub(crate) fn add_profile(&mut self) {
        if self.profiles.adding {
            return;
        }
        if self.profiles.draft.is_empty() {
            self.connection.set_status("Input missing");
            return;
        }

        self.profiles.adding = true;
        self.connection.set_status("Downloading Config...");

        let draft = self.profiles.draft.clone();
        let backend = Arc::clone(&self.backend);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let response = backend.add_profile(&draft.name, &draft.url).await;
            let _ = tx.send(Msg::ProfileAddFinished(CallOutcome::parse(&response)));
        });
    }

    pub(crate) fn finish_add_profile(&mut self, outcome: CallOutcome) {
        self.profiles.adding = false;
        match outcome.into_failure() {
            None => {
                self.connection.set_status("Success");
                self.profiles.draft = ProfileDraft::default();
                self.refresh();
            }
            Some(body) => self.fail_profile_call(body),
        }
    }

    pub(crate) fn switch_profile(&mut self, id: String) {
        if self.profiles.active_id() == Some(id.as_str()) {
            log::debug!("[profiles] switch to already-active profile ignored: {id}");
            return;
        }

        let backend = Arc::clone(&self.backend);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let response = backend.select_profile(&id).await;
            let _ = tx.send(Msg::ProfileSwitchFinished(CallOutcome::parse(&response)));
        });
    }

    pub(crate) fn finish_switch_profile(&mut self, outcome: CallOutcome) {
        match outcome.into_failure() {
            None => {
                self.connection.set_status("Switched");
                self.refresh();
            }
            Some(body) => self.fail_profile_call(body),
        }
    }

    pub(crate) fn request_delete_profile(&mut self, id: String) {
        self.profiles.pending_delete = Some(id);
    }

    pub(crate) fn cancel_delete_profile(&mut self) {
        self.profiles.pending_delete = None;
    }

    pub(crate) fn confirm_delete_profile(&mut self) {
        let Some(id) = self.profiles.pending_delete.take() else {
            return;
        };

        log::info!("[profiles] deleting profile {id}");
        let backend = Arc::clone(&self.backend);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let response = backend.delete_profile(&id).await;
            let _ = tx.send(Msg::ProfileDeleteFinished(CallOutcome::parse(&response)));
        });
    }

    pub(crate) fn finish_delete_profile(&mut self, outcome: CallOutcome) {
        if let Some(body) = outcome.into_failure() {
            self.fail_profile_call(body);
        }
        // The refresh is authoritative either way.
        self.refresh();
    }

    pub(crate) fn begin_edit_profile(&mut self, id: String) {
        match self.profiles.find(&id) {
            Some(profile) => {
                self.profiles.edit = Some(EditDraft {
                    id: profile.id.clone(),
                    name: profile.name.clone(),
                    url: profile.url.clone(),
                });
            }
            None => log::warn!("[profiles] edit requested for unknown profile {id}"),
        }
    }

    pub(crate) fn set_edit_draft(&mut self, name: String, url: String) {
        if let Some(edit) = self.profiles.edit.as_mut() {
            edit.name = name;
            edit.url = url;
        }
    }

    pub(crate) fn save_edited_profile(&mut self) {
        if self.profiles.editing {
            return;
        }
        let Some(edit) = self.profiles.edit.clone() else {
            return;
        };
        if edit.name.is_empty() || edit.url.is_empty() {
            self.connection.set_status("Input missing");
            return;
        }

        self.profiles.editing = true;
        let backend = Arc::clone(&self.backend);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let response = backend.edit_profile(&edit.id, &edit.name, &edit.url).await;
            let _ = tx.send(Msg::ProfileEditFinished(CallOutcome::parse(&response)));
        });
    }

    pub(crate) fn finish_edit_profile(&mut self, outcome: CallOutcome) {
        self.profiles.editing = false;
        match outcome.into_failure() {
            None => {
                self.connection.set_status("Updated");
                self.profiles.edit = None;
                self.refresh();
            }
            Some(body) => self.fail_profile_call(body),
        }
    }

    pub(crate) fn update_active_profile(&mut self) {
        if self.profiles.updating_active {
            return;
        }
        self.profiles.updating_active = true;
        self.connection.set_status("Updating...");

        let backend = Arc::clone(&self.backend);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let response = backend.update_active_profile().await;
            let _ = tx.send(Msg::ActiveUpdateFinished(CallOutcome::parse(&response)));
        });
    }

    pub(crate) fn finish_update_active(&mut self, outcome: CallOutcome) {
        self.profiles.updating_active = false;
        match outcome.into_failure() {
            None => {
                self.connection.set_status("Updated");
                self.refresh();
            }
            Some(body) => self.fail_profile_call(body),
        }
    }

    fn fail_profile_call(&mut self, body: String) {
        self.connection.set_status_error("Error");
        self.connection.set_error_log(clean_log(&body));
    }
}
