//! Scoped load/save/reset sessions over raw configuration blobs.

use std::sync::Arc;

use crate::backend::{CallOutcome, OverrideKind};
use crate::engine::{EDITOR_CLOSE_DELAY, Engine, Msg};
use crate::settings::DEFAULT_MIRROR_URL;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorKind {
    Tun,
    Mixed,
    Mirror,
}

impl EditorKind {
    pub fn override_kind(self) -> Option<OverrideKind> {
        match self {
            Self::Tun => Some(OverrideKind::Tun),
            Self::Mixed => Some(OverrideKind::Mixed),
            Self::Mirror => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tun => "tun",
            Self::Mixed => "mixed",
            Self::Mirror => "mirror",
        }
    }
}

/// At most one session exists; opening a new one discards any unsaved edits.
#[derive(Debug, Clone, PartialEq)]
pub struct EditorSession {
    pub kind: EditorKind,
    pub content: String,
    pub loading: bool,
    pub saved: bool,
}

/// Content that does not parse is returned untouched so opening never fails.
pub fn pretty_print_json(content: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(content) {
        Ok(value) => serde_json::to_string_pretty(&value).unwrap_or_else(|_| content.to_string()),
        Err(_) => content.to_string(),
    }
}

impl Engine {
    pub(crate) fn open_editor(&mut self, kind: EditorKind) {
        log::debug!("[editor] opening {} session", kind.as_str());
        self.editor_generation += 1;

        match kind.override_kind() {
            None => {
                self.editor = Some(EditorSession {
                    kind,
                    content: self.settings.mirror.url.clone(),
                    loading: false,
                    saved: false,
                });
            }
            Some(override_kind) => {
                self.editor = Some(EditorSession {
                    kind,
                    content: String::new(),
                    loading: true,
                    saved: false,
                });

                let generation = self.editor_generation;
                let backend = Arc::clone(&self.backend);
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    let content = backend.get_override(override_kind).await;
                    let _ = tx.send(Msg::EditorLoaded {
                        generation,
                        content,
                    });
                });
            }
        }
    }

    pub(crate) fn finish_editor_load(&mut self, generation: u64, content: String) {
        if generation != self.editor_generation {
            return;
        }
        if let Some(editor) = self.editor.as_mut() {
            editor.content = pretty_print_json(&content);
            editor.loading = false;
        }
    }

    pub(crate) fn set_editor_content(&mut self, content: String) {
        if let Some(editor) = self.editor.as_mut() {
            editor.content = content;
            editor.saved = false;
        }
    }

    pub(crate) fn save_editor(&mut self) {
        let Some(editor) = self.editor.clone() else {
            return;
        };
        let generation = self.editor_generation;
        let backend = Arc::clone(&self.backend);
        let tx = self.tx.clone();

        match editor.kind.override_kind() {
            // The mirror URL persists together with its current enabled flag.
            None => {
                let enabled = self.settings.mirror.enabled;
                tokio::spawn(async move {
                    let response = backend.save_mirror_settings(&editor.content, enabled).await;
                    let _ = tx.send(Msg::EditorSaveFinished {
                        generation,
                        kind: editor.kind,
                        content: editor.content,
                        outcome: CallOutcome::parse(&response),
                    });
                });
            }
            // Saved verbatim, malformed input included.
            Some(override_kind) => {
                tokio::spawn(async move {
                    let response = backend
                        .save_override(override_kind, &editor.content)
                        .await;
                    let _ = tx.send(Msg::EditorSaveFinished {
                        generation,
                        kind: editor.kind,
                        content: editor.content,
                        outcome: CallOutcome::parse(&response),
                    });
                });
            }
        }
    }

    pub(crate) fn finish_editor_save(
        &mut self,
        generation: u64,
        kind: EditorKind,
        content: String,
        outcome: CallOutcome,
    ) {
        if generation != self.editor_generation {
            return;
        }

        match outcome.into_failure() {
            None => {
                if kind == EditorKind::Mirror {
                    self.settings.mirror.url = content;
                }
                if let Some(editor) = self.editor.as_mut() {
                    editor.saved = true;
                }
                // The kernel does not hot-reload these kinds.
                if self.connection.running() && kind != EditorKind::Mirror {
                    self.connection.set_status("RESTART TO APPLY");
                }
                self.schedule(EDITOR_CLOSE_DELAY, Msg::EditorCloseElapsed(generation));
            }
            Some(body) => {
                self.connection.set_status_error("Error");
                self.connection.set_error_log(body);
            }
        }
    }

    pub(crate) fn finish_editor_close(&mut self, generation: u64) {
        if generation == self.editor_generation {
            self.editor = None;
        }
    }

    pub(crate) fn close_editor(&mut self) {
        self.editor = None;
        self.editor_generation += 1;
    }

    pub(crate) fn reset_editor(&mut self) {
        let Some(editor) = self.editor.as_ref() else {
            return;
        };

        match editor.kind.override_kind() {
            None => {
                if let Some(editor) = self.editor.as_mut() {
                    editor.content = DEFAULT_MIRROR_URL.into();
                    editor.saved = false;
                }
            }
            Some(override_kind) => {
                let generation = self.editor_generation;
                let backend = Arc::clone(&self.backend);
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    let reset = backend.reset_override(override_kind).await;
                    let result = if CallOutcome::parse(&reset).is_success() {
                        Ok(backend.get_override(override_kind).await)
                    } else {
                        Err(reset)
                    };
                    let _ = tx.send(Msg::EditorResetFinished { generation, result });
                });
            }
        }
    }

    pub(crate) fn finish_editor_reset(&mut self, generation: u64, result: Result<String, String>) {
        if generation != self.editor_generation {
            return;
        }
        let Some(editor) = self.editor.as_mut() else {
            return;
        };

        match result {
            Ok(content) => {
                editor.content = pretty_print_json(&content);
                editor.saved = false;
            }
            Err(body) => {
                log::warn!("[editor] reset round trip failed: {body}");
                editor.content = "Error".into();
            }
        }
    }
}
