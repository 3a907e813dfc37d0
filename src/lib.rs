//! State synchronization engine for a tunnel/proxy supervisor client:
//! optimistic local transitions, backend call results and out-of-band push
//! events reconciled by one serializing state owner.

pub mod backend;
pub mod editor;
pub mod engine;
pub mod events;
pub mod profiles;
pub mod session_log;
pub mod settings;
pub mod store;
pub mod toggle;
pub mod update;
pub mod version;

pub use backend::{Backend, CallOutcome, InitData, LoopbackApp, OverrideKind, PushEvent};
pub use editor::{EditorKind, EditorSession};
pub use engine::{Engine, EngineHandle, EngineOptions, EngineSnapshot};
pub use profiles::{Profile, ProfileManager};
pub use settings::{AutoConnectMode, BootSettings, KernelSettings, MirrorSettings, Settings};
pub use store::{ConnectionState, StatusKind, StatusMessage};
pub use toggle::{ToggleDispatch, ToggleTarget};
pub use update::{UpdateState, UpdateTarget, UpdateWorkflow};
