//! Borrowed view of everything a synchronization step touches

use crate::callbacks::CallbackRegistry;
use crate::core::config::SyncConfig;
use crate::host::HostScene;
use crate::render::RenderBridge;

/// Collaborators handed to trackers and the material resolver for one step
///
/// Built by the `SceneCoordinator` around each event; nothing holds on to it
/// between events.
pub struct SyncContext<'a> {
    /// Host scene graph
    pub host: &'a mut dyn HostScene,
    /// Renderer receiving the mirrored scene
    pub renderer: &'a mut dyn RenderBridge,
    /// Ledger of host subscriptions
    pub callbacks: &'a mut CallbackRegistry,
    /// Active configuration
    pub config: &'a SyncConfig,
}
