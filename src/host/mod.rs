use anyhow::Result;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::view::View;

/// Services the embedding game server provides to the engine.
///
/// Implementations must be thread-safe. Unless a method notes otherwise the
/// engine only calls it from the authority task.
pub trait HostRuntime: Send + Sync + 'static {
    fn now(&self) -> OffsetDateTime;

    /// Resolve a display name to a stable identity. Also called from worker
    /// tasks while building report detail, so it must not rely on running on
    /// any particular thread.
    fn resolve_player_id(&self, name: &str) -> Option<Uuid>;

    fn player_name(&self, user: Uuid) -> Option<String>;

    fn is_online(&self, user: Uuid) -> bool;

    fn is_staff(&self, user: Uuid) -> bool;

    fn online_staff(&self) -> Vec<Uuid>;

    /// Dispatch a fully-substituted operational command through the host's
    /// command path (console-level permissions).
    fn dispatch_command(&self, command: &str) -> Result<()>;
}

/// Rendering side of the host. Receives fully-built view models and plain
/// chat messages; translates clicks back into coordinator intents.
pub trait Presenter: Send + Sync + 'static {
    fn show(&self, user: Uuid, view: View);

    fn tell(&self, user: Uuid, message: &str);
}
