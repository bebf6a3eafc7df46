//! UseCase 層
//!
//! ビジネスロジックを実装するレイヤー。
//! UI 層から呼び出され、Domain 層を操作します。

pub mod broadcast_snapshot;
pub mod connect_browser;
pub mod disconnect_browser;
pub mod error;
pub mod handle_inbound;
pub mod reconciler;
pub mod sync_tick;

pub use broadcast_snapshot::BroadcastSnapshotUseCase;
pub use connect_browser::ConnectBrowserUseCase;
pub use disconnect_browser::DisconnectBrowserUseCase;
pub use error::{BroadcastError, ConnectError};
pub use handle_inbound::{HandleInboundUseCase, InboundEffect};
pub use reconciler::{StateNotification, StateReconciler, StateView};
pub use sync_tick::{SyncTickUseCase, TickOutcome};
