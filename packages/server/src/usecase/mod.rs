//! UseCase layer: every state transition of the relay.
//!
//! Each usecase is a function over `&mut RelayContext` and is only ever called
//! from the dispatcher loop.

pub mod connect_peer;
pub mod context;
pub mod control_timer;
pub mod disconnect_peer;
pub mod dispatcher;
pub mod error;
pub mod host_gate;
pub mod persist_settings;
pub mod relay_command;
pub mod update_shared_state;

pub use connect_peer::{HOST_REPLACED_MESSAGE, Handshake, authenticate, connect_peer};
pub use context::RelayContext;
pub use control_timer::{start_timer, stop_timer};
pub use disconnect_peer::{disconnect_peer, on_viewers_settled};
pub use dispatcher::{
    InboundError, InboundEvent, RelayDispatcher, RelayEvent, RelayHandle, handle_event,
};
pub use error::{
    GateError, HOST_DISABLED_MESSAGE, HOST_NOT_ENABLED_MESSAGE, INVALID_TOKEN_MESSAGE,
    NO_VIEWERS_MESSAGE,
};
pub use host_gate::{evict_active_host, toggle_host_gate};
pub use persist_settings::PersistScheduler;
pub use relay_command::{HostEvent, SubmitOutcome, flush_queue, relay_host_event, submit_command};
pub use update_shared_state::{
    apply_dialog_coords_update, apply_enabled_update, apply_settings_document, apply_text_update,
};
