//! Domain layer: relay state and the ports the relay depends on.
//!
//! Nothing in this module performs I/O. The relay dispatcher owns every value
//! defined here and mutates it from a single task.

pub mod command_queue;
pub mod error;
pub mod message_pusher;
pub mod session;
pub mod settings_store;
pub mod shared_state;
pub mod value_object;

pub use command_queue::{Command, CommandQueue, DEFAULT_QUEUE_CAPACITY};
pub use error::{CommandError, RegistryError};
pub use message_pusher::{MessagePushError, MessagePusher, Outbound, PusherChannel, PusherReceivers};
pub use session::{Departure, SessionRegistry};
pub use settings_store::{PersistedUpdate, SettingsDocument, SettingsStore, StorageError};
pub use shared_state::{DialogCoords, PersistedState, SharedState, TimerState};
pub use value_object::{ConnectionId, Role};
