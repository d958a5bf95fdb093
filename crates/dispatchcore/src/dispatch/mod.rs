//! Order broadcast, driver arbitration and timeouts

pub mod channel;
pub mod directory;
pub mod engine;
pub mod notice;
pub mod types;

pub use channel::{delete_after, delete_quietly, Action, ChannelError, MessageChannel, OutgoingMessage, Recipient};
pub use directory::{DriverDirectory, StaticDirectory};
pub use engine::{BroadcastOutcome, DispatchEngine, DispatchSettings, ResponseOutcome};
pub use types::{ClientId, DriverId, DriverResponse, MessageId, OrderId, OrderPayload};
