//! Event surface: the callbacks the transport drives for every connection.

pub mod gateway;
pub mod surface;
pub mod types;

pub use gateway::GatewayHandler;
pub use surface::{dispatch_event, EventSurface};
pub use types::*;
