pub mod connection;
pub mod dispatcher;
pub mod relay;

pub use dispatcher::{Dispatcher, RoomEvent};
pub use relay::{RelayError, RoomRelay};
