pub mod connector;
pub mod dedup;
pub mod multiplexer;

pub use connector::{ClientFrame, ConnectError, Connection, Connector, WsConnector};
pub use dedup::SeenIds;
pub use multiplexer::{
    ConnectionState, EventMultiplexer, Handlers, MultiplexerConfig, Subscription,
};
