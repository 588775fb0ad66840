// qwatch-api: Async client for the RouterOS API (sentence protocol over TCP)

pub mod client;
pub mod error;
pub mod proto;
pub mod record;
pub mod transport;

pub use client::RouterOsClient;
pub use error::Error;
pub use record::Record;
pub use transport::TransportConfig;
