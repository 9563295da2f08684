//! Network layer for Tapedeck
//!
//! Live HTTP execution and the reachability probe used by re-recording.

mod client;
mod probe;

pub use client::HttpExecutor;
pub use probe::{ConnectivityProbe, TcpProbe};

/// Connection setup timeout
pub const CONNECT_TIMEOUT_MS: u64 = 1000;

/// Address probed to decide whether the network is reachable
pub const DEFAULT_PROBE_ADDRESS: &str = "example.com:80";
