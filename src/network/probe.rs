//! Network reachability probe

use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::{CONNECT_TIMEOUT_MS, DEFAULT_PROBE_ADDRESS};

/// Answers whether live HTTP is currently possible
pub trait ConnectivityProbe: Send + Sync {
    /// `true` only when reachability was confirmed; failures report `false`
    fn is_available(&self) -> bool;
}

impl<F> ConnectivityProbe for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn is_available(&self) -> bool {
        self()
    }
}

/// Probe that opens a TCP connection with a bounded timeout
#[derive(Debug, Clone)]
pub struct TcpProbe {
    address: String,
    timeout: Duration,
}

impl TcpProbe {
    /// Create a probe for `address` (`host:port`)
    #[must_use]
    pub fn new(address: impl Into<String>, timeout: Duration) -> Self {
        Self {
            address: address.into(),
            timeout,
        }
    }

    /// Probed address
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Connect timeout per resolved address
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for TcpProbe {
    fn default() -> Self {
        Self::new(
            DEFAULT_PROBE_ADDRESS,
            Duration::from_millis(CONNECT_TIMEOUT_MS),
        )
    }
}

impl ConnectivityProbe for TcpProbe {
    fn is_available(&self) -> bool {
        let deadline = Instant::now() + self.timeout;
        let addrs = match self.address.to_socket_addrs() {
            Ok(addrs) => addrs,
            Err(e) => {
                warn!("Could not resolve {}: {e}", self.address);
                return false;
            }
        };

        if connect_any(addrs, deadline) {
            return true;
        }

        warn!("Network unreachable: {}", self.address);
        false
    }
}

/// Try each address in turn, sharing one deadline across all attempts
fn connect_any(addrs: impl IntoIterator<Item = SocketAddr>, deadline: Instant) -> bool {
    for addr in addrs {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            debug!("Probe deadline reached before trying {addr}");
            return false;
        }

        match TcpStream::connect_timeout(&addr, remaining) {
            Ok(_) => {
                debug!("Network reachable via {addr}");
                return true;
            }
            Err(e) => debug!("Probe of {addr} failed: {e}"),
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn test_closure_probe() {
        assert!((|| true).is_available());
        assert!(!(|| false).is_available());
    }

    #[test]
    fn test_tcp_probe_reachable_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let probe = TcpProbe::new(address, Duration::from_millis(500));
        assert!(probe.is_available());
    }

    #[test]
    fn test_tcp_probe_unresolvable_address() {
        let probe = TcpProbe::new("not a valid address", Duration::from_millis(50));
        assert!(!probe.is_available());
    }

    #[test]
    fn test_expired_deadline_skips_remaining_addresses() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        assert!(!connect_any([addr, addr], Instant::now()));
        assert!(connect_any(
            [addr],
            Instant::now() + Duration::from_millis(500)
        ));
    }

    #[test]
    fn test_deadline_bounds_all_attempts() {
        // Closed ports on loopback fail fast; the total stays within one timeout
        let closed = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap()
        };
        let timeout = Duration::from_millis(300);
        let started = Instant::now();

        assert!(!connect_any(vec![closed; 8], started + timeout));
        assert!(started.elapsed() < timeout + Duration::from_millis(200));
    }

    #[test]
    fn test_default_probe() {
        let probe = TcpProbe::default();
        assert_eq!(probe.address(), "example.com:80");
        assert_eq!(probe.timeout(), Duration::from_millis(1000));
    }
}
