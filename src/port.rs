// LOADSWEEP ENDPOINT ALLOCATOR
// PICKS A RANDOM LOCAL PORT THAT REFUSES A CONNECTION RIGHT NOW.
// NOTHING IS RESERVED: THE SERVER MAY STILL LOSE THE BIND RACE, WHICH
// SURFACES AS AN ORDINARY FAILED TRIAL.

use std::net::{Ipv4Addr, SocketAddr, TcpStream};
use std::ops::RangeInclusive;
use std::time::Duration;

use rand::Rng;
use tracing::trace;

use crate::error::TrialError;

pub const PORT_RANGE: RangeInclusive<u16> = 20000..=50000;
pub const MAX_PORT_ATTEMPTS: u32 = 1000;

// A LISTENER ON LOOPBACK ANSWERS IMMEDIATELY. THIS ONLY BOUNDS FILTERED PORTS.
const PROBE_TIMEOUT: Duration = Duration::from_millis(100);

pub trait PortAllocator {
    fn allocate(&mut self) -> Result<u16, TrialError>;
}

pub struct RandomPorts {
    range: RangeInclusive<u16>,
    max_attempts: u32,
}

impl RandomPorts {
    pub fn new() -> Self {
        Self::with_range(PORT_RANGE, MAX_PORT_ATTEMPTS)
    }

    pub fn with_range(range: RangeInclusive<u16>, max_attempts: u32) -> Self {
        Self { range, max_attempts }
    }
}

impl Default for RandomPorts {
    fn default() -> Self {
        Self::new()
    }
}

impl PortAllocator for RandomPorts {
    fn allocate(&mut self) -> Result<u16, TrialError> {
        let mut rng = rand::thread_rng();
        for _ in 0..self.max_attempts {
            let port = rng.gen_range(self.range.clone());
            if is_port_free(port) {
                return Ok(port);
            }
            trace!(port, "port in use, retrying");
        }
        Err(TrialError::NoFreePort { attempts: self.max_attempts })
    }
}

// FREE == NOTHING ACCEPTS A CONNECTION ON 127.0.0.1:<port>
pub fn is_port_free(port: u16) -> bool {
    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
    TcpStream::connect_timeout(&addr, PROBE_TIMEOUT).is_err()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn allocated_port_refuses_connections() {
        let port = RandomPorts::new().allocate().unwrap();
        assert!(PORT_RANGE.contains(&port));
        assert!(TcpStream::connect((Ipv4Addr::LOCALHOST, port)).is_err());
    }

    #[test]
    fn bound_port_is_not_free() {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let port = listener.local_addr().unwrap().port();
        assert!(!is_port_free(port));
    }

    #[test]
    fn exhausted_budget_is_allocation_failure() {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let port = listener.local_addr().unwrap().port();
        let mut ports = RandomPorts::with_range(port..=port, 5);
        match ports.allocate() {
            Err(TrialError::NoFreePort { attempts }) => assert_eq!(attempts, 5),
            other => panic!("expected NoFreePort, got {:?}", other),
        }
    }

    #[test]
    fn single_port_range_returns_that_port() {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let mut ports = RandomPorts::with_range(port..=port, 3);
        assert_eq!(ports.allocate().unwrap(), port);
    }
}
