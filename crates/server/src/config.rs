//! Server configuration from the environment.

use std::net::SocketAddr;

use tracing::warn;

/// Environment variable naming the listen address.
pub const ADDR_ENV: &str = "LUMINA_ADDR";

/// Default listen address.
pub const DEFAULT_ADDR: &str = "0.0.0.0:7071";

/// Server configuration.
#[derive(Debug, Clone, Copy)]
pub struct ServerConfig {
    /// Address the HTTP server binds to.
    pub addr: SocketAddr,
}

impl ServerConfig {
    /// Read configuration from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        let addr = match std::env::var(ADDR_ENV) {
            Ok(raw) => match raw.parse() {
                Ok(addr) => addr,
                Err(_) => {
                    warn!(value = %raw, "Ignoring unparseable {ADDR_ENV}");
                    default_addr()
                }
            },
            Err(_) => default_addr(),
        };
        Self { addr }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_addr(),
        }
    }
}

fn default_addr() -> SocketAddr {
    // The literal is well-formed; parse cannot fail.
    match DEFAULT_ADDR.parse() {
        Ok(addr) => addr,
        Err(_) => SocketAddr::from(([0, 0, 0, 0], 7071)),
    }
}
