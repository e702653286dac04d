//! Status gateway configuration.
//!
//! For now this only configures the HTTP listen address.

use std::net::SocketAddr;

/// Configuration for the status HTTP server.
#[derive(Clone, Debug)]
pub struct StatusConfig {
    /// Address to bind the HTTP server to.
    pub listen_addr: SocketAddr,
}

impl Default for StatusConfig {
    fn default() -> Self {
        // Safe to unwrap: fixed, valid address literal. Binds all
        // interfaces so container port mappings reach it from the host.
        let addr: SocketAddr = "0.0.0.0:8080"
            .parse()
            .expect("hard-coded status listen address should parse");
        Self { listen_addr: addr }
    }
}
