//! Endpoint string handling.
//!
//! Endpoints use the `tcp://<host>:<port>` form. A bind-side endpoint may
//! name the wildcard host (`*` or `0.0.0.0`); the connect side rewrites
//! those to loopback, since connecting to the any-interface address is not
//! meaningful.

use crate::error::{RemoteError, Result};

const SCHEME: &str = "tcp://";

fn split(endpoint: &str) -> Result<(&str, &str)> {
    let rest = endpoint
        .strip_prefix(SCHEME)
        .ok_or_else(|| RemoteError::invalid_endpoint(endpoint, "expected tcp:// scheme"))?;
    let (host, port) = rest
        .rsplit_once(':')
        .ok_or_else(|| RemoteError::invalid_endpoint(endpoint, "missing port"))?;
    if host.is_empty() {
        return Err(RemoteError::invalid_endpoint(endpoint, "missing host"));
    }
    if port.is_empty() || port.parse::<u16>().is_err() {
        return Err(RemoteError::invalid_endpoint(endpoint, "invalid port"));
    }
    Ok((host, port))
}

/// Socket address to bind a listener on.
pub fn bind_addr(endpoint: &str) -> Result<String> {
    let (host, port) = split(endpoint)?;
    let host = if host == "*" { "0.0.0.0" } else { host };
    Ok(format!("{host}:{port}"))
}

/// Socket address to connect a push socket to.
///
/// Wildcard and any-interface hosts are rewritten to loopback.
pub fn connect_addr(endpoint: &str) -> Result<String> {
    let (host, port) = split(endpoint)?;
    let host = if host == "*" || host == "0.0.0.0" {
        "127.0.0.1"
    } else {
        host
    };
    Ok(format!("{host}:{port}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_host_passes_through() {
        assert_eq!(bind_addr("tcp://10.0.0.5:5001").unwrap(), "10.0.0.5:5001");
        assert_eq!(
            connect_addr("tcp://10.0.0.5:5001").unwrap(),
            "10.0.0.5:5001"
        );
    }

    #[test]
    fn wildcard_binds_any_connects_loopback() {
        assert_eq!(bind_addr("tcp://*:5001").unwrap(), "0.0.0.0:5001");
        assert_eq!(connect_addr("tcp://*:5001").unwrap(), "127.0.0.1:5001");
        assert_eq!(connect_addr("tcp://0.0.0.0:5001").unwrap(), "127.0.0.1:5001");
    }

    #[test]
    fn malformed_endpoints_rejected() {
        assert!(bind_addr("udp://host:1").is_err());
        assert!(bind_addr("tcp://host").is_err());
        assert!(bind_addr("tcp://:5001").is_err());
        assert!(bind_addr("tcp://host:notaport").is_err());
    }
}
