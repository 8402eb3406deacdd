//! WebSocket URL construction for diagram collaboration sessions (§6, §8:
//! "Default HTTPS port 443 is not appended to host").

/// Build the WebSocket URL for `path`, given the transport layer's TLS and
/// port configuration. `tls_subject_name` is the hostname TLS certificates
/// are issued for; `server_port` is the port the transport actually binds.
///
/// The default HTTPS port (443) is stripped from the host; any other port
/// is retained even when TLS is enabled.
pub fn build(tls_enabled: bool, tls_subject_name: &str, server_port: u16, path: &str) -> String {
    let scheme = if tls_enabled { "wss" } else { "ws" };
    let host = if tls_enabled && server_port == 443 {
        tls_subject_name.to_string()
    } else {
        format!("{tls_subject_name}:{server_port}")
    };
    let path = if path.starts_with('/') { path.to_string() } else { format!("/{path}") };
    format!("{scheme}://{host}{path}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_https_port_is_stripped() {
        let url = build(true, "tmi.example.com", 443, "/threat_models/1/diagrams/2/ws");
        assert_eq!(url, "wss://tmi.example.com/threat_models/1/diagrams/2/ws");
    }

    #[test]
    fn custom_port_is_retained_even_with_tls() {
        let url = build(true, "tmi.example.com", 8443, "/ws");
        assert_eq!(url, "wss://tmi.example.com:8443/ws");
    }

    #[test]
    fn plain_ws_scheme_when_tls_disabled() {
        let url = build(false, "localhost", 8080, "/ws");
        assert_eq!(url, "ws://localhost:8080/ws");
    }

    #[test]
    fn path_without_leading_slash_is_normalized() {
        let url = build(false, "localhost", 8080, "ws");
        assert_eq!(url, "ws://localhost:8080/ws");
    }
}
