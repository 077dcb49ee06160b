//! External broker address derivation.
//!
//! Agents reach the broker through the console's public domain, not through
//! the internal hostname the console itself uses.

use url::Url;

/// Port used when the internal broker URL carries none
pub const DEFAULT_BROKER_PORT: u16 = 4433;

/// Recombine the internal broker URL's scheme and port with `public_domain`.
///
/// Falls back to the internal URL verbatim when it does not parse or the
/// domain is empty.
pub fn derive_external_broker_url(internal: &str, public_domain: &str) -> String {
    let domain = public_domain.trim();
    if domain.is_empty() {
        return internal.to_string();
    }

    match Url::parse(internal.trim()) {
        Ok(parsed) => {
            let port = parsed.port().unwrap_or(DEFAULT_BROKER_PORT);
            format!("{}://{}:{}", parsed.scheme(), domain, port)
        }
        Err(e) => {
            tracing::warn!(broker_url = internal, error = %e, "internal broker URL does not parse, using it verbatim");
            internal.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derives_public_address() {
        assert_eq!(
            derive_external_broker_url("tls://nats:4433", "fleet.example.com"),
            "tls://fleet.example.com:4433"
        );
        assert_eq!(
            derive_external_broker_url("tls://nats:9222", "fleet.example.com"),
            "tls://fleet.example.com:9222"
        );
    }

    #[test]
    fn test_default_port() {
        assert_eq!(
            derive_external_broker_url("tls://nats", "fleet.example.com"),
            "tls://fleet.example.com:4433"
        );
        // Scheme defaults are not applied, only an explicit port is kept
        assert_eq!(
            derive_external_broker_url("https://nats", "fleet.example.com"),
            "https://fleet.example.com:4433"
        );
    }

    #[test]
    fn test_fallbacks() {
        assert_eq!(derive_external_broker_url("tls://nats:4433", ""), "tls://nats:4433");
        assert_eq!(derive_external_broker_url("not a url", "d.example"), "not a url");
    }
}
