use std::net::SocketAddr;

use axum::{extract::ConnectInfo, http::request::Parts};

/// Resolves the client address the way a proxy-aware server should:
/// first `X-Forwarded-For` hop, then `X-Real-IP`, then the socket peer.
pub fn client_ip(parts: &Parts) -> Option<String> {
    let forwarded = parts
        .headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if let Some(ip) = forwarded {
        return Some(ip.to_string());
    }

    let real_ip = parts
        .headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if let Some(ip) = real_ip {
        return Some(ip.to_string());
    }

    peer_ip(parts)
}

/// Address of the socket peer. Unlike [`client_ip`] it cannot be set by the
/// client, so access decisions use this one.
pub fn peer_ip(parts: &Parts) -> Option<String> {
    parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(builder: axum::http::request::Builder) -> Parts {
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn prefers_first_forwarded_hop() {
        let p = parts(
            Request::builder()
                .header("x-forwarded-for", " 10.0.0.1 , 172.16.0.1")
                .header("x-real-ip", "192.168.1.1"),
        );
        assert_eq!(client_ip(&p).as_deref(), Some("10.0.0.1"));
    }

    #[test]
    fn falls_back_to_real_ip_then_peer() {
        let p = parts(Request::builder().header("x-real-ip", "192.168.1.1"));
        assert_eq!(client_ip(&p).as_deref(), Some("192.168.1.1"));

        let mut request = Request::builder().header("x-forwarded-for", "").body(()).unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 5000))));
        let (p, _) = request.into_parts();
        assert_eq!(client_ip(&p).as_deref(), Some("127.0.0.1"));
    }

    #[test]
    fn peer_ignores_forwarding_headers() {
        let mut request = Request::builder()
            .header("x-forwarded-for", "127.0.0.1")
            .header("x-real-ip", "127.0.0.1")
            .body(())
            .unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([203, 0, 113, 9], 443))));
        let (p, _) = request.into_parts();
        assert_eq!(client_ip(&p).as_deref(), Some("127.0.0.1"));
        assert_eq!(peer_ip(&p).as_deref(), Some("203.0.113.9"));
        assert_eq!(peer_ip(&parts(Request::builder())), None);
    }

    #[test]
    fn unknown_client_is_none() {
        assert_eq!(client_ip(&parts(Request::builder())), None);
    }
}
