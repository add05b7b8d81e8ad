//! Client address and user-agent details captured at login.

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{HeaderMap, header, request::Parts},
};
use std::net::{IpAddr, SocketAddr};

/// Resolves a client address to a human-readable location.
pub trait IpLocator: Send + Sync {
    fn locate(&self, ip: IpAddr) -> String;
}

/// Locator that only tells internal addresses apart from everything else.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalIpLocator;

impl IpLocator for LocalIpLocator {
    fn locate(&self, ip: IpAddr) -> String {
        let internal = match ip {
            IpAddr::V4(v4) => v4.is_private() || v4.is_loopback() || v4.is_link_local(),
            IpAddr::V6(v6) => {
                v6.is_loopback() || v6.is_unique_local() || v6.is_unicast_link_local()
            }
        };
        if internal { "intranet" } else { "unknown" }.to_string()
    }
}

/// Who is calling: address, browser, and operating system.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientInfo {
    pub ip_address: Option<IpAddr>,
    pub browser: Option<String>,
    pub os: Option<String>,
}

impl ClientInfo {
    /// Reads client details from request headers, falling back to the peer address.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap, peer: Option<SocketAddr>) -> Self {
        let user_agent = headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        Self {
            ip_address: forwarded_ip(headers).or(peer.map(|addr| addr.ip())),
            browser: browser(user_agent).map(str::to_string),
            os: os(user_agent).map(str::to_string),
        }
    }
}

impl<S> FromRequestParts<S> for ClientInfo
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Ok(Self::from_headers(&parts.headers, peer))
    }
}

fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    let forwarded_for = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|first| first.trim().parse().ok());
    forwarded_for.or_else(|| {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok())
    })
}

// Order matters: Edge and Opera also claim Chrome, and Chrome claims Safari.
fn browser(user_agent: &str) -> Option<&'static str> {
    const BROWSERS: &[(&str, &str)] = &[
        ("Edg/", "Edge"),
        ("OPR/", "Opera"),
        ("Firefox/", "Firefox"),
        ("Chrome/", "Chrome"),
        ("Safari/", "Safari"),
        ("Trident/", "Internet Explorer"),
        ("MSIE", "Internet Explorer"),
    ];
    BROWSERS
        .iter()
        .find(|(marker, _)| user_agent.contains(marker))
        .map(|(_, name)| *name)
}

// iOS agents say "like Mac OS X" and Android agents say "Linux".
fn os(user_agent: &str) -> Option<&'static str> {
    const SYSTEMS: &[(&str, &str)] = &[
        ("Windows", "Windows"),
        ("iPhone", "iOS"),
        ("iPad", "iOS"),
        ("Android", "Android"),
        ("Mac OS X", "macOS"),
        ("Linux", "Linux"),
    ];
    SYSTEMS
        .iter()
        .find(|(marker, _)| user_agent.contains(marker))
        .map(|(_, name)| *name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    const CHROME_MAC: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
        (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
    const EDGE_WINDOWS: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
        (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.0.0";
    const SAFARI_IPHONE: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) \
        AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1";
    const FIREFOX_LINUX: &str =
        "Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0";

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn parses_common_user_agents() {
        assert_eq!(browser(CHROME_MAC), Some("Chrome"));
        assert_eq!(os(CHROME_MAC), Some("macOS"));
        assert_eq!(browser(EDGE_WINDOWS), Some("Edge"));
        assert_eq!(os(EDGE_WINDOWS), Some("Windows"));
        assert_eq!(browser(SAFARI_IPHONE), Some("Safari"));
        assert_eq!(os(SAFARI_IPHONE), Some("iOS"));
        assert_eq!(browser(FIREFOX_LINUX), Some("Firefox"));
        assert_eq!(os(FIREFOX_LINUX), Some("Linux"));
        assert_eq!(browser("curl/8.4.0"), None);
        assert_eq!(os("curl/8.4.0"), None);
    }

    #[test]
    fn forwarded_for_wins_over_peer() {
        let info = ClientInfo::from_headers(
            &headers(&[("x-forwarded-for", "203.0.113.7, 10.0.0.1")]),
            Some("127.0.0.1:5000".parse().unwrap()),
        );
        assert_eq!(info.ip_address, Some("203.0.113.7".parse().unwrap()));
    }

    #[test]
    fn real_ip_then_peer() {
        let info = ClientInfo::from_headers(&headers(&[("x-real-ip", "198.51.100.2")]), None);
        assert_eq!(info.ip_address, Some("198.51.100.2".parse().unwrap()));

        let info = ClientInfo::from_headers(
            &headers(&[("x-forwarded-for", "garbage")]),
            Some("192.0.2.1:443".parse().unwrap()),
        );
        assert_eq!(info.ip_address, Some("192.0.2.1".parse().unwrap()));

        assert_eq!(ClientInfo::from_headers(&HeaderMap::new(), None).ip_address, None);
    }

    #[test]
    fn local_locator() {
        let locator = LocalIpLocator;
        assert_eq!(locator.locate("10.1.2.3".parse().unwrap()), "intranet");
        assert_eq!(locator.locate("192.168.0.10".parse().unwrap()), "intranet");
        assert_eq!(locator.locate("127.0.0.1".parse().unwrap()), "intranet");
        assert_eq!(locator.locate("::1".parse().unwrap()), "intranet");
        assert_eq!(locator.locate("8.8.8.8".parse().unwrap()), "unknown");
    }
}
