//! Headers attached to outbound playback requests.

use crate::cookies::CookieStore;

/// Build the header list for a playback source.
///
/// `Connection: keep-alive` is always present; IPTV origins drop idle
/// connections aggressively and segment fetches come in bursts. A `Cookie`
/// header is added when the store holds a value for the stream's host.
/// The user agent travels separately on the source spec, not here.
pub fn playback_headers(host: Option<&str>, cookies: &dyn CookieStore) -> Vec<(String, String)> {
    let mut headers = vec![("Connection".to_string(), "keep-alive".to_string())];

    if let Some(host) = host
        && let Some(value) = cookies.get(host)
    {
        headers.push(("Cookie".to_string(), value));
    }

    headers
}

/// Pick the user agent for a session: the caller-supplied one when present
/// and non-blank, otherwise the configured default identifying zapper.
pub fn resolve_user_agent<'a>(requested: Option<&'a str>, default_ua: &'a str) -> &'a str {
    match requested {
        Some(ua) if !ua.trim().is_empty() => ua,
        _ => default_ua,
    }
}
