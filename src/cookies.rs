//! Cookie storage consulted during source construction.
//!
//! The hybrid shell authenticates against the IPTV portal and seeds the
//! store over the bridge; playback sources then pick the value up by host.
//! Sources are rebuilt on every recovery restart, so a refreshed cookie is
//! applied without tearing the session down.

use dashmap::DashMap;
use std::sync::Arc;

/// Lookup interface for per-host session cookies.
///
/// The original platform offered an ambient cookie jar shared with the
/// WebView; here the store is explicit and injected wherever sources are
/// built.
pub trait CookieStore: Send + Sync {
    /// Cookie header value for `host`, if one has been seeded.
    fn get(&self, host: &str) -> Option<String>;

    /// Seed or replace the cookie value for `host`.
    fn set(&self, host: String, value: String);

    /// Drop the cookie for `host`. Returns whether one existed.
    fn remove(&self, host: &str) -> bool;
}

/// In-memory cookie store keyed by host.
#[derive(Clone, Default)]
pub struct MemoryCookieStore {
    jar: Arc<DashMap<String, String>>,
}

impl MemoryCookieStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CookieStore for MemoryCookieStore {
    fn get(&self, host: &str) -> Option<String> {
        self.jar.get(host).map(|v| v.clone())
    }

    fn set(&self, host: String, value: String) {
        self.jar.insert(host, value);
    }

    fn remove(&self, host: &str) -> bool {
        self.jar.remove(host).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_returns_seeded_value() {
        let store = MemoryCookieStore::new();
        store.set("portal.example.com".into(), "PHPSESSID=abc123".into());
        assert_eq!(
            store.get("portal.example.com").as_deref(),
            Some("PHPSESSID=abc123")
        );
    }

    #[test]
    fn get_unknown_host_is_none() {
        let store = MemoryCookieStore::new();
        assert!(store.get("nowhere.example").is_none());
    }

    #[test]
    fn set_replaces_existing_value() {
        let store = MemoryCookieStore::new();
        store.set("portal.example.com".into(), "PHPSESSID=old".into());
        store.set("portal.example.com".into(), "PHPSESSID=new".into());
        assert_eq!(
            store.get("portal.example.com").as_deref(),
            Some("PHPSESSID=new")
        );
    }

    #[test]
    fn remove_reports_presence() {
        let store = MemoryCookieStore::new();
        store.set("portal.example.com".into(), "sid=1".into());
        assert!(store.remove("portal.example.com"));
        assert!(!store.remove("portal.example.com"));
        assert!(store.get("portal.example.com").is_none());
    }
}
