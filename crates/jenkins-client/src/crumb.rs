//! CSRF crumb cache.

use parking_lot::Mutex;
use serde::Deserialize;

/// The header a state-changing request must carry when CSRF protection is on.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Crumb {
    /// Header name, usually `Jenkins-Crumb`.
    #[serde(rename = "crumbRequestField")]
    pub field: String,
    #[serde(rename = "crumb")]
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CrumbState {
    #[default]
    Absent,
    Fresh(Crumb),
    /// Rejected by the server; must be fetched again before use.
    Stale,
}

/// Single-entry crumb cache.
#[derive(Debug, Default)]
pub(crate) struct CrumbCache {
    state: Mutex<CrumbState>,
}

impl CrumbCache {
    /// The cached crumb, if it is usable.
    pub(crate) fn current(&self) -> Option<Crumb> {
        match &*self.state.lock() {
            CrumbState::Fresh(crumb) => Some(crumb.clone()),
            CrumbState::Absent | CrumbState::Stale => None,
        }
    }

    pub(crate) fn store(&self, crumb: Crumb) {
        *self.state.lock() = CrumbState::Fresh(crumb);
    }

    pub(crate) fn invalidate(&self) {
        *self.state.lock() = CrumbState::Stale;
    }

    pub(crate) fn state(&self) -> CrumbState {
        self.state.lock().clone()
    }
}

/// A 403 body that blames the crumb (`No valid crumb was included...`).
pub(crate) fn is_crumb_mismatch(body: &[u8]) -> bool {
    String::from_utf8_lossy(body)
        .to_ascii_lowercase()
        .contains("crumb")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crumb() -> Crumb {
        Crumb {
            field: "Jenkins-Crumb".to_string(),
            value: "abc".to_string(),
        }
    }

    #[test]
    fn test_cache_transitions() {
        let cache = CrumbCache::default();
        assert_eq!(cache.state(), CrumbState::Absent);
        assert!(cache.current().is_none());

        cache.store(crumb());
        assert_eq!(cache.current(), Some(crumb()));

        cache.invalidate();
        assert_eq!(cache.state(), CrumbState::Stale);
        assert!(cache.current().is_none());
    }

    #[test]
    fn test_crumb_decodes_from_issuer_json() {
        let json = r#"{"_class":"hudson.security.csrf.DefaultCrumbIssuer","crumb":"abc","crumbRequestField":"Jenkins-Crumb"}"#;
        let parsed: Crumb = serde_json::from_str(json).unwrap();
        assert_eq!(parsed, crumb());
    }

    #[test]
    fn test_mismatch_detection() {
        assert!(is_crumb_mismatch(
            b"<html><body>HTTP ERROR 403 No valid crumb was included in the request</body></html>"
        ));
        assert!(is_crumb_mismatch(b"Invalid CRUMB"));
        assert!(!is_crumb_mismatch(b"anonymous is missing the Overall/Read permission"));
    }
}
