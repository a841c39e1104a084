//! Desktop URL launcher

use super::AppLauncher;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Opens URLs with the desktop's default handler
///
/// Desktops offer no reliable way to ask whether a custom scheme has a
/// handler, so only `http`/`https` and the schemes listed in the
/// `installed_schemes` config key are reported as openable.
pub struct DesktopLauncher {
    installed_schemes: HashSet<String>,
}

impl DesktopLauncher {
    pub fn new<I, S>(installed_schemes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            installed_schemes: installed_schemes
                .into_iter()
                .map(|s| normalize_scheme(s.as_ref()))
                .collect(),
        }
    }
}

/// `"Deezer://"`, `"deezer:"` and `"deezer"` are the same scheme
pub fn normalize_scheme(scheme: &str) -> String {
    scheme
        .trim()
        .trim_end_matches('/')
        .trim_end_matches(':')
        .to_ascii_lowercase()
}

/// Scheme part of a URL, if it has one
pub fn scheme_of(url: &str) -> Option<String> {
    url.split_once("://").map(|(scheme, _)| normalize_scheme(scheme))
}

impl AppLauncher for DesktopLauncher {
    fn open_url(&self, url: &str) -> bool {
        let openable = scheme_of(url).is_some_and(|scheme| self.can_open_url(&scheme));
        if !openable {
            debug!(url = %url, "No handler for URL scheme");
            return false;
        }

        match open::that(url) {
            Ok(()) => {
                debug!(url = %url, "Opened URL");
                true
            }
            Err(e) => {
                warn!(url = %url, "Failed to open URL: {}", e);
                false
            }
        }
    }

    fn can_open_url(&self, scheme: &str) -> bool {
        let scheme = normalize_scheme(scheme);
        scheme == "http" || scheme == "https" || self.installed_schemes.contains(&scheme)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheme_normalization() {
        assert_eq!(normalize_scheme("Deezer://"), "deezer");
        assert_eq!(normalize_scheme("deezer:"), "deezer");
        assert_eq!(scheme_of("deezer://track/1").as_deref(), Some("deezer"));
        assert_eq!(scheme_of("not a url"), None);
    }

    #[test]
    fn test_web_schemes_always_openable() {
        let launcher = DesktopLauncher::new(Vec::<String>::new());

        assert!(launcher.can_open_url("https://"));
        assert!(launcher.can_open_url("http"));
        assert!(!launcher.can_open_url("deezer://"));
    }

    #[test]
    fn test_configured_schemes() {
        let launcher = DesktopLauncher::new(["deezer"]);
        assert!(launcher.can_open_url("deezer://"));
        assert!(!launcher.can_open_url("spotify://"));
    }

    #[test]
    fn test_unhandled_scheme_is_not_opened() {
        let launcher = DesktopLauncher::new(Vec::<String>::new());
        assert!(!launcher.open_url("deezer://track/3135556"));
        assert!(!launcher.open_url("garbage"));
    }
}
