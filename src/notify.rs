//! Operator notifications
//!
//! Delivery is out of scope; the pipeline only reports what happened through
//! the [`Notifier`] trait. [`LogNotifier`] turns notices into structured
//! warnings.

use std::fmt;
use tracing::warn;

/// What kind of problem is being reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    /// A backend rejected our credentials (token, session, or OAuth)
    CredentialExpired,
    /// A backend answered with an HTTP error
    BackendHttpError,
}

impl fmt::Display for NoticeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoticeKind::CredentialExpired => write!(f, "credential_expired"),
            NoticeKind::BackendHttpError => write!(f, "backend_http_error"),
        }
    }
}

/// Fire-and-forget notification sink
pub trait Notifier: Send + Sync {
    fn notify(&self, kind: NoticeKind, detail: &str);
}

/// Emits notices as `tracing` warnings
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, kind: NoticeKind, detail: &str) {
        warn!(notice = %kind, detail, "Operator notice");
    }
}

const CREDENTIAL_HINTS: [&str; 4] = ["token", "session", "oauth", "expired"];

/// Classify a backend HTTP failure
pub fn classify_http_failure(status: u16, body: &str) -> NoticeKind {
    let body = body.to_lowercase();
    if matches!(status, 401 | 403) && CREDENTIAL_HINTS.iter().any(|h| body.contains(h)) {
        NoticeKind::CredentialExpired
    } else {
        NoticeKind::BackendHttpError
    }
}

/// Shorten a response body for a notice
pub fn excerpt(body: &str, max_chars: usize) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= max_chars {
        trimmed.to_string()
    } else {
        let cut: String = trimmed.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Records notices for assertions
    #[derive(Default)]
    pub struct RecordingNotifier {
        pub notices: Mutex<Vec<(NoticeKind, String)>>,
    }

    impl RecordingNotifier {
        pub fn kinds(&self) -> Vec<NoticeKind> {
            self.notices.lock().unwrap().iter().map(|(k, _)| *k).collect()
        }
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, kind: NoticeKind, detail: &str) {
            self.notices.lock().unwrap().push((kind, detail.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_classification() {
        assert_eq!(
            classify_http_failure(401, "OAuth token expired"),
            NoticeKind::CredentialExpired
        );
        assert_eq!(
            classify_http_failure(403, "{\"error\":\"invalid session\"}"),
            NoticeKind::CredentialExpired
        );
        assert_eq!(
            classify_http_failure(403, "forbidden"),
            NoticeKind::BackendHttpError
        );
        assert_eq!(
            classify_http_failure(500, "token store down"),
            NoticeKind::BackendHttpError
        );
    }

    #[test]
    fn test_excerpt() {
        assert_eq!(excerpt("  short  ", 10), "short");
        assert_eq!(excerpt("abcdefghij", 4), "abcd...");
    }
}
