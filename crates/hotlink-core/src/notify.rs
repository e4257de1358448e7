use crate::mapping::AccessEvent;
use crate::shortcode::ShortCode;

/// Receives one notification per successful resolution.
///
/// Implementations must return without awaiting I/O: the resolution path
/// calls this before handing the response back.
pub trait AccessNotifier: Send + Sync + 'static {
    fn notify(&self, event: AccessEvent);
}

/// In-memory access counting.
///
/// `record_access` must never block on I/O. Duplicate calls simply count twice.
pub trait AccessRecorder: Send + Sync + 'static {
    fn record_access(&self, code: &ShortCode);
}
