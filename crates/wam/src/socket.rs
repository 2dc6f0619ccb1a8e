use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A cheap, cloneable view of the connection a request arrived on.
///
/// The transport keeps one clone and marks it closed when the connection goes away; the
/// response view checks it before writing.
#[derive(Debug, Clone)]
pub struct SocketHandle {
    writable: Arc<AtomicBool>,
    encrypted: bool,
}

impl SocketHandle {
    pub fn new(encrypted: bool) -> Self {
        Self { writable: Arc::new(AtomicBool::new(true)), encrypted }
    }

    #[inline]
    pub fn is_writable(&self) -> bool {
        self.writable.load(Ordering::Acquire)
    }

    pub fn close(&self) {
        self.writable.store(false, Ordering::Release);
    }

    /// Whether the connection runs over TLS.
    #[inline]
    pub fn encrypted(&self) -> bool {
        self.encrypted
    }
}
