//! Connection configuration

use crate::identity::AppKey;
use std::time::Duration;

/// Default deadline for a complete handshake
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

/// Default amount of sealed, not yet written bytes a writer buffers
pub const DEFAULT_WRITE_BUFFER_SIZE: usize = 64 * 1024;

/// Configuration shared by every session of one client or server.
///
/// Constructed once and passed to [`crate::net::Client`] or
/// [`crate::net::Server`]; never mutated afterwards.
#[derive(Debug, Clone)]
pub struct Config {
    /// Network-scoping secret, identical on every peer
    pub app_key: AppKey,

    /// Deadline covering all four handshake messages
    pub handshake_timeout: Duration,

    /// Writer backpressure threshold in bytes of sealed frames
    pub write_buffer_size: usize,
}

impl Config {
    /// Configuration with default timeouts and buffer sizes.
    #[must_use]
    pub fn new(app_key: AppKey) -> Self {
        Self {
            app_key,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            write_buffer_size: DEFAULT_WRITE_BUFFER_SIZE,
        }
    }

    /// Replace the handshake deadline.
    #[must_use]
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Replace the writer buffer threshold.
    #[must_use]
    pub fn with_write_buffer_size(mut self, size: usize) -> Self {
        self.write_buffer_size = size;
        self
    }
}
