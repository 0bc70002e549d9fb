use std::time::Duration;

use crate::wrapper::ScriptWrapper;

/// Session-wide policy.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long to wait for each command's response. `None` waits until the
    /// response arrives or the connection closes.
    pub command_timeout: Option<Duration>,
    /// Largest inbound message accepted from the debuggee.
    pub max_message_size: usize,
    /// How long to keep retrying when attaching to a debuggee that is still
    /// starting up.
    pub attach_timeout: Duration,
    /// Target breakpoints by file name pattern rather than literal path, for
    /// debuggees whose file system layout differs from ours.
    pub remote: bool,
    pub wrapper: ScriptWrapper,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            command_timeout: None,
            max_message_size: transport::DEFAULT_MAX_MESSAGE_SIZE,
            attach_timeout: Duration::from_secs(10),
            remote: false,
            wrapper: ScriptWrapper::node(),
        }
    }
}
