use std::time::Duration;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(8);

#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    /// Base URL of the signaling server, `http(s)://` or `ws(s)://`.
    pub endpoint: String,
    /// Upper bound on the room-creation request.
    pub request_timeout: Duration,
}

impl DirectoryConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}
