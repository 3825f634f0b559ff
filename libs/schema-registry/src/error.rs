use event_api::EventError;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("http client: {0}")]
    Client(String),

    #[error("request {url}: {detail}")]
    Request { url: String, detail: String },

    #[error("registry returned {status} for {url}: {body}")]
    Status { url: String, status: u16, body: String },

    #[error("bad response from {url}: {detail}")]
    Response { url: String, detail: String },

    #[error("schema id {0} not found")]
    NotFound(u32),
}

impl RegistryError {
    /// Convert to EventError, picking the kind the event loop acts on.
    ///
    /// Unreachable registry → Transport. Unknown id or garbage → Format.
    /// Schema rejected (409 incompatible, 422 invalid) → Delivery.
    pub fn into_event_error(self) -> EventError {
        let message = self.to_string();
        match self {
            RegistryError::Client(_) => EventError::config(message),
            RegistryError::Request { .. } => EventError::transport(message),
            RegistryError::Status { status: 404, .. } => EventError::format_err(message),
            RegistryError::Status { status: 409 | 422, .. } => EventError::delivery(message),
            RegistryError::Status { .. } => EventError::transport(message),
            RegistryError::Response { .. } | RegistryError::NotFound(_) => {
                EventError::format_err(message)
            }
        }
    }
}
