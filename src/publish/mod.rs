/// Sinks that render the current-conditions snapshot for the outside world
use async_trait::async_trait;
use std::fmt;

use crate::models::CurrentConditions;

pub mod metrics;
pub mod pws;

pub use pws::PwsPublisher;

/// What a sink got back from the remote end
#[derive(Debug, Clone, PartialEq)]
pub struct PublishResponse {
    pub status: u16,
    pub body: String,
}

#[derive(Debug)]
pub enum PublishError {
    Request(String),
    Transport(String),
    Status(PublishResponse),
}

impl fmt::Display for PublishError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishError::Request(e) => write!(f, "could not build request: {}", e),
            PublishError::Transport(e) => write!(f, "request failed: {}", e),
            PublishError::Status(resp) => write!(f, "rejected with status {}", resp.status),
        }
    }
}

impl std::error::Error for PublishError {}

/// A push destination invoked by the scheduler on every fresh tick
///
/// Implementations render the snapshot in their own format. Errors are
/// reported to the caller and never retried by the sink itself.
#[async_trait]
pub trait Publisher: Send + Sync {
    fn name(&self) -> &str;

    async fn publish(&self, conditions: &CurrentConditions) -> Result<PublishResponse, PublishError>;
}
