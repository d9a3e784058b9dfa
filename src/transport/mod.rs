use crate::protocol::Message;

/// Receiving half of a connection.
#[async_trait::async_trait]
pub trait Inbound: Send {
    /// Next decoded message. `Ok(None)` means the peer closed the stream.
    async fn recv(&mut self) -> anyhow::Result<Option<Message>>;
}

/// Sending half of a connection.
#[async_trait::async_trait]
pub trait Outbound: Send {
    async fn send(&mut self, msg: &Message) -> anyhow::Result<()>;

    /// Release the underlying stream. Calling it twice is harmless.
    async fn close(&mut self) -> anyhow::Result<()>;
}

pub mod in_memory;
pub mod link;
pub mod tcp;

pub use link::{Link, LinkEvent};
