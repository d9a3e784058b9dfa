use tokio::sync::mpsc;

use crate::protocol::Message;
use crate::transport::{Inbound, Outbound};

/// Connected pair of in-process endpoints, one per peer. Messages skip the
/// wire encoding.
pub struct InMemoryTransport;

impl InMemoryTransport {
    pub fn pair() -> (
        (InMemoryInbound, InMemoryOutbound),
        (InMemoryInbound, InMemoryOutbound),
    ) {
        let (a_tx, a_rx) = mpsc::unbounded_channel();
        let (b_tx, b_rx) = mpsc::unbounded_channel();
        (
            (InMemoryInbound { rx: a_rx }, InMemoryOutbound { tx: Some(b_tx) }),
            (InMemoryInbound { rx: b_rx }, InMemoryOutbound { tx: Some(a_tx) }),
        )
    }
}

pub struct InMemoryInbound {
    rx: mpsc::UnboundedReceiver<Message>,
}

#[async_trait::async_trait]
impl Inbound for InMemoryInbound {
    async fn recv(&mut self) -> anyhow::Result<Option<Message>> {
        Ok(self.rx.recv().await)
    }
}

pub struct InMemoryOutbound {
    tx: Option<mpsc::UnboundedSender<Message>>,
}

#[async_trait::async_trait]
impl Outbound for InMemoryOutbound {
    async fn send(&mut self, msg: &Message) -> anyhow::Result<()> {
        let tx = self
            .tx
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("connection is closed"))?;
        tx.send(msg.clone())
            .map_err(|_| anyhow::anyhow!("channel closed"))
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        self.tx = None;
        Ok(())
    }
}
