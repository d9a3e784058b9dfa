//! A live connection to the peer.
//!
//! The link owns the sending half and runs a receive task that hands every
//! decoded message, in arrival order, to one registered handler. However the
//! connection ends (peer EOF, read error, write error or a local `close`),
//! the handler sees exactly one [`LinkEvent::Closed`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, info, warn};
use tokio::task::JoinHandle;

use crate::protocol::Message;
use crate::transport::{Inbound, Outbound};

/// Events delivered to the link handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    Message(Message),
    /// The connection is gone. `error` is set when it ended on a failure
    /// rather than a clean close.
    Closed { error: Option<String> },
}

pub(crate) type Handler = Arc<dyn Fn(LinkEvent) + Send + Sync>;

struct Shared {
    closed: AtomicBool,
    handler: Handler,
}

impl Shared {
    fn deliver(&self, event: LinkEvent) {
        (self.handler)(event);
    }

    fn notify_closed(&self, error: Option<String>) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.deliver(LinkEvent::Closed { error });
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

pub struct Link {
    outbound: Box<dyn Outbound>,
    shared: Arc<Shared>,
    reader: JoinHandle<()>,
}

impl Link {
    /// Start receiving on `inbound`. Must be called inside a tokio runtime.
    pub fn start<I, O, F>(inbound: I, outbound: O, handler: F) -> Self
    where
        I: Inbound + 'static,
        O: Outbound + 'static,
        F: Fn(LinkEvent) + Send + Sync + 'static,
    {
        Self::start_boxed(Box::new(inbound), Box::new(outbound), Arc::new(handler))
    }

    pub(crate) fn start_boxed(
        mut inbound: Box<dyn Inbound>,
        outbound: Box<dyn Outbound>,
        handler: Handler,
    ) -> Self {
        let shared = Arc::new(Shared {
            closed: AtomicBool::new(false),
            handler,
        });
        let reader_shared = Arc::clone(&shared);
        let reader = tokio::spawn(async move {
            loop {
                match inbound.recv().await {
                    Ok(Some(msg)) => {
                        debug!("received {}", msg.kind());
                        reader_shared.deliver(LinkEvent::Message(msg));
                    }
                    Ok(None) => {
                        info!("peer closed the connection");
                        reader_shared.notify_closed(None);
                        break;
                    }
                    Err(e) => {
                        warn!("receive failed: {:#}", e);
                        reader_shared.notify_closed(Some(format!("{:#}", e)));
                        break;
                    }
                }
            }
        });
        Self {
            outbound,
            shared,
            reader,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// Send one message. A write failure closes the link instead of
    /// returning an error; the handler then sees `Closed`. Returns `false`
    /// when nothing was sent.
    pub async fn send(&mut self, msg: &Message) -> bool {
        if self.is_closed() {
            debug!("not sending {} on a closed link", msg.kind());
            return false;
        }
        match self.outbound.send(msg).await {
            Ok(()) => {
                debug!("sent {}", msg.kind());
                true
            }
            Err(e) => {
                warn!("send of {} failed: {:#}", msg.kind(), e);
                self.shutdown(Some(format!("{:#}", e))).await;
                false
            }
        }
    }

    /// Close the connection. Idempotent.
    pub async fn close(&mut self) {
        self.shutdown(None).await;
    }

    async fn shutdown(&mut self, error: Option<String>) {
        self.reader.abort();
        if let Err(e) = self.outbound.close().await {
            debug!("error while closing: {:#}", e);
        }
        self.shared.notify_closed(error);
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        self.reader.abort();
    }
}
