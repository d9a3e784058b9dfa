//! The task that owns a [`Session`] and its connection.
//!
//! User commands, received messages, connection results and the link's
//! closed event all arrive on one queue and are applied one at a time, so a
//! local action never interleaves with an incoming message. After each input
//! the actor publishes a fresh [`SessionSnapshot`] on a watch channel.

use std::net::SocketAddr;
use std::sync::Arc;

use log::{debug, info, warn};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use super::{Phase, Session, SessionError, SessionSnapshot};
use crate::common::Coordinate;
use crate::config::Rules;
use crate::protocol::Message;
use crate::ship::{Orientation, ShipKind};
use crate::transport::tcp::{HostListener, TcpTransport};
use crate::transport::{Inbound, Link, LinkEvent, Outbound};

type Reply<T> = oneshot::Sender<Result<T, SessionError>>;

enum Command {
    Host {
        port: u16,
        reply: Reply<SocketAddr>,
    },
    Join {
        address: String,
        port: u16,
        reply: Reply<()>,
    },
    Attach {
        inbound: Box<dyn Inbound>,
        outbound: Box<dyn Outbound>,
        is_host: bool,
        reply: Reply<()>,
    },
    PlaceShip {
        kind: ShipKind,
        origin: Coordinate,
        orientation: Orientation,
        reply: Reply<()>,
    },
    Randomize {
        reply: Reply<()>,
    },
    Confirm {
        reply: Reply<()>,
    },
    Fire {
        target: Coordinate,
        reply: Reply<()>,
    },
    RowBomb {
        row: u8,
        reply: Reply<()>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

enum Input {
    Command(Command),
    Link(LinkEvent),
    Connected {
        inbound: Box<dyn Inbound>,
        outbound: Box<dyn Outbound>,
        is_host: bool,
    },
    ConnectFailed(String),
}

/// Cloneable handle to a running session actor.
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<Input>,
    snapshots: watch::Receiver<SessionSnapshot>,
}

impl SessionHandle {
    /// Spawn a session with the standard rules and an entropy-seeded RNG.
    pub fn spawn() -> Self {
        let mut seed_rng = rand::rng();
        Self::spawn_with(Rules::default(), SmallRng::from_rng(&mut seed_rng))
    }

    /// Spawn a session with explicit rules and RNG. Must be called inside a
    /// tokio runtime.
    pub fn spawn_with(rules: Rules, rng: SmallRng) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Session::new(rules);
        let (snapshot_tx, snapshots) = watch::channel(session.snapshot());
        let actor = Actor {
            session,
            link: None,
            connect_task: None,
            rng,
            rx,
            tx: tx.downgrade(),
            snapshots: snapshot_tx,
        };
        tokio::spawn(actor.run());
        Self { tx, snapshots }
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Input::Command(make(reply)))
            .map_err(|_| SessionError::Stopped)?;
        rx.await.map_err(|_| SessionError::Stopped)?
    }

    /// Listen on `port` (0 picks a free one) and accept a single peer in the
    /// background. Returns the address the joiner should dial.
    pub async fn start_host(&self, port: u16) -> Result<SocketAddr, SessionError> {
        self.request(|reply| Command::Host { port, reply }).await
    }

    /// Dial `address:port` in the background. The outcome shows up in the
    /// snapshot: `Setup` on success, an error status in `Menu` on failure.
    pub async fn join_game(&self, address: &str, port: u16) -> Result<(), SessionError> {
        let address = address.to_string();
        self.request(|reply| Command::Join {
            address,
            port,
            reply,
        })
        .await
    }

    /// Use an already connected transport, e.g. one end of an in-memory pair.
    pub async fn attach<I, O>(
        &self,
        inbound: I,
        outbound: O,
        is_host: bool,
    ) -> Result<(), SessionError>
    where
        I: Inbound + 'static,
        O: Outbound + 'static,
    {
        self.request(|reply| Command::Attach {
            inbound: Box::new(inbound),
            outbound: Box::new(outbound),
            is_host,
            reply,
        })
        .await
    }

    pub async fn place_ship(
        &self,
        kind: ShipKind,
        origin: Coordinate,
        orientation: Orientation,
    ) -> Result<(), SessionError> {
        self.request(|reply| Command::PlaceShip {
            kind,
            origin,
            orientation,
            reply,
        })
        .await
    }

    pub async fn randomize_ships(&self) -> Result<(), SessionError> {
        self.request(|reply| Command::Randomize { reply }).await
    }

    pub async fn confirm_placement(&self) -> Result<(), SessionError> {
        self.request(|reply| Command::Confirm { reply }).await
    }

    pub async fn fire_shot(&self, x: u8, y: u8) -> Result<(), SessionError> {
        let target = Coordinate::new(x, y);
        self.request(|reply| Command::Fire { target, reply }).await
    }

    pub async fn use_row_bomb(&self, row: u8) -> Result<(), SessionError> {
        self.request(|reply| Command::RowBomb { row, reply }).await
    }

    /// Close the connection and stop the actor.
    pub async fn shutdown(&self) {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(Input::Command(Command::Shutdown { reply })).is_ok() {
            let _ = rx.await;
        }
    }

    /// Latest published state.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Receiver that is notified after every change.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    /// Wait until a published snapshot satisfies `pred`.
    pub async fn wait_for<F>(&self, mut pred: F) -> Result<SessionSnapshot, SessionError>
    where
        F: FnMut(&SessionSnapshot) -> bool,
    {
        let mut rx = self.subscribe();
        let snapshot = rx
            .wait_for(|s| pred(s))
            .await
            .map_err(|_| SessionError::Stopped)?;
        Ok(snapshot.clone())
    }
}

struct Actor {
    session: Session,
    link: Option<Link>,
    // Pending host or join attempt. Holding it lets shutdown release the
    // listening socket.
    connect_task: Option<JoinHandle<()>>,
    rng: SmallRng,
    rx: mpsc::UnboundedReceiver<Input>,
    // Weak so the actor stops once every handle is gone.
    tx: mpsc::WeakUnboundedSender<Input>,
    snapshots: watch::Sender<SessionSnapshot>,
}

impl Actor {
    async fn run(mut self) {
        while let Some(input) = self.rx.recv().await {
            let stop = self.handle(input).await;
            self.publish();
            if stop {
                break;
            }
        }
        self.cancel_connect().await;
        if let Some(mut link) = self.link.take() {
            link.close().await;
        }
        debug!("session actor stopped");
    }

    async fn handle(&mut self, input: Input) -> bool {
        match input {
            Input::Command(cmd) => return self.command(cmd).await,
            Input::Link(LinkEvent::Message(msg)) => {
                let replies = self.session.handle_message(msg);
                self.send_all(replies).await;
            }
            Input::Link(LinkEvent::Closed { error }) => {
                if let Some(mut link) = self.link.take() {
                    link.close().await;
                }
                self.session.disconnected(error.as_deref());
            }
            Input::Connected {
                inbound,
                outbound,
                is_host,
            } => {
                self.connect_task = None;
                if let Err(e) = self.connect(inbound, outbound, is_host).await {
                    warn!("dropping connection: {}", e);
                }
            }
            Input::ConnectFailed(reason) => {
                self.connect_task = None;
                warn!("connection attempt failed: {}", reason);
                self.session.connect_failed(&reason);
            }
        }
        false
    }

    /// Apply one user command. Returns `true` when the actor should stop.
    async fn command(&mut self, cmd: Command) -> bool {
        match cmd {
            Command::Host { port, reply } => {
                let result = self.host(port).await;
                self.respond(reply, result);
            }
            Command::Join {
                address,
                port,
                reply,
            } => {
                let result = self.join(address, port);
                self.respond(reply, result);
            }
            Command::Attach {
                inbound,
                outbound,
                is_host,
                reply,
            } => {
                let result = match self.ensure_can_connect() {
                    Ok(()) => self.connect(inbound, outbound, is_host).await,
                    Err(e) => Err(e),
                };
                self.respond(reply, result);
            }
            Command::PlaceShip {
                kind,
                origin,
                orientation,
                reply,
            } => {
                let result = self.session.place_ship(kind, origin, orientation);
                self.respond(reply, result);
            }
            Command::Randomize { reply } => {
                let result = self.session.randomize_ships(&mut self.rng);
                self.respond(reply, result);
            }
            Command::Confirm { reply } => {
                let result = self.session.confirm_placement();
                let result = self.send_on_success(result).await;
                self.respond(reply, result);
            }
            Command::Fire { target, reply } => {
                let result = self.session.fire_shot(target).map(|msg| vec![msg]);
                let result = self.send_on_success(result).await;
                self.respond(reply, result);
            }
            Command::RowBomb { row, reply } => {
                let result = self.session.use_row_bomb(row).map(|msg| vec![msg]);
                let result = self.send_on_success(result).await;
                self.respond(reply, result);
            }
            Command::Shutdown { reply } => {
                self.cancel_connect().await;
                if let Some(mut link) = self.link.take() {
                    link.close().await;
                }
                self.session.disconnected(None);
                self.publish();
                let _ = reply.send(());
                return true;
            }
        }
        false
    }

    /// Publish the new state before answering, so a caller that awaited the
    /// command observes its effect in `snapshot()`.
    fn respond<T>(&self, reply: Reply<T>, result: Result<T, SessionError>) {
        self.publish();
        let _ = reply.send(result);
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.session.snapshot());
    }

    async fn send_on_success(
        &mut self,
        result: Result<Vec<Message>, SessionError>,
    ) -> Result<(), SessionError> {
        let msgs = result?;
        self.send_all(msgs).await;
        Ok(())
    }

    fn ensure_can_connect(&self) -> Result<(), SessionError> {
        if self.session.phase() != Phase::Menu {
            return Err(SessionError::WrongPhase(self.session.phase()));
        }
        if self.connect_task.is_some() || self.link.is_some() {
            return Err(SessionError::AlreadyConnecting);
        }
        Ok(())
    }

    async fn host(&mut self, port: u16) -> Result<SocketAddr, SessionError> {
        self.ensure_can_connect()?;
        let listener = HostListener::bind(("0.0.0.0", port))
            .await
            .map_err(|e| SessionError::Connect(format!("{:#}", e)))?;
        let addr = listener
            .advertised_addr()
            .map_err(|e| SessionError::Connect(format!("{:#}", e)))?;
        info!("hosting on {}", addr);
        self.session.set_status(format!("Hosting on {}...", addr));
        let tx = self.tx.clone();
        self.connect_task = Some(tokio::spawn(async move {
            let input = match listener.accept().await {
                Ok(transport) => {
                    let (inbound, outbound) = transport.into_split();
                    Input::Connected {
                        inbound: Box::new(inbound),
                        outbound: Box::new(outbound),
                        is_host: true,
                    }
                }
                Err(e) => Input::ConnectFailed(format!("{:#}", e)),
            };
            if let Some(tx) = tx.upgrade() {
                let _ = tx.send(input);
            }
        }));
        Ok(addr)
    }

    fn join(&mut self, address: String, port: u16) -> Result<(), SessionError> {
        self.ensure_can_connect()?;
        self.session
            .set_status(format!("Connecting to {}:{}...", address, port));
        info!("joining {}:{}", address, port);
        let tx = self.tx.clone();
        self.connect_task = Some(tokio::spawn(async move {
            let input = match TcpTransport::connect((address.as_str(), port)).await {
                Ok(transport) => {
                    let (inbound, outbound) = transport.into_split();
                    Input::Connected {
                        inbound: Box::new(inbound),
                        outbound: Box::new(outbound),
                        is_host: false,
                    }
                }
                Err(e) => Input::ConnectFailed(format!("{:#}", e)),
            };
            if let Some(tx) = tx.upgrade() {
                let _ = tx.send(input);
            }
        }));
        Ok(())
    }

    /// Abort a pending host or join attempt and wait until its socket is
    /// dropped.
    async fn cancel_connect(&mut self) {
        if let Some(task) = self.connect_task.take() {
            task.abort();
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    warn!("connect task failed: {}", e);
                }
            }
        }
    }

    async fn connect(
        &mut self,
        inbound: Box<dyn Inbound>,
        outbound: Box<dyn Outbound>,
        is_host: bool,
    ) -> Result<(), SessionError> {
        if self.session.phase() != Phase::Menu || self.link.is_some() {
            return Err(SessionError::WrongPhase(self.session.phase()));
        }
        let tx = self.tx.clone();
        let handler = Arc::new(move |event: LinkEvent| {
            if let Some(tx) = tx.upgrade() {
                let _ = tx.send(Input::Link(event));
            }
        });
        self.link = Some(Link::start_boxed(inbound, outbound, handler));
        let greeting = self.session.connected(is_host)?;
        self.send_all(greeting).await;
        Ok(())
    }

    async fn send_all(&mut self, msgs: Vec<Message>) {
        let Some(link) = self.link.as_mut() else {
            if !msgs.is_empty() {
                warn!("no connection; dropping {} outgoing messages", msgs.len());
            }
            return;
        };
        for msg in &msgs {
            if !link.send(msg).await {
                break;
            }
        }
    }
}
