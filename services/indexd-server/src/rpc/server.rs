//! TCP server.
//!
//! Every connection is registered as a peer for as long as it stays
//! open. Requests on one connection are handled in order; separate
//! connections are served concurrently.

use crate::core::liveness::PeerTable;
use crate::core::services::Services;
use crate::core::types::PeerId;
use crate::rpc::dispatcher::Dispatcher;
use crate::rpc::error::ServerError;
use crate::rpc::protocol::{self, Envelope, Greeting, ReplyEnvelope};
use crate::rpc::service::{Dispatch, Router};
use crate::rpc::transport::LineTransport;
use serde_json::Value;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

pub struct RpcServer {
    listener: TcpListener,
    router: Router,
    peers: Arc<PeerTable>,
    dispatcher: JoinHandle<Result<(), ServerError>>,
}

impl RpcServer {
    /// Bind to the configured host and port and start the dispatcher
    pub async fn bind(services: Services) -> Result<Self, ServerError> {
        let addr = format!(
            "{}:{}",
            services.config.server.host, services.config.server.port
        );
        Self::bind_addr(services, &addr).await
    }

    pub async fn bind_addr(services: Services, addr: &str) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr).await?;
        let dispatcher = Dispatcher::new(&services);
        Ok(Self::start(&services, listener, dispatcher))
    }

    fn start(services: &Services, listener: TcpListener, dispatcher: Dispatcher) -> Self {
        let (main, dispatcher) = dispatcher.spawn();

        Self {
            listener,
            router: Router::new(main, Arc::clone(&services.registry)),
            peers: Arc::clone(&services.peers),
            dispatcher,
        }
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serve until the dispatcher stops
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_until(std::future::pending()).await
    }

    /// Serve until `shutdown` resolves or the dispatcher stops
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        let RpcServer {
            listener,
            router,
            peers,
            mut dispatcher,
        } = self;
        tokio::pin!(shutdown);

        info!("Listening on {}", listener.local_addr()?);

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, addr) = match accepted {
                        Ok(conn) => conn,
                        Err(e) => {
                            warn!("Accept failed: {}", e);
                            continue;
                        }
                    };
                    let router = router.clone();
                    let peers = Arc::clone(&peers);
                    tokio::spawn(async move {
                        if let Err(e) = serve_connection(stream, peers, router).await {
                            debug!("Connection from {} ended: {}", addr, e);
                        }
                    });
                }

                _ = &mut shutdown => {
                    info!("Received shutdown signal");
                    break;
                }

                finished = &mut dispatcher => {
                    return match finished {
                        Ok(Ok(())) => Ok(()),
                        Ok(Err(e)) => {
                            error!("Dispatcher failed: {}", e);
                            Err(e)
                        }
                        Err(_) => Err(ServerError::DispatcherGone),
                    };
                }
            }
        }

        info!("Server shutting down");
        Ok(())
    }
}

async fn serve_connection(
    stream: TcpStream,
    peers: Arc<PeerTable>,
    router: Router,
) -> Result<(), ServerError> {
    let registration = peers.register();
    let peer = registration.id();
    info!("Peer {} connected from {}", peer, stream.peer_addr()?);

    let (read_half, write_half) = stream.into_split();
    let mut transport = LineTransport::new(write_half);
    let mut lines = BufReader::new(read_half).lines();

    transport
        .send(&Greeting {
            peer: peer.to_string(),
        })
        .await?;

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        debug!("Received from {}: {}", peer, line);

        if let Some(reply) = handle_line(&router, peer, &line).await {
            transport.send(&reply).await?;
        }
    }

    // Dropping the registration terminates the peer and its sessions.
    drop(registration);
    info!("Peer {} disconnected", peer);
    transport.shutdown().await
}

async fn handle_line(router: &Router, peer: PeerId, line: &str) -> Option<ReplyEnvelope> {
    let envelope: Envelope = match serde_json::from_str(line) {
        Ok(envelope) => envelope,
        Err(e) => {
            let err = ServerError::BadEnvelope(e.to_string());
            warn!("{} from {}", err, peer);
            return Some(ReplyEnvelope {
                id: Value::Null,
                reply: protocol::error_reply(err.kind(), &e.to_string()),
            });
        }
    };

    let outcome = match router.route(peer, &envelope.to, envelope.request).await {
        Ok(outcome) => outcome,
        Err(e) => Dispatch::Reply(protocol::error_reply(e.kind(), &e.to_string())),
    };

    match (envelope.id, outcome) {
        (Some(id), Dispatch::Reply(reply)) => Some(ReplyEnvelope { id, reply }),
        _ => None,
    }
}
