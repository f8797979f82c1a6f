// src/server/network_loop.rs

//! Contains the accept loop for client WebSocket connections.

use crate::connection::ConnectionHandler;
use crate::core::metrics;
use crate::core::network::ClientEvents;
use crate::core::shutdown::ShutdownContext;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Accepts client connections and runs one task per connection until shutdown.
pub struct NetworkLoop {
    listener: TcpListener,
    events: ClientEvents,
    permits: Arc<Semaphore>,
    shutdown: ShutdownContext,
}

impl NetworkLoop {
    pub fn new(
        listener: TcpListener,
        events: ClientEvents,
        permits: Arc<Semaphore>,
        shutdown: ShutdownContext,
    ) -> Self {
        Self {
            listener,
            events,
            permits,
            shutdown,
        }
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Runs until shutdown is requested and every connection task has finished.
    pub async fn run(self) {
        let mut client_tasks = JoinSet::new();

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.triggered() => {
                    info!("Network loop received shutdown signal, no longer accepting connections.");
                    break;
                }

                res = self.listener.accept() => {
                    let (socket, addr) = match res {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            error!("Failed to accept connection: {}", e);
                            continue;
                        }
                    };
                    let Ok(permit) = self.permits.clone().try_acquire_owned() else {
                        warn!("Client limit reached, closing connection from {}.", addr);
                        metrics::REJECTED_CONNECTIONS_TOTAL.inc();
                        continue;
                    };
                    debug!("Accepted new connection from: {}", addr);
                    metrics::CONNECTIONS_RECEIVED_TOTAL.inc();

                    let events = self.events.clone();
                    let shutdown = self.shutdown.child_token();
                    client_tasks.spawn(async move {
                        let _permit = permit;
                        match ConnectionHandler::accept(socket, addr, events, shutdown).await {
                            Ok(handler) => {
                                if let Err(e) = handler.run().await {
                                    warn!("Connection from {} terminated unexpectedly: {}", addr, e);
                                }
                            }
                            Err(e) => warn!("WebSocket handshake error for {}: {}", addr, e),
                        }
                    });
                }

                Some(res) = client_tasks.join_next() => {
                    if let Err(e) = res
                        && e.is_panic()
                    {
                        error!("A client handler panicked: {e:?}");
                    }
                }
            }
        }

        info!("Waiting for {} client connection(s) to close.", client_tasks.len());
        while let Some(res) = client_tasks.join_next().await {
            if let Err(e) = res
                && e.is_panic()
            {
                error!("A client handler panicked during shutdown: {e:?}");
            }
        }
        info!("All client connections closed.");
    }
}
