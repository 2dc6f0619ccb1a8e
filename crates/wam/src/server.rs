//! HTTP/1 transport: accepts connections and feeds every request to an [`Application`].

use crate::application::Application;
use crate::socket::SocketHandle;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[derive(Debug)]
pub struct ServerBuilder {
    application: Option<Application>,
    address: Option<Vec<SocketAddr>>,
    address_error: Option<io::Error>,
}

impl ServerBuilder {
    fn new() -> Self {
        Self { application: None, address: None, address_error: None }
    }

    pub fn bind<A: ToSocketAddrs>(mut self, address: A) -> Self {
        match address.to_socket_addrs() {
            Ok(addresses) => self.address = Some(addresses.collect()),
            Err(e) => self.address_error = Some(e),
        }
        self
    }

    pub fn application(mut self, application: Application) -> Self {
        self.application = Some(application);
        self
    }

    pub fn build(self) -> Result<Server, ServerBuildError> {
        if let Some(source) = self.address_error {
            return Err(ServerBuildError::InvalidAddress { source });
        }
        let application = self.application.ok_or(ServerBuildError::MissingApplication)?;
        let address = self.address.filter(|address| !address.is_empty()).ok_or(ServerBuildError::MissingAddress)?;
        Ok(Server { application: Arc::new(application), address })
    }
}

#[derive(Error, Debug)]
pub enum ServerBuildError {
    #[error("application must be set")]
    MissingApplication,
    #[error("address must be set")]
    MissingAddress,
    #[error("invalid address: {source}")]
    InvalidAddress { source: io::Error },
}

#[derive(Debug)]
pub struct Server {
    application: Arc<Application>,
    address: Vec<SocketAddr>,
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// Installs a log subscriber, binds the address and serves until the process stops.
    pub async fn start(self) -> io::Result<()> {
        let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
        if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
            debug!(cause = %e, "keeping the existing tracing subscriber");
        }

        info!(address = ?self.address, "start listening");
        let tcp_listener = TcpListener::bind(self.address.as_slice())
            .await
            .inspect_err(|e| error!(cause = %e, "bind server error"))?;

        self.serve(tcp_listener).await;
        Ok(())
    }

    /// Serves connections accepted on an already bound listener.
    pub async fn serve(self, tcp_listener: TcpListener) {
        loop {
            let (tcp_stream, remote_addr) = match tcp_listener.accept().await {
                Ok(stream_and_addr) => stream_and_addr,
                Err(e) => {
                    warn!(cause = %e, "failed to accept");
                    continue;
                }
            };

            let application = Arc::clone(&self.application);
            tokio::spawn(async move {
                let socket = SocketHandle::new(false);
                let connection_socket = socket.clone();

                let service = service_fn(move |req: http::Request<Incoming>| {
                    let application = Arc::clone(&application);
                    let socket = connection_socket.clone();
                    async move { Ok::<_, Infallible>(application.handle(req, Some(socket)).await) }
                });

                let result = http1::Builder::new().serve_connection(TokioIo::new(tcp_stream), service).await;
                socket.close();

                match result {
                    Ok(()) => debug!(%remote_addr, "connection shutdown"),
                    Err(e) => error!(cause = %e, %remote_addr, "connection error, shutdown"),
                }
            });
        }
    }
}
