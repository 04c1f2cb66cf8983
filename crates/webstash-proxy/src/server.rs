//! Per-site proxy server.
//!
//! One `SiteServer` is built per site definition and runs independently of
//! every other instance: it owns its configuration, binds its own listener,
//! and shares nothing but the filesystem.

use std::net::SocketAddr;

use axum::Router;
use socket2::{Domain, Protocol, Socket, Type};
use tracing::info;

use webstash_core::SiteConfig;

use crate::error::{ProxyError, Result};
use crate::handler::{proxy_request, SiteState};

/// One independently listening caching-proxy instance.
pub struct SiteServer {
    router: Router,
    addr: SocketAddr,
    name: String,
}

impl SiteServer {
    /// Builds the server for one site definition.
    ///
    /// Every method and path is routed into the caching pipeline, so the
    /// router is a single fallback handler.
    pub fn new(config: SiteConfig) -> Result<Self> {
        let addr: SocketAddr = config
            .listen_addr
            .parse()
            .map_err(|_| ProxyError::Address(config.listen_addr.clone()))?;
        let name = config.name.clone();

        let router = Router::new()
            .fallback(proxy_request)
            .with_state(SiteState::new(config));

        Ok(Self { router, addr, name })
    }

    /// The address this instance listens on.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Runs the instance until the process terminates.
    pub async fn run(self) -> Result<()> {
        info!(site = %self.name, "listening on {}", self.addr);

        // SO_REUSEADDR so a restart can bind while old sockets linger.
        let socket = Socket::new(Domain::for_address(self.addr), Type::STREAM, Some(Protocol::TCP))
            .map_err(|source| ProxyError::Bind {
                addr: self.addr,
                source,
            })?;
        socket
            .set_reuse_address(true)
            .map_err(|source| ProxyError::Bind {
                addr: self.addr,
                source,
            })?;
        socket
            .bind(&self.addr.into())
            .map_err(|source| ProxyError::Bind {
                addr: self.addr,
                source,
            })?;
        socket.listen(1024).map_err(|source| ProxyError::Bind {
            addr: self.addr,
            source,
        })?;
        socket
            .set_nonblocking(true)
            .map_err(|source| ProxyError::Bind {
                addr: self.addr,
                source,
            })?;

        let std_listener: std::net::TcpListener = socket.into();
        let listener = tokio::net::TcpListener::from_std(std_listener).map_err(|source| {
            ProxyError::Bind {
                addr: self.addr,
                source,
            }
        })?;

        axum::serve(listener, self.router)
            .await
            .map_err(|err| ProxyError::Runtime(err.to_string()))
    }

    /// Returns the router, for driving the pipeline in tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }
}
