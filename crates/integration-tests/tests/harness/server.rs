//! Test server wrapper that runs the real `nexus-server` assembly (and its
//! graceful-shutdown wiring) on a freshly-reserved loopback port.

use std::net::SocketAddr;
use std::time::{Duration as StdDuration, Instant as StdInstant};

use nexus_config::Config;
use nexus_engine::discovery::DiscoveredUpstream;
use nexus_server::Server;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct TestServer {
    addr: SocketAddr,
    shutdown: CancellationToken,
    client: reqwest::Client,
    handle: JoinHandle<anyhow::Result<()>>,
}

impl TestServer {
    /// Start a test server with the given configuration and discovered
    /// upstreams, reserving a real loopback port ahead of time so the
    /// caller knows the address before the listener actually binds.
    pub async fn start(mut config: Config, discovered: Vec<DiscoveredUpstream>) -> anyhow::Result<Self> {
        let addr = SocketAddr::from(([127, 0, 0, 1], free_port().await?));
        config.server.listen_address = Some(addr);

        let server = Server::new(config, discovered).await?;
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();
        let handle = tokio::spawn(async move { server.serve(shutdown_clone).await });

        wait_until_accepting(addr).await?;

        Ok(Self {
            addr,
            shutdown,
            client: reqwest::Client::new(),
            handle,
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Trigger graceful shutdown without waiting for the server task to
    /// finish draining. New requests made right after this call should see
    /// a shutdown rejection.
    pub fn begin_shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Trigger graceful shutdown and wait for the server task to exit,
    /// returning how long the drain took.
    pub async fn shutdown_and_join(self) -> anyhow::Result<StdDuration> {
        let start = StdInstant::now();
        self.shutdown.cancel();
        self.handle.await.expect("server task panicked")?;
        Ok(start.elapsed())
    }
}

async fn free_port() -> anyhow::Result<u16> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    Ok(listener.local_addr()?.port())
}

async fn wait_until_accepting(addr: SocketAddr) -> anyhow::Result<()> {
    for _ in 0..50 {
        if tokio::net::TcpStream::connect(addr).await.is_ok() {
            return Ok(());
        }
        tokio::time::sleep(StdDuration::from_millis(10)).await;
    }
    anyhow::bail!("server never started accepting connections on {addr}")
}
