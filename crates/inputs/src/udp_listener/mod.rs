//! UDP Listener Input - Line protocol over datagrams
//!
//! ```toml
//! [[inputs.udp_listener]]
//! service_address = "0.0.0.0:8094"
//! read_buffer_size = 65536
//! ```
//!
//! A service input: the socket is bound on `start` and read by its own
//! task until `stop`. Each datagram holds one or more lines; a datagram
//! that fails to decode is reported and dropped as a whole.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use tally_config::{PluginKind, decode_options};
use tally_metric::{LineProtocolParser, Parser};
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::registry::{InputContext, InputFactory};
use crate::{Accumulator, InputError, InputKind, Result, ServiceInput};

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;

const DEFAULT_ADDRESS: &str = "127.0.0.1:8094";
const DEFAULT_READ_BUFFER: usize = 64 * 1024;

fn default_address() -> String {
    DEFAULT_ADDRESS.to_string()
}

fn default_read_buffer() -> usize {
    DEFAULT_READ_BUFFER
}

/// Options of the `udp_listener` input
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UdpListenerConfig {
    #[serde(default = "default_address")]
    pub service_address: String,
    /// Largest datagram accepted, in bytes
    #[serde(default = "default_read_buffer")]
    pub read_buffer_size: usize,
}

impl Default for UdpListenerConfig {
    fn default() -> Self {
        Self {
            service_address: default_address(),
            read_buffer_size: default_read_buffer(),
        }
    }
}

struct Listening {
    local_addr: SocketAddr,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Receives line protocol datagrams
pub struct UdpListener {
    config: UdpListenerConfig,
    listening: Mutex<Option<Listening>>,
}

impl UdpListener {
    /// # Errors
    ///
    /// `InputError::Config` for a zero `read_buffer_size`.
    pub fn new(config: UdpListenerConfig) -> Result<Self> {
        if config.read_buffer_size == 0 {
            return Err(InputError::config(
                "udp_listener",
                "read_buffer_size must be greater than zero",
            ));
        }
        Ok(Self {
            config,
            listening: Mutex::new(None),
        })
    }

    /// Bound address while started
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listening.lock().as_ref().map(|l| l.local_addr)
    }
}

async fn receive(
    socket: UdpSocket,
    buffer_size: usize,
    acc: Arc<dyn Accumulator>,
    cancel: CancellationToken,
) {
    let parser = LineProtocolParser::new();
    let mut buf = vec![0u8; buffer_size];

    loop {
        let (len, peer) = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            received = socket.recv_from(&mut buf) => match received {
                Ok(received) => received,
                Err(e) => {
                    acc.add_error(anyhow::anyhow!("receive failed: {e}"));
                    continue;
                }
            },
        };

        let text = match std::str::from_utf8(&buf[..len]) {
            Ok(text) => text,
            Err(e) => {
                acc.add_error(anyhow::anyhow!("datagram from {peer} is not UTF-8: {e}"));
                continue;
            }
        };
        match parser.parse(text) {
            Ok(metrics) => {
                for metric in metrics {
                    acc.add_metric(metric);
                }
            }
            Err(e) => acc.add_error(anyhow::anyhow!("datagram from {peer}: {e}")),
        }
    }
}

#[async_trait]
impl ServiceInput for UdpListener {
    async fn start(&self, acc: Arc<dyn Accumulator>) -> anyhow::Result<()> {
        if self.listening.lock().is_some() {
            anyhow::bail!("already started");
        }
        let socket = UdpSocket::bind(self.config.service_address.as_str())
            .await
            .map_err(|e| anyhow::anyhow!("bind {}: {e}", self.config.service_address))?;
        let local_addr = socket.local_addr()?;

        let cancel = CancellationToken::new();
        let task = tokio::spawn(receive(
            socket,
            self.config.read_buffer_size,
            acc,
            cancel.clone(),
        ));
        debug!(address = %local_addr, "udp listener bound");

        *self.listening.lock() = Some(Listening {
            local_addr,
            cancel,
            task,
        });
        Ok(())
    }

    async fn stop(&self) {
        let Some(listening) = self.listening.lock().take() else {
            return;
        };
        listening.cancel.cancel();
        if let Err(e) = listening.task.await {
            debug!(error = %e, "udp receive task ended abnormally");
        }
    }

    fn name(&self) -> &'static str {
        "udp_listener"
    }
}

impl std::fmt::Debug for UdpListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdpListener")
            .field("config", &self.config)
            .field("local_addr", &self.local_addr())
            .finish()
    }
}

/// Factory for the `udp_listener` input
pub struct UdpListenerFactory;

impl InputFactory for UdpListenerFactory {
    fn create(&self, options: &toml::Table, _context: &InputContext) -> Result<InputKind> {
        let config: UdpListenerConfig = decode_options(PluginKind::Input, "udp_listener", options)?;
        Ok(InputKind::Service(Box::new(UdpListener::new(config)?)))
    }

    fn name(&self) -> &'static str {
        "udp_listener"
    }
}
