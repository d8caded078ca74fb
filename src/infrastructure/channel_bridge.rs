//! Message-passing bridge to the content surface
//!
//! The host never shares memory with the surface. Each call is one command on
//! an mpsc channel carrying a oneshot reply slot; the surface side (whatever
//! hosts the rendered page) drains [`SurfaceCommand`]s and answers them.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{debug, warn};

use super::config::SessionConfig;
use crate::domain::content_surface::ContentBridge;

/// Commands delivered to the surface endpoint.
#[derive(Debug)]
pub enum SurfaceCommand {
    Inject { reply: oneshot::Sender<bool> },
    Clear { reply: oneshot::Sender<()> },
    ReadSelection { reply: oneshot::Sender<Vec<String>> },
    ReadSelectionCount { reply: oneshot::Sender<usize> },
}

impl SurfaceCommand {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Inject { .. } => "inject",
            Self::Clear { .. } => "clear",
            Self::ReadSelection { .. } => "read_selection",
            Self::ReadSelectionCount { .. } => "read_selection_count",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BridgeError {
    #[error("content surface is unavailable")]
    Unavailable,

    #[error("content surface did not answer within {0:?}")]
    Timeout(Duration),
}

/// Host side of the bridge.
#[derive(Debug, Clone)]
pub struct ChannelBridge {
    commands: mpsc::Sender<SurfaceCommand>,
    call_timeout: Duration,
}

impl ChannelBridge {
    /// Create a bridge and the receiver the surface endpoint must drain.
    pub fn new(buffer: usize, call_timeout: Duration) -> (Self, mpsc::Receiver<SurfaceCommand>) {
        let (commands, receiver) = mpsc::channel(buffer.max(1));
        (
            Self {
                commands,
                call_timeout,
            },
            receiver,
        )
    }

    pub fn from_config(config: &SessionConfig) -> (Self, mpsc::Receiver<SurfaceCommand>) {
        Self::new(config.bridge_buffer_size, config.bridge_timeout())
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> SurfaceCommand,
    ) -> Result<T, BridgeError> {
        let (reply, response) = oneshot::channel();
        let command = build(reply);
        let name = command.name();

        match timeout(self.call_timeout, self.commands.send(command)).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => return Err(BridgeError::Unavailable),
            Err(_) => return Err(BridgeError::Timeout(self.call_timeout)),
        }

        match timeout(self.call_timeout, response).await {
            Ok(Ok(value)) => {
                debug!("Bridge call '{}' answered", name);
                Ok(value)
            }
            // Reply slot dropped without an answer
            Ok(Err(_)) => Err(BridgeError::Unavailable),
            Err(_) => Err(BridgeError::Timeout(self.call_timeout)),
        }
    }

    pub async fn try_inject(&self) -> Result<bool, BridgeError> {
        self.request(|reply| SurfaceCommand::Inject { reply }).await
    }

    pub async fn try_clear(&self) -> Result<(), BridgeError> {
        self.request(|reply| SurfaceCommand::Clear { reply }).await
    }

    pub async fn try_read_selection(&self) -> Result<Vec<String>, BridgeError> {
        self.request(|reply| SurfaceCommand::ReadSelection { reply })
            .await
    }

    pub async fn try_read_selection_count(&self) -> Result<usize, BridgeError> {
        self.request(|reply| SurfaceCommand::ReadSelectionCount { reply })
            .await
    }
}

/// Page-side behavior answering bridge commands.
///
/// Implementations keep their own interior state; the endpoint only routes
/// commands to them.
pub trait SelectionSurface: Send + Sync {
    fn inject(&self) -> bool;
    fn clear(&self);
    fn selection(&self) -> Vec<String>;

    fn selection_count(&self) -> usize {
        self.selection().len()
    }
}

/// Surface endpoint loop: answers commands until every bridge handle is dropped.
pub async fn serve_surface<S>(mut receiver: mpsc::Receiver<SurfaceCommand>, surface: Arc<S>)
where
    S: SelectionSurface + ?Sized,
{
    while let Some(command) = receiver.recv().await {
        let name = command.name();
        // A send error only means the caller stopped waiting.
        let answered = match command {
            SurfaceCommand::Inject { reply } => reply.send(surface.inject()).is_ok(),
            SurfaceCommand::Clear { reply } => {
                surface.clear();
                reply.send(()).is_ok()
            }
            SurfaceCommand::ReadSelection { reply } => reply.send(surface.selection()).is_ok(),
            SurfaceCommand::ReadSelectionCount { reply } => {
                reply.send(surface.selection_count()).is_ok()
            }
        };
        if !answered {
            debug!("Caller abandoned bridge call '{}'", name);
        }
    }
    debug!("Content surface endpoint stopped");
}

#[async_trait]
impl ContentBridge for ChannelBridge {
    async fn inject(&self) -> bool {
        self.try_inject().await.unwrap_or_else(|e| {
            warn!("Selection capability injection failed: {}", e);
            false
        })
    }

    async fn clear(&self) {
        if let Err(e) = self.try_clear().await {
            warn!("Clearing the content surface failed: {}", e);
        }
    }

    async fn read_selection(&self) -> Vec<String> {
        self.try_read_selection().await.unwrap_or_else(|e| {
            warn!("Reading the surface selection failed: {}", e);
            Vec::new()
        })
    }

    async fn read_selection_count(&self) -> usize {
        self.try_read_selection_count().await.unwrap_or_else(|e| {
            debug!("Selection count poll failed: {}", e);
            0
        })
    }
}
