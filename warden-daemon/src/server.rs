// SPDX-FileCopyrightText: 2026 The warden developers
// SPDX-License-Identifier: MIT

//! Unix-socket RPC server.
//!
//! The transport is one JSON envelope per line in each direction. Every
//! request carries a client-chosen `id` echoed on its response, and each
//! request is dispatched on its own task, so a long-running
//! `is_authenticated` does not block the `cancel_is_authenticated` that
//! is meant to interrupt it. Peer credentials are read once per
//! connection and attached to every request.

use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;

use warden_types::ErrorCode;

use crate::handler::{DaemonHandler, Request, Response};

/// A request envelope as read off the wire.
#[derive(Debug, Deserialize)]
struct RequestEnvelope {
    id: u64,
    #[serde(flatten)]
    request: Request,
}

/// A response envelope as written to the wire.
#[derive(Debug, Serialize)]
struct ResponseEnvelope {
    id: u64,
    #[serde(flatten)]
    response: Response,
}

/// The daemon's RPC server.
pub struct DaemonServer {
    handler: DaemonHandler,
    socket_path: PathBuf,
}

impl DaemonServer {
    pub fn new(handler: DaemonHandler, socket_path: PathBuf) -> Self {
        Self {
            handler,
            socket_path,
        }
    }

    /// Bind the socket and serve connections until the task is aborted.
    pub async fn serve(&self) -> io::Result<()> {
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path)?;
        }
        let listener = UnixListener::bind(&self.socket_path)?;
        // World-connectable; authorization happens per method on peer
        // credentials, and NSS lookups must work for every user.
        std::fs::set_permissions(&self.socket_path, std::fs::Permissions::from_mode(0o666))?;
        info!("Listening on {}", self.socket_path.display());

        loop {
            let (stream, _) = listener.accept().await?;
            let handler = self.handler.clone();
            tokio::spawn(async move {
                if let Err(e) = serve_connection(handler, stream).await {
                    debug!("Connection closed with error: {e}");
                }
            });
        }
    }
}

async fn serve_connection(handler: DaemonHandler, stream: UnixStream) -> io::Result<()> {
    let peer_uid = stream.peer_cred()?.uid();
    let (read_half, mut write_half) = stream.into_split();

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let writer = tokio::spawn(async move {
        while let Some(mut line) = rx.recv().await {
            line.push('\n');
            if write_half.write_all(line.as_bytes()).await.is_err() {
                break;
            }
        }
    });

    let mut lines = BufReader::new(read_half).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let envelope: RequestEnvelope = match serde_json::from_str(&line) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("Dropping malformed request from uid {peer_uid}: {e}");
                let reply = ResponseEnvelope {
                    id: 0,
                    response: Response::Error {
                        code: ErrorCode::InvalidArgument,
                        message: format!("malformed request: {e}"),
                    },
                };
                let _ = tx.send(serde_json::to_string(&reply).expect("static shape"));
                continue;
            }
        };

        // Each request runs on its own task; session-bound calls stay
        // independently cancellable.
        let handler = handler.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            let response = handler.handle(envelope.request, peer_uid).await;
            let reply = ResponseEnvelope {
                id: envelope.id,
                response,
            };
            let _ = tx.send(serde_json::to_string(&reply).expect("static shape"));
        });
    }

    drop(tx);
    let _ = writer.await;
    Ok(())
}
