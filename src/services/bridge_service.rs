//! Bridge between downstream game servers and the balance engine.
//!
//! The listener accepts plain TCP connections and reads frames prefixed with
//! a 32-bit big-endian length; the payload inside a frame is handed verbatim
//! to the pure decoder in [`crate::dto::bridge`]. A frame that fails to
//! decode is dropped with a warning and never affects the ledger or the rest
//! of the connection.

use std::net::SocketAddr;

use anyhow::Context;
use tokio::{
    io::{self, AsyncRead, AsyncReadExt},
    net::{TcpListener, TcpStream},
};
use tracing::{info, warn};

use crate::{
    dto::bridge::{self, BridgeAction, BridgeDecodeError, BridgeRequest},
    services::balance_service,
    state::SharedState,
};

/// Upper bound on a single bridge frame; anything larger is a protocol
/// violation and drops the connection.
const MAX_FRAME_LEN: usize = 64 * 1024;

/// Result of applying a decoded bridge request to the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeOutcome {
    /// The mutation was applied; the target now holds `new_balance`.
    Applied {
        /// Balance of the target after the mutation.
        new_balance: i64,
    },
    /// A take was rejected because the target only holds `balance`.
    InsufficientFunds {
        /// Balance the target held when the take was rejected.
        balance: i64,
    },
}

/// Apply a decoded bridge request to the engine.
///
/// `give` credits (non-positive amounts are a no-op), `take` debits when
/// covered, and `set` overwrites with the amount clamped to be non-negative.
pub fn apply(state: &SharedState, request: &BridgeRequest) -> BridgeOutcome {
    match request.action {
        BridgeAction::Give => BridgeOutcome::Applied {
            new_balance: balance_service::add(state, request.target, request.amount),
        },
        BridgeAction::Take => {
            if balance_service::spend(state, request.target, request.amount) {
                BridgeOutcome::Applied {
                    new_balance: balance_service::balance(state, request.target),
                }
            } else {
                BridgeOutcome::InsufficientFunds {
                    balance: balance_service::balance(state, request.target),
                }
            }
        }
        BridgeAction::Set => BridgeOutcome::Applied {
            new_balance: balance_service::set_balance(state, request.target, request.amount.max(0)),
        },
    }
}

/// Accept bridge connections forever on the configured address.
pub async fn run(state: SharedState) -> anyhow::Result<()> {
    let addr = state.config().bridge_addr();
    let listener = TcpListener::bind(addr)
        .await
        .context("binding bridge listener")?;
    info!(%addr, "bridge listener ready");

    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                tokio::spawn(handle_connection(state.clone(), stream, peer));
            }
            Err(err) => {
                warn!(error = %err, "failed to accept bridge connection");
            }
        }
    }
}

/// Read frames off one connection until the peer hangs up or misbehaves.
async fn handle_connection(state: SharedState, mut stream: TcpStream, peer: SocketAddr) {
    loop {
        let frame = match read_frame(&mut stream).await {
            Ok(Some(frame)) => frame,
            Ok(None) => return,
            Err(err) => {
                warn!(%peer, error = %err, "closing bridge connection");
                return;
            }
        };

        match bridge::decode(&frame) {
            Ok(request) => {
                let outcome = apply(&state, &request);
                info!(
                    %peer,
                    action = ?request.action,
                    target = %request.target,
                    amount = request.amount,
                    executor = %request.executor,
                    outcome = ?outcome,
                    "applied bridge message"
                );
            }
            Err(BridgeDecodeError::UnrecognizedAction(action)) => {
                warn!(%peer, action = %action, "unknown action from bridge");
            }
            Err(err) => {
                warn!(%peer, error = %err, "dropping malformed bridge message");
            }
        }
    }
}

/// Read one length-prefixed frame. `None` signals a clean end of stream.
async fn read_frame<R>(reader: &mut R) -> io::Result<Option<Vec<u8>>>
where
    R: AsyncRead + Unpin,
{
    let mut len_bytes = [0u8; 4];
    match reader.read_exact(&mut len_bytes).await {
        Ok(_) => {}
        Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(err) => return Err(err),
    }

    let len = u32::from_be_bytes(len_bytes) as usize;
    if len > MAX_FRAME_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("bridge frame of {len} bytes exceeds the {MAX_FRAME_LEN} byte limit"),
        ));
    }

    let mut frame = vec![0u8; len];
    reader.read_exact(&mut frame).await?;
    Ok(Some(frame))
}
