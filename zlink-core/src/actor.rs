//! Socket Actor (Protocol-Agnostic Core)
//!
//! One actor == one TCP connection.
//!
//! Responsibilities:
//! - Own the socket (AsyncRead + AsyncWrite)
//! - Drive read + write pumps (split-pump design)
//! - Move bytes between kernel and application
//! - Emit lifecycle events (PeerUp / PeerDown)
//! - Never contain routing logic (delegated to hubs)
//! - Never contain protocol logic (delegated to protocol layer above)
//!
//! NOTE: This is a minimal primitive. ZMTP framing, session management,
//! and multipart assembly happen in a higher layer that composes this actor.

use crate::alloc::{IoArena, SlabMut};

use bytes::Bytes;
use flume::{Receiver, Sender};

use compio::io::{AsyncRead, AsyncWrite};

/// Messages from application to socket
#[derive(Debug)]
pub enum UserCmd {
    /// Send raw bytes
    SendBytes(Bytes),
    /// Close socket
    Close,
}

/// Events from socket to application
#[derive(Debug, Clone)]
pub enum SocketEvent {
    /// Connection established
    Connected,
    /// Received bytes from peer
    ReceivedBytes(Bytes),
    /// Connection closed
    Disconnected,
}

/// Minimal protocol-agnostic socket actor.
///
/// This is a building block. Protocol framing (ZMTP, HTTP, etc.)
/// should be layered on top by wrapping this actor.
pub struct SocketActor<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    stream: S,

    /// Channel for sending events to application
    event_tx: Sender<SocketEvent>,

    /// Channel for receiving commands from application
    cmd_rx: Receiver<UserCmd>,

    /// Allocation arena for zero-copy reads
    arena: IoArena,
}

impl<S> SocketActor<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(
        stream: S,
        event_tx: Sender<SocketEvent>,
        cmd_rx: Receiver<UserCmd>,
        arena: IoArena,
    ) -> Self {
        Self {
            stream,
            event_tx,
            cmd_rx,
            arena,
        }
    }

    /// Run the actor event loop (split pump design).
    ///
    /// This implements the core split-pump pattern: a read half and a write
    /// half race each other every iteration instead of polling in a busy
    /// loop. The read side is always re-armed (single outstanding read per
    /// the engine invariant) regardless of write activity, so a quiet
    /// sender never starves delivery of inbound bytes.
    pub async fn run(mut self) {
        use compio::buf::BufResult;
        use compio::io::{AsyncReadExt, AsyncWriteExt};
        use futures::FutureExt;

        // Notify application that connection is ready
        let _ = self.event_tx.send(SocketEvent::Connected);

        // === INITIAL WRITE DRAIN ===
        // Process any queued writes (like greetings) before the first read.
        // This prevents deadlock where both sides wait to receive before sending.
        let mut write_queue: Vec<Bytes> = Vec::new();
        while let Ok(cmd) = self.cmd_rx.try_recv() {
            match cmd {
                UserCmd::SendBytes(b) => write_queue.push(b),
                UserCmd::Close => {
                    let _ = self.event_tx.send(SocketEvent::Disconnected);
                    return;
                }
            }
        }
        if self.flush_writes(&mut write_queue).await.is_err() {
            let _ = self.event_tx.send(SocketEvent::Disconnected);
            return;
        }

        enum Event {
            Read(std::io::Result<usize>, SlabMut),
            Cmd(Result<UserCmd, flume::RecvError>),
        }

        loop {
            let slab: SlabMut = self.arena.alloc_mut(8192);

            // Scope the borrows of `self.stream`/`self.cmd_rx` to this block so
            // both temporaries are dropped before we touch `self` again below.
            let event = {
                let read_fut = Box::pin((&mut self.stream).read(slab));
                let cmd_fut = Box::pin(self.cmd_rx.recv_async());
                futures::select_biased! {
                    BufResult(r, s) = read_fut => Event::Read(r, s),
                    c = cmd_fut => Event::Cmd(c),
                }
            };

            match event {
                Event::Read(read_res, slab) => match read_res {
                    Ok(0) => {
                        tracing::trace!("SocketActor: EOF, connection closed");
                        let _ = self.event_tx.send(SocketEvent::Disconnected);
                        return;
                    }
                    Err(e) => {
                        tracing::debug!(error = %e, "SocketActor: read error");
                        let _ = self.event_tx.send(SocketEvent::Disconnected);
                        return;
                    }
                    Ok(n) => {
                        tracing::trace!(bytes = n, "SocketActor: read from network");
                        let _ = self.event_tx.send(SocketEvent::ReceivedBytes(slab.freeze()));
                    }
                },
                Event::Cmd(cmd) => {
                    match cmd {
                        Ok(UserCmd::SendBytes(b)) => write_queue.push(b),
                        Ok(UserCmd::Close) => {
                            let _ = self.event_tx.send(SocketEvent::Disconnected);
                            return;
                        }
                        Err(_) => {
                            // Application dropped its command sender; nothing more to pump.
                            let _ = self.event_tx.send(SocketEvent::Disconnected);
                            return;
                        }
                    }
                    // Drain any further commands that queued up alongside this one.
                    while let Ok(cmd) = self.cmd_rx.try_recv() {
                        match cmd {
                            UserCmd::SendBytes(b) => write_queue.push(b),
                            UserCmd::Close => {
                                let _ = self.event_tx.send(SocketEvent::Disconnected);
                                return;
                            }
                        }
                    }
                    if self.flush_writes(&mut write_queue).await.is_err() {
                        let _ = self.event_tx.send(SocketEvent::Disconnected);
                        return;
                    }
                }
            }
        }
    }

    /// Write and clear every queued outbound buffer.
    async fn flush_writes(&mut self, write_queue: &mut Vec<Bytes>) -> std::io::Result<()> {
        use compio::buf::BufResult;
        use compio::io::AsyncWriteExt;

        for buf in write_queue.drain(..) {
            tracing::trace!(bytes = buf.len(), "SocketActor: writing to network");
            let buf_vec = buf.to_vec();
            let BufResult(write_res, _) = (&mut self.stream).write_all(buf_vec).await;
            write_res?;
        }
        Ok(())
    }
}

