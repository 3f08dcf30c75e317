//! Mailbox: the one command enum every receiving object is addressed through.
//!
//! Per-hub actors (`RouterHub`, `PubSubHub`, ...) each grew their own ad hoc
//! command/event enum (`RouterCmd`/`PeerCmd`/`HubEvent`, `PubSubCmd`/
//! `PubSubEvent`). Those stay — they're the right shape for payload-carrying
//! traffic on a hot path — but the lifecycle control-plane (plug a session
//! into an I/O thread, hand a pipe's two ends to their owners, tear down on
//! mutual term-ack) is the same fixed vocabulary across every object kind.
//! `Command` is that vocabulary, and `Mailbox` is the single-producer/
//! many-producer queue (over `flume`, like every other channel in this
//! crate) any command-addressable object owns to receive it.
//!
//! A `seqnum` rides along on every command so a destination can tell a
//! stale command from a current one (e.g. a `pipe_term` for a pipe that has
//! already been torn down and replaced) and ignore it rather than act on
//! out-of-date state.

use bytes::Bytes;
use flume::{Receiver, Sender};

/// The fixed command vocabulary addressed to any mailbox-bearing object
/// (engine, session, socket, listener, connecter).
#[derive(Debug, Clone)]
pub enum Command {
    /// Ask the recipient to stop and release its resources.
    Stop,
    /// Plug a newly created engine/session into its owning I/O thread.
    Plug,
    /// Take ownership of a child object (e.g. session taking an engine).
    Own,
    /// Attach a pipe endpoint to its owner.
    Attach,
    /// Bind a pipe's two endpoints together.
    Bind,
    /// Peer has read N messages; the writer may advance its HWM window.
    ActivateRead { count: u64 },
    /// Peer has freed write capacity; the reader side may resume producing.
    ActivateWrite { count: u64 },
    /// Any partially-delivered multipart prefix at the peer is now invalid.
    Hiccup,
    /// Initiate the two-party pipe termination handshake.
    PipeTerm,
    /// Acknowledge a `PipeTerm`; only after this may either side release
    /// the pipe.
    PipeTermAck,
    /// Notify that this pipe's high-water mark changed.
    PipeHwm { hwm: usize },
    /// Request termination of the recipient (soft: may still drain).
    TermReq,
    /// Terminate unconditionally.
    Term,
    /// Acknowledge a `Term`/`TermReq`.
    TermAck,
    /// Terminate a named endpoint (listener/connecter) rather than a
    /// specific connection.
    TermEndpoint { endpoint: Bytes },
    /// Ask the context's reaper to recycle this object's slot.
    Reap,
    /// Reaper's acknowledgement that a slot was recycled.
    Reaped,
    /// Generic "the requested operation completed" acknowledgement.
    Done,
    /// An `inproc://` connect attempt found its bound peer.
    InprocConnected,
    /// A connect attempt failed (transient, session may retry).
    ConnFailed,
}

/// One command plus the sequence number used to detect and drop stale
/// deliveries (a command enqueued against state that has since moved on).
#[derive(Debug, Clone)]
pub struct Envelope {
    pub command: Command,
    pub seqnum: u64,
}

/// The receiving half of a mailbox.
///
/// Wraps a `flume::Receiver<Envelope>`; the sending half is a plain
/// `flume::Sender<Envelope>` (see [`Mailbox::sender`]) so any number of
/// producers across I/O threads can enqueue commands — flume's receiver
/// wakes the owning thread's reactor on every send, matching the "signal
/// once per transition from empty" discipline of the original mailbox: a
/// thread already awake draining the channel coalesces any sends that land
/// while it's still draining, since it'll see them on the next `try_recv`.
pub struct Mailbox {
    rx: Receiver<Envelope>,
    tx: Sender<Envelope>,
    next_seq: u64,
}

impl Mailbox {
    /// Create a fresh, empty mailbox.
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = flume::unbounded();
        Self {
            rx,
            tx,
            next_seq: 0,
        }
    }

    /// A cloneable sender any number of other objects (on any I/O thread)
    /// can hold to post commands to this mailbox.
    #[must_use]
    pub fn sender(&self) -> MailboxSender {
        MailboxSender {
            tx: self.tx.clone(),
        }
    }

    /// Post a command to this mailbox from the owning thread itself,
    /// stamping it with the next sequence number.
    pub fn post(&mut self, command: Command) {
        let seqnum = self.next_seq;
        self.next_seq += 1;
        // The sender can't be disconnected: `self` holds both halves.
        let _ = self.tx.send(Envelope { command, seqnum });
    }

    /// Drain every command currently queued without blocking.
    pub fn drain(&mut self) -> Vec<Envelope> {
        self.rx.try_iter().collect()
    }

    /// Await the next command, suspending the calling task until one
    /// arrives or every sender has been dropped.
    pub async fn recv(&mut self) -> Option<Envelope> {
        self.rx.recv_async().await.ok()
    }

    /// True if no command is currently queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

impl Default for Mailbox {
    fn default() -> Self {
        Self::new()
    }
}

/// A cloneable handle other objects hold to post commands into a
/// [`Mailbox`] they don't own, stamping each with a caller-supplied
/// sequence number (the sender, not the mailbox, usually owns the
/// generation counter for commands about a specific piece of state, e.g.
/// "the third `pipe_term` I've sent for this pipe").
#[derive(Clone)]
pub struct MailboxSender {
    tx: Sender<Envelope>,
}

impl MailboxSender {
    /// Post a command with an explicit sequence number.
    ///
    /// Returns `Err` if the mailbox has been dropped.
    pub fn post(&self, command: Command, seqnum: u64) -> Result<(), Command> {
        self.tx
            .send(Envelope { command, seqnum })
            .map_err(|e| e.0.command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_and_drain_preserves_order_and_seqnums() {
        let mut mbox = Mailbox::new();
        mbox.post(Command::Plug);
        mbox.post(Command::PipeTerm);
        mbox.post(Command::PipeTermAck);

        let drained = mbox.drain();
        assert_eq!(drained.len(), 3);
        assert_eq!(drained[0].seqnum, 0);
        assert_eq!(drained[1].seqnum, 1);
        assert_eq!(drained[2].seqnum, 2);
        assert!(matches!(drained[0].command, Command::Plug));
        assert!(matches!(drained[2].command, Command::PipeTermAck));
    }

    #[test]
    fn drain_on_empty_mailbox_is_empty() {
        let mut mbox = Mailbox::new();
        assert!(mbox.is_empty());
        assert!(mbox.drain().is_empty());
    }

    #[test]
    fn external_sender_can_post_after_mailbox_moved() {
        let mbox = Mailbox::new();
        let sender = mbox.sender();
        let mut mbox = mbox;

        sender.post(Command::ActivateRead { count: 4 }, 7).unwrap();
        let drained = mbox.drain();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].seqnum, 7);
        assert!(matches!(
            drained[0].command,
            Command::ActivateRead { count: 4 }
        ));
    }

    #[compio::test]
    async fn recv_wakes_on_sender_post() {
        let mut mbox = Mailbox::new();
        let sender = mbox.sender();
        sender.post(Command::Hiccup, 0).unwrap();

        let envelope = mbox.recv().await.expect("command delivered");
        assert!(matches!(envelope.command, Command::Hiccup));
    }
}
