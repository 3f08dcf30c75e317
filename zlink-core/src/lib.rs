//! zlink-core
//!
//! This crate contains the runtime-agnostic core building blocks shared by
//! every protocol crate:
//! - Pinned / io_uring-safe allocation (`alloc`)
//! - Split-pump socket actor (`actor`)
//! - ROUTER hub + peer map (`router`)
//! - PUB/SUB core: multi-peer subscription index + hub (`pubsub`), and the
//!   single-socket local subscription list XPUB/XSUB/SUB keep for their own
//!   bookkeeping (`subscription`)
//! - Byte-based backpressure (`backpressure`)
//! - Error types (`error`)
//! - Socket configuration (`options`), addressing (`endpoint`), socket
//!   kinds (`socket_type`)
//! - Transport primitives (`tcp`, `ipc`, `inproc`)
//! - Reconnection backoff (`reconnect`), handshake/heartbeat timers
//!   (`timeout`), poisoned-connection guarding (`poison`)
//! - The wire-agnostic multipart `message`, and socket health reporting
//!   (`monitor`)
//! - The fixed lifecycle command vocabulary (`mailbox`) addressed to any
//!   engine/session/socket/listener/connecter
//! - The explicit, application-owned process context (`context`): I/O
//!   thread accounting, tunables, and mailbox seqnum allocation

#![deny(unsafe_code)]
// Allow some pedantic lints that are intentional in this crate
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::needless_pass_by_ref_mut)]
#![allow(clippy::match_same_arms)]
pub mod actor;
pub mod alloc;
pub mod backpressure;
pub mod buffer;
pub mod context;
pub mod endpoint;
pub mod error;
pub mod inproc;
pub mod ipc;
pub mod mailbox;
pub mod message;
pub mod monitor;
pub mod options;
pub mod poison;
pub mod reconnect;
pub mod router;
pub mod socket_type;
pub mod subscription;
pub mod tcp;
pub mod timeout;

pub mod pubsub {
    pub mod hub;
    pub mod index;
}

// Optional: a small prelude to make downstream crates ergonomic.
// Keep it minimal to avoid API lock-in.
pub mod prelude {
    pub use crate::actor::{SocketActor, SocketEvent, UserCmd};
    pub use crate::alloc::{IoArena, SlabMut};
    pub use crate::backpressure::{BytePermits, HwmPermits, Permit};
    pub use crate::context::{Context, ContextConfig, ContextError};
    pub use crate::endpoint::Endpoint;
    pub use crate::error::{EngineError, Result, ZmpErrorCode};
    pub use crate::mailbox::{Command, Envelope, Mailbox, MailboxSender};
    pub use crate::message::Message;
    pub use crate::options::SocketOptions;
    pub use crate::pubsub::hub::{PubSubCmd, PubSubEvent, PubSubHub};
    pub use crate::pubsub::index::{PeerKey, SubscriptionIndex};
    pub use crate::reconnect::{ReconnectError, ReconnectState};
    pub use crate::router::{HubEvent, PeerCmd, RouterBehavior, RouterCmd, RouterHub};
    pub use crate::socket_type::SocketType;
}
