//! Process-wide `Context`: the explicit, application-owned handle spec.md
//! §4.8/§9 calls for in place of thread-locals or implicit global init.
//!
//! A `Context` bundles the three things spec.md §4.8 says are process-wide:
//! - a tunables block (default HWMs, message size cap, I/O thread count),
//! - a lowest-load-first I/O thread chooser (modulo a per-socket affinity
//!   bitmask), and
//! - a terminator that hands out monotonic seqnums so mailbox commands can
//!   detect and ignore late arrivals (§4.7).
//!
//! The in-process endpoint registry (`inproc://`) stays the free-function
//! API in [`crate::inproc`] — ZeroMQ's own `inproc` transport is visible
//! across every `Context` in a process by design (it is how independently
//! created sockets in the same process rendezvous), so scoping it to one
//! `Context` instance would change its semantics, not just its ergonomics.
//! `Context` re-exposes that registry as methods so callers only ever touch
//! one object, per the "no thread-locals, no implicit init" design note.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::inproc::{self, InprocReceiver, InprocSender};

/// Tunables shared by every socket created against a [`Context`].
///
/// Mirrors the "tunables block (default HWMs, message size cap, etc.)" spec.md
/// §4.8 assigns to the process-wide context.
#[derive(Debug, Clone)]
pub struct ContextConfig {
    /// Number of I/O threads to model for load-balancing new connections.
    ///
    /// Default: [`num_cpus::get()`], clamped to at least 1.
    pub io_threads: usize,

    /// Hard cap on the number of sockets this context will hand out.
    ///
    /// Default: 1023 (libzmq's default `ZMQ_MAX_SOCKETS`).
    pub max_sockets: usize,

    /// Default send high water mark for sockets that don't override it.
    pub default_sndhwm: usize,

    /// Default receive high water mark for sockets that don't override it.
    pub default_rcvhwm: usize,

    /// Default maximum message size in bytes. `None` means unbounded
    /// (subject to the ZMP codec's own `u32` body-length ceiling).
    pub default_maxmsgsize: Option<u64>,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            io_threads: num_cpus::get().max(1),
            max_sockets: 1023,
            default_sndhwm: 1000,
            default_rcvhwm: 1000,
            default_maxmsgsize: None,
        }
    }
}

/// Error returned when a context-scoped resource cannot be allocated.
#[derive(Debug, thiserror::Error, PartialEq, Eq, Clone, Copy)]
pub enum ContextError {
    /// [`ContextConfig::max_sockets`] would be exceeded by this allocation.
    #[error("context socket limit ({0}) reached")]
    TooManySockets(usize),
}

struct Inner {
    config: ContextConfig,
    /// In-flight-connection count per modeled I/O thread, used to pick the
    /// least loaded thread (modulo the caller's affinity mask).
    thread_load: Vec<AtomicUsize>,
    /// Outstanding socket count, gated against `config.max_sockets`.
    socket_count: AtomicUsize,
    /// Monotonic counter for mailbox command seqnums (§4.7's "ignore late
    /// arrivals" discipline) and pipe/engine identity allocation.
    next_seqnum: AtomicU64,
}

/// Process-wide (or application-scoped) state: I/O thread accounting,
/// tunables, and the seqnum source for mailbox commands.
///
/// Create one per application (or one per logical subsystem that should
/// have its own socket-count budget); pass it to every socket explicitly.
/// There is no global singleton — a fresh `Context::new()` is fully
/// independent of any other.
#[derive(Clone)]
pub struct Context {
    inner: Arc<Inner>,
}

impl Context {
    /// Create a context with default tunables (§4.8).
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(ContextConfig::default())
    }

    /// Create a context with explicit tunables.
    #[must_use]
    pub fn with_config(config: ContextConfig) -> Self {
        let io_threads = config.io_threads.max(1);
        let thread_load = (0..io_threads).map(|_| AtomicUsize::new(0)).collect();
        Self {
            inner: Arc::new(Inner {
                config,
                thread_load,
                socket_count: AtomicUsize::new(0),
                next_seqnum: AtomicU64::new(0),
            }),
        }
    }

    /// The tunables this context was built with.
    #[must_use]
    pub fn config(&self) -> &ContextConfig {
        &self.inner.config
    }

    /// Number of I/O threads this context models.
    #[must_use]
    pub fn io_thread_count(&self) -> usize {
        self.inner.thread_load.len()
    }

    /// Pick the least-loaded I/O thread, restricted to the threads allowed
    /// by `affinity` (a bitmask; bit `i` set means thread `i` is eligible).
    /// `affinity == 0` means "no restriction" (every thread eligible),
    /// matching libzmq's `ZMQ_AFFINITY` semantics.
    ///
    /// Bumps the chosen thread's load counter; callers must pair this with
    /// [`Self::release_io_thread`] when the connection using it ends.
    ///
    /// # Panics
    ///
    /// Never: if `affinity` excludes every thread the full set is used
    /// instead, so a misconfigured mask can't strand a connection.
    pub fn choose_io_thread(&self, affinity: u64) -> usize {
        let n = self.inner.thread_load.len();
        let eligible = |i: usize| affinity == 0 || (affinity & (1u64 << (i % 64))) != 0;

        let mut best: Option<(usize, usize)> = None;
        for i in 0..n {
            if !eligible(i) {
                continue;
            }
            let load = self.inner.thread_load[i].load(Ordering::Relaxed);
            let better = match best {
                Some((_, best_load)) => load < best_load,
                None => true,
            };
            if better {
                best = Some((i, load));
            }
        }
        // No thread matched the mask: fall back to the globally least loaded
        // thread rather than failing the connection outright.
        let (idx, _) = best.unwrap_or_else(|| {
            (0..n)
                .map(|i| (i, self.inner.thread_load[i].load(Ordering::Relaxed)))
                .min_by_key(|&(_, load)| load)
                .unwrap_or((0, 0))
        });
        self.inner.thread_load[idx].fetch_add(1, Ordering::Relaxed);
        idx
    }

    /// Release a slot previously returned by [`Self::choose_io_thread`].
    pub fn release_io_thread(&self, idx: usize) {
        if let Some(counter) = self.inner.thread_load.get(idx) {
            counter.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| Some(v.saturating_sub(1))).ok();
        }
    }

    /// Reserve one unit of the context's socket budget.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::TooManySockets`] if `config.max_sockets` is
    /// already reserved.
    pub fn register_socket(&self) -> Result<(), ContextError> {
        let max = self.inner.config.max_sockets;
        loop {
            let current = self.inner.socket_count.load(Ordering::Relaxed);
            if current >= max {
                return Err(ContextError::TooManySockets(max));
            }
            if self
                .inner
                .socket_count
                .compare_exchange_weak(current, current + 1, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                return Ok(());
            }
        }
    }

    /// Release a unit of the context's socket budget.
    pub fn unregister_socket(&self) {
        self.inner.socket_count.fetch_sub(1, Ordering::Relaxed);
    }

    /// Current number of sockets registered against this context.
    #[must_use]
    pub fn socket_count(&self) -> usize {
        self.inner.socket_count.load(Ordering::Relaxed)
    }

    /// Allocate the next mailbox command seqnum (§4.7).
    pub fn next_seqnum(&self) -> u64 {
        self.inner.next_seqnum.fetch_add(1, Ordering::Relaxed)
    }

    /// Bind an `inproc://` endpoint through the process-wide registry.
    ///
    /// See [`crate::inproc::bind_inproc`] for why this registry is process-
    /// scoped rather than per-`Context`.
    ///
    /// # Errors
    ///
    /// See [`crate::inproc::bind_inproc`].
    pub fn bind_inproc(&self, endpoint: &str) -> std::io::Result<(InprocSender, InprocReceiver)> {
        inproc::bind_inproc(endpoint)
    }

    /// Connect to an `inproc://` endpoint through the process-wide registry.
    ///
    /// # Errors
    ///
    /// See [`crate::inproc::connect_inproc`].
    pub fn connect_inproc(&self, endpoint: &str) -> std::io::Result<InprocSender> {
        inproc::connect_inproc(endpoint)
    }

    /// Unbind a previously bound `inproc://` endpoint.
    ///
    /// # Errors
    ///
    /// See [`crate::inproc::unbind_inproc`].
    pub fn unbind_inproc(&self, endpoint: &str) -> std::io::Result<()> {
        inproc::unbind_inproc(endpoint)
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("io_threads", &self.io_thread_count())
            .field("sockets", &self.socket_count())
            .field("max_sockets", &self.inner.config.max_sockets)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_has_at_least_one_io_thread() {
        let ctx = Context::new();
        assert!(ctx.io_thread_count() >= 1);
    }

    #[test]
    fn chooses_least_loaded_thread() {
        let ctx = Context::with_config(ContextConfig {
            io_threads: 4,
            ..ContextConfig::default()
        });
        let a = ctx.choose_io_thread(0);
        let b = ctx.choose_io_thread(0);
        // With two threads already loaded, the third pick must land on one
        // of the two still-idle threads.
        assert_ne!(a, usize::MAX);
        assert_ne!(b, usize::MAX);
        ctx.release_io_thread(a);
        ctx.release_io_thread(b);
    }

    #[test]
    fn affinity_mask_restricts_choice() {
        let ctx = Context::with_config(ContextConfig {
            io_threads: 4,
            ..ContextConfig::default()
        });
        // Only thread 2 eligible.
        let idx = ctx.choose_io_thread(1 << 2);
        assert_eq!(idx, 2);
        ctx.release_io_thread(idx);
    }

    #[test]
    fn socket_budget_is_enforced() {
        let ctx = Context::with_config(ContextConfig {
            max_sockets: 2,
            ..ContextConfig::default()
        });
        assert!(ctx.register_socket().is_ok());
        assert!(ctx.register_socket().is_ok());
        assert_eq!(
            ctx.register_socket(),
            Err(ContextError::TooManySockets(2))
        );
        ctx.unregister_socket();
        assert!(ctx.register_socket().is_ok());
    }

    #[test]
    fn seqnums_are_monotonic_and_unique() {
        let ctx = Context::new();
        let a = ctx.next_seqnum();
        let b = ctx.next_seqnum();
        assert!(b > a);
    }

    #[test]
    fn clone_shares_state() {
        let ctx = Context::new();
        let clone = ctx.clone();
        clone.register_socket().unwrap();
        assert_eq!(ctx.socket_count(), 1);
    }
}
