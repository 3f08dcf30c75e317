//! Heartbeat (PING/PONG) liveness tracking for an established connection.
//!
//! This is a small, runtime-agnostic state machine: it does not itself sleep
//! or spawn anything. Callers re-armed by their own reactor loop call
//! [`HeartbeatState::on_tick`] whenever their interval timer fires and
//! [`HeartbeatState::on_pong`] whenever a PONG arrives, and act on the
//! returned [`HeartbeatAction`].
//!
//! Disabled (interval == 0) heartbeat state never produces an action.

use bytes::Bytes;
use std::time::Duration;

use zlink_core::options::SocketOptions;

use crate::command::{encode_ping, encode_pong, MAX_HEARTBEAT_CTX};

/// What the caller should do in response to a heartbeat timer tick or an
/// incoming PING/PONG.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeartbeatAction {
    /// Nothing to do.
    None,
    /// Send this encoded PING control frame.
    SendPing(Bytes),
    /// Send this encoded PONG control frame (echoing the peer's context).
    SendPong(Bytes),
    /// The peer missed its heartbeat window; the connection must fail with
    /// `timeout_error`.
    TimedOut,
}

/// Per-connection heartbeat timers, driven by PING/PONG traffic.
///
/// Two independent deadlines are tracked:
/// - `next_ping_at`: when we must send our next PING (every `interval`).
/// - `pong_deadline`: when, if set, an outstanding PING's PONG is overdue.
#[derive(Debug, Clone)]
pub struct HeartbeatState {
    interval: Duration,
    ttl_ds: u16,
    timeout: Duration,
    elapsed_since_ping: Duration,
    awaiting_pong: bool,
    elapsed_since_ping_sent: Duration,
    ctx: [u8; MAX_HEARTBEAT_CTX],
    ctx_len: usize,
    ctx_counter: u8,
}

impl HeartbeatState {
    /// Build heartbeat state from socket options. Returns `None` if
    /// heartbeating is disabled (`heartbeat_interval` is zero).
    #[must_use]
    pub fn new(options: &SocketOptions) -> Option<Self> {
        if options.heartbeat_interval.is_zero() {
            return None;
        }
        let ttl_ds = (options.heartbeat_ttl.as_millis() / 100).min(u16::MAX as u128) as u16;
        let timeout = if options.heartbeat_timeout.is_zero() {
            options.heartbeat_interval
        } else {
            options.heartbeat_timeout
        };
        Some(Self {
            interval: options.heartbeat_interval,
            ttl_ds,
            timeout,
            elapsed_since_ping: Duration::ZERO,
            awaiting_pong: false,
            elapsed_since_ping_sent: Duration::ZERO,
            ctx: [0u8; MAX_HEARTBEAT_CTX],
            ctx_len: 0,
            ctx_counter: 0,
        })
    }

    /// Advance the internal clock by `dt` (the caller's poll/tick period)
    /// and report what, if anything, must happen now.
    pub fn on_tick(&mut self, dt: Duration) -> HeartbeatAction {
        if self.awaiting_pong {
            self.elapsed_since_ping_sent += dt;
            if self.elapsed_since_ping_sent >= self.timeout {
                return HeartbeatAction::TimedOut;
            }
        }

        self.elapsed_since_ping += dt;
        if self.elapsed_since_ping < self.interval {
            return HeartbeatAction::None;
        }
        self.elapsed_since_ping = Duration::ZERO;

        self.ctx_counter = self.ctx_counter.wrapping_add(1);
        self.ctx[0] = self.ctx_counter;
        self.ctx_len = 1;
        self.awaiting_pong = true;
        self.elapsed_since_ping_sent = Duration::ZERO;

        HeartbeatAction::SendPing(encode_ping(self.ttl_ds, &self.ctx[..self.ctx_len]))
    }

    /// A PONG arrived; if its context matches our outstanding PING, cancel
    /// the timeout deadline.
    pub fn on_pong(&mut self, ctx: &[u8]) {
        if self.awaiting_pong && ctx == &self.ctx[..self.ctx_len] {
            self.awaiting_pong = false;
            self.elapsed_since_ping_sent = Duration::ZERO;
        }
    }

    /// A PING arrived from the peer; build the PONG we owe it.
    #[must_use]
    pub fn respond_to_ping(ctx: &[u8]) -> HeartbeatAction {
        HeartbeatAction::SendPong(encode_pong(ctx))
    }

    /// The configured PING interval, used by callers to size their poll/tick period.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(interval_ms: u64, timeout_ms: u64) -> SocketOptions {
        SocketOptions::new()
            .with_heartbeat_interval(Duration::from_millis(interval_ms))
            .with_heartbeat_timeout(Duration::from_millis(timeout_ms))
    }

    #[test]
    fn disabled_when_interval_zero() {
        assert!(HeartbeatState::new(&SocketOptions::new()).is_none());
    }

    #[test]
    fn sends_ping_after_interval_elapses() {
        let mut hb = HeartbeatState::new(&opts(100, 100)).unwrap();
        assert_eq!(hb.on_tick(Duration::from_millis(50)), HeartbeatAction::None);
        match hb.on_tick(Duration::from_millis(60)) {
            HeartbeatAction::SendPing(_) => {}
            other => panic!("expected SendPing, got {other:?}"),
        }
    }

    #[test]
    fn pong_cancels_timeout() {
        let mut hb = HeartbeatState::new(&opts(10, 50)).unwrap();
        let HeartbeatAction::SendPing(ping) = hb.on_tick(Duration::from_millis(10)) else {
            panic!("expected ping");
        };
        let (_, ctx) = crate::command::decode_ping(&ping).unwrap();

        hb.on_pong(&ctx);
        // Timer keeps advancing well past the timeout window, but since the
        // PONG cancelled `awaiting_pong` this must not fire TimedOut.
        for _ in 0..10 {
            match hb.on_tick(Duration::from_millis(10)) {
                HeartbeatAction::TimedOut => panic!("should not time out after PONG"),
                _ => {}
            }
        }
    }

    #[test]
    fn missing_pong_times_out() {
        let mut hb = HeartbeatState::new(&opts(10, 30)).unwrap();
        assert!(matches!(
            hb.on_tick(Duration::from_millis(10)),
            HeartbeatAction::SendPing(_)
        ));

        assert_eq!(hb.on_tick(Duration::from_millis(10)), HeartbeatAction::None);
        assert_eq!(hb.on_tick(Duration::from_millis(10)), HeartbeatAction::None);
        assert_eq!(hb.on_tick(Duration::from_millis(20)), HeartbeatAction::TimedOut);
    }

    #[test]
    fn responds_to_peer_ping_with_matching_context() {
        let ping = encode_ping(50, b"xyz");
        let (_, ctx) = crate::command::decode_ping(&ping).unwrap();
        let action = HeartbeatState::respond_to_ping(&ctx);
        match action {
            HeartbeatAction::SendPong(pong) => {
                let echoed = crate::command::decode_pong(&pong).unwrap();
                assert_eq!(echoed, ctx);
            }
            other => panic!("expected SendPong, got {other:?}"),
        }
    }
}
