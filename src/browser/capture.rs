//! Short-lived state machine racing network observations against a deadline.

use super::{NetworkEvent, NetworkEvents};
use regex::Regex;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

/// Parses image URLs (with discovered indices) out of a response body.
pub type ImageParser = fn(&str) -> Vec<(u32, String)>;

#[derive(Debug, Clone, PartialEq)]
pub enum Captured {
    /// A matching outbound request; its URL carries the signed token.
    Request { url: String },
    /// A matching response that already contained images.
    Response { url: String, images: Vec<(u32, String)> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum CaptureState {
    Idle,
    AwaitingCapture,
    Resolved(Captured),
    Exhausted,
}

impl CaptureState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, CaptureState::Resolved(_) | CaptureState::Exhausted)
    }
}

/// Watches one page load for a signed endpoint.
///
/// States move `Idle → AwaitingCapture → Resolved | Exhausted`. A matching
/// request that precedes its response is remembered as the signed URL even if
/// the session later resolves on the response, so callers can read
/// [`CaptureSession::signed_url`] after any outcome.
pub struct CaptureSession {
    state: CaptureState,
    endpoint: Regex,
    parse_images: ImageParser,
    signed_url: Option<String>,
    events: Option<NetworkEvents>,
}

impl CaptureSession {
    pub fn new(endpoint: Regex, parse_images: ImageParser) -> Self {
        Self {
            state: CaptureState::Idle,
            endpoint,
            parse_images,
            signed_url: None,
            events: None,
        }
    }

    pub fn attach(&mut self, events: NetworkEvents) {
        self.events = Some(events);
        self.state = CaptureState::AwaitingCapture;
    }

    pub fn state(&self) -> &CaptureState {
        &self.state
    }

    pub fn signed_url(&self) -> Option<&str> {
        self.signed_url.as_deref()
    }

    /// Apply one event. Returns `true` once the session is resolved.
    pub fn observe(&mut self, event: NetworkEvent) -> bool {
        if self.state.is_terminal() {
            return matches!(self.state, CaptureState::Resolved(_));
        }
        if !self.endpoint.is_match(event.url()) {
            return false;
        }

        match event {
            NetworkEvent::Request { url, .. } => {
                debug!("[CAPTURE] matched request {}", url);
                self.signed_url = Some(url.clone());
                self.state = CaptureState::Resolved(Captured::Request { url });
            }
            NetworkEvent::Response { url, status, body } => {
                if !(200..300).contains(&status) {
                    debug!("[CAPTURE] ignoring response {} with status {}", url, status);
                    return false;
                }
                if self.signed_url.is_none() {
                    self.signed_url = Some(url.clone());
                }
                let images = body.as_deref().map(self.parse_images).unwrap_or_default();
                if images.is_empty() {
                    self.state = CaptureState::Resolved(Captured::Request { url });
                } else {
                    debug!("[CAPTURE] matched response {} with {} images", url, images.len());
                    self.state = CaptureState::Resolved(Captured::Response { url, images });
                }
            }
        }
        true
    }

    /// Consume events until resolved, the channel closes, or `window` elapses.
    pub async fn run(&mut self, window: Duration) -> &CaptureState {
        let deadline = Instant::now() + window;
        self.run_until(deadline).await
    }

    /// Like [`CaptureSession::run`] with an absolute deadline.
    ///
    /// The receiver stays attached if this future is dropped early, so a
    /// session raced against a navigation can be drained afterwards.
    pub async fn run_until(&mut self, deadline: Instant) -> &CaptureState {
        while !self.state.is_terminal() {
            let Some(events) = self.events.as_mut() else {
                self.state = CaptureState::Exhausted;
                break;
            };

            let next = tokio::select! {
                event = events.recv() => Some(event),
                _ = sleep_until(deadline) => None,
            };
            match next {
                Some(Some(event)) => {
                    self.observe(event);
                }
                Some(None) => self.state = CaptureState::Exhausted,
                None => {
                    debug!("[CAPTURE] window elapsed without a match");
                    self.state = CaptureState::Exhausted;
                }
            }
        }
        &self.state
    }

    /// Drain whatever is already buffered without waiting.
    pub fn drain_pending(&mut self) -> &CaptureState {
        if let Some(mut events) = self.events.take() {
            while let Ok(event) = events.try_recv() {
                if self.observe(event) {
                    break;
                }
            }
            self.events = Some(events);
        }
        &self.state
    }
}
