//! Subscription Manager: tells the server which region's events this
//! connection wants.
//!
//! The server forgets the client across a drop, so the connector announces
//! immediately after every successful open. A region switch while the
//! connection is open re-announces on the existing sink; the server treats
//! the latest announcement as authoritative, so repeated announcements are
//! harmless.

use futures_util::{Sink, SinkExt};
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::Message;

use crate::protocol::{ProtocolError, Region, SubscribeRequest};

/// Tracks the currently selected region and writes subscribe frames.
///
/// The region itself is owned by the caller (a `watch` channel fed by the
/// session); the manager only observes it.
pub struct SubscriptionManager {
    region_rx: watch::Receiver<Region>,
}

impl SubscriptionManager {
    pub fn new(region_rx: watch::Receiver<Region>) -> Self {
        Self { region_rx }
    }

    /// The latest selected region, marking it seen.
    pub fn current(&mut self) -> Region {
        *self.region_rx.borrow_and_update()
    }

    /// Wait for the selected region to change. Returns `Err` when the
    /// session side has gone away, which the connector treats as shutdown.
    pub async fn changed(&mut self) -> Result<(), watch::error::RecvError> {
        self.region_rx.changed().await
    }

    /// Announce the current region on the given sink. Safe to call any
    /// number of times per connection.
    pub async fn announce<S>(&mut self, sink: &mut S) -> Result<Region, ProtocolError>
    where
        S: Sink<Message> + Unpin,
        S::Error: std::fmt::Display,
    {
        let region = self.current();
        sink.send(Self::frame(region)?)
            .await
            .map_err(|e| ProtocolError::Send(e.to_string()))?;
        log::info!("Announced subscription for region {region}");
        Ok(region)
    }

    /// Build the subscribe frame for a region.
    pub fn frame(region: Region) -> Result<Message, ProtocolError> {
        Ok(Message::Text(SubscribeRequest::new(region).to_json()?.into()))
    }
}
