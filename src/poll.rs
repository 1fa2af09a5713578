//! The measurement polling loop and its channel contract.
//!
//! One long-lived task cycles through provisioning, connectivity gating,
//! measurement and publication, then sleeps. Iterations never overlap: a
//! cycle runs to completion, including its sleep, before the next begins.

use crate::config::MonitorConfig;
use crate::connectivity::Connectivity;
use crate::error::{Result, SpeedwatchError};
use crate::speedtest::data::Measurement;
use crate::speedtest::provision::Provisioner;
use crate::speedtest::runner::MeasurementSource;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info};

const REQUEST_QUEUE: usize = 16;
const EVENT_QUEUE: usize = 16;

/// Inbound control messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    /// Ask for an immediate publish of the current measurement.
    GetData,
}

/// Outbound events for display collaborators.
#[derive(Debug, Clone)]
pub enum Event {
    /// The current measurement, sent once per loop iteration and once per
    /// [`Request::GetData`].
    DataUpdated(Measurement),
}

/// Client-side handle to a running [`PollingLoop`].
#[derive(Clone)]
pub struct MonitorHandle {
    requests: mpsc::Sender<Request>,
    events: broadcast::Sender<Event>,
}

impl MonitorHandle {
    /// Subscribe to measurement events.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    /// Ask the loop to publish its current measurement. Fire-and-forget; the
    /// answer arrives as an [`Event::DataUpdated`] on every subscription.
    pub async fn request_data(&self) {
        let _ = self.requests.send(Request::GetData).await;
    }
}

/// The orchestrator: provision, gate on connectivity, measure, publish,
/// sleep, repeat.
pub struct PollingLoop<C, M> {
    connectivity: C,
    provisioner: Provisioner,
    source: M,
    current: Measurement,
    success_interval: Duration,
    retry_delay: Duration,
    requests: mpsc::Receiver<Request>,
    requests_open: bool,
    events: broadcast::Sender<Event>,
}

impl<C, M> PollingLoop<C, M>
where
    C: Connectivity + Send,
    M: MeasurementSource + Send,
{
    /// Build a loop and the handle used to talk to it.
    pub fn new(config: &MonitorConfig, connectivity: C, source: M) -> (Self, MonitorHandle) {
        let (request_tx, request_rx) = mpsc::channel(REQUEST_QUEUE);
        let (event_tx, _) = broadcast::channel(EVENT_QUEUE);
        let handle = MonitorHandle {
            requests: request_tx,
            events: event_tx.clone(),
        };
        let poll = Self {
            connectivity,
            provisioner: Provisioner::new(config),
            source,
            current: Measurement::placeholder(),
            success_interval: config.success_interval(),
            retry_delay: config.retry_delay(),
            requests: request_rx,
            requests_open: true,
            events: event_tx,
        };
        (poll, handle)
    }

    /// Run forever. Every iteration publishes exactly once and then sleeps
    /// the long interval on success or the short delay on any failure; no
    /// error ends the loop.
    pub async fn run(mut self) {
        info!("measurement loop started");
        loop {
            let outcome = self.cycle().await;
            match &outcome {
                Ok(()) => info!(
                    "measurement complete: ping {} ms, down {} MB/s, up {} MB/s",
                    self.current.ping_display(),
                    self.current.download_display(),
                    self.current.upload_display()
                ),
                // being offline is ordinary, not worth a log line
                Err(err) if err.is_offline() => {}
                Err(err) => error!("measurement failed: {}", err),
            }
            self.publish();
            let delay = self.delay_for(&outcome);
            self.sleep(delay).await;
        }
    }

    /// One pass through provisioning, the connectivity gate and the tool.
    ///
    /// The cached connectivity flag short-circuits without touching the
    /// current measurement. The flag may be stale even when it reads online,
    /// so one fresh probe runs right before the tool; a failure there also
    /// invalidates whatever was last displayed.
    pub async fn cycle(&mut self) -> Result<()> {
        self.provisioner.ensure_with_retry().await;
        if !self.connectivity.current_status() {
            return Err(SpeedwatchError::Offline);
        }
        if !self.connectivity.check_now().await {
            self.current = Measurement::placeholder();
            return Err(SpeedwatchError::Offline);
        }
        info!("starting speed measurement");
        let report = self.source.measure().await?;
        self.current = Measurement::from_report(&report);
        Ok(())
    }

    /// Long interval after success, short retry delay after any failure.
    pub fn delay_for(&self, outcome: &Result<()>) -> Duration {
        if outcome.is_ok() {
            self.success_interval
        } else {
            self.retry_delay
        }
    }

    /// The measurement the loop currently holds.
    pub fn current(&self) -> &Measurement {
        &self.current
    }

    /// At-most-once delivery to whoever subscribed; nobody listening is fine.
    fn publish(&self) {
        let _ = self.events.send(Event::DataUpdated(self.current.clone()));
    }

    /// Sleep the full delay, answering data requests as they arrive.
    async fn sleep(&mut self, delay: Duration) {
        let timer = tokio::time::sleep(delay);
        tokio::pin!(timer);
        loop {
            tokio::select! {
                _ = &mut timer => break,
                request = self.requests.recv(), if self.requests_open => match request {
                    Some(Request::GetData) => self.publish(),
                    None => self.requests_open = false,
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_roundtrip_types() {
        assert_eq!(Request::GetData, Request::GetData);
        let event = Event::DataUpdated(Measurement::placeholder());
        let Event::DataUpdated(measurement) = event;
        assert!(!measurement.connected);
    }
}
