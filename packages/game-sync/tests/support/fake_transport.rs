// In-memory realtime transport driven from the test through a FakeControl.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use game_sync::error::TransportError;
use game_sync::transport::{PresenceAnnouncement, RealtimeTransport, TransportEvent};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::Instant;

#[derive(Default)]
struct Recorded {
    subscribe_at: Vec<Instant>,
    failing: bool,
    hanging: bool,
    unsubscribe_delay: Duration,
    tracked: Vec<PresenceAnnouncement>,
    sent: Vec<(String, Value)>,
    unsubscribes: u32,
}

pub struct FakeTransport {
    recorded: Arc<Mutex<Recorded>>,
    events: mpsc::UnboundedReceiver<TransportEvent>,
}

#[derive(Clone)]
pub struct FakeControl {
    recorded: Arc<Mutex<Recorded>>,
    events: mpsc::UnboundedSender<TransportEvent>,
}

pub fn fake_transport() -> (FakeTransport, FakeControl) {
    let recorded = Arc::new(Mutex::new(Recorded::default()));
    let (tx, rx) = mpsc::unbounded_channel();
    (
        FakeTransport {
            recorded: recorded.clone(),
            events: rx,
        },
        FakeControl {
            recorded,
            events: tx,
        },
    )
}

impl FakeControl {
    pub fn push(&self, event: TransportEvent) {
        self.events.send(event).expect("transport dropped");
    }

    /// Make every subsequent subscribe fail.
    pub fn set_unreachable(&self, failing: bool) {
        self.recorded.lock().unwrap().failing = failing;
    }

    /// Make every subsequent subscribe wait forever.
    pub fn set_hanging(&self, hanging: bool) {
        self.recorded.lock().unwrap().hanging = hanging;
    }

    /// Make unsubscribe take `delay` before it completes.
    pub fn set_unsubscribe_delay(&self, delay: Duration) {
        self.recorded.lock().unwrap().unsubscribe_delay = delay;
    }

    pub fn subscribe_calls(&self) -> usize {
        self.recorded.lock().unwrap().subscribe_at.len()
    }

    pub fn subscribe_times(&self) -> Vec<Instant> {
        self.recorded.lock().unwrap().subscribe_at.clone()
    }

    pub fn tracked(&self) -> Vec<PresenceAnnouncement> {
        self.recorded.lock().unwrap().tracked.clone()
    }

    pub fn sent(&self) -> Vec<(String, Value)> {
        self.recorded.lock().unwrap().sent.clone()
    }

    pub fn unsubscribes(&self) -> u32 {
        self.recorded.lock().unwrap().unsubscribes
    }
}

#[async_trait]
impl RealtimeTransport for FakeTransport {
    async fn subscribe(&mut self, _game_code: &str) -> Result<(), TransportError> {
        let (failing, hanging) = {
            let mut recorded = self.recorded.lock().unwrap();
            recorded.subscribe_at.push(Instant::now());
            (recorded.failing, recorded.hanging)
        };
        if hanging {
            std::future::pending::<()>().await;
        }
        if failing {
            return Err(TransportError::Connect("connection refused".into()));
        }
        Ok(())
    }

    async fn track(&mut self, announcement: &PresenceAnnouncement) -> Result<(), TransportError> {
        self.recorded
            .lock()
            .unwrap()
            .tracked
            .push(announcement.clone());
        Ok(())
    }

    async fn send(&mut self, event: &str, payload: Value) -> Result<(), TransportError> {
        self.recorded
            .lock()
            .unwrap()
            .sent
            .push((event.to_string(), payload));
        Ok(())
    }

    async fn next_event(&mut self) -> TransportEvent {
        match self.events.recv().await {
            Some(event) => event,
            None => std::future::pending().await,
        }
    }

    async fn unsubscribe(&mut self) {
        let delay = self.recorded.lock().unwrap().unsubscribe_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.recorded.lock().unwrap().unsubscribes += 1;
    }
}
