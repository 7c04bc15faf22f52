//! Broadcast channel for pool events.

use bridge_types::PoolEvent;
use tokio::sync::broadcast;

/// Fan-out of [`PoolEvent`]s to any number of subscribers.
///
/// Publishing never blocks; slow subscribers observe a lag error and skip
/// ahead.
#[derive(Clone)]
pub struct EventBus {
	sender: broadcast::Sender<PoolEvent>,
}

impl EventBus {
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	pub fn subscribe(&self) -> broadcast::Receiver<PoolEvent> {
		self.sender.subscribe()
	}

	/// Publishes an event. Fails only when nobody is subscribed.
	pub fn publish(&self, event: PoolEvent) -> Result<(), broadcast::error::SendError<PoolEvent>> {
		self.sender.send(event)?;
		Ok(())
	}
}
