//! Broadcast channel for cross-component race signals.

use crate::error::EnvError;
use tokio::sync::broadcast;

/// Receiving end handed to presentation layers.
pub type SignalReceiver<E> = broadcast::Receiver<E>;

/// Publish side of the signal channel.
///
/// Replaces a process-wide event bus: the engine publishes to the bus it
/// owns and anyone interested subscribes explicitly.
///
/// ```text
/// Session                  SignalBus                 Listener
///   |-- publish(signal) ------>|                          |
///   |                          |-- clone per receiver --->|
///   |                          |                          |-- recv() -> signal
/// ```
///
/// Dropping the bus closes every receiver, so no listener outlives the
/// session that fed it.
pub struct SignalBus<E> {
    tx: broadcast::Sender<E>,
}

impl<E> SignalBus<E>
where
    E: Clone + std::fmt::Debug,
{
    /// Creates a bus that buffers up to `capacity` undelivered signals per
    /// receiver.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Registers a new listener.
    pub fn subscribe(&self) -> SignalReceiver<E> {
        self.tx.subscribe()
    }

    /// Publishes a signal to every current listener.
    ///
    /// # Returns
    /// * `Ok(n)` - Number of listeners the signal was queued for
    /// * `Err(EnvError::NoListeners)` - Nobody is subscribed
    pub fn publish(&self, signal: E) -> Result<usize, EnvError> {
        self.tx
            .send(signal)
            .map_err(|e| EnvError::no_listeners(format!("{:?}", e.0)))
    }

    /// Returns the number of live listeners.
    pub fn listener_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl<E> Default for SignalBus<E>
where
    E: Clone + std::fmt::Debug,
{
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_without_listeners_fails() {
        let bus: SignalBus<u32> = SignalBus::default();
        let err = bus.publish(3).unwrap_err();
        assert!(matches!(err, EnvError::NoListeners(_)));
    }

    #[test]
    fn test_publish_reaches_every_listener() {
        let bus: SignalBus<u32> = SignalBus::default();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        assert_eq!(bus.publish(2).unwrap(), 2);
        assert_eq!(a.try_recv().unwrap(), 2);
        assert_eq!(b.try_recv().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_dropping_bus_closes_receivers() {
        let bus: SignalBus<u32> = SignalBus::default();
        let mut rx = bus.subscribe();
        drop(bus);

        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Closed)
        ));
    }
}
