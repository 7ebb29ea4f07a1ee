//! Bounded hand-off queues shared by the in-memory and TCP transports.

use std::time::Duration;

use crossbeam_channel::{
    Receiver, RecvTimeoutError, SendTimeoutError, Sender, TryRecvError, TrySendError,
};
use tracing::debug;

use crate::error::{Result, TransportError};

/// Outcome of handing a message to a bounded queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    Queued,
    /// The queue was full and the sender is non-blocking.
    Dropped,
}

/// Push `item` into `tx`.
///
/// Blocking senders wait for room, failing with `SendTimeout` once `timeout`
/// elapses. Non-blocking senders drop the item when the queue is full.
pub fn enqueue<T>(
    tx: &Sender<T>,
    item: T,
    block: bool,
    timeout: Option<Duration>,
) -> Result<Enqueued> {
    if !block {
        return match tx.try_send(item) {
            Ok(()) => Ok(Enqueued::Queued),
            Err(TrySendError::Full(_)) => {
                debug!("send queue full; dropping message");
                Ok(Enqueued::Dropped)
            }
            Err(TrySendError::Disconnected(_)) => Err(TransportError::Shutdown),
        };
    }

    match timeout {
        Some(timeout) => tx
            .send_timeout(item, timeout)
            .map(|()| Enqueued::Queued)
            .map_err(|err| match err {
                SendTimeoutError::Timeout(_) => TransportError::SendTimeout(timeout),
                SendTimeoutError::Disconnected(_) => TransportError::Shutdown,
            }),
        None => tx
            .send(item)
            .map(|()| Enqueued::Queued)
            .map_err(|_| TransportError::Shutdown),
    }
}

/// Pop the next item, waiting at most `timeout`.
pub fn dequeue<T>(rx: &Receiver<T>, timeout: Option<Duration>) -> Result<T> {
    match timeout {
        Some(timeout) => rx.recv_timeout(timeout).map_err(|err| match err {
            RecvTimeoutError::Timeout => TransportError::ReceiveTimeout(timeout),
            RecvTimeoutError::Disconnected => TransportError::Shutdown,
        }),
        None => rx.recv().map_err(|_| TransportError::Shutdown),
    }
}

/// Pop the next item if one is ready.
pub fn try_dequeue<T>(rx: &Receiver<T>) -> Result<Option<T>> {
    match rx.try_recv() {
        Ok(item) => Ok(Some(item)),
        Err(TryRecvError::Empty) => Ok(None),
        Err(TryRecvError::Disconnected) => Err(TransportError::Shutdown),
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Instant;

    use crossbeam_channel::bounded;

    use super::*;

    #[test]
    fn non_blocking_drops_when_full() {
        let (tx, rx) = bounded(1);
        assert_eq!(enqueue(&tx, 1, false, None).unwrap(), Enqueued::Queued);
        assert_eq!(enqueue(&tx, 2, false, None).unwrap(), Enqueued::Dropped);
        assert_eq!(rx.recv().unwrap(), 1);
        assert!(try_dequeue(&rx).unwrap().is_none());
    }

    #[test]
    fn blocking_with_timeout_fails_when_full() {
        let (tx, _rx) = bounded(1);
        enqueue(&tx, 1, true, Some(Duration::from_millis(5))).unwrap();
        let err = enqueue(&tx, 2, true, Some(Duration::from_millis(5))).unwrap_err();
        assert!(matches!(err, TransportError::SendTimeout(_)));
    }

    #[test]
    fn blocked_sender_wakes_when_room_frees() {
        let (tx, rx) = bounded(1);
        enqueue(&tx, 1, true, None).unwrap();

        let consumer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            let first = rx.recv().unwrap();
            let second = rx.recv().unwrap();
            (first, second)
        });

        let started = Instant::now();
        assert_eq!(
            enqueue(&tx, 2, true, Some(Duration::from_secs(5))).unwrap(),
            Enqueued::Queued
        );
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(consumer.join().unwrap(), (1, 2));
    }

    #[test]
    fn disconnected_receiver_is_shutdown() {
        let (tx, rx) = bounded::<u8>(1);
        drop(rx);
        assert!(matches!(
            enqueue(&tx, 1, true, None),
            Err(TransportError::Shutdown)
        ));
        assert!(matches!(
            enqueue(&tx, 1, true, Some(Duration::from_millis(5))),
            Err(TransportError::Shutdown)
        ));
    }

    #[test]
    fn dequeue_times_out() {
        let (_tx, rx) = bounded::<u8>(1);
        let err = dequeue(&rx, Some(Duration::from_millis(5))).unwrap_err();
        assert!(matches!(err, TransportError::ReceiveTimeout(_)));
    }
}
