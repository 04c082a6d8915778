//! Bounded FIFO queue shared by the producer, the workers, and the
//! autoscaler's occupancy probe.
//!
//! Backed by a multi-consumer [`async_channel`] so any number of workers
//! can compete for items. `send` suspends while the queue is full, which is
//! the pipeline's only backpressure primitive; nothing is ever dropped.
//!
//! `len`, `capacity` and `usage` are advisory snapshots. They feed pacing
//! and scaling heuristics and must never be used for correctness.

use async_channel::{Receiver, Sender};

use crate::error::QueueError;

/// Owning handle to the queue. Cheap to clone.
///
/// Only this handle can close the queue; producers and workers get the
/// narrower [`QueueSender`] / [`QueueReceiver`] views.
#[derive(Debug)]
pub struct BoundedQueue<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
}

impl<T> Clone for BoundedQueue<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            rx: self.rx.clone(),
        }
    }
}

impl<T> BoundedQueue<T> {
    pub fn new(capacity: usize) -> Result<Self, QueueError> {
        if capacity == 0 {
            return Err(QueueError::ZeroCapacity);
        }
        let (tx, rx) = async_channel::bounded(capacity);
        Ok(Self { tx, rx })
    }

    pub fn sender(&self) -> QueueSender<T> {
        QueueSender {
            tx: self.tx.clone(),
        }
    }

    pub fn receiver(&self) -> QueueReceiver<T> {
        QueueReceiver {
            rx: self.rx.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.tx.capacity().unwrap_or(usize::MAX)
    }

    /// Fill ratio in `[0, 1]`.
    pub fn usage(&self) -> f64 {
        usage(self.len(), self.capacity())
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Close the queue. Buffered items stay receivable; once they are
    /// drained every `recv` returns `None`.
    ///
    /// Must be called exactly once, after the producer has stopped.
    pub fn close(&self) -> Result<(), QueueError> {
        if self.tx.close() {
            Ok(())
        } else {
            Err(QueueError::AlreadyClosed)
        }
    }
}

/// Send half handed to the producer.
#[derive(Debug)]
pub struct QueueSender<T> {
    tx: Sender<T>,
}

impl<T> Clone for QueueSender<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> QueueSender<T> {
    /// Enqueue an item, suspending while the queue is full.
    pub async fn send(&self, item: T) -> Result<(), QueueError> {
        self.tx.send(item).await.map_err(|_| QueueError::Closed)
    }

    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.tx.capacity().unwrap_or(usize::MAX)
    }

    pub fn usage(&self) -> f64 {
        usage(self.len(), self.capacity())
    }
}

/// Receive half handed to each worker.
#[derive(Debug)]
pub struct QueueReceiver<T> {
    rx: Receiver<T>,
}

impl<T> Clone for QueueReceiver<T> {
    fn clone(&self) -> Self {
        Self {
            rx: self.rx.clone(),
        }
    }
}

impl<T> QueueReceiver<T> {
    /// Wait for the next item. Returns `None` once the queue is closed and
    /// drained. Cancel-safe: dropping the future never loses an item.
    pub async fn recv(&self) -> Option<T> {
        self.rx.recv().await.ok()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

fn usage(len: usize, capacity: usize) -> f64 {
    if capacity == 0 {
        return 0.0;
    }
    len as f64 / capacity as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_capacity_rejected() {
        assert_eq!(
            BoundedQueue::<u32>::new(0).unwrap_err(),
            QueueError::ZeroCapacity
        );
    }

    #[tokio::test]
    async fn fifo_order_and_occupancy() {
        let queue = BoundedQueue::new(4).unwrap();
        let tx = queue.sender();
        let rx = queue.receiver();

        tx.send(1).await.unwrap();
        tx.send(2).await.unwrap();
        tx.send(3).await.unwrap();

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.capacity(), 4);
        assert_eq!(queue.usage(), 0.75);

        assert_eq!(rx.recv().await, Some(1));
        assert_eq!(rx.recv().await, Some(2));
        assert_eq!(rx.recv().await, Some(3));
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn send_blocks_while_full() {
        let queue = BoundedQueue::new(1).unwrap();
        let tx = queue.sender();
        tx.send(1).await.unwrap();

        let blocked = tokio::time::timeout(std::time::Duration::from_millis(20), tx.send(2)).await;
        assert!(blocked.is_err(), "send should wait for free capacity");

        assert_eq!(queue.receiver().recv().await, Some(1));
        tx.send(2).await.unwrap();
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn close_drains_then_ends() {
        let queue = BoundedQueue::new(4).unwrap();
        let tx = queue.sender();
        let rx = queue.receiver();
        tx.send("a").await.unwrap();
        tx.send("b").await.unwrap();

        queue.close().unwrap();
        assert!(queue.is_closed());
        assert_eq!(tx.send("c").await, Err(QueueError::Closed));

        assert_eq!(rx.recv().await, Some("a"));
        assert_eq!(rx.recv().await, Some("b"));
        assert_eq!(rx.recv().await, None);
    }

    #[test]
    fn double_close_is_reported() {
        let queue = BoundedQueue::<u8>::new(2).unwrap();
        queue.close().unwrap();
        assert_eq!(queue.close(), Err(QueueError::AlreadyClosed));
    }

    #[tokio::test]
    async fn competing_receivers_each_get_distinct_items() {
        let queue = BoundedQueue::new(8).unwrap();
        let tx = queue.sender();
        for i in 0..8 {
            tx.send(i).await.unwrap();
        }
        queue.close().unwrap();

        let a = queue.receiver();
        let b = queue.receiver();
        let mut seen = Vec::new();
        loop {
            match (a.recv().await, b.recv().await) {
                (None, None) => break,
                (x, y) => seen.extend(x.into_iter().chain(y)),
            }
        }
        seen.sort_unstable();
        assert_eq!(seen, (0..8).collect::<Vec<_>>());
    }
}
