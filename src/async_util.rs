use std::pin::Pin;
use std::sync::Arc;
use std::task;
use std::time::Duration;

use async_broadcast::{InactiveReceiver, Sender};
use async_lock::{Mutex, MutexGuardArc};
use futures_core::Stream;
use futures_lite::FutureExt;
use futures_timer::Delay;

/// Reusable exclusive register for `ExcluderLock`.
///
/// Holds the gate that serializes one kind of operation and the response slot the "foreign" completion callback
/// resolves. At most one sender sits in the slot, and `unlock` takes it out, so a waiter is signalled at most once.
pub struct Excluder<T: Send> {
    gate: Arc<Mutex<()>>,
    pending: Mutex<Option<async_channel::Sender<T>>>,
}

/// Prevents other tasks from doing the same operation before the corresponding
/// "foreign" callback is received by the current task. Unlocks on dropping.
pub struct ExcluderLock<'a, T: Send> {
    _gate: MutexGuardArc<()>,
    receiver: async_channel::Receiver<T>,
    excluder: &'a Excluder<T>,
}

/// How a wait phase ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Wake<T> {
    /// The completion callback delivered a value
    Completed(T),
    /// The connection the operation was issued on ended first
    Ended,
    /// The configured timeout expired first
    TimedOut,
}

impl<T: Send> Excluder<T> {
    /// Creates a new unlocked `Excluder`.
    pub fn new() -> Self {
        Self {
            gate: Arc::new(Mutex::new(())),
            pending: Mutex::new(None),
        }
    }

    /// Checks if the excluder is locked.
    #[allow(unused)]
    pub fn is_locked(&self) -> bool {
        self.gate.try_lock().is_none()
    }

    /// Waits until the excluder is unlocked, locks it and arms a fresh response slot.
    /// Call this right before calling a method that will produce a "foreign" callback;
    /// after calling that method, call [ExcluderLock::wait_unlock] in the same task.
    pub async fn lock(&self) -> ExcluderLock<'_, T> {
        let gate = self.gate.lock_arc().await;
        // arm before the operation is issued, so a callback racing the issuing call is not lost.
        let (sender, receiver) = async_channel::bounded(1);
        *self.pending.lock().await = Some(sender);
        ExcluderLock {
            _gate: gate,
            receiver,
            excluder: self,
        }
    }

    /// Sends the "completed" signal from the "foreign" callback.
    ///
    /// Returns `false` when nobody was waiting; the value is dropped in that case.
    pub fn unlock(&self, result: T) -> bool {
        let sender = self.pending.lock_blocking().take();
        match sender {
            Some(sender) => sender.try_send(result).is_ok(),
            None => false,
        }
    }
}

impl<T: Send> Default for Excluder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send> ExcluderLock<'_, T> {
    /// Waits until the "foreign" callback sends its value.
    /// Returns `None` if the response slot was disarmed without a value.
    pub async fn wait_unlock(&self) -> Option<T> {
        self.receiver.recv().await.ok()
    }

    /// Waits for the callback, the end of `lifecycle`, or `timeout`, whichever comes first.
    pub async fn wait_unlock_until(self, lifecycle: &Lifecycle, timeout: Option<Duration>) -> Wake<T> {
        let completed = async {
            match self.wait_unlock().await {
                Some(value) => Wake::Completed(value),
                None => Wake::Ended,
            }
        };
        let ended = async {
            lifecycle.ended().await;
            Wake::Ended
        };
        let raced = completed.or(ended);
        match timeout {
            Some(timeout) => {
                raced
                    .or(async {
                        Delay::new(timeout).await;
                        Wake::TimedOut
                    })
                    .await
            }
            None => raced.await,
        }
    }
}

impl<T: Send> Drop for ExcluderLock<'_, T> {
    fn drop(&mut self) {
        // the gate is still held, so whatever sits in the slot belongs to this lock.
        // disarm it so a late callback for this operation cannot resolve the next one.
        let _ = self.excluder.pending.lock_blocking().take();
    }
}

/// A one-way "this session is over" signal scoped to a connection.
///
/// Nothing is ever broadcast through the channel; closing the sender wakes every receiver at once.
pub struct Lifecycle {
    sender: Sender<()>,
    receiver: InactiveReceiver<()>,
}

impl Lifecycle {
    pub fn new() -> Self {
        let (sender, receiver) = async_broadcast::broadcast(1);
        Self {
            sender,
            receiver: receiver.deactivate(),
        }
    }

    /// Ends the lifecycle. Returns `true` only for the call that actually ended it.
    pub fn end(&self) -> bool {
        self.sender.close()
    }

    pub fn is_ended(&self) -> bool {
        self.sender.is_closed()
    }

    /// Resolves once [`Lifecycle::end`] has been called, immediately if it already was.
    pub async fn ended(&self) {
        let mut receiver = self.receiver.activate_cloned();
        while receiver.recv().await.is_ok() {}
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

/// A subscription slot holding at most one listener. Subscribing replaces (and ends) the previous listener.
pub struct EventSlot<T: Send> {
    capacity: Option<usize>,
    sender: Mutex<Option<async_channel::Sender<T>>>,
}

impl<T: Send> EventSlot<T> {
    /// A slot whose stream buffers without limit.
    pub fn unbounded() -> Self {
        Self {
            capacity: None,
            sender: Mutex::new(None),
        }
    }

    /// A slot whose stream holds at most `capacity` undelivered items; further items are dropped.
    pub fn bounded(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            sender: Mutex::new(None),
        }
    }

    /// Installs a new listener and returns its stream.
    pub fn subscribe(&self) -> EventStream<T> {
        let (sender, receiver) = match self.capacity {
            Some(capacity) => async_channel::bounded(capacity),
            None => async_channel::unbounded(),
        };
        // the replaced sender is dropped here, which ends the previous listener's stream.
        let _ = self.sender.lock_blocking().replace(sender);
        EventStream {
            receiver: Box::pin(receiver),
        }
    }

    /// Removes the current listener, ending its stream.
    pub fn unsubscribe(&self) {
        let _ = self.sender.lock_blocking().take();
    }

    pub fn is_subscribed(&self) -> bool {
        self.sender
            .lock_blocking()
            .as_ref()
            .is_some_and(|sender| !sender.is_closed())
    }

    /// Delivers `value` to the current listener. Returns `false` if it was dropped.
    pub fn send(&self, value: T) -> bool {
        let mut guard = self.sender.lock_blocking();
        let Some(sender) = guard.as_ref() else {
            return false;
        };
        match sender.try_send(value) {
            Ok(()) => true,
            Err(async_channel::TrySendError::Full(_)) => false,
            Err(async_channel::TrySendError::Closed(_)) => {
                // the listener went away without unsubscribing.
                *guard = None;
                false
            }
        }
    }
}

/// A stream of events from a single-slot subscription. Ends when a newer subscriber replaces it.
pub struct EventStream<T> {
    receiver: Pin<Box<async_channel::Receiver<T>>>,
}

impl<T> Stream for EventStream<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut task::Context<'_>) -> task::Poll<Option<T>> {
        self.receiver.as_mut().poll_next(cx)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.receiver.size_hint()
    }
}

impl<T> std::fmt::Debug for EventStream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStream").field("pending", &self.receiver.len()).finish()
    }
}
