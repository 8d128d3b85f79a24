//! Keyed de-duplication of concurrent work
//!
//! While a call for a key is in flight, later calls for the same key wait for
//! it and receive a clone of its result instead of running their own work.
//! Each group is an ordinary value: share one through an `Arc` to coordinate
//! callers, or create a fresh one to isolate them.

use std::collections::HashMap;
use std::future::Future;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::trace;

/// Result of [`SingleFlight::run`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome<T> {
    pub value: T,
    /// True when the value came from another caller's flight
    pub shared: bool,
}

/// A group of keyed in-flight calls
#[derive(Debug)]
pub struct SingleFlight<T> {
    flights: Mutex<HashMap<String, watch::Receiver<Option<T>>>>,
}

impl<T> Default for SingleFlight<T> {
    fn default() -> Self {
        Self {
            flights: Mutex::new(HashMap::new()),
        }
    }
}

enum Role<T> {
    Leader(watch::Sender<Option<T>>),
    Follower(watch::Receiver<Option<T>>),
}

/// Removes the flight when the leader finishes or is dropped mid-way
struct Flight<'a, T> {
    flights: &'a Mutex<HashMap<String, watch::Receiver<Option<T>>>>,
    key: &'a str,
    tx: watch::Sender<Option<T>>,
}

impl<T> Drop for Flight<'_, T> {
    fn drop(&mut self) {
        self.flights.lock().remove(self.key);
    }
}

impl<T: Clone> SingleFlight<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `work` unless a call for `key` is already in flight
    ///
    /// The first caller for a key (the leader) drives its own `work`; callers
    /// arriving while it runs drop theirs and wait for the leader's value. If
    /// the leader is cancelled before finishing, one waiter takes over with
    /// its own `work`.
    pub async fn run<F>(&self, key: &str, work: F) -> Outcome<T>
    where
        F: Future<Output = T>,
    {
        let tx = loop {
            let mut rx = match self.join(key) {
                Role::Leader(tx) => break tx,
                Role::Follower(rx) => rx,
            };

            trace!(key = key, "Waiting on in-flight call");
            if let Ok(value) = rx.wait_for(Option::is_some).await {
                if let Some(value) = &*value {
                    return Outcome {
                        value: value.clone(),
                        shared: true,
                    };
                }
            }
            trace!(key = key, "In-flight call was abandoned, retrying");
        };

        let flight = Flight {
            flights: &self.flights,
            key,
            tx,
        };
        let value = work.await;
        flight.tx.send_replace(Some(value.clone()));
        drop(flight);

        Outcome {
            value,
            shared: false,
        }
    }

    fn join(&self, key: &str) -> Role<T> {
        let mut flights = self.flights.lock();
        match flights.get(key) {
            Some(rx) => Role::Follower(rx.clone()),
            None => {
                let (tx, rx) = watch::channel(None);
                flights.insert(key.to_string(), rx);
                Role::Leader(tx)
            }
        }
    }

    /// Number of keys currently in flight
    pub fn in_flight(&self) -> usize {
        self.flights.lock().len()
    }
}
