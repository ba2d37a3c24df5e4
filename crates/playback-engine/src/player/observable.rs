// crates/playback-engine/src/player/observable.rs
//
// Single-producer many-consumer value cell with publish-if-changed
// semantics (§4.I). Generalizes the teacher's "latest wins" frame_req slot
// (`Mutex<Option<T>> + Condvar`, one consumer) into a fan-out with an
// arbitrary number of subscribers, each with their own queue so a slow
// subscriber never drops updates meant for another.

use std::sync::Mutex;

use crossbeam_channel::{Receiver, Sender};

pub struct Observable<T: Clone + PartialEq> {
    value: Mutex<T>,
    subscribers: Mutex<Vec<Sender<T>>>,
}

impl<T: Clone + PartialEq> Observable<T> {
    pub fn new(initial: T) -> Self {
        Self { value: Mutex::new(initial), subscribers: Mutex::new(Vec::new()) }
    }

    pub fn get(&self) -> T {
        self.value.lock().unwrap().clone()
    }

    /// Publish `new_value` only if it differs from the current value.
    /// Returns whether a publish happened, so callers (the tick loop) can
    /// tell "did currentTime actually change this tick".
    pub fn set(&self, new_value: T) -> bool {
        let mut value = self.value.lock().unwrap();
        if *value == new_value {
            return false;
        }
        *value = new_value.clone();
        drop(value);
        let mut subs = self.subscribers.lock().unwrap();
        subs.retain(|tx| tx.send(new_value.clone()).is_ok());
        true
    }

    /// New subscribers immediately receive the current value so they don't
    /// have to separately call `get()` to avoid missing the first change.
    pub fn subscribe(&self) -> Receiver<T> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let _ = tx.send(self.get());
        self.subscribers.lock().unwrap().push(tx);
        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_is_a_no_op_when_value_is_unchanged() {
        let obs = Observable::new(1);
        assert!(obs.set(2));
        assert!(!obs.set(2));
        assert_eq!(obs.get(), 2);
    }

    #[test]
    fn subscribers_receive_the_current_value_then_updates() {
        let obs = Observable::new(0);
        let rx = obs.subscribe();
        assert_eq!(rx.recv().unwrap(), 0);
        obs.set(5);
        assert_eq!(rx.recv().unwrap(), 5);
    }
}
