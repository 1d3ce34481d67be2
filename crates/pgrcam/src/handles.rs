//! Integer-token handle tables
//!
//! The host never sees a native pointer. Sessions and images live in
//! [`HandleTable`]s and cross the boundary as `u64` tokens. Tokens start at 1
//! and are never reused, so a stale token fails lookup instead of reaching
//! whatever was allocated after it.

use std::collections::HashMap;
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use pgrcam_core::{CaptureError, Result};

/// Token-keyed registry of objects owned on behalf of the host.
pub struct HandleTable<T> {
    what: &'static str,
    inner: Mutex<Inner<T>>,
}

struct Inner<T> {
    next: u64,
    entries: HashMap<u64, Arc<Mutex<T>>>,
}

impl<T> HandleTable<T> {
    /// `what` names the handle kind in error messages.
    pub fn new(what: &'static str) -> Self {
        Self {
            what,
            inner: Mutex::new(Inner {
                next: 1,
                entries: HashMap::new(),
            }),
        }
    }

    pub fn insert(&self, value: T) -> u64 {
        let mut inner = self.inner.lock();
        let token = inner.next;
        inner.next += 1;
        inner.entries.insert(token, Arc::new(Mutex::new(value)));
        token
    }

    /// Shared reference to a live entry.
    ///
    /// The table lock is released before the caller locks the entry, so a
    /// slow SDK call on one session never blocks the others.
    pub fn get(&self, token: u64) -> Result<Arc<Mutex<T>>> {
        self.inner
            .lock()
            .entries
            .get(&token)
            .cloned()
            .ok_or_else(|| CaptureError::invalid_handle(self.what, token))
    }

    /// Remove an entry and hand back ownership.
    ///
    /// Waits for any in-flight call on the entry to finish. Once removed no
    /// new references can be handed out, so the wait is bounded.
    pub fn remove(&self, token: u64) -> Result<T> {
        let mut entry = self
            .inner
            .lock()
            .entries
            .remove(&token)
            .ok_or_else(|| CaptureError::invalid_handle(self.what, token))?;
        loop {
            match Arc::try_unwrap(entry) {
                Ok(mutex) => return Ok(mutex.into_inner()),
                Err(shared) => {
                    drop(shared.lock());
                    thread::yield_now();
                    entry = shared;
                }
            }
        }
    }

    pub fn contains(&self, token: u64) -> bool {
        self.inner.lock().entries.contains_key(&token)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pgrcam_core::ErrorKind;

    #[test]
    fn test_tokens_start_at_one_and_are_not_reused() {
        let table = HandleTable::new("session");
        let a = table.insert("a");
        let b = table.insert("b");
        assert_eq!(a, 1);
        assert_eq!(b, 2);
        table.remove(a).unwrap();
        let c = table.insert("c");
        assert_eq!(c, 3);
        assert!(!table.contains(a));
    }

    #[test]
    fn test_stale_token_is_rejected() {
        let table = HandleTable::new("image");
        let token = table.insert(5u32);
        assert_eq!(table.remove(token).unwrap(), 5);

        let err = table.get(token).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Resource);
        assert!(err.to_string().contains("image handle 1"));
        assert!(table.remove(token).is_err());
        assert!(table.get(0).is_err());
    }

    #[test]
    fn test_remove_waits_for_outstanding_reference() {
        let table = Arc::new(HandleTable::new("session"));
        let token = table.insert(vec![1u8]);
        let held = table.get(token).unwrap();

        let worker = {
            let held = Arc::clone(&held);
            thread::spawn(move || {
                held.lock().push(2);
            })
        };
        drop(held);
        worker.join().unwrap();

        assert_eq!(table.remove(token).unwrap(), vec![1, 2]);
        assert!(table.is_empty());
    }
}
