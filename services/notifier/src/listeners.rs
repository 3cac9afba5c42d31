//! Callback registry for notification events
//!
//! Subscribing returns a [`ListenerHandle`]; dropping the handle removes the
//! callback.

use std::sync::{
    Arc, Mutex, PoisonError, Weak,
    atomic::{AtomicU64, Ordering},
};

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Registry<T> {
    next_id: AtomicU64,
    callbacks: Mutex<Vec<(u64, Callback<T>)>>,
}

pub struct ListenerRegistry<T> {
    inner: Arc<Registry<T>>,
}

impl<T: 'static> ListenerRegistry<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Registry {
                next_id: AtomicU64::new(0),
                callbacks: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn subscribe(&self, callback: impl Fn(&T) + Send + Sync + 'static) -> ListenerHandle {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(callback)));

        let registry: Weak<Registry<T>> = Arc::downgrade(&self.inner);
        ListenerHandle {
            release: Some(Box::new(move || {
                if let Some(registry) = registry.upgrade() {
                    registry
                        .callbacks
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .retain(|(existing, _)| *existing != id);
                }
            })),
        }
    }

    /// Invoke every registered callback with `value`
    pub fn emit(&self, value: &T) {
        // Callbacks run outside the lock so they may subscribe or unsubscribe.
        let callbacks: Vec<Callback<T>> = self
            .inner
            .callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, cb)| cb.clone())
            .collect();

        for callback in callbacks {
            callback(value);
        }
    }

    pub fn len(&self) -> usize {
        self.inner
            .callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: 'static> Default for ListenerRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for ListenerRegistry<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

/// Disposer for a registered callback
#[must_use = "dropping the handle unsubscribes the callback"]
pub struct ListenerHandle {
    release: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl ListenerHandle {
    /// Unsubscribe now instead of at drop
    pub fn unsubscribe(mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn emit_reaches_every_subscriber() {
        let registry = ListenerRegistry::<u32>::new();
        let total = Arc::new(AtomicUsize::new(0));

        let t1 = total.clone();
        let _a = registry.subscribe(move |v| {
            t1.fetch_add(*v as usize, Ordering::SeqCst);
        });
        let t2 = total.clone();
        let _b = registry.subscribe(move |v| {
            t2.fetch_add(*v as usize, Ordering::SeqCst);
        });

        registry.emit(&5);
        assert_eq!(total.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn dropping_handle_unsubscribes() {
        let registry = ListenerRegistry::<()>::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let h = hits.clone();
        let handle = registry.subscribe(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(registry.len(), 1);

        drop(handle);
        registry.emit(&());

        assert!(registry.is_empty());
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn handle_outliving_registry_is_harmless() {
        let registry = ListenerRegistry::<()>::new();
        let handle = registry.subscribe(|_| {});
        drop(registry);
        handle.unsubscribe();
    }
}
