//! One-shot readiness latch.
//!
//! Callbacks registered before the signal are queued; the first signal flips
//! the latch and flushes them in registration order. Later signals are
//! no-ops, and callbacks registered after the flip run immediately. Each
//! callback runs at most once either way.

type Callback = Box<dyn FnOnce() + 'static>;

#[derive(Default)]
pub struct ReadyLatch {
    ready: bool,
    pending: Vec<Callback>,
}

impl ReadyLatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Run `callback` once the latch is signalled, or immediately if it
    /// already was.
    pub fn on_ready(&mut self, callback: impl FnOnce() + 'static) {
        if self.ready {
            callback();
        } else {
            self.pending.push(Box::new(callback));
        }
    }

    /// Flip the latch. Only the first call has any effect.
    pub fn signal(&mut self) {
        if self.ready {
            return;
        }
        self.ready = true;
        for callback in self.pending.drain(..) {
            callback();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn queued_callbacks_fire_once_on_first_signal() {
        let mut latch = ReadyLatch::new();
        let fired = Rc::new(Cell::new(0));

        let f = Rc::clone(&fired);
        latch.on_ready(move || f.set(f.get() + 1));
        assert_eq!(fired.get(), 0);

        latch.signal();
        assert_eq!(fired.get(), 1);
        latch.signal();
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn late_registration_runs_immediately() {
        let mut latch = ReadyLatch::new();
        latch.signal();
        let fired = Rc::new(Cell::new(false));
        let f = Rc::clone(&fired);
        latch.on_ready(move || f.set(true));
        assert!(fired.get());
    }
}
