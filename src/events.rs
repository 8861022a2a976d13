//! Typed observer lists used by the UI components to publish changes.
//!
//! Every component event supports any number of subscribers. Subscribers
//! run synchronously, in subscription order, on the emitting thread.

use std::fmt;
use std::sync::mpsc::Sender;

type Handler<E> = Box<dyn FnMut(&E)>;

/// Multi-subscriber list of handlers for one event type
pub struct Listeners<E> {
    handlers: Vec<Handler<E>>,
}

impl<E> Default for Listeners<E> {
    fn default() -> Self {
        Listeners {
            handlers: Vec::new(),
        }
    }
}

impl<E> fmt::Debug for Listeners<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("subscribers", &self.handlers.len())
            .finish()
    }
}

impl<E> Listeners<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, handler: impl FnMut(&E) + 'static) {
        self.handlers.push(Box::new(handler));
    }

    pub fn emit(&mut self, event: &E) {
        for handler in &mut self.handlers {
            handler(event);
        }
    }

    #[allow(dead_code)] // Used in tests
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[allow(dead_code)] // Used in tests
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn clear(&mut self) {
        self.handlers.clear();
    }
}

impl<E: Clone + 'static> Listeners<E> {
    /// Forward every event into a channel, mapped into the receiver's type.
    ///
    /// Sends after the receiver is gone are dropped.
    pub fn forward<T: 'static>(&mut self, tx: Sender<T>, map: impl Fn(E) -> T + 'static) {
        self.subscribe(move |event: &E| {
            let _ = tx.send(map(event.clone()));
        });
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::sync::mpsc;

    use super::*;

    #[test]
    fn test_every_subscriber_receives_event() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut listeners: Listeners<i32> = Listeners::new();

        let a = Rc::clone(&seen);
        listeners.subscribe(move |v| a.borrow_mut().push(("a", *v)));
        let b = Rc::clone(&seen);
        listeners.subscribe(move |v| b.borrow_mut().push(("b", *v)));

        listeners.emit(&7);
        assert_eq!(*seen.borrow(), vec![("a", 7), ("b", 7)]);
        assert_eq!(listeners.len(), 2);
    }

    #[test]
    fn test_clear_removes_subscribers() {
        let mut listeners: Listeners<()> = Listeners::new();
        listeners.subscribe(|_| panic!("should not be called"));
        listeners.clear();
        assert!(listeners.is_empty());
        listeners.emit(&());
    }

    #[test]
    fn test_forward_maps_into_channel() {
        let (tx, rx) = mpsc::channel();
        let mut listeners: Listeners<i32> = Listeners::new();
        listeners.forward(tx, |v| format!("year {v}"));
        listeners.emit(&2001);
        assert_eq!(rx.try_recv().unwrap(), "year 2001");
    }
}
