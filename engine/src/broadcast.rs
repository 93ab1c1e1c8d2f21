//! Synchronous broadcast of the latest value to an ordered set of observers.
//!
//! A [`Subject`] always holds a value. New observers receive it immediately
//! on subscription, then every value pushed with [`Subject::next`], in
//! registration order. Delivery happens inline on the caller's thread; a
//! panicking observer unwinds back into the caller of `next`.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

/// Unique identifier of a registered observer.
pub type ObserverId = u64;

type Observer<T> = Rc<RefCell<dyn FnMut(&T)>>;

struct Inner<T> {
    value: T,
    observers: Vec<(ObserverId, Observer<T>)>,
    next_id: ObserverId,
}

/// Holder of the current value plus its observers.
///
/// Cloning a `Subject` yields another handle to the same value and observer
/// list.
pub struct Subject<T> {
    inner: Rc<RefCell<Inner<T>>>,
}

impl<T> Clone for Subject<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Subject<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Subject")
            .field("value", &inner.value)
            .field("observers", &inner.observers.len())
            .finish()
    }
}

impl<T: Clone + 'static> Subject<T> {
    /// Create a subject holding `value`.
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                value,
                observers: Vec::new(),
                next_id: 0,
            })),
        }
    }

    /// Current value.
    pub fn value(&self) -> T {
        self.inner.borrow().value.clone()
    }

    /// Number of registered observers.
    pub fn observer_count(&self) -> usize {
        self.inner.borrow().observers.len()
    }

    /// Replace the value and notify every current observer.
    ///
    /// Observers registered or removed while delivery is in progress do not
    /// change who receives this value.
    pub fn next(&self, value: T) {
        let observers: Vec<Observer<T>> = {
            let mut inner = self.inner.borrow_mut();
            inner.value = value.clone();
            inner.observers.iter().map(|(_, o)| Rc::clone(o)).collect()
        };

        for observer in observers {
            let mut f = observer.borrow_mut();
            (&mut *f)(&value);
        }
    }

    /// Register an observer and deliver the current value to it.
    pub fn subscribe(&self, observer: impl FnMut(&T) + 'static) -> Subscription {
        let observer: Observer<T> = Rc::new(RefCell::new(observer));
        let (id, current) = {
            let mut inner = self.inner.borrow_mut();
            let id = inner.next_id;
            inner.next_id += 1;
            inner.observers.push((id, Rc::clone(&observer)));
            (id, inner.value.clone())
        };

        {
            let mut f = observer.borrow_mut();
            (&mut *f)(&current);
        }

        let weak: Weak<RefCell<Inner<T>>> = Rc::downgrade(&self.inner);
        Subscription {
            id,
            detach: Some(Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.borrow_mut().observers.retain(|(oid, _)| *oid != id);
                }
            })),
        }
    }
}

/// Handle to a registered observer.
///
/// Dropping the handle leaves the observer registered; call
/// [`Subscription::unsubscribe`] to stop delivery.
#[must_use = "keep the subscription to be able to unsubscribe"]
pub struct Subscription {
    id: ObserverId,
    detach: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    /// Id of the observer behind this handle.
    pub fn id(&self) -> ObserverId {
        self.id
    }

    /// Stop delivering values to the observer.
    pub fn unsubscribe(mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder<T: Clone + 'static>() -> (Rc<RefCell<Vec<T>>>, impl FnMut(&T) + 'static) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        (seen, move |v: &T| sink.borrow_mut().push(v.clone()))
    }

    #[test]
    fn subscribe_receives_current_value() {
        let subject = Subject::new(1);
        let (seen, observer) = recorder();
        let _sub = subject.subscribe(observer);
        assert_eq!(*seen.borrow(), vec![1]);
    }

    #[test]
    fn late_subscriber_gets_only_latest() {
        let subject = Subject::new(1);
        subject.next(2);
        subject.next(3);

        let (seen, observer) = recorder();
        let _sub = subject.subscribe(observer);
        assert_eq!(*seen.borrow(), vec![3]);
    }

    #[test]
    fn delivery_in_registration_order() {
        let subject = Subject::new(0);
        let order = Rc::new(RefCell::new(Vec::new()));

        let a = Rc::clone(&order);
        let _first = subject.subscribe(move |v: &i32| a.borrow_mut().push(("first", *v)));
        let b = Rc::clone(&order);
        let _second = subject.subscribe(move |v: &i32| b.borrow_mut().push(("second", *v)));

        order.borrow_mut().clear();
        subject.next(5);
        assert_eq!(*order.borrow(), vec![("first", 5), ("second", 5)]);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let subject = Subject::new(0);
        let (seen, observer) = recorder();
        let sub = subject.subscribe(observer);

        subject.next(1);
        sub.unsubscribe();
        subject.next(2);

        assert_eq!(*seen.borrow(), vec![0, 1]);
        assert_eq!(subject.observer_count(), 0);
        assert_eq!(subject.value(), 2);
    }

    #[test]
    fn dropping_handle_keeps_observer() {
        let subject = Subject::new(0);
        let (seen, observer) = recorder();
        drop(subject.subscribe(observer));

        subject.next(1);
        assert_eq!(*seen.borrow(), vec![0, 1]);
    }

    #[test]
    fn observer_may_unsubscribe_during_delivery() {
        let subject = Subject::new(0);
        let slot: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));
        let calls = Rc::new(RefCell::new(0));

        let slot_in = Rc::clone(&slot);
        let calls_in = Rc::clone(&calls);
        let sub = subject.subscribe(move |v: &i32| {
            *calls_in.borrow_mut() += 1;
            if *v == 1 {
                if let Some(sub) = slot_in.borrow_mut().take() {
                    sub.unsubscribe();
                }
            }
        });
        *slot.borrow_mut() = Some(sub);

        subject.next(1);
        subject.next(2);
        assert_eq!(*calls.borrow(), 2);
    }
}
