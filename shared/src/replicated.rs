//! Single-writer values with change notification.
//!
//! A [`ReplicatedValue`] lives on every participant. Exactly one copy, the one
//! created with [`Authority::Authoritative`], accepts [`ReplicatedValue::set`];
//! every other copy is a mirror that only changes when the replication layer
//! delivers a value the authority already committed.
//!
//! Writes are staged first and handed to observers when flushed, so a caller
//! that performs several related writes can make them visible together.

use crate::error::CoreError;
use std::collections::VecDeque;

/// Which copy of a value this is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authority {
    /// The single copy that may originate writes.
    Authoritative,
    /// A read-only copy fed by replication.
    Mirror,
}

/// Change handler, called with `(previous, current)`.
pub type Observer<T> = Box<dyn FnMut(&T, &T) + Send>;

pub struct ReplicatedValue<T> {
    current: T,
    previous: T,
    authority: Authority,
    /// Staged writes not yet delivered to observers, oldest first.
    unflushed: VecDeque<(T, T)>,
    observers: Vec<Observer<T>>,
}

impl<T: Clone> ReplicatedValue<T> {
    pub fn new(initial: T, authority: Authority) -> Self {
        Self {
            current: initial.clone(),
            previous: initial,
            authority,
            unflushed: VecDeque::new(),
            observers: Vec::new(),
        }
    }

    pub fn authoritative(initial: T) -> Self {
        Self::new(initial, Authority::Authoritative)
    }

    pub fn mirror(initial: T) -> Self {
        Self::new(initial, Authority::Mirror)
    }

    pub fn get(&self) -> &T {
        &self.current
    }

    /// Value before the most recent write.
    pub fn previous(&self) -> &T {
        &self.previous
    }

    pub fn authority(&self) -> Authority {
        self.authority
    }

    pub fn is_authoritative(&self) -> bool {
        self.authority == Authority::Authoritative
    }

    /// Registers a handler invoked once per write, in commit order.
    pub fn observe<F>(&mut self, observer: F)
    where
        F: FnMut(&T, &T) + Send + 'static,
    {
        self.observers.push(Box::new(observer));
    }

    /// Authoritative write, delivered to observers immediately.
    ///
    /// Fails with [`CoreError::NotAuthorized`] on a mirror and leaves the
    /// value untouched.
    pub fn set(&mut self, value: T) -> Result<(), CoreError> {
        self.stage(value)?;
        self.flush();
        Ok(())
    }

    /// Authoritative write held back until the next flush.
    pub fn stage(&mut self, value: T) -> Result<(), CoreError> {
        if !self.is_authoritative() {
            return Err(CoreError::NotAuthorized {
                operation: "write a mirrored value",
            });
        }
        self.write(value);
        Ok(())
    }

    /// Applies a value that arrived from the authority.
    ///
    /// The authoritative copy never takes values from elsewhere.
    pub fn stage_replicated(&mut self, value: T) -> Result<(), CoreError> {
        if self.is_authoritative() {
            return Err(CoreError::NotAuthorized {
                operation: "overwrite the authoritative value",
            });
        }
        self.write(value);
        Ok(())
    }

    fn write(&mut self, value: T) {
        let previous = std::mem::replace(&mut self.current, value);
        self.previous = previous.clone();
        self.unflushed.push_back((previous, self.current.clone()));
    }

    /// Delivers the oldest staged write and returns it.
    pub fn flush_one(&mut self) -> Option<(T, T)> {
        let (previous, current) = self.unflushed.pop_front()?;
        for observer in self.observers.iter_mut() {
            observer(&previous, &current);
        }
        Some((previous, current))
    }

    /// Delivers every staged write in order.
    pub fn flush(&mut self) {
        while self.flush_one().is_some() {}
    }

    pub fn has_unflushed(&self) -> bool {
        !self.unflushed.is_empty()
    }
}

impl<T: Clone + Default> Default for ReplicatedValue<T> {
    fn default() -> Self {
        Self::mirror(T::default())
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for ReplicatedValue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplicatedValue")
            .field("current", &self.current)
            .field("previous", &self.previous)
            .field("authority", &self.authority)
            .field("observers", &self.observers.len())
            .finish()
    }
}
