//! Publication primitives for values derived lazily from an immutable image.
//!
//! Derived values are computed on first use. Several threads may compute the same value
//! concurrently; exactly one result is published and observed afterwards.

use std::sync::OnceLock;

use crate::{Error, Result};

/// A cell that accepts one value.
///
/// Publishing an equal value again is a no-op, so racing threads that derived the same value
/// from the same bytes all succeed. Publishing a different value fails with
/// [`Error::AlreadyPublished`].
///
/// # Examples
///
/// ```rust
/// use clrmap::utils::SetOnce;
///
/// let cell = SetOnce::new("answer");
/// assert_eq!(*cell.publish(42)?, 42);
/// assert_eq!(*cell.publish(42)?, 42);
/// assert!(cell.publish(7).is_err());
/// # Ok::<(), clrmap::Error>(())
/// ```
#[derive(Debug)]
pub struct SetOnce<T> {
    name: &'static str,
    cell: OnceLock<T>,
}

impl<T: PartialEq> SetOnce<T> {
    /// An empty cell, `name` identifies it in errors
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        SetOnce {
            name,
            cell: OnceLock::new(),
        }
    }

    /// The published value
    pub fn get(&self) -> Option<&T> {
        self.cell.get()
    }

    /// Publish `value`, or confirm that an equal value is already published.
    ///
    /// # Errors
    /// Returns [`Error::AlreadyPublished`] if a different value was published first.
    pub fn publish(&self, value: T) -> Result<&T> {
        if let Err(rejected) = self.cell.set(value) {
            if self.cell.get() != Some(&rejected) {
                log::warn!("Rejected a second, different value for {}", self.name);
                return Err(Error::AlreadyPublished(self.name));
            }
        }

        self.cell.get().ok_or(Error::AlreadyPublished(self.name))
    }

    /// The published value, computing and publishing it with `init` on first use.
    ///
    /// # Errors
    /// Returns the error of `init`, or [`Error::AlreadyPublished`] if a concurrent caller
    /// published a different value.
    pub fn get_or_publish(&self, init: impl FnOnce() -> Result<T>) -> Result<&T> {
        match self.cell.get() {
            Some(value) => Ok(value),
            None => self.publish(init()?),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use super::*;

    #[test]
    fn publish() {
        let cell = SetOnce::new("roots");
        assert!(cell.get().is_none());

        assert_eq!(cell.publish(vec![1, 2]).unwrap(), &vec![1, 2]);
        assert_eq!(cell.publish(vec![1, 2]).unwrap(), &vec![1, 2]);
        assert!(matches!(
            cell.publish(vec![3]),
            Err(Error::AlreadyPublished("roots"))
        ));
        assert_eq!(cell.get(), Some(&vec![1, 2]));
    }

    #[test]
    fn get_or_publish() {
        let cell = SetOnce::new("count");
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value = cell
                .get_or_publish(|| {
                    calls.fetch_add(1, Ordering::Relaxed);
                    Ok(5)
                })
                .unwrap();
            assert_eq!(*value, 5);
        }
        assert_eq!(calls.load(Ordering::Relaxed), 1);

        let failing: SetOnce<u32> = SetOnce::new("failing");
        assert!(failing
            .get_or_publish(|| Err(Error::Empty))
            .is_err());
        assert!(failing.get().is_none());
    }

    #[test]
    fn concurrent() {
        let cell = Arc::new(SetOnce::new("shared"));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cell = Arc::clone(&cell);
                std::thread::spawn(move || *cell.get_or_publish(|| Ok(99_u64)).unwrap())
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), 99);
        }
    }
}
