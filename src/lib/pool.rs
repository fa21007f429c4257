//! A fixed set of closable resources, one per destination.
//!
//! Every resource is opened up front and every resource is closed at the end, even
//! when closing an earlier one fails or the work in between returns an error. After
//! an error the resources are aborted instead, which finalizes them without
//! finishing any pending work.

use anyhow::{Result, anyhow};
use log::warn;

use crate::destination::DestinationKey;

/// A resource that must be explicitly finalized.
pub trait Close: Sized {
    /// Finalizes the resource.
    ///
    /// # Errors
    /// Returns an error if flushing or finalizing fails.
    fn close(self) -> Result<()>;

    /// Finalizes the resource after a failure, skipping work that only matters for a
    /// successful run. Defaults to [`Close::close`].
    ///
    /// # Errors
    /// Returns an error if finalizing fails.
    fn abort(self) -> Result<()> {
        self.close()
    }
}

/// Resources indexed by [`DestinationKey`].
pub struct KeyedPool<R: Close> {
    resources: Vec<R>,
}

impl<R: Close> KeyedPool<R> {
    /// Opens one resource per key `0..count`.
    ///
    /// If any open fails, the resources opened so far are closed before the error is
    /// returned.
    ///
    /// # Errors
    /// Returns the first error from `open`.
    pub fn open<F>(count: usize, mut open: F) -> Result<Self>
    where
        F: FnMut(DestinationKey) -> Result<R>,
    {
        let mut resources = Vec::with_capacity(count);
        for i in 0..count {
            match open(DestinationKey(i)) {
                Ok(resource) => resources.push(resource),
                Err(e) => {
                    if let Err(close_err) = (Self { resources }).abort_all() {
                        warn!("Failed to close outputs after open error: {close_err:#}");
                    }
                    return Err(e);
                }
            }
        }
        Ok(Self { resources })
    }

    /// Returns the resource for `key`.
    ///
    /// # Errors
    /// Returns an error if `key` was not opened by this pool.
    pub fn get_mut(&mut self, key: DestinationKey) -> Result<&mut R> {
        let count = self.resources.len();
        self.resources
            .get_mut(key.0)
            .ok_or_else(|| anyhow!("No destination {} (pool has {count})", key.0))
    }

    /// Closes every resource, returning the first error encountered.
    ///
    /// # Errors
    /// Returns the first close error; later errors are logged.
    pub fn close_all(self) -> Result<()> {
        Self::finalize_all(self.resources, R::close)
    }

    /// Aborts every resource, returning the first error encountered.
    ///
    /// # Errors
    /// Returns the first abort error; later errors are logged.
    pub fn abort_all(self) -> Result<()> {
        Self::finalize_all(self.resources, R::abort)
    }

    fn finalize_all(resources: Vec<R>, finalize: fn(R) -> Result<()>) -> Result<()> {
        let mut first_error = None;
        for resource in resources {
            if let Err(e) = finalize(resource) {
                if first_error.is_none() {
                    first_error = Some(e);
                } else {
                    warn!("Additional error while closing outputs: {e:#}");
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Runs `f` with the pool, then closes the pool if `f` succeeded or aborts it if
    /// `f` failed.
    ///
    /// An error from `f` takes precedence over a close error.
    ///
    /// # Errors
    /// Returns the error from `f`, or else the first close error.
    pub fn scoped<T, F>(mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        match f(&mut self) {
            Ok(value) => self.close_all().map(|()| value),
            Err(e) => {
                if let Err(close_err) = self.abort_all() {
                    warn!("Failed to close outputs after error: {close_err:#}");
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Tracked {
        id: usize,
        fail: bool,
        closed: Rc<RefCell<Vec<usize>>>,
        aborted: Rc<RefCell<Vec<usize>>>,
    }

    impl Close for Tracked {
        fn close(self) -> Result<()> {
            self.closed.borrow_mut().push(self.id);
            if self.fail { Err(anyhow!("close {} failed", self.id)) } else { Ok(()) }
        }

        fn abort(self) -> Result<()> {
            self.aborted.borrow_mut().push(self.id);
            if self.fail { Err(anyhow!("abort {} failed", self.id)) } else { Ok(()) }
        }
    }

    fn tracked(id: usize, fail: bool, closed: &Rc<RefCell<Vec<usize>>>) -> Tracked {
        Tracked { id, fail, closed: Rc::clone(closed), aborted: Rc::clone(closed) }
    }

    fn pool(count: usize, failing: &[usize], closed: &Rc<RefCell<Vec<usize>>>) -> KeyedPool<Tracked> {
        KeyedPool::open(count, |key| Ok(tracked(key.0, failing.contains(&key.0), closed))).unwrap()
    }

    #[test]
    fn test_close_all_closes_everything_and_returns_first_error() {
        let closed = Rc::new(RefCell::new(Vec::new()));
        let err = pool(3, &[0, 2], &closed).close_all().unwrap_err();
        assert_eq!(*closed.borrow(), vec![0, 1, 2]);
        assert_eq!(err.to_string(), "close 0 failed");
    }

    #[test]
    fn test_scoped_closes_after_error_and_keeps_it() {
        let closed = Rc::new(RefCell::new(Vec::new()));
        let result: Result<()> = pool(2, &[1], &closed).scoped(|p| {
            p.get_mut(DestinationKey(1))?;
            Err(anyhow!("work failed"))
        });
        assert_eq!(result.unwrap_err().to_string(), "work failed");
        assert_eq!(*closed.borrow(), vec![0, 1]);
    }

    #[test]
    fn test_scoped_aborts_instead_of_closing_after_error() {
        let closed = Rc::new(RefCell::new(Vec::new()));
        let aborted = Rc::new(RefCell::new(Vec::new()));
        let pool = KeyedPool::open(2, |key| {
            Ok(Tracked { id: key.0, fail: false, closed: Rc::clone(&closed), aborted: Rc::clone(&aborted) })
        })
        .unwrap();
        let result: Result<()> = pool.scoped(|_| Err(anyhow!("work failed")));
        assert!(result.is_err());
        assert!(closed.borrow().is_empty());
        assert_eq!(*aborted.borrow(), vec![0, 1]);
    }

    #[test]
    fn test_scoped_reports_close_error_after_success() {
        let closed = Rc::new(RefCell::new(Vec::new()));
        let result = pool(2, &[1], &closed).scoped(|p| Ok(p.resources.len()));
        assert_eq!(result.unwrap_err().to_string(), "close 1 failed");

        let closed = Rc::new(RefCell::new(Vec::new()));
        assert_eq!(pool(2, &[], &closed).scoped(|p| Ok(p.resources.len())).unwrap(), 2);
    }

    #[test]
    fn test_open_failure_closes_opened() {
        let closed = Rc::new(RefCell::new(Vec::new()));
        let result = KeyedPool::open(3, |key| {
            if key.0 == 2 {
                Err(anyhow!("cannot open 2"))
            } else {
                Ok(tracked(key.0, false, &closed))
            }
        });
        assert!(result.is_err());
        assert_eq!(*closed.borrow(), vec![0, 1]);
    }

    #[test]
    fn test_get_mut_unknown_key() {
        let closed = Rc::new(RefCell::new(Vec::new()));
        let mut p = pool(1, &[], &closed);
        assert!(p.get_mut(DestinationKey(5)).is_err());
        assert_eq!(p.get_mut(DestinationKey(0)).unwrap().id, 0);
    }
}
