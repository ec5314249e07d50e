use std::sync::{PoisonError, RwLock};

/// A value behind a reader/writer lock that can only be touched through
/// closures.
///
/// Readers share the lock, writers get it exclusively, and no guard ever
/// escapes a call. Composite state stored in one cell is therefore always
/// observed as a whole: a writer replaces it in one critical section and a
/// reader sees it either before or after, never half way.
#[derive(Debug, Default)]
pub struct GuardedCell<T> {
    inner: RwLock<T>,
}

impl<T> GuardedCell<T> {
    #[must_use]
    pub const fn new(value: T) -> Self {
        Self {
            inner: RwLock::new(value),
        }
    }

    /// Run `f` under the shared lock.
    pub fn read_with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        // Writers only ever store complete values, so a poisoned lock still
        // holds a consistent one.
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    /// Run `f` under the exclusive lock.
    pub fn write_with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// Swap in `value`, returning what was stored before.
    pub fn replace(&self, value: T) -> T {
        self.write_with(|slot| std::mem::replace(slot, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_replace_returns_previous() {
        let cell = GuardedCell::new(1);
        assert_eq!(cell.replace(2), 1);
        assert_eq!(cell.read_with(|value| *value), 2);
    }

    #[test]
    fn test_pairs_are_never_torn() {
        let cell = Arc::new(GuardedCell::new((0_u64, 0_u64)));

        let writer = {
            let cell = cell.clone();
            thread::spawn(move || {
                for i in 1..=10_000 {
                    cell.replace((i, i * 2));
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let cell = cell.clone();
                thread::spawn(move || {
                    for _ in 0..10_000 {
                        let (a, b) = cell.read_with(|pair| *pair);
                        assert_eq!(b, a * 2);
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
    }
}
