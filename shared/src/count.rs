//! The strong and weak counts of a control block.

use core::{
    cell::Cell,
    sync::atomic::{self, AtomicUsize, Ordering},
};

/// A reference count with a strong and weak counts.
///
/// The strong count represents the number of strong handles to the control block. The managed object is destroyed
/// when the strong count reaches 0.
///
/// The weak count represents the number of weak handles to the control block, + 1 as long as the strong count is
/// non-zero _or_ the managed object is being destroyed. The control block is deallocated when the weak count reaches 0.
///
/// The extra weak reference collectively held by the strong handles keeps the control block alive while the object
/// is being destroyed, even if its destructor releases the last weak handle.
///
/// #   Safety
///
/// -   Accounting: the strong & weak counts are properly maintained, and `decrement_*` report reaching 0 exactly once.
/// -   Ordering: all accesses to the managed object and control block made prior to a `decrement_*` happen-before
///     the return of the `decrement_*` call which reports reaching 0.
pub(crate) unsafe trait RefCount {
    /// Constructs a reference count.
    ///
    /// A freshly constructed count has a strong & weak counts of exactly 1.
    fn new() -> Self;

    /// Returns the strong count, ie the number of strong handles.
    fn strong_count(&self) -> usize;

    /// Returns the weak count, ie the number of weak handles + 1 if the managed object is still alive.
    fn weak_count(&self) -> usize;

    /// Increments the strong count.
    ///
    /// #   Safety
    ///
    /// -   Accounting: the caller guarantees that the incremented count faithfully represent the number of strong
    ///     handles, and in particular that the strong count is not 0.
    unsafe fn increment_strong(&self);

    /// Tries to increment the strong count, unless it is already zero.
    ///
    /// Returns whether the increment succeeded.
    ///
    /// #   Safety
    ///
    /// -   Accounting: as per `increment_strong`, on success.
    unsafe fn try_increment_strong(&self) -> bool;

    /// Decrements the strong count.
    ///
    /// Returns whether the strong count reached 0, in which case the caller is responsible for destroying the
    /// managed object, then calling `decrement_weak`.
    ///
    /// #   Safety
    ///
    /// -   Accounting: the caller guarantees that the decremented count faithfully represent the number of strong
    ///     handles.
    unsafe fn decrement_strong(&self) -> bool;

    /// Increments the weak count.
    ///
    /// #   Safety
    ///
    /// -   Accounting: the caller guarantees that the incremented count faithfully represent the number of weak
    ///     handles.
    unsafe fn increment_weak(&self);

    /// Decrements the weak count.
    ///
    /// Returns whether the weak count reached 0, in which case the caller is responsible for deallocating the control
    /// block.
    ///
    /// #   Safety
    ///
    /// -   Accounting: the caller guarantees that the decremented count faithfully represent the number of weak
    ///     handles.
    unsafe fn decrement_weak(&self) -> bool;
}

/// Both a strong and a weak reference counts, for use on a single thread.
#[derive(Debug)]
pub(crate) struct LocalCount {
    strong: Cell<usize>,
    weak: Cell<usize>,
}

//  Safety:
//  -   Accounting: properly counted.
//  -   Ordering: single-threaded.
unsafe impl RefCount for LocalCount {
    #[inline(always)]
    fn new() -> Self {
        let strong = Cell::new(1);
        let weak = Cell::new(1);

        Self { strong, weak }
    }

    #[inline(always)]
    fn strong_count(&self) -> usize {
        self.strong.get()
    }

    #[inline(always)]
    fn weak_count(&self) -> usize {
        self.weak.get()
    }

    #[inline(always)]
    unsafe fn increment_strong(&self) {
        debug_assert!(self.strong.get() > 0);

        self.strong.set(self.strong.get() + 1);
    }

    #[inline(always)]
    unsafe fn try_increment_strong(&self) -> bool {
        let strong = self.strong.get();

        if strong == 0 {
            return false;
        }

        self.strong.set(strong + 1);

        true
    }

    #[inline(always)]
    unsafe fn decrement_strong(&self) -> bool {
        let strong = self.strong.get() - 1;
        self.strong.set(strong);

        strong == 0
    }

    #[inline(always)]
    unsafe fn increment_weak(&self) {
        self.weak.set(self.weak.get() + 1);
    }

    #[inline(always)]
    unsafe fn decrement_weak(&self) -> bool {
        let weak = self.weak.get() - 1;
        self.weak.set(weak);

        weak == 0
    }
}

/// Both a strong and a weak reference counts, for use across threads.
#[derive(Debug)]
pub(crate) struct AtomicCount {
    strong: AtomicUsize,
    weak: AtomicUsize,
}

//  Safety:
//  -   Accounting: properly counted.
//  -   Ordering: Release decrements, Acquire fence on reaching 0.
unsafe impl RefCount for AtomicCount {
    #[inline(always)]
    fn new() -> Self {
        let strong = AtomicUsize::new(1);
        let weak = AtomicUsize::new(1);

        Self { strong, weak }
    }

    #[inline(always)]
    fn strong_count(&self) -> usize {
        self.strong.load(Ordering::Relaxed)
    }

    #[inline(always)]
    fn weak_count(&self) -> usize {
        self.weak.load(Ordering::Relaxed)
    }

    #[inline(always)]
    unsafe fn increment_strong(&self) {
        //  Relaxed is sufficient: the caller already holds a strong handle, hence the object cannot be destroyed
        //  concurrently.
        self.strong.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    unsafe fn try_increment_strong(&self) -> bool {
        let mut current = self.strong.load(Ordering::Relaxed);

        //  Once `strong` has dropped to 0, the object has been (or is being) destroyed, there's no recovering it, ever.
        while current > 0 {
            //  Ordering:
            //  -   On success, Acquire is required to synchronize with the writes of the other strong handles.
            //  -   On failure, nothing happens.
            let result = self
                .strong
                .compare_exchange_weak(current, current + 1, Ordering::Acquire, Ordering::Relaxed);

            match result {
                Ok(_) => return true,
                Err(new) => current = new,
            }
        }

        false
    }

    #[inline]
    unsafe fn decrement_strong(&self) -> bool {
        //  Release is necessary so that all reads/writes on the object are done before entering `fetch_sub`,
        //  in order to avoid a data-race with the destruction being invoked on another thread.
        let strong = self.strong.fetch_sub(1, Ordering::Release) - 1;

        if strong > 0 {
            return false;
        }

        //  Atomic - Fence synchronization, so that all reads/writes on the object do not start prior to this point,
        //  in order to avoid a data-race with reads/writes pre-sub on another thread.

        //  The fence by itself is insufficient, a prior load on the atomic object which was written to with the
        //  Release memory ordering is required. Fortunately, `fetch_sub` counts as a load too.
        atomic::fence(Ordering::Acquire);

        true
    }

    #[inline(always)]
    unsafe fn increment_weak(&self) {
        self.weak.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    unsafe fn decrement_weak(&self) -> bool {
        //  Release is necessary so that all reads/writes on the control block are done before entering `fetch_sub`,
        //  in order to avoid a data-race with the deallocation being invoked on another thread.
        let weak = self.weak.fetch_sub(1, Ordering::Release) - 1;

        if weak > 0 {
            return false;
        }

        //  See `decrement_strong`.
        atomic::fence(Ordering::Acquire);

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_lifecycle() {
        lifecycle::<LocalCount>();
    }

    #[test]
    fn atomic_lifecycle() {
        lifecycle::<AtomicCount>();
    }

    #[test]
    fn local_no_resurrection() {
        no_resurrection::<LocalCount>();
    }

    #[test]
    fn atomic_no_resurrection() {
        no_resurrection::<AtomicCount>();
    }

    fn lifecycle<C: RefCount>() {
        let count = C::new();

        assert_eq!(1, count.strong_count());
        assert_eq!(1, count.weak_count());

        //  Safety:
        //  -   Accounting: simulated.
        unsafe {
            count.increment_strong();
            count.increment_weak();

            assert_eq!(2, count.strong_count());
            assert_eq!(2, count.weak_count());

            assert!(!count.decrement_strong());
            assert!(count.decrement_strong());

            assert_eq!(0, count.strong_count());

            assert!(!count.decrement_weak());
            assert!(count.decrement_weak());
        }
    }

    fn no_resurrection<C: RefCount>() {
        let count = C::new();

        //  Safety:
        //  -   Accounting: simulated.
        unsafe {
            assert!(count.try_increment_strong());
            assert_eq!(2, count.strong_count());

            assert!(!count.decrement_strong());
            assert!(count.decrement_strong());

            assert!(!count.try_increment_strong());
            assert_eq!(0, count.strong_count());
        }
    }
} // mod tests
