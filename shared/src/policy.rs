//! Destruction policies, ie how the managed object is destroyed once the last strong handle lets go.
//!
//! The policy is moved into the control block on construction, and lives there until the control block itself is
//! deallocated, so that all handles sharing a control block share the same policy.

use core::ptr::NonNull;

use alloc::boxed::Box;

/// Destroys the managed object.
///
/// Any `Fn(NonNull<T>)` is a policy, which allows using closures directly.
pub trait DestructionPolicy<T>
where
    T: ?Sized,
{
    /// Runs the destructor of `object`, and releases its storage.
    ///
    /// #   Safety
    ///
    /// -   Valid: `object` points to a live `T`.
    /// -   Compatible: `object` was allocated in a manner this policy knows how to release.
    /// -   EndOfLife: `object` is exclusively owned by the caller, and is never accessed again after this call.
    unsafe fn destroy(&self, object: NonNull<T>);
}

/// The default policy: the object is a `Box<T>`, and is released as such.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DefaultDelete;

impl<T> DestructionPolicy<T> for DefaultDelete
where
    T: ?Sized,
{
    #[inline]
    unsafe fn destroy(&self, object: NonNull<T>) {
        //  Safety:
        //  -   Compatible: `object` was allocated as a `Box<T>`, as per pre-condition.
        //  -   EndOfLife: as per pre-condition.
        let object = unsafe { Box::from_raw(object.as_ptr()) };

        drop(object);
    }
}

impl<T, F> DestructionPolicy<T> for F
where
    T: ?Sized,
    F: Fn(NonNull<T>),
{
    #[inline]
    unsafe fn destroy(&self, object: NonNull<T>) {
        self(object)
    }
}

#[cfg(test)]
mod tests {
    use core::cell::Cell;

    use std::rc::Rc;

    use super::*;

    #[test]
    fn default_delete_drops() {
        let dropped = Rc::new(Cell::new(0));

        let object = Box::new(Tracked(dropped.clone()));
        let object = NonNull::from(Box::leak(object));

        //  Safety:
        //  -   Valid, Compatible, EndOfLife: freshly leaked.
        unsafe { DefaultDelete.destroy(object) };

        assert_eq!(1, dropped.get());
    }

    #[test]
    fn default_delete_unsized() {
        let object: Box<str> = Box::from("Hello, World!");
        let object = NonNull::from(Box::leak(object));

        //  Safety:
        //  -   Valid, Compatible, EndOfLife: freshly leaked.
        unsafe { DefaultDelete.destroy(object) };
    }

    #[test]
    fn closure_policy() {
        let calls = Cell::new(0);

        let policy = |object: NonNull<String>| {
            calls.set(calls.get() + 1);

            //  Safety:
            //  -   Compatible: all objects are boxed, in this test.
            drop(unsafe { Box::from_raw(object.as_ptr()) });
        };

        let object = NonNull::from(Box::leak(Box::new(String::from("Hello, World!"))));

        //  Safety:
        //  -   Valid, Compatible, EndOfLife: freshly leaked.
        unsafe { policy.destroy(object) };

        assert_eq!(1, calls.get());
    }

    struct Tracked(Rc<Cell<usize>>);

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }
} // mod tests
