//! Handles the actual memory finnicky details of the control block.

use core::{alloc::Layout, cell::UnsafeCell, ptr::NonNull};

use alloc::boxed::Box;

use crate::{count::RefCount, DestructionPolicy, SharedError};

/// The metadata shared by all handles to a single managed object.
pub(crate) struct ControlBlock<T, P, C>
where
    T: ?Sized,
{
    count: C,
    //  Safety:
    //  -   Alive: `Some` if and only if the managed object has not been destroyed yet.
    //  -   Exclusive: only ever written by the (single) handle which brought the strong count to 0.
    object: UnsafeCell<Option<NonNull<T>>>,
    policy: P,
}

impl<T, P, C> ControlBlock<T, P, C>
where
    T: ?Sized,
    P: DestructionPolicy<T>,
    C: RefCount,
{
    /// Attempts to allocate a control block managing `object`, with `policy`.
    ///
    /// On failure, `object` is destroyed with `policy` before returning.
    ///
    /// #   Safety
    ///
    /// -   Valid: `object` points to a live `T`.
    /// -   Compatible: `object` can be destroyed by `policy`.
    /// -   Ownership: `object` is exclusively owned by the caller, ownership is transferred to the control block.
    pub(crate) unsafe fn try_allocate(object: NonNull<T>, policy: P) -> Result<NonNull<Self>, SharedError> {
        let count = C::new();
        let object = UnsafeCell::new(Some(object));

        match try_allocate(Self { count, object, policy }) {
            Ok(block) => {
                trace!("control block {:p} allocated", block);

                Ok(block)
            }
            Err(block) => {
                //  Safety:
                //  -   Valid, Compatible, EndOfLife: as per pre-condition, with this control block never existing.
                if let Some(object) = block.object.into_inner() {
                    unsafe { block.policy.destroy(object) };
                }

                Err(SharedError::MemoryExhausted)
            }
        }
    }

    /// Reports a failure to allocate a control block, as per `alloc::alloc::handle_alloc_error`.
    pub(crate) fn exhausted() -> ! {
        alloc::alloc::handle_alloc_error(Layout::new::<Self>())
    }

    /// Destroys the managed object.
    ///
    /// #   Safety
    ///
    /// -   Lifetime: `this` points to a live control block, which will remain live for the duration of the call.
    /// -   Accounting: the strong count just reached 0.
    pub(crate) unsafe fn destroy(this: NonNull<Self>) {
        //  Safety:
        //  -   Lifetime: as per pre-condition.
        let block = unsafe { this.as_ref() };

        debug_assert_eq!(0, block.count.strong_count());

        //  Safety:
        //  -   Exclusive: the strong count just reached 0, and cannot be revived, hence no other handle may access
        //      `object` concurrently.
        let object = unsafe { (*block.object.get()).take() };

        let Some(object) = object else { return };

        trace!("control block {:p} destroying its object", this);

        //  Safety:
        //  -   Valid: the object was alive until now, since the strong count was > 0.
        //  -   Compatible: as per `try_allocate` pre-condition.
        //  -   EndOfLife: `object` has been taken out of the control block.
        unsafe { block.policy.destroy(object) };
    }

    /// Deallocates the control block, dropping its policy.
    ///
    /// #   Safety
    ///
    /// -   Lifetime: `this` points to a live control block.
    /// -   EndOfLife: the weak count just reached 0, hence `this` is never accessed again.
    pub(crate) unsafe fn deallocate(this: NonNull<Self>) {
        trace!("control block {:p} deallocated", this);

        //  Safety:
        //  -   Compatible: allocated by `try_allocate`, with the global allocator and the layout of `Self`.
        //  -   EndOfLife: as per pre-condition.
        let block = unsafe { Box::from_raw(this.as_ptr()) };

        debug_assert!(block.object.into_inner().is_none());
    }
}

impl<T, P, C> ControlBlock<T, P, C>
where
    T: ?Sized,
{
    /// Returns the reference counts.
    #[inline(always)]
    pub(crate) fn count(&self) -> &C {
        &self.count
    }

    /// Returns the destruction policy.
    #[inline(always)]
    pub(crate) fn policy(&self) -> &P {
        &self.policy
    }

    /// Returns a pointer to the managed object.
    ///
    /// #   Safety
    ///
    /// -   Alive: the strong count is non-zero, and will remain so for as long as the result is used.
    #[inline(always)]
    pub(crate) unsafe fn object(&self) -> NonNull<T> {
        //  Safety:
        //  -   Exclusive: `object` is only written to once the strong count reaches 0, which per pre-condition it
        //      has not.
        let object = unsafe { *self.object.get() };

        debug_assert!(object.is_some());

        //  Safety:
        //  -   Alive: as per pre-condition, and invariant.
        unsafe { object.unwrap_unchecked() }
    }
}

/// Attempts to move `value` into a fresh memory block, obtained from the global allocator.
///
/// The resulting pointer may be released with `Box::from_raw`. On failure, `value` is handed back.
pub(crate) fn try_allocate<T>(value: T) -> Result<NonNull<T>, T> {
    let layout = Layout::new::<T>();

    let pointer: NonNull<T> = if layout.size() == 0 {
        NonNull::dangling()
    } else {
        //  Safety:
        //  -   NonZero: `layout` has a non-zero size.
        let pointer = unsafe { alloc::alloc::alloc(layout) };

        match NonNull::new(pointer) {
            Some(pointer) => pointer.cast(),
            None => return Err(value),
        }
    };

    //  Safety:
    //  -   Suitable: `pointer` is suitably sized and aligned for `T`, and writable.
    unsafe { pointer.as_ptr().write(value) };

    Ok(pointer)
}

// mod tests
