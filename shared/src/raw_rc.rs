//! Handles the attach and detach protocols of strong and weak handles.

use core::{marker::PhantomData, ptr::NonNull};

use crate::{count::RefCount, raw::ControlBlock, DestructionPolicy, SharedError};

/// Generic reference-counted raw handle, attached to a control block, equivalent to Rc/Arc.
pub(crate) struct RawStrong<T, P, C>
where
    T: ?Sized,
    P: DestructionPolicy<T>,
    C: RefCount,
{
    //  Safety:
    //  -   Lifetime: the control block is alive for as long as this handle is, since it is counted in both the strong
    //      count, and (collectively) in the weak count.
    block: NonNull<ControlBlock<T, P, C>>,
    _owned: PhantomData<T>,
}

/// Generic reference-counted raw handle, attached to a control block, equivalent to Weak.
pub(crate) struct RawWeak<T, P, C>
where
    T: ?Sized,
    P: DestructionPolicy<T>,
    C: RefCount,
{
    //  Safety:
    //  -   Lifetime: the control block is alive for as long as this handle is, since it is counted in the weak count.
    block: NonNull<ControlBlock<T, P, C>>,
    _owned: PhantomData<T>,
}

//
//  Construction
//

impl<T, P, C> RawStrong<T, P, C>
where
    T: ?Sized,
    P: DestructionPolicy<T>,
    C: RefCount,
{
    /// Attempts to allocate a control block for `object`, and returns the sole strong handle to it.
    ///
    /// On failure, `object` is destroyed with `policy` before returning.
    ///
    /// #   Safety
    ///
    /// -   Valid: `object` points to a live `T`.
    /// -   Compatible: `object` can be destroyed by `policy`.
    /// -   Ownership: `object` is exclusively owned by the caller, ownership is transferred to the handle.
    #[inline]
    pub(crate) unsafe fn try_adopt(object: NonNull<T>, policy: P) -> Result<Self, SharedError> {
        //  Safety:
        //  -   Valid, Compatible, Ownership: as per pre-condition.
        let block = unsafe { ControlBlock::try_allocate(object, policy)? };

        Ok(Self::from_block(block))
    }

    /// Constructs a new `RawWeak` handle to this control block.
    #[inline]
    pub(crate) fn downgrade(&self) -> RawWeak<T, P, C> {
        //  Safety:
        //  -   Accounting: the number of weak handles is increased by one.
        unsafe { self.count().increment_weak() };

        RawWeak::from_block(self.block)
    }

    #[inline(always)]
    fn from_block(block: NonNull<ControlBlock<T, P, C>>) -> Self {
        let _owned = PhantomData;

        Self { block, _owned }
    }
}

impl<T, P, C> RawWeak<T, P, C>
where
    T: ?Sized,
    P: DestructionPolicy<T>,
    C: RefCount,
{
    /// Attempts to upgrade the `RawWeak` handle to a `RawStrong`.
    ///
    /// Returns `None` if the managed object has already been destroyed, or is being destroyed.
    #[inline]
    pub(crate) fn upgrade(&self) -> Option<RawStrong<T, P, C>> {
        //  Safety:
        //  -   Accounting: the number of strong handles is increased by one on success.
        let upgraded = unsafe { self.count().try_increment_strong() };

        upgraded.then(|| RawStrong::from_block(self.block))
    }

    #[inline(always)]
    fn from_block(block: NonNull<ControlBlock<T, P, C>>) -> Self {
        let _owned = PhantomData;

        Self { block, _owned }
    }
}

//
//  Destruction
//

impl<T, P, C> Drop for RawStrong<T, P, C>
where
    T: ?Sized,
    P: DestructionPolicy<T>,
    C: RefCount,
{
    fn drop(&mut self) {
        debug_assert!(self.count().strong_count() > 0);

        //  Safety:
        //  -   Accounting: one less strong instance exists after `drop`.
        let last = unsafe { self.count().decrement_strong() };

        if !last {
            return;
        }

        //  The weak reference collectively held by the strong handles is only released once the object is destroyed,
        //  even if the policy panics.
        let _implicit = RawWeak::from_block(self.block);

        //  Safety:
        //  -   Lifetime: `_implicit` keeps the control block alive.
        //  -   Accounting: the strong count just reached 0.
        unsafe { ControlBlock::destroy(self.block) };
    }
}

impl<T, P, C> Drop for RawWeak<T, P, C>
where
    T: ?Sized,
    P: DestructionPolicy<T>,
    C: RefCount,
{
    fn drop(&mut self) {
        debug_assert!(self.count().weak_count() > 0);

        //  Safety:
        //  -   Accounting: one less weak instance exists after `drop`.
        let last = unsafe { self.count().decrement_weak() };

        if !last {
            return;
        }

        //  Safety:
        //  -   Lifetime: this handle was keeping the control block alive until now.
        //  -   EndOfLife: the weak count reached 0, no other handle exists.
        unsafe { ControlBlock::deallocate(self.block) };
    }
}

//
//  High-level Access
//

impl<T, P, C> RawStrong<T, P, C>
where
    T: ?Sized,
    P: DestructionPolicy<T>,
    C: RefCount,
{
    /// Returns the number of strong handles, ie `RawStrong`.
    #[inline(always)]
    pub(crate) fn strong_count(&self) -> usize {
        self.count().strong_count()
    }

    /// Returns the number of weak handles, ie `RawWeak`.
    #[inline(always)]
    pub(crate) fn weak_count(&self) -> usize {
        //  The strong handles collectively hold one weak reference, and this is a strong handle.
        self.count().weak_count() - 1
    }

    /// Returns a reference to the managed object.
    #[inline(always)]
    pub(crate) fn as_ref(&self) -> &T {
        //  Safety:
        //  -   Alive: this handle guarantees that the object is alive, and will remain so as long this handle is
        //      borrowed.
        unsafe { self.block().object().as_ref() }
    }

    /// Returns a pointer to the managed object.
    #[inline(always)]
    pub(crate) fn as_non_null(&self) -> NonNull<T> {
        //  Safety:
        //  -   Alive: this handle guarantees that the object is alive.
        unsafe { self.block().object() }
    }

    /// Returns a reference to the destruction policy.
    #[inline(always)]
    pub(crate) fn policy(&self) -> &P {
        self.block().policy()
    }

    /// Returns whether both handles share the same control block.
    #[inline(always)]
    pub(crate) fn ptr_eq(&self, other: &Self) -> bool {
        self.block == other.block
    }
}

impl<T, P, C> RawWeak<T, P, C>
where
    T: ?Sized,
    P: DestructionPolicy<T>,
    C: RefCount,
{
    /// Returns the number of strong handles, ie `RawStrong`.
    #[inline(always)]
    pub(crate) fn strong_count(&self) -> usize {
        self.count().strong_count()
    }

    /// Returns the number of weak handles, ie `RawWeak`.
    ///
    /// While the managed object is being destroyed, the count is one too high.
    #[inline(always)]
    pub(crate) fn weak_count(&self) -> usize {
        let count = self.count();

        let strong = count.strong_count();
        let weak = count.weak_count();

        //  The strong handles collectively hold one weak reference, if any.
        if strong > 0 {
            weak.saturating_sub(1)
        } else {
            weak
        }
    }

    /// Returns whether both handles share the same control block.
    #[inline(always)]
    pub(crate) fn ptr_eq(&self, other: &Self) -> bool {
        self.block == other.block
    }

    /// Returns whether this handle shares the control block of `strong`.
    #[inline(always)]
    pub(crate) fn is_attached_to(&self, strong: &RawStrong<T, P, C>) -> bool {
        self.block == strong.block
    }
}

//
//  Clone
//

impl<T, P, C> Clone for RawStrong<T, P, C>
where
    T: ?Sized,
    P: DestructionPolicy<T>,
    C: RefCount,
{
    fn clone(&self) -> Self {
        //  Safety:
        //  -   Accounting: the number of strong handles is increased by one.
        unsafe { self.count().increment_strong() };

        Self::from_block(self.block)
    }
}

impl<T, P, C> Clone for RawWeak<T, P, C>
where
    T: ?Sized,
    P: DestructionPolicy<T>,
    C: RefCount,
{
    fn clone(&self) -> Self {
        //  Safety:
        //  -   Accounting: the number of weak handles is increased by one.
        unsafe { self.count().increment_weak() };

        Self::from_block(self.block)
    }
}

//
//  Implementation
//

impl<T, P, C> RawStrong<T, P, C>
where
    T: ?Sized,
    P: DestructionPolicy<T>,
    C: RefCount,
{
    #[inline(always)]
    fn block(&self) -> &ControlBlock<T, P, C> {
        //  Safety:
        //  -   Lifetime: as per invariant.
        unsafe { self.block.as_ref() }
    }

    #[inline(always)]
    fn count(&self) -> &C {
        self.block().count()
    }
}

impl<T, P, C> RawWeak<T, P, C>
where
    T: ?Sized,
    P: DestructionPolicy<T>,
    C: RefCount,
{
    #[inline(always)]
    fn block(&self) -> &ControlBlock<T, P, C> {
        //  Safety:
        //  -   Lifetime: as per invariant.
        unsafe { self.block.as_ref() }
    }

    #[inline(always)]
    fn count(&self) -> &C {
        self.block().count()
    }
}

// mod tests
