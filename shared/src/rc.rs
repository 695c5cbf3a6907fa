//! Single-threaded strong and weak handles.
//!
//! For the layout of the control block, refer to the crate-level documentation.

use core::{cmp, convert, fmt, hash, mem, ops, ptr::NonNull};

use alloc::boxed::Box;

use crate::{
    count::LocalCount,
    raw::{self, ControlBlock},
    raw_rc::{RawStrong, RawWeak},
    DefaultDelete, DestructionPolicy, SharedError,
};

/// A possibly empty handle sharing the ownership of a `T`, destroyed by `P` once the last `Strong` lets go.
///
/// The functions of `Strong` are associated functions, ie `Strong::use_count(&strong)`, so as not to shadow the
/// methods of `T` accessible through `Deref`.
pub struct Strong<T, P = DefaultDelete>
where
    T: ?Sized,
    P: DestructionPolicy<T>,
{
    inner: Option<RawStrong<T, P, LocalCount>>,
}

/// A possibly empty handle observing a `T` owned by `Strong` handles, without keeping it alive.
pub struct Weak<T, P = DefaultDelete>
where
    T: ?Sized,
    P: DestructionPolicy<T>,
{
    inner: Option<RawWeak<T, P, LocalCount>>,
}

/// Allocates `value` on the heap, and returns the sole `Strong` handle to it.
///
/// #   Panics
///
/// If there is not enough memory. Use `Strong::try_new` to handle failures gracefully.
#[inline]
pub fn make_strong<T>(value: T) -> Strong<T> {
    Strong::new(value)
}

//
//  Construction
//

impl<T> Strong<T, DefaultDelete> {
    /// Allocates memory on the heap and then places `value` into it.
    ///
    /// #   Panics
    ///
    /// If there is not enough memory. Use `try_new` to handle failures gracefully.
    #[inline]
    pub fn new(value: T) -> Self {
        Self::from_box(Box::new(value))
    }

    /// Attempts to allocate memory on the heap and then places `value` into it.
    ///
    /// Returns an error if either allocation fails, in which case `value` is dropped. Use `new` for a panicking
    /// version instead.
    pub fn try_new(value: T) -> Result<Self, SharedError> {
        let object = raw::try_allocate(value).map_err(|_| SharedError::MemoryExhausted)?;

        //  Safety:
        //  -   Valid: freshly allocated.
        //  -   Compatible: `try_allocate` is compatible with `Box`.
        //  -   Ownership: freshly allocated.
        unsafe { Self::try_adopt(object, DefaultDelete) }
    }
}

impl<T> Strong<T, DefaultDelete>
where
    T: ?Sized,
{
    /// Adopts `boxed`, and returns the sole `Strong` handle to it.
    ///
    /// #   Panics
    ///
    /// If there is not enough memory for the control block. Use `try_from_box` to handle failures gracefully.
    #[inline]
    pub fn from_box(boxed: Box<T>) -> Self {
        Self::try_from_box(boxed).unwrap_or_else(|_| ControlBlock::<T, DefaultDelete, LocalCount>::exhausted())
    }

    /// Attempts to adopt `boxed`, and returns the sole `Strong` handle to it.
    ///
    /// Returns an error if the control block cannot be allocated, in which case `boxed` is dropped.
    pub fn try_from_box(boxed: Box<T>) -> Result<Self, SharedError> {
        let object = NonNull::from(Box::leak(boxed));

        //  Safety:
        //  -   Valid, Ownership: leaked from a `Box`.
        //  -   Compatible: `DefaultDelete` releases `Box`.
        unsafe { Self::try_adopt(object, DefaultDelete) }
    }

    /// Adopts `object`, and returns the sole `Strong` handle to it, or an empty handle if `object` is null.
    ///
    /// #   Panics
    ///
    /// If there is not enough memory for the control block.
    ///
    /// #   Safety
    ///
    /// -   Valid: `object` is either null, or points to a live `T` allocated as a `Box<T>`.
    /// -   Ownership: `object` is exclusively owned by the caller, and ownership is transferred to the handle. In
    ///     particular, it SHALL NOT be adopted by any other handle.
    #[inline]
    pub unsafe fn from_raw(object: *mut T) -> Self {
        //  Safety:
        //  -   Valid, Compatible, Ownership: as per pre-condition.
        unsafe { Self::from_raw_with(object, DefaultDelete) }
    }

    /// Detaches from the current control block, if any, then adopts `boxed`.
    pub fn reset_with(this: &mut Self, boxed: Box<T>) {
        Self::reset(this);

        *this = Self::from_box(boxed);
    }
}

impl<T, P> Strong<T, P>
where
    T: ?Sized,
    P: DestructionPolicy<T>,
{
    /// Constructs an empty handle.
    #[inline(always)]
    pub const fn empty() -> Self {
        Self { inner: None }
    }

    /// Adopts `object`, to be destroyed by `policy`, and returns the sole `Strong` handle to it, or an empty handle
    /// if `object` is null, in which case `policy` is dropped.
    ///
    /// #   Panics
    ///
    /// If there is not enough memory for the control block. Use `try_from_raw_with` to handle failures gracefully.
    ///
    /// #   Safety
    ///
    /// -   Valid: `object` is either null, or points to a live `T`.
    /// -   Compatible: `object` can be destroyed by `policy`.
    /// -   Ownership: `object` is exclusively owned by the caller, and ownership is transferred to the handle. In
    ///     particular, it SHALL NOT be adopted by any other handle.
    pub unsafe fn from_raw_with(object: *mut T, policy: P) -> Self {
        //  Safety:
        //  -   Valid, Compatible, Ownership: as per pre-condition.
        let result = unsafe { Self::try_from_raw_with(object, policy) };

        result.unwrap_or_else(|_| ControlBlock::<T, P, LocalCount>::exhausted())
    }

    /// Attempts to adopt `object`, to be destroyed by `policy`, see `from_raw_with`.
    ///
    /// Returns an error if the control block cannot be allocated, in which case `object` is destroyed by `policy`.
    ///
    /// #   Safety
    ///
    /// As per `from_raw_with`.
    pub unsafe fn try_from_raw_with(object: *mut T, policy: P) -> Result<Self, SharedError> {
        let Some(object) = NonNull::new(object) else {
            return Ok(Self::empty());
        };

        //  Safety:
        //  -   Valid, Compatible, Ownership: as per pre-condition.
        unsafe { Self::try_adopt(object, policy) }
    }

    /// Detaches from the current control block, if any, then adopts `object`, to be destroyed by a default policy.
    ///
    /// If `object` is null, the handle is left empty.
    ///
    /// #   Panics
    ///
    /// If there is not enough memory for the control block.
    ///
    /// #   Safety
    ///
    /// As per `from_raw_with`, with `P::default()` as policy.
    pub unsafe fn reset_raw(this: &mut Self, object: *mut T)
    where
        P: Default,
    {
        Self::reset(this);

        //  Safety:
        //  -   Valid, Compatible, Ownership: as per pre-condition.
        *this = unsafe { Self::from_raw_with(object, P::default()) };
    }

    /// Constructs a new `Weak` handle to this control block, or an empty one if `this` is empty.
    #[inline]
    pub fn downgrade(this: &Self) -> Weak<T, P> {
        let inner = this.inner.as_ref().map(RawStrong::downgrade);

        Weak { inner }
    }

    //  Safety:
    //  -   Valid, Compatible, Ownership: as per `RawStrong::try_adopt`.
    unsafe fn try_adopt(object: NonNull<T>, policy: P) -> Result<Self, SharedError> {
        //  Safety:
        //  -   Valid, Compatible, Ownership: as per pre-condition.
        let inner = unsafe { RawStrong::try_adopt(object, policy)? };

        Ok(Self { inner: Some(inner) })
    }
}

impl<T, P> Weak<T, P>
where
    T: ?Sized,
    P: DestructionPolicy<T>,
{
    /// Constructs an empty handle.
    #[inline(always)]
    pub const fn empty() -> Self {
        Self { inner: None }
    }

    /// Attempts to promote this handle to a `Strong` handle.
    ///
    /// Returns an empty `Strong` if this handle is empty, or the managed object has already been destroyed.
    #[inline]
    pub fn lock(this: &Self) -> Strong<T, P> {
        let inner = this.inner.as_ref().and_then(RawWeak::upgrade);

        Strong { inner }
    }

    /// Attempts to promote this handle to a `Strong` handle.
    ///
    /// Returns `None` if this handle is empty, or the managed object has already been destroyed.
    #[inline]
    pub fn upgrade(this: &Self) -> Option<Strong<T, P>> {
        let strong = Self::lock(this);

        Strong::is_some(&strong).then_some(strong)
    }

    /// Detaches from the current control block, if any, then attaches to the control block of `strong`, if any.
    ///
    /// If already attached to the control block of `strong`, this is a no-op.
    pub fn assign(this: &mut Self, strong: &Strong<T, P>) {
        if Self::is_attached_to(this, strong) {
            return;
        }

        Self::reset(this);

        *this = Strong::downgrade(strong);
    }

    fn is_attached_to(this: &Self, strong: &Strong<T, P>) -> bool {
        match (&this.inner, &strong.inner) {
            (Some(weak), Some(strong)) => weak.is_attached_to(strong),
            (None, None) => true,
            _ => false,
        }
    }
}

//
//  Modifiers
//

impl<T, P> Strong<T, P>
where
    T: ?Sized,
    P: DestructionPolicy<T>,
{
    /// Detaches from the current control block, if any, leaving `this` empty.
    ///
    /// If `this` was the last `Strong` handle, the managed object is destroyed.
    #[inline]
    pub fn reset(this: &mut Self) {
        this.inner = None;
    }

    /// Takes the attachment of `this`, leaving `this` empty.
    #[inline]
    pub fn take(this: &mut Self) -> Self {
        mem::take(this)
    }

    /// Exchanges the attachments of `this` and `other`.
    #[inline]
    pub fn swap(this: &mut Self, other: &mut Self) {
        mem::swap(&mut this.inner, &mut other.inner);
    }
}

impl<T, P> Weak<T, P>
where
    T: ?Sized,
    P: DestructionPolicy<T>,
{
    /// Detaches from the current control block, if any, leaving `this` empty.
    #[inline]
    pub fn reset(this: &mut Self) {
        this.inner = None;
    }

    /// Takes the attachment of `this`, leaving `this` empty.
    #[inline]
    pub fn take(this: &mut Self) -> Self {
        mem::take(this)
    }

    /// Exchanges the attachments of `this` and `other`.
    #[inline]
    pub fn swap(this: &mut Self, other: &mut Self) {
        mem::swap(&mut this.inner, &mut other.inner);
    }
}

//
//  High-level Access
//

impl<T, P> Strong<T, P>
where
    T: ?Sized,
    P: DestructionPolicy<T>,
{
    /// Returns the number of `Strong` handles attached to the same control block, or 0 if empty.
    #[inline(always)]
    pub fn use_count(this: &Self) -> usize {
        this.inner.as_ref().map_or(0, RawStrong::strong_count)
    }

    /// Returns the number of `Weak` handles attached to the same control block, or 0 if empty.
    #[inline(always)]
    pub fn weak_count(this: &Self) -> usize {
        this.inner.as_ref().map_or(0, RawStrong::weak_count)
    }

    /// Returns a reference to the managed object, or `None` if empty.
    #[inline(always)]
    pub fn get(this: &Self) -> Option<&T> {
        this.inner.as_ref().map(RawStrong::as_ref)
    }

    /// Returns a pointer to the managed object, or `None` if empty.
    #[inline(always)]
    pub fn as_non_null(this: &Self) -> Option<NonNull<T>> {
        this.inner.as_ref().map(RawStrong::as_non_null)
    }

    /// Returns a reference to the destruction policy, or `None` if empty.
    #[inline(always)]
    pub fn policy(this: &Self) -> Option<&P> {
        this.inner.as_ref().map(RawStrong::policy)
    }

    /// Returns whether `this` is attached, and thus points to a live object.
    #[inline(always)]
    pub fn is_some(this: &Self) -> bool {
        this.inner.is_some()
    }

    /// Returns whether `this` is empty.
    #[inline(always)]
    pub fn is_empty(this: &Self) -> bool {
        this.inner.is_none()
    }

    /// Returns whether both handles are attached to the same control block, or are both empty.
    #[inline]
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        match (&this.inner, &other.inner) {
            (Some(this), Some(other)) => this.ptr_eq(other),
            (None, None) => true,
            _ => false,
        }
    }
}

impl<T, P> Weak<T, P>
where
    T: ?Sized,
    P: DestructionPolicy<T>,
{
    /// Returns whether this handle is empty, or the managed object has been destroyed.
    #[inline(always)]
    pub fn expired(this: &Self) -> bool {
        Self::use_count(this) == 0
    }

    /// Returns the number of `Strong` handles attached to the same control block, or 0 if empty.
    #[inline(always)]
    pub fn use_count(this: &Self) -> usize {
        this.inner.as_ref().map_or(0, RawWeak::strong_count)
    }

    /// Returns the number of `Weak` handles attached to the same control block, or 0 if empty.
    #[inline(always)]
    pub fn weak_count(this: &Self) -> usize {
        this.inner.as_ref().map_or(0, RawWeak::weak_count)
    }

    /// Returns whether both handles are attached to the same control block, or are both empty.
    #[inline]
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        match (&this.inner, &other.inner) {
            (Some(this), Some(other)) => this.ptr_eq(other),
            (None, None) => true,
            _ => false,
        }
    }
}

//
//  Clone & Default
//

impl<T, P> Clone for Strong<T, P>
where
    T: ?Sized,
    P: DestructionPolicy<T>,
{
    fn clone(&self) -> Self {
        let inner = self.inner.clone();

        Self { inner }
    }

    fn clone_from(&mut self, source: &Self) {
        if Self::ptr_eq(self, source) {
            return;
        }

        *self = source.clone();
    }
}

impl<T, P> Clone for Weak<T, P>
where
    T: ?Sized,
    P: DestructionPolicy<T>,
{
    fn clone(&self) -> Self {
        let inner = self.inner.clone();

        Self { inner }
    }

    fn clone_from(&mut self, source: &Self) {
        if Self::ptr_eq(self, source) {
            return;
        }

        *self = source.clone();
    }
}

impl<T, P> Default for Strong<T, P>
where
    T: ?Sized,
    P: DestructionPolicy<T>,
{
    fn default() -> Self {
        Self::empty()
    }
}

impl<T, P> Default for Weak<T, P>
where
    T: ?Sized,
    P: DestructionPolicy<T>,
{
    fn default() -> Self {
        Self::empty()
    }
}

//
//  Conversions
//

impl<T> From<T> for Strong<T, DefaultDelete> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T> From<Box<T>> for Strong<T, DefaultDelete>
where
    T: ?Sized,
{
    fn from(boxed: Box<T>) -> Self {
        Self::from_box(boxed)
    }
}

impl<T, P> From<&Strong<T, P>> for Weak<T, P>
where
    T: ?Sized,
    P: DestructionPolicy<T>,
{
    fn from(strong: &Strong<T, P>) -> Self {
        Strong::downgrade(strong)
    }
}

impl<T, P> TryFrom<&Weak<T, P>> for Strong<T, P>
where
    T: ?Sized,
    P: DestructionPolicy<T>,
{
    type Error = SharedError;

    fn try_from(weak: &Weak<T, P>) -> Result<Self, Self::Error> {
        Weak::upgrade(weak).ok_or(SharedError::Expired)
    }
}

//
//  Value Access
//

impl<T, P> convert::AsRef<T> for Strong<T, P>
where
    T: ?Sized,
    P: DestructionPolicy<T>,
{
    fn as_ref(&self) -> &T {
        self
    }
}

impl<T, P> ops::Deref for Strong<T, P>
where
    T: ?Sized,
    P: DestructionPolicy<T>,
{
    type Target = T;

    /// Returns a reference to the managed object.
    ///
    /// #   Panics
    ///
    /// If the handle is empty.
    fn deref(&self) -> &T {
        match Self::get(self) {
            Some(value) => value,
            None => panic!("dereferenced an empty Strong"),
        }
    }
}

//
//  Formatting
//

impl<T, P> fmt::Debug for Strong<T, P>
where
    T: ?Sized + fmt::Debug,
    P: DestructionPolicy<T>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        f.debug_tuple("Strong").field(&Self::get(self)).finish()
    }
}

impl<T, P> fmt::Debug for Weak<T, P>
where
    T: ?Sized,
    P: DestructionPolicy<T>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        f.write_str("(Weak)")
    }
}

//
//  Identity
//

impl<T, P> Eq for Strong<T, P>
where
    T: ?Sized + Eq,
    P: DestructionPolicy<T>,
{
}

impl<T, P> PartialEq for Strong<T, P>
where
    T: ?Sized + PartialEq,
    P: DestructionPolicy<T>,
{
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        Self::get(self).eq(&Self::get(other))
    }
}

impl<T, P> hash::Hash for Strong<T, P>
where
    T: ?Sized + hash::Hash,
    P: DestructionPolicy<T>,
{
    #[inline(always)]
    fn hash<HS>(&self, hasher: &mut HS)
    where
        HS: hash::Hasher,
    {
        Self::get(self).hash(hasher);
    }
}

//
//  Ordering
//

impl<T, P> Ord for Strong<T, P>
where
    T: ?Sized + Ord,
    P: DestructionPolicy<T>,
{
    #[inline(always)]
    fn cmp(&self, other: &Self) -> cmp::Ordering {
        Self::get(self).cmp(&Self::get(other))
    }
}

impl<T, P> PartialOrd for Strong<T, P>
where
    T: ?Sized + PartialOrd,
    P: DestructionPolicy<T>,
{
    #[inline(always)]
    fn partial_cmp(&self, other: &Self) -> Option<cmp::Ordering> {
        Self::get(self).partial_cmp(&Self::get(other))
    }
}

// mod tests
