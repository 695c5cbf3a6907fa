/// Errors from the library.
use core::{error, fmt};

/// Errors returned by this library.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SharedError {
    /// No memory could be allocated, for either the managed object or its control block.
    MemoryExhausted,
    /// The weak handle is empty, or the managed object has already been destroyed.
    Expired,
}

impl fmt::Display for SharedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "{:?}", self)
    }
}

impl error::Error for SharedError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        assert_eq!("MemoryExhausted", SharedError::MemoryExhausted.to_string());
        assert_eq!("Expired", SharedError::Expired.to_string());
    }
}
