//! Core type aliases

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Standard Result type for the runtime
pub type Result<T> = std::result::Result<T, crate::core::error::Error>;

/// Lock a mutex, recovering the guard if a previous holder panicked.
pub fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Shared, lockable handle
pub type Shared<T> = Arc<Mutex<T>>;
