use std::sync::{Mutex, MutexGuard};

/// Recovers a poisoned mutex with `into_inner()` and leaves a warn log
/// carrying a stable lock name.
pub(crate) fn lock_recover<'a, T>(mutex: &'a Mutex<T>, name: &str) -> MutexGuard<'a, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            log::warn!("event=lock_poisoned lock={} action=recover", name);
            poisoned.into_inner()
        }
    }
}
