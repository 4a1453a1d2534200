//! Small shared helpers: poison-tolerant locking and timestamp formatting.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Lock a mutex, recovering the guard if a previous holder panicked.
#[inline]
pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Block on `cv`, recovering the guard on poison like [`lock`].
#[inline]
pub(crate) fn wait<'a, T>(cv: &Condvar, guard: MutexGuard<'a, T>) -> MutexGuard<'a, T> {
    cv.wait(guard).unwrap_or_else(PoisonError::into_inner)
}

/// [`wait`] with an upper bound on the sleep.
#[inline]
pub(crate) fn wait_timeout<'a, T>(
    cv: &Condvar,
    guard: MutexGuard<'a, T>,
    timeout: Duration,
) -> MutexGuard<'a, T> {
    match cv.wait_timeout(guard, timeout) {
        Ok((guard, _)) => guard,
        Err(poisoned) => poisoned.into_inner().0,
    }
}

/// Time since the Unix epoch; clamps to zero for clocks set before 1970.
pub(crate) fn since_epoch(t: SystemTime) -> Duration {
    t.duration_since(UNIX_EPOCH).unwrap_or_default()
}

/// Render a wall-clock instant as `seconds.microseconds`, seconds right-aligned to ten columns.
pub(crate) fn format_timestamp(t: SystemTime) -> String {
    let d = since_epoch(t);
    format!("{:>10}.{:06}", d.as_secs(), d.subsec_micros())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_pads_micros() {
        let t = UNIX_EPOCH + Duration::new(12, 3_000);
        assert_eq!(format_timestamp(t), "        12.000003");
    }

    #[test]
    fn pre_epoch_clamps_to_zero() {
        let t = UNIX_EPOCH - Duration::from_secs(5);
        assert_eq!(since_epoch(t), Duration::ZERO);
    }

    #[test]
    fn lock_recovers_from_poison() {
        let m = std::sync::Arc::new(Mutex::new(1));
        let m2 = std::sync::Arc::clone(&m);
        let _ = std::thread::spawn(move || {
            let _g = m2.lock().unwrap();
            panic!("poison");
        })
        .join();
        assert!(m.is_poisoned());
        assert_eq!(*lock(&m), 1);
    }
}
