use std::sync::{Condvar, Mutex, PoisonError};

/// Blocking counting semaphore.
///
/// Waiters are woken in no particular order.
#[derive(Debug)]
pub struct Semaphore {
    permits: Mutex<usize>,
    available: Condvar,
}

impl Semaphore {
    #[must_use]
    pub fn new(permits: usize) -> Self {
        Self {
            permits: Mutex::new(permits),
            available: Condvar::new(),
        }
    }

    /// Block until a permit is available and take it.
    pub fn wait(&self) {
        let mut permits = self.permits.lock().unwrap_or_else(PoisonError::into_inner);
        while *permits == 0 {
            permits = self
                .available
                .wait(permits)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *permits -= 1;
    }

    /// Take a permit if one is free right now.
    pub fn try_wait(&self) -> bool {
        let mut permits = self.permits.lock().unwrap_or_else(PoisonError::into_inner);
        if *permits == 0 {
            return false;
        }
        *permits -= 1;
        true
    }

    pub fn post(&self) {
        let mut permits = self.permits.lock().unwrap_or_else(PoisonError::into_inner);
        *permits += 1;
        self.available.notify_one();
    }

    #[must_use]
    pub fn permits(&self) -> usize {
        *self.permits.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn wait_blocks_until_post() {
        let sem = Arc::new(Semaphore::new(1));
        sem.wait();
        assert!(!sem.try_wait());

        let waiter = {
            let sem = Arc::clone(&sem);
            thread::spawn(move || sem.wait())
        };
        thread::sleep(Duration::from_millis(20));
        assert!(!waiter.is_finished());
        sem.post();
        waiter.join().expect("waiter thread");
        assert_eq!(sem.permits(), 0);
    }
}
