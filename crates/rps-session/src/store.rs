use std::convert::Infallible;

use tokio::sync::watch;

use crate::session::Session;

/// Holds the one session a controller owns.
///
/// Every replacement is a whole-value swap behind the watch lock, so readers
/// never observe a half-applied update.
#[derive(Debug)]
pub struct SessionStore {
    tx: watch::Sender<Session>,
}

impl Default for SessionStore {
    fn default() -> Self {
        SessionStore::new(Session::default())
    }
}

impl SessionStore {
    pub fn new(session: Session) -> Self {
        let (tx, _rx) = watch::channel(session);
        SessionStore { tx }
    }

    pub fn get(&self) -> Session {
        self.tx.borrow().clone()
    }

    /// Swap in `session`, returning the previous value.
    pub fn replace(&self, session: Session) -> Session {
        self.tx.send_replace(session)
    }

    /// Run `f` on a draft copy and publish it only if `f` succeeds and
    /// changed something. On error the stored session is untouched.
    pub fn try_update<T, E>(&self, f: impl FnOnce(&mut Session) -> Result<T, E>) -> Result<T, E> {
        let mut outcome = None;
        self.tx.send_if_modified(|current| {
            let mut draft = current.clone();
            let result = f(&mut draft);
            let changed = result.is_ok() && draft != *current;
            if changed {
                *current = draft;
            }
            outcome = Some(result);
            changed
        });
        match outcome {
            Some(result) => result,
            None => unreachable!("send_if_modified always runs its closure"),
        }
    }

    pub fn update<T>(&self, f: impl FnOnce(&mut Session) -> T) -> T {
        match self.try_update(|s| Ok::<T, Infallible>(f(s))) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    /// A receiver that wakes whenever a new session is published.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phase::Phase;

    #[test]
    fn failed_update_leaves_store_untouched() {
        let store = SessionStore::default();
        let before = store.get();
        let result: Result<(), &str> = store.try_update(|s| {
            s.phase = Phase::Committed;
            Err("guard failed")
        });
        assert_eq!(result, Err("guard failed"));
        assert_eq!(store.get(), before);
    }

    #[test]
    fn successful_update_is_published() {
        let store = SessionStore::default();
        let mut rx = store.subscribe();
        store.update(|s| s.phase = Phase::Committed);
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().phase, Phase::Committed);
    }

    #[test]
    fn unchanged_update_does_not_notify() {
        let store = SessionStore::default();
        let rx = store.subscribe();
        store.update(|_| ());
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn replace_returns_previous() {
        let store = SessionStore::default();
        let old = store.replace(Session {
            phase: Phase::Settled,
            ..Session::default()
        });
        assert_eq!(old.phase, Phase::Empty);
        assert_eq!(store.get().phase, Phase::Settled);
    }
}
