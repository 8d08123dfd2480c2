//! Page-session capability and the resilience wrapper around it.
//!
//! [`SessionHealthManager`] is the only place that knows the transport can
//! hang or die. Everything above it sees either a successful action or a
//! bounded [`CrawlError`].

use std::thread;
use std::time::Duration;

use log::{debug, error, info, warn};

use crate::error::{CrawlError, TransportError};
use crate::records::RawResultBlock;

/// What the crawler needs from a rendered search interface.
pub trait PageSession {
    /// Type `query` into the search form and submit it.
    fn submit_search(&mut self, query: &str) -> Result<(), TransportError>;

    /// Go to result page `page` (1-based). `Ok(false)` when the page does not exist.
    fn navigate_to_page(&mut self, page: u32) -> Result<bool, TransportError>;

    /// Result blocks of the current page in document order.
    fn read_result_blocks(&mut self) -> Result<Vec<RawResultBlock>, TransportError>;

    /// Declared page count, `None` when the page has no pagination control.
    fn read_total_pages(&mut self) -> Result<Option<u32>, TransportError>;

    /// Ask for the registry extract of the `index`-th result on the current
    /// page. `Ok(false)` when there is no such result.
    fn request_extract(&mut self, index: usize) -> Result<bool, TransportError>;

    fn is_responsive(&mut self) -> bool;

    /// Build a brand-new session with the same settings.
    fn recreate(&self) -> Result<Self, TransportError>
    where
        Self: Sized;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Fresh,
    Active,
    Degraded,
    Recovering,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per action, first try included.
    pub max_attempts: u32,
    /// Session re-creations tried before giving up.
    pub recovery_attempts: u32,
    pub backoff: Duration,
    /// Health-check cadence in processed queries.
    pub health_check_every: usize,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            recovery_attempts: 3,
            backoff: Duration::from_secs(2),
            health_check_every: 20,
        }
    }
}

pub struct SessionHealthManager<S: PageSession> {
    session: S,
    state: SessionState,
    policy: RetryPolicy,
    processed_queries: usize,
    generation: u64,
}

impl<S: PageSession> SessionHealthManager<S> {
    pub fn new(session: S, policy: RetryPolicy) -> Self {
        SessionHealthManager {
            session,
            state: SessionState::Fresh,
            policy,
            processed_queries: 0,
            generation: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Bumped every time the session is replaced. A changed value means any
    /// page state held by the old session (search results, current page) is gone.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Run `action` against the session, retrying transport failures up to
    /// `max_attempts` times. Dead sessions are recreated between attempts.
    pub fn with_session<T, F>(&mut self, mut action: F) -> Result<T, CrawlError>
    where
        F: FnMut(&mut S) -> Result<T, TransportError>,
    {
        let max_attempts = self.policy.max_attempts;
        let mut last = None;

        for attempt in 1..=max_attempts {
            if self.state == SessionState::Failed {
                self.recover()?;
            }

            match action(&mut self.session) {
                Ok(value) => {
                    self.state = SessionState::Active;
                    return Ok(value);
                }
                Err(e) => {
                    warn!("Session action failed (attempt {}/{}): {}", attempt, max_attempts, e);
                    self.state = SessionState::Degraded;
                    let dead = e.requires_new_session();
                    last = Some(e);

                    if attempt == max_attempts {
                        break;
                    }
                    if dead {
                        self.recover()?;
                    } else {
                        self.backoff();
                    }
                }
            }
        }

        let last = last.unwrap_or_else(|| TransportError::Browser("no attempts configured".into()));
        error!("Giving up after {} attempts: {}", max_attempts, last);
        Err(CrawlError::SessionExhausted {
            attempts: max_attempts,
            last,
        })
    }

    /// Check the session without retrying.
    pub fn health_check(&mut self) -> bool {
        if matches!(self.state, SessionState::Failed | SessionState::Recovering) {
            return false;
        }
        self.session.is_responsive()
    }

    pub fn note_query_processed(&mut self) {
        self.processed_queries += 1;
    }

    pub fn processed_queries(&self) -> usize {
        self.processed_queries
    }

    pub fn health_check_due(&self) -> bool {
        self.processed_queries > 0 && self.processed_queries % self.policy.health_check_every.max(1) == 0
    }

    /// Make the session usable for the next query: revive a failed session
    /// and run the periodic health check when it is due.
    pub fn begin_query(&mut self) -> Result<(), CrawlError> {
        if self.state == SessionState::Failed {
            warn!("Session is marked failed, trying to recover before the next query");
            return self.recover();
        }

        if self.health_check_due() {
            if self.health_check() {
                debug!("Health check passed after {} queries", self.processed_queries);
            } else {
                warn!("Inactive session detected after {} queries", self.processed_queries);
                self.state = SessionState::Degraded;
                self.recover()?;
            }
        }
        Ok(())
    }

    fn recover(&mut self) -> Result<(), CrawlError> {
        self.state = SessionState::Recovering;
        info!("Starting a new session...");

        let attempts = self.policy.recovery_attempts;
        let mut last = None;
        for attempt in 1..=attempts {
            match self.session.recreate() {
                Ok(fresh) => {
                    self.session = fresh;
                    self.generation += 1;
                    self.state = SessionState::Active;
                    info!("Session recreated (attempt {}/{})", attempt, attempts);
                    return Ok(());
                }
                Err(e) => {
                    warn!("Session recreation failed (attempt {}/{}): {}", attempt, attempts, e);
                    last = Some(e);
                    if attempt < attempts {
                        self.backoff();
                    }
                }
            }
        }

        self.state = SessionState::Failed;
        let last = last.unwrap_or_else(|| TransportError::SessionLost("no recovery attempts configured".into()));
        error!("Unable to keep the session alive: {}", last);
        Err(CrawlError::RecoveryFailed { attempts, last })
    }

    fn backoff(&self) {
        if !self.policy.backoff.is_zero() {
            thread::sleep(self.policy.backoff);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Counters {
        calls: Cell<u32>,
        recreates: Cell<u32>,
        failures_left: Cell<u32>,
        recreate_failures_left: Cell<u32>,
        responsive: Cell<bool>,
    }

    struct FlakySession {
        counters: Rc<Counters>,
        error: TransportError,
    }

    impl FlakySession {
        fn new(failures: u32, error: TransportError) -> (Self, Rc<Counters>) {
            let counters = Rc::new(Counters::default());
            counters.failures_left.set(failures);
            counters.responsive.set(true);
            (
                FlakySession {
                    counters: counters.clone(),
                    error,
                },
                counters,
            )
        }

        fn act(&mut self) -> Result<u32, TransportError> {
            self.counters.calls.set(self.counters.calls.get() + 1);
            let left = self.counters.failures_left.get();
            if left > 0 {
                self.counters.failures_left.set(left - 1);
                return Err(self.error.clone());
            }
            Ok(7)
        }
    }

    impl PageSession for FlakySession {
        fn submit_search(&mut self, _query: &str) -> Result<(), TransportError> {
            Ok(())
        }
        fn navigate_to_page(&mut self, _page: u32) -> Result<bool, TransportError> {
            Ok(false)
        }
        fn read_result_blocks(&mut self) -> Result<Vec<RawResultBlock>, TransportError> {
            Ok(Vec::new())
        }
        fn read_total_pages(&mut self) -> Result<Option<u32>, TransportError> {
            Ok(None)
        }
        fn request_extract(&mut self, _index: usize) -> Result<bool, TransportError> {
            Ok(false)
        }
        fn is_responsive(&mut self) -> bool {
            self.counters.responsive.get()
        }
        fn recreate(&self) -> Result<Self, TransportError> {
            self.counters.recreates.set(self.counters.recreates.get() + 1);
            let left = self.counters.recreate_failures_left.get();
            if left > 0 {
                self.counters.recreate_failures_left.set(left - 1);
                return Err(TransportError::Browser("launch failed".into()));
            }
            self.counters.responsive.set(true);
            Ok(FlakySession {
                counters: self.counters.clone(),
                error: self.error.clone(),
            })
        }
    }

    fn policy() -> RetryPolicy {
        RetryPolicy {
            backoff: Duration::ZERO,
            ..RetryPolicy::default()
        }
    }

    #[test]
    fn test_transient_failures_are_retried() {
        let (session, counters) = FlakySession::new(2, TransportError::Timeout("load".into()));
        let mut manager = SessionHealthManager::new(session, policy());
        assert_eq!(manager.state(), SessionState::Fresh);

        assert_eq!(manager.with_session(|s| s.act()), Ok(7));
        assert_eq!(counters.calls.get(), 3);
        assert_eq!(counters.recreates.get(), 0);
        assert_eq!(manager.state(), SessionState::Active);
    }

    #[test]
    fn test_exhaustion_surfaces_once() {
        let (session, counters) = FlakySession::new(10, TransportError::Timeout("load".into()));
        let mut manager = SessionHealthManager::new(session, policy());

        let result = manager.with_session(|s| s.act());
        assert_eq!(
            result,
            Err(CrawlError::SessionExhausted {
                attempts: 3,
                last: TransportError::Timeout("load".into()),
            })
        );
        assert_eq!(counters.calls.get(), 3);
        assert_eq!(manager.state(), SessionState::Degraded);
    }

    #[test]
    fn test_lost_session_is_recreated_between_attempts() {
        let (session, counters) = FlakySession::new(1, TransportError::SessionLost("invalid session id".into()));
        let mut manager = SessionHealthManager::new(session, policy());

        assert_eq!(manager.generation(), 0);
        assert_eq!(manager.with_session(|s| s.act()), Ok(7));
        assert_eq!(counters.recreates.get(), 1);
        assert_eq!(counters.calls.get(), 2);
        assert_eq!(manager.state(), SessionState::Active);
        assert_eq!(manager.generation(), 1);
    }

    #[test]
    fn test_recovery_ceiling_marks_failed() {
        let (session, counters) = FlakySession::new(1, TransportError::SessionLost("gone".into()));
        counters.recreate_failures_left.set(5);
        let mut manager = SessionHealthManager::new(session, policy());

        let result = manager.with_session(|s| s.act());
        assert!(matches!(result, Err(CrawlError::RecoveryFailed { attempts: 3, .. })));
        assert_eq!(manager.state(), SessionState::Failed);
        assert_eq!(manager.generation(), 0);
        assert_eq!(counters.calls.get(), 1);
        assert!(!manager.health_check());

        // The next query revives the session before touching it.
        manager.begin_query().unwrap();
        assert_eq!(manager.state(), SessionState::Active);
        assert_eq!(manager.with_session(|s| s.act()), Ok(7));
    }

    #[test]
    fn test_health_check_cadence() {
        let (session, counters) = FlakySession::new(0, TransportError::Timeout("x".into()));
        let mut manager = SessionHealthManager::new(session, policy());

        for _ in 0..19 {
            manager.note_query_processed();
            assert!(!manager.health_check_due());
        }
        manager.note_query_processed();
        assert!(manager.health_check_due());

        counters.responsive.set(false);
        manager.begin_query().unwrap();
        assert_eq!(counters.recreates.get(), 1);
        assert_eq!(manager.state(), SessionState::Active);
    }
}
