use std::collections::VecDeque;

use log::debug;
use tokio::sync::oneshot;

use crate::config::Credentials;

/// In-memory holder of the credentials and the current bearer token.
///
/// Tokens live only as long as the client; nothing is written to disk.
#[derive(Debug)]
pub(crate) struct Session {
    pub(crate) credentials: Credentials,
    access_token: Option<String>,
    refresh_token: Option<String>,
    deferred: DeferredCalls,
}

impl Session {
    pub(crate) fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            access_token: None,
            refresh_token: None,
            deferred: DeferredCalls::default(),
        }
    }

    pub(crate) fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    #[cfg(test)]
    pub(crate) fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    /// Stores a fresh token and releases every call that was waiting for one.
    pub(crate) fn set_tokens(&mut self, access_token: String, refresh_token: Option<String>) {
        if refresh_token.is_some() {
            self.refresh_token = refresh_token;
        }
        self.deferred.flush(&access_token);
        self.access_token = Some(access_token);
    }

    pub(crate) fn clear_access_token(&mut self) {
        self.access_token = None;
    }

    /// Returns the token if there is one, otherwise queues the caller.
    pub(crate) fn token_or_defer(&mut self) -> TokenOrWait {
        match &self.access_token {
            Some(token) => TokenOrWait::Ready(token.clone()),
            None => TokenOrWait::Wait(self.deferred.enqueue()),
        }
    }

    pub(crate) fn abandon_deferred(&mut self) -> usize {
        self.deferred.abandon()
    }
}

pub(crate) enum TokenOrWait {
    Ready(String),
    Wait(oneshot::Receiver<Release>),
}

/// Handed to a deferred call once a token exists.
///
/// Released calls form a chain: each one may only send after the call queued
/// before it has sent and dropped its `Release`.
#[derive(Debug)]
pub(crate) struct Release {
    token: String,
    turn: Option<oneshot::Receiver<()>>,
    _done: oneshot::Sender<()>,
}

impl Release {
    pub(crate) fn token(&self) -> &str {
        &self.token
    }

    /// Waits until every call queued earlier has sent its request.
    pub(crate) async fn wait_turn(&mut self) {
        if let Some(turn) = self.turn.as_mut() {
            // Dropping the previous `Release` closes the channel; that is the signal.
            let _ = turn.await;
            self.turn = None;
        }
    }
}

/// Calls issued before a token exists, in arrival order.
#[derive(Debug, Default)]
pub(crate) struct DeferredCalls {
    waiters: VecDeque<oneshot::Sender<Release>>,
}

impl DeferredCalls {
    pub(crate) fn enqueue(&mut self) -> oneshot::Receiver<Release> {
        // Callers that timed out have dropped their receivers.
        self.waiters.retain(|waiter| !waiter.is_closed());

        let (tx, rx) = oneshot::channel();
        self.waiters.push_back(tx);
        debug!("Deferring call until authenticated ({} pending)", self.waiters.len());
        rx
    }

    pub(crate) fn flush(&mut self, token: &str) {
        if self.waiters.is_empty() {
            return;
        }

        debug!("Releasing {} deferred call(s)", self.waiters.len());
        let mut turn = None;
        while let Some(waiter) = self.waiters.pop_front() {
            let (done, next_turn) = oneshot::channel();
            let release = Release {
                token: token.to_string(),
                turn: turn.take(),
                _done: done,
            };
            match waiter.send(release) {
                Ok(()) => turn = Some(next_turn),
                // Nobody is waiting any more; the next call inherits this turn.
                Err(mut unclaimed) => turn = unclaimed.turn.take(),
            }
        }
    }

    /// Drops every waiter; each pending call observes a closed channel.
    pub(crate) fn abandon(&mut self) -> usize {
        let count = self.waiters.len();
        self.waiters.clear();
        count
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.waiters.len()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_flush_releases_in_arrival_order() {
        let mut deferred = DeferredCalls::default();
        let mut first = deferred.enqueue();
        let mut second = deferred.enqueue();
        assert_eq!(deferred.len(), 2);

        deferred.flush("token-1");
        assert_eq!(deferred.len(), 0);
        assert_eq!(first.try_recv().unwrap().token(), "token-1");
        assert_eq!(second.try_recv().unwrap().token(), "token-1");
    }

    #[test]
    fn test_flush_skips_dropped_waiters() {
        let mut deferred = DeferredCalls::default();
        let dropped = deferred.enqueue();
        let mut kept = deferred.enqueue();
        drop(dropped);

        deferred.flush("token-1");
        assert_eq!(kept.try_recv().unwrap().token(), "token-1");
    }

    #[test]
    fn test_timed_out_waiters_are_pruned() {
        let mut deferred = DeferredCalls::default();
        for _ in 0..1000 {
            drop(deferred.enqueue());
        }
        assert_eq!(deferred.len(), 1);

        let _live = deferred.enqueue();
        drop(deferred.enqueue());
        let _also_live = deferred.enqueue();
        assert_eq!(deferred.len(), 2);
    }

    #[tokio::test]
    async fn test_released_calls_take_turns_in_arrival_order() {
        let mut deferred = DeferredCalls::default();
        let mut first = deferred.enqueue();
        let mut second = deferred.enqueue();
        let mut third = deferred.enqueue();
        deferred.flush("token-1");

        let mut first = first.try_recv().unwrap();
        let mut second = second.try_recv().unwrap();
        let mut third = third.try_recv().unwrap();

        first.wait_turn().await;
        let early = tokio::time::timeout(Duration::from_millis(20), second.wait_turn()).await;
        assert!(early.is_err(), "second call went before the first finished");

        drop(first);
        tokio::time::timeout(Duration::from_secs(1), second.wait_turn())
            .await
            .unwrap();
        let early = tokio::time::timeout(Duration::from_millis(20), third.wait_turn()).await;
        assert!(early.is_err(), "third call went before the second finished");

        drop(second);
        tokio::time::timeout(Duration::from_secs(1), third.wait_turn())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_turn_passes_over_abandoned_waiter() {
        let mut deferred = DeferredCalls::default();
        let mut first = deferred.enqueue();
        let gone = deferred.enqueue();
        let mut third = deferred.enqueue();
        drop(gone);
        deferred.flush("token-1");

        let first = first.try_recv().unwrap();
        let mut third = third.try_recv().unwrap();
        let early = tokio::time::timeout(Duration::from_millis(20), third.wait_turn()).await;
        assert!(early.is_err(), "third call skipped ahead of the first");

        drop(first);
        tokio::time::timeout(Duration::from_secs(1), third.wait_turn())
            .await
            .unwrap();
    }

    #[test]
    fn test_abandon_closes_waiters() {
        let mut deferred = DeferredCalls::default();
        let mut waiter = deferred.enqueue();
        assert_eq!(deferred.abandon(), 1);
        assert!(waiter.try_recv().is_err());
    }

    #[test]
    fn test_session_defers_until_token_set() {
        let mut session = Session::new(Credentials::default());
        let TokenOrWait::Wait(mut rx) = session.token_or_defer() else {
            panic!("expected the call to be deferred");
        };
        assert!(rx.try_recv().is_err());

        session.set_tokens("access".to_string(), Some("refresh".to_string()));
        assert_eq!(rx.try_recv().unwrap().token(), "access");
        assert_eq!(session.refresh_token(), Some("refresh"));

        match session.token_or_defer() {
            TokenOrWait::Ready(token) => assert_eq!(token, "access"),
            TokenOrWait::Wait(_) => panic!("token should be available"),
        }
    }

    #[test]
    fn test_set_tokens_keeps_previous_refresh_token() {
        let mut session = Session::new(Credentials::default());
        session.set_tokens("a1".to_string(), Some("r1".to_string()));
        session.set_tokens("a2".to_string(), None);
        assert_eq!(session.access_token(), Some("a2"));
        assert_eq!(session.refresh_token(), Some("r1"));

        session.clear_access_token();
        assert!(session.access_token().is_none());
    }
}
