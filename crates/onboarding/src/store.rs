//! User and OTP challenge storage.
//!
//! The safety-critical OTP mutations (`transition_to_used`, `refresh_pending`)
//! are single conditional writes: the store matches and mutates in one
//! critical section, never read-then-write at the engine layer. That single
//! write is what serializes concurrent verify/resend races on one record.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use jobhub_core::UserId;

use crate::types::{ChallengeId, OtpChallenge, OtpStatus, UserRecord};

// ─────────────────────────────────────────────────────────────────────────────
// User store
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, thiserror::Error)]
pub enum UserStoreError {
    #[error("user not found")]
    NotFound,
    #[error("email already registered")]
    DuplicateEmail,
    #[error("storage error: {0}")]
    Storage(String),
}

/// User persistence abstraction.
///
/// Emails are expected to be normalized by the caller before they get here;
/// the store enforces uniqueness on the exact string it is given.
pub trait UserStore: Send + Sync {
    fn create(&self, user: UserRecord) -> Result<(), UserStoreError>;

    fn find_by_id(&self, id: UserId) -> Result<Option<UserRecord>, UserStoreError>;

    fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, UserStoreError>;

    /// Flip the verified flag. Idempotent: verifying an already-verified user
    /// is harmless.
    fn mark_verified(&self, id: UserId) -> Result<(), UserStoreError>;
}

impl<T: UserStore + ?Sized> UserStore for std::sync::Arc<T> {
    fn create(&self, user: UserRecord) -> Result<(), UserStoreError> {
        (**self).create(user)
    }

    fn find_by_id(&self, id: UserId) -> Result<Option<UserRecord>, UserStoreError> {
        (**self).find_by_id(id)
    }

    fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, UserStoreError> {
        (**self).find_by_email(email)
    }

    fn mark_verified(&self, id: UserId) -> Result<(), UserStoreError> {
        (**self).mark_verified(id)
    }
}

/// In-memory user store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    inner: RwLock<UserRows>,
}

#[derive(Debug, Default)]
struct UserRows {
    users: HashMap<UserId, UserRecord>,
    by_email: HashMap<String, UserId>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UserStore for InMemoryUserStore {
    fn create(&self, user: UserRecord) -> Result<(), UserStoreError> {
        let mut rows = self.inner.write().unwrap();
        if rows.by_email.contains_key(&user.email) {
            return Err(UserStoreError::DuplicateEmail);
        }
        rows.by_email.insert(user.email.clone(), user.id);
        rows.users.insert(user.id, user);
        Ok(())
    }

    fn find_by_id(&self, id: UserId) -> Result<Option<UserRecord>, UserStoreError> {
        Ok(self.inner.read().unwrap().users.get(&id).cloned())
    }

    fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, UserStoreError> {
        let rows = self.inner.read().unwrap();
        Ok(rows
            .by_email
            .get(email)
            .and_then(|id| rows.users.get(id))
            .cloned())
    }

    fn mark_verified(&self, id: UserId) -> Result<(), UserStoreError> {
        let mut rows = self.inner.write().unwrap();
        let user = rows.users.get_mut(&id).ok_or(UserStoreError::NotFound)?;
        user.email_verified = true;
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// OTP store
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, thiserror::Error)]
pub enum OtpStoreError {
    #[error("challenge not found")]
    NotFound,
    #[error("storage error: {0}")]
    Storage(String),
}

/// OTP challenge persistence abstraction.
pub trait OtpStore: Send + Sync {
    fn create(&self, challenge: OtpChallenge) -> Result<(), OtpStoreError>;

    fn find_by_id(&self, id: ChallengeId) -> Result<Option<OtpChallenge>, OtpStoreError>;

    /// Most recently created challenge for the user, regardless of status.
    fn find_latest_for_user(&self, user_id: UserId)
    -> Result<Option<OtpChallenge>, OtpStoreError>;

    /// Challenges created for the user at or after `since` (rolling-window
    /// rate limiting).
    fn count_created_since(
        &self,
        user_id: UserId,
        since: DateTime<Utc>,
    ) -> Result<usize, OtpStoreError>;

    /// Atomic conditional transition to Used.
    ///
    /// Matches a record by id AND code hash AND Pending status AND unexpired
    /// AND failed attempts below the cap, and flips it to Used in the same
    /// step. Returns the post-image on match, `None` otherwise — without
    /// revealing which condition failed.
    fn transition_to_used(
        &self,
        id: ChallengeId,
        code_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<OtpChallenge>, OtpStoreError>;

    /// Best-effort failed-attempt increment on the record by id. Flips the
    /// record to Blocked once the cap is reached. A missing record is not an
    /// error.
    fn record_failed_attempt(&self, id: ChallengeId) -> Result<(), OtpStoreError>;

    /// Conditional resend rewrite: if the record is still Pending, overwrite
    /// the code hash and expiry, increment the send counter, and reset the
    /// failed-attempt counter. Returns the post-image on match.
    fn refresh_pending(
        &self,
        id: ChallengeId,
        new_code_hash: &str,
        new_expires_at: DateTime<Utc>,
    ) -> Result<Option<OtpChallenge>, OtpStoreError>;

    /// Retire a challenge (e.g. after a failed email dispatch) so verify can
    /// never match it.
    fn discard(&self, id: ChallengeId) -> Result<(), OtpStoreError>;

    /// TTL cleanup: drop rows whose expiry has passed. Returns the number of
    /// rows removed.
    fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, OtpStoreError>;
}

impl<T: OtpStore + ?Sized> OtpStore for std::sync::Arc<T> {
    fn create(&self, challenge: OtpChallenge) -> Result<(), OtpStoreError> {
        (**self).create(challenge)
    }

    fn find_by_id(&self, id: ChallengeId) -> Result<Option<OtpChallenge>, OtpStoreError> {
        (**self).find_by_id(id)
    }

    fn find_latest_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Option<OtpChallenge>, OtpStoreError> {
        (**self).find_latest_for_user(user_id)
    }

    fn count_created_since(
        &self,
        user_id: UserId,
        since: DateTime<Utc>,
    ) -> Result<usize, OtpStoreError> {
        (**self).count_created_since(user_id, since)
    }

    fn transition_to_used(
        &self,
        id: ChallengeId,
        code_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<OtpChallenge>, OtpStoreError> {
        (**self).transition_to_used(id, code_hash, now)
    }

    fn record_failed_attempt(&self, id: ChallengeId) -> Result<(), OtpStoreError> {
        (**self).record_failed_attempt(id)
    }

    fn refresh_pending(
        &self,
        id: ChallengeId,
        new_code_hash: &str,
        new_expires_at: DateTime<Utc>,
    ) -> Result<Option<OtpChallenge>, OtpStoreError> {
        (**self).refresh_pending(id, new_code_hash, new_expires_at)
    }

    fn discard(&self, id: ChallengeId) -> Result<(), OtpStoreError> {
        (**self).discard(id)
    }

    fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, OtpStoreError> {
        (**self).purge_expired(now)
    }
}

/// In-memory OTP store for tests/dev.
///
/// Every conditional mutation happens under a single write lock, which gives
/// the same serialization the production document store provides through
/// conditional single-document updates.
#[derive(Debug, Default)]
pub struct InMemoryOtpStore {
    rows: RwLock<HashMap<ChallengeId, OtpChallenge>>,
}

impl InMemoryOtpStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OtpStore for InMemoryOtpStore {
    fn create(&self, challenge: OtpChallenge) -> Result<(), OtpStoreError> {
        self.rows.write().unwrap().insert(challenge.id, challenge);
        Ok(())
    }

    fn find_by_id(&self, id: ChallengeId) -> Result<Option<OtpChallenge>, OtpStoreError> {
        Ok(self.rows.read().unwrap().get(&id).cloned())
    }

    fn find_latest_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Option<OtpChallenge>, OtpStoreError> {
        let rows = self.rows.read().unwrap();
        Ok(rows
            .values()
            .filter(|c| c.user_id == user_id)
            .max_by_key(|c| (c.created_at, c.id.0))
            .cloned())
    }

    fn count_created_since(
        &self,
        user_id: UserId,
        since: DateTime<Utc>,
    ) -> Result<usize, OtpStoreError> {
        let rows = self.rows.read().unwrap();
        Ok(rows
            .values()
            .filter(|c| c.user_id == user_id && c.created_at >= since)
            .count())
    }

    fn transition_to_used(
        &self,
        id: ChallengeId,
        code_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<OtpChallenge>, OtpStoreError> {
        let mut rows = self.rows.write().unwrap();
        match rows.get_mut(&id) {
            Some(c)
                if c.status == OtpStatus::Pending
                    && c.code_hash == code_hash
                    && c.expires_at > now
                    && c.attempts < c.max_attempts =>
            {
                c.status = OtpStatus::Used;
                Ok(Some(c.clone()))
            }
            _ => Ok(None),
        }
    }

    fn record_failed_attempt(&self, id: ChallengeId) -> Result<(), OtpStoreError> {
        let mut rows = self.rows.write().unwrap();
        if let Some(c) = rows.get_mut(&id) {
            // A Used challenge is immutable.
            if c.status == OtpStatus::Used {
                return Ok(());
            }
            c.attempts = c.attempts.saturating_add(1);
            if c.attempts >= c.max_attempts {
                c.status = OtpStatus::Blocked;
            }
        }
        Ok(())
    }

    fn refresh_pending(
        &self,
        id: ChallengeId,
        new_code_hash: &str,
        new_expires_at: DateTime<Utc>,
    ) -> Result<Option<OtpChallenge>, OtpStoreError> {
        let mut rows = self.rows.write().unwrap();
        match rows.get_mut(&id) {
            Some(c) if c.status == OtpStatus::Pending => {
                c.code_hash = new_code_hash.to_string();
                c.expires_at = new_expires_at;
                c.attempts = 0;
                c.send_attempts = c.send_attempts.saturating_add(1);
                Ok(Some(c.clone()))
            }
            _ => Ok(None),
        }
    }

    fn discard(&self, id: ChallengeId) -> Result<(), OtpStoreError> {
        let mut rows = self.rows.write().unwrap();
        if let Some(c) = rows.get_mut(&id) {
            if c.status == OtpStatus::Pending {
                c.status = OtpStatus::Expired;
            }
        }
        Ok(())
    }

    fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, OtpStoreError> {
        let mut rows = self.rows.write().unwrap();
        let before = rows.len();
        rows.retain(|_, c| c.expires_at > now);
        Ok(before - rows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::hash_code;
    use chrono::Duration;

    fn challenge(user: UserId, code: &str, now: DateTime<Utc>) -> OtpChallenge {
        OtpChallenge::new(user, hash_code(code), now + Duration::minutes(5), 5, now)
    }

    #[test]
    fn transition_to_used_consumes_exactly_once() {
        let store = InMemoryOtpStore::new();
        let now = Utc::now();
        let c = challenge(UserId::new(), "123456", now);
        let id = c.id;
        store.create(c).unwrap();

        let hash = hash_code("123456");
        let first = store.transition_to_used(id, &hash, now).unwrap();
        assert_eq!(first.unwrap().status, OtpStatus::Used);

        // Replay with the same (correct) code no longer matches.
        assert!(store.transition_to_used(id, &hash, now).unwrap().is_none());
    }

    #[test]
    fn expired_challenge_never_matches() {
        let store = InMemoryOtpStore::new();
        let now = Utc::now();
        let c = challenge(UserId::new(), "123456", now);
        let id = c.id;
        store.create(c).unwrap();

        let later = now + Duration::minutes(6);
        let hash = hash_code("123456");
        assert!(store.transition_to_used(id, &hash, later).unwrap().is_none());
        assert_eq!(store.find_by_id(id).unwrap().unwrap().status, OtpStatus::Pending);
    }

    #[test]
    fn attempt_cap_blocks_correct_code() {
        let store = InMemoryOtpStore::new();
        let now = Utc::now();
        let c = challenge(UserId::new(), "123456", now);
        let id = c.id;
        store.create(c).unwrap();

        for _ in 0..5 {
            store.record_failed_attempt(id).unwrap();
        }
        assert_eq!(store.find_by_id(id).unwrap().unwrap().status, OtpStatus::Blocked);

        let hash = hash_code("123456");
        assert!(store.transition_to_used(id, &hash, now).unwrap().is_none());
    }

    #[test]
    fn refresh_resets_attempts_and_bumps_send_counter() {
        let store = InMemoryOtpStore::new();
        let now = Utc::now();
        let c = challenge(UserId::new(), "123456", now);
        let id = c.id;
        store.create(c).unwrap();

        store.record_failed_attempt(id).unwrap();
        store.record_failed_attempt(id).unwrap();

        let refreshed = store
            .refresh_pending(id, &hash_code("654321"), now + Duration::minutes(5))
            .unwrap()
            .unwrap();
        assert_eq!(refreshed.attempts, 0);
        assert_eq!(refreshed.send_attempts, 2);

        // Old code is gone, new code matches.
        assert!(store.transition_to_used(id, &hash_code("123456"), now).unwrap().is_none());
        assert!(store.transition_to_used(id, &hash_code("654321"), now).unwrap().is_some());
    }

    #[test]
    fn used_challenge_is_immutable_to_refresh_and_attempts() {
        let store = InMemoryOtpStore::new();
        let now = Utc::now();
        let c = challenge(UserId::new(), "123456", now);
        let id = c.id;
        store.create(c).unwrap();

        store.transition_to_used(id, &hash_code("123456"), now).unwrap().unwrap();

        assert!(store
            .refresh_pending(id, &hash_code("000000"), now + Duration::minutes(5))
            .unwrap()
            .is_none());

        store.record_failed_attempt(id).unwrap();
        let row = store.find_by_id(id).unwrap().unwrap();
        assert_eq!(row.status, OtpStatus::Used);
        assert_eq!(row.attempts, 0);
    }

    #[test]
    fn count_created_since_honors_window() {
        let store = InMemoryOtpStore::new();
        let user = UserId::new();
        let now = Utc::now();

        for i in 0..3 {
            let mut c = challenge(user, "123456", now);
            c.created_at = now - Duration::minutes(10 * i);
            store.create(c).unwrap();
        }

        let one_hour_ago = now - Duration::hours(1);
        assert_eq!(store.count_created_since(user, one_hour_ago).unwrap(), 3);
        assert_eq!(
            store.count_created_since(user, now - Duration::minutes(15)).unwrap(),
            2
        );
    }

    #[test]
    fn purge_drops_only_expired_rows() {
        let store = InMemoryOtpStore::new();
        let now = Utc::now();
        let user = UserId::new();

        let live = challenge(user, "123456", now);
        let mut dead = challenge(user, "654321", now);
        dead.expires_at = now - Duration::minutes(1);
        let live_id = live.id;
        store.create(live).unwrap();
        store.create(dead).unwrap();

        assert_eq!(store.purge_expired(now).unwrap(), 1);
        assert!(store.find_by_id(live_id).unwrap().is_some());
    }

    #[test]
    fn user_store_enforces_unique_email() {
        let store = InMemoryUserStore::new();
        let now = Utc::now();
        let a = UserRecord::new("a@x.com".into(), "Ann".into(), "hash".into(), now);
        let b = UserRecord::new("a@x.com".into(), "Ann Again".into(), "hash".into(), now);

        store.create(a).unwrap();
        assert!(matches!(
            store.create(b),
            Err(UserStoreError::DuplicateEmail)
        ));
    }

    #[test]
    fn mark_verified_is_idempotent() {
        let store = InMemoryUserStore::new();
        let now = Utc::now();
        let user = UserRecord::new("a@x.com".into(), "Ann".into(), "hash".into(), now);
        let id = user.id;
        store.create(user).unwrap();

        store.mark_verified(id).unwrap();
        store.mark_verified(id).unwrap();
        assert!(store.find_by_id(id).unwrap().unwrap().email_verified);
    }
}
