use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use tracing::debug;

use crate::error::QuotaError;

/// Per-user counters. `model_count + reserved` never exceeds the ledger
/// maximum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UserQuota {
    pub model_count: u32,
    pub reserved: u32,
}

impl UserQuota {
    fn in_use(&self) -> u32 {
        self.model_count.saturating_add(self.reserved)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserModelCount {
    pub user_id: String,
    pub model_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuotaSummary {
    pub total_users: usize,
    pub total_models_generated: u64,
    pub max_models_per_user: u32,
    pub users: Vec<UserModelCount>,
}

/// Process-local model quota, locked per user through the map entry.
#[derive(Debug, Clone)]
pub struct QuotaLedger {
    users: Arc<DashMap<String, UserQuota>>,
    max_models_per_user: u32,
}

impl QuotaLedger {
    pub fn new(max_models_per_user: u32) -> Self {
        Self {
            users: Arc::new(DashMap::new()),
            max_models_per_user,
        }
    }

    pub fn max_models_per_user(&self) -> u32 {
        self.max_models_per_user
    }

    /// Unknown users are always allowed.
    pub fn can_generate(&self, user_id: &str) -> bool {
        self.users
            .get(user_id)
            .is_none_or(|quota| quota.in_use() < self.max_models_per_user)
    }

    /// Records one finished generation.
    pub fn increment(&self, user_id: &str) -> Result<u32, QuotaError> {
        let mut quota = self.users.entry(user_id.to_string()).or_default();
        if quota.in_use() >= self.max_models_per_user {
            return Err(self.exceeded(user_id));
        }
        quota.model_count += 1;
        Ok(quota.model_count)
    }

    /// Holds one slot until the reservation is committed or dropped.
    pub fn reserve(&self, user_id: &str) -> Result<QuotaReservation, QuotaError> {
        let mut quota = self.users.entry(user_id.to_string()).or_default();
        if quota.in_use() >= self.max_models_per_user {
            return Err(self.exceeded(user_id));
        }
        quota.reserved += 1;
        Ok(QuotaReservation {
            users: Arc::clone(&self.users),
            user_id: user_id.to_string(),
            committed: false,
        })
    }

    pub fn count(&self, user_id: &str) -> u32 {
        self.users
            .get(user_id)
            .map(|quota| quota.model_count)
            .unwrap_or(0)
    }

    pub fn quota(&self, user_id: &str) -> Option<UserQuota> {
        self.users.get(user_id).map(|quota| *quota)
    }

    /// Zeroes the committed count; `false` for unknown users.
    pub fn reset(&self, user_id: &str) -> bool {
        match self.users.get_mut(user_id) {
            Some(mut quota) => {
                quota.model_count = 0;
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, user_id: &str) -> bool {
        self.users.remove(user_id).is_some()
    }

    pub fn summary(&self) -> QuotaSummary {
        let mut users: Vec<UserModelCount> = self
            .users
            .iter()
            .map(|entry| UserModelCount {
                user_id: entry.key().clone(),
                model_count: entry.value().model_count,
            })
            .collect();
        users.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        QuotaSummary {
            total_users: users.len(),
            total_models_generated: users.iter().map(|u| u64::from(u.model_count)).sum(),
            max_models_per_user: self.max_models_per_user,
            users,
        }
    }

    fn exceeded(&self, user_id: &str) -> QuotaError {
        QuotaError::QuotaExceeded {
            user_id: user_id.to_string(),
            limit: self.max_models_per_user,
        }
    }
}

/// One held quota slot. Dropping it uncommitted gives the slot back.
#[derive(Debug)]
#[must_use = "dropping a reservation releases it"]
pub struct QuotaReservation {
    users: Arc<DashMap<String, UserQuota>>,
    user_id: String,
    committed: bool,
}

impl QuotaReservation {
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Turns the held slot into a committed model and returns the new count.
    pub fn commit(mut self) -> u32 {
        self.committed = true;
        let mut quota = self.users.entry(self.user_id.clone()).or_default();
        quota.reserved = quota.reserved.saturating_sub(1);
        quota.model_count += 1;
        quota.model_count
    }
}

impl Drop for QuotaReservation {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        if let Some(mut quota) = self.users.get_mut(&self.user_id) {
            quota.reserved = quota.reserved.saturating_sub(1);
            debug!(user_id = %self.user_id, "released quota reservation");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use futures::future::join_all;

    use super::{QuotaLedger, UserModelCount, UserQuota};
    use crate::error::QuotaError;

    #[test]
    fn unknown_users_may_generate() {
        let ledger = QuotaLedger::new(2);
        assert!(ledger.can_generate("nobody"));
        assert_eq!(ledger.count("nobody"), 0);
    }

    #[test]
    fn increment_stops_at_the_limit() {
        let ledger = QuotaLedger::new(2);
        assert_eq!(ledger.increment("u"), Ok(1));
        assert_eq!(ledger.increment("u"), Ok(2));
        assert!(!ledger.can_generate("u"));
        assert_eq!(
            ledger.increment("u"),
            Err(QuotaError::QuotaExceeded {
                user_id: "u".into(),
                limit: 2
            })
        );
        assert_eq!(ledger.count("u"), 2);
    }

    #[test]
    fn reservations_hold_and_release_slots() {
        let ledger = QuotaLedger::new(1);
        let held = ledger.reserve("u").expect("first reservation");
        assert!(!ledger.can_generate("u"));
        assert!(ledger.reserve("u").is_err());

        drop(held);
        assert!(ledger.can_generate("u"));
        assert_eq!(ledger.quota("u"), Some(UserQuota::default()));

        let held = ledger.reserve("u").expect("slot released");
        assert_eq!(held.user_id(), "u");
        assert_eq!(held.commit(), 1);
        assert_eq!(
            ledger.quota("u"),
            Some(UserQuota {
                model_count: 1,
                reserved: 0
            })
        );
    }

    #[test]
    fn concurrent_increments_allow_exactly_one_success() {
        let ledger = QuotaLedger::new(10);
        for _ in 0..9 {
            ledger.increment("busy").expect("below limit");
        }

        let outcomes: Vec<_> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..16)
                .map(|_| scope.spawn(|| ledger.increment("busy")))
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().expect("thread panicked"))
                .collect()
        });

        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(outcomes.iter().filter(|r| r.is_err()).count(), 15);
        assert_eq!(ledger.count("busy"), 10);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_reservations_allow_exactly_one_success() {
        let ledger = Arc::new(QuotaLedger::new(10));
        for _ in 0..9 {
            ledger.increment("busy").expect("below limit");
        }

        let tasks = (0..16).map(|_| {
            let ledger = Arc::clone(&ledger);
            tokio::spawn(async move { ledger.reserve("busy").map(|held| held.commit()) })
        });
        let outcomes: Vec<_> = join_all(tasks)
            .await
            .into_iter()
            .map(|joined| joined.expect("task panicked"))
            .collect();

        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(outcomes.iter().filter_map(|r| r.as_ref().err()).all(|err| matches!(
            err,
            QuotaError::QuotaExceeded { limit: 10, .. }
        )));
        assert_eq!(ledger.count("busy"), 10);
    }

    #[test]
    fn admin_operations() {
        let ledger = QuotaLedger::new(5);
        ledger.increment("b").expect("increment");
        ledger.increment("a").expect("increment");
        ledger.increment("a").expect("increment");

        let summary = ledger.summary();
        assert_eq!(summary.total_users, 2);
        assert_eq!(summary.total_models_generated, 3);
        assert_eq!(summary.max_models_per_user, 5);
        assert_eq!(
            summary.users,
            vec![
                UserModelCount {
                    user_id: "a".into(),
                    model_count: 2
                },
                UserModelCount {
                    user_id: "b".into(),
                    model_count: 1
                },
            ]
        );

        assert!(ledger.reset("a"));
        assert_eq!(ledger.count("a"), 0);
        assert!(!ledger.reset("missing"));
        assert!(ledger.remove("b"));
        assert!(!ledger.remove("b"));
        assert_eq!(ledger.summary().total_users, 1);
    }
}
