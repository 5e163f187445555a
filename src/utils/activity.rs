use std::time::Duration;

use moka::future::Cache;
use sqlx::MySqlPool;

/// Debounces `users.last_active_at` writes: at most one per user per TTL.
pub struct ActivityTracker {
    recent: Cache<u64, ()>,
}

impl ActivityTracker {
    pub fn new(debounce: Duration) -> Self {
        Self {
            recent: Cache::builder()
                .max_capacity(100_000)
                .time_to_live(debounce)
                .build(),
        }
    }

    /// True the first time a user is seen within the debounce window.
    pub async fn should_record(&self, user_id: u64) -> bool {
        if self.recent.contains_key(&user_id) {
            return false;
        }
        self.recent.insert(user_id, ()).await;
        true
    }

    /// Best effort; failures are logged and swallowed.
    pub async fn touch(&self, pool: &MySqlPool, user_id: u64) {
        if !self.should_record(user_id).await {
            return;
        }

        if let Err(e) = sqlx::query("UPDATE users SET last_active_at = UTC_TIMESTAMP() WHERE id = ?")
            .bind(user_id)
            .execute(pool)
            .await
        {
            tracing::warn!(error = %e, user_id, "Failed to update last_active_at");
            self.recent.invalidate(&user_id).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[actix_web::test]
    async fn records_once_per_window() {
        let tracker = ActivityTracker::new(Duration::from_secs(60));
        assert!(tracker.should_record(1).await);
        assert!(!tracker.should_record(1).await);
        assert!(tracker.should_record(2).await);
    }

    #[actix_web::test]
    async fn expired_entries_record_again() {
        let tracker = ActivityTracker::new(Duration::from_millis(20));
        assert!(tracker.should_record(1).await);
        actix_web::rt::time::sleep(Duration::from_millis(60)).await;
        assert!(tracker.should_record(1).await);
    }
}
