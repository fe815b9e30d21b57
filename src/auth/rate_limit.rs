use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use chrono::{DateTime, Utc, Duration};

/// Named buckets the API rate limits on.
pub const TRACKING_BUCKET: &str = "tracking";
pub const RESERVATION_BUCKET: &str = "reservation";
pub const LOGIN_BUCKET: &str = "login";

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub window_size: Duration,
    pub limits: HashMap<String, u32>,
}

impl RateLimitConfig {
    pub fn new(tracking_per_window: u32, reservations_per_window: u32) -> Self {
        let mut config = Self::default();
        config.limits.insert(TRACKING_BUCKET.to_string(), tracking_per_window);
        config.limits.insert(RESERVATION_BUCKET.to_string(), reservations_per_window);
        config
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        let mut limits = HashMap::new();
        limits.insert(TRACKING_BUCKET.to_string(), 120);
        limits.insert(RESERVATION_BUCKET.to_string(), 5);
        limits.insert(LOGIN_BUCKET.to_string(), 10);

        Self {
            window_size: Duration::minutes(1),
            limits,
        }
    }
}

#[derive(Debug)]
struct RequestWindow {
    timestamps: Vec<DateTime<Utc>>,
}

impl RequestWindow {
    fn new() -> Self {
        Self {
            timestamps: Vec::new(),
        }
    }

    fn cleanup_old_requests(&mut self, window_size: Duration) {
        let cutoff = Utc::now() - window_size;
        self.timestamps.retain(|ts| *ts > cutoff);
    }

    fn add_request(&mut self) {
        self.timestamps.push(Utc::now());
    }

    fn request_count(&self) -> usize {
        self.timestamps.len()
    }
}

/// Sliding-window limiter keyed by `(bucket, key)`, where the key is an
/// opaque client identifier such as a hashed IP.
pub struct RateLimiter {
    windows: Arc<RwLock<HashMap<(String, String), RequestWindow>>>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            windows: Arc::new(RwLock::new(HashMap::new())),
            config,
        }
    }

    /// Records a request and returns whether it is within the bucket's limit.
    /// Buckets without a configured limit are never throttled.
    pub async fn check_rate_limit(&self, bucket: &str, key: &str) -> bool {
        let Some(limit) = self.config.limits.get(bucket).copied() else {
            return true;
        };

        let mut windows = self.windows.write().await;
        let window = windows
            .entry((bucket.to_string(), key.to_string()))
            .or_insert_with(RequestWindow::new);

        window.cleanup_old_requests(self.config.window_size);

        if window.request_count() < limit as usize {
            window.add_request();
            true
        } else {
            false
        }
    }

    pub async fn cleanup(&self) {
        let mut windows = self.windows.write().await;

        windows.retain(|_, window| {
            window.cleanup_old_requests(self.config.window_size);
            !window.timestamps.is_empty()
        });
    }

    pub async fn tracked_keys(&self) -> usize {
        self.windows.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{sleep, Duration as TokioDuration};

    #[tokio::test]
    async fn test_rate_limiter() {
        let mut config = RateLimitConfig::new(3, 1);
        config.window_size = Duration::seconds(1);
        let limiter = RateLimiter::new(config);

        for _ in 0..3 {
            assert!(limiter.check_rate_limit(TRACKING_BUCKET, "ip-a").await);
        }
        assert!(!limiter.check_rate_limit(TRACKING_BUCKET, "ip-a").await);

        // Separate keys and buckets have separate windows
        assert!(limiter.check_rate_limit(TRACKING_BUCKET, "ip-b").await);
        assert!(limiter.check_rate_limit(RESERVATION_BUCKET, "ip-a").await);
        assert!(!limiter.check_rate_limit(RESERVATION_BUCKET, "ip-a").await);

        sleep(TokioDuration::from_millis(1100)).await;

        assert!(limiter.check_rate_limit(TRACKING_BUCKET, "ip-a").await);
    }

    #[tokio::test]
    async fn unknown_bucket_is_unlimited() {
        let limiter = RateLimiter::new(RateLimitConfig::default());
        for _ in 0..1000 {
            assert!(limiter.check_rate_limit("uploads", "ip-a").await);
        }
    }

    #[tokio::test]
    async fn cleanup_drops_idle_windows() {
        let mut config = RateLimitConfig::default();
        config.window_size = Duration::milliseconds(50);
        let limiter = RateLimiter::new(config);

        limiter.check_rate_limit(LOGIN_BUCKET, "ip-a").await;
        assert_eq!(limiter.tracked_keys().await, 1);

        sleep(TokioDuration::from_millis(100)).await;
        limiter.cleanup().await;
        assert_eq!(limiter.tracked_keys().await, 0);
    }
}
