//! # 请求节流模块
//!
//! ## 设计思路
//!
//! 检测服务限制了请求频率。节流状态（上一次请求时间）由调用方持有的 `RateLimiter`
//! 管理，而不是进程级全局变量：独立的流水线各自持有实例，互不干扰。
//!
//! ## 实现思路
//!
//! `acquire` 在短暂持锁期间“预约”下一个可用时间槽，然后在锁外等待到该时间点。
//! 因此同一个限流器上的并发请求会被依次错开，而等待本身不会阻塞其他任务。
//!
//! 等待中的 `acquire` 被取消（外层超时或 future 被丢弃）时，若其后没有新的预约，
//! 预约会被撤回，后续请求不必为从未发出的请求让出间隔。

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

/// 最小请求间隔限流器。
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            next_slot: Mutex::new(None),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// 等待直到允许发出下一次请求。
    ///
    /// 返回本次实际等待的时长。
    pub async fn acquire(&self) -> Duration {
        let now = Instant::now();
        let (slot, mut reservation) = {
            let mut next_slot = self.lock_next_slot();
            let previous = *next_slot;
            let slot = match previous {
                Some(next) if next > now => next,
                _ => now,
            };
            let reserved_until = slot + self.min_interval;
            *next_slot = Some(reserved_until);
            (
                slot,
                SlotReservation {
                    limiter: self,
                    previous,
                    reserved_until,
                    armed: true,
                },
            )
        };

        let wait = slot.saturating_duration_since(now);
        if !wait.is_zero() {
            log::info!("⏳ 请求太频繁，延迟 {}ms 后发送", wait.as_millis());
            tokio::time::sleep_until(slot).await;
        }
        reservation.armed = false;
        wait
    }

    // 临界区内只有赋值，不会留下不一致状态，锁中毒时直接取回内部值
    fn lock_next_slot(&self) -> MutexGuard<'_, Option<Instant>> {
        self.next_slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// 一次尚未兑现的预约；在等待完成前被丢弃时撤回。
struct SlotReservation<'a> {
    limiter: &'a RateLimiter,
    previous: Option<Instant>,
    reserved_until: Instant,
    armed: bool,
}

impl Drop for SlotReservation<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut next_slot = self.limiter.lock_next_slot();
        // 已有更晚的预约排在后面时保持不动，避免打乱它们的间隔
        if *next_slot == Some(self.reserved_until) {
            *next_slot = self.previous;
            log::debug!("↩️ 等待被取消，撤回请求时间槽");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn first_request_is_not_delayed() {
        let limiter = RateLimiter::new(Duration::from_secs(1));
        assert_eq!(limiter.acquire().await, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn back_to_back_requests_are_spaced_by_interval() {
        let limiter = RateLimiter::new(Duration::from_secs(1));
        let start = Instant::now();

        limiter.acquire().await;
        limiter.acquire().await;
        limiter.acquire().await;

        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn request_after_interval_is_not_delayed() {
        let limiter = RateLimiter::new(Duration::from_millis(500));
        limiter.acquire().await;
        tokio::time::sleep(Duration::from_millis(800)).await;
        assert_eq!(limiter.acquire().await, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn independent_limiters_do_not_interact() {
        let a = RateLimiter::new(Duration::from_secs(5));
        let b = RateLimiter::new(Duration::from_secs(5));
        let start = Instant::now();

        a.acquire().await;
        b.acquire().await;

        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_wait_releases_its_slot() {
        let limiter = RateLimiter::new(Duration::from_secs(1));
        let start = Instant::now();

        limiter.acquire().await;
        let cancelled = tokio::time::timeout(Duration::from_millis(100), limiter.acquire()).await;
        assert!(cancelled.is_err());

        // 被取消的请求没有占用 1s 槽位，下一次仍排在 1s 而不是 2s
        limiter.acquire().await;
        assert_eq!(start.elapsed(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_wait_keeps_later_reservations() {
        let limiter = std::sync::Arc::new(RateLimiter::new(Duration::from_secs(1)));
        let start = Instant::now();
        limiter.acquire().await;

        let first = {
            let limiter = limiter.clone();
            tokio::spawn(async move { limiter.acquire().await })
        };
        tokio::task::yield_now().await;
        let second = {
            let limiter = limiter.clone();
            tokio::spawn(async move {
                limiter.acquire().await;
                Instant::now()
            })
        };
        tokio::task::yield_now().await;

        // 第一个等待者（1s 槽）被取消，第二个已预约 2s 槽，后续请求仍排在 3s
        first.abort();
        assert!(first.await.unwrap_err().is_cancelled());

        let finished = second.await.unwrap();
        assert_eq!(finished.duration_since(start), Duration::from_secs(2));
        limiter.acquire().await;
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_waiters_get_distinct_slots() {
        let limiter = std::sync::Arc::new(RateLimiter::new(Duration::from_secs(1)));
        let start = Instant::now();

        let handles: Vec<_> = (0..3)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move {
                    limiter.acquire().await;
                    Instant::now()
                })
            })
            .collect();

        let mut finished = Vec::new();
        for handle in handles {
            finished.push(handle.await.unwrap().duration_since(start));
        }
        finished.sort();

        assert_eq!(
            finished,
            vec![Duration::ZERO, Duration::from_secs(1), Duration::from_secs(2)]
        );
    }
}
