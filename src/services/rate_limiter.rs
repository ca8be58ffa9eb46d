//! 自适应限流
//!
//! 每个平台一条记录，保存最近一小时内的提交时间、错误计数和当前间隔。
//! 记录存放在 `DashMap` 中，同一平台的读改写在分片锁内完成，
//! 多条提交流水线共用一个实例时不会丢失更新。

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::RateLimitConfig;
use crate::error::AppResult;
use crate::models::SubmissionStatus;
use crate::utils::{jitter, pause};

/// 滑动窗口长度
pub const WINDOW: Duration = Duration::from_secs(3600);

const JITTER_RATIO: f64 = 0.2;
const FLAT_PENALTY: Duration = Duration::from_secs(10);

/// 失败原因，决定间隔增长的幅度
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    RateLimited,
    Captcha,
    Other,
}

impl ErrorKind {
    pub fn from_status(status: SubmissionStatus) -> Self {
        match status {
            SubmissionStatus::RateLimited => ErrorKind::RateLimited,
            SubmissionStatus::CaptchaDetected => ErrorKind::Captcha,
            _ => ErrorKind::Other,
        }
    }
}

/// 单个平台的限流记录
#[derive(Debug, Clone)]
pub struct RateLimitEntry {
    /// 窗口内的提交时间，按时间顺序
    pub submissions: VecDeque<Instant>,
    pub total_submissions: usize,
    pub error_count: u32,
    pub current_delay: Duration,
    pub last_submission: Option<Instant>,
}

impl RateLimitEntry {
    fn new(min_delay: Duration) -> Self {
        Self {
            submissions: VecDeque::new(),
            total_submissions: 0,
            error_count: 0,
            current_delay: min_delay,
            last_submission: None,
        }
    }

    /// 丢弃超出窗口的记录
    fn prune(&mut self, now: Instant) {
        while let Some(oldest) = self.submissions.front() {
            if now.duration_since(*oldest) >= WINDOW {
                self.submissions.pop_front();
            } else {
                break;
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitStatus {
    Ok,
    Warning,
    RateLimited,
}

impl fmt::Display for RateLimitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RateLimitStatus::Ok => "OK",
            RateLimitStatus::Warning => "WARNING",
            RateLimitStatus::RateLimited => "RATE_LIMITED",
        })
    }
}

/// 平台统计
#[derive(Debug, Clone, PartialEq)]
pub struct PlatformStats {
    pub total_submissions: usize,
    pub submissions_last_hour: usize,
    pub error_count: u32,
    pub current_delay: Duration,
    pub status: RateLimitStatus,
    pub remaining_quota: usize,
}

/// 自适应限流器
///
/// 由调用方显式创建并注入，测试中每个用例各用一个实例
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    entries: DashMap<String, RateLimitEntry>,
}

impl RateLimiter {
    /// `max_delay` 小于 `min_delay` 时抬高到 `min_delay`
    pub fn new(mut config: RateLimitConfig) -> Self {
        if config.max_delay < config.min_delay {
            warn!(
                "限流配置的最大间隔 {:?} 小于最小间隔 {:?}，按最小间隔处理",
                config.max_delay, config.min_delay
            );
            config.max_delay = config.min_delay;
        }
        Self {
            config,
            entries: DashMap::new(),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// 窗口内的提交数是否低于上限
    pub fn check(&self, platform: &str) -> bool {
        let Some(mut entry) = self.entries.get_mut(platform) else {
            return true;
        };
        entry.prune(Instant::now());
        let count = entry.submissions.len();
        if count >= self.config.default_rate {
            warn!(
                "⏳ {} 已达到限流上限: {}/{} 每小时",
                platform, count, self.config.default_rate
            );
            return false;
        }
        true
    }

    /// 下一次提交前需要等待的时长
    ///
    /// 当前间隔加 ±20% 抖动后限制在 [min_delay, max_delay]，再减去距上次提交已过去的时间
    pub fn required_delay(&self, platform: &str) -> Duration {
        let (base, last) = match self.entries.get(platform) {
            Some(entry) => (entry.current_delay, entry.last_submission),
            None => (self.config.min_delay, None),
        };
        let delay = jitter(base, JITTER_RATIO).clamp(self.config.min_delay, self.config.max_delay);
        match last {
            Some(last) => delay.saturating_sub(Instant::now().duration_since(last)),
            None => delay,
        }
    }

    /// 按需等待，返回实际等待的时长
    pub async fn wait_if_needed(
        &self,
        platform: &str,
        cancel: &CancellationToken,
    ) -> AppResult<Duration> {
        let delay = self.required_delay(platform);
        if !delay.is_zero() {
            info!("⏱️ 等待 {:.1} 秒后再向 {} 提交", delay.as_secs_f64(), platform);
            pause(delay, cancel).await?;
        }
        Ok(delay)
    }

    /// 记录一次提交尝试并调整间隔
    pub fn record(&self, platform: &str, success: bool, error_kind: Option<ErrorKind>) {
        let now = Instant::now();
        let min = self.config.min_delay;
        let max = self.config.max_delay;

        let mut entry = self
            .entries
            .entry(platform.to_string())
            .or_insert_with(|| RateLimitEntry::new(min));
        entry.prune(now);
        entry.submissions.push_back(now);
        entry.total_submissions += 1;
        entry.last_submission = Some(now);

        if success {
            if entry.current_delay > min {
                entry.current_delay = entry.current_delay.mul_f64(0.9).max(min);
            }
            entry.error_count = entry.error_count.saturating_sub(1);
            return;
        }

        entry.error_count += 1;
        entry.current_delay = match error_kind.unwrap_or(ErrorKind::Other) {
            ErrorKind::RateLimited => entry.current_delay.saturating_mul(2),
            ErrorKind::Captcha => entry.current_delay.mul_f64(1.5),
            ErrorKind::Other => entry.current_delay + FLAT_PENALTY,
        }
        .min(max);
        warn!(
            "⚠️ {} 提交失败 ({:?})，间隔调整为 {} 秒",
            platform,
            error_kind,
            entry.current_delay.as_secs()
        );
    }

    pub fn get_stats(&self, platform: &str) -> PlatformStats {
        let rate = self.config.default_rate;
        let Some(mut entry) = self.entries.get_mut(platform) else {
            return PlatformStats {
                total_submissions: 0,
                submissions_last_hour: 0,
                error_count: 0,
                current_delay: self.config.min_delay,
                status: RateLimitStatus::Ok,
                remaining_quota: rate,
            };
        };
        entry.prune(Instant::now());
        let recent = entry.submissions.len();
        let status = if recent >= rate {
            RateLimitStatus::RateLimited
        } else if recent as f64 >= rate as f64 * 0.8 {
            RateLimitStatus::Warning
        } else {
            RateLimitStatus::Ok
        };
        PlatformStats {
            total_submissions: entry.total_submissions,
            submissions_last_hour: recent,
            error_count: entry.error_count,
            current_delay: entry.current_delay,
            status,
            remaining_quota: rate.saturating_sub(recent),
        }
    }

    pub fn get_all_stats(&self) -> BTreeMap<String, PlatformStats> {
        let platforms: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        platforms
            .into_iter()
            .map(|p| {
                let stats = self.get_stats(&p);
                (p, stats)
            })
            .collect()
    }

    pub fn reset(&self, platform: &str) {
        if let Some(mut entry) = self.entries.get_mut(platform) {
            *entry = RateLimitEntry::new(self.config.min_delay);
        }
        info!("🔄 已重置 {} 的限流状态", platform);
    }

    /// 限流时距最早一条记录离开窗口的时长
    pub fn suggest_wait(&self, platform: &str) -> Option<Duration> {
        let mut entry = self.entries.get_mut(platform)?;
        let now = Instant::now();
        entry.prune(now);
        if entry.submissions.len() < self.config.default_rate {
            return None;
        }
        let oldest = *entry.submissions.front()?;
        Some(WINDOW.saturating_sub(now.duration_since(oldest)))
    }

    /// 面向用户的节奏建议
    pub fn suggest_optimal_timing(&self, platform: &str) -> String {
        let stats = self.get_stats(platform);
        match stats.status {
            RateLimitStatus::RateLimited => {
                let minutes = self.suggest_wait(platform).unwrap_or_default().as_secs() / 60;
                format!("Rate limit reached. Wait {} minutes for quota reset.", minutes)
            }
            RateLimitStatus::Warning => format!(
                "Approaching rate limit ({}/{}). Consider slowing down.",
                stats.submissions_last_hour, self.config.default_rate
            ),
            RateLimitStatus::Ok => format!(
                "OK to submit. {} submissions remaining this hour. Current delay: {}s",
                stats.remaining_quota,
                stats.current_delay.as_secs()
            ),
        }
    }
}
