//! 可取消的等待

use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, AppResult};

/// 等待指定时长，期间收到取消信号则返回 `AppError::Cancelled`
pub async fn pause(duration: Duration, cancel: &CancellationToken) -> AppResult<()> {
    if cancel.is_cancelled() {
        return Err(AppError::Cancelled);
    }
    if duration.is_zero() {
        return Ok(());
    }
    tokio::select! {
        _ = cancel.cancelled() => Err(AppError::Cancelled),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}

/// 检查点：已取消则返回错误
pub fn ensure_active(cancel: &CancellationToken) -> AppResult<()> {
    if cancel.is_cancelled() {
        Err(AppError::Cancelled)
    } else {
        Ok(())
    }
}

/// 在 `base` 上加入 ±`ratio` 的随机抖动
pub fn jitter(base: Duration, ratio: f64) -> Duration {
    if base.is_zero() || ratio <= 0.0 {
        return base;
    }
    let factor = rand::rng().random_range((1.0 - ratio)..=(1.0 + ratio));
    base.mul_f64(factor.max(0.0))
}
