//! 单个职位提交器 - 编排层
//!
//! ## 职责
//!
//! 1. **平台路由**：根据申请 URL 选择处理器，未知平台走通用流程
//! 2. **限流闸门**：超出每小时上限直接返回 RATE_LIMITED，不碰页面
//! 3. **输入校验**：简历不存在或格式不支持时在任何页面操作之前返回 FAILED
//! 4. **有限重试**：最多 `max_retries` 次，验证码 / 需人工处理不重试
//! 5. **兜底**：处理器的错误和 panic 都转换为 FAILED 结果，取消转换为带 `cancelled` 标记的 FAILED
//!
//! 页面会话只有一个，所以批量提交严格顺序执行

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;

use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::SubmissionConfig;
use crate::error::{AppError, AppResult, FileError};
use crate::infrastructure::PageDriver;
use crate::models::{Platform, SubmissionRequest, SubmissionResult, SubmissionStatus};
use crate::services::{validate_document, ErrorKind, PlatformRouter, RateLimiter};
use crate::utils::{ensure_active, pause};
use crate::workflow::{HandlerKind, PlatformHandler};

/// 批量提交的汇总
#[derive(Debug, Default)]
pub struct BatchReport {
    pub results: Vec<SubmissionResult>,
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.results.len()
    }
}

/// 校验通过的文件
struct Documents {
    resume: PathBuf,
    cover_letter: Option<PathBuf>,
}

/// 提交编排器
///
/// 持有处理器集合、路由、限流器和取消信号；页面由处理器共享
pub struct SubmissionOrchestrator {
    handlers: HashMap<Platform, PlatformHandler>,
    generic: PlatformHandler,
    router: PlatformRouter,
    limiter: Arc<RateLimiter>,
    config: SubmissionConfig,
    cancel: CancellationToken,
}

impl SubmissionOrchestrator {
    pub fn new(
        page: Arc<dyn PageDriver>,
        config: SubmissionConfig,
        limiter: Arc<RateLimiter>,
        cancel: CancellationToken,
    ) -> Self {
        let handlers = [Platform::LinkedIn, Platform::Indeed, Platform::Greenhouse]
            .into_iter()
            .map(|platform| {
                let kind = HandlerKind::for_platform(platform);
                (platform, PlatformHandler::new(kind, page.clone(), config.clone()))
            })
            .collect();
        let generic = PlatformHandler::new(HandlerKind::Generic, page, config.clone());

        Self {
            handlers,
            generic,
            router: PlatformRouter::new(),
            limiter,
            config,
            cancel,
        }
    }

    /// 为某个平台注册处理器（覆盖默认）
    pub fn with_handler(mut self, platform: Platform, handler: PlatformHandler) -> Self {
        self.handlers.insert(platform, handler);
        self
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// 提交一个职位申请，任何情况下都返回结果
    pub async fn submit_application(&self, request: &SubmissionRequest) -> SubmissionResult {
        let job_id = request.job.id.as_str();
        let platform = self.router.route(&request.job.application_url);

        match self.run_submission(request, platform).await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => {
                warn!("[职位 {}] ⛔ 提交已取消", job_id);
                SubmissionResult::failed(
                    job_id,
                    platform,
                    SubmissionStatus::Failed,
                    "Submission cancelled",
                )
                .with_metadata("cancelled", true)
            }
            Err(e) => {
                error!("[职位 {}] ❌ 提交过程中发生错误: {}", job_id, e);
                SubmissionResult::failed(job_id, platform, SubmissionStatus::Failed, e.to_string())
            }
        }
    }

    /// 依次提交，每两次之间等待 `delay_between_submissions`
    pub async fn submit_batch(&self, requests: &[SubmissionRequest]) -> BatchReport {
        self.submit_batch_with(requests, |_, _| {}).await
    }

    /// 同 `submit_batch`，每得到一个结果回调一次（序号从 1 开始）
    pub async fn submit_batch_with(
        &self,
        requests: &[SubmissionRequest],
        mut on_result: impl FnMut(usize, &SubmissionResult),
    ) -> BatchReport {
        let mut report = BatchReport::default();

        for (idx, request) in requests.iter().enumerate() {
            if idx > 0 {
                if let Err(e) = pause(self.config.delay_between_submissions, &self.cancel).await {
                    debug!("跳过提交间隔: {}", e);
                }
            }

            let result = self.submit_application(request).await;
            if result.success() {
                report.succeeded += 1;
            } else {
                report.failed += 1;
            }
            on_result(idx + 1, &result);
            report.results.push(result);
        }

        info!(
            "📊 批量提交完成: 成功 {}/{}",
            report.succeeded,
            report.total()
        );
        report
    }

    async fn run_submission(
        &self,
        request: &SubmissionRequest,
        platform: Platform,
    ) -> AppResult<SubmissionResult> {
        let job = &request.job;
        let job_id = job.id.as_str();
        let key = platform.as_str();
        info!("[职位 {}] 平台: {}", job_id, platform);
        ensure_active(&self.cancel)?;

        // ========== 限流闸门 ==========
        if !self.limiter.check(key) {
            let mut result = SubmissionResult::failed(
                job_id,
                platform,
                SubmissionStatus::RateLimited,
                format!(
                    "Rate limit exceeded for {}. {}",
                    platform,
                    self.limiter.suggest_optimal_timing(key)
                ),
            );
            if let Some(wait) = self.limiter.suggest_wait(key) {
                result = result.with_metadata("retry_after_secs", wait.as_secs());
            }
            return Ok(result);
        }

        // ========== 输入校验 ==========
        let documents = match self.validate_documents(request).await {
            Ok(documents) => documents,
            Err(message) => {
                warn!("[职位 {}] ❌ {}", job_id, message);
                return Ok(SubmissionResult::failed(
                    job_id,
                    platform,
                    SubmissionStatus::Failed,
                    message,
                ));
            }
        };

        self.limiter.wait_if_needed(key, &self.cancel).await?;

        // ========== 有限重试 ==========
        let handler = self.handlers.get(&platform).unwrap_or(&self.generic);
        let max_attempts = self.config.max_retries.max(1);
        let mut attempt = 0;
        let result = loop {
            attempt += 1;
            ensure_active(&self.cancel)?;
            info!("[职位 {}] 第 {}/{} 次尝试", job_id, attempt, max_attempts);

            let outcome = AssertUnwindSafe(handler.submit(
                job,
                platform,
                Some(documents.resume.as_path()),
                documents.cover_letter.as_deref(),
                &request.profile,
                &self.cancel,
            ))
            .catch_unwind()
            .await;

            let result = match outcome {
                Ok(Ok(result)) => result,
                Ok(Err(e)) if e.is_cancelled() => return Err(e),
                Ok(Err(e)) => {
                    error!("[职位 {}] 第 {} 次尝试出错: {}", job_id, attempt, e);
                    self.error_result(handler, job_id, platform, e.to_string()).await
                }
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    error!("[职位 {}] 处理器异常终止: {}", job_id, message);
                    self.error_result(handler, job_id, platform, format!("Handler panicked: {}", message))
                        .await
                }
            };

            if result.success() || result.status().is_blocking_human() {
                break result;
            }
            if attempt >= max_attempts {
                warn!("[职位 {}] 已用完 {} 次尝试", job_id, max_attempts);
                break result;
            }
            warn!(
                "[职位 {}] 第 {} 次尝试失败，{} 秒后重试",
                job_id,
                attempt,
                self.config.retry_delay.as_secs()
            );
            pause(self.config.retry_delay, &self.cancel).await?;
        };

        let error_kind = (!result.success()).then(|| ErrorKind::from_status(result.status()));
        self.limiter.record(key, result.success(), error_kind);
        Ok(result.with_metadata("attempts", attempt))
    }

    /// 简历必须存在且格式受支持；求职信不可用时只告警并忽略
    async fn validate_documents(&self, request: &SubmissionRequest) -> Result<Documents, String> {
        let resume = validate_document(&request.resume_path)
            .await
            .map_err(|e| describe_document_error("Resume", e))?;

        let cover_letter = match &request.cover_letter_path {
            Some(path) => match validate_document(path).await {
                Ok(path) => Some(path),
                Err(e) => {
                    warn!(
                        "[职位 {}] 求职信不可用，忽略: {}",
                        request.job.id,
                        describe_document_error("Cover letter", e)
                    );
                    None
                }
            },
            None => None,
        };

        Ok(Documents {
            resume,
            cover_letter,
        })
    }

    async fn error_result(
        &self,
        handler: &PlatformHandler,
        job_id: &str,
        platform: Platform,
        message: String,
    ) -> SubmissionResult {
        let mut result =
            SubmissionResult::failed(job_id, platform, SubmissionStatus::Failed, message);
        result.screenshot_path = handler.capture_failure(job_id, "error").await;
        result
    }
}

fn describe_document_error(kind: &str, err: AppError) -> String {
    match err {
        AppError::File(FileError::NotFound { path }) => {
            format!("{} file not found: {}", kind, path.display())
        }
        AppError::File(FileError::UnsupportedFormat { path, extension }) => format!(
            "Unsupported {} format '.{}': {}",
            kind.to_lowercase(),
            extension,
            path.display()
        ),
        other => format!("{} file is not usable: {}", kind, other),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
