//! 提交请求与提交结果

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::models::profile::ApplicantProfile;

/// 招聘平台
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    LinkedIn,
    Indeed,
    Greenhouse,
    Lever,
    Workday,
    Generic,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::LinkedIn => "linkedin",
            Platform::Indeed => "indeed",
            Platform::Greenhouse => "greenhouse",
            Platform::Lever => "lever",
            Platform::Workday => "workday",
            Platform::Generic => "generic",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 提交状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmissionStatus {
    Pending,
    InProgress,
    Success,
    Failed,
    CaptchaDetected,
    ManualInterventionRequired,
    RateLimited,
    PlatformError,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::Pending => "PENDING",
            SubmissionStatus::InProgress => "IN_PROGRESS",
            SubmissionStatus::Success => "SUCCESS",
            SubmissionStatus::Failed => "FAILED",
            SubmissionStatus::CaptchaDetected => "CAPTCHA_DETECTED",
            SubmissionStatus::ManualInterventionRequired => "MANUAL_INTERVENTION_REQUIRED",
            SubmissionStatus::RateLimited => "RATE_LIMITED",
            SubmissionStatus::PlatformError => "PLATFORM_ERROR",
        }
    }

    /// 需要人工介入的状态，重试没有意义
    pub fn is_blocking_human(&self) -> bool {
        matches!(
            self,
            SubmissionStatus::CaptchaDetected | SubmissionStatus::ManualInterventionRequired
        )
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 待投递的职位
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPosting {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub company: String,
    pub application_url: String,
}

impl JobPosting {
    pub fn new(id: impl Into<String>, application_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: String::new(),
            company: String::new(),
            application_url: application_url.into(),
        }
    }
}

/// 一次提交的输入，调用期间不可变
#[derive(Debug, Clone)]
pub struct SubmissionRequest {
    pub job: JobPosting,
    pub resume_path: PathBuf,
    pub cover_letter_path: Option<PathBuf>,
    pub profile: ApplicantProfile,
}

/// 一次提交的结果
///
/// `success` 与 `status` 只能通过构造函数设置：
/// 成功时 status 一定是 `SUCCESS` 且带有提交时间，失败时 status 一定不是 `SUCCESS`。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionResult {
    success: bool,
    status: SubmissionStatus,
    pub job_id: String,
    pub platform: Platform,
    submitted_at: Option<DateTime<Local>>,
    pub error_message: Option<String>,
    pub screenshot_path: Option<PathBuf>,
    pub confirmation_number: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, JsonValue>,
}

impl SubmissionResult {
    /// 成功的结果，提交时间为当前时间
    pub fn succeeded(job_id: impl Into<String>, platform: Platform) -> Self {
        Self {
            success: true,
            status: SubmissionStatus::Success,
            job_id: job_id.into(),
            platform,
            submitted_at: Some(Local::now()),
            error_message: None,
            screenshot_path: None,
            confirmation_number: None,
            metadata: BTreeMap::new(),
        }
    }

    /// 失败的结果；传入 `SUCCESS` 时按 `FAILED` 处理
    pub fn failed(
        job_id: impl Into<String>,
        platform: Platform,
        status: SubmissionStatus,
        message: impl Into<String>,
    ) -> Self {
        let status = if status == SubmissionStatus::Success {
            SubmissionStatus::Failed
        } else {
            status
        };
        Self {
            success: false,
            status,
            job_id: job_id.into(),
            platform,
            submitted_at: None,
            error_message: Some(message.into()),
            screenshot_path: None,
            confirmation_number: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn status(&self) -> SubmissionStatus {
        self.status
    }

    pub fn submitted_at(&self) -> Option<DateTime<Local>> {
        self.submitted_at
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}
