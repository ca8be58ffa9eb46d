//! 平台处理器 - 流程层
//!
//! 核心职责：定义"投递一个职位"的完整流程
//!
//! 流程顺序（所有平台共用，差异见 `variants`）：
//! 1. 打开申请页 → 平台入口（Easy Apply / 站外跳转）
//! 2. 验证码检查（可见即停止）
//! 3. 填写表单 → 上传简历
//! 4. 多步表单翻页（有上限）
//! 5. 提交 → 等待 → 确认

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::SubmissionConfig;
use crate::error::AppResult;
use crate::infrastructure::{LoadState, PageDriver};
use crate::models::{ApplicantProfile, JobPosting, Platform, SubmissionResult, SubmissionStatus};
use crate::services::controls::{control_label, find_control_excluding, first_visible_selector};
use crate::services::redirect_tracker::{identify_platform, should_follow};
use crate::services::{
    CaptchaGuard, DocumentUploader, FormMapper, FormNavigator, PlatformRouter, RedirectTracker,
};
use crate::utils::{ensure_active, pause};
use crate::workflow::greenhouse;
use crate::workflow::variants::{
    HandlerKind, SUBMIT_FALLBACK_PATTERNS, SUCCESS_TEXTS, SUCCESS_URL_WORDS,
};

/// 点击入口按钮后等待站外跳转的时间
const REDIRECT_WAIT: Duration = Duration::from_secs(3);

const FILE_INPUT: &str = r#"input[type="file"]"#;

static CONFIRMATION_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:confirmation|reference|application)\s*(?:number|no\.?|id|#)\s*(?:is)?\s*[:#]?\s*([A-Z0-9][A-Z0-9-]{3,})",
    )
    .expect("合法的正则")
});

/// 平台入口处理之后的去向
enum Prepared {
    /// 继续填写；`entry_labels` 是已点击入口按钮的文字，后续查找按钮时跳过
    Continue { entry_labels: Vec<String> },
    Blocked(SubmissionResult),
}

impl Prepared {
    fn proceed() -> Self {
        Prepared::Continue {
            entry_labels: Vec::new(),
        }
    }
}

/// 从确认页文字中提取确认号
pub fn extract_confirmation_number(text: &str) -> Option<String> {
    CONFIRMATION_NUMBER
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// 平台处理器
///
/// - 持有页面能力（`Arc<dyn PageDriver>`），不持有浏览器
/// - 每次 `submit` 都新建导航状态、跳转记录
/// - 不做重试，重试由编排层负责
pub struct PlatformHandler {
    kind: HandlerKind,
    page: Arc<dyn PageDriver>,
    config: SubmissionConfig,
}

impl PlatformHandler {
    pub fn new(kind: HandlerKind, page: Arc<dyn PageDriver>, config: SubmissionConfig) -> Self {
        Self { kind, page, config }
    }

    pub fn kind(&self) -> HandlerKind {
        self.kind
    }

    /// 执行一次完整的投递
    ///
    /// 验证码、找不到提交按钮、提交后无法确认都作为结果返回；
    /// 页面操作出错时返回 `Err`，由编排层决定是否重试
    pub async fn submit(
        &self,
        job: &JobPosting,
        platform: Platform,
        resume: Option<&Path>,
        cover_letter: Option<&Path>,
        profile: &ApplicantProfile,
        cancel: &CancellationToken,
    ) -> AppResult<SubmissionResult> {
        let job_id = job.id.as_str();
        info!(
            "[职位 {}] 🚀 开始投递 ({}): {}",
            job_id, self.kind, job.application_url
        );
        ensure_active(cancel)?;

        self.page.navigate(&job.application_url).await?;
        self.page
            .wait_for_load_state(LoadState::DomContentLoaded, self.config.page_load_timeout)
            .await?;

        // ========== 验证码（页面加载后）==========
        let guard = CaptchaGuard::new(
            self.page.clone(),
            self.config.captcha_wait_time,
            cancel.clone(),
        );
        if let Some(blocked) = self.stop_on_captcha(&guard, job_id, platform).await? {
            return Ok(blocked);
        }

        // ========== 平台入口 ==========
        let mut tracker = RedirectTracker::new(self.page.clone(), cancel.clone());
        let entry_labels = match self.prepare(job, platform, &mut tracker, cancel).await? {
            Prepared::Continue { entry_labels } => entry_labels,
            Prepared::Blocked(blocked) => return Ok(blocked),
        };

        // 入口按钮或跳转可能带出新的验证码
        if let Some(blocked) = self.stop_on_captcha(&guard, job_id, platform).await? {
            return Ok(blocked);
        }

        // ========== 填写与上传 ==========
        if !self.fill_form(profile).await? {
            warn!("[职位 {}] 表单填写不完整，继续后续步骤", job_id);
        }
        pause(self.config.delay_between_actions, cancel).await?;

        if let Some(resume) = resume {
            if !self.upload_documents(resume, cover_letter, cancel).await? {
                warn!("[职位 {}] 简历上传未完成", job_id);
            }
        }

        // ========== 多步表单 ==========
        let mut navigator = FormNavigator::new(self.page.clone(), cancel.clone())
            .with_excluded_controls(entry_labels);
        let steps = self
            .walk_steps(&mut navigator, job_id, resume, cover_letter, profile, cancel)
            .await?;

        // ========== 提交 ==========
        if !self.click_submit(&navigator).await? {
            warn!("[职位 {}] 找不到提交按钮", job_id);
            return Ok(self
                .blocked(
                    job_id,
                    platform,
                    SubmissionStatus::ManualInterventionRequired,
                    "Could not locate submit button - manual submission required".to_string(),
                    "no_submit",
                )
                .await);
        }
        pause(self.config.confirmation_wait_time, cancel).await?;

        // ========== 确认 ==========
        let verified = !self.config.verify_submission || self.verify_submission().await?;
        if !verified {
            warn!("[职位 {}] 已提交但无法确认，需要人工检查", job_id);
            return Ok(self
                .blocked(
                    job_id,
                    platform,
                    SubmissionStatus::ManualInterventionRequired,
                    "Submission attempted but not verified - please check manually".to_string(),
                    "unverified",
                )
                .await
                .with_metadata("navigation_steps", steps));
        }

        let mut result = SubmissionResult::succeeded(job_id, platform)
            .with_metadata("handler", self.kind.as_str())
            .with_metadata("navigation_steps", steps);
        if let Some(last) = tracker.redirect_chain().last() {
            result = result.with_metadata("redirected_to", last.redirected_url.clone());
        }
        result.confirmation_number = extract_confirmation_number(&self.page.body_text().await?);
        if self.config.screenshot_on_success {
            result.screenshot_path = self.capture_screenshot(job_id, "success").await;
        }
        info!("[职位 {}] ✅ 投递成功", job_id);
        Ok(result)
    }

    /// 用资料填写当前页面的表单，返回是否填写了任何字段
    pub async fn fill_form(&self, profile: &ApplicantProfile) -> AppResult<bool> {
        let data = profile.to_field_map();
        let page = self.page.as_ref();
        let mut filled = 0;

        let mut standard_ids = HashSet::new();
        if self.kind == HandlerKind::Greenhouse {
            standard_ids = greenhouse::fill_standard_fields(page, &data).await?;
            filled += standard_ids.len();
        }

        let mapper = FormMapper::new(self.page.clone());
        let mut fields = mapper.detect_all_fields().await?;
        fields.retain(|f| !matches!(&f.id, Some(id) if standard_ids.contains(id)));
        mapper.map_fields_to_data(&mut fields, &data);
        filled += mapper.fill_fields(&fields).await?;

        if self.kind == HandlerKind::Greenhouse {
            filled += greenhouse::answer_screening_questions(page, &profile.screening_responses)
                .await?;
            filled += greenhouse::accept_privacy_checkboxes(page).await?;
        }

        debug!("本页填写了 {} 个字段", filled);
        Ok(filled > 0)
    }

    /// 上传简历和求职信，任一成功即返回 `true`
    pub async fn upload_documents(
        &self,
        resume: &Path,
        cover_letter: Option<&Path>,
        cancel: &CancellationToken,
    ) -> AppResult<bool> {
        let uploader = DocumentUploader::new(
            self.page.clone(),
            self.config.element_timeout,
            cancel.clone(),
        );
        let mut uploaded = uploader.upload_resume(resume).await?;
        if let Some(cover_letter) = cover_letter {
            uploaded |= uploader.upload_cover_letter(cover_letter).await?;
        }
        Ok(uploaded)
    }

    /// 根据成功文案或确认页 URL 判断是否已提交
    pub async fn verify_submission(&self) -> AppResult<bool> {
        let body = self.page.body_text().await?.to_lowercase();
        let texts = self.kind.profile().success_texts.iter().chain(SUCCESS_TEXTS);
        for text in texts {
            if body.contains(text) {
                info!("✓ 找到成功提示: {}", text);
                return Ok(true);
            }
        }
        let url = self.page.current_url().await?.to_lowercase();
        if SUCCESS_URL_WORDS.iter().any(|w| url.contains(w)) {
            info!("✓ 已进入确认页: {}", url);
            return Ok(true);
        }
        Ok(false)
    }

    /// 截图保存为 `<job>_<label>_<时间>.png`，失败只记录警告
    pub async fn capture_screenshot(&self, job_id: &str, label: &str) -> Option<PathBuf> {
        let safe_id: String = job_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        let file_name = format!(
            "{}_{}_{}.png",
            safe_id,
            label,
            chrono::Local::now().format("%Y%m%d_%H%M%S")
        );
        let path = self.config.screenshot_dir.join(file_name);
        match self.page.screenshot(&path).await {
            Ok(()) => Some(path),
            Err(e) => {
                warn!("[职位 {}] 截图失败: {}", job_id, e);
                None
            }
        }
    }

    /// 出错时按配置截图
    pub async fn capture_failure(&self, job_id: &str, label: &str) -> Option<PathBuf> {
        if self.config.screenshot_on_error {
            self.capture_screenshot(job_id, label).await
        } else {
            None
        }
    }

    /// 平台入口：站外申请、Easy Apply 按钮、Indeed 跳转与 iframe
    async fn prepare(
        &self,
        job: &JobPosting,
        platform: Platform,
        tracker: &mut RedirectTracker,
        cancel: &CancellationToken,
    ) -> AppResult<Prepared> {
        let page = self.page.as_ref();

        if self.kind.checks_external_apply() {
            let outcome = tracker.handle_external_redirect(platform, true, None).await?;
            if outcome.redirected {
                if !outcome.can_continue {
                    let url = outcome.external_url.unwrap_or_default();
                    return Ok(Prepared::Blocked(
                        self.blocked(
                            &job.id,
                            platform,
                            SubmissionStatus::ManualInterventionRequired,
                            format!("External application at {} is not on a trusted ATS - apply manually", url),
                            "external",
                        )
                        .await,
                    ));
                }
                info!("[职位 {}] 🔀 {}", job.id, outcome.message);
                return Ok(Prepared::proceed());
            }
        }

        let Some(entry) = first_visible_selector(page, self.kind.profile().entry_selectors).await?
        else {
            if self.kind == HandlerKind::LinkedIn {
                debug!("[职位 {}] 没有 Easy Apply 按钮，按普通表单处理", job.id);
            }
            return Ok(Prepared::proceed());
        };
        // 入口按钮在弹出的表单后面仍然可见，点击前记下它的文字
        let mut entry_labels = vec![control_label(page, &entry).await?];
        if let Some(aria) = page.attribute(&entry, "aria-label").await? {
            entry_labels.push(aria);
        }
        info!("[职位 {}] 点击申请入口", job.id);
        page.click(&entry).await?;
        pause(self.config.delay_between_actions, cancel).await?;

        if self.kind != HandlerKind::Indeed {
            return Ok(Prepared::Continue { entry_labels });
        }

        if let Some(redirect) = tracker.detect_redirect(&job.application_url, REDIRECT_WAIT).await? {
            let same_platform = PlatformRouter::new().route(&redirect.redirected_url) == platform;
            if !same_platform && !should_follow(&redirect, None) {
                return Ok(Prepared::Blocked(
                    self.blocked(
                        &job.id,
                        platform,
                        SubmissionStatus::ManualInterventionRequired,
                        format!(
                            "Redirected to untrusted site {} - apply manually",
                            redirect.redirected_domain
                        ),
                        "external",
                    )
                    .await,
                ));
            }
        }

        if let Some(src) = tracker.detect_iframe_application().await? {
            if identify_platform(&src).is_known_ats() {
                info!("[职位 {}] 进入嵌入的申请表: {}", job.id, src);
                page.navigate(&src).await?;
                page.wait_for_load_state(LoadState::DomContentLoaded, self.config.page_load_timeout)
                    .await?;
            }
        }
        Ok(Prepared::Continue { entry_labels })
    }

    /// 页面上有可见验证码时，按配置等待人工处理或直接停止
    async fn stop_on_captcha(
        &self,
        guard: &CaptchaGuard,
        job_id: &str,
        platform: Platform,
    ) -> AppResult<Option<SubmissionResult>> {
        let Some(signal) = guard.detect().await? else {
            return Ok(None);
        };
        let notify = |message: &str| warn!("[职位 {}] 🔔 {}", job_id, message);
        let handled = self.config.pause_on_captcha
            && guard
                .handle(false, Some(&notify as &(dyn Fn(&str) + Send + Sync)))
                .await?;
        if handled {
            return Ok(None);
        }
        warn!("[职位 {}] 🧩 遇到验证码，停止本次投递", job_id);
        Ok(Some(
            self.blocked(
                job_id,
                platform,
                SubmissionStatus::CaptchaDetected,
                format!(
                    "CAPTCHA detected ({}) - manual intervention required",
                    signal.provider
                ),
                "captcha",
            )
            .await,
        ))
    }

    /// 多步表单：校验（仅记录）→ 下一步 → 填写，最多 `max_navigation_steps` 次
    async fn walk_steps(
        &self,
        navigator: &mut FormNavigator,
        job_id: &str,
        resume: Option<&Path>,
        cover_letter: Option<&Path>,
        profile: &ApplicantProfile,
        cancel: &CancellationToken,
    ) -> AppResult<usize> {
        if !navigator.detect_multi_step().await? {
            return Ok(0);
        }
        navigator.detect_steps().await?;

        let mut steps = 0;
        while !navigator.state().is_final_step && steps < self.config.max_navigation_steps {
            navigator.validate_step().await?;
            if !navigator.go_next().await? {
                break;
            }
            steps += 1;
            debug!(
                "[职位 {}] {} {}",
                job_id,
                navigator.state(),
                navigator.get_current_step_title().unwrap_or_default()
            );
            self.fill_form(profile).await?;
            if let Some(resume) = resume {
                self.upload_if_pending(resume, cover_letter, cancel).await?;
            }
        }
        if steps >= self.config.max_navigation_steps {
            warn!(
                "[职位 {}] 已达到最大翻页次数 {}，尝试直接提交",
                job_id, self.config.max_navigation_steps
            );
        }
        Ok(steps)
    }

    /// 新出现的空文件输入框需要补传简历
    async fn upload_if_pending(
        &self,
        resume: &Path,
        cover_letter: Option<&Path>,
        cancel: &CancellationToken,
    ) -> AppResult<()> {
        let Some(input) = self.page.query(FILE_INPUT).await? else {
            return Ok(());
        };
        if self.page.input_file_names(&input).await?.is_empty() {
            self.upload_documents(resume, cover_letter, cancel).await?;
        }
        Ok(())
    }

    /// 先用导航状态机找提交按钮，再用平台专用选择器，最后用宽松的文字匹配
    async fn click_submit(&self, navigator: &FormNavigator) -> AppResult<bool> {
        if navigator.submit_form().await? {
            return Ok(true);
        }
        let page = self.page.as_ref();
        let button = match first_visible_selector(page, self.kind.profile().submit_selectors).await? {
            Some(button) => Some(button),
            None => {
                find_control_excluding(
                    page,
                    SUBMIT_FALLBACK_PATTERNS,
                    navigator.excluded_controls(),
                )
                .await?
            }
        };
        match button {
            Some(button) => {
                info!("📨 点击提交按钮: {}", button);
                page.click(&button).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn blocked(
        &self,
        job_id: &str,
        platform: Platform,
        status: SubmissionStatus,
        message: String,
        label: &str,
    ) -> SubmissionResult {
        let mut result = SubmissionResult::failed(job_id, platform, status, message)
            .with_metadata("handler", self.kind.as_str());
        result.screenshot_path = self.capture_failure(job_id, label).await;
        result
    }
}
