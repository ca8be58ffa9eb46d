//! 多步表单导航

use std::sync::Arc;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::AppResult;
use crate::infrastructure::{ElementRef, LoadState, PageDriver};
use crate::models::NavigationState;
use crate::services::controls::{
    control_label, find_control_excluding, matches_any, BACK_PATTERNS, NEXT_PATTERNS,
    SUBMIT_PATTERNS,
};
use crate::utils::pause;

const PROGRESS_SELECTORS: &[&str] = &[
    ".progress-bar",
    ".stepper",
    ".wizard",
    r#"[role="progressbar"]"#,
    ".steps",
    ".step-indicator",
];

const STEP_SELECTOR: &str = ".step, .wizard-step, [data-step], .stepper-item";

const ERROR_SELECTORS: &[&str] = &[
    ".error",
    ".error-message",
    r#"[role="alert"]"#,
    ".alert-danger",
    ".validation-error",
    ".field-error",
];

static STEP_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bstep\s+[0-9]").expect("合法的正则"));

/// 步骤指示器的 class 中是否带有完整的 `active` / `current` 标记（`inactive` 不算）
fn is_current_step_class(class: &str) -> bool {
    class
        .split_whitespace()
        .any(|c| c.eq_ignore_ascii_case("active") || c.eq_ignore_ascii_case("current"))
}

/// 点击 "下一步" 后的默认等待
pub const DEFAULT_STEP_SETTLE: Duration = Duration::from_secs(2);

/// 多步表单导航状态机
///
/// 每次提交新建一个，持有本次提交的 `NavigationState`
pub struct FormNavigator {
    page: Arc<dyn PageDriver>,
    state: NavigationState,
    settle: Duration,
    /// 不参与下一步 / 提交查找的控件文字（小写）
    excluded: Vec<String>,
    cancel: CancellationToken,
}

impl FormNavigator {
    pub fn new(page: Arc<dyn PageDriver>, cancel: CancellationToken) -> Self {
        Self {
            page,
            state: NavigationState::default(),
            settle: DEFAULT_STEP_SETTLE,
            excluded: Vec::new(),
            cancel,
        }
    }

    /// 查找控件时跳过这些文字的控件，比如已经点过的申请入口
    pub fn with_excluded_controls(mut self, labels: impl IntoIterator<Item = String>) -> Self {
        self.excluded
            .extend(labels.into_iter().map(|l| l.trim().to_lowercase()).filter(|l| !l.is_empty()));
        self
    }

    pub fn excluded_controls(&self) -> &[String] {
        &self.excluded
    }

    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    pub fn state(&self) -> &NavigationState {
        &self.state
    }

    /// 是否为多步表单：进度条、"下一步" 控件或 "Step N" 文字任一存在
    pub async fn detect_multi_step(&self) -> AppResult<bool> {
        let page = self.page.as_ref();
        for selector in PROGRESS_SELECTORS {
            if page.query(selector).await?.is_some() {
                info!("📑 检测到多步表单: {}", selector);
                return Ok(true);
            }
        }
        if self.find(NEXT_PATTERNS).await?.is_some() {
            info!("📑 检测到多步表单: 存在下一步按钮");
            return Ok(true);
        }
        if STEP_TEXT.is_match(&page.body_text().await?) {
            info!("📑 检测到多步表单: 页面包含步骤文字");
            return Ok(true);
        }
        Ok(false)
    }

    /// 读取步骤指示器，刷新总步数、当前步骤和导航能力
    pub async fn detect_steps(&mut self) -> AppResult<&NavigationState> {
        let page = self.page.as_ref();
        let steps = page.query_all(STEP_SELECTOR).await?;
        if !steps.is_empty() {
            let mut current = None;
            let mut titles = Vec::with_capacity(steps.len());
            for (i, step) in steps.iter().enumerate() {
                let class = page.attribute(step, "class").await?.unwrap_or_default();
                if current.is_none() && is_current_step_class(&class) {
                    current = Some(i);
                }
                if let Some(title) = page.text_content(step).await? {
                    let title = title.trim();
                    if !title.is_empty() {
                        titles.push(title.to_string());
                    }
                }
            }
            self.state.total_steps = steps.len();
            self.state.current_step = current.unwrap_or(0);
            self.state.step_titles = titles;
            info!(
                "📑 共 {} 步，当前第 {} 步",
                self.state.total_steps,
                self.state.current_step + 1
            );
        }
        self.refresh_capabilities().await?;
        Ok(&self.state)
    }

    /// 仅更新状态，不操作页面
    pub fn advance_step(&mut self) -> bool {
        self.state.advance_step()
    }

    /// 点击 "下一步"，找不到控件返回 `false`
    pub async fn go_next(&mut self) -> AppResult<bool> {
        let Some(button) = self.find(NEXT_PATTERNS).await? else {
            warn!("没有找到下一步按钮");
            return Ok(false);
        };
        debug!("点击下一步按钮: {}", button);
        self.page.click(&button).await?;
        pause(self.settle, &self.cancel).await?;

        self.state.can_go_next = true;
        self.state.advance_step();
        self.refresh_capabilities().await?;
        info!("➡️ 进入 {}", self.state);
        Ok(true)
    }

    /// 点击 "上一步"，找不到控件返回 `false`
    pub async fn go_back(&mut self) -> AppResult<bool> {
        let Some(button) = self.find(BACK_PATTERNS).await? else {
            warn!("没有找到上一步按钮");
            return Ok(false);
        };
        self.page.click(&button).await?;
        pause(self.settle, &self.cancel).await?;

        self.state.go_back();
        self.refresh_capabilities().await?;
        info!("⬅️ 返回 {}", self.state);
        Ok(true)
    }

    /// 点击提交按钮，找不到控件返回 `false`
    pub async fn submit_form(&self) -> AppResult<bool> {
        let Some(button) = self.find(SUBMIT_PATTERNS).await? else {
            warn!("没有找到提交按钮");
            return Ok(false);
        };
        info!("📨 点击提交按钮");
        self.page.click(&button).await?;
        Ok(true)
    }

    /// 是否已到最后一步
    ///
    /// 提交按钮可见，或下一步按钮的文字是提交类，或已在已知的最后一步
    pub async fn is_final_step(&self) -> AppResult<bool> {
        let page = self.page.as_ref();
        if self.find(SUBMIT_PATTERNS).await?.is_some() {
            return Ok(true);
        }
        if let Some(next) = self.find(NEXT_PATTERNS).await? {
            if matches_any(&control_label(page, &next).await?, SUBMIT_PATTERNS) {
                return Ok(true);
            }
        }
        Ok(self.state.total_steps > 1 && self.state.is_last_known_step())
    }

    /// 收集当前步骤可见的错误提示，只用于记录，不阻止前进
    pub async fn validate_step(&self) -> AppResult<(bool, Vec<String>)> {
        let page = self.page.as_ref();
        let mut errors = Vec::new();
        for selector in ERROR_SELECTORS {
            for element in page.query_all(selector).await? {
                if !page.is_visible(&element).await? {
                    continue;
                }
                if let Some(text) = page.text_content(&element).await? {
                    let text = text.trim();
                    if !text.is_empty() {
                        errors.push(text.to_string());
                    }
                }
            }
        }
        if errors.is_empty() {
            debug!("步骤校验通过");
        } else {
            warn!("⚠️ 步骤校验发现错误: {:?}", errors);
        }
        Ok((errors.is_empty(), errors))
    }

    pub fn get_current_step_title(&self) -> Option<&str> {
        self.state.current_title()
    }

    pub fn reset_state(&mut self) {
        self.state = NavigationState::default();
        debug!("导航状态已重置");
    }

    /// 等待页面稳定，超时返回 `false`
    pub async fn wait_for_navigation(&self, timeout: Duration) -> bool {
        match self
            .page
            .wait_for_load_state(LoadState::NetworkIdle, timeout)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!("等待页面导航超时: {}", e);
                false
            }
        }
    }

    async fn find(&self, patterns: &[&str]) -> AppResult<Option<ElementRef>> {
        find_control_excluding(self.page.as_ref(), patterns, &self.excluded).await
    }

    async fn refresh_capabilities(&mut self) -> AppResult<()> {
        self.state.can_go_next = self.find(NEXT_PATTERNS).await?.is_some();
        self.state.can_go_back = self.find(BACK_PATTERNS).await?.is_some();
        self.state.is_final_step = self.is_final_step().await?;
        Ok(())
    }
}
