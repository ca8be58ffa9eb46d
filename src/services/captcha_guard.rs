//! 验证码检测与处理
//!
//! 从不尝试自动识别验证码，只做检测、简单绕过和有上限的人工等待

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::AppResult;
use crate::infrastructure::PageDriver;
use crate::services::controls::{find_enabled_control, first_visible_selector};
use crate::utils::pause;

/// 验证码提供方
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaptchaProvider {
    Recaptcha,
    Hcaptcha,
    Cloudflare,
    Generic,
}

impl CaptchaProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptchaProvider::Recaptcha => "recaptcha",
            CaptchaProvider::Hcaptcha => "hcaptcha",
            CaptchaProvider::Cloudflare => "cloudflare",
            CaptchaProvider::Generic => "generic",
        }
    }

    /// 提示用户的文字
    pub fn user_message(&self) -> &'static str {
        match self {
            CaptchaProvider::Recaptcha => {
                "Google reCAPTCHA detected. Please solve the CAPTCHA in the browser window."
            }
            CaptchaProvider::Hcaptcha => {
                "hCaptcha detected. Please solve the CAPTCHA in the browser window."
            }
            CaptchaProvider::Cloudflare => {
                "Cloudflare challenge detected. Please complete the security check."
            }
            CaptchaProvider::Generic => {
                "CAPTCHA detected. Please solve it manually in the browser window."
            }
        }
    }
}

impl fmt::Display for CaptchaProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 检测到的验证码
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptchaSignal {
    pub provider: CaptchaProvider,
    pub selector: String,
    pub visible: bool,
}

const CAPTCHA_SELECTORS: &[(CaptchaProvider, &[&str])] = &[
    (
        CaptchaProvider::Recaptcha,
        &[
            r#"iframe[src*="recaptcha"]"#,
            ".g-recaptcha",
            "#recaptcha",
            "[data-sitekey]",
        ],
    ),
    (
        CaptchaProvider::Hcaptcha,
        &[r#"iframe[src*="hcaptcha"]"#, ".h-captcha", "#hcaptcha"],
    ),
    (
        CaptchaProvider::Cloudflare,
        &[
            "#challenge-form",
            ".cf-turnstile",
            r#"iframe[src*="challenges.cloudflare.com"]"#,
        ],
    ),
    (
        CaptchaProvider::Generic,
        &[
            "#captcha",
            ".captcha",
            "[data-captcha]",
            r#"img[alt*="captcha" i]"#,
        ],
    ),
];

const AUDIO_BUTTONS: &[&str] = &[
    r#"button[aria-label*="audio" i]"#,
    "#recaptcha-audio-button",
    ".recaptcha-audio-button",
];

const BYPASS_PATTERNS: &[&str] = &["next", "continue"];

const AUTO_RESOLVE_WAIT: Duration = Duration::from_secs(5);
const POLL_INTERVAL: Duration = Duration::from_secs(5);
const SOLVED_SETTLE: Duration = Duration::from_secs(2);

/// 通知回调
pub type Notify<'a> = Option<&'a (dyn Fn(&str) + Send + Sync)>;

/// 验证码守卫
pub struct CaptchaGuard {
    page: Arc<dyn PageDriver>,
    wait_time: Duration,
    cancel: CancellationToken,
}

impl CaptchaGuard {
    pub fn new(page: Arc<dyn PageDriver>, wait_time: Duration, cancel: CancellationToken) -> Self {
        Self {
            page,
            wait_time,
            cancel,
        }
    }

    /// 按提供方顺序检测，返回第一个可见的验证码
    pub async fn detect(&self) -> AppResult<Option<CaptchaSignal>> {
        for (provider, selectors) in CAPTCHA_SELECTORS {
            for selector in *selectors {
                for element in self.page.query_all(selector).await? {
                    if self.page.is_visible(&element).await? {
                        info!("🧩 检测到验证码: {} ({})", provider, selector);
                        return Ok(Some(CaptchaSignal {
                            provider: *provider,
                            selector: selector.to_string(),
                            visible: true,
                        }));
                    }
                }
            }
        }
        Ok(None)
    }

    /// 当前验证码的用户提示
    pub async fn user_message(&self) -> AppResult<Option<&'static str>> {
        Ok(self.detect().await?.map(|s| s.provider.user_message()))
    }

    /// 处理验证码，返回是否可以继续
    ///
    /// 没有验证码直接成功；否则依次尝试绕过、reCAPTCHA 音频入口，最后等待人工处理
    pub async fn handle(&self, auto_solve: bool, notify: Notify<'_>) -> AppResult<bool> {
        let Some(signal) = self.detect().await? else {
            return Ok(true);
        };
        warn!("⚠️ 页面存在验证码: {}", signal.provider);
        if auto_solve {
            info!("不支持自动识别验证码，转为等待人工处理");
        }

        if self.try_bypass().await? {
            return Ok(true);
        }

        if signal.provider == CaptchaProvider::Recaptcha && self.try_audio_captcha().await? {
            info!("已切换到音频验证码");
        }

        if let Some(notify) = notify {
            notify(signal.provider.user_message());
        }
        self.wait_for_manual_solve(self.wait_time).await
    }

    /// 每 5 秒检查一次，验证码消失返回 `true`，超时返回 `false`
    pub async fn wait_for_manual_solve(&self, timeout: Duration) -> AppResult<bool> {
        warn!("⏳ 等待人工处理验证码，最长 {} 秒", timeout.as_secs());
        let deadline = Instant::now() + timeout;
        loop {
            if self.detect().await?.is_none() {
                info!("✓ 验证码已处理");
                pause(SOLVED_SETTLE, &self.cancel).await?;
                return Ok(true);
            }
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            pause(POLL_INTERVAL.min(deadline - now), &self.cancel).await?;
        }
        warn!("❌ 等待验证码超时 ({} 秒)", timeout.as_secs());
        Ok(false)
    }

    /// 有些页面显示验证码但不阻止继续，或者稍等即可自动通过
    async fn try_bypass(&self) -> AppResult<bool> {
        if find_enabled_control(self.page.as_ref(), BYPASS_PATTERNS)
            .await?
            .is_some()
        {
            info!("验证码存在但下一步按钮可用，尝试继续");
            return Ok(true);
        }
        info!("稍等验证码自动通过...");
        pause(AUTO_RESOLVE_WAIT, &self.cancel).await?;
        if self.detect().await?.is_none() {
            info!("✓ 验证码已自动通过");
            return Ok(true);
        }
        Ok(false)
    }

    async fn try_audio_captcha(&self) -> AppResult<bool> {
        match first_visible_selector(self.page.as_ref(), AUDIO_BUTTONS).await? {
            Some(button) => {
                self.page.click(&button).await?;
                pause(SOLVED_SETTLE, &self.cancel).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
