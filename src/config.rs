use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{AppResult, ConfigError};

/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    /// 浏览器调试端口
    pub browser_debug_port: u16,
    /// 连接已打开的浏览器（否则自行启动）
    pub connect_existing: bool,
    /// 批量任务文件（TOML）
    pub jobs_file: PathBuf,
    /// 输出日志文件
    pub output_log_file: PathBuf,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 提交流程配置
    pub submission: SubmissionConfig,
    /// 限流配置
    pub rate_limit: RateLimitConfig,
}

/// 单次提交流程的配置
#[derive(Clone, Debug, PartialEq)]
pub struct SubmissionConfig {
    // --- 重试 ---
    pub max_retries: u32,
    pub retry_delay: Duration,
    // --- 超时 ---
    pub page_load_timeout: Duration,
    pub element_timeout: Duration,
    // --- 截图 ---
    pub screenshot_on_error: bool,
    pub screenshot_on_success: bool,
    pub screenshot_dir: PathBuf,
    // --- 浏览器 ---
    pub headless: bool,
    /// 每次页面动作前的额外延迟
    pub slow_mo: Duration,
    // --- 节奏 ---
    pub delay_between_actions: Duration,
    pub delay_between_submissions: Duration,
    // --- 验证码 ---
    /// 检测到验证码时是否等待人工处理（否则立即返回 CAPTCHA_DETECTED）
    pub pause_on_captcha: bool,
    pub captcha_wait_time: Duration,
    // --- 校验 ---
    pub verify_submission: bool,
    /// 点击提交后等待确认页的时间
    pub confirmation_wait_time: Duration,
    /// 多步表单最多翻页次数
    pub max_navigation_steps: usize,
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_secs(5),
            page_load_timeout: Duration::from_secs(30),
            element_timeout: Duration::from_secs(10),
            screenshot_on_error: true,
            screenshot_on_success: true,
            screenshot_dir: PathBuf::from("data/screenshots"),
            headless: false,
            slow_mo: Duration::from_millis(100),
            delay_between_actions: Duration::from_secs(1),
            delay_between_submissions: Duration::from_secs(30),
            pause_on_captcha: false,
            captcha_wait_time: Duration::from_secs(300),
            verify_submission: true,
            confirmation_wait_time: Duration::from_secs(3),
            max_navigation_steps: 10,
        }
    }
}

/// 限流配置
#[derive(Clone, Debug, PartialEq)]
pub struct RateLimitConfig {
    /// 每小时允许的提交次数
    pub default_rate: usize,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            default_rate: 10,
            min_delay: Duration::from_secs(30),
            max_delay: Duration::from_secs(300),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            browser_debug_port: 9222,
            connect_existing: false,
            jobs_file: PathBuf::from("jobs.toml"),
            output_log_file: PathBuf::from("submissions.log"),
            verbose_logging: false,
            submission: SubmissionConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl Config {
    /// 从环境变量读取配置，未设置的项使用默认值
    pub fn from_env() -> AppResult<Self> {
        let default = Self::default();
        let sub = default.submission;
        let rate = default.rate_limit;

        let config = Self {
            browser_debug_port: env_or("JOB_APPLY_DEBUG_PORT", default.browser_debug_port)?,
            connect_existing: env_or("JOB_APPLY_CONNECT_EXISTING", default.connect_existing)?,
            jobs_file: env_or("JOB_APPLY_JOBS_FILE", default.jobs_file)?,
            output_log_file: env_or("JOB_APPLY_OUTPUT_LOG", default.output_log_file)?,
            verbose_logging: env_or("JOB_APPLY_VERBOSE", default.verbose_logging)?,
            submission: SubmissionConfig {
                max_retries: env_or("JOB_APPLY_MAX_RETRIES", sub.max_retries)?,
                retry_delay: env_secs("JOB_APPLY_RETRY_DELAY", sub.retry_delay)?,
                page_load_timeout: env_secs("JOB_APPLY_PAGE_LOAD_TIMEOUT", sub.page_load_timeout)?,
                element_timeout: env_secs("JOB_APPLY_ELEMENT_TIMEOUT", sub.element_timeout)?,
                screenshot_on_error: env_or("JOB_APPLY_SCREENSHOT_ON_ERROR", sub.screenshot_on_error)?,
                screenshot_on_success: env_or(
                    "JOB_APPLY_SCREENSHOT_ON_SUCCESS",
                    sub.screenshot_on_success,
                )?,
                screenshot_dir: env_or("JOB_APPLY_SCREENSHOT_DIR", sub.screenshot_dir)?,
                headless: env_or("JOB_APPLY_HEADLESS", sub.headless)?,
                slow_mo: env_millis("JOB_APPLY_SLOW_MO_MS", sub.slow_mo)?,
                delay_between_actions: env_secs(
                    "JOB_APPLY_DELAY_BETWEEN_ACTIONS",
                    sub.delay_between_actions,
                )?,
                delay_between_submissions: env_secs(
                    "JOB_APPLY_DELAY_BETWEEN_SUBMISSIONS",
                    sub.delay_between_submissions,
                )?,
                pause_on_captcha: env_or("JOB_APPLY_PAUSE_ON_CAPTCHA", sub.pause_on_captcha)?,
                captcha_wait_time: env_secs("JOB_APPLY_CAPTCHA_WAIT_TIME", sub.captcha_wait_time)?,
                verify_submission: env_or("JOB_APPLY_VERIFY_SUBMISSION", sub.verify_submission)?,
                confirmation_wait_time: env_secs(
                    "JOB_APPLY_CONFIRMATION_WAIT_TIME",
                    sub.confirmation_wait_time,
                )?,
                max_navigation_steps: env_or("JOB_APPLY_MAX_NAVIGATION_STEPS", sub.max_navigation_steps)?,
            },
            rate_limit: RateLimitConfig {
                default_rate: env_or("JOB_APPLY_RATE_PER_HOUR", rate.default_rate)?,
                min_delay: env_secs("JOB_APPLY_MIN_DELAY", rate.min_delay)?,
                max_delay: env_secs("JOB_APPLY_MAX_DELAY", rate.max_delay)?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// 检查互相依赖的配置项
    pub fn validate(&self) -> AppResult<()> {
        if self.rate_limit.min_delay > self.rate_limit.max_delay {
            return Err(ConfigError::InvalidValue {
                name: "JOB_APPLY_MIN_DELAY".to_string(),
                reason: "min_delay 不能大于 max_delay".to_string(),
            }
            .into());
        }
        if self.submission.max_retries == 0 {
            return Err(ConfigError::InvalidValue {
                name: "JOB_APPLY_MAX_RETRIES".to_string(),
                reason: "至少需要尝试一次".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

fn env_or<T: FromStr>(var_name: &str, default: T) -> AppResult<T> {
    match std::env::var(var_name) {
        Ok(value) => value.trim().parse().map_err(|_| {
            ConfigError::EnvVarParseFailed {
                var_name: var_name.to_string(),
                value,
                expected_type: std::any::type_name::<T>().to_string(),
            }
            .into()
        }),
        Err(_) => Ok(default),
    }
}

fn env_secs(var_name: &str, default: Duration) -> AppResult<Duration> {
    let secs = env_or(var_name, default.as_secs_f64())?;
    Duration::try_from_secs_f64(secs).map_err(|_| {
        ConfigError::InvalidValue {
            name: var_name.to_string(),
            reason: format!("{} 不是合法的秒数", secs),
        }
        .into()
    })
}

fn env_millis(var_name: &str, default: Duration) -> AppResult<Duration> {
    let millis: u64 = env_or(var_name, default.as_millis() as u64)?;
    Ok(Duration::from_millis(millis))
}
