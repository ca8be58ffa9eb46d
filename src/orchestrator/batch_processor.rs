//! 批量投递处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责批量投递和资源管理。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：报告文件、连接或启动浏览器、创建 `ChromiumPage`
//! 2. **批量加载**：读取任务文件（`JobBatch`）
//! 3. **顺序投递**：委托 `SubmissionOrchestrator`，一次只投递一个职位
//! 4. **资源管理**：持有 Browser，确保生命周期覆盖整个批次
//! 5. **全局统计**：汇总结果并写入报告文件
//!
//! Ctrl-C 会触发取消信号，正在进行的提交以 `cancelled` 结束

use std::sync::Arc;

use anyhow::Result;
use chromiumoxide::Browser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::browser;
use crate::config::Config;
use crate::infrastructure::{ChromiumPage, JsExecutor, PageDriver};
use crate::models::load_job_batch;
use crate::orchestrator::SubmissionOrchestrator;
use crate::services::RateLimiter;
use crate::utils::logging::{
    append_result, init_log_file, log_batch_start, log_result, log_startup, print_final_stats,
};

/// 应用主结构
pub struct App {
    config: Config,
    _browser: Browser,
    orchestrator: SubmissionOrchestrator,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        // 初始化报告文件
        init_log_file(&config.output_log_file)?;

        log_startup(config.connect_existing, config.rate_limit.default_rate);

        let (browser, page) = if config.connect_existing {
            browser::connect_to_browser_and_page(config.browser_debug_port, None).await?
        } else {
            browser::launch_browser(&config.submission).await?
        };

        // JsExecutor 持有 page，上层只看到 PageDriver
        let executor = JsExecutor::new(page);
        let page: Arc<dyn PageDriver> = Arc::new(ChromiumPage::new(executor, &config.submission));

        let cancel = CancellationToken::new();
        let interrupt = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("⛔ 收到中断信号，正在停止...");
                interrupt.cancel();
            }
        });

        let limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));
        let orchestrator =
            SubmissionOrchestrator::new(page, config.submission.clone(), limiter, cancel);

        Ok(Self {
            config,
            _browser: browser,
            orchestrator,
        })
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> Result<()> {
        info!("\n📁 正在加载任务文件: {}", self.config.jobs_file.display());
        let batch = load_job_batch(&self.config.jobs_file).await?;
        let requests = batch.requests();

        if requests.is_empty() {
            warn!("⚠️ 任务文件中没有职位，程序结束");
            return Ok(());
        }

        let total = requests.len();
        log_batch_start(total, self.config.submission.delay_between_submissions.as_secs());

        let log_path = self.config.output_log_file.as_path();
        let report = self
            .orchestrator
            .submit_batch_with(&requests, |index, result| {
                log_result(index, total, result);
                if let Err(e) = append_result(log_path, result) {
                    error!("写入报告失败: {}", e);
                }
            })
            .await;

        for (platform, stats) in self.orchestrator.limiter().get_all_stats() {
            info!(
                "📈 {}: 本小时 {} 次 / 累计 {} 次，状态 {}，当前间隔 {} 秒",
                platform,
                stats.submissions_last_hour,
                stats.total_submissions,
                stats.status,
                stats.current_delay.as_secs()
            );
        }

        print_final_stats(report.succeeded, report.failed, total, log_path);

        Ok(())
    }
}
