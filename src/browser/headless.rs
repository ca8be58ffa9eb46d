use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tokio::time::sleep;
use tracing::{debug, error, info};

use crate::config::SubmissionConfig;
use crate::error::{AppResult, BrowserError};

/// 启动浏览器（按配置决定是否无头）并打开空白页
pub async fn launch_browser(config: &SubmissionConfig) -> AppResult<(Browser, Page)> {
    info!("🚀 启动浏览器 (headless: {})...", config.headless);

    let builder = BrowserConfig::builder()
        .request_timeout(config.page_load_timeout)
        .args(vec![
            "--no-sandbox",              // 禁用沙盒，防止权限问题导致的崩溃
            "--disable-dev-shm-usage",   // 防止共享内存不足
            "--remote-debugging-port=0", // 让浏览器自动选择端口
        ]);
    let builder = if config.headless {
        builder.new_headless_mode()
    } else {
        builder.with_head()
    };

    let browser_config = builder.build().map_err(|message| {
        error!("配置浏览器失败: {}", message);
        BrowserError::ConfigurationFailed { message }
    })?;

    let (browser, mut handler) = Browser::launch(browser_config).await.map_err(|e| {
        error!("启动浏览器失败: {}", e);
        BrowserError::LaunchFailed {
            source: Box::new(e),
        }
    })?;
    debug!("浏览器启动成功");

    // 在后台处理浏览器事件
    tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    });

    // 添加短暂延迟以等待浏览器状态同步
    sleep(tokio::time::Duration::from_millis(300)).await;

    let page = browser.new_page("about:blank").await.map_err(|e| {
        error!("创建页面失败: {}", e);
        BrowserError::PageCreationFailed {
            source: Box::new(e),
        }
    })?;

    Ok((browser, page))
}
