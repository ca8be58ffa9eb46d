//! 日志工具模块
//!
//! 提供日志初始化、格式化和输出的辅助函数

use std::fs;
use std::path::Path;

use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::{AppResult, FileError};
use crate::models::SubmissionResult;

/// 初始化 tracing 订阅器
///
/// 默认级别为 `info`，`verbose` 时为 `debug`，`RUST_LOG` 优先
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 初始化报告文件
pub fn init_log_file(log_file_path: &Path) -> AppResult<()> {
    let log_header = format!(
        "{}\n职位投递日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header).map_err(|e| FileError::WriteFailed {
        path: log_file_path.to_path_buf(),
        source: Box::new(e),
    })?;
    Ok(())
}

/// 向报告文件追加一条提交结果
pub fn append_result(log_file_path: &Path, result: &SubmissionResult) -> AppResult<()> {
    use std::io::Write;

    let line = format!(
        "[{}] {} | {} | {} | {}\n",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        result.job_id,
        result.platform,
        result.status(),
        result
            .error_message
            .as_deref()
            .or(result.confirmation_number.as_deref())
            .unwrap_or("-")
    );
    let write = || -> std::io::Result<()> {
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file_path)?;
        file.write_all(line.as_bytes())
    };
    write().map_err(|e| FileError::WriteFailed {
        path: log_file_path.to_path_buf(),
        source: Box::new(e),
    })?;
    Ok(())
}

/// 记录程序启动信息
pub fn log_startup(connect_existing: bool, rate_per_hour: usize) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 职位自动投递模式");
    info!(
        "🌐 浏览器: {}",
        if connect_existing { "连接已有浏览器" } else { "自行启动" }
    );
    info!("📊 每个平台每小时上限: {}", rate_per_hour);
    info!("{}", "=".repeat(60));
}

/// 记录批量任务开始信息
pub fn log_batch_start(total: usize, delay_secs: u64) {
    info!("\n{}", "=".repeat(60));
    info!("📦 开始投递，共 {} 个职位", total);
    info!("💡 严格顺序执行，每次提交间隔 {} 秒", delay_secs);
    info!("{}", "=".repeat(60));
}

/// 记录单个结果
pub fn log_result(index: usize, total: usize, result: &SubmissionResult) {
    info!("\n{}", "─".repeat(60));
    if result.success() {
        info!(
            "[职位 {}] ✅ {}/{} 投递成功 ({}){}",
            result.job_id,
            index,
            total,
            result.platform,
            result
                .confirmation_number
                .as_deref()
                .map(|n| format!(" 确认号: {}", n))
                .unwrap_or_default()
        );
    } else {
        info!(
            "[职位 {}] ❌ {}/{} {}: {}",
            result.job_id,
            index,
            total,
            result.status(),
            truncate_text(result.error_message.as_deref().unwrap_or("-"), 120)
        );
    }
    info!("{}", "─".repeat(60));
}

/// 打印最终统计信息
pub fn print_final_stats(success: usize, failed: usize, total: usize, log_file_path: &Path) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 成功: {}/{}", success, total);
    info!("❌ 失败: {}", failed);
    info!("{}", "=".repeat(60));
    info!("\n日志已保存至: {}", log_file_path.display());
}

/// 截断长文本用于日志显示
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
