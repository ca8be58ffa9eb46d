use std::sync::Arc;

use job_apply_submit::browser::connect_to_browser_and_page;
use job_apply_submit::config::Config;
use job_apply_submit::infrastructure::{ChromiumPage, JsExecutor};
use job_apply_submit::models::load_job_batch;
use job_apply_submit::services::RateLimiter;
use job_apply_submit::utils::logging;
use job_apply_submit::{PageDriver, SubmissionOrchestrator};
use tokio_util::sync::CancellationToken;

#[tokio::test]
#[ignore] // 默认忽略，需要手动运行：cargo test -- --ignored
async fn test_submit_first_job_in_batch() {
    // 初始化日志
    logging::init(true);

    // 加载配置
    let config = Config::from_env().expect("读取配置失败");

    // 连接浏览器
    let (_browser, page) = connect_to_browser_and_page(config.browser_debug_port, None)
        .await
        .expect("连接浏览器失败");

    // 加载任务文件
    // 注意：请通过 JOB_APPLY_JOBS_FILE 指定实际的任务文件
    let batch = load_job_batch(&config.jobs_file)
        .await
        .expect("加载任务文件失败");
    let request = batch
        .requests()
        .into_iter()
        .next()
        .expect("任务文件中没有职位");

    let page: Arc<dyn PageDriver> =
        Arc::new(ChromiumPage::new(JsExecutor::new(page), &config.submission));
    let orchestrator = SubmissionOrchestrator::new(
        page,
        config.submission.clone(),
        Arc::new(RateLimiter::new(config.rate_limit.clone())),
        CancellationToken::new(),
    );

    // 提交
    let result = orchestrator.submit_application(&request).await;
    println!("{} -> {} {:?}", result.job_id, result.status(), result.error_message);

    assert!(result.success(), "投递应该成功");
}

#[tokio::test]
#[ignore]
async fn test_browser_connection() {
    // 初始化日志
    logging::init(true);

    // 加载配置
    let config = Config::from_env().expect("读取配置失败");

    // 测试浏览器连接
    let result = connect_to_browser_and_page(config.browser_debug_port, None).await;

    assert!(result.is_ok(), "应该能够成功连接浏览器");
}

#[tokio::test]
#[ignore]
async fn test_load_jobs_file() {
    // 初始化日志
    logging::init(true);

    // 加载配置
    let config = Config::from_env().expect("读取配置失败");

    // 测试加载任务文件
    let result = load_job_batch(&config.jobs_file).await;

    assert!(result.is_ok(), "应该能够加载任务文件");

    let batch = result.unwrap();
    println!("找到 {} 个职位", batch.jobs.len());
}
