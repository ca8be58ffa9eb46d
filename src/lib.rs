//! # Job Apply Submit
//!
//! 一个用于自动投递职位申请的 Rust 应用程序
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（Page），只暴露能力
//! - `PageDriver` - 页面能力抽象，上层只认识它
//! - `JsExecutor` / `ChromiumPage` - 唯一的 page owner 及其实现
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，不认识完整流程
//! - `PlatformRouter` - 按域名识别平台
//! - `RateLimiter` - 每个平台的自适应限流
//! - `FormMapper` / `DocumentUploader` - 填表、上传
//! - `FormNavigator` - 多步表单状态机
//! - `CaptchaGuard` / `RedirectTracker` - 验证码、站外跳转
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"投递一个职位"的完整流程
//! - `PlatformHandler` - 共享模板 + 平台差异（LinkedIn / Indeed / Greenhouse / 通用）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/submitter` - 单次提交：路由、限流、校验、重试
//! - `orchestrator/batch_processor` - 批量投递，管理浏览器资源
//!
//! ## 模块结构

pub mod browser;
pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use browser::{connect_to_browser_and_page, launch_browser};
pub use config::{Config, RateLimitConfig, SubmissionConfig};
pub use error::{AppError, AppResult};
pub use infrastructure::{ElementRef, JsExecutor, LoadState, PageDriver};
pub use models::{
    ApplicantProfile, JobPosting, Platform, SubmissionRequest, SubmissionResult, SubmissionStatus,
};
pub use orchestrator::{App, BatchReport, SubmissionOrchestrator};
pub use services::{PlatformRouter, RateLimiter};
pub use workflow::{HandlerKind, PlatformHandler};
