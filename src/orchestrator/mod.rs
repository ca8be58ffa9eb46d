//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责批量投递和单次提交的调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `batch_processor` - 批量投递处理器
//! - 管理应用生命周期（初始化、运行）
//! - 加载任务文件（`JobBatch`）
//! - 管理浏览器资源（Browser、ChromiumPage）
//! - 输出全局统计信息和报告文件
//!
//! ### `submitter` - 单个职位提交器
//! - 平台路由、限流闸门、输入校验
//! - 有限重试，验证码 / 需人工处理立即停止
//! - 把处理器的错误、panic、取消统一转换为结果
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (处理 Vec<SubmissionRequest>)
//!     ↓
//! submitter (处理单个 SubmissionRequest，重试)
//!     ↓
//! workflow::PlatformHandler (一次完整的投递流程)
//!     ↓
//! services (能力层：form / upload / captcha / navigation / redirect)
//!     ↓
//! infrastructure (基础设施：PageDriver)
//! ```

pub mod batch_processor;
pub mod submitter;

// 重新导出主要类型
pub use batch_processor::App;
pub use submitter::{BatchReport, SubmissionOrchestrator};
