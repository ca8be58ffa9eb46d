//! 基础设施层
//!
//! 持有稀缺资源（Page），只向上暴露 `PageDriver` 能力

pub mod chromium_page;
pub mod js_executor;
pub mod page;

pub use chromium_page::ChromiumPage;
pub use js_executor::JsExecutor;
pub use page::{ElementRef, LoadState, PageDriver};
