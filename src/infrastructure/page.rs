//! 页面能力抽象 - 基础设施层
//!
//! 上层（services / workflow）只认识 `PageDriver`，不认识具体的浏览器驱动。
//! 元素通过 `ElementRef`（选择器 + 序号）定位，每次操作都会重新解析，
//! 页面刷新后旧的引用会返回 `BrowserError::ElementDetached`。

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::AppResult;

/// 页面上某个元素的定位描述
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementRef {
    /// 查询时使用的 CSS 选择器
    pub selector: String,
    /// 在 `querySelectorAll(selector)` 结果中的序号
    pub index: usize,
}

impl ElementRef {
    pub fn new(selector: impl Into<String>, index: usize) -> Self {
        Self {
            selector: selector.into(),
            index,
        }
    }
}

impl fmt::Display for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.selector, self.index)
    }
}

/// 页面加载状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    DomContentLoaded,
    Load,
    NetworkIdle,
}

/// 页面能力
///
/// 职责：
/// - 只暴露页面交互的原子能力
/// - 不认识 Job / Profile
/// - 每次调用自带短超时，由实现方保证
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// 导航到指定 URL
    async fn navigate(&self, url: &str) -> AppResult<()>;

    /// 当前页面 URL
    async fn current_url(&self) -> AppResult<String>;

    /// 查询所有匹配的元素
    async fn query_all(&self, selector: &str) -> AppResult<Vec<ElementRef>>;

    /// 查询第一个匹配的元素
    async fn query(&self, selector: &str) -> AppResult<Option<ElementRef>> {
        Ok(self.query_all(selector).await?.into_iter().next())
    }

    async fn is_visible(&self, element: &ElementRef) -> AppResult<bool>;

    async fn is_disabled(&self, element: &ElementRef) -> AppResult<bool>;

    async fn is_checked(&self, element: &ElementRef) -> AppResult<bool>;

    async fn click(&self, element: &ElementRef) -> AppResult<()>;

    async fn fill(&self, element: &ElementRef, value: &str) -> AppResult<()>;

    /// 按选项文本或 value 选择下拉框
    async fn select_option(&self, element: &ElementRef, value: &str) -> AppResult<()>;

    /// 为文件输入框设置文件（空列表表示清空）
    async fn set_input_files(&self, element: &ElementRef, files: &[PathBuf]) -> AppResult<()>;

    /// 文件输入框当前已选择的文件名
    async fn input_file_names(&self, element: &ElementRef) -> AppResult<Vec<String>>;

    async fn attribute(&self, element: &ElementRef, name: &str) -> AppResult<Option<String>>;

    async fn text_content(&self, element: &ElementRef) -> AppResult<Option<String>>;

    /// 页面正文的可见文本
    async fn body_text(&self) -> AppResult<String>;

    /// 等待选择器出现，超时返回 `None`
    async fn wait_for_selector(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> AppResult<Option<ElementRef>>;

    async fn wait_for_load_state(&self, state: LoadState, timeout: Duration) -> AppResult<()>;

    async fn screenshot(&self, path: &Path) -> AppResult<()>;
}
