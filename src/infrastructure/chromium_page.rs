//! chromiumoxide 页面实现 - 基础设施层
//!
//! 绝大部分能力通过 `JsExecutor` 执行脚本完成，只有文件上传和截图
//! 需要直接调用 CDP 命令。

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::dom::SetFileInputFilesParams;
use chromiumoxide::page::ScreenshotParams;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::time::{sleep, timeout, Instant};
use tracing::debug;

use crate::config::SubmissionConfig;
use crate::error::{AppError, AppResult, BrowserError};
use crate::infrastructure::page::{ElementRef, LoadState, PageDriver};
use crate::infrastructure::JsExecutor;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// 元素脚本的统一返回格式
#[derive(Debug, Deserialize)]
struct ElementReply<T> {
    found: bool,
    value: Option<T>,
}

/// 基于 chromiumoxide 的 `PageDriver`
pub struct ChromiumPage {
    executor: JsExecutor,
    action_timeout: Duration,
    page_load_timeout: Duration,
    slow_mo: Duration,
}

impl ChromiumPage {
    pub fn new(executor: JsExecutor, config: &SubmissionConfig) -> Self {
        Self {
            executor,
            action_timeout: config.element_timeout,
            page_load_timeout: config.page_load_timeout,
            slow_mo: config.slow_mo,
        }
    }

    /// 给单次页面操作加上超时
    async fn guarded<T>(
        &self,
        action: &str,
        fut: impl Future<Output = AppResult<T>>,
    ) -> AppResult<T> {
        timeout(self.action_timeout, fut)
            .await
            .map_err(|_| AppError::timeout(action, self.action_timeout))?
    }

    /// 执行脚本，脚本结果经 JSON.stringify 传回，避免 undefined 无法反序列化
    async fn run<T: DeserializeOwned>(&self, action: &str, expression: String) -> AppResult<T> {
        let js_code = format!(
            "(() => {{ const __r = ({}); return JSON.stringify(__r === undefined ? null : __r); }})()",
            expression
        );
        let raw: String = self.guarded(action, self.executor.eval_as(js_code)).await?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// 在指定元素上执行一段函数体，`el` 为目标元素
    async fn on_element<T: DeserializeOwned>(
        &self,
        action: &str,
        element: &ElementRef,
        body: &str,
    ) -> AppResult<Option<T>> {
        let expression = format!(
            r#"(() => {{
                const el = document.querySelectorAll({selector})[{index}];
                if (!el) return {{ found: false, value: null }};
                const value = (() => {{ {body} }})();
                return {{ found: true, value: value === undefined ? null : value }};
            }})()"#,
            selector = serde_json::to_string(&element.selector)?,
            index = element.index,
            body = body,
        );

        let reply: ElementReply<T> = self.run(action, expression).await?;
        if !reply.found {
            return Err(BrowserError::ElementDetached {
                selector: element.selector.clone(),
                index: element.index,
            }
            .into());
        }
        Ok(reply.value)
    }

    async fn slow_down(&self) {
        if !self.slow_mo.is_zero() {
            sleep(self.slow_mo).await;
        }
    }
}

#[async_trait]
impl PageDriver for ChromiumPage {
    async fn navigate(&self, url: &str) -> AppResult<()> {
        debug!("导航到: {}", url);
        match timeout(self.page_load_timeout, self.executor.page().goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(AppError::navigation_failed(url, e)),
            Err(_) => Err(AppError::timeout(format!("navigate {}", url), self.page_load_timeout)),
        }
    }

    async fn current_url(&self) -> AppResult<String> {
        let url = self
            .guarded("current_url", async { Ok::<_, AppError>(self.executor.page().url().await?) })
            .await?;
        Ok(url.unwrap_or_default())
    }

    async fn query_all(&self, selector: &str) -> AppResult<Vec<ElementRef>> {
        let expression = format!(
            "document.querySelectorAll({}).length",
            serde_json::to_string(selector)?
        );
        let count: usize = self.run("query_all", expression).await?;
        Ok((0..count).map(|index| ElementRef::new(selector, index)).collect())
    }

    async fn is_visible(&self, element: &ElementRef) -> AppResult<bool> {
        let visible = self
            .on_element(
                "is_visible",
                element,
                r#"const s = getComputedStyle(el);
                   return s.visibility !== 'hidden' && s.display !== 'none'
                       && !!(el.offsetWidth || el.offsetHeight || el.getClientRects().length);"#,
            )
            .await?;
        Ok(visible.unwrap_or(false))
    }

    async fn is_disabled(&self, element: &ElementRef) -> AppResult<bool> {
        let disabled = self
            .on_element(
                "is_disabled",
                element,
                "return !!el.disabled || el.getAttribute('aria-disabled') === 'true';",
            )
            .await?;
        Ok(disabled.unwrap_or(false))
    }

    async fn is_checked(&self, element: &ElementRef) -> AppResult<bool> {
        let checked = self
            .on_element("is_checked", element, "return !!el.checked;")
            .await?;
        Ok(checked.unwrap_or(false))
    }

    async fn click(&self, element: &ElementRef) -> AppResult<()> {
        self.slow_down().await;
        self.on_element::<bool>(
            "click",
            element,
            "el.scrollIntoView({ block: 'center' }); el.click(); return true;",
        )
        .await?;
        Ok(())
    }

    async fn fill(&self, element: &ElementRef, value: &str) -> AppResult<()> {
        self.slow_down().await;
        // 通过原生 setter 赋值，保证 React 等框架能感知到变化
        let body = format!(
            r#"el.focus();
               const desc = Object.getOwnPropertyDescriptor(Object.getPrototypeOf(el), 'value');
               if (desc && desc.set) {{ desc.set.call(el, {value}); }} else {{ el.value = {value}; }}
               el.dispatchEvent(new Event('input', {{ bubbles: true }}));
               el.dispatchEvent(new Event('change', {{ bubbles: true }}));
               el.blur();
               return true;"#,
            value = serde_json::to_string(value)?
        );
        self.on_element::<bool>("fill", element, &body).await?;
        Ok(())
    }

    async fn select_option(&self, element: &ElementRef, value: &str) -> AppResult<()> {
        self.slow_down().await;
        let body = format!(
            r#"const want = {value}.trim().toLowerCase();
               const options = Array.from(el.options || []);
               const opt = options.find(o => o.value.toLowerCase() === want || o.text.trim().toLowerCase() === want)
                   || options.find(o => o.text.toLowerCase().includes(want));
               if (!opt) return false;
               el.value = opt.value;
               el.dispatchEvent(new Event('change', {{ bubbles: true }}));
               return true;"#,
            value = serde_json::to_string(value)?
        );
        let selected: Option<bool> = self.on_element("select_option", element, &body).await?;
        if selected.unwrap_or(false) {
            Ok(())
        } else {
            Err(AppError::Other(format!("下拉框 {} 中没有选项: {}", element, value)))
        }
    }

    async fn set_input_files(&self, element: &ElementRef, files: &[PathBuf]) -> AppResult<()> {
        self.slow_down().await;
        let page = self.executor.page();
        let upload = async {
            let elements = page.find_elements(element.selector.as_str()).await?;
            let target = elements.get(element.index).ok_or_else(|| BrowserError::ElementDetached {
                selector: element.selector.clone(),
                index: element.index,
            })?;
            let params = SetFileInputFilesParams::builder()
                .files(files.iter().map(|p| p.to_string_lossy().to_string()))
                .backend_node_id(target.backend_node_id.clone())
                .build()
                .map_err(|message| BrowserError::ConfigurationFailed { message })?;
            page.execute(params).await?;
            Ok::<(), AppError>(())
        };
        self.guarded("set_input_files", upload).await
    }

    async fn input_file_names(&self, element: &ElementRef) -> AppResult<Vec<String>> {
        let names = self
            .on_element(
                "input_file_names",
                element,
                "return Array.from(el.files || []).map(f => f.name);",
            )
            .await?;
        Ok(names.unwrap_or_default())
    }

    async fn attribute(&self, element: &ElementRef, name: &str) -> AppResult<Option<String>> {
        let body = format!("return el.getAttribute({});", serde_json::to_string(name)?);
        self.on_element("attribute", element, &body).await
    }

    async fn text_content(&self, element: &ElementRef) -> AppResult<Option<String>> {
        self.on_element("text_content", element, "return el.textContent;")
            .await
    }

    async fn body_text(&self) -> AppResult<String> {
        let text: Option<String> = self
            .run(
                "body_text",
                "document.body ? document.body.innerText : ''".to_string(),
            )
            .await?;
        Ok(text.unwrap_or_default())
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        wait: Duration,
    ) -> AppResult<Option<ElementRef>> {
        let deadline = Instant::now() + wait;
        loop {
            if let Some(element) = self.query(selector).await? {
                return Ok(Some(element));
            }
            if Instant::now() >= deadline {
                debug!("等待选择器超时: {}", selector);
                return Ok(None);
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    async fn wait_for_load_state(&self, state: LoadState, wait: Duration) -> AppResult<()> {
        let accepted: &[&str] = match state {
            LoadState::DomContentLoaded => &["interactive", "complete"],
            LoadState::Load | LoadState::NetworkIdle => &["complete"],
        };
        let deadline = Instant::now() + wait;
        loop {
            let ready: String = self
                .run("ready_state", "document.readyState".to_string())
                .await?;
            if accepted.contains(&ready.as_str()) {
                break;
            }
            if Instant::now() >= deadline {
                return Err(AppError::timeout(format!("wait_for_load_state {:?}", state), wait));
            }
            sleep(POLL_INTERVAL).await;
        }
        if state == LoadState::NetworkIdle {
            // CDP 没有直接的 networkidle 事件，加载完成后再留出一段静默期
            sleep(Duration::from_millis(500)).await;
        }
        Ok(())
    }

    async fn screenshot(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let params = ScreenshotParams::builder().full_page(true).build();
        self.guarded("screenshot", async {
            self.executor.page().save_screenshot(params, path).await?;
            Ok::<(), AppError>(())
        })
        .await
    }
}
