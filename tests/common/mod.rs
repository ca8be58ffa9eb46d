//! 测试用的内存页面
//!
//! 页面由若干 `Stage` 组成，点击按钮可以切换到下一个 Stage，
//! 选择器只支持本 crate 用到的简单形式（标签、#id、.class、[attr="v"] 等），
//! 逗号分隔的选择器组按文档顺序返回。

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use job_apply_submit::error::{AppError, AppResult, BrowserError};
use job_apply_submit::{ApplicantProfile, ElementRef, LoadState, PageDriver, SubmissionConfig};

/// 点击后的页面变化
#[derive(Debug, Clone, PartialEq)]
pub enum Click {
    /// 进入下一个 Stage
    Advance,
    /// 跳到指定 Stage
    GoTo(usize),
}

#[derive(Debug, Clone, Default)]
pub struct FakeElement {
    pub tag: String,
    pub attrs: BTreeMap<String, String>,
    pub text: Option<String>,
    pub hidden: bool,
    pub disabled: bool,
    pub checked: bool,
    pub files: Vec<String>,
    pub options: Vec<String>,
    pub extra_selectors: Vec<String>,
    pub on_click: Option<Click>,
}

impl FakeElement {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            ..Default::default()
        }
    }

    pub fn button(text: &str) -> Self {
        Self::new("button").text(text)
    }

    pub fn input(kind: &str, id: &str) -> Self {
        Self::new("input").attr("type", kind).attr("id", id)
    }

    pub fn label(for_id: &str, text: &str) -> Self {
        Self::new("label").attr("for", for_id).text(text)
    }

    pub fn link(text: &str, href: &str) -> Self {
        Self::new("a").attr("href", href).text(text)
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_string(), value.to_string());
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }

    pub fn options(mut self, options: &[&str]) -> Self {
        self.options = options.iter().map(|o| o.to_string()).collect();
        self
    }

    /// 额外匹配的选择器（无法从属性推导时使用）
    pub fn matches(mut self, selector: &str) -> Self {
        self.extra_selectors.push(selector.to_string());
        self
    }

    pub fn on_click(mut self, click: Click) -> Self {
        self.on_click = Some(click);
        self
    }

    fn id(&self) -> Option<&str> {
        self.attrs.get("id").map(String::as_str)
    }

    /// 元素能匹配的全部简单选择器
    fn selectors(&self) -> Vec<String> {
        let tag = self.tag.as_str();
        let mut out = vec![tag.to_string()];
        if let Some(id) = self.id() {
            out.push(format!("#{}", id));
            out.push(format!(r#"[id="{}"]"#, id));
            out.push(format!(r#"{}[id="{}"]"#, tag, id));
        }
        if let Some(class) = self.attrs.get("class") {
            for c in class.split_whitespace() {
                out.push(format!(".{}", c));
                out.push(format!("{}.{}", tag, c));
            }
        }
        for (name, value) in &self.attrs {
            out.push(format!("[{}]", name));
            out.push(format!("{}[{}]", tag, name));
            out.push(format!(r#"[{}="{}"]"#, name, value));
            out.push(format!(r#"{}[{}="{}"]"#, tag, name, value));
        }
        if tag == "input" && !self.attrs.contains_key("type") {
            out.push("input:not([type])".to_string());
        }
        out.extend(self.extra_selectors.iter().cloned());
        out
    }

    fn matches_group(&self, selector: &str) -> bool {
        let own = self.selectors();
        selector
            .split(',')
            .map(str::trim)
            .any(|part| own.iter().any(|s| s == part))
    }
}

#[derive(Debug, Clone, Default)]
pub struct Stage {
    pub url: Option<String>,
    pub body: String,
    pub elements: Vec<FakeElement>,
}

impl Stage {
    pub fn new() -> Self {
        Self::default()
    }

    /// 进入本 Stage 时的 URL；导航到这个 URL 也会进入本 Stage
    pub fn url(mut self, url: &str) -> Self {
        self.url = Some(url.to_string());
        self
    }

    pub fn body(mut self, body: &str) -> Self {
        self.body = body.to_string();
        self
    }

    pub fn with(mut self, element: FakeElement) -> Self {
        self.elements.push(element);
        self
    }
}

#[derive(Debug, Default)]
struct State {
    stages: Vec<Stage>,
    current: usize,
    url: String,
    calls: usize,
    navigations: Vec<String>,
    clicks: Vec<String>,
    fills: Vec<(String, String)>,
    screenshots: Vec<PathBuf>,
    fail_navigation: bool,
}

impl State {
    fn stage(&self) -> &Stage {
        &self.stages[self.current]
    }

    fn enter(&mut self, index: usize) {
        if index < self.stages.len() {
            self.current = index;
            if let Some(url) = self.stages[index].url.clone() {
                self.url = url;
            }
        }
    }

    fn resolve(&self, element: &ElementRef) -> AppResult<usize> {
        self.stage()
            .elements
            .iter()
            .enumerate()
            .filter(|(_, e)| e.matches_group(&element.selector))
            .nth(element.index)
            .map(|(i, _)| i)
            .ok_or_else(|| {
                BrowserError::ElementDetached {
                    selector: element.selector.clone(),
                    index: element.index,
                }
                .into()
            })
    }

    fn element(&self, element: &ElementRef) -> AppResult<&FakeElement> {
        let index = self.resolve(element)?;
        Ok(&self.stage().elements[index])
    }

    fn element_mut(&mut self, element: &ElementRef) -> AppResult<&mut FakeElement> {
        let index = self.resolve(element)?;
        let current = self.current;
        Ok(&mut self.stages[current].elements[index])
    }
}

/// 内存页面
pub struct FakePage {
    state: Mutex<State>,
    panic_on_navigate: AtomicBool,
}

impl FakePage {
    pub fn new(stages: Vec<Stage>) -> Self {
        let mut state = State {
            stages,
            url: "about:blank".to_string(),
            ..Default::default()
        };
        if state.stages.is_empty() {
            state.stages.push(Stage::new());
        }
        Self {
            state: Mutex::new(state),
            panic_on_navigate: AtomicBool::new(false),
        }
    }

    /// 每次导航都返回错误
    pub fn failing_navigation(self) -> Self {
        self.lock().fail_navigation = true;
        self
    }

    /// 每次导航都 panic
    pub fn panicking_navigation(self) -> Self {
        self.panic_on_navigate.store(true, Ordering::SeqCst);
        self
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn touch(&self) -> MutexGuard<'_, State> {
        let mut state = self.lock();
        state.calls += 1;
        state
    }

    /// 所有 `PageDriver` 调用的次数
    pub fn calls(&self) -> usize {
        self.lock().calls
    }

    pub fn navigations(&self) -> Vec<String> {
        self.lock().navigations.clone()
    }

    /// 被点击元素的文字（没有文字时用 id）
    pub fn clicks(&self) -> Vec<String> {
        self.lock().clicks.clone()
    }

    /// 被填写元素的 id（没有 id 时用标签名）和值
    pub fn fills(&self) -> Vec<(String, String)> {
        self.lock().fills.clone()
    }

    pub fn screenshots(&self) -> Vec<PathBuf> {
        self.lock().screenshots.clone()
    }

    pub fn current_stage(&self) -> usize {
        self.lock().current
    }

    /// 所有 Stage 中按 id 找元素的当前状态
    pub fn element_by_id(&self, id: &str) -> Option<FakeElement> {
        self.lock()
            .stages
            .iter()
            .flat_map(|s| s.elements.iter())
            .find(|e| e.id() == Some(id))
            .cloned()
    }

    pub fn value_of(&self, id: &str) -> Option<String> {
        self.element_by_id(id)
            .and_then(|e| e.attrs.get("value").cloned())
    }
}

#[async_trait]
impl PageDriver for FakePage {
    async fn navigate(&self, url: &str) -> AppResult<()> {
        if self.panic_on_navigate.load(Ordering::SeqCst) {
            panic!("boom: renderer crashed");
        }
        let mut state = self.touch();
        state.navigations.push(url.to_string());
        if state.fail_navigation {
            return Err(AppError::navigation_failed(
                url,
                std::io::Error::other("net::ERR_CONNECTION_RESET"),
            ));
        }
        state.url = url.to_string();
        if let Some(index) = state
            .stages
            .iter()
            .position(|s| s.url.as_deref() == Some(url))
        {
            state.current = index;
        }
        Ok(())
    }

    async fn current_url(&self) -> AppResult<String> {
        Ok(self.touch().url.clone())
    }

    async fn query_all(&self, selector: &str) -> AppResult<Vec<ElementRef>> {
        let state = self.touch();
        let count = state
            .stage()
            .elements
            .iter()
            .filter(|e| e.matches_group(selector))
            .count();
        Ok((0..count).map(|i| ElementRef::new(selector, i)).collect())
    }

    async fn is_visible(&self, element: &ElementRef) -> AppResult<bool> {
        let state = self.touch();
        Ok(!state.element(element)?.hidden)
    }

    async fn is_disabled(&self, element: &ElementRef) -> AppResult<bool> {
        let state = self.touch();
        Ok(state.element(element)?.disabled)
    }

    async fn is_checked(&self, element: &ElementRef) -> AppResult<bool> {
        let state = self.touch();
        Ok(state.element(element)?.checked)
    }

    async fn click(&self, element: &ElementRef) -> AppResult<()> {
        let mut state = self.touch();
        let target = state.element_mut(element)?;
        if target.tag == "input" && target.attrs.get("type").map(String::as_str) == Some("checkbox")
        {
            target.checked = !target.checked;
        }
        let label = target
            .text
            .clone()
            .or_else(|| target.id().map(String::from))
            .unwrap_or_else(|| target.tag.clone());
        let action = target.on_click.clone();
        state.clicks.push(label);
        match action {
            Some(Click::Advance) => {
                let next = state.current + 1;
                state.enter(next);
            }
            Some(Click::GoTo(index)) => state.enter(index),
            None => {}
        }
        Ok(())
    }

    async fn fill(&self, element: &ElementRef, value: &str) -> AppResult<()> {
        let mut state = self.touch();
        let target = state.element_mut(element)?;
        target.attrs.insert("value".to_string(), value.to_string());
        let key = target
            .id()
            .map(String::from)
            .unwrap_or_else(|| target.tag.clone());
        state.fills.push((key, value.to_string()));
        Ok(())
    }

    async fn select_option(&self, element: &ElementRef, value: &str) -> AppResult<()> {
        let mut state = self.touch();
        let target = state.element_mut(element)?;
        let wanted = value.trim().to_lowercase();
        match target
            .options
            .iter()
            .find(|o| o.to_lowercase() == wanted)
            .cloned()
        {
            Some(option) if target.tag == "select" => {
                target.attrs.insert("value".to_string(), option);
                Ok(())
            }
            _ => Err(AppError::Other(format!("{} 没有选项 {}", element, value))),
        }
    }

    async fn set_input_files(&self, element: &ElementRef, files: &[PathBuf]) -> AppResult<()> {
        let mut state = self.touch();
        let target = state.element_mut(element)?;
        target.files = files
            .iter()
            .filter_map(|p| p.file_name())
            .map(|n| n.to_string_lossy().to_string())
            .collect();
        Ok(())
    }

    async fn input_file_names(&self, element: &ElementRef) -> AppResult<Vec<String>> {
        let state = self.touch();
        Ok(state.element(element)?.files.clone())
    }

    async fn attribute(&self, element: &ElementRef, name: &str) -> AppResult<Option<String>> {
        let state = self.touch();
        Ok(state.element(element)?.attrs.get(name).cloned())
    }

    async fn text_content(&self, element: &ElementRef) -> AppResult<Option<String>> {
        let state = self.touch();
        Ok(state.element(element)?.text.clone())
    }

    async fn body_text(&self) -> AppResult<String> {
        Ok(self.touch().stage().body.clone())
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> AppResult<Option<ElementRef>> {
        if let Some(element) = self.query(selector).await? {
            return Ok(Some(element));
        }
        tokio::time::sleep(timeout).await;
        self.query(selector).await
    }

    async fn wait_for_load_state(&self, _state: LoadState, _timeout: Duration) -> AppResult<()> {
        self.touch();
        Ok(())
    }

    async fn screenshot(&self, path: &Path) -> AppResult<()> {
        self.touch().screenshots.push(path.to_path_buf());
        Ok(())
    }
}

// ========== 测试数据 ==========

pub fn profile() -> ApplicantProfile {
    ApplicantProfile {
        first_name: "Ada".to_string(),
        last_name: "Lovelace".to_string(),
        email: "ada@example.com".to_string(),
        phone: Some("+44 20 7946 0000".to_string()),
        ..Default::default()
    }
}

pub fn config() -> SubmissionConfig {
    SubmissionConfig {
        screenshot_dir: PathBuf::from("target/test-screenshots"),
        ..Default::default()
    }
}

/// 在临时目录中写入一份简历
pub fn resume_in(dir: &Path) -> PathBuf {
    let path = dir.join("ada_lovelace_resume.pdf");
    std::fs::write(&path, b"%PDF-1.4 resume").expect("写入简历失败");
    path
}

/// 单页通用表单：姓名、邮箱、简历、提交按钮，提交后显示感谢页
pub fn simple_form(url: &str) -> Vec<Stage> {
    vec![
        Stage::new()
            .url(url)
            .body("Apply for Backend Engineer")
            .with(FakeElement::label("full-name", "Full name"))
            .with(FakeElement::input("text", "full-name"))
            .with(FakeElement::input("email", "email-address"))
            .with(FakeElement::input("file", "resume-upload"))
            .with(
                FakeElement::button("Submit")
                    .attr("type", "submit")
                    .on_click(Click::Advance),
            ),
        Stage::new().body("Thank you! Your application was received."),
    ]
}
