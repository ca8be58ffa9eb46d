//! 按可见文字查找按钮类控件
//!
//! 导航、验证码、跳转检测共用同一套查找规则：
//! 先按模式顺序匹配控件文字（或 submit 输入框的 value），再按 aria-label 匹配，
//! 只返回可见的控件。

use crate::error::AppResult;
use crate::infrastructure::{ElementRef, PageDriver};

pub const CONTROL_SELECTOR: &str = r#"button, input[type="submit"], a, [role="button"]"#;
pub const ARIA_SELECTOR: &str = r#"button[aria-label], [role="button"][aria-label]"#;

pub const NEXT_PATTERNS: &[&str] = &[
    "next",
    "continue",
    "proceed",
    "forward",
    "submit",
    "save and continue",
];

pub const BACK_PATTERNS: &[&str] = &["back", "previous", "prev", "return"];

pub const SUBMIT_PATTERNS: &[&str] = &[
    "submit",
    "apply",
    "send application",
    "complete application",
    "finish",
    "done",
];

/// 控件的显示文字（小写），按钮取文本，submit 输入框取 value
pub async fn control_label(page: &dyn PageDriver, element: &ElementRef) -> AppResult<String> {
    let text = page.text_content(element).await?.unwrap_or_default();
    let text = text.trim();
    if !text.is_empty() {
        return Ok(text.to_lowercase());
    }
    Ok(page
        .attribute(element, "value")
        .await?
        .unwrap_or_default()
        .trim()
        .to_lowercase())
}

/// 找到第一个文字命中模式的可见控件
pub async fn find_control(
    page: &dyn PageDriver,
    patterns: &[&str],
) -> AppResult<Option<ElementRef>> {
    find_control_excluding(page, patterns, &[]).await
}

/// 同 `find_control`，但跳过文字（或 aria-label）在 `excluded` 中的控件
///
/// 点过的入口按钮（如 Easy Apply）在弹出的表单后面依然可见，
/// 它的文字又会命中提交类模式，需要排除在外
pub async fn find_control_excluding(
    page: &dyn PageDriver,
    patterns: &[&str],
    excluded: &[String],
) -> AppResult<Option<ElementRef>> {
    let mut labelled = Vec::new();
    for element in page.query_all(CONTROL_SELECTOR).await? {
        let label = control_label(page, &element).await?;
        if !label.is_empty() && !excluded.contains(&label) {
            labelled.push((element, label));
        }
    }
    if let Some(found) = first_visible(page, patterns, &labelled).await? {
        return Ok(Some(found));
    }

    let mut aria = Vec::new();
    for element in page.query_all(ARIA_SELECTOR).await? {
        if let Some(label) = page.attribute(&element, "aria-label").await? {
            let label = label.trim().to_lowercase();
            if !excluded.contains(&label) {
                aria.push((element, label));
            }
        }
    }
    first_visible(page, patterns, &aria).await
}

/// 找到命中模式且未禁用的可见控件
pub async fn find_enabled_control(
    page: &dyn PageDriver,
    patterns: &[&str],
) -> AppResult<Option<ElementRef>> {
    match find_control(page, patterns).await? {
        Some(element) if !page.is_disabled(&element).await? => Ok(Some(element)),
        _ => Ok(None),
    }
}

/// 依次尝试选择器，返回第一个可见元素
pub async fn first_visible_selector(
    page: &dyn PageDriver,
    selectors: &[&str],
) -> AppResult<Option<ElementRef>> {
    for selector in selectors {
        for element in page.query_all(selector).await? {
            if page.is_visible(&element).await? {
                return Ok(Some(element));
            }
        }
    }
    Ok(None)
}

pub fn matches_any(label: &str, patterns: &[&str]) -> bool {
    let label = label.to_lowercase();
    patterns.iter().any(|p| label.contains(p))
}

async fn first_visible(
    page: &dyn PageDriver,
    patterns: &[&str],
    labelled: &[(ElementRef, String)],
) -> AppResult<Option<ElementRef>> {
    for pattern in patterns {
        for (element, label) in labelled {
            if label.contains(pattern) && page.is_visible(element).await? {
                return Ok(Some(element.clone()));
            }
        }
    }
    Ok(None)
}
