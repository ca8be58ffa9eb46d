//! Greenhouse 专用步骤
//!
//! Greenhouse 的表单结构固定：标准字段有固定 id，自定义问题通过 `label[for]`
//! 关联到输入框，页面底部通常有隐私政策勾选框。

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::{debug, info, warn};

use crate::error::AppResult;
use crate::infrastructure::{ElementRef, PageDriver};

/// 标准字段：id 选择器 → 资料中的用途
pub const STANDARD_FIELDS: &[(&str, &str)] = &[
    ("#first_name", "first_name"),
    ("#last_name", "last_name"),
    ("#email", "email"),
    ("#phone", "phone"),
];

const CONSENT_KEYWORDS: &[&str] = &["privacy", "consent", "gdpr", "data policy", "terms"];

/// 问题文本归一化：去掉首尾空白和必填星号，合并连续空白，转小写
///
/// 归一化之后必须完全相同才算匹配
pub fn normalize_question(text: &str) -> String {
    text.trim()
        .trim_end_matches('*')
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// 按 id 填写标准字段，返回已填写字段的 id
pub async fn fill_standard_fields(
    page: &dyn PageDriver,
    data: &HashMap<String, String>,
) -> AppResult<HashSet<String>> {
    let mut filled = HashSet::new();
    for (selector, purpose) in STANDARD_FIELDS {
        let Some(value) = data.get(*purpose) else {
            continue;
        };
        let Some(element) = page.query(selector).await? else {
            continue;
        };
        page.fill(&element, value).await?;
        debug!("Greenhouse 标准字段已填写: {}", selector);
        filled.insert(selector.trim_start_matches('#').to_string());
    }
    Ok(filled)
}

/// 按问题原文回答自定义问题，返回回答的数量
pub async fn answer_screening_questions(
    page: &dyn PageDriver,
    responses: &BTreeMap<String, String>,
) -> AppResult<usize> {
    if responses.is_empty() {
        return Ok(0);
    }
    let answers: HashMap<String, &str> = responses
        .iter()
        .map(|(q, a)| (normalize_question(q), a.as_str()))
        .collect();

    let mut answered = 0;
    for label in page.query_all("label[for]").await? {
        let question = normalize_question(&page.text_content(&label).await?.unwrap_or_default());
        let Some(answer) = answers.get(&question) else {
            continue;
        };
        let Some(target_id) = page.attribute(&label, "for").await? else {
            continue;
        };
        let selector = format!(r#"[id="{}"]"#, target_id.replace('"', "\\\""));
        let Some(input) = page.query(&selector).await? else {
            warn!("问题 \"{}\" 找不到对应的输入框", question);
            continue;
        };
        if answer_one(page, &input, answer).await? {
            info!("✓ 已回答问题: {}", question);
            answered += 1;
        }
    }
    Ok(answered)
}

async fn answer_one(page: &dyn PageDriver, input: &ElementRef, answer: &str) -> AppResult<bool> {
    if page.attribute(input, "type").await?.as_deref() == Some("checkbox") {
        let wanted = matches!(answer.trim().to_lowercase().as_str(), "yes" | "true" | "1");
        if wanted != page.is_checked(input).await? {
            page.click(input).await?;
        }
        return Ok(true);
    }
    // 先当作下拉框选择，不是下拉框或没有对应选项时按文本填写
    match page.select_option(input, answer).await {
        Ok(()) => Ok(true),
        Err(_) => {
            page.fill(input, answer).await?;
            Ok(true)
        }
    }
}

/// 勾选隐私政策 / 同意类复选框，返回勾选的数量
pub async fn accept_privacy_checkboxes(page: &dyn PageDriver) -> AppResult<usize> {
    let mut accepted = 0;
    for checkbox in page.query_all(r#"input[type="checkbox"]"#).await? {
        let mut text = String::new();
        for attr in ["id", "name", "aria-label"] {
            if let Some(value) = page.attribute(&checkbox, attr).await? {
                text.push_str(&value.to_lowercase());
                text.push(' ');
            }
        }
        if !CONSENT_KEYWORDS.iter().any(|k| text.contains(k)) {
            continue;
        }
        if !page.is_checked(&checkbox).await? {
            page.click(&checkbox).await?;
            accepted += 1;
        }
    }
    if accepted > 0 {
        info!("✓ 已勾选 {} 个隐私政策复选框", accepted);
    }
    Ok(accepted)
}
