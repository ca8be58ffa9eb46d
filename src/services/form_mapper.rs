//! 表单字段检测与映射

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult};
use crate::infrastructure::{ElementRef, PageDriver};
use crate::models::{FieldType, FormField};

/// 按类别枚举控件：选择器、字段类型、固定用途
const FIELD_CATEGORIES: &[(&str, FieldType, Option<&str>)] = &[
    (r#"input[type="text"], input:not([type])"#, FieldType::Text, None),
    (r#"input[type="email"]"#, FieldType::Email, Some("email")),
    (r#"input[type="tel"], input[type="phone"]"#, FieldType::Phone, Some("phone")),
    (r#"input[type="url"]"#, FieldType::Url, None),
    (r#"input[type="file"]"#, FieldType::File, None),
    ("select", FieldType::Select, None),
    ("textarea", FieldType::Textarea, None),
    (r#"input[type="checkbox"]"#, FieldType::Checkbox, None),
];

fn family(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(&format!("(?i){}", p)).expect("合法的正则"))
        .collect()
}

static NAME_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    family(&[
        r"\bfirst\s*name\b",
        r"\bgiven\s*name\b",
        r"\blast\s*name\b",
        r"\bfamily\s*name\b",
        r"\bfull\s*name\b",
        r"\bname\b",
    ])
});
static EMAIL_PATTERNS: LazyLock<Vec<Regex>> =
    LazyLock::new(|| family(&[r"\bemail\b", r"\be-mail\b", r"\bmail\b"]));
static PHONE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    family(&[
        r"\bphone\b",
        r"\btelephone\b",
        r"\bmobile\b",
        r"\bcell\b",
        r"\bcontact\s*number\b",
    ])
});
static URL_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    family(&[
        r"\burl\b",
        r"\bwebsite\b",
        r"\blinkedin\b",
        r"\bgithub\b",
        r"\bportfolio\b",
    ])
});
static ADDRESS_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    family(&[
        r"\baddress\b",
        r"\bstreet\b",
        r"\bcity\b",
        r"\bstate\b",
        r"\bzip\b",
        r"\bpostal\b",
        r"\bcountry\b",
    ])
});

/// 把 label / placeholder / name / id 拼成待匹配文本，`_-.[]` 视为分隔符
fn purpose_text(field: &FormField) -> String {
    [&field.label, &field.placeholder, &field.name, &field.id]
        .into_iter()
        .flatten()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
        .replace(['_', '-', '.', '[', ']'], " ")
}

fn hits(patterns: &[Regex], text: &str) -> bool {
    patterns.iter().any(|re| re.is_match(text))
}

/// 推断字段用途
///
/// 依次匹配 姓名 → 邮箱 → 电话 → 链接 → 地址，先命中的类别生效，类别内再细分
pub fn infer_purpose(field: &FormField) -> Option<String> {
    let text = purpose_text(field);
    let purpose = if hits(&NAME_PATTERNS, &text) {
        if text.contains("first") || text.contains("given") {
            "first_name"
        } else if text.contains("last") || text.contains("family") {
            "last_name"
        } else {
            "full_name"
        }
    } else if hits(&EMAIL_PATTERNS, &text) {
        "email"
    } else if hits(&PHONE_PATTERNS, &text) {
        "phone"
    } else if hits(&URL_PATTERNS, &text) {
        if text.contains("linkedin") {
            "linkedin_url"
        } else if text.contains("github") {
            "github_url"
        } else if text.contains("portfolio") {
            "portfolio_url"
        } else {
            "website_url"
        }
    } else if hits(&ADDRESS_PATTERNS, &text) {
        if text.contains("city") {
            "city"
        } else if text.contains("state") {
            "state"
        } else if text.contains("zip") || text.contains("postal") {
            "zip_code"
        } else if text.contains("country") {
            "country"
        } else {
            "address"
        }
    } else {
        return None;
    };
    Some(purpose.to_string())
}

/// 文件输入框的用途：简历或求职信
fn infer_file_purpose(field: &FormField) -> Option<String> {
    let text = purpose_text(field);
    if text.contains("resume") || text.contains("cv") {
        Some("resume".to_string())
    } else if text.contains("cover") || text.contains("letter") {
        Some("cover_letter".to_string())
    } else {
        None
    }
}

/// 置信度：基础 0.5，有 label +0.2，识别出用途 +0.2，有 id 或 name +0.1
pub fn score_confidence(field: &FormField) -> f64 {
    let mut score = 0.5;
    if field.label.is_some() {
        score += 0.2;
    }
    if field.detected_purpose.is_some() {
        score += 0.2;
    }
    if field.id.is_some() || field.name.is_some() {
        score += 0.1;
    }
    f64::min(score, 1.0)
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "true" | "yes" | "y" | "1" | "on" | "checked"
    )
}

/// 用 `[id="..."]` / `[name="..."]` 描述元素，便于日志和再次定位
fn describe(tag: &str, id: Option<&str>, name: Option<&str>) -> Option<String> {
    let quote = |v: &str| v.replace('\\', "\\\\").replace('"', "\\\"");
    match (id, name) {
        (Some(id), _) => Some(format!(r#"{}[id="{}"]"#, tag, quote(id))),
        (None, Some(name)) => Some(format!(r#"{}[name="{}"]"#, tag, quote(name))),
        (None, None) => None,
    }
}

/// 表单映射器
pub struct FormMapper {
    page: Arc<dyn PageDriver>,
}

impl FormMapper {
    pub fn new(page: Arc<dyn PageDriver>) -> Self {
        Self { page }
    }

    /// 检测页面上所有表单字段
    pub async fn detect_all_fields(&self) -> AppResult<Vec<FormField>> {
        let mut fields = Vec::new();
        for (selector, field_type, fixed_purpose) in FIELD_CATEGORIES {
            for element in self.page.query_all(selector).await? {
                let mut field = self.build_field(element, *field_type).await?;
                field.detected_purpose = match (fixed_purpose, field_type) {
                    (Some(purpose), _) => Some(purpose.to_string()),
                    (None, FieldType::File) => infer_file_purpose(&field),
                    (None, _) => infer_purpose(&field),
                };
                field.confidence = score_confidence(&field);
                fields.push(field);
            }
        }
        info!("📝 检测到 {} 个表单字段", fields.len());
        Ok(fields)
    }

    async fn build_field(&self, element: ElementRef, field_type: FieldType) -> AppResult<FormField> {
        let page = self.page.as_ref();
        let attr = |name: &'static str| {
            let element = element.clone();
            async move {
                Ok::<_, AppError>(
                    page.attribute(&element, name)
                        .await?
                        .map(|v| v.trim().to_string())
                        .filter(|v| !v.is_empty()),
                )
            }
        };

        let id = attr("id").await?;
        let name = attr("name").await?;
        let mut field = FormField::new(element.clone(), field_type);
        field.placeholder = attr("placeholder").await?;
        field.required = page.attribute(&element, "required").await?.is_some();
        field.readonly = page.attribute(&element, "readonly").await?.is_some();
        field.disabled = page.attribute(&element, "disabled").await?.is_some();
        field.current_value = attr("value").await?;
        field.label = self.find_label(&element, id.as_deref()).await?;

        let tag = if field_type == FieldType::Select { "select" } else { "" };
        if let Some(selector) = describe(tag, id.as_deref(), name.as_deref()) {
            if field_type == FieldType::Select {
                field.options = self.select_options(&selector).await?;
            }
            field.selector = selector;
        }
        field.id = id;
        field.name = name;
        Ok(field)
    }

    async fn find_label(&self, element: &ElementRef, id: Option<&str>) -> AppResult<Option<String>> {
        let page = self.page.as_ref();
        if let Some(id) = id {
            let selector = format!(r#"label[for="{}"]"#, id.replace('"', "\\\""));
            if let Some(label) = page.query(&selector).await? {
                if let Some(text) = page.text_content(&label).await? {
                    let text = text.trim();
                    if !text.is_empty() {
                        return Ok(Some(text.to_string()));
                    }
                }
            }
        }
        Ok(page
            .attribute(element, "aria-label")
            .await?
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty()))
    }

    async fn select_options(&self, select_selector: &str) -> AppResult<Vec<String>> {
        let page = self.page.as_ref();
        let mut options = Vec::new();
        for option in page.query_all(&format!("{} option", select_selector)).await? {
            if let Some(text) = page.text_content(&option).await? {
                let text = text.trim();
                if !text.is_empty() {
                    options.push(text.to_string());
                }
            }
        }
        Ok(options)
    }

    /// 为用途在资料中存在的字段设置建议值，返回 选择器 → 值
    pub fn map_fields_to_data(
        &self,
        fields: &mut [FormField],
        data: &HashMap<String, String>,
    ) -> HashMap<String, String> {
        let mut mapping = HashMap::new();
        for field in fields.iter_mut() {
            let Some(value) = field.detected_purpose.as_ref().and_then(|p| data.get(p)) else {
                continue;
            };
            field.suggested_value = Some(value.clone());
            mapping.insert(field.selector.clone(), value.clone());
        }
        info!("🔗 已映射 {}/{} 个字段", mapping.len(), fields.len());
        mapping
    }

    /// 按建议值填写字段，返回成功填写的数量
    ///
    /// 只读、禁用、文件类字段会跳过；单个字段失败只记录警告
    pub async fn fill_fields(&self, fields: &[FormField]) -> AppResult<usize> {
        let mut filled = 0;
        for field in fields {
            let Some(value) = field.suggested_value.as_deref() else {
                continue;
            };
            if !field.is_fillable() || field.field_type == FieldType::File {
                continue;
            }
            match self.fill_one(field, value).await {
                Ok(true) => {
                    debug!("已填写 {}", field);
                    filled += 1;
                }
                Ok(false) => {}
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => warn!("填写字段 {} 失败: {}", field.selector, e),
            }
        }
        Ok(filled)
    }

    async fn fill_one(&self, field: &FormField, value: &str) -> AppResult<bool> {
        let page = self.page.as_ref();
        match field.field_type {
            FieldType::Checkbox => {
                if is_truthy(value) && !page.is_checked(&field.element).await? {
                    page.click(&field.element).await?;
                    return Ok(true);
                }
                Ok(false)
            }
            FieldType::Select => {
                page.select_option(&field.element, value).await?;
                Ok(true)
            }
            FieldType::File | FieldType::Radio => Ok(false),
            _ => {
                if field.current_value.as_deref() == Some(value) {
                    return Ok(false);
                }
                page.fill(&field.element, value).await?;
                Ok(true)
            }
        }
    }
}
