//! 表单字段

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::infrastructure::ElementRef;

/// 表单控件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Email,
    Phone,
    Url,
    File,
    Select,
    Checkbox,
    Radio,
    Textarea,
    Date,
    Number,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Email => "email",
            FieldType::Phone => "phone",
            FieldType::Url => "url",
            FieldType::File => "file",
            FieldType::Select => "select",
            FieldType::Checkbox => "checkbox",
            FieldType::Radio => "radio",
            FieldType::Textarea => "textarea",
            FieldType::Date => "date",
            FieldType::Number => "number",
        }
    }
}

/// 检测到的表单字段
#[derive(Debug, Clone, PartialEq)]
pub struct FormField {
    /// 用于日志和再次定位的选择器描述（优先 `#id`，其次 `[name=...]`）
    pub selector: String,
    /// 页面上的元素
    pub element: ElementRef,
    pub field_type: FieldType,
    pub label: Option<String>,
    pub placeholder: Option<String>,
    pub name: Option<String>,
    pub id: Option<String>,
    pub required: bool,
    pub readonly: bool,
    pub disabled: bool,
    pub current_value: Option<String>,
    pub suggested_value: Option<String>,
    /// 推断出的字段用途，如 `email`、`first_name`
    pub detected_purpose: Option<String>,
    /// 下拉框的可选项
    pub options: Vec<String>,
    /// 用途推断的置信度，范围 [0, 1]
    pub confidence: f64,
}

impl FormField {
    pub fn new(element: ElementRef, field_type: FieldType) -> Self {
        Self {
            selector: element.to_string(),
            element,
            field_type,
            label: None,
            placeholder: None,
            name: None,
            id: None,
            required: false,
            readonly: false,
            disabled: false,
            current_value: None,
            suggested_value: None,
            detected_purpose: None,
            options: Vec::new(),
            confidence: 0.0,
        }
    }

    /// 是否可以写入
    pub fn is_fillable(&self) -> bool {
        !self.readonly && !self.disabled
    }
}

impl fmt::Display for FormField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) -> {}",
            self.label.as_deref().unwrap_or(&self.selector),
            self.field_type.as_str(),
            self.detected_purpose.as_deref().unwrap_or("?")
        )
    }
}
