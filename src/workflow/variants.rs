//! 各平台处理器的差异部分
//!
//! 所有平台共用同一个提交模板，这里只描述每个平台不同的地方：
//! 入口按钮、提交按钮、成功文案。

use std::fmt;

use crate::models::Platform;

/// 处理器变体
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerKind {
    LinkedIn,
    Indeed,
    Greenhouse,
    Generic,
}

impl HandlerKind {
    /// 平台对应的处理器，没有专用处理器的平台使用 `Generic`
    pub fn for_platform(platform: Platform) -> Self {
        match platform {
            Platform::LinkedIn => HandlerKind::LinkedIn,
            Platform::Indeed => HandlerKind::Indeed,
            Platform::Greenhouse => HandlerKind::Greenhouse,
            Platform::Lever | Platform::Workday | Platform::Generic => HandlerKind::Generic,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HandlerKind::LinkedIn => "linkedin",
            HandlerKind::Indeed => "indeed",
            HandlerKind::Greenhouse => "greenhouse",
            HandlerKind::Generic => "generic",
        }
    }

    pub fn profile(&self) -> &'static VariantProfile {
        match self {
            HandlerKind::LinkedIn => &LINKEDIN,
            HandlerKind::Indeed => &INDEED,
            HandlerKind::Greenhouse => &GREENHOUSE,
            HandlerKind::Generic => &GENERIC,
        }
    }

    /// 是否先检查站外申请链接
    pub fn checks_external_apply(&self) -> bool {
        matches!(self, HandlerKind::LinkedIn | HandlerKind::Indeed)
    }
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 平台差异描述
#[derive(Debug)]
pub struct VariantProfile {
    /// 打开申请表的入口按钮（如 Easy Apply）
    pub entry_selectors: &'static [&'static str],
    /// 平台专用的提交按钮，通用文字查找失败后使用
    pub submit_selectors: &'static [&'static str],
    /// 平台专用的成功文案（小写），在通用文案之前检查
    pub success_texts: &'static [&'static str],
}

pub const LINKEDIN: VariantProfile = VariantProfile {
    entry_selectors: &[
        "button.jobs-apply-button",
        r#"button[aria-label*="Easy Apply" i]"#,
    ],
    submit_selectors: &[
        r#"button[aria-label="Submit application"]"#,
        r#"button[aria-label*="Submit" i]"#,
    ],
    success_texts: &["your application was sent", "application submitted"],
};

pub const INDEED: VariantProfile = VariantProfile {
    entry_selectors: &[
        "#indeedApplyButton",
        r#"button[id*="indeedApply"]"#,
        ".jobsearch-IndeedApplyButton-newDesign",
    ],
    submit_selectors: &[
        r#"button[data-testid*="submit"]"#,
        ".ia-continueButton",
    ],
    success_texts: &["your application has been submitted"],
};

pub const GREENHOUSE: VariantProfile = VariantProfile {
    entry_selectors: &[],
    submit_selectors: &["#submit_app", r#"button[type="submit"]"#],
    success_texts: &["thank you for applying", "application has been received"],
};

pub const GENERIC: VariantProfile = VariantProfile {
    entry_selectors: &[],
    submit_selectors: &[r#"button[type="submit"], input[type="submit"]"#],
    success_texts: &[],
};

/// 所有平台共用的成功文案
pub const SUCCESS_TEXTS: &[&str] = &[
    "thank you",
    "success",
    "submitted",
    "received",
    "confirmation",
    "application sent",
];

/// 确认页 URL 中常见的词
pub const SUCCESS_URL_WORDS: &[&str] = &["confirm", "thank", "success"];

/// 通用提交按钮文字，比导航用的提交模式更宽松
pub const SUBMIT_FALLBACK_PATTERNS: &[&str] =
    &["submit", "apply", "send", "finish", "complete", "next"];
