//! 站外跳转检测
//!
//! 招聘平台经常把申请跳转到公司自己的 ATS，这里负责发现跳转、识别目标平台，
//! 并按信任策略决定是否继续。

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::AppResult;
use crate::infrastructure::PageDriver;
use crate::models::Platform;
use crate::services::controls::control_label;
use crate::services::platform_router::{hostname, host_matches};
use crate::utils::pause;

/// 跳转后的目标平台
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AtsPlatform {
    Greenhouse,
    Lever,
    Workday,
    Taleo,
    Brassring,
    ApplyToJob,
    CompanyCareers,
    Unknown,
}

impl AtsPlatform {
    pub fn as_str(&self) -> &'static str {
        match self {
            AtsPlatform::Greenhouse => "greenhouse",
            AtsPlatform::Lever => "lever",
            AtsPlatform::Workday => "workday",
            AtsPlatform::Taleo => "taleo",
            AtsPlatform::Brassring => "brassring",
            AtsPlatform::ApplyToJob => "applytojob",
            AtsPlatform::CompanyCareers => "company_careers",
            AtsPlatform::Unknown => "unknown",
        }
    }

    /// 默认信任的 ATS
    pub fn is_known_ats(&self) -> bool {
        !matches!(self, AtsPlatform::CompanyCareers | AtsPlatform::Unknown)
    }
}

impl fmt::Display for AtsPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const ATS_DOMAINS: &[(&str, AtsPlatform)] = &[
    ("greenhouse.io", AtsPlatform::Greenhouse),
    ("lever.co", AtsPlatform::Lever),
    ("workday.com", AtsPlatform::Workday),
    ("myworkdayjobs.com", AtsPlatform::Workday),
    ("taleo.net", AtsPlatform::Taleo),
    ("brassring.com", AtsPlatform::Brassring),
    ("applytojob.com", AtsPlatform::ApplyToJob),
];

const CAREER_KEYWORDS: &[&str] = &["career", "jobs", "hiring", "talent"];

const EXTERNAL_APPLY_TEXTS: &[&str] = &[
    "apply on company site",
    "apply on company website",
    "apply externally",
    "visit site to apply",
];

const EXTERNAL_APPLY_SELECTORS: &[&str] = &[
    r#"[data-testid*="external-apply"]"#,
    ".external-apply-button",
];

const IFRAME_KEYWORDS: &[&str] = &["apply", "job", "application", "career"];

const POLL_INTERVAL: Duration = Duration::from_millis(500);
const FOLLOW_SETTLE: Duration = Duration::from_secs(2);

/// 根据主机名识别 ATS 平台
pub fn identify_platform(url: &str) -> AtsPlatform {
    let Some(host) = hostname(url) else {
        return AtsPlatform::Unknown;
    };
    if let Some((_, platform)) = ATS_DOMAINS
        .iter()
        .find(|(domain, _)| host_matches(&host, domain))
    {
        return *platform;
    }
    if CAREER_KEYWORDS.iter().any(|k| host.contains(k)) {
        return AtsPlatform::CompanyCareers;
    }
    AtsPlatform::Unknown
}

/// 一次跨域跳转
#[derive(Debug, Clone, PartialEq)]
pub struct Redirect {
    pub original_url: String,
    pub redirected_url: String,
    pub original_domain: String,
    pub redirected_domain: String,
    pub elapsed: Duration,
}

/// 是否跟随跳转
///
/// 有白名单时只看白名单（按域名结构匹配）；否则只信任已知 ATS
pub fn should_follow(redirect: &Redirect, allowed_domains: Option<&[String]>) -> bool {
    match allowed_domains {
        Some(domains) if !domains.is_empty() => domains
            .iter()
            .any(|d| host_matches(&redirect.redirected_domain, d)),
        _ => identify_platform(&redirect.redirected_url).is_known_ats(),
    }
}

/// 站外申请的处理结果
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalApply {
    pub redirected: bool,
    pub external_url: Option<String>,
    pub new_platform: Option<AtsPlatform>,
    pub can_continue: bool,
    pub message: String,
}

/// 跳转跟踪器
pub struct RedirectTracker {
    page: Arc<dyn PageDriver>,
    history: Vec<Redirect>,
    cancel: CancellationToken,
}

impl RedirectTracker {
    pub fn new(page: Arc<dyn PageDriver>, cancel: CancellationToken) -> Self {
        Self {
            page,
            history: Vec::new(),
            cancel,
        }
    }

    /// 每 0.5 秒检查一次主机名，发生变化即返回跳转信息
    pub async fn detect_redirect(
        &mut self,
        original_url: &str,
        timeout: Duration,
    ) -> AppResult<Option<Redirect>> {
        let original_domain = hostname(original_url).unwrap_or_default();
        let start = Instant::now();
        loop {
            let current_url = self.page.current_url().await?;
            let current_domain = hostname(&current_url).unwrap_or_default();
            if !current_domain.is_empty() && current_domain != original_domain {
                info!("🔀 检测到跳转: {} -> {}", original_domain, current_domain);
                let redirect = Redirect {
                    original_url: original_url.to_string(),
                    redirected_url: current_url,
                    original_domain,
                    redirected_domain: current_domain,
                    elapsed: start.elapsed(),
                };
                self.history.push(redirect.clone());
                return Ok(Some(redirect));
            }
            if start.elapsed() >= timeout {
                return Ok(None);
            }
            pause(POLL_INTERVAL, &self.cancel).await?;
        }
    }

    /// 查找 "在公司网站申请" 一类的链接，返回绝对地址
    pub async fn check_for_external_apply_button(&self) -> AppResult<Option<String>> {
        let page = self.page.as_ref();
        let mut candidates = Vec::new();
        for element in page.query_all("a, button").await? {
            let label = control_label(page, &element).await?;
            if EXTERNAL_APPLY_TEXTS.iter().any(|t| label.contains(t)) {
                candidates.push(element);
            }
        }
        for selector in EXTERNAL_APPLY_SELECTORS {
            candidates.extend(page.query_all(selector).await?);
        }

        for element in candidates {
            if let Some(href) = page.attribute(&element, "href").await? {
                let href = href.trim();
                if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
                    continue;
                }
                let absolute = self.absolutize(href).await?;
                info!("🔗 找到站外申请链接: {}", absolute);
                return Ok(Some(absolute));
            }
        }
        Ok(None)
    }

    /// 处理站外申请：找到链接后按信任策略决定是否跳转
    pub async fn handle_external_redirect(
        &mut self,
        origin: Platform,
        follow: bool,
        allowed_domains: Option<&[String]>,
    ) -> AppResult<ExternalApply> {
        let Some(external_url) = self.check_for_external_apply_button().await? else {
            return Ok(ExternalApply {
                redirected: false,
                external_url: None,
                new_platform: None,
                can_continue: true,
                message: "No external redirect detected".to_string(),
            });
        };
        info!("{} 的职位需要到站外申请", origin);

        let original_url = self.page.current_url().await?;
        let candidate = Redirect {
            original_domain: hostname(&original_url).unwrap_or_default(),
            original_url,
            redirected_domain: hostname(&external_url).unwrap_or_default(),
            redirected_url: external_url.clone(),
            elapsed: Duration::ZERO,
        };
        let new_platform = identify_platform(&external_url);

        if !follow || !should_follow(&candidate, allowed_domains) {
            warn!("站外链接不在信任范围内，不跟随: {}", external_url);
            return Ok(ExternalApply {
                redirected: true,
                external_url: Some(external_url),
                new_platform: Some(new_platform),
                can_continue: false,
                message: "External redirect detected but not followed".to_string(),
            });
        }

        self.page.navigate(&external_url).await?;
        pause(FOLLOW_SETTLE, &self.cancel).await?;
        self.history.push(candidate);

        let landed = identify_platform(&self.page.current_url().await?);
        Ok(ExternalApply {
            redirected: true,
            external_url: Some(external_url),
            new_platform: Some(landed),
            can_continue: landed != AtsPlatform::Unknown,
            message: format!("Redirected to {} platform", landed),
        })
    }

    /// 嵌在 iframe 中的申请表
    pub async fn detect_iframe_application(&self) -> AppResult<Option<String>> {
        for iframe in self.page.query_all("iframe").await? {
            if let Some(src) = self.page.attribute(&iframe, "src").await? {
                let lower = src.to_lowercase();
                if IFRAME_KEYWORDS.iter().any(|k| lower.contains(k)) {
                    info!("检测到申请表 iframe: {}", src);
                    return Ok(Some(src));
                }
            }
        }
        Ok(None)
    }

    /// 本次提交经历过的所有跳转
    pub fn redirect_chain(&self) -> &[Redirect] {
        &self.history
    }

    async fn absolutize(&self, href: &str) -> AppResult<String> {
        if Url::parse(href).is_ok() {
            return Ok(href.to_string());
        }
        let base = self.page.current_url().await?;
        match Url::parse(&base).and_then(|b| b.join(href)) {
            Ok(joined) => Ok(joined.to_string()),
            Err(e) => {
                debug!("无法解析相对链接 {}: {}", href, e);
                Ok(href.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn redirect_to(url: &str) -> Redirect {
        Redirect {
            original_url: "https://www.linkedin.com/jobs/view/1".into(),
            redirected_url: url.into(),
            original_domain: "www.linkedin.com".into(),
            redirected_domain: hostname(url).unwrap_or_default(),
            elapsed: Duration::ZERO,
        }
    }

    #[test]
    fn identifies_known_ats_by_suffix() {
        assert_eq!(identify_platform("https://boards.greenhouse.io/acme"), AtsPlatform::Greenhouse);
        assert_eq!(identify_platform("https://acme.wd1.myworkdayjobs.com/"), AtsPlatform::Workday);
        assert_eq!(identify_platform("https://acme.taleo.net/careersection"), AtsPlatform::Taleo);
        assert_eq!(identify_platform("https://acme.applytojob.com/apply"), AtsPlatform::ApplyToJob);
        assert_eq!(identify_platform("https://careers.acme.com/"), AtsPlatform::CompanyCareers);
        assert_eq!(identify_platform("https://greenhouse.io.evil.com/"), AtsPlatform::Unknown);
        assert_eq!(identify_platform("https://acme.com/"), AtsPlatform::Unknown);
    }

    #[test]
    fn follows_known_ats_or_allow_list_only() {
        assert!(should_follow(&redirect_to("https://jobs.lever.co/acme/1"), None));
        assert!(!should_follow(&redirect_to("https://careers.acme.com/apply"), None));

        let allowed = vec!["acme.com".to_string()];
        assert!(should_follow(&redirect_to("https://careers.acme.com/apply"), Some(allowed.as_slice())));
        assert!(!should_follow(&redirect_to("https://notacme.com/apply"), Some(allowed.as_slice())));
        assert!(!should_follow(&redirect_to("https://jobs.lever.co/acme/1"), Some(allowed.as_slice())));
    }
}
