//! 平台路由：URL → 平台

use phf::phf_map;
use url::Url;

use crate::models::Platform;

/// 已知平台域名，命中域名本身或其真子域名
static PLATFORM_DOMAINS: phf::Map<&'static str, Platform> = phf_map! {
    "linkedin.com" => Platform::LinkedIn,
    "indeed.com" => Platform::Indeed,
    "greenhouse.io" => Platform::Greenhouse,
    "boards.greenhouse.io" => Platform::Greenhouse,
    "lever.co" => Platform::Lever,
    "workday.com" => Platform::Workday,
    "myworkdayjobs.com" => Platform::Workday,
};

/// 提取小写主机名；没有 scheme 的地址按 https 处理
///
/// `linkedin.com:8080/jobs` 会被解析成 scheme 为 `linkedin.com` 的无主机 URL，
/// 所以解析成功但没有主机名时也要补上 https 再试一次
pub fn hostname(url: &str) -> Option<String> {
    let trimmed = url.trim();
    let host_of = |candidate: &str| {
        Url::parse(candidate).ok().and_then(|parsed| {
            parsed
                .host_str()
                .map(|h| h.trim_end_matches('.').to_ascii_lowercase())
                .filter(|h| !h.is_empty())
        })
    };
    host_of(trimmed).or_else(|| {
        if trimmed.contains("://") {
            None
        } else {
            host_of(&format!("https://{}", trimmed))
        }
    })
}

/// 依次尝试主机名及其每一级父域名
pub fn domain_suffixes(host: &str) -> impl Iterator<Item = &str> {
    std::iter::successors(Some(host), |&h| h.split_once('.').map(|(_, rest)| rest))
}

/// `host` 是否等于 `domain` 或为其子域名
pub fn host_matches(host: &str, domain: &str) -> bool {
    let domain = domain.trim_start_matches('.').to_ascii_lowercase();
    domain_suffixes(host).any(|suffix| suffix == domain)
}

/// 平台路由
///
/// 纯函数，任何输入都有结果，无法识别的一律为 `Generic`
#[derive(Debug, Default, Clone, Copy)]
pub struct PlatformRouter;

impl PlatformRouter {
    pub fn new() -> Self {
        Self
    }

    pub fn route(&self, url: &str) -> Platform {
        let Some(host) = hostname(url) else {
            return Platform::Generic;
        };
        let platform = domain_suffixes(&host)
            .find_map(|suffix| PLATFORM_DOMAINS.get(suffix).copied())
            .unwrap_or(Platform::Generic);
        platform
    }
}
