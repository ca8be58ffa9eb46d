//! 申请人资料

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

/// 申请人资料
///
/// 表单填写时通过 `to_field_map` 转换为 "字段用途 → 值" 的映射，
/// 用途名与 `FormMapper` 推断出的 `detected_purpose` 一致。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicantProfile {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,

    pub linkedin: Option<String>,
    pub github: Option<String>,
    pub portfolio: Option<String>,
    pub website_url: Option<String>,

    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub country: Option<String>,

    pub work_authorization: Option<String>,
    pub years_of_experience: Option<u32>,
    pub education: Option<String>,

    /// 筛选问题：问题原文 → 回答
    pub screening_responses: BTreeMap<String, String>,
    /// 其他自定义字段，按用途名合并进映射
    pub additional_data: BTreeMap<String, String>,
}

impl ApplicantProfile {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    /// 转换为 "字段用途 → 值" 映射，空值不会出现在结果中
    pub fn to_field_map(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();
        let mut put = |key: &str, value: Option<&str>| {
            if let Some(v) = value.map(str::trim).filter(|v| !v.is_empty()) {
                map.insert(key.to_string(), v.to_string());
            }
        };

        let full_name = self.full_name();
        let years = self.years_of_experience.map(|y| y.to_string());

        put("first_name", Some(self.first_name.as_str()));
        put("last_name", Some(self.last_name.as_str()));
        put("full_name", Some(full_name.as_str()));
        put("email", Some(self.email.as_str()));
        put("phone", self.phone.as_deref());
        put("linkedin_url", self.linkedin.as_deref());
        put("github_url", self.github.as_deref());
        put("portfolio_url", self.portfolio.as_deref());
        put("website_url", self.website_url.as_deref());
        put("address", self.address.as_deref());
        put("city", self.city.as_deref());
        put("state", self.state.as_deref());
        put("zip_code", self.zip_code.as_deref());
        put("country", self.country.as_deref());
        put("work_authorization", self.work_authorization.as_deref());
        put("years_of_experience", years.as_deref());
        put("education", self.education.as_deref());

        for (key, value) in &self.additional_data {
            put(key, Some(value));
        }
        map
    }
}
