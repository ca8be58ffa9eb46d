use std::path::{Path, PathBuf};

use serde::Deserialize;
use tokio::fs;

use crate::error::{AppResult, FileError};
use crate::models::profile::ApplicantProfile;
use crate::models::submission::{JobPosting, SubmissionRequest};

/// 批量投递文件（TOML）
///
/// ```toml
/// resume_path = "data/resume.pdf"
/// cover_letter_path = "data/cover_letter.pdf"
///
/// [profile]
/// first_name = "Ada"
/// last_name = "Lovelace"
/// email = "ada@example.com"
///
/// [profile.screening_responses]
/// "Are you authorized to work in the US?" = "Yes"
///
/// [[jobs]]
/// id = "li-1"
/// application_url = "https://www.linkedin.com/jobs/view/1"
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct JobBatch {
    pub resume_path: PathBuf,
    #[serde(default)]
    pub cover_letter_path: Option<PathBuf>,
    pub profile: ApplicantProfile,
    #[serde(default)]
    pub jobs: Vec<JobPosting>,
    /// 读取时的文件路径，相对路径的简历以此为基准
    #[serde(skip)]
    pub file_path: Option<PathBuf>,
}

impl JobBatch {
    /// 展开为逐个职位的提交请求
    pub fn requests(&self) -> Vec<SubmissionRequest> {
        let resume_path = self.resolve(&self.resume_path);
        let cover_letter_path = self.cover_letter_path.as_ref().map(|p| self.resolve(p));
        self.jobs
            .iter()
            .map(|job| SubmissionRequest {
                job: job.clone(),
                resume_path: resume_path.clone(),
                cover_letter_path: cover_letter_path.clone(),
                profile: self.profile.clone(),
            })
            .collect()
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match self.file_path.as_deref().and_then(Path::parent) {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}

/// 从 TOML 文件加载批量投递任务
pub async fn load_job_batch(toml_file_path: &Path) -> AppResult<JobBatch> {
    if !toml_file_path.exists() {
        return Err(FileError::NotFound {
            path: toml_file_path.to_path_buf(),
        }
        .into());
    }

    let content = fs::read_to_string(toml_file_path)
        .await
        .map_err(|e| FileError::ReadFailed {
            path: toml_file_path.to_path_buf(),
            source: Box::new(e),
        })?;

    let mut batch: JobBatch = toml::from_str(&content).map_err(|e| FileError::TomlParseFailed {
        path: toml_file_path.to_path_buf(),
        source: Box::new(e),
    })?;

    // 设置文件路径
    batch.file_path = Some(toml_file_path.to_path_buf());

    tracing::info!(
        "成功加载 {} 个职位: {}",
        batch.jobs.len(),
        toml_file_path.display()
    );

    Ok(batch)
}
