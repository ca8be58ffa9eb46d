//! 简历 / 求职信上传

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{AppResult, FileError};
use crate::infrastructure::{ElementRef, PageDriver};
use crate::utils::pause;

/// 支持的文档格式
pub const SUPPORTED_FORMATS: &[&str] = &["pdf", "doc", "docx", "txt"];

const FILE_INPUT: &str = r#"input[type="file"]"#;
const RESUME_KEYWORDS: &[&str] = &["resume", "cv", "curriculum"];
const COVER_LETTER_KEYWORDS: &[&str] = &["cover", "letter", "coverletter"];
const SUCCESS_MARKERS: &[&str] = &[
    ".upload-success",
    ".file-uploaded",
    r#"[data-upload-status="success"]"#,
];

const UPLOAD_SETTLE: Duration = Duration::from_secs(1);
const CLEAR_WAIT: Duration = Duration::from_secs(5);

/// 检查文档是否存在且格式受支持，返回绝对路径
///
/// 只访问文件系统，不触碰页面
pub async fn validate_document(path: &Path) -> AppResult<PathBuf> {
    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        return Err(FileError::NotFound {
            path: path.to_path_buf(),
        }
        .into());
    }
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if !SUPPORTED_FORMATS.contains(&extension.as_str()) {
        return Err(FileError::UnsupportedFormat {
            path: path.to_path_buf(),
            extension,
        }
        .into());
    }
    Ok(tokio::fs::canonicalize(path).await?)
}

/// 文档上传器
pub struct DocumentUploader {
    page: Arc<dyn PageDriver>,
    element_timeout: Duration,
    cancel: CancellationToken,
}

impl DocumentUploader {
    pub fn new(page: Arc<dyn PageDriver>, element_timeout: Duration, cancel: CancellationToken) -> Self {
        Self {
            page,
            element_timeout,
            cancel,
        }
    }

    /// 上传文件到指定选择器，未指定时使用页面上的文件输入框
    ///
    /// 文件不存在或格式不支持时返回 `false`，且不会操作页面
    pub async fn upload_file(&self, path: &Path, selector: Option<&str>) -> AppResult<bool> {
        let Some(abs_path) = self.checked(path).await else {
            return Ok(false);
        };
        let target = match selector {
            Some(selector) => {
                self.page
                    .wait_for_selector(selector, self.element_timeout)
                    .await?
            }
            None => self.find_file_input().await?,
        };
        match target {
            Some(element) => self.upload_to(&abs_path, &element).await,
            None => {
                error!("找不到文件输入框");
                Ok(false)
            }
        }
    }

    /// 上传简历：按 resume / cv / curriculum 关键字定位，找不到时用第一个文件输入框
    pub async fn upload_resume(&self, path: &Path) -> AppResult<bool> {
        info!("📎 上传简历: {}", path.display());
        let Some(abs_path) = self.checked(path).await else {
            return Ok(false);
        };
        match self.find_by_keywords(RESUME_KEYWORDS, 0).await? {
            Some(element) => self.upload_to(&abs_path, &element).await,
            None => {
                warn!("页面上没有文件输入框，跳过简历上传");
                Ok(false)
            }
        }
    }

    /// 上传求职信：按 cover / letter 关键字定位，找不到时用第二个文件输入框
    pub async fn upload_cover_letter(&self, path: &Path) -> AppResult<bool> {
        info!("📎 上传求职信: {}", path.display());
        let Some(abs_path) = self.checked(path).await else {
            return Ok(false);
        };
        match self.find_by_keywords(COVER_LETTER_KEYWORDS, 1).await? {
            Some(element) => self.upload_to(&abs_path, &element).await,
            None => {
                debug!("没有单独的求职信输入框，跳过");
                Ok(false)
            }
        }
    }

    /// 清空文件输入框
    pub async fn clear_upload(&self, selector: &str) -> AppResult<bool> {
        match self.page.wait_for_selector(selector, CLEAR_WAIT).await? {
            Some(element) => {
                self.page.set_input_files(&element, &[]).await?;
                info!("已清空上传: {}", selector);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// 页面上所有文件输入框中已选择的文件名
    pub async fn get_uploaded_files(&self) -> AppResult<Vec<String>> {
        let mut uploaded = Vec::new();
        for element in self.page.query_all(FILE_INPUT).await? {
            uploaded.extend(self.page.input_file_names(&element).await?);
        }
        Ok(uploaded)
    }

    async fn checked(&self, path: &Path) -> Option<PathBuf> {
        match validate_document(path).await {
            Ok(abs_path) => Some(abs_path),
            Err(e) => {
                error!("❌ 拒绝上传: {}", e);
                None
            }
        }
    }

    async fn upload_to(&self, path: &Path, element: &ElementRef) -> AppResult<bool> {
        self.page
            .set_input_files(element, &[path.to_path_buf()])
            .await?;
        info!("✓ 已选择文件: {}", path.display());
        pause(UPLOAD_SETTLE, &self.cancel).await?;
        self.verify_upload(element, path).await
    }

    /// 校验顺序：输入框文件数 → 页面成功标记 → 页面出现文件名；都没有时视为成功
    async fn verify_upload(&self, element: &ElementRef, path: &Path) -> AppResult<bool> {
        if !self.page.input_file_names(element).await?.is_empty() {
            debug!("上传校验: 输入框已有文件");
            return Ok(true);
        }
        for selector in SUCCESS_MARKERS {
            if self.page.query(selector).await?.is_some() {
                debug!("上传校验: 找到成功标记 {}", selector);
                return Ok(true);
            }
        }
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        if !file_name.is_empty() && self.page.body_text().await?.contains(&file_name) {
            debug!("上传校验: 页面出现文件名");
            return Ok(true);
        }
        debug!("上传无法校验，按成功处理");
        Ok(true)
    }

    /// 优先可见的文件输入框，否则第一个
    async fn find_file_input(&self) -> AppResult<Option<ElementRef>> {
        let inputs = self.page.query_all(FILE_INPUT).await?;
        for input in &inputs {
            if self.page.is_visible(input).await? {
                return Ok(Some(input.clone()));
            }
        }
        Ok(inputs.into_iter().next())
    }

    async fn find_by_keywords(
        &self,
        keywords: &[&str],
        fallback_index: usize,
    ) -> AppResult<Option<ElementRef>> {
        let inputs = self.page.query_all(FILE_INPUT).await?;
        for input in &inputs {
            let mut combined = String::new();
            for attr in ["id", "name", "class"] {
                if let Some(value) = self.page.attribute(input, attr).await? {
                    combined.push_str(&value.to_lowercase());
                    combined.push(' ');
                }
            }
            if keywords.iter().any(|k| combined.contains(k)) {
                return Ok(Some(input.clone()));
            }
        }
        Ok(inputs.into_iter().nth(fallback_index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn validation_rejects_missing_and_unsupported_files() {
        let dir = tempfile::tempdir().unwrap();

        let missing = assert_err!(validate_document(&dir.path().join("missing.pdf")).await);
        assert!(missing.to_string().contains("missing.pdf"));

        let image = dir.path().join("photo.png");
        std::fs::write(&image, b"png").unwrap();
        assert!(matches!(
            validate_document(&image).await,
            Err(crate::error::AppError::File(FileError::UnsupportedFormat { .. }))
        ));

        let resume = dir.path().join("Resume.DOCX");
        std::fs::write(&resume, b"docx").unwrap();
        assert!(assert_ok!(validate_document(&resume).await).is_absolute());
    }
}
