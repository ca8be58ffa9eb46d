pub mod captcha_guard;
pub mod controls;
pub mod document_uploader;
pub mod form_mapper;
pub mod navigation;
pub mod platform_router;
pub mod rate_limiter;
pub mod redirect_tracker;

pub use captcha_guard::{CaptchaGuard, CaptchaProvider, CaptchaSignal};
pub use document_uploader::{validate_document, DocumentUploader};
pub use form_mapper::FormMapper;
pub use navigation::FormNavigator;
pub use platform_router::PlatformRouter;
pub use rate_limiter::{ErrorKind, PlatformStats, RateLimitStatus, RateLimiter};
pub use redirect_tracker::{AtsPlatform, ExternalApply, Redirect, RedirectTracker};
