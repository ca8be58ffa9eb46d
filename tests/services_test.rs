mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{resume_in, Click, FakeElement, FakePage, Stage};
use job_apply_submit::services::redirect_tracker::should_follow;
use job_apply_submit::services::{
    CaptchaGuard, CaptchaProvider, DocumentUploader, FormMapper, FormNavigator, Redirect,
};
use job_apply_submit::{Platform, PlatformRouter, RateLimitConfig, RateLimiter};
use tokio_test::assert_ok;
use tokio_util::sync::CancellationToken;

fn uploader(page: &Arc<FakePage>) -> DocumentUploader {
    DocumentUploader::new(page.clone(), Duration::from_secs(10), CancellationToken::new())
}

#[test]
fn router_is_not_fooled_by_lookalike_hosts() {
    let router = PlatformRouter::new();
    assert_eq!(router.route("https://www.linkedin.com/jobs/view/1"), Platform::LinkedIn);
    assert_eq!(router.route("https://acme.wd5.myworkdayjobs.com/en-US/job/1"), Platform::Workday);
    assert_eq!(router.route("https://linkedin.com.evil.example/jobs"), Platform::Generic);
    assert_eq!(router.route("https://notlinkedin.com/jobs"), Platform::Generic);
    assert_eq!(router.route("not a url at all"), Platform::Generic);
}

#[test]
fn allow_list_matches_by_domain_structure() {
    let redirect = |host: &str| Redirect {
        original_url: "https://www.indeed.com/viewjob?jk=1".to_string(),
        redirected_url: format!("https://{}/apply", host),
        original_domain: "www.indeed.com".to_string(),
        redirected_domain: host.to_string(),
        elapsed: Duration::ZERO,
    };
    let allowed = vec!["acme.com".to_string()];

    assert!(should_follow(&redirect("jobs.acme.com"), Some(allowed.as_slice())));
    assert!(!should_follow(&redirect("acme.com.evil.io"), Some(allowed.as_slice())));
    // 没有白名单时只信任已知 ATS
    assert!(should_follow(&redirect("jobs.lever.co"), None));
    assert!(!should_follow(&redirect("careers.acme.com"), None));
}

#[tokio::test(start_paused = true)]
async fn uploader_rejects_bad_files_without_page_interaction() {
    let dir = tempfile::tempdir().unwrap();
    let page = Arc::new(FakePage::new(vec![Stage::new()
        .with(FakeElement::input("file", "resume"))]));
    let uploader = uploader(&page);

    let missing = dir.path().join("missing.pdf");
    assert!(!uploader.upload_file(&missing, None).await.unwrap());

    let image = dir.path().join("resume.jpg");
    std::fs::write(&image, b"jpg").unwrap();
    assert!(!uploader.upload_resume(&image).await.unwrap());

    assert_eq!(page.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn uploader_targets_inputs_by_keyword() {
    let dir = tempfile::tempdir().unwrap();
    let resume = resume_in(dir.path());
    let letter = dir.path().join("cover.docx");
    std::fs::write(&letter, b"docx").unwrap();

    let page = Arc::new(FakePage::new(vec![Stage::new()
        .with(FakeElement::input("file", "cover_letter_file"))
        .with(FakeElement::input("file", "resume_file"))]));
    let uploader = uploader(&page);

    assert!(assert_ok!(uploader.upload_resume(&resume).await));
    assert!(assert_ok!(uploader.upload_cover_letter(&letter).await));

    assert_eq!(
        page.element_by_id("resume_file").unwrap().files,
        vec!["ada_lovelace_resume.pdf"]
    );
    assert_eq!(
        page.element_by_id("cover_letter_file").unwrap().files,
        vec!["cover.docx"]
    );
    let mut uploaded = assert_ok!(uploader.get_uploaded_files().await);
    uploaded.sort();
    assert_eq!(uploaded, vec!["ada_lovelace_resume.pdf", "cover.docx"]);

    assert!(uploader.clear_upload("#cover_letter_file").await.unwrap());
    assert!(page.element_by_id("cover_letter_file").unwrap().files.is_empty());
}

#[tokio::test(start_paused = true)]
async fn captcha_guard_ignores_hidden_widgets_and_times_out() {
    let hidden = Arc::new(FakePage::new(vec![Stage::new()
        .with(FakeElement::new("div").attr("class", "g-recaptcha").hidden())]));
    let guard = CaptchaGuard::new(hidden.clone(), Duration::from_secs(300), CancellationToken::new());
    assert!(guard.detect().await.unwrap().is_none());
    assert!(guard.handle(false, None).await.unwrap());

    let visible = Arc::new(FakePage::new(vec![Stage::new()
        .with(FakeElement::new("div").attr("class", "cf-turnstile"))]));
    let guard = CaptchaGuard::new(visible.clone(), Duration::from_secs(300), CancellationToken::new());
    let signal = guard.detect().await.unwrap().unwrap();
    assert_eq!(signal.provider, CaptchaProvider::Cloudflare);
    assert!(guard.user_message().await.unwrap().unwrap().contains("Cloudflare"));

    let started = tokio::time::Instant::now();
    assert!(!guard.wait_for_manual_solve(Duration::from_secs(30)).await.unwrap());
    assert!(started.elapsed() >= Duration::from_secs(30));
    assert!(started.elapsed() < Duration::from_secs(40));
}

#[tokio::test(start_paused = true)]
async fn captcha_guard_continues_when_next_is_enabled() {
    let page = Arc::new(FakePage::new(vec![Stage::new()
        .with(FakeElement::new("div").attr("class", "h-captcha"))
        .with(FakeElement::button("Continue"))]));
    let guard = CaptchaGuard::new(page.clone(), Duration::from_secs(300), CancellationToken::new());

    let notified = std::sync::Mutex::new(Vec::new());
    let notify = |message: &str| notified.lock().unwrap().push(message.to_string());
    assert!(guard
        .handle(false, Some(&notify as &(dyn Fn(&str) + Send + Sync)))
        .await
        .unwrap());
    // 直接绕过，不需要提示用户
    assert!(notified.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn navigator_reports_missing_controls_without_moving() {
    let page = Arc::new(FakePage::new(vec![Stage::new().body("Review your answers")]));
    let mut navigator = FormNavigator::new(page.clone(), CancellationToken::new());

    assert!(!navigator.detect_multi_step().await.unwrap());
    assert!(!navigator.go_next().await.unwrap());
    assert!(!navigator.go_back().await.unwrap());
    assert!(!navigator.submit_form().await.unwrap());
    assert_eq!(navigator.state().current_step, 0);
    assert!(page.clicks().is_empty());
}

#[tokio::test(start_paused = true)]
async fn navigator_goes_back_and_forth() {
    let page = Arc::new(FakePage::new(vec![
        Stage::new()
            .with(FakeElement::new("div").attr("data-step", "1").text("Profile"))
            .with(FakeElement::new("div").attr("data-step", "2").text("Questions"))
            .with(FakeElement::new("div").attr("data-step", "3").text("Review"))
            .with(FakeElement::button("Continue").on_click(Click::Advance)),
        Stage::new()
            .with(FakeElement::button("Back").on_click(Click::GoTo(0)))
            .with(FakeElement::button("Continue").on_click(Click::Advance)),
    ]));
    let mut navigator = FormNavigator::new(page.clone(), CancellationToken::new())
        .with_settle(Duration::from_millis(200));

    let state = navigator.detect_steps().await.unwrap();
    assert_eq!(state.total_steps, 3);
    assert_eq!(state.step_titles, vec!["Profile", "Questions", "Review"]);

    assert!(navigator.go_next().await.unwrap());
    assert_eq!(navigator.state().current_step, 1);
    assert!(navigator.state().can_go_back);
    assert_eq!(navigator.get_current_step_title(), Some("Questions"));

    assert!(navigator.go_back().await.unwrap());
    assert_eq!(navigator.state().current_step, 0);
    assert!(!navigator.state().is_final_step);
}

#[tokio::test(start_paused = true)]
async fn navigator_keeps_first_active_step_indicator() {
    let steps = |classes: [&str; 3]| {
        let mut stage = Stage::new();
        for (class, title) in classes.into_iter().zip(["Contact", "Resume", "Review"]) {
            stage = stage.with(FakeElement::new("li").attr("class", class).text(title));
        }
        Arc::new(FakePage::new(vec![stage.with(FakeElement::button("Next"))]))
    };

    let page = steps(["step active", "step inactive", "step inactive"]);
    let mut navigator = FormNavigator::new(page.clone(), CancellationToken::new());
    let state = navigator.detect_steps().await.unwrap();
    assert_eq!(state.total_steps, 3);
    assert_eq!(state.current_step, 0);
    assert_eq!(navigator.get_current_step_title(), Some("Contact"));

    let page = steps(["step done", "step current", "step active"]);
    let mut navigator = FormNavigator::new(page.clone(), CancellationToken::new());
    assert_eq!(navigator.detect_steps().await.unwrap().current_step, 1);
    assert_eq!(navigator.get_current_step_title(), Some("Resume"));
}

#[tokio::test]
async fn mapper_detects_and_maps_fields() {
    let page = Arc::new(FakePage::new(vec![Stage::new()
        .with(FakeElement::label("fname", "First Name"))
        .with(FakeElement::input("text", "fname").attr("required", ""))
        .with(FakeElement::new("input").attr("name", "linkedin_profile"))
        .with(FakeElement::input("email", "contact"))
        .with(FakeElement::input("text", "notes").attr("readonly", ""))]));
    let mapper = FormMapper::new(page.clone());

    let mut fields = mapper.detect_all_fields().await.unwrap();
    assert_eq!(fields.len(), 4);
    let purposes: Vec<_> = fields
        .iter()
        .map(|f| f.detected_purpose.as_deref())
        .collect();
    assert_eq!(
        purposes,
        vec![Some("first_name"), Some("linkedin_url"), None, Some("email")]
    );
    assert!(fields[0].required);
    assert!(fields[2].readonly);

    let mut data = common::profile().to_field_map();
    data.insert("linkedin_url".to_string(), "https://linkedin.com/in/ada".to_string());
    let mapping = mapper.map_fields_to_data(&mut fields, &data);
    assert_eq!(mapping.len(), 3);

    assert_eq!(mapper.fill_fields(&fields).await.unwrap(), 3);
    assert_eq!(page.value_of("fname").as_deref(), Some("Ada"));
    assert_eq!(page.value_of("contact").as_deref(), Some("ada@example.com"));
}

#[tokio::test]
async fn rate_limiter_keeps_every_concurrent_record() {
    let limiter = Arc::new(RateLimiter::new(RateLimitConfig {
        default_rate: 1000,
        ..Default::default()
    }));

    let tasks: Vec<_> = (0..50)
        .map(|i| {
            let limiter = limiter.clone();
            tokio::spawn(async move {
                let platform = if i % 2 == 0 { "linkedin" } else { "indeed" };
                limiter.record(platform, true, None);
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(limiter.get_stats("linkedin").total_submissions, 25);
    assert_eq!(limiter.get_stats("indeed").total_submissions, 25);
    assert_eq!(limiter.get_all_stats().len(), 2);
}
