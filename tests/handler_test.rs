mod common;

use std::sync::Arc;

use common::{config, profile, resume_in, simple_form, Click, FakeElement, FakePage, Stage};
use job_apply_submit::{
    HandlerKind, JobPosting, PageDriver, Platform, PlatformHandler, SubmissionConfig,
    SubmissionStatus,
};
use serde_json::json;
use tokio_util::sync::CancellationToken;

fn handler(kind: HandlerKind, page: &Arc<FakePage>, config: SubmissionConfig) -> PlatformHandler {
    PlatformHandler::new(kind, page.clone(), config)
}

#[tokio::test(start_paused = true)]
async fn greenhouse_fills_standard_fields_questions_and_consent() {
    let dir = tempfile::tempdir().unwrap();
    let url = "https://boards.greenhouse.io/acme/jobs/4012";
    let page = Arc::new(FakePage::new(vec![
        Stage::new()
            .url(url)
            .body("Apply for Platform Engineer at Acme")
            .with(FakeElement::input("text", "first_name"))
            .with(FakeElement::input("text", "last_name"))
            .with(FakeElement::input("email", "email"))
            .with(FakeElement::input("tel", "phone"))
            .with(FakeElement::label("q1", "Are you authorized to work in the US? *"))
            .with(FakeElement::input("text", "q1"))
            .with(FakeElement::label("q2", "How did you hear about us?"))
            .with(FakeElement::new("select").attr("id", "q2").options(&["LinkedIn", "Referral"]))
            .with(FakeElement::input("checkbox", "gdpr_consent"))
            .with(
                FakeElement::button("Submit Application")
                    .attr("id", "submit_app")
                    .on_click(Click::Advance),
            ),
        Stage::new().body("Thank you for applying to Acme! Reference ID: GH-20417"),
    ]));

    let mut applicant = profile();
    applicant.screening_responses.insert(
        "Are you authorized to work in the US?".to_string(),
        "Yes".to_string(),
    );
    applicant
        .screening_responses
        .insert("how did you hear about us?".to_string(), "Referral".to_string());

    let resume = resume_in(dir.path());
    let result = handler(HandlerKind::Greenhouse, &page, config())
        .submit(
            &JobPosting::new("gh-4012", url),
            Platform::Greenhouse,
            Some(resume.as_path()),
            None,
            &applicant,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(result.success(), "{:?}", result.error_message);
    assert_eq!(result.confirmation_number.as_deref(), Some("GH-20417"));
    assert_eq!(page.value_of("first_name").as_deref(), Some("Ada"));
    assert_eq!(page.value_of("last_name").as_deref(), Some("Lovelace"));
    assert_eq!(page.value_of("email").as_deref(), Some("ada@example.com"));
    assert_eq!(page.value_of("phone").as_deref(), Some("+44 20 7946 0000"));
    assert_eq!(page.value_of("q1").as_deref(), Some("Yes"));
    assert_eq!(page.value_of("q2").as_deref(), Some("Referral"));
    assert!(page.element_by_id("gdpr_consent").unwrap().checked);
    // 标准字段只填一次
    let first_name_fills = page.fills().iter().filter(|(k, _)| k == "first_name").count();
    assert_eq!(first_name_fills, 1);
}

#[tokio::test(start_paused = true)]
async fn step_loop_is_bounded_when_next_never_reaches_the_end() {
    let dir = tempfile::tempdir().unwrap();
    let url = "https://jobs.example.com/apply/7";
    let page = Arc::new(FakePage::new(vec![Stage::new()
        .url(url)
        .body("Tell us about yourself")
        .with(FakeElement::button("Next"))]));
    let mut cfg = config();
    cfg.max_navigation_steps = 4;

    let resume = resume_in(dir.path());
    let result = handler(HandlerKind::Generic, &page, cfg)
        .submit(
            &JobPosting::new("ex-7", url),
            Platform::Generic,
            Some(resume.as_path()),
            None,
            &profile(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(result.status(), SubmissionStatus::ManualInterventionRequired);
    assert!(result.error_message.as_deref().unwrap().contains("not verified"));
    assert_eq!(result.metadata.get("navigation_steps"), Some(&json!(4)));
    // 四次翻页，加上最后一次当作提交的点击
    assert_eq!(page.clicks().len(), 5);
}

#[tokio::test(start_paused = true)]
async fn multi_step_form_walks_to_the_final_step_and_uploads_late() {
    let dir = tempfile::tempdir().unwrap();
    let url = "https://jobs.example.com/apply/8";
    let steps = |active: usize| {
        ["Contact", "Documents"].into_iter().enumerate().map(move |(i, title)| {
            let class = if i == active { "step active" } else { "step" };
            FakeElement::new("li").attr("class", class).text(title)
        })
    };

    let mut contact = Stage::new()
        .url(url)
        .body("Step 1 of 2")
        .with(FakeElement::input("tel", "mobile"))
        .with(FakeElement::button("Next").on_click(Click::Advance));
    contact.elements.extend(steps(0));
    let mut documents = Stage::new()
        .body("Step 2 of 2")
        .with(FakeElement::input("file", "cv"))
        .with(FakeElement::button("Submit").on_click(Click::Advance));
    documents.elements.extend(steps(1));

    let page = Arc::new(FakePage::new(vec![
        contact,
        documents,
        Stage::new().body("Thank you for applying"),
    ]));

    let resume = resume_in(dir.path());
    let result = handler(HandlerKind::Generic, &page, config())
        .submit(
            &JobPosting::new("ex-8", url),
            Platform::Generic,
            Some(resume.as_path()),
            None,
            &profile(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(result.success(), "{:?}", result.error_message);
    assert_eq!(result.metadata.get("navigation_steps"), Some(&json!(1)));
    assert_eq!(page.clicks(), vec!["Next", "Submit"]);
    assert_eq!(page.value_of("mobile").as_deref(), Some("+44 20 7946 0000"));
    assert_eq!(
        page.element_by_id("cv").unwrap().files,
        vec!["ada_lovelace_resume.pdf"]
    );
}

#[tokio::test(start_paused = true)]
async fn missing_submit_control_needs_manual_submission() {
    let url = "https://jobs.example.com/apply/9";
    let page = Arc::new(FakePage::new(vec![Stage::new()
        .url(url)
        .body("Contact details")
        .with(FakeElement::label("city", "City"))
        .with(FakeElement::input("text", "city"))]));

    let mut applicant = profile();
    applicant.city = Some("London".to_string());
    let result = handler(HandlerKind::Generic, &page, config())
        .submit(
            &JobPosting::new("ex-9", url),
            Platform::Generic,
            None,
            None,
            &applicant,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(result.status(), SubmissionStatus::ManualInterventionRequired);
    assert!(result
        .error_message
        .as_deref()
        .unwrap()
        .contains("Could not locate submit button"));
    assert_eq!(page.value_of("city").as_deref(), Some("London"));
    assert_eq!(page.screenshots().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn linkedin_refuses_untrusted_external_application() {
    let url = "https://www.linkedin.com/jobs/view/555";
    let page = Arc::new(FakePage::new(vec![Stage::new()
        .url(url)
        .with(FakeElement::link(
            "Apply on company website",
            "https://careers-acme.example/apply",
        ))]));

    let result = handler(HandlerKind::LinkedIn, &page, config())
        .submit(
            &JobPosting::new("li-555", url),
            Platform::LinkedIn,
            None,
            None,
            &profile(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(result.status(), SubmissionStatus::ManualInterventionRequired);
    assert!(result
        .error_message
        .as_deref()
        .unwrap()
        .contains("not on a trusted ATS"));
    assert_eq!(page.navigations(), vec![url.to_string()]);
}

#[tokio::test(start_paused = true)]
async fn linkedin_follows_external_application_to_known_ats() {
    let dir = tempfile::tempdir().unwrap();
    let url = "https://www.linkedin.com/jobs/view/556";
    let ats = "https://boards.greenhouse.io/acme/jobs/42";
    let mut stages = vec![Stage::new()
        .url(url)
        .with(FakeElement::link("Apply on company site", ats))];
    stages.extend(simple_form(ats));
    let page = Arc::new(FakePage::new(stages));

    let resume = resume_in(dir.path());
    let result = handler(HandlerKind::LinkedIn, &page, config())
        .submit(
            &JobPosting::new("li-556", url),
            Platform::LinkedIn,
            Some(resume.as_path()),
            None,
            &profile(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(result.success(), "{:?}", result.error_message);
    assert_eq!(result.platform, Platform::LinkedIn);
    assert_eq!(result.metadata.get("redirected_to"), Some(&json!(ats)));
    assert_eq!(page.navigations(), vec![url.to_string(), ats.to_string()]);
    assert_eq!(page.value_of("full-name").as_deref(), Some("Ada Lovelace"));
}

#[tokio::test]
async fn verification_accepts_confirmation_urls() {
    let page = Arc::new(FakePage::new(vec![Stage::new()
        .url("https://jobs.example.com/apply/thank-you")
        .body("Done")]));
    page.navigate("https://jobs.example.com/apply/thank-you")
        .await
        .unwrap();

    let handler = handler(HandlerKind::Generic, &page, config());
    assert!(handler.verify_submission().await.unwrap());
}
