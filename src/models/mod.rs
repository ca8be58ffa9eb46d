pub mod form;
pub mod loaders;
pub mod navigation;
pub mod profile;
pub mod submission;

pub use form::{FieldType, FormField};
pub use loaders::{load_job_batch, JobBatch};
pub use navigation::NavigationState;
pub use profile::ApplicantProfile;
pub use submission::{
    JobPosting, Platform, SubmissionRequest, SubmissionResult, SubmissionStatus,
};
