pub mod logging;
pub mod timing;

pub use timing::{ensure_active, jitter, pause};
