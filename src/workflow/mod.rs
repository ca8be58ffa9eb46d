pub mod greenhouse;
pub mod handler;
pub mod variants;

pub use handler::{extract_confirmation_number, PlatformHandler};
pub use variants::{HandlerKind, VariantProfile};
