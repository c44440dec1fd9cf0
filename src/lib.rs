// Module declarations
pub mod api;
pub mod config;
pub mod constants;
pub mod error;
pub mod pricing;
pub mod providers;
pub mod sessions;
pub mod transcript;
pub mod utils;

pub use error::{AppError, ErrorCode};
pub use providers::{detect_provider, ProviderKind};
pub use transcript::{load_page, normalize, paginate, pair_tool_calls, TranscriptMessage};
pub use pricing::{annotate_costs, estimate};
