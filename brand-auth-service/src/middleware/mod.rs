pub mod admin;
pub mod metrics;
pub mod session;

pub use admin::admin_guard_middleware;
pub use metrics::metrics_middleware;
pub use session::{session_middleware, AuthSession};
