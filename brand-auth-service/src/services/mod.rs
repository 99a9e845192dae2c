//! Business logic for brand login: admin guard, sessions, login codes and their stores.

pub mod admin_guard;
pub mod clock;
mod database;
pub mod email;
pub mod error;
mod memory;
pub mod metrics;
pub mod otp;
pub mod session;
mod store;

pub use admin_guard::{AdminAllowList, AdminGuard};
pub use clock::{Clock, ManualClock, SystemClock};
pub use database::PgStore;
pub use email::{EmailProvider, MockEmailService, SentEmail, SmtpEmailService};
pub use error::ServiceError;
pub use memory::InMemoryStore;
pub use otp::{OtpService, VerifiedBrand};
pub use session::{IssuedSession, Session, SessionClaims, SessionRole, SessionService, SessionUser};
pub use store::{BrandDirectory, OtpStore};
