pub mod admin;
pub mod metrics;
pub mod otp;
pub mod session;
