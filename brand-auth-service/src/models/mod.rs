pub mod brand_account;
pub mod otp_code;

pub use brand_account::BrandAccount;
pub use otp_code::OtpRecord;
