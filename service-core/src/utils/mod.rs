pub mod client_ip;
pub mod secure_compare;

pub use client_ip::{client_ip, forwarded_ip};
pub use secure_compare::secure_eq;
