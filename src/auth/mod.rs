//! Registration, OTP verification and session tokens.

pub mod otp;
pub mod password;
pub mod service;
pub mod token;

pub use otp::{LogOtpSender, OtpSender};
pub use service::{AuthService, LoginOutcome, RegisterInput};
pub use token::{Claims, TokenIssuer};
