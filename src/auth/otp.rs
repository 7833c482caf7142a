use async_trait::async_trait;
use rand::Rng;
use subtle::ConstantTimeEq;

/// Six-digit one-time code, 100000..=999999.
pub fn generate_otp() -> String {
    rand::thread_rng().gen_range(100_000..1_000_000).to_string()
}

pub fn otp_matches(expected: &str, given: &str) -> bool {
    expected.as_bytes().ct_eq(given.trim().as_bytes()).into()
}

/// Delivers OTP codes to a user's email or phone.
#[async_trait]
pub trait OtpSender: Send + Sync {
    async fn send(&self, destination: &str, otp: &str) -> anyhow::Result<()>;
}

/// Writes codes to the log. Used when no mail/SMS provider is configured.
pub struct LogOtpSender;

#[async_trait]
impl OtpSender for LogOtpSender {
    async fn send(&self, destination: &str, otp: &str) -> anyhow::Result<()> {
        tracing::info!(destination, otp, "OTP issued");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_otp_is_six_digits() {
        for _ in 0..100 {
            let otp = generate_otp();
            assert_eq!(otp.len(), 6);
            let n: u32 = otp.parse().unwrap();
            assert!((100_000..=999_999).contains(&n));
        }
    }

    #[test]
    fn test_otp_matches() {
        assert!(otp_matches("123456", "123456"));
        assert!(otp_matches("123456", " 123456 "));
        assert!(!otp_matches("123456", "123457"));
        assert!(!otp_matches("123456", "12345"));
    }
}
