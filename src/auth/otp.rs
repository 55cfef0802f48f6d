use rand::Rng;

pub const OTP_LENGTH: usize = 6;

/// Wrong guesses tolerated before a pending OTP is thrown away.
pub const MAX_OTP_ATTEMPTS: u64 = 5;

/// Cache key under which a pending OTP for `email` lives.
pub fn otp_key(email: &str) -> String {
    format!("otp-{}", email)
}

/// Failed verification attempts against the pending OTP for `email`.
pub fn otp_attempts_key(email: &str) -> String {
    format!("otp-attempts-{}", email)
}

/// Zero-padded numeric passcode.
pub fn generate_otp() -> String {
    let mut rng = rand::thread_rng();
    (0..OTP_LENGTH).map(|_| char::from(b'0' + rng.gen_range(0..10u8))).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn six_ascii_digits() {
        for _ in 0..100 {
            let otp = generate_otp();
            assert_eq!(otp.len(), OTP_LENGTH);
            assert!(otp.bytes().all(|b| b.is_ascii_digit()));
        }
    }

    #[test]
    fn key_format() {
        assert_eq!(otp_key("a@b.c"), "otp-a@b.c");
        assert_eq!(otp_attempts_key("a@b.c"), "otp-attempts-a@b.c");
    }
}
