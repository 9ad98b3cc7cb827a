/// Password policy, hashing and generation
///
/// The policy is a pure function over the submitted string; hashing uses
/// Argon2id with the default (deliberately expensive) parameters. The
/// generators draw from the OS entropy source.
use crate::error::{AppError, AppResult};
use argon2::{
    password_hash::SaltString, Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use rand::{rngs::OsRng, seq::SliceRandom, Rng};

/// Minimum password length
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Special characters accepted by the strength policy
pub const SPECIAL_CHARS: &str = "!@#$%^&*()_+-=[]{}|;:,.<>?";

const UPPERCASE: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const LOWERCASE: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const DIGITS: &[u8] = b"0123456789";

/// Check whether a password satisfies the strength policy:
/// length >= 8 and at least one uppercase, lowercase, digit and special
/// character. Pure, no I/O.
pub fn is_strong(password: &str) -> bool {
    password_errors(password).is_empty()
}

/// List every policy rule the password violates
pub fn password_errors(password: &str) -> Vec<String> {
    let mut errors = Vec::new();

    if password.len() < MIN_PASSWORD_LENGTH {
        errors.push(format!(
            "Password must be at least {} characters long",
            MIN_PASSWORD_LENGTH
        ));
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        errors.push("Password must contain at least one uppercase letter".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        errors.push("Password must contain at least one lowercase letter".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        errors.push("Password must contain at least one number".to_string());
    }
    if !password.chars().any(|c| SPECIAL_CHARS.contains(c)) {
        errors.push("Password must contain at least one special character".to_string());
    }

    errors
}

/// Hash a plaintext password with Argon2id.
///
/// This is the brute-force defense: it is expensive on purpose and must
/// stay on the request path rather than being cached or precomputed.
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))?;

    Ok(hash.to_string())
}

/// Verify a plaintext password against a stored PHC-format hash
pub fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| AppError::Internal(format!("Invalid password hash: {}", e)))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Generate a temporary password for admin-provisioned accounts.
///
/// Guarantees one character from each policy class so the result always
/// passes the strength check, then shuffles.
pub fn generate_password(length: usize) -> String {
    let specials = SPECIAL_CHARS.as_bytes();
    let all: Vec<u8> = [UPPERCASE, LOWERCASE, DIGITS, specials].concat();

    let mut rng = OsRng;
    let mut chars: Vec<u8> = vec![
        UPPERCASE[rng.gen_range(0..UPPERCASE.len())],
        LOWERCASE[rng.gen_range(0..LOWERCASE.len())],
        DIGITS[rng.gen_range(0..DIGITS.len())],
        specials[rng.gen_range(0..specials.len())],
    ];

    while chars.len() < length.max(MIN_PASSWORD_LENGTH) {
        chars.push(all[rng.gen_range(0..all.len())]);
    }

    chars.shuffle(&mut rng);
    chars.into_iter().map(|b| b as char).collect()
}

/// Generate a 6-digit numeric one-time code from the OS entropy source
pub fn generate_otp() -> String {
    OsRng.gen_range(100_000..=999_999u32).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strong_password_passes() {
        assert!(is_strong("Str0ng!Pw"));
        assert!(password_errors("Str0ng!Pw").is_empty());
    }

    #[test]
    fn weak_passwords_fail_with_reasons() {
        assert!(!is_strong("short"));
        assert!(!is_strong("alllowercase1!"));
        assert!(!is_strong("ALLUPPERCASE1!"));
        assert!(!is_strong("NoDigits!!"));
        assert!(!is_strong("NoSpecial123"));

        let errors = password_errors("abc");
        // too short, no uppercase, no digit, no special
        assert_eq!(errors.len(), 4);
    }

    #[test]
    fn hash_and_verify_roundtrip() {
        let hash = hash_password("Str0ng!Pw").unwrap();
        assert_ne!(hash, "Str0ng!Pw");
        assert!(verify_password("Str0ng!Pw", &hash).unwrap());
        assert!(!verify_password("Wr0ng!Pw!", &hash).unwrap());
    }

    #[test]
    fn hashes_are_salted() {
        let a = hash_password("Str0ng!Pw").unwrap();
        let b = hash_password("Str0ng!Pw").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn generated_passwords_satisfy_policy() {
        for _ in 0..20 {
            let pw = generate_password(12);
            assert_eq!(pw.len(), 12);
            assert!(is_strong(&pw), "generated password failed policy: {}", pw);
        }
    }

    #[test]
    fn otp_is_six_digits() {
        for _ in 0..50 {
            let otp = generate_otp();
            assert_eq!(otp.len(), 6);
            assert!(otp.chars().all(|c| c.is_ascii_digit()));
        }
    }
}
