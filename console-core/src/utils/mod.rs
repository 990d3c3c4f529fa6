use rand::RngCore;
use subtle::ConstantTimeEq;

/// Compare two secrets without leaking the position of the first
/// mismatch. Length differences still short-circuit.
pub fn timing_safe_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Hex-encoded random token. 32 bytes gives 256 bits of entropy.
pub fn generate_token(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill_bytes(&mut buf);
    hex::encode(buf)
}

pub fn generate_account_id() -> String {
    format!("acc_{}", generate_token(8))
}

/// Masked rendering of a secret for listings. Keys shorter than
/// `min_length` reveal nothing at all. Counted in characters, not
/// bytes, so arbitrary input cannot split a code point.
pub fn secret_preview(secret: &str, min_length: usize) -> String {
    if secret.is_empty() {
        return String::new();
    }
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() < min_length {
        return "***".to_string();
    }
    let head: String = chars[..8].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

/// Parse a caller-supplied limit, falling back and clamping to range.
pub fn clamp_limit(value: Option<&str>, default: i64, min: i64, max: i64) -> i64 {
    let parsed = value.and_then(|v| v.parse::<i64>().ok()).unwrap_or(default);
    parsed.clamp(min, max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timing_safe_eq_matches_equal_strings() {
        assert!(timing_safe_eq("secret", "secret"));
        assert!(!timing_safe_eq("secret", "secreT"));
        assert!(!timing_safe_eq("secret", "secret2"));
        assert!(!timing_safe_eq("", "x"));
    }

    #[test]
    fn tokens_are_hex_and_unique() {
        let a = generate_token(32);
        let b = generate_token(32);
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn secret_preview_handles_short_keys() {
        assert_eq!(secret_preview("", 12), "");
        assert_eq!(secret_preview("short", 12), "***");
        assert_eq!(secret_preview("rnd_abcdefghijklmnop", 12), "rnd_abcd...mnop");
    }

    #[test]
    fn secret_preview_survives_multibyte_input() {
        // A code point straddling the old byte offsets must not panic.
        assert_eq!(secret_preview("aaaaaaa€aaaa", 12), "aaaaaaa€...aaaa");
        assert_eq!(secret_preview("€€€€€€€€€€€€", 12), "€€€€€€€€...€€€€");
        assert_eq!(secret_preview("€€€", 12), "***");
    }

    #[test]
    fn clamp_limit_bounds_input() {
        assert_eq!(clamp_limit(None, 10, 1, 100), 10);
        assert_eq!(clamp_limit(Some("5"), 10, 1, 100), 5);
        assert_eq!(clamp_limit(Some("1000"), 10, 1, 100), 100);
        assert_eq!(clamp_limit(Some("0"), 10, 1, 100), 1);
        assert_eq!(clamp_limit(Some("junk"), 10, 1, 100), 10);
    }
}
