use rand::Rng;

use crate::config::OtpConfig;

const DIGITS: &str = "0123456789";
const LETTERS: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
const SYMBOLS: &str = "!@#$%^&*";

/// Generate a fixed-length one-time code from the configured alphabet.
/// When digits are enabled the first character is never '0', so the code
/// survives numeric display that strips leading zeros.
pub fn generate_code(cfg: &OtpConfig) -> String {
    let mut alphabet = String::new();
    if cfg.digits {
        alphabet.push_str(DIGITS);
    }
    if cfg.letters {
        alphabet.push_str(LETTERS);
    }
    if cfg.symbols {
        alphabet.push_str(SYMBOLS);
    }
    if alphabet.is_empty() {
        alphabet.push_str(DIGITS);
    }

    let chars: Vec<char> = alphabet.chars().collect();
    let first: Vec<char> = chars.iter().copied().filter(|c| *c != '0').collect();

    let mut rng = rand::thread_rng();
    (0..cfg.length)
        .map(|i| {
            let pool = if i == 0 { &first } else { &chars };
            pool[rng.gen_range(0..pool.len())]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(length: usize, digits: bool, letters: bool, symbols: bool) -> OtpConfig {
        OtpConfig {
            length,
            ttl_minutes: 10,
            digits,
            letters,
            symbols,
        }
    }

    #[test]
    fn code_has_requested_length() {
        for len in [4, 6, 8] {
            assert_eq!(generate_code(&cfg(len, true, false, false)).len(), len);
        }
    }

    #[test]
    fn digit_only_codes_contain_only_digits() {
        for _ in 0..50 {
            let code = generate_code(&cfg(6, true, false, false));
            assert!(code.chars().all(|c| c.is_ascii_digit()), "{code}");
        }
    }

    #[test]
    fn digit_codes_never_start_with_zero() {
        for _ in 0..500 {
            let code = generate_code(&cfg(6, true, false, false));
            assert_ne!(code.chars().next(), Some('0'), "{code}");
        }
    }

    #[test]
    fn mixed_alphabet_draws_from_all_enabled_sets() {
        let mut saw_letter = false;
        let mut saw_symbol = false;
        for _ in 0..200 {
            let code = generate_code(&cfg(8, true, true, true));
            saw_letter |= code.chars().any(|c| c.is_ascii_alphabetic());
            saw_symbol |= code.chars().any(|c| "!@#$%^&*".contains(c));
        }
        assert!(saw_letter);
        assert!(saw_symbol);
    }

    #[test]
    fn empty_alphabet_falls_back_to_digits() {
        let code = generate_code(&cfg(6, false, false, false));
        assert!(code.chars().all(|c| c.is_ascii_digit()));
    }
}
