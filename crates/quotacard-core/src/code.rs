//! Card-code generation.
//!
//! Codes look like `CC_XXXX_XXXX_XXXX`, drawn from a 32-symbol alphabet that
//! excludes `0`, `1`, `I` and `O` to keep transcription errors down. Symbols
//! come from the OS random source, not a statistical PRNG, so codes are not
//! guessable.
//!
//! Generation does not guarantee uniqueness. With 32^12 possible codes a
//! collision is vanishingly rare, but the card manager still checks the code
//! index and retries rather than overwrite an existing card.

use rand::rngs::OsRng;
use rand::Rng;

/// Symbols used in card codes. 32 characters, no confusable glyphs.
pub const CARD_CODE_ALPHABET: &[u8; 32] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Prefix for every card code.
pub const CARD_CODE_PREFIX: &str = "CC";

/// Number of random symbols in a code.
const CODE_SYMBOLS: usize = 12;

/// Generate a fresh card code in the form `CC_XXXX_XXXX_XXXX`.
#[must_use]
pub fn generate_card_code() -> String {
    let mut rng = OsRng;
    let mut code = String::with_capacity(CARD_CODE_PREFIX.len() + CODE_SYMBOLS + 3);
    code.push_str(CARD_CODE_PREFIX);

    for i in 0..CODE_SYMBOLS {
        if i % 4 == 0 {
            code.push('_');
        }
        code.push(char::from(
            CARD_CODE_ALPHABET[rng.gen_range(0..CARD_CODE_ALPHABET.len())],
        ));
    }

    code
}

/// Check that a string has the shape and alphabet of a card code.
///
/// Used for input hygiene before hitting the store; a well-formed unknown
/// code still resolves to "not found".
#[must_use]
pub fn is_valid_card_code(code: &str) -> bool {
    let mut parts = code.split('_');

    if parts.next() != Some(CARD_CODE_PREFIX) {
        return false;
    }

    let mut groups = 0;
    for group in parts {
        if group.len() != 4 || !group.bytes().all(|b| CARD_CODE_ALPHABET.contains(&b)) {
            return false;
        }
        groups += 1;
    }

    groups == 3
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_codes_are_well_formed() {
        for _ in 0..100 {
            let code = generate_card_code();
            assert!(is_valid_card_code(&code), "bad code: {code}");
            assert_eq!(code.len(), 17);
        }
    }

    #[test]
    fn alphabet_excludes_confusable_glyphs() {
        for banned in [b'0', b'1', b'I', b'O'] {
            assert!(!CARD_CODE_ALPHABET.contains(&banned));
        }
    }

    #[test]
    fn generated_codes_vary() {
        let first = generate_card_code();
        let second = generate_card_code();
        assert_ne!(first, second);
    }

    #[test]
    fn validation_rejects_malformed_codes() {
        assert!(is_valid_card_code("CC_ABCD_EFGH_JKLM"));
        assert!(!is_valid_card_code("cc_abcd_efgh_jklm"));
        assert!(!is_valid_card_code("CC_ABCD_EFGH"));
        assert!(!is_valid_card_code("CC_ABCD_EFGH_JKLM_NPQR"));
        assert!(!is_valid_card_code("XX_ABCD_EFGH_JKLM"));
        assert!(!is_valid_card_code("CC_AB0D_EFGH_JKLM"));
        assert!(!is_valid_card_code("CC_ABCDEFGHJKLM"));
        assert!(!is_valid_card_code(""));
    }
}
