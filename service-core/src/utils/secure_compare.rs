use subtle::ConstantTimeEq;

/// Compares two secrets in time independent of where they first differ.
///
/// Inputs of different length are rejected after the length check alone; the length of a
/// fixed-size digest is not secret.
pub fn secure_eq(expected: &str, candidate: &str) -> bool {
    let expected_bytes = expected.as_bytes();
    let candidate_bytes = candidate.as_bytes();

    if expected_bytes.len() != candidate_bytes.len() {
        return false;
    }

    expected_bytes.ct_eq(candidate_bytes).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_strings_match() {
        let digest = "8d969eef6ecad3c29a3a629280e686cf0c3f5d5a86aff3ca12020c923adc6c92";
        assert!(secure_eq(digest, digest));
        assert!(secure_eq("", ""));
    }

    #[test]
    fn single_character_difference_is_rejected() {
        assert!(!secure_eq("abcdef", "abcdeg"));
        assert!(!secure_eq("abcdef", "xbcdef"));
        assert!(!secure_eq("abcdef", "abCdef"));
    }

    #[test]
    fn different_lengths_are_rejected() {
        assert!(!secure_eq("abcdef", "abcde"));
        assert!(!secure_eq("abc", "abcdef"));
        assert!(!secure_eq("", "a"));
    }
}
