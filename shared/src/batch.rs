use rand::Rng;

pub const DEFAULT_BATCH_PREFIX: &str = "BATCH";
pub const BATCH_SUFFIX_LEN: usize = 6;

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Draws a random uppercase alphanumeric suffix.
pub fn random_suffix<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..BATCH_SUFFIX_LEN)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

pub fn format_batch_number(prefix: &str, suffix: &str) -> String {
    format!("{}-{}", prefix, suffix)
}

/// Checks the `PREFIX-XXXXXX` shape without caring which prefix is used.
pub fn is_well_formed(batch_number: &str) -> bool {
    match batch_number.rsplit_once('-') {
        Some((prefix, suffix)) => {
            !prefix.is_empty()
                && suffix.len() == BATCH_SUFFIX_LEN
                && suffix.bytes().all(|b| ALPHABET.contains(&b))
        }
        None => false,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid batch prefix {0:?}: expected ASCII letters and digits")]
pub struct InvalidBatchPrefix(pub String);

/// Upper-cases a configured prefix so generated numbers survive
/// `normalize` on lookup.
pub fn parse_prefix(raw: &str) -> Result<String, InvalidBatchPrefix> {
    let prefix = raw.trim().to_ascii_uppercase();
    if prefix.is_empty() || !prefix.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return Err(InvalidBatchPrefix(raw.to_string()));
    }
    Ok(prefix)
}

/// Normalizes user-entered batch numbers for lookup.
pub fn normalize(batch_number: &str) -> String {
    batch_number.trim().to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_suffix_shape() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..100 {
            let suffix = random_suffix(&mut rng);
            assert_eq!(suffix.len(), BATCH_SUFFIX_LEN);
            assert!(suffix
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_consecutive_draws_differ() {
        let mut rng = StdRng::seed_from_u64(7);
        let first = random_suffix(&mut rng);
        let second = random_suffix(&mut rng);
        assert_ne!(first, second);
    }

    #[test]
    fn test_well_formed() {
        assert!(is_well_formed(&format_batch_number("BATCH", "A1B2C3")));
        assert!(is_well_formed("FD-ZZZZ99"));
        assert!(!is_well_formed("BATCH-abc123"));
        assert!(!is_well_formed("BATCH-A1B2C"));
        assert!(!is_well_formed("A1B2C3"));
        assert_eq!(normalize(" batch-a1b2c3 "), "BATCH-A1B2C3");
    }

    #[test]
    fn test_prefix_is_uppercased_and_checked() {
        assert_eq!(parse_prefix(" fd ").unwrap(), "FD");
        assert_eq!(parse_prefix("Batch2").unwrap(), "BATCH2");
        assert!(parse_prefix("").is_err());
        assert!(parse_prefix("fd-1").is_err());
        assert!(parse_prefix("süd").is_err());

        let number = format_batch_number(&parse_prefix("fd").unwrap(), "A1B2C3");
        assert_eq!(normalize(&number), number);
    }
}
