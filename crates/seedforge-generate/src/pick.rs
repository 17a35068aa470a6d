//! Deterministic primitive: every helper is a pure function of its seed string
//! and domain.

use std::ops::RangeInclusive;

use chrono::{Days, NaiveDate};
use fake::Fake;
use fake::faker::internet::en::SafeEmail;
use fake::faker::lorem::en::Words;
use fake::faker::name::en::{FirstName, LastName};
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sha2::{Digest, Sha256};

/// Rng seeded from the SHA-256 digest of `seed`.
pub fn rng_for(seed: &str) -> ChaCha8Rng {
    let digest = Sha256::digest(seed.as_bytes());
    let mut bytes = [0_u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    ChaCha8Rng::seed_from_u64(u64::from_le_bytes(bytes))
}

pub fn int(seed: &str, range: RangeInclusive<i64>) -> i64 {
    let (min, max) = range.into_inner();
    if min >= max {
        return min;
    }
    rng_for(seed).random_range(min..=max)
}

pub fn one_of<'a, T>(seed: &str, choices: &'a [T]) -> Option<&'a T> {
    if choices.is_empty() {
        return None;
    }
    let index = rng_for(seed).random_range(0..choices.len());
    choices.get(index)
}

pub fn bool(seed: &str) -> bool {
    rng_for(seed).random_bool(0.5)
}

/// Version 4 UUID built from seeded bytes.
pub fn uuid(seed: &str) -> String {
    let mut bytes = [0_u8; 16];
    rng_for(seed).fill_bytes(&mut bytes);
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;
    uuid::Uuid::from_bytes(bytes).to_string()
}

pub fn email(seed: &str) -> String {
    SafeEmail().fake_with_rng(&mut rng_for(seed))
}

pub fn first_name(seed: &str) -> String {
    FirstName().fake_with_rng(&mut rng_for(seed))
}

pub fn last_name(seed: &str) -> String {
    LastName().fake_with_rng(&mut rng_for(seed))
}

pub fn words(seed: &str, count: usize) -> String {
    let count = count.max(1);
    let words: Vec<String> = Words(count..count + 1).fake_with_rng(&mut rng_for(seed));
    words.join(" ")
}

/// Date within `days` days after `start`.
pub fn date(seed: &str, start: NaiveDate, days: u32) -> NaiveDate {
    let offset = int(seed, 0..=i64::from(days));
    start
        .checked_add_days(Days::new(offset.unsigned_abs()))
        .unwrap_or(start)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_value() {
        assert_eq!(int("a/0", 1..=1000), int("a/0", 1..=1000));
        assert_eq!(uuid("a/0/id"), uuid("a/0/id"));
        assert_eq!(email("a/0/email"), email("a/0/email"));
        assert_eq!(words("a/0/title", 3), words("a/0/title", 3));
    }

    #[test]
    fn int_stays_in_range() {
        for index in 0..100 {
            let value = int(&format!("range/{index}"), 3..=7);
            assert!((3..=7).contains(&value));
        }
        assert_eq!(int("degenerate", 5..=5), 5);
        assert_eq!(int("inverted", 9..=2), 9);
    }

    #[test]
    fn one_of_handles_empty_choices() {
        let empty: [u8; 0] = [];
        assert_eq!(one_of("seed", &empty), None);
        assert_eq!(one_of("seed", &[42]), Some(&42));
    }

    #[test]
    fn uuid_is_version_four() {
        let parsed = uuid::Uuid::parse_str(&uuid("uuid/seed")).expect("valid uuid");
        assert_eq!(parsed.get_version_num(), 4);
    }

    #[test]
    fn date_stays_in_window() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date");
        let value = date("created/0", start, 30);
        assert!(value >= start && value <= start + Days::new(30));
        assert_eq!(value, date("created/0", start, 30));
    }

    #[test]
    fn words_returns_requested_count() {
        assert_eq!(words("w", 4).split(' ').count(), 4);
    }
}
