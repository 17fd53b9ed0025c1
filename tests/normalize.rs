use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use roster_extract::identifier::{MAX_IDENTIFIER_LEN, RESERVED_SEGMENTS};
use roster_extract::normalize;

#[test]
fn documented_examples() {
    assert_eq!(normalize("/explore/"), None);
    assert_eq!(normalize("/p/abc123/"), None);
    assert_eq!(
        normalize("/bob.smith_99/").map(|id| id.into_string()),
        Some("bob.smith_99".to_string())
    );
}

#[test]
fn reserved_segments_rejected_in_every_casing() {
    for segment in RESERVED_SEGMENTS {
        let chars: Vec<char> = segment.chars().collect();
        // Every upper/lower combination for short segments, a sample for long ones
        let variants = 1u32 << chars.len().min(12);
        for mask in 0..variants {
            let cased: String = chars
                .iter()
                .enumerate()
                .map(|(i, c)| {
                    if i < 32 && mask & (1 << i) != 0 {
                        c.to_ascii_uppercase()
                    } else {
                        *c
                    }
                })
                .collect();
            assert_eq!(normalize(&format!("/{cased}/")), None, "{cased}");
            assert_eq!(normalize(&cased), None, "{cased}");
        }
    }
}

#[test]
fn idempotent_and_deterministic_on_random_input() {
    const ALPHABET: &[u8] = b"abcXYZ019._-/?=& %";
    let mut rng = StdRng::seed_from_u64(2024);
    for _ in 0..5_000 {
        let len = rng.random_range(0..40);
        let raw: String = (0..len)
            .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
            .collect();

        let first = normalize(&raw);
        assert_eq!(first, normalize(&raw), "{raw:?}");
        if let Some(id) = first {
            assert!((1..=MAX_IDENTIFIER_LEN).contains(&id.as_str().len()));
            assert_eq!(normalize(id.as_str()).as_ref(), Some(&id), "{raw:?}");
            assert_eq!(id.as_str(), id.as_str().to_ascii_lowercase());
        }
    }
}
