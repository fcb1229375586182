//! Site join codes: 8 characters from `[A-Z0-9]`, matched case-insensitively.

use rand::Rng;

use crate::store::{Store, StoreError};

pub const JOIN_CODE_LEN: usize = 8;
pub const MAX_GENERATION_ATTEMPTS: usize = 16;

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Draw a random code; uniqueness is the caller's concern.
pub fn random_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..JOIN_CODE_LEN)
        .map(|_| char::from(ALPHABET[rng.gen_range(0..ALPHABET.len())]))
        .collect()
}

/// Trim and upper-case user input; `None` if it cannot be a join code.
#[must_use]
pub fn normalize(input: &str) -> Option<String> {
    let code = input.trim().to_ascii_uppercase();
    let valid = code.len() == JOIN_CODE_LEN && code.bytes().all(|b| ALPHABET.contains(&b));
    valid.then_some(code)
}

/// Draw codes until one is not taken in `store`.
///
/// Store-level uniqueness still applies at insert time; callers retry on
/// [`crate::store::Constraint::JoinCode`] conflicts.
///
/// # Errors
/// Returns the store error, or [`StoreError::Exhausted`] after
/// [`MAX_GENERATION_ATTEMPTS`] collisions.
pub async fn generate_unique<R: Rng + Send>(
    store: &dyn Store,
    rng: &mut R,
) -> Result<String, StoreError> {
    for _ in 0..MAX_GENERATION_ATTEMPTS {
        let code = random_code(rng);
        if !store.join_code_exists(&code).await? {
            return Ok(code);
        }
    }
    Err(StoreError::Exhausted("join code"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{memory::MemoryStore, NewSite};
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn random_codes_match_format() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let code = random_code(&mut rng);
            assert_eq!(normalize(&code).as_deref(), Some(code.as_str()));
        }
    }

    #[test]
    fn normalize_upper_cases_and_trims() {
        assert_eq!(normalize(" ab12cd34 ").as_deref(), Some("AB12CD34"));
    }

    #[test]
    fn normalize_rejects_bad_input() {
        assert_eq!(normalize("ABC"), None);
        assert_eq!(normalize("ABCD-123"), None);
        assert_eq!(normalize("ABCDEFGHI"), None);
        assert_eq!(normalize(""), None);
    }

    #[tokio::test]
    async fn generator_skips_existing_codes() -> anyhow::Result<()> {
        let store = MemoryStore::new();
        // Same seed: the first candidate the generator draws is already taken.
        let taken = random_code(&mut StdRng::seed_from_u64(42));
        store
            .insert_site(NewSite::for_tests("Existing", &taken))
            .await?;

        let code = generate_unique(&store, &mut StdRng::seed_from_u64(42)).await?;
        assert_ne!(code, taken);
        assert!(normalize(&code).is_some());
        assert!(!store.join_code_exists(&code).await?);
        Ok(())
    }

    #[tokio::test]
    async fn generator_gives_up_when_every_code_collides() -> anyhow::Result<()> {
        let store = MemoryStore::new();
        let mut seed_rng = StdRng::seed_from_u64(9);
        for index in 0..MAX_GENERATION_ATTEMPTS {
            let code = random_code(&mut seed_rng);
            store
                .insert_site(NewSite::for_tests(&format!("Site {index}"), &code))
                .await?;
        }

        let result = generate_unique(&store, &mut StdRng::seed_from_u64(9)).await;
        assert!(matches!(result, Err(StoreError::Exhausted(_))));
        Ok(())
    }
}
