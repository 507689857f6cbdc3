use rand::Rng;

use crate::error::{EngineError, EngineResult};
use crate::store::StateStoreClient;

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const CODE_LENGTH: usize = 6;
const MAX_ATTEMPTS: u32 = 20;

fn random_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LENGTH)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Generates a session code not currently in use. Collisions are possible
/// but vanishingly unlikely at this alphabet size; bail out rather than loop
/// forever if the store is somehow saturated.
pub async fn generate_unique_code(store: &StateStoreClient) -> EngineResult<String> {
    for _ in 0..MAX_ATTEMPTS {
        let candidate = random_code();
        if !store.session_exists(&candidate).await? {
            return Ok(candidate);
        }
    }
    Err(EngineError::Internal(anyhow::anyhow!(
        "could not allocate a unique session code after {MAX_ATTEMPTS} attempts"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryBackend;
    use std::sync::Arc;

    #[tokio::test]
    async fn generates_six_char_uppercase_code() {
        let store = StateStoreClient::new(Arc::new(MemoryBackend::new()));
        let code = generate_unique_code(&store).await.unwrap();
        assert_eq!(code.len(), CODE_LENGTH);
        assert!(code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }
}
