//! Password hashing with bcrypt, run off the async executor.

use thiserror::Error;
use tokio::task;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("bcrypt failure: {0}")]
    Bcrypt(#[from] bcrypt::BcryptError),
    #[error("stored password hash is not valid UTF-8")]
    Encoding,
    #[error("hashing task failed: {0}")]
    Join(#[from] task::JoinError),
}

#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    /// Stored as the bytes of the modular-crypt string.
    pub async fn hash(&self, password: String) -> Result<Vec<u8>, PasswordError> {
        let cost = self.cost;
        let hashed = task::spawn_blocking(move || bcrypt::hash(password, cost)).await??;
        Ok(hashed.into_bytes())
    }

    pub async fn verify(&self, password: String, stored: Vec<u8>) -> Result<bool, PasswordError> {
        let stored = String::from_utf8(stored).map_err(|_| PasswordError::Encoding)?;
        let matches = task::spawn_blocking(move || bcrypt::verify(password, &stored)).await??;
        Ok(matches)
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(bcrypt::DEFAULT_COST)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hash_then_verify() {
        let hasher = PasswordHasher::new(4);
        let stored = hasher.hash("s3cret-pass".to_string()).await.expect("hash");
        assert!(stored.starts_with(b"$2"));
        assert!(
            hasher
                .verify("s3cret-pass".to_string(), stored.clone())
                .await
                .expect("verify")
        );
        assert!(
            !hasher
                .verify("wrong-pass".to_string(), stored)
                .await
                .expect("verify")
        );
    }

    #[tokio::test]
    async fn non_utf8_hash_is_rejected() {
        let hasher = PasswordHasher::new(4);
        let err = hasher
            .verify("whatever".to_string(), vec![0xff, 0xfe])
            .await
            .expect_err("invalid hash");
        assert!(matches!(err, PasswordError::Encoding));
    }
}
