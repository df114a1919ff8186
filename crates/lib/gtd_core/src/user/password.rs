//! bcrypt on the blocking pool; hashing at cost 10 takes tens of milliseconds.

use super::UserError;

const BCRYPT_COST: u32 = 10;

async fn blocking<T, F>(op: &'static str, f: F) -> Result<T, UserError>
where
    F: FnOnce() -> Result<T, bcrypt::BcryptError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| UserError::Internal(format!("{op}: {e}")))?
        .map_err(|e| UserError::Internal(format!("{op}: {e}")))
}

pub(crate) async fn hash(password: &str) -> Result<String, UserError> {
    let password = password.to_string();
    blocking("bcrypt hash", move || bcrypt::hash(password, BCRYPT_COST)).await
}

/// `Ok(false)` on mismatch; an unparseable stored hash is an internal error.
pub(crate) async fn verify(password: &str, hash: &str) -> Result<bool, UserError> {
    let (password, hash) = (password.to_string(), hash.to_string());
    blocking("bcrypt verify", move || bcrypt::verify(password, &hash)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn only_the_hashed_password_verifies() {
        let stored = hash("correct horse").await.unwrap();
        assert!(stored.starts_with("$2"));
        assert!(verify("correct horse", &stored).await.unwrap());
        assert!(!verify("battery staple", &stored).await.unwrap());
    }

    #[tokio::test]
    async fn garbage_hash_is_internal() {
        let err = verify("pw", "not-a-bcrypt-hash").await.unwrap_err();
        assert!(matches!(err, UserError::Internal(_)));
    }
}
