use pdv_k8s::ClusterClient;
use secrecy::SecretString;
use tracing::info;

use crate::VerifyError;

/// Reads the bearer token stored under `key` in a secret.
///
/// The value is returned as-is; an absent, empty or non UTF-8 value is
/// [`VerifyError::CredentialMissing`].
#[tracing::instrument(skip(client))]
pub async fn resolve_credential(
    client: &dyn ClusterClient,
    namespace: &str,
    secret: &str,
    key: &str,
) -> Result<SecretString, VerifyError> {
    let missing = |reason: String| VerifyError::CredentialMissing {
        namespace: namespace.to_string(),
        secret: secret.to_string(),
        reason,
    };

    let obj = match client.get_secret(namespace, secret).await {
        Ok(obj) => obj,
        Err(e) if e.is_not_found() => {
            return Err(missing("secret not found".into()));
        }
        Err(e) => {
            return Err(VerifyError::cluster(
                format!("getting secret {namespace}/{secret}"),
                e,
            ));
        }
    };

    let raw = obj
        .data
        .as_ref()
        .and_then(|d| d.get(key))
        .ok_or_else(|| missing(format!("key {key} not present")))?;
    if raw.0.is_empty() {
        return Err(missing(format!("key {key} is empty")));
    }
    let token = String::from_utf8(raw.0.clone())
        .map_err(|_| missing(format!("key {key} is not valid UTF-8")))?;

    info!(token_len = token.len(), "resolved credential");
    Ok(SecretString::from(token))
}
