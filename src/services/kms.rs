// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Cloud KMS service for encrypting/decrypting HoYoLAB cookies.
//!
//! Uses direct KMS encryption (not envelope encryption). A user's cookies
//! are encrypted as one JSON bundle, with the user ID as additional
//! authenticated data so a bundle cannot be replayed onto another user.

use crate::error::AppError;
use crate::models::HoyolabCredentials;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

/// KMS encryption service.
#[derive(Clone)]
pub struct KmsService {
    /// Full resource path to the KMS key
    /// Format: projects/{project}/locations/{location}/keyRings/{ring}/cryptoKeys/{key}
    key_path: String,

    /// GCP KMS client
    client: Option<std::sync::Arc<google_cloud_kms::client::Client>>,
}

impl KmsService {
    const KEY_RING_NAME: &'static str = "hoyolab-autopilot";
    pub const CREDENTIALS_KEY_NAME: &'static str = "credential-encryption";

    /// Create a new KMS service.
    /// Connects to GCP KMS.
    pub async fn new(project_id: &str, location: &str, key_name: &str) -> Result<Self, AppError> {
        let key_path = format!(
            "projects/{}/locations/{}/keyRings/{}/cryptoKeys/{}",
            project_id,
            location,
            Self::KEY_RING_NAME,
            key_name
        );

        let config = google_cloud_kms::client::ClientConfig::default()
            .with_auth()
            .await
            .map_err(|e| {
                AppError::Internal(anyhow::anyhow!("Failed to create KMS auth config: {}", e))
            })?;

        let client = google_cloud_kms::client::Client::new(config)
            .await
            .map_err(|e| {
                AppError::Internal(anyhow::anyhow!("Failed to create KMS client: {}", e))
            })?;

        tracing::info!(key = %key_path, "KMS client ready");

        Ok(Self {
            key_path,
            client: Some(std::sync::Arc::new(client)),
        })
    }

    /// Create a mock KMS service for testing (offline mode).
    /// Only available in debug/test builds.
    #[cfg(debug_assertions)]
    pub fn new_mock() -> Self {
        Self {
            key_path: "projects/mock/locations/mock/keyRings/mock/cryptoKeys/mock".to_string(),
            client: None,
        }
    }

    /// Encrypt `plaintext` bound to `aad`.
    /// Returns base64-encoded ciphertext.
    pub async fn encrypt(&self, plaintext: &str, aad: &[u8]) -> Result<String, AppError> {
        use google_cloud_googleapis::cloud::kms::v1::EncryptRequest;

        // Mock mode (Debug builds only): base64 of "{base64(aad)}|{plaintext}"
        #[cfg(debug_assertions)]
        {
            if self.client.is_none() {
                return Ok(BASE64.encode(format!("{}|{}", BASE64.encode(aad), plaintext)));
            }
        }

        let client = self
            .client
            .as_ref()
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("KMS client not connected")))?;

        let req = EncryptRequest {
            name: self.key_path.clone(),
            plaintext: plaintext.as_bytes().to_vec(),
            additional_authenticated_data: aad.to_vec(),
            ..Default::default()
        };

        let response = client
            .encrypt(req, None)
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("KMS encrypt failed: {}", e)))?;

        Ok(BASE64.encode(response.ciphertext))
    }

    /// Decrypt base64 ciphertext that was encrypted with the same `aad`.
    pub async fn decrypt(&self, ciphertext_b64: &str, aad: &[u8]) -> Result<String, AppError> {
        use google_cloud_googleapis::cloud::kms::v1::DecryptRequest;

        let ciphertext = BASE64
            .decode(ciphertext_b64)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Base64 decode failed: {}", e)))?;

        #[cfg(debug_assertions)]
        {
            if self.client.is_none() {
                let decoded = String::from_utf8(ciphertext).map_err(|e| {
                    AppError::Internal(anyhow::anyhow!("UTF-8 decode failed (mock): {}", e))
                })?;
                return match decoded.split_once('|') {
                    Some((tag, plaintext)) if tag == BASE64.encode(aad) => {
                        Ok(plaintext.to_string())
                    }
                    _ => Err(AppError::Internal(anyhow::anyhow!(
                        "KMS decrypt failed (mock): AAD mismatch"
                    ))),
                };
            }
        }

        let client = self
            .client
            .as_ref()
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("KMS client not connected")))?;

        let req = DecryptRequest {
            name: self.key_path.clone(),
            ciphertext,
            additional_authenticated_data: aad.to_vec(),
            ..Default::default()
        };

        let response = client
            .decrypt(req, None)
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("KMS decrypt failed: {}", e)))?;

        String::from_utf8(response.plaintext)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("UTF-8 decode failed: {}", e)))
    }
}

fn credentials_aad(user_id: &str) -> Vec<u8> {
    format!("user_id:{}", user_id).into_bytes()
}

/// Encrypt a user's cookies before storing them.
pub async fn encrypt_credentials(
    kms: &KmsService,
    user_id: &str,
    credentials: &HoyolabCredentials,
) -> Result<String, AppError> {
    let json = serde_json::to_string(credentials)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Credential encode failed: {}", e)))?;
    kms.encrypt(&json, &credentials_aad(user_id)).await
}

/// Decrypt a user's stored cookie bundle.
///
/// An empty bundle (credentials never saved) decrypts to blank credentials.
pub async fn decrypt_credentials(
    kms: &KmsService,
    user_id: &str,
    encrypted: &str,
) -> Result<HoyolabCredentials, AppError> {
    if encrypted.is_empty() {
        return Ok(HoyolabCredentials::default());
    }

    let json = kms.decrypt(encrypted, &credentials_aad(user_id)).await?;
    serde_json::from_str(&json)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Credential decode failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> HoyolabCredentials {
        HoyolabCredentials {
            cookie_token_v2: "ct".to_string(),
            account_mid_v2: "mid".to_string(),
            account_id_v2: "42".to_string(),
            ltoken_v2: "lt".to_string(),
            ltuid_v2: "42".to_string(),
        }
    }

    #[tokio::test]
    async fn test_credentials_bundle_roundtrip() {
        let kms = KmsService::new_mock();

        let encrypted = encrypt_credentials(&kms, "user-1", &sample()).await.unwrap();
        assert!(!encrypted.contains("cookie_token_v2"));

        let decrypted = decrypt_credentials(&kms, "user-1", &encrypted).await.unwrap();
        assert_eq!(decrypted.ltoken_v2, "lt");
        assert_eq!(decrypted.account_mid_v2, "mid");
    }

    #[tokio::test]
    async fn test_credentials_bound_to_user() {
        let kms = KmsService::new_mock();

        let encrypted = encrypt_credentials(&kms, "user-1", &sample()).await.unwrap();
        let result = decrypt_credentials(&kms, "user-2", &encrypted).await;

        assert!(result.is_err(), "Bundle must not decrypt for another user");
    }

    #[tokio::test]
    async fn test_empty_bundle_is_blank_credentials() {
        let kms = KmsService::new_mock();

        let creds = decrypt_credentials(&kms, "user-1", "").await.unwrap();
        assert_eq!(creds.missing_fields("act").len(), 5);
    }
}
