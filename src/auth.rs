use google_sheets4::{hyper, hyper_rustls, oauth2, Sheets};
use tracing::{debug, info};

use crate::error::{Result, SyncError};

pub type SheetsHub = Sheets<hyper_rustls::HttpsConnector<hyper::client::HttpConnector>>;

/// Builds a Sheets hub authenticated as the service account in `key_path`.
pub async fn create_sheets_hub(key_path: &str) -> Result<SheetsHub> {
    info!("Initializing Google Sheets authentication");

    let key = oauth2::read_service_account_key(key_path)
        .await
        .map_err(|e| SyncError::Auth(format!("failed to read service account key '{}': {}", key_path, e)))?;
    debug!("Loaded service account {}", key.client_email);

    let auth = oauth2::ServiceAccountAuthenticator::builder(key)
        .build()
        .await
        .map_err(|e| SyncError::Auth(format!("failed to build authenticator: {}", e)))?;

    let https = hyper_rustls::HttpsConnectorBuilder::new()
        .with_native_roots()
        .https_or_http()
        .enable_http1()
        .build();
    let client = hyper::Client::builder().build(https);

    Ok(Sheets::new(client, auth))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_key_file_is_an_auth_error() {
        let err = create_sheets_hub("does/not/exist.json").await.err().expect("should fail");
        assert!(matches!(err, SyncError::Auth(ref msg) if msg.contains("does/not/exist.json")));
    }

    #[tokio::test]
    async fn malformed_key_file_is_an_auth_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("key.json");
        std::fs::write(&path, "{\"type\": \"service_account\"}").unwrap();

        let err = create_sheets_hub(path.to_str().unwrap()).await.err().expect("should fail");

        assert!(matches!(err, SyncError::Auth(_)));
    }
}
