//! Object storage (`storage/v1`) operations.

use reqwest::Method;
use tracing::instrument;
use url::Url;

use super::types::UploadResponse;
use super::{SupabaseClient, SupabaseError};
use crate::models::AuthSession;

impl SupabaseClient {
    /// Upload an object into the configured bucket.
    ///
    /// Returns the object key reported by the server (`bucket/path`).
    ///
    /// # Errors
    ///
    /// Returns an error if the upload is refused, for example when an object
    /// already exists at `object_path`.
    #[instrument(skip(self, bytes, session), fields(bucket = %self.storage_bucket(), size = bytes.len()))]
    pub async fn upload_object(
        &self,
        object_path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        session: Option<&AuthSession>,
    ) -> Result<String, SupabaseError> {
        let url = self.endpoint(&format!(
            "storage/v1/object/{}/{object_path}",
            self.storage_bucket()
        ))?;

        let request = self
            .request(Method::POST, url, session)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes);

        let response: UploadResponse = self.send_json(request).await?;
        Ok(response
            .key
            .unwrap_or_else(|| format!("{}/{object_path}", self.storage_bucket())))
    }

    /// Public URL of an object in the configured bucket.
    ///
    /// # Errors
    ///
    /// Returns an error if `object_path` does not form a valid URL.
    pub fn public_url(&self, object_path: &str) -> Result<Url, SupabaseError> {
        self.endpoint(&format!(
            "storage/v1/object/public/{}/{object_path}",
            self.storage_bucket()
        ))
    }
}
