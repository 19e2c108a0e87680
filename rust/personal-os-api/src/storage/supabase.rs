//! Supabase storage REST client.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::json;
use url::Url;

use super::ObjectStorage;

#[derive(Debug, Clone)]
pub struct SupabaseStorage {
    client: Client,
    /// `{project}/storage/v1/`
    base: Url,
    service_key: String,
    bucket: String,
}

#[derive(Debug, Deserialize)]
struct SignedUrl {
    #[serde(rename = "signedURL")]
    signed_url: String,
}

impl SupabaseStorage {
    pub fn new(project_url: &str, service_key: impl Into<String>, bucket: impl Into<String>) -> anyhow::Result<Self> {
        let base = Url::parse(&format!("{}/storage/v1/", project_url.trim_end_matches('/')))
            .context("Invalid Supabase project URL")?;
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            base,
            service_key: service_key.into(),
            bucket: bucket.into(),
        })
    }

    /// `{base}/{prefix..}/{bucket}/{path..}` with every segment encoded.
    fn object_url(&self, prefix: &[&str], path: &str) -> anyhow::Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| anyhow::anyhow!("Supabase URL cannot be a base"))?
            .pop_if_empty()
            .extend(prefix)
            .push(&self.bucket)
            .extend(path.split('/').filter(|s| !s.is_empty()));
        Ok(url)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
    }

    async fn check(response: Response, action: &str) -> anyhow::Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        anyhow::bail!("Supabase {action} failed ({status}): {body}")
    }
}

#[async_trait]
impl ObjectStorage for SupabaseStorage {
    async fn upload(&self, path: &str, bytes: Bytes, content_type: &str) -> anyhow::Result<()> {
        let url = self.object_url(&["object"], path)?;
        let response = self
            .authorized(self.client.post(url))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header("x-upsert", "false")
            .body(bytes)
            .send()
            .await
            .context("Supabase upload request failed")?;
        Self::check(response, "upload").await?;
        Ok(())
    }

    async fn sign(&self, path: &str, ttl: Duration) -> anyhow::Result<String> {
        let url = self.object_url(&["object", "sign"], path)?;
        let response = self
            .authorized(self.client.post(url))
            .json(&json!({ "expiresIn": ttl.as_secs() }))
            .send()
            .await
            .context("Supabase sign request failed")?;
        let signed: SignedUrl = Self::check(response, "sign").await?.json().await?;
        // signedURL is relative to the storage root.
        let relative = signed.signed_url.trim_start_matches('/');
        Ok(self.base.join(relative)?.to_string())
    }

    async fn delete(&self, path: &str) -> anyhow::Result<()> {
        let url = self.object_url(&["object"], "")?;
        let response = self
            .authorized(self.client.delete(url))
            .json(&json!({ "prefixes": [path] }))
            .send()
            .await
            .context("Supabase delete request failed")?;
        Self::check(response, "delete").await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "supabase"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage() -> SupabaseStorage {
        SupabaseStorage::new("https://project.supabase.co/", "service-key", "uploads").unwrap()
    }

    #[test]
    fn test_object_urls() {
        let storage = storage();
        assert_eq!(
            storage.object_url(&["object"], "u1/notes/1-a b.md").unwrap().as_str(),
            "https://project.supabase.co/storage/v1/object/uploads/u1/notes/1-a%20b.md"
        );
        assert_eq!(
            storage.object_url(&["object", "sign"], "u1/1-x.pdf").unwrap().as_str(),
            "https://project.supabase.co/storage/v1/object/sign/uploads/u1/1-x.pdf"
        );
        assert_eq!(
            storage.object_url(&["object"], "").unwrap().as_str(),
            "https://project.supabase.co/storage/v1/object/uploads"
        );
    }

    #[test]
    fn test_signed_url_resolves_against_storage_root() {
        let storage = storage();
        let joined = storage
            .base
            .join("object/sign/uploads/u1/1-x.pdf?token=abc")
            .unwrap();
        assert_eq!(
            joined.as_str(),
            "https://project.supabase.co/storage/v1/object/sign/uploads/u1/1-x.pdf?token=abc"
        );
    }

    #[test]
    fn test_rejects_bad_project_url() {
        assert!(SupabaseStorage::new("not a url", "k", "b").is_err());
    }
}
