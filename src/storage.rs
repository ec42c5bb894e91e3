use anyhow::Context;
use async_trait::async_trait;
use aws_config::{defaults, BehaviorVersion};
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    config::{Builder as S3ConfigBuilder, Region},
    Client,
};
use aws_smithy_types::byte_stream::ByteStream;
use bytes::Bytes;
use uuid::Uuid;

#[async_trait]
pub trait StorageClient: Send + Sync {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()>;
    async fn delete_object(&self, key: &str) -> anyhow::Result<()>;
    /// Durable public URL for a stored object.
    fn object_url(&self, key: &str) -> String;

    /// Recover the object key from a URL previously returned by
    /// `object_url`. Returns None for foreign URLs.
    fn key_from_url(&self, url: &str) -> Option<String> {
        url.strip_prefix(&self.object_url(""))
            .filter(|k| !k.is_empty())
            .map(str::to_string)
    }
}

#[derive(Clone)]
pub struct Storage {
    client: Client,
    bucket: String,
    endpoint: String,
}

impl Storage {
    pub async fn new(
        endpoint: &str,
        bucket: &str,
        access_key: &str,
        secret_key: &str,
        region: &str,
    ) -> anyhow::Result<Self> {
        let shared = defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .credentials_provider(Credentials::new(
                access_key, secret_key, None, None, "static",
            ))
            .endpoint_url(endpoint)
            .load()
            .await;

        let conf = S3ConfigBuilder::from(&shared)
            .endpoint_url(endpoint)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: Client::from_conf(conf),
            bucket: bucket.to_string(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl StorageClient for Storage {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .context("s3 put_object")?;
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .context("s3 delete_object")?;
        Ok(())
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.endpoint, self.bucket, key)
    }
}

/// Upload an avatar image under the owning user's prefix and return its
/// durable URL.
pub async fn upload_avatar(
    storage: &dyn StorageClient,
    owner: Uuid,
    body: Bytes,
    content_type: &str,
) -> anyhow::Result<String> {
    let ext = ext_from_mime(content_type)
        .ok_or_else(|| anyhow::anyhow!("unsupported avatar content type {content_type}"))?;
    let key = format!("avatars/{}/{}.{}", owner, Uuid::new_v4(), ext);
    storage
        .put_object(&key, body, content_type)
        .await
        .with_context(|| format!("put_object {key}"))?;
    Ok(storage.object_url(&key))
}

/// Delete the remote object behind a stored avatar URL, if the URL is ours.
pub async fn delete_avatar_by_url(storage: &dyn StorageClient, url: &str) -> anyhow::Result<()> {
    if let Some(key) = storage.key_from_url(url) {
        storage
            .delete_object(&key)
            .await
            .with_context(|| format!("delete_object {key}"))?;
    }
    Ok(())
}

pub fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/heic" => Some("heic"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppState;

    #[test]
    fn test_ext_from_mime() {
        assert_eq!(ext_from_mime("image/jpeg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/jpg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/png"), Some("png"));
        assert_eq!(ext_from_mime("image/webp"), Some("webp"));
        assert_eq!(ext_from_mime("application/octet-stream"), None);
        assert_eq!(ext_from_mime("text/html"), None);
    }

    #[tokio::test]
    async fn upload_avatar_builds_key_under_owner_prefix() {
        let state = AppState::fake();
        let owner = Uuid::new_v4();
        let url = upload_avatar(
            state.storage.as_ref(),
            owner,
            Bytes::from_static(b"img"),
            "image/png",
        )
        .await
        .unwrap();
        assert!(url.starts_with(&format!("https://fake.local/avatars/{owner}/")));
        assert!(url.ends_with(".png"));
    }

    #[tokio::test]
    async fn upload_avatar_rejects_unknown_content_type() {
        let state = AppState::fake();
        let err = upload_avatar(
            state.storage.as_ref(),
            Uuid::new_v4(),
            Bytes::from_static(b"img"),
            "application/pdf",
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("unsupported avatar content type"));
    }

    #[tokio::test]
    async fn key_round_trips_through_url() {
        let state = AppState::fake();
        let url = state.storage.object_url("avatars/abc.jpg");
        assert_eq!(
            state.storage.key_from_url(&url),
            Some("avatars/abc.jpg".to_string())
        );
        assert_eq!(state.storage.key_from_url("https://elsewhere/x.jpg"), None);
    }
}
