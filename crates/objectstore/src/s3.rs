//! S3-compatible remote backend via multi-part upload (§4.1).
//!
//! Speaks the subset of the S3 REST API needed for multi-part upload against
//! any S3-compatible endpoint (bucket name + base URL configured by the
//! operator). Authentication/signing is the deployment's concern (e.g. an
//! ingress that injects credentials) and is out of scope for this crate,
//! matching how the spec treats SSL/cert issuance as an external
//! collaborator (§1).

use errors::ObjectStoreError;
use tokio::io::{AsyncRead, AsyncReadExt};

const PART_SIZE: usize = 8 * 1024 * 1024;

pub struct S3CompatibleStore {
    client: reqwest::Client,
    endpoint: String,
    bucket: String
}

impl S3CompatibleStore {
    #[must_use]
    pub fn new(endpoint: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            bucket: bucket.into()
        }
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.endpoint.trim_end_matches('/'), self.bucket, key)
    }

    async fn initiate_multipart(&self, key: &str) -> Result<String, ObjectStoreError> {
        let resp = self
            .client
            .post(format!("{}?uploads", self.object_url(key)))
            .send()
            .await
            .map_err(|e| ObjectStoreError::Remote { reason: e.to_string() })?;
        if !resp.status().is_success() {
            return Err(ObjectStoreError::Remote {
                reason: format!("initiate multipart upload failed: {}", resp.status())
            });
        }
        let body = resp.text().await.map_err(|e| ObjectStoreError::Remote { reason: e.to_string() })?;
        extract_upload_id(&body).ok_or_else(|| ObjectStoreError::Remote {
            reason: "no UploadId in initiate response".to_string()
        })
    }

    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: u32,
        data: Vec<u8>
    ) -> Result<String, ObjectStoreError> {
        let resp = self
            .client
            .put(format!(
                "{}?partNumber={part_number}&uploadId={upload_id}",
                self.object_url(key)
            ))
            .body(data)
            .send()
            .await
            .map_err(|e| ObjectStoreError::Remote { reason: e.to_string() })?;
        if !resp.status().is_success() {
            return Err(ObjectStoreError::Remote {
                reason: format!("upload part {part_number} failed: {}", resp.status())
            });
        }
        resp.headers()
            .get("ETag")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| ObjectStoreError::Remote {
                reason: "upload part response missing ETag".to_string()
            })
    }

    async fn complete_multipart(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[(u32, String)]
    ) -> Result<(), ObjectStoreError> {
        let mut body = String::from("<CompleteMultipartUpload>");
        for (number, etag) in parts {
            body.push_str(&format!("<Part><PartNumber>{number}</PartNumber><ETag>{etag}</ETag></Part>"));
        }
        body.push_str("</CompleteMultipartUpload>");

        let resp = self
            .client
            .post(format!("{}?uploadId={upload_id}", self.object_url(key)))
            .body(body)
            .send()
            .await
            .map_err(|e| ObjectStoreError::Remote { reason: e.to_string() })?;
        if !resp.status().is_success() {
            return Err(ObjectStoreError::Remote {
                reason: format!("complete multipart upload failed: {}", resp.status())
            });
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl core::ObjectStore for S3CompatibleStore {
    async fn put(
        &self,
        reader: &mut (dyn AsyncRead + Send + Unpin),
        logical_name: &str
    ) -> Result<String, ObjectStoreError> {
        let key = format!("{}_{}", chrono::Utc::now().timestamp(), logical_name);
        let upload_id = self.initiate_multipart(&key).await?;

        let mut parts = Vec::new();
        let mut part_number: u32 = 1;
        loop {
            let mut buf = vec![0u8; PART_SIZE];
            let mut filled = 0;
            while filled < buf.len() {
                let n = reader
                    .read(&mut buf[filled..])
                    .await
                    .map_err(|e| ObjectStoreError::Io { reason: e.to_string() })?;
                if n == 0 {
                    break;
                }
                filled += n;
            }
            if filled == 0 {
                break;
            }
            buf.truncate(filled);
            let etag = self.upload_part(&key, &upload_id, part_number, buf).await?;
            parts.push((part_number, etag));
            part_number += 1;
            if filled < PART_SIZE {
                break;
            }
        }

        self.complete_multipart(&key, &upload_id, &parts).await?;
        Ok(key)
    }

    async fn open_reader(
        &self,
        stored_ref: &str
    ) -> Result<Box<dyn AsyncRead + Send + Unpin>, ObjectStoreError> {
        let resp = self
            .client
            .get(self.object_url(stored_ref))
            .send()
            .await
            .map_err(|e| ObjectStoreError::Remote { reason: e.to_string() })?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ObjectStoreError::NotFound {
                stored_ref: stored_ref.to_string()
            });
        }
        if !resp.status().is_success() {
            return Err(ObjectStoreError::Remote {
                reason: format!("get object failed: {}", resp.status())
            });
        }
        let bytes = resp.bytes().await.map_err(|e| ObjectStoreError::Remote { reason: e.to_string() })?;
        Ok(Box::new(std::io::Cursor::new(bytes.to_vec())))
    }

    async fn delete(&self, stored_ref: &str) -> Result<(), ObjectStoreError> {
        let resp = self
            .client
            .delete(self.object_url(stored_ref))
            .send()
            .await
            .map_err(|e| ObjectStoreError::Remote { reason: e.to_string() })?;
        if resp.status().is_success() || resp.status() == reqwest::StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(ObjectStoreError::Remote {
                reason: format!("delete object failed: {}", resp.status())
            })
        }
    }

    async fn size(&self, stored_ref: &str) -> Result<u64, ObjectStoreError> {
        let resp = self
            .client
            .head(self.object_url(stored_ref))
            .send()
            .await
            .map_err(|e| ObjectStoreError::Remote { reason: e.to_string() })?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ObjectStoreError::NotFound {
                stored_ref: stored_ref.to_string()
            });
        }
        resp.headers()
            .get("Content-Length")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| ObjectStoreError::Remote {
                reason: "missing Content-Length".to_string()
            })
    }
}

/// Pulls `<UploadId>...</UploadId>` out of the initiate-multipart-upload XML
/// response without pulling in a full XML parser dependency.
fn extract_upload_id(xml: &str) -> Option<String> {
    let start = xml.find("<UploadId>")? + "<UploadId>".len();
    let end = xml[start..].find("</UploadId>")? + start;
    Some(xml[start..end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_upload_id_from_response_body() {
        let xml = "<InitiateMultipartUploadResult><Bucket>b</Bucket><Key>k</Key><UploadId>abc-123</UploadId></InitiateMultipartUploadResult>";
        assert_eq!(extract_upload_id(xml), Some("abc-123".to_string()));
    }

    #[test]
    fn missing_upload_id_is_none() {
        assert_eq!(extract_upload_id("<Foo/>"), None);
    }
}
