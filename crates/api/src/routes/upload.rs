//! `POST /upload` and `GET /download-progress` (§4.4, §4.9).
//!
//! Both the multipart `file` field and a `file_url` source are streamed
//! through the same hashing, size-capping copy into a scratch file before
//! `archive::stat` validates the result and `object_store.put` makes it
//! permanent — one code path regardless of where the bytes came from, the
//! same way `jobs::JobCoordinator::materialize` treats every stored
//! archive as "copy to a local path, then operate on it".

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Multipart, State};
use axum::Json;
use core::ids::LogFileId;
use core::log_file::LogFile;
use core::rate_bucket::{RateLimitIdentity, RouteClass};
use errors::{CoreError, ErrorKind};
use futures_util::TryStreamExt;
use ratelimit::Decision;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio_util::io::StreamReader;

use crate::auth_mw::AuthContext;
use crate::error::ApiError;
use crate::state::AppState;

struct ParsedUpload {
    file_bytes: Option<Vec<u8>>,
    file_name: Option<String>,
    file_url: Option<String>,
    mode_keys: Vec<String>,
    timezone: String,
    window_start: Option<chrono::DateTime<chrono::Utc>>,
    window_end: Option<chrono::DateTime<chrono::Utc>>,
    session_label: Option<String>,
    external_ref: Option<String>
}

async fn parse_multipart(mut multipart: Multipart) -> Result<ParsedUpload, ApiError> {
    let mut parsed = ParsedUpload {
        file_bytes: None,
        file_name: None,
        file_url: None,
        mode_keys: Vec::new(),
        timezone: "UTC".to_string(),
        window_start: None,
        window_end: None,
        session_label: None,
        external_ref: None
    };

    while let Some(field) = multipart.next_field().await.map_err(|e| ApiError(CoreError::input_invalid(e.to_string())))? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                parsed.file_name = field.file_name().map(str::to_string);
                let bytes = field.bytes().await.map_err(|e| ApiError(CoreError::input_invalid(e.to_string())))?;
                parsed.file_bytes = Some(bytes.to_vec());
            }
            "file_url" => {
                parsed.file_url = Some(field.text().await.map_err(|e| ApiError(CoreError::input_invalid(e.to_string())))?);
            }
            "modes" => {
                let value = field.text().await.map_err(|e| ApiError(CoreError::input_invalid(e.to_string())))?;
                parsed.mode_keys.push(value);
            }
            "timezone" => {
                parsed.timezone = field.text().await.map_err(|e| ApiError(CoreError::input_invalid(e.to_string())))?;
            }
            "window_start" => {
                let value = field.text().await.map_err(|e| ApiError(CoreError::input_invalid(e.to_string())))?;
                parsed.window_start = Some(
                    chrono::DateTime::parse_from_rfc3339(&value)
                        .map_err(|e| ApiError(CoreError::input_invalid(format!("invalid window_start: {e}"))))?
                        .with_timezone(&chrono::Utc)
                );
            }
            "window_end" => {
                let value = field.text().await.map_err(|e| ApiError(CoreError::input_invalid(e.to_string())))?;
                parsed.window_end = Some(
                    chrono::DateTime::parse_from_rfc3339(&value)
                        .map_err(|e| ApiError(CoreError::input_invalid(format!("invalid window_end: {e}"))))?
                        .with_timezone(&chrono::Utc)
                );
            }
            "session_label" => {
                parsed.session_label = Some(field.text().await.map_err(|e| ApiError(CoreError::input_invalid(e.to_string())))?);
            }
            "external_ref" => {
                parsed.external_ref = Some(field.text().await.map_err(|e| ApiError(CoreError::input_invalid(e.to_string())))?);
            }
            _ => {}
        }
    }

    Ok(parsed)
}

/// Copies `reader` into `dest`, hashing as it goes and failing once `max_bytes`
/// is exceeded. On any failure the partial scratch file is removed (§4.9 "the
/// partial file is deleted").
async fn stream_to_scratch(
    mut reader: impl AsyncRead + Unpin,
    dest: &Path,
    max_bytes: u64
) -> Result<(u64, String), CoreError> {
    let mut file = tokio::fs::File::create(dest).await.map_err(|e| CoreError::internal(e.to_string()))?;
    let mut hasher = Sha256::new();
    let mut total: u64 = 0;
    let mut buf = vec![0u8; 64 * 1024];

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                let _ = tokio::fs::remove_file(dest).await;
                return Err(CoreError::internal(e.to_string()));
            }
        };
        total += n as u64;
        if total > max_bytes {
            drop(file);
            let _ = tokio::fs::remove_file(dest).await;
            return Err(CoreError::new(ErrorKind::SizeExceeded, "upload exceeds the maximum allowed size"));
        }
        hasher.update(&buf[..n]);
        if let Err(e) = file.write_all(&buf[..n]).await {
            drop(file);
            let _ = tokio::fs::remove_file(dest).await;
            return Err(CoreError::internal(e.to_string()));
        }
    }

    if let Err(e) = file.sync_all().await {
        let _ = tokio::fs::remove_file(dest).await;
        return Err(CoreError::internal(e.to_string()));
    }

    Ok((total, hex::encode(hasher.finalize())))
}

/// Trims a `file_url` field and enforces the §6 field contract: it must
/// start with `http://` or `https://` once trailing backslashes and
/// whitespace are stripped.
fn validate_file_url(raw: &str) -> Result<String, ApiError> {
    let trimmed = raw.trim().trim_end_matches('\\').trim().to_string();
    if !trimmed.starts_with("http://") && !trimmed.starts_with("https://") {
        return Err(ApiError(CoreError::input_invalid("file_url must start with http:// or https://")));
    }
    Ok(trimmed)
}

/// Derives the filename from a validated `file_url`'s last path component,
/// with any `?query` suffix stripped (§6).
fn original_name_from_url(url: &str) -> String {
    let without_query = url.split('?').next().unwrap_or(url);
    without_query.rsplit('/').next().filter(|s| !s.is_empty()).unwrap_or("upload").to_string()
}

async fn fetch_url_to_scratch(
    state: &AppState,
    principal_id: core::ids::PrincipalId,
    url: &str,
    dest: &Path,
    max_bytes: u64
) -> Result<(u64, String), ApiError> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(state.config.http.url_fetch_timeout_secs))
        .build()
        .map_err(|e| ApiError(CoreError::internal(e.to_string())))?;

    let response = client.get(url).send().await.map_err(|e| {
        let fetch_err = if e.is_timeout() {
            errors::UrlFetchError::Timeout
        } else if e.is_connect() {
            errors::UrlFetchError::ConnectionRefused
        } else {
            errors::UrlFetchError::InvalidUrl { reason: "request could not be sent".to_string() }
        };
        ApiError(CoreError::from(fetch_err))
    })?;

    if !response.status().is_success() {
        let fetch_err = match response.status().as_u16() {
            401 | 403 => errors::UrlFetchError::AccessDenied,
            404 => errors::UrlFetchError::NotFound,
            _ => errors::UrlFetchError::InvalidUrl { reason: "upstream returned an error".to_string() }
        };
        return Err(ApiError(CoreError::from(fetch_err)));
    }

    let total_hint = response.content_length();
    state.progress.start(principal_id, total_hint);

    let stream = response.bytes_stream().map_err(std::io::Error::other);
    let reader = StreamReader::new(stream);

    let result = stream_to_scratch(reader, dest, max_bytes).await;
    state.progress.finish(principal_id);
    result.map_err(ApiError::from)
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub analysis_id: core::ids::AnalysisId
}

pub async fn upload(State(state): State<AppState>, ctx: AuthContext, multipart: Multipart) -> Result<Json<UploadResponse>, ApiError> {
    let identity = RateLimitIdentity::Principal(ctx.principal.id.to_string());
    if let Decision::Denied { .. } = state.rate_limiter.check(&identity, RouteClass::Upload).await {
        return Err(ApiError(CoreError::new(ErrorKind::RateLimited, "too many uploads")));
    }

    let parsed = parse_multipart(multipart).await?;
    if parsed.mode_keys.is_empty() {
        return Err(ApiError(CoreError::input_invalid("at least one mode must be selected")));
    }

    let scratch_dir = std::path::PathBuf::from(&state.config.object_store.scratch_dir);
    tokio::fs::create_dir_all(&scratch_dir).await.map_err(|e| ApiError(CoreError::internal(e.to_string())))?;
    let scratch_path = scratch_dir.join(format!("{}.upload", uuid::Uuid::new_v4()));
    let max_bytes = state.config.quota.max_upload_bytes.max(0) as u64;

    let (size_bytes, sha256, original_name) = match (parsed.file_bytes, parsed.file_url) {
        (Some(bytes), _) => {
            let name = parsed.file_name.unwrap_or_else(|| "upload".to_string());
            let reader = std::io::Cursor::new(bytes);
            let (size, hash) = stream_to_scratch(reader, &scratch_path, max_bytes).await.map_err(ApiError::from)?;
            (size, hash, name)
        }
        (None, Some(url)) => {
            let url = validate_file_url(&url)?;
            let (size, hash) = fetch_url_to_scratch(&state, ctx.principal.id, &url, &scratch_path, max_bytes).await?;
            let name = original_name_from_url(&url);
            (size, hash, name)
        }
        (None, None) => return Err(ApiError(CoreError::input_invalid("either a file or a file_url is required")))
    };

    let stat_path = scratch_path.clone();
    let stat_result = tokio::task::spawn_blocking(move || archive::stat(&stat_path))
        .await
        .map_err(|e| ApiError(CoreError::internal(e.to_string())))?;
    if let Err(archive_err) = stat_result {
        let _ = tokio::fs::remove_file(&scratch_path).await;
        return Err(ApiError(CoreError::from(archive_err)));
    }

    let quota_refused = !ctx.principal.has_capacity_for(size_bytes as i64);

    let stored_path = if quota_refused {
        let _ = tokio::fs::remove_file(&scratch_path).await;
        None
    } else {
        let mut scratch_file = tokio::fs::File::open(&scratch_path).await.map_err(|e| ApiError(CoreError::internal(e.to_string())))?;
        let stored_path = state.object_store.put(&mut scratch_file, &original_name).await.map_err(CoreError::from)?;
        drop(scratch_file);
        let _ = tokio::fs::remove_file(&scratch_path).await;
        Some(stored_path)
    };

    let log_file = LogFile {
        id: LogFileId::new(),
        principal_id: ctx.principal.id,
        stored_path,
        original_name,
        size_bytes: size_bytes as i64,
        content_sha256: sha256,
        pinned: false,
        created_at: chrono::Utc::now(),
        soft_deleted_at: None,
        hard_deleted_at: None
    };
    if quota_refused {
        state.repos.log_files.create_without_quota_charge(&log_file).await.map_err(CoreError::from)?;
    } else {
        state.repos.log_files.create_with_quota_charge(&log_file).await.map_err(CoreError::from)?;
    }

    let descriptors = state.repos.parser_descriptors.list_all().await.map_err(CoreError::from)?;
    let mut overrides = std::collections::HashMap::new();
    for mode_key in &parsed.mode_keys {
        if let Some(allow) =
            state.repos.parser_descriptors.get_permission_override(ctx.principal.id, mode_key).await.map_err(CoreError::from)?
        {
            overrides.insert(mode_key.clone(), allow);
        }
    }
    jobs::check_preconditions(&ctx.principal, &log_file, &parsed.mode_keys, &descriptors, &overrides)?;

    let analysis = jobs::submit(
        &state.repos,
        jobs::SubmissionRequest {
            principal: ctx.principal,
            log_file_id: log_file.id,
            mode_keys: parsed.mode_keys,
            timezone: parsed.timezone,
            window_start: parsed.window_start,
            window_end: parsed.window_end,
            session_label: parsed.session_label,
            external_ref: parsed.external_ref,
            quota_refused
        }
    )
    .await?;

    if !quota_refused {
        let coordinator = Arc::clone(&state.coordinator);
        let analysis_id = analysis.id;
        tokio::spawn(async move {
            if let Err(e) = coordinator.run(analysis_id).await {
                tracing::warn!(%analysis_id, error = ?e, "analysis run failed");
            }
        });
    }

    Ok(Json(UploadResponse { analysis_id: analysis.id }))
}

pub async fn download_progress(State(state): State<AppState>, ctx: AuthContext) -> Json<crate::progress::DownloadProgress> {
    Json(state.progress.get(ctx.principal.id))
}
