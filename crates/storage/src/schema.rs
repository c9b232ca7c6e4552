use sqlx::PgPool;

use crate::error::StorageError;

/// Idempotent `CREATE TABLE IF NOT EXISTS` schema bootstrap, grouped per
/// entity. Real deployments are expected to run this once against a fresh
/// database (there is no separate migrations runner in this workspace).
pub async fn initialize_schema(pool: &PgPool) -> Result<(), StorageError> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS principals (
            id UUID PRIMARY KEY,
            handle TEXT NOT NULL UNIQUE,
            email TEXT NOT NULL,
            role TEXT NOT NULL,
            password_verifier TEXT NOT NULL,
            quota_bytes BIGINT NOT NULL,
            used_bytes BIGINT NOT NULL DEFAULT 0,
            quota_grace BOOLEAN NOT NULL DEFAULT FALSE,
            active BOOLEAN NOT NULL DEFAULT TRUE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            last_login_at TIMESTAMPTZ
        )"
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS sessions (
            id UUID PRIMARY KEY,
            principal_id UUID NOT NULL REFERENCES principals(id),
            token_fingerprint TEXT NOT NULL UNIQUE,
            expires_at TIMESTAMPTZ NOT NULL,
            issued_ip TEXT NOT NULL,
            user_agent TEXT NOT NULL
        )"
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_sessions_principal ON sessions(principal_id)")
        .execute(pool)
        .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS log_files (
            id UUID PRIMARY KEY,
            principal_id UUID NOT NULL REFERENCES principals(id),
            stored_path TEXT,
            original_name TEXT NOT NULL,
            size_bytes BIGINT NOT NULL,
            content_sha256 TEXT NOT NULL,
            pinned BOOLEAN NOT NULL DEFAULT FALSE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            soft_deleted_at TIMESTAMPTZ,
            hard_deleted_at TIMESTAMPTZ
        )"
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_log_files_principal ON log_files(principal_id)")
        .execute(pool)
        .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS analyses (
            id UUID PRIMARY KEY,
            principal_id UUID NOT NULL REFERENCES principals(id),
            log_file_id UUID NOT NULL REFERENCES log_files(id),
            mode_keys JSONB NOT NULL,
            timezone TEXT NOT NULL,
            window_start TIMESTAMPTZ,
            window_end TIMESTAMPTZ,
            status TEXT NOT NULL,
            progress_pct SMALLINT NOT NULL DEFAULT 0,
            started_at TIMESTAMPTZ,
            finished_at TIMESTAMPTZ,
            duration_ms BIGINT,
            error_kind TEXT,
            error_message TEXT,
            session_label TEXT,
            external_ref TEXT,
            cancel_requested BOOLEAN NOT NULL DEFAULT FALSE,
            source_deleted BOOLEAN NOT NULL DEFAULT FALSE
        )"
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_analyses_principal ON analyses(principal_id)")
        .execute(pool)
        .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS analysis_results (
            analysis_id UUID NOT NULL REFERENCES analyses(id),
            mode_key TEXT NOT NULL,
            raw_text_ref TEXT,
            structured_payload JSONB NOT NULL,
            schema_version INTEGER NOT NULL,
            produced_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            PRIMARY KEY (analysis_id, mode_key)
        )"
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS retention_policies (
            scope TEXT NOT NULL,
            scope_id TEXT NOT NULL DEFAULT '',
            soft_after_days INTEGER NOT NULL,
            hard_after_soft_days INTEGER NOT NULL,
            PRIMARY KEY (scope, scope_id)
        )"
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS parser_descriptors (
            mode_key TEXT PRIMARY KEY,
            display_name TEXT NOT NULL,
            description TEXT NOT NULL,
            enabled BOOLEAN NOT NULL DEFAULT TRUE,
            visible_to_users BOOLEAN NOT NULL DEFAULT TRUE,
            admin_only BOOLEAN NOT NULL DEFAULT FALSE
        )"
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS parser_permissions (
            principal_id UUID NOT NULL REFERENCES principals(id),
            mode_key TEXT NOT NULL,
            allow BOOLEAN NOT NULL,
            PRIMARY KEY (principal_id, mode_key)
        )"
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS audit_events (
            id BIGSERIAL PRIMARY KEY,
            principal_id UUID REFERENCES principals(id),
            at TIMESTAMPTZ NOT NULL DEFAULT now(),
            action TEXT NOT NULL,
            entity_kind TEXT,
            entity_id TEXT,
            ip TEXT NOT NULL,
            geo JSONB,
            user_agent TEXT NOT NULL,
            outcome TEXT NOT NULL,
            detail_json JSONB NOT NULL DEFAULT '{}'
        )"
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_audit_events_at ON audit_events(at)")
        .execute(pool)
        .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS deletion_log (
            id BIGSERIAL PRIMARY KEY,
            log_file_id UUID NOT NULL REFERENCES log_files(id),
            sweep_kind TEXT NOT NULL,
            actor TEXT NOT NULL,
            at TIMESTAMPTZ NOT NULL DEFAULT now()
        )"
    )
    .execute(pool)
    .await?;

    Ok(())
}
