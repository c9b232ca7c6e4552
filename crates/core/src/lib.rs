//! Shared domain types and trait boundaries for the log-ingestion platform.
//!
//! Every entity in spec §3 (Principal, Session, ParserDescriptor,
//! ParserPermission, LogFile, Analysis, AnalysisResult, RetentionPolicy,
//! AuditEvent, RateBucket) lives here so that `storage`, `jobs`, `auth`, and
//! `api` all speak the same vocabulary instead of each defining their own.

pub mod analysis;
pub mod audit_event;
pub mod ids;
pub mod log_file;
pub mod parser_descriptor;
pub mod principal;
pub mod rate_bucket;
pub mod retention_policy;
pub mod session;
pub mod traits;

pub use analysis::{Analysis, AnalysisErrorKind, AnalysisResult, AnalysisStatus};
pub use audit_event::{AuditEvent, AuditOutcome, GeoLocation};
pub use ids::{AnalysisId, AuditEventId, LogFileId, PrincipalId, SessionId};
pub use log_file::LogFile;
pub use parser_descriptor::{ParserDescriptor, ParserPermission};
pub use principal::{Principal, Role};
pub use rate_bucket::{RateBucket, RateLimitIdentity, RouteClass};
pub use retention_policy::{PolicyScope, RetentionPolicy};
pub use session::Session;
pub use traits::ObjectStore;
