use chrono::{DateTime, Utc};

/// One archive member: name and modification time. §4.2 requires reading
/// this metadata without decompressing member bodies where the format
/// allows it (zip's central directory makes this exact; tar formats require
/// streaming past each body, but never materializing it).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveMember {
    pub name: String,
    pub mtime: DateTime<Utc>
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveStat {
    pub member_count: usize,
    pub earliest_mtime: Option<DateTime<Utc>>,
    pub latest_mtime: Option<DateTime<Utc>>
}

impl ArchiveStat {
    #[must_use]
    pub fn from_members(members: &[ArchiveMember]) -> Self {
        let earliest = members.iter().map(|m| m.mtime).min();
        let latest = members.iter().map(|m| m.mtime).max();
        Self {
            member_count: members.len(),
            earliest_mtime: earliest,
            latest_mtime: latest
        }
    }
}
