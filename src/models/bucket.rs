//! The four logical collections an archive record can live in.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

/// Which collection currently holds an archive record.
///
/// A record's bucket is structural: it is the collection the row lives in,
/// never a field on the record itself. Changing bucket always means writing a
/// copy into the target collection and deleting the source row.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ArchiveBucket {
    #[serde(rename = "officialArchives")]
    Official,
    #[serde(rename = "communityArchives")]
    Community,
    #[serde(rename = "deletedOfficialArchives")]
    DeletedOfficial,
    #[serde(rename = "deletedCommunityArchives")]
    DeletedCommunity,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown archive bucket `{0}`")]
pub struct UnknownBucket(pub String);

impl ArchiveBucket {
    pub const ALL: [ArchiveBucket; 4] = [
        ArchiveBucket::Official,
        ArchiveBucket::Community,
        ArchiveBucket::DeletedOfficial,
        ArchiveBucket::DeletedCommunity,
    ];

    /// Collection name used as the storage key and in URLs.
    pub fn collection_name(self) -> &'static str {
        match self {
            ArchiveBucket::Official => "officialArchives",
            ArchiveBucket::Community => "communityArchives",
            ArchiveBucket::DeletedOfficial => "deletedOfficialArchives",
            ArchiveBucket::DeletedCommunity => "deletedCommunityArchives",
        }
    }

    pub fn is_deleted(self) -> bool {
        matches!(
            self,
            ArchiveBucket::DeletedOfficial | ArchiveBucket::DeletedCommunity
        )
    }

    /// Target of the generic move trigger.
    ///
    /// Live buckets swap with each other; deleted buckets restore to the
    /// bucket they were deleted from.
    pub fn move_target(self) -> ArchiveBucket {
        match self {
            ArchiveBucket::Community => ArchiveBucket::Official,
            ArchiveBucket::Official => ArchiveBucket::Community,
            ArchiveBucket::DeletedCommunity => ArchiveBucket::Community,
            ArchiveBucket::DeletedOfficial => ArchiveBucket::Official,
        }
    }

    /// Target of a soft delete. `None` for buckets that are already deleted.
    pub fn soft_delete_target(self) -> Option<ArchiveBucket> {
        match self {
            ArchiveBucket::Community => Some(ArchiveBucket::DeletedCommunity),
            ArchiveBucket::Official => Some(ArchiveBucket::DeletedOfficial),
            ArchiveBucket::DeletedCommunity | ArchiveBucket::DeletedOfficial => None,
        }
    }

    /// Target of a restore. `None` for live buckets.
    pub fn restore_target(self) -> Option<ArchiveBucket> {
        if self.is_deleted() {
            Some(self.move_target())
        } else {
            None
        }
    }
}

impl fmt::Display for ArchiveBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.collection_name())
    }
}

impl FromStr for ArchiveBucket {
    type Err = UnknownBucket;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ArchiveBucket::ALL
            .into_iter()
            .find(|bucket| bucket.collection_name() == s)
            .ok_or_else(|| UnknownBucket(s.to_string()))
    }
}
