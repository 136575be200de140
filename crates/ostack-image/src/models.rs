//! Glance v2 image models.

use chrono::{DateTime, Utc};
use ostack_core::query::{PageRequest, Paged, QueryParams};
use ostack_core::uuid::ImageId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Parameters supported by the `/v2/images` list endpoint.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImageListParams {
    /// Filter by exact name.
    pub name: Option<String>,
    /// Filter by status.
    pub status: Option<ImageStatus>,
    /// Filter by visibility (`public`, `private`, `shared`, `community`).
    pub visibility: Option<String>,
}

impl ImageListParams {
    /// Convert the parameters and a page cursor into URL query pairs.
    #[must_use]
    pub fn to_pairs(&self, page: &PageRequest) -> Vec<(&'static str, String)> {
        let mut params = QueryParams::new();
        params.push_opt("name", self.name.as_deref());
        params.push_opt("status", self.status);
        params.push_opt("visibility", self.visibility.as_deref());
        params.push_page(page);
        params.into_pairs()
    }
}

/// Image upload and lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ImageStatus {
    /// Record exists, no data yet
    Queued,
    /// Data upload in progress
    Saving,
    /// Usable
    Active,
    /// Upload failed
    Killed,
    /// Deleted
    Deleted,
    /// Scheduled for deletion
    PendingDelete,
    /// Deactivated by an administrator
    Deactivated,
    /// Data staged, not yet imported
    Uploading,
    /// Import in progress
    Importing,
    /// Any status this client does not know about
    #[default]
    #[serde(other)]
    Unknown,
}

impl ImageStatus {
    /// The status as Glance spells it.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Saving => "saving",
            Self::Active => "active",
            Self::Killed => "killed",
            Self::Deleted => "deleted",
            Self::PendingDelete => "pending_delete",
            Self::Deactivated => "deactivated",
            Self::Uploading => "uploading",
            Self::Importing => "importing",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ImageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Representation of an image as returned by Glance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Image {
    /// Image id.
    pub id: ImageId,
    /// Image name; Glance allows unnamed images.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Lifecycle status.
    #[serde(default)]
    pub status: ImageStatus,
    /// Visibility scope.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<String>,
    /// Disk format, e.g. `qcow2`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk_format: Option<String>,
    /// Container format, e.g. `bare`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_format: Option<String>,
    /// Size in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Minimum disk in GiB.
    #[serde(default)]
    pub min_disk: u64,
    /// Minimum memory in MiB.
    #[serde(default)]
    pub min_ram: u64,
    /// Creation timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Tags.
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Image {
    /// The name, or an empty string for unnamed images.
    #[must_use]
    pub fn name_or_empty(&self) -> &str {
        self.name.as_deref().unwrap_or_default()
    }
}

impl Paged for Image {
    fn marker(&self) -> String {
        self.id.to_string()
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ImagesEnvelope {
    pub images: Vec<Image>,
}
