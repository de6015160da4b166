use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};
use uuid::Uuid;

pub const OCTET_STREAM: &str = "application/octet-stream";
pub const SERVER_VERSION: &str = "1.2.0";

/// A catalog entry. Fields added after the first revision of the store carry
/// serde defaults so older documents still load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub image: String,
    pub file_id: Uuid,
    pub file_path: String,
    pub original_file_name: String,
    #[serde(default = "default_file_type")]
    pub file_type: String,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub downloads: u64,
    #[serde(default = "default_author")]
    pub author: String,
    #[serde(default = "default_version")]
    pub version: String,
}

/// Accepts RFC 3339 timestamps as well as offset-less ISO-8601 ones
/// (`2024-05-01T12:34:56.789012`), which are read as UTC.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(timestamp.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| de::Error::custom(format!("invalid timestamp {:?}: {}", raw, e)))
}

fn default_file_type() -> String {
    OCTET_STREAM.to_string()
}

fn default_author() -> String {
    "Anonymous".to_string()
}

fn default_version() -> String {
    "1.0.0".to_string()
}

#[derive(Debug, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub image: String,
    pub file_path: String,
    pub original_file_name: String,
    pub description: Option<String>,
    pub file_type: Option<String>,
    pub author: Option<String>,
    pub version: Option<String>,
}

impl NewProduct {
    pub fn into_product(self) -> Product {
        Product {
            id: Uuid::new_v4(),
            name: self.name,
            description: self.description.unwrap_or_default(),
            image: self.image,
            file_id: Uuid::new_v4(),
            file_path: self.file_path,
            original_file_name: self.original_file_name,
            file_type: self.file_type.unwrap_or_else(default_file_type),
            created_at: Utc::now(),
            downloads: 0,
            author: self.author.unwrap_or_else(default_author),
            version: self.version.unwrap_or_else(default_version),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreatedResponse {
    pub status: &'static str,
    pub redirect: &'static str,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub total_products: usize,
    pub last_updated: DateTime<Utc>,
    pub server_version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub status: &'static str,
    pub filename: String,
    pub filepath: String,
    pub original_filename: String,
    pub file_type: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Image,
    /// Roblox place file, only `.rbxl` names are accepted
    File,
}

impl UploadKind {
    pub const ASSET_EXTENSION: &'static str = ".rbxl";

    pub fn accepts(self, filename: &str) -> bool {
        match self {
            UploadKind::Image => true,
            UploadKind::File => filename
                .to_lowercase()
                .ends_with(Self::ASSET_EXTENSION),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UploadKind::Image => "image",
            UploadKind::File => "file",
        }
    }
}
