use chrono::{NaiveDateTime, Weekday};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

// Account models
#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = crate::schema::accounts)]
pub struct Account {
    pub id: i32,
    pub name: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable, Deserialize)]
#[diesel(table_name = crate::schema::accounts)]
pub struct NewAccount {
    pub name: String,
}

// Device models
#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::devices)]
pub struct Device {
    pub id: i32,
    pub account_id: i32,
    pub name: String,
    #[serde(skip_serializing)]
    pub secret_key: String,
    pub status: String,
    pub last_heartbeat: Option<NaiveDateTime>,
    pub booted_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable, Deserialize)]
#[diesel(table_name = crate::schema::devices)]
pub struct NewDevice {
    pub account_id: i32,
    pub name: String,
    pub secret_key: String,
    pub status: String,
}

// Pairing code models
#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = crate::schema::pairing_codes)]
pub struct PairingCode {
    pub id: i32,
    pub account_id: i32,
    pub code: String,
    pub device_name: String,
    pub expires_at: NaiveDateTime,
    pub redeemed_at: Option<NaiveDateTime>,
    pub device_id: Option<i32>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::pairing_codes)]
pub struct NewPairingCode {
    pub account_id: i32,
    pub code: String,
    pub device_name: String,
    pub expires_at: NaiveDateTime,
}

// Content item models
#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::content_items)]
pub struct ContentItem {
    pub id: i32,
    pub account_id: i32,
    pub title: String,
    pub kind: String,
    pub byte_size: i64,
    pub storage_path: String,
    pub duration_secs: Option<i32>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable, Deserialize)]
#[diesel(table_name = crate::schema::content_items)]
pub struct NewContentItem {
    pub account_id: i32,
    pub title: String,
    pub kind: String,
    pub byte_size: i64,
    pub storage_path: String,
    pub duration_secs: Option<i32>,
}

// Playlist models
#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::playlists)]
pub struct Playlist {
    pub id: i32,
    pub account_id: i32,
    pub name: String,
    pub recurrence_kind: String,
    pub day_of_week: Option<i32>,
    pub event_start: Option<NaiveDateTime>,
    pub event_end: Option<NaiveDateTime>,
    pub default_item_duration_secs: i32,
    pub is_enabled: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable, Deserialize)]
#[diesel(table_name = crate::schema::playlists)]
pub struct NewPlaylist {
    pub account_id: i32,
    pub name: String,
    pub recurrence_kind: String,
    pub day_of_week: Option<i32>,
    pub event_start: Option<NaiveDateTime>,
    pub event_end: Option<NaiveDateTime>,
    pub default_item_duration_secs: i32,
    pub is_enabled: bool,
}

#[derive(Debug, AsChangeset, Deserialize)]
#[diesel(table_name = crate::schema::playlists)]
pub struct UpdatePlaylist {
    pub name: Option<String>,
    pub recurrence_kind: Option<String>,
    pub day_of_week: Option<Option<i32>>,
    pub event_start: Option<Option<NaiveDateTime>>,
    pub event_end: Option<Option<NaiveDateTime>>,
    pub default_item_duration_secs: Option<i32>,
    pub is_enabled: Option<bool>,
}

// Playlist item models
#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::playlist_items)]
pub struct PlaylistItem {
    pub id: i32,
    pub playlist_id: i32,
    pub content_id: i32,
    pub position: i32,
    pub duration_secs: Option<i32>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable, Deserialize)]
#[diesel(table_name = crate::schema::playlist_items)]
pub struct NewPlaylistItem {
    pub playlist_id: i32,
    pub content_id: i32,
    pub position: i32,
    pub duration_secs: Option<i32>,
}

pub const RECURRENCE_WEEKDAY: &str = "weekday";
pub const RECURRENCE_EVENT: &str = "event";

/// Parsed recurrence of a playlist. Stored stringly in SQLite, resolved into
/// a tagged variant so the resolver can match exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recurrence {
    Weekday(Weekday),
    Event {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RecurrenceError {
    #[error("unknown recurrence kind '{0}'")]
    UnknownKind(String),
    #[error("weekday recurrence without a day of week")]
    MissingWeekday,
    #[error("day of week {0} out of range (0 = Monday .. 6 = Sunday)")]
    WeekdayOutOfRange(i32),
    #[error("event recurrence without a start/end range")]
    MissingEventRange,
    #[error("event range ends before it starts")]
    InvertedEventRange,
}

impl Playlist {
    pub fn recurrence(&self) -> Result<Recurrence, RecurrenceError> {
        match self.recurrence_kind.as_str() {
            RECURRENCE_WEEKDAY => {
                let day = self.day_of_week.ok_or(RecurrenceError::MissingWeekday)?;
                // Monday = 0, matching the dashboard's weekday array indices.
                let weekday = match day {
                    0 => Weekday::Mon,
                    1 => Weekday::Tue,
                    2 => Weekday::Wed,
                    3 => Weekday::Thu,
                    4 => Weekday::Fri,
                    5 => Weekday::Sat,
                    6 => Weekday::Sun,
                    other => return Err(RecurrenceError::WeekdayOutOfRange(other)),
                };
                Ok(Recurrence::Weekday(weekday))
            }
            RECURRENCE_EVENT => {
                let (start, end) = match (self.event_start, self.event_end) {
                    (Some(s), Some(e)) => (s, e),
                    _ => return Err(RecurrenceError::MissingEventRange),
                };
                if end < start {
                    return Err(RecurrenceError::InvertedEventRange);
                }
                Ok(Recurrence::Event { start, end })
            }
            other => Err(RecurrenceError::UnknownKind(other.to_string())),
        }
    }
}

/// Media kind of a content item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Image,
    Video,
}

impl ContentItem {
    /// Unrecognized kinds are treated as images so they still rotate with the
    /// playlist's default duration.
    pub fn content_kind(&self) -> ContentKind {
        match self.kind.as_str() {
            "video" => ContentKind::Video,
            _ => ContentKind::Image,
        }
    }
}

/// Derived device status. Stored as text, classified from heartbeat staleness
/// plus the device's sync signal at read time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Online,
    Syncing,
    Offline,
}

impl DeviceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceStatus::Online => "online",
            DeviceStatus::Syncing => "syncing",
            DeviceStatus::Offline => "offline",
        }
    }
}

/// Sync progress reported by a device inside its heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    Idle,
    Syncing,
}
