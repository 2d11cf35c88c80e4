use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub sweeper: SweeperConfig,
    pub rate_limit: RateLimitConfig,
    pub stadiums: Vec<StadiumSeed>,
    pub time_slots: Vec<TimeSlotSeed>,
    pub users: Vec<User>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:3010".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct StorageConfig {
    /// JSON snapshot rewritten after every mutation. In-memory only when unset.
    pub snapshot: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SweeperConfig {
    pub interval_secs: u64,
    /// IANA zone whose midnight marks the end of a booking's day.
    pub timezone: String,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval_secs: 3600,
            timezone: "UTC".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub booking_max_requests: u32,
    pub window_secs: u64,
    pub cleanup_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 100,
            booking_max_requests: 10,
            window_secs: 900,
            cleanup_secs: 300,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StadiumSeed {
    pub id: String,
    pub name: String,
    pub sport_id: Sport,
    pub capacity: u32,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TimeSlotSeed {
    pub id: String,
    pub time: String,
    #[serde(default)]
    pub period: Option<Period>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sport {
    Basketball,
    Handball,
    Football,
}

impl Sport {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "basketball" => Some(Self::Basketball),
            "handball" => Some(Self::Handball),
            "football" => Some(Self::Football),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basketball => "basketball",
            Self::Handball => "handball",
            Self::Football => "football",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Morning,
    Afternoon,
}

impl Period {
    /// Derive the period from a normalised `HH:MM` string.
    pub fn for_time(time: &str) -> Self {
        let hour: u32 = time
            .split(':')
            .next()
            .and_then(|h| h.parse().ok())
            .unwrap_or(0);
        if hour < 12 {
            Self::Morning
        } else {
            Self::Afternoon
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "morning" => Some(Self::Morning),
            "afternoon" => Some(Self::Afternoon),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stadium {
    pub id: String,
    pub name: String,
    pub sport_id: Sport,
    pub capacity: u32,
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default)]
    pub facilities: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSlot {
    pub id: String,
    /// Normalised `HH:MM`. Unique across the catalog.
    pub time: String,
    pub period: Period,
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<u32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: String,
    pub user_id: String,
    pub stadium_id: String,
    pub date: NaiveDate,
    pub time_slot_id: String,
    /// `HH:MM` of the time slot when the booking was made. The slot stays
    /// claimed under this time even if the time slot is later removed.
    #[serde(default)]
    pub time: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl MatchStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "confirmed" => Some(Self::Confirmed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Pending and confirmed matches hold their slot; cancelled ones release it.
    pub fn holds_slot(self) -> bool {
        !matches!(self, Self::Cancelled)
    }

    pub fn can_become(self, next: Self) -> bool {
        match (self, next) {
            (a, b) if a == b => true,
            (Self::Pending, Self::Confirmed) => true,
            (Self::Pending | Self::Confirmed, Self::Cancelled) => true,
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkillLevel {
    Beginner,
    Intermediate,
    Advanced,
    #[default]
    Any,
}

impl SkillLevel {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "beginner" => Some(Self::Beginner),
            "intermediate" => Some(Self::Intermediate),
            "advanced" => Some(Self::Advanced),
            "any" => Some(Self::Any),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendlyMatch {
    pub id: String,
    pub host_id: String,
    pub stadium_id: String,
    pub date: NaiveDate,
    pub time: String,
    pub team1: String,
    pub team2: String,
    pub sport_id: Sport,
    pub max_players: u32,
    pub current_players: u32,
    pub players: Vec<String>,
    /// Most recent player to join, or a directly assigned opponent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guest_id: Option<String>,
    pub status: MatchStatus,
    pub description: String,
    pub skill_level: SkillLevel,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FriendlyMatch {
    pub fn is_full(&self) -> bool {
        self.current_players >= self.max_players
    }

    pub fn has_player(&self, user_id: &str) -> bool {
        self.players.iter().any(|p| p == user_id)
    }

    /// Roster invariants that every committed match satisfies.
    pub fn roster_is_consistent(&self) -> bool {
        self.current_players as usize == self.players.len()
            && self.current_players >= 1
            && self.current_players <= self.max_players
            && self.has_player(&self.host_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Club,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(default, alias = "full_name")]
    pub full_name: String,
    #[serde(default, alias = "student_id")]
    pub student_id: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default, alias = "club_name")]
    pub club_name: String,
    #[serde(default)]
    pub department: String,
}

impl User {
    pub fn display_name(&self) -> &str {
        if self.full_name.is_empty() {
            &self.username
        } else {
            &self.full_name
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}
