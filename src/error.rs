use chrono::NaiveDate;
use thiserror::Error;

use crate::models::MatchStatus;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Everything an allocator operation can refuse with.
///
/// Display strings are shown verbatim to end users, so conflict variants name
/// the stadium, time and date involved.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Validation failed")]
    Validation(Vec<String>),

    #[error("This time slot is already booked for this stadium")]
    AlreadyBooked,

    #[error("Stadium \"{stadium}\" is already booked at {time} on {date}")]
    StadiumBooked {
        stadium: String,
        time: String,
        date: NaiveDate,
    },

    #[error("Stadium \"{stadium}\" already has a friendly match at {time} on {date}")]
    SlotTaken {
        stadium: String,
        time: String,
        date: NaiveDate,
    },

    #[error("Maximum players ({max_players}) cannot exceed stadium capacity ({capacity})")]
    CapacityExceeded { max_players: u32, capacity: u32 },

    #[error("Match is full. Cannot join.")]
    Full,

    #[error("You are already in this match")]
    AlreadyJoined,

    #[error("The last player cannot leave the match; cancel or delete it instead")]
    LastPlayer,

    #[error("Time slot {0} already exists")]
    DuplicateTime(String),

    #[error("Cannot change match status from {from} to {to}")]
    InvalidTransition { from: MatchStatus, to: MatchStatus },

    #[error("Match is {0} and no longer accepts roster changes")]
    MatchClosed(MatchStatus),

    #[error("{kind} not found")]
    NotFound { kind: &'static str, id: String },

    #[error("Not allowed to {0}")]
    Forbidden(String),

    #[error("storage failure: {0}")]
    Upstream(String),
}

impl Error {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn invalid(field: &str, message: &str) -> Self {
        Self::Validation(vec![format!("{field}: {message}")])
    }

    /// Slot and roster conflicts the user can act on.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::AlreadyBooked
                | Self::StadiumBooked { .. }
                | Self::SlotTaken { .. }
                | Self::CapacityExceeded { .. }
                | Self::Full
                | Self::AlreadyJoined
                | Self::LastPlayer
                | Self::DuplicateTime(_)
                | Self::InvalidTransition { .. }
                | Self::MatchClosed(_)
        )
    }
}
