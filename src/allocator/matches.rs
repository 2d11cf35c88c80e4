//! Friendly matches: slot claims with a shared, capacity-bounded roster.
//!
//! Status machine: `pending -> confirmed` when a join fills the roster or on an
//! explicit update, `pending | confirmed -> cancelled` (terminal). Roster edits
//! run inside [`Store::modify_match`], so concurrent joins cannot overfill.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::conflict::{Availability, ConflictChecker};
use super::settle;
use crate::error::{Error, Result};
use crate::models::{FriendlyMatch, MatchStatus, SkillLevel, Sport};
use crate::store::{SlotKey, Store, StoreError};
use crate::validation::{sanitize, Checks};

const MIN_PLAYERS: i64 = 2;
const MAX_PLAYERS: u32 = 50;
const MAX_DESCRIPTION: usize = 500;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRequest {
    pub host_id: Option<String>,
    pub stadium_id: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub team1: Option<String>,
    pub team2: Option<String>,
    pub sport_id: Option<String>,
    pub max_players: Option<i64>,
    pub description: Option<String>,
    pub skill_level: Option<String>,
    pub is_public: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct NewMatch {
    pub host_id: String,
    pub stadium_id: String,
    pub date: NaiveDate,
    pub time: String,
    pub team1: String,
    pub team2: String,
    pub sport_id: Sport,
    pub max_players: u32,
    pub description: String,
    pub skill_level: SkillLevel,
    pub is_public: bool,
}

impl MatchRequest {
    pub fn validate(self) -> Result<NewMatch> {
        let mut checks = Checks::new();
        let host_id = checks.required("hostId", self.host_id.as_deref(), "Host ID is required");
        let stadium_id =
            checks.required("stadiumId", self.stadium_id.as_deref(), "Stadium ID is required");
        let date = checks.date("date", self.date.as_deref());
        let time = checks.time("time", self.time.as_deref());
        let team1 = checks.required("team1", self.team1.as_deref(), "Team 1 name is required");
        let sport_id = match self.sport_id.as_deref().map(str::trim) {
            Some(s) if !s.is_empty() => {
                let sport = Sport::parse(s);
                if sport.is_none() {
                    checks.fail("sportId", "Sport must be basketball, handball or football");
                }
                sport
            }
            _ => {
                checks.fail("sportId", "Sport ID is required");
                None
            }
        };
        let max_players = checks.at_least(
            "maxPlayers",
            self.max_players,
            MIN_PLAYERS,
            "Maximum players must be at least 2",
        );
        let max_players = checks.at_most(
            "maxPlayers",
            max_players,
            MAX_PLAYERS,
            "Maximum players cannot exceed 50",
        );
        let description = self.description.as_deref().map(sanitize).unwrap_or_default();
        if description.chars().count() > MAX_DESCRIPTION {
            checks.fail("description", "Description cannot exceed 500 characters");
        }
        let skill_level = match self.skill_level.as_deref() {
            Some(s) => SkillLevel::parse(s).or_else(|| {
                checks.fail(
                    "skillLevel",
                    "Skill level must be beginner, intermediate, advanced or any",
                );
                None
            }),
            None => Some(SkillLevel::Any),
        };
        checks.finish()?;

        match (host_id, stadium_id, date, time, team1, sport_id, max_players, skill_level) {
            (
                Some(host_id),
                Some(stadium_id),
                Some(date),
                Some(time),
                Some(team1),
                Some(sport_id),
                Some(max_players),
                Some(skill_level),
            ) => Ok(NewMatch {
                host_id,
                stadium_id,
                date,
                time,
                team1,
                team2: self
                    .team2
                    .as_deref()
                    .map(sanitize)
                    .filter(|t| !t.is_empty())
                    .unwrap_or_else(|| "Open".to_string()),
                sport_id,
                max_players,
                description,
                skill_level,
                is_public: self.is_public.unwrap_or(true),
            }),
            _ => Err(Error::Validation(vec!["Invalid data format".to_string()])),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RosterAction {
    Join,
    Leave,
}

/// One atomic change: an optional roster action, a direct guest assignment
/// when no action is given, and an optional status transition applied last.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchUpdate {
    pub match_id: Option<String>,
    pub guest_id: Option<String>,
    pub action: Option<RosterAction>,
    pub status: Option<String>,
}

/// Add `guest` to the roster.
pub fn join_roster(m: &mut FriendlyMatch, guest: &str) -> Result<()> {
    if !m.status.holds_slot() {
        return Err(Error::MatchClosed(m.status));
    }
    if m.is_full() {
        return Err(Error::Full);
    }
    if m.has_player(guest) {
        return Err(Error::AlreadyJoined);
    }
    m.players.push(guest.to_string());
    m.current_players = m.players.len() as u32;
    m.guest_id = Some(guest.to_string());
    if m.is_full() && m.status == MatchStatus::Pending {
        m.status = MatchStatus::Confirmed;
    }
    Ok(())
}

/// Remove `player` from the roster. Returns `false` when they were not in it.
/// A departing host hands over to the new first player.
pub fn leave_roster(m: &mut FriendlyMatch, player: &str) -> Result<bool> {
    if !m.status.holds_slot() {
        return Err(Error::MatchClosed(m.status));
    }
    let Some(pos) = m.players.iter().position(|p| p == player) else {
        return Ok(false);
    };
    if m.players.len() == 1 {
        return Err(Error::LastPlayer);
    }
    m.players.remove(pos);
    m.current_players = (m.players.len() as u32).max(1);
    if m.host_id == player {
        m.host_id = m.players[0].clone();
    }
    if m.guest_id.as_deref() == Some(player) || m.guest_id.as_deref() == Some(m.host_id.as_str()) {
        m.guest_id = m.players.iter().skip(1).last().cloned();
    }
    Ok(true)
}

pub fn transition(m: &mut FriendlyMatch, next: MatchStatus) -> Result<()> {
    if !m.status.can_become(next) {
        return Err(Error::InvalidTransition {
            from: m.status,
            to: next,
        });
    }
    m.status = next;
    Ok(())
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchStadium {
    pub id: String,
    pub name: String,
    pub capacity: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: String,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchView {
    #[serde(flatten)]
    pub friendly: FriendlyMatch,
    pub stadium: Option<MatchStadium>,
    pub host: Option<Participant>,
    pub guest: Option<Participant>,
}

#[derive(Clone)]
pub struct MatchLedger {
    store: Arc<dyn Store>,
    conflicts: ConflictChecker,
}

impl MatchLedger {
    pub fn new(store: Arc<dyn Store>, conflicts: ConflictChecker) -> Self {
        Self { store, conflicts }
    }

    pub async fn create(&self, req: NewMatch) -> Result<FriendlyMatch> {
        let stadium = self
            .store
            .stadium(&req.stadium_id)
            .await?
            .ok_or_else(|| Error::not_found("Stadium", &req.stadium_id))?;
        if req.max_players > stadium.capacity {
            return Err(Error::CapacityExceeded {
                max_players: req.max_players,
                capacity: stadium.capacity,
            });
        }
        if !stadium.enabled {
            return Err(Error::invalid("stadiumId", "Stadium is not available for booking"));
        }
        let slots = self.store.time_slots().await?;
        if slots.iter().any(|ts| ts.time == req.time && !ts.enabled) {
            return Err(Error::invalid("time", "Time slot is not available for booking"));
        }

        let slot = SlotKey::new(&stadium.id, req.date, &req.time);
        if let Availability::Conflict(conflict) = self.conflicts.check(&slot).await? {
            info!("Match refused on {}: {}", slot, conflict.reason());
            return Err(conflict.to_match_error());
        }

        let now = Utc::now();
        let friendly = FriendlyMatch {
            id: Uuid::new_v4().to_string(),
            players: vec![req.host_id.clone()],
            host_id: req.host_id,
            stadium_id: req.stadium_id,
            date: req.date,
            time: req.time,
            team1: req.team1,
            team2: req.team2,
            sport_id: req.sport_id,
            max_players: req.max_players,
            current_players: 1,
            guest_id: None,
            status: MatchStatus::Pending,
            description: req.description,
            skill_level: req.skill_level,
            is_public: req.is_public,
            created_at: now,
            updated_at: now,
        };
        match self.store.insert_match(friendly).await {
            Ok(friendly) => {
                info!(
                    "Friendly match {} created on {} by {}",
                    friendly.id, slot, friendly.host_id
                );
                Ok(friendly)
            }
            Err(StoreError::Occupied { holder, .. }) => {
                let conflict = self.conflicts.describe(&slot, holder).await;
                info!("Match lost the race for {}: {}", slot, conflict.reason());
                Err(conflict.to_match_error())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn join(&self, match_id: &str, guest_id: &str) -> Result<FriendlyMatch> {
        self.apply(MatchUpdate {
            match_id: Some(match_id.to_string()),
            guest_id: Some(guest_id.to_string()),
            action: Some(RosterAction::Join),
            status: None,
        })
        .await
    }

    pub async fn leave(&self, match_id: &str, player_id: &str) -> Result<FriendlyMatch> {
        self.apply(MatchUpdate {
            match_id: Some(match_id.to_string()),
            guest_id: Some(player_id.to_string()),
            action: Some(RosterAction::Leave),
            status: None,
        })
        .await
    }

    pub async fn set_status(&self, match_id: &str, status: MatchStatus) -> Result<FriendlyMatch> {
        self.apply(MatchUpdate {
            match_id: Some(match_id.to_string()),
            guest_id: None,
            action: None,
            status: Some(status.as_str().to_string()),
        })
        .await
    }

    pub async fn apply(&self, update: MatchUpdate) -> Result<FriendlyMatch> {
        let mut checks = Checks::new();
        let match_id = checks.required("matchId", update.match_id.as_deref(), "Match ID is required");
        let guest_id = update.guest_id.as_deref().map(sanitize).filter(|g| !g.is_empty());
        if update.action.is_some() && guest_id.is_none() {
            checks.fail("guestId", "Guest ID is required");
        }
        let status = match update.status.as_deref() {
            Some(s) => MatchStatus::parse(s).or_else(|| {
                checks.fail("status", "Status must be pending, confirmed or cancelled");
                None
            }),
            None => None,
        };
        checks.finish()?;
        let Some(match_id) = match_id else {
            return Err(Error::invalid("matchId", "Match ID is required"));
        };

        let action = update.action;
        let edit_guest = guest_id.clone();
        let updated = self
            .store
            .modify_match(
                &match_id,
                Box::new(move |m: &mut FriendlyMatch| {
                    match (action, edit_guest) {
                        (Some(RosterAction::Join), Some(guest)) => join_roster(m, &guest)?,
                        (Some(RosterAction::Leave), Some(player)) => {
                            leave_roster(m, &player)?;
                        }
                        (None, Some(guest)) => {
                            if !m.status.holds_slot() {
                                return Err(Error::MatchClosed(m.status));
                            }
                            m.guest_id = Some(guest);
                        }
                        _ => {}
                    }
                    if let Some(next) = status {
                        transition(m, next)?;
                    }
                    m.updated_at = Utc::now();
                    Ok(())
                }),
            )
            .await?;

        info!(
            "Match {} updated ({:?} {}): {}/{} players, host {}, {}",
            updated.id,
            action,
            guest_id.as_deref().unwrap_or("-"),
            updated.current_players,
            updated.max_players,
            updated.host_id,
            updated.status
        );
        Ok(updated)
    }

    /// Matches hosted by `user_id` (all matches when `None`), newest date first.
    pub async fn list_all(&self, user_id: Option<&str>) -> Result<Vec<MatchView>> {
        let mut matches = self.store.friendly_matches(user_id).await?;
        matches.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.time.cmp(&b.time)));
        Ok(join_all(matches.into_iter().map(|m| self.enrich(m))).await)
    }

    async fn enrich(&self, friendly: FriendlyMatch) -> MatchView {
        let guest_lookup = async {
            match &friendly.guest_id {
                Some(id) => self.store.user(id).await,
                None => Ok(None),
            }
        };
        let (stadium, host, guest) = tokio::join!(
            self.store.stadium(&friendly.stadium_id),
            self.store.user(&friendly.host_id),
            guest_lookup,
        );
        let participant = |u: crate::models::User| Participant {
            name: u.display_name().to_string(),
            id: u.id,
            email: u.email,
        };
        let guest_key = friendly.guest_id.clone().unwrap_or_default();
        MatchView {
            stadium: settle("stadium", &friendly.stadium_id, stadium).map(|s| MatchStadium {
                id: s.id,
                name: s.name,
                capacity: s.capacity,
            }),
            host: settle("user", &friendly.host_id, host).map(participant),
            guest: settle("user", &guest_key, guest).map(participant),
            friendly,
        }
    }

    /// Remove a match. With a requester, only the current host or an admin may
    /// delete; without one the caller is trusted. Unknown ids are a no-op.
    pub async fn delete(&self, match_id: &str, requester: Option<&str>) -> Result<bool> {
        if let Some(requester) = requester {
            let Some(friendly) = self.store.friendly_match(match_id).await? else {
                return Ok(false);
            };
            if friendly.host_id != requester {
                let is_admin = self
                    .store
                    .user(requester)
                    .await?
                    .is_some_and(|u| u.is_admin());
                if !is_admin {
                    return Err(Error::Forbidden("delete this match".to_string()));
                }
            }
        }
        let removed = self.store.delete_match(match_id).await?;
        if removed {
            info!("Friendly match {} deleted", match_id);
        }
        Ok(removed)
    }
}
