//! Fixtures shared by the unit tests.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};

use crate::models::{
    Booking, FriendlyMatch, MatchStatus, Period, Role, SkillLevel, Sport, Stadium, TimeSlot, User,
};
use crate::store::{MemoryStore, Store};

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn stadium(id: &str, capacity: u32) -> Stadium {
    let now = Utc::now();
    Stadium {
        id: id.to_string(),
        name: format!("Stadium {id}"),
        sport_id: Sport::Football,
        capacity,
        enabled: true,
        location: None,
        facilities: Vec::new(),
        created_at: now,
        updated_at: now,
    }
}

pub fn time_slot(id: &str, time: &str) -> TimeSlot {
    TimeSlot {
        id: id.to_string(),
        time: time.to_string(),
        period: Period::for_time(time),
        enabled: true,
        duration_minutes: Some(90),
        created_at: Utc::now(),
    }
}

pub fn booking(id: &str, user: &str, stadium: &str, date: NaiveDate, slot: &str) -> Booking {
    let now = Utc::now();
    Booking {
        id: id.to_string(),
        user_id: user.to_string(),
        stadium_id: stadium.to_string(),
        date,
        time_slot_id: slot.to_string(),
        time: String::new(),
        created_at: now,
        updated_at: now,
    }
}

pub fn friendly_match(
    id: &str,
    host: &str,
    stadium: &str,
    date: NaiveDate,
    time: &str,
    max_players: u32,
) -> FriendlyMatch {
    let now = Utc::now();
    FriendlyMatch {
        id: id.to_string(),
        host_id: host.to_string(),
        stadium_id: stadium.to_string(),
        date,
        time: time.to_string(),
        team1: "Host FC".to_string(),
        team2: "Open".to_string(),
        sport_id: Sport::Football,
        max_players,
        current_players: 1,
        players: vec![host.to_string()],
        guest_id: None,
        status: MatchStatus::Pending,
        description: String::new(),
        skill_level: SkillLevel::Any,
        is_public: true,
        created_at: now,
        updated_at: now,
    }
}

pub fn user(id: &str, role: Role) -> User {
    User {
        id: id.to_string(),
        username: id.to_string(),
        email: format!("{id}@univ.example"),
        full_name: format!("{} Student", id.to_uppercase()),
        student_id: format!("S-{id}"),
        role,
        club_name: String::new(),
        department: "Informatique".to_string(),
    }
}

/// Stadium `s1` (capacity 10), slots 16:00 (`t16`) and 18:00 (`t18`),
/// users alice, bob, carol and an admin.
pub async fn seeded_store() -> Arc<dyn Store> {
    let store = MemoryStore::new();
    store.insert_stadium(stadium("s1", 10)).await.unwrap();
    store.insert_time_slot(time_slot("t16", "16:00")).await.unwrap();
    store.insert_time_slot(time_slot("t18", "18:00")).await.unwrap();
    for (id, role) in [
        ("alice", Role::User),
        ("bob", Role::Club),
        ("carol", Role::User),
        ("admin", Role::Admin),
    ] {
        store.upsert_user(user(id, role)).await.unwrap();
    }
    Arc::new(store)
}
