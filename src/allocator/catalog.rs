//! Resource catalog: stadiums, time slots and the user directory mirror.

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use super::UserSummary;
use crate::error::{Error, Result};
use crate::models::{Config, Period, Sport, Stadium, TimeSlot};
use crate::store::{StadiumPatch, Store, TimeSlotPatch};
use crate::validation::{sanitize, Checks};

const MIN_DURATION_MINUTES: i64 = 30;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StadiumRequest {
    pub name: Option<String>,
    pub sport_id: Option<String>,
    pub capacity: Option<i64>,
    pub enabled: Option<bool>,
    pub location: Option<String>,
    pub facilities: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StadiumUpdate {
    pub name: Option<String>,
    pub sport_id: Option<String>,
    pub capacity: Option<i64>,
    pub enabled: Option<bool>,
    pub location: Option<String>,
    pub facilities: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSlotRequest {
    pub time: Option<String>,
    pub period: Option<String>,
    pub enabled: Option<bool>,
    #[serde(alias = "duration")]
    pub duration_minutes: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSlotUpdate {
    pub enabled: Option<bool>,
    pub period: Option<String>,
    #[serde(alias = "duration")]
    pub duration_minutes: Option<i64>,
}

fn sport(checks: &mut Checks, value: Option<&str>) -> Option<Sport> {
    let sport = value.and_then(Sport::parse);
    if sport.is_none() {
        checks.fail("sportId", "Sport must be basketball, handball or football");
    }
    sport
}

fn period(checks: &mut Checks, value: Option<&str>) -> Option<Period> {
    let period = value.and_then(Period::parse);
    if value.is_some() && period.is_none() {
        checks.fail("period", "Period must be morning or afternoon");
    }
    period
}

fn duration(checks: &mut Checks, value: Option<i64>) -> Option<u32> {
    value.and_then(|minutes| {
        checks.at_least(
            "durationMinutes",
            Some(minutes),
            MIN_DURATION_MINUTES,
            "Duration must be at least 30 minutes",
        )
    })
}

fn facilities(list: Vec<String>) -> Vec<String> {
    list.iter()
        .map(|f| sanitize(f))
        .filter(|f| !f.is_empty())
        .collect()
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedReport {
    pub stadiums: usize,
    pub time_slots: usize,
    pub users: usize,
}

#[derive(Clone)]
pub struct Catalog {
    store: Arc<dyn Store>,
}

impl Catalog {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Stadiums by name. Disabled ones are included so admins can re-enable them.
    pub async fn stadiums(&self) -> Result<Vec<Stadium>> {
        let mut stadiums = self.store.stadiums().await?;
        stadiums.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(stadiums)
    }

    pub async fn create_stadium(&self, req: StadiumRequest) -> Result<Stadium> {
        let mut checks = Checks::new();
        let name = checks.required("name", req.name.as_deref(), "Stadium name is required");
        let sport_id = sport(&mut checks, req.sport_id.as_deref());
        let capacity = checks.at_least("capacity", req.capacity, 1, "Capacity must be at least 1");
        checks.finish()?;
        let (Some(name), Some(sport_id), Some(capacity)) = (name, sport_id, capacity) else {
            return Err(Error::Validation(vec!["Invalid data format".to_string()]));
        };

        let now = Utc::now();
        let stadium = Stadium {
            id: Uuid::new_v4().to_string(),
            name,
            sport_id,
            capacity,
            enabled: req.enabled.unwrap_or(true),
            location: req.location.as_deref().map(sanitize).filter(|l| !l.is_empty()),
            facilities: req.facilities.map(facilities).unwrap_or_default(),
            created_at: now,
            updated_at: now,
        };
        let stadium = self.store.insert_stadium(stadium).await?;
        info!("Stadium {} ({}) created", stadium.name, stadium.id);
        Ok(stadium)
    }

    pub async fn update_stadium(&self, id: &str, req: StadiumUpdate) -> Result<Stadium> {
        let mut checks = Checks::new();
        let name = match req.name.as_deref() {
            Some(n) => checks.required("name", Some(n), "Stadium name is required"),
            None => None,
        };
        let sport_id = match req.sport_id.as_deref() {
            Some(s) => sport(&mut checks, Some(s)),
            None => None,
        };
        let capacity = match req.capacity {
            Some(c) => checks.at_least("capacity", Some(c), 1, "Capacity must be at least 1"),
            None => None,
        };
        checks.finish()?;

        let patch = StadiumPatch {
            name,
            sport_id,
            capacity,
            enabled: req.enabled,
            location: req.location.as_deref().map(sanitize),
            facilities: req.facilities.map(facilities),
        };
        let stadium = self.store.update_stadium(id, patch).await?;
        info!(
            "Stadium {} updated ({})",
            stadium.id,
            if stadium.enabled { "enabled" } else { "disabled" }
        );
        Ok(stadium)
    }

    /// Existing bookings and matches on the stadium are left in place.
    pub async fn delete_stadium(&self, id: &str) -> Result<bool> {
        let removed = self.store.delete_stadium(id).await?;
        if removed {
            info!("Stadium {} deleted", id);
        }
        Ok(removed)
    }

    pub async fn time_slots(&self) -> Result<Vec<TimeSlot>> {
        Ok(self.store.time_slots().await?)
    }

    pub async fn create_time_slot(&self, req: TimeSlotRequest) -> Result<TimeSlot> {
        let mut checks = Checks::new();
        let time = checks.time("time", req.time.as_deref());
        let period = period(&mut checks, req.period.as_deref());
        let duration_minutes = duration(&mut checks, req.duration_minutes);
        checks.finish()?;
        let Some(time) = time else {
            return Err(Error::invalid("time", "Time must be in HH:MM format"));
        };

        let slot = TimeSlot {
            id: Uuid::new_v4().to_string(),
            period: period.unwrap_or_else(|| Period::for_time(&time)),
            time,
            enabled: req.enabled.unwrap_or(true),
            duration_minutes,
            created_at: Utc::now(),
        };
        let slot = self.store.insert_time_slot(slot).await?;
        info!("Time slot {} ({}) created", slot.time, slot.id);
        Ok(slot)
    }

    pub async fn update_time_slot(&self, id: &str, req: TimeSlotUpdate) -> Result<TimeSlot> {
        let mut checks = Checks::new();
        let period = period(&mut checks, req.period.as_deref());
        let duration_minutes = duration(&mut checks, req.duration_minutes);
        checks.finish()?;

        let patch = TimeSlotPatch {
            enabled: req.enabled,
            period,
            duration_minutes,
        };
        let slot = self.store.update_time_slot(id, patch).await?;
        info!(
            "Time slot {} updated ({})",
            slot.time,
            if slot.enabled { "enabled" } else { "disabled" }
        );
        Ok(slot)
    }

    pub async fn delete_time_slot(&self, id: &str) -> Result<bool> {
        let removed = self.store.delete_time_slot(id).await?;
        if removed {
            info!("Time slot {} deleted", id);
        }
        Ok(removed)
    }

    pub async fn users(&self) -> Result<Vec<UserSummary>> {
        let mut users = self.store.users().await?;
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(users.into_iter().map(UserSummary::from).collect())
    }

    /// Insert configured stadiums and time slots whose id is absent and mirror
    /// the configured user directory.
    pub async fn seed(&self, config: &Config) -> Result<SeedReport> {
        let mut report = SeedReport::default();
        let now = Utc::now();

        for seed in &config.stadiums {
            if self.store.stadium(&seed.id).await?.is_some() {
                continue;
            }
            if seed.capacity == 0 {
                return Err(Error::invalid("capacity", "Capacity must be at least 1"));
            }
            self.store
                .insert_stadium(Stadium {
                    id: seed.id.clone(),
                    name: seed.name.clone(),
                    sport_id: seed.sport_id,
                    capacity: seed.capacity,
                    enabled: seed.enabled,
                    location: seed.location.clone(),
                    facilities: Vec::new(),
                    created_at: now,
                    updated_at: now,
                })
                .await?;
            report.stadiums += 1;
        }

        for seed in &config.time_slots {
            if self.store.time_slot(&seed.id).await?.is_some() {
                continue;
            }
            let Some(time) = crate::validation::normalize_time(&seed.time) else {
                return Err(Error::invalid("time", "Time must be in HH:MM format"));
            };
            self.store
                .insert_time_slot(TimeSlot {
                    id: seed.id.clone(),
                    period: seed.period.unwrap_or_else(|| Period::for_time(&time)),
                    time,
                    enabled: seed.enabled,
                    duration_minutes: seed.duration_minutes,
                    created_at: now,
                })
                .await?;
            report.time_slots += 1;
        }

        for user in &config.users {
            self.store.upsert_user(user.clone()).await?;
            report.users += 1;
        }

        info!(
            "Catalog seeded: {} stadiums, {} time slots, {} users",
            report.stadiums, report.time_slots, report.users
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::testing::seeded_store;

    #[tokio::test]
    async fn test_create_stadium_validates_every_field() {
        let catalog = Catalog::new(seeded_store().await);
        let err = catalog
            .create_stadium(StadiumRequest {
                name: Some(" <> ".into()),
                sport_id: Some("polo".into()),
                capacity: Some(0),
                ..StadiumRequest::default()
            })
            .await
            .unwrap_err();
        match err {
            Error::Validation(details) => assert_eq!(details.len(), 3),
            other => panic!("unexpected {other:?}"),
        }

        let stadium = catalog
            .create_stadium(StadiumRequest {
                name: Some("Salle Omnisport".into()),
                sport_id: Some("Handball".into()),
                capacity: Some(14),
                facilities: Some(vec!["vestiaires".into(), " ".into()]),
                ..StadiumRequest::default()
            })
            .await
            .unwrap();
        assert!(stadium.enabled);
        assert_eq!(stadium.sport_id, Sport::Handball);
        assert_eq!(stadium.facilities, vec!["vestiaires"]);
        assert_eq!(catalog.stadiums().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_disable_and_delete_stadium() {
        let catalog = Catalog::new(seeded_store().await);
        let updated = catalog
            .update_stadium(
                "s1",
                StadiumUpdate {
                    enabled: Some(false),
                    ..StadiumUpdate::default()
                },
            )
            .await
            .unwrap();
        assert!(!updated.enabled);
        assert_eq!(updated.capacity, 10);

        let err = catalog
            .update_stadium("nope", StadiumUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { kind: "Stadium", .. }));

        assert!(catalog.delete_stadium("s1").await.unwrap());
        assert!(!catalog.delete_stadium("s1").await.unwrap());
    }

    #[tokio::test]
    async fn test_time_slot_period_and_duplicates() {
        let catalog = Catalog::new(seeded_store().await);
        let slot = catalog
            .create_time_slot(TimeSlotRequest {
                time: Some("8:30".into()),
                duration_minutes: Some(90),
                ..TimeSlotRequest::default()
            })
            .await
            .unwrap();
        assert_eq!(slot.time, "08:30");
        assert_eq!(slot.period, Period::Morning);
        assert_eq!(slot.duration_minutes, Some(90));

        let err = catalog
            .create_time_slot(TimeSlotRequest {
                time: Some("16:00".into()),
                ..TimeSlotRequest::default()
            })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Time slot 16:00 already exists");

        let err = catalog
            .create_time_slot(TimeSlotRequest {
                time: Some("20:00".into()),
                duration_minutes: Some(15),
                ..TimeSlotRequest::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let times: Vec<_> = catalog
            .time_slots()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.time)
            .collect();
        assert_eq!(times, vec!["08:30", "16:00", "18:00"]);
    }

    #[tokio::test]
    async fn test_disable_time_slot() {
        let catalog = Catalog::new(seeded_store().await);
        let slot = catalog
            .update_time_slot(
                "t16",
                TimeSlotUpdate {
                    enabled: Some(false),
                    ..TimeSlotUpdate::default()
                },
            )
            .await
            .unwrap();
        assert!(!slot.enabled);
        assert!(catalog.delete_time_slot("t16").await.unwrap());
        assert!(!catalog.delete_time_slot("t16").await.unwrap());
    }

    #[tokio::test]
    async fn test_seed_skips_existing_ids() {
        let config: Config = toml::from_str(
            r#"
            [[stadiums]]
            id = "main"
            name = "Main Field"
            sport_id = "football"
            capacity = 22

            [[time_slots]]
            id = "t14"
            time = "14:00"

            [[users]]
            id = "u1"
            username = "amine"
            email = "amine@univ.example"
            full_name = "Amine B."
            role = "club"
            "#,
        )
        .unwrap();

        let catalog = Catalog::new(Arc::new(MemoryStore::new()));
        let first = catalog.seed(&config).await.unwrap();
        assert_eq!(
            first,
            SeedReport {
                stadiums: 1,
                time_slots: 1,
                users: 1
            }
        );
        let second = catalog.seed(&config).await.unwrap();
        assert_eq!(second.stadiums, 0);
        assert_eq!(second.time_slots, 0);

        let slots = catalog.time_slots().await.unwrap();
        assert_eq!(slots[0].period, Period::Afternoon);
        let users = catalog.users().await.unwrap();
        assert_eq!(users[0].name, "Amine B.");
    }
}
