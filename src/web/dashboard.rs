use std::collections::{BTreeMap, HashMap};

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::response::Html;
use chrono::NaiveDate;
use serde::Deserialize;

use super::error::ApiError;
use super::views::render_page;
use super::AppState;
use crate::allocator::bookings::parse_date_filter;
use crate::allocator::sweeper::SweepReport;
use crate::allocator::Allocator;
use crate::error::Result;
use crate::models::MatchStatus;
use crate::store::BookingFilter;

pub(super) struct OccupancyGrid {
    pub(super) date: NaiveDate,
    pub(super) stadiums: Vec<String>,
    pub(super) rows: Vec<GridRow>,
}

pub(super) struct GridRow {
    pub(super) time: String,
    pub(super) cells: Vec<Cell>,
}

#[derive(Debug, PartialEq)]
pub(super) enum Cell {
    Free,
    Disabled,
    Booked(String),
    Match {
        label: String,
        players: u32,
        max_players: u32,
        status: MatchStatus,
    },
}

pub(super) struct SweeperStatus {
    pub(super) last: Option<SweepReport>,
    pub(super) interval_secs: u64,
    pub(super) timezone: String,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct DashboardQuery {
    date: Option<String>,
}

/// Stadium × time slot occupancy for one day. Times used only by friendly
/// matches get their own rows.
pub(super) async fn build_grid(allocator: &Allocator, date: NaiveDate) -> Result<OccupancyGrid> {
    let filter = BookingFilter {
        date: Some(date),
        ..BookingFilter::default()
    };
    let (stadiums, slots, bookings, matches) = tokio::try_join!(
        allocator.catalog.stadiums(),
        allocator.catalog.time_slots(),
        allocator.bookings.list_all(filter),
        allocator.matches.list_all(None),
    )?;

    let mut times: BTreeMap<String, bool> = slots
        .into_iter()
        .map(|slot| (slot.time, slot.enabled))
        .collect();

    let mut booked: HashMap<(String, String), String> = HashMap::new();
    for view in bookings {
        let Some(slot) = view.time_slot else {
            continue;
        };
        let who = view
            .user
            .map(|u| u.name)
            .unwrap_or_else(|| view.booking.user_id.clone());
        booked.insert((view.booking.stadium_id, slot.time), who);
    }

    let mut held: HashMap<(String, String), Cell> = HashMap::new();
    for view in matches {
        let m = view.friendly;
        if m.date != date || !m.status.holds_slot() {
            continue;
        }
        times.entry(m.time.clone()).or_insert(true);
        held.insert(
            (m.stadium_id, m.time),
            Cell::Match {
                label: format!("{} vs {}", m.team1, m.team2),
                players: m.current_players,
                max_players: m.max_players,
                status: m.status,
            },
        );
    }

    let rows = times
        .into_iter()
        .map(|(time, slot_enabled)| {
            let cells = stadiums
                .iter()
                .map(|stadium| {
                    let key = (stadium.id.clone(), time.clone());
                    if let Some(who) = booked.remove(&key) {
                        Cell::Booked(who)
                    } else if let Some(cell) = held.remove(&key) {
                        cell
                    } else if !stadium.enabled || !slot_enabled {
                        Cell::Disabled
                    } else {
                        Cell::Free
                    }
                })
                .collect();
            GridRow { time, cells }
        })
        .collect();

    Ok(OccupancyGrid {
        date,
        stadiums: stadiums.into_iter().map(|s| s.name).collect(),
        rows,
    })
}

pub(crate) async fn dashboard_handler(
    State(state): State<AppState>,
    query: Result<Query<DashboardQuery>, QueryRejection>,
) -> Result<Html<String>, ApiError> {
    let Query(query) = query?;
    let date = parse_date_filter(query.date.as_deref())?.unwrap_or_else(|| state.sweeper.today());
    let grid = build_grid(&state.allocator, date).await?;
    let status = SweeperStatus {
        last: state.sweeper.last_report(),
        interval_secs: state.sweeper.interval().as_secs(),
        timezone: state.sweeper.timezone().to_string(),
    };
    Ok(Html(render_page(&grid, &status)))
}
