use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::store::Store;

#[derive(Debug, Clone)]
pub struct SweepReport {
    pub at: DateTime<Tz>,
    pub cutoff: NaiveDate,
    pub removed: usize,
}

/// Purges bookings dated before the current local day. Friendly matches are
/// never touched.
#[derive(Clone)]
pub struct ExpirySweeper {
    store: Arc<dyn Store>,
    tz: Tz,
    interval: Duration,
    last: Arc<Mutex<Option<SweepReport>>>,
}

impl ExpirySweeper {
    pub fn new(store: Arc<dyn Store>, tz: Tz, interval: Duration) -> Self {
        Self {
            store,
            tz,
            interval: interval.max(Duration::from_secs(1)),
            last: Arc::new(Mutex::new(None)),
        }
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.tz).date_naive()
    }

    pub async fn sweep(&self) -> usize {
        self.sweep_before(self.today()).await
    }

    /// Delete every booking strictly before `cutoff`. Failures are logged and
    /// count as nothing removed.
    pub async fn sweep_before(&self, cutoff: NaiveDate) -> usize {
        let removed = match self.store.delete_bookings_before(cutoff).await {
            Ok(0) => {
                debug!("Sweeper: no bookings before {}", cutoff);
                0
            }
            Ok(n) => {
                info!("Sweeper: removed {} bookings dated before {}", n, cutoff);
                n
            }
            Err(e) => {
                error!("Sweeper: purge before {} failed: {}", cutoff, e);
                0
            }
        };
        *self.last.lock().unwrap_or_else(PoisonError::into_inner) = Some(SweepReport {
            at: Utc::now().with_timezone(&self.tz),
            cutoff,
            removed,
        });
        removed
    }

    pub fn last_report(&self) -> Option<SweepReport> {
        self.last
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Sweep now, then once per interval, until the handle is stopped.
    pub fn start(&self) -> SweeperHandle {
        let sweeper = self.clone();
        info!(
            "Expiry sweeper started (every {}s, {})",
            self.interval.as_secs(),
            self.tz
        );
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(sweeper.interval);
            loop {
                ticker.tick().await;
                sweeper.sweep().await;
            }
        });
        SweeperHandle { task }
    }
}

pub struct SweeperHandle {
    task: JoinHandle<()>,
}

impl SweeperHandle {
    pub fn stop(self) {
        self.task.abort();
        info!("Expiry sweeper stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::BookingFilter;
    use crate::testing::{booking, date, friendly_match, seeded_store};

    #[tokio::test]
    async fn test_sweep_removes_only_past_days() {
        let store = seeded_store().await;
        for (id, day) in [("y", 9), ("t", 10), ("n", 11)] {
            store
                .insert_booking(booking(id, "alice", "s1", date(2025, 6, day), "t16"))
                .await
                .unwrap();
        }
        store
            .insert_match(friendly_match("m1", "bob", "s1", date(2025, 6, 1), "18:00", 4))
            .await
            .unwrap();

        let sweeper = ExpirySweeper::new(store.clone(), Tz::UTC, Duration::from_secs(3600));
        assert_eq!(sweeper.sweep_before(date(2025, 6, 10)).await, 1);

        let mut left: Vec<String> = store
            .bookings(&BookingFilter::default())
            .await
            .unwrap()
            .into_iter()
            .map(|b| b.id)
            .collect();
        left.sort();
        assert_eq!(left, vec!["n", "t"]);
        assert!(store.friendly_match("m1").await.unwrap().is_some());

        let report = sweeper.last_report().unwrap();
        assert_eq!(report.removed, 1);
        assert_eq!(report.cutoff, date(2025, 6, 10));

        // nothing left to purge
        assert_eq!(sweeper.sweep_before(date(2025, 6, 10)).await, 0);
    }

    #[tokio::test]
    async fn test_sweep_uses_local_today() {
        let store = seeded_store().await;
        let sweeper = ExpirySweeper::new(store.clone(), Tz::Africa__Algiers, Duration::from_secs(60));
        let today = sweeper.today();
        let yesterday = today.pred_opt().unwrap();
        store
            .insert_booking(booking("old", "alice", "s1", yesterday, "t16"))
            .await
            .unwrap();
        store
            .insert_booking(booking("now", "alice", "s1", today, "t16"))
            .await
            .unwrap();

        assert_eq!(sweeper.sweep().await, 1);
        assert!(store.booking("now").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_start_sweeps_immediately() {
        let store = seeded_store().await;
        let sweeper = ExpirySweeper::new(store, Tz::UTC, Duration::from_secs(3600));
        let handle = sweeper.start();
        for _ in 0..50 {
            if sweeper.last_report().is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(sweeper.last_report().is_some());
        handle.stop();
    }
}
