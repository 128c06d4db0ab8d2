//! Dashboard Loading
//!
//! Fetches the eight dashboard collections concurrently and commits them
//! as one snapshot once all of them have resolved. Snapshots carry a
//! generation number; an older load never replaces a newer snapshot.
//!
//! Push events only trigger a reload; a periodic poll keeps the snapshot
//! fresh when the realtime channel is unavailable.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, RwLock};
use tokio::task::JoinHandle;

use crate::api::{ApiClient, Notice, Record};
use crate::config::DashboardConfig;
use crate::realtime::{listener, Listener};

/// The fetched collections
#[derive(Debug, Clone, Default, Serialize)]
pub struct Collections {
    pub hospitals: Vec<Record>,
    pub doctors: Vec<Record>,
    pub patients: Vec<Record>,
    pub appointments: Vec<Record>,
    pub orders: Vec<Record>,
    pub prescriptions: Vec<Record>,
    pub inventory: Vec<Record>,
    pub finance: Vec<Record>,
}

impl Collections {
    /// Collections by name, in display order
    pub fn named(&self) -> [(&'static str, &[Record]); 8] {
        [
            ("hospitals", self.hospitals.as_slice()),
            ("doctors", self.doctors.as_slice()),
            ("patients", self.patients.as_slice()),
            ("appointments", self.appointments.as_slice()),
            ("orders", self.orders.as_slice()),
            ("prescriptions", self.prescriptions.as_slice()),
            ("inventory", self.inventory.as_slice()),
            ("finance", self.finance.as_slice()),
        ]
    }

    /// Look a collection up by name
    pub fn get(&self, name: &str) -> Option<&[Record]> {
        self.named()
            .into_iter()
            .find(|(n, _)| *n == name)
            .map(|(_, records)| records)
    }
}

/// Income and expense totals of the finance collection
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct FinanceTotals {
    pub income: f64,
    pub expense: f64,
    pub net: f64,
}

/// Tallies shown on the dashboard cards
#[derive(Debug, Clone, Default, Serialize)]
pub struct DashboardStats {
    /// Collection name → record count
    pub counts: BTreeMap<String, usize>,
    /// Collection name → status → count
    pub status: BTreeMap<String, BTreeMap<String, usize>>,
    pub finance: FinanceTotals,
}

impl DashboardStats {
    pub fn compute(collections: &Collections) -> Self {
        let mut stats = DashboardStats::default();
        for (name, records) in collections.named() {
            stats.counts.insert(name.to_string(), records.len());
            if !records.is_empty() && name != "finance" {
                stats
                    .status
                    .insert(name.to_string(), tally_by(records, "status"));
            }
        }
        stats.finance = finance_totals(&collections.finance);
        stats
    }
}

/// One committed dashboard state
#[derive(Debug, Clone, Serialize)]
pub struct DashboardSnapshot {
    pub generation: u64,
    pub loaded_at: DateTime<Utc>,
    pub collections: Collections,
    pub stats: DashboardStats,
    /// Notices for fetches that failed (their collections are empty)
    pub notices: Vec<Notice>,
}

/// Loads and holds the dashboard snapshot
pub struct DashboardLoader {
    client: ApiClient,
    paths: DashboardConfig,
    generation: AtomicU64,
    snapshot: RwLock<Option<Arc<DashboardSnapshot>>>,
}

impl DashboardLoader {
    pub fn new(client: ApiClient, paths: DashboardConfig) -> Self {
        Self {
            client,
            paths,
            generation: AtomicU64::new(0),
            snapshot: RwLock::new(None),
        }
    }

    /// Fetch every collection concurrently and commit the result.
    ///
    /// Returns the committed snapshot, or `None` if a newer load committed
    /// first.
    pub async fn load(&self) -> Option<Arc<DashboardSnapshot>> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let c = &self.client;
        let p = &self.paths;

        let (
            hospitals,
            doctors,
            patients,
            appointments,
            orders,
            prescriptions,
            inventory,
            finance,
        ) = tokio::join!(
            c.collection_or_empty(&p.hospitals),
            c.collection_or_empty(&p.doctors),
            c.collection_or_empty(&p.patients),
            c.collection_or_empty(&p.appointments),
            c.collection_or_empty(&p.orders),
            c.collection_or_empty(&p.prescriptions),
            c.collection_or_empty(&p.inventory),
            c.collection_or_empty(&p.finance),
        );

        let mut notices = Vec::new();
        let mut take = |(records, notice): (Vec<Record>, Option<Notice>)| {
            if let Some(notice) = notice {
                if !notices.contains(&notice) {
                    notices.push(notice);
                }
            }
            records
        };

        let collections = Collections {
            hospitals: take(hospitals),
            doctors: take(doctors),
            patients: take(patients),
            appointments: take(appointments),
            orders: take(orders),
            prescriptions: take(prescriptions),
            inventory: take(inventory),
            finance: take(finance),
        };

        let snapshot = DashboardSnapshot {
            generation,
            loaded_at: Utc::now(),
            stats: DashboardStats::compute(&collections),
            collections,
            notices,
        };

        self.commit(snapshot).await
    }

    /// Store a snapshot unless a newer one is already committed
    async fn commit(&self, snapshot: DashboardSnapshot) -> Option<Arc<DashboardSnapshot>> {
        let mut slot = self.snapshot.write().await;
        if let Some(current) = slot.as_ref() {
            if current.generation > snapshot.generation {
                tracing::debug!(
                    stale = snapshot.generation,
                    current = current.generation,
                    "Discarding superseded dashboard load"
                );
                return None;
            }
        }

        let snapshot = Arc::new(snapshot);
        tracing::debug!(
            generation = snapshot.generation,
            notices = snapshot.notices.len(),
            "Dashboard snapshot committed"
        );
        *slot = Some(Arc::clone(&snapshot));
        Some(snapshot)
    }

    /// The most recently committed snapshot
    pub async fn latest(&self) -> Option<Arc<DashboardSnapshot>> {
        self.snapshot.read().await.clone()
    }

    /// Reload on every poll tick and whenever `trigger` is notified.
    ///
    /// Pair with [`refresh_listener`] to reload on push events.
    pub fn spawn_refresh(self: Arc<Self>, poll_interval: Duration, trigger: Arc<Notify>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(poll_interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = trigger.notified() => {
                        tracing::debug!("Dashboard reload triggered by push event");
                    }
                }
                self.load().await;
            }
        })
    }
}

/// Listener that asks the refresh task to reload
pub fn refresh_listener(trigger: Arc<Notify>) -> Listener {
    listener(move |_| trigger.notify_one())
}

/// Count records by the string value of `field` ("unknown" when absent)
pub fn tally_by(records: &[Record], field: &str) -> BTreeMap<String, usize> {
    let mut tally = BTreeMap::new();
    for record in records {
        let key = match record.get(field) {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Bool(b)) => b.to_string(),
            Some(Value::Number(n)) => n.to_string(),
            _ => "unknown".to_string(),
        };
        *tally.entry(key).or_insert(0) += 1;
    }
    tally
}

/// Sum `amount` by `type` (income / expense). Amounts may be numbers or
/// numeric strings; anything else is skipped.
pub fn finance_totals(records: &[Record]) -> FinanceTotals {
    let mut totals = FinanceTotals::default();
    for record in records {
        let amount = match record.get("amount") {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        let Some(amount) = amount else { continue };

        match record.get("type").and_then(Value::as_str) {
            Some(t) if t.eq_ignore_ascii_case("income") => totals.income += amount,
            Some(t) if t.eq_ignore_ascii_case("expense") => totals.expense += amount,
            _ => {}
        }
    }
    totals.net = totals.income - totals.expense;
    totals
}
