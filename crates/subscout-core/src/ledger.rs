//! In-memory subscription ledger
//!
//! Owns every [`Subscription`] for one session: manual entries, merged
//! detector output, edits and spend aggregates. Nothing is persisted.

use std::collections::{BTreeMap, HashSet};

use chrono::{Datelike, Duration, NaiveDate, Utc};
use tracing::{debug, info};

use crate::banks::UNKNOWN_BANK;
use crate::classify::TrialPolicy;
use crate::colors::FALLBACK_COLOR;
use crate::ids::{generate_id, minor_units, normalize_name, unique_id, MANUAL_PREFIX};
use crate::models::{
    AggregateMetrics, BillingCycle, NewSubscription, Subscription, SubscriptionPatch,
    SubscriptionStatus,
};
use crate::services::{match_service, GENERIC_CATEGORY, GENERIC_LOGO};

/// Category, logo and color for a service name
fn presentation_for(name: &str) -> (String, String, String) {
    match match_service(name) {
        Some(s) => (s.category.to_string(), s.logo.to_string(), s.color.to_string()),
        None => (
            GENERIC_CATEGORY.to_string(),
            GENERIC_LOGO.to_string(),
            FALLBACK_COLOR.to_string(),
        ),
    }
}

/// Two auto-detected records describe the same series
fn same_series(a: &Subscription, b: &Subscription) -> bool {
    normalize_name(&a.service_name) == normalize_name(&b.service_name)
        && minor_units(a.amount) == minor_units(b.amount)
        && a.billing_cycle == b.billing_cycle
}

/// Cost of one billing period spread over its months
pub fn monthly_equivalent(sub: &Subscription) -> f64 {
    sub.amount / sub.billing_cycle.months()
}

#[derive(Debug, Clone, Default)]
pub struct SubscriptionLedger {
    records: Vec<Subscription>,
    trial: TrialPolicy,
}

impl SubscriptionLedger {
    pub fn new(trial: TrialPolicy) -> Self {
        Self {
            records: Vec::new(),
            trial,
        }
    }

    pub fn get(&self, id: &str) -> Option<&Subscription> {
        self.records.iter().find(|s| s.id == id)
    }

    /// All records in insertion order
    pub fn list(&self) -> &[Subscription] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn taken_ids(&self) -> HashSet<String> {
        self.records.iter().map(|s| s.id.clone()).collect()
    }

    /// Add a manual subscription; false when the name is blank or the amount is invalid
    pub fn add(&mut self, new: NewSubscription) -> bool {
        self.insert(new).is_some()
    }

    /// Like [`add`](Self::add), returning the assigned id
    pub fn insert(&mut self, new: NewSubscription) -> Option<String> {
        let name = new.service_name.trim();
        if name.is_empty() || !new.amount.is_finite() || new.amount <= 0.0 {
            debug!(name, amount = new.amount, "Rejected manual subscription");
            return None;
        }

        let base = generate_id(MANUAL_PREFIX, name, new.amount, self.records.len() as u64);
        let id = unique_id(&base, &self.taken_ids());

        let (category, logo, color) = presentation_for(name);
        let start_date = new.start_date.unwrap_or_else(|| Utc::now().date_naive());
        let trial_reason = self
            .trial
            .is_low_amount(Some(new.amount))
            .then(|| self.trial.low_amount_reason(new.amount));

        self.records.push(Subscription {
            id: id.clone(),
            service_name: name.to_string(),
            category: new.category.unwrap_or(category),
            color: new.color.unwrap_or(color),
            service_logo: Some(new.service_logo.unwrap_or(logo)),
            amount: new.amount,
            billing_cycle: new.billing_cycle.unwrap_or(BillingCycle::Monthly),
            start_date,
            last_payment: new.last_payment.unwrap_or(start_date),
            status: if trial_reason.is_some() {
                SubscriptionStatus::Trial
            } else {
                SubscriptionStatus::Active
            },
            is_trial: trial_reason.is_some(),
            trial_reason,
            auto_detected: false,
            confidence: 100,
            transaction_count: 0,
            bank: new.bank.unwrap_or_else(|| UNKNOWN_BANK.to_string()),
        });
        info!(id = %id, name, "Added manual subscription");
        Some(id)
    }

    /// Apply a partial edit. False for an unknown id or an invalid amount.
    ///
    /// A new amount at or below the trial threshold moves the record to
    /// Trial with a low-amount reason. A new amount above it returns a Trial
    /// record to Active only when its reason was the low-amount rule; a
    /// keyword-derived trial reason is kept.
    pub fn update(&mut self, id: &str, patch: SubscriptionPatch) -> bool {
        if let Some(amount) = patch.amount {
            if !amount.is_finite() || amount <= 0.0 {
                return false;
            }
        }
        let trial = self.trial;
        let Some(sub) = self.records.iter_mut().find(|s| s.id == id) else {
            return false;
        };

        if let Some(name) = patch.service_name.filter(|n| !n.trim().is_empty()) {
            let (category, logo, color) = presentation_for(&name);
            sub.service_name = name.trim().to_string();
            sub.category = category;
            sub.service_logo = Some(logo);
            sub.color = color;
        }
        if let Some(category) = patch.category {
            sub.category = category;
        }
        if let Some(cycle) = patch.billing_cycle {
            sub.billing_cycle = cycle;
        }
        if let Some(last) = patch.last_payment {
            sub.last_payment = last;
        }
        if let Some(bank) = patch.bank {
            sub.bank = bank;
        }

        if let Some(amount) = patch.amount {
            sub.amount = amount;
            if trial.is_low_amount(Some(amount)) {
                sub.is_trial = true;
                sub.trial_reason = Some(trial.low_amount_reason(amount));
                if sub.status.is_billable() {
                    sub.status = SubscriptionStatus::Trial;
                }
            } else if sub
                .trial_reason
                .as_deref()
                .is_some_and(TrialPolicy::is_low_amount_reason)
            {
                sub.is_trial = false;
                sub.trial_reason = None;
                if sub.status == SubscriptionStatus::Trial {
                    sub.status = SubscriptionStatus::Active;
                }
            }
        }

        if let Some(status) = patch.status {
            sub.status = status;
            match status {
                SubscriptionStatus::Trial => {
                    sub.is_trial = true;
                    if sub.trial_reason.is_none() {
                        sub.trial_reason = Some("Marked as trial".to_string());
                    }
                }
                SubscriptionStatus::Active => {
                    sub.is_trial = false;
                    sub.trial_reason = None;
                }
                SubscriptionStatus::Inactive => {}
            }
        }

        debug!(id, status = %sub.status, "Updated subscription");
        true
    }

    /// Remove by id; false when absent
    pub fn delete(&mut self, id: &str) -> bool {
        let before = self.records.len();
        self.records.retain(|s| s.id != id);
        self.records.len() != before
    }

    /// Merge detector output; returns how many records were added or refreshed.
    ///
    /// Records whose id is already present are skipped. An auto-detected
    /// record matching an existing auto-detected series (same normalized
    /// name, amount and cycle) refreshes that record instead of adding a
    /// second one, so re-running detection never double-counts.
    pub fn merge_detected(&mut self, detected: Vec<Subscription>) -> usize {
        let mut changed = 0;
        for sub in detected {
            if self.get(&sub.id).is_some() {
                continue;
            }
            if sub.auto_detected {
                if let Some(existing) = self
                    .records
                    .iter_mut()
                    .find(|e| e.auto_detected && same_series(e, &sub))
                {
                    existing.start_date = existing.start_date.min(sub.start_date);
                    existing.last_payment = existing.last_payment.max(sub.last_payment);
                    existing.transaction_count = existing.transaction_count.max(sub.transaction_count);
                    existing.confidence = sub.confidence;
                    changed += 1;
                    continue;
                }
            }
            self.records.push(sub);
            changed += 1;
        }
        changed
    }

    /// Fixed-offset projection: +30 / +90 / +365 days after the last payment.
    ///
    /// This drifts from real calendar billing (e.g. monthly on the 31st);
    /// the aggregates assume exactly these offsets.
    pub fn next_payment_date(sub: &Subscription) -> NaiveDate {
        let days = match sub.billing_cycle {
            BillingCycle::Monthly => 30,
            BillingCycle::Quarterly => 90,
            BillingCycle::Yearly => 365,
        };
        sub.last_payment + Duration::days(days)
    }

    pub fn metrics(&self) -> AggregateMetrics {
        self.metrics_as_of(Utc::now().date_naive())
    }

    /// Aggregates over Active and Trial records
    pub fn metrics_as_of(&self, today: NaiveDate) -> AggregateMetrics {
        let mut metrics = AggregateMetrics {
            months_remaining: 13 - today.month(),
            ..AggregateMetrics::default()
        };

        for sub in &self.records {
            match sub.status {
                SubscriptionStatus::Active => metrics.active_count += 1,
                SubscriptionStatus::Trial => metrics.trial_count += 1,
                SubscriptionStatus::Inactive => {
                    metrics.inactive_count += 1;
                    continue;
                }
            }
            let monthly = monthly_equivalent(sub);
            metrics.total_monthly += monthly;
            *metrics.by_service.entry(sub.service_name.clone()).or_default() += monthly;
            *metrics.by_category.entry(sub.category.clone()).or_default() += monthly;
        }

        metrics.total_yearly = metrics.total_monthly * 12.0;
        metrics.remaining_year_projection = metrics.total_monthly * metrics.months_remaining as f64;
        metrics
    }

    /// Billable records due within `within_days` of `today`, soonest first
    pub fn upcoming_payments(&self, today: NaiveDate, within_days: i64) -> Vec<(&Subscription, NaiveDate)> {
        let horizon = today + Duration::days(within_days);
        let mut due: Vec<(&Subscription, NaiveDate)> = self
            .records
            .iter()
            .filter(|s| s.status.is_billable())
            .map(|s| (s, Self::next_payment_date(s)))
            .filter(|(_, next)| *next >= today && *next <= horizon)
            .collect();
        due.sort_by_key(|(s, next)| (*next, s.service_name.clone()));
        due
    }

    /// Flat key/value view of every record for an external exporter
    pub fn export_records(&self) -> Vec<BTreeMap<String, String>> {
        self.records
            .iter()
            .map(|s| {
                let fields = [
                    ("id", s.id.clone()),
                    ("service_name", s.service_name.clone()),
                    ("category", s.category.clone()),
                    ("color", s.color.clone()),
                    ("service_logo", s.service_logo.clone().unwrap_or_default()),
                    ("amount", format!("{:.2}", s.amount)),
                    ("monthly_cost", format!("{:.2}", monthly_equivalent(s))),
                    ("billing_cycle", s.billing_cycle.label().to_string()),
                    ("start_date", s.start_date.to_string()),
                    ("last_payment", s.last_payment.to_string()),
                    ("next_payment", Self::next_payment_date(s).to_string()),
                    ("status", s.status.as_str().to_string()),
                    ("is_trial", s.is_trial.to_string()),
                    ("trial_reason", s.trial_reason.clone().unwrap_or_default()),
                    ("auto_detected", s.auto_detected.to_string()),
                    ("confidence", s.confidence.to_string()),
                    ("transaction_count", s.transaction_count.to_string()),
                    ("bank", s.bank.clone()),
                ];
                fields
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v))
                    .collect()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::AUTO_PREFIX;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn manual(name: &str, amount: f64) -> NewSubscription {
        NewSubscription {
            service_name: name.into(),
            amount,
            start_date: Some(date(2024, 1, 15)),
            ..NewSubscription::default()
        }
    }

    fn detected(name: &str, amount: f64, id: &str) -> Subscription {
        Subscription {
            id: id.into(),
            service_name: name.into(),
            category: "Music Streaming".into(),
            color: "#1DB954".into(),
            service_logo: None,
            amount,
            billing_cycle: BillingCycle::Monthly,
            start_date: date(2024, 1, 1),
            last_payment: date(2024, 3, 1),
            status: SubscriptionStatus::Active,
            is_trial: false,
            trial_reason: None,
            auto_detected: true,
            confidence: 80,
            transaction_count: 3,
            bank: "HDFC Bank".into(),
        }
    }

    #[test]
    fn test_add_derives_presentation_and_ids() {
        let mut ledger = SubscriptionLedger::default();
        let id = ledger.insert(manual("Netflix Premium", 649.0)).unwrap();
        let sub = ledger.get(&id).unwrap();
        assert!(id.starts_with("manual_"));
        assert_eq!(sub.category, "Video Streaming");
        assert_eq!(sub.color, "#E50914");
        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert!(!sub.auto_detected);
        assert_eq!(sub.last_payment, date(2024, 1, 15));

        let id = ledger.insert(manual("Local Gym", 1200.0)).unwrap();
        assert_eq!(ledger.get(&id).unwrap().category, GENERIC_CATEGORY);

        // "canva" inside "Canvas" is not the design tool
        let id = ledger.insert(manual("Canvas Prints", 300.0)).unwrap();
        assert_eq!(ledger.get(&id).unwrap().category, GENERIC_CATEGORY);
        assert_eq!(ledger.get(&id).unwrap().service_logo.as_deref(), Some(GENERIC_LOGO));
    }

    #[test]
    fn test_add_rejects_invalid_input_and_applies_trial_rule() {
        let mut ledger = SubscriptionLedger::default();
        assert!(!ledger.add(manual("  ", 100.0)));
        assert!(!ledger.add(manual("Netflix", 0.0)));
        assert!(!ledger.add(manual("Netflix", f64::NAN)));
        assert!(ledger.is_empty());

        let id = ledger.insert(manual("Netflix", 5.0)).unwrap();
        let sub = ledger.get(&id).unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Trial);
        assert!(sub.is_trial);
    }

    #[test]
    fn test_update_low_amount_flips_to_trial() {
        let mut ledger = SubscriptionLedger::default();
        let id = ledger.insert(manual("Spotify", 199.0)).unwrap();

        let patch = SubscriptionPatch {
            amount: Some(5.0),
            ..SubscriptionPatch::default()
        };
        assert!(ledger.update(&id, patch));
        let sub = ledger.get(&id).unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Trial);
        assert!(sub.is_trial);
        assert!(TrialPolicy::is_low_amount_reason(sub.trial_reason.as_deref().unwrap()));

        // raising the amount again undoes a low-amount trial
        let patch = SubscriptionPatch {
            amount: Some(199.0),
            ..SubscriptionPatch::default()
        };
        assert!(ledger.update(&id, patch));
        let sub = ledger.get(&id).unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert!(!sub.is_trial);
        assert_eq!(sub.trial_reason, None);
    }

    #[test]
    fn test_update_keeps_keyword_trial_reason() {
        let mut ledger = SubscriptionLedger::default();
        let mut sub = detected("Spotify", 119.0, "auto_1");
        sub.status = SubscriptionStatus::Trial;
        sub.is_trial = true;
        sub.trial_reason = Some(TrialPolicy::keyword_reason("trial"));
        ledger.merge_detected(vec![sub]);

        let patch = SubscriptionPatch {
            amount: Some(129.0),
            ..SubscriptionPatch::default()
        };
        assert!(ledger.update("auto_1", patch));
        let sub = ledger.get("auto_1").unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Trial);
        assert_eq!(sub.amount, 129.0);
    }

    #[test]
    fn test_update_name_rederives_presentation() {
        let mut ledger = SubscriptionLedger::default();
        let id = ledger.insert(manual("Some Service", 300.0)).unwrap();
        let patch = SubscriptionPatch {
            service_name: Some("Spotify Family".into()),
            ..SubscriptionPatch::default()
        };
        assert!(ledger.update(&id, patch));
        let sub = ledger.get(&id).unwrap();
        assert_eq!(sub.category, "Music Streaming");
        assert_eq!(sub.color, "#1DB954");
    }

    #[test]
    fn test_update_and_delete_unknown_or_invalid() {
        let mut ledger = SubscriptionLedger::default();
        let id = ledger.insert(manual("Spotify", 119.0)).unwrap();
        assert!(!ledger.update("nope", SubscriptionPatch::default()));
        let bad = SubscriptionPatch {
            amount: Some(-3.0),
            ..SubscriptionPatch::default()
        };
        assert!(!ledger.update(&id, bad));
        assert_eq!(ledger.get(&id).unwrap().amount, 119.0);

        assert!(!ledger.delete("nope"));
        assert!(ledger.delete(&id));
        assert!(!ledger.delete(&id));
    }

    #[test]
    fn test_metrics() {
        let mut ledger = SubscriptionLedger::default();
        ledger.add(NewSubscription {
            billing_cycle: Some(BillingCycle::Monthly),
            ..manual("Netflix", 120.0)
        });
        ledger.add(NewSubscription {
            billing_cycle: Some(BillingCycle::Quarterly),
            ..manual("Spotify", 300.0)
        });
        ledger.add(NewSubscription {
            billing_cycle: Some(BillingCycle::Yearly),
            ..manual("Adobe", 1200.0)
        });
        let id = ledger.insert(manual("Hulu", 500.0)).unwrap();
        ledger.update(
            &id,
            SubscriptionPatch {
                status: Some(SubscriptionStatus::Inactive),
                ..SubscriptionPatch::default()
            },
        );

        let m = ledger.metrics_as_of(date(2024, 10, 5));
        assert_eq!(m.total_monthly, 120.0 + 100.0 + 100.0);
        assert_eq!(m.total_yearly, m.total_monthly * 12.0);
        assert_eq!(m.months_remaining, 3);
        assert_eq!(m.remaining_year_projection, m.total_monthly * 3.0);
        assert_eq!(m.active_count, 3);
        assert_eq!(m.inactive_count, 1);
        assert_eq!(m.by_service.get("Spotify"), Some(&100.0));
        assert!(!m.by_service.contains_key("Hulu"));
        assert_eq!(m.by_category.get("Video Streaming"), Some(&120.0));
    }

    #[test]
    fn test_metrics_january_and_december() {
        let ledger = SubscriptionLedger::default();
        assert_eq!(ledger.metrics_as_of(date(2024, 1, 1)).months_remaining, 12);
        assert_eq!(ledger.metrics_as_of(date(2024, 12, 31)).months_remaining, 1);
    }

    #[test]
    fn test_next_payment_date_offsets() {
        let mut sub = detected("Spotify", 119.0, "a");
        sub.last_payment = date(2024, 1, 31);
        assert_eq!(SubscriptionLedger::next_payment_date(&sub), date(2024, 3, 1));
        sub.billing_cycle = BillingCycle::Quarterly;
        assert_eq!(SubscriptionLedger::next_payment_date(&sub), date(2024, 4, 30));
        sub.billing_cycle = BillingCycle::Yearly;
        assert_eq!(SubscriptionLedger::next_payment_date(&sub), date(2025, 1, 30));
    }

    #[test]
    fn test_merge_detected_is_idempotent() {
        let mut ledger = SubscriptionLedger::default();
        let first = vec![detected("Spotify", 119.0, "auto_a"), detected("Netflix", 499.0, "auto_b")];
        assert_eq!(ledger.merge_detected(first.clone()), 2);

        // same ids again: skipped
        assert_eq!(ledger.merge_detected(first), 0);

        // fresh ids for the same series: refreshed in place
        let mut again = detected("SPOTIFY", 119.0, &format!("{}_new", AUTO_PREFIX));
        again.last_payment = date(2024, 4, 1);
        again.transaction_count = 4;
        assert_eq!(ledger.merge_detected(vec![again]), 1);

        assert_eq!(ledger.len(), 2);
        let spotify = ledger.get("auto_a").unwrap();
        assert_eq!(spotify.last_payment, date(2024, 4, 1));
        assert_eq!(spotify.transaction_count, 4);

        let m = ledger.metrics_as_of(date(2024, 6, 1));
        assert_eq!(m.total_monthly, 119.0 + 499.0);
    }

    #[test]
    fn test_upcoming_payments() {
        let mut ledger = SubscriptionLedger::default();
        let mut a = detected("Spotify", 119.0, "a");
        a.last_payment = date(2024, 3, 1);
        let mut b = detected("Netflix", 499.0, "b");
        b.last_payment = date(2024, 2, 20);
        let mut c = detected("Hulu", 599.0, "c");
        c.last_payment = date(2024, 3, 1);
        c.status = SubscriptionStatus::Inactive;
        ledger.merge_detected(vec![a, b, c]);

        let due = ledger.upcoming_payments(date(2024, 3, 20), 14);
        let names: Vec<&str> = due.iter().map(|(s, _)| s.service_name.as_str()).collect();
        assert_eq!(names, vec!["Netflix", "Spotify"]);
        assert_eq!(due[0].1, date(2024, 3, 21));
    }

    #[test]
    fn test_export_records() {
        let mut ledger = SubscriptionLedger::default();
        ledger.merge_detected(vec![detected("Spotify", 119.0, "auto_a")]);
        let records = ledger.export_records();
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r["id"], "auto_a");
        assert_eq!(r["amount"], "119.00");
        assert_eq!(r["billing_cycle"], "Monthly");
        assert_eq!(r["status"], "active");
        assert_eq!(r["next_payment"], "2024-03-31");
    }
}
