//! Recurring-payment detection
//!
//! Groups classified transactions into series and turns each series into an
//! auto-detected [`Subscription`]:
//!
//! - Primary path: transactions flagged as subscriptions, grouped by
//!   (lowercased merchant, exact amount)
//! - Fallback path, used only when nothing is flagged: all transactions,
//!   grouped by (lowercased subject, exact amount), keeping groups of two or
//!   more whose dates fall on a regular cadence
//!
//! Transactions without an amount cannot form a series and are ignored.

use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use tracing::{debug, info};

use crate::classify::TrialPolicy;
use crate::colors::FALLBACK_COLOR;
use crate::ids::{ensure_unique_ids, generate_id, AUTO_PREFIX};
use crate::models::{BillingCycle, Cadence, Subscription, SubscriptionStatus, Transaction};
use crate::services::{match_service, GENERIC_CATEGORY, GENERIC_LOGO};

/// Fallback-path records carry no classifier confidence of their own
const FALLBACK_CONFIDENCE: u8 = 60;

/// Minimum series length on the fallback path
const FALLBACK_MIN_OCCURRENCES: usize = 2;

/// `(last - first) / (count - 1)`, or None for fewer than two dates
pub fn average_cycle_days(dates: &[NaiveDate]) -> Option<f64> {
    if dates.len() < 2 {
        return None;
    }
    let first = dates.iter().min()?;
    let last = dates.iter().max()?;
    Some((*last - *first).num_days() as f64 / (dates.len() - 1) as f64)
}

/// Cadence implied by the dates alone; None when there are fewer than two
pub fn pattern_cadence(dates: &[NaiveDate]) -> Option<Cadence> {
    average_cycle_days(dates).map(Cadence::from_average_days)
}

/// Transactions sharing a grouping key, in input order
struct Series<'a> {
    transactions: Vec<&'a Transaction>,
}

impl<'a> Series<'a> {
    fn first(&self) -> &'a Transaction {
        self.transactions[0]
    }

    fn amount(&self) -> f64 {
        self.first().amount.unwrap_or_default()
    }

    fn dates(&self) -> Vec<NaiveDate> {
        self.transactions.iter().filter_map(|t| t.date).collect()
    }

    /// Earliest and latest dates; today when no transaction is dated
    fn date_range(&self) -> (NaiveDate, NaiveDate) {
        let dates = self.dates();
        let today = Utc::now().date_naive();
        (
            dates.iter().min().copied().unwrap_or(today),
            dates.iter().max().copied().unwrap_or(today),
        )
    }

    /// Most frequent category; ties go to the one seen first
    fn majority_category(&self) -> &'a Transaction {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for t in &self.transactions {
            *counts.entry(t.category.as_str()).or_default() += 1;
        }
        let mut best = self.first();
        let mut best_count = 0;
        for &t in &self.transactions {
            let count = counts[t.category.as_str()];
            if count > best_count {
                best = t;
                best_count = count;
            }
        }
        best
    }

    fn mean_confidence(&self) -> u8 {
        let sum: u32 = self.transactions.iter().map(|t| t.confidence as u32).sum();
        (sum as f64 / self.transactions.len() as f64).round() as u8
    }

    fn billing_hint(&self) -> Option<BillingCycle> {
        self.transactions.iter().find_map(|t| t.billing_cycle)
    }
}

/// Group by `key`, keeping first-appearance order
fn group_by<'a, K, F>(transactions: impl Iterator<Item = &'a Transaction>, key: F) -> Vec<Series<'a>>
where
    K: std::hash::Hash + Eq,
    F: Fn(&Transaction) -> K,
{
    let mut index: HashMap<K, usize> = HashMap::new();
    let mut groups: Vec<Series<'a>> = Vec::new();
    for t in transactions.filter(|t| t.amount.is_some()) {
        let slot = *index.entry(key(t)).or_insert_with(|| {
            groups.push(Series {
                transactions: Vec::new(),
            });
            groups.len() - 1
        });
        groups[slot].transactions.push(t);
    }
    groups
}

fn amount_key(t: &Transaction) -> u64 {
    t.amount.unwrap_or_default().to_bits()
}

/// Turns classified transactions into auto-detected subscriptions
#[derive(Debug, Clone, Copy, Default)]
pub struct SubscriptionDetector {
    trial: TrialPolicy,
}

impl SubscriptionDetector {
    pub fn new(trial: TrialPolicy) -> Self {
        Self { trial }
    }

    /// Detect subscriptions; ids are unique within the returned set
    pub fn detect(&self, transactions: &[Transaction]) -> Vec<Subscription> {
        let flagged: Vec<&Transaction> = transactions.iter().filter(|t| t.is_subscription).collect();

        let mut subscriptions = if flagged.is_empty() {
            debug!(count = transactions.len(), "No flagged transactions, using subject grouping");
            self.detect_by_subject(transactions)
        } else {
            self.detect_flagged(&flagged)
        };

        ensure_unique_ids(&mut subscriptions);
        info!(count = subscriptions.len(), "Subscriptions detected");
        subscriptions
    }

    fn detect_flagged(&self, flagged: &[&Transaction]) -> Vec<Subscription> {
        let groups = group_by(flagged.iter().copied(), |t| {
            (t.merchant.trim().to_lowercase(), amount_key(t))
        });

        groups
            .iter()
            .enumerate()
            .map(|(i, series)| {
                let first = series.first();
                let amount = series.amount();
                let (start, last) = series.date_range();

                // an explicit hint beats the date pattern; irregular falls back to monthly
                let billing_cycle = series
                    .billing_hint()
                    .or_else(|| pattern_cadence(&series.dates()).and_then(|c| c.billing_cycle()))
                    .unwrap_or(BillingCycle::Monthly);

                let trial_reason = self
                    .trial
                    .evaluate(Some(amount), &format!("{} {}", first.merchant, first.description));

                let representative = series.majority_category();
                let service_logo = series
                    .transactions
                    .iter()
                    .find_map(|t| t.service_logo.clone())
                    .or_else(|| match_service(&first.merchant).map(|s| s.logo.to_string()));

                Subscription {
                    id: generate_id(AUTO_PREFIX, &first.merchant, amount, i as u64),
                    service_name: first.merchant.clone(),
                    category: representative.category.clone(),
                    color: representative.color.clone(),
                    service_logo,
                    amount,
                    billing_cycle,
                    start_date: start,
                    last_payment: last,
                    status: if trial_reason.is_some() {
                        SubscriptionStatus::Trial
                    } else {
                        SubscriptionStatus::Active
                    },
                    is_trial: trial_reason.is_some(),
                    trial_reason,
                    auto_detected: true,
                    confidence: series.mean_confidence(),
                    transaction_count: series.transactions.len() as u32,
                    bank: first.bank.clone(),
                }
            })
            .collect()
    }

    fn detect_by_subject(&self, transactions: &[Transaction]) -> Vec<Subscription> {
        let groups = group_by(transactions.iter(), |t| {
            (t.description.trim().to_lowercase(), amount_key(t))
        });

        groups
            .iter()
            .filter(|series| series.transactions.len() >= FALLBACK_MIN_OCCURRENCES)
            .enumerate()
            .filter_map(|(i, series)| {
                let billing_cycle = pattern_cadence(&series.dates())?.billing_cycle()?;
                let first = series.first();
                let amount = series.amount();
                let (start, last) = series.date_range();

                let service = match_service(&first.description);
                let (service_name, category, logo, color) = match service {
                    Some(s) => (s.name.to_string(), s.category, s.logo, s.color),
                    None => (
                        first.description.trim().to_string(),
                        GENERIC_CATEGORY,
                        GENERIC_LOGO,
                        FALLBACK_COLOR,
                    ),
                };

                let trial_reason = self
                    .trial
                    .evaluate(Some(amount), &format!("{} {}", service_name, first.description));

                Some(Subscription {
                    id: generate_id(AUTO_PREFIX, &service_name, amount, i as u64),
                    service_name,
                    category: category.to_string(),
                    color: color.to_string(),
                    service_logo: Some(logo.to_string()),
                    amount,
                    billing_cycle,
                    start_date: start,
                    last_payment: last,
                    status: if trial_reason.is_some() {
                        SubscriptionStatus::Trial
                    } else {
                        SubscriptionStatus::Active
                    },
                    is_trial: trial_reason.is_some(),
                    trial_reason,
                    auto_detected: true,
                    confidence: FALLBACK_CONFIDENCE,
                    transaction_count: series.transactions.len() as u32,
                    bank: first.bank.clone(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ClassificationSource;
    use std::collections::HashSet;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn tx(merchant: &str, amount: f64, day: NaiveDate, is_subscription: bool) -> Transaction {
        Transaction {
            message_id: format!("{}-{}", merchant, day),
            date: Some(day),
            description: format!("{} payment", merchant),
            amount: Some(amount),
            merchant: merchant.into(),
            category: "Music Streaming".into(),
            color: "#1DB954".into(),
            confidence: 80,
            bank: "HDFC Bank".into(),
            is_subscription,
            subscription_type: None,
            billing_cycle: None,
            service_logo: None,
            is_trial: false,
            trial_reason: None,
            source: ClassificationSource::Ai,
        }
    }

    #[test]
    fn test_monthly_series_of_three() {
        let start = date(2024, 1, 1);
        let txs: Vec<Transaction> = (0..3)
            .map(|i| tx("SPOTIFY", 119.0, start + chrono::Duration::days(30 * i), true))
            .collect();

        let subs = SubscriptionDetector::default().detect(&txs);
        assert_eq!(subs.len(), 1);
        let s = &subs[0];
        assert_eq!(s.billing_cycle, BillingCycle::Monthly);
        assert_eq!(s.transaction_count, 3);
        assert_eq!(s.start_date, start);
        assert_eq!(s.last_payment, date(2024, 3, 1));
        assert_eq!(s.status, SubscriptionStatus::Active);
        assert!(s.auto_detected);
        assert!(s.id.starts_with("auto_"));
    }

    #[test]
    fn test_single_occurrence_uses_hint_or_monthly() {
        let mut yearly = tx("Adobe", 5999.0, date(2024, 3, 1), true);
        yearly.billing_cycle = Some(BillingCycle::Yearly);
        let plain = tx("Notion", 800.0, date(2024, 3, 1), true);

        let subs = SubscriptionDetector::default().detect(&[yearly, plain]);
        assert_eq!(subs[0].billing_cycle, BillingCycle::Yearly);
        assert_eq!(subs[1].billing_cycle, BillingCycle::Monthly);
    }

    #[test]
    fn test_hint_overrides_pattern() {
        let mut a = tx("Gym", 1500.0, date(2024, 1, 1), true);
        let b = tx("Gym", 1500.0, date(2024, 1, 31), true);
        a.billing_cycle = Some(BillingCycle::Quarterly);
        let subs = SubscriptionDetector::default().detect(&[a, b]);
        assert_eq!(subs[0].billing_cycle, BillingCycle::Quarterly);
    }

    #[test]
    fn test_irregular_primary_group_defaults_to_monthly() {
        let a = tx("Gym", 1500.0, date(2024, 1, 1), true);
        let b = tx("Gym", 1500.0, date(2024, 3, 1), true);
        let subs = SubscriptionDetector::default().detect(&[a, b]);
        assert_eq!(subs[0].billing_cycle, BillingCycle::Monthly);
    }

    #[test]
    fn test_grouping_is_case_insensitive_and_amount_exact() {
        let txs = vec![
            tx("Spotify", 119.0, date(2024, 1, 1), true),
            tx("SPOTIFY", 119.0, date(2024, 1, 31), true),
            tx("spotify", 129.0, date(2024, 3, 1), true),
        ];
        let subs = SubscriptionDetector::default().detect(&txs);
        assert_eq!(subs.len(), 2);
        assert_eq!(subs[0].transaction_count, 2);
        assert_eq!(subs[1].transaction_count, 1);
    }

    #[test]
    fn test_trial_is_reevaluated() {
        let mut t = tx("Netflix", 5.0, date(2024, 1, 1), true);
        t.is_trial = false;
        let subs = SubscriptionDetector::default().detect(&[t]);
        assert_eq!(subs[0].status, SubscriptionStatus::Trial);
        assert!(subs[0].is_trial);

        let mut t = tx("Preview Club", 499.0, date(2024, 1, 1), true);
        t.is_trial = true;
        let subs = SubscriptionDetector::default().detect(&[t]);
        assert!(subs[0].is_trial);

        let mut t = tx("Netflix", 499.0, date(2024, 1, 1), true);
        t.is_trial = true;
        let subs = SubscriptionDetector::default().detect(&[t]);
        assert!(!subs[0].is_trial);
    }

    #[test]
    fn test_fallback_groups_by_subject_and_requires_regular_cadence() {
        let mut txs = Vec::new();
        for (i, d) in [date(2024, 1, 5), date(2024, 2, 5), date(2024, 3, 5)].into_iter().enumerate() {
            let mut t = tx("Unknown Vendor", 499.0, d, false);
            t.description = "Netflix renewal".into();
            t.message_id = format!("n{}", i);
            txs.push(t);
        }
        // two messages 50 days apart: irregular, discarded
        for d in [date(2024, 1, 1), date(2024, 2, 20)] {
            let mut t = tx("Unknown Vendor", 250.0, d, false);
            t.description = "Cafe bill".into();
            txs.push(t);
        }
        // only one occurrence: discarded
        txs.push(tx("Once", 10_000.0, date(2024, 1, 1), false));

        let subs = SubscriptionDetector::default().detect(&txs);
        assert_eq!(subs.len(), 1);
        let s = &subs[0];
        assert_eq!(s.service_name, "Netflix");
        assert_eq!(s.category, "Video Streaming");
        assert_eq!(s.billing_cycle, BillingCycle::Monthly);
        assert_eq!(s.transaction_count, 3);
        assert_eq!(s.confidence, FALLBACK_CONFIDENCE);
    }

    #[test]
    fn test_fallback_generic_metadata() {
        let txs: Vec<Transaction> = [date(2024, 1, 1), date(2024, 4, 1)]
            .into_iter()
            .map(|d| {
                let mut t = tx("x", 300.0, d, false);
                t.description = "Society maintenance".into();
                t
            })
            .collect();
        let subs = SubscriptionDetector::default().detect(&txs);
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].billing_cycle, BillingCycle::Quarterly);
        assert_eq!(subs[0].category, GENERIC_CATEGORY);
        assert_eq!(subs[0].service_logo.as_deref(), Some(GENERIC_LOGO));
    }

    #[test]
    fn test_transactions_without_amount_are_ignored() {
        let mut t = tx("Spotify", 119.0, date(2024, 1, 1), true);
        t.amount = None;
        assert!(SubscriptionDetector::default().detect(&[t]).is_empty());
    }

    #[test]
    fn test_repeated_runs_produce_fresh_unique_ids() {
        let txs = vec![
            tx("Spotify", 119.0, date(2024, 1, 1), true),
            tx("Netflix", 499.0, date(2024, 1, 1), true),
        ];
        let detector = SubscriptionDetector::default();
        let first = detector.detect(&txs);
        let second = detector.detect(&txs);
        let ids: HashSet<&str> = first.iter().chain(&second).map(|s| s.id.as_str()).collect();
        assert_eq!(ids.len(), 4);
    }

    #[test]
    fn test_average_cycle_days() {
        assert_eq!(average_cycle_days(&[date(2024, 1, 1)]), None);
        assert_eq!(
            average_cycle_days(&[date(2024, 1, 1), date(2024, 1, 31), date(2024, 3, 1)]),
            Some(30.0)
        );
        assert_eq!(
            pattern_cadence(&[date(2023, 1, 1), date(2024, 1, 1)]),
            Some(Cadence::Yearly)
        );
    }
}
