//! Subscription identifiers
//!
//! Ids are a truncated SHA-256 over the normalized name, the amount in minor
//! units, the current time and a per-record disambiguator, prefixed with
//! the record's origin. Hash collisions are not assumed away:
//! [`ensure_unique_ids`] suffixes duplicates deterministically.

use std::collections::HashSet;

use chrono::Utc;
use sha2::{Digest, Sha256};

use crate::models::Subscription;

pub const AUTO_PREFIX: &str = "auto";
pub const MANUAL_PREFIX: &str = "manual";

/// Hex characters kept from the digest
const ID_HASH_LEN: usize = 16;

/// Lowercase alphanumerics, single spaces
pub fn normalize_name(name: &str) -> String {
    name.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Amount in hundredths, so 119.00 and 119.0 hash alike
pub fn minor_units(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

pub fn generate_id(prefix: &str, name: &str, amount: f64, disambiguator: u64) -> String {
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    generate_id_at(prefix, name, amount, nanos, disambiguator)
}

/// Deterministic variant of [`generate_id`] for a fixed timestamp
pub fn generate_id_at(prefix: &str, name: &str, amount: f64, nanos: i64, disambiguator: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_name(name).as_bytes());
    hasher.update(minor_units(amount).to_be_bytes());
    hasher.update(nanos.to_be_bytes());
    hasher.update(disambiguator.to_be_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("{}_{}", prefix, &digest[..ID_HASH_LEN])
}

/// `base` if free, else the first of `base_1`, `base_2`, ... not in `taken`
pub fn unique_id(base: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(base) {
        return base.to_string();
    }
    (1u64..)
        .map(|n| format!("{}_{}", base, n))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| base.to_string())
}

/// Rewrite duplicate ids in place; the first occurrence keeps its id
pub fn ensure_unique_ids(subscriptions: &mut [Subscription]) {
    let mut taken = HashSet::with_capacity(subscriptions.len());
    for sub in subscriptions.iter_mut() {
        let id = unique_id(&sub.id, &taken);
        if id != sub.id {
            tracing::debug!(original = %sub.id, id = %id, "Disambiguated duplicate subscription id");
            sub.id = id;
        }
        taken.insert(sub.id.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BillingCycle, SubscriptionStatus};
    use chrono::NaiveDate;

    fn sub(id: &str) -> Subscription {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        Subscription {
            id: id.into(),
            service_name: "Spotify".into(),
            category: "Music Streaming".into(),
            color: "#1DB954".into(),
            service_logo: None,
            amount: 119.0,
            billing_cycle: BillingCycle::Monthly,
            start_date: date,
            last_payment: date,
            status: SubscriptionStatus::Active,
            is_trial: false,
            trial_reason: None,
            auto_detected: true,
            confidence: 80,
            transaction_count: 1,
            bank: "HDFC Bank".into(),
        }
    }

    #[test]
    fn test_id_shape_and_determinism() {
        let a = generate_id_at(AUTO_PREFIX, "Spotify", 119.0, 1_000, 0);
        let b = generate_id_at(AUTO_PREFIX, "  SPOTIFY ", 119.00, 1_000, 0);
        assert_eq!(a, b);
        assert!(a.starts_with("auto_"));
        assert_eq!(a.len(), "auto_".len() + ID_HASH_LEN);
    }

    #[test]
    fn test_same_merchant_amount_different_time_or_group() {
        let a = generate_id_at(AUTO_PREFIX, "Spotify", 119.0, 1_000, 0);
        assert_ne!(a, generate_id_at(AUTO_PREFIX, "Spotify", 119.0, 2_000, 0));
        assert_ne!(a, generate_id_at(AUTO_PREFIX, "Spotify", 119.0, 1_000, 1));
        assert_ne!(a, generate_id_at(MANUAL_PREFIX, "Spotify", 119.0, 1_000, 0));
    }

    #[test]
    fn test_ensure_unique_ids_suffixes_deterministically() {
        let mut subs = vec![sub("auto_x"), sub("auto_x"), sub("auto_x_1"), sub("auto_x")];
        ensure_unique_ids(&mut subs);
        let ids: Vec<&str> = subs.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["auto_x", "auto_x_1", "auto_x_1_1", "auto_x_2"]);

        let unique: HashSet<&str> = ids.iter().copied().collect();
        assert_eq!(unique.len(), subs.len());
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("NETFLIX.COM  Premium"), "netflix com premium");
        assert_eq!(minor_units(119.0), 11900);
        assert_eq!(minor_units(0.1 + 0.2), 30);
    }
}
