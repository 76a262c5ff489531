//! Category colors and the per-run vendor cache
//!
//! Both are shared across ingestion workers behind `Arc`, so they use
//! interior locking. Writes are idempotent per key: the first color stored
//! for a category wins, and a racing second writer reads it back.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::models::SubscriptionType;

/// Fixed palette used for categories without a predefined color
pub const PALETTE: &[&str] = &[
    "#FF6B6B", "#4ECDC4", "#45B7D1", "#96CEB4", "#FECA57", "#FF9FF3", "#54A0FF", "#5F27CD",
    "#00D2D3", "#FF9F43", "#10AC84", "#EE5253", "#0ABDE3", "#C8D6E5", "#576574", "#A8E6CF",
];

/// Neutral color used when a lock is poisoned and nothing better is known
pub const FALLBACK_COLOR: &str = "#D3D3D3";

/// Case-insensitive category/vendor name to hex color mapping
#[derive(Debug, Default)]
pub struct CategoryColorRegistry {
    colors: RwLock<HashMap<String, String>>,
}

impl CategoryColorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Color for `key`, allocating the next palette entry on first use
    pub fn color_for(&self, key: &str) -> String {
        let key = normalize_key(key);
        if let Some(color) = self.colors.read().ok().and_then(|c| c.get(&key).cloned()) {
            return color;
        }

        let Ok(mut colors) = self.colors.write() else {
            return FALLBACK_COLOR.to_string();
        };
        let next = PALETTE[colors.len() % PALETTE.len()].to_string();
        colors.entry(key).or_insert(next).clone()
    }

    /// Store `color` for `key` unless one is already registered; returns the effective color
    pub fn register(&self, key: &str, color: &str) -> String {
        let Ok(mut colors) = self.colors.write() else {
            return color.to_string();
        };
        colors
            .entry(normalize_key(key))
            .or_insert_with(|| color.to_string())
            .clone()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.colors
            .read()
            .ok()
            .and_then(|c| c.get(&normalize_key(key)).cloned())
    }

    pub fn len(&self) -> usize {
        self.colors.read().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase()
}

/// What a previous classification decided about a vendor
#[derive(Debug, Clone, PartialEq)]
pub struct VendorInfo {
    pub category: String,
    pub color: String,
    pub subscription_type: Option<SubscriptionType>,
    pub service_logo: Option<String>,
}

/// Within-run memo of vendor name to its resolved category/color/type
#[derive(Debug, Default)]
pub struct VendorCache {
    entries: RwLock<HashMap<String, VendorInfo>>,
}

impl VendorCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a vendor association (last write wins)
    pub fn record(&self, vendor: &str, info: VendorInfo) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(normalize_key(vendor), info);
        }
    }

    pub fn lookup(&self, vendor: &str) -> Option<VendorInfo> {
        self.entries
            .read()
            .ok()
            .and_then(|e| e.get(&normalize_key(vendor)).cloned())
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
