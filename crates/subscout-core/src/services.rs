//! Static table of well-known subscription services
//!
//! Used to fill in category/logo/color for manually added subscriptions and
//! for subscriptions detected without AI metadata.

use crate::classify::heuristic::contains_word;
use crate::models::SubscriptionType;

/// A known service and how to present it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServicePattern {
    /// Lowercase word or phrase matched against names/descriptions
    pub pattern: &'static str,
    pub name: &'static str,
    pub category: &'static str,
    pub logo: &'static str,
    pub color: &'static str,
    pub subscription_type: SubscriptionType,
}

const fn service(
    pattern: &'static str,
    name: &'static str,
    category: &'static str,
    logo: &'static str,
    color: &'static str,
    subscription_type: SubscriptionType,
) -> ServicePattern {
    ServicePattern {
        pattern,
        name,
        category,
        logo,
        color,
        subscription_type,
    }
}

use SubscriptionType::*;

pub static SERVICE_PATTERNS: &[ServicePattern] = &[
    service("netflix", "Netflix", "Video Streaming", "🎬", "#E50914", Streaming),
    service("prime video", "Prime Video", "Video Streaming", "📺", "#00A8E1", Streaming),
    service("hotstar", "Disney+ Hotstar", "Video Streaming", "⭐", "#113CCF", Streaming),
    service("disney", "Disney+", "Video Streaming", "🏰", "#113CCF", Streaming),
    service("hulu", "Hulu", "Video Streaming", "📺", "#1CE783", Streaming),
    service("youtube premium", "YouTube Premium", "Video Streaming", "▶️", "#FF0000", Streaming),
    service("spotify", "Spotify", "Music Streaming", "🎵", "#1DB954", Music),
    service("apple music", "Apple Music", "Music Streaming", "🎵", "#FA243C", Music),
    service("jiosaavn", "JioSaavn", "Music Streaming", "🎶", "#2BC5B4", Music),
    service("gaana", "Gaana", "Music Streaming", "🎶", "#E72C30", Music),
    service("github", "GitHub", "Software & SaaS", "💻", "#24292E", Saas),
    service("notion", "Notion", "Software & SaaS", "📝", "#000000", Saas),
    service("adobe", "Adobe", "Software & SaaS", "🎨", "#FF0000", Saas),
    service("microsoft 365", "Microsoft 365", "Software & SaaS", "📊", "#D83B01", Saas),
    service("chatgpt", "ChatGPT", "Software & SaaS", "🤖", "#10A37F", Saas),
    service("openai", "OpenAI", "Software & SaaS", "🤖", "#10A37F", Saas),
    service("canva", "Canva", "Software & SaaS", "🎨", "#00C4CC", Saas),
    service("zoom", "Zoom", "Software & SaaS", "📹", "#2D8CFF", Saas),
    service("dropbox", "Dropbox", "Cloud Services", "📦", "#0061FF", CloudPlatform),
    service("icloud", "iCloud", "Cloud Services", "☁️", "#3693F3", CloudPlatform),
    service("google one", "Google One", "Cloud Services", "☁️", "#4285F4", CloudPlatform),
    service("aws", "AWS", "Cloud Services", "☁️", "#FF9900", CloudPlatform),
    service("swiggy one", "Swiggy One", "Food Delivery", "🍔", "#FC8019", FoodDelivery),
    service("zomato gold", "Zomato Gold", "Food Delivery", "🍕", "#E23744", FoodDelivery),
    service("airtel", "Airtel", "Telecom", "📱", "#ED1C24", Telecom),
    service("jio", "Jio", "Telecom", "📶", "#0A2885", Telecom),
];

/// First service whose pattern occurs in `text` as a whole word, case-insensitively
pub fn match_service(text: &str) -> Option<&'static ServicePattern> {
    let lower = text.to_lowercase();
    SERVICE_PATTERNS.iter().find(|s| contains_word(&lower, s.pattern))
}

/// Generic presentation for services not in the table
pub const GENERIC_CATEGORY: &str = "Subscription";
pub const GENERIC_LOGO: &str = "💳";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_service() {
        assert_eq!(match_service("NETFLIX.COM 1234").unwrap().name, "Netflix");
        assert_eq!(
            match_service("Payment to Spotify India").unwrap().category,
            "Music Streaming"
        );
        assert!(match_service("Corner Grocery").is_none());
    }

    #[test]
    fn test_patterns_do_not_match_inside_words() {
        assert!(match_service("Lottery draws refund").is_none());
        assert!(match_service("New laws on cards").is_none());
        assert!(match_service("Canvas Art Supplies").is_none());
        assert_eq!(match_service("AWS EMEA billing").unwrap().name, "AWS");
        assert_eq!(match_service("canva pro renewal").unwrap().name, "Canva");
    }

    #[test]
    fn test_specific_patterns_precede_generic_ones() {
        // "hotstar" must win over "disney" for "Disney+ Hotstar"
        assert_eq!(
            match_service("Disney+ Hotstar renewal").unwrap().name,
            "Disney+ Hotstar"
        );
    }
}
