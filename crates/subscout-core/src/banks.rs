//! Known bank alert senders
//!
//! Used twice: the ingestor builds one `FROM` search per sender domain, and
//! each fetched message is attributed to a bank by matching its `From` header.

/// A bank and the sender fragments its alerts come from
#[derive(Debug, Clone, Copy)]
pub struct BankSender {
    pub name: &'static str,
    /// Substrings matched case-insensitively against the From header
    pub patterns: &'static [&'static str],
}

pub const UNKNOWN_BANK: &str = "Unknown Bank";

pub static BANK_SENDERS: &[BankSender] = &[
    BankSender {
        name: "State Bank of India",
        patterns: &["donotreply.sbiatm@alerts.sbi.co.in", "sbi.co.in", "sbicard.com"],
    },
    BankSender {
        name: "HDFC Bank",
        patterns: &["alerts@hdfcbank.net", "hdfcbank.net", "hdfcbank.com"],
    },
    BankSender {
        name: "ICICI Bank",
        patterns: &["icicibank.com"],
    },
    BankSender {
        name: "Axis Bank",
        patterns: &["axisbank.com"],
    },
    BankSender {
        name: "Kotak Mahindra Bank",
        patterns: &["kotak.com"],
    },
    BankSender {
        name: "Chase",
        patterns: &["chase.com"],
    },
    BankSender {
        name: "Bank of America",
        patterns: &["bankofamerica.com", "ealerts.bankofamerica.com"],
    },
    BankSender {
        name: "American Express",
        patterns: &["americanexpress.com", "aexp.com"],
    },
    BankSender {
        name: "Capital One",
        patterns: &["capitalone.com"],
    },
];

/// Attribute a message to a bank from its From header
pub fn identify_bank(sender: &str) -> &'static str {
    let sender = sender.to_lowercase();
    BANK_SENDERS
        .iter()
        .find(|bank| bank.patterns.iter().any(|p| sender.contains(p)))
        .map(|bank| bank.name)
        .unwrap_or(UNKNOWN_BANK)
}

/// One search address per bank (the first pattern is the canonical sender)
pub fn sender_search_terms() -> impl Iterator<Item = &'static str> {
    BANK_SENDERS.iter().filter_map(|bank| bank.patterns.first().copied())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identify_bank() {
        assert_eq!(
            identify_bank("SBI <donotreply.sbiatm@alerts.sbi.co.in>"),
            "State Bank of India"
        );
        assert_eq!(identify_bank("HDFC Bank <Alerts@HDFCBank.net>"), "HDFC Bank");
        assert_eq!(identify_bank("noreply@example.com"), UNKNOWN_BANK);
    }

    #[test]
    fn test_sender_search_terms_one_per_bank() {
        assert_eq!(sender_search_terms().count(), BANK_SENDERS.len());
    }
}
