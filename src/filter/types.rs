//! Filter verdicts and the per-pool report

use solana_sdk::pubkey::Pubkey;
use std::collections::BTreeMap;
use std::fmt;
use tracing::info;

/// Display value of a check that is turned off
pub const DISABLED: &str = "disabled";

/// Risk checks in evaluation order: cheap lookups first, holder
/// enumeration and LP math last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CheckKind {
    SocialsDex,
    Liquidity,
    Mutable,
    Freezable,
    MintRenounced,
    TopHolders,
    Burned,
    SocialsMetadata,
}

impl CheckKind {
    pub const ALL: [CheckKind; 8] = [
        CheckKind::SocialsDex,
        CheckKind::Liquidity,
        CheckKind::Mutable,
        CheckKind::Freezable,
        CheckKind::MintRenounced,
        CheckKind::TopHolders,
        CheckKind::Burned,
        CheckKind::SocialsMetadata,
    ];

    /// Row label in the printed report
    pub fn label(&self) -> &'static str {
        match self {
            CheckKind::SocialsDex => "Socials?",
            CheckKind::Liquidity => "Liquidity",
            CheckKind::Mutable => "Mutable?",
            CheckKind::Freezable => "Is Freezable?",
            CheckKind::MintRenounced => "Mint Renounced?",
            CheckKind::TopHolders => "Top Holders",
            CheckKind::Burned => "Is Burned?",
            CheckKind::SocialsMetadata => "Socials Metaplex?",
        }
    }
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome of one check
#[derive(Debug, Clone, PartialEq)]
pub struct FilterVerdict {
    pub checked: bool,
    pub passed: bool,
    pub display: String,
}

impl FilterVerdict {
    pub fn disabled() -> Self {
        Self {
            checked: false,
            passed: true,
            display: DISABLED.to_string(),
        }
    }

    pub fn pass(display: impl Into<String>) -> Self {
        Self {
            checked: true,
            passed: true,
            display: display.into(),
        }
    }

    pub fn fail(display: impl Into<String>) -> Self {
        Self {
            checked: true,
            passed: false,
            display: display.into(),
        }
    }

    /// Whether this verdict vetoes the buy
    pub fn skips(&self) -> bool {
        self.checked && !self.passed
    }
}

/// Every verdict for one pool
#[derive(Debug, Clone)]
pub struct FilterReport {
    pub pool: Pubkey,
    pub verdicts: BTreeMap<CheckKind, FilterVerdict>,
    /// Burned share of LP supply, shown next to the burn verdict
    pub locked_percentage: Option<String>,
}

impl FilterReport {
    /// Report with every check disabled
    pub fn new(pool: Pubkey) -> Self {
        Self {
            pool,
            verdicts: CheckKind::ALL
                .iter()
                .map(|kind| (*kind, FilterVerdict::disabled()))
                .collect(),
            locked_percentage: None,
        }
    }

    pub fn set(&mut self, kind: CheckKind, verdict: FilterVerdict) {
        self.verdicts.insert(kind, verdict);
    }

    pub fn verdict(&self, kind: CheckKind) -> &FilterVerdict {
        // every kind is seeded in new()
        &self.verdicts[&kind]
    }

    /// OR over enabled, failed checks
    pub fn skip(&self) -> bool {
        self.verdicts.values().any(FilterVerdict::skips)
    }

    /// Checks that vetoed the buy
    pub fn failed(&self) -> Vec<CheckKind> {
        self.verdicts
            .iter()
            .filter(|(_, v)| v.skips())
            .map(|(k, _)| *k)
            .collect()
    }

    /// Rows of the printed report, in display order
    pub fn rows(&self) -> Vec<(&'static str, String)> {
        let burned = self.verdict(CheckKind::Burned).display.clone();
        vec![
            ("New Liquidity", self.pool.to_string()),
            ("Liquidity", self.verdict(CheckKind::Liquidity).display.clone()),
            ("Mint Renounced?", self.verdict(CheckKind::MintRenounced).display.clone()),
            ("Top Holders", self.verdict(CheckKind::TopHolders).display.clone()),
            ("Mutable?", self.verdict(CheckKind::Mutable).display.clone()),
            ("Is Burned?", burned.clone()),
            ("Is Freezable?", self.verdict(CheckKind::Freezable).display.clone()),
            ("Is Locked?", burned),
            ("Socials?", self.verdict(CheckKind::SocialsDex).display.clone()),
            ("Socials Metaplex?", self.verdict(CheckKind::SocialsMetadata).display.clone()),
            (
                "Locked Percentage",
                self.locked_percentage
                    .clone()
                    .unwrap_or_else(|| DISABLED.to_string()),
            ),
        ]
    }

    /// Log the report, one line per row
    pub fn log(&self) {
        for (label, value) in self.rows() {
            info!(pool = %self.pool, "{:<18} {}", label, value);
        }
    }
}

impl fmt::Display for FilterReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (label, value) in self.rows() {
            writeln!(f, "{:<18} {}", label, value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_never_skips() {
        let verdict = FilterVerdict::disabled();
        assert!(!verdict.skips());
        assert_eq!(verdict.display, DISABLED);
    }

    #[test]
    fn test_fresh_report_is_all_disabled() {
        let report = FilterReport::new(Pubkey::new_unique());
        assert!(!report.skip());
        assert_eq!(report.verdicts.len(), CheckKind::ALL.len());
        for (label, value) in report.rows().into_iter().skip(1) {
            assert_eq!(value, DISABLED, "{} should be disabled", label);
        }
    }

    #[test]
    fn test_single_failure_skips() {
        let mut report = FilterReport::new(Pubkey::new_unique());
        report.set(CheckKind::Liquidity, FilterVerdict::pass("$5000.00 USD"));
        assert!(!report.skip());

        report.set(CheckKind::Freezable, FilterVerdict::fail("Yes"));
        assert!(report.skip());
        assert_eq!(report.failed(), vec![CheckKind::Freezable]);
    }

    #[test]
    fn test_checks_ordered_cheap_first() {
        let report = FilterReport::new(Pubkey::new_unique());
        let order: Vec<CheckKind> = report.verdicts.keys().copied().collect();
        assert_eq!(order.first(), Some(&CheckKind::SocialsDex));
        assert!(
            order.iter().position(|k| *k == CheckKind::Liquidity)
                < order.iter().position(|k| *k == CheckKind::TopHolders)
        );
    }

    #[test]
    fn test_rows_use_report_labels() {
        let mut report = FilterReport::new(Pubkey::new_unique());
        report.set(CheckKind::Burned, FilterVerdict::pass("Yes"));
        report.locked_percentage = Some("95.00%".to_string());

        let rows = report.rows();
        let get = |label: &str| rows.iter().find(|(l, _)| *l == label).unwrap().1.clone();
        assert_eq!(get("Is Burned?"), "Yes");
        assert_eq!(get("Is Locked?"), "Yes");
        assert_eq!(get("Locked Percentage"), "95.00%");
        assert_eq!(get("Socials Metaplex?"), DISABLED);
    }
}
