//! Pure decision math behind the risk checks

use solana_sdk::pubkey::Pubkey;

use super::types::FilterVerdict;

/// Marks an LP burn percentage that could not be computed
pub const BURN_UNAVAILABLE: f64 = -1.0;

/// Liquidity range check on a USD figure
pub fn liquidity_verdict(liquidity_usd: f64, min_usd: f64, max_usd: f64) -> FilterVerdict {
    let display = format!("${:.2} USD", liquidity_usd.round());
    if liquidity_usd < min_usd || liquidity_usd > max_usd {
        FilterVerdict::fail(display)
    } else {
        FilterVerdict::pass(display)
    }
}

/// Share of the LP supply recorded at pool creation that no longer exists.
///
/// The recorded reserve is rounded to whole LP tokens; the live supply is
/// compared in UI units. Returns [`BURN_UNAVAILABLE`] when the rounded
/// reserve is zero.
pub fn burn_percentage(lp_reserve: u64, lp_supply: u64, decimals: u8) -> f64 {
    let scale = 10f64.powi(decimals as i32);
    let reserve = (lp_reserve as f64 / scale).round();
    if reserve <= 0.0 {
        return BURN_UNAVAILABLE;
    }
    let supply = lp_supply as f64 / scale;
    (reserve - supply) / reserve * 100.0
}

/// Lock/burn verdict. Any negative percentage (including the unavailable
/// marker) fails regardless of the floor, and shows as unknown rather
/// than as a below-floor "No".
pub fn burn_verdict(burn_pct: f64, min_pct: f64) -> (FilterVerdict, String) {
    if !burn_pct.is_finite() || burn_pct < 0.0 {
        return (FilterVerdict::fail("Unknown"), "unavailable".to_string());
    }
    let shown = format!("{:.2}%", burn_pct);
    if burn_pct < min_pct {
        (FilterVerdict::fail("No"), shown)
    } else {
        (FilterVerdict::pass("Yes"), shown)
    }
}

/// One entry of the largest-holders list, with its owning wallet if the
/// token account could be decoded
#[derive(Debug, Clone, PartialEq)]
pub struct Holder {
    pub token_account: Pubkey,
    pub owner: Option<Pubkey>,
    pub ui_amount: f64,
}

/// Combined share of supply held by the `count` largest real holders.
///
/// Accounts owned by `custody_owner` (the AMM authority) or listed in
/// `custody_accounts` (the pool's own vaults) are pool liquidity, not
/// holders, and are left out. `None` when supply or holder data is missing,
/// or when every listed holder is pool custody.
pub fn top_holder_concentration(
    holders: &[Holder],
    total_supply_ui: f64,
    custody_owner: &Pubkey,
    custody_accounts: &[Pubkey],
    count: usize,
) -> Option<f64> {
    if holders.is_empty() || !(total_supply_ui > 0.0) {
        return None;
    }

    let mut real: Vec<&Holder> = holders
        .iter()
        .filter(|h| h.owner.as_ref() != Some(custody_owner))
        .filter(|h| !custody_accounts.contains(&h.token_account))
        .collect();
    if real.is_empty() {
        return None;
    }
    real.sort_by(|a, b| b.ui_amount.total_cmp(&a.ui_amount));

    Some(
        real.iter()
            .take(count)
            .map(|h| h.ui_amount / total_supply_ui * 100.0)
            .sum(),
    )
}

pub fn top_holder_verdict(concentration: Option<f64>, max_pct: f64) -> FilterVerdict {
    match concentration {
        None => FilterVerdict::fail("No information"),
        Some(pct) if pct > max_pct => FilterVerdict::fail(format!("{:.2}%", pct)),
        Some(pct) => FilterVerdict::pass(format!("{:.2}%", pct)),
    }
}

/// Social presence verdict
pub fn socials_verdict(links: Option<usize>, min_links: usize) -> FilterVerdict {
    match links {
        Some(n) if n >= min_links => FilterVerdict::pass("Yes"),
        _ => FilterVerdict::fail("No"),
    }
}
