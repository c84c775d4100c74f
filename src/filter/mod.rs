//! Risk filters for newly listed pools

pub mod checks;
pub mod risk_chain;
pub mod socials;
pub mod types;

pub use risk_chain::RiskFilterChain;
pub use socials::{HttpSocialLookup, SocialLookup};
pub use types::{CheckKind, FilterReport, FilterVerdict};
