//! The moderation rule itself.

use shared_types::entities::ProductStatus;

/// Substrings that reject a product name outright. Matching is
/// case-insensitive and ignores word boundaries.
const DENY_LIST: &[&str] = &[
    "counterfeit",
    "replica",
    "stolen",
    "weapon",
    "fake",
    "contraband",
];

/// Judge a product name. Empty or whitespace-only names are rejected;
/// everything else passes unless it contains a denied substring.
#[must_use]
pub fn moderate_name(name: &str) -> ProductStatus {
    if name.trim().is_empty() {
        return ProductStatus::Rejected;
    }
    let lowered = name.to_lowercase();
    if DENY_LIST.iter().any(|term| lowered.contains(term)) {
        ProductStatus::Rejected
    } else {
        ProductStatus::Approved
    }
}
