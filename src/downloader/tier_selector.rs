// TierSelector - quality tier negotiation
//
// The playurl service normally reports which tier it actually served. When it
// does not (or reports a tier we do not know), the resolver falls back to
// picking the nearest available tier itself:
// - exact match if the requested tier is available
// - otherwise the best tier below the request
// - otherwise the lowest tier above it

use std::collections::BTreeSet;

use super::models::QualityTier;

pub struct TierSelector;

impl TierSelector {
    /// Nearest available tier to `requested`, or `None` if nothing is available.
    pub fn nearest(requested: QualityTier, available: &BTreeSet<QualityTier>) -> Option<QualityTier> {
        if available.contains(&requested) {
            return Some(requested);
        }

        available
            .range(..requested)
            .next_back()
            .or_else(|| available.range(requested..).next())
            .copied()
    }

    /// Tiers from a list of raw `qn` codes; unknown codes are skipped.
    pub fn from_codes(codes: &[u32]) -> BTreeSet<QualityTier> {
        codes.iter().filter_map(|c| QualityTier::from_code(*c)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiers(list: &[QualityTier]) -> BTreeSet<QualityTier> {
        list.iter().copied().collect()
    }

    #[test]
    fn test_exact_match() {
        let available = tiers(&[QualityTier::P360, QualityTier::P720]);
        assert_eq!(
            TierSelector::nearest(QualityTier::P720, &available),
            Some(QualityTier::P720)
        );
    }

    #[test]
    fn test_falls_back_downwards() {
        let available = tiers(&[QualityTier::P360, QualityTier::P480, QualityTier::P1080Plus]);
        assert_eq!(
            TierSelector::nearest(QualityTier::P720, &available),
            Some(QualityTier::P480)
        );
    }

    #[test]
    fn test_falls_back_upwards_when_nothing_lower() {
        let available = tiers(&[QualityTier::P720, QualityTier::P1080]);
        assert_eq!(
            TierSelector::nearest(QualityTier::P360, &available),
            Some(QualityTier::P720)
        );
    }

    #[test]
    fn test_empty_set() {
        assert_eq!(TierSelector::nearest(QualityTier::P720, &BTreeSet::new()), None);
    }

    #[test]
    fn test_from_codes_skips_unknown() {
        let set = TierSelector::from_codes(&[127, 80, 64, 32, 16, 6]);
        assert_eq!(
            set,
            tiers(&[QualityTier::P360, QualityTier::P480, QualityTier::P720, QualityTier::P1080])
        );
    }
}
