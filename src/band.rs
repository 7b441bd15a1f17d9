use std::collections::BTreeMap;
use std::fmt;

use serde::{Serialize, Serializer};

/// Completion band, ordered from best to worst. `NotAvailable` is reserved for
/// statistics that have no eligible students and is never produced by a real
/// percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Band {
    Excellent,
    VeryGood,
    Good,
    NeedsImprovement,
    Weak,
    NoCompletion,
    NotAvailable,
}

impl Band {
    /// The six bands a percentage can fall into, best first.
    pub const RANKED: [Band; 6] = [
        Band::Excellent,
        Band::VeryGood,
        Band::Good,
        Band::NeedsImprovement,
        Band::Weak,
        Band::NoCompletion,
    ];

    /// Lower bounds are inclusive: 90.0, 75.0, 60.0 and 40.0 belong to the
    /// higher band.
    pub fn from_percentage(percentage: Option<f64>) -> Band {
        match percentage {
            None => Band::NotAvailable,
            Some(p) if p.is_nan() => Band::NotAvailable,
            Some(p) if p >= 90.0 => Band::Excellent,
            Some(p) if p >= 75.0 => Band::VeryGood,
            Some(p) if p >= 60.0 => Band::Good,
            Some(p) if p >= 40.0 => Band::NeedsImprovement,
            Some(p) if p > 0.0 => Band::Weak,
            Some(_) => Band::NoCompletion,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Band::Excellent => "ممتاز جداً",
            Band::VeryGood => "جيد جداً",
            Band::Good => "جيد",
            Band::NeedsImprovement => "يحتاج إلى تحسين",
            Band::Weak => "ضعيف",
            Band::NoCompletion => "انعدام الإنجاز",
            Band::NotAvailable => "N/A",
        }
    }

    /// Hex display colour shared by every chart and report.
    pub fn color(self) -> &'static str {
        match self {
            Band::Excellent => "#E5E4E2",
            Band::VeryGood => "#FFD700",
            Band::Good => "#C0C0C0",
            Band::NeedsImprovement => "#CD7F32",
            Band::Weak => "#FF6600",
            Band::NoCompletion => "#C00000",
            Band::NotAvailable => "#CCCCCC",
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            Band::Excellent => "💎",
            Band::VeryGood => "🥇",
            Band::Good => "🥈",
            Band::NeedsImprovement => "⚠️",
            Band::Weak => "🔻",
            Band::NoCompletion => "❌",
            Band::NotAvailable => "➡️",
        }
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for Band {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

/// Per-band head counts. Every ranked band is always present, zero or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BandDistribution {
    counts: BTreeMap<Band, usize>,
}

impl Default for BandDistribution {
    fn default() -> Self {
        Self {
            counts: Band::RANKED.iter().map(|band| (*band, 0)).collect(),
        }
    }
}

impl BandDistribution {
    pub fn from_rates<I: IntoIterator<Item = f64>>(rates: I) -> Self {
        let mut distribution = Self::default();
        for rate in rates {
            distribution.add(Band::from_percentage(Some(rate)));
        }
        distribution
    }

    pub fn add(&mut self, band: Band) {
        if band != Band::NotAvailable {
            *self.counts.entry(band).or_insert(0) += 1;
        }
    }

    pub fn count(&self, band: Band) -> usize {
        self.counts.get(&band).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }
}

impl Serialize for BandDistribution {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.counts.iter().map(|(band, count)| (band.label(), count)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundaries_belong_to_the_higher_band() {
        let cases = [
            (100.0, "ممتاز جداً"),
            (90.0, "ممتاز جداً"),
            (89.99, "جيد جداً"),
            (75.0, "جيد جداً"),
            (74.99, "جيد"),
            (60.0, "جيد"),
            (59.99, "يحتاج إلى تحسين"),
            (40.0, "يحتاج إلى تحسين"),
            (39.99, "ضعيف"),
            (0.01, "ضعيف"),
            (0.0, "انعدام الإنجاز"),
        ];
        for (rate, label) in cases {
            assert_eq!(Band::from_percentage(Some(rate)).label(), label, "rate {rate}");
        }
    }

    #[test]
    fn missing_percentage_is_not_zero() {
        assert_eq!(Band::from_percentage(None).label(), "N/A");
        assert_ne!(Band::from_percentage(None), Band::from_percentage(Some(0.0)));
        assert_eq!(Band::from_percentage(Some(f64::NAN)), Band::NotAvailable);
    }

    #[test]
    fn every_band_has_its_own_colour() {
        let mut bands = Band::RANKED.to_vec();
        bands.push(Band::NotAvailable);
        let colours: std::collections::BTreeSet<&str> = bands.iter().map(|b| b.color()).collect();
        assert_eq!(colours.len(), 7);
        assert_ne!(Band::NotAvailable.color(), Band::NoCompletion.color());
        assert_eq!(Band::NotAvailable.color(), "#CCCCCC");
    }

    #[test]
    fn unrounded_rates_stay_below_the_boundary() {
        assert_eq!(Band::from_percentage(Some(89.996)), Band::VeryGood);
        assert_eq!(Band::from_percentage(Some(59.999)), Band::NeedsImprovement);
    }

    #[test]
    fn ranked_bands_are_ordered_best_first() {
        let mut sorted = Band::RANKED.to_vec();
        sorted.sort();
        assert_eq!(sorted, Band::RANKED.to_vec());
        assert!(Band::Excellent < Band::NoCompletion);
    }

    #[test]
    fn distribution_counts_every_band() {
        let distribution = BandDistribution::from_rates([100.0, 90.0, 50.0, 0.0, 12.5]);
        assert_eq!(distribution.count(Band::Excellent), 2);
        assert_eq!(distribution.count(Band::NeedsImprovement), 1);
        assert_eq!(distribution.count(Band::Weak), 1);
        assert_eq!(distribution.count(Band::NoCompletion), 1);
        assert_eq!(distribution.count(Band::Good), 0);
        assert_eq!(distribution.total(), 5);
        assert_eq!(serde_json::to_value(&distribution).unwrap().as_object().unwrap().len(), 6);
    }

    #[test]
    fn distribution_serializes_with_arabic_keys() {
        let distribution = BandDistribution::from_rates([95.0]);
        let json = serde_json::to_value(&distribution).unwrap();
        assert_eq!(json["ممتاز جداً"], 1);
        assert_eq!(json["ضعيف"], 0);
    }
}
