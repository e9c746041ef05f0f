//! Blood-pressure classification.
//!
//! Bands are checked from most to least severe and the first match wins.
//! Within a band either pressure reaching its threshold is enough.

use std::fmt;

/// Severity band of a reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classification {
    SevereHypertension,
    ModerateHypertension,
    MildHypertension,
    ElevatedHigh,
    Elevated,
    Normal,
    Unknown,
}

/// (systolic ≥, diastolic ≥, band), most severe first.
const BANDS: [(i32, i32, Classification); 5] = [
    (180, 110, Classification::SevereHypertension),
    (160, 100, Classification::ModerateHypertension),
    (140, 90, Classification::MildHypertension),
    (130, 85, Classification::ElevatedHigh),
    (120, 80, Classification::Elevated),
];

/// Classify a pair of pressures. Either value absent yields `Unknown`.
pub fn classify(systolic: Option<i32>, diastolic: Option<i32>) -> Classification {
    let (Some(systolic), Some(diastolic)) = (systolic, diastolic) else {
        return Classification::Unknown;
    };

    BANDS
        .iter()
        .find(|(s, d, _)| systolic >= *s || diastolic >= *d)
        .map(|(_, _, band)| *band)
        .unwrap_or(Classification::Normal)
}

impl Classification {
    /// Stable label persisted with the reading.
    pub fn label(self) -> &'static str {
        match self {
            Self::SevereHypertension => "severe-hypertension",
            Self::ModerateHypertension => "moderate-hypertension",
            Self::MildHypertension => "mild-hypertension",
            Self::ElevatedHigh => "elevated-high",
            Self::Elevated => "elevated",
            Self::Normal => "normal",
            Self::Unknown => "unknown",
        }
    }

    /// Text shown to the user.
    pub fn display(self) -> &'static str {
        match self {
            Self::SevereHypertension => "重度高血压 (请立即就医)",
            Self::ModerateHypertension => "中度高血压",
            Self::MildHypertension => "轻度高血压",
            Self::ElevatedHigh => "正常高值 (偏高)",
            Self::Elevated => "正常高值",
            Self::Normal => "正常血压",
            Self::Unknown => "未知",
        }
    }

    /// Inverse of [`Self::label`].
    pub fn from_label(label: &str) -> Option<Self> {
        [
            Self::SevereHypertension,
            Self::ModerateHypertension,
            Self::MildHypertension,
            Self::ElevatedHigh,
            Self::Elevated,
            Self::Normal,
            Self::Unknown,
        ]
        .into_iter()
        .find(|c| c.label() == label)
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display())
    }
}

/// Display text for a stored label. Labels written by older versions
/// (free text) are shown as they are.
pub fn display_label(label: &str) -> &str {
    Classification::from_label(label)
        .map(Classification::display)
        .unwrap_or(label)
}

#[cfg(test)]
mod tests {
    use super::*;
    use Classification::*;

    fn c(s: i32, d: i32) -> Classification {
        classify(Some(s), Some(d))
    }

    #[test]
    fn boundaries() {
        assert_eq!(c(180, 70), SevereHypertension);
        assert_eq!(c(179, 70), ModerateHypertension);
        assert_eq!(c(160, 60), ModerateHypertension);
        assert_eq!(c(159, 60), MildHypertension);
        assert_eq!(c(140, 60), MildHypertension);
        assert_eq!(c(139, 60), ElevatedHigh);
        assert_eq!(c(130, 85), ElevatedHigh);
        assert_eq!(c(129, 84), Elevated);
        assert_eq!(c(120, 60), Elevated);
        assert_eq!(c(119, 79), Normal);
    }

    #[test]
    fn diastolic_alone_can_escalate() {
        assert_eq!(c(100, 110), SevereHypertension);
        assert_eq!(c(100, 109), ModerateHypertension);
        assert_eq!(c(100, 90), MildHypertension);
        assert_eq!(c(100, 85), ElevatedHigh);
        assert_eq!(c(100, 80), Elevated);
    }

    #[test]
    fn first_match_wins() {
        assert_eq!(c(181, 70), SevereHypertension);
        assert_eq!(c(138, 88), MildHypertension);
    }

    #[test]
    fn absent_values_are_unknown() {
        assert_eq!(classify(None, Some(80)), Unknown);
        assert_eq!(classify(Some(120), None), Unknown);
        assert_eq!(classify(None, None), Unknown);
    }

    #[test]
    fn extreme_inputs_are_total() {
        assert_eq!(c(i32::MIN, i32::MIN), Normal);
        assert_eq!(c(i32::MAX, 0), SevereHypertension);
        assert_eq!(c(0, 0), Normal);
    }

    #[test]
    fn labels_round_trip() {
        for band in [
            SevereHypertension,
            ModerateHypertension,
            MildHypertension,
            ElevatedHigh,
            Elevated,
            Normal,
            Unknown,
        ] {
            assert_eq!(Classification::from_label(band.label()), Some(band));
        }
        assert_eq!(Classification::from_label("轻度高血压"), None);
    }

    #[test]
    fn legacy_labels_display_verbatim() {
        assert_eq!(display_label("mild-hypertension"), "轻度高血压");
        assert_eq!(display_label("正常高值 (偏高)"), "正常高值 (偏高)");
    }
}
