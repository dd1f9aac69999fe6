//! Classifier label tables.
//!
//! Harm categories follow the Llama Guard S1–S11 taxonomy; content flags mark
//! rows the filter drops. Any non-empty label other than [`SAFE_FLAG`] counts
//! as flagged.

use serde::{Deserialize, Serialize};

/// Label meaning "nothing to report".
pub const SAFE_FLAG: &str = "safe";

/// Harm category codes and display names.
pub const HARM_CATEGORIES: &[(&str, &str)] = &[
    ("S1", "Violent Crimes"),
    ("S2", "Non-Violent Crimes"),
    ("S3", "Sex-Related Crimes"),
    ("S4", "Child Sexual Exploitation"),
    ("S5", "Specialized Advice"),
    ("S6", "Privacy"),
    ("S7", "Intellectual Property"),
    ("S8", "Indiscriminate Weapons"),
    ("S9", "Hate"),
    ("S10", "Suicide & Self-Harm"),
    ("S11", "Sexual Content"),
];

/// Display name for a harm category code (`S3` → `Sex-Related Crimes`).
pub fn harm_category_name(code: &str) -> Option<&'static str> {
    let code = code.trim();
    HARM_CATEGORIES
        .iter()
        .find(|(c, _)| c.eq_ignore_ascii_case(code))
        .map(|(_, name)| *name)
}

/// Reasons a row is unwanted in the filtered dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentFlag {
    SensitiveTopic,
    Biased,
    Religious,
    Lottery,
    Scam,
    Advertisement,
    DataPoisoningAttack,
    Unusable,
}

impl ContentFlag {
    pub const ALL: [ContentFlag; 8] = [
        Self::SensitiveTopic,
        Self::Biased,
        Self::Religious,
        Self::Lottery,
        Self::Scam,
        Self::Advertisement,
        Self::DataPoisoningAttack,
        Self::Unusable,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SensitiveTopic => "sensitive_topic",
            Self::Biased => "biased",
            Self::Religious => "religious",
            Self::Lottery => "lottery",
            Self::Scam => "scam",
            Self::Advertisement => "advertisement",
            Self::DataPoisoningAttack => "data_poisoning_attack",
            Self::Unusable => "unusable",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|f| f.as_str().eq_ignore_ascii_case(s))
    }

    /// Every flag currently leads to the row being dropped.
    pub fn is_unwanted(&self) -> bool {
        true
    }
}

impl std::fmt::Display for ContentFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cell value absent: missing, blank, or a `nan` placeholder.
pub fn is_missing(value: Option<&str>) -> bool {
    match value.map(str::trim) {
        None | Some("") => true,
        Some(v) => v.eq_ignore_ascii_case("nan"),
    }
}

/// Cell carries a label other than [`SAFE_FLAG`].
pub fn is_flagged(value: Option<&str>) -> bool {
    !is_missing(value) && value.map(str::trim) != Some(SAFE_FLAG)
}
