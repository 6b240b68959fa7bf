use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Model bundle source configuration
    pub bundle_source: BundleSource,
    pub model_bundle_path: Option<String>,
    pub model_bundle_url: Option<String>,
    pub output_directory: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BundleSource {
    #[serde(rename = "local")]
    Local,
    #[serde(rename = "remote")]
    Remote,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bundle_source: BundleSource::Local,
            model_bundle_path: Some("model_bundle.json".to_string()),
            model_bundle_url: Some("https://example.com/models/lead_scoring_bundle.json".to_string()),
            output_directory: Some("output".to_string()),
        }
    }
}

impl Config {
    pub fn load_from_file(file_path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(file_path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to_file(&self, file_path: &str) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(file_path, content)?;
        Ok(())
    }
}

/// Probability at or above which a lead is High priority
pub const HIGH_THRESHOLD: f64 = 0.70;
/// Probability at or above which a lead is Medium priority (below HIGH_THRESHOLD)
pub const MEDIUM_THRESHOLD: f64 = 0.40;
/// Probability at or above which a lead is predicted to convert
pub const CONVERT_THRESHOLD: f64 = 0.50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tier {
    High,
    Medium,
    Low,
}

impl Tier {
    /// Bucket a conversion probability into a priority tier.
    /// p >= 0.70 -> High; 0.40 <= p < 0.70 -> Medium; otherwise Low.
    pub fn from_probability(probability: f64) -> Self {
        if probability >= HIGH_THRESHOLD {
            Tier::High
        } else if probability >= MEDIUM_THRESHOLD {
            Tier::Medium
        } else {
            Tier::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::High => "High",
            Tier::Medium => "Medium",
            Tier::Low => "Low",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        match label.trim() {
            "High" => Some(Tier::High),
            "Medium" => Some(Tier::Medium),
            "Low" => Some(Tier::Low),
            _ => None,
        }
    }
}

/// One scored lead: the original CSV row plus the model outputs
#[derive(Debug, Clone)]
pub struct ScoredLead {
    pub record: Vec<String>,
    pub probability: f64,
    pub tier: Tier,
    pub likely_convert: bool,
}

impl ScoredLead {
    pub fn score_percent(&self) -> f64 {
        (self.probability * 100.0 * 100.0).round() / 100.0
    }

    pub fn prediction_label(&self) -> &'static str {
        if self.likely_convert {
            "Likely to Convert"
        } else {
            "Unlikely to Convert"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_thresholds_are_inclusive_lower_bounds() {
        assert_eq!(Tier::from_probability(0.70), Tier::High);
        assert_eq!(Tier::from_probability(0.6999), Tier::Medium);
        assert_eq!(Tier::from_probability(0.40), Tier::Medium);
        assert_eq!(Tier::from_probability(0.3999), Tier::Low);
        assert_eq!(Tier::from_probability(1.0), Tier::High);
        assert_eq!(Tier::from_probability(0.0), Tier::Low);
    }

    #[test]
    fn tier_labels_round_trip() {
        for tier in [Tier::High, Tier::Medium, Tier::Low] {
            assert_eq!(Tier::parse(tier.as_str()), Some(tier));
        }
        assert_eq!(Tier::parse("Unknown"), None);
    }

    #[test]
    fn score_percent_rounds_to_two_decimals() {
        let lead = ScoredLead {
            record: vec![],
            probability: 0.73456,
            tier: Tier::High,
            likely_convert: true,
        };
        assert!((lead.score_percent() - 73.46).abs() < 1e-9);
    }
}
