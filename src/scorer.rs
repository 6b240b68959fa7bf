use crate::artifacts::ModelBundle;
use crate::models::{ScoredLead, Tier, CONVERT_THRESHOLD};

#[derive(Debug, Clone)]
pub struct ScoreSummary {
    pub total_leads: usize,
    pub high_count: usize,
    pub medium_count: usize,
    pub low_count: usize,
    pub average_score_percent: f64,
    pub unseen_substitutions: usize,
}

impl ScoreSummary {
    pub fn tier_percent(&self, count: usize) -> f64 {
        if self.total_leads == 0 {
            0.0
        } else {
            count as f64 / self.total_leads as f64 * 100.0
        }
    }
}

#[derive(Debug, Clone)]
pub struct BatchResult {
    pub leads: Vec<ScoredLead>, // sorted by probability, best first
    pub summary: ScoreSummary,
}

pub struct LeadScorer<'a> {
    pub bundle: &'a ModelBundle,
}

impl<'a> LeadScorer<'a> {
    pub fn new(bundle: &'a ModelBundle) -> Self {
        Self { bundle }
    }

    /// Required columns that are absent from the uploaded headers.
    /// A non-empty result rejects the whole batch.
    pub fn missing_columns(&self, headers: &[String]) -> Vec<String> {
        self.bundle
            .required_columns()
            .iter()
            .filter(|col| !headers.iter().any(|h| h == *col))
            .map(|col| col.to_string())
            .collect()
    }

    /// Encode one row through the trained category tables, then scale.
    /// Returns the feature vector and how many values fell back to the
    /// default code because they were unseen at training time.
    fn encode_row(&self, headers: &[String], row: &[String]) -> (Vec<f64>, usize) {
        let mut features = Vec::with_capacity(self.bundle.encoders.len());
        let mut substitutions = 0;

        for encoder in &self.bundle.encoders {
            let raw = headers
                .iter()
                .position(|h| h == &encoder.field)
                .and_then(|i| row.get(i))
                .map(|v| v.as_str())
                .unwrap_or("");
            let (code, fallback_used) = encoder.encode(raw);
            if fallback_used {
                substitutions += 1;
            }
            features.push(code);
        }

        self.bundle.scaler.transform(&mut features);
        (features, substitutions)
    }

    /// Score a whole upload, row-batch-at-a-time. Headers must already be
    /// validated with `missing_columns`.
    pub fn score_batch(&self, headers: &[String], rows: &[Vec<String>]) -> BatchResult {
        let mut leads = Vec::with_capacity(rows.len());
        let mut unseen_substitutions = 0;

        for row in rows {
            let (features, substitutions) = self.encode_row(headers, row);
            unseen_substitutions += substitutions;

            let probability = self.bundle.model.predict_proba(&features);
            leads.push(ScoredLead {
                record: row.clone(),
                probability,
                tier: Tier::from_probability(probability),
                likely_convert: probability >= CONVERT_THRESHOLD,
            });
        }

        // Best leads first
        leads.sort_by(|a, b| {
            b.probability
                .partial_cmp(&a.probability)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let high_count = leads.iter().filter(|l| l.tier == Tier::High).count();
        let medium_count = leads.iter().filter(|l| l.tier == Tier::Medium).count();
        let low_count = leads.iter().filter(|l| l.tier == Tier::Low).count();
        let average_score_percent = if leads.is_empty() {
            0.0
        } else {
            leads.iter().map(|l| l.score_percent()).sum::<f64>() / leads.len() as f64
        };

        BatchResult {
            summary: ScoreSummary {
                total_leads: leads.len(),
                high_count,
                medium_count,
                low_count,
                average_score_percent,
                unseen_substitutions,
            },
            leads,
        }
    }
}
