use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;

/// Trained category -> integer-code table for one categorical field.
/// A value's code is its index in `classes`; values unseen at training
/// time map to `fallback_index` (the most frequent training category).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldEncoder {
    pub field: String,
    pub classes: Vec<String>,
    pub fallback_index: usize,
}

impl FieldEncoder {
    /// Encode a raw value. Returns the code and whether the fallback was used.
    pub fn encode(&self, raw: &str) -> (f64, bool) {
        let trimmed = raw.trim();
        match self.classes.iter().position(|c| c == trimmed) {
            Some(index) => (index as f64, false),
            None => (self.fallback_index as f64, true),
        }
    }
}

/// Fitted standard scaler: (x - mean) / scale per feature
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl Scaler {
    pub fn transform(&self, features: &mut [f64]) {
        for (i, value) in features.iter_mut().enumerate() {
            *value = (*value - self.mean[i]) / self.scale[i];
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    pub nodes: Vec<TreeNode>,
}

impl DecisionTree {
    /// Walk the tree from the root; child indices always point forward
    /// (enforced by bundle validation) so the walk terminates.
    pub fn predict(&self, features: &[f64]) -> f64 {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                TreeNode::Leaf { value } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if features[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Classifier {
    LogisticRegression {
        weights: Vec<f64>,
        intercept: f64,
    },
    RandomForest {
        trees: Vec<DecisionTree>,
    },
    GradientBoosting {
        trees: Vec<DecisionTree>,
        learning_rate: f64,
        base_score: f64,
    },
}

impl Classifier {
    /// Probability of the positive class (conversion) in [0, 1]
    pub fn predict_proba(&self, features: &[f64]) -> f64 {
        match self {
            Classifier::LogisticRegression { weights, intercept } => {
                let z = weights
                    .iter()
                    .zip(features.iter())
                    .map(|(w, x)| w * x)
                    .sum::<f64>()
                    + intercept;
                sigmoid(z)
            }
            Classifier::RandomForest { trees } => {
                // Each leaf carries the positive-class fraction at that leaf
                let sum: f64 = trees.iter().map(|tree| tree.predict(features)).sum();
                (sum / trees.len() as f64).clamp(0.0, 1.0)
            }
            Classifier::GradientBoosting {
                trees,
                learning_rate,
                base_score,
            } => {
                let boosted: f64 = trees.iter().map(|tree| tree.predict(features)).sum();
                sigmoid(base_score + learning_rate * boosted)
            }
        }
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// The persisted training artifacts consumed at startup: classifier,
/// scaler and encoder tables, fitted by the offline training step.
/// Encoder order defines the feature-vector layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelBundle {
    pub model: Classifier,
    pub scaler: Scaler,
    pub encoders: Vec<FieldEncoder>,
}

impl ModelBundle {
    pub fn from_json(content: &str) -> Result<Self> {
        let bundle: ModelBundle =
            serde_json::from_str(content).context("Failed to parse model bundle JSON")?;
        bundle.validate()?;
        Ok(bundle)
    }

    /// Check the artifact is internally consistent before serving predictions
    pub fn validate(&self) -> Result<()> {
        let n_features = self.encoders.len();
        if n_features == 0 {
            anyhow::bail!("Model bundle has no field encoders");
        }

        for encoder in &self.encoders {
            if encoder.classes.is_empty() {
                anyhow::bail!("Encoder for '{}' has no trained categories", encoder.field);
            }
            if encoder.fallback_index >= encoder.classes.len() {
                anyhow::bail!(
                    "Encoder for '{}' has fallback index {} outside its {} categories",
                    encoder.field,
                    encoder.fallback_index,
                    encoder.classes.len()
                );
            }
        }

        if self.scaler.mean.len() != n_features || self.scaler.scale.len() != n_features {
            anyhow::bail!(
                "Scaler dimensions ({} mean / {} scale) do not match {} encoded features",
                self.scaler.mean.len(),
                self.scaler.scale.len(),
                n_features
            );
        }
        for (i, s) in self.scaler.scale.iter().enumerate() {
            if !s.is_finite() || *s <= 0.0 {
                anyhow::bail!("Scaler scale for feature {} is not a positive number: {}", i, s);
            }
        }

        match &self.model {
            Classifier::LogisticRegression { weights, .. } => {
                if weights.len() != n_features {
                    anyhow::bail!(
                        "Logistic regression has {} weights for {} features",
                        weights.len(),
                        n_features
                    );
                }
            }
            Classifier::RandomForest { trees } => validate_trees(trees, n_features)?,
            Classifier::GradientBoosting { trees, .. } => validate_trees(trees, n_features)?,
        }

        Ok(())
    }

    pub fn required_columns(&self) -> Vec<&str> {
        self.encoders.iter().map(|e| e.field.as_str()).collect()
    }
}

fn validate_trees(trees: &[DecisionTree], n_features: usize) -> Result<()> {
    if trees.is_empty() {
        anyhow::bail!("Tree ensemble has no trees");
    }
    for (t, tree) in trees.iter().enumerate() {
        if tree.nodes.is_empty() {
            anyhow::bail!("Tree {} has no nodes", t);
        }
        for (i, node) in tree.nodes.iter().enumerate() {
            if let TreeNode::Split {
                feature,
                left,
                right,
                ..
            } = node
            {
                if *feature >= n_features {
                    anyhow::bail!("Tree {} node {} splits on unknown feature {}", t, i, feature);
                }
                // Children must point forward so tree walks terminate
                if *left <= i || *right <= i || *left >= tree.nodes.len() || *right >= tree.nodes.len() {
                    anyhow::bail!("Tree {} node {} has invalid child references", t, i);
                }
            }
        }
    }
    Ok(())
}

pub struct BundleLoader {
    client: reqwest::Client,
}

impl BundleLoader {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    pub fn load_file(&self, file_path: &str) -> Result<ModelBundle> {
        let content = fs::read_to_string(file_path)
            .with_context(|| format!("Failed to read model bundle: {}", file_path))?;

        ModelBundle::from_json(&content)
            .with_context(|| format!("Invalid model bundle: {}", file_path))
    }

    pub async fn fetch_url(&self, url: &str) -> Result<ModelBundle> {
        println!("🌐 Fetching model bundle from: {}", url);

        let response = self
            .client
            .get(url)
            .timeout(std::time::Duration::from_secs(30))
            .send()
            .await
            .with_context(|| format!("Failed to fetch URL: {}", url))?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!(
                "HTTP request failed with status: {}",
                response.status()
            ));
        }

        let content = response
            .text()
            .await
            .with_context(|| format!("Failed to read response body from: {}", url))?;

        ModelBundle::from_json(&content)
            .with_context(|| format!("Invalid model bundle from: {}", url))
    }
}
