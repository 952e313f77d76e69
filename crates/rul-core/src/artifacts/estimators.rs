//! Native estimators decoded from trusted model documents

use super::Model;
use crate::error::ModelError;
use crate::models::FeatureVector;
use serde::Deserialize;
use std::sync::Arc;

fn check_width(expected: usize, row: &[f64]) -> Result<(), ModelError> {
    if row.len() != expected {
        return Err(ModelError::InputWidth {
            expected,
            actual: row.len(),
        });
    }
    Ok(())
}

/// Ordinary linear model: `coef · x + intercept`
#[derive(Debug, Clone, PartialEq)]
pub struct LinearRegression {
    coef: Vec<f64>,
    intercept: f64,
    feature_names: Option<Vec<String>>,
}

impl LinearRegression {
    pub fn new(coef: Vec<f64>, intercept: f64) -> Self {
        Self {
            coef,
            intercept,
            feature_names: None,
        }
    }

    pub fn with_feature_names(mut self, names: Option<Vec<String>>) -> Self {
        self.feature_names = names;
        self
    }
}

impl Model for LinearRegression {
    fn type_name(&self) -> &str {
        "LinearRegression"
    }

    fn expected_input_size(&self) -> Option<usize> {
        Some(self.coef.len())
    }

    fn input_feature_names(&self) -> Option<&[String]> {
        self.feature_names.as_deref()
    }

    fn predict(&self, batch: &[FeatureVector]) -> Result<Vec<f64>, ModelError> {
        batch
            .iter()
            .map(|row| {
                check_width(self.coef.len(), row)?;
                let dot: f64 = self.coef.iter().zip(row).map(|(c, x)| c * x).sum();
                Ok(dot + self.intercept)
            })
            .collect()
    }
}

/// Per-feature affine rescaling `(x - mean) / scale`
#[derive(Debug, Clone, PartialEq)]
pub struct StandardScaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
    feature_names: Option<Vec<String>>,
}

impl StandardScaler {
    /// Zero scale entries are treated as 1.0 so constant features pass through centred
    pub fn new(mean: Vec<f64>, scale: Vec<f64>) -> Self {
        let scale = scale
            .into_iter()
            .map(|s| if s == 0.0 { 1.0 } else { s })
            .collect();
        Self {
            mean,
            scale,
            feature_names: None,
        }
    }

    pub fn with_feature_names(mut self, names: Option<Vec<String>>) -> Self {
        self.feature_names = names;
        self
    }
}

impl Model for StandardScaler {
    fn type_name(&self) -> &str {
        "StandardScaler"
    }

    fn expected_input_size(&self) -> Option<usize> {
        Some(self.mean.len())
    }

    fn input_feature_names(&self) -> Option<&[String]> {
        self.feature_names.as_deref()
    }

    fn predict(&self, _batch: &[FeatureVector]) -> Result<Vec<f64>, ModelError> {
        Err(ModelError::Unsupported {
            type_name: self.type_name().to_string(),
            operation: "predict",
        })
    }

    fn transform(&self, batch: &[FeatureVector]) -> Result<Vec<FeatureVector>, ModelError> {
        batch
            .iter()
            .map(|row| {
                check_width(self.mean.len(), row)?;
                Ok(row
                    .iter()
                    .zip(self.mean.iter().zip(&self.scale))
                    .map(|(x, (m, s))| (x - m) / s)
                    .collect())
            })
            .collect()
    }
}

/// Node of a regression tree, stored as a flat array
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    /// Go to `left` when `x[feature] <= threshold`, else `right`
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

/// Additive ensemble of regression trees (gradient boosting)
#[derive(Debug, Clone, PartialEq)]
pub struct TreeEnsembleRegressor {
    n_features: usize,
    base_score: f64,
    trees: Vec<Vec<TreeNode>>,
    feature_names: Option<Vec<String>>,
}

impl TreeEnsembleRegressor {
    /// Validate the tree layout.
    ///
    /// Children must come after their parent in the node array, which keeps
    /// every walk finite.
    pub fn new(
        n_features: usize,
        base_score: f64,
        trees: Vec<Vec<TreeNode>>,
    ) -> Result<Self, String> {
        for (t, nodes) in trees.iter().enumerate() {
            if nodes.is_empty() {
                return Err(format!("tree {} has no nodes", t));
            }
            for (i, node) in nodes.iter().enumerate() {
                if let TreeNode::Split {
                    feature,
                    left,
                    right,
                    ..
                } = node
                {
                    if *feature >= n_features {
                        return Err(format!(
                            "tree {} node {} splits on feature {} of {}",
                            t, i, feature, n_features
                        ));
                    }
                    for child in [*left, *right] {
                        if child <= i || child >= nodes.len() {
                            return Err(format!(
                                "tree {} node {} has invalid child index {}",
                                t, i, child
                            ));
                        }
                    }
                }
            }
        }
        Ok(Self {
            n_features,
            base_score,
            trees,
            feature_names: None,
        })
    }

    pub fn with_feature_names(mut self, names: Option<Vec<String>>) -> Self {
        self.feature_names = names;
        self
    }

    fn predict_row(&self, row: &[f64]) -> f64 {
        self.trees
            .iter()
            .map(|nodes| {
                let mut idx = 0;
                loop {
                    match &nodes[idx] {
                        TreeNode::Leaf { value } => break *value,
                        TreeNode::Split {
                            feature,
                            threshold,
                            left,
                            right,
                        } => {
                            idx = if row[*feature] <= *threshold {
                                *left
                            } else {
                                *right
                            };
                        }
                    }
                }
            })
            .sum::<f64>()
            + self.base_score
    }
}

impl Model for TreeEnsembleRegressor {
    fn type_name(&self) -> &str {
        "TreeEnsembleRegressor"
    }

    fn expected_input_size(&self) -> Option<usize> {
        Some(self.n_features)
    }

    fn input_feature_names(&self) -> Option<&[String]> {
        self.feature_names.as_deref()
    }

    fn predict(&self, batch: &[FeatureVector]) -> Result<Vec<f64>, ModelError> {
        batch
            .iter()
            .map(|row| {
                check_width(self.n_features, row)?;
                Ok(self.predict_row(row))
            })
            .collect()
    }
}

/// Chain of transforms ending in an estimator
pub struct Pipeline {
    steps: Vec<(String, Arc<dyn Model>)>,
}

impl Pipeline {
    pub fn new(steps: Vec<(String, Arc<dyn Model>)>) -> Result<Self, String> {
        if steps.is_empty() {
            return Err("pipeline has no steps".to_string());
        }
        Ok(Self { steps })
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|(name, _)| name.as_str()).collect()
    }

    fn run_transforms(
        &self,
        steps: &[(String, Arc<dyn Model>)],
        batch: &[FeatureVector],
    ) -> Result<Vec<FeatureVector>, ModelError> {
        let mut current = batch.to_vec();
        for (_, step) in steps {
            current = step.transform(&current)?;
        }
        Ok(current)
    }
}

impl Model for Pipeline {
    fn type_name(&self) -> &str {
        "Pipeline"
    }

    fn expected_input_size(&self) -> Option<usize> {
        self.steps.first().and_then(|(_, m)| m.expected_input_size())
    }

    fn input_feature_names(&self) -> Option<&[String]> {
        self.steps.first().and_then(|(_, m)| m.input_feature_names())
    }

    fn predict(&self, batch: &[FeatureVector]) -> Result<Vec<f64>, ModelError> {
        let (last, transforms) = match self.steps.split_last() {
            Some(split) => split,
            None => return Ok(Vec::new()),
        };
        let transformed = self.run_transforms(transforms, batch)?;
        last.1.predict(&transformed)
    }

    fn transform(&self, batch: &[FeatureVector]) -> Result<Vec<FeatureVector>, ModelError> {
        self.run_transforms(&self.steps, batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_prediction() {
        let model = LinearRegression::new(vec![2.0, -1.0], 10.0);
        let out = model.predict(&[vec![3.0, 4.0], vec![0.0, 0.0]]).unwrap();
        assert_eq!(out, vec![12.0, 10.0]);
    }

    #[test]
    fn test_linear_rejects_wrong_width() {
        let model = LinearRegression::new(vec![1.0; 3], 0.0);
        let err = model.predict(&[vec![1.0; 4]]).unwrap_err();
        assert_eq!(
            err,
            ModelError::InputWidth {
                expected: 3,
                actual: 4
            }
        );
    }

    #[test]
    fn test_scaler_transform() {
        let scaler = StandardScaler::new(vec![1.0, 10.0, 5.0], vec![2.0, 5.0, 0.0]);
        let out = scaler.transform(&[vec![3.0, 0.0, 7.0]]).unwrap();
        assert_eq!(out, vec![vec![1.0, -2.0, 2.0]]);
        assert!(scaler.predict(&[vec![0.0; 3]]).is_err());
    }

    #[test]
    fn test_tree_ensemble_prediction() {
        let tree = vec![
            TreeNode::Split {
                feature: 0,
                threshold: 0.5,
                left: 1,
                right: 2,
            },
            TreeNode::Leaf { value: -1.0 },
            TreeNode::Leaf { value: 1.0 },
        ];
        let model = TreeEnsembleRegressor::new(2, 100.0, vec![tree.clone(), tree]).unwrap();
        assert_eq!(
            model.predict(&[vec![0.0, 9.0], vec![1.0, 9.0]]).unwrap(),
            vec![98.0, 102.0]
        );
    }

    #[test]
    fn test_tree_ensemble_rejects_backward_child() {
        let tree = vec![
            TreeNode::Split {
                feature: 0,
                threshold: 0.5,
                left: 0,
                right: 1,
            },
            TreeNode::Leaf { value: 1.0 },
        ];
        assert!(TreeEnsembleRegressor::new(1, 0.0, vec![tree]).is_err());
    }

    #[test]
    fn test_tree_ensemble_rejects_unknown_feature() {
        let tree = vec![
            TreeNode::Split {
                feature: 3,
                threshold: 0.5,
                left: 1,
                right: 2,
            },
            TreeNode::Leaf { value: 1.0 },
            TreeNode::Leaf { value: 2.0 },
        ];
        assert!(TreeEnsembleRegressor::new(3, 0.0, vec![tree]).is_err());
    }

    #[test]
    fn test_pipeline_scales_then_predicts() {
        let pipeline = Pipeline::new(vec![
            (
                "scaler".to_string(),
                Arc::new(StandardScaler::new(vec![1.0, 1.0], vec![2.0, 2.0])) as Arc<dyn Model>,
            ),
            (
                "regressor".to_string(),
                Arc::new(LinearRegression::new(vec![1.0, 1.0], 0.0)) as Arc<dyn Model>,
            ),
        ])
        .unwrap();

        assert_eq!(pipeline.expected_input_size(), Some(2));
        assert_eq!(pipeline.step_names(), vec!["scaler", "regressor"]);
        assert_eq!(pipeline.predict(&[vec![3.0, 5.0]]).unwrap(), vec![3.0]);
    }
}
