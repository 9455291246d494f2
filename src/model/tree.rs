//! regression tree (cart, variance reduction) used as the forest's base learner

use serde::{Deserialize, Serialize};

use crate::features::{FeatureRow, FEATURE_COUNT};

// splits whose sse improvement is below this are treated as no improvement
const MIN_GAIN: f64 = 1e-12;

#[derive(Clone, Debug, Serialize, Deserialize)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// flat arena of nodes; node 0 is the root
#[derive(Clone, Debug, Serialize, Deserialize)]
pub(crate) struct RegressionTree {
    nodes: Vec<Node>,
}

struct Growth<'a> {
    x: &'a [FeatureRow],
    y: &'a [f64],
    max_depth: usize,
    min_samples_split: usize,
    nodes: Vec<Node>,
}

impl RegressionTree {
    /// fit on the rows named by `samples` (may repeat, e.g. a bootstrap draw)
    pub(crate) fn fit(
        x: &[FeatureRow],
        y: &[f64],
        samples: Vec<usize>,
        max_depth: usize,
        min_samples_split: usize,
    ) -> Self {
        let mut growth = Growth {
            x,
            y,
            max_depth,
            min_samples_split,
            nodes: Vec::new(),
        };
        growth.grow(samples, 0);
        Self { nodes: growth.nodes }
    }

    pub(crate) fn predict(&self, row: &FeatureRow) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

impl Growth<'_> {
    fn grow(&mut self, samples: Vec<usize>, depth: usize) -> usize {
        let id = self.nodes.len();
        let value = samples.iter().map(|&i| self.y[i]).sum::<f64>() / samples.len() as f64;
        self.nodes.push(Node::Leaf { value });

        if depth >= self.max_depth || samples.len() < self.min_samples_split {
            return id;
        }
        let Some((feature, threshold)) = self.best_split(&samples) else {
            return id;
        };

        let (left_samples, right_samples): (Vec<usize>, Vec<usize>) = samples
            .into_iter()
            .partition(|&i| self.x[i][feature] <= threshold);

        let left = self.grow(left_samples, depth + 1);
        let right = self.grow(right_samples, depth + 1);
        self.nodes[id] = Node::Split {
            feature,
            threshold,
            left,
            right,
        };
        id
    }

    /// lowest total child sse over every feature and every cut between distinct values
    fn best_split(&self, samples: &[usize]) -> Option<(usize, f64)> {
        let n = samples.len() as f64;
        let (sum, sum_sq) = samples.iter().fold((0.0, 0.0), |(s, sq), &i| {
            (s + self.y[i], sq + self.y[i] * self.y[i])
        });
        let parent_sse = sum_sq - sum * sum / n;
        if parent_sse <= MIN_GAIN {
            return None;
        }

        let mut best: Option<(usize, f64)> = None;
        let mut best_sse = parent_sse - MIN_GAIN;
        let mut column: Vec<(f64, f64)> = Vec::with_capacity(samples.len());

        for feature in 0..FEATURE_COUNT {
            column.clear();
            column.extend(samples.iter().map(|&i| (self.x[i][feature], self.y[i])));
            column.sort_by(|a, b| a.0.total_cmp(&b.0));

            let (mut left_sum, mut left_sq) = (0.0, 0.0);
            for k in 0..column.len() - 1 {
                let (value, target) = column[k];
                left_sum += target;
                left_sq += target * target;

                let next = column[k + 1].0;
                if value == next {
                    continue;
                }

                let left_n = (k + 1) as f64;
                let right_n = n - left_n;
                let right_sum = sum - left_sum;
                let right_sq = sum_sq - left_sq;
                let sse = (left_sq - left_sum * left_sum / left_n)
                    + (right_sq - right_sum * right_sum / right_n);

                if sse < best_sse {
                    best_sse = sse;
                    // halves first so huge values cannot overflow the sum
                    let mut threshold = value / 2.0 + next / 2.0;
                    // midpoint can round onto either neighbour
                    if !(value..next).contains(&threshold) {
                        threshold = value;
                    }
                    best = Some((feature, threshold));
                }
            }
        }
        best
    }
}
