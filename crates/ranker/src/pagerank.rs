//! PageRank over the follow graph
//!
//! Power iteration with a uniform teleport term. Followers with no outgoing
//! edges contribute nothing; their mass is not redistributed and scores are
//! not normalized, so the sum may drift below one.

use crate::graph::FollowGraph;
use followrank_common::config::RankingConfig;
use serde::Serialize;
use tracing::{debug, info};

/// PageRank configuration
#[derive(Debug, Clone, PartialEq)]
pub struct PageRankConfig {
    /// Damping factor (typically 0.85)
    pub damping: f64,

    /// Maximum iterations
    pub max_iterations: usize,

    /// Convergence threshold on the L1 change between iterations
    pub epsilon: f64,
}

impl Default for PageRankConfig {
    fn default() -> Self {
        Self {
            damping: 0.85,
            max_iterations: 100,
            epsilon: 1e-4,
        }
    }
}

impl From<&RankingConfig> for PageRankConfig {
    fn from(config: &RankingConfig) -> Self {
        Self {
            damping: config.damping,
            max_iterations: config.max_iterations,
            epsilon: config.epsilon,
        }
    }
}

/// Scores plus convergence diagnostics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageRankOutcome {
    /// Indexed by roster position
    pub scores: Vec<f64>,
    pub iterations: usize,
    pub converged: bool,
    /// L1 change of the last iteration
    pub residual: f64,
}

/// PageRank scorer
pub struct PageRank {
    config: PageRankConfig,
}

impl PageRank {
    pub fn new(config: PageRankConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PageRankConfig {
        &self.config
    }

    /// Compute scores for every node of `graph`
    pub fn compute(&self, graph: &FollowGraph) -> PageRankOutcome {
        let n = graph.node_count();
        if n == 0 {
            return PageRankOutcome {
                scores: Vec::new(),
                iterations: 0,
                converged: true,
                residual: 0.0,
            };
        }

        let n_f64 = n as f64;
        let damping = self.config.damping;
        let teleport = (1.0 - damping) / n_f64;

        // Precompute reverse adjacency and outgoing counts
        let incoming = graph.incoming();
        let out_degree: Vec<usize> = (0..n).map(|node| graph.out_degree(node)).collect();

        let mut scores = vec![1.0 / n_f64; n];
        let mut next = vec![0.0; n];
        let mut iterations = 0;
        let mut residual = f64::INFINITY;
        let mut converged = false;

        while iterations < self.config.max_iterations {
            iterations += 1;

            for (node, followers) in incoming.iter().enumerate() {
                let follower_sum: f64 = followers
                    .iter()
                    .filter(|&&source| out_degree[source] > 0)
                    .map(|&source| scores[source] / out_degree[source] as f64)
                    .sum();
                next[node] = teleport + damping * follower_sum;
            }

            residual = scores
                .iter()
                .zip(&next)
                .map(|(old, new)| (new - old).abs())
                .sum();
            std::mem::swap(&mut scores, &mut next);

            debug!(iteration = iterations, residual, "PageRank iteration");

            if residual < self.config.epsilon {
                converged = true;
                break;
            }
        }

        info!(nodes = n, iterations, converged, residual, "PageRank finished");

        PageRankOutcome {
            scores,
            iterations,
            converged,
            residual,
        }
    }
}
