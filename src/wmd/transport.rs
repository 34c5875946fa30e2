//! Optimal transport between two discrete distributions.
//!
//! Given supplies `a` (length `m`), demands `b` (length `n`), both summing to 1,
//! and a non-negative cost matrix `C` (`m x n`, row-major), find the flow
//! `P >= 0` with row sums `a` and column sums `b` minimizing `<P, C>`.
//!
//! Two solvers:
//!
//! - [`solve_exact`]: successive shortest paths on the bipartite
//!   transportation network, with Dijkstra over reduced costs (Johnson
//!   potentials). Every augmentation drains a supply, a demand, or a
//!   backward arc completely, so the loop is finite, and the final flow is
//!   optimal up to floating-point rounding.
//! - [`solve_sinkhorn`]: entropic regularization in the log domain, delegated
//!   to `wass`. Marginals are enforced by a KL penalty of weight
//!   `marginal_penalty`; large values approach balanced transport. The solver
//!   stops once the marginal updates settle below `tolerance`, or after
//!   `max_iter` sweeps. The plan is blurred by `epsilon`, so the cost of a
//!   distribution against itself is small but not zero.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, XMoverError};

/// Masses below this are treated as exhausted.
const MASS_EPSILON: f64 = 1e-12;

/// Which solver computes the transport plan.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum TransportSolver {
    /// Exact minimum-cost transport.
    #[default]
    Exact,
    /// Entropic approximation.
    Sinkhorn {
        epsilon: f64,
        max_iter: usize,
        tolerance: f64,
        #[serde(default = "default_marginal_penalty")]
        marginal_penalty: f64,
    },
}

fn default_marginal_penalty() -> f64 {
    1000.0
}

impl TransportSolver {
    /// Sinkhorn with `epsilon = 0.05`, 1500 sweeps, tolerance `1e-3` and
    /// marginal penalty 1000.
    pub fn sinkhorn() -> Self {
        TransportSolver::Sinkhorn {
            epsilon: 0.05,
            max_iter: 1500,
            tolerance: 1e-3,
            marginal_penalty: default_marginal_penalty(),
        }
    }

    pub fn solve(&self, a: &[f64], b: &[f64], cost: &[f64]) -> Result<TransportPlan> {
        match *self {
            TransportSolver::Exact => solve_exact(a, b, cost),
            TransportSolver::Sinkhorn {
                epsilon,
                max_iter,
                tolerance,
                marginal_penalty,
            } => solve_sinkhorn(a, b, cost, epsilon, max_iter, tolerance, marginal_penalty),
        }
    }
}

/// A transport plan and its total cost.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportPlan {
    rows: usize,
    cols: usize,
    flow: Vec<f64>,
    cost: f64,
}

impl TransportPlan {
    fn new(rows: usize, cols: usize, flow: Vec<f64>, cost_matrix: &[f64]) -> Self {
        let cost = flow.iter().zip(cost_matrix).map(|(f, c)| f * c).sum();
        Self {
            rows,
            cols,
            flow,
            cost,
        }
    }

    /// Total cost `<P, C>`.
    pub fn cost(&self) -> f64 {
        self.cost
    }

    /// Mass moved from supply `i` to demand `j`.
    pub fn flow(&self, i: usize, j: usize) -> f64 {
        self.flow[i * self.cols + j]
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Sum of the flow out of each supply.
    pub fn row_sums(&self) -> Vec<f64> {
        self.flow
            .chunks(self.cols.max(1))
            .take(self.rows)
            .map(|r| r.iter().sum())
            .collect()
    }

    /// Sum of the flow into each demand.
    pub fn col_sums(&self) -> Vec<f64> {
        let mut sums = vec![0.0; self.cols];
        for row in self.flow.chunks(self.cols.max(1)).take(self.rows) {
            for (s, f) in sums.iter_mut().zip(row) {
                *s += f;
            }
        }
        sums
    }
}

fn check_shapes(a: &[f64], b: &[f64], cost: &[f64]) -> Result<()> {
    if cost.len() != a.len() * b.len() {
        return Err(XMoverError::InvalidParameter(format!(
            "cost matrix has {} entries, expected {} x {}",
            cost.len(),
            a.len(),
            b.len()
        )));
    }
    if a.iter().chain(b).any(|m| !m.is_finite() || *m < 0.0) {
        return Err(XMoverError::InvalidParameter(
            "masses must be finite and non-negative".to_string(),
        ));
    }
    if cost.iter().any(|c| !c.is_finite() || *c < 0.0) {
        return Err(XMoverError::InvalidParameter(
            "costs must be finite and non-negative".to_string(),
        ));
    }
    Ok(())
}

/// Exact minimum-cost transport by successive shortest paths.
///
/// Node layout: super source `0`, supplies `1..=m`, demands `m+1..=m+n`,
/// super sink `m+n+1`.
pub fn solve_exact(a: &[f64], b: &[f64], cost: &[f64]) -> Result<TransportPlan> {
    check_shapes(a, b, cost)?;
    let (m, n) = (a.len(), b.len());
    let mut flow = vec![0.0f64; m * n];
    if m == 0 || n == 0 {
        return Ok(TransportPlan::new(m, n, flow, cost));
    }

    let mut supply = a.to_vec();
    let mut demand = b.to_vec();
    let nodes = m + n + 2;
    let (source, sink) = (0, m + n + 1);
    let supply_node = |i: usize| 1 + i;
    let demand_node = |j: usize| 1 + m + j;

    let mut potential = vec![0.0f64; nodes];
    let mut dist = vec![f64::INFINITY; nodes];
    let mut prev = vec![usize::MAX; nodes];
    let mut done = vec![false; nodes];

    // Each augmentation zeroes at least one supply, demand or flow entry.
    let max_rounds = 4 * (m + n) * (m + n) + 16;
    for _ in 0..max_rounds {
        let remaining_supply: f64 = supply.iter().sum();
        let remaining_demand: f64 = demand.iter().sum();
        if remaining_supply <= MASS_EPSILON || remaining_demand <= MASS_EPSILON {
            break;
        }

        dist.fill(f64::INFINITY);
        prev.fill(usize::MAX);
        done.fill(false);
        dist[source] = 0.0;

        // Dense Dijkstra over reduced costs.
        loop {
            let mut u = usize::MAX;
            let mut best = f64::INFINITY;
            for (v, (&d, &fin)) in dist.iter().zip(&done).enumerate() {
                if !fin && d < best {
                    best = d;
                    u = v;
                }
            }
            if u == usize::MAX || u == sink {
                break;
            }
            done[u] = true;

            let mut relax = |v: usize, c: f64| {
                let reduced = (c + potential[u] - potential[v]).max(0.0);
                if dist[u] + reduced < dist[v] {
                    dist[v] = dist[u] + reduced;
                    prev[v] = u;
                }
            };

            if u == source {
                for (i, &s) in supply.iter().enumerate() {
                    if s > MASS_EPSILON {
                        relax(supply_node(i), 0.0);
                    }
                }
            } else if u <= m {
                let i = u - 1;
                for j in 0..n {
                    relax(demand_node(j), cost[i * n + j]);
                }
            } else {
                let j = u - 1 - m;
                for i in 0..m {
                    if flow[i * n + j] > MASS_EPSILON {
                        relax(supply_node(i), -cost[i * n + j]);
                    }
                }
                if demand[j] > MASS_EPSILON {
                    relax(sink, 0.0);
                }
            }
        }

        if !dist[sink].is_finite() {
            break;
        }
        let cap = dist[sink];
        for (p, &d) in potential.iter_mut().zip(&dist) {
            *p += d.min(cap);
        }

        // Walk back from the sink to find the bottleneck.
        let mut path = Vec::new();
        let mut v = sink;
        while v != source {
            path.push(v);
            v = prev[v];
        }
        path.push(source);
        path.reverse();

        let first = path[1] - 1;
        let last = path[path.len() - 2] - 1 - m;
        let mut delta = supply[first].min(demand[last]);
        for hop in path[1..path.len() - 1].windows(2) {
            let (u, v) = (hop[0], hop[1]);
            if u > m {
                // demand -> supply: cancels existing flow
                let (i, j) = (v - 1, u - 1 - m);
                delta = delta.min(flow[i * n + j]);
            }
        }

        supply[first] -= delta;
        demand[last] -= delta;
        for hop in path[1..path.len() - 1].windows(2) {
            let (u, v) = (hop[0], hop[1]);
            if u <= m {
                flow[(u - 1) * n + (v - 1 - m)] += delta;
            } else {
                let (i, j) = (v - 1, u - 1 - m);
                flow[i * n + j] -= delta;
                if flow[i * n + j] < MASS_EPSILON {
                    flow[i * n + j] = 0.0;
                }
            }
        }
        if supply[first] < MASS_EPSILON {
            supply[first] = 0.0;
        }
        if demand[last] < MASS_EPSILON {
            demand[last] = 0.0;
        }
    }

    Ok(TransportPlan::new(m, n, flow, cost))
}

/// Entropic optimal transport (log-domain Sinkhorn with convergence check).
pub fn solve_sinkhorn(
    a: &[f64],
    b: &[f64],
    cost: &[f64],
    epsilon: f64,
    max_iter: usize,
    tolerance: f64,
    marginal_penalty: f64,
) -> Result<TransportPlan> {
    check_shapes(a, b, cost)?;
    for (name, value) in [
        ("epsilon", epsilon),
        ("tolerance", tolerance),
        ("marginal_penalty", marginal_penalty),
    ] {
        if value <= 0.0 || !value.is_finite() {
            return Err(XMoverError::InvalidParameter(format!(
                "sinkhorn {name} must be positive, got {value}"
            )));
        }
    }
    let (m, n) = (a.len(), b.len());

    // Zero-mass supplies and demands carry no flow; keep them out of the log domain.
    let rows: Vec<usize> = (0..m).filter(|&i| a[i] > 0.0).collect();
    let cols: Vec<usize> = (0..n).filter(|&j| b[j] > 0.0).collect();
    let mut flow = vec![0.0f64; m * n];
    if rows.is_empty() || cols.is_empty() {
        return Ok(TransportPlan::new(m, n, flow, cost));
    }

    let w_a: Array1<f32> = rows.iter().map(|&i| a[i] as f32).collect();
    let w_b: Array1<f32> = cols.iter().map(|&j| b[j] as f32).collect();
    let c_ab = Array2::from_shape_fn((rows.len(), cols.len()), |(r, c)| {
        cost[rows[r] * n + cols[c]] as f32
    });

    let (plan, _objective, iterations) = wass::unbalanced_sinkhorn_log_with_convergence(
        &w_a,
        &w_b,
        &c_ab,
        epsilon as f32,
        marginal_penalty as f32,
        max_iter,
        tolerance as f32,
    )
    .map_err(|e| XMoverError::Transport(e.to_string()))?;
    debug!(m, n, iterations, "sinkhorn");

    for (r, &i) in rows.iter().enumerate() {
        for (c, &j) in cols.iter().enumerate() {
            let f = plan[[r, c]];
            flow[i * n + j] = if f.is_finite() { f64::from(f) } else { 0.0 };
        }
    }
    Ok(TransportPlan::new(m, n, flow, cost))
}
