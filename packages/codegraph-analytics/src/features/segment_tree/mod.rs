//! Generic segment tree
//!
//! Flat power-of-two array over the HLD/forest position layout, parameterized
//! by one of four aggregates. Range queries are `&self`: pending lazy adds
//! are accumulated on the way down instead of being pushed, so a frozen
//! layout answers queries from many threads while updates stay single-writer
//! (`&mut self`).
//!
//! Range updates are additive with lazy propagation for SUM/MIN/MAX. GCD
//! supports point operations only; a GCD range update is an aggregate
//! mismatch.

use serde::{Deserialize, Serialize};

use crate::shared::models::{GraphError, Result};

/// Binary-associative aggregate with identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Aggregate {
    Sum,
    Min,
    Max,
    Gcd,
}

impl Aggregate {
    pub fn identity(self) -> i64 {
        match self {
            Aggregate::Sum => 0,
            Aggregate::Min => i64::MAX,
            Aggregate::Max => i64::MIN,
            Aggregate::Gcd => 0,
        }
    }

    pub fn combine(self, a: i64, b: i64) -> i64 {
        match self {
            Aggregate::Sum => a + b,
            Aggregate::Min => a.min(b),
            Aggregate::Max => a.max(b),
            Aggregate::Gcd => gcd(a, b),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Aggregate::Sum => "sum",
            Aggregate::Min => "min",
            Aggregate::Max => "max",
            Aggregate::Gcd => "gcd",
        }
    }
}

impl std::fmt::Display for Aggregate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// gcd(0, x) = |x|, so 0 is the identity
pub fn gcd(a: i64, b: i64) -> i64 {
    let (mut a, mut b) = (a.abs(), b.abs());
    while b != 0 {
        let r = a % b;
        a = b;
        b = r;
    }
    a
}

/// Segment tree over an i64 value array
#[derive(Debug, Clone)]
pub struct SegmentTree {
    aggregate: Aggregate,
    /// Logical length (the position-layout size)
    n: usize,
    /// Padded power-of-two leaf count
    size: usize,
    tree: Vec<i64>,
    /// Pending adds for each node's children; always zero for GCD
    lazy: Vec<i64>,
}

impl SegmentTree {
    pub fn new(values: &[i64], aggregate: Aggregate) -> Self {
        let n = values.len();
        let mut size = 1usize;
        while size < n.max(1) {
            size <<= 1;
        }
        let mut tree = vec![aggregate.identity(); 2 * size];
        tree[size..size + n].copy_from_slice(values);
        for node in (1..size).rev() {
            tree[node] = aggregate.combine(tree[2 * node], tree[2 * node + 1]);
        }
        Self {
            aggregate,
            n,
            size,
            tree,
            lazy: vec![0; 2 * size],
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.n
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    #[inline]
    pub fn aggregate(&self) -> Aggregate {
        self.aggregate
    }

    /// Aggregate over positions [l, r], inclusive
    pub fn range_query(&self, l: usize, r: usize) -> Result<i64> {
        self.check_range(l, r)?;
        Ok(self.query_rec(1, 0, self.size - 1, l, r, 0))
    }

    /// Replace the value at position `i`
    pub fn point_set(&mut self, i: usize, value: i64) -> Result<()> {
        self.check_range(i, i)?;
        self.set_rec(1, 0, self.size - 1, i, value);
        Ok(())
    }

    /// Add `delta` to the value at position `i`
    pub fn point_add(&mut self, i: usize, delta: i64) -> Result<()> {
        match self.aggregate {
            // GCD has no additive lazy form; read-modify-set instead
            Aggregate::Gcd => {
                let current = self.range_query(i, i)?;
                self.point_set(i, current + delta)
            }
            _ => self.range_update(i, i, delta),
        }
    }

    /// Add `delta` to every position in [l, r], inclusive
    pub fn range_update(&mut self, l: usize, r: usize, delta: i64) -> Result<()> {
        if self.aggregate == Aggregate::Gcd {
            return Err(GraphError::AggregateMismatch(
                "range update is unsupported for the gcd aggregate".to_string(),
            ));
        }
        self.check_range(l, r)?;
        self.update_rec(1, 0, self.size - 1, l, r, delta);
        Ok(())
    }

    fn check_range(&self, l: usize, r: usize) -> Result<()> {
        if self.n == 0 {
            return Err(GraphError::invalid_input("segment tree is empty"));
        }
        if l > r || r >= self.n {
            return Err(GraphError::invalid_input(format!(
                "range [{}, {}] out of bounds for length {}",
                l, r, self.n
            )));
        }
        Ok(())
    }

    /// Read-only descent; `pending` carries ancestor lazy adds
    fn query_rec(
        &self,
        node: usize,
        node_l: usize,
        node_r: usize,
        l: usize,
        r: usize,
        pending: i64,
    ) -> i64 {
        if r < node_l || node_r < l {
            return self.aggregate.identity();
        }
        if l <= node_l && node_r <= r {
            return match self.aggregate {
                Aggregate::Sum => self.tree[node] + pending * (node_r - node_l + 1) as i64,
                Aggregate::Min | Aggregate::Max => self.tree[node] + pending,
                Aggregate::Gcd => self.tree[node],
            };
        }
        let mid = (node_l + node_r) / 2;
        let pending = pending + self.lazy[node];
        let left = self.query_rec(2 * node, node_l, mid, l, r, pending);
        let right = self.query_rec(2 * node + 1, mid + 1, node_r, l, r, pending);
        self.aggregate.combine(left, right)
    }

    fn set_rec(&mut self, node: usize, node_l: usize, node_r: usize, i: usize, value: i64) {
        if node_l == node_r {
            self.tree[node] = value;
            return;
        }
        self.push_down(node, node_r - node_l + 1);
        let mid = (node_l + node_r) / 2;
        if i <= mid {
            self.set_rec(2 * node, node_l, mid, i, value);
        } else {
            self.set_rec(2 * node + 1, mid + 1, node_r, i, value);
        }
        self.tree[node] = self
            .aggregate
            .combine(self.tree[2 * node], self.tree[2 * node + 1]);
    }

    fn update_rec(
        &mut self,
        node: usize,
        node_l: usize,
        node_r: usize,
        l: usize,
        r: usize,
        delta: i64,
    ) {
        if r < node_l || node_r < l {
            return;
        }
        if l <= node_l && node_r <= r {
            self.apply(node, node_r - node_l + 1, delta);
            return;
        }
        self.push_down(node, node_r - node_l + 1);
        let mid = (node_l + node_r) / 2;
        self.update_rec(2 * node, node_l, mid, l, r, delta);
        self.update_rec(2 * node + 1, mid + 1, node_r, l, r, delta);
        self.tree[node] = self
            .aggregate
            .combine(self.tree[2 * node], self.tree[2 * node + 1]);
    }

    /// Apply a pending add to a whole node range
    fn apply(&mut self, node: usize, len: usize, delta: i64) {
        match self.aggregate {
            Aggregate::Sum => self.tree[node] += delta * len as i64,
            Aggregate::Min | Aggregate::Max => self.tree[node] += delta,
            Aggregate::Gcd => unreachable!("gcd never carries lazy updates"),
        }
        if node < self.size {
            self.lazy[node] += delta;
        }
    }

    fn push_down(&mut self, node: usize, len: usize) {
        if self.lazy[node] != 0 {
            let delta = self.lazy[node];
            self.lazy[node] = 0;
            self.apply(2 * node, len / 2, delta);
            self.apply(2 * node + 1, len / 2, delta);
        }
    }
}
