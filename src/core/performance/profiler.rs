//! Build and search profiling counters

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Operation counters tracked per tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    /// Vector to vector distance evaluations
    DistanceEvaluations,
    /// Vector to node (split plane) lower bounds
    NodeBounds,
    /// Pivot computations during build
    Pivots,
    /// Split direction computations (hyperplane / PCA)
    Planes,
    /// Full builds
    Builds,
    /// Leaf-local rebuilds triggered by inserts
    LocalRebuilds,
    /// Searches performed
    Searches,
    /// Neighbours returned by searches
    Neighbours,
    /// Nodes popped from the search stack
    NodesVisited,
    /// Leaves whose objects were scanned
    LeavesScanned,
}

/// Timed phases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Build,
    Search,
}

/// Passive profiling counters for one tree.
///
/// All counters are relaxed atomics so read-only searches running in
/// parallel can record into the same profile.
#[derive(Debug, Default)]
pub struct KdProfile {
    v2v: AtomicU64,
    v2n: AtomicU64,
    pivots: AtomicU64,
    planes: AtomicU64,
    builds: AtomicU64,
    local_rebuilds: AtomicU64,
    searches: AtomicU64,
    neighbours: AtomicU64,
    nodes_visited: AtomicU64,
    leaves_scanned: AtomicU64,
    max_stack: AtomicU64,
    build_nanos: AtomicU64,
    search_nanos: AtomicU64,
}

impl KdProfile {
    /// Create a zeroed profile
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    const fn counter(&self, counter: Counter) -> &AtomicU64 {
        match counter {
            Counter::DistanceEvaluations => &self.v2v,
            Counter::NodeBounds => &self.v2n,
            Counter::Pivots => &self.pivots,
            Counter::Planes => &self.planes,
            Counter::Builds => &self.builds,
            Counter::LocalRebuilds => &self.local_rebuilds,
            Counter::Searches => &self.searches,
            Counter::Neighbours => &self.neighbours,
            Counter::NodesVisited => &self.nodes_visited,
            Counter::LeavesScanned => &self.leaves_scanned,
        }
    }

    /// Add `n` to a counter
    pub fn add(&self, counter: Counter, n: u64) {
        if n > 0 {
            self.counter(counter).fetch_add(n, Ordering::Relaxed);
        }
    }

    /// Record the size of a search stack, keeping the maximum seen
    pub fn observe_stack(&self, size: usize) {
        self.max_stack.fetch_max(size as u64, Ordering::Relaxed);
    }

    /// Accumulate elapsed time for a phase
    pub fn add_time(&self, phase: Phase, elapsed: Duration) {
        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        let slot = match phase {
            Phase::Build => &self.build_nanos,
            Phase::Search => &self.search_nanos,
        };
        slot.fetch_add(nanos, Ordering::Relaxed);
    }

    /// Copy of the current counter values
    #[must_use]
    pub fn snapshot(&self) -> ProfileSnapshot {
        let load = |a: &AtomicU64| a.load(Ordering::Relaxed);
        ProfileSnapshot {
            v2v: load(&self.v2v),
            v2n: load(&self.v2n),
            pivots: load(&self.pivots),
            planes: load(&self.planes),
            builds: load(&self.builds),
            local_rebuilds: load(&self.local_rebuilds),
            searches: load(&self.searches),
            neighbours: load(&self.neighbours),
            nodes_visited: load(&self.nodes_visited),
            leaves_scanned: load(&self.leaves_scanned),
            max_stack: load(&self.max_stack),
            build_time: Duration::from_nanos(load(&self.build_nanos)),
            search_time: Duration::from_nanos(load(&self.search_nanos)),
        }
    }

    /// Reset every counter to zero
    pub fn clear(&self) {
        for a in [
            &self.v2v,
            &self.v2n,
            &self.pivots,
            &self.planes,
            &self.builds,
            &self.local_rebuilds,
            &self.searches,
            &self.neighbours,
            &self.nodes_visited,
            &self.leaves_scanned,
            &self.max_stack,
            &self.build_nanos,
            &self.search_nanos,
        ] {
            a.store(0, Ordering::Relaxed);
        }
    }
}

/// Point-in-time copy of a [`KdProfile`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSnapshot {
    /// Vector to vector distances
    pub v2v: u64,
    /// Vector to node distances
    pub v2n: u64,
    /// Pivot calculations
    pub pivots: u64,
    /// Split plane calculations
    pub planes: u64,
    /// Full builds
    pub builds: u64,
    /// Leaf-local rebuilds
    pub local_rebuilds: u64,
    /// Searches performed
    pub searches: u64,
    /// Neighbours found
    pub neighbours: u64,
    /// Nodes popped during searches
    pub nodes_visited: u64,
    /// Leaves scanned during searches
    pub leaves_scanned: u64,
    /// Highest search stack size
    pub max_stack: u64,
    /// Accumulated build time
    pub build_time: Duration,
    /// Accumulated search time
    pub search_time: Duration,
}

/// A profiled operation that tracks timing
#[derive(Debug)]
pub struct ProfiledOperation {
    /// Phase being timed
    pub phase: Phase,
    /// Start time
    pub start_time: Instant,
}

impl ProfiledOperation {
    /// Start timing a phase
    #[must_use]
    pub fn start(phase: Phase) -> Self {
        Self { phase, start_time: Instant::now() }
    }

    /// Complete the operation, adding its duration to `profile`
    pub fn complete(self, profile: &KdProfile) -> Duration {
        let duration = self.start_time.elapsed();
        profile.add_time(self.phase, duration);
        duration
    }
}
