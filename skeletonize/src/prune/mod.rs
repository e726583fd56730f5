//! In-place pruning passes over the skeleton graph. They run in a fixed
//! order; each one is idempotent once its loop reaches a fixpoint.

use crate::policy::SkeletonPolicy;
use crate::PlanarGraph;

mod boundary_near;
mod component;
mod ratio;
mod spur;

/// One graph-pruning strategy. Compose with `Pruner::standard()`.
pub enum Pruner {
    /// Leaf paths shorter than their junction's clearance radius say the
    /// branch never left the intersection area.
    Ratio,
    /// Leaf paths hugging the polygon boundary are digitization noise.
    BoundaryNear,
    /// Tiny isolated components without any junction.
    Component,
    /// Short stubs hanging off a junction next to much longer branches.
    Spur,
}

impl Pruner {
    /// The full suite, in the order the stages expect.
    pub fn standard() -> Vec<Self> {
        vec![
            Pruner::Ratio,
            Pruner::BoundaryNear,
            Pruner::Component,
            Pruner::Spur,
        ]
    }

    fn name(&self) -> &'static str {
        match self {
            Pruner::Ratio => "ratio pruner",
            Pruner::BoundaryNear => "boundary-near pruner",
            Pruner::Component => "component pruner",
            Pruner::Spur => "spur pruner",
        }
    }

    pub fn execute(&self, graph: &mut PlanarGraph, policy: &SkeletonPolicy) {
        debug!("running {}", self.name());
        match self {
            Pruner::Ratio => ratio::execute(graph, policy),
            Pruner::BoundaryNear => boundary_near::execute(graph, policy),
            Pruner::Component => component::execute(graph, policy),
            Pruner::Spur => spur::execute(graph, policy),
        }
    }
}
