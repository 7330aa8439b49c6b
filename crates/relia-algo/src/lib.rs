//! # relia-algo: Reliability Algorithms for Radial Distribution Networks
//!
//! The algorithmic core for reliability analysis of radial distribution
//! feeders: island partitioning, radial tree construction with line-direction
//! repair, and a backward-forward sweep load flow with voltage/loss
//! sensitivities.
//!
//! ## Components
//!
//! | Module | Role |
//! |--------|------|
//! | [`islanding`] | Split the network into sub-systems, heal via backup lines, elect slacks |
//! | [`topology`]  | Build the rooted supply tree for one sub-system |
//! | [`sweep`]     | Iterative backward-forward sweep load flow |
//! | [`workflows`] | Partition/build/solve orchestration and result extraction |
//!
//! The three components chain per trial time step: the partitioner hands each
//! sub-system to the topology builder, whose tree drives the sweep solver.
//! Failures stay contained to their island - an unreachable bus or a diverged
//! solve marks that island's load unserved and the pass continues.
//!
//! ## Example
//!
//! ```
//! use relia_algo::workflows::solve_power_system;
//! use relia_core::units::{Hours, Ohms};
//! use relia_core::{Bus, Line, PowerSystem, SourceKind};
//!
//! let mut system = PowerSystem::new("feeder");
//! let b1 = system.add_bus(Bus::new("B1").with_source(SourceKind::Transformer));
//! let b2 = system.add_bus(Bus::new("B2").with_load(0.05, 0.0));
//! system.add_line(Line::new("L1", b1, b2, Ohms(0.5), Ohms(0.5)));
//!
//! let report = solve_power_system(&mut system, Hours::ZERO, 5);
//! assert!(report.all_solved());
//! ```

pub mod islanding;
pub mod sweep;
pub mod test_utils;
pub mod topology;
pub mod workflows;

pub use islanding::{find_sub_systems, SubSystem};
pub use sweep::{SweepError, SweepSolver, SweepSummary, DEFAULT_SWEEP_ITERATIONS};
pub use topology::{build_tree, RadialTree, TopologyError};
pub use workflows::{
    bus_results, line_loadings, run_bfs_load_flow, solve_power_system, BusResult, IslandOutcome,
    IslandStatus, LineLoading, SystemSolveReport,
};
