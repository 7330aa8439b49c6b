//! Load-flow behavior on the six-bus reference feeder.

use relia_algo::test_utils::six_bus_feeder;
use relia_algo::{build_tree, SweepSolver};
use relia_core::units::Ohms;
use relia_core::{Bus, BusId, Line, PowerSystem};

/// Converged voltage magnitudes (pu) for the six-bus feeder.
const VOMAG_EXPECTED: [f64; 6] = [1.0, 0.999804, 0.999659, 0.999607, 0.999587, 0.999607];
/// Converged voltage angles (degrees).
const VOANG_DEG_EXPECTED: [f64; 6] = [
    0.0, -0.011248, -0.019539, -0.022501, -0.023686, -0.022501,
];

#[test]
fn reference_case_voltages_and_angles() {
    let (mut system, buses) = six_bus_feeder();
    let tree = build_tree(&mut system, &buses, buses[0]).unwrap();
    let summary = SweepSolver::new()
        .with_max_iterations(5)
        .solve(&mut system, &tree)
        .unwrap();
    assert_eq!(summary.iterations, 5);

    for (i, &b) in buses.iter().enumerate() {
        let bus = system.bus(b);
        assert!(
            (bus.vomag.value() - VOMAG_EXPECTED[i]).abs() < 1e-6,
            "bus {} vomag {} expected {}",
            bus.name,
            bus.vomag.value(),
            VOMAG_EXPECTED[i]
        );
        assert!(
            (bus.voang.to_degrees().value() - VOANG_DEG_EXPECTED[i]).abs() < 1e-6,
            "bus {} voang {}° expected {}°",
            bus.name,
            bus.voang.to_degrees().value(),
            VOANG_DEG_EXPECTED[i]
        );
    }
}

#[test]
fn tree_invariant_one_root() {
    let (mut system, buses) = six_bus_feeder();
    build_tree(&mut system, &buses, buses[0]).unwrap();

    let roots: Vec<_> = system
        .buses()
        .iter()
        .filter(|b| b.to_line.is_none())
        .collect();
    assert_eq!(roots.len(), 1);
    assert!(roots[0].is_slack);
    assert!(system
        .buses()
        .iter()
        .filter(|b| !b.is_slack)
        .all(|b| b.to_line.is_some()));
}

#[test]
fn conservation_at_branch_point() {
    let (mut system, buses) = six_bus_feeder();
    let tree = build_tree(&mut system, &buses, buses[0]).unwrap();
    SweepSolver::new().solve(&mut system, &tree).unwrap();

    // B3 feeds B4 (with B5 below) and B6
    let b3 = system.bus(buses[2]);
    let b4 = system.bus(buses[3]);
    let b6 = system.bus(buses[5]);
    let own = (b3.pload.value() - b3.pprod.value()) / system.s_base.value();
    let expected = own + b4.p_load_downstream + b6.p_load_downstream;
    assert!(
        (b3.p_load_downstream - expected).abs() < 1e-9,
        "branch accumulation mismatch: {} vs {}",
        b3.p_load_downstream,
        expected
    );
}

#[test]
fn post_solve_state_is_physical() {
    let (mut system, buses) = six_bus_feeder();
    let tree = build_tree(&mut system, &buses, buses[0]).unwrap();
    SweepSolver::new().solve(&mut system, &tree).unwrap();

    for bus in system.buses() {
        assert!(bus.vomag.is_finite());
        assert!(bus.vomag.value() > 0.0);
    }
    for line in system.lines() {
        assert!(line.p_loss.value() >= 0.0);
        assert!(line.q_loss.value() >= 0.0);
    }
}

#[test]
fn direction_repair_with_scrambled_orientation() {
    // Same feeder, every line stored backwards
    let loads = [0.0, 0.05, 0.04, 0.03, 0.02, 0.05];
    let mut system = PowerSystem::new("scrambled");
    let buses: Vec<BusId> = loads
        .iter()
        .enumerate()
        .map(|(i, &p)| system.add_bus(Bus::new(format!("B{}", i + 1)).with_load(p, 0.0)))
        .collect();
    system.add_line(Line::new("L1-2", buses[1], buses[0], Ohms(0.5), Ohms(0.5)));
    system.add_line(Line::new("L2-3", buses[2], buses[1], Ohms(0.5), Ohms(0.5)));
    system.add_line(Line::new("L3-4", buses[3], buses[2], Ohms(0.5), Ohms(0.5)));
    system.add_line(Line::new("L4-5", buses[4], buses[3], Ohms(0.5), Ohms(0.5)));
    system.add_line(Line::new("L3-6", buses[5], buses[2], Ohms(0.5), Ohms(0.5)));

    let tree = build_tree(&mut system, &buses, buses[0]).unwrap();

    // Walking next_bus from the slack reaches every bus exactly once
    let mut seen = vec![0usize; system.bus_count()];
    let mut stack = vec![buses[0]];
    while let Some(b) = stack.pop() {
        seen[b.value()] += 1;
        stack.extend(system.bus(b).next_bus.iter().copied());
    }
    assert!(seen.iter().all(|&c| c == 1), "walk counts: {seen:?}");

    // The solved state matches the reference network exactly
    SweepSolver::new().solve(&mut system, &tree).unwrap();
    for (i, &b) in buses.iter().enumerate() {
        assert!((system.bus(b).vomag.value() - VOMAG_EXPECTED[i]).abs() < 1e-6);
    }
}

#[test]
fn fixed_iterations_are_stable() {
    // Extra sweeps leave a constant-power solution untouched
    let (mut system_a, buses_a) = six_bus_feeder();
    let tree = build_tree(&mut system_a, &buses_a, buses_a[0]).unwrap();
    SweepSolver::new().with_max_iterations(3).solve(&mut system_a, &tree).unwrap();

    let (mut system_b, buses_b) = six_bus_feeder();
    let tree = build_tree(&mut system_b, &buses_b, buses_b[0]).unwrap();
    SweepSolver::new().with_max_iterations(20).solve(&mut system_b, &tree).unwrap();

    for (a, b) in buses_a.iter().zip(buses_b.iter()) {
        let va = system_a.bus(*a).vomag.value();
        let vb = system_b.bus(*b).vomag.value();
        assert!((va - vb).abs() < 1e-12);
    }
}
