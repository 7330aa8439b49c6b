//! Programmatic network builders shared by the test suites.

use relia_core::units::Ohms;
use relia_core::{Bus, BusId, Line, LineId, PowerSystem, SourceKind, Switch};

/// Six-bus radial feeder on a 22 kV / 1 MVA base with uniform 0.5 Ω lines:
///
/// ```text
/// B1 - B2 - B3 - B4 - B5
///            \
///             B6
/// ```
///
/// B1 is transformer-fed; loads are [0, 0.05, 0.04, 0.03, 0.02, 0.05] MW.
pub fn six_bus_feeder() -> (PowerSystem, Vec<BusId>) {
    let loads = [0.0, 0.05, 0.04, 0.03, 0.02, 0.05];
    let mut system = PowerSystem::new("six-bus");
    let buses: Vec<BusId> = loads
        .iter()
        .enumerate()
        .map(|(i, &p)| system.add_bus(Bus::new(format!("B{}", i + 1)).with_load(p, 0.0)))
        .collect();
    system.bus_mut(buses[0]).source = SourceKind::Transformer;

    system.add_line(Line::new("L1-2", buses[0], buses[1], Ohms(0.5), Ohms(0.5)));
    system.add_line(Line::new("L2-3", buses[1], buses[2], Ohms(0.5), Ohms(0.5)));
    system.add_line(Line::new("L3-4", buses[2], buses[3], Ohms(0.5), Ohms(0.5)));
    system.add_line(Line::new("L4-5", buses[3], buses[4], Ohms(0.5), Ohms(0.5)));
    system.add_line(Line::new("L3-6", buses[2], buses[5], Ohms(0.5), Ohms(0.5)));

    (system, buses)
}

/// Two three-bus feeders joined by a switched, normally-open backup line.
///
/// ```text
/// B1 - B2 - B3 ~ ~ B4 - B5 - B6
/// ```
///
/// B1 is transformer-fed, B4 hosts a main-grid storage unit. Returns the
/// system, the buses and the backup line.
pub fn two_feeders_with_backup() -> (PowerSystem, Vec<BusId>, LineId) {
    let mut system = PowerSystem::new("twin");
    let buses: Vec<BusId> = (1..=6)
        .map(|i| system.add_bus(Bus::new(format!("B{i}")).with_load(0.05, 0.0)))
        .collect();
    system.bus_mut(buses[0]).source = SourceKind::Transformer;
    system.bus_mut(buses[3]).source = SourceKind::StorageMainGrid;

    system.add_line(Line::new("L1-2", buses[0], buses[1], Ohms(0.5), Ohms(0.5)));
    system.add_line(Line::new("L2-3", buses[1], buses[2], Ohms(0.5), Ohms(0.5)));
    system.add_line(Line::new("L4-5", buses[3], buses[4], Ohms(0.5), Ohms(0.5)));
    system.add_line(Line::new("L5-6", buses[4], buses[5], Ohms(0.5), Ohms(0.5)));
    let backup = system.add_line(
        Line::new("LB3-4", buses[2], buses[3], Ohms(0.5), Ohms(0.5)).as_backup(),
    );
    system.add_switch(Switch::new("SB", backup).starts_open());

    (system, buses, backup)
}
