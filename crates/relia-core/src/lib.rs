//! # relia-core: Radial Distribution Network Modeling Core
//!
//! Data structures for reliability analysis of radial distribution networks.
//!
//! ## Design Philosophy
//!
//! A network is a flat arena of buses, lines and switches owned by a
//! [`PowerSystem`] registry that assigns dense, type-safe IDs on insertion:
//!
//! - **Buses** carry load/production, a ZIP voltage-dependence model, the
//!   solved voltage state, downstream accumulators and sensitivities, and the
//!   topology links (`to_line`, `from_lines`, `next_bus`) maintained by the
//!   topology builder.
//! - **Lines** are directed from the upstream bus to the downstream bus;
//!   direction is repaired whenever a tree is rebuilt around a new slack.
//! - **Switches** (disconnectors) gate reconnection of normally-open backup
//!   lines.
//!
//! The arena-with-indices layout keeps membership queries (which island owns
//! this bus?) a plain field comparison and lets solvers mutate electrical
//! state in place while traversing by ID.
//!
//! ## Quick Start
//!
//! ```
//! use relia_core::{Bus, Line, PowerSystem, SourceKind};
//! use relia_core::units::Ohms;
//!
//! let mut system = PowerSystem::new("feeder");
//! let b1 = system.add_bus(Bus::new("B1").with_source(SourceKind::Transformer));
//! let b2 = system.add_bus(Bus::new("B2").with_load(0.05, 0.0));
//! system.add_line(Line::new("L1", b1, b2, Ohms(0.5), Ohms(0.5)));
//!
//! assert_eq!(system.bus_count(), 2);
//! assert_eq!(system.bus(b2).connected_lines.len(), 1);
//! ```
//!
//! ## Modules
//!
//! - [`diagnostics`] - Validation and diagnostic reporting
//! - [`graph_utils`] - Connectivity statistics and DOT export
//! - [`units`] - Newtype unit wrappers
//! - [`error`] - Unified error type

use serde::{Deserialize, Serialize};

pub mod diagnostics;
pub mod error;
pub mod graph_utils;
pub mod units;

pub use diagnostics::{DiagnosticIssue, Diagnostics, Severity};
pub use error::{ReliaError, ReliaResult};
pub use graph_utils::{connectivity_graph, count_components, export_dot, graph_stats, GraphStats};
pub use units::{
    Degrees, Hours, Kilovolts, MegavoltAmperes, Megavars, Megawatts, Ohms, PerUnit, Radians,
};

// Newtype wrappers for IDs for type safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BusId(usize);
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineId(usize);
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SwitchId(usize);
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubSystemId(usize);

impl BusId {
    #[inline]
    pub fn new(value: usize) -> Self {
        BusId(value)
    }
    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }
}

impl LineId {
    #[inline]
    pub fn new(value: usize) -> Self {
        LineId(value)
    }
    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }
}

impl SwitchId {
    #[inline]
    pub fn new(value: usize) -> Self {
        SwitchId(value)
    }
    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }
}

impl SubSystemId {
    #[inline]
    pub fn new(value: usize) -> Self {
        SubSystemId(value)
    }
    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }
}

/// Power-source capability of a bus, used for slack election when an island
/// must pick its own reference bus.
///
/// The variants are ordered by election priority: a transformer-fed bus
/// always wins over a storage unit, which wins over local production, which
/// wins over a vehicle-to-grid aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SourceKind {
    /// No source capability; cannot anchor an island
    #[default]
    None,
    /// Fed directly by an upstream transmission transformer
    Transformer,
    /// Storage unit operating against the main grid (unconstrained mode)
    StorageMainGrid,
    /// Storage unit operating in microgrid-support mode (limited survival time)
    StorageSupport,
    /// Dispatchable production unit
    Production,
    /// Vehicle-to-grid-capable aggregator
    V2G,
}

impl SourceKind {
    /// True if a bus with this capability can be elected slack.
    #[inline]
    pub fn can_anchor(&self) -> bool {
        !matches!(self, SourceKind::None)
    }
}

/// A network bus: load/production, voltage state, and topology links.
///
/// Electrical state (`vomag`, `voang`, downstream accumulators and
/// sensitivities) is owned by the sweep solver; topology links (`to_line`,
/// `from_lines`, `next_bus`, `is_slack`) are owned by the topology builder;
/// the `sub_system` tag is owned by the island partitioner. Each writer
/// rewrites its fields wholesale, so stale values never leak between runs.
#[derive(Debug, Clone)]
pub struct Bus {
    pub id: BusId,
    pub name: String,
    /// Active power demand (MW)
    pub pload: Megawatts,
    /// Reactive power demand (Mvar)
    pub qload: Megavars,
    /// Active power production (MW)
    pub pprod: Megawatts,
    /// Reactive power production (Mvar)
    pub qprod: Megavars,
    /// ZIP load model coefficients `[z, i, p]`, summing to 1
    pub zip: [f64; 3],
    /// Base voltage in kilovolts (for per-unit conversions)
    pub v_base: Kilovolts,
    /// Voltage magnitude in per-unit
    pub vomag: PerUnit,
    /// Voltage angle in radians
    pub voang: Radians,
    /// Accumulated downstream active load (per-unit), including this bus
    pub p_load_downstream: f64,
    /// Accumulated downstream reactive load (per-unit)
    pub q_load_downstream: f64,
    /// Accumulated downstream active loss (per-unit), excluding the `to_line`
    pub p_loss_downstream: f64,
    /// Accumulated downstream reactive loss (per-unit)
    pub q_loss_downstream: f64,
    /// dV/dP voltage sensitivity (per-unit)
    pub dvdp: f64,
    /// dV/dQ voltage sensitivity
    pub dvdq: f64,
    /// dPloss/dP loss sensitivity
    pub dploss_dp: f64,
    /// dPloss/dQ loss sensitivity
    pub dploss_dq: f64,
    /// dQloss/dP loss sensitivity
    pub dqloss_dp: f64,
    /// dQloss/dQ loss sensitivity
    pub dqloss_dq: f64,
    /// d²Ploss/dP² second-order loss sensitivity
    pub d2ploss_dp2: f64,
    /// d²Ploss/dQ² second-order loss sensitivity
    pub d2ploss_dq2: f64,
    /// All lines touching this bus (adjacency, maintained by the registry)
    pub connected_lines: Vec<LineId>,
    /// The single line supplying this bus, `None` for a slack bus
    pub to_line: Option<LineId>,
    /// Lines feeding child buses
    pub from_lines: Vec<LineId>,
    /// Child buses in the current tree
    pub next_bus: Vec<BusId>,
    /// True if this bus is the voltage reference of its island
    pub is_slack: bool,
    /// Island owning this bus after the last partition pass
    pub sub_system: Option<SubSystemId>,
    /// Source capability for slack election
    pub source: SourceKind,
    /// Set when a support-mode storage unit starts carrying a microgrid
    pub microgrid_since: Option<Hours>,
}

impl Default for Bus {
    fn default() -> Self {
        Self {
            id: BusId(0),
            name: String::new(),
            pload: Megawatts(0.0),
            qload: Megavars(0.0),
            pprod: Megawatts(0.0),
            qprod: Megavars(0.0),
            zip: [0.0, 0.0, 1.0],
            v_base: Kilovolts(22.0),
            vomag: PerUnit(1.0),
            voang: Radians(0.0),
            p_load_downstream: 0.0,
            q_load_downstream: 0.0,
            p_loss_downstream: 0.0,
            q_loss_downstream: 0.0,
            dvdp: 0.0,
            dvdq: 0.0,
            dploss_dp: 0.0,
            dploss_dq: 0.0,
            dqloss_dp: 0.0,
            dqloss_dq: 0.0,
            d2ploss_dp2: 0.0,
            d2ploss_dq2: 0.0,
            connected_lines: Vec::new(),
            to_line: None,
            from_lines: Vec::new(),
            next_bus: Vec::new(),
            is_slack: false,
            sub_system: None,
            source: SourceKind::None,
            microgrid_since: None,
        }
    }
}

impl Bus {
    /// Create a named bus with default state (constant-power load, 22 kV base).
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set active/reactive load in MW/Mvar.
    pub fn with_load(mut self, pload_mw: f64, qload_mvar: f64) -> Self {
        self.pload = Megawatts(pload_mw);
        self.qload = Megavars(qload_mvar);
        self
    }

    /// Set active/reactive production in MW/Mvar.
    pub fn with_production(mut self, pprod_mw: f64, qprod_mvar: f64) -> Self {
        self.pprod = Megawatts(pprod_mw);
        self.qprod = Megavars(qprod_mvar);
        self
    }

    /// Set ZIP load model coefficients `[z, i, p]`.
    pub fn with_zip(mut self, zip: [f64; 3]) -> Self {
        self.zip = zip;
        self
    }

    /// Set base voltage in kV.
    pub fn with_v_base(mut self, kv: f64) -> Self {
        self.v_base = Kilovolts(kv);
        self
    }

    /// Set source capability for slack election.
    pub fn with_source(mut self, source: SourceKind) -> Self {
        self.source = source;
        self
    }

    /// ZIP correction factor at voltage magnitude `v` (per-unit):
    /// `z·v² + i·v + p`.
    #[inline]
    pub fn voltage_correction(&self, v: f64) -> f64 {
        self.zip[0] * v * v + self.zip[1] * v + self.zip[2]
    }

    /// Reset solver-owned voltage state and accumulators to their initial
    /// values. Topology links are untouched.
    pub fn reset_flow_state(&mut self) {
        self.vomag = PerUnit(1.0);
        self.voang = Radians(0.0);
        self.p_load_downstream = 0.0;
        self.q_load_downstream = 0.0;
        self.p_loss_downstream = 0.0;
        self.q_loss_downstream = 0.0;
        self.reset_sensitivities();
    }

    /// Zero all voltage/loss sensitivities.
    pub fn reset_sensitivities(&mut self) {
        self.dvdp = 0.0;
        self.dvdq = 0.0;
        self.dploss_dp = 0.0;
        self.dploss_dq = 0.0;
        self.dqloss_dp = 0.0;
        self.dqloss_dq = 0.0;
        self.d2ploss_dp2 = 0.0;
        self.d2ploss_dq2 = 0.0;
    }
}

/// A distribution line, directed from the upstream (`from_bus`) to the
/// downstream (`to_bus`) end of the current tree.
#[derive(Debug, Clone)]
pub struct Line {
    pub id: LineId,
    pub name: String,
    pub from_bus: BusId,
    pub to_bus: BusId,
    /// Series resistance (Ω)
    pub r: Ohms,
    /// Series reactance (Ω)
    pub x: Ohms,
    /// In service and carrying power
    pub connected: bool,
    /// Normally-open backup line, excluded from the primary tree
    pub is_backup: bool,
    /// Faulted; cannot be reconnected until repaired
    pub failed: bool,
    /// Thermal rating (MVA)
    pub capacity: MegavoltAmperes,
    /// Active loss from the last solve (MW)
    pub p_loss: Megawatts,
    /// Reactive loss from the last solve (Mvar)
    pub q_loss: Megavars,
    /// Disconnectors gating this line
    pub disconnectors: Vec<SwitchId>,
}

impl Line {
    /// Create a connected line between two buses with ohmic impedance.
    pub fn new(name: impl Into<String>, from_bus: BusId, to_bus: BusId, r: Ohms, x: Ohms) -> Self {
        Self {
            id: LineId(0),
            name: name.into(),
            from_bus,
            to_bus,
            r,
            x,
            connected: true,
            is_backup: false,
            failed: false,
            capacity: MegavoltAmperes(f64::INFINITY),
            p_loss: Megawatts(0.0),
            q_loss: Megavars(0.0),
            disconnectors: Vec::new(),
        }
    }

    /// Mark as a normally-open backup line (constructed disconnected).
    pub fn as_backup(mut self) -> Self {
        self.is_backup = true;
        self.connected = false;
        self
    }

    /// Attach a thermal rating in MVA.
    pub fn with_capacity(mut self, mva: f64) -> Self {
        self.capacity = MegavoltAmperes(mva);
        self
    }

    /// The endpoint opposite `bus`.
    #[inline]
    pub fn other_end(&self, bus: BusId) -> BusId {
        if bus == self.from_bus {
            self.to_bus
        } else {
            self.from_bus
        }
    }

    /// True when `bus` is one of the endpoints.
    #[inline]
    pub fn touches(&self, bus: BusId) -> bool {
        self.from_bus == bus || self.to_bus == bus
    }

    /// Swap the stored direction.
    #[inline]
    pub fn swap_direction(&mut self) {
        std::mem::swap(&mut self.from_bus, &mut self.to_bus);
    }

    /// Series resistance in per-unit on the given bases.
    #[inline]
    pub fn r_pu(&self, v_base: Kilovolts, s_base: MegavoltAmperes) -> f64 {
        self.r.to_per_unit(v_base, s_base)
    }

    /// Series reactance in per-unit on the given bases.
    #[inline]
    pub fn x_pu(&self, v_base: Kilovolts, s_base: MegavoltAmperes) -> f64 {
        self.x.to_per_unit(v_base, s_base)
    }
}

/// A disconnector switch attached to one line.
#[derive(Debug, Clone)]
pub struct Switch {
    pub id: SwitchId,
    pub name: String,
    /// The line this switch sections
    pub line: LineId,
    /// Open switches interrupt the line
    pub open: bool,
    /// Time left before the switch may operate again
    pub remaining_section_time: Hours,
}

impl Switch {
    /// Create a closed switch on `line`.
    pub fn new(name: impl Into<String>, line: LineId) -> Self {
        Self {
            id: SwitchId(0),
            name: name.into(),
            line,
            open: false,
            remaining_section_time: Hours::ZERO,
        }
    }

    /// Construct in the open position (for backup lines).
    pub fn starts_open(mut self) -> Self {
        self.open = true;
        self
    }

    /// Set the remaining sectioning time.
    pub fn with_section_time(mut self, hours: f64) -> Self {
        self.remaining_section_time = Hours(hours);
        self
    }

    /// True when the switch may operate (no sectioning time left).
    #[inline]
    pub fn can_operate(&self) -> bool {
        self.remaining_section_time.is_elapsed()
    }
}

/// The registry owning all buses, lines and switches of one network.
///
/// IDs are dense indices assigned on insertion; adjacency
/// (`Bus::connected_lines`, `Line::disconnectors`) is maintained here so the
/// components never get out of sync with the arenas.
#[derive(Debug)]
pub struct PowerSystem {
    pub name: String,
    /// Per-unit power base (MVA)
    pub s_base: MegavoltAmperes,
    buses: Vec<Bus>,
    lines: Vec<Line>,
    switches: Vec<Switch>,
}

impl Default for PowerSystem {
    fn default() -> Self {
        Self::new("")
    }
}

impl PowerSystem {
    /// Create an empty system on a 1 MVA base (distribution scale).
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            s_base: MegavoltAmperes(1.0),
            buses: Vec::new(),
            lines: Vec::new(),
            switches: Vec::new(),
        }
    }

    /// Override the per-unit power base.
    pub fn with_s_base(mut self, mva: f64) -> Self {
        self.s_base = MegavoltAmperes(mva);
        self
    }

    /// Register a bus, assigning its ID.
    pub fn add_bus(&mut self, mut bus: Bus) -> BusId {
        let id = BusId(self.buses.len());
        bus.id = id;
        self.buses.push(bus);
        id
    }

    /// Register a line, assigning its ID and wiring endpoint adjacency.
    pub fn add_line(&mut self, mut line: Line) -> LineId {
        let id = LineId(self.lines.len());
        line.id = id;
        self.buses[line.from_bus.value()].connected_lines.push(id);
        self.buses[line.to_bus.value()].connected_lines.push(id);
        self.lines.push(line);
        id
    }

    /// Register a switch, assigning its ID and attaching it to its line.
    pub fn add_switch(&mut self, mut switch: Switch) -> SwitchId {
        let id = SwitchId(self.switches.len());
        switch.id = id;
        self.lines[switch.line.value()].disconnectors.push(id);
        self.switches.push(switch);
        id
    }

    pub fn bus(&self, id: BusId) -> &Bus {
        &self.buses[id.value()]
    }

    pub fn bus_mut(&mut self, id: BusId) -> &mut Bus {
        &mut self.buses[id.value()]
    }

    pub fn line(&self, id: LineId) -> &Line {
        &self.lines[id.value()]
    }

    pub fn line_mut(&mut self, id: LineId) -> &mut Line {
        &mut self.lines[id.value()]
    }

    pub fn switch(&self, id: SwitchId) -> &Switch {
        &self.switches[id.value()]
    }

    pub fn switch_mut(&mut self, id: SwitchId) -> &mut Switch {
        &mut self.switches[id.value()]
    }

    pub fn buses(&self) -> &[Bus] {
        &self.buses
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    pub fn switches(&self) -> &[Switch] {
        &self.switches
    }

    pub fn bus_count(&self) -> usize {
        self.buses.len()
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// All bus IDs in registration order.
    pub fn bus_ids(&self) -> impl Iterator<Item = BusId> + '_ {
        (0..self.buses.len()).map(BusId)
    }

    /// All line IDs in registration order.
    pub fn line_ids(&self) -> impl Iterator<Item = LineId> + '_ {
        (0..self.lines.len()).map(LineId)
    }

    /// Take a line out of service as faulted: disconnect it and open its
    /// disconnectors. A failed line is never eligible for reconnection.
    pub fn fail_line(&mut self, id: LineId) {
        let switch_ids = {
            let line = &mut self.lines[id.value()];
            line.failed = true;
            line.connected = false;
            line.disconnectors.clone()
        };
        for sw in switch_ids {
            self.switches[sw.value()].open = true;
        }
    }

    /// Return a repaired line to its normal state: backup lines stay open,
    /// primary lines reconnect.
    pub fn restore_line(&mut self, id: LineId) {
        let (switch_ids, reconnect) = {
            let line = &mut self.lines[id.value()];
            line.failed = false;
            line.connected = !line.is_backup;
            (line.disconnectors.clone(), !line.is_backup)
        };
        for sw in switch_ids {
            self.switches[sw.value()].open = !reconnect;
        }
    }

    /// Close a line and its disconnectors (backup reconnection).
    pub fn connect_line(&mut self, id: LineId) {
        let switch_ids = {
            let line = &mut self.lines[id.value()];
            line.connected = true;
            line.disconnectors.clone()
        };
        for sw in switch_ids {
            self.switches[sw.value()].open = false;
        }
    }

    /// True when every disconnector on the line is free to operate.
    pub fn line_switches_ready(&self, id: LineId) -> bool {
        self.lines[id.value()]
            .disconnectors
            .iter()
            .all(|sw| self.switches[sw.value()].can_operate())
    }

    /// Total system load (MW, Mvar).
    pub fn total_load(&self) -> (Megawatts, Megavars) {
        let p = self.buses.iter().map(|b| b.pload).sum();
        let q = self.buses.iter().map(|b| b.qload).sum();
        (p, q)
    }

    /// Compute basic statistics about the system.
    pub fn stats(&self) -> SystemStats {
        let mut stats = SystemStats {
            num_buses: self.buses.len(),
            num_switches: self.switches.len(),
            ..SystemStats::default()
        };

        for bus in &self.buses {
            stats.total_load_mw += bus.pload.value();
            stats.total_load_mvar += bus.qload.value();
            stats.total_prod_mw += bus.pprod.value();
            if bus.source.can_anchor() {
                stats.num_source_buses += 1;
            }
        }
        for line in &self.lines {
            if line.is_backup {
                stats.num_backup_lines += 1;
            } else {
                stats.num_lines += 1;
            }
        }

        stats
    }

    /// Validate system data for common issues that break partitioning or the
    /// load-flow solve. Populates the provided `Diagnostics`.
    pub fn validate_into(&self, diag: &mut Diagnostics) {
        if self.buses.is_empty() {
            diag.add_error("structure", "System has no buses");
            return;
        }

        if self.s_base.value() <= 0.0 {
            diag.add_error("structure", "Per-unit power base must be positive");
        }

        for bus in &self.buses {
            let zip_sum: f64 = bus.zip.iter().sum();
            if (zip_sum - 1.0).abs() > 1e-9 {
                diag.add_warning_with_entity(
                    "validation",
                    &format!("ZIP coefficients sum to {:.6}, expected 1", zip_sum),
                    &format!("Bus {}", bus.name),
                );
            }
            if bus.v_base.value() <= 0.0 {
                diag.add_error_with_entity(
                    "validation",
                    "Base voltage must be positive",
                    &format!("Bus {}", bus.name),
                );
            }
        }

        for line in &self.lines {
            if line.from_bus.value() >= self.buses.len() || line.to_bus.value() >= self.buses.len()
            {
                diag.add_error_with_entity(
                    "reference",
                    "Line endpoint is not a registered bus",
                    &format!("Line {}", line.name),
                );
            }
            if line.r.value() < 0.0 || line.x.value() < 0.0 {
                diag.add_error_with_entity(
                    "physical",
                    "Line impedance must be non-negative",
                    &format!("Line {}", line.name),
                );
            }
        }

        if !self.buses.iter().any(|b| b.source.can_anchor()) {
            diag.add_warning(
                "structure",
                "No bus has source capability; no island can elect a slack",
            );
        }

        let stats = self.stats();
        if stats.total_load_mw.abs() < 1e-9 {
            diag.add_warning("structure", "System has no load");
        }
    }
}

/// Statistics about a system's size and load
#[derive(Debug, Clone, Default, Serialize)]
pub struct SystemStats {
    pub num_buses: usize,
    pub num_lines: usize,
    pub num_backup_lines: usize,
    pub num_switches: usize,
    pub num_source_buses: usize,
    pub total_load_mw: f64,
    pub total_load_mvar: f64,
    pub total_prod_mw: f64,
}

impl std::fmt::Display for SystemStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} buses, {} lines (+{} backup), {} switches, {:.3} MW load",
            self.num_buses, self.num_lines, self.num_backup_lines, self.num_switches,
            self.total_load_mw
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_bus_system() -> (PowerSystem, BusId, BusId, LineId) {
        let mut system = PowerSystem::new("test");
        let b1 = system.add_bus(Bus::new("B1").with_source(SourceKind::Transformer));
        let b2 = system.add_bus(Bus::new("B2").with_load(0.05, 0.01));
        let l1 = system.add_line(Line::new("L1", b1, b2, Ohms(0.5), Ohms(0.5)));
        (system, b1, b2, l1)
    }

    #[test]
    fn test_registry_assigns_dense_ids() {
        let (system, b1, b2, l1) = two_bus_system();
        assert_eq!(b1.value(), 0);
        assert_eq!(b2.value(), 1);
        assert_eq!(l1.value(), 0);
        assert_eq!(system.bus(b1).name, "B1");
        assert_eq!(system.line(l1).name, "L1");
    }

    #[test]
    fn test_adjacency_maintained() {
        let (system, b1, b2, l1) = two_bus_system();
        assert_eq!(system.bus(b1).connected_lines, vec![l1]);
        assert_eq!(system.bus(b2).connected_lines, vec![l1]);
        assert_eq!(system.line(l1).other_end(b1), b2);
    }

    #[test]
    fn test_switch_registration() {
        let (mut system, _, _, l1) = two_bus_system();
        let s1 = system.add_switch(Switch::new("S1", l1));
        assert_eq!(system.line(l1).disconnectors, vec![s1]);
        assert!(system.switch(s1).can_operate());
        assert!(system.line_switches_ready(l1));
    }

    #[test]
    fn test_fail_and_restore_line() {
        let (mut system, _, _, l1) = two_bus_system();
        let s1 = system.add_switch(Switch::new("S1", l1));

        system.fail_line(l1);
        assert!(system.line(l1).failed);
        assert!(!system.line(l1).connected);
        assert!(system.switch(s1).open);

        system.restore_line(l1);
        assert!(!system.line(l1).failed);
        assert!(system.line(l1).connected);
        assert!(!system.switch(s1).open);
    }

    #[test]
    fn test_restore_backup_line_stays_open() {
        let mut system = PowerSystem::new("test");
        let b1 = system.add_bus(Bus::new("B1"));
        let b2 = system.add_bus(Bus::new("B2"));
        let l1 = system.add_line(Line::new("LB", b1, b2, Ohms(0.5), Ohms(0.5)).as_backup());

        system.fail_line(l1);
        system.restore_line(l1);
        assert!(!system.line(l1).connected);
        assert!(system.line(l1).is_backup);
    }

    #[test]
    fn test_sectioning_time_blocks_operation() {
        let (mut system, _, _, l1) = two_bus_system();
        system.add_switch(Switch::new("S1", l1).with_section_time(0.5));
        assert!(!system.line_switches_ready(l1));
    }

    #[test]
    fn test_zip_voltage_correction() {
        let bus = Bus::new("B1").with_zip([0.2, 0.3, 0.5]);
        // At nominal voltage the correction is exactly 1
        assert!((bus.voltage_correction(1.0) - 1.0).abs() < 1e-12);
        // Constant-power default is voltage independent
        let cp = Bus::new("B2");
        assert!((cp.voltage_correction(0.9) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_stats_and_validation() {
        let (system, _, _, _) = two_bus_system();
        let stats = system.stats();
        assert_eq!(stats.num_buses, 2);
        assert_eq!(stats.num_lines, 1);
        assert_eq!(stats.num_source_buses, 1);
        assert!((stats.total_load_mw - 0.05).abs() < 1e-12);

        let mut diag = Diagnostics::new();
        system.validate_into(&mut diag);
        assert!(!diag.has_errors());
    }

    #[test]
    fn test_validation_empty_system() {
        let system = PowerSystem::new("empty");
        let mut diag = Diagnostics::new();
        system.validate_into(&mut diag);
        assert!(diag.has_errors());
        assert!(diag.errors().any(|i| i.message.contains("no buses")));
    }

    #[test]
    fn test_validation_bad_zip() {
        let mut system = PowerSystem::new("test");
        system.add_bus(Bus::new("B1").with_zip([0.5, 0.5, 0.5]));
        let mut diag = Diagnostics::new();
        system.validate_into(&mut diag);
        assert!(diag.warnings().any(|i| i.message.contains("ZIP")));
    }

    #[test]
    fn test_reset_flow_state() {
        let mut bus = Bus::new("B1");
        bus.vomag = PerUnit(0.95);
        bus.p_load_downstream = 0.4;
        bus.dvdp = -0.01;
        bus.reset_flow_state();
        assert_eq!(bus.vomag, PerUnit(1.0));
        assert_eq!(bus.p_load_downstream, 0.0);
        assert_eq!(bus.dvdp, 0.0);
    }
}
