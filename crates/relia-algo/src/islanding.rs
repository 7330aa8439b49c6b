//! Island detection, backup reconnection and slack election.
//!
//! After line failures a distribution network falls apart into electrically
//! separate sub-systems. This module:
//!
//! 1. labels every bus with the sub-system that owns it (a single tag per
//!    bus, so membership checks are a field comparison),
//! 2. tries to heal splits by closing normally-open backup lines whose
//!    disconnectors are free to operate, and
//! 3. elects a slack bus per sub-system from the source capabilities present,
//!    in fixed priority order.
//!
//! A sub-system that ends up without any slack candidate is still returned -
//! the caller reports its load as unserved rather than solving it.

use relia_core::units::{Hours, Megavars, Megawatts};
use relia_core::{BusId, LineId, PowerSystem, SourceKind, SubSystemId};
use serde::Serialize;

/// Slack election priority, highest first.
const ELECTION_ORDER: [SourceKind; 5] = [
    SourceKind::Transformer,
    SourceKind::StorageMainGrid,
    SourceKind::StorageSupport,
    SourceKind::Production,
    SourceKind::V2G,
];

/// One electrically connected sub-system: its buses, its in-service lines and
/// the elected slack (if any source capability is present).
#[derive(Debug, Clone, Serialize)]
pub struct SubSystem {
    /// Partition index for this pass
    pub id: SubSystemId,
    /// Member buses, ascending by id
    pub buses: Vec<BusId>,
    /// In-service member lines, ascending by id
    pub lines: Vec<LineId>,
    /// Elected slack bus, `None` when nothing can anchor the island
    pub slack: Option<BusId>,
}

impl SubSystem {
    /// True when a slack was elected and the island can be solved.
    pub fn is_solvable(&self) -> bool {
        self.slack.is_some()
    }

    pub fn contains_bus(&self, bus: BusId) -> bool {
        self.buses.binary_search(&bus).is_ok()
    }

    pub fn contains_line(&self, line: LineId) -> bool {
        self.lines.binary_search(&line).is_ok()
    }

    /// Total member load (MW, Mvar); for an unsolvable island this is the
    /// unserved load reported to shedding logic.
    pub fn total_load(&self, system: &PowerSystem) -> (Megawatts, Megavars) {
        let p = self.buses.iter().map(|&b| system.bus(b).pload).sum();
        let q = self.buses.iter().map(|&b| system.bus(b).qload).sum();
        (p, q)
    }
}

/// Split the system into sub-systems, heal splits through eligible backup
/// lines, and elect one slack per sub-system.
///
/// `time` stamps the survival countdown of support-mode storage units that
/// get elected. Re-running on unchanged connectivity returns identical
/// membership.
pub fn find_sub_systems(system: &mut PowerSystem, time: Hours) -> Vec<SubSystem> {
    let mut subs = partition(system);

    // Healing loop: close one eligible backup line, re-partition, repeat.
    // Closed lines stay closed, so the sub-system count strictly decreases
    // and the loop is bounded by the number of backup lines.
    while subs.len() > 1 {
        let candidate = closable_backup(system);
        match candidate {
            Some(line_id) => {
                system.connect_line(line_id);
                tracing::info!(
                    line = %system.line(line_id).name,
                    "closed backup line to merge sub-systems"
                );
                subs = partition(system);
            }
            None => break,
        }
    }

    elect_slacks(system, &mut subs, time);
    subs
}

/// A backup line bridging two different sub-systems whose disconnectors are
/// all free to operate.
fn closable_backup(system: &PowerSystem) -> Option<LineId> {
    system
        .lines()
        .iter()
        .find(|line| {
            line.is_backup
                && !line.failed
                && !line.connected
                && system.bus(line.from_bus).sub_system != system.bus(line.to_bus).sub_system
                && system.line_switches_ready(line.id)
        })
        .map(|line| line.id)
}

/// Flood-fill labeling over in-service lines. Every bus ends up in exactly
/// one sub-system; membership vectors come back sorted.
fn partition(system: &mut PowerSystem) -> Vec<SubSystem> {
    let n = system.bus_count();
    for id in system.bus_ids().collect::<Vec<_>>() {
        system.bus_mut(id).sub_system = None;
    }

    let mut subs = Vec::new();
    let mut line_seen = vec![false; system.line_count()];

    for start in 0..n {
        let start = BusId::new(start);
        if system.bus(start).sub_system.is_some() {
            continue;
        }

        let sub_id = SubSystemId::new(subs.len());
        let mut buses = Vec::new();
        let mut lines = Vec::new();
        let mut stack = vec![start];
        system.bus_mut(start).sub_system = Some(sub_id);

        while let Some(b) = stack.pop() {
            buses.push(b);
            let adjacent = system.bus(b).connected_lines.clone();
            for lid in adjacent {
                let line = system.line(lid);
                if !line.connected || line.failed {
                    continue;
                }
                if !line_seen[lid.value()] {
                    line_seen[lid.value()] = true;
                    lines.push(lid);
                }
                let other = line.other_end(b);
                if system.bus(other).sub_system.is_none() {
                    system.bus_mut(other).sub_system = Some(sub_id);
                    stack.push(other);
                }
            }
        }

        buses.sort();
        lines.sort();
        subs.push(SubSystem {
            id: sub_id,
            buses,
            lines,
            slack: None,
        });
    }

    subs
}

/// Fixed-priority slack election. Within a tier the lowest bus id wins, so
/// flood-fill discovery order cannot change the outcome.
fn elect_slacks(system: &mut PowerSystem, subs: &mut [SubSystem], time: Hours) {
    for id in system.bus_ids().collect::<Vec<_>>() {
        system.bus_mut(id).is_slack = false;
    }

    for sub in subs.iter_mut() {
        let winner = ELECTION_ORDER.iter().find_map(|&kind| {
            sub.buses
                .iter()
                .copied()
                .find(|&b| system.bus(b).source == kind)
        });

        match winner {
            Some(b) => {
                let bus = system.bus_mut(b);
                bus.is_slack = true;
                if bus.source == SourceKind::StorageSupport {
                    // Entering microgrid support starts the survival clock;
                    // a clock already running keeps its start time.
                    bus.microgrid_since.get_or_insert(time);
                }
                sub.slack = Some(b);
            }
            None => {
                sub.slack = None;
                tracing::warn!(
                    sub_system = sub.id.value(),
                    buses = sub.buses.len(),
                    "no slack candidate; island load is unserved"
                );
            }
        }
    }
}
