//! Partitioning, backup healing and slack election over split networks.

use relia_algo::test_utils::two_feeders_with_backup;
use relia_algo::find_sub_systems;
use relia_core::units::Hours;
use relia_core::{BusId, LineId, SourceKind};
use std::collections::BTreeSet;

#[test]
fn merge_yields_union_of_memberships() {
    let (mut system, _, backup) = two_feeders_with_backup();

    // First pass with the backup switch blocked: two islands
    let sw = system.line(backup).disconnectors[0];
    system.switch_mut(sw).remaining_section_time = Hours(1.0);
    let split = find_sub_systems(&mut system, Hours::ZERO);
    assert_eq!(split.len(), 2);

    let bus_union: BTreeSet<BusId> = split
        .iter()
        .flat_map(|s| s.buses.iter().copied())
        .collect();
    let line_union: BTreeSet<LineId> = split
        .iter()
        .flat_map(|s| s.lines.iter().copied())
        .collect();

    // Free the switch: the backup closes and the islands merge
    system.switch_mut(sw).remaining_section_time = Hours::ZERO;
    let merged = find_sub_systems(&mut system, Hours::ZERO);
    assert_eq!(merged.len(), 1);

    let merged_buses: BTreeSet<BusId> = merged[0].buses.iter().copied().collect();
    assert_eq!(merged_buses, bus_union);

    // Merged lines = both originals plus the closed backup line
    let mut expected_lines = line_union;
    expected_lines.insert(backup);
    let merged_lines: BTreeSet<LineId> = merged[0].lines.iter().copied().collect();
    assert_eq!(merged_lines, expected_lines);
}

#[test]
fn partition_is_idempotent_on_static_state() {
    let (mut system, _, _) = two_feeders_with_backup();

    let first = find_sub_systems(&mut system, Hours::ZERO);
    let second = find_sub_systems(&mut system, Hours::ZERO);
    let third = find_sub_systems(&mut system, Hours::ZERO);

    assert_eq!(first.len(), second.len());
    assert_eq!(second.len(), third.len());
    for (a, b) in second.iter().zip(third.iter()) {
        assert_eq!(a.buses, b.buses);
        assert_eq!(a.lines, b.lines);
        assert_eq!(a.slack, b.slack);
    }
}

#[test]
fn every_bus_owned_by_exactly_one_sub_system() {
    let (mut system, buses, _) = two_feeders_with_backup();
    let l2 = system.line_ids().nth(1).unwrap();
    system.fail_line(l2);

    let subs = find_sub_systems(&mut system, Hours::ZERO);
    for &b in &buses {
        let owners = subs.iter().filter(|s| s.contains_bus(b)).count();
        assert_eq!(owners, 1, "bus {:?} owned by {} sub-systems", b, owners);
        let tag = system.bus(b).sub_system.unwrap();
        assert!(subs.iter().any(|s| s.id == tag && s.contains_bus(b)));
    }
}

#[test]
fn transformer_outranks_storage_in_merged_island() {
    let (mut system, buses, _) = two_feeders_with_backup();
    let subs = find_sub_systems(&mut system, Hours::ZERO);

    // Backup closes immediately, so both source buses share one island;
    // the transformer-fed bus must win
    assert_eq!(subs.len(), 1);
    assert_eq!(subs[0].slack, Some(buses[0]));
    assert_eq!(system.bus(buses[0]).source, SourceKind::Transformer);
}

#[test]
fn storage_anchors_its_own_island_when_split() {
    let (mut system, buses, backup) = two_feeders_with_backup();
    system.fail_line(backup);

    let subs = find_sub_systems(&mut system, Hours::ZERO);
    assert_eq!(subs.len(), 2);

    let storage_island = subs.iter().find(|s| s.contains_bus(buses[3])).unwrap();
    assert_eq!(storage_island.slack, Some(buses[3]));
    assert!(system.bus(buses[3]).is_slack);
}

#[test]
fn slack_flags_rewritten_each_pass() {
    let (mut system, buses, backup) = two_feeders_with_backup();

    // Split: both B1 and B4 end up slack
    system.switch_mut(system.line(backup).disconnectors[0]).remaining_section_time = Hours(2.0);
    find_sub_systems(&mut system, Hours::ZERO);
    assert!(system.bus(buses[0]).is_slack);
    assert!(system.bus(buses[3]).is_slack);

    // Healed: only the transformer bus keeps the flag
    system.switch_mut(system.line(backup).disconnectors[0]).remaining_section_time = Hours::ZERO;
    find_sub_systems(&mut system, Hours::ZERO);
    assert!(system.bus(buses[0]).is_slack);
    assert!(!system.bus(buses[3]).is_slack);
}
