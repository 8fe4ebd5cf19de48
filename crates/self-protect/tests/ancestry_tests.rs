mod support;

use self_protect::{ProcessAncestryResolver, MAX_ANCESTRY_DEPTH};
use support::FakePlatform;

#[test]
fn chain_walks_to_topmost_resolvable_ancestor() {
    let platform = FakePlatform::new(1)
        .with_parent(7400, 5120)
        .with_parent(5120, 4012)
        .with_parent(4012, 912);
    let resolver = ProcessAncestryResolver::new(&platform);

    let chain = resolver.chain_of(7400);
    assert_eq!(chain.pids(), &[7400, 5120, 4012, 912]);
    assert_eq!(chain.ancestors(), &[5120, 4012, 912]);
    assert_eq!(chain.start(), 7400);
    assert_eq!(chain.depth(), 3);
    assert_eq!(resolver.top_level_ancestor_of(7400), 912);
}

#[test]
fn failed_lookup_yields_zero_length_chain() {
    let platform = FakePlatform::new(1);
    let resolver = ProcessAncestryResolver::new(&platform);

    assert_eq!(resolver.parent_of(3300), None);
    let chain = resolver.chain_of(3300);
    assert_eq!(chain.pids(), &[3300]);
    assert!(chain.ancestors().is_empty());
    assert_eq!(resolver.top_level_ancestor_of(3300), 3300);
}

#[test]
fn self_parent_at_second_step_stops_the_walk() {
    let platform = FakePlatform::new(1)
        .with_parent(6000, 6100)
        .with_parent(6100, 6100);
    let resolver = ProcessAncestryResolver::new(&platform);

    assert_eq!(resolver.chain_of(6000).pids(), &[6000, 6100]);
    assert_eq!(resolver.top_level_ancestor_of(6000), 6100);
}

#[test]
fn parent_zero_is_treated_as_no_parent() {
    let platform = FakePlatform::new(1).with_parent(4, 0);
    let resolver = ProcessAncestryResolver::new(&platform);

    assert_eq!(resolver.parent_of(4), None);
    assert_eq!(resolver.top_level_ancestor_of(4), 4);
}

#[test]
fn reused_pid_cycle_terminates() {
    let platform = FakePlatform::new(1)
        .with_parent(100, 200)
        .with_parent(200, 300)
        .with_parent(300, 100);
    let resolver = ProcessAncestryResolver::new(&platform);

    assert_eq!(resolver.chain_of(100).pids(), &[100, 200, 300]);
}

#[test]
fn walk_is_bounded_by_max_depth() {
    let mut platform = FakePlatform::new(1);
    for pid in 1000..1000 + (MAX_ANCESTRY_DEPTH as u32) * 2 {
        platform = platform.with_parent(pid, pid + 1);
    }
    let resolver = ProcessAncestryResolver::new(&platform);
    assert_eq!(resolver.chain_of(1000).depth(), MAX_ANCESTRY_DEPTH);

    let shallow = ProcessAncestryResolver::new(&platform).with_max_depth(2);
    assert_eq!(shallow.chain_of(1000).pids(), &[1000, 1001, 1002]);
}
