/*!
 * Continuity resolution tests across whole storyboards
 */

use reelsmith::continuity::{ContinuityResolver, GroupStatus, ProposedGroup, TransitionType};
use reelsmith::errors::ContinuityIssue;
use crate::common;

fn proposed(id: &str, scene_id: &str, shots: &[&str], transition: &str) -> ProposedGroup {
    ProposedGroup {
        id: id.to_string(),
        scene_id: scene_id.to_string(),
        shot_ids: shots.iter().map(|s| s.to_string()).collect(),
        transition: transition.to_string(),
        status: GroupStatus::Approved,
    }
}

/// All orderings of a small slice
fn permutations(groups: &[ProposedGroup]) -> Vec<Vec<ProposedGroup>> {
    if groups.len() <= 1 {
        return vec![groups.to_vec()];
    }
    let mut all = Vec::new();
    for i in 0..groups.len() {
        let mut rest = groups.to_vec();
        let head = rest.remove(i);
        for mut tail in permutations(&rest) {
            tail.insert(0, head.clone());
            all.push(tail);
        }
    }
    all
}

#[test]
fn test_resolve_anyProposalOrder_shouldYieldSameInheritance() {
    let board = common::board(&[&[2.0, 2.0, 2.0, 2.0], &[3.0, 3.0, 3.0]]);
    let groups = vec![
        proposed("a", "s1", &["s1-2", "s1-3"], "seamless"),
        proposed("b", "s1", &["s1-1", "s1-2"], "match-cut"),
        proposed("c", "s1", &["s1-3", "s1-4"], "light-shift"),
        proposed("d", "s2", &["s2-1", "s2-2", "s2-3"], "camera-continuation"),
    ];

    let resolver = ContinuityResolver::new();
    let reference = resolver.resolve(&board.shots_by_scene, &groups);

    for ordering in permutations(&groups) {
        let resolution = resolver.resolve(&board.shots_by_scene, &ordering);
        assert_eq!(resolution.inheritance, reference.inheritance);
    }

    // Scene 1 is one unbroken chain whatever the order
    assert!(reference.get("s1-1").unwrap().is_first);
    for (shot, previous) in [("s1-2", "s1-1"), ("s1-3", "s1-2"), ("s1-4", "s1-3")] {
        let inheritance = reference.get(shot).unwrap();
        assert!(!inheritance.is_first);
        assert_eq!(inheritance.previous_shot_id.as_deref(), Some(previous));
    }
    assert_eq!(reference.inheriting_count(), 5);
}

#[test]
fn test_resolve_groupReferencingOtherScene_shouldDrop() {
    let board = common::board(&[&[2.0, 2.0], &[2.0, 2.0]]);
    let groups = vec![proposed("cross", "s2", &["s1-2", "s2-1"], "seamless")];

    let resolution = ContinuityResolver::new().resolve(&board.shots_by_scene, &groups);

    assert!(resolution.groups.is_empty());
    assert_eq!(resolution.dropped.len(), 1);
    assert_eq!(
        resolution.dropped[0].issue,
        ContinuityIssue::TooFewShots {
            scene_id: "s2".to_string(),
            found: 1
        }
    );
    assert!(resolution.get("s2-1").unwrap().is_first);
}

#[test]
fn test_resolve_mixedValidAndInvalid_shouldKeepOnlyValid() {
    let board = common::board(&[&[2.0; 6]]);
    let groups = vec![
        proposed("gap", "s1", &["s1-1", "s1-3"], "seamless"),
        proposed("ok", "s1", &["s1-4", "s1-5", "s1-6"], "whip pan"),
        proposed("ghost", "s9", &["s9-1", "s9-2"], "seamless"),
    ];

    let resolution = ContinuityResolver::new().resolve(&board.shots_by_scene, &groups);

    assert_eq!(resolution.groups.len(), 1);
    assert_eq!(resolution.groups[0].id, "ok");
    assert_eq!(resolution.groups[0].transition, TransitionType::Seamless);
    assert_eq!(resolution.dropped.len(), 2);
    assert!(resolution.get("s1-3").unwrap().is_first);
    assert_eq!(
        resolution.get("s1-6").unwrap().previous_shot_id.as_deref(),
        Some("s1-5")
    );
}
