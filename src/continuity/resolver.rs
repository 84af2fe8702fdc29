/*!
 * Continuity resolution.
 *
 * Turns proposed continuity groups into a per-shot inheritance map in two
 * passes:
 * 1. **Validation**: drop groups with fewer than two known shots, truncate to
 *    five, drop groups whose shot numbers are not consecutive, and replace
 *    unknown transition labels with the default.
 * 2. **Inheritance**: every approved group first claims its head shot as a
 *    chain start, then marks each following shot as inheriting from its
 *    predecessor. Inheritance only ever upgrades a shot; a later "first"
 *    claim never downgrades an inheriting shot.
 *
 * Groups are processed in a canonical order (scene id, head shot number,
 * group id) so the output does not depend on the order in which groups were
 * proposed. Groups never span scenes, so the scene key only has to be stable.
 */

use log::debug;
use std::collections::{BTreeMap, HashMap};

use crate::errors::ContinuityIssue;
use crate::production::{SceneId, Shot, ShotId};

use super::model::{
    ContinuityGroup, ContinuityResolution, DroppedGroup, Inheritance, ProposedGroup,
    TransitionType, MAX_GROUP_SHOTS, MIN_GROUP_SHOTS,
};

/// Pure resolver for continuity groups
#[derive(Debug, Clone, Copy, Default)]
pub struct ContinuityResolver;

impl ContinuityResolver {
    pub fn new() -> Self {
        Self
    }

    /// Validate every proposed group and build the inheritance map
    pub fn resolve(
        &self,
        shots_by_scene: &BTreeMap<SceneId, Vec<Shot>>,
        proposed: &[ProposedGroup],
    ) -> ContinuityResolution {
        let mut groups = Vec::new();
        let mut dropped = Vec::new();

        for group in proposed {
            match self.validate(shots_by_scene, group) {
                Ok(valid) => groups.push(valid),
                Err(issue) => {
                    debug!("Dropping continuity group {}: {}", group.id, issue);
                    dropped.push(DroppedGroup {
                        group_id: group.id.clone(),
                        issue,
                    });
                }
            }
        }

        let inheritance = self.inheritance_map(shots_by_scene, &groups);

        ContinuityResolution {
            groups,
            inheritance,
            dropped,
        }
    }

    /// Validate a single proposed group against the scene it claims to belong to
    pub fn validate(
        &self,
        shots_by_scene: &BTreeMap<SceneId, Vec<Shot>>,
        group: &ProposedGroup,
    ) -> Result<ContinuityGroup, ContinuityIssue> {
        let scene_shots = shots_by_scene.get(&group.scene_id).ok_or_else(|| {
            ContinuityIssue::UnknownScene {
                scene_id: group.scene_id.clone(),
            }
        })?;

        let numbers_by_id: HashMap<&str, u32> = scene_shots
            .iter()
            .map(|s| (s.id.as_str(), s.sequence_number))
            .collect();

        let mut members: Vec<(&ShotId, u32)> = group
            .shot_ids
            .iter()
            .filter_map(|id| numbers_by_id.get(id.as_str()).map(|n| (id, *n)))
            .collect();

        if members.len() < MIN_GROUP_SHOTS {
            return Err(ContinuityIssue::TooFewShots {
                scene_id: group.scene_id.clone(),
                found: members.len(),
            });
        }

        members.truncate(MAX_GROUP_SHOTS);

        let numbers: Vec<u32> = members.iter().map(|(_, n)| *n).collect();
        if !numbers.windows(2).all(|w| w[0].checked_add(1) == Some(w[1])) {
            return Err(ContinuityIssue::NotConsecutive { numbers });
        }

        Ok(ContinuityGroup {
            id: group.id.clone(),
            scene_id: group.scene_id.clone(),
            shot_ids: members.into_iter().map(|(id, _)| id.clone()).collect(),
            transition: TransitionType::parse_or_default(&group.transition),
            status: group.status,
        })
    }

    fn inheritance_map(
        &self,
        shots_by_scene: &BTreeMap<SceneId, Vec<Shot>>,
        groups: &[ContinuityGroup],
    ) -> BTreeMap<ShotId, Inheritance> {
        let mut map: BTreeMap<ShotId, Inheritance> = shots_by_scene
            .values()
            .flatten()
            .map(|shot| (shot.id.clone(), Inheritance::independent()))
            .collect();

        let first_numbers: HashMap<&str, u32> = shots_by_scene
            .values()
            .flatten()
            .map(|s| (s.id.as_str(), s.sequence_number))
            .collect();

        let mut approved: Vec<&ContinuityGroup> =
            groups.iter().filter(|g| g.is_approved()).collect();
        approved.sort_by(|a, b| {
            let head = |g: &ContinuityGroup| {
                g.shot_ids
                    .first()
                    .and_then(|id| first_numbers.get(id.as_str()).copied())
                    .unwrap_or(0)
            };
            a.scene_id
                .cmp(&b.scene_id)
                .then(head(a).cmp(&head(b)))
                .then(a.id.cmp(&b.id))
        });

        // Chain starts
        for group in &approved {
            let Some(head) = group.shot_ids.first() else {
                continue;
            };
            let entry = map.entry(head.clone()).or_default();
            if entry.is_first && entry.group_id.is_none() {
                entry.group_id = Some(group.id.clone());
            }
        }

        // Inheritance always wins over a "first" claim
        for group in &approved {
            for pair in group.shot_ids.windows(2) {
                let entry = map.entry(pair[1].clone()).or_default();
                if entry.is_first {
                    *entry = Inheritance {
                        group_id: Some(group.id.clone()),
                        is_first: false,
                        previous_shot_id: Some(pair[0].clone()),
                    };
                }
            }
        }

        map
    }
}
