//! Applies a sanitized, remapped command to a scene.
//!
//! Three ordered passes: update, add, remove. The merge never fails; anything
//! that would break the scene invariants is dropped and logged.

use std::collections::HashSet;

use crate::command::SceneCommand;
use crate::error::ErrorKind;
use crate::scene::{ConstraintDescriptor, ConstraintTarget, Scene};

/// Produces the next scene from `scene` and `command`.
///
/// The input scene is left untouched. If the command has no scene delta the
/// result equals the input.
pub fn merge(scene: &Scene, command: &SceneCommand) -> Scene {
    if command.is_scene_noop() {
        return scene.clone();
    }

    let (mut bodies, mut constraints) = scene.clone().into_parts();

    // Update pass: overwrite defined fields; unknown ids are dropped.
    for patch in &command.updated_bodies {
        match bodies.iter_mut().find(|b| b.id == patch.id) {
            Some(body) => *body = patch.apply_to(body),
            None => tracing::debug!(
                kind = ErrorKind::DanglingReference.as_str(),
                "[merge] update for unknown body {} ignored",
                patch.id
            ),
        }
    }

    // Add pass: bodies first so new constraints can reference them.
    let mut ids: HashSet<String> = bodies.iter().map(|b| b.id.clone()).collect();
    for body in &command.new_bodies {
        if !body.is_finite() {
            tracing::warn!(
                kind = ErrorKind::NumericInstability.as_str(),
                "[merge] non-finite body {} not added",
                body.id
            );
            continue;
        }
        if !ids.insert(body.id.clone()) {
            tracing::warn!("[merge] body id {} already present, not added", body.id);
            continue;
        }
        bodies.push(body.clone());
    }

    for constraint in &command.new_constraints {
        if admits(constraint, &ids) {
            constraints.push(constraint.clone());
        } else {
            tracing::warn!(
                kind = ErrorKind::DanglingReference.as_str(),
                "[merge] constraint {} -> {:?} dropped",
                constraint.body_a,
                constraint.target
            );
        }
    }

    // Remove pass: a constraint survives only if none of its bodies went away.
    if !command.remove_body_ids.is_empty() {
        let removed: HashSet<&str> = command.remove_body_ids.iter().map(String::as_str).collect();
        bodies.retain(|b| !removed.contains(b.id.as_str()));
        constraints.retain(|c| !removed.iter().any(|id| c.references(id)));
    }

    let merged = Scene::from_parts(bodies, constraints);
    debug_assert!(merged.is_consistent());
    merged
}

fn admits(constraint: &ConstraintDescriptor, ids: &HashSet<String>) -> bool {
    if !ids.contains(&constraint.body_a) {
        return false;
    }
    match &constraint.target {
        ConstraintTarget::Body(b) => *b != constraint.body_a && ids.contains(b),
        ConstraintTarget::Point(p) => p.iter().all(|v| v.is_finite()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::BodyPatch;
    use crate::scene::{BodyDescriptor, BodyShape};

    fn ball(id: &str) -> BodyDescriptor {
        BodyDescriptor::new(id, BodyShape::Circle { radius: 10.0 }, [100.0, 50.0])
    }

    fn two_bodies_linked() -> Scene {
        Scene::from_parts(
            vec![ball("A"), ball("B")],
            vec![ConstraintDescriptor::between("A", "B")],
        )
    }

    #[test]
    fn test_empty_command_is_identity() {
        let scene = two_bodies_linked();
        let command = SceneCommand {
            summary: "nothing".into(),
            ..Default::default()
        };
        assert_eq!(merge(&scene, &command), scene);
    }

    #[test]
    fn test_remove_cascades_to_constraints() {
        let scene = two_bodies_linked();
        let command = SceneCommand {
            remove_body_ids: vec!["B".into()],
            ..Default::default()
        };

        let merged = merge(&scene, &command);
        let ids: Vec<_> = merged.bodies().iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["A"]);
        assert!(merged.constraints().is_empty());
    }

    #[test]
    fn test_remove_cascades_from_body_a_side() {
        let scene = Scene::from_parts(
            vec![ball("A"), ball("B"), ball("C")],
            vec![
                ConstraintDescriptor::between("A", "B"),
                ConstraintDescriptor::between("B", "C"),
                ConstraintDescriptor::anchored("C", [0.0, 0.0]),
            ],
        );
        let command = SceneCommand {
            remove_body_ids: vec!["A".into()],
            ..Default::default()
        };

        let merged = merge(&scene, &command);
        assert_eq!(merged.constraints().len(), 2);
        assert!(merged.constraints().iter().all(|c| !c.references("A")));
    }

    #[test]
    fn test_update_preserves_unspecified_fields() {
        let scene = two_bodies_linked();
        let command = SceneCommand {
            updated_bodies: vec![BodyPatch {
                id: "A".into(),
                friction: Some(0.9),
                ..Default::default()
            }],
            ..Default::default()
        };

        let merged = merge(&scene, &command);
        let before = scene.body("A").unwrap();
        let after = merged.body("A").unwrap();
        assert_eq!(after.friction, 0.9);
        assert_eq!(after.position, before.position);
        assert_eq!(after.shape, before.shape);
        assert_eq!(merged.constraints(), scene.constraints());
    }

    #[test]
    fn test_update_for_unknown_id_is_not_an_add() {
        let scene = two_bodies_linked();
        let command = SceneCommand {
            updated_bodies: vec![BodyPatch {
                id: "ghost".into(),
                x: Some(1.0),
                ..Default::default()
            }],
            ..Default::default()
        };

        let merged = merge(&scene, &command);
        assert_eq!(merged, scene);
    }

    #[test]
    fn test_dangling_constraint_is_dropped() {
        let scene = two_bodies_linked();
        let command = SceneCommand {
            new_bodies: vec![ball("C")],
            new_constraints: vec![
                ConstraintDescriptor::between("C", "A"),
                ConstraintDescriptor::between("nowhere", "A"),
                ConstraintDescriptor::between("C", "nowhere"),
                ConstraintDescriptor::between("C", "C"),
            ],
            ..Default::default()
        };

        let merged = merge(&scene, &command);
        assert_eq!(merged.bodies().len(), 3);
        assert_eq!(merged.constraints().len(), 2);
        assert!(merged.is_consistent());
    }

    #[test]
    fn test_add_then_remove_in_same_command() {
        let scene = Scene::empty();
        let command = SceneCommand {
            new_bodies: vec![ball("X"), ball("Y")],
            new_constraints: vec![ConstraintDescriptor::between("X", "Y")],
            remove_body_ids: vec!["Y".into()],
            ..Default::default()
        };

        let merged = merge(&scene, &command);
        assert_eq!(merged.bodies().len(), 1);
        assert!(merged.constraints().is_empty());
    }

    #[test]
    fn test_duplicate_add_is_ignored() {
        let scene = two_bodies_linked();
        let mut replacement = ball("A");
        replacement.position = [999.0, 999.0];
        let command = SceneCommand {
            new_bodies: vec![replacement],
            ..Default::default()
        };

        let merged = merge(&scene, &command);
        assert_eq!(merged.body("A").unwrap().position, [100.0, 50.0]);
        assert_eq!(merged.bodies().len(), 2);
    }

    #[test]
    fn test_input_scene_is_untouched() {
        let scene = two_bodies_linked();
        let snapshot = scene.clone();
        let command = SceneCommand {
            remove_body_ids: vec!["A".into(), "B".into()],
            ..Default::default()
        };

        let merged = merge(&scene, &command);
        assert!(merged.is_empty());
        assert_eq!(scene, snapshot);
    }
}
