//! Id namespacing for bodies created by a command.
//!
//! Models reuse natural ids ("ball", "box") across commands. Each command's
//! new bodies get a per-command suffix so a repeated instruction never
//! collides with what an earlier one created.

use std::collections::{HashMap, HashSet};

use crate::command::SceneCommand;
use crate::scene::{ConstraintTarget, Scene};

/// Width of the time-derived suffix, in decimal digits.
pub const SUFFIX_DIGITS: usize = 4;

/// Produces the disambiguating token for one command.
pub trait SuffixSource: Send + Sync {
    fn next_suffix(&self) -> String;
}

/// Suffix from the last `SUFFIX_DIGITS` digits of the wall-clock milliseconds.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClockSuffix;

impl SuffixSource for ClockSuffix {
    fn next_suffix(&self) -> String {
        let millis = chrono::Utc::now().timestamp_millis();
        #[allow(clippy::cast_possible_truncation)]
        let modulus = 10_i64.pow(SUFFIX_DIGITS as u32);
        format!("{:0width$}", millis.rem_euclid(modulus), width = SUFFIX_DIGITS)
    }
}

/// Always returns the same suffix. Useful for replays and tests.
#[derive(Debug, Clone)]
pub struct FixedSuffix(pub String);

impl SuffixSource for FixedSuffix {
    fn next_suffix(&self) -> String {
        self.0.clone()
    }
}

/// Result of remapping one command.
#[derive(Debug, Clone, Default)]
pub struct Remapped {
    pub command: SceneCommand,
    /// Model id → minted id, scoped to this command.
    pub mapping: HashMap<String, String>,
}

/// Mints ids for the command's new bodies and rewrites its new constraints.
///
/// Update fragments and removals address existing bodies and pass through
/// untouched. Constraint ids not minted by this command also pass through, so
/// a new body can be attached to a pre-existing one.
pub fn remap_new_entities(mut command: SceneCommand, suffix: &str, scene: &Scene) -> Remapped {
    let existing = scene.body_ids();
    let mut minted: HashSet<String> = HashSet::new();
    let mut mapping = HashMap::new();

    for body in &mut command.new_bodies {
        let new_id = mint_id(&body.id, suffix, &existing, &minted);
        minted.insert(new_id.clone());
        // First body claims a repeated model id.
        mapping.entry(body.id.clone()).or_insert_with(|| new_id.clone());
        body.id = new_id;
    }

    for constraint in &mut command.new_constraints {
        if let Some(mapped) = mapping.get(&constraint.body_a) {
            constraint.body_a.clone_from(mapped);
        }
        if let ConstraintTarget::Body(body_b) = &mut constraint.target {
            if let Some(mapped) = mapping.get(body_b.as_str()) {
                body_b.clone_from(mapped);
            }
        }
    }

    tracing::debug!("[identity] minted {} ids with suffix {suffix}", mapping.len());
    Remapped { command, mapping }
}

fn mint_id(
    model_id: &str,
    suffix: &str,
    existing: &HashSet<&str>,
    minted: &HashSet<String>,
) -> String {
    let base = format!("{model_id}_{suffix}");
    let taken = |id: &str| existing.contains(id) || minted.contains(id);
    if !taken(base.as_str()) {
        return base;
    }
    let mut n = 2;
    loop {
        let candidate = format!("{base}_{n}");
        if !taken(candidate.as_str()) {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{BodyDescriptor, BodyShape, ConstraintDescriptor};

    fn ball(id: &str) -> BodyDescriptor {
        BodyDescriptor::new(id, BodyShape::Circle { radius: 10.0 }, [0.0, 0.0])
    }

    #[test]
    fn test_constraint_follows_minted_id() {
        let command = SceneCommand {
            new_bodies: vec![ball("ball")],
            new_constraints: vec![ConstraintDescriptor::anchored("ball", [0.0, 0.0])],
            summary: "hang a ball".into(),
            ..Default::default()
        };

        let out = remap_new_entities(command, "1234", &Scene::empty());
        let minted = &out.command.new_bodies[0].id;
        assert_eq!(minted, "ball_1234");
        assert_eq!(&out.command.new_constraints[0].body_a, minted);
    }

    #[test]
    fn test_existing_references_pass_through() {
        let scene = Scene::from_parts(vec![ball("ground")], Vec::new());
        let command = SceneCommand {
            new_bodies: vec![ball("ball")],
            new_constraints: vec![ConstraintDescriptor::between("ball", "ground")],
            remove_body_ids: vec!["ball".into()],
            ..Default::default()
        };

        let out = remap_new_entities(command, "0001", &scene);
        let c = &out.command.new_constraints[0];
        assert_eq!(c.body_a, "ball_0001");
        assert_eq!(c.body_b(), Some("ground"));
        // Removals address existing ids and are never remapped.
        assert_eq!(out.command.remove_body_ids, vec!["ball".to_string()]);
    }

    #[test]
    fn test_repeated_command_does_not_collide() {
        let scene = Scene::from_parts(vec![ball("ball_0007")], Vec::new());
        let command = SceneCommand {
            new_bodies: vec![ball("ball"), ball("ball")],
            ..Default::default()
        };

        let out = remap_new_entities(command, "0007", &scene);
        let ids: Vec<_> = out.command.new_bodies.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["ball_0007_2", "ball_0007_3"]);
        assert_eq!(out.mapping.get("ball").map(String::as_str), Some("ball_0007_2"));
    }

    #[test]
    fn test_clock_suffix_is_fixed_width() {
        let suffix = ClockSuffix.next_suffix();
        assert_eq!(suffix.len(), SUFFIX_DIGITS);
        assert!(suffix.chars().all(|c| c.is_ascii_digit()));
    }
}
