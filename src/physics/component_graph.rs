//! Keys to objects stored in a [`Space`] and the graph of bodies connected by
//! contacts and constraints, which decides when groups of bodies fall asleep.

use super::{
    space::{CachedArbiter, ShapeBounds},
    Space,
};
use crate::physics::collision::IndexLayer;

use thunderdome as td;

/// Key type to look up a body stored in a [`Space`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BodyKey(pub(crate) td::Index);

impl BodyKey {
    /// Get the underlying [`thunderdome::Index`][thunderdome::Index] of this key.
    /// Useful for creating your own mappings from bodies to other things.
    #[inline]
    pub fn index(&self) -> td::Index {
        self.0
    }
}

/// Key type to look up a shape stored in a [`Space`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ShapeKey(pub(crate) td::Index);

impl ShapeKey {
    #[inline]
    pub fn index(&self) -> td::Index {
        self.0
    }
}

/// Key type to look up a constraint stored in a [`Space`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConstraintKey(pub(crate) td::Index);

impl ConstraintKey {
    #[inline]
    pub fn index(&self) -> td::Index {
        self.0
    }
}

/// Key type to look up an arbiter stored in a [`Space`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ArbiterKey(pub(crate) td::Index);

impl ArbiterKey {
    #[inline]
    pub fn index(&self) -> td::Index {
        self.0
    }
}

/// A body's place in the contact graph.
///
/// Sleeping bodies form linked lists through `next`, starting from the `root` of the component.
/// Awake bodies have no root outside of [`Space::process_components`].
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct ComponentNode {
    pub root: Option<BodyKey>,
    pub next: Option<BodyKey>,
    pub idle_time: f64,
}

impl Space {
    #[inline]
    pub(crate) fn sleep_enabled(&self) -> bool {
        self.params.sleep_time_threshold != f64::INFINITY
    }

    /// Whether an arbiter or constraint between `a` and `b` is detached from the space
    /// when `key` falls asleep.
    ///
    /// Things attached to static bodies or other sleeping bodies are detached.
    /// Things attached to awake bodies stay in the space and wake `key` back up
    /// the next time the contact graph is built.
    fn detaches_on_sleep(&self, key: BodyKey, a: BodyKey, b: BodyKey) -> bool {
        let other = if key == a { b } else { a };
        match self.bodies.get(other.0) {
            Some(other) if other.is_static() => true,
            Some(other) if other.is_rogue() => false,
            Some(other) => other.is_sleeping(),
            None => {
                log::warn!("Contact graph refers to a body that doesn't exist");
                false
            }
        }
    }

    //
    // per-step processing
    //

    /// Update idle times, build the contact graph and put components that have been idle
    /// long enough to sleep. Also wakes sleeping bodies that something has touched.
    pub(crate) fn process_components(&mut self, dt: f64) {
        let _span = tracy_span!("process components", "process_components");

        let sleep = self.sleep_enabled();

        if sleep {
            let dv = self.params.idle_speed_threshold;
            let dvsq = if dv != 0.0 {
                dv * dv
            } else {
                self.params.gravity.mag_sq() * dt * dt
            };
            for &key in &self.active_bodies {
                let Some(body) = self.bodies.get_mut(key.0) else {
                    continue;
                };
                // infinite mass bodies need a zero threshold
                let ke_threshold = if dvsq != 0.0 {
                    body.mass().value() * dvsq
                } else {
                    0.0
                };
                body.node.idle_time = if body.kinetic_energy() > ke_threshold {
                    0.0
                } else {
                    body.node.idle_time + dt
                };
                if body.node.root.is_some() {
                    log::warn!("Awake body still had a component root, resetting it");
                    body.node.root = None;
                    body.node.next = None;
                }
            }
        }

        // wake sleeping bodies touched by something and thread arbiters onto bodies.
        // activating a body can add more arbiters, which need threading as well
        let mut arb_idx = 0;
        while arb_idx < self.active_arbiters.len() {
            let arb_key = self.active_arbiters[arb_idx];
            arb_idx += 1;
            let Some(arb) = self.arbiters.get(arb_key.0) else {
                log::warn!("Dangling arbiter in the active list");
                continue;
            };
            let (a, b) = (arb.body_a, arb.body_b);
            let (wake_a, wake_b) = match (self.bodies.get(a.0), self.bodies.get(b.0)) {
                (Some(body_a), Some(body_b)) => (
                    (body_b.is_rogue() && !body_b.is_static()) || body_a.is_sleeping(),
                    (body_a.is_rogue() && !body_a.is_static()) || body_b.is_sleeping(),
                ),
                _ => continue,
            };
            if wake_a {
                self.activate_body(a);
            }
            if wake_b {
                self.activate_body(b);
            }
            self.thread_arbiter(arb_key, a, b);
        }

        // joints wake sleeping bodies attached to awake ones
        // and hold bodies awake when attached to non-static rogue bodies
        for c_key in self.active_constraints.clone() {
            let Some(constraint) = self.constraints.get(c_key.0) else {
                continue;
            };
            let (a, b) = constraint.bodies();
            let (wake_a, wake_b) = match (self.bodies.get(a.0), self.bodies.get(b.0)) {
                (Some(body_a), Some(body_b)) => (
                    (body_b.is_rogue() && !body_b.is_static()) || body_a.is_sleeping(),
                    (body_a.is_rogue() && !body_a.is_static()) || body_b.is_sleeping(),
                ),
                _ => continue,
            };
            if wake_a {
                self.activate_body(a);
            }
            if wake_b {
                self.activate_body(b);
            }
        }

        if !sleep {
            return;
        }

        // generate components and find the ones that should sleep
        let threshold = self.params.sleep_time_threshold;
        let mut sleepy_roots = Vec::new();
        for key in self.active_bodies.clone() {
            if self.bodies[key.0].node.root.is_some() {
                continue;
            }
            self.flood_fill_component(key);
            if !self.component_active(key, threshold) {
                sleepy_roots.push(key);
            }
        }

        for root in sleepy_roots {
            log::debug!("Putting component rooted at {root:?} to sleep");
            let mut curr = Some(root);
            while let Some(key) = curr {
                curr = self.bodies[key.0].node.next;
                self.deactivate_body(key);
            }
            self.sleeping_components.push(root);
        }

        // only sleeping bodies keep their component nodes.
        // bodies woken during the step join the active list at unlock
        for &key in self.active_bodies.iter().chain(&self.roused_bodies) {
            let node = &mut self.bodies[key.0].node;
            node.root = None;
            node.next = None;
        }
    }

    fn thread_arbiter(&mut self, arb_key: ArbiterKey, a: BodyKey, b: BodyKey) {
        for body_key in [a, b] {
            if let Some(body) = self.bodies.get_mut(body_key.0) {
                if !body.arbiters.contains(&arb_key) {
                    body.arbiters.push(arb_key);
                }
            }
        }
    }

    /// Mark every body connected to `root` as part of its component.
    /// Static and rogue bodies don't join components.
    fn flood_fill_component(&mut self, root: BodyKey) {
        let mut stack = vec![root];
        while let Some(key) = stack.pop() {
            let Some(body) = self.bodies.get_mut(key.0) else {
                log::warn!("Contact graph refers to a body that doesn't exist");
                continue;
            };
            if body.is_static() || body.is_rogue() {
                continue;
            }
            if let Some(other_root) = body.node.root {
                if other_root != root {
                    log::warn!("Inconsistency detected in the contact graph: {key:?} is already in another component");
                }
                continue;
            }

            body.node.root = Some(root);
            if key != root {
                let root_body = &mut self.bodies[root.0];
                let prev_next = root_body.node.next.replace(key);
                self.bodies[key.0].node.next = prev_next;
            }

            let body = &self.bodies[key.0];
            for arb_key in &body.arbiters {
                match self.arbiters.get(arb_key.0) {
                    Some(arb) => stack.push(if arb.body_a == key { arb.body_b } else { arb.body_a }),
                    None => log::warn!("Dangling arbiter thread on {key:?}"),
                }
            }
            for c_key in &body.constraints {
                if let Some(c) = self.constraints.get(c_key.0) {
                    stack.push(if c.body_a == key { c.body_b } else { c.body_a });
                }
            }
        }
    }

    /// A component stays awake if any of its bodies hasn't been idle long enough.
    fn component_active(&self, root: BodyKey, threshold: f64) -> bool {
        let mut curr = Some(root);
        while let Some(key) = curr {
            let body = &self.bodies[key.0];
            if body.node.idle_time < threshold {
                return true;
            }
            curr = body.node.next;
        }
        false
    }

    //
    // sleeping and waking
    //

    /// Move a body out of the simulation, keeping its contacts for when it wakes up.
    fn deactivate_body(&mut self, key: BodyKey) {
        assert!(
            !self.bodies[key.0].is_rogue(),
            "Rogue bodies can't be deactivated"
        );
        self.active_bodies.retain(|&k| k != key);
        self.move_shapes(key, IndexLayer::Active, IndexLayer::Static);

        let (arbiters, constraints) = self.body_links(key);
        for arb_key in arbiters {
            let Some(arb) = self.arbiters.get(arb_key.0) else {
                continue;
            };
            if self.detaches_on_sleep(key, arb.body_a, arb.body_b) {
                self.uncache_arbiter(arb_key);
            }
        }

        for c_key in constraints {
            let (a, b) = self.constraints[c_key.0].bodies();
            if self.detaches_on_sleep(key, a, b) {
                self.active_constraints.retain(|&k| k != c_key);
            }
        }
    }

    fn move_shapes(&mut self, key: BodyKey, from: IndexLayer, to: IndexLayer) {
        let bounds = ShapeBounds {
            shapes: &self.shapes,
            bodies: &self.bodies,
        };
        for &shape_key in &self.bodies[key.0].shapes {
            let hash = self.shapes[shape_key.0].hash_id;
            self.index.remove(from, shape_key, hash);
            self.index.insert(to, shape_key, hash, &bounds);
        }
    }

    fn body_links(&self, key: BodyKey) -> (Vec<ArbiterKey>, Vec<ConstraintKey>) {
        let body = &self.bodies[key.0];
        (body.arbiters.clone(), body.constraints.clone())
    }

    fn uncache_arbiter(&mut self, arb_key: ArbiterKey) {
        let arb = &self.arbiters[arb_key.0];
        let (sa, sb) = (arb.shape_a, arb.shape_b);
        self.cached_arbiters.remove(arb.hash, |e| e.matches(sa, sb));
        self.active_arbiters.retain(|&k| k != arb_key);
    }

    /// Put a body back into the simulation, or queue it to be if the space is locked.
    /// The body's component node must already be reset.
    pub(crate) fn reactivate_body(&mut self, key: BodyKey) {
        assert!(
            !self.bodies[key.0].is_rogue(),
            "Rogue bodies can't be activated"
        );

        if self.is_locked() {
            if !self.roused_bodies.contains(&key) {
                self.roused_bodies.push(key);
            }
            return;
        }

        self.active_bodies.push(key);
        self.move_shapes(key, IndexLayer::Static, IndexLayer::Active);

        let (arbiters, constraints) = self.body_links(key);
        for arb_key in arbiters {
            let Some(arb) = self.arbiters.get(arb_key.0) else {
                continue;
            };
            let (sa, sb) = (arb.shape_a, arb.shape_b);
            let hash = arb.hash;
            // still in the space if the other body stayed awake or woke up first
            if self.cached_arbiters.contains(hash, |e| e.matches(sa, sb)) {
                continue;
            }
            self.cached_arbiters.insert(
                hash,
                CachedArbiter {
                    shapes: (sa, sb),
                    key: arb_key,
                },
                |e| e.matches(sa, sb),
            );
            // handlers may have changed while the body was asleep
            let (handler, swapped) = match (self.shapes.get(sa.0), self.shapes.get(sb.0)) {
                (Some(a), Some(b)) => self.handlers.lookup(a.collision_type, b.collision_type),
                _ => continue,
            };
            let arb = &mut self.arbiters[arb_key.0];
            arb.handler = handler;
            arb.swapped = swapped;
            arb.stamp = self.stamp;
            self.active_arbiters.push(arb_key);
        }

        for c_key in constraints {
            if !self.active_constraints.contains(&c_key) {
                self.active_constraints.push(c_key);
            }
        }
    }

    fn activate_component(&mut self, root: BodyKey) {
        if !self.bodies.get(root.0).map_or(false, |b| b.is_sleeping()) {
            return;
        }
        log::debug!("Waking component rooted at {root:?}");

        let mut curr = Some(root);
        while let Some(key) = curr {
            let body = &mut self.bodies[key.0];
            curr = body.node.next;
            body.node = ComponentNode::default();
            self.reactivate_body(key);
        }
        self.sleeping_components.retain(|&k| k != root);
    }

    /// Wake up a body and every body sleeping in the same component.
    /// Also resets the body's idle timer. Does nothing for rogue bodies.
    pub fn activate_body(&mut self, key: BodyKey) {
        let Some(body) = self.bodies.get_mut(key.0) else {
            return;
        };
        if body.is_rogue() {
            return;
        }
        body.node.idle_time = 0.0;
        if let Some(root) = body.node.root {
            self.activate_component(root);
        }
    }

    /// Wake up every body touching a static body,
    /// or only those touching the given shape of it.
    pub fn activate_static_body(&mut self, key: BodyKey, filter: Option<ShapeKey>) {
        let body = &self.bodies[key.0];
        assert!(body.is_static(), "activate_static_body called on a non-static body");
        for arb_key in body.arbiters.clone() {
            let Some(arb) = self.arbiters.get(arb_key.0) else {
                continue;
            };
            if filter.map_or(true, |s| s == arb.shape_a || s == arb.shape_b) {
                let other = if arb.body_a == key { arb.body_b } else { arb.body_a };
                self.activate_body(other);
            }
        }
    }

    /// Force a body to fall asleep immediately, in a component of its own.
    pub fn sleep_body(&mut self, key: BodyKey) {
        self.sleep_body_with_group(key, None);
    }

    /// Force a body to fall asleep immediately.
    /// If `group` is given, the body joins its sleeping component and wakes up with it.
    ///
    /// Panics if the body is rogue, if the space is locked
    /// or if the group body isn't sleeping.
    pub fn sleep_body_with_group(&mut self, key: BodyKey, group: Option<BodyKey>) {
        assert!(
            !self.bodies[key.0].is_rogue(),
            "Rogue and static bodies can't be put to sleep"
        );
        assert!(
            !self.is_locked(),
            "Bodies can't be put to sleep while the space is locked, use a post-step action instead"
        );
        let group_root = group.map(|g| {
            let root = self.bodies[g.0].node.root;
            assert!(root.is_some(), "Can't use a non-sleeping body as a sleep group");
            root
        });
        let group_root = group_root.flatten();

        if let Some(root) = self.bodies[key.0].node.root {
            assert!(
                group_root.map_or(true, |g| g == root),
                "The body is already sleeping and its group can't be reassigned"
            );
            return;
        }

        self.update_body_shapes(key);
        self.deactivate_body(key);

        match group_root {
            Some(root) => {
                let prev_next = self.bodies[root.0].node.next.replace(key);
                self.bodies[key.0].node = ComponentNode {
                    root: Some(root),
                    next: prev_next,
                    idle_time: 0.0,
                };
            }
            None => {
                self.bodies[key.0].node = ComponentNode {
                    root: Some(key),
                    next: None,
                    idle_time: 0.0,
                };
                self.sleeping_components.push(key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        math as m,
        physics::{Body, CollisionHandler, Constraint, PivotJoint, Shape, SpaceParams, Velocity},
    };
    use std::{cell::Cell, rc::Rc};

    fn sleepy_params() -> SpaceParams {
        SpaceParams {
            gravity: m::Vec2::new(0.0, -10.0),
            sleep_time_threshold: 0.5,
            ..Default::default()
        }
    }

    fn ball(space: &mut Space, pos: m::Vec2) -> (BodyKey, ShapeKey) {
        let body = space.add_body(Body::new(1.0, 1.0).with_position(pos));
        let shape = space.add_shape(Shape::circle(body, 0.5, m::Vec2::zero()).with_friction(0.7));
        (body, shape)
    }

    fn ground(space: &mut Space) -> ShapeKey {
        let static_body = space.static_body();
        space.add_shape(
            Shape::segment(
                static_body,
                m::Vec2::new(-10.0, 0.0),
                m::Vec2::new(10.0, 0.0),
                0.0,
            )
            .with_friction(1.0),
        )
    }

    #[test]
    fn resting_stack_falls_asleep() {
        let mut space = Space::new(sleepy_params());
        ground(&mut space);
        let (lower, _) = ball(&mut space, m::Vec2::new(0.0, 0.5));
        let (upper, _) = ball(&mut space, m::Vec2::new(0.0, 1.5));

        for _ in 0..300 {
            space.step(1.0 / 60.0);
        }
        assert!(space.body(lower).map_or(false, |b| b.is_sleeping()));
        assert!(space.body(upper).map_or(false, |b| b.is_sleeping()));
        // both in the same component
        assert_eq!(space.sleeping_components.len(), 1);
        assert!(space.active_bodies.is_empty());
        // shapes moved to the static layer
        assert_eq!(space.index.count(IndexLayer::Active), 0);
        assert_eq!(space.index.count(IndexLayer::Static), 3);
    }

    #[test]
    fn waking_restores_contacts() {
        let mut space = Space::new(sleepy_params());
        ground(&mut space);
        let (body, _) = ball(&mut space, m::Vec2::new(0.0, 0.5));

        for _ in 0..300 {
            space.step(1.0 / 60.0);
            if space.body(body).map_or(false, |b| b.is_sleeping()) {
                break;
            }
        }
        assert!(space.body(body).map_or(false, |b| b.is_sleeping()));
        assert!(space.active_arbiters.is_empty());
        let asleep: Vec<_> = space
            .arbiters_of(body)
            .map(|arb| arb.contacts().to_vec())
            .collect();
        assert_eq!(asleep.len(), 1);
        assert!(!asleep[0].is_empty());
        assert!(asleep[0].iter().all(|c| c.jn_acc > 0.0));

        space.activate_body(body);
        assert!(!space.body(body).map_or(true, |b| b.is_sleeping()));
        assert_eq!(space.active_arbiters.len(), 1);
        assert_eq!(space.cached_arbiters.len(), 1);
        let woken = &space.arbiters[space.active_arbiters[0].0];
        assert_equal_contacts(woken.contacts(), &asleep[0]);
        assert_eq!(space.index.count(IndexLayer::Active), 1);
    }

    fn assert_equal_contacts(a: &[crate::physics::Contact], b: &[crate::physics::Contact]) {
        itertools::assert_equal(
            a.iter().map(|c| {
                (
                    c.hash,
                    c.point.x.to_bits(),
                    c.point.y.to_bits(),
                    c.jn_acc.to_bits(),
                    c.jt_acc.to_bits(),
                )
            }),
            b.iter().map(|c| {
                (
                    c.hash,
                    c.point.x.to_bits(),
                    c.point.y.to_bits(),
                    c.jn_acc.to_bits(),
                    c.jt_acc.to_bits(),
                )
            }),
        );
    }

    #[test]
    fn moving_body_wakes_sleeper() {
        let mut space = Space::new(sleepy_params());
        ground(&mut space);
        let (sleeper, _) = ball(&mut space, m::Vec2::new(0.0, 0.5));
        for _ in 0..300 {
            space.step(1.0 / 60.0);
        }
        assert!(space.body(sleeper).map_or(false, |b| b.is_sleeping()));

        let (bullet, _) = ball(&mut space, m::Vec2::new(3.0, 0.5));
        if let Some(b) = space.body_mut(bullet) {
            b.velocity = Velocity {
                linear: m::Vec2::new(-20.0, 0.0),
                angular: 0.0,
            };
        }
        for _ in 0..20 {
            space.step(1.0 / 60.0);
        }
        let sleeper = space.body(sleeper).expect("still in the space");
        assert!(!sleeper.is_sleeping());
        assert!(sleeper.position().x < -0.1);
    }

    #[test]
    fn explicit_sleep_and_groups() {
        let mut space = Space::new(SpaceParams::default());
        let (a, _) = ball(&mut space, m::Vec2::new(0.0, 0.0));
        let (b, _) = ball(&mut space, m::Vec2::new(5.0, 0.0));

        space.sleep_body(a);
        space.sleep_body_with_group(b, Some(a));
        assert_eq!(space.sleeping_components, vec![a]);
        assert_eq!(space.bodies[a.0].node.next, Some(b));
        assert!(space.active_bodies.is_empty());
        // sleeping again in the same group is fine
        space.sleep_body_with_group(b, Some(a));

        // waking one wakes the whole group
        space.activate_body(b);
        assert!(space.sleeping_components.is_empty());
        assert_eq!(space.active_bodies.len(), 2);
        assert!(!space.bodies[a.0].is_sleeping());
    }

    #[test]
    #[should_panic]
    fn static_bodies_cant_sleep() {
        let mut space = Space::new(SpaceParams::default());
        let static_body = space.static_body();
        space.sleep_body(static_body);
    }

    #[test]
    #[should_panic]
    fn non_sleeping_group_is_rejected() {
        let mut space = Space::new(SpaceParams::default());
        let (a, _) = ball(&mut space, m::Vec2::new(0.0, 0.0));
        let (b, _) = ball(&mut space, m::Vec2::new(5.0, 0.0));
        space.sleep_body_with_group(b, Some(a));
    }

    #[test]
    fn joint_to_rogue_body_wakes_sleeper() {
        let mut space = Space::new(sleepy_params());
        let (body, _) = ball(&mut space, m::Vec2::new(0.0, 0.0));
        let rogue = space.add_rogue_body(Body::new(1.0, 1.0).with_position(m::Vec2::new(1.0, 0.0)));
        let joint = PivotJoint::new(m::Vec2::new(0.5, 0.0), m::Vec2::new(-0.5, 0.0));
        let c_key = space.add_constraint(Constraint::new(body, rogue, joint));

        space.sleep_body(body);
        assert!(space.bodies[body.0].is_sleeping());
        // the other end is awake, so the constraint keeps being solved
        assert_eq!(space.active_constraints, vec![c_key]);

        space.step(1.0 / 60.0);
        assert!(!space.bodies[body.0].is_sleeping());
        assert_eq!(space.active_bodies, vec![body]);
        assert_eq!(space.active_constraints, vec![c_key]);
    }

    #[test]
    fn joint_to_awake_body_stays_solved() {
        let mut space = Space::new(SpaceParams::default());
        let (a, _) = ball(&mut space, m::Vec2::new(0.0, 0.0));
        let (b, _) = ball(&mut space, m::Vec2::new(2.0, 0.0));
        let joint = PivotJoint::new(m::Vec2::new(1.0, 0.0), m::Vec2::new(-1.0, 0.0));
        let c_key = space.add_constraint(Constraint::new(a, b, joint));

        space.sleep_body(a);
        assert_eq!(space.active_constraints, vec![c_key]);

        if let Some(body) = space.body_mut(b) {
            body.velocity.linear = m::Vec2::new(5.0, 0.0);
        }
        for _ in 0..60 {
            space.step(1.0 / 60.0);
        }

        assert!(!space.bodies[a.0].is_sleeping());
        assert_eq!(space.active_bodies.len(), 2);
        assert_eq!(space.active_constraints, vec![c_key]);
        let (pos_a, pos_b) = (space.bodies[a.0].position(), space.bodies[b.0].position());
        assert!(pos_a.x > 1.0, "sleeper was left behind at {pos_a:?}");
        assert!(((pos_b - pos_a).mag() - 2.0).abs() < 0.05);
    }

    #[test]
    fn joint_between_sleepers_is_detached_once() {
        let mut space = Space::new(SpaceParams::default());
        let (a, _) = ball(&mut space, m::Vec2::new(0.0, 0.0));
        let (b, _) = ball(&mut space, m::Vec2::new(2.0, 0.0));
        let joint = PivotJoint::new(m::Vec2::new(1.0, 0.0), m::Vec2::new(-1.0, 0.0));
        let c_key = space.add_constraint(Constraint::new(a, b, joint));

        space.sleep_body(a);
        space.sleep_body_with_group(b, Some(a));
        assert!(space.active_constraints.is_empty());

        space.activate_body(a);
        assert_eq!(space.active_constraints, vec![c_key]);
        assert_eq!(space.active_bodies.len(), 2);
    }

    #[test]
    fn removing_ground_separates_sleeping_body() {
        let mut space = Space::new(sleepy_params());
        let ground = ground(&mut space);
        let (body, _) = ball(&mut space, m::Vec2::new(0.0, 0.5));
        for _ in 0..300 {
            space.step(1.0 / 60.0);
        }
        assert!(space.bodies[body.0].is_sleeping());

        let separates = Rc::new(Cell::new(0));
        space.set_default_collision_handler(CollisionHandler::new().with_separate({
            let separates = separates.clone();
            move |_| separates.set(separates.get() + 1)
        }));
        space.remove_shape(ground);

        assert_eq!(separates.get(), 1);
        assert!(!space.bodies[body.0].is_sleeping());
        assert!(space.active_arbiters.is_empty());
        assert_eq!(space.cached_arbiters.len(), 0);
        assert!(space
            .arbiters
            .iter()
            .all(|(_, arb)| arb.shape_a != ground && arb.shape_b != ground));

        let y = space.bodies[body.0].position().y;
        for _ in 0..10 {
            space.step(1.0 / 60.0);
        }
        assert!(space.bodies[body.0].position().y < y - 0.01);
        assert_eq!(separates.get(), 1);
    }

    #[test]
    fn removing_ground_wakes_explicit_sleeper() {
        // sleeping by idle time is disabled here
        let mut space = Space::new(SpaceParams {
            gravity: m::Vec2::new(0.0, -10.0),
            ..Default::default()
        });
        let ground = ground(&mut space);
        let (body, _) = ball(&mut space, m::Vec2::new(0.0, 0.45));
        space.sleep_body(body);
        assert!(space.bodies[body.0].is_sleeping());

        space.remove_shape(ground);
        assert!(!space.bodies[body.0].is_sleeping());
        assert_eq!(space.active_bodies, vec![body]);

        for _ in 0..10 {
            space.step(1.0 / 60.0);
        }
        assert!(space.bodies[body.0].position().y < 0.4);
    }

    #[test]
    fn idle_time_follows_kinetic_energy() {
        let mut space = Space::new(SpaceParams {
            idle_speed_threshold: 1.0,
            sleep_time_threshold: 10.0,
            ..Default::default()
        });
        let (slow, _) = ball(&mut space, m::Vec2::new(0.0, 0.0));
        let (fast, _) = ball(&mut space, m::Vec2::new(10.0, 0.0));
        if let Some(b) = space.body_mut(fast) {
            b.velocity.linear = m::Vec2::new(2.0, 0.0);
        }
        for _ in 0..10 {
            space.step(0.1);
        }
        assert!((space.bodies[slow.0].idle_time() - 1.0).abs() < 1e-9);
        assert_eq!(space.bodies[fast.0].idle_time(), 0.0);
    }
}
