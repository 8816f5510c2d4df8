use super::{clamp_abs, Joint, JointLimits};
use crate::physics::{
    solver::{apply_angular_impulses, moment_sum},
    Body,
};

/// Drives the angular velocity of body `b` relative to body `a` towards a constant rate.
///
/// Use [`Constraint::max_force`][super::Constraint::max_force] to limit the torque,
/// otherwise the motor is infinitely strong.
#[derive(Clone, Copy, Debug)]
pub struct SimpleMotor {
    /// Target relative angular velocity in radians per second.
    pub rate: f64,
    i_sum: f64,
    j_acc: f64,
    j_max: f64,
}

impl SimpleMotor {
    pub fn new(rate: f64) -> Self {
        Self {
            rate,
            i_sum: 0.0,
            j_acc: 0.0,
            j_max: f64::INFINITY,
        }
    }
}

impl Joint for SimpleMotor {
    fn pre_step(&mut self, a: &Body, b: &Body, _dt: f64, limits: JointLimits) {
        self.i_sum = moment_sum(a, b);
        self.j_max = limits.max_impulse;
    }

    fn apply_cached_impulse(&self, a: &mut Body, b: &mut Body, dt_coef: f64) {
        apply_angular_impulses(a, b, self.j_acc * dt_coef);
    }

    fn apply_impulse(&mut self, a: &mut Body, b: &mut Body) {
        let wr = b.velocity.angular - a.velocity.angular - self.rate;
        let j = -wr * self.i_sum;
        let j_old = self.j_acc;
        self.j_acc = clamp_abs(j_old + j, self.j_max);
        apply_angular_impulses(a, b, self.j_acc - j_old);
    }

    fn impulse(&self) -> f64 {
        self.j_acc.abs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{math as m, physics::constraint::test_util::simulate};

    #[test]
    fn spins_up_to_rate() {
        let mut a = Body::new_static();
        let mut b = Body::new(1.0, 1.0);
        let mut motor = SimpleMotor::new(2.0);
        simulate(&mut motor, &mut a, &mut b, m::Vec2::zero(), 10);
        assert!((b.velocity.angular - 2.0).abs() < 1e-9);
        assert_eq!(a.velocity.angular, 0.0);
    }

    #[test]
    fn equal_bodies_share_the_rate() {
        let mut a = Body::new(1.0, 1.0);
        let mut b = Body::new(1.0, 1.0);
        let mut motor = SimpleMotor::new(2.0);
        simulate(&mut motor, &mut a, &mut b, m::Vec2::zero(), 10);
        assert!((b.velocity.angular - a.velocity.angular - 2.0).abs() < 1e-9);
        // angular momentum is conserved
        assert!((a.velocity.angular + b.velocity.angular).abs() < 1e-9);
    }
}
