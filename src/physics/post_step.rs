use super::{BodyKey, ConstraintKey, ShapeKey};

use std::collections::VecDeque;

/// A change to the world requested while it was locked,
/// e.g. from a collision callback in the middle of a step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PostStepAction {
    RemoveShape(ShapeKey),
    RemoveBody(BodyKey),
    RemoveConstraint(ConstraintKey),
    ActivateBody(BodyKey),
    SleepBody(BodyKey),
    ReindexShape(ShapeKey),
}

/// Actions waiting to be applied once the space unlocks.
///
/// Actions queued while the queue is being applied are applied too,
/// so an action that keeps queuing more of itself never finishes.
#[derive(Clone, Debug, Default)]
pub struct PostStepQueue {
    actions: VecDeque<PostStepAction>,
}

impl PostStepQueue {
    /// Queue an action. Returns false and does nothing if an identical action is already queued.
    pub fn push(&mut self, action: PostStepAction) -> bool {
        if self.actions.contains(&action) {
            return false;
        }
        self.actions.push_back(action);
        true
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PostStepAction> {
        self.actions.iter()
    }

    pub(crate) fn pop(&mut self) -> Option<PostStepAction> {
        self.actions.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use itertools::assert_equal;
    use thunderdome as td;

    #[test]
    fn duplicates_are_queued_once() {
        let mut arena = td::Arena::new();
        let body = BodyKey(arena.insert(()));
        let other = BodyKey(arena.insert(()));

        let mut queue = PostStepQueue::default();
        assert!(queue.push(PostStepAction::RemoveBody(body)));
        assert!(!queue.push(PostStepAction::RemoveBody(body)));
        assert!(queue.push(PostStepAction::ActivateBody(body)));
        assert!(queue.push(PostStepAction::RemoveBody(other)));
        assert_eq!(queue.len(), 3);
        assert_equal(
            queue.iter().copied(),
            [
                PostStepAction::RemoveBody(body),
                PostStepAction::ActivateBody(body),
                PostStepAction::RemoveBody(other),
            ],
        );

        assert_eq!(queue.pop(), Some(PostStepAction::RemoveBody(body)));
        // once applied, the same action can be queued again
        assert!(queue.push(PostStepAction::RemoveBody(body)));
    }
}
