//! # Leader coordinator: group-wide termination ordering.
//!
//! A pure state machine. The control loop feeds it observations (a task died,
//! a stop was requested, the runner was restored or destroyed) and executes the
//! [`GroupAction`] it returns. It never touches task runners itself.
//!
//! ```text
//!            leader dead                      group stop (leader dead/absent)
//!   Idle ───────────────► LeaderDead ───────────────────────┐
//!    │                                                      ▼
//!    │ group stop (leader alive)          leader dead   StoppingFollowers ──► Done
//!    └────────────────────► StoppingLeader ─────────────────▲
//!                                                   destroy (any phase)
//! ```
//!
//! ## Rules
//! - Leader death while not stopping kills every live follower with a
//!   `LeaderDead` cause.
//! - Group stop kills the live leader first; followers only once it is Dead.
//! - A leader restored as Dead is never started or killed; the followers are
//!   killed with a `LeaderDead` cause when the run resumes.

/// Coordinator phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Phase {
    Idle,
    LeaderDead,
    StoppingLeader,
    StoppingFollowers,
    Done,
}

/// Why tasks are being killed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum KillCause {
    LeaderDead,
    GroupStop,
    Destroy,
}

impl KillCause {
    pub(crate) fn as_reason(&self) -> &'static str {
        match self {
            KillCause::LeaderDead => "leader task dead",
            KillCause::GroupStop => "allocation stopped",
            KillCause::Destroy => "allocation destroyed",
        }
    }
}

/// What the control loop must do next.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum GroupAction {
    /// Kill the leader only.
    KillLeader(KillCause),
    /// Kill every live follower.
    KillFollowers(KillCause),
    /// Kill the leader, then every follower, without waiting in between.
    KillAll(KillCause),
}

#[derive(Debug)]
pub(crate) struct LeaderCoordinator {
    leader: Option<String>,
    phase: Phase,
    restored_leader_dead: bool,
}

impl LeaderCoordinator {
    pub(crate) fn new(leader: Option<&str>) -> Self {
        Self {
            leader: leader.map(str::to_string),
            phase: Phase::Idle,
            restored_leader_dead: false,
        }
    }

    #[cfg(test)]
    pub(crate) fn phase(&self) -> Phase {
        self.phase
    }

    pub(crate) fn is_leader(&self, task: &str) -> bool {
        self.leader.as_deref() == Some(task)
    }

    /// Records the persisted leader state.
    pub(crate) fn on_restore(&mut self, leader_dead: bool) {
        if self.leader.is_some() && leader_dead && self.phase == Phase::Idle {
            self.phase = Phase::LeaderDead;
            self.restored_leader_dead = true;
        }
    }

    /// Action to take when the control loop starts (restored dead leader).
    pub(crate) fn on_start(&mut self) -> Option<GroupAction> {
        if std::mem::take(&mut self.restored_leader_dead) {
            return Some(GroupAction::KillFollowers(KillCause::LeaderDead));
        }
        None
    }

    /// A task reached Dead.
    pub(crate) fn on_task_dead(&mut self, task: &str) -> Option<GroupAction> {
        if !self.is_leader(task) {
            return None;
        }
        match self.phase {
            Phase::Idle => {
                self.phase = Phase::LeaderDead;
                Some(GroupAction::KillFollowers(KillCause::LeaderDead))
            }
            Phase::StoppingLeader => {
                self.phase = Phase::StoppingFollowers;
                Some(GroupAction::KillFollowers(KillCause::GroupStop))
            }
            _ => None,
        }
    }

    /// Desired status became Stop/Evict.
    pub(crate) fn on_group_stop(&mut self, leader_alive: bool) -> Option<GroupAction> {
        match self.phase {
            Phase::Idle if self.leader.is_some() && leader_alive => {
                self.phase = Phase::StoppingLeader;
                Some(GroupAction::KillLeader(KillCause::GroupStop))
            }
            Phase::Idle | Phase::LeaderDead => {
                self.phase = Phase::StoppingFollowers;
                Some(GroupAction::KillAll(KillCause::GroupStop))
            }
            Phase::StoppingLeader | Phase::StoppingFollowers | Phase::Done => None,
        }
    }

    /// The runner is being destroyed.
    pub(crate) fn on_destroy(&mut self) -> Option<GroupAction> {
        if self.phase == Phase::Done {
            return None;
        }
        self.phase = Phase::StoppingFollowers;
        Some(GroupAction::KillAll(KillCause::Destroy))
    }

    /// Every task is Dead.
    pub(crate) fn on_all_dead(&mut self) {
        self.phase = Phase::Done;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leader_death_kills_followers_once() {
        let mut c = LeaderCoordinator::new(Some("l"));
        assert_eq!(c.on_task_dead("f"), None);
        assert_eq!(
            c.on_task_dead("l"),
            Some(GroupAction::KillFollowers(KillCause::LeaderDead))
        );
        assert_eq!(c.phase(), Phase::LeaderDead);
        assert_eq!(c.on_task_dead("l"), None);
    }

    #[test]
    fn group_stop_waits_for_leader() {
        let mut c = LeaderCoordinator::new(Some("l"));
        assert_eq!(
            c.on_group_stop(true),
            Some(GroupAction::KillLeader(KillCause::GroupStop))
        );
        assert_eq!(c.on_group_stop(true), None);
        assert_eq!(c.on_task_dead("f"), None);
        assert_eq!(
            c.on_task_dead("l"),
            Some(GroupAction::KillFollowers(KillCause::GroupStop))
        );
        assert_eq!(c.phase(), Phase::StoppingFollowers);
    }

    #[test]
    fn group_stop_without_leader_kills_all() {
        let mut c = LeaderCoordinator::new(None);
        assert_eq!(
            c.on_group_stop(false),
            Some(GroupAction::KillAll(KillCause::GroupStop))
        );

        let mut c = LeaderCoordinator::new(Some("l"));
        c.on_task_dead("l");
        assert_eq!(
            c.on_group_stop(false),
            Some(GroupAction::KillAll(KillCause::GroupStop))
        );
    }

    #[test]
    fn restored_dead_leader() {
        let mut c = LeaderCoordinator::new(Some("l"));
        c.on_restore(true);
        assert_eq!(c.phase(), Phase::LeaderDead);
        assert_eq!(
            c.on_start(),
            Some(GroupAction::KillFollowers(KillCause::LeaderDead))
        );
        assert_eq!(c.on_start(), None);
        assert_eq!(c.on_task_dead("l"), None);
    }

    #[test]
    fn restored_live_leader_is_idle() {
        let mut c = LeaderCoordinator::new(Some("l"));
        c.on_restore(false);
        assert_eq!(c.on_start(), None);
        assert_eq!(c.phase(), Phase::Idle);
    }

    #[test]
    fn destroy_overrides_any_phase() {
        let mut c = LeaderCoordinator::new(Some("l"));
        c.on_group_stop(true);
        assert_eq!(
            c.on_destroy(),
            Some(GroupAction::KillAll(KillCause::Destroy))
        );
        c.on_all_dead();
        assert_eq!(c.on_destroy(), None);
    }
}
