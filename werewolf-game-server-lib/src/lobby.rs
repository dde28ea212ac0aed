//! The pending match's role quota, edited with ±1 deltas before start.

use std::collections::BTreeMap;

use werewolf_game_lib::Role;
use werewolf_game_lib::Team;

use crate::error::GameError;

#[derive(Clone, Debug, Default)]
pub struct Lobby {
    quota: BTreeMap<Role, u32>,
}

impl Lobby {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn quota(&self) -> &BTreeMap<Role, u32> {
        &self.quota
    }

    pub fn total(&self) -> u32 {
        self.quota.values().sum()
    }

    /// Applies a ±1 edit. Decrementing an empty slot is a no-op.
    pub fn update_role(&mut self, role: Role, delta: i32) -> Result<(), GameError> {
        match delta {
            1 => {
                *self.quota.entry(role).or_insert(0) += 1;
            }
            -1 => {
                if let Some(count) = self.quota.get_mut(&role) {
                    *count = count.saturating_sub(1);
                    if *count == 0 {
                        self.quota.remove(&role);
                    }
                }
            }
            other => {
                return Err(GameError::InvalidQuota(format!(
                    "delta must be +1 or -1, got {other}"
                )));
            }
        }
        Ok(())
    }

    /// Quota totals the member count and fields at least one
    /// werewolf-team role.
    pub fn ready(&self, member_count: usize) -> bool {
        self.total() as usize == member_count
            && self
                .quota
                .iter()
                .any(|(role, &count)| role.is_team(Team::Werewolves) && count > 0)
    }

    pub fn reset(&mut self) {
        self.quota.clear();
    }

    /// Restores a persisted quota on recovery.
    pub(crate) fn restore(&mut self, quota: BTreeMap<Role, u32>) {
        self.quota = quota;
    }
}
