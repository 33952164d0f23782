//! Operator master switches at the system, cycle and room level.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::decision::Vote;
use crate::id::{CycleId, RoomId};

/// One operator toggle: scheduled control, forced on, or forced off.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwitchMode {
    #[default]
    Auto,
    On,
    Off,
}

impl SwitchMode {
    /// The forced vote, or `None` when scheduling stays in control.
    #[must_use]
    pub fn forced_vote(self) -> Option<Vote> {
        match self {
            Self::Auto => None,
            Self::On => Some(Vote::On),
            Self::Off => Some(Vote::Off),
        }
    }
}

/// The full operator switch tree.
///
/// Missing entries mean `Auto`; operators usually only ever touch one or two
/// of these.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterSwitch {
    pub system: SwitchMode,
    pub cycles: BTreeMap<CycleId, SwitchMode>,
    pub rooms: BTreeMap<RoomId, SwitchMode>,
}

impl MasterSwitch {
    #[must_use]
    pub fn cycle(&self, id: CycleId) -> SwitchMode {
        self.cycles.get(&id).copied().unwrap_or_default()
    }

    #[must_use]
    pub fn room(&self, id: RoomId) -> SwitchMode {
        self.rooms.get(&id).copied().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_default_to_auto_for_unknown_ids() {
        let switch = MasterSwitch::default();
        assert_eq!(switch.cycle(CycleId::new(9)), SwitchMode::Auto);
        assert_eq!(switch.room(RoomId::new(9)), SwitchMode::Auto);
    }

    #[test]
    fn should_map_modes_to_forced_votes() {
        assert_eq!(SwitchMode::Auto.forced_vote(), None);
        assert_eq!(SwitchMode::On.forced_vote(), Some(Vote::On));
        assert_eq!(SwitchMode::Off.forced_vote(), Some(Vote::Off));
    }

    #[test]
    fn should_return_stored_mode_for_known_cycle() {
        let mut switch = MasterSwitch::default();
        switch.cycles.insert(CycleId::new(2), SwitchMode::Off);
        assert_eq!(switch.cycle(CycleId::new(2)), SwitchMode::Off);
    }

    #[test]
    fn should_roundtrip_through_serde_json() {
        let mut switch = MasterSwitch {
            system: SwitchMode::On,
            ..MasterSwitch::default()
        };
        switch.rooms.insert(RoomId::new(1), SwitchMode::Off);

        let json = serde_json::to_string(&switch).unwrap();
        let parsed: MasterSwitch = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.system, SwitchMode::On);
        assert_eq!(parsed.room(RoomId::new(1)), SwitchMode::Off);
    }
}
