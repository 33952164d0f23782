//! Cycle: a water-circulation loop with one pump serving a set of rooms.

use serde::{Deserialize, Serialize};

use crate::error::{CalorError, ValidationError};
use crate::id::{CycleId, RoomId};

/// A water-circulation loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cycle {
    pub id: CycleId,
    pub name: String,
    /// Smart-plug id of the circulation pump.
    pub pump: String,
    /// Rooms served by this loop.
    pub rooms: Vec<RoomId>,
}

impl Cycle {
    /// Create a builder for constructing a [`Cycle`].
    #[must_use]
    pub fn builder() -> CycleBuilder {
        CycleBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`CalorError::Validation`] when:
    /// - `name` is empty ([`ValidationError::EmptyName`])
    /// - `pump` is empty ([`ValidationError::EmptyPump`])
    /// - `rooms` is empty ([`ValidationError::NoRooms`])
    pub fn validate(&self) -> Result<(), CalorError> {
        if self.name.is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        if self.pump.is_empty() {
            return Err(ValidationError::EmptyPump.into());
        }
        if self.rooms.is_empty() {
            return Err(ValidationError::NoRooms.into());
        }
        Ok(())
    }
}

/// Step-by-step builder for [`Cycle`].
#[derive(Debug, Default)]
pub struct CycleBuilder {
    id: Option<CycleId>,
    name: Option<String>,
    pump: Option<String>,
    rooms: Vec<RoomId>,
}

impl CycleBuilder {
    #[must_use]
    pub fn id(mut self, id: CycleId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn pump(mut self, pump: impl Into<String>) -> Self {
        self.pump = Some(pump.into());
        self
    }

    #[must_use]
    pub fn room(mut self, room: RoomId) -> Self {
        self.rooms.push(room);
        self
    }

    /// Consume the builder, validate, and return a [`Cycle`].
    ///
    /// # Errors
    ///
    /// Returns [`CalorError::Validation`] if required fields are missing or
    /// empty.
    pub fn build(self) -> Result<Cycle, CalorError> {
        let cycle = Cycle {
            id: self.id.unwrap_or(CycleId::new(0)),
            name: self.name.unwrap_or_default(),
            pump: self.pump.unwrap_or_default(),
            rooms: self.rooms,
        };
        cycle.validate()?;
        Ok(cycle)
    }
}
