//! Per-room simulation state

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// A participant's fixed position within a room, assigned in join order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    One,
    Two,
}

impl Slot {
    /// Wire number (1 or 2)
    pub fn number(self) -> u8 {
        match self {
            Slot::One => 1,
            Slot::Two => 2,
        }
    }

    pub fn other(self) -> Self {
        match self {
            Slot::One => Slot::Two,
            Slot::Two => Slot::One,
        }
    }

    fn index(self) -> usize {
        match self {
            Slot::One => 0,
            Slot::Two => 1,
        }
    }
}

impl std::fmt::Display for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// Integer grid coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Cell {
    pub x: i32,
    pub y: i32,
}

impl Cell {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, delta: Velocity) -> Self {
        Self {
            x: self.x + delta.x,
            y: self.y + delta.y,
        }
    }
}

/// Per-tick movement: one of the four unit directions or zero
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Velocity {
    pub x: i32,
    pub y: i32,
}

impl Velocity {
    pub const ZERO: Velocity = Velocity { x: 0, y: 0 };

    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn is_zero(self) -> bool {
        self == Self::ZERO
    }
}

/// One participant's slice of the world
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantState {
    /// Head cell; always the newest entry of `body`
    pub position: Cell,
    pub velocity: Velocity,
    /// Occupied cells, oldest first
    pub body: VecDeque<Cell>,
    /// Scalar size used by the growth rule set
    pub extent: u32,
}

impl ParticipantState {
    pub fn spawn(at: Cell) -> Self {
        Self {
            position: at,
            velocity: Velocity::ZERO,
            body: VecDeque::from([at]),
            extent: 1,
        }
    }

    /// Cells this participant currently covers, head included
    pub fn occupies(&self, cell: Cell) -> bool {
        self.position == cell || self.body.contains(&cell)
    }
}

/// The mutable game world of one room. Pure data; the engine owns the rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationState {
    pub participants: [ParticipantState; 2],
    pub food: Option<Cell>,
    pub grid_size: i32,
}

impl SimulationState {
    /// Fresh world with both participants at their spawn cells and no food
    pub fn new(grid_size: i32) -> Self {
        Self {
            participants: [
                ParticipantState::spawn(Cell::new(2, 2)),
                ParticipantState::spawn(Cell::new(grid_size - 3, grid_size - 3)),
            ],
            food: None,
            grid_size,
        }
    }

    pub fn participant(&self, slot: Slot) -> &ParticipantState {
        &self.participants[slot.index()]
    }

    pub fn participant_mut(&mut self, slot: Slot) -> &mut ParticipantState {
        &mut self.participants[slot.index()]
    }

    pub fn in_bounds(&self, cell: Cell) -> bool {
        (0..self.grid_size).contains(&cell.x) && (0..self.grid_size).contains(&cell.y)
    }

    pub fn is_occupied(&self, cell: Cell) -> bool {
        self.participants.iter().any(|p| p.occupies(cell))
    }
}
