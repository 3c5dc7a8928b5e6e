//! Authoritative tick simulation
//!
//! Two rule sets share one engine:
//! - `Snake`: participants move every tick along their stored velocity, grow a
//!   body by eating food, and lose by leaving the grid or running into their
//!   own body.
//! - `Growth`: participants never move on their own; input nudges their
//!   position directly and the first to reach the winning extent wins.
//!
//! Participant 1 is always resolved before participant 2. The first terminal
//! condition met in a tick decides it, so if both participants would lose in
//! the same tick, participant 2 wins.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::Config;

use super::state::{Cell, SimulationState, Slot, Velocity};

/// Rule set a room is simulated with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameMode {
    /// Movement, body growth, boundary and self-collision losses
    Snake,
    /// Stationary growth race to a target extent
    Growth,
}

impl std::str::FromStr for GameMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "snake" => Ok(Self::Snake),
            "growth" => Ok(Self::Growth),
            other => Err(format!("unknown game mode: {other}")),
        }
    }
}

/// Rule parameters fixed for the lifetime of the server
#[derive(Debug, Clone)]
pub struct GameRules {
    pub mode: GameMode,
    pub grid_size: i32,
    pub food_placement_attempts: u32,
    pub growth_win_extent: u32,
    pub growth_increment: u32,
}

impl GameRules {
    pub fn from_config(config: &Config) -> Self {
        Self {
            mode: config.game_mode,
            grid_size: config.grid_size,
            food_placement_attempts: config.food_placement_attempts,
            growth_win_extent: config.growth_win_extent,
            growth_increment: config.growth_increment,
        }
    }
}

impl Default for GameRules {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Result of advancing a room by one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    Winner(Slot),
}

/// Simulation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    #[error("No free cell left for food")]
    FoodPlacementExhausted,
}

/// Stateless rule engine; all mutable data lives in `SimulationState`
#[derive(Debug, Clone, Default)]
pub struct SimulationEngine {
    rules: GameRules,
}

impl SimulationEngine {
    pub fn new(rules: GameRules) -> Self {
        Self { rules }
    }

    /// Build the opening world for a new room, food included
    pub fn new_state<R: Rng>(&self, rng: &mut R) -> SimulationState {
        let mut state = SimulationState::new(self.rules.grid_size);
        self.relocate_food(&mut state, rng);
        state
    }

    /// Record a movement command between ticks. Never resolves collisions.
    pub fn apply_input(&self, state: &mut SimulationState, slot: Slot, velocity: Velocity) {
        let participant = state.participant_mut(slot);
        match self.rules.mode {
            GameMode::Snake => participant.velocity = velocity,
            GameMode::Growth => {
                participant.position = participant.position.offset(velocity);
                participant.body.clear();
                participant.body.push_back(participant.position);
            }
        }
    }

    /// Advance the world by exactly one tick
    pub fn advance_tick<R: Rng>(&self, state: &mut SimulationState, rng: &mut R) -> TickOutcome {
        match self.rules.mode {
            GameMode::Snake => self.advance_snake(state, rng),
            GameMode::Growth => self.advance_growth(state, rng),
        }
    }

    fn advance_snake<R: Rng>(&self, state: &mut SimulationState, rng: &mut R) -> TickOutcome {
        for slot in [Slot::One, Slot::Two] {
            if !self.step_snake(state, slot, rng) {
                debug!(loser = %slot, "Participant eliminated");
                return TickOutcome::Winner(slot.other());
            }
        }
        TickOutcome::Continue
    }

    /// Returns false when the participant lost this tick
    fn step_snake<R: Rng>(&self, state: &mut SimulationState, slot: Slot, rng: &mut R) -> bool {
        let (head, moving) = {
            let participant = state.participant_mut(slot);
            let moving = !participant.velocity.is_zero();
            if moving {
                participant.position = participant.position.offset(participant.velocity);
            }
            (participant.position, moving)
        };

        if !state.in_bounds(head) {
            return false;
        }

        let ate = state.food == Some(head);
        if ate {
            state.participant_mut(slot).extent += self.rules.growth_increment;
            self.relocate_food(state, rng);
        }

        if moving {
            let participant = state.participant_mut(slot);
            if participant.body.contains(&head) {
                return false;
            }
            participant.body.push_back(head);
            if !ate {
                participant.body.pop_front();
            }
        }

        true
    }

    fn advance_growth<R: Rng>(&self, state: &mut SimulationState, rng: &mut R) -> TickOutcome {
        for slot in [Slot::One, Slot::Two] {
            if state.food == Some(state.participant(slot).position) {
                state.participant_mut(slot).extent += self.rules.growth_increment;
                self.relocate_food(state, rng);
            }
        }

        for slot in [Slot::One, Slot::Two] {
            if state.participant(slot).extent >= self.rules.growth_win_extent {
                return TickOutcome::Winner(slot);
            }
        }

        TickOutcome::Continue
    }

    /// Move food to a free cell; clears it when the grid has none left
    fn relocate_food<R: Rng>(&self, state: &mut SimulationState, rng: &mut R) {
        match place_food(state, rng, self.rules.food_placement_attempts) {
            Ok(cell) => state.food = Some(cell),
            Err(e) => {
                warn!(error = %e, "Food removed from play");
                state.food = None;
            }
        }
    }
}

/// Pick an unoccupied cell: bounded rejection sampling, then a row-major scan
pub fn place_food<R: Rng>(
    state: &SimulationState,
    rng: &mut R,
    max_attempts: u32,
) -> Result<Cell, GameError> {
    let size = state.grid_size;
    if size <= 0 {
        return Err(GameError::FoodPlacementExhausted);
    }

    for _ in 0..max_attempts {
        let cell = Cell::new(rng.gen_range(0..size), rng.gen_range(0..size));
        if !state.is_occupied(cell) {
            return Ok(cell);
        }
    }

    (0..size)
        .flat_map(|y| (0..size).map(move |x| Cell::new(x, y)))
        .find(|cell| !state.is_occupied(*cell))
        .ok_or(GameError::FoodPlacementExhausted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::collections::VecDeque;

    fn snake_engine() -> SimulationEngine {
        SimulationEngine::new(GameRules {
            mode: GameMode::Snake,
            grid_size: 10,
            ..GameRules::default()
        })
    }

    fn growth_engine() -> SimulationEngine {
        SimulationEngine::new(GameRules {
            mode: GameMode::Growth,
            grid_size: 10,
            growth_win_extent: 3,
            growth_increment: 1,
            ..GameRules::default()
        })
    }

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(7)
    }

    fn assert_food_clear(state: &SimulationState) {
        let food = state.food.expect("food should be placed");
        assert!(state.in_bounds(food));
        assert!(!state.is_occupied(food), "food {food:?} placed on a participant");
    }

    #[test]
    fn idle_ticks_leave_state_unchanged() {
        let engine = snake_engine();
        let mut rng = rng();
        let mut state = engine.new_state(&mut rng);
        let before = state.clone();

        for _ in 0..50 {
            assert_eq!(engine.advance_tick(&mut state, &mut rng), TickOutcome::Continue);
        }
        assert_eq!(state, before);
    }

    #[test]
    fn movement_shifts_body_without_growing() {
        let engine = snake_engine();
        let mut rng = rng();
        let mut state = SimulationState::new(10);
        state.food = Some(Cell::new(9, 9));
        engine.apply_input(&mut state, Slot::One, Velocity::new(1, 0));

        engine.advance_tick(&mut state, &mut rng);

        let one = state.participant(Slot::One);
        assert_eq!(one.position, Cell::new(3, 2));
        assert_eq!(one.body, VecDeque::from([Cell::new(3, 2)]));
    }

    #[test]
    fn eating_grows_by_one_and_relocates_food() {
        let engine = snake_engine();
        let mut rng = rng();
        let mut state = SimulationState::new(10);
        state.food = Some(Cell::new(3, 2));
        engine.apply_input(&mut state, Slot::One, Velocity::new(1, 0));

        assert_eq!(engine.advance_tick(&mut state, &mut rng), TickOutcome::Continue);

        let one = state.participant(Slot::One);
        assert_eq!(one.body, VecDeque::from([Cell::new(2, 2), Cell::new(3, 2)]));
        assert_eq!(one.extent, 2);
        assert_ne!(state.food, Some(Cell::new(3, 2)));
        assert_food_clear(&state);

        state.food = Some(Cell::new(9, 9));
        engine.advance_tick(&mut state, &mut rng);
        assert_eq!(
            state.participant(Slot::One).body,
            VecDeque::from([Cell::new(3, 2), Cell::new(4, 2)])
        );
    }

    #[test]
    fn leaving_the_grid_loses() {
        let engine = snake_engine();
        let mut rng = rng();
        let mut state = SimulationState::new(10);
        state.food = Some(Cell::new(9, 9));
        engine.apply_input(&mut state, Slot::Two, Velocity::new(0, 1));

        // Slot 2 spawns at (7, 7); y = 10 is off the grid.
        assert_eq!(engine.advance_tick(&mut state, &mut rng), TickOutcome::Continue);
        assert_eq!(engine.advance_tick(&mut state, &mut rng), TickOutcome::Continue);
        assert_eq!(
            engine.advance_tick(&mut state, &mut rng),
            TickOutcome::Winner(Slot::One)
        );
    }

    #[test]
    fn simultaneous_losses_favour_slot_two() {
        let engine = snake_engine();
        let mut rng = rng();
        let mut state = SimulationState::new(10);
        state.food = Some(Cell::new(5, 5));
        state.participant_mut(Slot::One).position = Cell::new(0, 4);
        state.participant_mut(Slot::One).body = VecDeque::from([Cell::new(0, 4)]);
        state.participant_mut(Slot::Two).position = Cell::new(9, 4);
        state.participant_mut(Slot::Two).body = VecDeque::from([Cell::new(9, 4)]);
        engine.apply_input(&mut state, Slot::One, Velocity::new(-1, 0));
        engine.apply_input(&mut state, Slot::Two, Velocity::new(1, 0));

        let outcome = engine.advance_tick(&mut state, &mut rng);

        assert_eq!(outcome, TickOutcome::Winner(Slot::Two));
        // Slot 2 was never resolved.
        assert_eq!(state.participant(Slot::Two).position, Cell::new(9, 4));
    }

    #[test]
    fn reversing_into_own_body_loses() {
        let engine = snake_engine();
        let mut rng = rng();
        let mut state = SimulationState::new(10);
        state.food = Some(Cell::new(9, 0));
        {
            let one = state.participant_mut(Slot::One);
            one.position = Cell::new(4, 2);
            one.body = VecDeque::from([Cell::new(2, 2), Cell::new(3, 2), Cell::new(4, 2)]);
        }
        engine.apply_input(&mut state, Slot::One, Velocity::new(-1, 0));

        assert_eq!(
            engine.advance_tick(&mut state, &mut rng),
            TickOutcome::Winner(Slot::Two)
        );
    }

    #[test]
    fn body_never_shrinks_over_a_long_run() {
        let engine = snake_engine();
        let mut rng = ChaCha8Rng::seed_from_u64(99);
        let mut state = engine.new_state(&mut rng);
        let mut last_len = 1;
        // Walk a square loop around the grid interior.
        let path = [(1, 0), (0, 1), (-1, 0), (0, -1)];

        for step in 0..200 {
            let (x, y) = path[(step / 5) % 4];
            engine.apply_input(&mut state, Slot::One, Velocity::new(x, y));
            match engine.advance_tick(&mut state, &mut rng) {
                TickOutcome::Continue => {}
                TickOutcome::Winner(_) => break,
            }
            let len = state.participant(Slot::One).body.len();
            assert!(len >= last_len);
            last_len = len;
            if state.food.is_some() {
                assert_food_clear(&state);
            }
        }
    }

    #[test]
    fn growth_mode_moves_only_on_input() {
        let engine = growth_engine();
        let mut rng = rng();
        let mut state = SimulationState::new(10);
        state.food = Some(Cell::new(9, 9));

        engine.apply_input(&mut state, Slot::One, Velocity::new(0, 1));
        assert_eq!(state.participant(Slot::One).position, Cell::new(2, 3));
        assert_eq!(state.participant(Slot::One).velocity, Velocity::ZERO);

        engine.advance_tick(&mut state, &mut rng);
        assert_eq!(state.participant(Slot::One).position, Cell::new(2, 3));
    }

    #[test]
    fn growth_mode_declares_winner_at_extent() {
        let engine = growth_engine();
        let mut rng = rng();
        let mut state = SimulationState::new(10);

        state.food = Some(state.participant(Slot::Two).position);
        assert_eq!(engine.advance_tick(&mut state, &mut rng), TickOutcome::Continue);
        assert_eq!(state.participant(Slot::Two).extent, 2);
        assert_food_clear(&state);

        state.food = Some(state.participant(Slot::Two).position);
        assert_eq!(
            engine.advance_tick(&mut state, &mut rng),
            TickOutcome::Winner(Slot::Two)
        );
    }

    #[test]
    fn growth_mode_ignores_bounds() {
        let engine = growth_engine();
        let mut rng = rng();
        let mut state = SimulationState::new(10);
        state.food = Some(Cell::new(9, 9));
        for _ in 0..5 {
            engine.apply_input(&mut state, Slot::One, Velocity::new(-1, 0));
        }

        assert_eq!(engine.advance_tick(&mut state, &mut rng), TickOutcome::Continue);
        assert_eq!(state.participant(Slot::One).position, Cell::new(-3, 2));
    }

    #[test]
    fn placement_falls_back_to_scan() {
        let mut state = SimulationState::new(5);
        let mut occupied: VecDeque<Cell> = (0..5)
            .flat_map(|y| (0..5).map(move |x| Cell::new(x, y)))
            .collect();
        occupied.retain(|c| *c != Cell::new(4, 4));
        state.participant_mut(Slot::One).body = occupied;

        let cell = place_food(&state, &mut rng(), 0).unwrap();
        assert_eq!(cell, Cell::new(4, 4));
    }

    #[test]
    fn placement_on_full_grid_is_exhausted() {
        let mut state = SimulationState::new(5);
        state.participant_mut(Slot::One).body = (0..5)
            .flat_map(|y| (0..5).map(move |x| Cell::new(x, y)))
            .collect();

        assert_eq!(
            place_food(&state, &mut rng(), 16),
            Err(GameError::FoodPlacementExhausted)
        );
    }

    #[test]
    fn same_seed_same_game() {
        let engine = snake_engine();
        let run = || {
            let mut rng = ChaCha8Rng::seed_from_u64(1234);
            let mut state = engine.new_state(&mut rng);
            engine.apply_input(&mut state, Slot::One, Velocity::new(1, 0));
            engine.apply_input(&mut state, Slot::Two, Velocity::new(-1, 0));
            for _ in 0..3 {
                engine.advance_tick(&mut state, &mut rng);
            }
            state
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn parses_modes() {
        assert_eq!("snake".parse::<GameMode>(), Ok(GameMode::Snake));
        assert_eq!("Growth".parse::<GameMode>(), Ok(GameMode::Growth));
        assert!("tetris".parse::<GameMode>().is_err());
    }
}
