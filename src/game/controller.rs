//! Turn controller: session handshake, world updates and per-turn decisions

use rand_chacha::ChaCha8Rng;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::comms::protocol::{Handshake, ObjectType, Point, PowerUpType, WorldUpdate};
use crate::comms::{Action, ServerMessage, Transport};
use crate::error::BotError;

use super::aim::AimSystem;
use super::world::{ArenaBounds, ClosingBoundary, WorldState};

/// Tunable constants for the decision loop
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControllerTuning {
    /// Closer than this to a closing-boundary edge triggers evasion
    pub allowable_boundary_distance: f64,
    /// Turns an evasive move lasts before stopping
    pub evasion_ticks: u32,
    /// Turns between random repositions
    pub random_move_ticks: i32,
    /// Random clock value after an evasion starts
    pub evasion_random_reset: i32,
    /// Inset from the closing boundary for random targets
    pub random_margin: f64,
}

impl Default for ControllerTuning {
    fn default() -> Self {
        Self {
            allowable_boundary_distance: 100.0,
            evasion_ticks: 5,
            random_move_ticks: 8,
            evasion_random_reset: 10,
            random_margin: 50.0,
        }
    }
}

/// A power-up and how far it is from our tank
#[derive(Debug, Clone, PartialEq)]
pub struct PowerUpDistance {
    pub distance: f64,
    pub id: String,
    pub position: Point,
    pub powerup_type: Option<PowerUpType>,
}

/// Per-session mutable state
#[derive(Debug, Clone)]
pub struct ControllerState {
    pub tank_id: String,
    pub enemy_tank_id: String,
    pub own_position: Option<Point>,
    pub enemy_position: Option<Point>,
    /// Turns left in the current evasive move
    pub moving_ticks_boundary: u32,
    /// Turns until the next random reposition
    pub random_movement_clock: i32,
    /// Ascending by distance, rebuilt every turn
    pub power_up_distances: Vec<PowerUpDistance>,
}

impl ControllerState {
    pub fn new(handshake: Handshake, tuning: &ControllerTuning) -> Self {
        Self {
            tank_id: handshake.tank_id,
            enemy_tank_id: handshake.enemy_tank_id,
            own_position: None,
            enemy_position: None,
            moving_ticks_boundary: 0,
            random_movement_clock: tuning.random_move_ticks,
            power_up_distances: Vec::new(),
        }
    }
}

/// Result of reading one turn message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnSignal {
    Continue,
    SessionEnded,
}

/// Counters reported when a session finishes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub turns: u64,
    pub skipped_turns: u64,
    pub actions_sent: u64,
}

/// Owns the world mirror and decides one set of actions per turn
pub struct TurnController {
    state: ControllerState,
    world: WorldState,
    arena: ArenaBounds,
    closing_boundary: ClosingBoundary,
    tuning: ControllerTuning,
    rng: ChaCha8Rng,
    current_turn_message: Option<Value>,
}

impl TurnController {
    /// Run the init protocol: handshake, init snapshots until END_INIT, arena size
    pub fn initialize<T: Transport>(
        transport: &mut T,
        tuning: ControllerTuning,
        rng: ChaCha8Rng,
    ) -> Result<Self, BotError> {
        let handshake: Handshake = transport.read_message()?.decode()?;
        info!(
            tank_id = %handshake.tank_id,
            enemy_tank_id = %handshake.enemy_tank_id,
            "Handshake received"
        );

        let mut world = WorldState::new();
        loop {
            match transport.read_message()? {
                ServerMessage::EndInit => break,
                ServerMessage::End => {
                    return Err(BotError::Protocol(
                        "session ended during initialization".to_string(),
                    ))
                }
                msg @ ServerMessage::Data(_) => {
                    let update: WorldUpdate = msg.decode()?;
                    world.merge_updates(update.updated_objects);
                }
            }
        }

        let arena = world.arena_bounds()?;
        let closing_boundary = world
            .closing_boundary()
            .unwrap_or_else(|| ClosingBoundary::from_arena(&arena));

        info!(
            width = arena.width,
            height = arena.height,
            objects = world.len(),
            "Initialization complete"
        );

        Ok(Self {
            state: ControllerState::new(handshake, &tuning),
            world,
            arena,
            closing_boundary,
            tuning,
            rng,
            current_turn_message: None,
        })
    }

    #[cfg(test)]
    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    #[cfg(test)]
    pub fn world(&self) -> &WorldState {
        &self.world
    }

    #[cfg(test)]
    pub fn arena(&self) -> ArenaBounds {
        self.arena
    }

    #[cfg(test)]
    pub fn closing_boundary(&self) -> ClosingBoundary {
        self.closing_boundary
    }

    /// Raw copy of the latest turn message
    pub fn current_turn_message(&self) -> Option<&Value> {
        self.current_turn_message.as_ref()
    }

    /// Objects the server updated in the latest turn message
    pub fn updated_object_count(&self) -> usize {
        self.current_turn_message()
            .and_then(|msg| msg["message"]["updated_objects"].as_object())
            .map_or(0, |objects| objects.len())
    }

    /// Nearest power-up as of the last decided turn
    pub fn closest_power_up(&self) -> Option<&PowerUpDistance> {
        self.state.power_up_distances.first()
    }

    /// Read one turn message and fold it into the world mirror
    pub fn read_next_turn_data<T: Transport>(
        &mut self,
        transport: &mut T,
    ) -> Result<TurnSignal, BotError> {
        let msg = transport.read_message()?;
        if msg == ServerMessage::End {
            return Ok(TurnSignal::SessionEnded);
        }

        let update: WorldUpdate = msg.decode()?;
        self.world.apply_update(update);
        if let ServerMessage::Data(value) = msg {
            self.current_turn_message = Some(value);
        }
        Ok(TurnSignal::Continue)
    }

    /// Decide this turn's actions, in the order they should be posted
    pub fn respond_to_turn(&mut self) -> Result<Vec<Action>, BotError> {
        let own = self.world.point_of(&self.state.tank_id)?;
        let enemy = self.world.point_of(&self.state.enemy_tank_id)?;
        self.state.own_position = Some(own);
        self.state.enemy_position = Some(enemy);

        if let Some(closing_boundary) = self.world.closing_boundary() {
            self.closing_boundary = closing_boundary;
        }

        let mut actions = Vec::new();

        if let Some(action) = self.check_boundary(own) {
            actions.push(action);
        }

        actions.push(Action::Shoot(AimSystem::shoot_angle(own, enemy)));

        if let Some(action) = self.random_reposition() {
            actions.push(action);
        }

        self.update_power_up_distances(own);

        Ok(actions)
    }

    /// Evasion countdown, or a new evasion when too close to an edge
    fn check_boundary(&mut self, own: Point) -> Option<Action> {
        if self.state.moving_ticks_boundary > 0 {
            self.state.moving_ticks_boundary -= 1;
            if self.state.moving_ticks_boundary == 0 {
                debug!("Evasion finished, stopping");
                return Some(Action::stop());
            }
            return None;
        }

        let edge_distance = self.closing_boundary.nearest_edge_distance(own);
        if edge_distance < self.tuning.allowable_boundary_distance {
            info!(
                x = own.x,
                y = own.y,
                edge_distance,
                "Too close to closing boundary, heading to centre"
            );
            self.state.moving_ticks_boundary = self.tuning.evasion_ticks;
            self.state.random_movement_clock = self.tuning.evasion_random_reset;
            return Some(Action::Path(self.arena.center()));
        }

        None
    }

    /// Random target inside the closing boundary every few turns while not evading
    fn random_reposition(&mut self) -> Option<Action> {
        if self.state.moving_ticks_boundary > 0 {
            return None;
        }

        self.state.random_movement_clock -= 1;
        if self.state.random_movement_clock > 0 {
            return None;
        }

        self.state.random_movement_clock = self.tuning.random_move_ticks;
        let target = self
            .closing_boundary
            .random_point_inside(&mut self.rng, self.tuning.random_margin);
        debug!(x = target.x, y = target.y, "Random reposition");
        Some(Action::Path(target))
    }

    fn update_power_up_distances(&mut self, own: Point) {
        let mut entries: Vec<PowerUpDistance> = self
            .world
            .of_type(ObjectType::PowerUp)
            .filter_map(|(id, obj)| {
                let position = obj.position.as_point()?;
                Some(PowerUpDistance {
                    distance: AimSystem::distance(own, position),
                    id: id.clone(),
                    position,
                    powerup_type: obj.powerup_type,
                })
            })
            .collect();
        entries.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        self.state.power_up_distances = entries;
    }
}

/// Play one full session over the given transport
pub fn run_session<T: Transport>(
    transport: &mut T,
    tuning: ControllerTuning,
    rng: ChaCha8Rng,
) -> Result<SessionSummary, BotError> {
    let mut controller = TurnController::initialize(transport, tuning, rng)?;
    let mut summary = SessionSummary::default();

    loop {
        if controller.read_next_turn_data(transport)? == TurnSignal::SessionEnded {
            break;
        }
        summary.turns += 1;

        match controller.respond_to_turn() {
            Ok(actions) => {
                let closest = controller.closest_power_up();
                debug!(
                    turn = summary.turns,
                    updated_objects = controller.updated_object_count(),
                    actions = actions.len(),
                    own_position = ?controller.state.own_position,
                    enemy_position = ?controller.state.enemy_position,
                    closest_power_up = closest.map(|p| p.id.as_str()),
                    closest_power_up_distance = closest.map(|p| p.distance),
                    "Turn decided"
                );
                for action in &actions {
                    transport.post_message(action)?;
                }
                summary.actions_sent += actions.len() as u64;
            }
            Err(e) if e.is_recoverable() => {
                warn!(turn = summary.turns, error = %e, "Skipping turn");
                summary.skipped_turns += 1;
            }
            Err(e) => return Err(e),
        }
    }

    info!(
        turns = summary.turns,
        skipped_turns = summary.skipped_turns,
        actions_sent = summary.actions_sent,
        "Session ended"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comms::LineTransport;
    use rand::SeedableRng;
    use serde_json::json;
    use std::io::Cursor;

    fn line(value: Value) -> String {
        format!("{}\n", value)
    }

    fn handshake() -> String {
        line(json!({"message": {"your-tank-id": "me", "enemy-tank-id": "them"}}))
    }

    fn init_stream() -> String {
        let mut out = handshake();
        out += &line(json!({"message": {"updated_objects": {
            "b1": {"type": 5, "position": [[0, 0], [0, 1000], [2000, 1000], [2000, 0]]},
            "cb": {"type": 6, "position": [[0, 1000], [0, 0], [2000, 0], [2000, 1000]]}
        }}}));
        out += &line(json!({"message": {"updated_objects": {
            "me": {"type": 1, "position": [1000, 500], "hp": 5},
            "them": {"type": 1, "position": [1500, 500], "hp": 5}
        }}}));
        out += "END_INIT\n";
        out
    }

    fn turn(updated: Value, deleted: Value) -> String {
        line(json!({"message": {"updated_objects": updated, "deleted_objects": deleted}}))
    }

    fn controller_from(input: String) -> (TurnController, LineTransport<Cursor<String>, Vec<u8>>) {
        let mut transport = LineTransport::new(Cursor::new(input), Vec::new());
        let controller = TurnController::initialize(
            &mut transport,
            ControllerTuning::default(),
            ChaCha8Rng::seed_from_u64(42),
        )
        .unwrap();
        (controller, transport)
    }

    fn move_me(controller: &mut TurnController, x: f64, y: f64) {
        let body = turn(json!({"me": {"type": 1, "position": [x, y]}}), json!([]));
        let mut transport = LineTransport::new(Cursor::new(body), Vec::new());
        assert_eq!(
            controller.read_next_turn_data(&mut transport).unwrap(),
            TurnSignal::Continue
        );
    }

    #[test]
    fn init_derives_arena_size() {
        let (controller, _) = controller_from(init_stream());
        assert_eq!(controller.arena().width, 2000.0);
        assert_eq!(controller.arena().height, 1000.0);
        assert_eq!(controller.state().tank_id, "me");
        assert_eq!(controller.state().enemy_tank_id, "them");
        assert_eq!(controller.world().len(), 4);
    }

    #[test]
    fn init_without_boundary_fails() {
        let input = handshake() + "END_INIT\n";
        let mut transport = LineTransport::new(Cursor::new(input), Vec::new());
        let result = TurnController::initialize(
            &mut transport,
            ControllerTuning::default(),
            ChaCha8Rng::seed_from_u64(0),
        );
        assert!(matches!(result, Err(BotError::Configuration(_))));
    }

    #[test]
    fn init_with_bad_handshake_fails() {
        let input = line(json!({"message": {"your-tank-id": "me"}}));
        let mut transport = LineTransport::new(Cursor::new(input), Vec::new());
        let result = TurnController::initialize(
            &mut transport,
            ControllerTuning::default(),
            ChaCha8Rng::seed_from_u64(0),
        );
        assert!(matches!(result, Err(BotError::Protocol(_))));
    }

    #[test]
    fn turn_update_applies_deletes_then_updates() {
        let input = init_stream()
            + &turn(
                json!({"bullet": {"type": 2, "position": [1, 1], "velocity": [1, 0]}}),
                json!(["them", "never-existed"]),
            )
            + "END\n";
        let (mut controller, mut transport) = controller_from(input);

        assert_eq!(
            controller.read_next_turn_data(&mut transport).unwrap(),
            TurnSignal::Continue
        );
        assert!(!controller.world().contains("them"));
        assert!(controller.world().contains("bullet"));
        assert!(controller.current_turn_message().is_some());

        assert_eq!(
            controller.read_next_turn_data(&mut transport).unwrap(),
            TurnSignal::SessionEnded
        );
    }

    #[test]
    fn counts_updated_objects_of_latest_turn() {
        let input = init_stream()
            + &turn(
                json!({
                    "w1": {"type": 3, "position": [10, 10]},
                    "w2": {"type": 4, "position": [20, 20], "hp": 1}
                }),
                json!([]),
            )
            + &turn(json!({}), json!(["w1"]));
        let (mut controller, mut transport) = controller_from(input);
        assert_eq!(controller.updated_object_count(), 0);

        controller.read_next_turn_data(&mut transport).unwrap();
        assert_eq!(controller.updated_object_count(), 2);

        controller.read_next_turn_data(&mut transport).unwrap();
        assert_eq!(controller.updated_object_count(), 0);
        assert!(controller.closest_power_up().is_none());
    }

    #[test]
    fn missing_enemy_skips_turn() {
        let input = init_stream() + &turn(json!({}), json!(["them"]));
        let (mut controller, mut transport) = controller_from(input);
        controller.read_next_turn_data(&mut transport).unwrap();

        let err = controller.respond_to_turn().unwrap_err();
        assert!(err.is_recoverable());
        assert_eq!(controller.state().random_movement_clock, 8);
    }

    #[test]
    fn shoots_every_turn_from_centre() {
        let (mut controller, _) = controller_from(init_stream());
        let actions = controller.respond_to_turn().unwrap();
        assert_eq!(actions, vec![Action::Shoot(0.0)]);
        assert_eq!(controller.state().random_movement_clock, 7);
        assert_eq!(controller.state().own_position, Some(Point::new(1000.0, 500.0)));
    }

    #[test]
    fn evasion_lasts_five_turns_then_stops() {
        let (mut controller, _) = controller_from(init_stream());
        move_me(&mut controller, 50.0, 500.0);

        let first = controller.respond_to_turn().unwrap();
        assert_eq!(first[0], Action::Path(Point::new(1000.0, 500.0)));
        assert!(matches!(first[1], Action::Shoot(_)));
        assert_eq!(first.len(), 2);
        assert_eq!(controller.state().moving_ticks_boundary, 5);
        assert_eq!(controller.state().random_movement_clock, 10);

        // Still near the edge, but no new trigger while evading
        for _ in 0..4 {
            let actions = controller.respond_to_turn().unwrap();
            assert_eq!(actions.len(), 1);
            assert!(matches!(actions[0], Action::Shoot(_)));
        }

        let fifth = controller.respond_to_turn().unwrap();
        assert_eq!(fifth[0], Action::stop());
        assert!(matches!(fifth[1], Action::Shoot(_)));
        assert_eq!(controller.state().moving_ticks_boundary, 0);
        assert_eq!(controller.state().random_movement_clock, 9);
    }

    #[test]
    fn random_reposition_after_clock_runs_out() {
        let (mut controller, _) = controller_from(init_stream());
        for _ in 0..7 {
            assert_eq!(controller.respond_to_turn().unwrap().len(), 1);
        }

        let actions = controller.respond_to_turn().unwrap();
        assert_eq!(actions.len(), 2);
        match actions[1] {
            Action::Path(p) => {
                assert!((50.0..=1950.0).contains(&p.x));
                assert!((50.0..=950.0).contains(&p.y));
            }
            other => panic!("expected path, got {:?}", other),
        }
        assert_eq!(controller.state().random_movement_clock, 8);
    }

    #[test]
    fn closing_boundary_is_refreshed_each_turn() {
        let input = init_stream()
            + &turn(
                json!({"cb": {"type": 6, "position": [[400, 900], [400, 100], [1600, 100], [1600, 900]]}}),
                json!([]),
            );
        let (mut controller, mut transport) = controller_from(input);
        controller.read_next_turn_data(&mut transport).unwrap();
        controller.respond_to_turn().unwrap();

        let cb = controller.closing_boundary();
        assert_eq!((cb.left, cb.right, cb.bottom, cb.top), (400.0, 1600.0, 100.0, 900.0));
    }

    #[test]
    fn closing_boundary_kept_when_missing() {
        let input = init_stream() + &turn(json!({}), json!(["cb"]));
        let (mut controller, mut transport) = controller_from(input);
        let before = controller.closing_boundary();
        controller.read_next_turn_data(&mut transport).unwrap();
        controller.respond_to_turn().unwrap();
        assert_eq!(controller.closing_boundary(), before);
    }

    #[test]
    fn power_ups_sorted_by_distance() {
        let input = init_stream()
            + &turn(
                json!({
                    "far": {"type": 7, "position": [1900, 500], "powerup_type": "DAMAGE"},
                    "near": {"type": 7, "position": [1010, 500], "powerup_type": "HEALTH"},
                    "mid": {"type": 7, "position": [1000, 800], "powerup_type": "SPEED"}
                }),
                json!([]),
            );
        let (mut controller, mut transport) = controller_from(input);
        controller.read_next_turn_data(&mut transport).unwrap();
        controller.respond_to_turn().unwrap();

        let ids: Vec<&str> = controller
            .state()
            .power_up_distances
            .iter()
            .map(|p| p.id.as_str())
            .collect();
        assert_eq!(ids, vec!["near", "mid", "far"]);
        assert!(controller
            .state()
            .power_up_distances
            .windows(2)
            .all(|w| w[0].distance <= w[1].distance));

        let closest = controller.closest_power_up().unwrap();
        assert_eq!(closest.powerup_type, Some(PowerUpType::Health));
        assert_eq!(closest.distance, 10.0);

        let first = controller.state().power_up_distances.clone();
        controller.respond_to_turn().unwrap();
        assert_eq!(controller.state().power_up_distances, first);
    }

    #[test]
    fn run_session_posts_actions_and_skips_missing_tank() {
        let input = init_stream()
            + &turn(json!({}), json!([]))
            + &turn(json!({}), json!(["them"]))
            + "END\n";
        let mut transport = LineTransport::new(Cursor::new(input), Vec::new());

        let summary = run_session(
            &mut transport,
            ControllerTuning::default(),
            ChaCha8Rng::seed_from_u64(3),
        )
        .unwrap();
        assert_eq!(
            summary,
            SessionSummary {
                turns: 2,
                skipped_turns: 1,
                actions_sent: 1,
            }
        );

        let out = String::from_utf8(transport.into_writer()).unwrap();
        assert_eq!(out, "{\"shoot\":0.0}\n");
    }

    #[test]
    fn run_session_fails_on_eof() {
        let mut transport = LineTransport::new(Cursor::new(init_stream()), Vec::new());
        let result = run_session(
            &mut transport,
            ControllerTuning::default(),
            ChaCha8Rng::seed_from_u64(3),
        );
        assert!(matches!(result, Err(BotError::ConnectionClosed)));
    }

    #[test]
    fn run_session_fails_on_malformed_turn() {
        let input = init_stream() + "{not json\n";
        let mut transport = LineTransport::new(Cursor::new(input), Vec::new());
        let result = run_session(
            &mut transport,
            ControllerTuning::default(),
            ChaCha8Rng::seed_from_u64(3),
        );
        assert!(matches!(result, Err(BotError::Protocol(_))));
    }
}
