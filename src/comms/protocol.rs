//! Line protocol message definitions
//! These are the wire types exchanged with the game server

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::BotError;

/// Sent by the server once every init snapshot has been delivered
pub const END_INIT_SIGNAL: &str = "END_INIT";
/// Sent by the server when the game is over
pub const END_SIGNAL: &str = "END";

/// Object type tags, fixed by the game server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ObjectType {
    Tank,
    Bullet,
    Wall,
    DestructibleWall,
    Boundary,
    ClosingBoundary,
    PowerUp,
}

impl TryFrom<u8> for ObjectType {
    type Error = String;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        match tag {
            1 => Ok(Self::Tank),
            2 => Ok(Self::Bullet),
            3 => Ok(Self::Wall),
            4 => Ok(Self::DestructibleWall),
            5 => Ok(Self::Boundary),
            6 => Ok(Self::ClosingBoundary),
            7 => Ok(Self::PowerUp),
            other => Err(format!("unknown object type tag {}", other)),
        }
    }
}

impl From<ObjectType> for u8 {
    fn from(kind: ObjectType) -> Self {
        match kind {
            ObjectType::Tank => 1,
            ObjectType::Bullet => 2,
            ObjectType::Wall => 3,
            ObjectType::DestructibleWall => 4,
            ObjectType::Boundary => 5,
            ObjectType::ClosingBoundary => 6,
            ObjectType::PowerUp => 7,
        }
    }
}

/// Power-up flavours
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PowerUpType {
    Health,
    Speed,
    Damage,
}

/// A 2D point, encoded on the wire as `[x, y]`
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<[f64; 2]> for Point {
    fn from([x, y]: [f64; 2]) -> Self {
        Self { x, y }
    }
}

impl From<Point> for [f64; 2] {
    fn from(p: Point) -> Self {
        [p.x, p.y]
    }
}

/// Position (or velocity) of a world object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Position {
    /// Single point for tanks, bullets, walls and power-ups
    Point(Point),
    /// Four rectangle corners for boundaries
    Corners([Point; 4]),
}

impl Position {
    /// All points making up this position
    pub fn points(&self) -> &[Point] {
        match self {
            Position::Point(p) => std::slice::from_ref(p),
            Position::Corners(corners) => corners,
        }
    }

    pub fn as_point(&self) -> Option<Point> {
        match self {
            Position::Point(p) => Some(*p),
            Position::Corners(_) => None,
        }
    }
}

/// A single object in the arena
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldObject {
    #[serde(rename = "type")]
    pub kind: ObjectType,
    pub position: Position,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub velocity: Option<Position>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hp: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub powerup_type: Option<PowerUpType>,
}

/// Body of the first message of a session
#[derive(Debug, Clone, Deserialize)]
pub struct Handshake {
    #[serde(rename = "your-tank-id")]
    pub tank_id: String,
    #[serde(rename = "enemy-tank-id")]
    pub enemy_tank_id: String,
}

/// Body of init and turn messages
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorldUpdate {
    #[serde(default)]
    pub updated_objects: HashMap<String, WorldObject>,
    /// Only present on turn messages
    #[serde(default)]
    pub deleted_objects: Vec<String>,
}

#[derive(Deserialize)]
struct Envelope<T> {
    message: T,
}

/// Messages received from the server
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    EndInit,
    End,
    /// Any structured JSON message
    Data(Value),
}

impl ServerMessage {
    /// Parse one line received from the server
    pub fn parse(line: &str) -> Result<Self, BotError> {
        let line = line.trim();
        if let Some(sentinel) = Self::sentinel(line) {
            return Ok(sentinel);
        }

        let value: Value = serde_json::from_str(line)
            .map_err(|e| BotError::Protocol(format!("unparseable message: {}", e)))?;
        match value {
            Value::String(s) => Self::sentinel(&s)
                .ok_or_else(|| BotError::Protocol(format!("unexpected string message {:?}", s))),
            value => Ok(Self::Data(value)),
        }
    }

    fn sentinel(text: &str) -> Option<Self> {
        match text {
            END_INIT_SIGNAL => Some(Self::EndInit),
            END_SIGNAL => Some(Self::End),
            _ => None,
        }
    }

    /// Decode the `message` body of a structured message
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, BotError> {
        match self {
            Self::Data(value) => {
                let envelope =
                    Envelope::<T>::deserialize(value).map_err(|e| BotError::Protocol(e.to_string()))?;
                Ok(envelope.message)
            }
            Self::EndInit => Err(BotError::Protocol("unexpected END_INIT signal".to_string())),
            Self::End => Err(BotError::Protocol("unexpected END signal".to_string())),
        }
    }
}

/// Actions sent to the server, one per line
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// `-1` cancels the current directed movement
    Move(i32),
    /// Set a movement target
    Path(Point),
    /// Fire in the given direction, in degrees
    Shoot(f64),
}

impl Action {
    pub fn stop() -> Self {
        Self::Move(-1)
    }
}
