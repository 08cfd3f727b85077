//! Inbound command messages.
//!
//! A message is one client payload tagged with the connection identity the
//! transport received it on. Command records inside a message arrive as
//! loosely-typed JSON objects; each record is parsed on its own into a
//! [`PlayerCommand`], so one malformed record never poisons its siblings.
//!
//! ```text
//! {"connection_id":"P1","commands":[{"command":"MOVE","unit":7,"dir":"N"}]}
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::components::{EntityId, PlayerId};
use crate::direction::{Direction, InvalidDirection};
use crate::error::{GameError, Result};

/// One client payload, tagged with its connection identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Identity of the connection the payload arrived on.
    pub connection_id: PlayerId,
    /// Raw command records in submission order.
    #[serde(default, deserialize_with = "commands_or_empty")]
    pub commands: Vec<Value>,
}

/// The part of a message the client itself sends.
#[derive(Debug, Deserialize)]
struct ClientPayload {
    #[serde(default, deserialize_with = "commands_or_empty")]
    commands: Vec<Value>,
}

/// Treat `"commands": null` the same as a missing field.
fn commands_or_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default())
}

impl InboundMessage {
    /// Create a message from already-decoded command records.
    #[must_use]
    pub fn new(connection_id: impl Into<PlayerId>, commands: Vec<Value>) -> Self {
        Self {
            connection_id: connection_id.into(),
            commands,
        }
    }

    /// Decode a full message (identity included) from a JSON line.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::MessageDecode`] if the line is not a message object.
    pub fn from_json(line: &str) -> Result<Self> {
        serde_json::from_str(line).map_err(|e| GameError::MessageDecode(e.to_string()))
    }

    /// Decode a client payload and tag it with the connection it arrived on.
    ///
    /// Any identity the client wrote into the payload is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::MessageDecode`] if the payload is not an object.
    pub fn from_payload(connection_id: PlayerId, payload: &str) -> Result<Self> {
        let payload: ClientPayload =
            serde_json::from_str(payload).map_err(|e| GameError::MessageDecode(e.to_string()))?;
        Ok(Self {
            connection_id,
            commands: payload.commands,
        })
    }

    /// Encode the message as a single JSON line.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::Serialization`] if encoding fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| GameError::Serialization(e.to_string()))
    }

    /// Parse every command record, in order.
    pub fn parse_commands(
        &self,
    ) -> impl Iterator<Item = std::result::Result<PlayerCommand, CommandParseError>> + '_ {
        self.commands.iter().map(PlayerCommand::parse)
    }
}

/// The six command kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandKind {
    /// Step a unit onto an adjacent tile.
    Move,
    /// Build a unit at the player's base.
    Create,
    /// Rename a unit or the player's base.
    Identify,
    /// Ranged attack at a tile offset.
    Shoot,
    /// Close attack on an entity.
    Melee,
    /// Harvest an adjacent resource.
    Gather,
}

impl CommandKind {
    /// Wire tag of this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Move => "MOVE",
            Self::Create => "CREATE",
            Self::Identify => "IDENTIFY",
            Self::Shoot => "SHOOT",
            Self::Melee => "MELEE",
            Self::Gather => "GATHER",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommandKind {
    type Err = CommandParseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "MOVE" => Ok(Self::Move),
            "CREATE" => Ok(Self::Create),
            "IDENTIFY" => Ok(Self::Identify),
            "SHOOT" => Ok(Self::Shoot),
            "MELEE" => Ok(Self::Melee),
            "GATHER" => Ok(Self::Gather),
            _ => Err(CommandParseError::UnknownKind(s.to_string())),
        }
    }
}

/// Why a command record could not be turned into a [`PlayerCommand`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandParseError {
    /// The record is not an object, or a field has the wrong JSON type.
    #[error("command record is not well-formed: {0}")]
    InvalidRecord(String),
    /// The record has no `command` field.
    #[error("command record has no kind")]
    MissingKind,
    /// The `command` field names no known kind.
    #[error("unknown command kind {0:?}")]
    UnknownKind(String),
    /// A field the kind needs is absent.
    #[error("{kind} command is missing field '{field}'")]
    MissingField {
        /// Kind of the record.
        kind: CommandKind,
        /// Name of the absent field.
        field: &'static str,
    },
}

/// Wire shape of a command record. Every field is optional; unknown fields
/// are ignored.
#[derive(Debug, Default, Deserialize)]
struct RawCommand {
    command: Option<String>,
    unit: Option<EntityId>,
    dir: Option<String>,
    #[serde(rename = "type")]
    unit_type: Option<String>,
    name: Option<String>,
    dx: Option<i32>,
    dy: Option<i32>,
    target: Option<EntityId>,
}

fn required<T>(
    value: Option<T>,
    kind: CommandKind,
    field: &'static str,
) -> std::result::Result<T, CommandParseError> {
    value.ok_or(CommandParseError::MissingField { kind, field })
}

/// A validated command record, carrying only the fields its kind uses.
///
/// Directions stay unresolved-but-typed: an unknown direction is not a
/// parse failure, because MOVE and GATHER must still reset the unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerCommand {
    /// Step onto the adjacent tile.
    Move {
        /// Acting unit.
        unit: EntityId,
        /// Step direction.
        direction: std::result::Result<Direction, InvalidDirection>,
    },
    /// Build a unit at the issuer's base.
    Create {
        /// Catalog tag of the unit type.
        unit_type: String,
    },
    /// Rename an entity.
    Identify {
        /// New name.
        name: String,
        /// Unit to rename; the issuer's base when absent.
        unit: Option<EntityId>,
    },
    /// Ranged attack.
    Shoot {
        /// Acting unit.
        unit: EntityId,
        /// Horizontal tile offset.
        dx: i32,
        /// Vertical tile offset.
        dy: i32,
    },
    /// Close attack.
    Melee {
        /// Acting unit.
        unit: EntityId,
        /// Entity to strike.
        target: EntityId,
    },
    /// Harvest the adjacent tile.
    Gather {
        /// Acting unit.
        unit: EntityId,
        /// Direction of the resource tile.
        direction: std::result::Result<Direction, InvalidDirection>,
    },
}

impl PlayerCommand {
    /// Parse one command record.
    ///
    /// # Errors
    ///
    /// Returns a [`CommandParseError`] if the record is malformed, has no or
    /// an unknown kind, or lacks a field its kind requires.
    pub fn parse(record: &Value) -> std::result::Result<Self, CommandParseError> {
        let raw = RawCommand::deserialize(record)
            .map_err(|e| CommandParseError::InvalidRecord(e.to_string()))?;
        let kind: CommandKind = raw
            .command
            .as_deref()
            .ok_or(CommandParseError::MissingKind)?
            .parse()?;

        let command = match kind {
            CommandKind::Move => Self::Move {
                unit: required(raw.unit, kind, "unit")?,
                direction: Direction::resolve(raw.dir.as_deref()),
            },
            CommandKind::Create => Self::Create {
                unit_type: required(raw.unit_type, kind, "type")?,
            },
            CommandKind::Identify => Self::Identify {
                name: required(raw.name, kind, "name")?,
                unit: raw.unit,
            },
            CommandKind::Shoot => Self::Shoot {
                unit: required(raw.unit, kind, "unit")?,
                dx: required(raw.dx, kind, "dx")?,
                dy: required(raw.dy, kind, "dy")?,
            },
            CommandKind::Melee => Self::Melee {
                unit: required(raw.unit, kind, "unit")?,
                target: required(raw.target, kind, "target")?,
            },
            CommandKind::Gather => Self::Gather {
                unit: required(raw.unit, kind, "unit")?,
                direction: Direction::resolve(raw.dir.as_deref()),
            },
        };
        Ok(command)
    }

    /// Kind of this command.
    #[must_use]
    pub const fn kind(&self) -> CommandKind {
        match self {
            Self::Move { .. } => CommandKind::Move,
            Self::Create { .. } => CommandKind::Create,
            Self::Identify { .. } => CommandKind::Identify,
            Self::Shoot { .. } => CommandKind::Shoot,
            Self::Melee { .. } => CommandKind::Melee,
            Self::Gather { .. } => CommandKind::Gather,
        }
    }

    /// The unit the command names, if any.
    #[must_use]
    pub const fn unit(&self) -> Option<EntityId> {
        match self {
            Self::Move { unit, .. }
            | Self::Shoot { unit, .. }
            | Self::Melee { unit, .. }
            | Self::Gather { unit, .. } => Some(*unit),
            Self::Identify { unit, .. } => *unit,
            Self::Create { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_move() {
        let cmd = PlayerCommand::parse(&json!({"command": "MOVE", "unit": 7, "dir": "N"})).unwrap();
        assert_eq!(
            cmd,
            PlayerCommand::Move {
                unit: 7,
                direction: Ok(Direction::North)
            }
        );
        assert_eq!(cmd.kind(), CommandKind::Move);
        assert_eq!(cmd.unit(), Some(7));
    }

    #[test]
    fn test_kind_is_case_insensitive() {
        let cmd = PlayerCommand::parse(&json!({"command": "gather", "unit": 1, "dir": "e"})).unwrap();
        assert_eq!(cmd.kind(), CommandKind::Gather);
    }

    #[test]
    fn test_bad_direction_is_kept_for_recovery() {
        let cmd = PlayerCommand::parse(&json!({"command": "MOVE", "unit": 7, "dir": "up"})).unwrap();
        assert_eq!(
            cmd,
            PlayerCommand::Move {
                unit: 7,
                direction: Err(InvalidDirection(Some("up".into())))
            }
        );

        let cmd = PlayerCommand::parse(&json!({"command": "MOVE", "unit": 7})).unwrap();
        assert!(matches!(
            cmd,
            PlayerCommand::Move {
                direction: Err(InvalidDirection(None)),
                ..
            }
        ));
    }

    #[test]
    fn test_missing_kind_and_unknown_kind() {
        assert_eq!(
            PlayerCommand::parse(&json!({"unit": 7})),
            Err(CommandParseError::MissingKind)
        );
        assert_eq!(
            PlayerCommand::parse(&json!({"command": "DANCE"})),
            Err(CommandParseError::UnknownKind("DANCE".into()))
        );
    }

    #[test]
    fn test_missing_required_field() {
        assert_eq!(
            PlayerCommand::parse(&json!({"command": "SHOOT", "unit": 1, "dx": 2})),
            Err(CommandParseError::MissingField {
                kind: CommandKind::Shoot,
                field: "dy"
            })
        );
        assert_eq!(
            PlayerCommand::parse(&json!({"command": "CREATE"})),
            Err(CommandParseError::MissingField {
                kind: CommandKind::Create,
                field: "type"
            })
        );
    }

    #[test]
    fn test_wrong_field_type_is_invalid_record() {
        let result = PlayerCommand::parse(&json!({"command": "MOVE", "unit": "seven", "dir": "N"}));
        assert!(matches!(result, Err(CommandParseError::InvalidRecord(_))));
        assert!(matches!(
            PlayerCommand::parse(&json!("MOVE")),
            Err(CommandParseError::InvalidRecord(_))
        ));
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let cmd = PlayerCommand::parse(&json!({
            "command": "IDENTIFY",
            "name": "Alpha",
            "color": "red"
        }))
        .unwrap();
        assert_eq!(
            cmd,
            PlayerCommand::Identify {
                name: "Alpha".into(),
                unit: None
            }
        );
    }

    #[test]
    fn test_message_from_payload_ignores_client_identity() {
        let msg = InboundMessage::from_payload(
            PlayerId::new("P1"),
            r#"{"connection_id":"P2","commands":[{"command":"CREATE","type":"worker"}]}"#,
        )
        .unwrap();
        assert_eq!(msg.connection_id, PlayerId::new("P1"));
        assert_eq!(msg.commands.len(), 1);
    }

    #[test]
    fn test_message_null_commands() {
        let msg = InboundMessage::from_json(r#"{"connection_id":"P1","commands":null}"#).unwrap();
        assert!(msg.commands.is_empty());
        let msg = InboundMessage::from_json(r#"{"connection_id":"P1"}"#).unwrap();
        assert!(msg.commands.is_empty());
    }

    #[test]
    fn test_message_json_roundtrip() {
        let msg = InboundMessage::new("P1", vec![json!({"command": "MOVE", "unit": 3, "dir": "S"})]);
        let line = msg.to_json().unwrap();
        assert_eq!(InboundMessage::from_json(&line).unwrap(), msg);
    }
}
