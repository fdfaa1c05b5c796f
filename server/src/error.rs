//! Rejections raised while validating client actions.
//!
//! Every variant is recoverable: the session logs it and, where the client has
//! a way to react, answers the requester alone with [`ActionError::notice`].

use crate::session::SessionState;
use shared::{ConnectionId, PowerUpKind, ServerEvent, Symbol, MAX_NAME_LEN};
use thiserror::Error;

pub type ActionResult<T> = Result<T, ActionError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    #[error("{action} is not allowed while the session is {state}")]
    WrongPhase {
        action: &'static str,
        state: SessionState,
    },

    #[error("connection {0} has not joined the session")]
    UnknownPlayer(ConnectionId),

    #[error("no active player holds symbol {0}")]
    UnknownSymbol(Symbol),

    #[error("scan code {0} does not match any catalog entry")]
    UnknownCode(u8),

    #[error("spectator {0} cannot take part in combat")]
    Spectator(ConnectionId),

    #[error("connection {0} has already joined")]
    AlreadyJoined(ConnectionId),

    #[error("the name {0:?} is already taken")]
    DuplicateName(String),

    #[error("display names must be 1 to {} characters long", MAX_NAME_LEN)]
    InvalidName,

    #[error("only the leader may start the session (requested by {0})")]
    NotLeader(ConnectionId),

    #[error("{0} is still active")]
    PowerUpActive(PowerUpKind),

    #[error("{power_up} costs {cost} points but only {points} are available")]
    InsufficientPoints {
        power_up: PowerUpKind,
        cost: u32,
        points: u32,
    },

    #[error("{0} has already been used this session")]
    AlreadyUsed(PowerUpKind),
}

impl ActionError {
    /// The requester-only event that reports this rejection, if the client
    /// has anything to show for it.
    pub fn notice(&self) -> Option<ServerEvent> {
        match self {
            ActionError::InsufficientPoints { power_up, cost, .. } => {
                Some(ServerEvent::FailedPurchase {
                    power_up: *power_up,
                    cost: *cost,
                })
            }
            ActionError::AlreadyUsed(power_up) => Some(ServerEvent::RepeatUse {
                power_up: *power_up,
            }),
            ActionError::DuplicateName(_)
            | ActionError::InvalidName
            | ActionError::AlreadyJoined(_) => Some(ServerEvent::JoinRejected {
                reason: self.to_string(),
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_purchase_rejections_map_to_notices() {
        let err = ActionError::InsufficientPoints {
            power_up: PowerUpKind::Invisibility,
            cost: 10,
            points: 0,
        };
        assert_eq!(
            err.notice(),
            Some(ServerEvent::FailedPurchase {
                power_up: PowerUpKind::Invisibility,
                cost: 10
            })
        );

        let err = ActionError::AlreadyUsed(PowerUpKind::HealthPack);
        assert_eq!(
            err.notice(),
            Some(ServerEvent::RepeatUse {
                power_up: PowerUpKind::HealthPack
            })
        );
    }

    #[test]
    fn test_join_rejection_carries_reason() {
        let err = ActionError::DuplicateName("Ada".to_string());
        match err.notice() {
            Some(ServerEvent::JoinRejected { reason }) => assert!(reason.contains("Ada")),
            other => panic!("unexpected notice {:?}", other),
        }
    }

    #[test]
    fn test_lookup_failures_stay_silent() {
        assert_eq!(ActionError::UnknownSymbol(4).notice(), None);
        assert_eq!(ActionError::UnknownPlayer(9).notice(), None);
        assert_eq!(
            ActionError::PowerUpActive(PowerUpKind::ScoreMultiplier).notice(),
            None
        );
        assert_eq!(
            ActionError::WrongPhase {
                action: "shoot",
                state: SessionState::Lobby
            }
            .notice(),
            None
        );
    }
}
