use thiserror::Error;

use crate::{
    events::{EventInstanceId, EventState},
    wallet::ResourceCost,
};

/// Failures surfaced by the simulation facade and the stores behind it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MetaError {
    #[error("unknown character '{0}'")]
    InvalidCharacter(String),
    #[error("unknown stat '{0}'")]
    InvalidStat(String),
    #[error("insufficient resources: need {required}, have {available}")]
    InsufficientResources {
        required: ResourceCost,
        available: ResourceCost,
    },
    #[error("event {0} not found")]
    EventNotFound(EventInstanceId),
    #[error("event {id} already {state:?}")]
    EventAlreadyResolved {
        id: EventInstanceId,
        state: EventState,
    },
    #[error("event {event} has no response '{response}'")]
    ResponseNotFound {
        event: EventInstanceId,
        response: String,
    },
    #[error("unknown event definition '{0}'")]
    UnknownEventDefinition(String),
    #[error("configuration invariant violated: {0}")]
    ConfigurationInvariantViolated(String),
}
