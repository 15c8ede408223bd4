use thiserror::Error;

use crate::Entity;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("The entity {0} does not exist or has been deleted.")]
    StaleHandle(Entity),
    #[error("The entity id: {} is missing {missing}", .entity.id())]
    MissingComponent { entity: Entity, missing: String },
    #[error("relation not found. key '{key}' id: {}", .entity.id())]
    MissingRelationKey { entity: Entity, key: String },
    #[error("{0}")]
    InvalidBatchUsage(&'static str),
    #[error("The entity id: {0} is already in use")]
    EntityOccupied(u32),
    #[error("{0} is not a valid entity id")]
    InvalidId(u32),
    #[error("Adding {child} as a child of {parent} would create a cycle")]
    HierarchyCycle { parent: Entity, child: Entity },
}

pub type Result<T> = std::result::Result<T, Error>;
