pub mod delivery;
pub mod importer;
pub mod mapper;
pub mod mover;
pub mod transformer;

pub use crate::domain::model::{Payload, Record, TransformResult};
pub use crate::domain::ports::{Delivery, ObjectStore};
pub use crate::utils::error::Result;
