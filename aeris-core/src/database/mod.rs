//! Database layer: pool construction and the repositories that move
//! normalized rows into the `airquality` schema.

mod copy;
mod measurements;
mod postgres;
mod sampling_points;
mod stations;

pub use copy::CopyBuffer;
pub use measurements::MeasurementsRepository;
pub use postgres::{Database, PoolStats};
pub use sampling_points::SamplingPointsRepository;
pub use stations::StationsRepository;
