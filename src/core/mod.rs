pub mod capacity;
pub mod domain;
pub mod ordering;
pub mod pool_view;
pub mod resolver;
pub mod telemetry;
