// Domain layer: models and ports. Adapters live under `adapters`, orchestration under `core`.

pub mod model;
pub mod ports;
