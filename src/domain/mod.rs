// Domain layer: contact model and ports. Concrete backends live under adapters.

pub mod model;
pub mod ports;
