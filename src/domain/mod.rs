// Domain layer: the typed table, report models and ports (interfaces).

pub mod model;
pub mod ports;
pub mod table;
