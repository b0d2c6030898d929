// Domain layer - payload access, aggregation and buffer primitives
pub mod aggregation;
pub mod bucketing;
pub mod conversion;
pub mod dashboard;
pub mod gauge;
pub mod measurement;
pub mod series;
pub mod telemetry;
