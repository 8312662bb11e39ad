pub mod aggregation_service;
pub mod metrics_service;
pub mod mutation_service;
