pub mod comparison_service;
pub mod consolidation_service;
