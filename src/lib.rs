//! Sales intelligence API: CNPJ smart-search, company enrichment,
//! tech-stack detection and digital maturity scoring for Brazilian
//! B2B prospecting.

pub mod cache;
pub mod circuit_breaker;
pub mod config;
pub mod context;
pub mod db;
pub mod enrichment;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod resilience;
pub mod scorer;
pub mod services;
pub mod storage;
pub mod tech_detector;
pub mod validation;
