pub mod contract_service;
pub mod session_store;
