pub mod analysis_service;
pub mod audit;
pub mod output_parser;
pub mod plan;
pub mod review_service;
pub mod sentinel;
pub mod text;
pub mod validator;
pub mod workflow_invoker;
