pub mod dify;
pub mod workflow_gateway;
