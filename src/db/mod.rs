pub mod message_queries;
pub mod operation_log_queries;
pub mod position_queries;
pub mod report_queries;
