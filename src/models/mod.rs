mod analysis;
mod message;
mod operation_log;
mod position;
mod report;

pub use analysis::AnalysisResult;
pub use message::{IngestMessage, Message};
pub use operation_log::OperationLog;
pub use position::{NewPosition, Position, UpdatePositionRequest};
pub use report::{
    GenerateReport, RejectRequest, Report, STATUS_APPROVED, STATUS_PENDING, STATUS_REJECTED,
};
