pub mod compose;
pub mod ledger;
pub mod notify;
pub mod orchestrator;
pub mod report;
pub mod stage;
pub mod submission;

pub use compose::LeadResponse;
pub use orchestrator::{LeadPipeline, process_submission};
pub use stage::StageResult;
pub use submission::{CalculatorInputs, Submission, parse_submission};
