// Job lifecycle
//
// - model: job and result records with their state transitions
// - repository: persistence seam (memory, JSON files)
// - notify: whole-job failure notification seam
// - progress: serialized owner of a running job's record
// - orchestrator: submit and run jobs across target languages

pub mod model;
pub mod notify;
pub mod orchestrator;
pub mod progress;
pub mod repository;

pub use model::*;
pub use notify::*;
pub use orchestrator::*;
pub use progress::*;
pub use repository::*;
