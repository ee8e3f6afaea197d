// cadence - named async jobs that run once or on a fixed gap
//
// Jobs wrap async work behind one completion contract. A runner keeps at
// most one run per job name in flight and can reschedule a job after each
// run until it is stopped, softly or by force.

// Re-export the job API
pub use cadence_jobs::*;

// Re-export logging
pub use cadence_log;
pub use cadence_log::Logger;

// Prelude for common imports
pub mod prelude {
    pub use cadence_jobs::prelude::*;
    pub use cadence_log::Logger;
}
