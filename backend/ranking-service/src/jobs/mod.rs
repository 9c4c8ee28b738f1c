// ============================================
// Background Jobs Module
// ============================================
//
// Position recomputation runs outside the request that changed the listing:
// 1. A mutation (review change, city reassignment, state transition) calls the trigger
// 2. The trigger hands a RecomputeJob descriptor to a JobQueue and returns
// 3. A RecomputeWorker drains the queue and recomputes each listing
//
// Duplicate jobs for one listing are fine: inputs are read fresh on every
// run and the last write wins. Failed jobs are logged and not retried.

pub mod recompute;

pub use recompute::{
    AsyncRecomputeTrigger, JobQueue, RecomputeStats, RecomputeWorker, RedisJobQueue,
    TokioJobQueue,
};
