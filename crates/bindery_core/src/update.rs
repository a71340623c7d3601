use bindery_logging::{bindery_debug, bindery_warn};

use crate::{Effect, Msg, QueueState};

/// Pure update function: applies a message to state and returns any effects.
///
/// Slot accounting happens here and only here. A job is counted as running
/// from the moment its `Effect::Start` is emitted, so callers that serialize
/// calls to `update` can never over-admit.
pub fn update(mut state: QueueState, msg: Msg) -> (QueueState, Vec<Effect>) {
    let effects = match msg {
        Msg::Submitted { job_id } => {
            if state.is_active(&job_id) {
                return (state, vec![Effect::Rejected { job_id }]);
            }
            state.enqueue(job_id);
            start_effects(&mut state)
        }
        Msg::Finished { job_id, outcome } => {
            if state.finish(&job_id, outcome) {
                bindery_debug!(
                    "Slot freed by {}; running={} waiting={}",
                    job_id,
                    state.running_count(),
                    state.waiting_count()
                );
                start_effects(&mut state)
            } else {
                bindery_warn!("Ignoring completion for job {} which is not running", job_id);
                Vec::new()
            }
        }
    };

    (state, effects)
}

fn start_effects(state: &mut QueueState) -> Vec<Effect> {
    state
        .admit()
        .into_iter()
        .map(|job_id| Effect::Start { job_id })
        .collect()
}
