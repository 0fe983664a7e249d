// NOTE: Policy composition rationale
//
// Safeguards are an ordered list of named checks over one evaluation
// context; the first failure short-circuits with its reason. Order is
// load-bearing: quiet hours > cooldown > recent interaction > meeting.
//
// All policy decisions run in the collaborator's local time (quiet
// hours, base wake hours, daily counters). Stream timestamps stay UTC.

mod evaluator;
mod questions;
mod scheduler;
mod sources;
mod triggers;

pub use evaluator::{EvaluationDecision, SafeguardStatus, TriggerEvaluator};
pub use questions::{
    question_stem, stems_similar, QuestionLog, QuestionLogEntry, QUESTION_COOLDOWN_DAYS,
};
pub use scheduler::{
    NextWake, QueueStatus, SchedulerState, SchedulerStatus, WakeDecision, WakeKind, WakeScheduler,
    BASE_WAKE_HOURS, EARLY_WAKE_THRESHOLD, MIN_WAKE_INTERVAL_MIN,
};
pub use sources::{
    CalendarEvent, CalendarSource, CalendarTrigger, EvaluatorSources, MemoryHit, MemorySearch,
    LocationSource, QuestionCandidate, QuestionContext, QuestionSource, WeatherSource,
};
pub use triggers::{escalation_for, Escalation, Trigger, TriggerKind};
