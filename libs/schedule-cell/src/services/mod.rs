pub mod generation;
pub mod schedule;
pub mod slot;

pub use generation::{plan_slots, SlotGenerationService};
pub use schedule::ScheduleService;
pub use slot::SlotService;
