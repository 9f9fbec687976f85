pub mod driver;
pub mod eligibility;
pub mod ordering;
pub mod rotation;
pub mod timers;
pub mod transition;
