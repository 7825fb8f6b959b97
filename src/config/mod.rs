//! Configuration for the cadence engine.

mod settings;

pub use settings::{
    CalendarConfig, Config, EngineDefaults, SchedulerConfig, WorkingHoursConfig,
};
