pub mod config;
pub mod schedule;
pub mod types;

pub use config::ControllerConfig;
pub use schedule::{
    parse_time_to_minutes, resolve, ChannelTarget, LightTargets, LightType, ScheduleRecord,
};
pub use types::{ChannelKind, RegistrationPayload};
