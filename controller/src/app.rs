use std::path::PathBuf;

use lumen_common::{resolve, ChannelKind, ControllerConfig};
use tracing::info;

use crate::clock::WallClock;
use crate::pwm::LightChannel;
use crate::store::ScheduleStore;

const SCHEDULE_FILE: &str = "schedules.json";

/// All mutable controller state. Owned by the server loop and touched from
/// nowhere else, so no locking is needed.
pub struct App {
    pub config: ControllerConfig,
    pub store: ScheduleStore,
    pub clock: WallClock,
    pub warm: LightChannel,
    pub natural: LightChannel,
}

impl App {
    pub fn new(config: ControllerConfig) -> Self {
        let store = ScheduleStore::open(PathBuf::from(&config.data_dir).join(SCHEDULE_FILE));
        let clock = WallClock::new(&config.timezone);
        let warm = LightChannel::new(
            ChannelKind::Warm,
            config.warm_pin,
            config.pwm_freq_hz,
            config.pwm_max_duty,
        );
        let natural = LightChannel::new(
            ChannelKind::Natural,
            config.natural_pin,
            config.pwm_freq_hz,
            config.pwm_max_duty,
        );

        Self {
            config,
            store,
            clock,
            warm,
            natural,
        }
    }

    pub fn channel_mut(&mut self, kind: ChannelKind) -> &mut LightChannel {
        match kind {
            ChannelKind::Warm => &mut self.warm,
            ChannelKind::Natural => &mut self.natural,
        }
    }

    /// One evaluate-and-apply cycle: resolve targets for the current time of
    /// day and write both channels whole. Idempotent, safe to repeat even
    /// when nothing changed.
    pub fn evaluate_and_apply(&mut self) {
        let Some(now_minutes) = self.clock.minutes_since_midnight() else {
            info!("time not synced yet, cannot check schedules");
            return;
        };

        let targets = resolve(self.store.records(), now_minutes);
        self.warm.apply_target(targets.warm);
        self.natural.apply_target(targets.natural);
    }
}
