use lumen_common::{ChannelKind, ChannelTarget};
use thiserror::Error;
use tracing::{debug, error, info, trace, warn};

#[derive(Debug, Error)]
#[error("GPIO {0} is not a usable PWM output pin")]
pub struct InvalidPin(u8);

/// One LEDC output. The host build tracks duty writes in memory; the ESP32
/// LEDC peripheral hooks in here.
#[derive(Debug)]
pub struct PwmOutput {
    pin: u8,
    max_duty: u32,
    duty: u32,
}

impl PwmOutput {
    fn new(pin: u8, freq_hz: u32, max_duty: u32) -> Result<Self, InvalidPin> {
        // ESP32 output-capable pins; 34-39 are input only and 20/24/28-31
        // do not exist on the package.
        if pin > 33 || matches!(pin, 20 | 24 | 28..=31) {
            return Err(InvalidPin(pin));
        }
        debug!("LEDC timer at {freq_hz} Hz on GPIO {pin}");
        Ok(Self {
            pin,
            max_duty,
            duty: 0,
        })
    }

    fn set_duty(&mut self, duty: u32) {
        self.duty = duty;
        trace!(pin = self.pin, duty = self.duty, "duty updated");
    }
}

/// Driver for one dimmable channel. Wired common anode: logical 0%
/// brightness is max raw duty, 100% is raw duty 0.
pub struct LightChannel {
    kind: ChannelKind,
    output: Option<PwmOutput>,
    applied: ChannelTarget,
}

impl LightChannel {
    pub fn new(kind: ChannelKind, pin: u8, freq_hz: u32, max_duty: u32) -> Self {
        let output = match PwmOutput::new(pin, freq_hz, max_duty) {
            Ok(mut output) => {
                // Dark at startup.
                output.set_duty(max_duty);
                info!("initialized PWM for {} (GPIO {pin})", kind.label());
                Some(output)
            }
            Err(err) => {
                error!("error initializing PWM for {}: {err}", kind.label());
                None
            }
        };
        Self {
            kind,
            output,
            applied: ChannelTarget::default(),
        }
    }

    /// Drives the channel to `level` percent. Returns false instead of
    /// failing hard when the channel never initialized or the level is out
    /// of range.
    pub fn set_brightness(&mut self, level: i64) -> bool {
        let Some(output) = self.output.as_mut() else {
            warn!("{} PWM not initialized", self.kind.label());
            return false;
        };
        if !(0..=100).contains(&level) {
            warn!("invalid brightness level for {}: {level}", self.kind.label());
            return false;
        }

        let inverted = (100 - level) as u32;
        let duty = inverted * output.max_duty / 100;
        output.set_duty(duty);
        debug!(
            "set {} brightness to {level}% (common anode duty={duty})",
            self.kind.label()
        );
        true
    }

    pub fn on(&mut self) -> bool {
        self.set_brightness(100)
    }

    pub fn off(&mut self) -> bool {
        self.set_brightness(0)
    }

    /// Writes a resolved target whole. Reapplying an unchanged target is
    /// idempotent and always safe.
    pub fn apply_target(&mut self, target: ChannelTarget) {
        let ok = if target.active {
            self.set_brightness(i64::from(target.brightness))
        } else {
            self.off()
        };
        if !ok {
            return;
        }
        if self.applied != target {
            if target.active {
                info!("{} now at {}%", self.kind.label(), target.brightness);
            } else {
                info!("{} now off", self.kind.label());
            }
        }
        self.applied = target;
    }

    #[cfg(test)]
    pub fn applied(&self) -> ChannelTarget {
        self.applied
    }

    #[cfg(test)]
    pub fn current_duty(&self) -> Option<u32> {
        self.output.as_ref().map(|output| output.duty)
    }
}
