// indicator.rs

use embedded_hal::{delay::DelayNs, digital::OutputPin};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pattern {
    pub count: u32,
    pub duty: f32,
}

pub const TRYING: Pattern = Pattern { count: 1, duty: 0.9 };
pub const SETTLE: Pattern = Pattern { count: 1, duty: 0.9 };
pub const CONNECTED: Pattern = Pattern { count: 3, duty: 0.5 };
pub const POLL_WAIT: Pattern = Pattern { count: 60, duty: 0.2 };
pub const EXITING: Pattern = Pattern { count: 1, duty: 0.01 };
pub const FAULT: Pattern = Pattern { count: 3, duty: 0.1 };

pub const DEFAULT_UNIT_MS: u32 = 1000;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Duty(f32);

impl Duty {
    pub fn new(duty: f32) -> Self {
        // above 1.0 it is a percentage
        let d = if duty > 1.0 { duty / 100.0 } else { duty };
        // NaN falls through both comparisons
        if d >= 0.0 {
            Duty(d.min(1.0))
        } else {
            Duty(0.0)
        }
    }

    pub fn fraction(self) -> f32 {
        self.0
    }

    /// Split one period of `unit_ms` into (on, off) milliseconds.
    /// The two halves always add up to `unit_ms`.
    pub fn split(self, unit_ms: u32) -> (u32, u32) {
        let on = ((unit_ms as f32) * self.0).round() as u32;
        let on = on.min(unit_ms);
        (on, unit_ms - on)
    }
}

/// Status LED. Every call blocks for the whole pattern and leaves the LED off.
pub struct Indicator<P, D> {
    pin: P,
    delay: D,
    unit_ms: u32,
}

impl<P, D> Indicator<P, D>
where
    P: OutputPin,
    D: DelayNs,
{
    pub fn new(mut pin: P, delay: D, unit_ms: u32) -> Self {
        pin.set_low().ok();
        Indicator {
            pin,
            delay,
            unit_ms,
        }
    }

    pub fn pulse(&mut self, count: u32, duty: f32) {
        let (on_ms, off_ms) = Duty::new(duty).split(self.unit_ms);
        for _ in 0..count {
            if on_ms > 0 {
                self.pin.set_high().ok();
                self.delay.delay_ms(on_ms);
            }
            self.pin.set_low().ok();
            if off_ms > 0 {
                self.delay.delay_ms(off_ms);
            }
        }
        self.pin.set_low().ok();
    }

    pub fn show(&mut self, pattern: Pattern) {
        self.pulse(pattern.count, pattern.duty);
    }

    pub fn rest(&mut self, units: u32) {
        self.pin.set_low().ok();
        for _ in 0..units {
            self.delay.delay_ms(self.unit_ms);
        }
    }

    pub fn release(self) -> (P, D) {
        (self.pin, self.delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_duty_is_normalized() {
        assert_eq!(Duty::new(50.0), Duty::new(0.5));
        assert_eq!(Duty::new(90.0).fraction(), 0.9);
        assert_eq!(Duty::new(1.0).fraction(), 1.0);
    }

    #[test]
    fn duty_is_clamped() {
        assert_eq!(Duty::new(-0.3).fraction(), 0.0);
        assert_eq!(Duty::new(f32::NAN).fraction(), 0.0);
        assert_eq!(Duty::new(250.0).fraction(), 1.0);
    }

    #[test]
    fn split_covers_whole_period() {
        assert_eq!(Duty::new(0.9).split(1000), (900, 100));
        assert_eq!(Duty::new(0.2).split(1000), (200, 800));
        assert_eq!(Duty::new(0.01).split(1000), (10, 990));
        assert_eq!(Duty::new(1.0).split(1000), (1000, 0));
        assert_eq!(Duty::new(0.01).split(10), (0, 10));
    }
}

// EOF
