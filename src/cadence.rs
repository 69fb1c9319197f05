// Wall-clock decimation of ONU sub-measurements. Keyed off the current minute, not off
// any stored last-run time: a run at minute 6 takes optical power whether or not minute 1 ran.

/// ONU telemetry classes and how often they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubtaskClass {
    /// Every invocation.
    Status,
    /// `(minute - 1) mod 5 == 0`.
    OpticalPower,
    /// `(minute - 2) mod 30 == 0`.
    Serial,
    /// `minute mod 30 == 0`.
    Name,
}

pub fn should_run(class: SubtaskClass, minute: u32) -> bool {
    let minute = minute as i32;
    match class {
        SubtaskClass::Status => true,
        SubtaskClass::OpticalPower => (minute - 1) % 5 == 0,
        SubtaskClass::Serial => (minute - 2) % 30 == 0,
        SubtaskClass::Name => minute % 30 == 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optical_power_every_five() {
        let fired: Vec<u32> = (0..60).filter(|m| should_run(SubtaskClass::OpticalPower, *m)).collect();
        assert_eq!(fired, vec![1, 6, 11, 16, 21, 26, 31, 36, 41, 46, 51, 56]);
        for m in [5, 10, 35] {
            assert!(!should_run(SubtaskClass::OpticalPower, m));
        }
    }

    #[test]
    fn serial_and_name_every_thirty() {
        let serial: Vec<u32> = (0..60).filter(|m| should_run(SubtaskClass::Serial, *m)).collect();
        assert_eq!(serial, vec![2, 32]);
        let name: Vec<u32> = (0..60).filter(|m| should_run(SubtaskClass::Name, *m)).collect();
        assert_eq!(name, vec![0, 30]);
    }

    #[test]
    fn status_always() {
        assert!((0..60).all(|m| should_run(SubtaskClass::Status, m)));
    }
}
