//! Host-facing parameter table
//!
//! The master core receives parameter updates from a host over a serial
//! link and mirrors the received frame into a buffer of 16-bit words:
//! `[length, serial, code, payload...]` with one payload byte per word.
//! Two frame shapes are understood:
//!
//! * length 5, code `0xB1`: start/stop value built from two bytes;
//! * length 7: overwrite parameter number `serial` with the `f32` built
//!   from four bytes.

/// Number of parameter slots
pub const PARAMETER_COUNT: usize = 118;

/// Command code of the start/stop frame
pub const START_STOP_CODE: u16 = 0xB1;

/// A decoded host frame
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HostCommand {
    /// Start or stop the converter
    StartStop(u16),
    /// Overwrite one parameter
    SetParameter {
        /// Slot number
        index: u16,
        /// New value
        value: f32,
    },
}

impl HostCommand {
    /// Decode a mirrored frame; `None` for a frame of any other shape.
    pub fn decode(frame: &[u16]) -> Option<Self> {
        let (&length, rest) = frame.split_first()?;
        match (length, rest) {
            (5, [_serial, START_STOP_CODE, b0, b1, ..]) => {
                Some(HostCommand::StartStop(u16::from_le_bytes([*b0 as u8, *b1 as u8])))
            }
            (7, [serial, _code, b0, b1, b2, b3, ..]) => Some(HostCommand::SetParameter {
                index: *serial,
                value: f32::from_le_bytes([*b0 as u8, *b1 as u8, *b2 as u8, *b3 as u8]),
            }),
            _ => None,
        }
    }
}

/// The parameter table shared between host link and control core
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterTable {
    values: [f32; PARAMETER_COUNT],
    run: u16,
}

impl Default for ParameterTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ParameterTable {
    /// All parameters zero, stopped
    pub const fn new() -> Self {
        Self {
            values: [0.0; PARAMETER_COUNT],
            run: 0,
        }
    }

    /// Parameter `index`, if it exists
    pub fn get(&self, index: usize) -> Option<f32> {
        self.values.get(index).copied()
    }

    /// Set parameter `index`; false if it does not exist
    pub fn set(&mut self, index: usize, value: f32) -> bool {
        match self.values.get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// All parameters
    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    /// All parameters, mutably
    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.values
    }

    /// Last start/stop value received
    pub fn run_state(&self) -> u16 {
        self.run
    }

    /// Apply a host command; false if it named a slot that does not exist.
    pub fn apply(&mut self, command: &HostCommand) -> bool {
        match *command {
            HostCommand::StartStop(run) => {
                self.run = run;
                true
            }
            HostCommand::SetParameter { index, value } => self.set(usize::from(index), value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_stop_frame() {
        let frame = [5, 0, 0xB1, 0x01, 0x00];
        assert_eq!(HostCommand::decode(&frame), Some(HostCommand::StartStop(1)));
        let frame = [5, 0, 0xB2, 0x01, 0x00];
        assert_eq!(HostCommand::decode(&frame), None);
    }

    #[test]
    fn parameter_frame() {
        let bytes = 2.5f32.to_le_bytes();
        let frame = [
            7,
            12,
            0x10,
            u16::from(bytes[0]),
            u16::from(bytes[1]),
            u16::from(bytes[2]),
            u16::from(bytes[3]),
        ];
        let cmd = HostCommand::decode(&frame).unwrap();
        assert_eq!(
            cmd,
            HostCommand::SetParameter {
                index: 12,
                value: 2.5
            }
        );
        let mut table = ParameterTable::new();
        assert!(table.apply(&cmd));
        assert_eq!(table.get(12), Some(2.5));
    }

    #[test]
    fn out_of_range_slot() {
        let mut table = ParameterTable::new();
        let cmd = HostCommand::SetParameter {
            index: PARAMETER_COUNT as u16,
            value: 1.0,
        };
        assert!(!table.apply(&cmd));
        assert!(table.as_slice().iter().all(|v| *v == 0.0));
        assert_eq!(HostCommand::decode(&[]), None);
        assert_eq!(HostCommand::decode(&[7, 1, 2]), None);
    }
}
