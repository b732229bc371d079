//! # Command Encoder
//!
//! Serialises commands sent from the host to the acquisition board.

use std::fmt;

use super::message::LINE_TERMINATOR;

/// Outbound command understood by the board's firmware
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// `E<idx>` - start streaming a channel
    Enable(u8),

    /// `D<idx>` - stop streaming a channel
    Disable(u8),

    /// `LON<idx>` - channel indicator on
    IndicatorOn(u8),

    /// `LOFF<idx>` - channel indicator off
    IndicatorOff(u8),

    /// `LBLINK<idx>` - channel indicator blinking
    IndicatorBlink(u8),

    /// `R<idx>,<value>` - set full-scale range in mm
    SetRange { channel: u8, range: f64 },

    /// `C` - enter the calibration menu
    Calibrate,

    /// Bare digit selecting a channel inside the calibration menu
    SelectChannel(u8),

    /// `S` - save calibration and leave the menu
    Save,

    /// Bare line terminator, answers "press ENTER" prompts
    Confirm,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Enable(idx) => write!(f, "E{}", idx),
            Command::Disable(idx) => write!(f, "D{}", idx),
            Command::IndicatorOn(idx) => write!(f, "LON{}", idx),
            Command::IndicatorOff(idx) => write!(f, "LOFF{}", idx),
            Command::IndicatorBlink(idx) => write!(f, "LBLINK{}", idx),
            Command::SetRange { channel, range } => write!(f, "R{},{}", channel, range),
            Command::Calibrate => f.write_str("C"),
            Command::SelectChannel(idx) => write!(f, "{}", idx),
            Command::Save => f.write_str("S"),
            Command::Confirm => Ok(()),
        }
    }
}

impl Command {
    /// Channel the command addresses, if any
    pub fn channel(&self) -> Option<u8> {
        match *self {
            Command::Enable(idx)
            | Command::Disable(idx)
            | Command::IndicatorOn(idx)
            | Command::IndicatorOff(idx)
            | Command::IndicatorBlink(idx)
            | Command::SelectChannel(idx) => Some(idx),
            Command::SetRange { channel, .. } => Some(channel),
            Command::Calibrate | Command::Save | Command::Confirm => None,
        }
    }
}

/// Terminate a command line for the wire
///
/// # Examples
///
/// ```
/// use transducer_monitor::protocol::encoder::encode_line;
///
/// assert_eq!(encode_line("R1,50"), b"R1,50\n".to_vec());
/// assert_eq!(encode_line(""), b"\n".to_vec());
/// ```
pub fn encode_line(text: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(text.len() + LINE_TERMINATOR.len());
    bytes.extend_from_slice(text.as_bytes());
    bytes.extend_from_slice(LINE_TERMINATOR.as_bytes());
    bytes
}

/// Encode a command into the bytes written to the port
pub fn encode_command(command: &Command) -> Vec<u8> {
    encode_line(&command.to_string())
}
