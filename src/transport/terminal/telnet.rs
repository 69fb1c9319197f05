// Telnet option handling. Devices open with a burst of negotiations; we accept the
// server echoing and suppressing go-ahead and refuse everything else.

const IAC: u8 = 255;
const DONT: u8 = 254;
const DO: u8 = 253;
const WONT: u8 = 252;
const WILL: u8 = 251;
const SB: u8 = 250;
const SE: u8 = 240;

const OPT_ECHO: u8 = 1;
const OPT_SGA: u8 = 3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum State {
    #[default]
    Data,
    Iac,
    Verb(u8),
    Sub,
    SubIac,
}

/// Splits the inbound byte stream into payload bytes and negotiation replies.
#[derive(Debug, Default)]
pub struct TelnetFilter {
    state: State,
}

impl TelnetFilter {
    /// Feeds one inbound byte. Returns the payload byte, if any; negotiation answers are
    /// appended to `reply` and must be written back to the peer.
    pub fn feed(&mut self, byte: u8, reply: &mut Vec<u8>) -> Option<u8> {
        match self.state {
            State::Data => {
                if byte == IAC {
                    self.state = State::Iac;
                    None
                } else {
                    Some(byte)
                }
            }
            State::Iac => match byte {
                IAC => {
                    self.state = State::Data;
                    Some(IAC)
                }
                DO | DONT | WILL | WONT => {
                    self.state = State::Verb(byte);
                    None
                }
                SB => {
                    self.state = State::Sub;
                    None
                }
                _ => {
                    // NOP, GA, AYT...
                    self.state = State::Data;
                    None
                }
            },
            State::Verb(verb) => {
                self.state = State::Data;
                match verb {
                    DO => reply.extend_from_slice(&[IAC, if byte == OPT_SGA { WILL } else { WONT }, byte]),
                    WILL => reply.extend_from_slice(&[
                        IAC,
                        if byte == OPT_ECHO || byte == OPT_SGA { DO } else { DONT },
                        byte,
                    ]),
                    _ => {}
                }
                None
            }
            State::Sub => {
                if byte == IAC {
                    self.state = State::SubIac;
                }
                None
            }
            State::SubIac => {
                self.state = if byte == SE { State::Data } else { State::Sub };
                None
            }
        }
    }
}
