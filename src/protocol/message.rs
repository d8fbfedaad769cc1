use std::fmt;

/// Prefix of a raw send command
pub const CMD_SEND: &str = "s";
/// Prefix the relay uses to report a received raw buffer
pub const CMD_RECEIVE: &str = "r";
/// Prefix of the channel/group/power command
pub const CMD_TUNE: &str = "cgp";

/// Arguments of a `cgp:` command; `None` leaves the setting unchanged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CgpArgs {
    /// New channel
    pub channel: Option<u8>,
    /// New group
    pub group: Option<u8>,
    /// New transmit power
    pub power: Option<u8>,
}

impl CgpArgs {
    /// Parses positional `<channel|.> <group|.> <power|.>` tokens
    ///
    /// A `.`, an unparseable token or a missing trailing token all mean
    /// "leave unchanged".
    pub fn parse(text: &str) -> Self {
        let mut tokens = text.split_whitespace().map(|token| token.parse::<u8>().ok());
        CgpArgs {
            channel: tokens.next().flatten(),
            group: tokens.next().flatten(),
            power: tokens.next().flatten(),
        }
    }

    /// Whether the command changes nothing
    pub fn is_empty(&self) -> bool {
        self.channel.is_none() && self.group.is_none() && self.power.is_none()
    }
}

impl fmt::Display for CgpArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = |value: Option<u8>| value.map_or_else(|| ".".to_string(), |v| v.to_string());
        write!(
            f,
            "{} {} {}",
            token(self.channel),
            token(self.group),
            token(self.power)
        )
    }
}

/// One line of the relay's text link
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkLine {
    /// `s: <hex>`: transmit raw bytes
    Send(Vec<u8>),
    /// `r: <hex>`: a raw buffer received from the radio
    Received(Vec<u8>),
    /// `cgp: <channel> <group> <power>`
    Tune(CgpArgs),
    /// A known command whose argument could not be decoded
    Malformed {
        /// The offending line
        line: String,
        /// Why it was rejected
        reason: String,
    },
    /// Any other `<command>: <data>` line
    Other {
        /// Lower-cased command prefix
        command: String,
        /// Text after the colon
        data: String,
    },
    /// Free text without a command prefix
    Log(String),
}

impl LinkLine {
    /// Parses a single line (without its terminator)
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        let Some((prefix, rest)) = text.split_once(':') else {
            return LinkLine::Log(text.to_string());
        };
        let command = prefix.trim().to_ascii_lowercase();
        let rest = rest.trim();

        match command.as_str() {
            CMD_SEND | CMD_RECEIVE => {
                let cleaned: String = rest.split_whitespace().collect();
                match hex::decode(&cleaned) {
                    Ok(bytes) if command == CMD_SEND => LinkLine::Send(bytes),
                    Ok(bytes) => LinkLine::Received(bytes),
                    Err(e) => LinkLine::Malformed {
                        line: text.to_string(),
                        reason: e.to_string(),
                    },
                }
            }
            CMD_TUNE => LinkLine::Tune(CgpArgs::parse(rest)),
            "" => LinkLine::Log(text.to_string()),
            _ => LinkLine::Other {
                command,
                data: rest.to_string(),
            },
        }
    }
}

impl fmt::Display for LinkLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkLine::Send(bytes) => write!(f, "{}: {}", CMD_SEND, hex::encode(bytes)),
            LinkLine::Received(bytes) => write!(f, "{}: {}", CMD_RECEIVE, hex::encode(bytes)),
            LinkLine::Tune(args) => write!(f, "{}: {}", CMD_TUNE, args),
            LinkLine::Malformed { line, .. } => write!(f, "{}", line),
            LinkLine::Other { command, data } => write!(f, "{}: {}", command, data),
            LinkLine::Log(text) => write!(f, "{}", text),
        }
    }
}
