//! Positional command-line arguments for the server and client.

use std::net::IpAddr;
use std::time::Duration;

use crate::message::{MessageError, SegmentedMessage, MAX_MESSAGE_SIZE};
use crate::strategy::{StrategyKind, UnknownStrategy};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ArgsError {
    #[error("Usage: {program} {usage}")]
    Usage {
        program: String,
        usage: &'static str,
    },
    #[error("invalid {name} '{value}'")]
    InvalidNumber { name: &'static str, value: String },
    #[error("invalid server address '{0}'")]
    InvalidAddr(String),
    #[error(transparent)]
    Message(#[from] MessageError),
    #[error(transparent)]
    Strategy(#[from] UnknownStrategy),
}

pub const SERVER_USAGE: &str = "<msg_size> <threads> <duration> [strategy]";
pub const CLIENT_USAGE: &str = "<ip> <msg_size> <threads> <duration>";

/// `sendpathd <msg_size> <threads> <duration> [strategy]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerArgs {
    pub message_size: usize,
    pub threads: usize,
    pub duration: Duration,
    /// Overrides the configured strategy when present.
    pub strategy: Option<StrategyKind>,
}

/// `sendpath-client <ip> <msg_size> <threads> <duration>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientArgs {
    pub server_ip: IpAddr,
    pub message_size: usize,
    pub threads: usize,
    pub duration: Duration,
}

impl ServerArgs {
    /// Parse from a full argv, program name first.
    pub fn parse<I>(argv: I) -> Result<Self, ArgsError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut argv = argv.into_iter();
        let program = argv.next().unwrap_or_else(|| "sendpathd".to_string());
        let rest: Vec<String> = argv.collect();
        if rest.len() < 3 {
            return Err(ArgsError::Usage {
                program,
                usage: SERVER_USAGE,
            });
        }

        let message_size = parse_number("msg_size", &rest[0])?;
        SegmentedMessage::segment_len_for(message_size)?;
        let strategy = rest.get(3).map(|s| s.parse()).transpose()?;

        Ok(Self {
            message_size,
            threads: parse_number("threads", &rest[1])?,
            duration: Duration::from_secs(parse_number("duration", &rest[2])? as u64),
            strategy,
        })
    }
}

impl ClientArgs {
    /// Parse from a full argv, program name first.
    pub fn parse<I>(argv: I) -> Result<Self, ArgsError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut argv = argv.into_iter();
        let program = argv.next().unwrap_or_else(|| "sendpath-client".to_string());
        let rest: Vec<String> = argv.collect();
        if rest.len() < 4 {
            return Err(ArgsError::Usage {
                program,
                usage: CLIENT_USAGE,
            });
        }

        let server_ip = rest[0]
            .parse()
            .map_err(|_| ArgsError::InvalidAddr(rest[0].clone()))?;
        let message_size = parse_number("msg_size", &rest[1])?;
        if message_size == 0 {
            return Err(MessageError::InvalidSize(0).into());
        }
        if message_size > MAX_MESSAGE_SIZE {
            return Err(MessageError::TooLarge(message_size).into());
        }

        Ok(Self {
            server_ip,
            message_size,
            threads: parse_number("threads", &rest[2])?,
            duration: Duration::from_secs(parse_number("duration", &rest[3])? as u64),
        })
    }
}

fn parse_number(name: &'static str, value: &str) -> Result<usize, ArgsError> {
    value.trim().parse().map_err(|_| ArgsError::InvalidNumber {
        name,
        value: value.to_string(),
    })
}
