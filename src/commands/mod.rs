pub mod echo;
pub mod executable;
pub mod get;
pub mod info;
pub mod ping;
pub mod set;

use bytes::Bytes;
use std::{str, vec};
use thiserror::Error as ThisError;
use tokio::time::Instant;

use crate::commands::executable::{Context, Executable};
use crate::frame::Frame;
use crate::Error;

use echo::Echo;
use get::Get;
use info::Info;
use ping::Ping;
use set::Set;

#[derive(Debug, PartialEq)]
pub enum Command {
    Echo(Echo),
    Get(Get),
    Set(Set),

    Info(Info),
    Ping(Ping),
}

impl Executable for Command {
    fn exec(self, ctx: &Context) -> Result<Frame, Error> {
        match self {
            Command::Echo(cmd) => cmd.exec(ctx),
            Command::Get(cmd) => cmd.exec(ctx),
            Command::Info(cmd) => cmd.exec(ctx),
            Command::Ping(cmd) => cmd.exec(ctx),
            Command::Set(cmd) => cmd.exec(ctx),
        }
    }
}

impl Command {
    /// Builds a command out of a request frame. `now` is the instant relative expirations are
    /// resolved against.
    pub fn parse(frame: Frame, now: Instant) -> Result<Command, CommandParserError> {
        // Clients send commands to the Redis server as RESP arrays of bulk strings.
        let frames = match frame {
            Frame::Array(array) if !array.is_empty() => array,
            frame => {
                return Err(CommandParserError::InvalidShape {
                    actual: frame.type_name(),
                })
            }
        };

        let parts = frames
            .into_iter()
            .map(|frame| match frame {
                Frame::Bulk(bytes) => Ok(bytes),
                frame => Err(CommandParserError::InvalidShape {
                    actual: frame.type_name(),
                }),
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut parts = parts.into_iter();
        let command_name = parts
            .next()
            .map(|name| String::from_utf8_lossy(&name).to_lowercase())
            .unwrap_or_default();

        let parser = &mut CommandParser {
            command: command_name.clone(),
            parts,
            now,
        };

        match &command_name[..] {
            "echo" => Echo::try_from(parser).map(Command::Echo),
            "get" => Get::try_from(parser).map(Command::Get),
            "info" => Info::try_from(parser).map(Command::Info),
            "ping" => Ping::try_from(parser).map(Command::Ping),
            "set" => Set::try_from(parser).map(Command::Set),
            _ => Err(CommandParserError::UnknownCommand {
                command: command_name,
            }),
        }
    }
}

impl TryFrom<Frame> for Command {
    type Error = CommandParserError;

    fn try_from(frame: Frame) -> Result<Self, Self::Error> {
        Command::parse(frame, Instant::now())
    }
}

pub struct CommandParser {
    command: String,
    parts: vec::IntoIter<Bytes>,
    now: Instant,
}

impl CommandParser {
    pub fn now(&self) -> Instant {
        self.now
    }

    /// Running out of arguments is an arity error for the command being parsed.
    pub fn next_bytes(&mut self) -> Result<Bytes, CommandParserError> {
        self.parts.next().ok_or_else(|| self.wrong_arity())
    }

    pub fn next_string(&mut self) -> Result<String, CommandParserError> {
        let bytes = self.next_bytes()?;
        Ok(str::from_utf8(&bytes[..])?.to_string())
    }

    /// Returns the next argument, if any, for commands with optional trailing arguments.
    pub fn next_optional(&mut self) -> Option<Bytes> {
        self.parts.next()
    }

    /// Fails if arguments are left over.
    pub fn finish(&mut self) -> Result<(), CommandParserError> {
        match self.parts.next() {
            Some(_) => Err(self.wrong_arity()),
            None => Ok(()),
        }
    }

    fn wrong_arity(&self) -> CommandParserError {
        CommandParserError::WrongArity {
            command: self.command.clone(),
        }
    }
}

#[derive(Debug, ThisError, PartialEq)]
pub enum CommandParserError {
    #[error("ERR Protocol error: expected a non-empty array of bulk strings, got {actual}")]
    InvalidShape { actual: &'static str },
    #[error("ERR wrong number of arguments for '{command}' command")]
    WrongArity { command: String },
    #[error("ERR unknown command '{command}'")]
    UnknownCommand { command: String },
    #[error("ERR syntax error")]
    InvalidOption { command: String, option: String },
    #[error("ERR value is not an integer or out of range")]
    InvalidExpiry { value: String },
    #[error("ERR invalid UTF-8 string")]
    InvalidUtf8(#[from] str::Utf8Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(parts: &[&str]) -> Frame {
        Frame::Array(
            parts
                .iter()
                .map(|part| Frame::Bulk(Bytes::copy_from_slice(part.as_bytes())))
                .collect(),
        )
    }

    #[test]
    fn parse_get_command() {
        let get_command = Command::try_from(request(&["GET", "foo"])).unwrap();

        assert_eq!(
            get_command,
            Command::Get(Get {
                key: String::from("foo")
            })
        );
    }

    #[test]
    fn command_names_are_case_insensitive() {
        for name in ["ping", "PING", "Ping", "pInG"] {
            assert_eq!(
                Command::try_from(request(&[name])).unwrap(),
                Command::Ping(Ping)
            );
        }
    }

    #[test]
    fn parse_set_command() {
        let set_command = Command::try_from(request(&["SET", "foo", "baz"])).unwrap();

        assert_eq!(
            set_command,
            Command::Set(Set {
                key: String::from("foo"),
                value: Bytes::from("baz"),
                expires_at: None,
            })
        );
    }

    #[test]
    fn top_level_frame_must_be_an_array() {
        let err = Command::try_from(Frame::Simple("PING".to_string())).unwrap_err();

        assert_eq!(
            err,
            CommandParserError::InvalidShape {
                actual: "simple string"
            }
        );
    }

    #[test]
    fn empty_array_is_rejected() {
        let err = Command::try_from(Frame::Array(vec![])).unwrap_err();

        assert_eq!(
            err,
            CommandParserError::InvalidShape { actual: "array" }
        );
    }

    #[test]
    fn every_element_must_be_a_bulk_string() {
        let frame = Frame::Array(vec![
            Frame::Bulk(Bytes::from("GET")),
            Frame::Integer(42),
        ]);

        let err = Command::try_from(frame).unwrap_err();

        assert_eq!(
            err,
            CommandParserError::InvalidShape { actual: "integer" }
        );

        let frame = Frame::Array(vec![Frame::Simple("PING".to_string())]);
        assert!(matches!(
            Command::try_from(frame),
            Err(CommandParserError::InvalidShape { .. })
        ));
    }

    #[test]
    fn invalid_shape_message_names_only_the_frame_type() {
        let payload = "x".repeat(10_000);
        let err = Command::try_from(Frame::Bulk(Bytes::from(payload))).unwrap_err();

        assert_eq!(
            err.to_string(),
            "ERR Protocol error: expected a non-empty array of bulk strings, got bulk string"
        );
    }

    #[test]
    fn unknown_command() {
        let err = Command::try_from(request(&["FLUSHALL", "ASYNC"])).unwrap_err();

        assert_eq!(
            err,
            CommandParserError::UnknownCommand {
                command: "flushall".to_string()
            }
        );
        assert_eq!(err.to_string(), "ERR unknown command 'flushall'");
    }

    #[test]
    fn invalid_utf8_key() {
        let frame = Frame::Array(vec![
            Frame::Bulk(Bytes::from("GET")),
            Frame::Bulk(Bytes::from_static(b"\xff\xfe")),
        ]);

        assert!(matches!(
            Command::try_from(frame),
            Err(CommandParserError::InvalidUtf8(_))
        ));
    }
}
