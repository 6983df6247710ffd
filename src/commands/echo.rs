use bytes::Bytes;

use crate::commands::executable::{Context, Executable};
use crate::commands::{CommandParser, CommandParserError};
use crate::frame::Frame;
use crate::Error;

/// Returns `value` back to the client.
///
/// The reply is a simple string; a value holding a line break cannot be framed that way, so it
/// is sent as a bulk string instead.
///
/// Ref: <https://redis.io/docs/latest/commands/echo>
#[derive(Debug, PartialEq)]
pub struct Echo {
    pub value: String,
}

impl Executable for Echo {
    fn exec(self, _ctx: &Context) -> Result<Frame, Error> {
        if self.value.contains(['\r', '\n']) {
            return Ok(Frame::Bulk(Bytes::from(self.value)));
        }

        Ok(Frame::Simple(self.value))
    }
}

impl TryFrom<&mut CommandParser> for Echo {
    type Error = CommandParserError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let value = parser.next_string()?;
        parser.finish()?;

        Ok(Self { value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::Command;

    #[test]
    fn echo() {
        let frame = Frame::Array(vec![
            Frame::Bulk(Bytes::from("ECHO")),
            Frame::Bulk(Bytes::from("hi")),
        ]);
        let cmd = Command::try_from(frame).unwrap();

        assert_eq!(
            cmd,
            Command::Echo(Echo {
                value: String::from("hi")
            })
        );

        let res = cmd.exec(&Context::default()).unwrap();

        assert_eq!(res, Frame::Simple("hi".to_string()));
    }

    #[test]
    fn value_with_line_break() {
        let cmd = Echo {
            value: String::from("a\r\nb"),
        };

        let res = cmd.exec(&Context::default()).unwrap();

        assert_eq!(res, Frame::Bulk(Bytes::from("a\r\nb")));
    }

    #[test]
    fn wrong_arity() {
        let missing = Frame::Array(vec![Frame::Bulk(Bytes::from("ECHO"))]);
        let extra = Frame::Array(vec![
            Frame::Bulk(Bytes::from("ECHO")),
            Frame::Bulk(Bytes::from("hi")),
            Frame::Bulk(Bytes::from("there")),
        ]);

        for frame in [missing, extra] {
            let err = Command::try_from(frame).unwrap_err();

            assert_eq!(
                err,
                CommandParserError::WrongArity {
                    command: "echo".to_string()
                }
            );
        }
    }
}
