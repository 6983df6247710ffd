use bytes::Bytes;

use crate::commands::executable::{Context, Executable};
use crate::commands::{CommandParser, CommandParserError};
use crate::frame::Frame;
use crate::Error;

/// Returns information about the server. Only the replication section, holding the role the
/// server was started with, is available.
///
/// Ref: <https://redis.io/docs/latest/commands/info/>
#[derive(Debug, PartialEq)]
pub struct Info {
    pub sections: Vec<String>,
}

impl Info {
    fn includes_replication(&self) -> bool {
        self.sections.is_empty()
            || self.sections.iter().any(|section| {
                matches!(
                    section.as_str(),
                    "replication" | "all" | "default" | "everything"
                )
            })
    }
}

impl Executable for Info {
    fn exec(self, ctx: &Context) -> Result<Frame, Error> {
        if !self.includes_replication() {
            return Ok(Frame::Bulk(Bytes::new()));
        }

        let info = format!("# Replication\r\nrole:{}\r\n", ctx.role);
        Ok(Frame::Bulk(Bytes::from(info)))
    }
}

impl TryFrom<&mut CommandParser> for Info {
    type Error = CommandParserError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let mut sections = vec![];
        while let Some(section) = parser.next_optional() {
            sections.push(String::from_utf8_lossy(&section).to_lowercase());
        }

        Ok(Self { sections })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::Command;
    use crate::config::Role;
    use crate::store::Store;

    #[test]
    fn replication_section() {
        let frame = Frame::Array(vec![
            Frame::Bulk(Bytes::from("INFO")),
            Frame::Bulk(Bytes::from("Replication")),
        ]);
        let cmd = Command::try_from(frame).unwrap();

        assert_eq!(
            cmd,
            Command::Info(Info {
                sections: vec!["replication".to_string()]
            })
        );

        let res = cmd.exec(&Context::default()).unwrap();

        assert_eq!(
            res,
            Frame::Bulk(Bytes::from("# Replication\r\nrole:master\r\n"))
        );
    }

    #[test]
    fn replica_role() {
        let ctx = Context::new(Store::new(), Role::Slave);
        let cmd = Info { sections: vec![] };

        let res = cmd.exec(&ctx).unwrap();

        assert_eq!(
            res,
            Frame::Bulk(Bytes::from("# Replication\r\nrole:slave\r\n"))
        );
    }

    #[test]
    fn unknown_section() {
        let cmd = Info {
            sections: vec!["keyspace".to_string()],
        };

        let res = cmd.exec(&Context::default()).unwrap();

        assert_eq!(res, Frame::Bulk(Bytes::new()));
    }
}
