pub mod token_kind;
pub mod tokenizer;

use std::str::FromStr;

use anyhow::{anyhow, bail, Result};
use repcrec::command::Command;

use crate::ast::token_kind::{CommandName, TokenKind};
use crate::ast::tokenizer::{Token, Tokenizer};

/// Parses one script line into a [`Command`]. Blank lines and `//` comments
/// yield `None`; anything else must match `name(arg, ...)` exactly, with the
/// command name spelled case-sensitively.
pub fn parse_line(line: &str) -> Result<Option<Command>> {
    let mut tokens = Vec::new();
    for token in Tokenizer::new(line) {
        let token = token.map_err(|err| anyhow!(err))?;
        if !matches!(token.kind, TokenKind::Newline | TokenKind::EOI) {
            tokens.push(token);
        }
    }
    if tokens.is_empty() {
        return Ok(None);
    }
    let mut parser = LineParser { tokens: &tokens, pos: 0 };
    let command = parser.command()?;
    parser.expect_done()?;
    Ok(Some(command))
}

struct LineParser<'a, 'b> {
    tokens: &'b [Token<'a>],
    pos: usize,
}

impl<'a, 'b> LineParser<'a, 'b> {
    fn peek(&self) -> Option<&'b Token<'a>> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&'b Token<'a>> {
        let token = self.tokens.get(self.pos);
        self.pos += 1;
        token
    }

    fn expect(&mut self, kind: TokenKind) -> Result<&'b Token<'a>> {
        match self.advance() {
            Some(token) if token.kind == kind => Ok(token),
            Some(token) => bail!("expected {:?}, found {:?}", kind, token.text()),
            None => bail!("expected {:?}, found end of line", kind),
        }
    }

    fn expect_done(&mut self) -> Result<()> {
        if let Some(token) = self.peek() {
            bail!("trailing input {:?}", token.text());
        }
        Ok(())
    }

    fn command(&mut self) -> Result<Command> {
        let name = self.expect(TokenKind::Ident)?;
        let Ok(name) = CommandName::from_str(name.text()) else {
            bail!("unknown command {:?}", name.text());
        };
        self.expect(TokenKind::LParen)?;
        let args = self.arguments()?;
        self.expect(TokenKind::RParen)?;

        let command = match (name, args.as_slice()) {
            (CommandName::begin, [txn]) => Command::Begin(txn.to_string()),
            (CommandName::beginRO, [txn]) => Command::BeginRo(txn.to_string()),
            (CommandName::R, [txn, var]) => Command::Read(txn.to_string(), var.parse()?),
            (CommandName::W, [txn, var, value]) => {
                Command::Write(txn.to_string(), var.parse()?, value.parse::<i64>()?)
            }
            (CommandName::end, [txn]) => Command::End(txn.to_string()),
            (CommandName::fail, [site]) => Command::Fail(site.parse()?),
            (CommandName::recover, [site]) => Command::Recover(site.parse()?),
            (CommandName::dump, []) => Command::Dump,
            (name, args) => bail!("wrong number of arguments for {}: {}", name, args.len()),
        };
        Ok(command)
    }

    /// Comma-separated idents and integer literals, up to the closing paren.
    fn arguments(&mut self) -> Result<Vec<&'a str>> {
        let mut args = Vec::new();
        while let Some(token) = self.peek() {
            if token.kind == TokenKind::RParen {
                break;
            }
            match token.kind {
                TokenKind::Ident | TokenKind::LiteralInteger => {
                    args.push(token.text());
                    self.pos += 1;
                }
                _ => bail!("unexpected argument {:?}", token.text()),
            }
            if self.peek().map(|t| t.kind) == Some(TokenKind::Comma) {
                self.pos += 1;
            }
        }
        Ok(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_round_trip() -> Result<()> {
        assert_eq!(parse_line("begin(T1)")?, Some(Command::Begin("T1".to_string())));
        assert_eq!(parse_line("beginRO(T2)")?, Some(Command::BeginRo("T2".to_string())));
        assert_eq!(
            parse_line("R(T1, x4)")?,
            Some(Command::Read("T1".to_string(), "x4".parse()?))
        );
        assert_eq!(
            parse_line("W(T1, x6, -5)")?,
            Some(Command::Write("T1".to_string(), "x6".parse()?, -5))
        );
        assert_eq!(parse_line("end(T1)")?, Some(Command::End("T1".to_string())));
        assert_eq!(parse_line("fail(10)")?, Some(Command::Fail("10".parse()?)));
        assert_eq!(parse_line("recover(3)")?, Some(Command::Recover("3".parse()?)));
        assert_eq!(parse_line("dump()")?, Some(Command::Dump));
        Ok(())
    }

    #[test]
    fn blanks_and_comments_are_skipped() -> Result<()> {
        assert_eq!(parse_line("")?, None);
        assert_eq!(parse_line("   \t")?, None);
        assert_eq!(parse_line("// a comment")?, None);
        // Trailing comments are fine too.
        assert_eq!(
            parse_line("end(T1) // commits")?,
            Some(Command::End("T1".to_string()))
        );
        Ok(())
    }

    #[test]
    fn unknown_commands_fail() {
        assert!(parse_line("frobnicate(T1)").is_err());
        // Case sensitive, like the rest of the grammar.
        assert!(parse_line("BEGIN(T1)").is_err());
        assert!(parse_line("beginro(T2)").is_err());
    }

    #[test]
    fn malformed_lines_fail() {
        assert!(parse_line("begin T1").is_err());
        assert!(parse_line("begin(T1").is_err());
        assert!(parse_line("begin(T1) extra").is_err());
        assert!(parse_line("R(T1)").is_err());
        assert!(parse_line("W(T1, x4)").is_err());
        assert!(parse_line("R(T1, x21)").is_err());
        assert!(parse_line("fail(11)").is_err());
        assert!(parse_line("fail(0)").is_err());
    }
}
