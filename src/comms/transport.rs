//! Line-oriented transport to the game server

use std::io::{self, BufRead, StdinLock, Stdout, Write};

use tracing::{debug, trace};

use crate::error::BotError;

use super::protocol::{Action, ServerMessage};

/// Message channel to the game server
pub trait Transport {
    /// Block until the next message arrives
    fn read_message(&mut self) -> Result<ServerMessage, BotError>;

    /// Send one action, there is no acknowledgment
    fn post_message(&mut self, action: &Action) -> Result<(), BotError>;
}

/// One JSON message per line over any reader/writer pair
pub struct LineTransport<R, W> {
    reader: R,
    writer: W,
    line: String,
}

impl LineTransport<StdinLock<'static>, Stdout> {
    /// The server talks to the bot over stdin/stdout
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> LineTransport<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer,
            line: String::new(),
        }
    }

    /// Give back the writer to inspect what was sent
    #[cfg(test)]
    pub fn into_writer(self) -> W {
        self.writer
    }
}

impl<R: BufRead, W: Write> Transport for LineTransport<R, W> {
    fn read_message(&mut self) -> Result<ServerMessage, BotError> {
        loop {
            self.line.clear();
            if self.reader.read_line(&mut self.line)? == 0 {
                return Err(BotError::ConnectionClosed);
            }
            if self.line.trim().is_empty() {
                continue;
            }
            trace!(len = self.line.len(), "Received line");
            return ServerMessage::parse(&self.line);
        }
    }

    fn post_message(&mut self, action: &Action) -> Result<(), BotError> {
        serde_json::to_writer(&mut self.writer, action)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        debug!(?action, "Posted action");
        Ok(())
    }
}
