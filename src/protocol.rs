//! AMI protocol parsing and message handling

use crate::{
    action::AmiResponse,
    buffer::AmiBuffer,
    constants::{
        END_COMMAND, GREETING_PREFIX, KEY_ACTION_ID, KEY_EVENT, KEY_OUTPUT, KEY_RESPONSE,
        LINE_TERMINATOR, MAX_MESSAGE_SIZE, MESSAGE_TERMINATOR,
    },
    error::{AmiError, AmiResult},
    event::AmiEvent,
    headers::AmiHeaders,
};

/// AMI message types
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum MessageType {
    /// Record carrying a `Response` key
    Response,
    /// Record carrying an `Event` key
    Event,
    /// Neither
    Unknown,
}

/// Parsed AMI record
#[derive(Debug, Clone)]
pub(crate) struct AmiMessage {
    pub(crate) message_type: MessageType,
    pub(crate) headers: AmiHeaders,
}

impl AmiMessage {
    pub(crate) fn new(headers: AmiHeaders) -> Self {
        let message_type = if headers.contains(KEY_RESPONSE) {
            MessageType::Response
        } else if headers.contains(KEY_EVENT) {
            MessageType::Event
        } else {
            MessageType::Unknown
        };
        Self {
            message_type,
            headers,
        }
    }

    pub(crate) fn action_id(&self) -> Option<&str> {
        self.headers
            .get(KEY_ACTION_ID)
    }

    pub(crate) fn into_response(self) -> AmiResponse {
        AmiResponse::new(self.headers)
    }

    pub(crate) fn into_event(self) -> AmiEvent {
        AmiEvent::new(self.headers)
    }
}

/// Parser state: the greeting banner precedes every record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    WaitingForGreeting,
    WaitingForMessage,
}

/// AMI protocol parser
pub(crate) struct AmiParser {
    buffer: AmiBuffer,
    state: ParseState,
}

impl AmiParser {
    /// Parser expecting the `Asterisk Call Manager/x.y` banner first.
    pub(crate) fn new() -> Self {
        Self {
            buffer: AmiBuffer::new(),
            state: ParseState::WaitingForGreeting,
        }
    }

    /// Add data to the parser buffer
    pub(crate) fn add_data(&mut self, data: &[u8]) -> AmiResult<()> {
        self.buffer
            .extend_from_slice(data);
        self.buffer
            .check_size_limits()?;
        Ok(())
    }

    /// Try to parse the banner line, returning the protocol version.
    pub(crate) fn parse_greeting(&mut self) -> AmiResult<Option<String>> {
        if self.state != ParseState::WaitingForGreeting {
            return Err(AmiError::protocol_error("Greeting already consumed"));
        }

        let Some(line) = self
            .buffer
            .extract_until_pattern(LINE_TERMINATOR.as_bytes())
        else {
            if self.buffer.len() > MAX_MESSAGE_SIZE {
                return Err(AmiError::protocol_error("Greeting line too long"));
            }
            return Ok(None);
        };
        self.buffer
            .compact();

        let line = String::from_utf8(line)
            .map_err(|_| AmiError::protocol_error("Invalid UTF-8 in greeting"))?;
        let version = line
            .trim()
            .strip_prefix(GREETING_PREFIX)
            .ok_or_else(|| {
                AmiError::protocol_error(format!("Unexpected greeting: {}", line.trim()))
            })?;

        self.state = ParseState::WaitingForMessage;
        Ok(Some(version.to_string()))
    }

    /// Try to parse a complete record from the buffer
    pub(crate) fn parse_message(&mut self) -> AmiResult<Option<AmiMessage>> {
        if self.state == ParseState::WaitingForGreeting {
            return Err(AmiError::protocol_error("Greeting not received yet"));
        }

        loop {
            let Some(record) = self
                .buffer
                .extract_until_pattern(MESSAGE_TERMINATOR.as_bytes())
            else {
                if self.buffer.len() > MAX_MESSAGE_SIZE {
                    return Err(AmiError::protocol_error(format!(
                        "Message too large: {} bytes without terminator exceeds limit {}",
                        self.buffer.len(),
                        MAX_MESSAGE_SIZE
                    )));
                }
                return Ok(None);
            };
            self.buffer
                .compact();

            let record = String::from_utf8(record)
                .map_err(|_| AmiError::protocol_error("Invalid UTF-8 in message"))?;

            let headers = Self::parse_headers(&record)?;
            if headers.is_empty() {
                // stray blank lines between records
                continue;
            }
            return Ok(Some(AmiMessage::new(headers)));
        }
    }

    /// Parse `Key: Value` lines.
    ///
    /// In a `Response: Follows` record, the first line without a colon starts
    /// the raw command body: it and every following line up to
    /// `--END COMMAND--` are stored as `Output` values.
    fn parse_headers(record: &str) -> AmiResult<AmiHeaders> {
        let mut headers = AmiHeaders::new();
        let mut command_body = false;

        for line in record.lines() {
            let line = line.trim_end();
            if line
                .trim()
                .is_empty()
            {
                continue;
            }

            if !command_body && !line.contains(':') && Self::is_follows(&headers) {
                command_body = true;
            }
            if command_body {
                if line.trim() != END_COMMAND {
                    headers.push(KEY_OUTPUT, line);
                }
                continue;
            }

            if let Some(colon_pos) = line.find(':') {
                let key = line[..colon_pos].trim();
                let value = line[colon_pos + 1..].trim();
                headers.push(key, value);
            } else {
                return Err(AmiError::InvalidHeader {
                    header: line.to_string(),
                });
            }
        }

        Ok(headers)
    }

    fn is_follows(headers: &AmiHeaders) -> bool {
        headers
            .get(KEY_RESPONSE)
            .is_some_and(|status| status.eq_ignore_ascii_case("Follows"))
    }
}

impl Default for AmiParser {
    fn default() -> Self {
        Self::new()
    }
}
