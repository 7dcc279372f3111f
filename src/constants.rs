//! Protocol constants and configuration values

/// Default Asterisk Manager Interface TCP port
pub const DEFAULT_AMI_PORT: u16 = 5038;

/// Socket buffer size for reading from TCP stream (64KB) - standard TCP receive window
pub const SOCKET_BUF_SIZE: usize = 65536;

/// Buffer allocation size (64KB) - used for both initial allocation and growth increments
pub const BUF_CHUNK: usize = 64 * 1024;

/// Maximum single message size (8MB)
/// AMI has no Content-Length; this bounds a single unterminated record.
pub const MAX_MESSAGE_SIZE: usize = 8 * 1024 * 1024;

/// Maximum total buffer size (16MB) - safety limit to prevent runaway memory
pub const MAX_BUFFER_SIZE: usize = 16 * 1024 * 1024;

/// Protocol message terminators
pub const MESSAGE_TERMINATOR: &str = "\r\n\r\n";
pub const LINE_TERMINATOR: &str = "\r\n";

/// Prefix of the banner line Asterisk sends right after accepting a connection
pub const GREETING_PREFIX: &str = "Asterisk Call Manager/";

/// Protocol framing keys.
pub const KEY_ACTION: &str = "Action";
/// Correlation key echoed back on the matching response.
pub const KEY_ACTION_ID: &str = "ActionID";
/// Present on every response record.
pub const KEY_RESPONSE: &str = "Response";
/// Present on every event record.
pub const KEY_EVENT: &str = "Event";
/// Human readable status text on responses.
pub const KEY_MESSAGE: &str = "Message";
/// Command output lines, one key per line.
pub const KEY_OUTPUT: &str = "Output";

/// Last line of a `Response: Follows` body (Asterisk 13 and earlier).
pub const END_COMMAND: &str = "--END COMMAND--";

/// TCP connect / handshake timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 2000;

/// Default command timeout in milliseconds (5 seconds)
pub const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 5000;

/// Default delay between reconnection attempts in milliseconds
pub const DEFAULT_ATTEMPTS_DELAY_MS: u64 = 2000;

/// Maximum number of queued events before dropping
pub const MAX_EVENT_QUEUE_SIZE: usize = 1000;
