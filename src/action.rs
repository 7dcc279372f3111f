//! Outgoing actions and their responses

use crate::{
    constants::{
        KEY_ACTION, KEY_ACTION_ID, KEY_MESSAGE, KEY_OUTPUT, KEY_RESPONSE, LINE_TERMINATOR,
    },
    error::{AmiError, AmiResult},
    headers::AmiHeaders,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Validate that a user-provided string contains no newline characters.
///
/// AMI records are line-delimited; embedded newlines would allow injection
/// of arbitrary keys or whole extra actions.
fn validate_no_newlines(s: &str, context: &str) -> AmiResult<()> {
    if s.contains('\n') || s.contains('\r') {
        return Err(AmiError::InvalidHeader {
            header: format!("{} must not contain newlines", context),
        });
    }
    Ok(())
}

/// `Response:` classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ResponseStatus {
    /// `Response: Success`
    Success,
    /// `Response: Error`
    Error,
    /// `Response: Follows` (legacy `Command` output)
    Follows,
    /// `Response: Goodbye`, the reply to `Logoff`
    Goodbye,
    /// Anything else.
    Other,
}

impl ResponseStatus {
    fn from_value(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.eq_ignore_ascii_case("success") => ResponseStatus::Success,
            Some(v) if v.eq_ignore_ascii_case("error") => ResponseStatus::Error,
            Some(v) if v.eq_ignore_ascii_case("follows") => ResponseStatus::Follows,
            Some(v) if v.eq_ignore_ascii_case("goodbye") => ResponseStatus::Goodbye,
            _ => ResponseStatus::Other,
        }
    }
}

/// Response to an [`AmiAction`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmiResponse {
    headers: AmiHeaders,
    status: ResponseStatus,
}

impl AmiResponse {
    /// `ResponseStatus` is derived from the `Response` key.
    pub fn new(headers: AmiHeaders) -> Self {
        let status = ResponseStatus::from_value(headers.get(KEY_RESPONSE));
        Self { headers, status }
    }

    /// `true` unless Asterisk answered `Response: Error` or something unknown.
    pub fn is_success(&self) -> bool {
        matches!(
            self.status,
            ResponseStatus::Success | ResponseStatus::Follows | ResponseStatus::Goodbye
        )
    }

    pub fn status(&self) -> ResponseStatus {
        self.status
    }

    /// `Message` key, e.g. `Authentication accepted`.
    pub fn message(&self) -> Option<&str> {
        self.headers
            .get(KEY_MESSAGE)
    }

    pub fn action_id(&self) -> Option<&str> {
        self.headers
            .get(KEY_ACTION_ID)
    }

    /// Look up a response key (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(name)
    }

    pub fn headers(&self) -> &AmiHeaders {
        &self.headers
    }

    /// `Output` lines, as returned by the `Command` action.
    ///
    /// Covers both the `Output:` keys of current Asterisk and the raw body of
    /// a legacy `Response: Follows`.
    pub fn output(&self) -> Vec<&str> {
        self.headers
            .get_all(KEY_OUTPUT)
            .collect()
    }

    /// Convert to result based on success status.
    ///
    /// ```
    /// # use asterisk_ami_tokio::{AmiHeaders, AmiResponse};
    /// let headers: AmiHeaders = [("Response", "Error"), ("Message", "No such channel")]
    ///     .into_iter()
    ///     .collect();
    /// let err = AmiResponse::new(headers).into_result().unwrap_err();
    /// assert_eq!(err.to_string(), "action failed: No such channel");
    /// ```
    pub fn into_result(self) -> AmiResult<Self> {
        if self.is_success() {
            return Ok(self);
        }
        let message = self
            .message()
            .or_else(|| {
                self.headers
                    .get(KEY_RESPONSE)
            })
            .unwrap_or("unknown response")
            .to_string();
        Err(AmiError::ActionFailed { message })
    }
}

/// Builder for AMI actions.
///
/// ```
/// use asterisk_ami_tokio::AmiAction;
///
/// let action = AmiAction::new("Hangup")
///     .header("Channel", "PJSIP/1000-00000001").unwrap()
///     .action_id("42").unwrap();
/// let wire = action.to_wire_format().unwrap();
/// assert_eq!(wire, "Action: Hangup\r\nActionID: 42\r\nChannel: PJSIP/1000-00000001\r\n\r\n");
/// ```
#[derive(Clone)]
pub struct AmiAction {
    name: String,
    action_id: Option<String>,
    headers: AmiHeaders,
}

impl AmiAction {
    /// Start building an action with the given `Action:` name.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            action_id: None,
            headers: AmiHeaders::new(),
        }
    }

    /// `Action: Login` with events enabled.
    pub fn login(username: &str, secret: &str) -> AmiResult<Self> {
        Self::new("Login")
            .header("Username", username)?
            .header("Secret", secret)?
            .header("Events", "on")
    }

    pub fn ping() -> Self {
        Self::new("Ping")
    }

    pub fn logoff() -> Self {
        Self::new("Logoff")
    }

    /// Add a key. Repeated keys are kept.
    ///
    /// Returns an error if the name or value contains newline characters.
    pub fn header(mut self, name: &str, value: &str) -> AmiResult<Self> {
        validate_no_newlines(name, "header name")?;
        validate_no_newlines(value, "header value")?;
        if name.eq_ignore_ascii_case(KEY_ACTION_ID) {
            self.action_id = Some(value.to_string());
        } else {
            self.headers
                .push(name, value);
        }
        Ok(self)
    }

    /// Add a `Variable: name=value` pair (Originate, Setvar style actions).
    pub fn variable(self, name: &str, value: &str) -> AmiResult<Self> {
        self.header("Variable", &format!("{}={}", name, value))
    }

    /// Set the correlation id. Generated automatically when sent without one.
    pub fn action_id(mut self, id: &str) -> AmiResult<Self> {
        validate_no_newlines(id, "ActionID")?;
        self.action_id = Some(id.to_string());
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> Option<&str> {
        self.action_id
            .as_deref()
    }

    pub fn headers(&self) -> &AmiHeaders {
        &self.headers
    }

    /// Fill the ActionID with `generate()` when missing and return it.
    pub(crate) fn ensure_action_id(&mut self, generate: impl FnOnce() -> String) -> String {
        self.action_id
            .get_or_insert_with(generate)
            .clone()
    }

    /// Serialize to the wire format, terminated by an empty line.
    pub fn to_wire_format(&self) -> AmiResult<String> {
        use std::fmt::Write;
        validate_no_newlines(&self.name, "action name")?;
        if self
            .name
            .is_empty()
        {
            return Err(AmiError::InvalidHeader {
                header: "action name must not be empty".to_string(),
            });
        }

        let mut result = String::new();
        let _ = write!(result, "{}: {}{}", KEY_ACTION, self.name, LINE_TERMINATOR);
        if let Some(id) = &self.action_id {
            let _ = write!(result, "{}: {}{}", KEY_ACTION_ID, id, LINE_TERMINATOR);
        }
        for (key, value) in self
            .headers
            .iter()
        {
            let _ = write!(result, "{}: {}{}", key, value, LINE_TERMINATOR);
        }
        result.push_str(LINE_TERMINATOR);
        Ok(result)
    }
}

impl fmt::Debug for AmiAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let headers: Vec<(&str, &str)> = self
            .headers
            .iter()
            .map(|(k, v)| {
                if k.eq_ignore_ascii_case("Secret") {
                    (k, "[REDACTED]")
                } else {
                    (k, v)
                }
            })
            .collect();
        f.debug_struct("AmiAction")
            .field("name", &self.name)
            .field("action_id", &self.action_id)
            .field("headers", &headers)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(pairs: &[(&str, &str)]) -> AmiResponse {
        AmiResponse::new(
            pairs
                .iter()
                .copied()
                .collect(),
        )
    }

    #[test]
    fn status_classification() {
        assert_eq!(
            response(&[("Response", "Success")]).status(),
            ResponseStatus::Success
        );
        assert_eq!(
            response(&[("Response", "error")]).status(),
            ResponseStatus::Error
        );
        assert_eq!(
            response(&[("Response", "Goodbye")]).status(),
            ResponseStatus::Goodbye
        );
        assert_eq!(
            response(&[("Response", "Pending")]).status(),
            ResponseStatus::Other
        );
        assert!(!response(&[]).is_success());
    }

    #[test]
    fn into_result_carries_message() {
        let err = response(&[("Response", "Error"), ("Message", "Permission denied")])
            .into_result()
            .unwrap_err();
        assert!(matches!(err, AmiError::ActionFailed { ref message } if message == "Permission denied"));

        assert!(response(&[("Response", "Success"), ("Ping", "Pong")])
            .into_result()
            .is_ok());
    }

    #[test]
    fn output_lines() {
        let resp = response(&[
            ("Response", "Success"),
            ("Output", "Name/username"),
            ("Output", "1000/1000"),
        ]);
        assert_eq!(resp.output(), vec!["Name/username", "1000/1000"]);
    }

    #[test]
    fn login_wire_format() {
        let mut action = AmiAction::login("admin", "s3cret").unwrap();
        action.ensure_action_id(|| "login-1".to_string());
        assert_eq!(
            action
                .to_wire_format()
                .unwrap(),
            "Action: Login\r\nActionID: login-1\r\nUsername: admin\r\nSecret: s3cret\r\nEvents: on\r\n\r\n"
        );
    }

    #[test]
    fn debug_redacts_secret() {
        let action = AmiAction::login("admin", "s3cret").unwrap();
        let debug = format!("{:?}", action);
        assert!(!debug.contains("s3cret"));
        assert!(debug.contains("[REDACTED]"));
        assert!(debug.contains("admin"));
    }

    #[test]
    fn newline_injection_rejected() {
        assert!(AmiAction::new("Ping")
            .header("X", "a\r\nAction: Hangup")
            .is_err());
        assert!(AmiAction::new("Ping")
            .action_id("1\n2")
            .is_err());
        assert!(AmiAction::new("Ping\r\nAction: Hangup")
            .to_wire_format()
            .is_err());
    }

    #[test]
    fn action_id_header_is_not_duplicated() {
        let action = AmiAction::new("Status")
            .header("actionid", "abc")
            .unwrap();
        assert_eq!(action.id(), Some("abc"));
        let wire = action
            .to_wire_format()
            .unwrap();
        assert_eq!(wire.matches("ActionID").count(), 1);
    }

    #[test]
    fn ensure_action_id_keeps_existing() {
        let mut action = AmiAction::ping()
            .action_id("mine")
            .unwrap();
        assert_eq!(action.ensure_action_id(|| "generated".to_string()), "mine");

        let mut action = AmiAction::ping();
        assert_eq!(action.ensure_action_id(|| "generated".to_string()), "generated");
        assert_eq!(action.id(), Some("generated"));
    }

    #[test]
    fn variable_pairs() {
        let action = AmiAction::new("Originate")
            .variable("CALLERID(num)", "1000")
            .unwrap()
            .variable("X", "1")
            .unwrap();
        assert_eq!(
            action
                .headers()
                .get_all("Variable")
                .collect::<Vec<_>>(),
            vec!["CALLERID(num)=1000", "X=1"]
        );
    }
}
