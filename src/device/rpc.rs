//! Junos NETCONF RPC payloads and reply parsing.
//!
//! Only base:1.0 end-of-message framing is spoken, so every message written to
//! or read from the device ends with [`EOM_DELIMITER`].

use super::{CommitOptions, DeviceError};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

/// End-of-message marker for NETCONF base:1.0 framing
pub const EOM_DELIMITER: &str = "]]>]]>";

/// The only capability we advertise; keeps the device on EOM framing
pub const BASE_CAPABILITY: &str = "urn:ietf:params:netconf:base:1.0";

const NETCONF_NAMESPACE: &str = "urn:ietf:params:xml:ns:netconf:base:1.0";

/// Client `<hello>` advertising base:1.0 only
pub fn client_hello() -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <hello xmlns=\"{}\"><capabilities><capability>{}</capability></capabilities></hello>\n{}",
        NETCONF_NAMESPACE, BASE_CAPABILITY, EOM_DELIMITER
    )
}

/// Wrap an operation in an `<rpc>` envelope, framed for the wire
pub fn envelope(message_id: u64, operation: &str) -> String {
    format!(
        "<rpc xmlns=\"{}\" message-id=\"{}\">{}</rpc>\n{}",
        NETCONF_NAMESPACE, message_id, operation, EOM_DELIMITER
    )
}

pub fn lock_configuration() -> String {
    "<lock-configuration/>".to_string()
}

pub fn unlock_configuration() -> String {
    "<unlock-configuration/>".to_string()
}

pub fn load_rollback(id: u8) -> String {
    format!("<load-configuration rollback=\"{}\"/>", id)
}

/// Candidate vs. active configuration as a text diff
pub fn compare_candidate() -> String {
    "<get-configuration compare=\"rollback\" rollback=\"0\" format=\"text\"/>".to_string()
}

pub fn commit_check() -> String {
    "<commit-configuration><check/></commit-configuration>".to_string()
}

/// `<commit-configuration>` carrying only the supplied options
pub fn commit(options: &CommitOptions) -> String {
    let mut body = String::new();
    if let Some(minutes) = options.confirm {
        body.push_str(&format!(
            "<confirmed/><confirm-timeout>{}</confirm-timeout>",
            minutes
        ));
    }
    if let Some(ref comment) = options.comment {
        body.push_str(&format!(
            "<log>{}</log>",
            quick_xml::escape::escape(comment.as_str())
        ));
    }

    if body.is_empty() {
        "<commit-configuration/>".to_string()
    } else {
        format!("<commit-configuration>{}</commit-configuration>", body)
    }
}

pub fn close_session() -> String {
    "<close-session/>".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// One error or warning element from a reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyIssue {
    pub severity: Severity,
    pub message: String,
}

/// A parsed `<rpc-reply>`
#[derive(Debug, Clone, Default)]
pub struct RpcReply {
    /// `message-id` echoed from the request, if the device sent one
    pub message_id: Option<String>,
    pub issues: Vec<ReplyIssue>,
    configuration_output: Option<String>,
}

/// Element whose character data the parser is collecting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Capture {
    Severity,
    Message,
    ConfigurationOutput,
}

/// `<rpc-error>` or Junos `<xnm:error>`/`<xnm:warning>` being read
struct PendingIssue {
    severity: Severity,
    message: Option<String>,
}

impl PendingIssue {
    fn finish(self) -> ReplyIssue {
        let message = self
            .message
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| "unspecified rpc error".to_string());
        ReplyIssue {
            severity: self.severity,
            message,
        }
    }
}

/// Severity implied by the element itself, when it opens an issue
fn issue_element(qualified: &[u8], local: &[u8]) -> Option<Severity> {
    match (qualified, local) {
        (_, b"rpc-error") => Some(Severity::Error),
        (b"xnm:error", _) => Some(Severity::Error),
        (b"xnm:warning", _) => Some(Severity::Warning),
        _ => None,
    }
}

fn malformed(err: impl std::fmt::Display) -> DeviceError {
    DeviceError::Transport(format!("malformed reply: {}", err))
}

fn message_id(element: &BytesStart<'_>) -> Result<Option<String>, DeviceError> {
    for attr in element.attributes().flatten() {
        if attr.key.local_name().as_ref() == b"message-id" {
            let value = attr.unescape_value().map_err(malformed)?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

impl RpcReply {
    /// Parse one framed reply. Elements are matched by local name so both
    /// prefixed and default-namespace replies are understood.
    pub fn parse(raw: &str) -> Result<Self, DeviceError> {
        let mut reader = Reader::from_str(raw);
        let mut reply = Self::default();
        let mut issue: Option<PendingIssue> = None;
        let mut capture: Option<Capture> = None;
        let mut text = String::new();

        loop {
            match reader.read_event().map_err(malformed)? {
                Event::Start(e) => {
                    let local = e.local_name();
                    if local.as_ref() == b"rpc-reply" {
                        reply.message_id = message_id(&e)?;
                    } else if let Some(severity) = issue_element(e.name().as_ref(), local.as_ref())
                    {
                        issue = Some(PendingIssue {
                            severity,
                            message: None,
                        });
                    } else if local.as_ref() == b"configuration-output" {
                        capture = Some(Capture::ConfigurationOutput);
                        text.clear();
                    } else if issue.is_some() {
                        let field = match local.as_ref() {
                            b"error-severity" => Some(Capture::Severity),
                            b"error-message" | b"message" => Some(Capture::Message),
                            _ => None,
                        };
                        if field.is_some() {
                            capture = field;
                            text.clear();
                        }
                    }
                }
                Event::Empty(e) => {
                    let local = e.local_name();
                    if local.as_ref() == b"rpc-reply" {
                        reply.message_id = message_id(&e)?;
                    } else if let Some(severity) = issue_element(e.name().as_ref(), local.as_ref())
                    {
                        reply.issues.push(
                            PendingIssue {
                                severity,
                                message: None,
                            }
                            .finish(),
                        );
                    } else if local.as_ref() == b"configuration-output" {
                        reply.configuration_output = Some(String::new());
                    }
                }
                Event::Text(e) => {
                    if capture.is_some() {
                        text.push_str(&e.unescape().map_err(malformed)?);
                    }
                }
                Event::CData(e) => {
                    if capture.is_some() {
                        text.push_str(std::str::from_utf8(&e).map_err(malformed)?);
                    }
                }
                Event::End(e) => {
                    let local = e.local_name();
                    if issue_element(e.name().as_ref(), local.as_ref()).is_some() {
                        if let Some(pending) = issue.take() {
                            reply.issues.push(pending.finish());
                        }
                        capture = None;
                        continue;
                    }

                    match (capture, local.as_ref()) {
                        (Some(Capture::ConfigurationOutput), b"configuration-output") => {
                            reply.configuration_output = Some(std::mem::take(&mut text));
                            capture = None;
                        }
                        (Some(Capture::Severity), b"error-severity") => {
                            if let Some(ref mut pending) = issue {
                                if text.trim().eq_ignore_ascii_case("warning") {
                                    pending.severity = Severity::Warning;
                                } else {
                                    pending.severity = Severity::Error;
                                }
                            }
                            text.clear();
                            capture = None;
                        }
                        (Some(Capture::Message), b"error-message" | b"message") => {
                            if let Some(ref mut pending) = issue {
                                pending.message = Some(std::mem::take(&mut text));
                            }
                            capture = None;
                        }
                        _ => {}
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        Ok(reply)
    }

    pub fn errors(&self) -> impl Iterator<Item = &ReplyIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ReplyIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Warning)
    }

    /// Fail with every error message joined, ignoring warnings
    pub fn into_result(self) -> Result<Self, DeviceError> {
        let messages: Vec<&str> = self.errors().map(|e| e.message.as_str()).collect();
        if messages.is_empty() {
            Ok(self)
        } else {
            Err(DeviceError::Rpc(messages.join("; ")))
        }
    }

    /// Text diff from a compare request, `None` when blank
    pub fn configuration_output(&self) -> Option<String> {
        self.configuration_output
            .clone()
            .filter(|text| !text.trim().is_empty())
    }
}

/// Session id announced in the server `<hello>`
pub fn hello_session_id(hello: &str) -> Option<u64> {
    let mut reader = Reader::from_str(hello);
    let mut in_session_id = false;

    loop {
        match reader.read_event().ok()? {
            Event::Start(e) if e.local_name().as_ref() == b"session-id" => in_session_id = true,
            Event::Text(e) if in_session_id => return e.unescape().ok()?.trim().parse().ok(),
            Event::End(e) if e.local_name().as_ref() == b"session-id" => in_session_id = false,
            Event::Eof => return None,
            _ => {}
        }
    }
}
