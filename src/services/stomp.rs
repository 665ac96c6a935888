//! Minimal STOMP 1.2 text-frame codec, enough to subscribe to a broker topic
//! over a websocket and receive MESSAGE frames.

use crate::error::ChannelError;

const NUL: char = '\0';

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Frame {
    pub fn new(command: &str) -> Self {
        Self {
            command: command.to_string(),
            headers: Vec::new(),
            body: String::new(),
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn body(mut self, body: &str) -> Self {
        self.body = body.to_string();
        self
    }

    /// First value of a header; repeated headers keep the earliest.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// CONNECT frame without heart-beating. The bearer token travels as a
    /// native header when a session is present.
    pub fn connect(host: &str, token: Option<&str>) -> Self {
        let frame = Frame::new("CONNECT")
            .header("accept-version", "1.2")
            .header("host", host)
            .header("heart-beat", "0,0");
        match token {
            Some(token) => frame.header("Authorization", &format!("Bearer {}", token)),
            None => frame,
        }
    }

    pub fn subscribe(id: &str, destination: &str) -> Self {
        Frame::new("SUBSCRIBE")
            .header("id", id)
            .header("destination", destination)
            .header("ack", "auto")
    }

    pub fn disconnect() -> Self {
        Frame::new("DISCONNECT")
    }

    /// CONNECT and CONNECTED headers are sent verbatim.
    fn escapes_headers(&self) -> bool {
        !matches!(self.command.as_str(), "CONNECT" | "CONNECTED")
    }

    pub fn encode(&self) -> String {
        let escape = self.escapes_headers();
        let mut out = String::with_capacity(self.command.len() + self.body.len() + 64);

        out.push_str(&self.command);
        out.push('\n');
        for (name, value) in &self.headers {
            if escape {
                out.push_str(&escape_header(name));
                out.push(':');
                out.push_str(&escape_header(value));
            } else {
                out.push_str(name);
                out.push(':');
                out.push_str(value);
            }
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&self.body);
        out.push(NUL);
        out
    }

    /// Decodes every frame in one websocket text message. Bare newlines
    /// between frames are heart-beats and are skipped.
    pub fn decode_all(text: &str) -> Result<Vec<Frame>, ChannelError> {
        text.split(NUL)
            .map(|chunk| chunk.trim_start_matches(['\r', '\n']))
            .filter(|chunk| !chunk.is_empty())
            .map(Frame::decode_one)
            .collect()
    }

    fn decode_one(chunk: &str) -> Result<Frame, ChannelError> {
        let (head, body) = split_head(chunk);
        let mut lines = head.lines().map(|line| line.trim_end_matches('\r'));

        let command = lines
            .next()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| ChannelError::Protocol("frame without a command".to_string()))?
            .to_string();

        let mut frame = Frame::new(&command);
        let escaped = frame.escapes_headers();

        for line in lines.filter(|line| !line.is_empty()) {
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| ChannelError::Protocol(format!("malformed header line: {}", line)))?;
            if escaped {
                frame.headers.push((unescape_header(name)?, unescape_header(value)?));
            } else {
                frame.headers.push((name.to_string(), value.to_string()));
            }
        }

        frame.body = body.to_string();
        Ok(frame)
    }
}

/// Splits at the blank line ending the headers. A frame with no blank line
/// has no body.
fn split_head(chunk: &str) -> (&str, &str) {
    let crlf = chunk.find("\r\n\r\n").map(|i| (i, 4));
    let lf = chunk.find("\n\n").map(|i| (i, 2));

    match (crlf, lf) {
        (Some(a), Some(b)) => {
            let (at, len) = if a.0 < b.0 { a } else { b };
            (&chunk[..at], &chunk[at + len..])
        }
        (Some((at, len)), None) | (None, Some((at, len))) => (&chunk[..at], &chunk[at + len..]),
        (None, None) => (chunk, ""),
    }
}

fn escape_header(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ':' => out.push_str("\\c"),
            other => out.push(other),
        }
    }
    out
}

fn unescape_header(raw: &str) -> Result<String, ChannelError> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('c') => out.push(':'),
            other => {
                return Err(ChannelError::Protocol(format!(
                    "invalid header escape \\{}",
                    other.map(String::from).unwrap_or_default()
                )))
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_subscribe() {
        let frame = Frame::subscribe("sub-0", "/topic/notifications/42");
        assert_eq!(
            frame.encode(),
            "SUBSCRIBE\nid:sub-0\ndestination:/topic/notifications/42\nack:auto\n\n\0"
        );
    }

    #[test]
    fn test_connect_carries_token_unescaped() {
        let encoded = Frame::connect("localhost", Some("a.b.c")).encode();
        assert!(encoded.starts_with("CONNECT\naccept-version:1.2\nhost:localhost\n"));
        assert!(encoded.contains("Authorization:Bearer a.b.c\n"));

        let anonymous = Frame::connect("localhost", None).encode();
        assert!(!anonymous.contains("Authorization"));
    }

    #[test]
    fn test_decode_message_with_body() {
        let text = "MESSAGE\ndestination:/topic/notifications/42\nmessage-id:7\nsubscription:sub-0\n\n{\"id\":\"n1\"}\0\n";
        let frames = Frame::decode_all(text).unwrap();

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].command, "MESSAGE");
        assert_eq!(frames[0].get("message-id"), Some("7"));
        assert_eq!(frames[0].body, "{\"id\":\"n1\"}");
    }

    #[test]
    fn test_heartbeats_are_skipped() {
        assert!(Frame::decode_all("\n").unwrap().is_empty());
        assert!(Frame::decode_all("\r\n\n").unwrap().is_empty());

        let frames = Frame::decode_all("\nCONNECTED\nversion:1.2\n\n\0").unwrap();
        assert_eq!(frames[0].command, "CONNECTED");
        assert_eq!(frames[0].get("version"), Some("1.2"));
    }

    #[test]
    fn test_header_escaping() {
        let frame = Frame::new("SEND").header("note", "a:b\\c\nd");
        let encoded = frame.encode();
        assert!(encoded.contains("note:a\\cb\\\\c\\nd\n"));

        let decoded = Frame::decode_all(&encoded).unwrap();
        assert_eq!(decoded[0].get("note"), Some("a:b\\c\nd"));
    }

    #[test]
    fn test_crlf_frames_and_repeated_headers() {
        let text = "MESSAGE\r\nfoo:first\r\nfoo:second\r\n\r\nhello\0";
        let frame = &Frame::decode_all(text).unwrap()[0];
        assert_eq!(frame.get("foo"), Some("first"));
        assert_eq!(frame.body, "hello");
    }

    #[test]
    fn test_malformed_frames() {
        assert!(matches!(
            Frame::decode_all("MESSAGE\nno-colon-here\n\n\0"),
            Err(ChannelError::Protocol(_))
        ));
        assert!(matches!(
            Frame::decode_all("MESSAGE\nbad:\\t\n\n\0"),
            Err(ChannelError::Protocol(_))
        ));
    }

    #[test]
    fn test_error_frame_message() {
        let frames = Frame::decode_all("ERROR\nmessage:Access denied\n\ndetails\0").unwrap();
        assert_eq!(frames[0].command, "ERROR");
        assert_eq!(frames[0].get("message"), Some("Access denied"));
    }
}
