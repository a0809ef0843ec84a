use crate::prelude::*;

/// A single frame on the wire. Every frame is a JSON object whose `type`
/// selects which of the other fields are present:
///
/// ```text
/// {"type":"cmd","data":"ls\r"}          client -> server, pty input
/// {"type":"resize","cols":80,"rows":24} client -> server, pty size
/// {"type":"output","data":"..."}        server -> client, pty output
/// ```
#[derive(
    Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize,
)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Envelope {
    Cmd { data: String },
    Resize { cols: u16, rows: u16 },
    Output { data: String },
}

impl Envelope {
    pub fn cmd(data: &str) -> Self {
        Self::Cmd {
            data: data.to_string(),
        }
    }

    pub fn resize(size: crate::term::Size) -> Self {
        Self::Resize {
            cols: size.cols,
            rows: size.rows,
        }
    }

    pub fn output(data: &str) -> Self {
        Self::Output {
            data: data.to_string(),
        }
    }

    #[cfg(test)]
    pub fn size(&self) -> Option<crate::term::Size> {
        match self {
            Self::Resize { cols, rows } => Some(crate::term::Size {
                rows: *rows,
                cols: *cols,
            }),
            _ => None,
        }
    }

    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).context(crate::error::SerializeMessage)
    }

    pub fn decode(frame: &str) -> Result<Self> {
        serde_json::from_str(frame).context(crate::error::MalformedMessage)
    }

    /// Pulls the terminal data out of a frame sent by the server. Servers
    /// aren't consistent about how they tag output, so only the `data`
    /// field is looked at.
    pub fn decode_output(frame: &str) -> Result<String> {
        #[derive(serde::Deserialize)]
        struct Output {
            data: String,
        }

        let output: Output = serde_json::from_str(frame)
            .context(crate::error::MalformedMessage)?;
        Ok(output.data)
    }

    // terminal data can contain anything the user typed, so keep it out of
    // the logs
    pub fn log(&self, id: &str) {
        match self {
            Self::Cmd { data } => {
                log::debug!(
                    "{}: message(Cmd {{ data: ({} bytes) }})",
                    id,
                    data.len()
                );
            }
            Self::Output { data } => {
                log::debug!(
                    "{}: message(Output {{ data: ({} bytes) }})",
                    id,
                    data.len()
                );
            }
            envelope => {
                log::debug!("{}: message({:?})", id, envelope);
            }
        }
    }
}

/// Turns a byte stream into text without mangling characters that were
/// split across reads. Bytes that can never be valid utf8 become U+FFFD.
#[derive(Debug, Default)]
pub struct TextDecoder {
    pending: Vec<u8>,
}

impl TextDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);

        let mut text = String::new();
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(s) => {
                    text.push_str(s);
                    self.pending.clear();
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    text.push_str(&String::from_utf8_lossy(
                        &self.pending[..valid],
                    ));
                    if let Some(len) = e.error_len() {
                        text.push(std::char::REPLACEMENT_CHARACTER);
                        self.pending.drain(..valid + len);
                    } else {
                        // incomplete sequence at the end, wait for more
                        self.pending.drain(..valid);
                        break;
                    }
                }
            }
        }
        text
    }

    #[cfg(test)]
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_encode() {
        assert_eq!(
            Envelope::cmd("ls -la\n").encode().unwrap(),
            r#"{"type":"cmd","data":"ls -la\n"}"#
        );
        assert_eq!(
            Envelope::resize(crate::term::Size { rows: 22, cols: 177 })
                .encode()
                .unwrap(),
            r#"{"type":"resize","cols":177,"rows":22}"#
        );
        assert_eq!(
            Envelope::output("hello\r\n").encode().unwrap(),
            r#"{"type":"output","data":"hello\r\n"}"#
        );
    }

    #[test]
    fn test_encode_decode() {
        for envelope in valid_envelopes() {
            let frame = envelope.encode().unwrap();
            assert_eq!(Envelope::decode(&frame).unwrap(), envelope);
        }
    }

    #[test]
    fn test_decode_ignores_unused_fields() {
        // browsers reuse one object for every message, so stale fields from
        // the other message kinds come along
        let envelope = Envelope::decode(
            r#"{"type":"cmd","data":"x","cols":null,"rows":null}"#,
        )
        .unwrap();
        assert_eq!(envelope, Envelope::cmd("x"));

        let envelope = Envelope::decode(
            r#"{"type":"resize","data":"x","cols":100,"rows":30}"#,
        )
        .unwrap();
        assert_eq!(
            envelope.size(),
            Some(crate::term::Size { rows: 30, cols: 100 })
        );
    }

    #[test]
    fn test_decode_invalid() {
        for frame in invalid_frames() {
            match Envelope::decode(frame) {
                Err(Error::MalformedMessage { .. }) => {}
                res => panic!("unexpected result for {}: {:?}", frame, res),
            }
        }
    }

    #[test]
    fn test_decode_output() {
        assert_eq!(
            Envelope::decode_output(r#"{"data":"hello\r\n"}"#).unwrap(),
            "hello\r\n"
        );
        assert_eq!(
            Envelope::decode_output(r#"{"type":"output","data":"a"}"#)
                .unwrap(),
            "a"
        );
        assert_eq!(
            Envelope::decode_output(
                r#"{"type":"cmd","data":"b","cols":0,"rows":0}"#
            )
            .unwrap(),
            "b"
        );
        match Envelope::decode_output(r#"{"type":"output"}"#) {
            Err(Error::MalformedMessage { .. }) => {}
            res => panic!("unexpected result: {:?}", res),
        }
        match Envelope::decode_output("hello") {
            Err(Error::MalformedMessage { .. }) => {}
            res => panic!("unexpected result: {:?}", res),
        }
    }

    #[test]
    fn test_text_decoder_split_character() {
        let bytes = "caf\u{e9} \u{1f600}".as_bytes();
        for split in 0..=bytes.len() {
            let mut decoder = TextDecoder::new();
            let mut text = decoder.decode(&bytes[..split]);
            text.push_str(&decoder.decode(&bytes[split..]));
            assert_eq!(text, "caf\u{e9} \u{1f600}");
            assert!(!decoder.has_pending());
        }
    }

    #[test]
    fn test_text_decoder_invalid_bytes() {
        let mut decoder = TextDecoder::new();
        assert_eq!(decoder.decode(b"a\xffb"), "a\u{fffd}b");
        assert_eq!(decoder.decode(b"\xe2\x82"), "");
        assert!(decoder.has_pending());
        assert_eq!(decoder.decode(b"\xac!"), "\u{20ac}!");
    }

    fn valid_envelopes() -> Vec<Envelope> {
        vec![
            Envelope::cmd("ls -la\n"),
            Envelope::cmd(""),
            Envelope::cmd("\x1b[A\x03"),
            Envelope::resize(crate::term::Size { rows: 24, cols: 80 }),
            Envelope::resize(crate::term::Size {
                rows: u16::MAX,
                cols: 1,
            }),
            Envelope::output("hello\r\n"),
            Envelope::output("\u{1f600} \"quoted\" \\"),
        ]
    }

    fn invalid_frames() -> Vec<&'static str> {
        vec![
            "",
            "hello",
            "[]",
            "{}",
            r#"{"data":"no type"}"#,
            r#"{"type":"bogus","data":"x"}"#,
            r#"{"type":"CMD","data":"x"}"#,
            r#"{"type":null,"data":"x"}"#,
            r#"{"type":"cmd"}"#,
            r#"{"type":"cmd","data":5}"#,
            r#"{"type":"resize","cols":80}"#,
            r#"{"type":"resize","cols":-1,"rows":24}"#,
            r#"{"type":"resize","cols":70000,"rows":24}"#,
            r#"{"type":"cmd","data":"x""#,
        ]
    }
}
