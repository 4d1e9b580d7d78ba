//! Stdout rendering of streamed responses

use std::io::{self, Write};

use conduit_llm::{ResponseSink, ToolInvocation};

/// Writes text as it arrives and each tool call as one JSON line
pub struct StdoutSink<W> {
    out: W,
    mid_line: bool,
    error: Option<io::Error>,
}

impl<W: Write> StdoutSink<W> {
    pub const fn new(out: W) -> Self {
        Self {
            out,
            mid_line: false,
            error: None,
        }
    }

    /// End a partial line and surface the first write failure
    pub fn finish(mut self) -> io::Result<()> {
        if self.mid_line {
            self.write(|out| out.write_all(b"\n"));
        }

        match self.error {
            Some(e) => Err(e),
            None => self.out.flush(),
        }
    }

    fn write(&mut self, op: impl FnOnce(&mut W) -> io::Result<()>) {
        if self.error.is_some() {
            return;
        }
        if let Err(e) = op(&mut self.out).and_then(|()| self.out.flush()) {
            self.error = Some(e);
        }
    }
}

impl<W: Write + Send> ResponseSink for StdoutSink<W> {
    fn on_text(&mut self, text: &str) {
        self.write(|out| out.write_all(text.as_bytes()));
        if !text.is_empty() {
            self.mid_line = !text.ends_with('\n');
        }
    }

    fn on_tool_call(&mut self, call: ToolInvocation) {
        let line = match serde_json::to_string(&call) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(error = %e, id = %call.id, "failed to render tool call");
                return;
            }
        };

        let newline = if self.mid_line { "\n" } else { "" };
        self.write(|out| writeln!(out, "{newline}{line}"));
        self.mid_line = false;
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn render(events: impl FnOnce(&mut StdoutSink<&mut Vec<u8>>)) -> String {
        let mut buffer = Vec::new();
        let mut sink = StdoutSink::new(&mut buffer);
        events(&mut sink);
        sink.finish().unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn text_then_tool_call_on_separate_lines() {
        let output = render(|sink| {
            sink.on_text("Reading");
            sink.on_text(" it.");
            sink.on_tool_call(ToolInvocation {
                id: "call_1".to_owned(),
                name: "read_file".to_owned(),
                arguments: json!({"path": "a.txt"}),
            });
        });

        assert_eq!(
            output,
            "Reading it.\n{\"id\":\"call_1\",\"name\":\"read_file\",\"arguments\":{\"path\":\"a.txt\"}}\n"
        );
    }

    #[test]
    fn terminates_trailing_text() {
        assert_eq!(render(|sink| sink.on_text("hello")), "hello\n");
        assert_eq!(render(|sink| sink.on_text("hello\n")), "hello\n");
    }
}
