use std::io::Write;

use im_notifier::{IndicatorSink, IndicatorView};

/// Writes every indicator change as a single line of JSON, e.g.
/// `{"visible":true,"classes":["pidgin-notification"],"contributors":["purple"],"click_target":{...}}`.
pub struct JsonLineSink<W: Write> {
    out: W,
}

impl<W: Write> JsonLineSink<W> {
    pub fn new(out: W) -> Self {
        JsonLineSink { out }
    }
}

impl JsonLineSink<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> IndicatorSink for JsonLineSink<W> {
    fn render(&mut self, view: &IndicatorView) {
        let result = (|| -> anyhow::Result<()> {
            serde_json::to_writer(&mut self.out, view)?;
            self.out.write_all(b"\n")?;
            self.out.flush()?;
            Ok(())
        })();
        crate::print_result_err!("while writing indicator state", result);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use im_notifier::{ClickTarget, BackendTag};

    #[test]
    fn test_writes_one_line_per_view() {
        let mut sink = JsonLineSink::new(Vec::new());
        sink.render(&IndicatorView::default());
        sink.render(&IndicatorView {
            visible: true,
            classes: vec!["pidgin-notification"],
            contributors: vec![BackendTag("purple")],
            click_target: Some(ClickTarget {
                backend: BackendTag("purple"),
                app_id: "pidgin.desktop",
                window_role: Some("conversation"),
            }),
        });

        let output = String::from_utf8(sink.out).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines[0], r#"{"visible":false,"classes":[],"contributors":[],"click_target":null}"#);
        assert_eq!(
            lines[1],
            r#"{"visible":true,"classes":["pidgin-notification"],"contributors":["purple"],"click_target":{"backend":"purple","app_id":"pidgin.desktop","window_role":"conversation"}}"#
        );
    }
}
