//! Progress display for pipeline cycles, and a log writer that prints above
//! the bar instead of through it.

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::{self, Write};
use std::sync::OnceLock;
use std::time::Duration;
use tracing_subscriber::fmt::MakeWriter;

static BARS: OnceLock<MultiProgress> = OnceLock::new();

fn bars() -> &'static MultiProgress {
    BARS.get_or_init(|| MultiProgress::with_draw_target(ProgressDrawTarget::stderr_with_hz(10)))
}

/// Bar tracking the items of one processing cycle
pub struct CycleProgress {
    bar: Option<ProgressBar>,
}

impl CycleProgress {
    /// Start a bar for `len` items; hidden when there is nothing to show
    pub fn start(len: usize, enabled: bool) -> Self {
        if len == 0 || !enabled {
            return Self { bar: None };
        }

        let bar = bars().add(ProgressBar::new(len as u64));
        if let Ok(style) = ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg}",
        ) {
            bar.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
        }
        bar.set_message("Processing videos");
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar: Some(bar) }
    }

    pub fn advance(&self, label: &str) {
        if let Some(bar) = &self.bar {
            bar.set_message(label.to_string());
            bar.inc(1);
        }
    }

    pub fn finish(self, message: &str) {
        if let Some(bar) = self.bar {
            bar.finish_with_message(message.to_string());
        }
    }
}

/// `MakeWriter` for `tracing-subscriber` that routes lines through the bars
#[derive(Default, Clone)]
pub struct LogWriterFactory;

/// Buffers one event and prints complete lines
pub struct LogWriter {
    pending: Vec<u8>,
}

impl LogWriter {
    fn emit_complete_lines(&mut self) {
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            print_line(&line[..line.len() - 1]);
        }
    }
}

fn print_line(raw: &[u8]) {
    let line = String::from_utf8_lossy(raw);
    let line = line.trim_end_matches('\r');
    if bars().is_hidden() {
        let _ = writeln!(io::stderr(), "{}", line);
    } else {
        let _ = bars().println(line);
    }
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        self.emit_complete_lines();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.emit_complete_lines();
        if !self.pending.is_empty() {
            let rest = std::mem::take(&mut self.pending);
            print_line(&rest);
        }
        Ok(())
    }
}

impl Drop for LogWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

impl<'a> MakeWriter<'a> for LogWriterFactory {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogWriter {
            pending: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_progress_is_inert() {
        let progress = CycleProgress::start(3, false);
        progress.advance("one");
        progress.finish("done");

        let empty = CycleProgress::start(0, true);
        assert!(empty.bar.is_none());
    }

    #[test]
    fn test_writer_accepts_partial_lines() {
        let mut writer = LogWriterFactory.make_writer();
        assert_eq!(writer.write(b"partial").unwrap(), 7);
        assert_eq!(writer.pending, b"partial");
        writer.write_all(b" line\nnext").unwrap();
        assert_eq!(writer.pending, b"next");
        writer.flush().unwrap();
        assert!(writer.pending.is_empty());
    }
}
