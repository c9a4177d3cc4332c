use crate::failure::Failure;
use std::io::{self, Write};
use std::path::Path;

/// Writes a failure transcript for terminals.
///
/// Output errors are returned to the caller; there is nothing below the
/// console to fall back to.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleRenderer {
    verbose: bool,
}

impl ConsoleRenderer {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    pub fn render(&self, out: &mut dyn Write, failure: &Failure) -> io::Result<()> {
        for failure in std::iter::once(failure).chain(failure.causes()) {
            self.write_block(out, failure)?;
        }

        if self.verbose {
            let frames = failure.frames();
            if !frames.is_empty() {
                writeln!(out, "Exception trace:")?;
                writeln!(out)?;
                for frame in frames {
                    writeln!(out, "  #{} {}", frame.index, frame.function)?;
                    if let (Some(file), Some(line)) = (&frame.file, frame.line) {
                        writeln!(out, "      at {}:{}", file, line)?;
                    }
                }
                writeln!(out)?;
            }
        }

        out.flush()
    }

    fn write_block(&self, out: &mut dyn Write, failure: &Failure) -> io::Result<()> {
        let location = failure.location();
        let file = if self.verbose {
            location.file()
        } else {
            Path::new(location.file())
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or(location.file())
        };

        let title = format!("[{}]", failure.kind().name());
        let lines: Vec<&str> = std::iter::once(title.as_str())
            .chain(failure.message().lines())
            .collect();
        let width = lines
            .iter()
            .map(|line| line.chars().count())
            .max()
            .unwrap_or_default();
        let blank = " ".repeat(width + 4);

        writeln!(out)?;
        writeln!(out, "In {} line {}:", file, location.line())?;
        writeln!(out)?;
        writeln!(out, "{}", blank)?;
        for line in lines {
            writeln!(out, "  {:<width$}  ", line, width = width)?;
        }
        writeln!(out, "{}", blank)?;
        writeln!(out)
    }
}
