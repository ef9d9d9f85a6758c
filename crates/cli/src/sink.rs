use std::io::Write;

use querygate_agent::ResultSink;
use querygate_core::PresentedResult;

/// Prints each presented answer to stdout as soon as the pipeline produces it.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConsoleSink;

impl ResultSink for ConsoleSink {
    fn emit(&self, result: &PresentedResult) {
        let mut stdout = std::io::stdout().lock();
        let _ = writeln!(stdout, "{}\n", result.text);
    }
}
