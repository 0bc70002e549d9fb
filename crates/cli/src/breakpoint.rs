use std::str::FromStr;

/// A `FILE:LINE` breakpoint given on the command line. The line is
/// one-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakpointArg {
    pub file: String,
    pub line: u32,
}

impl BreakpointArg {
    pub fn to_breakpoint(&self) -> debugger::Breakpoint {
        debugger::Breakpoint::new(self.file.clone(), self.line.saturating_sub(1), 0)
    }
}

impl FromStr for BreakpointArg {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // split from the right so Windows drive letters survive
        let Some((file, line)) = s.rsplit_once(':') else {
            eyre::bail!("expected FILE:LINE, got {s:?}");
        };
        if file.is_empty() {
            eyre::bail!("missing file name in {s:?}");
        }
        let line: u32 = line
            .parse()
            .map_err(|_| eyre::eyre!("invalid line number {line:?}"))?;
        if line == 0 {
            eyre::bail!("line numbers start at 1");
        }
        Ok(Self {
            file: file.to_string(),
            line,
        })
    }
}
