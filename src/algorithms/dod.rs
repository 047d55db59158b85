use std::fmt;

/// Content written by one overwrite pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassPattern {
    Random,
    Zero,
}

impl PassPattern {
    pub fn description(&self) -> &'static str {
        match self {
            PassPattern::Random => "random data",
            PassPattern::Zero => "zero fill",
        }
    }
}

impl fmt::Display for PassPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

pub struct DoDWipe;

impl DoDWipe {
    pub const STANDARD: &'static str = "DoD 5220.22-M (3 passes + zero)";

    /// Three random passes followed by a final zero pass, run strictly in order
    pub const PASSES: [PassPattern; 4] = [
        PassPattern::Random,
        PassPattern::Random,
        PassPattern::Random,
        PassPattern::Zero,
    ];

    pub const PASS_COUNT: usize = Self::PASSES.len();

    /// Pass label as written to reports and the monitor, 1-based
    pub fn pass_label(pass: usize) -> String {
        match pass.checked_sub(1).and_then(|i| Self::PASSES.get(i)) {
            Some(pattern) => format!("Pass {}/{}: {}", pass, Self::PASS_COUNT, pattern),
            None => format!("Pass {}/{}", pass, Self::PASS_COUNT),
        }
    }
}
