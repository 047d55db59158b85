// Final confirmation before any device is touched
//
// The phrase the operator must type grows with the most severe level in the
// selection. A mismatch aborts the whole pending run.

use crate::safety::SafetyLevel;
use crate::selection::SelectionSet;
use crate::{WipeError, WipeResult};
use std::io::{BufRead, Write};
use tracing::{info, warn};

pub struct ConfirmationGate;

impl ConfirmationGate {
    pub const SAFE_PHRASE: &'static str = "WIPE DRIVES";
    pub const CAUTION_PHRASE: &'static str = "I WANT TO WIPE THESE DRIVES";
    pub const DANGEROUS_PHRASE: &'static str =
        "I UNDERSTAND THE RISKS AND WANT TO WIPE DANGEROUS DRIVES";

    pub fn phrase_for_level(level: SafetyLevel) -> &'static str {
        match level {
            SafetyLevel::Safe => Self::SAFE_PHRASE,
            SafetyLevel::Caution => Self::CAUTION_PHRASE,
            SafetyLevel::Dangerous | SafetyLevel::System => Self::DANGEROUS_PHRASE,
        }
    }

    /// Phrase for the worst level in the selection. An empty selection asks
    /// for the strictest phrase.
    pub fn required_phrase(selection: &SelectionSet) -> &'static str {
        Self::phrase_for_level(selection.max_level().unwrap_or(SafetyLevel::System))
    }

    /// Exact, case-sensitive match after trimming surrounding whitespace
    pub fn confirm(selection: &SelectionSet, input: &str) -> bool {
        input.trim() == Self::required_phrase(selection)
    }

    /// Show the selection, ask for the phrase and validate the answer
    pub fn prompt<R: BufRead, W: Write>(
        selection: &SelectionSet,
        input: &mut R,
        out: &mut W,
    ) -> WipeResult<()> {
        let phrase = Self::required_phrase(selection);

        writeln!(out)?;
        writeln!(out, "The following devices will be PERMANENTLY erased:")?;
        for entry in selection.devices() {
            writeln!(
                out,
                "  {:<16} {:<24} [{}]",
                entry.device.path,
                entry.device.display_model(),
                entry.level()
            )?;
        }
        writeln!(out)?;
        writeln!(out, "This cannot be undone. Type exactly:")?;
        writeln!(out, "  {}", phrase)?;
        write!(out, "> ")?;
        out.flush()?;

        let mut answer = String::new();
        input.read_line(&mut answer)?;

        if Self::confirm(selection, &answer) {
            info!(devices = ?selection.paths(), "Wipe confirmed");
            Ok(())
        } else {
            warn!("Confirmation phrase mismatch, run aborted");
            Err(WipeError::ConfirmationMismatch)
        }
    }
}
