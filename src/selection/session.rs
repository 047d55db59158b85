use super::{ClassifiedDevice, DeviceSource, SelectionCommand, SelectionSet};
use crate::safety::SafetyLevel;
use crate::ui::table::render_device_table;
use crate::WipeResult;
use std::io::{BufRead, Write};
use tracing::{debug, info, warn};

/// States of one selection round. `Accepted` and `Quit` are terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    ShowList { error: Option<String> },
    AwaitInput,
    Validating(SelectionCommand),
    Refresh,
    Accepted(SelectionSet),
    Quit,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Accepted(_) | SessionState::Quit)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    Accepted(SelectionSet),
    Quit,
}

pub struct SelectionSession<'a, S: DeviceSource> {
    source: &'a mut S,
    devices: Vec<ClassifiedDevice>,
}

impl<'a, S: DeviceSource> SelectionSession<'a, S> {
    pub const ACKNOWLEDGEMENT: &'static str = "YES";

    /// Start a round over an already scanned device list
    pub fn new(source: &'a mut S, devices: Vec<ClassifiedDevice>) -> Self {
        Self { source, devices }
    }

    /// Devices as last displayed
    pub fn devices(&self) -> &[ClassifiedDevice] {
        &self.devices
    }

    /// Drive the state machine from `ShowList` until a terminal state.
    /// End of input counts as quit.
    pub fn run<R: BufRead, W: Write>(
        &mut self,
        input: &mut R,
        out: &mut W,
    ) -> WipeResult<SessionOutcome> {
        let mut state = SessionState::ShowList { error: None };

        loop {
            state = match state {
                SessionState::Accepted(selection) => return Ok(SessionOutcome::Accepted(selection)),
                SessionState::Quit => return Ok(SessionOutcome::Quit),
                other => self.step(other, input, out)?,
            };
        }
    }

    /// Perform one transition
    pub fn step<R: BufRead, W: Write>(
        &mut self,
        state: SessionState,
        input: &mut R,
        out: &mut W,
    ) -> WipeResult<SessionState> {
        let next = match state {
            SessionState::ShowList { error } => {
                self.refresh_assessments();
                writeln!(out)?;
                write!(out, "{}", render_device_table(&self.devices))?;
                if let Some(message) = error {
                    writeln!(out, "Error: {}", message)?;
                }
                SessionState::AwaitInput
            }

            SessionState::AwaitInput => {
                write!(out, "Select devices (help for commands): ")?;
                out.flush()?;
                match read_line(input)? {
                    None => SessionState::Quit,
                    Some(line) => SessionState::Validating(SelectionCommand::parse(
                        &line,
                        self.devices.len(),
                    )),
                }
            }

            SessionState::Validating(command) => self.validate(command, input, out)?,

            SessionState::Refresh => match self.source.scan() {
                Ok(devices) => {
                    info!(count = devices.len(), "Device list refreshed");
                    self.devices = devices;
                    SessionState::ShowList { error: None }
                }
                Err(e) => {
                    warn!(error = %e, "Refresh failed");
                    self.devices.clear();
                    SessionState::ShowList {
                        error: Some(format!("refresh failed: {}", e)),
                    }
                }
            },

            terminal => terminal,
        };

        debug!(state = ?next, "Selection state");
        Ok(next)
    }

    // Assessments never outlive one display
    fn refresh_assessments(&mut self) {
        let devices: Vec<_> = self.devices.iter().map(|c| c.device.clone()).collect();
        match self.source.reassess(&devices) {
            Ok(classified) => self.devices = classified,
            Err(e) => warn!(error = %e, "Reassessment failed, showing previous assessments"),
        }
    }

    fn validate<R: BufRead, W: Write>(
        &mut self,
        command: SelectionCommand,
        input: &mut R,
        out: &mut W,
    ) -> WipeResult<SessionState> {
        let selection = match command {
            SelectionCommand::Invalid(reason) => {
                return Ok(SessionState::ShowList {
                    error: Some(reason),
                })
            }
            SelectionCommand::Help => {
                writeln!(out, "{}", SelectionCommand::HELP)?;
                return Ok(SessionState::AwaitInput);
            }
            SelectionCommand::Quit => return Ok(SessionState::Quit),
            SelectionCommand::Refresh => return Ok(SessionState::Refresh),

            SelectionCommand::SelectAllSafe => self.select_where(|level| level == SafetyLevel::Safe),
            SelectionCommand::SelectAllNonDangerous => {
                self.select_where(|level| level <= SafetyLevel::Caution)
            }
            SelectionCommand::SelectByIndices(indices) => {
                match self.select_indices(&indices, input, out)? {
                    Some(selection) => selection,
                    None => return Ok(SessionState::Quit),
                }
            }
        };

        if selection.is_empty() {
            return Ok(SessionState::ShowList {
                error: Some("no devices selected".to_string()),
            });
        }

        info!(devices = ?selection.paths(), "Selection accepted");
        Ok(SessionState::Accepted(selection))
    }

    fn select_where(&self, keep: impl Fn(SafetyLevel) -> bool) -> SelectionSet {
        self.devices
            .iter()
            .filter(|d| keep(d.level()))
            .cloned()
            .collect()
    }

    /// `None` when input ends during an acknowledgement prompt
    fn select_indices<R: BufRead, W: Write>(
        &self,
        indices: &[usize],
        input: &mut R,
        out: &mut W,
    ) -> WipeResult<Option<SelectionSet>> {
        let mut selection = SelectionSet::new();
        let mut declined = Vec::new();

        for &index in indices {
            let Some(candidate) = self.devices.get(index) else {
                continue;
            };

            if candidate.level() == SafetyLevel::System {
                writeln!(
                    out,
                    "{} is a SYSTEM device ({}).",
                    candidate.path(),
                    candidate.assessment.reason_summary()
                )?;
                write!(
                    out,
                    "Type {} to include it anyway: ",
                    Self::ACKNOWLEDGEMENT
                )?;
                out.flush()?;

                match read_line(input)? {
                    None => return Ok(None),
                    Some(answer) if answer.trim() == Self::ACKNOWLEDGEMENT => {
                        warn!(device = %candidate.path(), "SYSTEM device acknowledged for wipe");
                    }
                    Some(_) => {
                        declined.push(candidate.path().to_string());
                        continue;
                    }
                }
            }

            selection.insert(candidate.clone());
        }

        if !declined.is_empty() {
            writeln!(out, "Skipped (not acknowledged): {}", declined.join(", "))?;
        }

        Ok(Some(selection))
    }
}

fn read_line<R: BufRead>(input: &mut R) -> WipeResult<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line))
}
