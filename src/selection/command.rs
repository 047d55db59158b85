use std::fmt;

/// Typed form of one line of selection input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionCommand {
    /// Zero-based indices into the displayed list, duplicates collapsed, input order kept
    SelectByIndices(Vec<usize>),
    SelectAllSafe,
    SelectAllNonDangerous,
    Refresh,
    Quit,
    Help,
    Invalid(String),
}

impl SelectionCommand {
    pub const HELP: &'static str = "\
Enter device numbers separated by spaces (e.g. 1 3 4), or one of:
  all-safe           select every SAFE device
  all-non-dangerous  select every SAFE or CAUTION device
  refresh | r        rescan devices
  help | h | ?       show this help
  quit | q           exit without wiping";

    /// Parse a line against a list of `list_len` displayed devices.
    ///
    /// Any bad token invalidates the whole line; nothing is partially applied.
    pub fn parse(input: &str, list_len: usize) -> Self {
        let trimmed = input.trim();

        match trimmed.to_ascii_lowercase().as_str() {
            "" => return SelectionCommand::Invalid("no selection entered".to_string()),
            "all-safe" => return SelectionCommand::SelectAllSafe,
            "all-non-dangerous" => return SelectionCommand::SelectAllNonDangerous,
            "refresh" | "r" => return SelectionCommand::Refresh,
            "quit" | "q" => return SelectionCommand::Quit,
            "help" | "h" | "?" => return SelectionCommand::Help,
            _ => {}
        }

        let mut indices = Vec::new();
        for token in trimmed.split_whitespace() {
            if !token.bytes().all(|b| b.is_ascii_digit()) {
                return SelectionCommand::Invalid(format!("'{}' is not a device number", token));
            }

            let number = match token.parse::<usize>() {
                Ok(n) if (1..=list_len).contains(&n) => n,
                _ => {
                    return SelectionCommand::Invalid(format!(
                        "{} is out of range (valid: 1-{})",
                        token, list_len
                    ))
                }
            };

            let index = number - 1;
            if !indices.contains(&index) {
                indices.push(index);
            }
        }

        SelectionCommand::SelectByIndices(indices)
    }
}

impl fmt::Display for SelectionCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionCommand::SelectByIndices(indices) => {
                let numbers: Vec<String> = indices.iter().map(|i| (i + 1).to_string()).collect();
                write!(f, "select {}", numbers.join(" "))
            }
            SelectionCommand::SelectAllSafe => write!(f, "all-safe"),
            SelectionCommand::SelectAllNonDangerous => write!(f, "all-non-dangerous"),
            SelectionCommand::Refresh => write!(f, "refresh"),
            SelectionCommand::Quit => write!(f, "quit"),
            SelectionCommand::Help => write!(f, "help"),
            SelectionCommand::Invalid(reason) => write!(f, "invalid ({})", reason),
        }
    }
}
