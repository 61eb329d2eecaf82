use devtoolkit_ipc::MessageKind;

/// Bot commands understood by the dispatcher. The argument is the trimmed rest
/// of the line, so names may contain spaces; it is `None` when left out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Commands,
    Save(Option<String>),
    Get(Option<String>),
    Format(Option<String>),
    HelpMe,
    List,
    Delete(Option<String>),
}

impl Command {
    /// Returns `None` for plain text and for commands the bot does not know.
    pub fn parse(kind: &MessageKind) -> Option<Self> {
        let MessageKind::Command { name, args } = kind else {
            return None;
        };

        let arg = || (!args.is_empty()).then(|| args.clone());
        let command = match name.as_str() {
            "start" => Command::Start,
            "commands" => Command::Commands,
            "save" => Command::Save(arg()),
            "get" => Command::Get(arg()),
            "format" => Command::Format(arg().map(|lang| lang.to_lowercase())),
            "helpme" => Command::HelpMe,
            "list" => Command::List,
            "delete" => Command::Delete(arg()),
            _ => return None,
        };
        Some(command)
    }
}
