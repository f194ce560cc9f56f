#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashCommand {
    Help,
    /// `/model` shows the current model, `/model <name>` switches.
    Model(Option<String>),
    Models,
    Clear,
    Last,
    Status,
    Quit,
    Unknown(String),
}

pub const HELP_LINES: &[&str] = &[
    "/help          show this help",
    "/model [name]  show or switch the model",
    "/models        list models served by the server",
    "/clear         forget the conversation",
    "/last          print the last reply",
    "/status        show model and history length",
    "/quit          leave (Ctrl-C at the prompt does the same)",
    "Ctrl-C while a reply streams cancels it.",
];

pub fn parse_slash_command(input: &str) -> Option<SlashCommand> {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return None;
    }

    let mut words = trimmed.split_whitespace();
    let command = words.next().unwrap_or(trimmed).to_string();
    let argument = words.next().map(ToOwned::to_owned);

    let parsed = match command.as_str() {
        "/help" => SlashCommand::Help,
        "/model" => SlashCommand::Model(argument),
        "/models" => SlashCommand::Models,
        "/clear" => SlashCommand::Clear,
        "/last" => SlashCommand::Last,
        "/status" => SlashCommand::Status,
        "/quit" | "/exit" => SlashCommand::Quit,
        _ => SlashCommand::Unknown(command),
    };

    Some(parsed)
}
