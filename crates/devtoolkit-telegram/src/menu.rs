//! Static bot texts: welcome screen, command list, usage hints

/// `(command, description)` pairs registered with `setMyCommands`.
pub const BOT_COMMANDS: &[(&str, &str)] = &[
    ("start", "Welcome and overview"),
    ("save", "Save a code snippet: /save <name>"),
    ("get", "Retrieve a snippet: /get <name>"),
    ("format", "Format code with AI: /format <language>"),
    ("helpme", "Paste an error and get AI help"),
    ("list", "List your saved snippets"),
    ("delete", "Delete a snippet: /delete <name>"),
    ("commands", "List of commands"),
];

pub fn welcome_text() -> String {
    "👋 Welcome to *Dev Toolkit Bot* 🛠️\n\n\
     Here's what I can do:\n\
     💾 /save <name> – Save a code snippet\n\
     📂 /get <name> – Retrieve your snippet\n\
     🎨 /format <language> – Format code (Python, JS, etc.)\n\
     🧠 /helpme – Paste your error and get AI help\n\
     📚 /commands – List of commands\n\
     📜 /list – List your saved snippets\n\
     🗑️ /delete <name> – Delete a snippet"
        .to_string()
}

pub fn commands_text() -> String {
    "📚 *Dev Toolkit Commands*:\n\n\
     💾 /save <name> – Save your code snippet\n\
     📂 /get <name> – Retrieve a saved snippet\n\
     🎨 /format <language> – Format code in any language\n\
     🧠 /helpme – Get AI help for code errors\n\
     📜 /list – List all your saved snippets\n\
     🗑️ /delete <name> – Delete a snippet"
        .to_string()
}

pub fn usage_text(command: &str, argument: &str) -> String {
    format!("ℹ️ Usage: /{} <{}>", command, argument)
}
