use crate::session::TaskKind;

#[derive(Clone, Copy, Debug)]
pub(crate) struct CommandSpec {
    pub command: &'static str,
    pub action: &'static str,
}

pub(crate) const UPLOAD_COMMANDS: &[(&str, TaskKind)] = &[
    ("food", TaskKind::Food),
    ("meal", TaskKind::Food),
    ("equipment", TaskKind::Equipment),
    ("gear", TaskKind::Equipment),
];

pub(crate) const NO_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "clear",
        action: "clear",
    },
    CommandSpec {
        command: "history",
        action: "history",
    },
    CommandSpec {
        command: "help",
        action: "help",
    },
    CommandSpec {
        command: "quit",
        action: "quit",
    },
    CommandSpec {
        command: "exit",
        action: "quit",
    },
];

pub const CHAT_HELP_COMMANDS: &[(&str, &str)] = &[
    ("/food <path>", "analyze a meal photo (jpg, jpeg, png)"),
    ("/equipment <path>", "identify gym equipment (jpg, jpeg, png)"),
    ("/history", "list your messages so far"),
    ("/clear", "clear the chat"),
    ("/help", "show this help"),
    ("/quit", "leave the chat"),
];
