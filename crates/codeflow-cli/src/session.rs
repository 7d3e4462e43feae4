use crate::console::{self, InputSource};
use crate::context::AppContext;
use crate::menu;
use codeflow_ai::ChatSession;
use tracing::info;

/// What the operator asked for on one REPL line
#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Quit,
    Menu,
    Chat(&'a str),
    Nothing,
}

fn parse_command(line: &str) -> Command<'_> {
    match line.trim() {
        "" => Command::Nothing,
        "quit" => Command::Quit,
        "menu" => Command::Menu,
        text => Command::Chat(text),
    }
}

/// Interactive loop: free text goes to the LLM as a streamed chat turn,
/// `menu` opens the menu tree and `quit` exits.
pub async fn run_repl(ctx: &AppContext, input: &mut dyn InputSource) {
    let mut chat = ChatSession::new(ctx.llm.clone());
    console::agent("Type a message to chat, 'menu' for tools, prompts and workflows, or 'quit' to exit.");

    while let Some(line) = input.read_message() {
        match parse_command(&line) {
            Command::Nothing => continue,
            Command::Quit => break,
            Command::Menu => menu::main_menu(ctx, input).await,
            Command::Chat(text) => {
                console::llm_stream_start();
                let outcome = chat.send(text, console::llm_fragment).await;
                console::llm_stream_end();

                if outcome.reply.is_none() {
                    console::agent("No response from the LLM; see the log for details.");
                }
            }
        }
    }

    info!(messages = chat.history().len(), "Chat session ended");
    console::agent("Goodbye.");
}
