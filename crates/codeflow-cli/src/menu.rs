// ABOUTME: Menu tree for listing and invoking remote tools, prompts and workflows
// ABOUTME: Every failure is reported on the console and the menu keeps running

use crate::console::{self, InputSource};
use crate::context::AppContext;
use codeflow_ai::complete_prompt;
use codeflow_mcp::{
    safe_call, workflows, ProgressHandler, ProgressUpdate, PromptInfo, PromptPair, ToolServer,
    WorkflowParams,
};
use std::sync::Arc;

pub async fn main_menu(ctx: &AppContext, input: &mut dyn InputSource) {
    loop {
        console::menu("\n=== Main Menu ===");
        console::menu("1. Tools");
        console::menu("2. Prompts");
        console::menu("3. Workflows");
        console::menu("4. Back");

        let Some(selection) = input.read_line("Select an option or 'b' to go back:") else {
            return;
        };
        match selection.to_lowercase().as_str() {
            "1" => tools_menu(ctx, input).await,
            "2" => prompts_menu(ctx, input).await,
            "3" => workflows_menu(ctx, input).await,
            "4" | "b" => {
                console::agent("Returning to main.");
                return;
            }
            _ => console::agent("Invalid selection. Please try again."),
        }
    }
}

/// Connected server that answered a ping, or a console message naming `what`
async fn live_server<'a>(ctx: &'a AppContext, what: &str) -> Option<&'a Arc<dyn ToolServer>> {
    let server = match ctx.server().await {
        Ok(server) => server,
        Err(e) => {
            console::agent(&format!("Could not retrieve {}:\n{}", what, e));
            return None;
        }
    };
    if let Err(e) = server.ping().await {
        console::agent(&format!("Could not retrieve {}:\n{}", what, e));
        return None;
    }
    Some(server)
}

fn progress_printer() -> ProgressHandler {
    Arc::new(|update: ProgressUpdate| {
        let total = update
            .total
            .map(|t| format!("/{}", t))
            .unwrap_or_default();
        let message = update.message.unwrap_or_default();
        console::agent(&format!("Progress {}{} {}", update.progress, total, message));
    })
}

pub async fn tools_menu(ctx: &AppContext, input: &mut dyn InputSource) {
    let Some(server) = live_server(ctx, "tools").await else {
        return;
    };
    let tools = match server.list_tools().await {
        Ok(tools) => tools,
        Err(e) => {
            console::agent(&format!("Could not retrieve tools:\n{}", e));
            return;
        }
    };

    loop {
        console::menu("\n=== Available Tools ===");
        for (idx, tool) in tools.iter().enumerate() {
            console::menu(&format!(
                "{}. {}: {}",
                idx + 1,
                tool.name,
                tool.description.as_deref().unwrap_or("")
            ));
        }

        let Some(selection) = input.read_line("Select a tool number or 'b' to go back:") else {
            return;
        };
        if selection.eq_ignore_ascii_case("b") {
            return;
        }
        let Some(index) = console::parse_selection(&selection, tools.len()) else {
            console::agent("Invalid selection.");
            continue;
        };

        let tool = &tools[index];
        let Some(arguments) = console::collect_tool_arguments(tool, input) else {
            continue;
        };

        match safe_call::call_tool(
            server.as_ref(),
            &tool.name,
            arguments,
            ctx.tool_timeout(),
            Some(progress_printer()),
        )
        .await
        {
            Ok(items) => {
                for item in items {
                    match item.text {
                        Some(text) => console::agent(&format!("Tool result: {}", text)),
                        None => console::agent("Tool result: <non-text content>"),
                    }
                }
            }
            Err(e) => console::agent(&format!("Exception running tool: {}", e)),
        }
    }
}

pub async fn prompts_menu(ctx: &AppContext, input: &mut dyn InputSource) {
    let Some(server) = live_server(ctx, "prompts").await else {
        return;
    };
    let prompts = match server.list_prompts().await {
        Ok(prompts) => prompts,
        Err(e) => {
            console::agent(&format!("Could not retrieve prompts:\n{}", e));
            return;
        }
    };

    loop {
        console::menu("\n=== Prompts Menu ===");
        for (idx, prompt) in prompts.iter().enumerate() {
            console::menu(&format!(
                "{}. {}: {}",
                idx + 1,
                prompt.name,
                prompt.description.as_deref().unwrap_or("")
            ));
        }

        let Some(selection) = input.read_line("Select a prompt number or 'b' to go back:") else {
            return;
        };
        if selection.eq_ignore_ascii_case("b") {
            return;
        }
        let Some(index) = console::parse_selection(&selection, prompts.len()) else {
            console::agent("Invalid selection. Please enter a valid number or 'b'.");
            continue;
        };

        prompt_actions(ctx, server, &prompts[index], index + 1, input).await;
    }
}

async fn prompt_actions(
    ctx: &AppContext,
    server: &Arc<dyn ToolServer>,
    prompt: &PromptInfo,
    number: usize,
    input: &mut dyn InputSource,
) {
    loop {
        console::menu(&format!("\n=== Prompt {}: {} ===", number, prompt.name));
        console::menu("1. Show prompt text");
        console::menu("2. Run prompt with LLM");
        console::menu("b. Back");

        let Some(action) = input.read_line("Select an action:") else {
            return;
        };
        let action = action.to_lowercase();
        if action == "b" {
            return;
        }
        if action != "1" && action != "2" {
            console::agent("Invalid selection. Please choose 1, 2, or b.");
            continue;
        }

        let Some(arguments) = console::collect_prompt_arguments(prompt, input) else {
            continue;
        };
        let reply = match safe_call::get_prompt(server.as_ref(), &prompt.name, arguments).await {
            Ok(reply) => reply,
            Err(e) => {
                console::agent(&format!("Error getting prompt: {}", e));
                continue;
            }
        };
        let prompt_text = reply.extract_text();

        if action == "1" {
            let pair = serde_json::from_str(&prompt_text)
                .ok()
                .and_then(|value| PromptPair::from_value(&value));
            match pair {
                Some(pair) => console::prompt_pair(&pair.system_prompt, &pair.llm_prompt),
                None => console::agent(&format!("Prompt text:\n{}", prompt_text)),
            }
        } else {
            match complete_prompt(ctx.llm.as_ref(), &prompt_text, &ctx.generation_config()).await {
                Some(response) => console::llm(&response),
                None => console::agent("The LLM call failed; see the log for details."),
            }
        }
    }
}

pub async fn workflows_menu(ctx: &AppContext, input: &mut dyn InputSource) {
    let registry = workflows();
    console::menu("\n=== Workflows ===");
    for (idx, workflow) in registry.iter().enumerate() {
        console::menu(&format!("{}. {} - {}", idx + 1, workflow.name, workflow.description));
    }

    let Some(selection) = input.read_line("Select a workflow number or 'b' to go back:") else {
        return;
    };
    if selection.eq_ignore_ascii_case("b") {
        return;
    }
    let Some(index) = console::parse_selection(&selection, registry.len()) else {
        console::agent("Invalid selection.");
        return;
    };

    let workflow = &registry[index];
    let mut params = WorkflowParams::new();
    for param in workflow.params {
        let Some(value) = input.read_line(&format!("Enter value for {}:", param)) else {
            return;
        };
        params.insert(*param, value);
    }

    let tasks = match ctx.tasks().await {
        Ok(tasks) => tasks,
        Err(e) => {
            console::agent(&format!("Could not connect to the server:\n{}", e));
            return;
        }
    };

    match workflow.run(&tasks, &params).await {
        Ok(result) => {
            console::agent(&format!("Workflow '{}' completed:", workflow.name));
            println!(
                "{}",
                serde_json::to_string_pretty(&result).unwrap_or_else(|_| result.to_string())
            );
        }
        Err(e) => console::agent(&e.to_string()),
    }
}
