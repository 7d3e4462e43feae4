// ABOUTME: Colored console output and operator input for the interactive agent
// ABOUTME: Input is read through InputSource so menu logic can run against scripted input

use codeflow_mcp::{PromptInfo, ToolInfo};
use colored::Colorize;
use serde_json::{Map, Value};
use std::io::{self, BufRead, Write};

pub fn agent(message: &str) {
    println!("{} {}", "[Agent]".green(), message);
}

pub fn menu(message: &str) {
    println!("{} {}", "[Menu]".yellow(), message);
}

pub fn llm(message: &str) {
    println!("{} {}", "[LLM]".magenta(), message);
}

/// Print one streamed fragment without a line break
pub fn llm_fragment(fragment: &str) {
    print!("{}", fragment);
    let _ = io::stdout().flush();
}

pub fn llm_stream_start() {
    print!("{} ", "[LLM]".magenta());
    let _ = io::stdout().flush();
}

pub fn llm_stream_end() {
    println!();
}

pub fn prompt_pair(system_prompt: &str, llm_prompt: &str) {
    println!("{}\n{}\n", "System Prompt:".green(), system_prompt);
    println!("{}\n{}\n", "LLM Prompt:".cyan(), llm_prompt);
}

/// Source of operator input lines
pub trait InputSource {
    /// Show `prompt` and read one trimmed line; `None` at end of input
    fn read_line(&mut self, prompt: &str) -> Option<String>;

    /// Read a free-form chat message from the operator
    fn read_message(&mut self) -> Option<String> {
        self.read_line("")
    }
}

/// Interactive input from the terminal
pub struct StdinInput {
    stdin: io::Stdin,
}

impl StdinInput {
    pub fn new() -> Self {
        Self { stdin: io::stdin() }
    }
}

impl Default for StdinInput {
    fn default() -> Self {
        Self::new()
    }
}

impl StdinInput {
    fn next_line(&mut self) -> Option<String> {
        let _ = io::stdout().flush();
        let mut line = String::new();
        match self.stdin.lock().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim().to_string()),
        }
    }
}

impl InputSource for StdinInput {
    fn read_line(&mut self, prompt: &str) -> Option<String> {
        print!("{} {} ", "[Agent]".green(), prompt);
        self.next_line()
    }

    fn read_message(&mut self) -> Option<String> {
        print!("{} ", "[User]".blue());
        self.next_line()
    }
}

fn argument_prompt(name: &str, required: bool, description: Option<&str>) -> String {
    let mut prompt = format!("Enter value for {}", name);
    if let Some(description) = description.filter(|d| !d.is_empty()) {
        prompt.push_str(&format!(" ({})", description));
    }
    prompt.push_str(if required { " (required):" } else { ":" });
    prompt
}

/// Ask for each argument in order. A required argument left empty cancels
/// the whole invocation; empty optional arguments are omitted.
fn collect_arguments<'a>(
    input: &mut dyn InputSource,
    arguments: impl Iterator<Item = (&'a str, bool, Option<&'a str>)>,
) -> Option<Map<String, Value>> {
    let mut collected = Map::new();

    for (name, required, description) in arguments {
        let value = input.read_line(&argument_prompt(name, required, description))?;
        if value.is_empty() {
            if required {
                agent(&format!("{} is required.", name));
                return None;
            }
            continue;
        }
        collected.insert(name.to_string(), Value::String(value));
    }

    Some(collected)
}

/// Arguments for a tool, driven by its input schema
pub fn collect_tool_arguments(tool: &ToolInfo, input: &mut dyn InputSource) -> Option<Map<String, Value>> {
    let names = tool.property_names();
    collect_arguments(
        input,
        names.iter().map(|name| {
            (
                name.as_str(),
                tool.is_required(name),
                tool.property_description(name),
            )
        }),
    )
}

/// Arguments for a prompt, driven by its declared arguments
pub fn collect_prompt_arguments(prompt: &PromptInfo, input: &mut dyn InputSource) -> Option<Map<String, Value>> {
    if !prompt.arguments.is_empty() {
        agent(&format!("Please provide argument values for '{}':", prompt.name));
    }
    collect_arguments(
        input,
        prompt
            .arguments
            .iter()
            .map(|arg| (arg.name.as_str(), arg.required, arg.description.as_deref())),
    )
}

/// Parse a 1-based menu selection against a list of `len` entries
pub fn parse_selection(selection: &str, len: usize) -> Option<usize> {
    selection
        .trim()
        .parse::<usize>()
        .ok()
        .filter(|n| (1..=len).contains(n))
        .map(|n| n - 1)
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedInput;
    use super::*;
    use codeflow_mcp::PromptArgumentInfo;
    use serde_json::json;

    fn document_tool() -> ToolInfo {
        ToolInfo {
            name: "get_document_info".into(),
            description: Some("Document metadata".into()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "filename": {"type": "string", "description": "File name"},
                    "repository": {"type": "string"}
                },
                "required": ["filename", "repository"]
            })
            .as_object()
            .cloned()
            .unwrap(),
        }
    }

    #[test]
    fn required_tool_argument_left_empty_cancels() {
        let mut input = ScriptedInput::new(&["", "demo"]);
        assert_eq!(collect_tool_arguments(&document_tool(), &mut input), None);
        assert_eq!(input.prompts.len(), 1, "stops at the first missing value");
    }

    #[test]
    fn tool_arguments_are_collected_in_schema_order() {
        let mut input = ScriptedInput::new(&["main.py", "demo"]);
        let args = collect_tool_arguments(&document_tool(), &mut input).unwrap();

        assert_eq!(
            Value::Object(args),
            json!({"filename": "main.py", "repository": "demo"})
        );
        assert_eq!(
            input.prompts[0],
            "Enter value for filename (File name) (required):"
        );
    }

    #[test]
    fn optional_empty_argument_is_omitted() {
        let prompt = PromptInfo {
            name: "explain".into(),
            description: None,
            arguments: vec![
                PromptArgumentInfo {
                    name: "topic".into(),
                    description: None,
                    required: true,
                },
                PromptArgumentInfo {
                    name: "tone".into(),
                    description: None,
                    required: false,
                },
            ],
        };
        let mut input = ScriptedInput::new(&["flows", ""]);
        let args = collect_prompt_arguments(&prompt, &mut input).unwrap();

        assert_eq!(Value::Object(args), json!({"topic": "flows"}));
    }

    #[test]
    fn end_of_input_cancels_collection() {
        let mut input = ScriptedInput::new(&[]);
        assert_eq!(collect_tool_arguments(&document_tool(), &mut input), None);
    }

    #[test]
    fn selection_is_one_based_and_bounded() {
        assert_eq!(parse_selection("1", 3), Some(0));
        assert_eq!(parse_selection(" 3 ", 3), Some(2));
        assert_eq!(parse_selection("0", 3), None);
        assert_eq!(parse_selection("4", 3), None);
        assert_eq!(parse_selection("b", 3), None);
    }
}
