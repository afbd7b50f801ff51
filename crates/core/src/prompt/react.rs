use scout_model::ModelTool;

pub const STOP_SEQUENCE: &str = "\nObservation:";

const ACTION: &str = "Action:";
const ACTION_INPUT: &str = "Action Input:";
const FINAL_ANSWER: &str = "Final Answer:";
const OBSERVATION: &str = "Observation:";

const MISSING_ACTION: &str = "Missing 'Action:' after 'Thought:'";
const MISSING_ACTION_INPUT: &str = "Missing 'Action Input:' after 'Action:'";
const MISSING_ANSWER: &str = "Missing text after 'Final Answer:'";
const AMBIGUOUS: &str =
    "Parsing LLM output produced both a final answer and a parse-able action";

/// One step of the model's reasoning.
#[derive(Debug, PartialEq, Eq)]
pub enum Step<'a> {
    Action { tool: &'a str, input: &'a str },
    FinalAnswer(&'a str),
}

pub fn system_prompt(base: &str, catalog: &[ModelTool]) -> String {
    let tools: String = catalog
        .iter()
        .map(|tool| format!("{} - {}\n", tool.name, tool.description))
        .collect();
    let tool_names: Vec<&str> =
        catalog.iter().map(|tool| tool.name.as_str()).collect();

    format!(
        "{base} You have access to the following tools:\n\
         {tools}\n\
         Use the following format:\n\
         \n\
         Question: the input question you must answer\n\
         Thought: you should always think about what to do\n\
         Action: the action to take, should be one of [{names}]\n\
         Action Input: the input to the action\n\
         Observation: the result of the action\n\
         ... (this Thought/Action/Action Input/Observation can repeat N \
         times)\n\
         Thought: I now know the final answer\n\
         Final Answer: the final answer to the original input question",
        names = tool_names.join(", "),
    )
}

/// Reads one reasoning step out of the model's reply.
pub fn parse(text: &str) -> Result<Step<'_>, &'static str> {
    let action = find_action(text);
    let answer = text
        .rfind(FINAL_ANSWER)
        .map(|at| &text[at + FINAL_ANSWER.len()..]);

    match (action, answer) {
        (Some(_), Some(_)) => Err(AMBIGUOUS),
        (Some((tool, input)), None) => {
            let tool = clean_tool_name(tool);
            if tool.is_empty() {
                return Err(MISSING_ACTION);
            }
            Ok(Step::Action {
                tool,
                input: clean_input(input),
            })
        }
        (None, Some(answer)) => match answer.trim() {
            "" => Err(MISSING_ANSWER),
            answer => Ok(Step::FinalAnswer(answer)),
        },
        (None, None) if text.contains(ACTION) => Err(MISSING_ACTION_INPUT),
        (None, None) => Err(MISSING_ACTION),
    }
}

fn find_action(text: &str) -> Option<(&str, &str)> {
    let start = text.find(ACTION)? + ACTION.len();
    let rest = &text[start..];
    let input_at = rest.find(ACTION_INPUT)?;
    Some((&rest[..input_at], &rest[input_at + ACTION_INPUT.len()..]))
}

fn clean_tool_name(name: &str) -> &str {
    name.trim()
        .trim_matches(|c| matches!(c, '"' | '\'' | '`' | '[' | ']'))
        .trim()
}

fn clean_input(input: &str) -> &str {
    // Providers that ignore the stop sequence run on into a made-up
    // observation.
    let input = match input.find(OBSERVATION) {
        Some(at) => &input[..at],
        None => input,
    };
    input.trim().trim_matches('"')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action() {
        let step = parse(
            "Thought: I need the forecast.\n\
             Action: search\n\
             Action Input: \"weather Paris today\"",
        );
        assert_eq!(
            step,
            Ok(Step::Action {
                tool: "search",
                input: "weather Paris today",
            })
        );
    }

    #[test]
    fn test_action_cleanup() {
        let step = parse(
            "Action: [search]\n\
             Action Input: {\"query\": \"rust\"}\n\
             Observation: made up",
        );
        assert_eq!(
            step,
            Ok(Step::Action {
                tool: "search",
                input: "{\"query\": \"rust\"}",
            })
        );
    }

    #[test]
    fn test_final_answer() {
        let step = parse(
            "Thought: I now know the final answer\n\
             Final Answer:  It is sunny in Paris. \n",
        );
        assert_eq!(step, Ok(Step::FinalAnswer("It is sunny in Paris.")));
        assert_eq!(parse("Final Answer:   "), Err(MISSING_ANSWER));
    }

    #[test]
    fn test_malformed() {
        assert_eq!(parse("It is sunny."), Err(MISSING_ACTION));
        assert_eq!(parse("Action: search"), Err(MISSING_ACTION_INPUT));
        assert_eq!(parse("Action: \nAction Input: x"), Err(MISSING_ACTION));
        assert_eq!(
            parse("Action: search\nAction Input: x\nFinal Answer: y"),
            Err(AMBIGUOUS)
        );
    }

    #[test]
    fn test_system_prompt() {
        let catalog = [
            ModelTool {
                name: "search".to_owned(),
                description: "Searches the web.".to_owned(),
                parameters: serde_json::Value::Null,
            },
            ModelTool {
                name: "time".to_owned(),
                description: "Tells the time.".to_owned(),
                parameters: serde_json::Value::Null,
            },
        ];
        let prompt = system_prompt("You are helpful.", &catalog);
        assert!(prompt.starts_with(
            "You are helpful. You have access to the following tools:\n\
             search - Searches the web.\n\
             time - Tells the time.\n\n"
        ));
        assert!(prompt.contains("should be one of [search, time]\n"));
        assert!(prompt.ends_with("Final Answer: the final answer to the \
                                  original input question"));
    }
}
