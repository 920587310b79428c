use anyhow::Result;
use cliclack::{input, spinner};
use console::style;
use finchat::models::message::Turn;

use super::{build_agent, parse_context, render_envelope};
use crate::AgentArgs;

/// Turns of history carried into each question
const MAX_HISTORY_TURNS: usize = 20;

fn is_exit(text: &str) -> bool {
    ["/exit", "/quit", "exit", "quit"]
        .iter()
        .any(|word| text.eq_ignore_ascii_case(word))
}

fn trim_history(history: &mut Vec<Turn>) {
    if history.len() > MAX_HISTORY_TURNS {
        history.drain(..history.len() - MAX_HISTORY_TURNS);
    }
}

pub async fn execute(args: AgentArgs) -> Result<()> {
    let context = parse_context(&args.context)?;
    let agent = build_agent(&args)?;

    println!("{}", style("\nfinchat").bold().cyan());
    println!("Type {} to leave\n", style("/exit").dim());

    let mut history: Vec<Turn> = Vec::new();
    loop {
        let question: String = input("Ask:").placeholder("").interact()?;
        let question = question.trim().to_string();
        if question.is_empty() {
            continue;
        }
        if is_exit(&question) {
            break;
        }

        let mut turns = history.clone();
        turns.push(Turn::user(question.clone()));

        let busy = spinner();
        busy.start("thinking");
        let result = agent.run(&turns, &context).await;
        busy.stop("");

        match result {
            Ok(envelope) => {
                render_envelope(&envelope)?;
                history.push(Turn::user(question));
                history.push(Turn::assistant(envelope.answer));
                trim_history(&mut history);
            }
            // The conversation survives a failed question; the turn is not kept
            Err(e) => println!("{} {}", style("error:").red().bold(), e),
        }
        println!();
    }
    Ok(())
}
