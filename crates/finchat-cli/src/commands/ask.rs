use anyhow::Result;
use cliclack::spinner;
use finchat::models::message::Turn;

use super::{build_agent, parse_context, render_envelope};
use crate::AgentArgs;

pub async fn execute(question: String, args: AgentArgs) -> Result<()> {
    let context = parse_context(&args.context)?;
    let agent = build_agent(&args)?;

    let busy = spinner();
    busy.start("thinking");
    let result = agent.run(&[Turn::user(question)], &context).await;
    busy.stop("");

    render_envelope(&result?)
}
