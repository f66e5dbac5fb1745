//! `shell` and `shell_status` tools: thin translation over `ProcessManager`.

use serde_json::Value;

use crate::process::ProcessManager;

use super::{ToolError, ToolOutcome};

const DEFAULT_WAIT_MS: u64 = 30_000;
const DEFAULT_TAIL_BYTES: usize = 2048;

pub async fn run_shell(args: &Value, processes: &ProcessManager) -> Result<ToolOutcome, ToolError> {
    let command = args.get("command").and_then(Value::as_str).ok_or(ToolError::MissingArg("command"))?;
    let wait_ms = args.get("wait_ms").and_then(Value::as_u64).unwrap_or(DEFAULT_WAIT_MS);

    let result = processes.run(command, wait_ms).await?;

    let mut output = result.output;
    let summary = if result.completed {
        format!("`{command}` exited {}", result.exit_code.map(|c| c.to_string()).unwrap_or_else(|| "?".into()))
    } else {
        output.push_str(&format!("\n[backgrounded: pid={}. Use shell_status to check on it]", result.pid));
        format!("`{command}` backgrounded as pid {}", result.pid)
    };

    Ok(ToolOutcome { output, display_summary: summary, display_diff: None, is_error: false })
}

pub async fn run_shell_status(args: &Value, processes: &ProcessManager) -> Result<ToolOutcome, ToolError> {
    let pid = args.get("pid").and_then(Value::as_u64).map(|p| p as u32);

    let Some(pid) = pid else {
        let list = processes.list().await;
        if list.is_empty() {
            return Ok(ToolOutcome {
                output: "no tracked processes".into(),
                display_summary: "no tracked processes".into(),
                display_diff: None,
                is_error: false,
            });
        }
        let output = list
            .iter()
            .map(|p| format!("pid={} running={} elapsed={:.1}s {}", p.pid, p.running, p.elapsed.as_secs_f64(), p.command))
            .collect::<Vec<_>>()
            .join("\n");
        return Ok(ToolOutcome {
            display_summary: format!("{} tracked process(es)", list.len()),
            output,
            display_diff: None,
            is_error: false,
        });
    };

    let action = args.get("action").and_then(Value::as_str).unwrap_or("status");
    match action {
        "status" => {
            let s = processes.status(pid).await?;
            let output = format!("pid={} running={} elapsed={:.1}s\n{}", s.pid, s.running, s.elapsed.as_secs_f64(), s.tail);
            let summary = format!("pid {pid} {}", if s.running { "running" } else { "exited" });
            Ok(ToolOutcome { display_summary: summary, output, display_diff: None, is_error: false })
        }
        "output" => {
            let (mut output, exit_code) = processes.output(pid).await?;
            let summary = format!("pid {pid} output ({} bytes)", output.len());
            if let Some(c) = exit_code {
                output.push_str(&format!("\n[exit code: {c}]"));
            }
            Ok(ToolOutcome { display_summary: summary, output, display_diff: None, is_error: false })
        }
        "tail" => {
            let n = args.get("n").and_then(Value::as_u64).unwrap_or(DEFAULT_TAIL_BYTES as u64) as usize;
            let output = processes.tail(pid, n).await?;
            Ok(ToolOutcome { display_summary: format!("pid {pid} tail"), output, display_diff: None, is_error: false })
        }
        "kill" => {
            let found = processes.kill(pid).await?;
            let output = if found { format!("pid {pid} killed") } else { format!("pid {pid} not tracked") };
            Ok(ToolOutcome { display_summary: output.clone(), output, display_diff: None, is_error: false })
        }
        other => Err(ToolError::Unrecognized(format!("shell_status action '{other}'"))),
    }
}
