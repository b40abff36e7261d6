//! Terminal prompts: retry confirmation after a failed connection.

use replcheck_core::{RetryContext, RetryPolicy};
use std::io::{BufRead, Write};

/// Retry policy that asks on the terminal after every failed connection.
///
/// The collector calls the decider synchronously from a runtime worker, so
/// the blocking read is wrapped in `block_in_place`. This requires the
/// multi-threaded runtime.
pub fn interactive_retry_policy() -> RetryPolicy {
    RetryPolicy::ask_caller(|ctx| {
        tokio::task::block_in_place(|| {
            let stdin = std::io::stdin();
            let mut input = stdin.lock();
            let mut terminal = std::io::stderr();
            ask_retry(ctx, &mut input, &mut terminal)
        })
    })
}

/// Shows the failure and reads a yes/no answer. Anything but yes declines,
/// including end of input and read errors.
pub fn ask_retry<R: BufRead, W: Write>(
    ctx: &RetryContext<'_>,
    input: &mut R,
    output: &mut W,
) -> bool {
    let shown = writeln!(
        output,
        "Failed to connect to {}:{} (attempt {}): {}",
        ctx.host, ctx.port, ctx.attempt, ctx.error
    )
    .and_then(|()| write!(output, "Would you like to retry? [y/N] "))
    .and_then(|()| output.flush());
    if shown.is_err() {
        return false;
    }

    let mut answer = String::new();
    match input.read_line(&mut answer) {
        Ok(0) | Err(_) => false,
        Ok(_) => is_yes(&answer),
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;
    use replcheck_core::ReplCheckError;
    use std::io::Cursor;
    use std::time::Duration;

    fn ask(answer: &str) -> (bool, String) {
        let error = ReplCheckError::connection_timeout("db1:3306", Duration::from_secs(5));
        let ctx = RetryContext {
            host: "db1",
            port: 3306,
            attempt: 2,
            error: &error,
        };
        let mut input = Cursor::new(answer.as_bytes().to_vec());
        let mut output = Vec::new();
        let retry = ask_retry(&ctx, &mut input, &mut output);
        (retry, String::from_utf8(output).unwrap())
    }

    #[test]
    fn test_yes_answers_retry() {
        for answer in ["y\n", "Y\n", "yes\n", "  YES  \n"] {
            assert!(ask(answer).0, "answer {:?}", answer);
        }
    }

    #[test]
    fn test_other_answers_decline() {
        for answer in ["\n", "n\n", "no\n", "maybe\n", ""] {
            assert!(!ask(answer).0, "answer {:?}", answer);
        }
    }

    #[test]
    fn test_prompt_names_server_and_error() {
        let (_, shown) = ask("n\n");
        assert!(shown.contains("db1:3306 (attempt 2)"));
        assert!(shown.contains("timed out after 5s"));
        assert!(shown.ends_with("[y/N] "));
    }
}
