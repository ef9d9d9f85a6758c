use crate::commands::{build_controller, open_database, prepare, CommandResult, StepFailure};

/// Answers one question. Output is the presented text itself; the exit code is
/// 0 for an answer and 1 when the pipeline blocked or failed the question.
pub fn run(question: &str) -> CommandResult {
    let (config, runtime) = match prepare("ask") {
        Ok(prepared) => prepared,
        Err(result) => return result,
    };

    let outcome = runtime.block_on(async {
        let pool = open_database(&config).await?;
        let controller = build_controller(&config, pool.clone())?;
        let presented = controller.answer(question).await;
        pool.close().await;
        Ok::<_, StepFailure>(presented)
    });

    match outcome {
        Ok(presented) => CommandResult {
            exit_code: if presented.is_answer() { 0 } else { 1 },
            output: presented.text,
        },
        Err(failure) => CommandResult::from_step("ask", failure),
    }
}
