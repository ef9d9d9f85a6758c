use std::sync::Arc;
use std::time::Duration;

use querygate_core::{CompletionService, GuardVerdict, PipelineError};

use crate::bounded::{call_bounded, BoundedCallError};

/// Mutation verbs and statement-injection markers. Matched as uppercase substrings,
/// so "UPDATED" or "ALTERNATIVE" are blocked too.
pub const DENYLIST: &[&str] = &["DROP", "DELETE", "UPDATE", "INSERT", "ALTER", ";", "--"];

#[derive(Clone, Debug, Default)]
pub struct LexicalGuard;

impl LexicalGuard {
    pub fn new() -> Self {
        Self
    }

    pub fn inspect(&self, question: &str) -> GuardVerdict {
        let normalized = question.to_uppercase();
        match DENYLIST.iter().find(|token| normalized.contains(*token)) {
            Some(token) => GuardVerdict::Blocked(PipelineError::InjectionSuspectedLexical {
                token: (*token).to_string(),
            }),
            None => GuardVerdict::Clear,
        }
    }
}

/// Model-based screen run after the lexical one.
///
/// Fail-closed: only an unambiguous `NO` clears the question. `YES`, an empty
/// reply, lowercase `no`, or a reply carrying both tokens all block.
#[derive(Clone)]
pub struct SemanticGuard {
    completion: Arc<dyn CompletionService>,
    timeout: Duration,
}

impl SemanticGuard {
    pub fn new(completion: Arc<dyn CompletionService>, timeout: Duration) -> Self {
        Self { completion, timeout }
    }

    /// Issues exactly one completion call. A failing or silent classifier is an
    /// error, never a clear.
    pub async fn inspect(&self, question: &str) -> Result<GuardVerdict, PipelineError> {
        let completion = Arc::clone(&self.completion);
        let prompt = classification_prompt(question);

        let call = async move { completion.complete(&prompt).await };
        let response = call_bounded(self.timeout, call).await.map_err(|error| match error {
            BoundedCallError::TimedOut(limit) => PipelineError::CollaboratorUnavailable(format!(
                "classifier gave no response within {limit:?}"
            )),
            other => PipelineError::CollaboratorUnavailable(other.to_string()),
        })?;

        Ok(classify_response(&response))
    }
}

pub fn classification_prompt(question: &str) -> String {
    format!(
        "You screen questions sent to a natural-language interface over a SQL database \
that stores CUSTOMERS, TRANSACTIONS and PRODUCTS.\n\
Question: {question}\n\
Does this question ask to CREATE, MODIFY, UPDATE or DELETE customer, transaction or \
product data, directly or indirectly (for example by asking to add money to a balance)?\n\
If it could change the database, answer only the word YES in uppercase.\n\
If it only reads data, answer only the word NO in uppercase."
    )
}

pub fn classify_response(response: &str) -> GuardVerdict {
    let mut says_no = false;
    let mut says_yes = false;
    for word in response.split(|ch: char| !ch.is_alphanumeric()) {
        match word {
            "NO" => says_no = true,
            "YES" => says_yes = true,
            _ => {}
        }
    }

    if says_no && !says_yes {
        GuardVerdict::Clear
    } else {
        GuardVerdict::Blocked(PipelineError::InjectionSuspectedSemantic {
            verdict: response.trim().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use querygate_core::{CompletionService, GuardVerdict, PipelineError};

    use super::{classification_prompt, classify_response, LexicalGuard, SemanticGuard};

    struct ScriptedCompletion {
        reply: Option<&'static str>,
        prompts: std::sync::Mutex<Vec<String>>,
        calls: AtomicUsize,
    }

    impl ScriptedCompletion {
        fn new(reply: Option<&'static str>) -> Arc<Self> {
            Arc::new(Self { reply, prompts: Default::default(), calls: AtomicUsize::new(0) })
        }

        fn replying(reply: &'static str) -> Arc<Self> {
            Self::new(Some(reply))
        }

        fn failing() -> Arc<Self> {
            Self::new(None)
        }
    }

    #[async_trait]
    impl CompletionService for ScriptedCompletion {
        async fn complete(&self, prompt: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Ok(mut prompts) = self.prompts.lock() {
                prompts.push(prompt.to_string());
            }
            self.reply.map(str::to_string).ok_or_else(|| anyhow!("connection refused"))
        }
    }

    fn blocked_token(verdict: GuardVerdict) -> Option<String> {
        match verdict {
            GuardVerdict::Blocked(PipelineError::InjectionSuspectedLexical { token }) => {
                Some(token)
            }
            _ => None,
        }
    }

    #[test]
    fn lexical_guard_blocks_direct_sql() {
        let guard = LexicalGuard::new();

        assert_eq!(
            blocked_token(guard.inspect("DELETE FROM Clientes;")).as_deref(),
            Some("DELETE")
        );
        assert_eq!(blocked_token(guard.inspect("drop table produtos")).as_deref(), Some("DROP"));
        assert_eq!(
            blocked_token(guard.inspect("select * from clientes -- comment")).as_deref(),
            Some("--")
        );
        assert_eq!(blocked_token(guard.inspect("a; b")).as_deref(), Some(";"));
    }

    #[test]
    fn lexical_guard_is_case_insensitive() {
        let verdict = LexicalGuard::new().inspect("delete from clientes");

        assert_eq!(verdict.reason().as_deref(), Some("possible injection attempt detected"));
    }

    #[test]
    fn lexical_guard_accepts_substring_false_positives() {
        let verdict = LexicalGuard::new().inspect("Which customers updated their address?");

        assert_eq!(blocked_token(verdict).as_deref(), Some("UPDATE"));
    }

    #[test]
    fn lexical_guard_clears_plain_questions() {
        let guard = LexicalGuard::new();

        assert_eq!(guard.inspect("Quais clientes compraram um Notebook?"), GuardVerdict::Clear);
        assert_eq!(
            guard.inspect("Pode adicionar 2000 em saldo para Joao Silva"),
            GuardVerdict::Clear
        );
    }

    #[test]
    fn only_a_clean_no_clears() {
        assert_eq!(classify_response("NO"), GuardVerdict::Clear);
        assert_eq!(classify_response("  NO.\n"), GuardVerdict::Clear);

        for reply in ["YES", "SIM", "", "no", "NOT SURE", "NOTEBOOK", "YES or NO", "NÃO"] {
            assert!(!classify_response(reply).is_clear(), "reply {reply:?} should fail closed");
        }
    }

    #[test]
    fn semantic_block_keeps_model_verdict() {
        let verdict = classify_response(" SIM ");

        assert_eq!(
            verdict,
            GuardVerdict::Blocked(PipelineError::InjectionSuspectedSemantic {
                verdict: "SIM".to_string()
            })
        );
        assert_eq!(
            verdict.reason().as_deref(),
            Some("possible injection attempt detected (model-based)")
        );
    }

    #[test]
    fn prompt_interpolates_question() {
        let prompt = classification_prompt("Quem tem saldo suficiente?");

        assert!(prompt.contains("Question: Quem tem saldo suficiente?"));
        assert!(prompt.contains("answer only the word YES"));
        assert!(prompt.contains("answer only the word NO"));
    }

    #[tokio::test]
    async fn semantic_guard_makes_exactly_one_call() {
        let completion = ScriptedCompletion::replying("NO");
        let guard = SemanticGuard::new(completion.clone(), Duration::from_secs(1));

        let verdict = guard.inspect("Quanto cada cliente gastou no total?").await;

        assert_eq!(verdict, Ok(GuardVerdict::Clear));
        assert_eq!(completion.calls.load(Ordering::SeqCst), 1);
        let prompts = completion.prompts.lock().expect("prompt log");
        assert!(prompts[0].contains("Quanto cada cliente gastou no total?"));
    }

    #[tokio::test]
    async fn semantic_guard_fails_closed_when_classifier_errors() {
        let completion = ScriptedCompletion::failing();
        let guard = SemanticGuard::new(completion.clone(), Duration::from_secs(1));

        let error = guard.inspect("Quem comprou um Smartphone?").await.expect_err("must not clear");

        assert!(matches!(
            error,
            PipelineError::CollaboratorUnavailable(ref detail) if detail.contains("connection refused")
        ));
        assert_eq!(completion.calls.load(Ordering::SeqCst), 1);
    }
}
