//! Answer synthesis: the language model collaborator and the grounded prompt.

use async_trait::async_trait;

use crate::error::Result;

/// A language model that completes a prompt with deterministic sampling.
///
/// Model identifier and sampling settings are fixed when the synthesizer is
/// constructed; the pipeline only ever calls [`complete`](AnswerSynthesizer::complete).
#[async_trait]
pub trait AnswerSynthesizer: Send + Sync {
    /// The model identifier used for every completion.
    fn model(&self) -> &str;

    /// Complete `prompt` and return the generated text.
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Assemble the prompt asking the model to answer `question` from `context` only.
pub fn build_prompt(context: &str, question: &str) -> String {
    format!(
        "Answer the question using only the following context.\n\
         If the context does not contain the answer, say that you don't know.\n\n\
         Context:\n{context}\n\n\
         Question: {question}\n\n\
         Answer:"
    )
}
