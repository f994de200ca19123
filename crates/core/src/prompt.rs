use crate::models::{ChatPrompt, RetrievedChunk};

const SYSTEM_MESSAGE: &str = "You are a question-answering assistant. You are \
given relevant context. Answer only from the provided context, in Markdown \
format. Use newlines between paragraphs and backticks for code. Do not \
mention markdown or code anywhere. Only answer what is asked and keep it \
concise.";

/// Assembles the two-part prompt submitted to the generation provider.
pub struct PromptBuilder;

impl PromptBuilder {
    /// Join retrieved chunk texts into one context block.
    ///
    /// Chunks are newline-joined with no boundary markers between them; the
    /// model sees a single undifferentiated block.
    pub fn build_context(retrieved: &[RetrievedChunk]) -> String {
        let mut context = String::new();
        for chunk in retrieved {
            context.push_str(&chunk.text);
            context.push('\n');
        }
        context
    }

    /// Build the system + human message pair for a query and its context.
    ///
    /// An empty context still yields a complete prompt; how to answer without
    /// context is the generation model's decision.
    pub fn build_prompt(query: &str, context: &str) -> ChatPrompt {
        ChatPrompt {
            system: SYSTEM_MESSAGE.to_string(),
            human: format!(
                "### Question: {query}\n### Context: {context}\n### Answer:"
            ),
        }
    }
}
