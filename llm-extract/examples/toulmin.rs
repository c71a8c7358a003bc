//! Toulmin argument analysis of a short design note.
//!
//! ```bash
//! cargo run -p llm-extract --example toulmin -- /path/to/mistral-7b-instruct.Q4_K_M.gguf
//! ```

use llm_extract::prelude::*;
use schemars::JsonSchema;
use serde::Deserialize;

/// The six parts of an argument in Toulmin's model.
#[derive(Debug, Deserialize, JsonSchema)]
struct ToulminAnalysis {
    /// The assertion the author would like to prove; the main argument.
    claim: String,
    /// The evidence and facts that help support the claim.
    grounds: String,
    /// The assumption, implied or stated, that links the grounds to the claim.
    warrant: String,
    /// Words showing the claim may not hold in all circumstances.
    qualifier: String,
    /// An acknowledgement of another valid view of the situation.
    rebuttal: String,
    /// Additional support for the warrant, such as a specific example.
    backing: String,
}

const SYSTEM: &str = "You are an argumentation analysis expert.";

const PROMPT: &str = r"Developed by philosopher Stephen E. Toulmin, the Toulmin method is a style
of argumentation that breaks arguments down into six component parts: claim,
grounds, warrant, qualifier, rebuttal and backing.

Here is a text we'd like to analyze:
```
{content}
```

Perform a Toulmin analysis on the previous text.";

const SAMPLE: &str = "MemGPT introduces a novel approach to memory management in GPT, \
addressing the limitations of fixed context windows. It draws inspiration from the \
hierarchical memory systems of traditional operating systems: a main context akin to \
RAM and an external context similar to disk storage. The system autonomously moves \
items between contexts, which lets it handle unbounded context using models with \
finite context windows, significantly enhancing tasks like document analysis and \
extended conversations.";

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("info"))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let model = std::env::args()
        .nth(1)
        .ok_or_else(|| Error::Config("usage: toulmin <model.gguf>".to_string()))?;

    let client = LlamaClient::new().await?;
    let template = PromptTemplate::new(PROMPT).with_system(SYSTEM);
    let arguments = Arguments::new().with("content", SAMPLE);

    let analysis: ToulminAnalysis = client.extract_typed(&model, &template, &arguments, 3).await?;

    println!("Claim: {}", analysis.claim);
    println!("Grounds: {}", analysis.grounds);
    println!("Warrant: {}", analysis.warrant);
    println!("Qualifier: {}", analysis.qualifier);
    println!("Rebuttal: {}", analysis.rebuttal);
    println!("Backing: {}", analysis.backing);
    Ok(())
}
