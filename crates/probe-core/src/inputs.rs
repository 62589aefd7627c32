//! Test-input files: one prompt per line, plain text or JSON lines.

use std::path::Path;

use serde_json::Value;

use crate::error::Result;

/// Template written by `probe init`.
pub const STARTER_INPUTS: &str = "\
# probe test cases - one input per line
# Lines starting with # are ignored
# Add your own prompts below!

# === Factual Questions ===
What is the capital of France?
Is 17 a prime number?
What is the boiling point of water in Celsius?
Who wrote Romeo and Juliet?
What is the largest planet in our solar system?

# === Reasoning ===
What is the time complexity of binary search?
What is the derivative of x squared?
If all roses are flowers and all flowers are plants, are all roses plants?

# === Instruction Following ===
Explain photosynthesis in 2 sentences.
Translate \"hello\" to Spanish.
Write a Python function to reverse a string.
Summarize what an API is in one sentence.

# === Domain-Specific (customize these!) ===
# What is a Kubernetes pod?
# Explain the difference between SQL and NoSQL.
# What does ACID stand for in databases?
";

/// Read and parse an inputs file.
pub fn load_inputs(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)?;
    Ok(parse_inputs(&content))
}

/// Parse inputs text.
///
/// Blank lines and `#` comments are skipped. A JSON string line yields the
/// string, a JSON object its `input` field, else its `text` field, else its
/// JSON rendering. Other JSON values are rendered; anything that is not JSON
/// is taken verbatim.
pub fn parse_inputs(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| match serde_json::from_str::<Value>(line) {
            Ok(Value::String(s)) => s,
            Ok(Value::Object(obj)) => {
                match obj.get("input").or_else(|| obj.get("text")).cloned() {
                    Some(Value::String(s)) => s,
                    Some(other) => other.to_string(),
                    None => Value::Object(obj).to_string(),
                }
            }
            Ok(other) => other.to_string(),
            Err(_) => line.to_string(),
        })
        .collect()
}
