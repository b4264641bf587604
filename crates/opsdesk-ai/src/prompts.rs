//! Prompt construction for the router, SQL generator, and docs synthesizer.

use opsdesk_core::{PolicyChunk, SqlAttempt};

/// Strict yes/no question: does the query need a database lookup?
pub fn needs_database(query: &str) -> String {
    format!(
        "You are a query router. Answer with exactly one word, yes or no.\n\
         Does answering this query require looking up data in a relational \
         database (counts, sums, joins, filters, record lists)?\n\n\
         Query: {query}\n\nAnswer:"
    )
}

/// Strict yes/no question: does the query need policy context?
pub fn needs_policy(query: &str) -> String {
    format!(
        "You are a query router. Answer with exactly one word, yes or no.\n\
         Does answering this query require consulting written business \
         policies (rules, definitions, fees, eligibility criteria)?\n\n\
         Query: {query}\n\nAnswer:"
    )
}

/// First-attempt SQL generation prompt.
pub fn generate_sql(query: &str, schema: &str, policy_context: &[PolicyChunk]) -> String {
    let mut prompt = String::from(
        "You are a SQLite expert. Generate a single safe SELECT-only \
         statement. Return only the SQL with no explanation.\n\
         Never write INSERT, UPDATE, DELETE, DROP, ALTER, or ATTACH, and \
         never chain multiple statements.\n\
         Use only the tables and columns listed in the schema below. If the \
         request cannot be satisfied with them, return \
         SELECT 'no matching table' AS message;\n",
    );
    push_schema(&mut prompt, schema);
    push_policy_context(&mut prompt, policy_context);
    prompt.push_str(&format!("\nUser query: {query}\n"));
    prompt
}

/// Repair prompt: the full attempt history (statements plus their errors)
/// so the generator can self-correct.
pub fn repair_sql(
    query: &str,
    schema: &str,
    policy_context: &[PolicyChunk],
    attempts: &[SqlAttempt],
) -> String {
    let mut prompt = String::from(
        "You are fixing a SQLite query. Return only the corrected \
         SELECT-only statement with no explanation.\n\
         Use only the tables and columns in the schema below.\n",
    );
    push_schema(&mut prompt, schema);
    push_policy_context(&mut prompt, policy_context);
    prompt.push_str(&format!("\nUser query: {query}\n\nPrevious attempts:\n"));
    for attempt in attempts {
        prompt.push_str(&format!(
            "Attempt {}:\n{}\nError: {}\n\n",
            attempt.attempt_number,
            attempt.statement,
            attempt.error().unwrap_or("unknown error"),
        ));
    }
    prompt.push_str("Corrected SQL:");
    prompt
}

/// Answer a question strictly from retrieved policy snippets.
pub fn answer_from_docs(question: &str, chunks: &[PolicyChunk]) -> String {
    let mut prompt = String::from(
        "You are a policy assistant. Answer the question strictly using the \
         policy snippets below. If they do not contain the answer, say you \
         do not have that information.\n\nPolicy snippets:\n",
    );
    for chunk in chunks {
        prompt.push_str(&chunk.text);
        prompt.push_str("\n---\n");
    }
    prompt.push_str(&format!("\nQuestion: {question}\n"));
    prompt
}

fn push_schema(prompt: &mut String, schema: &str) {
    if !schema.is_empty() {
        prompt.push_str("\nDatabase schema:\n");
        prompt.push_str(schema);
        prompt.push('\n');
    }
}

fn push_policy_context(prompt: &mut String, chunks: &[PolicyChunk]) {
    if chunks.is_empty() {
        return;
    }
    prompt.push_str(
        "\nBusiness rules that must be encoded in the SQL (thresholds, date \
         windows, spend minimums). Do not drop rule constraints even if the \
         user query omits them:\n",
    );
    for chunk in chunks {
        prompt.push_str(&chunk.text);
        prompt.push('\n');
    }
}
