//! Deterministic fallbacks used when the inference service is unavailable.

use opsdesk_core::PolicyChunk;

/// Case-insensitive whole-word keyword hit. Token equality, not substring,
/// so "restocking" does not count as a hit for "stock".
pub fn keyword_match(text: &str, keywords: &[&str]) -> bool {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .any(|token| keywords.iter().any(|k| token == k.to_lowercase()))
}

/// Template SQL generation for offline/demo use.
///
/// Mirrors the shapes the model would produce for the demo retail schema;
/// anything it cannot recognize falls back to a small customer sample.
pub fn heuristic_sql(query: &str, policy_context: &[PolicyChunk]) -> String {
    let rules = policy_context
        .iter()
        .map(|chunk| chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
        .to_lowercase();

    if rules.contains("vip") || keyword_match(query, &["vip"]) {
        return "\
SELECT c.name, c.email, c.phone, c.address, SUM(o.total_amount) AS total_spent
FROM customers c
JOIN orders o ON o.customer_id = c.id
WHERE o.order_date >= date('now', '-12 months')
GROUP BY c.id
HAVING total_spent > 1000
ORDER BY total_spent DESC;"
            .to_string();
    }

    if keyword_match(query, &["order", "orders", "spend", "spending", "revenue", "amount"]) {
        return "\
SELECT c.name, SUM(o.total_amount) AS total_spent, COUNT(o.id) AS order_count
FROM customers c
JOIN orders o ON o.customer_id = c.id
GROUP BY c.id
ORDER BY total_spent DESC;"
            .to_string();
    }

    if keyword_match(query, &["product", "products", "stock", "inventory"]) {
        return "SELECT name, category, price, stock_level FROM products ORDER BY category, name;"
            .to_string();
    }

    "SELECT * FROM customers LIMIT 5;".to_string()
}

/// Fallback docs answer: the top-ranked chunk verbatim, or an explicit
/// no-context message.
pub fn answer_from_chunks(chunks: &[PolicyChunk]) -> String {
    match chunks.first() {
        Some(chunk) => chunk.text.clone(),
        None => "No relevant policy found.".to_string(),
    }
}
