/// Render the extraction instruction for `text`.
///
/// The text is placed between double quotes as-is. Quotes inside it are not escaped, so a
/// passage containing `"` can blur where the text ends and the instruction resumes.
pub fn build_extraction_prompt(text: &str) -> String {
    format!(
        r#"Analyze the following text and extract key entities (people, places, events, objects) and the relationships between them.

INSTRUCTIONS:
1. Return the output strictly as a valid JSON object with two keys: "nodes" and "edges"
2. Do not use markdown formatting (no ```json blocks)
3. Use double quotes for all keys and string values
4. Output ONLY the JSON object, no explanations

SCHEMA:
{{
  "nodes": [
    {{"id": "1", "label": "display name", "type": "Person|Location|Event|Object", "details": "brief description or context"}}
  ],
  "edges": [
    {{"source": "1", "target": "2", "label": "visited|knows|occurred at", "details": "longer explanation of the relationship"}}
  ]
}}

RULES:
- "id" must be a unique string identifier for each node
- "source" and "target" must be ids of nodes listed in "nodes"
- "label" on an edge is a short relation name

Text to analyze:
"{}"

JSON Output:"#,
        text
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_embeds_text_and_schema() {
        let prompt = build_extraction_prompt("Alice met Bob in Paris.");

        assert!(prompt.contains("\"Alice met Bob in Paris.\""));
        assert!(prompt.contains(r#""nodes""#));
        assert!(prompt.contains(r#""edges""#));
        assert!(prompt.contains(r#""details""#));
        assert!(prompt.contains("no ```json blocks"));
    }

    #[test]
    fn test_prompt_is_deterministic() {
        assert_eq!(build_extraction_prompt("x"), build_extraction_prompt("x"));
    }

    #[test]
    fn test_embedded_quotes_are_not_escaped() {
        let prompt = build_extraction_prompt(r#"He said "stop""#);
        assert!(prompt.contains(r#""He said "stop"""#));
    }
}
