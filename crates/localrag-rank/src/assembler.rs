use localrag_core::config::PromptSettings;
use localrag_core::types::Retrieved;

/// Appended when a single block still overflows the budget.
pub const TRUNCATION_MARKER: &str = "\n[…context truncated]";

/// Characters reserved before the marker on hard truncation.
const TRUNCATION_RESERVE: usize = 20;

#[derive(Debug, Clone, PartialEq)]
pub struct AssemblyOptions {
    pub max_tokens: usize,
    pub chars_per_token: usize,
    pub header: String,
    pub footer: Option<String>,
}

impl AssemblyOptions {
    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Budget in Unicode scalar values.
    pub fn budget(&self) -> usize { self.max_tokens.saturating_mul(self.chars_per_token.max(1)) }
}

impl Default for AssemblyOptions {
    fn default() -> Self { Self::from(&PromptSettings::default()) }
}

impl From<&PromptSettings> for AssemblyOptions {
    fn from(s: &PromptSettings) -> Self {
        Self { max_tokens: s.max_tokens, chars_per_token: s.chars_per_token, header: s.header.clone(), footer: s.footer.clone() }
    }
}

/// Citation block; the score shown is the weighted score.
fn block(candidate: &Retrieved) -> String {
    format!("[{}] ({:.3})\n{}", candidate.chunk.title, candidate.weighted_score, candidate.chunk.text)
}

fn render(query: &str, blocks: &[String], options: &AssemblyOptions) -> String {
    let mut parts: Vec<&str> = Vec::with_capacity(blocks.len() + 3);
    if !options.header.is_empty() {
        parts.push(&options.header);
    }
    parts.extend(blocks.iter().map(String::as_str));
    let question = format!("Question: {query}");
    parts.push(&question);
    if let Some(footer) = options.footer.as_deref().filter(|f| !f.is_empty()) {
        parts.push(footer);
    }
    parts.join("\n\n")
}

/// Pack ranked candidates into a context string of at most
/// `max_tokens × chars_per_token` characters.
///
/// Blocks are dropped from the end until the text fits or one remains. If it
/// still overflows, the text is cut to `budget − 20` characters and
/// [`TRUNCATION_MARKER`] is appended.
pub fn assemble(query: &str, ranked: &[Retrieved], options: &AssemblyOptions) -> String {
    let budget = options.budget();
    let mut blocks: Vec<String> = ranked.iter().map(block).collect();
    let mut text = render(query, &blocks, options);
    while text.chars().count() > budget && blocks.len() > 1 {
        blocks.pop();
        text = render(query, &blocks, options);
    }
    if text.chars().count() > budget {
        let keep = budget.saturating_sub(TRUNCATION_RESERVE);
        let mut cut: String = text.chars().take(keep).collect();
        cut.push_str(TRUNCATION_MARKER);
        tracing::debug!(budget, kept = keep, "Context hard-truncated");
        return cut;
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use localrag_core::types::Chunk;
    use std::sync::Arc;

    fn candidate(title: &str, text: &str, score: f32) -> Retrieved {
        let chunk = Chunk {
            id: format!("{title}#0000"),
            doc_id: title.to_string(),
            title: title.to_string(),
            source: String::new(),
            offset: 0,
            text: text.to_string(),
            domain: None,
        };
        Retrieved::new(Arc::new(chunk), score)
    }

    #[test]
    fn layout_has_header_blocks_question_footer() {
        let options = AssemblyOptions { max_tokens: 1000, chars_per_token: 4, header: "H".into(), footer: Some("F".into()) };
        let text = assemble("why?", &[candidate("A", "alpha", 0.5), candidate("B", "bravo", 0.25)], &options);
        assert_eq!(text, "H\n\n[A] (0.500)\nalpha\n\n[B] (0.250)\nbravo\n\nQuestion: why?\n\nF");
    }

    #[test]
    fn no_candidates_still_yields_question() {
        let options = AssemblyOptions { header: String::new(), ..AssemblyOptions::default() };
        assert_eq!(assemble("hello", &[], &options), "Question: hello");
    }
}
