use std::collections::BTreeMap;

/// Lowercase, treat every non-alphanumeric character as a separator and split
/// on whitespace.
pub fn tokenize(text: &str) -> Vec<String> {
	let normalized: String = text
		.chars()
		.flat_map(char::to_lowercase)
		.map(|c| if c.is_alphanumeric() { c } else { ' ' })
		.collect();
	normalized.split_whitespace().map(str::to_string).collect()
}

/// Raw term frequencies of `text`.
pub fn term_counts(text: &str) -> BTreeMap<String, u32> {
	let mut counts = BTreeMap::new();
	for token in tokenize(text) { *counts.entry(token).or_insert(0) += 1; }
	counts
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn strips_punctuation_and_case() {
		assert_eq!(tokenize("Train-signal, LIGHT!"), vec!["train", "signal", "light"]);
		assert!(tokenize("  ...  ").is_empty());
	}

	#[test]
	fn counts_repeated_terms() {
		let counts = term_counts("brake Brake pad");
		assert_eq!(counts.get("brake"), Some(&2));
		assert_eq!(counts.get("pad"), Some(&1));
	}
}
