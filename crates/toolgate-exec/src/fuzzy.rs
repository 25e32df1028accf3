//! Small dependency-light fuzzy-match helper for "did you mean" suggestions
//! on a tool-name miss. Consistent with the reference
//! repo's preference for hand-rolled utility code over pulling in a crate
//! for a single self-contained algorithm.

/// Levenshtein edit distance between two strings, case-insensitive.
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.to_lowercase().chars().collect();
    let b: Vec<char> = b.to_lowercase().chars().collect();
    let (n, m) = (a.len(), b.len());

    if n == 0 {
        return m;
    }
    if m == 0 {
        return n;
    }

    let mut prev: Vec<usize> = (0..=m).collect();
    let mut curr = vec![0usize; m + 1];

    for i in 1..=n {
        curr[0] = i;
        for j in 1..=m {
            let cost = if a[i - 1] == b[j - 1] { 0 } else { 1 };
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[m]
}

/// Returns up to `top_n` names from `candidates` ordered by ascending edit
/// distance to `query`, excluding exact matches.
pub fn suggest(query: &str, candidates: &[String], top_n: usize) -> Vec<String> {
    let mut scored: Vec<(usize, &String)> = candidates
        .iter()
        .filter(|c| c.as_str() != query)
        .map(|c| (levenshtein(query, c), c))
        .collect();
    scored.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)));
    scored
        .into_iter()
        .take(top_n)
        .map(|(_, name)| name.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_excluded() {
        let candidates = vec!["calculator".to_string(), "calendar".to_string()];
        let suggestions = suggest("calculator", &candidates, 3);
        assert!(!suggestions.contains(&"calculator".to_string()));
    }

    #[test]
    fn closest_name_ranked_first() {
        let candidates = vec![
            "calendar".to_string(),
            "weather".to_string(),
            "calculater".to_string(),
        ];
        let suggestions = suggest("calculator", &candidates, 3);
        assert_eq!(suggestions[0], "calculater");
    }
}
