//! Heuristics for telling a job title apart from a name or a greeting.

use std::sync::LazyLock;

use rand::seq::SliceRandom;
use rand::Rng;
use regex::Regex;

/// Checked first; any match rejects the input.
static NOT_A_ROLE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"\b(hi|hello|hey|my name is|i am|this is)\b",
        r"\b(mr|ms|mrs|dr|prof)\b\.?\s+\w+",
        r"\b(john|jane|smith|doe|alex|mike|david|sarah|emma|lucas)\b",
        r"^\w+$",
    ])
});

static LOOKS_LIKE_ROLE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"\b(senior|junior|lead|principal|staff|associate|assistant)\b",
        r"\b(engineer|developer|analyst|manager|specialist|consultant|architect)\b",
        r"\b(director|head|chief|officer|president|vice president)\b",
        r"\b(designer|researcher|scientist|advisor|coordinator)\b",
        r"\w+\s+\w+",
        r".+engineer$",
        r".+developer$",
        r".+manager$",
        r".+analyst$",
        r".+designer$",
    ])
});

const ROLE_SUGGESTIONS: &[&str] = &[
    "Software Engineer",
    "Frontend Developer",
    "Backend Developer",
    "Full Stack Developer",
    "Data Scientist",
    "Machine Learning Engineer",
    "DevOps Engineer",
    "Cloud Architect",
    "Product Manager",
    "Project Manager",
    "UX Designer",
    "UI Designer",
    "Data Analyst",
    "Business Analyst",
    "System Administrator",
    "Network Engineer",
    "Security Analyst",
    "QA Engineer",
    "Mobile Developer",
    "Web Developer",
    "Database Administrator",
    "Technical Lead",
    "Solution Architect",
    "Scrum Master",
    "Product Owner",
];

/// `\w` and `\b` are ASCII-only: accented letters are not word characters,
/// so "José García" is two broken tokens rather than two words.
fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| p.replace(r"\w", r"(?-u:\w)").replace(r"\b", r"(?-u:\b)"))
        .filter_map(|p| Regex::new(&format!("(?i){p}")).ok())
        .collect()
}

/// Returns true when `text` plausibly names a job position.
///
/// Reject patterns always run before accept patterns, so "Hi, I am a Senior
/// Engineer" is rejected even though it contains a title.
pub fn is_valid_role(text: &str) -> bool {
    let role = text.trim().to_lowercase();
    if role.chars().count() < 2 {
        return false;
    }

    if NOT_A_ROLE.iter().any(|re| re.is_match(&role)) {
        return false;
    }

    if LOOKS_LIKE_ROLE.iter().any(|re| re.is_match(&role)) {
        return true;
    }

    role.split_whitespace().count() >= 3
}

pub fn role_suggestions() -> &'static [&'static str] {
    ROLE_SUGGESTIONS
}

/// `count` distinct suggestions in random order.
pub fn sample_suggestions<R: Rng + ?Sized>(rng: &mut R, count: usize) -> Vec<String> {
    ROLE_SUGGESTIONS
        .choose_multiple(rng, count)
        .map(|s| s.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_pattern_tables_compile() {
        assert_eq!(NOT_A_ROLE.len(), 4);
        assert_eq!(LOOKS_LIKE_ROLE.len(), 10);
    }

    #[test]
    fn test_accepts_job_titles() {
        assert!(is_valid_role("Senior Backend Engineer"));
        assert!(is_valid_role("Product Manager"));
        assert!(is_valid_role("  Data Scientist  "));
        assert!(is_valid_role("VICE PRESIDENT of sales"));
    }

    #[test]
    fn test_rejects_short_and_empty() {
        assert!(!is_valid_role(""));
        assert!(!is_valid_role("   "));
        assert!(!is_valid_role("a"));
        assert!(!is_valid_role(" b "));
    }

    #[test]
    fn test_rejects_names_and_greetings() {
        assert!(!is_valid_role("John"));
        assert!(!is_valid_role("hi there"));
        assert!(!is_valid_role("Dr. Strange"));
        assert!(!is_valid_role("Sarah Connor"));
        assert!(!is_valid_role("my name is Pat"));
    }

    #[test]
    fn test_reject_runs_before_accept() {
        // Contains "senior engineer" but also a greeting.
        assert!(!is_valid_role("Hello, senior engineer"));
        // Single word title is still a bare word.
        assert!(!is_valid_role("Engineer"));
    }

    #[test]
    fn test_three_token_fallback() {
        // No \w characters, so neither table matches.
        assert!(is_valid_role("++ -- ??"));
        assert!(!is_valid_role("++ --"));
    }

    #[test]
    fn test_word_classes_are_ascii_only() {
        // Accented letters break `\w+\s+\w+`, leaving only the token count.
        assert!(!is_valid_role("café owner"));
        assert!(!is_valid_role("José García"));
        // ASCII stretches next to the space still count as words.
        assert!(is_valid_role("Développeur Web"));
        assert!(is_valid_role("señor café barista"));
        // Keyword tables still see ASCII titles inside non-ASCII text.
        assert!(is_valid_role("Ingénieur logiciel senior"));
    }

    #[test]
    fn test_sample_suggestions_are_distinct_known_titles() {
        let mut rng = StdRng::seed_from_u64(9);
        let picks = sample_suggestions(&mut rng, 5);
        assert_eq!(picks.len(), 5);
        for pick in &picks {
            assert!(role_suggestions().contains(&pick.as_str()));
            assert_eq!(picks.iter().filter(|p| *p == pick).count(), 1);
        }
    }
}
