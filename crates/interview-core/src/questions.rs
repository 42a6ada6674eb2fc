//! Local question picker used before a backend session exists.

use std::collections::BTreeSet;

use rand::Rng;

pub const NO_QUESTIONS: &str = "No questions available for this role.";
pub const ALL_ANSWERED: &str = "You have answered all the questions for this role!";

/// Static role -> questions table. Order matters: indices recorded in a
/// [`QuestionSession`] refer to positions in these slices.
pub struct RoleQuestionTable {
    roles: Vec<(&'static str, Vec<&'static str>)>,
}

impl RoleQuestionTable {
    pub fn new(roles: Vec<(&'static str, Vec<&'static str>)>) -> Self {
        Self { roles }
    }

    pub fn builtin() -> Self {
        Self::new(vec![
            (
                "Software Engineer",
                vec![
                    "What is SQL and why is it used?",
                    "Explain the difference between a list and a tuple in Python.",
                    "What are REST APIs and how do they work?",
                    "What is the difference between HTTP and HTTPS?",
                ],
            ),
            (
                "Data Scientist",
                vec![
                    "Explain the difference between supervised and unsupervised learning.",
                    "What is a confusion matrix?",
                    "How do you handle missing data in a dataset?",
                    "Explain the difference between Python lists and NumPy arrays.",
                ],
            ),
        ])
    }

    pub fn questions(&self, role: &str) -> Option<&[&'static str]> {
        self.roles
            .iter()
            .find(|(name, _)| *name == role)
            .map(|(_, questions)| questions.as_slice())
    }

    pub fn contains(&self, role: &str) -> bool {
        self.questions(role).is_some()
    }

    pub fn roles(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.roles.iter().map(|(name, _)| *name)
    }
}

impl Default for RoleQuestionTable {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Bookkeeping of which questions have been drawn for the current role.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuestionSession {
    role: Option<String>,
    asked: BTreeSet<usize>,
}

impl QuestionSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select `role` and forget every question asked so far.
    pub fn reset(&mut self, role: &str) {
        self.role = Some(role.to_string());
        self.asked.clear();
    }

    pub fn role(&self) -> Option<&str> {
        self.role.as_deref()
    }

    pub fn asked(&self) -> &BTreeSet<usize> {
        &self.asked
    }

    /// Draw an unasked question uniformly from the remaining ones.
    ///
    /// Returns [`NO_QUESTIONS`] when the role is unknown and [`ALL_ANSWERED`]
    /// once every question has been drawn. Only a real question records an index.
    pub fn pick_next<R: Rng + ?Sized>(&mut self, table: &RoleQuestionTable, rng: &mut R) -> String {
        let Some(questions) = self.role.as_deref().and_then(|role| table.questions(role)) else {
            return NO_QUESTIONS.to_string();
        };

        let remaining: Vec<usize> = (0..questions.len())
            .filter(|idx| !self.asked.contains(idx))
            .collect();

        if remaining.is_empty() {
            return ALL_ANSWERED.to_string();
        }

        let original_idx = remaining[rng.gen_range(0..remaining.len())];
        self.asked.insert(original_idx);
        questions[original_idx].to_string()
    }
}
