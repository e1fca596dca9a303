//! Canned template store — default templates per classification, plus
//! user-defined additions, selected uniformly at random.

use std::collections::HashMap;

use rand::Rng;
use rand::seq::SliceRandom;

use crate::classify::Classification;

/// Template pool keyed by classification category.
pub struct TemplateStore {
    templates: HashMap<Classification, Vec<String>>,
}

impl TemplateStore {
    /// Create a store with the default template pools.
    pub fn default_templates() -> Self {
        let mut templates: HashMap<Classification, Vec<String>> = HashMap::new();
        templates.insert(
            Classification::SimplePositive,
            vec![
                "Thank you so much! 🙏".into(),
                "Really glad you enjoyed it!".into(),
                "Appreciate you watching! ❤️".into(),
                "Thanks for the kind words!".into(),
                "More like this coming soon, thanks for the support!".into(),
            ],
        );
        templates.insert(
            Classification::General,
            vec![
                "Thanks for stopping by!".into(),
                "Appreciate the comment!".into(),
            ],
        );
        Self { templates }
    }

    /// Create an empty store (for testing).
    pub fn empty() -> Self {
        Self {
            templates: HashMap::new(),
        }
    }

    /// Add a user-defined template to a category's pool.
    pub fn add(&mut self, category: Classification, template: impl Into<String>) {
        self.templates.entry(category).or_default().push(template.into());
    }

    /// Whether the category has any templates at all.
    pub fn has_category(&self, category: Classification) -> bool {
        self.templates
            .get(&category)
            .is_some_and(|pool| !pool.is_empty())
    }

    /// Pick a template uniformly at random from the category's pool.
    pub fn pick<R: Rng>(&self, category: Classification, rng: &mut R) -> Option<String> {
        self.templates
            .get(&category)?
            .choose(rng)
            .cloned()
    }
}

impl Default for TemplateStore {
    fn default() -> Self {
        Self::default_templates()
    }
}
