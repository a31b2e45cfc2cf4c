use crate::models::Item;

/// Presence filter for the items view. Advances All → Local → Remote → All.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Filter {
    #[default]
    All,
    Local,
    Remote,
}

impl Filter {
    pub fn next(self) -> Self {
        match self {
            Filter::All => Filter::Local,
            Filter::Local => Filter::Remote,
            Filter::Remote => Filter::All,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Filter::All => "all",
            Filter::Local => "local",
            Filter::Remote => "remote",
        }
    }

    /// Pure in `items` and `self`, given a fixed presence predicate.
    pub fn apply<P>(self, items: &[Item], is_present: P) -> Vec<Item>
    where
        P: Fn(&Item) -> bool,
    {
        match self {
            Filter::All => items.to_vec(),
            Filter::Local => items.iter().filter(|it| is_present(*it)).cloned().collect(),
            Filter::Remote => items.iter().filter(|it| !is_present(*it)).cloned().collect(),
        }
    }
}
