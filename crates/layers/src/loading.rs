use serde::Serialize;

use crate::layer::LayerKey;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "key", rename_all = "snake_case")]
pub enum LoadingToken {
    Layer(LayerKey),
    Rendering,
}

/// Multiset of in-progress work. A non-empty set means "show a spinner".
#[derive(Debug, Default, Clone)]
pub struct LoadingSet {
    tokens: Vec<LoadingToken>,
}

impl LoadingSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self, token: LoadingToken) {
        self.tokens.push(token);
    }

    /// Removes the first matching token.
    pub fn end(&mut self, token: &LoadingToken) -> bool {
        match self.tokens.iter().position(|t| t == token) {
            Some(i) => {
                self.tokens.remove(i);
                true
            }
            None => false,
        }
    }

    /// Renderer idle: every outstanding `Rendering` token completes at once.
    pub fn end_all_rendering(&mut self) -> usize {
        let before = self.tokens.len();
        self.tokens.retain(|t| *t != LoadingToken::Rendering);
        before - self.tokens.len()
    }

    pub fn contains(&self, token: &LoadingToken) -> bool {
        self.tokens.contains(token)
    }

    pub fn tokens(&self) -> &[LoadingToken] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn clear(&mut self) {
        self.tokens.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::{LoadingSet, LoadingToken};
    use crate::layer::{LayerKey, RenderType};

    #[test]
    fn end_removes_one_occurrence() {
        let key = LoadingToken::Layer(LayerKey::new("a", RenderType::Arc));
        let mut set = LoadingSet::new();
        set.begin(key.clone());
        set.begin(LoadingToken::Rendering);
        set.begin(key.clone());

        assert!(set.end(&key));
        assert_eq!(set.len(), 2);
        assert!(set.contains(&key));
        assert!(!set.end(&LoadingToken::Layer(LayerKey::new("b", RenderType::Arc))));
    }

    #[test]
    fn idle_clears_every_rendering_token() {
        let mut set = LoadingSet::new();
        set.begin(LoadingToken::Rendering);
        set.begin(LoadingToken::Layer(LayerKey::new("a", RenderType::Line)));
        set.begin(LoadingToken::Rendering);
        assert_eq!(set.end_all_rendering(), 2);
        assert_eq!(set.len(), 1);
        assert!(!set.contains(&LoadingToken::Rendering));
    }
}
