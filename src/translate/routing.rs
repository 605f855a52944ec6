//! Language-pair routing.
//!
//! When the translator has no direct pair for a request, the text is taken
//! through the pivot language in two hops. The supported pair list is fetched
//! once per router and reused.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::{LanguagePair, TextTranslator, base_language};
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Source and target are the same language
    Identity,
    Direct,
    Pivot(String),
}

pub struct RoutedTranslator {
    inner: Arc<dyn TextTranslator>,
    pivot: String,
    pairs: OnceCell<Option<HashSet<LanguagePair>>>,
}

impl RoutedTranslator {
    pub fn new(inner: Arc<dyn TextTranslator>, pivot: &str) -> Self {
        Self {
            inner,
            pivot: base_language(pivot),
            pairs: OnceCell::new(),
        }
    }

    async fn known_pairs(&self) -> Option<&HashSet<LanguagePair>> {
        self.pairs
            .get_or_init(|| async {
                match self.inner.supported_pairs().await {
                    Ok(pairs) if !pairs.is_empty() => Some(pairs.into_iter().collect()),
                    Ok(_) => None,
                    Err(e) => {
                        warn!("could not list supported language pairs, assuming direct routes: {}", e);
                        None
                    }
                }
            })
            .await
            .as_ref()
    }

    pub async fn route(&self, source: &str, target: &str) -> Route {
        let (source, target) = (base_language(source), base_language(target));
        if source == target {
            return Route::Identity;
        }
        let Some(pairs) = self.known_pairs().await else {
            return Route::Direct;
        };
        if pairs.contains(&LanguagePair::new(&source, &target)) {
            return Route::Direct;
        }

        let via = &self.pivot;
        if *via != source
            && *via != target
            && pairs.contains(&LanguagePair::new(&source, via))
            && pairs.contains(&LanguagePair::new(via, &target))
        {
            return Route::Pivot(via.clone());
        }

        warn!("no route for {}-{}, trying the pair directly", source, target);
        Route::Direct
    }
}

#[async_trait]
impl TextTranslator for RoutedTranslator {
    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String> {
        match self.route(source, target).await {
            Route::Identity => Ok(text.to_string()),
            Route::Direct => self.inner.translate(text, source, target).await,
            Route::Pivot(via) => {
                info!("routing {}-{} through {}", source, target, via);
                let intermediate = self.inner.translate(text, source, &via).await?;
                debug!("intermediate {} text: {}", via, intermediate);
                self.inner.translate(&intermediate, &via, target).await
            }
        }
    }

    async fn supported_pairs(&self) -> Result<Vec<LanguagePair>> {
        self.inner.supported_pairs().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RedubError;
    use crate::translate::MockTextTranslator;

    fn pairs(list: &[&str]) -> Vec<LanguagePair> {
        list.iter().filter_map(|p| LanguagePair::parse(p)).collect()
    }

    #[tokio::test]
    async fn missing_pair_goes_through_the_pivot() {
        let mut mock = MockTextTranslator::new();
        mock.expect_supported_pairs()
            .times(1)
            .returning(|| Ok(pairs(&["ja-en", "en-fr"])));
        mock.expect_translate()
            .withf(|_, s, t| s.eq_ignore_ascii_case("ja") && t.eq_ignore_ascii_case("en"))
            .times(1)
            .returning(|_, _, _| Ok("good morning".to_string()));
        mock.expect_translate()
            .withf(|text, s, t| {
                text.eq_ignore_ascii_case("good morning") && s.eq_ignore_ascii_case("en") && t.eq_ignore_ascii_case("fr")
            })
            .times(1)
            .returning(|_, _, _| Ok("bonjour".to_string()));

        let router = RoutedTranslator::new(Arc::new(mock), "en");
        assert_eq!(router.route("ja", "fr").await, Route::Pivot("en".into()));
        let result = router.translate("おはよう", "ja", "fr").await.unwrap();
        assert_eq!(result, "bonjour");
        assert_ne!(result, "good morning");
    }

    #[tokio::test]
    async fn same_language_is_returned_untouched() {
        let mock = MockTextTranslator::new();
        let router = RoutedTranslator::new(Arc::new(mock), "en");
        assert_eq!(router.translate("hola", "es", "es-MX").await.unwrap(), "hola");
    }

    #[tokio::test]
    async fn unlisted_pairs_fall_back_to_direct() {
        let mut mock = MockTextTranslator::new();
        mock.expect_supported_pairs()
            .times(1)
            .returning(|| Err(RedubError::Translation("listing unavailable".into())));
        mock.expect_translate().returning(|_, _, _| Ok("direct".to_string()));

        let router = RoutedTranslator::new(Arc::new(mock), "en");
        assert_eq!(router.route("de", "ja").await, Route::Direct);
        assert_eq!(router.translate("hallo", "de", "ja").await.unwrap(), "direct");
    }
}
