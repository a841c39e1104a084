//! Card lookup
//!
//! [`CardRepository`] resolves a scanned card id to its [`Card`]. The built-in
//! [`StaticCardRepository`] serves the card table shipped with the binary
//! and sleeps before answering to behave like the network lookup that will
//! eventually replace it. Any replacement must keep the same contract:
//! ids are normalized first, and an unknown id is `None`, never an error.

use async_trait::async_trait;
use hitit_common::{normalize_card_id, Card};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

const CARD_TABLE: &str = include_str!("../data/cards.json");

/// Source of card data
#[async_trait]
pub trait CardRepository: Send + Sync {
    /// Look up a card by id; `"1"` and `"00001"` name the same card
    async fn get_card_by_id(&self, card_id: &str) -> Option<Card>;

    /// Number of known cards, when the source can tell cheaply
    fn card_count(&self) -> Option<usize> {
        None
    }
}

/// In-memory card table with simulated lookup latency
pub struct StaticCardRepository {
    cards: HashMap<String, Card>,
    delay: Duration,
}

impl StaticCardRepository {
    /// Built-in card table
    pub fn builtin(delay: Duration) -> Self {
        let cards = match serde_json::from_str::<Vec<Card>>(CARD_TABLE) {
            Ok(cards) => cards,
            Err(e) => {
                warn!("Built-in card table is invalid: {}", e);
                Vec::new()
            }
        };
        Self::from_cards(cards, delay)
    }

    /// Table from an explicit card list (ids are normalized on insert)
    pub fn from_cards(cards: impl IntoIterator<Item = Card>, delay: Duration) -> Self {
        let cards = cards
            .into_iter()
            .map(|card| (normalize_card_id(&card.id), card))
            .collect();
        Self { cards, delay }
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

#[async_trait]
impl CardRepository for StaticCardRepository {
    async fn get_card_by_id(&self, card_id: &str) -> Option<Card> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let key = normalize_card_id(card_id);
        let card = self.cards.get(&key).cloned();
        debug!(card_id = %key, found = card.is_some(), "Card lookup");
        card
    }

    fn card_count(&self) -> Option<usize> {
        Some(self.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_table_loads() {
        let repo = StaticCardRepository::builtin(Duration::ZERO);
        assert_eq!(repo.len(), 308);
        assert!(!repo.is_empty());
    }

    #[tokio::test]
    async fn test_lookup_accepts_short_and_padded_ids() {
        let repo = StaticCardRepository::builtin(Duration::ZERO);

        let padded = repo.get_card_by_id("00001").await.unwrap();
        let short = repo.get_card_by_id("1").await.unwrap();

        assert_eq!(padded, short);
        assert_eq!(padded.id, "00001");
        assert_eq!(padded.artist, "Rudi Carrell");
        assert_eq!(padded.year, 1975);
    }

    #[tokio::test]
    async fn test_unknown_card_is_none() {
        let repo = StaticCardRepository::builtin(Duration::ZERO);
        assert!(repo.get_card_by_id("99999").await.is_none());
        assert!(repo.get_card_by_id("").await.is_none());
    }

    #[tokio::test]
    async fn test_every_builtin_card_links_a_track() {
        let repo = StaticCardRepository::builtin(Duration::ZERO);
        assert!(repo.cards.values().all(|card| card.to_track().is_some()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_lookup_waits_for_simulated_delay() {
        let repo = StaticCardRepository::builtin(Duration::from_millis(300));
        let start = tokio::time::Instant::now();

        let card = repo.get_card_by_id("2").await;

        assert!(card.is_some());
        assert!(start.elapsed() >= Duration::from_millis(300));
    }
}
