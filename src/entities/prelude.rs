pub use super::card_price_history::Entity as CardPriceHistory;
pub use super::card_prices::Entity as CardPrices;
