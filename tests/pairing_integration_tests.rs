mod common;

use chrono::Utc;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use std::collections::HashMap;

use cardvault_backend::entities::{card_price_history, card_prices, prelude::*};
use cardvault_backend::services::pairing::pair_and_upsert;
use cardvault_backend::sources::{PricePayload, SourceType, TcgplayerPriceData};

use crate::common::setup_test_db;

fn unique_id(prefix: &str) -> String {
    format!("{}-{}", prefix, uuid::Uuid::new_v4())
}

fn payload_map(product_id: &str) -> HashMap<String, PricePayload> {
    let mut map = HashMap::new();
    map.insert(
        product_id.to_string(),
        PricePayload::Tcgplayer(TcgplayerPriceData {
            low: Some(dec!(1.00)),
            mid: Some(dec!(2.50)),
            high: None,
            market: None,
            direct_low: None,
            sub_type: "Normal".to_string(),
        }),
    );
    map
}

async fn insert_canonical_row(
    db: &sea_orm::DatabaseConnection,
    card_id: &str,
    variant_id: &str,
    product_id: &str,
) {
    card_prices::ActiveModel {
        card_id: Set(card_id.to_string()),
        variant_id: Set(variant_id.to_string()),
        source_type: Set(SourceType::Tcgplayer),
        source_link: Set("https://example.com/product".to_string()),
        source_product_id: Set(Some(product_id.to_string())),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("insert canonical row");
}

/// Re-running the same map at the same timestamp converges on the current
/// table but appends to history every time.
#[tokio::test]
async fn test_pairing_is_idempotent_but_history_appends() {
    let db = setup_test_db().await.expect("Failed to connect to test DB");
    let card_id = unique_id("card");
    let variant_id = unique_id("variant");
    let product_id = unique_id("product");

    insert_canonical_row(&db, &card_id, &variant_id, &product_id).await;

    let map = payload_map(&product_id);
    let run_at = Utc::now();

    let first = pair_and_upsert(&db, SourceType::Tcgplayer, &map, run_at)
        .await
        .unwrap();
    assert!(first.paired >= 1);

    let row_after_first = CardPrices::find_by_id((
        card_id.clone(),
        variant_id.clone(),
        SourceType::Tcgplayer,
    ))
    .one(&db)
    .await
    .unwrap()
    .unwrap();
    // market is null: mid wins the fallback chain
    assert_eq!(row_after_first.price, Some(dec!(2.50)));
    assert!(row_after_first.updated_at.is_some());

    pair_and_upsert(&db, SourceType::Tcgplayer, &map, run_at)
        .await
        .unwrap();

    let row_after_second = CardPrices::find_by_id((
        card_id.clone(),
        variant_id.clone(),
        SourceType::Tcgplayer,
    ))
    .one(&db)
    .await
    .unwrap()
    .unwrap();
    assert_eq!(row_after_first, row_after_second);

    let history = CardPriceHistory::find()
        .filter(card_price_history::Column::CardId.eq(&card_id))
        .filter(card_price_history::Column::VariantId.eq(&variant_id))
        .all(&db)
        .await
        .unwrap();
    assert_eq!(history.len(), 2);
    assert!(history.iter().all(|row| row.price == dec!(2.50)));
}

/// Rows without a pairing key, or whose key is not in the map, are skipped
/// and left untouched.
#[tokio::test]
async fn test_unpaired_rows_are_left_untouched() {
    let db = setup_test_db().await.expect("Failed to connect to test DB");
    let card_id = unique_id("card");
    let variant_id = unique_id("variant");

    insert_canonical_row(&db, &card_id, &variant_id, &unique_id("product")).await;

    // Map keyed by a different product id
    let map = payload_map("does-not-match");
    pair_and_upsert(&db, SourceType::Tcgplayer, &map, Utc::now())
        .await
        .unwrap();

    let row = CardPrices::find_by_id((
        card_id.clone(),
        variant_id.clone(),
        SourceType::Tcgplayer,
    ))
    .one(&db)
    .await
    .unwrap()
    .unwrap();
    assert_eq!(row.price, None);
    assert_eq!(row.updated_at, None);
    assert_eq!(row.data, None);
}

/// An admin edit of the configuration columns between two runs survives the
/// second run: the upsert only writes the derived columns.
#[tokio::test]
async fn test_pairing_never_overwrites_admin_configuration() {
    let db = setup_test_db().await.expect("Failed to connect to test DB");
    let card_id = unique_id("card");
    let variant_id = unique_id("variant");
    let product_id = unique_id("product");

    insert_canonical_row(&db, &card_id, &variant_id, &product_id).await;

    let map = payload_map(&product_id);
    pair_and_upsert(&db, SourceType::Tcgplayer, &map, Utc::now())
        .await
        .unwrap();

    // Admin edits the link between runs
    let row = CardPrices::find_by_id((
        card_id.clone(),
        variant_id.clone(),
        SourceType::Tcgplayer,
    ))
    .one(&db)
    .await
    .unwrap()
    .unwrap();
    let mut active: card_prices::ActiveModel = row.into();
    active.source_link = Set("https://example.com/edited".to_string());
    active.update(&db).await.unwrap();

    pair_and_upsert(&db, SourceType::Tcgplayer, &map, Utc::now())
        .await
        .unwrap();

    let row = CardPrices::find_by_id((
        card_id.clone(),
        variant_id.clone(),
        SourceType::Tcgplayer,
    ))
    .one(&db)
    .await
    .unwrap()
    .unwrap();
    assert_eq!(row.source_link, "https://example.com/edited");
    assert_eq!(row.source_product_id, Some(product_id));
    assert_eq!(row.price, Some(dec!(2.50)));
}
