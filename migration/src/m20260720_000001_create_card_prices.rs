use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(CardPrices::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(CardPrices::CardId).string().not_null())
                    .col(ColumnDef::new(CardPrices::VariantId).string().not_null())
                    .col(
                        ColumnDef::new(CardPrices::SourceType)
                            .string_len(24)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CardPrices::SourceLink)
                            .text()
                            .not_null(),
                    )
                    .col(ColumnDef::new(CardPrices::SourceProductId).string())
                    .col(
                        ColumnDef::new(CardPrices::UpdatedAt)
                            .timestamp_with_time_zone(),
                    )
                    .col(ColumnDef::new(CardPrices::Data).json_binary())
                    .col(ColumnDef::new(CardPrices::Price).decimal_len(12, 2))
                    .primary_key(
                        Index::create()
                            .col(CardPrices::CardId)
                            .col(CardPrices::VariantId)
                            .col(CardPrices::SourceType),
                    )
                    .to_owned(),
            )
            .await?;

        // Pairing scans filter by source type + paired product id
        manager
            .create_index(
                Index::create()
                    .name("idx_card_prices_source_product")
                    .table(CardPrices::Table)
                    .col(CardPrices::SourceType)
                    .col(CardPrices::SourceProductId)
                    .to_owned(),
            )
            .await?;

        // Bulk-load queries by variant id + source type
        manager
            .create_index(
                Index::create()
                    .name("idx_card_prices_variant_source")
                    .table(CardPrices::Table)
                    .col(CardPrices::VariantId)
                    .col(CardPrices::SourceType)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CardPrices::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum CardPrices {
    Table,
    CardId,
    VariantId,
    SourceType,
    SourceLink,
    SourceProductId,
    UpdatedAt,
    Data,
    Price,
}
