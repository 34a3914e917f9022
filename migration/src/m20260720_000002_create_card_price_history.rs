use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(CardPriceHistory::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CardPriceHistory::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(CardPriceHistory::CardId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CardPriceHistory::VariantId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CardPriceHistory::SourceType)
                            .string_len(24)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CardPriceHistory::Data)
                            .json_binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CardPriceHistory::Price)
                            .decimal_len(12, 2)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CardPriceHistory::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_card_price_history_card_variant_created")
                    .table(CardPriceHistory::Table)
                    .col(CardPriceHistory::CardId)
                    .col(CardPriceHistory::VariantId)
                    .col(CardPriceHistory::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_card_price_history_variant_created")
                    .table(CardPriceHistory::Table)
                    .col(CardPriceHistory::VariantId)
                    .col(CardPriceHistory::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CardPriceHistory::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum CardPriceHistory {
    Table,
    Id,
    CardId,
    VariantId,
    SourceType,
    Data,
    Price,
    CreatedAt,
}
