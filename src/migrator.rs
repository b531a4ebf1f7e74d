use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240901_000001_create_products_table::Migration),
            Box::new(m20240901_000002_create_sku_mappings_table::Migration),
            Box::new(m20240901_000003_create_orders_table::Migration),
            Box::new(m20240901_000004_create_order_line_items_table::Migration),
            Box::new(m20240901_000005_create_inventory_changelog_table::Migration),
            Box::new(m20240901_000006_create_unmapped_skus_table::Migration),
            Box::new(m20240901_000007_create_line_items_to_skip_table::Migration),
            Box::new(m20240901_000008_create_inbound_shipment_tables::Migration),
            Box::new(m20240901_000009_create_outbox_events_table::Migration),
        ]
    }
}

mod m20240901_000001_create_products_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240901_000001_create_products_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Products::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Products::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Products::BrandId).string().not_null())
                        .col(ColumnDef::new(Products::BrandName).string().null())
                        .col(ColumnDef::new(Products::Sku).string().not_null())
                        .col(ColumnDef::new(Products::Asin).string().null())
                        .col(ColumnDef::new(Products::ProductName).string().not_null())
                        .col(ColumnDef::new(Products::ImageUrl).string().null())
                        .col(
                            ColumnDef::new(Products::Quantity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Products::PendingQuantity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Products::Price).decimal_len(12, 2).null())
                        .col(
                            ColumnDef::new(Products::CostOfGood)
                                .decimal_len(12, 2)
                                .null(),
                        )
                        .col(ColumnDef::new(Products::FbaFee).decimal_len(12, 2).null())
                        .col(
                            ColumnDef::new(Products::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Products::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_products_brand_sku")
                        .table(Products::Table)
                        .col(Products::BrandId)
                        .col(Products::Sku)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_products_asin")
                        .table(Products::Table)
                        .col(Products::Asin)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Products::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Products {
        Table,
        Id,
        BrandId,
        BrandName,
        Sku,
        Asin,
        ProductName,
        ImageUrl,
        Quantity,
        PendingQuantity,
        Price,
        CostOfGood,
        FbaFee,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240901_000002_create_sku_mappings_table {

    use super::m20240901_000001_create_products_table::Products;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240901_000002_create_sku_mappings_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(SkuMappings::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(SkuMappings::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(SkuMappings::Sku).string().not_null())
                        .col(ColumnDef::new(SkuMappings::BrandId).string().not_null())
                        .col(ColumnDef::new(SkuMappings::ProductId).uuid().not_null())
                        .col(
                            ColumnDef::new(SkuMappings::QuantityToDeduct)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .col(
                            ColumnDef::new(SkuMappings::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_sku_mappings_product_id")
                                .from(SkuMappings::Table, SkuMappings::ProductId)
                                .to(Products::Table, Products::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_sku_mappings_sku_brand")
                        .table(SkuMappings::Table)
                        .col(SkuMappings::Sku)
                        .col(SkuMappings::BrandId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(SkuMappings::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum SkuMappings {
        Table,
        Id,
        Sku,
        BrandId,
        ProductId,
        QuantityToDeduct,
        CreatedAt,
    }
}

mod m20240901_000003_create_orders_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240901_000003_create_orders_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Orders::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Orders::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Orders::OrderNumber).string().not_null())
                        .col(
                            ColumnDef::new(Orders::OrderDate)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Orders::Is3plOrder)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(Orders::BrandId).string().null())
                        .col(ColumnDef::new(Orders::BrandName).string().null())
                        .col(ColumnDef::new(Orders::OrderSource).string().null())
                        .col(ColumnDef::new(Orders::CustomerEmail).string().null())
                        .col(ColumnDef::new(Orders::CustomerName).string().null())
                        .col(ColumnDef::new(Orders::RecipientCompany).string().null())
                        .col(ColumnDef::new(Orders::Street1).string().null())
                        .col(ColumnDef::new(Orders::Street2).string().null())
                        .col(ColumnDef::new(Orders::City).string().null())
                        .col(ColumnDef::new(Orders::State).string().null())
                        .col(ColumnDef::new(Orders::PostalCode).string().null())
                        .col(ColumnDef::new(Orders::Country).string().null())
                        .col(ColumnDef::new(Orders::Phone).string().null())
                        .col(ColumnDef::new(Orders::Carrier).string().null())
                        .col(ColumnDef::new(Orders::TrackingNumber).string().null())
                        .col(ColumnDef::new(Orders::Status).string().not_null())
                        .col(
                            ColumnDef::new(Orders::FulfillmentChannel)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Orders::CostOfShipment)
                                .decimal_len(12, 2)
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Orders::ReferralFee)
                                .decimal_len(12, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Orders::TotalPaid)
                                .decimal_len(12, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Orders::TotalUnitQuantity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Orders::Notes).text().null())
                        .col(
                            ColumnDef::new(Orders::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Orders::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            // The unique index is the idempotency guard for redelivered webhooks
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_order_number_unique")
                        .table(Orders::Table)
                        .col(Orders::OrderNumber)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_brand_status")
                        .table(Orders::Table)
                        .col(Orders::BrandId)
                        .col(Orders::Status)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Orders::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Orders {
        Table,
        Id,
        OrderNumber,
        OrderDate,
        #[sea_orm(iden = "is_3pl_order")]
        Is3plOrder,
        BrandId,
        BrandName,
        OrderSource,
        CustomerEmail,
        CustomerName,
        RecipientCompany,
        Street1,
        Street2,
        City,
        State,
        PostalCode,
        Country,
        Phone,
        Carrier,
        TrackingNumber,
        Status,
        FulfillmentChannel,
        CostOfShipment,
        ReferralFee,
        TotalPaid,
        TotalUnitQuantity,
        Notes,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240901_000004_create_order_line_items_table {

    use super::m20240901_000001_create_products_table::Products;
    use super::m20240901_000003_create_orders_table::Orders;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240901_000004_create_order_line_items_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(OrderLineItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrderLineItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrderLineItems::OrderId).uuid().not_null())
                        .col(ColumnDef::new(OrderLineItems::Sku).string().null())
                        .col(ColumnDef::new(OrderLineItems::Asin).string().null())
                        .col(ColumnDef::new(OrderLineItems::ProductName).string().null())
                        .col(ColumnDef::new(OrderLineItems::ImageUrl).string().null())
                        .col(ColumnDef::new(OrderLineItems::ProductId).uuid().null())
                        .col(
                            ColumnDef::new(OrderLineItems::Quantity)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderLineItems::UnitPrice)
                                .decimal_len(12, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(OrderLineItems::CostOfGood)
                                .decimal_len(12, 2)
                                .null(),
                        )
                        .col(ColumnDef::new(OrderLineItems::BrandId).string().null())
                        .col(ColumnDef::new(OrderLineItems::BrandName).string().null())
                        .col(
                            ColumnDef::new(OrderLineItems::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_order_line_items_order_id")
                                .from(OrderLineItems::Table, OrderLineItems::OrderId)
                                .to(Orders::Table, Orders::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_order_line_items_product_id")
                                .from(OrderLineItems::Table, OrderLineItems::ProductId)
                                .to(Products::Table, Products::Id)
                                .on_delete(ForeignKeyAction::SetNull)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_order_line_items_order_id")
                        .table(OrderLineItems::Table)
                        .col(OrderLineItems::OrderId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(OrderLineItems::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum OrderLineItems {
        Table,
        Id,
        OrderId,
        Sku,
        Asin,
        ProductName,
        ImageUrl,
        ProductId,
        Quantity,
        UnitPrice,
        CostOfGood,
        BrandId,
        BrandName,
        CreatedAt,
    }
}

mod m20240901_000005_create_inventory_changelog_table {

    use super::m20240901_000001_create_products_table::Products;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240901_000005_create_inventory_changelog_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(InventoryChangelog::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(InventoryChangelog::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryChangelog::ProductId)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(InventoryChangelog::Sku).string().null())
                        .col(
                            ColumnDef::new(InventoryChangelog::ProductName)
                                .string()
                                .null(),
                        )
                        .col(ColumnDef::new(InventoryChangelog::ImageUrl).string().null())
                        .col(ColumnDef::new(InventoryChangelog::BrandId).string().null())
                        .col(ColumnDef::new(InventoryChangelog::BrandName).string().null())
                        .col(
                            ColumnDef::new(InventoryChangelog::PreviousQuantity)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryChangelog::NewQuantity)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryChangelog::NetChange)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryChangelog::ChangeSource)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryChangelog::OrderNumber)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(InventoryChangelog::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_inventory_changelog_product_id")
                                .from(InventoryChangelog::Table, InventoryChangelog::ProductId)
                                .to(Products::Table, Products::Id)
                                .on_delete(ForeignKeyAction::Restrict)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_inventory_changelog_product_created")
                        .table(InventoryChangelog::Table)
                        .col(InventoryChangelog::ProductId)
                        .col(InventoryChangelog::CreatedAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(InventoryChangelog::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum InventoryChangelog {
        Table,
        Id,
        ProductId,
        Sku,
        ProductName,
        ImageUrl,
        BrandId,
        BrandName,
        PreviousQuantity,
        NewQuantity,
        NetChange,
        ChangeSource,
        OrderNumber,
        CreatedAt,
    }
}

mod m20240901_000006_create_unmapped_skus_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240901_000006_create_unmapped_skus_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(UnmappedSkus::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(UnmappedSkus::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(UnmappedSkus::Sku).string().null())
                        .col(ColumnDef::new(UnmappedSkus::BrandId).string().null())
                        .col(ColumnDef::new(UnmappedSkus::BrandName).string().null())
                        .col(ColumnDef::new(UnmappedSkus::OrderNumber).string().not_null())
                        .col(ColumnDef::new(UnmappedSkus::Quantity).integer().not_null())
                        .col(ColumnDef::new(UnmappedSkus::Source).string().null())
                        .col(ColumnDef::new(UnmappedSkus::ProductName).string().null())
                        .col(ColumnDef::new(UnmappedSkus::ImageUrl).string().null())
                        .col(
                            ColumnDef::new(UnmappedSkus::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(UnmappedSkus::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum UnmappedSkus {
        Table,
        Id,
        Sku,
        BrandId,
        BrandName,
        OrderNumber,
        Quantity,
        Source,
        ProductName,
        ImageUrl,
        CreatedAt,
    }
}

mod m20240901_000007_create_line_items_to_skip_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240901_000007_create_line_items_to_skip_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(LineItemsToSkip::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(LineItemsToSkip::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(LineItemsToSkip::BrandId).string().null())
                        .col(ColumnDef::new(LineItemsToSkip::Name).string().not_null())
                        .col(
                            ColumnDef::new(LineItemsToSkip::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_line_items_to_skip_brand_name")
                        .table(LineItemsToSkip::Table)
                        .col(LineItemsToSkip::BrandId)
                        .col(LineItemsToSkip::Name)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(LineItemsToSkip::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum LineItemsToSkip {
        Table,
        Id,
        BrandId,
        Name,
        CreatedAt,
    }
}

mod m20240901_000008_create_inbound_shipment_tables {

    use super::m20240901_000001_create_products_table::Products;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240901_000008_create_inbound_shipment_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(InboundShipments::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(InboundShipments::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InboundShipments::ShipmentNumber)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(InboundShipments::BrandId).string().not_null())
                        .col(ColumnDef::new(InboundShipments::BrandName).string().null())
                        .col(ColumnDef::new(InboundShipments::Carrier).string().null())
                        .col(
                            ColumnDef::new(InboundShipments::TrackingNumber)
                                .string()
                                .null(),
                        )
                        .col(ColumnDef::new(InboundShipments::Status).string().not_null())
                        .col(
                            ColumnDef::new(InboundShipments::TotalUnitQuantity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(InboundShipments::TotalCountedQuantity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(InboundShipments::ExpectedDate)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(InboundShipments::Notes).text().null())
                        .col(
                            ColumnDef::new(InboundShipments::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InboundShipments::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(InboundShipmentLineItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(InboundShipmentLineItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InboundShipmentLineItems::InboundShipmentId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InboundShipmentLineItems::ProductId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InboundShipmentLineItems::Sku)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(InboundShipmentLineItems::ProductName)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(InboundShipmentLineItems::Quantity)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InboundShipmentLineItems::CountedQuantity)
                                .integer()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(InboundShipmentLineItems::DateCounted)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(InboundShipmentLineItems::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_inbound_line_items_shipment_id")
                                .from(
                                    InboundShipmentLineItems::Table,
                                    InboundShipmentLineItems::InboundShipmentId,
                                )
                                .to(InboundShipments::Table, InboundShipments::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_inbound_line_items_product_id")
                                .from(
                                    InboundShipmentLineItems::Table,
                                    InboundShipmentLineItems::ProductId,
                                )
                                .to(Products::Table, Products::Id)
                                .on_delete(ForeignKeyAction::Restrict)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_inbound_line_items_shipment_id")
                        .table(InboundShipmentLineItems::Table)
                        .col(InboundShipmentLineItems::InboundShipmentId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(
                    Table::drop()
                        .table(InboundShipmentLineItems::Table)
                        .to_owned(),
                )
                .await?;
            manager
                .drop_table(Table::drop().table(InboundShipments::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum InboundShipments {
        Table,
        Id,
        ShipmentNumber,
        BrandId,
        BrandName,
        Carrier,
        TrackingNumber,
        Status,
        TotalUnitQuantity,
        TotalCountedQuantity,
        ExpectedDate,
        Notes,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum InboundShipmentLineItems {
        Table,
        Id,
        InboundShipmentId,
        ProductId,
        Sku,
        ProductName,
        Quantity,
        CountedQuantity,
        DateCounted,
        CreatedAt,
    }
}

mod m20240901_000009_create_outbox_events_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240901_000009_create_outbox_events_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(OutboxEvents::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OutboxEvents::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OutboxEvents::AggregateType)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(OutboxEvents::AggregateId).uuid().null())
                        .col(ColumnDef::new(OutboxEvents::EventType).string().not_null())
                        .col(ColumnDef::new(OutboxEvents::Payload).json().not_null())
                        .col(ColumnDef::new(OutboxEvents::Status).string().not_null())
                        .col(
                            ColumnDef::new(OutboxEvents::Attempts)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(OutboxEvents::AvailableAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(OutboxEvents::LastError).text().null())
                        .col(
                            ColumnDef::new(OutboxEvents::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OutboxEvents::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(OutboxEvents::ProcessedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_outbox_events_status_available")
                        .table(OutboxEvents::Table)
                        .col(OutboxEvents::Status)
                        .col(OutboxEvents::AvailableAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(OutboxEvents::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum OutboxEvents {
        Table,
        Id,
        AggregateType,
        AggregateId,
        EventType,
        Payload,
        Status,
        Attempts,
        AvailableAt,
        LastError,
        CreatedAt,
        UpdatedAt,
        ProcessedAt,
    }
}
