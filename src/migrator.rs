#![allow(elided_lifetimes_in_paths)]

use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250115_000001_create_catalog_tables::Migration),
            Box::new(m20250115_000002_create_table_registry_tables::Migration),
            Box::new(m20250115_000003_create_orders_tables::Migration),
            Box::new(m20250115_000004_create_promotions_tables::Migration),
            Box::new(m20250115_000005_create_billing_tables::Migration),
            Box::new(m20250115_000006_create_reservations_table::Migration),
            Box::new(m20250115_000007_create_staff_table::Migration),
        ]
    }
}

// Migration implementations

mod m20250115_000001_create_catalog_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250115_000001_create_catalog_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Categories::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Categories::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Categories::Name).string().not_null())
                        .col(ColumnDef::new(Categories::Description).string().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Dishes::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Dishes::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Dishes::Name).string().not_null())
                        .col(ColumnDef::new(Dishes::CategoryId).uuid().null())
                        .col(ColumnDef::new(Dishes::Price).decimal().not_null())
                        .col(
                            ColumnDef::new(Dishes::Active)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(ColumnDef::new(Dishes::Description).string().null())
                        .col(ColumnDef::new(Dishes::ImageRef).string().null())
                        .col(
                            ColumnDef::new(Dishes::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Dishes::UpdatedAt)
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
                        .name("idx_dishes_category_id")
                        .table(Dishes::Table)
                        .col(Dishes::CategoryId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Combos::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Combos::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Combos::Name).string().not_null())
                        .col(ColumnDef::new(Combos::Price).decimal().not_null())
                        .col(
                            ColumnDef::new(Combos::Active)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(ColumnDef::new(Combos::Description).string().null())
                        .col(
                            ColumnDef::new(Combos::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Combos::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ComboItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ComboItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ComboItems::ComboId).uuid().not_null())
                        .col(ColumnDef::new(ComboItems::DishId).uuid().not_null())
                        .col(
                            ColumnDef::new(ComboItems::Quantity)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_combo_items_combo_id")
                        .table(ComboItems::Table)
                        .col(ComboItems::ComboId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ComboItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Combos::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Dishes::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Categories::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Categories {
        Table,
        Id,
        Name,
        Description,
    }

    #[derive(DeriveIden)]
    enum Dishes {
        Table,
        Id,
        Name,
        CategoryId,
        Price,
        Active,
        Description,
        ImageRef,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum Combos {
        Table,
        Id,
        Name,
        Price,
        Active,
        Description,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum ComboItems {
        Table,
        Id,
        ComboId,
        DishId,
        Quantity,
    }
}

mod m20250115_000002_create_table_registry_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250115_000002_create_table_registry_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Areas::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Areas::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Areas::Name).string().not_null())
                        .col(ColumnDef::new(Areas::Description).string().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(DiningTables::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(DiningTables::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(DiningTables::Name).string().not_null())
                        .col(ColumnDef::new(DiningTables::AreaId).uuid().null())
                        .col(ColumnDef::new(DiningTables::Status).string().not_null())
                        .col(
                            ColumnDef::new(DiningTables::Capacity)
                                .integer()
                                .not_null()
                                .default(4),
                        )
                        .col(
                            ColumnDef::new(DiningTables::IsWindow)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(DiningTables::Notes).string().null())
                        .col(
                            ColumnDef::new(DiningTables::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DiningTables::UpdatedAt)
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
                        .name("idx_dining_tables_status")
                        .table(DiningTables::Table)
                        .col(DiningTables::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_dining_tables_area_id")
                        .table(DiningTables::Table)
                        .col(DiningTables::AreaId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(TableGroups::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(TableGroups::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(TableGroups::CreatedBy).uuid().null())
                        .col(ColumnDef::new(TableGroups::Notes).string().null())
                        .col(
                            ColumnDef::new(TableGroups::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(TableGroupMembers::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(TableGroupMembers::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(TableGroupMembers::GroupId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(TableGroupMembers::TableId)
                                .uuid()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_table_group_members_group_id")
                        .table(TableGroupMembers::Table)
                        .col(TableGroupMembers::GroupId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_table_group_members_table_id")
                        .table(TableGroupMembers::Table)
                        .col(TableGroupMembers::TableId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(TableGroupMembers::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(TableGroups::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(DiningTables::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Areas::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Areas {
        Table,
        Id,
        Name,
        Description,
    }

    #[derive(DeriveIden)]
    enum DiningTables {
        Table,
        Id,
        Name,
        AreaId,
        Status,
        Capacity,
        IsWindow,
        Notes,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum TableGroups {
        Table,
        Id,
        CreatedBy,
        Notes,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum TableGroupMembers {
        Table,
        Id,
        GroupId,
        TableId,
    }
}

mod m20250115_000003_create_orders_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250115_000003_create_orders_tables"
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
                        .col(ColumnDef::new(Orders::OrderType).string().not_null())
                        .col(ColumnDef::new(Orders::CustomerName).string().null())
                        .col(ColumnDef::new(Orders::Phone).string().null())
                        .col(ColumnDef::new(Orders::TableId).uuid().null())
                        .col(
                            ColumnDef::new(Orders::Subtotal)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Orders::DiscountAmount)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Orders::FinalTotal)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Orders::Status).string().not_null())
                        .col(
                            ColumnDef::new(Orders::Refunded)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(Orders::Notes).string().null())
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
                        .col(
                            ColumnDef::new(Orders::Version)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_status")
                        .table(Orders::Table)
                        .col(Orders::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_table_id")
                        .table(Orders::Table)
                        .col(Orders::TableId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_created_at")
                        .table(Orders::Table)
                        .col(Orders::CreatedAt)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(OrderItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrderItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrderItems::OrderId).uuid().not_null())
                        .col(ColumnDef::new(OrderItems::DishId).uuid().null())
                        .col(ColumnDef::new(OrderItems::ComboId).uuid().null())
                        .col(ColumnDef::new(OrderItems::Quantity).integer().not_null())
                        .col(ColumnDef::new(OrderItems::UnitPrice).decimal().not_null())
                        .col(ColumnDef::new(OrderItems::Status).string().not_null())
                        .col(
                            ColumnDef::new(OrderItems::Refunded)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(OrderItems::Notes).string().null())
                        .col(
                            ColumnDef::new(OrderItems::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderItems::UpdatedAt)
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
                        .name("idx_order_items_order_id")
                        .table(OrderItems::Table)
                        .col(OrderItems::OrderId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(OrderItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Orders::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Orders {
        Table,
        Id,
        OrderType,
        CustomerName,
        Phone,
        TableId,
        Subtotal,
        DiscountAmount,
        FinalTotal,
        Status,
        Refunded,
        Notes,
        CreatedAt,
        UpdatedAt,
        Version,
    }

    #[derive(DeriveIden)]
    enum OrderItems {
        Table,
        Id,
        OrderId,
        DishId,
        ComboId,
        Quantity,
        UnitPrice,
        Status,
        Refunded,
        Notes,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20250115_000004_create_promotions_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250115_000004_create_promotions_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Promotions::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Promotions::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Promotions::Code)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Promotions::Name).string().not_null())
                        .col(ColumnDef::new(Promotions::Description).string().null())
                        .col(
                            ColumnDef::new(Promotions::DiscountPercent)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Promotions::DiscountAmount)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Promotions::StartDate).date().not_null())
                        .col(ColumnDef::new(Promotions::EndDate).date().not_null())
                        .col(ColumnDef::new(Promotions::UsageLimit).integer().null())
                        .col(
                            ColumnDef::new(Promotions::Active)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Promotions::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Promotions::UpdatedAt)
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
                        .name("idx_promotions_end_date")
                        .table(Promotions::Table)
                        .col(Promotions::EndDate)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(PromoUsages::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PromoUsages::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PromoUsages::PromotionId).uuid().not_null())
                        .col(ColumnDef::new(PromoUsages::CustomerPhone).string().null())
                        .col(
                            ColumnDef::new(PromoUsages::UsedAt)
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
                        .name("idx_promo_usages_promotion_id")
                        .table(PromoUsages::Table)
                        .col(PromoUsages::PromotionId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(PromoUsages::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Promotions::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Promotions {
        Table,
        Id,
        Code,
        Name,
        Description,
        DiscountPercent,
        DiscountAmount,
        StartDate,
        EndDate,
        UsageLimit,
        Active,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum PromoUsages {
        Table,
        Id,
        PromotionId,
        CustomerPhone,
        UsedAt,
    }
}

mod m20250115_000005_create_billing_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250115_000005_create_billing_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Invoices::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Invoices::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(Invoices::InvoiceNumber)
                                .string()
                                .not_null(),
                        )
                        // One invoice per order, enforced at the schema level.
                        .col(
                            ColumnDef::new(Invoices::OrderId)
                                .uuid()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Invoices::Subtotal).decimal().not_null())
                        .col(
                            ColumnDef::new(Invoices::DiscountAmount)
                                .decimal()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Invoices::FinalTotal).decimal().not_null())
                        .col(ColumnDef::new(Invoices::IssuedBy).uuid().null())
                        .col(
                            ColumnDef::new(Invoices::IssuedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(PaymentMethods::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PaymentMethods::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PaymentMethods::Name).string().not_null())
                        .col(
                            ColumnDef::new(PaymentMethods::Active)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(PaymentRecords::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PaymentRecords::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PaymentRecords::InvoiceId).uuid().not_null())
                        .col(
                            ColumnDef::new(PaymentRecords::PaymentMethodId)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PaymentRecords::Amount).decimal().not_null())
                        .col(
                            ColumnDef::new(PaymentRecords::PaidAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PaymentRecords::Notes).string().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_payment_records_invoice_id")
                        .table(PaymentRecords::Table)
                        .col(PaymentRecords::InvoiceId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(PaymentRecords::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(PaymentMethods::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Invoices::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Invoices {
        Table,
        Id,
        InvoiceNumber,
        OrderId,
        Subtotal,
        DiscountAmount,
        FinalTotal,
        IssuedBy,
        IssuedAt,
    }

    #[derive(DeriveIden)]
    enum PaymentMethods {
        Table,
        Id,
        Name,
        Active,
    }

    #[derive(DeriveIden)]
    enum PaymentRecords {
        Table,
        Id,
        InvoiceId,
        PaymentMethodId,
        Amount,
        PaidAt,
        Notes,
    }
}

mod m20250115_000006_create_reservations_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250115_000006_create_reservations_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Reservations::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Reservations::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Reservations::CustomerName)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Reservations::Phone).string().not_null())
                        .col(ColumnDef::new(Reservations::TableId).uuid().null())
                        .col(
                            ColumnDef::new(Reservations::ReservedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Reservations::PartySize)
                                .integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Reservations::Status).string().not_null())
                        .col(ColumnDef::new(Reservations::Notes).string().null())
                        .col(
                            ColumnDef::new(Reservations::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Reservations::UpdatedAt)
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
                        .name("idx_reservations_status")
                        .table(Reservations::Table)
                        .col(Reservations::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_reservations_reserved_at")
                        .table(Reservations::Table)
                        .col(Reservations::ReservedAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Reservations::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Reservations {
        Table,
        Id,
        CustomerName,
        Phone,
        TableId,
        ReservedAt,
        PartySize,
        Status,
        Notes,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20250115_000007_create_staff_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250115_000007_create_staff_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Staff::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Staff::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(Staff::Username)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Staff::PasswordHash).string().not_null())
                        .col(ColumnDef::new(Staff::DisplayName).string().not_null())
                        .col(ColumnDef::new(Staff::Role).string().not_null())
                        .col(
                            ColumnDef::new(Staff::Active)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Staff::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Staff::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Staff {
        Table,
        Id,
        Username,
        PasswordHash,
        DisplayName,
        Role,
        Active,
        CreatedAt,
    }
}
