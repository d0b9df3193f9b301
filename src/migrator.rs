use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250301_000001_create_consumable_items_table::Migration),
            Box::new(m20250301_000002_create_stock_movements_table::Migration),
            Box::new(m20250301_000003_create_audit_logs_table::Migration),
        ]
    }
}

// Migration implementations

mod m20250301_000001_create_consumable_items_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250301_000001_create_consumable_items_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Create consumable_items table aligned with entities::consumable_item Model
            manager
                .create_table(
                    Table::create()
                        .table(ConsumableItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ConsumableItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ConsumableItems::Name).string().not_null())
                        .col(
                            ColumnDef::new(ConsumableItems::Category)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ConsumableItems::Unit).string().not_null())
                        .col(
                            ColumnDef::new(ConsumableItems::CurrentStock)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(ConsumableItems::MinStock)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(ConsumableItems::MaxStock)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(ConsumableItems::Version)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(ConsumableItems::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ConsumableItems::UpdatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            // Useful indexes
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_consumable_items_name")
                        .table(ConsumableItems::Table)
                        .col(ConsumableItems::Name)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_consumable_items_category")
                        .table(ConsumableItems::Table)
                        .col(ConsumableItems::Category)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ConsumableItems::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum ConsumableItems {
        Table,
        Id,
        Name,
        Category,
        Unit,
        CurrentStock,
        MinStock,
        MaxStock,
        Version,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20250301_000002_create_stock_movements_table {
    use super::m20250301_000001_create_consumable_items_table::ConsumableItems;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250301_000002_create_stock_movements_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Create stock_movements table aligned with entities::stock_movement Model.
            // Rows are append-only and removed only through the item FK cascade.
            manager
                .create_table(
                    Table::create()
                        .table(StockMovements::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockMovements::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockMovements::ItemId).uuid().not_null())
                        .col(ColumnDef::new(StockMovements::Kind).string().not_null())
                        .col(
                            ColumnDef::new(StockMovements::Quantity)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockMovements::PreviousStock)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockMovements::CurrentStock)
                                .integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockMovements::Operator).string().not_null())
                        .col(ColumnDef::new(StockMovements::Reason).string().null())
                        .col(ColumnDef::new(StockMovements::Recipient).string().null())
                        .col(ColumnDef::new(StockMovements::Notes).string().null())
                        .col(
                            ColumnDef::new(StockMovements::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_stock_movements_item_id")
                                .from(StockMovements::Table, StockMovements::ItemId)
                                .to(ConsumableItems::Table, ConsumableItems::Id)
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
                        .name("idx_stock_movements_item_id")
                        .table(StockMovements::Table)
                        .col(StockMovements::ItemId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_movements_created_at")
                        .table(StockMovements::Table)
                        .col(StockMovements::CreatedAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(StockMovements::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum StockMovements {
        Table,
        Id,
        ItemId,
        Kind,
        Quantity,
        PreviousStock,
        CurrentStock,
        Operator,
        Reason,
        Recipient,
        Notes,
        CreatedAt,
    }
}

mod m20250301_000003_create_audit_logs_table {
    use super::m20250301_000001_create_consumable_items_table::ConsumableItems;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250301_000003_create_audit_logs_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Create audit_logs table aligned with entities::audit_log Model.
            // ItemName snapshots the name at write time so entries stay
            // readable after a rename.
            manager
                .create_table(
                    Table::create()
                        .table(AuditLogs::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(AuditLogs::Id)
                                .big_integer()
                                .primary_key()
                                .auto_increment()
                                .not_null(),
                        )
                        .col(ColumnDef::new(AuditLogs::ItemId).uuid().not_null())
                        .col(ColumnDef::new(AuditLogs::ItemName).string().not_null())
                        .col(
                            ColumnDef::new(AuditLogs::OperationKind)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(AuditLogs::SignedQuantity)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(AuditLogs::PreviousStock)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(AuditLogs::CurrentStock)
                                .integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(AuditLogs::Operator).string().not_null())
                        .col(ColumnDef::new(AuditLogs::Reason).string().null())
                        .col(ColumnDef::new(AuditLogs::Notes).string().null())
                        .col(
                            ColumnDef::new(AuditLogs::IsEditable)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(AuditLogs::Superseded)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(AuditLogs::OriginalLogId)
                                .big_integer()
                                .null(),
                        )
                        .col(ColumnDef::new(AuditLogs::ModifiedBy).string().null())
                        .col(ColumnDef::new(AuditLogs::ModifiedAt).timestamp().null())
                        .col(
                            ColumnDef::new(AuditLogs::ModificationReason)
                                .string()
                                .null(),
                        )
                        .col(ColumnDef::new(AuditLogs::CreatedAt).timestamp().not_null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_audit_logs_item_id")
                                .from(AuditLogs::Table, AuditLogs::ItemId)
                                .to(ConsumableItems::Table, ConsumableItems::Id)
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
                        .name("idx_audit_logs_item_id")
                        .table(AuditLogs::Table)
                        .col(AuditLogs::ItemId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_audit_logs_operation_kind")
                        .table(AuditLogs::Table)
                        .col(AuditLogs::OperationKind)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_audit_logs_created_at")
                        .table(AuditLogs::Table)
                        .col(AuditLogs::CreatedAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(AuditLogs::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum AuditLogs {
        Table,
        Id,
        ItemId,
        ItemName,
        OperationKind,
        SignedQuantity,
        PreviousStock,
        CurrentStock,
        Operator,
        Reason,
        Notes,
        IsEditable,
        Superseded,
        OriginalLogId,
        ModifiedBy,
        ModifiedAt,
        ModificationReason,
        CreatedAt,
    }
}
