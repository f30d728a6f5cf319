use sea_orm::entity::prelude::*;

/// JSON documents are stored as text so every backend reads them the same way
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "scheduled_jobs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    pub generation_settings: String,
    pub schedule_config: String,
    pub created_by: String,
    pub next_run_at: DateTimeUtc,
    pub is_active: bool,
    pub last_run_at: Option<DateTimeUtc>,
    pub last_result: Option<String>,
    pub total_runs: i64,
    pub successful_runs: i64,
    pub failed_runs: i64,
    pub total_items_generated: i64,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
