// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "crawl_tasks")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub status: String,
    pub request: Json,
    pub create_time: ChronoDateTimeWithTimeZone,
    pub last_modified_time: ChronoDateTimeWithTimeZone,
    pub finish_time: Option<ChronoDateTimeWithTimeZone>,
    pub max_execution_time_ms: i64,
    pub log_entries: Json,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
