//! SeaORM entity models used by the database storage backend.
//!
//! These structs map to the tables created by `database_storage`:
//! - `sessions`: one row per closed client session
//! - `data`: one row per user and polling interval, plus the `__ALL__` total
//!
//! Timestamps are unix seconds.

/// Sessions table entity model.
pub mod sessions {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "sessions")]
    pub struct Model {
        /// Auto-increment row id
        #[sea_orm(primary_key)]
        pub id: i32,
        /// Alias of the monitored server
        #[sea_orm(indexed)]
        pub host: String,
        /// Common name of the client certificate
        pub user: String,
        /// Real address (IP:port) of the client
        pub ip: String,
        /// Virtual address inside the tunnel
        pub internal_ip: String,
        /// Bytes sent by the client over the whole session
        pub sent: i64,
        /// Bytes received by the client over the whole session
        pub received: i64,
        /// Connect time as printed by the server
        pub connected_at_str: String,
        #[sea_orm(indexed)]
        pub connected_at: i64,
        /// Last poll at which the session was seen
        pub closed_at: Option<i64>,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

/// Bandwidth table entity model.
pub mod data {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "data")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i32,
        #[sea_orm(indexed)]
        pub host: String,
        #[sea_orm(indexed)]
        pub timestamp_start: i64,
        pub timestamp_end: i64,
        /// User common name, or `__ALL__` for the host total
        pub user: String,
        pub sent: i64,
        pub received: i64,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}
