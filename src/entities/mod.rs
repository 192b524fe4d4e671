pub mod cart;
pub mod order;
pub mod order_item;
pub mod product;
pub mod user;
pub mod wishlist;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, Schema, Set,
};
use tracing::info;

use crate::config::BootstrapAdmin;

/// Creates every table that does not exist yet. Parents come before children so the
/// foreign keys resolve on both Postgres and SQLite.
pub async fn setup_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    let mut statements = vec![
        schema.create_table_from_entity(user::Entity),
        schema.create_table_from_entity(product::Entity),
        schema.create_table_from_entity(cart::Entity),
        schema.create_table_from_entity(wishlist::Entity),
        schema.create_table_from_entity(order::Entity),
        schema.create_table_from_entity(order_item::Entity),
    ];

    for statement in statements.iter_mut() {
        statement.if_not_exists();
        db.execute(backend.build(&*statement)).await?;
    }

    Ok(())
}

/// Makes sure the configured bootstrap account exists and is an admin.
pub async fn bootstrap_admin(db: &DatabaseConnection, admin: &BootstrapAdmin) -> Result<(), DbErr> {
    let email = admin.email.trim().to_lowercase();

    match user::Entity::find()
        .filter(user::Column::Email.eq(email.as_str()))
        .one(db)
        .await?
    {
        Some(existing) if existing.role == user::Role::Admin => Ok(()),
        Some(existing) => {
            let mut existing: user::ActiveModel = existing.into();
            existing.role = Set(user::Role::Admin);
            existing.update(db).await?;
            info!(email = %email, "Promoted bootstrap account to admin");
            Ok(())
        }
        None => {
            let password = user::hash_password(&admin.password)
                .map_err(|err| DbErr::Custom(format!("Failed to hash password: {err}")))?;
            user::ActiveModel {
                email: Set(email.clone()),
                password: Set(password),
                role: Set(user::Role::Admin),
                created_at: Set(Utc::now()),
                ..Default::default()
            }
            .insert(db)
            .await?;
            info!(email = %email, "Created bootstrap admin account");
            Ok(())
        }
    }
}
