/// Ticket category reference data
///
/// Categories are administrator-managed and only ever referenced by
/// tickets: a ticket snapshots the category's SLA window at creation, so
/// editing a category never rewrites historical due dates.
use crate::{
    db::models::TicketCategory,
    error::{DeskError, DeskResult},
};
use chrono::Utc;
use sqlx::SqlitePool;

/// Category manager
#[derive(Clone)]
pub struct CategoryManager {
    db: SqlitePool,
}

/// Fields accepted on category create/update
#[derive(Debug, Clone)]
pub struct CategoryInput {
    pub name: String,
    pub color: String,
    pub sla_hours: Option<i64>,
    pub display_order: i64,
}

impl CategoryManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    fn validate(input: &CategoryInput) -> DeskResult<()> {
        if input.name.trim().is_empty() {
            return Err(DeskError::Validation("Category name cannot be empty".to_string()));
        }
        if let Some(hours) = input.sla_hours {
            if hours <= 0 {
                return Err(DeskError::Validation(
                    "Category SLA hours must be positive".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Create a category
    pub async fn create(&self, input: CategoryInput) -> DeskResult<TicketCategory> {
        Self::validate(&input)?;

        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO ticket_category (name, color, sla_hours, is_active, display_order, created_at)
             VALUES (?1, ?2, ?3, 1, ?4, ?5)",
        )
        .bind(&input.name)
        .bind(&input.color)
        .bind(input.sla_hours)
        .bind(input.display_order)
        .bind(now)
        .execute(&self.db)
        .await?;

        self.get(result.last_insert_rowid()).await
    }

    /// Update a category's fields and active flag
    pub async fn update(
        &self,
        id: i64,
        input: CategoryInput,
        is_active: bool,
    ) -> DeskResult<TicketCategory> {
        Self::validate(&input)?;

        let result = sqlx::query(
            "UPDATE ticket_category
             SET name = ?1, color = ?2, sla_hours = ?3, is_active = ?4, display_order = ?5
             WHERE id = ?6 AND deleted_at IS NULL",
        )
        .bind(&input.name)
        .bind(&input.color)
        .bind(input.sla_hours)
        .bind(is_active)
        .bind(input.display_order)
        .bind(id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DeskError::NotFound(format!("Category {} not found", id)));
        }

        self.get(id).await
    }

    /// Get a category by id, including soft-deleted ones (for audit reads)
    pub async fn get(&self, id: i64) -> DeskResult<TicketCategory> {
        let row = sqlx::query("SELECT * FROM ticket_category WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| DeskError::NotFound(format!("Category {} not found", id)))?;

        TicketCategory::from_row(&row)
    }

    /// Get a category usable for new tickets (active, not deleted)
    pub async fn get_active(&self, id: i64) -> DeskResult<TicketCategory> {
        let category = self.get(id).await?;
        if !category.is_active || category.deleted_at.is_some() {
            return Err(DeskError::NotFound(format!("Category {} not found", id)));
        }
        Ok(category)
    }

    /// List active categories in display order
    pub async fn list_active(&self) -> DeskResult<Vec<TicketCategory>> {
        let rows = sqlx::query(
            "SELECT * FROM ticket_category
             WHERE is_active = 1 AND deleted_at IS NULL
             ORDER BY display_order, name",
        )
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(TicketCategory::from_row).collect()
    }

    /// Soft-delete a category; existing tickets keep referencing it
    pub async fn soft_delete(&self, id: i64) -> DeskResult<()> {
        let result = sqlx::query(
            "UPDATE ticket_category SET deleted_at = ?1 WHERE id = ?2 AND deleted_at IS NULL",
        )
        .bind(Utc::now())
        .bind(id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DeskError::NotFound(format!("Category {} not found", id)));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    fn input(name: &str, sla_hours: Option<i64>) -> CategoryInput {
        CategoryInput {
            name: name.to_string(),
            color: "#2563eb".to_string(),
            sla_hours,
            display_order: 0,
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let categories = CategoryManager::new(test_pool().await);

        let created = categories.create(input("Billing", Some(24))).await.unwrap();
        assert_eq!(created.name, "Billing");
        assert_eq!(created.sla_hours, Some(24));
        assert!(created.is_active);

        let fetched = categories.get_active(created.id).await.unwrap();
        assert_eq!(fetched.id, created.id);
    }

    #[tokio::test]
    async fn test_rejects_non_positive_sla() {
        let categories = CategoryManager::new(test_pool().await);

        let result = categories.create(input("Billing", Some(0))).await;
        assert!(matches!(result, Err(DeskError::Validation(_))));
    }

    #[tokio::test]
    async fn test_soft_delete_hides_from_active() {
        let categories = CategoryManager::new(test_pool().await);

        let created = categories.create(input("Billing", Some(24))).await.unwrap();
        categories.soft_delete(created.id).await.unwrap();

        // Gone from active reads, still readable for audit
        assert!(categories.get_active(created.id).await.is_err());
        let audit = categories.get(created.id).await.unwrap();
        assert!(audit.deleted_at.is_some());
        assert!(categories.list_active().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_orders_by_display_order() {
        let categories = CategoryManager::new(test_pool().await);

        let mut second = input("Registration", Some(24));
        second.display_order = 2;
        let mut first = input("Billing", None);
        first.display_order = 1;

        categories.create(second).await.unwrap();
        categories.create(first).await.unwrap();

        let listed = categories.list_active().await.unwrap();
        assert_eq!(listed[0].name, "Billing");
        assert_eq!(listed[1].name, "Registration");
    }
}
