use async_trait::async_trait;
use rusqlite::{params, params_from_iter, OptionalExtension, Row};

use crate::db::models::Product;
use crate::db::RepositoryError;
use crate::search::{like_pattern, ProductQuery, SortDirection};
use crate::state::DbPool;

const PRODUCT_COLUMNS: &str =
    "id, name, description, price, image, image_id, created_at, updated_at";

const DUPLICATE_NAME: &str = "Product Already Exist";

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn insert(&self, product: &Product) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Product>, RepositoryError>;

    async fn find_by_name(&self, name: &str) -> Result<Option<Product>, RepositoryError>;

    async fn update(&self, product: &Product) -> Result<(), RepositoryError>;

    /// Returns `false` when no product had this id.
    async fn delete(&self, id: &str) -> Result<bool, RepositoryError>;

    async fn search(&self, query: &ProductQuery) -> Result<Vec<Product>, RepositoryError>;
}

pub struct SqliteProductRepository {
    pool: DbPool,
}

impl SqliteProductRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_product(row: &Row<'_>) -> rusqlite::Result<Product> {
    Ok(Product {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        price: row.get(3)?,
        image: row.get(4)?,
        image_id: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

/// Render a [`ProductQuery`] as a SELECT plus its bound parameters.
///
/// Sort columns come from a closed enum, so only filter values are
/// bound. Ties are broken by insertion order in the direction of the
/// first sort key.
fn render_search(query: &ProductQuery) -> (String, Vec<String>) {
    let mut sql = format!("SELECT {PRODUCT_COLUMNS} FROM products");
    let mut values = Vec::new();

    let filters = query.filters();
    if !filters.is_empty() {
        let clauses: Vec<String> = filters
            .iter()
            .enumerate()
            .map(|(i, (column, _))| format!("casefold({column}) LIKE ?{} ESCAPE '\\'", i + 1))
            .collect();
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
        values.extend(
            filters
                .iter()
                .map(|(_, needle)| like_pattern(&needle.to_lowercase())),
        );
    }

    let tiebreak = query
        .sort
        .first()
        .map(|k| k.direction)
        .unwrap_or(SortDirection::Ascending);
    let mut order: Vec<String> = query
        .sort
        .iter()
        .map(|k| format!("{} {}", k.field.column(), k.direction.sql()))
        .collect();
    order.push(format!("rowid {}", tiebreak.sql()));
    sql.push_str(" ORDER BY ");
    sql.push_str(&order.join(", "));

    (sql, values)
}

#[async_trait]
impl ProductRepository for SqliteProductRepository {
    async fn insert(&self, product: &Product) -> Result<(), RepositoryError> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO products (id, name, description, price, image, image_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                product.id,
                product.name,
                product.description,
                product.price,
                product.image,
                product.image_id,
                product.created_at,
                product.updated_at
            ],
        )
        .map_err(|e| RepositoryError::unique_as_conflict(e, DUPLICATE_NAME))?;
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Product>, RepositoryError> {
        let conn = self.pool.get()?;
        let product = conn
            .query_row(
                &format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1"),
                params![id],
                row_to_product,
            )
            .optional()?;
        Ok(product)
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Product>, RepositoryError> {
        let conn = self.pool.get()?;
        let product = conn
            .query_row(
                &format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE name = ?1"),
                params![name],
                row_to_product,
            )
            .optional()?;
        Ok(product)
    }

    async fn update(&self, product: &Product) -> Result<(), RepositoryError> {
        let conn = self.pool.get()?;
        let changed = conn
            .execute(
                "UPDATE products
                 SET name = ?2, description = ?3, price = ?4, image = ?5, image_id = ?6, updated_at = ?7
                 WHERE id = ?1",
                params![
                    product.id,
                    product.name,
                    product.description,
                    product.price,
                    product.image,
                    product.image_id,
                    product.updated_at
                ],
            )
            .map_err(|e| RepositoryError::unique_as_conflict(e, DUPLICATE_NAME))?;

        if changed == 0 {
            return Err(RepositoryError::NotFound("Product Not Found".into()));
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool, RepositoryError> {
        let conn = self.pool.get()?;
        let deleted = conn.execute("DELETE FROM products WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }

    async fn search(&self, query: &ProductQuery) -> Result<Vec<Product>, RepositoryError> {
        let (sql, values) = render_search(query);
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&sql)?;
        let products = stmt
            .query_map(params_from_iter(values.iter()), row_to_product)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(products)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::now_timestamp;
    use crate::db::test_support::migrated_pool;
    use crate::search::{parse_sort, SearchParams};

    fn product(id: &str, name: &str, description: &str, price: f64) -> Product {
        let now = now_timestamp();
        Product {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            price,
            image: format!("/uploads/{id}.png"),
            image_id: id.into(),
            created_at: now.clone(),
            updated_at: now,
        }
    }

    async fn seeded() -> (SqliteProductRepository, tempfile::TempDir) {
        let (pool, tmp) = migrated_pool();
        let repo = SqliteProductRepository::new(pool);
        repo.insert(&product("p1", "Blue Widget", "A small widget", 9.99))
            .await
            .unwrap();
        repo.insert(&product("p2", "Red Gadget", "Large gadget", 25.0))
            .await
            .unwrap();
        repo.insert(&product("p3", "Green widget", "100% cotton_blend", 4.5))
            .await
            .unwrap();
        (repo, tmp)
    }

    fn names(products: &[Product]) -> Vec<&str> {
        products.iter().map(|p| p.name.as_str()).collect()
    }

    #[test]
    fn render_without_filters_orders_by_rowid() {
        let (sql, values) = render_search(&ProductQuery::default());
        assert!(sql.ends_with("ORDER BY rowid ASC"));
        assert!(!sql.contains("WHERE"));
        assert!(values.is_empty());
    }

    #[test]
    fn render_numbers_placeholders_in_order() {
        let query = ProductQuery {
            name: Some("a".into()),
            description: Some("b".into()),
            price: None,
            sort: parse_sort("-price"),
        };
        let (sql, values) = render_search(&query);
        assert!(sql.contains("casefold(name) LIKE ?1 ESCAPE '\\'"));
        assert!(sql.contains("casefold(description) LIKE ?2 ESCAPE '\\'"));
        assert!(sql.contains("ORDER BY price DESC, rowid DESC"));
        assert_eq!(values, vec!["%a%".to_string(), "%b%".to_string()]);
    }

    #[tokio::test]
    async fn duplicate_name_is_conflict() {
        let (repo, _tmp) = seeded().await;
        let err = repo
            .insert(&product("p9", "Blue Widget", "again", 1.0))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(ref m) if m == DUPLICATE_NAME));
    }

    #[tokio::test]
    async fn name_filter_is_case_insensitive_substring() {
        let (repo, _tmp) = seeded().await;
        let query = ProductQuery::from_params(&SearchParams {
            name: Some("WIDGET".into()),
            ..Default::default()
        });
        let found = repo.search(&query).await.unwrap();
        assert_eq!(names(&found), vec!["Blue Widget", "Green widget"]);

        repo.insert(&product("p4", "ÉCLAIR", "Choux pastry", 3.0))
            .await
            .unwrap();
        for needle in ["éclair", "Éclair", "CLAIR"] {
            let query = ProductQuery::from_params(&SearchParams {
                name: Some(needle.into()),
                ..Default::default()
            });
            let found = repo.search(&query).await.unwrap();
            assert_eq!(names(&found), vec!["ÉCLAIR"], "needle {needle}");
        }
    }

    #[tokio::test]
    async fn filters_are_anded() {
        let (repo, _tmp) = seeded().await;
        let query = ProductQuery::from_params(&SearchParams {
            name: Some("widget".into()),
            description: Some("small".into()),
            ..Default::default()
        });
        let found = repo.search(&query).await.unwrap();
        assert_eq!(names(&found), vec!["Blue Widget"]);
    }

    #[tokio::test]
    async fn wildcards_in_needle_match_literally() {
        let (repo, _tmp) = seeded().await;
        let query = ProductQuery::from_params(&SearchParams {
            description: Some("0% cotton_".into()),
            ..Default::default()
        });
        assert_eq!(names(&repo.search(&query).await.unwrap()), vec!["Green widget"]);

        let query = ProductQuery::from_params(&SearchParams {
            description: Some("_".into()),
            ..Default::default()
        });
        assert_eq!(names(&repo.search(&query).await.unwrap()), vec!["Green widget"]);
    }

    #[tokio::test]
    async fn price_filter_matches_text_form() {
        let (repo, _tmp) = seeded().await;
        let query = ProductQuery::from_params(&SearchParams {
            price: Some("9.9".into()),
            ..Default::default()
        });
        assert_eq!(names(&repo.search(&query).await.unwrap()), vec!["Blue Widget"]);
    }

    #[tokio::test]
    async fn sorts_numerically_by_price() {
        let (repo, _tmp) = seeded().await;
        let query = ProductQuery {
            sort: parse_sort("price"),
            ..Default::default()
        };
        let found = repo.search(&query).await.unwrap();
        assert_eq!(
            names(&found),
            vec!["Green widget", "Blue Widget", "Red Gadget"]
        );
    }

    #[tokio::test]
    async fn newest_first_with_descending_created_at() {
        let (repo, _tmp) = seeded().await;
        let query = ProductQuery {
            sort: parse_sort("-createdAt"),
            ..Default::default()
        };
        let found = repo.search(&query).await.unwrap();
        assert_eq!(
            names(&found),
            vec!["Green widget", "Red Gadget", "Blue Widget"]
        );
    }

    #[tokio::test]
    async fn update_and_delete() {
        let (repo, _tmp) = seeded().await;

        let mut p = repo.find_by_id("p2").await.unwrap().unwrap();
        p.price = 30.0;
        repo.update(&p).await.unwrap();
        assert_eq!(repo.find_by_id("p2").await.unwrap().unwrap().price, 30.0);

        assert!(repo.delete("p2").await.unwrap());
        assert!(!repo.delete("p2").await.unwrap());
        assert!(repo.find_by_id("p2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rename_onto_existing_name_is_conflict() {
        let (repo, _tmp) = seeded().await;
        let mut p = repo.find_by_id("p2").await.unwrap().unwrap();
        p.name = "Blue Widget".into();
        let err = repo.update(&p).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }
}
