//! SQLite storage backend
//!
//! Products keep their open-ended data map as a JSON document. Category
//! membership is duplicated into `product_categories` so the implicit type
//! filter is an index lookup; presence filters (`nu`/`nn`) are pushed down
//! with `json_type`. Every other predicate, the sort and the projection run
//! in `ProductQuery::apply` over the candidates.

use super::traits::{OpenStore, ProductStore, StorageError, StorageResult};
use crate::catalog::{Attribute, AttributeId, Category, Product, ProductId, Registry, ValueType};
use crate::query::{Condition, ProductQuery, ProductRow};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// SQLite-backed catalog store
///
/// Thread-safe via internal mutex on the connection.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

/// Raw product columns in `SELECT` order
type ProductColumns = (String, String, String, bool, String, String, String);

const PRODUCT_COLUMNS: &str =
    "p.id, p.name, p.source, p.verified, p.categories_json, p.aliases_json, p.data_json";

impl SqliteStore {
    fn init_schema(conn: &Connection) -> StorageResult<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS products (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                source TEXT NOT NULL,
                verified INTEGER NOT NULL DEFAULT 0,
                categories_json TEXT NOT NULL,
                aliases_json TEXT NOT NULL,
                data_json TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS product_categories (
                category TEXT NOT NULL,
                product_id TEXT NOT NULL,
                PRIMARY KEY (category, product_id),
                FOREIGN KEY (product_id) REFERENCES products(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS attributes (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                value_type TEXT NOT NULL,
                min REAL,
                max REAL,
                is_float INTEGER NOT NULL DEFAULT 0,
                interest INTEGER NOT NULL DEFAULT 0,
                category TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_attributes_interest
                ON attributes(category, interest DESC);

            CREATE TABLE IF NOT EXISTS categories (
                name TEXT PRIMARY KEY,
                label TEXT NOT NULL,
                parents_json TEXT NOT NULL,
                aliases_json TEXT NOT NULL,
                showers_json TEXT NOT NULL
            );

            PRAGMA foreign_keys = ON;

            -- Concurrent reads during an ingestion run
            PRAGMA journal_mode = WAL;
            "#,
        )?;
        Ok(())
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| StorageError::Lock(e.to_string()))
    }

    fn row_to_product(columns: ProductColumns) -> StorageResult<Product> {
        let (id, name, source, verified, categories, aliases, data) = columns;
        Ok(Product {
            id: ProductId::from_string(id),
            name,
            categories: serde_json::from_str(&categories)?,
            aliases: serde_json::from_str(&aliases)?,
            source,
            verified,
            data: serde_json::from_str(&data)?,
        })
    }

    fn read_product(row: &rusqlite::Row<'_>) -> rusqlite::Result<ProductColumns> {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
            row.get(6)?,
        ))
    }

    /// JSON path addressing one data key, or `None` when the key cannot be
    /// quoted safely (the predicate is then evaluated in memory only).
    fn json_path(key: &str) -> Option<String> {
        if key.contains('"') || key.contains('\\') {
            None
        } else {
            Some(format!("$.\"{}\"", key))
        }
    }
}

impl OpenStore for SqliteStore {
    fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl ProductStore for SqliteStore {
    // === Product Operations ===

    fn delete_all_products(&self) -> StorageResult<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM product_categories", [])?;
        let removed = tx.execute("DELETE FROM products", [])?;
        tx.commit()?;
        Ok(removed)
    }

    fn insert_products(&self, products: &[Product]) -> StorageResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut insert_product = tx.prepare(
                r#"
                INSERT INTO products (id, name, source, verified, categories_json, aliases_json, data_json)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )?;
            let mut insert_category = tx.prepare(
                "INSERT OR IGNORE INTO product_categories (category, product_id) VALUES (?1, ?2)",
            )?;

            for product in products {
                insert_product.execute(params![
                    product.id.as_str(),
                    product.name,
                    product.source,
                    product.verified,
                    serde_json::to_string(&product.categories)?,
                    serde_json::to_string(&product.aliases)?,
                    serde_json::to_string(&product.data)?,
                ])?;
                for category in &product.categories {
                    insert_category.execute(params![category, product.id.as_str()])?;
                }
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn load_product(&self, id: &ProductId) -> StorageResult<Option<Product>> {
        let conn = self.lock()?;
        let sql = format!("SELECT {} FROM products p WHERE p.id = ?1", PRODUCT_COLUMNS);
        let row = conn
            .query_row(&sql, params![id.as_str()], Self::read_product)
            .optional()?;

        row.map(Self::row_to_product).transpose()
    }

    fn count_products(&self) -> StorageResult<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM products", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn find_products(&self, query: &ProductQuery) -> StorageResult<Vec<ProductRow>> {
        let conn = self.lock()?;

        let mut sql = format!(
            "SELECT {} FROM products p JOIN product_categories c ON c.product_id = p.id WHERE c.category = ?",
            PRODUCT_COLUMNS
        );
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(query.category.clone())];

        for filter in &query.filters {
            let Some(path) = Self::json_path(filter.attribute.as_str()) else {
                continue;
            };
            match filter.condition {
                Condition::Null => sql.push_str(" AND json_type(p.data_json, ?) IS NULL"),
                Condition::NotNull => sql.push_str(" AND json_type(p.data_json, ?) IS NOT NULL"),
                _ => continue,
            }
            params_vec.push(Box::new(path));
        }
        sql.push_str(" ORDER BY p.rowid");

        let mut stmt = conn.prepare(&sql)?;
        let params_refs: Vec<&dyn rusqlite::ToSql> = params_vec.iter().map(|b| b.as_ref()).collect();
        let rows = stmt.query_map(params_refs.as_slice(), Self::read_product)?;

        let mut candidates = Vec::new();
        for row in rows {
            candidates.push(Self::row_to_product(row?)?);
        }

        Ok(query.apply(candidates))
    }

    // === Registry Operations ===

    fn save_attribute(&self, attribute: &Attribute) -> StorageResult<()> {
        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO attributes (id, name, value_type, min, max, is_float, interest, category)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                value_type = excluded.value_type,
                min = excluded.min,
                max = excluded.max,
                is_float = excluded.is_float,
                interest = excluded.interest,
                category = excluded.category
            "#,
            params![
                attribute.id.as_str(),
                attribute.name,
                attribute.value_type.as_str(),
                attribute.min,
                attribute.max,
                attribute.is_float,
                attribute.interest,
                attribute.category,
            ],
        )?;
        Ok(())
    }

    fn save_category(&self, category: &Category) -> StorageResult<()> {
        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO categories (name, label, parents_json, aliases_json, showers_json)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(name) DO UPDATE SET
                label = excluded.label,
                parents_json = excluded.parents_json,
                aliases_json = excluded.aliases_json,
                showers_json = excluded.showers_json
            "#,
            params![
                category.name,
                category.label,
                serde_json::to_string(&category.parents)?,
                serde_json::to_string(&category.aliases)?,
                serde_json::to_string(&category.showers)?,
            ],
        )?;
        Ok(())
    }

    fn load_registry(&self) -> StorageResult<Registry> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            "SELECT id, name, value_type, min, max, is_float, interest, category
             FROM attributes ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<f64>>(3)?,
                row.get::<_, Option<f64>>(4)?,
                row.get::<_, bool>(5)?,
                row.get::<_, i64>(6)?,
                row.get::<_, String>(7)?,
            ))
        })?;

        let mut attributes = Vec::new();
        for row in rows {
            let (id, name, value_type, min, max, is_float, interest, category) = row?;
            let value_type = ValueType::parse(&value_type).ok_or_else(|| {
                StorageError::Corrupt(format!("attribute {} has unknown type '{}'", id, value_type))
            })?;
            attributes.push(Attribute {
                id: AttributeId::new(id),
                name,
                value_type,
                min,
                max,
                is_float,
                interest,
                category,
            });
        }

        let mut stmt = conn.prepare(
            "SELECT name, label, parents_json, aliases_json, showers_json FROM categories ORDER BY name",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut categories = Vec::new();
        for row in rows {
            let (name, label, parents, aliases, showers) = row?;
            categories.push(Category {
                name,
                label,
                parents: serde_json::from_str(&parents)?,
                aliases: serde_json::from_str(&aliases)?,
                showers: serde_json::from_str(&showers)?,
            });
        }

        Ok(Registry::new(attributes, categories))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Datum, Value};
    use crate::query::{Filter, Sorter};

    fn create_test_store() -> SqliteStore {
        SqliteStore::open_in_memory().unwrap()
    }

    fn create_test_product(name: &str, category: &str, pop: Option<f64>) -> Product {
        let mut product = Product::new(name, "dbpedia").with_category(category);
        if let Some(pop) = pop {
            product = product.with_datum("pop", Datum::new(Value::Number(pop), "system").with_source("dbpedia"));
        }
        product
    }

    #[test]
    fn test_insert_and_load_product() {
        let store = create_test_store();
        let mut genres = Datum::new(Value::string("jazz"), "system");
        genres.push(Value::string("Blues"), Some("dbr:Blues".into()));
        let product = create_test_product("Berlin", "city", Some(3.6e6)).with_datum("genre", genres);

        store.insert_products(std::slice::from_ref(&product)).unwrap();

        let loaded = store.load_product(&product.id).unwrap().unwrap();
        assert_eq!(loaded, product);
        assert_eq!(store.count_products().unwrap(), 1);
    }

    #[test]
    fn test_load_missing_product() {
        let store = create_test_store();
        assert!(store.load_product(&ProductId::from_string("nope")).unwrap().is_none());
    }

    #[test]
    fn test_delete_all_products() {
        let store = create_test_store();
        store
            .insert_products(&[
                create_test_product("A", "city", None),
                create_test_product("B", "city", None),
            ])
            .unwrap();

        assert_eq!(store.delete_all_products().unwrap(), 2);
        assert_eq!(store.count_products().unwrap(), 0);
        assert!(store.find_products(&ProductQuery::new("city")).unwrap().is_empty());
    }

    #[test]
    fn test_insert_batch_is_atomic() {
        let store = create_test_store();
        let first = create_test_product("A", "city", None);
        let mut duplicate = create_test_product("B", "city", None);
        duplicate.id = first.id.clone();

        assert!(store.insert_products(&[first, duplicate]).is_err());
        assert_eq!(store.count_products().unwrap(), 0);
    }

    #[test]
    fn test_find_products_by_type_in_insertion_order() {
        let store = create_test_store();
        store
            .insert_products(&[
                create_test_product("Bonn", "city", Some(3.0)),
                create_test_product("Alice", "person", None),
                create_test_product("Aachen", "city", Some(2.0)),
            ])
            .unwrap();

        let rows = store.find_products(&ProductQuery::new("city")).unwrap();
        let names: Vec<_> = rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Bonn", "Aachen"]);

        assert!(store.find_products(&ProductQuery::new("galaxy")).unwrap().is_empty());
    }

    #[test]
    fn test_presence_filters_pushed_down() {
        let store = create_test_store();
        store
            .insert_products(&[
                create_test_product("Bonn", "city", Some(3.0)),
                create_test_product("Atlantis", "city", None),
            ])
            .unwrap();

        let nu = store
            .find_products(&ProductQuery::new("city").with_filter(Filter::new("pop", Condition::Null, "")))
            .unwrap();
        assert_eq!(nu.len(), 1);
        assert_eq!(nu[0].name, "Atlantis");

        let nn = store
            .find_products(&ProductQuery::new("city").with_filter(Filter::new("pop", Condition::NotNull, "")))
            .unwrap();
        assert_eq!(nn.len(), 1);
        assert_eq!(nn[0].name, "Bonn");
    }

    #[test]
    fn test_find_products_sorts_and_projects() {
        let store = create_test_store();
        store
            .insert_products(&[
                create_test_product("Bonn", "city", Some(3.0)),
                create_test_product("Berlin", "city", Some(30.0)),
            ])
            .unwrap();

        let rows = store
            .find_products(
                &ProductQuery::new("city")
                    .with_sorter(Sorter::descending("pop"))
                    .with_projection(vec!["pop".into()]),
            )
            .unwrap();
        assert_eq!(rows[0].name, "Berlin");
        assert!(rows[0].data.contains_key("pop"));
    }

    #[test]
    fn test_registry_round_trip() {
        let store = create_test_store();
        let pop = Attribute::new("a1", "populationTotal", ValueType::Number, "city")
            .with_bounds(Some(0.0), Some(1e10))
            .with_interest(9);
        let city = Category::new("city", "City")
            .with_parent("settlement")
            .with_showers(vec!["a1".into()]);
        store.save_attribute(&pop).unwrap();
        store.save_attribute(&pop.clone().with_interest(10)).unwrap();
        store.save_category(&city).unwrap();

        let registry = store.load_registry().unwrap();
        assert_eq!(registry.attribute_count(), 1);
        assert_eq!(registry.attribute("a1").unwrap().interest, 10);
        assert_eq!(registry.attribute_by_name("populationTotal").unwrap().max, Some(1e10));
        assert_eq!(registry.category("city"), Some(&city));
    }

    #[test]
    fn test_open_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("catalog.db");
        let store = SqliteStore::open(&path).unwrap();
        store.insert_products(&[create_test_product("A", "city", None)]).unwrap();
        drop(store);

        let reopened = SqliteStore::open(&path).unwrap();
        assert_eq!(reopened.count_products().unwrap(), 1);
    }
}
