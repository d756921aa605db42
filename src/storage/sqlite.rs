use std::str::FromStr;

use anyhow::Result;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;

use crate::crawler::models::{CarRecord, PricePair};

/// Relational row as the aggregation layer sees it: the eleven record
/// fields plus an autogenerated id and creation timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredCar {
    pub id: i64,
    pub record: CarRecord,
    pub created_at: String,
}

pub struct Storage {
    pool: SqlitePool,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS car_info (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                brand       TEXT NOT NULL,
                car_name    TEXT NOT NULL,
                car_img     TEXT NOT NULL,
                sale_volume INTEGER NOT NULL,
                price_min   REAL NOT NULL,
                price_max   REAL NOT NULL,
                manufacturer TEXT NOT NULL,
                rank        INTEGER NOT NULL,
                car_model   TEXT NOT NULL,
                energy_type TEXT NOT NULL,
                market_time TEXT NOT NULL,
                insure      TEXT NOT NULL,
                created_at  TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Insert every record in one transaction; either the whole batch
    /// lands or none of it does. Returns the number inserted. No
    /// uniqueness constraint exists, so re-inserting the same records
    /// duplicates them.
    pub async fn insert_cars_batch(&self, cars: &[CarRecord]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        let created_at = Utc::now().to_rfc3339();

        for car in cars {
            sqlx::query(
                r#"
                INSERT INTO car_info (
                    brand, car_name, car_img, sale_volume,
                    price_min, price_max, manufacturer, rank,
                    car_model, energy_type, market_time, insure,
                    created_at
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&car.brand)
            .bind(&car.car_name)
            .bind(&car.car_img)
            .bind(car.sale_volume as i64)
            .bind(car.price.min)
            .bind(car.price.max)
            .bind(&car.manufacturer)
            .bind(car.rank as i64)
            .bind(&car.car_model)
            .bind(&car.energy_type)
            .bind(&car.market_time)
            .bind(&car.insure)
            .bind(&created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(cars.len())
    }

    pub async fn count_cars(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM car_info")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("n")?)
    }

    pub async fn fetch_cars(&self) -> Result<Vec<StoredCar>> {
        let rows = sqlx::query(
            r#"
            SELECT id, brand, car_name, car_img, sale_volume,
                   price_min, price_max, manufacturer, rank,
                   car_model, energy_type, market_time, insure,
                   created_at
            FROM car_info
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut cars = Vec::with_capacity(rows.len());
        for row in rows {
            cars.push(StoredCar {
                id: row.try_get("id")?,
                record: CarRecord {
                    brand: row.try_get("brand")?,
                    car_name: row.try_get("car_name")?,
                    car_img: row.try_get("car_img")?,
                    sale_volume: row.try_get::<i64, _>("sale_volume")? as u64,
                    price: PricePair {
                        min: row.try_get("price_min")?,
                        max: row.try_get("price_max")?,
                    },
                    manufacturer: row.try_get("manufacturer")?,
                    rank: row.try_get::<i64, _>("rank")? as u32,
                    car_model: row.try_get("car_model")?,
                    energy_type: row.try_get("energy_type")?,
                    market_time: row.try_get("market_time")?,
                    insure: row.try_get("insure")?,
                },
                created_at: row.try_get("created_at")?,
            });
        }
        Ok(cars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // A file-backed database: every pooled connection must see the same
    // tables, which ":memory:" does not give.
    async fn temp_storage() -> (TempDir, Storage) {
        let dir = TempDir::new().unwrap();
        let url = format!("sqlite://{}", dir.path().join("cars.db").display());
        let storage = Storage::new(&url).await.unwrap();
        storage.init_schema().await.unwrap();
        (dir, storage)
    }

    fn record(name: &str, rank: u32) -> CarRecord {
        CarRecord {
            brand: "特斯拉".to_string(),
            car_name: name.to_string(),
            car_img: "https://img.example.com/m3.webp".to_string(),
            sale_volume: 9800,
            price: PricePair { min: 23.19, max: 33.19 },
            manufacturer: "特斯拉".to_string(),
            rank,
            car_model: "中型车".to_string(),
            energy_type: "纯电动".to_string(),
            market_time: "2021.01".to_string(),
            insure: "4年或8万公里".to_string(),
        }
    }

    #[tokio::test]
    async fn batch_insert_and_fetch_preserve_fields() {
        let (_dir, storage) = temp_storage().await;

        let cars = vec![record("Model 3", 5), record("Model Y", 4)];
        let inserted = storage.insert_cars_batch(&cars).await.unwrap();
        assert_eq!(inserted, 2);

        let stored = storage.fetch_cars().await.unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].record, cars[0]);
        assert_eq!(stored[1].record, cars[1]);
        assert!(stored[0].id < stored[1].id);
        assert!(!stored[0].created_at.is_empty());
    }

    #[tokio::test]
    async fn no_uniqueness_constraint_means_duplicates_accumulate() {
        let (_dir, storage) = temp_storage().await;

        let cars = vec![record("Model 3", 5)];
        storage.insert_cars_batch(&cars).await.unwrap();
        storage.insert_cars_batch(&cars).await.unwrap();

        assert_eq!(storage.count_cars().await.unwrap(), 2);
    }
}
