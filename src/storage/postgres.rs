//! PostgreSQL-backed pack repository.

use async_trait::async_trait;
use chrono::Utc;
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use tokio_postgres::NoTls;
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::storage::models::{
    PackStats, Sticker, StickerPack, StickerType, UserInfo, UserPackMembership,
};
use crate::storage::repository::PackRepository;

mod embedded {
    refinery::embed_migrations!("src/storage/migrations");
}

/// Build a connection pool from a database URL.
pub fn connect(database_url: &str, pool_size: usize) -> Result<Pool, DatabaseError> {
    let pg_config: tokio_postgres::Config = database_url.parse()?;
    let manager = Manager::from_config(
        pg_config,
        NoTls,
        ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        },
    );
    let pool = Pool::builder(manager).max_size(pool_size).build()?;
    Ok(pool)
}

/// Apply embedded schema migrations.
pub async fn run_migrations(pool: &Pool) -> Result<(), DatabaseError> {
    let mut conn = pool.get().await?;
    let client: &mut tokio_postgres::Client = &mut conn;
    embedded::migrations::runner()
        .run_async(client)
        .await
        .map_err(|e| DatabaseError::Migration(e.to_string()))?;
    Ok(())
}

/// Repository over a deadpool-postgres pool.
pub struct PostgresPackRepository {
    pool: Pool,
}

impl PostgresPackRepository {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    fn row_to_pack(row: &tokio_postgres::Row) -> StickerPack {
        StickerPack {
            id: row.get("id"),
            name: row.get("name"),
            title: row.get("title"),
            owner_id: row.get("owner_id"),
            is_animated: row.get("is_animated"),
            is_video: row.get("is_video"),
            created_at: row.get("created_at"),
            last_modified: row.get("last_modified"),
        }
    }

    fn row_to_sticker(row: &tokio_postgres::Row) -> Sticker {
        let type_str: String = row.get("type");
        Sticker {
            id: row.get("id"),
            pack_id: row.get("pack_id"),
            file_id: row.get("file_id"),
            emoji: row.get("emoji"),
            position: row.get("position"),
            sticker_type: StickerType::from_str_loose(&type_str),
            created_at: row.get("created_at"),
        }
    }
}

#[async_trait]
impl PackRepository for PostgresPackRepository {
    async fn upsert_user(&self, user: &UserInfo) -> Result<(), DatabaseError> {
        let conn = self.pool.get().await?;
        conn.execute(
            r#"
            INSERT INTO users (id, username, first_name, last_name)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE
            SET username = EXCLUDED.username,
                first_name = EXCLUDED.first_name,
                last_name = EXCLUDED.last_name
            "#,
            &[&user.id, &user.username, &user.first_name, &user.last_name],
        )
        .await?;
        Ok(())
    }

    async fn create_pack(&self, pack: &StickerPack, creator: i64) -> Result<(), DatabaseError> {
        let mut conn = self.pool.get().await?;
        let tx = conn.transaction().await?;

        tx.execute(
            r#"
            INSERT INTO sticker_packs
                (id, name, title, owner_id, is_animated, is_video, created_at, last_modified)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
            &[
                &pack.id,
                &pack.name,
                &pack.title,
                &pack.owner_id,
                &pack.is_animated,
                &pack.is_video,
                &pack.created_at,
                &pack.last_modified,
            ],
        )
        .await?;

        tx.execute(
            r#"
            INSERT INTO user_packs (user_id, pack_id, can_edit, is_favorite)
            VALUES ($1, $2, TRUE, FALSE)
            "#,
            &[&creator, &pack.id],
        )
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn import_pack(
        &self,
        pack: &StickerPack,
        stickers: &[(String, Option<String>)],
        user_id: i64,
        can_edit: bool,
    ) -> Result<StickerPack, DatabaseError> {
        let mut conn = self.pool.get().await?;
        let tx = conn.transaction().await?;

        tx.execute(
            r#"
            INSERT INTO sticker_packs
                (id, name, title, owner_id, is_animated, is_video, created_at, last_modified)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (name) DO NOTHING
            "#,
            &[
                &pack.id,
                &pack.name,
                &pack.title,
                &pack.owner_id,
                &pack.is_animated,
                &pack.is_video,
                &pack.created_at,
                &pack.last_modified,
            ],
        )
        .await?;

        // The slug may already be known locally; the stored row wins.
        let row = tx
            .query_one(
                "SELECT * FROM sticker_packs WHERE name = $1",
                &[&pack.name],
            )
            .await?;
        let stored = Self::row_to_pack(&row);

        let sticker_type = if stored.is_video {
            StickerType::Video
        } else if stored.is_animated {
            StickerType::Animated
        } else {
            StickerType::Static
        };
        for (position, (file_id, emoji)) in stickers.iter().enumerate() {
            tx.execute(
                r#"
                INSERT INTO stickers (id, pack_id, file_id, emoji, position, type)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (pack_id, position) DO NOTHING
                "#,
                &[
                    &Uuid::new_v4(),
                    &stored.id,
                    file_id,
                    emoji,
                    &(position as i32),
                    &sticker_type.as_str(),
                ],
            )
            .await?;
        }

        tx.execute(
            r#"
            INSERT INTO user_packs (user_id, pack_id, can_edit, is_favorite)
            VALUES ($1, $2, $3, FALSE)
            ON CONFLICT (user_id, pack_id) DO UPDATE
            SET can_edit = user_packs.can_edit OR EXCLUDED.can_edit
            "#,
            &[&user_id, &stored.id, &can_edit],
        )
        .await?;

        tx.commit().await?;
        Ok(stored)
    }

    async fn record_sticker(
        &self,
        pack_id: Uuid,
        file_id: &str,
        emoji: Option<&str>,
        sticker_type: StickerType,
    ) -> Result<Sticker, DatabaseError> {
        let mut conn = self.pool.get().await?;
        let tx = conn.transaction().await?;

        // Lock the pack row so concurrent appends serialize on position.
        let pack_row = tx
            .query_opt(
                "SELECT id FROM sticker_packs WHERE id = $1 FOR UPDATE",
                &[&pack_id],
            )
            .await?;
        if pack_row.is_none() {
            return Err(DatabaseError::NotFound {
                entity: "sticker_pack".to_string(),
                id: pack_id.to_string(),
            });
        }

        let position_row = tx
            .query_one(
                "SELECT COALESCE(MAX(position) + 1, 0)::INT FROM stickers WHERE pack_id = $1",
                &[&pack_id],
            )
            .await?;
        let position: i32 = position_row.get(0);

        let sticker = Sticker {
            id: Uuid::new_v4(),
            pack_id,
            file_id: file_id.to_string(),
            emoji: emoji.map(|e| e.to_string()),
            position,
            sticker_type,
            created_at: Utc::now(),
        };

        tx.execute(
            r#"
            INSERT INTO stickers (id, pack_id, file_id, emoji, position, type, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
            &[
                &sticker.id,
                &sticker.pack_id,
                &sticker.file_id,
                &sticker.emoji,
                &sticker.position,
                &sticker.sticker_type.as_str(),
                &sticker.created_at,
            ],
        )
        .await?;

        tx.execute(
            "UPDATE sticker_packs SET last_modified = $2 WHERE id = $1",
            &[&pack_id, &sticker.created_at],
        )
        .await?;

        tx.commit().await?;
        Ok(sticker)
    }

    async fn remove_membership(
        &self,
        user_id: i64,
        pack_id: Uuid,
    ) -> Result<bool, DatabaseError> {
        let mut conn = self.pool.get().await?;
        let tx = conn.transaction().await?;

        tx.execute(
            "DELETE FROM user_packs WHERE user_id = $1 AND pack_id = $2",
            &[&user_id, &pack_id],
        )
        .await?;

        let remaining_row = tx
            .query_one(
                "SELECT COUNT(*) FROM user_packs WHERE pack_id = $1",
                &[&pack_id],
            )
            .await?;
        let remaining: i64 = remaining_row.get(0);

        let owner: Option<i64> = tx
            .query_opt(
                "SELECT owner_id FROM sticker_packs WHERE id = $1",
                &[&pack_id],
            )
            .await?
            .and_then(|row| row.get("owner_id"));

        let mut pack_deleted = false;
        if remaining == 0 && owner != Some(user_id) {
            // Stickers cascade via FK.
            let deleted = tx
                .execute("DELETE FROM sticker_packs WHERE id = $1", &[&pack_id])
                .await?;
            pack_deleted = deleted > 0;
        }

        tx.commit().await?;
        Ok(pack_deleted)
    }

    async fn set_favorite(
        &self,
        user_id: i64,
        pack_id: Uuid,
        favorite: bool,
    ) -> Result<(), DatabaseError> {
        let conn = self.pool.get().await?;
        let updated = conn
            .execute(
                "UPDATE user_packs SET is_favorite = $3 WHERE user_id = $1 AND pack_id = $2",
                &[&user_id, &pack_id, &favorite],
            )
            .await?;
        if updated == 0 {
            return Err(DatabaseError::NotFound {
                entity: "user_pack_membership".to_string(),
                id: format!("{user_id}/{pack_id}"),
            });
        }
        Ok(())
    }

    async fn list_packs_for_user(
        &self,
        user_id: i64,
    ) -> Result<Vec<(StickerPack, UserPackMembership)>, DatabaseError> {
        let conn = self.pool.get().await?;
        let rows = conn
            .query(
                r#"
                SELECT p.id, p.name, p.title, p.owner_id, p.is_animated, p.is_video,
                       p.created_at, p.last_modified,
                       up.user_id, up.can_edit, up.is_favorite, up.added_at
                FROM sticker_packs p
                JOIN user_packs up ON up.pack_id = p.id
                WHERE up.user_id = $1
                ORDER BY up.is_favorite DESC, p.last_modified DESC
                "#,
                &[&user_id],
            )
            .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let pack = Self::row_to_pack(row);
                let membership = UserPackMembership {
                    user_id: row.get("user_id"),
                    pack_id: pack.id,
                    can_edit: row.get("can_edit"),
                    is_favorite: row.get("is_favorite"),
                    added_at: row.get("added_at"),
                };
                (pack, membership)
            })
            .collect())
    }

    async fn list_stickers(&self, pack_id: Uuid) -> Result<Vec<Sticker>, DatabaseError> {
        let conn = self.pool.get().await?;
        let rows = conn
            .query(
                r#"
                SELECT id, pack_id, file_id, emoji, position, type, created_at
                FROM stickers
                WHERE pack_id = $1
                ORDER BY position ASC
                "#,
                &[&pack_id],
            )
            .await?;
        Ok(rows.iter().map(Self::row_to_sticker).collect())
    }

    async fn get_pack_by_name(&self, name: &str) -> Result<Option<StickerPack>, DatabaseError> {
        let conn = self.pool.get().await?;
        let row = conn
            .query_opt("SELECT * FROM sticker_packs WHERE name = $1", &[&name])
            .await?;
        Ok(row.as_ref().map(Self::row_to_pack))
    }

    async fn can_edit(&self, user_id: i64, pack_id: Uuid) -> Result<bool, DatabaseError> {
        let conn = self.pool.get().await?;
        let row = conn
            .query_opt(
                r#"
                SELECT (p.owner_id = $1) OR COALESCE(up.can_edit, FALSE) AS editable
                FROM sticker_packs p
                LEFT JOIN user_packs up ON up.pack_id = p.id AND up.user_id = $1
                WHERE p.id = $2
                "#,
                &[&user_id, &pack_id],
            )
            .await?;
        Ok(row
            .map(|r| r.get::<_, Option<bool>>("editable").unwrap_or(false))
            .unwrap_or(false))
    }

    async fn pack_stats(&self, pack_id: Uuid) -> Result<PackStats, DatabaseError> {
        let conn = self.pool.get().await?;
        let row = conn
            .query_one(
                r#"
                SELECT
                    (SELECT COUNT(*) FROM stickers WHERE pack_id = $1) AS sticker_count,
                    (SELECT COUNT(*) FROM user_packs WHERE pack_id = $1 AND is_favorite)
                        AS favorite_count
                "#,
                &[&pack_id],
            )
            .await?;
        Ok(PackStats {
            sticker_count: row.get("sticker_count"),
            favorite_count: row.get("favorite_count"),
        })
    }
}
