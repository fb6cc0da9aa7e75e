use anyhow::Context;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::{debug, info};
use uuid::Uuid;

use crate::fixtures;
use crate::models::{CourseId, Discussion, Forum, Post, User};
use crate::store::ForumSnapshot;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

async fn upsert_forum(pool: &PgPool, forum: &Forum) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO forum_metric.forums (id, course_id, name)
        VALUES ($1, $2, $3)
        ON CONFLICT (id) DO UPDATE
        SET course_id = EXCLUDED.course_id, name = EXCLUDED.name
        "#,
    )
    .bind(forum.id)
    .bind(forum.course_id)
    .bind(&forum.name)
    .execute(pool)
    .await?;
    Ok(())
}

async fn upsert_discussion(pool: &PgPool, discussion: &Discussion) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO forum_metric.discussions (id, forum_id)
        VALUES ($1, $2)
        ON CONFLICT (id) DO UPDATE SET forum_id = EXCLUDED.forum_id
        "#,
    )
    .bind(discussion.id)
    .bind(discussion.forum_id)
    .execute(pool)
    .await?;
    Ok(())
}

async fn upsert_user(pool: &PgPool, user: &User) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO forum_metric.users (id, nationality)
        VALUES ($1, $2)
        ON CONFLICT (id) DO UPDATE SET nationality = EXCLUDED.nationality
        "#,
    )
    .bind(user.id)
    .bind(&user.nationality)
    .execute(pool)
    .await?;
    Ok(())
}

async fn insert_post(pool: &PgPool, post: &Post, source_key: &str) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO forum_metric.posts
        (id, discussion_id, parent_id, user_id, created, source_key)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(post.id)
    .bind(post.discussion_id)
    .bind(post.parent_id)
    .bind(post.author_id)
    .bind(post.created_at)
    .bind(source_key)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let snapshot = fixtures::reference_forum();

    for forum in snapshot.forums() {
        upsert_forum(pool, forum).await?;
    }
    for discussion in snapshot.all_discussions() {
        upsert_discussion(pool, discussion).await?;
    }
    for user in snapshot.users() {
        upsert_user(pool, user).await?;
    }
    for post in snapshot.all_posts() {
        insert_post(pool, post, &format!("seed-{}", post.id)).await?;
    }

    info!(posts = snapshot.post_count(), "seeded reference forum");
    Ok(())
}

pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        course_id: i64,
        forum_id: i64,
        forum_name: String,
        discussion_id: i64,
        post_id: i64,
        parent_id: Option<i64>,
        user_id: i64,
        nationality: Option<String>,
        created: DateTime<Utc>,
        source_key: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut inserted = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;

        upsert_forum(
            pool,
            &Forum {
                id: row.forum_id,
                course_id: row.course_id,
                name: row.forum_name,
            },
        )
        .await?;
        upsert_discussion(
            pool,
            &Discussion {
                id: row.discussion_id,
                forum_id: row.forum_id,
            },
        )
        .await?;
        upsert_user(
            pool,
            &User {
                id: row.user_id,
                nationality: row.nationality.filter(|value| !value.trim().is_empty()),
            },
        )
        .await?;

        let source_key = row
            .source_key
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));
        let post = Post {
            id: row.post_id,
            discussion_id: row.discussion_id,
            parent_id: row.parent_id.unwrap_or(0),
            author_id: row.user_id,
            created_at: row.created.timestamp(),
        };

        if insert_post(pool, &post, &source_key).await? {
            inserted += 1;
        } else {
            debug!(post_id = post.id, %source_key, "post already imported");
        }
    }

    Ok(inserted)
}

pub async fn load_snapshot(pool: &PgPool, course_id: CourseId) -> anyhow::Result<ForumSnapshot> {
    let mut snapshot = ForumSnapshot::new();

    let forums = sqlx::query("SELECT id, course_id, name FROM forum_metric.forums WHERE course_id = $1")
        .bind(course_id)
        .fetch_all(pool)
        .await
        .context("failed to load forums")?;
    for row in forums {
        snapshot.add_forum(Forum {
            id: row.get("id"),
            course_id: row.get("course_id"),
            name: row.get("name"),
        });
    }

    let discussions = sqlx::query(
        "SELECT d.id, d.forum_id \
         FROM forum_metric.discussions d \
         JOIN forum_metric.forums f ON f.id = d.forum_id \
         WHERE f.course_id = $1",
    )
    .bind(course_id)
    .fetch_all(pool)
    .await
    .context("failed to load discussions")?;
    for row in discussions {
        snapshot.add_discussion(Discussion {
            id: row.get("id"),
            forum_id: row.get("forum_id"),
        });
    }

    let posts = sqlx::query(
        "SELECT p.id, p.discussion_id, p.parent_id, p.user_id, p.created \
         FROM forum_metric.posts p \
         JOIN forum_metric.discussions d ON d.id = p.discussion_id \
         JOIN forum_metric.forums f ON f.id = d.forum_id \
         WHERE f.course_id = $1",
    )
    .bind(course_id)
    .fetch_all(pool)
    .await
    .context("failed to load posts")?;
    for row in posts {
        snapshot.add_post(Post {
            id: row.get("id"),
            discussion_id: row.get("discussion_id"),
            parent_id: row.get("parent_id"),
            author_id: row.get("user_id"),
            created_at: row.get("created"),
        });
    }

    let users = sqlx::query(
        "SELECT DISTINCT u.id, u.nationality \
         FROM forum_metric.users u \
         JOIN forum_metric.posts p ON p.user_id = u.id \
         JOIN forum_metric.discussions d ON d.id = p.discussion_id \
         JOIN forum_metric.forums f ON f.id = d.forum_id \
         WHERE f.course_id = $1",
    )
    .bind(course_id)
    .fetch_all(pool)
    .await
    .context("failed to load users")?;
    for row in users {
        snapshot.add_user(User {
            id: row.get("id"),
            nationality: row.get("nationality"),
        });
    }

    debug!(course_id, posts = snapshot.post_count(), "loaded forum snapshot");
    Ok(snapshot)
}
